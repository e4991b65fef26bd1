use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{Result, bail};

mod db_setup;
mod sqlite;

pub use sqlite::{LibraryCounts, SqliteLibrary};

pub type ItemId = i64;
pub type LibraryId = i64;
pub type CollectionId = i64;

pub const ITEM_TYPE_BOOK: &str = "book";
pub const ITEM_TYPE_BOOK_SECTION: &str = "bookSection";
pub const ITEM_TYPE_ATTACHMENT: &str = "attachment";

pub const CONTENT_TYPE_PDF: &str = "application/pdf";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Fields a book section carries, in the order they are listed for the type.
pub const BOOK_SECTION_FIELDS: &[&str] = &[
    "title",
    "abstractNote",
    "bookTitle",
    "series",
    "seriesNumber",
    "volume",
    "numberOfVolumes",
    "edition",
    "place",
    "publisher",
    "date",
    "pages",
    "language",
    "ISBN",
    "shortTitle",
    "url",
    "accessDate",
    "archive",
    "archiveLocation",
    "libraryCatalog",
    "callNumber",
    "rights",
    "extra",
];

const ITEM_KEY_ALPHABET: &[u8] = b"23456789ABCDEFGHIJKLMNPQRSTUVWXYZ";
const ITEM_KEY_LENGTH: usize = 8;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkMode {
    LinkedFile,
    LinkedUrl,
}

impl LinkMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinkedFile => "linked_file",
            Self::LinkedUrl => "linked_url",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "linked_file" => Ok(Self::LinkedFile),
            "linked_url" => Ok(Self::LinkedUrl),
            other => bail!("unknown attachment link mode: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub id: ItemId,
    pub key: String,
    pub library_id: LibraryId,
    pub item_type: String,
    pub parent_id: Option<ItemId>,
    pub fields: BTreeMap<String, String>,
}

impl ItemRecord {
    /// Field value, or the empty string when unset.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    pub id: ItemId,
    pub key: String,
    pub library_id: LibraryId,
    pub parent_id: Option<ItemId>,
    pub title: String,
    pub link_mode: LinkMode,
    pub content_type: Option<String>,
    pub path: Option<PathBuf>,
    pub url: Option<String>,
}

impl AttachmentRecord {
    pub fn is_pdf(&self) -> bool {
        self.content_type.as_deref() == Some(CONTENT_TYPE_PDF)
    }
}

/// Unsaved or modified regular item. `id` and `key` are filled in by the
/// first save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub id: Option<ItemId>,
    pub key: Option<String>,
    pub library_id: LibraryId,
    pub item_type: String,
    pub parent_id: Option<ItemId>,
    pub fields: BTreeMap<String, String>,
    pub collections: BTreeSet<CollectionId>,
}

impl ItemDraft {
    pub fn new(library_id: LibraryId, item_type: &str) -> Self {
        Self {
            id: None,
            key: None,
            library_id,
            item_type: item_type.to_string(),
            parent_id: None,
            fields: BTreeMap::new(),
            collections: BTreeSet::new(),
        }
    }

    /// Empty values clear the field.
    pub fn set_field(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            self.fields.remove(name);
        } else {
            self.fields.insert(name.to_string(), value.to_string());
        }
    }

    pub fn add_to_collection(&mut self, collection_id: CollectionId) {
        self.collections.insert(collection_id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDraft {
    pub library_id: LibraryId,
    pub parent_id: ItemId,
    pub title: String,
    pub link_mode: LinkMode,
    pub content_type: Option<String>,
    pub path: Option<PathBuf>,
    pub url: Option<String>,
}

impl AttachmentDraft {
    pub fn linked_url(library_id: LibraryId, parent_id: ItemId, title: &str, url: &str) -> Self {
        Self {
            library_id,
            parent_id,
            title: title.to_string(),
            link_mode: LinkMode::LinkedUrl,
            content_type: None,
            path: None,
            url: Some(url.to_string()),
        }
    }

    pub fn linked_file(
        library_id: LibraryId,
        parent_id: ItemId,
        title: &str,
        path: PathBuf,
        content_type: &str,
    ) -> Self {
        Self {
            library_id,
            parent_id,
            title: title.to_string(),
            link_mode: LinkMode::LinkedFile,
            content_type: Some(content_type.to_string()),
            path: Some(path),
            url: None,
        }
    }
}

/// Persistence surface the split pipeline needs from the reference library.
pub trait Library {
    fn item_by_key(&self, key: &str) -> Result<ItemRecord>;

    fn attachments(&self, parent_id: ItemId) -> Result<Vec<AttachmentRecord>>;

    /// URL path segment for a library: `library` or `groups/<id>`.
    fn library_prefix(&self, library_id: LibraryId) -> Result<String>;

    fn collection_by_name(&self, library_id: LibraryId, name: &str) -> Result<Option<CollectionId>>;

    /// Inserts the draft on first save, updates it afterwards.
    fn save_item(&mut self, draft: &mut ItemDraft) -> Result<ItemId>;

    fn save_attachment(&mut self, draft: &AttachmentDraft) -> Result<AttachmentRecord>;
}

/// Eight-character key derived from `seed`.
pub fn item_key_from_seed(seed: &str) -> String {
    crate::util::sha256_digest(seed.as_bytes())
        .iter()
        .take(ITEM_KEY_LENGTH)
        .map(|byte| ITEM_KEY_ALPHABET[usize::from(*byte) % ITEM_KEY_ALPHABET.len()] as char)
        .collect()
}
