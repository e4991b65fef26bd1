use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::FieldCopyPolicy;
use crate::library::{
    AttachmentDraft, BOOK_SECTION_FIELDS, CollectionId, ITEM_TYPE_BOOK_SECTION, ItemDraft,
    ItemRecord, Library,
};
use crate::model::Bookmark;

#[derive(Debug, Clone)]
pub(super) struct SectionTarget {
    pub collection_id: CollectionId,
    pub attachment_key: String,
    pub library_prefix: String,
    pub scheme: String,
    pub link_pages: bool,
    pub field_copy: FieldCopyPolicy,
}

impl SectionTarget {
    fn link_for(&self, bookmark: &Bookmark) -> String {
        let page = self.link_pages.then_some(bookmark.page);
        deep_link(&self.scheme, &self.library_prefix, &self.attachment_key, page)
    }
}

pub(super) fn deep_link(
    scheme: &str,
    library_prefix: &str,
    attachment_key: &str,
    page: Option<u32>,
) -> String {
    match page {
        Some(page) => {
            format!("{scheme}://open-pdf/{library_prefix}/items/{attachment_key}?page={page}")
        }
        None => format!("{scheme}://open-pdf/{library_prefix}/items/{attachment_key}"),
    }
}

pub(super) fn build_section_draft(
    bookmark: &Bookmark,
    parent: &ItemRecord,
    field_copy: FieldCopyPolicy,
) -> ItemDraft {
    let mut section = ItemDraft::new(parent.library_id, ITEM_TYPE_BOOK_SECTION);
    section.parent_id = Some(parent.id);
    section.set_field("title", &bookmark.title);
    section.set_field("bookTitle", parent.field("title"));

    if field_copy == FieldCopyPolicy::All {
        for field in BOOK_SECTION_FIELDS
            .iter()
            .filter(|field| !matches!(**field, "title" | "bookTitle"))
        {
            section.set_field(field, parent.field(field));
        }
    }

    section
}

/// Creates one linked book section per bookmark, in bookmark order.
///
/// An error stops the run at the failing bookmark; sections created before it
/// stay in the library.
pub(super) fn materialize<L>(
    library: &mut L,
    bookmarks: &[Bookmark],
    parent: &ItemRecord,
    target: &SectionTarget,
    progress: &mut dyn FnMut(u8),
) -> Result<usize>
where
    L: Library + ?Sized,
{
    let total = bookmarks.len();
    let mut created = 0;

    for (index, bookmark) in bookmarks.iter().enumerate() {
        let mut section = build_section_draft(bookmark, parent, target.field_copy);

        // The section needs an id before it can join a collection.
        let section_id = library
            .save_item(&mut section)
            .with_context(|| format!("failed to create section `{}`", bookmark.title))?;
        section.add_to_collection(target.collection_id);
        library.save_item(&mut section).with_context(|| {
            format!(
                "failed to add section `{}` to collection {}",
                bookmark.title, target.collection_id
            )
        })?;

        let link = target.link_for(bookmark);
        library
            .save_attachment(&AttachmentDraft::linked_url(
                parent.library_id,
                section_id,
                &link,
                &link,
            ))
            .with_context(|| format!("failed to link section `{}`", bookmark.title))?;

        created += 1;
        debug!(section_id, title = %bookmark.title, page = bookmark.page, "created section");
        progress(percent_done(index + 1, total));
    }

    info!(parent = %parent.key, sections = created, "materialized book sections");
    Ok(created)
}

fn percent_done(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    u8::try_from(done.min(total) * 100 / total).unwrap_or(100)
}
