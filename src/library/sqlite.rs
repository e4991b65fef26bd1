use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Serialize;
use tracing::debug;

use super::db_setup::{configure_connection, ensure_schema};
use super::{
    AttachmentDraft, AttachmentRecord, CollectionId, ITEM_TYPE_ATTACHMENT, ItemDraft, ItemId,
    ItemRecord, Library, LibraryId, LinkMode, item_key_from_seed,
};
use crate::util::{ensure_directory, now_utc_string};

const MAX_KEY_ATTEMPTS: u32 = 16;

#[derive(Debug, Clone, Default, Serialize)]
pub struct LibraryCounts {
    pub libraries: i64,
    pub items: i64,
    pub books: i64,
    pub book_sections: i64,
    pub attachments: i64,
    pub collections: i64,
}

/// Reference library stored in a local SQLite database.
pub struct SqliteLibrary {
    connection: Connection,
}

impl SqliteLibrary {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_directory(parent)?;
            }
        }

        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        Self::from_connection(connection)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory library")?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn user_library_id(&self) -> Result<LibraryId> {
        self.connection
            .query_row(
                "SELECT library_id FROM libraries WHERE library_type = 'user' ORDER BY library_id LIMIT 1",
                [],
                |row| row.get(0),
            )
            .context("user library is missing")
    }

    pub fn ensure_group_library(&self, group_id: i64) -> Result<LibraryId> {
        self.connection.execute(
            "INSERT INTO libraries(library_type, group_id) VALUES('group', ?1)
             ON CONFLICT(group_id) DO NOTHING",
            [group_id],
        )?;

        self.connection
            .query_row(
                "SELECT library_id FROM libraries WHERE group_id = ?1",
                [group_id],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to look up group library {group_id}"))
    }

    pub fn ensure_collection(&self, library_id: LibraryId, name: &str) -> Result<CollectionId> {
        self.connection.execute(
            "INSERT INTO collections(library_id, name) VALUES(?1, ?2)
             ON CONFLICT(library_id, name) DO NOTHING",
            params![library_id, name],
        )?;

        self.collection_by_name(library_id, name)?
            .with_context(|| format!("collection `{name}` was not created"))
    }

    pub fn counts(&self) -> Result<LibraryCounts> {
        Ok(LibraryCounts {
            libraries: self.count("SELECT COUNT(*) FROM libraries")?,
            items: self.count("SELECT COUNT(*) FROM items")?,
            books: self.count("SELECT COUNT(*) FROM items WHERE item_type = 'book'")?,
            book_sections: self
                .count("SELECT COUNT(*) FROM items WHERE item_type = 'bookSection'")?,
            attachments: self.count("SELECT COUNT(*) FROM attachments")?,
            collections: self.count("SELECT COUNT(*) FROM collections")?,
        })
    }

    fn count(&self, sql: &str) -> Result<i64> {
        let count = self.connection.query_row(sql, [], |row| row.get(0))?;
        Ok(count)
    }

    fn load_fields(&self, item_id: ItemId) -> Result<BTreeMap<String, String>> {
        let mut statement = self
            .connection
            .prepare("SELECT field_name, value FROM item_fields WHERE item_id = ?1")?;
        let rows = statement.query_map([item_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut fields = BTreeMap::new();
        for row in rows {
            let (name, value) = row?;
            fields.insert(name, value);
        }
        Ok(fields)
    }
}

impl Library for SqliteLibrary {
    fn item_by_key(&self, key: &str) -> Result<ItemRecord> {
        let row = self
            .connection
            .query_row(
                "SELECT item_id, key, library_id, item_type, parent_item_id
                 FROM items WHERE key = ?1 ORDER BY item_id LIMIT 1",
                [key],
                |row| {
                    Ok((
                        row.get::<_, ItemId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, LibraryId>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<ItemId>>(4)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("failed to look up item {key}"))?;

        let Some((id, key, library_id, item_type, parent_id)) = row else {
            bail!("item not found: {key}");
        };

        Ok(ItemRecord {
            id,
            key,
            library_id,
            item_type,
            parent_id,
            fields: self.load_fields(id)?,
        })
    }

    fn attachments(&self, parent_id: ItemId) -> Result<Vec<AttachmentRecord>> {
        let mut statement = self.connection.prepare(
            "
            SELECT i.item_id, i.key, i.library_id, i.parent_item_id,
                   COALESCE(f.value, ''), a.link_mode, a.content_type, a.path, a.url
            FROM items i
            JOIN attachments a ON a.item_id = i.item_id
            LEFT JOIN item_fields f ON f.item_id = i.item_id AND f.field_name = 'title'
            WHERE i.parent_item_id = ?1
            ORDER BY i.item_id
            ",
        )?;

        let rows = statement.query_map([parent_id], |row| {
            Ok((
                row.get::<_, ItemId>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, LibraryId>(2)?,
                row.get::<_, Option<ItemId>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?;

        let mut attachments = Vec::new();
        for row in rows {
            let (id, key, library_id, parent_id, title, link_mode, content_type, path, url) = row?;
            attachments.push(AttachmentRecord {
                id,
                key,
                library_id,
                parent_id,
                title,
                link_mode: LinkMode::parse(&link_mode)?,
                content_type,
                path: path.map(PathBuf::from),
                url,
            });
        }

        Ok(attachments)
    }

    fn library_prefix(&self, library_id: LibraryId) -> Result<String> {
        let (library_type, group_id): (String, Option<i64>) = self
            .connection
            .query_row(
                "SELECT library_type, group_id FROM libraries WHERE library_id = ?1",
                [library_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .with_context(|| format!("library {library_id} not found"))?;

        match (library_type.as_str(), group_id) {
            ("user", _) => Ok("library".to_string()),
            ("group", Some(group_id)) => Ok(format!("groups/{group_id}")),
            (other, _) => bail!("library {library_id} has unsupported type {other}"),
        }
    }

    fn collection_by_name(&self, library_id: LibraryId, name: &str) -> Result<Option<CollectionId>> {
        let id = self
            .connection
            .query_row(
                "SELECT collection_id FROM collections WHERE library_id = ?1 AND name = ?2",
                params![library_id, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn save_item(&mut self, draft: &mut ItemDraft) -> Result<ItemId> {
        let now = now_utc_string();
        let tx = self.connection.transaction()?;

        let (item_id, key) = match draft.id {
            Some(item_id) => {
                let updated = tx.execute(
                    "UPDATE items SET item_type = ?1, parent_item_id = ?2, date_modified = ?3
                     WHERE item_id = ?4",
                    params![draft.item_type, draft.parent_id, now, item_id],
                )?;
                if updated == 0 {
                    bail!("item {item_id} no longer exists");
                }
                (item_id, draft.key.clone())
            }
            None => {
                let key = allocate_key(&tx, draft.library_id)?;
                tx.execute(
                    "INSERT INTO items(key, library_id, item_type, parent_item_id, date_added, date_modified)
                     VALUES(?1, ?2, ?3, ?4, ?5, ?5)",
                    params![key, draft.library_id, draft.item_type, draft.parent_id, now],
                )
                .with_context(|| format!("failed to insert {} item", draft.item_type))?;
                (tx.last_insert_rowid(), Some(key))
            }
        };

        tx.execute("DELETE FROM item_fields WHERE item_id = ?1", [item_id])?;
        {
            let mut statement = tx.prepare(
                "INSERT INTO item_fields(item_id, field_name, value) VALUES(?1, ?2, ?3)",
            )?;
            for (name, value) in &draft.fields {
                statement.execute(params![item_id, name, value])?;
            }
        }

        {
            let mut statement = tx.prepare(
                "
                INSERT INTO collection_items(collection_id, item_id, order_index)
                VALUES(
                  ?1, ?2,
                  (SELECT COALESCE(MAX(order_index), -1) + 1 FROM collection_items WHERE collection_id = ?1)
                )
                ON CONFLICT(collection_id, item_id) DO NOTHING
                ",
            )?;
            for collection_id in &draft.collections {
                statement
                    .execute(params![collection_id, item_id])
                    .with_context(|| {
                        format!("failed to add item {item_id} to collection {collection_id}")
                    })?;
            }
        }

        tx.commit()?;

        debug!(item_id, item_type = %draft.item_type, "saved item");
        draft.id = Some(item_id);
        draft.key = key;
        Ok(item_id)
    }

    fn save_attachment(&mut self, draft: &AttachmentDraft) -> Result<AttachmentRecord> {
        let now = now_utc_string();
        let tx = self.connection.transaction()?;
        let key = allocate_key(&tx, draft.library_id)?;
        let path = draft
            .path
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned());

        tx.execute(
            "INSERT INTO items(key, library_id, item_type, parent_item_id, date_added, date_modified)
             VALUES(?1, ?2, ?3, ?4, ?5, ?5)",
            params![key, draft.library_id, ITEM_TYPE_ATTACHMENT, draft.parent_id, now],
        )
        .with_context(|| format!("failed to insert attachment under item {}", draft.parent_id))?;
        let item_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO item_fields(item_id, field_name, value) VALUES(?1, 'title', ?2)",
            params![item_id, draft.title],
        )?;
        tx.execute(
            "INSERT INTO attachments(item_id, link_mode, content_type, path, url)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![
                item_id,
                draft.link_mode.as_str(),
                draft.content_type,
                path,
                draft.url
            ],
        )?;

        tx.commit()?;

        debug!(item_id, link_mode = draft.link_mode.as_str(), "saved attachment");
        Ok(AttachmentRecord {
            id: item_id,
            key,
            library_id: draft.library_id,
            parent_id: Some(draft.parent_id),
            title: draft.title.clone(),
            link_mode: draft.link_mode,
            content_type: draft.content_type.clone(),
            path: draft.path.clone(),
            url: draft.url.clone(),
        })
    }
}

fn allocate_key(tx: &Transaction<'_>, library_id: LibraryId) -> Result<String> {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    for attempt in 0..MAX_KEY_ATTEMPTS {
        let key = item_key_from_seed(&format!("{library_id}:{nanos}:{attempt}"));
        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE library_id = ?1 AND key = ?2)",
            params![library_id, key],
            |row| row.get(0),
        )?;
        if !taken {
            return Ok(key);
        }
    }

    bail!("failed to allocate a unique item key in library {library_id}")
}
