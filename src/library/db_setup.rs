use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::util::now_utc_string;

pub(super) const DB_SCHEMA_VERSION: &str = "0.1.0";

pub(super) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign_keys")?;
    Ok(())
}

pub(super) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS libraries (
              library_id INTEGER PRIMARY KEY AUTOINCREMENT,
              library_type TEXT NOT NULL,
              group_id INTEGER UNIQUE
            );

            CREATE TABLE IF NOT EXISTS items (
              item_id INTEGER PRIMARY KEY AUTOINCREMENT,
              key TEXT NOT NULL,
              library_id INTEGER NOT NULL,
              item_type TEXT NOT NULL,
              parent_item_id INTEGER,
              date_added TEXT NOT NULL,
              date_modified TEXT NOT NULL,
              UNIQUE(library_id, key),
              FOREIGN KEY(library_id) REFERENCES libraries(library_id),
              FOREIGN KEY(parent_item_id) REFERENCES items(item_id)
            );

            CREATE TABLE IF NOT EXISTS item_fields (
              item_id INTEGER NOT NULL,
              field_name TEXT NOT NULL,
              value TEXT NOT NULL,
              PRIMARY KEY (item_id, field_name),
              FOREIGN KEY(item_id) REFERENCES items(item_id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS collections (
              collection_id INTEGER PRIMARY KEY AUTOINCREMENT,
              library_id INTEGER NOT NULL,
              name TEXT NOT NULL,
              UNIQUE(library_id, name),
              FOREIGN KEY(library_id) REFERENCES libraries(library_id)
            );

            CREATE TABLE IF NOT EXISTS collection_items (
              collection_id INTEGER NOT NULL,
              item_id INTEGER NOT NULL,
              order_index INTEGER NOT NULL DEFAULT 0,
              PRIMARY KEY (collection_id, item_id),
              FOREIGN KEY(collection_id) REFERENCES collections(collection_id) ON DELETE CASCADE,
              FOREIGN KEY(item_id) REFERENCES items(item_id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS attachments (
              item_id INTEGER PRIMARY KEY,
              link_mode TEXT NOT NULL,
              content_type TEXT,
              path TEXT,
              url TEXT,
              FOREIGN KEY(item_id) REFERENCES items(item_id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_items_parent ON items(parent_item_id);
            CREATE INDEX IF NOT EXISTS idx_collection_items_item ON collection_items(item_id);
            ",
        )
        .context("failed to create library schema")?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    connection.execute(
        "INSERT INTO libraries(library_type, group_id)
         SELECT 'user', NULL
         WHERE NOT EXISTS (SELECT 1 FROM libraries WHERE library_type = 'user')",
        [],
    )?;

    Ok(())
}
