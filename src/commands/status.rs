use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{StatusArgs, resolve_db_path};
use crate::library::{LibraryCounts, SqliteLibrary};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.library_root, args.db_path.as_ref());
    info!(library_root = %args.library_root.display(), "status requested");

    let Some(counts) = library_counts(&db_path)? else {
        warn!(path = %db_path.display(), "library database missing; run `init` first");
        return Ok(());
    };

    info!(
        path = %db_path.display(),
        libraries = counts.libraries,
        items = counts.items,
        books = counts.books,
        book_sections = counts.book_sections,
        attachments = counts.attachments,
        collections = counts.collections,
        "library status"
    );

    Ok(())
}

/// Counts for an existing database; `None` when the file is absent.
fn library_counts(db_path: &Path) -> Result<Option<LibraryCounts>> {
    if !db_path.exists() {
        return Ok(None);
    }
    SqliteLibrary::open(db_path)?.counts().map(Some)
}
