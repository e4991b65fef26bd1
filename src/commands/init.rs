use anyhow::Result;
use tracing::info;

use crate::cli::{InitArgs, resolve_db_path};
use crate::library::SqliteLibrary;

pub fn run(args: InitArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.library_root, args.db_path.as_ref());
    let library = SqliteLibrary::open(&db_path)?;
    let user_library = library.user_library_id()?;

    info!(db_path = %db_path.display(), user_library, "library ready");

    if let Some(group_id) = args.group_id {
        let library_id = library.ensure_group_library(group_id)?;
        info!(group_id, library_id, "group library ready");
    }

    Ok(())
}
