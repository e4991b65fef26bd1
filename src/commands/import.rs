use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::{ImportArgs, resolve_db_path};
use crate::library::{
    AttachmentDraft, CONTENT_TYPE_PDF, CONTENT_TYPE_TEXT, ITEM_TYPE_BOOK, ItemDraft, Library,
    SqliteLibrary,
};
use crate::outline::OUTLINE_FILE_NAME;

#[derive(Debug, Clone)]
struct BookImport<'a> {
    title: &'a str,
    pdf: &'a Path,
    fields: &'a [(String, String)],
    collection: Option<&'a str>,
    outline: Option<&'a Path>,
    group_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportedBook {
    key: String,
    pdf_key: String,
    outline_key: Option<String>,
}

pub fn run(args: ImportArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.library_root, args.db_path.as_ref());
    let mut library = SqliteLibrary::open(&db_path)?;

    let imported = import_book(
        &mut library,
        &BookImport {
            title: &args.title,
            pdf: &args.pdf,
            fields: &args.fields,
            collection: args.collection.as_deref(),
            outline: args.outline.as_deref(),
            group_id: args.group_id,
        },
    )?;

    info!(
        item = %imported.key,
        pdf = %imported.pdf_key,
        outline = %imported.outline_key.as_deref().unwrap_or(""),
        "imported book"
    );
    Ok(())
}

fn import_book(library: &mut SqliteLibrary, request: &BookImport<'_>) -> Result<ImportedBook> {
    let pdf_path = existing_file(request.pdf)?;
    let outline_path = request.outline.map(existing_file).transpose()?;

    let library_id = match request.group_id {
        Some(group_id) => library.ensure_group_library(group_id)?,
        None => library.user_library_id()?,
    };

    let mut book = ItemDraft::new(library_id, ITEM_TYPE_BOOK);
    for (name, value) in request.fields {
        book.set_field(name, value);
    }
    book.set_field("title", request.title);
    if let Some(name) = request.collection {
        book.add_to_collection(library.ensure_collection(library_id, name)?);
    }
    let book_id = library.save_item(&mut book)?;
    let key = book
        .key
        .clone()
        .with_context(|| format!("book item {book_id} has no key after save"))?;

    let pdf_title = pdf_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.title.to_string());
    let pdf = library.save_attachment(&AttachmentDraft::linked_file(
        library_id,
        book_id,
        &pdf_title,
        pdf_path,
        CONTENT_TYPE_PDF,
    ))?;

    let outline_key = match outline_path {
        Some(path) => Some(
            library
                .save_attachment(&AttachmentDraft::linked_file(
                    library_id,
                    book_id,
                    OUTLINE_FILE_NAME,
                    path,
                    CONTENT_TYPE_TEXT,
                ))?
                .key,
        ),
        None => None,
    };

    Ok(ImportedBook {
        key,
        pdf_key: pdf.key,
        outline_key,
    })
}

fn existing_file(path: &Path) -> Result<PathBuf> {
    let resolved = fs::canonicalize(path)
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    if !resolved.is_file() {
        bail!("not a file: {}", resolved.display());
    }
    Ok(resolved)
}
