use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::library::{AttachmentDraft, AttachmentRecord, CONTENT_TYPE_TEXT, ItemRecord, Library};
use crate::model::{Bookmark, OutlineNode};
use crate::outline::{
    DestinationLookup, OUTLINE_FILE_NAME, OUTLINE_TEMPLATE, read_outline_file, walk_outline,
};
use crate::prompt::Prompter;

pub(super) const DEPTH_PROMPT: &str = "Enter the maximum depth to look into the PDF bookmark.";
pub(super) const EMPTY_OUTLINE_NOTICE: &str =
    "The outline file for this item is empty. Please revise and try again. Skipping.";
pub(super) const INVALID_DEPTH_NOTICE: &str =
    "Invalid depth value. Enter a positive integer. Skipping to next file, if any.";
pub(super) const CREATE_OUTLINE_PROMPT: &str = "No outline found.\n\
Press OK to create an attachment and add your outline there.\n\
Press Cancel to abort.";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum OutlineSource {
    TextOutline,
    PdfOutline,
    Bootstrap,
}

impl OutlineSource {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::TextOutline => "text_outline",
            Self::PdfOutline => "pdf_outline",
            Self::Bootstrap => "bootstrap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SourceOutcome {
    Bookmarks {
        source: OutlineSource,
        bookmarks: Vec<Bookmark>,
        skipped_nodes: usize,
    },
    /// Skip this attachment and continue with the next one.
    Skip { reason: String },
    /// Stop processing the remaining attachments of this item.
    StopItem { template: Option<PathBuf> },
}

/// The PDF side of the selection: its outline tree and how to resolve it.
pub(super) struct PdfSource<'a> {
    pub lookup: &'a dyn DestinationLookup,
    pub outline: &'a [OutlineNode],
}

/// Text outline wins over the PDF outline; with neither, a template is bootstrapped.
pub(super) fn select_source(has_text_outline: bool, has_pdf_outline: bool) -> OutlineSource {
    if has_text_outline {
        OutlineSource::TextOutline
    } else if has_pdf_outline {
        OutlineSource::PdfOutline
    } else {
        OutlineSource::Bootstrap
    }
}

pub(super) fn parse_depth_budget(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|depth| *depth > 0)
}

pub(super) fn find_text_outline(attachments: &[AttachmentRecord]) -> Option<&AttachmentRecord> {
    attachments
        .iter()
        .find(|attachment| attachment.title == OUTLINE_FILE_NAME)
}

pub(super) fn collect_bookmarks<L>(
    library: &mut L,
    prompter: &mut dyn Prompter,
    book: &ItemRecord,
    pdf_attachment: &AttachmentRecord,
    text_outline: Option<&AttachmentRecord>,
    pdf: PdfSource<'_>,
) -> Result<SourceOutcome>
where
    L: Library + ?Sized,
{
    let source = select_source(text_outline.is_some(), !pdf.outline.is_empty());
    debug!(attachment = %pdf_attachment.key, source = source.as_str(), "selected outline source");

    match (source, text_outline) {
        (OutlineSource::TextOutline, Some(text_outline)) => {
            let outline_path = text_outline_path(text_outline, pdf_attachment)?;
            info!(path = %outline_path.display(), "creating bookmarks from outline file");

            let bookmarks = read_outline_file(&outline_path)?;
            if bookmarks.is_empty() {
                prompter.alert(EMPTY_OUTLINE_NOTICE);
                return Ok(SourceOutcome::Skip {
                    reason: "outline file is empty".to_string(),
                });
            }

            Ok(SourceOutcome::Bookmarks {
                source,
                bookmarks,
                skipped_nodes: 0,
            })
        }
        (OutlineSource::PdfOutline, _) => {
            let answer = prompter.prompt(DEPTH_PROMPT)?;
            let Some(depth_budget) = answer.as_deref().and_then(parse_depth_budget) else {
                warn!(answer = ?answer, "invalid outline depth");
                prompter.alert(INVALID_DEPTH_NOTICE);
                return Ok(SourceOutcome::Skip {
                    reason: "invalid depth value".to_string(),
                });
            };
            info!(depth_budget, "walking pdf outline");

            let mut bookmarks = Vec::new();
            let skipped_nodes = walk_outline(pdf.lookup, pdf.outline, depth_budget, &mut bookmarks);
            if skipped_nodes > 0 {
                debug!(skipped_nodes, "outline nodes without resolvable destination");
            }

            Ok(SourceOutcome::Bookmarks {
                source,
                bookmarks,
                skipped_nodes,
            })
        }
        _ => bootstrap_outline(library, prompter, book, pdf_attachment),
    }
}

fn bootstrap_outline<L>(
    library: &mut L,
    prompter: &mut dyn Prompter,
    book: &ItemRecord,
    pdf_attachment: &AttachmentRecord,
) -> Result<SourceOutcome>
where
    L: Library + ?Sized,
{
    if !prompter.confirm(CREATE_OUTLINE_PROMPT)? {
        info!(item = %book.key, "outline template declined");
        return Ok(SourceOutcome::StopItem { template: None });
    }

    let outline_path = outline_path_beside(pdf_path(pdf_attachment)?);
    fs::write(&outline_path, OUTLINE_TEMPLATE)
        .with_context(|| format!("failed to write outline template {}", outline_path.display()))?;
    info!(path = %outline_path.display(), "wrote outline template");

    library.save_attachment(&AttachmentDraft::linked_file(
        book.library_id,
        book.id,
        OUTLINE_FILE_NAME,
        outline_path.clone(),
        CONTENT_TYPE_TEXT,
    ))?;

    prompter.alert(&format!(
        "A file called '{OUTLINE_FILE_NAME}' has been added to this item.\n\
         Edit this file to add your desired outline; the file will have examples.\n\
         Lines starting with # will be ignored."
    ));

    Ok(SourceOutcome::StopItem {
        template: Some(outline_path),
    })
}

fn text_outline_path(
    text_outline: &AttachmentRecord,
    pdf_attachment: &AttachmentRecord,
) -> Result<PathBuf> {
    match &text_outline.path {
        Some(path) => Ok(path.clone()),
        None => Ok(outline_path_beside(pdf_path(pdf_attachment)?)),
    }
}

pub(super) fn pdf_path(attachment: &AttachmentRecord) -> Result<&Path> {
    attachment
        .path
        .as_deref()
        .with_context(|| format!("pdf attachment {} has no file path", attachment.key))
}

fn outline_path_beside(pdf_path: &Path) -> PathBuf {
    pdf_path
        .parent()
        .map(|dir| dir.join(OUTLINE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(OUTLINE_FILE_NAME))
}
