use anyhow::{Context, Result};
use tracing::{debug, error, info};

use super::materialize::{SectionTarget, materialize};
use super::progress::ProgressMeter;
use super::source::{PdfSource, SourceOutcome, collect_bookmarks, find_text_outline, pdf_path};
use crate::cli::{FieldCopyPolicy, SplitArgs, resolve_db_path};
use crate::library::{Library, SqliteLibrary};
use crate::model::SplitReport;
use crate::outline::PdfOutline;
use crate::prompt::{Prompter, TerminalPrompter};
use crate::util::{now_utc_string, write_json_pretty};

#[derive(Debug, Clone)]
pub(super) struct SplitOptions {
    pub collection: String,
    pub field_copy: FieldCopyPolicy,
    pub scheme: String,
    pub link_pages: bool,
}

impl SplitOptions {
    fn from_args(args: &SplitArgs) -> Self {
        Self {
            collection: args.collection.clone(),
            field_copy: args.copy_fields,
            scheme: args.scheme.clone(),
            link_pages: !args.no_page_links,
        }
    }
}

pub fn run(args: SplitArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.library_root, args.db_path.as_ref());
    let mut library = SqliteLibrary::open(&db_path)?;
    let mut prompter = TerminalPrompter::new(args.depth.clone(), args.yes, args.interactive);
    let options = SplitOptions::from_args(&args);
    let mut progress = ProgressMeter::new();
    let mut report = SplitReport::new(
        now_utc_string(),
        &options.collection,
        options.field_copy.as_str(),
    );

    info!(
        db_path = %db_path.display(),
        items = args.items.len(),
        collection = %options.collection,
        field_copy = options.field_copy.as_str(),
        "starting split"
    );

    let outcome = split_items(
        &mut library,
        &mut prompter,
        &args.items,
        &options,
        &mut progress,
        &mut report,
    );

    if let Err(err) = &outcome {
        error!(error = %err, "error processing items");
        progress.mark_failed();
        report.fail(err);
    }
    progress.hide();
    report.finish(now_utc_string());

    let written = match &args.report {
        Some(report_path) => write_json_pretty(report_path, &report).map(|()| {
            info!(path = %report_path.display(), "wrote split report");
        }),
        None => Ok(()),
    };

    info!(
        status = ?report.status,
        sections = report.counts.sections_created,
        attachments_skipped = report.counts.attachments_skipped,
        templates = report.counts.templates_bootstrapped,
        "split finished"
    );

    outcome.and(written)
}

pub(super) fn split_items<L>(
    library: &mut L,
    prompter: &mut dyn Prompter,
    item_keys: &[String],
    options: &SplitOptions,
    progress: &mut ProgressMeter,
    report: &mut SplitReport,
) -> Result<()>
where
    L: Library + ?Sized,
{
    for item_key in item_keys {
        let book = library.item_by_key(item_key)?;
        report.counts.items += 1;

        let collection_id = library
            .collection_by_name(book.library_id, &options.collection)?
            .with_context(|| {
                format!(
                    "collection `{}` not found in the library of item {}",
                    options.collection, book.key
                )
            })?;

        let attachments = library.attachments(book.id)?;
        let text_outline = find_text_outline(&attachments).cloned();

        for attachment in &attachments {
            info!(item = %book.key, attachment = %attachment.key, "starting attachment");

            if !attachment.is_pdf() {
                debug!(attachment = %attachment.key, "not a pdf; skipping");
                continue;
            }
            report.counts.pdf_attachments += 1;

            let pdf = PdfOutline::load(pdf_path(attachment)?)?;
            let pdf_outline = pdf.outline();
            debug!(
                attachment = %attachment.key,
                pages = pdf.page_count(),
                top_level_entries = pdf_outline.len(),
                "loaded pdf"
            );

            let outcome = collect_bookmarks(
                library,
                prompter,
                &book,
                attachment,
                text_outline.as_ref(),
                PdfSource {
                    lookup: &pdf,
                    outline: &pdf_outline,
                },
            )?;

            let bookmarks = match outcome {
                SourceOutcome::Bookmarks {
                    source,
                    bookmarks,
                    skipped_nodes,
                } => {
                    info!(
                        attachment = %attachment.key,
                        source = source.as_str(),
                        bookmarks = bookmarks.len(),
                        "collected bookmarks"
                    );
                    report.counts.outline_nodes_skipped += skipped_nodes;
                    bookmarks
                }
                SourceOutcome::Skip { reason } => {
                    report.record_skip(&book.key, &attachment.key, &reason);
                    continue;
                }
                SourceOutcome::StopItem { template } => {
                    if template.is_some() {
                        report.counts.templates_bootstrapped += 1;
                    }
                    break;
                }
            };

            let target = SectionTarget {
                collection_id,
                attachment_key: attachment.key.clone(),
                library_prefix: library.library_prefix(attachment.library_id)?,
                scheme: options.scheme.clone(),
                link_pages: options.link_pages,
                field_copy: options.field_copy,
            };

            progress.show(&book.key, bookmarks.len());
            let mut completed = 0;
            let created = materialize(library, &bookmarks, &book, &target, &mut |percent| {
                completed += 1;
                progress.update(percent);
            });
            report.counts.sections_created += completed;
            created?;

            report.counts.attachments_split += 1;
        }
    }

    Ok(())
}
