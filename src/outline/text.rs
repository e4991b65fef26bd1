use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::model::Bookmark;

pub const OUTLINE_FILE_NAME: &str = "outline-b2bs.txt";

pub const OUTLINE_TEMPLATE: &str = "# title (use quotes if there are spaces), page number\n\
# \"Chapter 1\", 1\n\
# \"Chapter 2\", 2\n\
# ...\n";

/// Parses `"Title", page` lines. Blank lines, `#` comments and lines that do
/// not match the format are dropped without error.
pub fn parse_outline_text(contents: &str) -> Result<Vec<Bookmark>> {
    let line_regex = Regex::new(r#"^"?(.*?)"?\s*,\s*(\d+)$"#)
        .context("failed to compile outline line regex")?;

    let normalized = contents.replace('\r', "");
    let mut bookmarks = Vec::new();
    let mut malformed = 0_usize;

    for line in normalized.split('\n') {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(captures) = line_regex.captures(line) else {
            malformed += 1;
            continue;
        };

        let title = captures.get(1).map(|value| value.as_str()).unwrap_or("");
        if title.starts_with('#') {
            continue;
        }

        let page = captures
            .get(2)
            .and_then(|value| value.as_str().parse::<u32>().ok())
            .filter(|page| *page >= 1);
        let Some(page) = page else {
            malformed += 1;
            continue;
        };

        bookmarks.push(Bookmark::new(title, page));
    }

    if malformed > 0 {
        debug!(malformed, "skipped malformed outline lines");
    }

    Ok(bookmarks)
}

pub fn read_outline_file(path: &Path) -> Result<Vec<Bookmark>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read outline file {}", path.display()))?;
    parse_outline_text(&contents)
}
