use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub const DEFAULT_LIBRARY_ROOT: &str = ".cache/books2sections";

#[derive(Parser, Debug)]
#[command(
    name = "books2sections",
    version,
    about = "Split book items into per-chapter book sections using PDF or text outlines"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Init(InitArgs),
    Import(ImportArgs),
    Split(SplitArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    #[arg(long, default_value = DEFAULT_LIBRARY_ROOT)]
    pub library_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Also register a group library with this id.
    #[arg(long)]
    pub group_id: Option<i64>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long, default_value = DEFAULT_LIBRARY_ROOT)]
    pub library_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub pdf: PathBuf,

    /// Extra book field as `name=value`, e.g. `--field publisher=Springer`.
    #[arg(long = "field", value_parser = parse_field_assignment)]
    pub fields: Vec<(String, String)>,

    #[arg(long)]
    pub collection: Option<String>,

    /// Link an existing outline text file to the book.
    #[arg(long)]
    pub outline: Option<PathBuf>,

    #[arg(long)]
    pub group_id: Option<i64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum FieldCopyPolicy {
    /// Copy every non-empty book field that applies to a book section.
    All,
    /// Only set the section title and book title.
    #[value(name = "none")]
    TitleOnly,
}

impl FieldCopyPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::TitleOnly => "none",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    #[arg(long, default_value = DEFAULT_LIBRARY_ROOT)]
    pub library_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Key of a book item to split; repeat to select several.
    #[arg(long = "item", required = true)]
    pub items: Vec<String>,

    /// Collection that receives the new sections.
    #[arg(long)]
    pub collection: String,

    /// Answer for the outline depth prompt.
    #[arg(long)]
    pub depth: Option<String>,

    /// Accept the outline template prompt without asking.
    #[arg(long, default_value_t = false)]
    pub yes: bool,

    /// Ask on the terminal for answers not given as flags.
    #[arg(long, default_value_t = false)]
    pub interactive: bool,

    #[arg(long, value_enum, default_value_t = FieldCopyPolicy::All)]
    pub copy_fields: FieldCopyPolicy,

    #[arg(long, default_value = "zotero")]
    pub scheme: String,

    #[arg(long, default_value_t = false)]
    pub no_page_links: bool,

    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = DEFAULT_LIBRARY_ROOT)]
    pub library_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

pub fn resolve_db_path(library_root: &std::path::Path, db_path: Option<&PathBuf>) -> PathBuf {
    db_path
        .cloned()
        .unwrap_or_else(|| library_root.join("library.sqlite"))
}

fn parse_field_assignment(raw: &str) -> Result<(String, String), String> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err(format!("expected name=value, got `{raw}`"));
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("field name is empty in `{raw}`"));
    }

    Ok((name.to_string(), value.trim().to_string()))
}
