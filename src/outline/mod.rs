mod destination;
mod pdf;
mod text;
mod walker;
#[cfg(test)]
mod tests;

pub use destination::DestinationLookup;
pub use pdf::PdfOutline;
pub use text::{OUTLINE_FILE_NAME, OUTLINE_TEMPLATE, read_outline_file};
pub use walker::walk_outline;
