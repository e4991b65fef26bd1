use lopdf::ObjectId;

use crate::model::Destination;

/// Document lookups needed to turn an outline destination into a page.
pub trait DestinationLookup {
    /// Zero-based index of the page object `reference`.
    fn page_index(&self, reference: ObjectId) -> Option<u32>;

    /// Page object reference stored under the raw key `name` in the named
    /// destination table.
    fn named_destination(&self, name: &[u8]) -> Option<ObjectId>;
}

pub fn resolve_page_index<L>(lookup: &L, destination: &Destination) -> Option<u32>
where
    L: DestinationLookup + ?Sized,
{
    match destination {
        Destination::Explicit(reference) => lookup.page_index(*reference),
        Destination::Named(name) => {
            let reference = lookup.named_destination(name)?;
            lookup.page_index(reference)
        }
    }
}
