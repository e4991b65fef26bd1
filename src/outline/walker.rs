use tracing::debug;

use super::destination::{DestinationLookup, resolve_page_index};
use crate::model::{Bookmark, OutlineNode};

/// Flattens `nodes` into `output` in depth-first order, expanding children
/// while `depth_budget` allows. A budget of 1 treats every node as a leaf.
/// Nodes whose destination cannot be resolved are skipped; the number of
/// skipped nodes is returned.
pub fn walk_outline<L>(
    lookup: &L,
    nodes: &[OutlineNode],
    depth_budget: u32,
    output: &mut Vec<Bookmark>,
) -> usize
where
    L: DestinationLookup + ?Sized,
{
    let mut skipped = 0;

    for node in nodes {
        if node.children.is_empty() || depth_budget <= 1 {
            let page_index = node
                .destination
                .as_ref()
                .and_then(|destination| resolve_page_index(lookup, destination));

            match page_index {
                Some(index) => output.push(Bookmark::new(node.title.clone(), index + 1)),
                None => {
                    debug!(title = %node.title, "skipping outline node without resolvable destination");
                    skipped += 1;
                }
            }
        } else {
            skipped += walk_outline(lookup, &node.children, depth_budget - 1, output);
        }
    }

    skipped
}
