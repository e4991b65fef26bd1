use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use super::destination::DestinationLookup;
use crate::model::{Destination, OutlineNode};

const MAX_OUTLINE_NESTING: usize = 64;
const MAX_NAME_TREE_DEPTH: usize = 32;
const MAX_REFERENCE_HOPS: usize = 8;

/// Outline view over a loaded PDF document.
pub struct PdfOutline {
    document: Document,
    page_indices: HashMap<ObjectId, u32>,
}

impl PdfOutline {
    pub fn load(path: &Path) -> Result<Self> {
        let document = Document::load(path)
            .with_context(|| format!("failed to load pdf {}", path.display()))?;
        Ok(Self::from_document(document))
    }

    pub fn from_document(document: Document) -> Self {
        // get_pages is keyed by one-based page number.
        let page_indices = document
            .get_pages()
            .into_iter()
            .map(|(page_number, page_id)| (page_id, page_number.saturating_sub(1)))
            .collect();

        Self {
            document,
            page_indices,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_indices.len()
    }

    /// Top-level outline nodes; empty when the document has no outline.
    pub fn outline(&self) -> Vec<OutlineNode> {
        let Some(outlines) = self
            .catalog()
            .and_then(|catalog| catalog.get(b"Outlines").ok())
            .and_then(|object| self.resolve(object))
            .and_then(|object| object.as_dict().ok())
        else {
            return Vec::new();
        };

        let Ok(Object::Reference(first_id)) = outlines.get(b"First") else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        self.read_siblings(*first_id, 0, &mut visited)
    }

    fn read_siblings(
        &self,
        first_id: ObjectId,
        level: usize,
        visited: &mut HashSet<ObjectId>,
    ) -> Vec<OutlineNode> {
        let mut nodes = Vec::new();

        if level >= MAX_OUTLINE_NESTING {
            warn!(level, "outline nesting limit reached; ignoring deeper entries");
            return nodes;
        }

        let mut current = Some(first_id);
        while let Some(node_id) = current {
            if !visited.insert(node_id) {
                debug!(object = ?node_id, "outline cycle detected");
                break;
            }

            let Some(dict) = self
                .document
                .get_object(node_id)
                .ok()
                .and_then(|object| object.as_dict().ok())
            else {
                break;
            };

            let title = dict
                .get(b"Title")
                .ok()
                .and_then(|object| self.resolve(object))
                .and_then(text_string)
                .unwrap_or_default();

            let children = match dict.get(b"First") {
                Ok(Object::Reference(child_id)) => self.read_siblings(*child_id, level + 1, visited),
                _ => Vec::new(),
            };

            nodes.push(OutlineNode {
                title,
                children,
                destination: self.node_destination(dict),
            });

            current = match dict.get(b"Next") {
                Ok(Object::Reference(next_id)) => Some(*next_id),
                _ => None,
            };
        }

        nodes
    }

    fn node_destination(&self, node: &Dictionary) -> Option<Destination> {
        if let Ok(dest) = node.get(b"Dest") {
            return self.classify_destination(dest);
        }

        let action = node
            .get(b"A")
            .ok()
            .and_then(|object| self.resolve(object))
            .and_then(|object| object.as_dict().ok())?;

        match action.get(b"S") {
            Ok(Object::Name(kind)) if kind.as_slice() == b"GoTo" => {
                self.classify_destination(action.get(b"D").ok()?)
            }
            _ => None,
        }
    }

    fn classify_destination(&self, object: &Object) -> Option<Destination> {
        match self.resolve(object)? {
            Object::Array(items) => match items.first() {
                Some(Object::Reference(page_id)) => Some(Destination::Explicit(*page_id)),
                _ => None,
            },
            Object::String(bytes, _) => Some(Destination::Named(bytes.clone())),
            Object::Name(name) => Some(Destination::Named(name.clone())),
            Object::Dictionary(dict) => self.classify_destination(dict.get(b"D").ok()?),
            _ => None,
        }
    }

    fn explicit_reference(&self, object: &Object) -> Option<ObjectId> {
        match self.resolve(object)? {
            Object::Array(items) => match items.first() {
                Some(Object::Reference(page_id)) => Some(*page_id),
                _ => None,
            },
            Object::Dictionary(dict) => self.explicit_reference(dict.get(b"D").ok()?),
            _ => None,
        }
    }

    fn lookup_name_tree(&self, node: &Dictionary, name: &[u8], depth: usize) -> Option<ObjectId> {
        if depth >= MAX_NAME_TREE_DEPTH {
            return None;
        }

        if let Some(entries) = node
            .get(b"Names")
            .ok()
            .and_then(|object| self.resolve(object))
            .and_then(|object| object.as_array().ok())
        {
            for pair in entries.chunks(2) {
                let [key, value] = pair else {
                    continue;
                };
                let key_matches = match self.resolve(key) {
                    Some(Object::String(bytes, _)) => bytes.as_slice() == name,
                    _ => false,
                };
                if key_matches {
                    return self.explicit_reference(value);
                }
            }
        }

        let kids = node
            .get(b"Kids")
            .ok()
            .and_then(|object| self.resolve(object))
            .and_then(|object| object.as_array().ok())?;

        kids.iter()
            .filter_map(|kid| self.resolve(kid).and_then(|object| object.as_dict().ok()))
            .find_map(|kid| self.lookup_name_tree(kid, name, depth + 1))
    }

    fn catalog(&self) -> Option<&Dictionary> {
        self.document.catalog().ok()
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        let mut current = object;
        for _ in 0..MAX_REFERENCE_HOPS {
            match current {
                Object::Reference(id) => current = self.document.get_object(*id).ok()?,
                other => return Some(other),
            }
        }
        None
    }
}

impl DestinationLookup for PdfOutline {
    fn page_index(&self, reference: ObjectId) -> Option<u32> {
        self.page_indices.get(&reference).copied()
    }

    fn named_destination(&self, name: &[u8]) -> Option<ObjectId> {
        let catalog = self.catalog()?;

        let name_tree = catalog
            .get(b"Names")
            .ok()
            .and_then(|object| self.resolve(object))
            .and_then(|object| object.as_dict().ok())
            .and_then(|names| names.get(b"Dests").ok())
            .and_then(|object| self.resolve(object))
            .and_then(|object| object.as_dict().ok());

        if let Some(tree) = name_tree {
            if let Some(reference) = self.lookup_name_tree(tree, name, 0) {
                return Some(reference);
            }
        }

        // PDF 1.1 style /Dests dictionary keyed by name.
        let legacy = catalog
            .get(b"Dests")
            .ok()
            .and_then(|object| self.resolve(object))
            .and_then(|object| object.as_dict().ok())?;

        let reference = legacy
            .get(name)
            .ok()
            .and_then(|object| self.explicit_reference(object));
        if reference.is_none() {
            debug!(name = %decode_text_bytes(name), "named destination not found");
        }
        reference
    }
}

fn text_string(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_text_bytes(bytes)),
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Decodes a PDF text string: UTF-16BE with BOM, otherwise UTF-8 or Latin-1.
pub(super) fn decode_text_bytes(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE_u8, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&byte| byte as char).collect(),
    }
}
