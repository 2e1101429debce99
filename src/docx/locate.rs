use std::collections::{BTreeMap, HashSet};

use crate::docx::body::{BodyNode, BodyTree, PlaceholderShape};

/// Relationship id -> declared OLE `ProgID` (possibly empty).
pub type ObjectTypeMap = BTreeMap<String, String>;

/// Relationship ids referenced by equation placeholders, deduplicated, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaceholderRefs {
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl PlaceholderRefs {
    pub fn insert(&mut self, rel_id: &str) -> bool {
        if !self.seen.insert(rel_id.to_string()) {
            return false;
        }
        self.ids.push(rel_id.to_string());
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, rel_id: &str) -> bool {
        self.seen.contains(rel_id)
    }
}

/// Depth-first scan for equation placeholders. The tree keeps children in document
/// order, so discovery order matches reading order.
pub fn find_placeholder_refs(tree: &BodyTree) -> PlaceholderRefs {
    let mut refs = PlaceholderRefs::default();
    for node in &tree.blocks {
        walk(node, &mut |node| {
            if let BodyNode::Equation(eq) = node {
                refs.insert(&eq.rel_id);
            }
        });
    }
    refs
}

/// Declared object types for every OLE placeholder (VML previews declare none).
pub fn map_object_types(tree: &BodyTree) -> ObjectTypeMap {
    let mut map = ObjectTypeMap::new();
    for node in &tree.blocks {
        walk(node, &mut |node| {
            if let BodyNode::Equation(eq) = node {
                if eq.shape != PlaceholderShape::VmlPreview {
                    map.entry(eq.rel_id.clone())
                        .or_insert_with(|| eq.prog_id.clone());
                }
            }
        });
    }
    map
}

fn walk(node: &BodyNode, visit: &mut dyn FnMut(&BodyNode)) {
    visit(node);
    for child in node.children() {
        walk(child, visit);
    }
}
