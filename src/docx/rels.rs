use std::collections::BTreeMap;

use crate::docx::xml::parse_xml_tree;

/// Relationship id -> package path of the embedded object (`word/embeddings/...`).
pub type RelationshipMap = BTreeMap<String, String>;

const EMBEDDINGS_TARGET_PREFIX: &str = "embeddings/";
const DOCUMENT_ROOT: &str = "word/";

/// Reads `word/_rels/document.xml.rels` and keeps relationships that point into the
/// embeddings folder. Malformed or empty input yields an empty map.
pub fn map_rel_ids_to_embeddings(rels_xml: &str) -> RelationshipMap {
    let mut map = RelationshipMap::new();
    if rels_xml.trim().is_empty() {
        return map;
    }
    let Ok(root) = parse_xml_tree(rels_xml) else {
        return map;
    };
    for rel in root.elements().filter(|e| e.local_name() == "Relationship") {
        let (Some(id), Some(target)) = (rel.attr("Id"), rel.attr("Target")) else {
            continue;
        };
        if id.is_empty() || rel.attr("TargetMode") == Some("External") {
            continue;
        }
        if let Some(path) = normalize_embedding_target(target) {
            map.insert(id.to_string(), path);
        }
    }
    map
}

/// `embeddings/x.bin`, `./embeddings/x.bin` and `/word/embeddings/x.bin` all map to
/// `word/embeddings/x.bin`; anything outside the embeddings folder yields `None`.
pub fn normalize_embedding_target(target: &str) -> Option<String> {
    let target = target.trim();
    let relative = if let Some(abs) = target.strip_prefix('/') {
        abs.strip_prefix(DOCUMENT_ROOT)?
    } else {
        target.strip_prefix("./").unwrap_or(target)
    };
    if !relative.starts_with(EMBEDDINGS_TARGET_PREFIX) {
        return None;
    }
    Some(format!("{DOCUMENT_ROOT}{relative}"))
}

/// Final path segment of a package path (`word/embeddings/oleObject1.bin` -> `oleObject1.bin`).
pub fn file_name_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, f)| f).unwrap_or(path)
}
