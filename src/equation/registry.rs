use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::docx::locate::{ObjectTypeMap, PlaceholderRefs};
use crate::docx::rels::{file_name_of, RelationshipMap};
use crate::equation::convert::{serialize_error_kind, ConversionErrorKind, EquationConverter};
use crate::equation::inventory::{list_ole_streams, StreamInfo};
use crate::progress::ConsoleProgress;
use crate::textutil::non_blank;

/// One converted equation, keyed by the relationship id its placeholder carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EquationRecord {
    #[serde(rename = "rId")]
    pub rel_id: String,
    #[serde(rename = "embPath")]
    pub embedded_path: String,
    #[serde(rename = "name")]
    pub file_name: String,
    #[serde(rename = "progId")]
    pub object_type: String,
    pub mathml: String,
    pub latex: String,
    #[serde(serialize_with = "serialize_error_kind")]
    pub error: Option<ConversionErrorKind>,
    pub error_detail: String,
    pub streams: Vec<StreamInfo>,
}

impl EquationRecord {
    pub fn formula(&self) -> Option<&str> {
        non_blank(&self.latex)
    }

    pub fn markup(&self) -> Option<&str> {
        non_blank(&self.mathml)
    }
}

/// Request-scoped records in placeholder discovery order.
#[derive(Clone, Debug, Default)]
pub struct EquationRegistry {
    records: Vec<EquationRecord>,
    by_rel_id: HashMap<String, usize>,
}

impl EquationRegistry {
    pub fn get(&self, rel_id: &str) -> Option<&EquationRecord> {
        self.by_rel_id.get(rel_id).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[EquationRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<EquationRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record wins; later duplicates are ignored.
    pub fn insert(&mut self, record: EquationRecord) -> bool {
        if self.by_rel_id.contains_key(&record.rel_id) {
            return false;
        }
        self.by_rel_id
            .insert(record.rel_id.clone(), self.records.len());
        self.records.push(record);
        true
    }
}

pub struct RegistryInputs<'a> {
    pub refs: &'a PlaceholderRefs,
    pub relationships: &'a RelationshipMap,
    pub object_types: &'a ObjectTypeMap,
    pub embedded: &'a BTreeMap<String, &'a [u8]>,
    pub max_streams: usize,
}

/// Converts every placeholder whose relationship resolves to embedded bytes. Unresolvable
/// ids are skipped, never recorded as empty entries.
pub fn build_registry(
    inputs: &RegistryInputs<'_>,
    converter: &EquationConverter<'_>,
    progress: &ConsoleProgress,
) -> EquationRegistry {
    let mut registry = EquationRegistry::default();
    let resolvable: Vec<(&str, &str, &[u8])> = inputs
        .refs
        .iter()
        .filter_map(|rel_id| {
            let path = inputs.relationships.get(rel_id)?;
            let bytes = inputs.embedded.get(path)?;
            Some((rel_id, path.as_str(), *bytes))
        })
        .collect();

    let total = resolvable.len();
    for (i, (rel_id, path, bytes)) in resolvable.into_iter().enumerate() {
        let file_name = file_name_of(path).to_string();
        progress.progress(&format!("Convert {rel_id} ({file_name})"), i + 1, total);
        let conv = converter.convert(bytes, &file_name);
        if let Some(kind) = conv.error {
            progress.warn(format!("{rel_id}: {}", kind.as_str()));
        }
        registry.insert(EquationRecord {
            rel_id: rel_id.to_string(),
            embedded_path: path.to_string(),
            file_name,
            object_type: inputs.object_types.get(rel_id).cloned().unwrap_or_default(),
            mathml: conv.mathml,
            latex: conv.latex,
            error: conv.error,
            error_detail: conv.error_detail,
            streams: list_ole_streams(bytes, inputs.max_streams),
        });
    }
    registry
}
