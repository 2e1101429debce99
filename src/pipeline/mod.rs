mod config;

use std::path::Path;

use serde::Serialize;

use crate::docx::body::BodyTree;
use crate::docx::locate::{find_placeholder_refs, map_object_types};
use crate::docx::package::{DocxPackage, DOCUMENT_PART, DOCUMENT_RELS_PART};
use crate::docx::rels::map_rel_ids_to_embeddings;
use crate::equation::convert::EquationConverter;
use crate::equation::mathml::MathmlToLatex;
use crate::equation::registry::{build_registry, EquationRecord, RegistryInputs};
use crate::progress::ConsoleProgress;
use crate::render::fallback::{BasicHtmlFallback, HtmlFallback};
use crate::render::{render_body, HtmlStyle, TextStyle};

pub use config::{ConfigOverrides, ConvertConfig};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub ok: bool,
    pub count: usize,
    pub equations: Vec<EquationRecord>,
    pub html_fallback: String,
    pub inline_html: String,
    pub plain_text: String,
}

/// Payload for a request that could not be processed at all.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self {
            error: format!("{err:#}"),
        }
    }
}

/// Converts a DOCX using the configured external converter and the built-in MathML to
/// LaTeX translation.
pub fn convert_docx_bytes(
    bytes: &[u8],
    cfg: &ConvertConfig,
    progress: &ConsoleProgress,
) -> anyhow::Result<ConvertResponse> {
    let formula = MathmlToLatex;
    let converter = EquationConverter::new(&cfg.converter, &formula, cfg.tmp_dir.clone());
    convert_docx_with(bytes, cfg, &converter, progress)
}

/// Same as [`convert_docx_bytes`], reading the DOCX from disk.
pub fn convert_docx_file(
    path: &Path,
    cfg: &ConvertConfig,
    progress: &ConsoleProgress,
) -> anyhow::Result<ConvertResponse> {
    let pkg = DocxPackage::read(path, cfg.max_upload_bytes)?;
    let formula = MathmlToLatex;
    let converter = EquationConverter::new(&cfg.converter, &formula, cfg.tmp_dir.clone());
    convert_package(&pkg, cfg, &converter, progress)
}

pub fn convert_docx_with(
    bytes: &[u8],
    cfg: &ConvertConfig,
    converter: &EquationConverter<'_>,
    progress: &ConsoleProgress,
) -> anyhow::Result<ConvertResponse> {
    let pkg = DocxPackage::from_bytes(bytes, cfg.max_upload_bytes)?;
    convert_package(&pkg, cfg, converter, progress)
}

fn convert_package(
    pkg: &DocxPackage,
    cfg: &ConvertConfig,
    converter: &EquationConverter<'_>,
    progress: &ConsoleProgress,
) -> anyhow::Result<ConvertResponse> {
    progress.info(format!("DOCX entries: {}", pkg.entries.len()));

    let document_xml = pkg.xml_text(DOCUMENT_PART);
    let rels_xml = pkg.xml_text(DOCUMENT_RELS_PART);
    progress.info(format!(
        "document.xml {} bytes, rels {} bytes",
        document_xml.len(),
        rels_xml.len()
    ));

    let tree = match BodyTree::from_document_xml(&document_xml) {
        Ok(tree) => tree,
        Err(err) => {
            progress.warn(format!("unreadable document body, treating as empty: {err:#}"));
            BodyTree::default()
        }
    };
    let relationships = map_rel_ids_to_embeddings(&rels_xml);
    let refs = find_placeholder_refs(&tree);
    let object_types = map_object_types(&tree);
    let embedded = pkg.embedded_objects();
    progress.info(format!(
        "Placeholders: {} (embedded relationships: {}, embedded objects: {})",
        refs.len(),
        relationships.len(),
        embedded.len()
    ));

    let registry = build_registry(
        &RegistryInputs {
            refs: &refs,
            relationships: &relationships,
            object_types: &object_types,
            embedded: &embedded,
            max_streams: cfg.max_stream_inventory,
        },
        converter,
        progress,
    );

    let inline_html = render_body(&tree, &registry, &HtmlStyle);
    let plain_text = render_body(&tree, &registry, &TextStyle);
    let html_fallback = if cfg.fallback_html {
        BasicHtmlFallback.render(&tree)
    } else {
        String::new()
    };

    let equations = registry.into_records();
    progress.info(format!("Equations converted: {}", equations.len()));
    Ok(ConvertResponse {
        ok: true,
        count: equations.len(),
        equations,
        html_fallback,
        inline_html,
        plain_text,
    })
}
