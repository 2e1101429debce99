pub mod fallback;
pub mod html;
pub mod text;

use crate::docx::body::{BodyNode, BodyTree};
use crate::equation::convert::ConversionErrorKind;
use crate::equation::registry::{EquationRecord, EquationRegistry};

pub use html::HtmlStyle;
pub use text::TextStyle;

/// Best available rendering for one placeholder: formula, then markup, then a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EquationTier<'a> {
    Formula(&'a str),
    Markup(&'a str),
    Missing {
        rel_id: &'a str,
        error: Option<ConversionErrorKind>,
    },
}

impl<'a> EquationTier<'a> {
    pub fn resolve(rel_id: &'a str, record: Option<&'a EquationRecord>) -> Self {
        match record {
            Some(rec) => {
                if let Some(f) = rec.formula() {
                    Self::Formula(f)
                } else if let Some(m) = rec.markup() {
                    Self::Markup(m)
                } else {
                    Self::Missing {
                        rel_id,
                        error: rec.error,
                    }
                }
            }
            None => Self::Missing {
                rel_id,
                error: None,
            },
        }
    }
}

pub trait RenderStyle {
    fn text(&self, text: &str, out: &mut String);
    fn line_break(&self, out: &mut String);
    fn tab(&self, out: &mut String);
    fn equation(&self, tier: EquationTier<'_>, out: &mut String);
    fn paragraph(&self, content: String) -> String;
    fn document(&self, paragraphs: Vec<String>) -> String;
}

pub fn render_body(tree: &BodyTree, registry: &EquationRegistry, style: &dyn RenderStyle) -> String {
    let paragraphs = tree
        .paragraphs()
        .into_iter()
        .map(|p| {
            let mut buf = String::new();
            for child in &p.children {
                walk(child, registry, style, &mut buf);
            }
            style.paragraph(buf)
        })
        .collect();
    style.document(paragraphs)
}

fn walk(node: &BodyNode, registry: &EquationRegistry, style: &dyn RenderStyle, out: &mut String) {
    match node {
        BodyNode::Text(t) => style.text(t, out),
        BodyNode::Break => style.line_break(out),
        BodyNode::Tab => style.tab(out),
        BodyNode::Equation(eq) => {
            let tier = EquationTier::resolve(&eq.rel_id, registry.get(&eq.rel_id));
            style.equation(tier, out);
        }
        BodyNode::Paragraph(_) | BodyNode::Run(_) | BodyNode::Element(_) => {
            for child in node.children() {
                walk(child, registry, style, out);
            }
        }
    }
}
