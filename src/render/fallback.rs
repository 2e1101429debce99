use crate::docx::body::{BodyNode, BodyTree, Paragraph, RunFormat};
use crate::textutil::escape_html;

pub trait HtmlFallback {
    fn render(&self, tree: &BodyTree) -> String;
}

/// Headings, emphasis, breaks and tables; embedded objects become `[object]` markers.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicHtmlFallback;

impl HtmlFallback for BasicHtmlFallback {
    fn render(&self, tree: &BodyTree) -> String {
        let mut out = String::new();
        for node in &tree.blocks {
            block(node, &mut out);
        }
        out
    }
}

fn block(node: &BodyNode, out: &mut String) {
    match node {
        BodyNode::Paragraph(p) => paragraph(p, out),
        BodyNode::Element(el) if el.name == "w:tbl" => table(node, out),
        other => {
            for child in other.children() {
                block(child, out);
            }
        }
    }
}

fn paragraph(p: &Paragraph, out: &mut String) {
    let mut content = String::new();
    for child in &p.children {
        inline(child, RunFormat::default(), &mut content);
    }
    if content.is_empty() {
        return;
    }
    let tag = heading_tag(p.style.as_deref()).unwrap_or("p");
    out.push_str(&format!("<{tag}>{content}</{tag}>"));
}

fn heading_tag(style: Option<&str>) -> Option<&'static str> {
    let style = style?.to_ascii_lowercase().replace(' ', "");
    match style.as_str() {
        "title" | "heading1" => Some("h1"),
        "heading2" => Some("h2"),
        "heading3" => Some("h3"),
        "heading4" => Some("h4"),
        "heading5" => Some("h5"),
        "heading6" => Some("h6"),
        _ => None,
    }
}

fn inline(node: &BodyNode, format: RunFormat, out: &mut String) {
    match node {
        BodyNode::Text(t) => out.push_str(&wrap(&escape_html(t), format)),
        BodyNode::Break => out.push_str("<br />"),
        BodyNode::Tab => out.push('\t'),
        BodyNode::Equation(_) => out.push_str(r#"<span class="ole-object">[object]</span>"#),
        BodyNode::Run(r) => {
            for child in &r.children {
                inline(child, r.format, out);
            }
        }
        BodyNode::Paragraph(_) | BodyNode::Element(_) => {
            for child in node.children() {
                inline(child, format, out);
            }
        }
    }
}

fn wrap(text: &str, format: RunFormat) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut s = text.to_string();
    if format.underline {
        s = format!("<u>{s}</u>");
    }
    if format.italic {
        s = format!("<em>{s}</em>");
    }
    if format.bold {
        s = format!("<strong>{s}</strong>");
    }
    s
}

fn table(tbl: &BodyNode, out: &mut String) {
    out.push_str("<table>");
    for row in tbl.children().iter().filter(|n| is_element(n, "w:tr")) {
        out.push_str("<tr>");
        for cell in row.children().iter().filter(|n| is_element(n, "w:tc")) {
            out.push_str("<td>");
            for child in cell.children() {
                block(child, out);
            }
            out.push_str("</td>");
        }
        out.push_str("</tr>");
    }
    out.push_str("</table>");
}

fn is_element(node: &BodyNode, name: &str) -> bool {
    matches!(node, BodyNode::Element(el) if el.name == name)
}
