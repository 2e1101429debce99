use crate::render::{EquationTier, RenderStyle};
use crate::textutil::normalize_nbsp;

pub const MARKUP_TOKEN: &str = "[MATHML]";
pub const UNKNOWN_TOKEN: &str = "[MATH?]";

/// Plain text: paragraphs separated by a blank line, LaTeX wrapped in `$...$`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextStyle;

impl RenderStyle for TextStyle {
    fn text(&self, text: &str, out: &mut String) {
        out.push_str(&normalize_nbsp(text));
    }

    fn line_break(&self, out: &mut String) {
        out.push('\n');
    }

    fn tab(&self, out: &mut String) {
        out.push('\t');
    }

    fn equation(&self, tier: EquationTier<'_>, out: &mut String) {
        match tier {
            EquationTier::Formula(tex) => {
                out.push('$');
                out.push_str(tex);
                out.push('$');
            }
            EquationTier::Markup(_) => out.push_str(MARKUP_TOKEN),
            EquationTier::Missing { .. } => out.push_str(UNKNOWN_TOKEN),
        }
    }

    fn paragraph(&self, content: String) -> String {
        content
    }

    fn document(&self, paragraphs: Vec<String>) -> String {
        paragraphs.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::body::testing::{document_xml, ole_run};
    use crate::docx::body::BodyTree;
    use crate::equation::registry::testing::record;
    use crate::equation::registry::EquationRegistry;
    use crate::render::render_body;

    fn render(body: &str, registry: &EquationRegistry) -> String {
        let tree = BodyTree::from_document_xml(&document_xml(body)).expect("tree");
        render_body(&tree, registry, &TextStyle)
    }

    #[test]
    fn plain_paragraph() {
        let text = render("<w:p><w:r><w:t>Hello</w:t></w:r></w:p>", &EquationRegistry::default());
        assert_eq!(text, "Hello");
    }

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        let text = render(
            concat!(
                "<w:p><w:r><w:t xml:space=\"preserve\">a\u{00A0}b </w:t></w:r></w:p>",
                "<w:p/>",
                "<w:p><w:r><w:t>c</w:t><w:br/><w:t>d</w:t><w:tab/></w:r></w:p>"
            ),
            &EquationRegistry::default(),
        );
        assert_eq!(text, "a b \n\n\n\nc\nd\t");
    }

    #[test]
    fn substitutes_each_tier() {
        let mut reg = EquationRegistry::default();
        reg.insert(record("rId1", "<math/>", "x^2"));
        reg.insert(record("rId2", "<math/>", ""));
        let body = format!(
            "<w:p><w:r><w:t xml:space=\"preserve\">f = </w:t></w:r>{}{}{}</w:p>",
            ole_run("rId1"),
            ole_run("rId2"),
            ole_run("rId3"),
        );
        assert_eq!(render(&body, &reg), "f = $x^2$[MATHML][MATH?]");
    }

    #[test]
    fn rendering_is_idempotent() {
        let mut reg = EquationRegistry::default();
        reg.insert(record("rId1", "<math/>", "\\alpha"));
        let body = format!("<w:p>{}</w:p><w:p><w:r><w:t>x</w:t></w:r></w:p>", ole_run("rId1"));
        assert_eq!(render(&body, &reg), render(&body, &reg));
    }

    #[test]
    fn pictures_keep_their_text() {
        let body = concat!(
            r#"<w:p><w:r><w:t xml:space="preserve">See figure </w:t></w:r>"#,
            r#"<w:r><w:pict><v:shape><v:imagedata r:id="rId12"/></v:shape></w:pict></w:r></w:p>"#,
            r#"<w:p><w:r><w:pict><v:shape><v:imagedata r:id="rId13"/>"#,
            r#"<v:textbox><w:txbxContent><w:p><w:r><w:t>Caption text</w:t></w:r></w:p></w:txbxContent></v:textbox>"#,
            "</v:shape></w:pict></w:r></w:p>"
        );
        assert_eq!(
            render(body, &EquationRegistry::default()),
            "See figure \n\nCaption text"
        );
    }
}
