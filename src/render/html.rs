use crate::render::{EquationTier, RenderStyle};
use crate::textutil::{escape_attr, escape_html, force_inline_mathml};

pub const STYLE_PREAMBLE: &str = "<style>
  .eq-inline{padding:2px 4px;border-radius:6px}
  .eq-inline-missing{color:#dc2626;border-bottom:1px dotted #dc2626}
</style>";

/// Inline HTML: one `<p>` per paragraph, LaTeX as `\(...\)` spans, MathML forced inline.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlStyle;

impl RenderStyle for HtmlStyle {
    fn text(&self, text: &str, out: &mut String) {
        out.push_str(&escape_html(text));
    }

    fn line_break(&self, out: &mut String) {
        out.push_str("<br/>");
    }

    fn tab(&self, out: &mut String) {
        out.push_str("&emsp;");
    }

    fn equation(&self, tier: EquationTier<'_>, out: &mut String) {
        match tier {
            EquationTier::Formula(tex) => {
                out.push_str(&format!(
                    r#"<span class="eq-inline" data-tex="{}">\({}\)</span>"#,
                    escape_attr(tex),
                    escape_html(tex)
                ));
            }
            EquationTier::Markup(mathml) => {
                out.push_str(&format!(
                    r#"<span class="eq-inline" data-has-mml="1">{}</span>"#,
                    force_inline_mathml(mathml)
                ));
            }
            EquationTier::Missing { rel_id, error } => {
                let title = if !rel_id.is_empty() {
                    rel_id
                } else {
                    error.map(|e| e.as_str()).unwrap_or("missing")
                };
                out.push_str(&format!(
                    r#"<span class="eq-inline-missing" title="{}""#,
                    escape_attr(title)
                ));
                if let Some(kind) = error {
                    out.push_str(&format!(r#" data-error="{}""#, kind.as_str()));
                }
                out.push_str(">[equation]</span>");
            }
        }
    }

    fn paragraph(&self, content: String) -> String {
        if content.is_empty() {
            "<p>&nbsp;</p>".to_string()
        } else {
            format!("<p>{content}</p>")
        }
    }

    fn document(&self, paragraphs: Vec<String>) -> String {
        format!("{STYLE_PREAMBLE}\n{}", paragraphs.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::body::testing::{document_xml, ole_run};
    use crate::docx::body::BodyTree;
    use crate::equation::convert::ConversionErrorKind;
    use crate::equation::registry::testing::record;
    use crate::equation::registry::EquationRegistry;
    use crate::render::render_body;

    fn render(body: &str, registry: &EquationRegistry) -> String {
        let tree = BodyTree::from_document_xml(&document_xml(body)).expect("tree");
        let html = render_body(&tree, registry, &HtmlStyle);
        html.strip_prefix(STYLE_PREAMBLE)
            .and_then(|s| s.strip_prefix('\n'))
            .expect("preamble")
            .to_string()
    }

    #[test]
    fn plain_paragraph() {
        let html = render("<w:p><w:r><w:t>Hello</w:t></w:r></w:p>", &EquationRegistry::default());
        assert_eq!(html, "<p>Hello</p>");
    }

    #[test]
    fn escapes_text_once() {
        let html = render(
            "<w:p><w:r><w:t>a &lt; b &amp;&amp; c &gt; d</w:t></w:r></w:p>",
            &EquationRegistry::default(),
        );
        assert_eq!(html, "<p>a &lt; b &amp;&amp; c &gt; d</p>");
    }

    #[test]
    fn breaks_tabs_and_empty_paragraphs() {
        let html = render(
            "<w:p><w:r><w:t>a</w:t><w:br/><w:t>b</w:t><w:tab/><w:t>c</w:t></w:r></w:p><w:p/>",
            &EquationRegistry::default(),
        );
        assert_eq!(html, "<p>a<br/>b&emsp;c</p>\n<p>&nbsp;</p>");
    }

    #[test]
    fn formula_placeholder() {
        let mut reg = EquationRegistry::default();
        reg.insert(record("rId5", "<math><mi>x</mi></math>", "x^2"));
        let html = render(&format!("<w:p>{}</w:p>", ole_run("rId5")), &reg);
        assert_eq!(
            html,
            r#"<p><span class="eq-inline" data-tex="x^2">\(x^2\)</span></p>"#
        );
    }

    #[test]
    fn formula_with_markup_characters_is_escaped() {
        let mut reg = EquationRegistry::default();
        reg.insert(record("rId5", "", r#"a<b "c""#));
        let html = render(&format!("<w:p>{}</w:p>", ole_run("rId5")), &reg);
        assert!(html.contains(r#"data-tex="a&lt;b &quot;c&quot;""#));
        assert!(html.contains(r#"\(a&lt;b "c"\)"#));
    }

    #[test]
    fn markup_placeholder_is_forced_inline() {
        let mut reg = EquationRegistry::default();
        reg.insert(record("rId5", r#"<math display="block"><mi>x</mi></math>"#, ""));
        let html = render(&format!("<w:p>{}</w:p>", ole_run("rId5")), &reg);
        assert_eq!(
            html,
            r#"<p><span class="eq-inline" data-has-mml="1"><math display="inline"><mi>x</mi></math></span></p>"#
        );
    }

    #[test]
    fn missing_placeholder_is_flagged() {
        let mut reg = EquationRegistry::default();
        let mut failed = record("rId6", "", "");
        failed.error = Some(ConversionErrorKind::ConverterProcess);
        reg.insert(failed);
        let html = render(
            &format!("<w:p>{}{}</w:p>", ole_run("rId6"), ole_run("rId404")),
            &reg,
        );
        assert_eq!(
            html,
            concat!(
                r#"<p><span class="eq-inline-missing" title="rId6" data-error="ruby_converter_error">[equation]</span>"#,
                r#"<span class="eq-inline-missing" title="rId404">[equation]</span></p>"#
            )
        );
    }

    #[test]
    fn rendering_is_idempotent() {
        let mut reg = EquationRegistry::default();
        reg.insert(record("rId1", "<math><mi>x</mi></math>", "x"));
        reg.insert(record("rId2", r#"<math display="block"><mi>y</mi></math>"#, ""));
        let body = format!(
            "<w:p>{}{}{}</w:p><w:p><w:r><w:t>a &amp; b</w:t></w:r></w:p>",
            ole_run("rId1"),
            ole_run("rId2"),
            ole_run("rId3")
        );
        assert_eq!(render(&body, &reg), render(&body, &reg));
    }
}
