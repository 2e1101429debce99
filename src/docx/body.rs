use anyhow::Context;

use crate::docx::xml::{parse_xml_tree, XmlElement};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BodyTree {
    pub blocks: Vec<BodyNode>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BodyNode {
    Text(String),
    Break,
    Tab,
    Paragraph(Paragraph),
    Run(Run),
    Equation(EquationRef),
    Element(Element),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub style: Option<String>,
    pub children: Vec<BodyNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Run {
    pub format: RunFormat,
    pub children: Vec<BodyNode>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceholderShape {
    /// `w:object` wrapping an `o:OLEObject`.
    EmbeddedObject,
    /// A bare `o:OLEObject` (or one found under `w:pict`).
    OleObject,
    /// `w:pict` whose only reference is a VML `v:imagedata` preview.
    VmlPreview,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EquationRef {
    pub rel_id: String,
    pub shape: PlaceholderShape,
    /// Declared `ProgID` of the OLE object (`Equation.DSMT4`, `Equation.3`, ...); empty when absent.
    pub prog_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub children: Vec<BodyNode>,
}

impl BodyNode {
    pub fn children(&self) -> &[BodyNode] {
        match self {
            BodyNode::Paragraph(p) => &p.children,
            BodyNode::Run(r) => &r.children,
            BodyNode::Element(e) => &e.children,
            BodyNode::Text(_) | BodyNode::Break | BodyNode::Tab | BodyNode::Equation(_) => &[],
        }
    }
}

impl BodyTree {
    /// Builds the tree from `word/document.xml`. An empty part yields an empty tree;
    /// malformed XML is an error the caller may choose to tolerate.
    pub fn from_document_xml(xml: &str) -> anyhow::Result<Self> {
        if xml.trim().is_empty() {
            return Ok(Self::default());
        }
        let root = parse_xml_tree(xml).context("parse document.xml")?;
        let Some(body) = root.elements().find(|e| e.name == "w:body") else {
            return Ok(Self::default());
        };
        let blocks = body
            .elements()
            .filter(|e| e.name != "w:sectPr")
            .filter_map(convert_element)
            .collect();
        Ok(Self { blocks })
    }

    /// Paragraphs in document order, wherever they sit outside another paragraph
    /// (top level, table cells, content controls).
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        for node in &self.blocks {
            collect_paragraphs(node, &mut out);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

fn collect_paragraphs<'a>(node: &'a BodyNode, out: &mut Vec<&'a Paragraph>) {
    match node {
        BodyNode::Paragraph(p) => out.push(p),
        other => {
            for child in other.children() {
                collect_paragraphs(child, out);
            }
        }
    }
}

fn convert_children(el: &XmlElement) -> Vec<BodyNode> {
    el.elements().filter_map(convert_element).collect()
}

fn convert_element(el: &XmlElement) -> Option<BodyNode> {
    let node = match el.name.as_str() {
        "w:t" => BodyNode::Text(el.text_content()),
        "w:br" | "w:cr" => BodyNode::Break,
        "w:tab" | "w:ptab" => BodyNode::Tab,
        // Property bags carry no content; the bits we need are lifted onto Paragraph/Run.
        "w:pPr" | "w:rPr" | "w:sectPr" => return None,
        "w:p" => BodyNode::Paragraph(Paragraph {
            style: paragraph_style(el),
            children: convert_children(el),
        }),
        "w:r" => BodyNode::Run(Run {
            format: run_format(el),
            children: convert_children(el),
        }),
        "w:object" => match ole_object_ref(el, PlaceholderShape::EmbeddedObject) {
            Some(eq) => BodyNode::Equation(eq),
            None => generic(el),
        },
        "w:pict" => match ole_object_ref(el, PlaceholderShape::OleObject) {
            Some(eq) => BodyNode::Equation(eq),
            None => match vml_preview_ref(el) {
                Some(eq) => BodyNode::Equation(eq),
                None => generic(el),
            },
        },
        "o:OLEObject" => match ole_rel_id(el) {
            Some(rel_id) => BodyNode::Equation(EquationRef {
                rel_id,
                shape: PlaceholderShape::OleObject,
                prog_id: prog_id_of(el),
            }),
            None => generic(el),
        },
        // Choice and Fallback describe the same content; keep one so text is not doubled.
        "mc:AlternateContent" => {
            let branch = el
                .child("mc:Fallback")
                .or_else(|| el.child("mc:Choice"))?;
            BodyNode::Element(Element {
                name: el.name.clone(),
                children: convert_children(branch),
            })
        }
        _ => generic(el),
    };
    Some(node)
}

fn generic(el: &XmlElement) -> BodyNode {
    BodyNode::Element(Element {
        name: el.name.clone(),
        children: convert_children(el),
    })
}

fn ole_rel_id(el: &XmlElement) -> Option<String> {
    el.attr("r:id")
        .filter(|v| !v.is_empty())
        .or_else(|| el.attr("r:linkByRef").filter(|v| !v.is_empty()))
        .map(str::to_string)
}

fn prog_id_of(el: &XmlElement) -> String {
    el.attr("ProgID")
        .or_else(|| el.attr("progId"))
        .unwrap_or_default()
        .to_string()
}

fn ole_object_ref(container: &XmlElement, shape: PlaceholderShape) -> Option<EquationRef> {
    let ole = container
        .find_descendant(&|e| e.name == "o:OLEObject" && ole_rel_id(e).is_some())?;
    Some(EquationRef {
        rel_id: ole_rel_id(ole)?,
        shape,
        prog_id: prog_id_of(ole),
    })
}

/// Only a `v:imagedata` directly under `w:pict` counts; one nested in a `v:shape` is an
/// ordinary picture and its subtree (textbox text included) is walked instead.
fn vml_preview_ref(pict: &XmlElement) -> Option<EquationRef> {
    let img = pict
        .elements()
        .find(|e| e.name == "v:imagedata" && e.attr("r:id").is_some_and(|v| !v.is_empty()))?;
    Some(EquationRef {
        rel_id: img.attr("r:id")?.to_string(),
        shape: PlaceholderShape::VmlPreview,
        prog_id: String::new(),
    })
}

fn paragraph_style(p: &XmlElement) -> Option<String> {
    p.child("w:pPr")?
        .child("w:pStyle")?
        .attr("w:val")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn run_format(r: &XmlElement) -> RunFormat {
    let Some(rpr) = r.child("w:rPr") else {
        return RunFormat::default();
    };
    RunFormat {
        bold: toggle_on(rpr.child("w:b")),
        italic: toggle_on(rpr.child("w:i")),
        underline: rpr
            .child("w:u")
            .is_some_and(|u| u.attr("w:val").unwrap_or("single") != "none"),
    }
}

/// OOXML on/off properties: present means on unless `w:val` says otherwise.
fn toggle_on(el: Option<&XmlElement>) -> bool {
    match el.and_then(|e| e.attr("w:val")) {
        Some(v) => !matches!(v, "0" | "false" | "off"),
        None => el.is_some(),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{document_xml, ole_run};
    use super::*;

    #[test]
    fn lifts_paragraph_and_run_properties() {
        let xml = document_xml(concat!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>"#,
            r#"<w:r><w:rPr><w:b/><w:i w:val="0"/></w:rPr><w:t>Title</w:t></w:r></w:p>"#
        ));
        let tree = BodyTree::from_document_xml(&xml).expect("tree");
        let paras = tree.paragraphs();
        assert_eq!(paras.len(), 1);
        assert_eq!(paras[0].style.as_deref(), Some("Heading1"));
        let BodyNode::Run(run) = &paras[0].children[0] else {
            panic!("expected run, got {:?}", paras[0].children);
        };
        assert!(run.format.bold);
        assert!(!run.format.italic);
        assert_eq!(run.children, vec![BodyNode::Text("Title".to_string())]);
        assert_eq!(paras[0].children.len(), 1, "tab stops must not become tabs");
    }

    #[test]
    fn recognizes_embedded_object_placeholder() {
        let xml = document_xml(&format!("<w:p>{}</w:p>", ole_run("rId9")));
        let tree = BodyTree::from_document_xml(&xml).expect("tree");
        let para = tree.paragraphs()[0];
        let BodyNode::Run(run) = &para.children[0] else {
            panic!("expected run");
        };
        assert_eq!(
            run.children,
            vec![BodyNode::Equation(EquationRef {
                rel_id: "rId9".to_string(),
                shape: PlaceholderShape::EmbeddedObject,
                prog_id: "Equation.DSMT4".to_string(),
            })]
        );
    }

    #[test]
    fn recognizes_link_by_ref_and_vml_preview() {
        let xml = document_xml(concat!(
            r#"<w:p><w:r><w:object><o:OLEObject Type="Link" r:linkByRef="rId3"/></w:object></w:r>"#,
            r#"<w:r><w:pict><v:imagedata r:id="rId4"/></w:pict></w:r></w:p>"#
        ));
        let tree = BodyTree::from_document_xml(&xml).expect("tree");
        let mut refs = Vec::new();
        for node in &tree.paragraphs()[0].children {
            if let [BodyNode::Equation(eq)] = node.children() {
                refs.push((eq.rel_id.clone(), eq.shape, eq.prog_id.clone()));
            }
        }
        assert_eq!(
            refs,
            vec![
                ("rId3".to_string(), PlaceholderShape::EmbeddedObject, String::new()),
                ("rId4".to_string(), PlaceholderShape::VmlPreview, String::new()),
            ]
        );
    }

    #[test]
    fn shape_pictures_are_not_placeholders() {
        let xml = document_xml(concat!(
            r#"<w:p><w:r><w:t xml:space="preserve">See figure </w:t></w:r>"#,
            r#"<w:r><w:pict><v:shape><v:imagedata r:id="rId12"/></v:shape></w:pict></w:r></w:p>"#,
            r#"<w:p><w:r><w:pict><v:shape><v:imagedata r:id="rId13"/>"#,
            r#"<v:textbox><w:txbxContent><w:p><w:r><w:t>Caption text</w:t></w:r></w:p></w:txbxContent></v:textbox>"#,
            "</v:shape></w:pict></w:r></w:p>"
        ));
        let tree = BodyTree::from_document_xml(&xml).expect("tree");
        let paras = tree.paragraphs();
        assert_eq!(paras.len(), 2);

        fn has_equation(nodes: &[BodyNode]) -> bool {
            nodes
                .iter()
                .any(|n| matches!(n, BodyNode::Equation(_)) || has_equation(n.children()))
        }
        fn text(nodes: &[BodyNode], out: &mut String) {
            for n in nodes {
                match n {
                    BodyNode::Text(t) => out.push_str(t),
                    other => text(other.children(), out),
                }
            }
        }
        for p in &paras {
            assert!(!has_equation(&p.children));
        }
        let mut caption = String::new();
        text(&paras[1].children, &mut caption);
        assert_eq!(caption, "Caption text");
    }

    #[test]
    fn collects_table_paragraphs_in_order() {
        let xml = document_xml(concat!(
            "<w:p><w:r><w:t>one</w:t></w:r></w:p>",
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>two</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
            "<w:p/>"
        ));
        let tree = BodyTree::from_document_xml(&xml).expect("tree");
        assert_eq!(tree.paragraphs().len(), 3);
        assert_eq!(tree.blocks.len(), 3, "sectPr is dropped");
    }

    #[test]
    fn alternate_content_keeps_a_single_branch() {
        let xml = document_xml(concat!(
            "<w:p><w:r><mc:AlternateContent>",
            "<mc:Choice Requires=\"wps\"><w:t>choice</w:t></mc:Choice>",
            "<mc:Fallback><w:t>fallback</w:t></mc:Fallback>",
            "</mc:AlternateContent></w:r></w:p>"
        ));
        let tree = BodyTree::from_document_xml(&xml).expect("tree");
        let BodyNode::Run(run) = &tree.paragraphs()[0].children[0] else {
            panic!("expected run");
        };
        assert_eq!(run.children[0].children(), &[BodyNode::Text("fallback".to_string())]);
    }

    #[test]
    fn empty_part_yields_empty_tree() {
        assert!(BodyTree::from_document_xml("").expect("tree").is_empty());
        assert!(BodyTree::from_document_xml("<w:document/>").expect("tree").is_empty());
        assert!(BodyTree::from_document_xml("<w:document><w:body>").is_err());
    }
}
