use anyhow::{anyhow, Context};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn attr(&self, key: &str) -> Option<&str> {
        find_attr(&self.attrs, key)
    }

    /// Qualified name without its namespace prefix (`m:mfrac` -> `mfrac`).
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// Depth-first search (document order) for the first descendant matching `pred`.
    pub fn find_descendant(&self, pred: &dyn Fn(&XmlElement) -> bool) -> Option<&XmlElement> {
        for el in self.elements() {
            if pred(el) {
                return Some(el);
            }
            if let Some(found) = el.find_descendant(pred) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated character content of this element and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(el: &XmlElement, out: &mut String) {
    for c in &el.children {
        match c {
            XmlNode::Text(t) => out.push_str(t),
            XmlNode::Element(e) => collect_text(e, out),
        }
    }
}

pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name)
}

pub fn parse_xml_events(xml: &str) -> anyhow::Result<Vec<XmlEvent>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    loop {
        let ev = reader.read_event().context("read xml event")?;
        match ev {
            Event::Eof => break,
            Event::Start(s) => {
                events.push(XmlEvent::Start {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::End(e) => {
                events.push(XmlEvent::End {
                    name: bytes_to_string(e.name().as_ref()),
                });
            }
            Event::Empty(s) => {
                events.push(XmlEvent::Empty {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::Text(t) => {
                let txt = t.unescape().context("unescape text")?.into_owned();
                events.push(XmlEvent::Text { text: txt });
            }
            Event::CData(t) => {
                let txt = bytes_to_string(t.into_inner());
                events.push(XmlEvent::Text { text: txt });
            }
            // Declarations, comments, PIs and doctypes carry no content we render.
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }
    Ok(events)
}

/// Parses `xml` into an element tree and returns the document element.
pub fn parse_xml_tree(xml: &str) -> anyhow::Result<XmlElement> {
    let events = parse_xml_events(xml)?;
    let mut stack: Vec<XmlElement> = vec![XmlElement::default()];
    for ev in events {
        match ev {
            XmlEvent::Start { name, attrs } => stack.push(XmlElement {
                name,
                attrs,
                children: Vec::new(),
            }),
            XmlEvent::Empty { name, attrs } => {
                let el = XmlElement {
                    name,
                    attrs,
                    children: Vec::new(),
                };
                push_child(&mut stack, XmlNode::Element(el));
            }
            XmlEvent::Text { text } => {
                if stack.len() > 1 {
                    push_child(&mut stack, XmlNode::Text(text));
                }
            }
            XmlEvent::End { name } => {
                if stack.len() < 2 {
                    return Err(anyhow!("unbalanced end tag: {name}"));
                }
                let el = stack.pop().ok_or_else(|| anyhow!("empty element stack"))?;
                if el.name != name {
                    return Err(anyhow!("mismatched end tag: expected {} got {name}", el.name));
                }
                push_child(&mut stack, XmlNode::Element(el));
            }
        }
    }
    if stack.len() != 1 {
        return Err(anyhow!("unclosed element at end of document"));
    }
    let doc = stack.pop().unwrap_or_default();
    doc.children
        .into_iter()
        .find_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
        .ok_or_else(|| anyhow!("xml has no document element"))
}

fn push_child(stack: &mut [XmlElement], node: XmlNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        let key = bytes_to_string(a.key.as_ref());
        let val = a.unescape_value().context("unescape attr")?.into_owned();
        attrs.push((key, val));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}
