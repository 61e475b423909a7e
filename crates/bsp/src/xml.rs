//! Minimal owned XML element tree.
//!
//! The BSP output is built by loading a template skeleton, grafting
//! generated nodes into it, and writing it back out. This module provides
//! just enough DOM for that: named elements with attributes, optional text,
//! and ordered children. Parsing and serialisation are delegated to
//! `quick-xml`, which also handles escaping and indentation.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Errors from reading or writing XML.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// Malformed markup.
    #[error("XML syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),
    /// Malformed attribute.
    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    /// Serialisation failed.
    #[error("XML write failed: {0}")]
    Io(#[from] std::io::Error),
    /// Serialised output was not UTF-8.
    #[error("XML output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The document contains no element at all.
    #[error("XML document has no root element")]
    NoRoot,
    /// An element was still open at end of input.
    #[error("XML element <{0}> is never closed")]
    Unclosed(String),
}

/// One XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// `<name>text</name>`
    pub fn text_node(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Builder form of [`Element::set_attr`].
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Set an attribute, replacing any previous value for `key`.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Append `child` and return a handle to it.
    // The vector is non-empty right after the push.
    #[allow(clippy::unwrap_used)]
    pub fn push(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        self.children.last_mut().unwrap()
    }

    /// Append a new empty child named `name`.
    pub fn append(&mut self, name: impl Into<String>) -> &mut Element {
        self.push(Element::new(name))
    }

    /// Return the first child named `name`, creating it if absent.
    pub fn provide(&mut self, name: &str) -> &mut Element {
        let existing = self.children.iter().position(|c| c.name == name);
        match existing {
            // `i` comes from `position()` over this same vector.
            #[allow(clippy::indexing_slicing)]
            Some(i) => &mut self.children[i],
            None => self.append(name),
        }
    }

    /// [`Element::provide`] applied along a `/`-separated path.
    pub fn provide_path(&mut self, path: &str) -> &mut Element {
        path.split('/').fold(self, |el, seg| el.provide(seg))
    }

    /// Follow a `/`-separated path of first-matching children.
    pub fn find(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .try_fold(self, |el, seg| el.children.iter().find(|c| c.name == seg))
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Element> {
        path.split('/')
            .try_fold(self, |el, seg| el.children.iter_mut().find(|c| c.name == seg))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Texts of the `<string>` children, the list encoding used throughout
    /// the BSP format.
    pub fn strings(&self) -> Vec<&str> {
        self.children_named("string")
            .filter_map(Element::text)
            .collect()
    }

    /// Append one `<string>` child per item.
    pub fn extend_strings<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children
            .extend(items.into_iter().map(|s| Element::text_node("string", s)));
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let mut el = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            el.attributes.push((key, value));
        }
        Ok(el)
    }
}

/// Parse a document into its root element. Comments, declarations and
/// processing instructions are dropped; whitespace-only text is trimmed.
pub fn parse(text: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let el = Element::from_start(&start)?;
                attach(&mut stack, &mut root, el);
            }
            Event::End(_) => {
                // quick-xml rejects mismatched end tags itself.
                if let Some(el) = stack.pop() {
                    attach(&mut stack, &mut root, el);
                }
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text
                        .get_or_insert_with(String::new)
                        .push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text
                        .get_or_insert_with(String::new)
                        .push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }
    root.ok_or(XmlError::NoRoot)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => {
            if root.is_none() {
                *root = Some(el);
            }
        }
    }
}

/// Serialise `root` as an indented UTF-8 document with an XML declaration.
pub fn to_string(root: &Element) -> Result<String, XmlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    write_element(&mut writer, root)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, el: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() && el.text.is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = &el.text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &el.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn provide_reuses_existing_child() {
        let mut root = Element::new("MCU");
        root.provide("CompilationFlags").append("IncludeDirectories");
        root.provide("CompilationFlags").append("PreprocessorMacros");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].children.len(), 2);
    }

    #[test]
    fn provide_path_builds_nested_chain() {
        let mut root = Element::new("MCU");
        root.provide_path("ConfigurableProperties/PropertyGroups/PropertyGroup/Properties")
            .push(Element::new("PropertyEntry"));
        let props = root
            .find("ConfigurableProperties/PropertyGroups/PropertyGroup/Properties")
            .unwrap();
        assert_eq!(props.children.len(), 1);
    }

    #[test]
    fn set_attr_replaces_value() {
        let mut el = Element::new("x").with_attr("a", "1");
        el.set_attr("a", "2");
        assert_eq!(el.attributes.len(), 1);
        assert_eq!(el.attr("a"), Some("2"));
    }

    #[test]
    fn parse_reads_nested_elements_attributes_and_text() {
        let doc = r#"<?xml version="1.0"?>
<!-- skeleton -->
<BoardSupportPackage xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <PackageID>com.example.mbed</PackageID>
  <SupportedMCUs />
  <MCUFamilies>
    <MCUFamily><ID>MBED</ID></MCUFamily>
  </MCUFamilies>
  <Note>a &amp; b</Note>
</BoardSupportPackage>"#;
        let root = parse(doc).unwrap();
        assert_eq!(root.name, "BoardSupportPackage");
        assert_eq!(
            root.attr("xmlns:xsi"),
            Some("http://www.w3.org/2001/XMLSchema-instance")
        );
        assert_eq!(root.find("PackageID").unwrap().text(), Some("com.example.mbed"));
        assert!(root.find("SupportedMCUs").unwrap().children.is_empty());
        assert_eq!(root.find("MCUFamilies/MCUFamily/ID").unwrap().text(), Some("MBED"));
        assert_eq!(root.find("Note").unwrap().text(), Some("a & b"));
    }

    #[test]
    fn parse_rejects_empty_and_unclosed_documents() {
        assert!(matches!(parse("<?xml version=\"1.0\"?>"), Err(XmlError::NoRoot)));
        assert!(parse("<a><b></b>").is_err());
    }

    #[test]
    fn written_document_parses_back_identically() {
        let mut root = Element::new("Frameworks");
        let fw = root.append("EmbeddedFramework");
        fw.push(Element::text_node("ID", "com.sysprogs.arm.mbed.rtos"));
        fw.append("AdditionalSourceFiles")
            .extend_strings(["$$SYS:BSP_ROOT$$/rtos/a<b>.c", "$$SYS:BSP_ROOT$$/rtos/&.c"]);
        fw.push(Element::new("ConditionToInclude").with_attr("xsi:type", "MatchesRegex"));

        let text = to_string(&root).unwrap();
        assert!(text.starts_with("<?xml"));
        assert_eq!(parse(&text).unwrap(), root);
    }
}
