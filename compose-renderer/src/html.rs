//! Minimal HTML tree used as the renderers' output.
//!
//! Text and attribute values are escaped on serialization; [`HtmlNode::Raw`]
//! is inserted verbatim and is reserved for operator-authored markup.

use std::fmt::Write;

use compose_core::StyleMap;

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &["img", "br", "hr", "meta", "link", "input"];

/// A node in the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlNode {
    /// An element with attributes and children.
    Element(HtmlElement),
    /// Escaped text.
    Text(String),
    /// Markup inserted without escaping.
    Raw(String),
    /// A sequence of sibling nodes.
    Fragment(Vec<HtmlNode>),
}

impl HtmlNode {
    /// Text node.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Raw markup node.
    #[must_use]
    pub fn raw(html: impl Into<String>) -> Self {
        Self::Raw(html.into())
    }

    /// Empty fragment.
    #[must_use]
    pub fn empty() -> Self {
        Self::Fragment(Vec::new())
    }

    /// Serialize the tree to an HTML string.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::with_capacity(1024);
        self.write_html(&mut out);
        out
    }

    /// Append this node's HTML to `out`.
    pub fn write_html(&self, out: &mut String) {
        match self {
            Self::Element(element) => element.write_html(out),
            Self::Text(text) => out.push_str(&html_escape::encode_text(text)),
            Self::Raw(html) => out.push_str(html),
            Self::Fragment(children) => {
                for child in children {
                    child.write_html(out);
                }
            }
        }
    }

    /// Depth-first search for elements with the given tag.
    #[must_use]
    pub fn find_all(&self, tag: &str) -> Vec<&HtmlElement> {
        let mut found = Vec::new();
        self.collect(tag, &mut found);
        found
    }

    fn collect<'a>(&'a self, tag: &str, found: &mut Vec<&'a HtmlElement>) {
        match self {
            Self::Element(element) => {
                if element.tag == tag {
                    found.push(element);
                }
                for child in &element.children {
                    child.collect(tag, found);
                }
            }
            Self::Fragment(children) => {
                for child in children {
                    child.collect(tag, found);
                }
            }
            Self::Text(_) | Self::Raw(_) => {}
        }
    }
}

impl From<HtmlElement> for HtmlNode {
    fn from(element: HtmlElement) -> Self {
        Self::Element(element)
    }
}

/// An HTML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlElement {
    tag: &'static str,
    attributes: Vec<(&'static str, String)>,
    children: Vec<HtmlNode>,
}

impl HtmlElement {
    /// Create an element.
    #[must_use]
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element tag.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Set an attribute, replacing an earlier value.
    #[must_use]
    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
        self
    }

    /// Set an attribute when `value` is present.
    #[must_use]
    pub fn attr_opt(self, name: &'static str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.attr(name, value),
            None => self,
        }
    }

    /// Set the `style` attribute, omitting it when the map is empty.
    #[must_use]
    pub fn style(self, styles: &StyleMap) -> Self {
        if styles.is_empty() {
            self
        } else {
            self.attr("style", styles.to_css())
        }
    }

    /// Set the `class` attribute, omitting it when empty.
    #[must_use]
    pub fn class(self, class: &str) -> Self {
        if class.trim().is_empty() {
            self
        } else {
            self.attr("class", class.trim())
        }
    }

    /// Attribute value, if set.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Append a child node.
    #[must_use]
    pub fn child(mut self, child: impl Into<HtmlNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several child nodes.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = HtmlNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Append an escaped text child.
    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(HtmlNode::Text(text.into()))
    }

    /// Child nodes.
    #[must_use]
    pub fn child_nodes(&self) -> &[HtmlNode] {
        &self.children
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag);
        for (name, value) in &self.attributes {
            let _ = write!(
                out,
                " {name}=\"{}\"",
                html_escape::encode_double_quoted_attribute(value)
            );
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&self.tag) {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }
}
