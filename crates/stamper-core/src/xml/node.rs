use super::xname::{XAttribute, XName};

#[derive(Clone, Debug, PartialEq)]
pub enum XmlNodeData {
    Element {
        name: XName,
        attributes: Vec<XAttribute>,
    },
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

impl XmlNodeData {
    pub fn element(name: XName) -> Self {
        Self::Element {
            name,
            attributes: Vec::new(),
        }
    }

    pub fn element_with_attrs(name: XName, attributes: Vec<XAttribute>) -> Self {
        Self::Element { name, attributes }
    }

    pub fn text(content: &str) -> Self {
        Self::Text(content.to_string())
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_) | Self::CData(_))
    }

    pub fn name(&self) -> Option<&XName> {
        match self {
            Self::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// True for an element named `local` in namespace `ns`.
    pub fn is_named(&self, ns: &str, local: &str) -> bool {
        self.name().is_some_and(|n| n.is(ns, local))
    }

    pub fn attributes(&self) -> Option<&[XAttribute]> {
        match self {
            Self::Element { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    pub fn attributes_mut(&mut self) -> Option<&mut Vec<XAttribute>> {
        match self {
            Self::Element { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &XName) -> Option<&str> {
        self.attributes()?
            .iter()
            .find(|a| &a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn text_content(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::CData(s) => Some(s),
            _ => None,
        }
    }
}
