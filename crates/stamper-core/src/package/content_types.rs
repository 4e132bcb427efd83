use crate::error::Result;
use crate::xml::namespaces::CT;
use crate::xml::{builder, parser, XAttribute, XName, XmlDocument, XmlNodeData};
use std::collections::BTreeMap;

/// `[Content_Types].xml`: extension defaults plus per-part overrides.
/// Override keys are part names without the leading slash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentTypes {
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
}

impl ContentTypes {
    pub fn new() -> Self {
        let mut types = Self::default();
        types.add_default("rels", content_type_values::RELATIONSHIPS);
        types.add_default("xml", "application/xml");
        types
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let doc = parser::parse_bytes(bytes)?;
        let mut types = Self::default();
        let Some(root) = doc.root() else {
            return Ok(types);
        };
        for node in doc.child_elements(root) {
            let attr = |name: &str| doc.attribute(node, &XName::local(name));
            if doc.is(node, CT::NS, "Default") {
                if let (Some(ext), Some(ct)) = (attr("Extension"), attr("ContentType")) {
                    types.add_default(ext, ct);
                }
            } else if doc.is(node, CT::NS, "Override") {
                if let (Some(part), Some(ct)) = (attr("PartName"), attr("ContentType")) {
                    types.set_content_type(part, ct);
                }
            }
        }
        Ok(types)
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut doc = XmlDocument::new();
        let root = doc.add_root(XmlNodeData::element_with_attrs(
            CT::types(),
            vec![XAttribute::new(XName::local("xmlns"), CT::NS)],
        ));
        for (ext, ct) in &self.defaults {
            doc.add_child(
                root,
                XmlNodeData::element_with_attrs(
                    CT::default(),
                    vec![
                        XAttribute::new(XName::local("Extension"), ext),
                        XAttribute::new(XName::local("ContentType"), ct),
                    ],
                ),
            );
        }
        for (part, ct) in &self.overrides {
            doc.add_child(
                root,
                XmlNodeData::element_with_attrs(
                    CT::override_(),
                    vec![
                        XAttribute::new(XName::local("PartName"), &format!("/{part}")),
                        XAttribute::new(XName::local("ContentType"), ct),
                    ],
                ),
            );
        }
        builder::serialize_bytes(&doc)
    }

    pub fn get_content_type(&self, path: &str) -> Option<&str> {
        let path = path.trim_start_matches('/');
        if let Some(ct) = self.overrides.get(path) {
            return Some(ct);
        }
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        self.defaults.get(&ext).map(String::as_str)
    }

    pub fn set_content_type(&mut self, path: &str, content_type: &str) {
        self.overrides
            .insert(path.trim_start_matches('/').to_string(), content_type.to_string());
    }

    pub fn has_default(&self, extension: &str) -> bool {
        self.defaults.contains_key(&extension.to_ascii_lowercase())
    }

    pub fn add_default(&mut self, extension: &str, content_type: &str) {
        self.defaults
            .insert(extension.to_ascii_lowercase(), content_type.to_string());
    }
}

pub mod content_type_values {
    pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
    pub const WORD_DOCUMENT: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
    pub const WORD_COMMENTS: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml";
}
