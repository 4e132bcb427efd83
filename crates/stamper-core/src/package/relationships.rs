use crate::error::Result;
use crate::xml::namespaces::PKG_REL;
use crate::xml::{parser, builder, XAttribute, XName, XmlDocument, XmlNodeData};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TargetMode {
    #[default]
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    #[serde(default)]
    pub target_mode: TargetMode,
}

impl Relationship {
    pub fn new(id: &str, rel_type: &str, target: &str) -> Self {
        Self {
            id: id.to_string(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode: TargetMode::Internal,
        }
    }

    pub fn is_external(&self) -> bool {
        self.target_mode == TargetMode::External
    }
}

pub mod relationship_types {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const COMMENTS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
    pub const HEADER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
    pub const FOOTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`; the package
/// itself (empty source) -> `_rels/.rels`.
pub fn rels_path_for(source: &str) -> String {
    match source.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{source}.rels"),
    }
}

/// Inverse of [`rels_path_for`]. Returns `None` for non-relationship parts.
pub fn source_for_rels_path(rels_path: &str) -> Option<String> {
    let without_ext = rels_path.strip_suffix(".rels")?;
    let (dir, file) = match without_ext.rsplit_once('/') {
        Some((dir, file)) => (dir, file),
        None => return None,
    };
    let base = dir.strip_suffix("_rels")?;
    Some(format!("{base}{file}"))
}

/// Resolves a relationship target relative to the directory of its source part.
pub fn resolve_target(source: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Target for `part` as written in the relationships of `source`.
pub fn relative_target(source: &str, part: &str) -> String {
    match source.rsplit_once('/') {
        Some((dir, _)) => part
            .strip_prefix(dir)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
            .unwrap_or_else(|| format!("/{part}")),
        None => part.to_string(),
    }
}

pub fn parse_relationships(bytes: &[u8]) -> Result<Vec<Relationship>> {
    let doc = parser::parse_bytes(bytes)?;
    let Some(root) = doc.root() else {
        return Ok(Vec::new());
    };
    let attr = |node, name: &str| doc.attribute(node, &XName::local(name)).unwrap_or_default().to_string();

    Ok(doc
        .elements_by_name(root, &PKG_REL::relationship())
        .map(|node| Relationship {
            id: attr(node, "Id"),
            rel_type: attr(node, "Type"),
            target: attr(node, "Target"),
            target_mode: match doc.attribute(node, &XName::local("TargetMode")) {
                Some("External") => TargetMode::External,
                _ => TargetMode::Internal,
            },
        })
        .collect())
}

pub fn write_relationships(rels: &[Relationship]) -> Result<Vec<u8>> {
    let mut doc = XmlDocument::new();
    let root = doc.add_root(XmlNodeData::element_with_attrs(
        PKG_REL::relationships(),
        vec![XAttribute::new(XName::local("xmlns"), PKG_REL::NS)],
    ));
    for rel in rels {
        let mut attrs = vec![
            XAttribute::new(XName::local("Id"), &rel.id),
            XAttribute::new(XName::local("Type"), &rel.rel_type),
            XAttribute::new(XName::local("Target"), &rel.target),
        ];
        if rel.is_external() {
            attrs.push(XAttribute::new(XName::local("TargetMode"), "External"));
        }
        doc.add_child(
            root,
            XmlNodeData::element_with_attrs(PKG_REL::relationship(), attrs),
        );
    }
    builder::serialize_bytes(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rels_paths_map_both_ways() {
        assert_eq!(rels_path_for("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_path_for(""), "_rels/.rels");
        assert_eq!(
            source_for_rels_path("word/_rels/document.xml.rels").as_deref(),
            Some("word/document.xml")
        );
        assert_eq!(source_for_rels_path("_rels/.rels").as_deref(), Some(""));
        assert_eq!(source_for_rels_path("word/document.xml"), None);
    }

    #[test]
    fn targets_resolve_relative_to_source_directory() {
        assert_eq!(resolve_target("word/document.xml", "media/image1.png"), "word/media/image1.png");
        assert_eq!(resolve_target("word/document.xml", "../customXml/item1.xml"), "customXml/item1.xml");
        assert_eq!(resolve_target("", "word/document.xml"), "word/document.xml");
        assert_eq!(resolve_target("word/document.xml", "/word/x.xml"), "word/x.xml");
        assert_eq!(relative_target("word/header1.xml", "word/media/a.png"), "media/a.png");
    }

    #[test]
    fn relationships_round_trip_through_xml() {
        let rels = vec![
            Relationship::new("rId1", relationship_types::IMAGE, "media/image1.png"),
            Relationship {
                id: "rId2".to_string(),
                rel_type: "http://example.com/link".to_string(),
                target: "https://example.com".to_string(),
                target_mode: TargetMode::External,
            },
        ];
        let bytes = write_relationships(&rels).unwrap();
        assert_eq!(parse_relationships(&bytes).unwrap(), rels);
    }
}
