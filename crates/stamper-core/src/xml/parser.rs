use super::arena::XmlDocument;
use super::namespaces::XMLNS;
use super::node::XmlNodeData;
use super::xname::{XAttribute, XName};
use crate::error::{Result, StampError};
use indextree::NodeId;

pub fn parse(xml: &str) -> Result<XmlDocument> {
    let doc = roxmltree::Document::parse_with_options(
        xml,
        roxmltree::ParsingOptions {
            allow_dtd: true,
            ..Default::default()
        },
    )
    .map_err(|e| StampError::XmlParse {
        message: e.to_string(),
        location: format!("line {}", e.pos().row),
    })?;

    let mut xml_doc = XmlDocument::new();
    build_tree(doc.root_element(), &mut xml_doc, None);
    Ok(xml_doc)
}

pub fn parse_bytes(bytes: &[u8]) -> Result<XmlDocument> {
    // Parts written by some producers carry a UTF-8 byte order mark.
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|e| StampError::XmlParse {
        message: e.to_string(),
        location: "input".to_string(),
    })?;
    parse(text)
}

fn element_data(node: roxmltree::Node) -> XmlNodeData {
    let name = XName::new(
        node.tag_name().namespace().unwrap_or(""),
        node.tag_name().name(),
    );

    let mut attributes: Vec<XAttribute> = node
        .attributes()
        .map(|attr| {
            XAttribute::new(
                XName::new(attr.namespace().unwrap_or(""), attr.name()),
                attr.value(),
            )
        })
        .collect();

    // roxmltree reports every namespace in scope; keep only the ones this
    // element introduces so serialization does not redeclare them everywhere.
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    for ns in node.namespaces() {
        if ns.name() == Some("xml") || inherited.contains(&(ns.name(), ns.uri())) {
            continue;
        }
        let attr_name = match ns.name() {
            Some(prefix) => XMLNS::prefix(prefix),
            None => XName::local("xmlns"),
        };
        attributes.push(XAttribute::new(attr_name, ns.uri()));
    }

    XmlNodeData::Element { name, attributes }
}

fn build_tree(node: roxmltree::Node, doc: &mut XmlDocument, parent: Option<NodeId>) {
    let node_data = match node.node_type() {
        roxmltree::NodeType::Element => element_data(node),
        roxmltree::NodeType::Text => match node.text() {
            Some(text) => XmlNodeData::Text(text.to_string()),
            None => return,
        },
        roxmltree::NodeType::Comment => match node.text() {
            Some(text) => XmlNodeData::Comment(text.to_string()),
            None => return,
        },
        roxmltree::NodeType::PI => match node.pi() {
            Some(pi) => XmlNodeData::ProcessingInstruction {
                target: pi.target.to_string(),
                data: pi.value.unwrap_or_default().to_string(),
            },
            None => return,
        },
        roxmltree::NodeType::Root => return,
    };

    let new_id = match parent {
        Some(parent_id) => doc.add_child(parent_id, node_data),
        None => doc.add_root(node_data),
    };

    for child in node.children() {
        build_tree(child, doc, Some(new_id));
    }
}
