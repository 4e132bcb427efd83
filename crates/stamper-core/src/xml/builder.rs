use super::arena::XmlDocument;
use super::namespaces::{XML, XMLNS};
use super::node::XmlNodeData;
use super::xname::{XAttribute, XName};
use crate::error::{Result, StampError};
use indextree::NodeId;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::HashMap;
use std::io::Cursor;

/// namespace URI -> prefix ("" for the default namespace)
type NamespaceMap = HashMap<String, String>;

fn write_err(e: impl std::fmt::Display) -> StampError {
    StampError::XmlWrite(e.to_string())
}

pub fn serialize(doc: &XmlDocument) -> Result<String> {
    let bytes = serialize_bytes(doc)?;
    String::from_utf8(bytes).map_err(write_err)
}

pub fn serialize_bytes(doc: &XmlDocument) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(write_err)?;

    if let Some(root_id) = doc.root() {
        write_node(doc, root_id, &mut writer, &NamespaceMap::new())?;
    }

    Ok(writer.into_inner().into_inner())
}

/// Serializes one subtree without an XML declaration. Namespaces declared on
/// ancestors are redeclared on the subtree root.
pub fn serialize_subtree(doc: &XmlDocument, node_id: NodeId) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut inherited = NamespaceMap::new();
    let ancestors: Vec<NodeId> = doc.ancestors(node_id).skip(1).collect();
    for ancestor in ancestors.into_iter().rev() {
        if let Some(attrs) = doc.get(ancestor).and_then(|d| d.attributes()) {
            extend_namespace_map(&mut inherited, attrs);
        }
    }

    match doc.get(node_id) {
        Some(XmlNodeData::Element { name, attributes }) => {
            let mut attributes = attributes.clone();
            for (uri, prefix) in &inherited {
                let declared = attributes
                    .iter()
                    .any(|a| a.is_namespace_declaration() && &a.value == uri);
                if !declared {
                    attributes.push(declaration(prefix, uri));
                }
            }
            write_element(doc, node_id, name, &attributes, &mut writer, &NamespaceMap::new())?;
        }
        Some(_) => write_node(doc, node_id, &mut writer, &inherited)?,
        None => {}
    }

    String::from_utf8(writer.into_inner().into_inner()).map_err(write_err)
}

fn declaration(prefix: &str, uri: &str) -> XAttribute {
    if prefix.is_empty() {
        XAttribute::new(XName::local("xmlns"), uri)
    } else {
        XAttribute::new(XMLNS::prefix(prefix), uri)
    }
}

fn extend_namespace_map(namespace_map: &mut NamespaceMap, attributes: &[XAttribute]) {
    for attr in attributes.iter().filter(|a| a.is_namespace_declaration()) {
        let prefix = match &attr.name.namespace {
            Some(_) => attr.name.local_name.clone(),
            None => String::new(),
        };
        namespace_map.insert(attr.value.clone(), prefix);
    }
}

/// Resolves the prefix for `namespace`, declaring it on the element being
/// written when nothing in scope binds it.
fn ensure_prefix(
    namespace: &str,
    scoped: &mut NamespaceMap,
    declarations: &mut Vec<XAttribute>,
    for_attribute: bool,
) -> String {
    if namespace == XML::NS {
        return "xml".to_string();
    }
    if namespace == XMLNS::NS {
        return "xmlns".to_string();
    }
    if let Some(prefix) = scoped.get(namespace) {
        // Unprefixed attributes are never in the default namespace.
        if !(for_attribute && prefix.is_empty()) {
            return prefix.clone();
        }
    }

    let mut prefix = well_known_prefix(namespace)
        .map(str::to_string)
        .unwrap_or_else(|| format!("ns{}", scoped.len()));
    while scoped.values().any(|p| p == &prefix) {
        prefix.push('_');
    }
    scoped.insert(namespace.to_string(), prefix.clone());
    declarations.push(declaration(&prefix, namespace));
    prefix
}

fn qualified(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{prefix}:{local}")
    }
}

fn write_node<W: std::io::Write>(
    doc: &XmlDocument,
    node_id: NodeId,
    writer: &mut Writer<W>,
    namespace_map: &NamespaceMap,
) -> Result<()> {
    let Some(node_data) = doc.get(node_id) else {
        return Ok(());
    };

    let event = match node_data {
        XmlNodeData::Element { name, attributes } => {
            return write_element(doc, node_id, name, attributes, writer, namespace_map);
        }
        XmlNodeData::Text(text) => Event::Text(BytesText::new(text)),
        XmlNodeData::CData(text) => Event::CData(BytesCData::new(text)),
        XmlNodeData::Comment(text) => Event::Comment(BytesText::new(text)),
        XmlNodeData::ProcessingInstruction { target, data } => {
            let content = if data.is_empty() {
                target.clone()
            } else {
                format!("{target} {data}")
            };
            return writer
                .write_event(Event::PI(BytesPI::new(&content)))
                .map(|_| ())
                .map_err(write_err);
        }
    };
    writer.write_event(event).map_err(write_err)?;
    Ok(())
}

fn write_element<W: std::io::Write>(
    doc: &XmlDocument,
    node_id: NodeId,
    name: &XName,
    attributes: &[XAttribute],
    writer: &mut Writer<W>,
    namespace_map: &NamespaceMap,
) -> Result<()> {
    let mut scoped = namespace_map.clone();
    extend_namespace_map(&mut scoped, attributes);
    let mut declarations = Vec::new();

    let tag_name = match &name.namespace {
        Some(ns) => qualified(
            &ensure_prefix(ns, &mut scoped, &mut declarations, false),
            &name.local_name,
        ),
        None => name.local_name.clone(),
    };

    let mut rendered: Vec<(String, &str)> = Vec::with_capacity(attributes.len());
    for attr in attributes {
        let attr_name = match &attr.name.namespace {
            Some(ns) => qualified(
                &ensure_prefix(ns, &mut scoped, &mut declarations, true),
                &attr.name.local_name,
            ),
            None => attr.name.local_name.clone(),
        };
        rendered.push((attr_name, attr.value.as_str()));
    }

    let mut elem = BytesStart::new(tag_name.as_str());
    for decl in &declarations {
        let decl_name = match &decl.name.namespace {
            Some(_) => qualified("xmlns", &decl.name.local_name),
            None => "xmlns".to_string(),
        };
        elem.push_attribute((decl_name.as_str(), decl.value.as_str()));
    }
    for (attr_name, value) in &rendered {
        elem.push_attribute((attr_name.as_str(), *value));
    }

    let mut children = doc.children(node_id).peekable();
    if children.peek().is_none() {
        writer.write_event(Event::Empty(elem)).map_err(write_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(elem)).map_err(write_err)?;
    for child_id in children {
        write_node(doc, child_id, writer, &scoped)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(tag_name.as_str())))
        .map_err(write_err)?;
    Ok(())
}

fn well_known_prefix(namespace: &str) -> Option<&'static str> {
    let prefix = match namespace {
        "http://schemas.openxmlformats.org/wordprocessingml/2006/main" => "w",
        "http://schemas.microsoft.com/office/word/2010/wordml" => "w14",
        "http://schemas.microsoft.com/office/word/2012/wordml" => "w15",
        "http://schemas.microsoft.com/office/word/2010/wordprocessingShape" => "wps",
        "http://schemas.microsoft.com/office/word/2010/wordprocessingDrawing" => "wp14",
        "http://schemas.openxmlformats.org/drawingml/2006/main" => "a",
        "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" => "wp",
        "http://schemas.openxmlformats.org/drawingml/2006/picture" => "pic",
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships" => "r",
        "http://schemas.openxmlformats.org/officeDocument/2006/math" => "m",
        "http://schemas.openxmlformats.org/markup-compatibility/2006" => "mc",
        "urn:schemas-microsoft-com:vml" => "v",
        "urn:schemas-microsoft-com:office:office" => "o",
        _ => return None,
    };
    Some(prefix)
}
