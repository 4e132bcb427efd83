//! Relationship-bearing attributes and image parts.

use crate::package::OoxmlPackage;
use crate::xml::namespaces::R;
use crate::xml::{XName, XmlDocument};
use indextree::NodeId;

/// Attributes through which story content points at relationships.
fn relationship_attributes() -> [XName; 3] {
    [R::embed(), R::id(), R::link()]
}

/// Every (element, attribute, relationship id) reference in the subtree of `node`.
pub fn relationship_references(doc: &XmlDocument, node: NodeId) -> Vec<(NodeId, XName, String)> {
    let names = relationship_attributes();
    let mut refs = Vec::new();
    for element in doc.descendants(node) {
        let Some(attrs) = doc.get(element).and_then(|d| d.attributes()) else {
            continue;
        };
        for attr in attrs.iter().filter(|a| names.contains(&a.name)) {
            refs.push((element, attr.name.clone(), attr.value.clone()));
        }
    }
    refs
}

/// Identifies common raster formats by signature: (extension, content type).
pub fn sniff_image(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some(("png", "image/png"))
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(("jpeg", "image/jpeg"))
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some(("gif", "image/gif"))
    } else if bytes.starts_with(b"BM") {
        Some(("bmp", "image/bmp"))
    } else {
        None
    }
}

/// Pixel size from a PNG header (IHDR is always the first chunk).
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if !bytes.starts_with(b"\x89PNG\r\n\x1a\n") || bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes.get(16..20)?.try_into().ok()?);
    let height = u32::from_be_bytes(bytes.get(20..24)?.try_into().ok()?);
    Some((width, height))
}

/// Where newly rendered images of one story go: the package plus the part
/// whose relationships will reference them.
pub struct MediaSink<'a> {
    package: &'a mut OoxmlPackage,
    source: &'a str,
}

impl<'a> MediaSink<'a> {
    pub fn new(package: &'a mut OoxmlPackage, source: &'a str) -> Self {
        Self { package, source }
    }

    /// Adds an image part and returns the relationship id to embed.
    pub fn add_image(&mut self, bytes: Vec<u8>, extension: &str, content_type: &str) -> String {
        self.package
            .add_image(self.source, bytes, extension, content_type)
    }

    pub fn source(&self) -> &str {
        self.source
    }
}
