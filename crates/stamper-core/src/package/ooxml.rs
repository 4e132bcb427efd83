use crate::error::{Result, StampError};
use crate::hash::sha256_hash_bytes;
use crate::xml::XmlDocument;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use tracing::debug;
use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use super::content_types::ContentTypes;
use super::relationships::{
    parse_relationships, relationship_types, rels_path_for, relative_target, resolve_target,
    source_for_rels_path, write_relationships, Relationship,
};

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// An OPC package held fully in memory. Relationship parts and the content
/// types part are parsed on open and regenerated on save; every other part
/// is kept as raw bytes.
#[derive(Debug, Clone)]
pub struct OoxmlPackage {
    parts: HashMap<String, Vec<u8>>,
    content_types: ContentTypes,
    /// Keyed by source part name; the package itself is "".
    relationships: HashMap<String, Vec<Relationship>>,
}

impl OoxmlPackage {
    pub fn new() -> Self {
        Self {
            parts: HashMap::new(),
            content_types: ContentTypes::new(),
            relationships: HashMap::new(),
        }
    }

    pub fn open(bytes: &[u8]) -> Result<Self> {
        let cursor = Cursor::new(bytes);
        let mut archive = ZipArchive::new(cursor)?;

        let mut package = Self::new();
        let mut saw_content_types = false;

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut content = Vec::new();
            file.read_to_end(&mut content)?;

            if name == CONTENT_TYPES_PART {
                package.content_types = ContentTypes::parse(&content)?;
                saw_content_types = true;
            } else if let Some(source) = source_for_rels_path(&name) {
                package.relationships.insert(source, parse_relationships(&content)?);
            } else {
                package.parts.insert(name, content);
            }
        }

        if !saw_content_types {
            return Err(StampError::InvalidPackage {
                message: format!("missing {CONTENT_TYPES_PART}"),
            });
        }

        Ok(package)
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        let mut writer = ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        writer.start_file(CONTENT_TYPES_PART, options)?;
        writer.write_all(&self.content_types.to_xml()?)?;

        let mut sources: Vec<&String> = self.relationships.keys().collect();
        sources.sort();
        for source in sources {
            let rels = &self.relationships[source];
            if rels.is_empty() {
                continue;
            }
            writer.start_file(rels_path_for(source), options)?;
            writer.write_all(&write_relationships(rels)?)?;
        }

        let mut names: Vec<&String> = self.parts.keys().collect();
        names.sort();
        for path in names {
            writer.start_file(path.as_str(), options)?;
            writer.write_all(&self.parts[path])?;
        }

        writer.finish()?;
        Ok(buffer.into_inner())
    }

    pub fn get_part(&self, path: &str) -> Option<&[u8]> {
        self.parts.get(path).map(|v| v.as_slice())
    }

    pub fn has_part(&self, path: &str) -> bool {
        self.parts.contains_key(path)
    }

    pub fn get_xml_part(&self, path: &str) -> Result<XmlDocument> {
        let bytes = self.get_part(path).ok_or_else(|| StampError::MissingPart {
            part_path: path.to_string(),
            document_type: "OOXML".to_string(),
        })?;
        crate::xml::parser::parse_bytes(bytes)
    }

    pub fn set_part(&mut self, path: &str, content: Vec<u8>) {
        self.parts.insert(path.to_string(), content);
    }

    pub fn put_xml_part(&mut self, path: &str, doc: &XmlDocument) -> Result<()> {
        let bytes = crate::xml::builder::serialize_bytes(doc)?;
        self.set_part(path, bytes);
        Ok(())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &String> {
        self.parts.keys()
    }

    pub fn relationships(&self, source: &str) -> &[Relationship] {
        self.relationships
            .get(source)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn relationship(&self, source: &str, id: &str) -> Option<&Relationship> {
        self.relationships(source).iter().find(|r| r.id == id)
    }

    /// Package-absolute part name a relationship of `source` points at.
    pub fn relationship_target(&self, source: &str, id: &str) -> Option<String> {
        self.relationship(source, id)
            .filter(|r| !r.is_external())
            .map(|r| resolve_target(source, &r.target))
    }

    pub fn add_relationship(&mut self, source: &str, rel: Relationship) {
        self.relationships
            .entry(source.to_string())
            .or_default()
            .push(rel);
    }

    pub fn next_relationship_id(&self, source: &str) -> String {
        let highest = self
            .relationships(source)
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", highest + 1)
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    pub fn content_types_mut(&mut self) -> &mut ContentTypes {
        &mut self.content_types
    }

    pub fn get_content_type(&self, path: &str) -> Option<&str> {
        self.content_types.get_content_type(path)
    }

    pub fn set_content_type(&mut self, path: &str, content_type: &str) {
        self.content_types.set_content_type(path, content_type);
    }

    /// Part name of the main story, taken from the package relationships.
    pub fn main_document_path(&self) -> Option<String> {
        self.relationships("")
            .iter()
            .find(|r| r.rel_type == relationship_types::OFFICE_DOCUMENT)
            .map(|r| resolve_target("", &r.target))
    }

    /// Registers `bytes` as an image part referenced from `source` and
    /// returns the relationship id to embed. Identical content already
    /// related to `source` is reused.
    pub fn add_image(
        &mut self,
        source: &str,
        bytes: Vec<u8>,
        extension: &str,
        content_type: &str,
    ) -> String {
        let digest = sha256_hash_bytes(&bytes);

        let existing = self
            .relationships(source)
            .iter()
            .filter(|r| r.rel_type == relationship_types::IMAGE && !r.is_external())
            .find(|r| {
                self.get_part(&resolve_target(source, &r.target))
                    .is_some_and(|data| sha256_hash_bytes(data) == digest)
            })
            .map(|r| r.id.clone());
        if let Some(id) = existing {
            debug!(source, rel_id = %id, "reusing identical image part");
            return id;
        }

        let media_dir = match source.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/media"),
            None => "media".to_string(),
        };
        let mut part_name = format!("{media_dir}/image-{}.{extension}", &digest[..12]);
        let mut counter = 1;
        while self
            .get_part(&part_name)
            .is_some_and(|data| sha256_hash_bytes(data) != digest)
        {
            part_name = format!("{media_dir}/image-{}-{counter}.{extension}", &digest[..12]);
            counter += 1;
        }

        if !self.content_types.has_default(extension) {
            self.content_types.add_default(extension, content_type);
        }
        self.set_part(&part_name, bytes);

        let id = self.next_relationship_id(source);
        let target = relative_target(source, &part_name);
        self.add_relationship(source, Relationship::new(&id, relationship_types::IMAGE, &target));
        debug!(source, part = %part_name, rel_id = %id, "added image part");
        id
    }
}

impl Default for OoxmlPackage {
    fn default() -> Self {
        Self::new()
    }
}
