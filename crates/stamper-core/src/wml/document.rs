use crate::error::{Result, StampError};
use crate::package::content_types::content_type_values;
use crate::package::relationships::{relationship_types, resolve_target};
use crate::package::{OoxmlPackage, Relationship};
use crate::xml::namespaces::W;
use crate::xml::{XmlDocument, XmlNodeData};
use indextree::NodeId;
use std::collections::HashMap;
use tracing::debug;

use super::media::{relationship_references, sniff_image, MediaSink};
use super::node::comment_id;

const DEFAULT_MAIN_PART: &str = "word/document.xml";
const DEFAULT_COMMENTS_PART: &str = "word/comments.xml";

/// A header or footer part.
#[derive(Debug, Clone)]
pub struct Story {
    pub path: String,
    pub tree: XmlDocument,
}

/// A WordprocessingML package with its main story, comments part and
/// header/footer stories parsed into arenas.
#[derive(Debug, Clone)]
pub struct WordDocument {
    package: OoxmlPackage,
    main_path: String,
    main: XmlDocument,
    comments_path: String,
    comments: Option<XmlDocument>,
    stories: Vec<Story>,
}

impl WordDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_package(OoxmlPackage::open(bytes)?)
    }

    pub fn from_package(package: OoxmlPackage) -> Result<Self> {
        let main_path = package
            .main_document_path()
            .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());
        let main = package.get_xml_part(&main_path)?;

        let related = |rel_type: &str| -> Vec<String> {
            package
                .relationships(&main_path)
                .iter()
                .filter(|r| r.rel_type == rel_type && !r.is_external())
                .map(|r| resolve_target(&main_path, &r.target))
                .collect()
        };

        let comments_path = related(relationship_types::COMMENTS)
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_COMMENTS_PART.to_string());
        let comments = if package.has_part(&comments_path) {
            Some(package.get_xml_part(&comments_path)?)
        } else {
            None
        };

        let mut stories = Vec::new();
        for path in related(relationship_types::HEADER)
            .into_iter()
            .chain(related(relationship_types::FOOTER))
        {
            if package.has_part(&path) {
                let tree = package.get_xml_part(&path)?;
                stories.push(Story { path, tree });
            }
        }

        debug!(main = %main_path, stories = stories.len(), has_comments = comments.is_some(), "loaded document");
        Ok(Self {
            package,
            main_path,
            main,
            comments_path,
            comments,
            stories,
        })
    }

    /// Minimal package around a main story and an optional comments part.
    pub fn from_parts(main_xml: &str, comments_xml: Option<&str>) -> Result<Self> {
        let mut package = OoxmlPackage::new();
        package.set_part(DEFAULT_MAIN_PART, main_xml.as_bytes().to_vec());
        package.set_content_type(DEFAULT_MAIN_PART, content_type_values::WORD_DOCUMENT);
        package.add_relationship(
            "",
            Relationship::new("rId1", relationship_types::OFFICE_DOCUMENT, DEFAULT_MAIN_PART),
        );
        if let Some(comments) = comments_xml {
            package.set_part(DEFAULT_COMMENTS_PART, comments.as_bytes().to_vec());
            package.set_content_type(DEFAULT_COMMENTS_PART, content_type_values::WORD_COMMENTS);
            package.add_relationship(
                DEFAULT_MAIN_PART,
                Relationship::new("rId1", relationship_types::COMMENTS, "comments.xml"),
            );
        }
        Self::from_package(package)
    }

    /// Writes the current trees back into a copy of the package.
    pub fn to_package(&self) -> Result<OoxmlPackage> {
        let mut package = self.package.clone();
        package.put_xml_part(&self.main_path, &self.main)?;
        if let Some(comments) = &self.comments {
            package.put_xml_part(&self.comments_path, comments)?;
        }
        for story in &self.stories {
            package.put_xml_part(&story.path, &story.tree)?;
        }
        Ok(package)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_package()?.save()
    }

    pub fn package(&self) -> &OoxmlPackage {
        &self.package
    }

    pub fn main_path(&self) -> &str {
        &self.main_path
    }

    pub fn main(&self) -> &XmlDocument {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut XmlDocument {
        &mut self.main
    }

    /// The main story tree together with a sink for images it references.
    pub fn main_with_media(&mut self) -> (&mut XmlDocument, MediaSink<'_>) {
        (&mut self.main, MediaSink::new(&mut self.package, &self.main_path))
    }

    pub fn comments(&self) -> Option<&XmlDocument> {
        self.comments.as_ref()
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    /// Header/footer trees each with a sink for their own relationships.
    pub fn stories_with_media(&mut self) -> (Vec<&mut Story>, &mut OoxmlPackage) {
        (self.stories.iter_mut().collect(), &mut self.package)
    }

    pub fn body(&self) -> Option<NodeId> {
        let root = self.main.root()?;
        self.main.first_child_named(root, &W::body())
    }

    /// Removes the `w:comment` entry with the given id from the comments part.
    pub fn remove_comment(&mut self, id: i64) {
        let Some(comments) = self.comments.as_mut() else {
            return;
        };
        let Some(root) = comments.root() else {
            return;
        };
        let doomed: Vec<NodeId> = comments
            .elements_by_name(root, &W::comment())
            .filter(|&c| comment_id(comments, c) == Some(id))
            .collect();
        for node in doomed {
            comments.remove(node);
        }
    }

    /// Drops spelling and grammar markers from the main story.
    pub fn remove_proof_errors(&mut self) {
        let Some(root) = self.main.root() else {
            return;
        };
        let markers: Vec<NodeId> = self
            .main
            .descendants(root)
            .filter(|&n| self.main.is(n, W::NS, "proofErr"))
            .collect();
        debug!(count = markers.len(), "removing proof error markers");
        for marker in markers {
            self.main.remove(marker);
        }
    }

    /// Builds a standalone document whose body holds copies of `nodes` and
    /// whose comments part holds copies of `comment_elements`. Relationships
    /// referenced from the copies come along under the same ids, image parts
    /// included.
    pub fn sub_document(&self, nodes: &[NodeId], comment_elements: &[NodeId]) -> Result<Self> {
        let mut main = XmlDocument::new();
        let root_data = self
            .main
            .root()
            .and_then(|r| self.main.get(r))
            .cloned()
            .unwrap_or_else(|| XmlNodeData::element(W::document()));
        let root = main.add_root(root_data);
        let body = main.add_child(root, XmlNodeData::element(W::body()));
        for &node in nodes {
            let copy = main.import_subtree(&self.main, node)?;
            main.append(body, copy);
        }

        let mut comments = XmlDocument::new();
        let comments_root_data = self
            .comments
            .as_ref()
            .and_then(|c| c.root().and_then(|r| c.get(r)))
            .cloned()
            .unwrap_or_else(|| XmlNodeData::element(W::comments()));
        let comments_root = comments.add_root(comments_root_data);
        if let Some(source) = &self.comments {
            for &element in comment_elements {
                let copy = comments.import_subtree(source, element)?;
                comments.append(comments_root, copy);
            }
        }

        let mut package = OoxmlPackage::new();
        package.add_relationship(
            "",
            Relationship::new("rId1", relationship_types::OFFICE_DOCUMENT, DEFAULT_MAIN_PART),
        );
        *package.content_types_mut() = self.package.content_types().clone();
        package.set_content_type(DEFAULT_MAIN_PART, content_type_values::WORD_DOCUMENT);
        package.set_content_type(DEFAULT_COMMENTS_PART, content_type_values::WORD_COMMENTS);

        let mut copied: Vec<String> = Vec::new();
        for (_, _, id) in relationship_references(&main, body) {
            if copied.contains(&id) {
                continue;
            }
            let Some(rel) = self.package.relationship(&self.main_path, &id) else {
                continue;
            };
            if !rel.is_external() {
                let part = resolve_target(&self.main_path, &rel.target);
                if let Some(bytes) = self.package.get_part(&part) {
                    let local = resolve_target(DEFAULT_MAIN_PART, &rel.target);
                    package.set_part(&local, bytes.to_vec());
                }
            }
            package.add_relationship(DEFAULT_MAIN_PART, rel.clone());
            copied.push(id);
        }
        let comments_id = package.next_relationship_id(DEFAULT_MAIN_PART);
        package.add_relationship(
            DEFAULT_MAIN_PART,
            Relationship::new(&comments_id, relationship_types::COMMENTS, "comments.xml"),
        );

        debug!(nodes = nodes.len(), comments = comment_elements.len(), relationships = copied.len(), "built sub-document");
        Ok(Self {
            package,
            main_path: DEFAULT_MAIN_PART.to_string(),
            main,
            comments_path: DEFAULT_COMMENTS_PART.to_string(),
            comments: Some(comments),
            stories: Vec::new(),
        })
    }

    /// Imports the body content of `sub` as detached nodes of this main story.
    /// A trailing body-level section break is left behind. Images are
    /// re-registered here (identical content is shared) and every
    /// relationship id in the copies is rewritten to this package.
    pub fn import_body(&mut self, sub: &WordDocument) -> Result<Vec<NodeId>> {
        let Some(sub_body) = sub.body() else {
            return Err(StampError::MissingPart {
                part_path: sub.main_path.clone(),
                document_type: "sub-document body of a".to_string(),
            });
        };

        let mut imported = Vec::new();
        for child in sub.main.child_elements(sub_body) {
            if sub.main.is(child, W::NS, "sectPr") {
                continue;
            }
            imported.push(self.main.import_subtree(&sub.main, child)?);
        }

        let mut remapped: HashMap<String, String> = HashMap::new();
        for &node in &imported {
            for (element, attr, id) in relationship_references(&self.main, node) {
                let new_id = match remapped.get(&id) {
                    Some(new_id) => new_id.clone(),
                    None => {
                        let new_id = self.adopt_relationship(sub, &id);
                        remapped.insert(id.clone(), new_id.clone());
                        new_id
                    }
                };
                if new_id != id {
                    self.main.set_attribute(element, &attr, &new_id);
                }
            }
        }
        Ok(imported)
    }

    /// Makes relationship `id` of `sub`'s main story available here and
    /// returns the id under which it is known in this package.
    fn adopt_relationship(&mut self, sub: &WordDocument, id: &str) -> String {
        let Some(rel) = sub.package.relationship(&sub.main_path, id) else {
            return id.to_string();
        };

        if rel.rel_type == relationship_types::IMAGE && !rel.is_external() {
            let part = resolve_target(&sub.main_path, &rel.target);
            if let Some(bytes) = sub.package.get_part(&part) {
                let (ext, content_type) = match sniff_image(bytes) {
                    Some((ext, ct)) => (ext.to_string(), ct.to_string()),
                    None => (
                        part.rsplit_once('.').map_or("bin", |(_, e)| e).to_string(),
                        sub.package
                            .get_content_type(&part)
                            .unwrap_or("application/octet-stream")
                            .to_string(),
                    ),
                };
                return self
                    .package
                    .add_image(&self.main_path, bytes.to_vec(), &ext, &content_type);
            }
        }

        let same = self
            .package
            .relationship(&self.main_path, id)
            .is_some_and(|mine| mine.rel_type == rel.rel_type && mine.target == rel.target);
        if same {
            return id.to_string();
        }
        let new_id = self.package.next_relationship_id(&self.main_path);
        let mut adopted = rel.clone();
        adopted.id = new_id.clone();
        self.package.add_relationship(&self.main_path, adopted);
        new_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::builder::serialize;

    const MAIN: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><w:body><w:p><w:r><w:t>one</w:t></w:r></w:p><w:p><w:r><w:drawing><a:blip r:embed="rId5"/></w:drawing></w:r></w:p><w:sectPr/></w:body></w:document>"#;
    const COMMENTS: &str = r#"<w:comments xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:comment w:id="0"><w:p/></w:comment><w:comment w:id="1"><w:p/></w:comment></w:comments>"#;
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nrest";

    fn with_image() -> WordDocument {
        let mut doc = WordDocument::from_parts(MAIN, Some(COMMENTS)).unwrap();
        doc.package.set_part("word/media/image1.png", PNG.to_vec());
        doc.package.add_relationship(
            DEFAULT_MAIN_PART,
            Relationship::new("rId5", relationship_types::IMAGE, "media/image1.png"),
        );
        doc
    }

    #[test]
    fn round_trips_through_bytes() {
        let doc = WordDocument::from_parts(MAIN, Some(COMMENTS)).unwrap();
        let reloaded = WordDocument::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(serialize(reloaded.main()).unwrap(), serialize(doc.main()).unwrap());
        assert!(reloaded.comments().is_some());
        assert!(reloaded.body().is_some());
    }

    #[test]
    fn remove_comment_drops_entry() {
        let mut doc = WordDocument::from_parts(MAIN, Some(COMMENTS)).unwrap();
        doc.remove_comment(0);
        let comments = doc.comments().unwrap();
        let root = comments.root().unwrap();
        let ids: Vec<_> = comments
            .child_elements(root)
            .filter_map(|c| comment_id(comments, c))
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn sub_document_carries_images_and_comments() {
        let doc = with_image();
        let body = doc.body().unwrap();
        let paragraphs: Vec<_> = doc.main().child_elements(body).take(2).collect();
        let comments = doc.comments().unwrap();
        let first_comment = comments.child_elements(comments.root().unwrap()).next().unwrap();

        let sub = doc.sub_document(&paragraphs, &[first_comment]).unwrap();
        assert_eq!(sub.main().text(sub.body().unwrap()), "one");
        assert_eq!(
            sub.package().relationship_target(DEFAULT_MAIN_PART, "rId5").as_deref(),
            Some("word/media/image1.png")
        );
        assert_eq!(sub.package().get_part("word/media/image1.png"), Some(PNG));
        let sub_comments = sub.comments().unwrap();
        assert_eq!(sub_comments.child_elements(sub_comments.root().unwrap()).count(), 1);
    }

    #[test]
    fn import_body_reuses_identical_images_and_skips_section() {
        let mut doc = with_image();
        let body = doc.body().unwrap();
        let all: Vec<_> = doc.main().child_elements(body).collect();
        let mut sub = doc.sub_document(&all, &[]).unwrap();

        let extra: &[u8] = b"\x89PNG\r\n\x1a\nother";
        let new_id = sub.package.add_image(DEFAULT_MAIN_PART, extra.to_vec(), "png", "image/png");
        let sub_body = sub.body().unwrap();
        let p = sub.main.add_child(sub_body, XmlNodeData::element(W::p()));
        let blip = sub.main.add_child(p, XmlNodeData::element(crate::xml::A::blip()));
        sub.main.set_attribute(blip, &crate::xml::R::embed(), &new_id);

        let imported = doc.import_body(&sub).unwrap();
        // both original paragraphs and the new one; the body sectPr stays behind
        assert_eq!(imported.len(), 3);
        let embeds: Vec<String> = imported
            .iter()
            .flat_map(|&n| relationship_references(doc.main(), n))
            .map(|(_, _, id)| id)
            .collect();
        assert_eq!(embeds[0], "rId5");
        assert_ne!(embeds[1], "rId5");
        let target = doc.package().relationship_target(DEFAULT_MAIN_PART, &embeds[1]).unwrap();
        assert_eq!(doc.package().get_part(&target), Some(extra));
    }
}
