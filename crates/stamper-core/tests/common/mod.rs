//! Template builders shared by the integration tests.

#![allow(dead_code)]

use stamper_core::package::{relationship_types, Relationship};
use stamper_core::wml::node::is_paragraph;
use stamper_core::wml::{paragraph_text, WordDocument};
use stamper_core::xml::builder::serialize;
use stamper_core::xml::XmlDocument;
use indextree::NodeId;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

pub fn main_xml(body: &str) -> String {
    format!(r#"<w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#)
}

pub fn comments_xml(entries: &[(i64, &str)]) -> String {
    let comments: String = entries
        .iter()
        .map(|(id, text)| {
            format!(r#"<w:comment w:id="{id}"><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:comment>"#)
        })
        .collect();
    format!(r#"<w:comments xmlns:w="{W_NS}">{comments}</w:comments>"#)
}

/// A paragraph with a single plain run.
pub fn p(text: &str) -> String {
    format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
}

/// Paragraphs covered by comment `id`, from the start of the first to the
/// end of the last, with the reference run after the range end.
pub fn commented(id: i64, texts: &[&str]) -> String {
    let last = texts.len().saturating_sub(1);
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let start = if i == 0 {
                format!(r#"<w:commentRangeStart w:id="{id}"/>"#)
            } else {
                String::new()
            };
            let end = if i == last {
                format!(r#"<w:commentRangeEnd w:id="{id}"/><w:r><w:commentReference w:id="{id}"/></w:r>"#)
            } else {
                String::new()
            };
            format!("<w:p>{start}<w:r><w:t>{text}</w:t></w:r>{end}</w:p>")
        })
        .collect()
}

pub fn template(body: &str, comments: &[(i64, &str)]) -> WordDocument {
    let comments = (!comments.is_empty()).then(|| comments_xml(comments));
    WordDocument::from_parts(&main_xml(body), comments.as_deref()).expect("template parses")
}

/// Template whose main story links a header part.
pub fn with_header(body: &str, header_xml: &str) -> WordDocument {
    let mut package = template(body, &[]).to_package().expect("package");
    package.set_part("word/header1.xml", header_xml.as_bytes().to_vec());
    package.add_relationship(
        "word/document.xml",
        Relationship::new("rId7", relationship_types::HEADER, "header1.xml"),
    );
    WordDocument::from_package(package).expect("template with header parses")
}

/// Text of each top-level paragraph of the body.
pub fn texts(doc: &WordDocument) -> Vec<String> {
    let main = doc.main();
    let body = doc.body().expect("body");
    main.child_elements(body)
        .filter(|&n| is_paragraph(main, n))
        .map(|n| paragraph_text(main, n).text)
        .collect()
}

pub fn top_level(doc: &WordDocument) -> Vec<NodeId> {
    let body = doc.body().expect("body");
    doc.main().child_elements(body).collect()
}

pub fn count(doc: &XmlDocument, local: &str) -> usize {
    let Some(root) = doc.root() else {
        return 0;
    };
    doc.descendants(root).filter(|&n| doc.is(n, W_NS, local)).count()
}

pub fn xml(doc: &WordDocument) -> String {
    serialize(doc.main()).expect("serializes")
}

/// Number of `w:comment` entries left in the comments part.
pub fn comment_entries(doc: &WordDocument) -> usize {
    doc.comments().map_or(0, |c| count(c, "comment"))
}
