//! Paragraph-level section breaks (`w:pPr/w:sectPr`).

use crate::error::Result;
use crate::xml::namespaces::W;
use crate::xml::{XmlDocument, XmlNodeData};
use indextree::NodeId;

use super::node::is_paragraph;

/// A captured `w:sectPr` subtree. It may be detached from the tree; it is
/// only ever copied, never moved back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionBreak(pub NodeId);

/// The section break carried by `paragraph`, if any.
pub fn section_break_of(doc: &XmlDocument, paragraph: NodeId) -> Option<SectionBreak> {
    if !is_paragraph(doc, paragraph) {
        return None;
    }
    let ppr = doc.first_child_named(paragraph, &W::pPr())?;
    doc.first_child_named(ppr, &W::sectPr()).map(SectionBreak)
}

/// Detaches the section break of `paragraph` from the live tree and returns it.
pub fn take_section_break(doc: &mut XmlDocument, paragraph: NodeId) -> Option<SectionBreak> {
    let section = section_break_of(doc, paragraph)?;
    doc.detach(section.0);
    Some(section)
}

/// Nearest preceding sibling paragraph of `node` that carries a section break.
/// Tables between the two are skipped; the first paragraph found decides.
pub fn preceding_section_break(doc: &XmlDocument, node: NodeId) -> Option<SectionBreak> {
    let mut current = doc.previous_sibling(node);
    while let Some(sibling) = current {
        if is_paragraph(doc, sibling) {
            return section_break_of(doc, sibling);
        }
        current = doc.previous_sibling(sibling);
    }
    None
}

/// Puts a copy of `section` into the properties of `paragraph`, replacing any
/// break it already has.
pub fn apply_section_break(
    doc: &mut XmlDocument,
    section: SectionBreak,
    paragraph: NodeId,
) -> Result<()> {
    let ppr = match doc.first_child_named(paragraph, &W::pPr()) {
        Some(ppr) => ppr,
        None => doc.add_first_child(paragraph, XmlNodeData::element(W::pPr())),
    };
    if let Some(existing) = doc.first_child_named(ppr, &W::sectPr()) {
        doc.remove(existing);
    }
    let copy = doc.deep_copy(section.0)?;
    doc.append(ppr, copy);
    Ok(())
}
