use crate::error::{Result, StampError};
use crate::xml::XmlDocument;
use indextree::NodeId;
use tracing::{debug, warn};

use super::comments::CommentWrapper;
use super::node::NodeKind;
use super::section::{preceding_section_break, section_break_of, take_section_break, SectionBreak};

/// The contiguous siblings a comment governs, plus the section-break layout
/// captured around them.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Container the members live in and clones get inserted into.
    pub anchor: NodeId,
    pub members: Vec<NodeId>,
    /// Break of the nearest paragraph before the block.
    pub section_break_before: Option<SectionBreak>,
    /// Break the first member carried; detached from the tree on extraction.
    pub first_member_section_break: Option<SectionBreak>,
    pub odd_section_breaks: bool,
}

impl Block {
    /// Members still in the tree under the container. Removal directives
    /// commit first, so a block can lose some members before it is repeated.
    pub fn live_members(&self, doc: &XmlDocument) -> Vec<NodeId> {
        self.members
            .iter()
            .copied()
            .filter(|&m| doc.is_attached(m) && doc.parent(m) == Some(self.anchor))
            .collect()
    }
}

/// The child of `ancestor` whose subtree holds `node`.
fn child_toward(doc: &XmlDocument, ancestor: NodeId, node: NodeId) -> Option<NodeId> {
    doc.ancestors(node).find(|&a| doc.parent(a) == Some(ancestor))
}

fn insertable_ancestor(doc: &XmlDocument, from: NodeId, end: NodeId) -> Option<NodeId> {
    let mut ancestor = from;
    while !doc.contains(ancestor, end) {
        ancestor = doc.parent(ancestor)?;
    }
    while !NodeKind::of(doc, ancestor).is_insertable() {
        ancestor = doc.parent(ancestor)?;
    }
    Some(ancestor)
}

/// Extracts the block spanned by a comment range.
pub fn extract_block(doc: &mut XmlDocument, wrapper: &CommentWrapper) -> Result<Block> {
    let consistency = |what: &str| {
        StampError::StructuralConsistency(format!("comment {}: {what}", wrapper.id))
    };
    let from = doc
        .parent(wrapper.start)
        .ok_or_else(|| consistency("range start is detached"))?;
    let anchor = insertable_ancestor(doc, from, wrapper.end)
        .ok_or_else(|| consistency("no table cell or body encloses the range"))?;

    let first = child_toward(doc, anchor, wrapper.start)
        .ok_or_else(|| consistency("range start left its container"))?;
    let last = child_toward(doc, anchor, wrapper.end)
        .ok_or_else(|| consistency("range end left its container"))?;

    let mut members = Vec::new();
    let mut inside = false;
    for child in doc.child_elements(anchor) {
        inside |= child == first;
        if inside {
            members.push(child);
        }
        if inside && child == last {
            break;
        }
    }
    if members.last() != Some(&last) {
        return Err(consistency("range ends before it starts"));
    }

    debug!(comment_id = wrapper.id, members = members.len(), "extracted block");
    Ok(capture_sections(doc, anchor, members))
}

/// Block made of explicitly chosen siblings, e.g. the single paragraph of
/// an inline directive or the row of a table-row repeat.
pub fn extract_nodes(doc: &mut XmlDocument, members: Vec<NodeId>) -> Result<Block> {
    let first = *members
        .first()
        .ok_or_else(|| StampError::StructuralConsistency("empty block".to_string()))?;
    let anchor = doc.parent(first).ok_or_else(|| {
        StampError::StructuralConsistency(format!("block member {first} is detached"))
    })?;
    Ok(capture_sections(doc, anchor, members))
}

fn capture_sections(doc: &mut XmlDocument, anchor: NodeId, members: Vec<NodeId>) -> Block {
    let first = members[0];

    let mut previous = doc.previous_sibling(first);
    while let Some(p) = previous.filter(|&p| !doc.get(p).is_some_and(|d| d.is_element())) {
        previous = doc.previous_sibling(p);
    }
    let anchor_kind = NodeKind::of(doc, anchor);
    if previous.is_none() && anchor_kind == NodeKind::Cell {
        warn!(
            container = ?anchor_kind,
            "block has no preceding sibling; no section break to carry over"
        );
    }
    let section_break_before = preceding_section_break(doc, first);

    let breaks = members
        .iter()
        .filter(|&&m| section_break_of(doc, m).is_some())
        .count();
    let first_member_section_break = take_section_break(doc, first);

    Block {
        anchor,
        members,
        section_break_before,
        first_member_section_break,
        odd_section_breaks: breaks % 2 == 1,
    }
}
