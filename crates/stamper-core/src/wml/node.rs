//! Classification of WordprocessingML elements into the node kinds the
//! stamping engine reasons about.

use crate::xml::namespaces::W;
use crate::xml::XmlDocument;
use indextree::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Body,
    Paragraph,
    Run,
    Table,
    Row,
    Cell,
    SectionBreak,
    CommentRangeStart,
    CommentRangeEnd,
    CommentReference,
    Other,
}

impl NodeKind {
    pub fn of(doc: &XmlDocument, node: NodeId) -> Self {
        let Some(name) = doc.name(node) else {
            return NodeKind::Other;
        };
        if !name.in_namespace(W::NS) {
            return NodeKind::Other;
        }
        match name.local_name.as_str() {
            "body" => NodeKind::Body,
            "p" => NodeKind::Paragraph,
            "r" => NodeKind::Run,
            "tbl" => NodeKind::Table,
            "tr" => NodeKind::Row,
            "tc" => NodeKind::Cell,
            "sectPr" => NodeKind::SectionBreak,
            "commentRangeStart" => NodeKind::CommentRangeStart,
            "commentRangeEnd" => NodeKind::CommentRangeEnd,
            "commentReference" => NodeKind::CommentReference,
            _ => NodeKind::Other,
        }
    }

    /// Containers that may host inserted sibling blocks.
    pub fn is_insertable(self) -> bool {
        matches!(self, NodeKind::Body | NodeKind::Cell)
    }

    pub fn is_comment_anchor(self) -> bool {
        matches!(
            self,
            NodeKind::CommentRangeStart | NodeKind::CommentRangeEnd | NodeKind::CommentReference
        )
    }
}

pub fn is_paragraph(doc: &XmlDocument, node: NodeId) -> bool {
    doc.is(node, W::NS, "p")
}

pub fn is_run(doc: &XmlDocument, node: NodeId) -> bool {
    doc.is(node, W::NS, "r")
}

/// Nearest ancestor (inclusive) of the given kind.
pub fn enclosing(doc: &XmlDocument, node: NodeId, kind: NodeKind) -> Option<NodeId> {
    doc.ancestors(node).find(|&a| NodeKind::of(doc, a) == kind)
}

/// Value of `w:id` on a comment anchor or `w:comment` element.
pub fn comment_id(doc: &XmlDocument, node: NodeId) -> Option<i64> {
    doc.attribute(node, &W::id())?.trim().parse().ok()
}

/// Every paragraph in the subtree of `node` (inclusive), in document order.
pub fn paragraphs_in(doc: &XmlDocument, node: NodeId) -> Vec<NodeId> {
    doc.descendants(node)
        .filter(|&d| is_paragraph(doc, d))
        .collect()
}
