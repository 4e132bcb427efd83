//! Comment ranges anchored in a story and their nesting.
//!
//! A comment is anchored by `w:commentRangeStart`, `w:commentRangeEnd` and
//! (usually) a `w:commentReference` run, all sharing a `w:id` with the
//! `w:comment` element of the comments part that holds the comment text.

use crate::error::StampError;
use crate::util::descendants_pruned;
use crate::xml::namespaces::W;
use crate::xml::XmlDocument;
use indextree::NodeId;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use super::node::{comment_id, is_paragraph, is_run, paragraphs_in, NodeKind};
use super::run::{paragraph_runs, run_text};

/// One comment range and the comment ranges nested strictly inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentWrapper {
    pub id: i64,
    pub start: NodeId,
    pub end: NodeId,
    pub reference: Option<NodeId>,
    /// The `w:comment` element in the comments part.
    pub comment: NodeId,
    /// Text of the comment body, paragraphs concatenated.
    pub text: String,
    pub children: Vec<CommentWrapper>,
}

impl CommentWrapper {
    /// This wrapper followed by all nested wrappers, depth first.
    pub fn descendants(&self) -> Vec<&CommentWrapper> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.descendants());
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct CommentForest {
    pub roots: Vec<CommentWrapper>,
    /// Wrappers dropped, nested ones included: an anchor or the comment
    /// body was missing, or the range crossed another one.
    pub malformed: usize,
    /// One [`StampError::MalformedComment`] per dropped subtree.
    pub rejected: Vec<StampError>,
}

impl CommentForest {
    pub fn find(&self, id: i64) -> Option<&CommentWrapper> {
        self.roots
            .iter()
            .flat_map(|r| r.descendants())
            .find(|w| w.id == id)
    }

    pub fn len(&self) -> usize {
        self.roots.iter().map(|r| r.descendants().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[derive(Default)]
struct Pending {
    id: i64,
    start: Option<NodeId>,
    end: Option<NodeId>,
    reference: Option<NodeId>,
    children: Vec<usize>,
    /// Set once the anchors are known to be unpairable.
    problem: Option<String>,
}

fn malformed(id: i64, reason: &str) -> StampError {
    StampError::MalformedComment {
        comment_id: id.to_string(),
        reason: reason.to_string(),
    }
}

/// Comment bodies of a comments part, keyed by id.
pub fn comment_bodies(comments: &XmlDocument) -> HashMap<i64, (NodeId, String)> {
    let Some(root) = comments.root() else {
        return HashMap::new();
    };
    comments
        .elements_by_name(root, &W::comment())
        .filter_map(|c| {
            let id = comment_id(comments, c)?;
            let text: String = paragraphs_in(comments, c)
                .into_iter()
                .map(|p| {
                    paragraph_runs(comments, p)
                        .into_iter()
                        .map(|r| run_text(comments, r))
                        .collect::<String>()
                })
                .collect();
            Some((id, (c, text)))
        })
        .collect()
}

/// Builds the forest of comment ranges anchored below `root`.
///
/// Anchors are paired with a stack: a start opens a wrapper nested in the
/// innermost open one, an end must close the innermost open wrapper. A
/// range that crosses another, starts twice or ends before it starts is
/// rejected together with everything nested in it; wrappers missing an
/// anchor or a body are dropped the same way. The rest of the forest is
/// kept.
pub fn build_comment_forest(
    doc: &XmlDocument,
    root: NodeId,
    comments: Option<&XmlDocument>,
) -> CommentForest {
    let mut nodes: Vec<Pending> = Vec::new();
    let mut by_id: HashMap<i64, usize> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    let mut entry = |nodes: &mut Vec<Pending>, roots: &mut Vec<usize>, id: i64| match by_id.get(&id) {
        Some(&i) => i,
        None => {
            nodes.push(Pending { id, ..Default::default() });
            by_id.insert(id, nodes.len() - 1);
            roots.push(nodes.len() - 1);
            nodes.len() - 1
        }
    };

    for node in doc.descendants(root) {
        let kind = NodeKind::of(doc, node);
        if !kind.is_comment_anchor() {
            continue;
        }
        let Some(id) = comment_id(doc, node) else {
            warn!(anchor = ?kind, "comment anchor without a numeric w:id ignored");
            continue;
        };
        let index = entry(&mut nodes, &mut roots, id);

        match kind {
            NodeKind::CommentRangeStart => {
                if nodes[index].start.is_some() || nodes[index].end.is_some() {
                    nodes[index]
                        .problem
                        .get_or_insert_with(|| "range started twice or after its end".to_string());
                    continue;
                }
                nodes[index].start = Some(node);
                roots.retain(|&r| r != index);
                match stack.last() {
                    Some(&parent) => nodes[parent].children.push(index),
                    None => roots.push(index),
                }
                stack.push(index);
            }
            NodeKind::CommentRangeEnd => {
                nodes[index].end = Some(node);
                if nodes[index].problem.is_some() {
                    continue;
                }
                if nodes[index].start.is_none() {
                    nodes[index].problem = Some("range end before start".to_string());
                    continue;
                }
                let Some(depth) = stack.iter().rposition(|&i| i == index) else {
                    nodes[index].problem = Some("range ended twice".to_string());
                    continue;
                };
                if depth + 1 < stack.len() {
                    let crossing = nodes[stack[depth + 1]].id;
                    nodes[index].problem = Some(format!(
                        "range crosses comment {crossing}; cannot tell which contains the other"
                    ));
                    for &open in &stack[depth + 1..] {
                        nodes[open]
                            .problem
                            .get_or_insert_with(|| format!("range crosses comment {id}"));
                    }
                }
                stack.truncate(depth);
            }
            NodeKind::CommentReference => nodes[index].reference = Some(node),
            _ => {}
        }
    }

    let bodies = comments.map(comment_bodies).unwrap_or_default();
    let mut forest = CommentForest::default();
    for index in roots {
        if let Some(wrapper) = finish(&nodes, index, &bodies, &mut forest) {
            forest.roots.push(wrapper);
        }
    }
    forest
}

fn finish(
    nodes: &[Pending],
    index: usize,
    bodies: &HashMap<i64, (NodeId, String)>,
    forest: &mut CommentForest,
) -> Option<CommentWrapper> {
    let pending = &nodes[index];
    let body = bodies.get(&pending.id);
    let complete = (pending.start, pending.end, body, pending.problem.as_ref());
    let (Some(start), Some(end), Some((comment, text)), None) = complete else {
        let reason = match &pending.problem {
            Some(problem) => problem.clone(),
            None if pending.start.is_none() => "no range start".to_string(),
            None if pending.end.is_none() => "no range end".to_string(),
            None => "no entry in the comments part".to_string(),
        };
        let dropped = count(nodes, index);
        warn!(
            comment_id = pending.id,
            reason = %reason,
            text = body.map(|(_, t)| t.as_str()).unwrap_or(""),
            dropped,
            "dropping malformed comment"
        );
        forest.malformed += dropped;
        forest.rejected.push(malformed(pending.id, &reason));
        return None;
    };

    let children = pending
        .children
        .iter()
        .filter_map(|&c| finish(nodes, c, bodies, forest))
        .collect();
    Some(CommentWrapper {
        id: pending.id,
        start,
        end,
        reference: pending.reference,
        comment: *comment,
        text: text.clone(),
        children,
    })
}

fn count(nodes: &[Pending], index: usize) -> usize {
    1 + nodes[index]
        .children
        .iter()
        .map(|&c| count(nodes, c))
        .sum::<usize>()
}

/// Comment ranges starting inside `paragraph`, in document order, each with
/// the run it encloses exactly, if any.
pub fn comments_starting_in(doc: &XmlDocument, paragraph: NodeId) -> Vec<(i64, Option<NodeId>)> {
    descendants_pruned(doc, paragraph, move |d, id| id != paragraph && is_paragraph(d, id))
        .filter(|&n| NodeKind::of(doc, n) == NodeKind::CommentRangeStart)
        .filter_map(|start| {
            let id = comment_id(doc, start)?;
            let run = element_sibling(doc, doc.next_sibling(start), true)
                .filter(|&r| is_run(doc, r) && comment_around(doc, r) == Some(id));
            Some((id, run))
        })
        .collect()
}

/// First element at or after (or before) `current` among its siblings.
fn element_sibling(doc: &XmlDocument, mut current: Option<NodeId>, forward: bool) -> Option<NodeId> {
    while let Some(node) = current {
        if doc.get(node).is_some_and(|d| d.is_element()) {
            return Some(node);
        }
        current = if forward {
            doc.next_sibling(node)
        } else {
            doc.previous_sibling(node)
        };
    }
    None
}

/// Id of a comment whose range encloses exactly `run`: a range start right
/// before it and the matching range end right after it.
pub fn comment_around(doc: &XmlDocument, run: NodeId) -> Option<i64> {
    let before = element_sibling(doc, doc.previous_sibling(run), false)?;
    let after = element_sibling(doc, doc.next_sibling(run), true)?;
    if NodeKind::of(doc, before) != NodeKind::CommentRangeStart
        || NodeKind::of(doc, after) != NodeKind::CommentRangeEnd
    {
        return None;
    }
    let id = comment_id(doc, before)?;
    (comment_id(doc, after) == Some(id)).then_some(id)
}

/// Removes the start, end and reference anchors of one comment. A reference
/// run left with nothing but properties goes with it.
pub fn delete_anchors(doc: &mut XmlDocument, wrapper: &CommentWrapper) {
    for anchor in [Some(wrapper.start), Some(wrapper.end), wrapper.reference]
        .into_iter()
        .flatten()
    {
        if !doc.is_attached(anchor) {
            continue;
        }
        let parent = doc.parent(anchor);
        doc.remove(anchor);
        if let Some(run) = parent.filter(|&p| NodeKind::of(doc, p) == NodeKind::Run) {
            let empty = doc
                .child_elements(run)
                .all(|c| doc.is(c, W::NS, "rPr"));
            if empty {
                doc.remove(run);
            }
        }
    }
}

/// Removes every anchor of comment `id` inside the subtree of `node`.
/// Returns false when `node` itself was such an anchor and is gone.
pub fn strip_anchors(doc: &mut XmlDocument, node: NodeId, id: i64) -> bool {
    strip_where(doc, node, |anchor_id| anchor_id == Some(id))
}

/// Removes the anchors of every comment inside the subtree of `node`.
pub fn strip_all_anchors(doc: &mut XmlDocument, node: NodeId) -> bool {
    strip_where(doc, node, |_| true)
}

fn strip_where(doc: &mut XmlDocument, node: NodeId, matches: impl Fn(Option<i64>) -> bool) -> bool {
    let anchors: Vec<NodeId> = doc
        .descendants(node)
        .filter(|&d| NodeKind::of(doc, d).is_comment_anchor() && matches(comment_id(doc, d)))
        .collect();
    let mut survived = true;
    for anchor in anchors {
        if anchor == node {
            survived = false;
        }
        let parent = doc.parent(anchor);
        doc.remove(anchor);
        if let Some(run) = parent.filter(|&p| NodeKind::of(doc, p) == NodeKind::Run) {
            if doc.child_elements(run).all(|c| doc.is(c, W::NS, "rPr")) {
                if run == node {
                    survived = false;
                }
                doc.remove(run);
            }
        }
    }
    survived
}

/// Ids of the comments part entries that no anchor below `root` refers to.
pub fn orphaned_comments(doc: &XmlDocument, root: NodeId, comments: &XmlDocument) -> Vec<i64> {
    let anchored: HashSet<i64> = doc
        .descendants(root)
        .filter(|&d| NodeKind::of(doc, d).is_comment_anchor())
        .filter_map(|d| comment_id(doc, d))
        .collect();
    let mut orphans: Vec<i64> = comment_bodies(comments)
        .into_keys()
        .filter(|id| !anchored.contains(id))
        .collect();
    orphans.sort_unstable();
    orphans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parser::parse;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn comments_part(ids: &[(i64, &str)]) -> XmlDocument {
        let body: String = ids
            .iter()
            .map(|(id, text)| {
                format!(r#"<w:comment w:id="{id}"><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:comment>"#)
            })
            .collect();
        parse(&format!("<w:comments {NS}>{body}</w:comments>")).unwrap()
    }

    fn body(inner: &str) -> XmlDocument {
        parse(&format!("<w:body {NS}>{inner}</w:body>")).unwrap()
    }

    fn shape(w: &CommentWrapper) -> String {
        if w.children.is_empty() {
            w.id.to_string()
        } else {
            let inner: Vec<_> = w.children.iter().map(shape).collect();
            format!("{}({})", w.id, inner.join(","))
        }
    }

    #[test]
    fn nested_ranges_form_a_tree() {
        let doc = body(
            r#"<w:p><w:commentRangeStart w:id="1"/><w:r><w:t>a</w:t></w:r></w:p>
               <w:p><w:commentRangeStart w:id="2"/><w:r><w:t>b</w:t></w:r><w:commentRangeEnd w:id="2"/>
                    <w:r><w:commentReference w:id="2"/></w:r></w:p>
               <w:p><w:commentRangeStart w:id="3"/><w:commentRangeEnd w:id="3"/></w:p>
               <w:p><w:commentRangeEnd w:id="1"/><w:r><w:commentReference w:id="1"/></w:r></w:p>
               <w:p><w:commentRangeStart w:id="4"/><w:commentRangeEnd w:id="4"/></w:p>"#,
        );
        let comments = comments_part(&[(1, "repeatDocPart(a)"), (2, "x"), (3, "y"), (4, "z")]);
        let forest = build_comment_forest(&doc, doc.root().unwrap(), Some(&comments));

        let shapes: Vec<_> = forest.roots.iter().map(shape).collect();
        assert_eq!(shapes, vec!["1(2,3)", "4"]);
        assert_eq!(forest.malformed, 0);
        assert_eq!(forest.len(), 4);
        assert_eq!(forest.roots[0].text, "repeatDocPart(a)");
        assert!(forest.find(2).unwrap().reference.is_some());
    }

    #[test]
    fn crossed_ranges_are_dropped_and_the_rest_kept() {
        let doc = body(
            r#"<w:p><w:commentRangeStart w:id="1"/><w:commentRangeStart w:id="2"/>
               <w:commentRangeEnd w:id="1"/><w:commentRangeEnd w:id="2"/></w:p>
               <w:p><w:commentRangeStart w:id="3"/><w:commentRangeEnd w:id="3"/></w:p>"#,
        );
        let comments = comments_part(&[(1, "a"), (2, "b"), (3, "c")]);
        let forest = build_comment_forest(&doc, doc.root().unwrap(), Some(&comments));

        let shapes: Vec<_> = forest.roots.iter().map(shape).collect();
        assert_eq!(shapes, vec!["3"]);
        assert_eq!(forest.malformed, 2);
        assert_eq!(forest.rejected.len(), 1);
        assert!(matches!(
            forest.rejected[0],
            StampError::MalformedComment { ref comment_id, .. } if comment_id == "1"
        ));
    }

    #[test]
    fn crossing_inside_a_well_formed_range_keeps_the_outer_one() {
        let doc = body(
            r#"<w:p><w:commentRangeStart w:id="1"/><w:commentRangeStart w:id="2"/><w:commentRangeStart w:id="3"/>
               <w:commentRangeEnd w:id="2"/><w:commentRangeEnd w:id="3"/><w:commentRangeEnd w:id="1"/></w:p>"#,
        );
        let comments = comments_part(&[(1, "a"), (2, "b"), (3, "c")]);
        let forest = build_comment_forest(&doc, doc.root().unwrap(), Some(&comments));

        let shapes: Vec<_> = forest.roots.iter().map(shape).collect();
        assert_eq!(shapes, vec!["1"]);
        assert_eq!(forest.malformed, 2);
    }

    #[test]
    fn end_before_start_is_dropped() {
        let doc = body(r#"<w:p><w:commentRangeEnd w:id="5"/><w:commentRangeStart w:id="5"/></w:p>"#);
        let comments = comments_part(&[(5, "a")]);
        let forest = build_comment_forest(&doc, doc.root().unwrap(), Some(&comments));
        assert!(forest.is_empty());
        assert_eq!(forest.malformed, 1);
    }

    #[test]
    fn incomplete_comments_are_dropped_with_descendants() {
        let doc = body(
            r#"<w:p><w:commentRangeStart w:id="1"/><w:commentRangeStart w:id="2"/><w:commentRangeEnd w:id="2"/></w:p>
               <w:p><w:commentRangeStart w:id="3"/><w:commentRangeEnd w:id="3"/></w:p>
               <w:p><w:r><w:commentReference w:id="9"/></w:r></w:p>"#,
        );
        let comments = comments_part(&[(1, "a"), (2, "b")]);
        let forest = build_comment_forest(&doc, doc.root().unwrap(), Some(&comments));
        // 1 never ends and takes 2 and 3 along, 9 has no range
        assert!(forest.is_empty());
        assert_eq!(forest.malformed, 4);
    }

    #[test]
    fn locates_comments_on_paragraphs_and_runs() {
        let doc = body(
            r#"<w:p><w:commentRangeStart w:id="7"/><w:r><w:t>a</w:t></w:r><w:commentRangeEnd w:id="7"/></w:p>"#,
        );
        let p = doc.child_elements(doc.root().unwrap()).next().unwrap();
        let run = doc.child_elements(p).nth(1).unwrap();
        assert_eq!(comments_starting_in(&doc, p), vec![(7, Some(run))]);
        assert_eq!(comment_around(&doc, run), Some(7));
    }

    #[test]
    fn delete_and_strip_anchors() {
        let mut doc = body(
            r#"<w:p><w:commentRangeStart w:id="7"/><w:r><w:t>a</w:t></w:r><w:commentRangeEnd w:id="7"/><w:r><w:rPr/><w:commentReference w:id="7"/></w:r></w:p>"#,
        );
        let comments = comments_part(&[(7, "x")]);
        let root = doc.root().unwrap();
        let forest = build_comment_forest(&doc, root, Some(&comments));
        let p = doc.child_elements(root).next().unwrap();

        let copy = doc.deep_copy(p).unwrap();
        assert!(strip_anchors(&mut doc, copy, 7));
        assert_eq!(doc.child_elements(copy).count(), 1);

        delete_anchors(&mut doc, forest.find(7).unwrap());
        assert_eq!(doc.child_elements(p).count(), 1);
        assert_eq!(doc.text(p), "a");
    }

    #[test]
    fn strip_all_anchors_and_find_orphans() {
        let mut doc = body(
            r#"<w:p><w:commentRangeStart w:id="1"/><w:commentRangeStart w:id="2"/><w:r><w:t>a</w:t></w:r>
               <w:commentRangeEnd w:id="2"/><w:commentRangeEnd w:id="1"/><w:r><w:commentReference w:id="1"/></w:r></w:p>
               <w:p><w:commentRangeStart w:id="3"/><w:r><w:t>b</w:t></w:r><w:commentRangeEnd w:id="3"/></w:p>"#,
        );
        let comments = comments_part(&[(1, "x"), (2, "y"), (3, "z")]);
        let root = doc.root().unwrap();
        let first = doc.child_elements(root).next().unwrap();

        assert!(orphaned_comments(&doc, root, &comments).is_empty());
        assert!(strip_all_anchors(&mut doc, first));
        assert_eq!(doc.child_elements(first).count(), 1);
        assert_eq!(orphaned_comments(&doc, root, &comments), vec![1, 2]);
    }
}
