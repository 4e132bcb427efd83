//! Run-level text editing.
//!
//! A paragraph's logical text is the concatenation of its runs' text, where a
//! run contributes the content of its `w:t` children and one `\t` per
//! `w:tab`. Every other run child (breaks, drawings, comment references)
//! has zero width. Offsets are byte offsets into that logical string.

use crate::error::{Result, StampError};
use crate::util::{descendants_pruned, make_valid_xml, needs_space_preserve};
use crate::xml::namespaces::{W, XML};
use crate::xml::{XmlDocument, XmlNodeData};
use indextree::NodeId;

use super::node::{is_paragraph, is_run};

/// The slice `[start, end)` of the paragraph text contributed by `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSpan {
    pub run: NodeId,
    pub start: usize,
    pub end: usize,
}

impl RunSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParagraphText {
    pub text: String,
    pub spans: Vec<RunSpan>,
}

impl ParagraphText {
    /// Runs carrying at least one character of `[start, end)`.
    pub fn runs_in(&self, start: usize, end: usize) -> impl Iterator<Item = &RunSpan> {
        self.spans
            .iter()
            .filter(move |s| !s.is_empty() && s.start < end && s.end > start)
    }

    /// Runs without text (breaks, drawings) sitting strictly inside
    /// `(start, end)`.
    pub fn empty_runs_within(&self, start: usize, end: usize) -> impl Iterator<Item = &RunSpan> {
        self.spans
            .iter()
            .filter(move |s| s.is_empty() && start < s.start && s.start < end)
    }
}

/// Runs of `paragraph` in document order, including runs nested in inline
/// containers such as hyperlinks, but not runs of nested paragraphs.
pub fn paragraph_runs(doc: &XmlDocument, paragraph: NodeId) -> Vec<NodeId> {
    descendants_pruned(doc, paragraph, |d, id| {
        if id == paragraph {
            return false;
        }
        is_paragraph(d, id)
            || d.is(id, W::NS, "pPr")
            || d.parent(id).is_some_and(|p| is_run(d, p))
    })
    .filter(|&id| is_run(doc, id))
    .collect()
}

fn child_text(doc: &XmlDocument, child: NodeId) -> Option<String> {
    let data = doc.get(child)?;
    if data.is_named(W::NS, "t") {
        Some(doc.text(child))
    } else if data.is_named(W::NS, "tab") {
        Some("\t".to_string())
    } else {
        None
    }
}

pub fn run_text(doc: &XmlDocument, run: NodeId) -> String {
    doc.children(run)
        .filter_map(|c| child_text(doc, c))
        .collect()
}

pub fn paragraph_text(doc: &XmlDocument, paragraph: NodeId) -> ParagraphText {
    let mut result = ParagraphText::default();
    for run in paragraph_runs(doc, paragraph) {
        let start = result.text.len();
        result.text.push_str(&run_text(doc, run));
        result.spans.push(RunSpan {
            run,
            start,
            end: result.text.len(),
        });
    }
    result
}

fn set_text_element(doc: &mut XmlDocument, t: NodeId, text: &str) {
    let children: Vec<NodeId> = doc.children(t).collect();
    for child in children {
        doc.remove(child);
    }
    if !text.is_empty() {
        doc.add_child(t, XmlNodeData::text(text));
    }
    if needs_space_preserve(text) {
        doc.set_attribute(t, &XML::space(), "preserve");
    }
}

/// Splits `run` so that it keeps the first `offset` bytes of its text; the
/// remainder moves to a new run inserted right after it, carrying a copy of
/// the run properties. Returns the new run.
pub fn split_run(doc: &mut XmlDocument, run: NodeId, offset: usize) -> Result<NodeId> {
    let data = doc
        .get(run)
        .cloned()
        .ok_or_else(|| StampError::StructuralConsistency("split of a removed run".to_string()))?;
    let tail = doc.new_detached(match data {
        XmlNodeData::Element { name, attributes } => {
            XmlNodeData::element_with_attrs(name, attributes)
        }
        other => other,
    });

    let children: Vec<NodeId> = doc.children(run).collect();
    let mut pos = 0;
    for child in children {
        if doc.is(child, W::NS, "rPr") {
            let rpr = doc.deep_copy(child)?;
            doc.append(tail, rpr);
            continue;
        }
        let text = child_text(doc, child).unwrap_or_default();
        let len = text.len();
        if pos >= offset {
            doc.append(tail, child);
        } else if pos + len > offset {
            let cut = offset - pos;
            let (Some(head_text), Some(tail_text)) = (text.get(..cut), text.get(cut..)) else {
                return Err(StampError::StructuralConsistency(format!(
                    "offset {offset} is not a character boundary of run text"
                )));
            };
            let attrs = doc
                .get(child)
                .and_then(|d| d.attributes())
                .map(<[_]>::to_vec)
                .unwrap_or_default();
            let tail_t = doc.add_child(tail, XmlNodeData::element_with_attrs(W::t(), attrs));
            set_text_element(doc, tail_t, tail_text);
            set_text_element(doc, child, head_text);
        }
        pos += len;
    }

    doc.insert_after(run, tail);
    Ok(tail)
}

/// Replaces the characters `[start, end)` of the paragraph text with the
/// given detached runs. Boundary runs are split so that only the matched
/// characters disappear; replacement runs without properties inherit those
/// of the first matched run.
pub fn replace_range(
    doc: &mut XmlDocument,
    paragraph: NodeId,
    start: usize,
    end: usize,
    replacement: &[NodeId],
) -> Result<()> {
    if start >= end {
        return Err(StampError::StructuralConsistency(format!(
            "empty replacement range {start}..{end}"
        )));
    }

    let layout = paragraph_text(doc, paragraph);
    if let Some(span) = layout.runs_in(start, end).find(|s| s.start < end && end < s.end) {
        split_run(doc, span.run, end - span.start)?;
    }
    let layout = paragraph_text(doc, paragraph);
    if let Some(span) = layout.runs_in(start, end).find(|s| s.start < start && start < s.end) {
        split_run(doc, span.run, start - span.start)?;
    }

    let layout = paragraph_text(doc, paragraph);
    let matched: Vec<NodeId> = layout.runs_in(start, end).map(|s| s.run).collect();
    let interior: Vec<NodeId> = layout.empty_runs_within(start, end).map(|s| s.run).collect();
    let Some(&first) = matched.first() else {
        return Err(StampError::StructuralConsistency(format!(
            "no run covers {start}..{end}"
        )));
    };

    let style = doc.first_child_named(first, &W::rPr());
    for &run in replacement {
        if let Some(rpr) = style {
            if doc.first_child_named(run, &W::rPr()).is_none() {
                let copy = doc.deep_copy(rpr)?;
                doc.prepend(run, copy);
            }
        }
        doc.insert_before(first, run);
    }
    for run in matched.into_iter().chain(interior) {
        doc.remove(run);
    }
    Ok(())
}

/// A detached run holding `text`.
pub fn text_run(doc: &mut XmlDocument, text: &str) -> NodeId {
    let run = doc.new_detached(XmlNodeData::element(W::r()));
    if !text.is_empty() {
        let t = doc.add_child(run, XmlNodeData::element(W::t()));
        set_text_element(doc, t, &make_valid_xml(text));
    }
    run
}

/// A detached run holding a single hard line break.
pub fn break_run(doc: &mut XmlDocument) -> NodeId {
    let run = doc.new_detached(XmlNodeData::element(W::r()));
    doc.add_child(run, XmlNodeData::element(W::br()));
    run
}

/// Replaces the visible content of `run` with `text`, keeping its properties.
pub fn set_run_text(doc: &mut XmlDocument, run: NodeId, text: &str) {
    let children: Vec<NodeId> = doc.children(run).collect();
    for child in children {
        if !doc.is(child, W::NS, "rPr") {
            doc.remove(child);
        }
    }
    if !text.is_empty() {
        let t = doc.add_child(run, XmlNodeData::element(W::t()));
        set_text_element(doc, t, &make_valid_xml(text));
    }
}
