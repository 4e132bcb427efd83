//! `repeatDocPart(list)`: the block a comment spans is stamped once per item
//! as an isolated sub-document and the results are spliced back in.

use crate::error::{Result, StampError};
use crate::wml::block::{extract_block, Block};
use crate::wml::comments::{strip_all_anchors, strip_anchors};
use crate::wml::section::apply_section_break;
use crate::wml::WordDocument;
use indextree::NodeId;
use serde_json::Value;
use tracing::debug;

use super::{last_paragraph, repeat_items, text_paragraph, Invocation};
use crate::stamp::stamper::Stamper;

struct PendingDocPart {
    block: Block,
    items: Vec<Value>,
    /// The block's content without this directive's own anchors, plus the
    /// comments nested in it.
    template: WordDocument,
}

#[derive(Default)]
pub struct DocPartRepeatProcessor {
    pending: Vec<PendingDocPart>,
}

impl DocPartRepeatProcessor {
    /// Returns the block members: nested directives inside them are left to
    /// the per-item passes.
    pub fn collect(
        &mut self,
        doc: &mut WordDocument,
        invocation: &Invocation<'_>,
        value: Value,
    ) -> Result<Vec<NodeId>> {
        // the sub-template would carry an inline marker along and repeat forever
        let wrapper = invocation
            .comment
            .ok_or_else(|| invocation.invalid("must be written as a comment"))?;
        let items = repeat_items(invocation, value)?;
        let mut block = extract_block(doc.main_mut(), wrapper)?;

        let nested: Vec<NodeId> = wrapper
            .descendants()
            .into_iter()
            .skip(1)
            .map(|c| c.comment)
            .collect();
        let mut template = doc.sub_document(&block.members, &nested)?;
        if let (Some(id), Some(body)) = (invocation.comment_id(), template.body()) {
            strip_anchors(template.main_mut(), body, id);
        }

        let first = block.members[0];
        if let Some(pos) = self.pending.iter().position(|p| p.block.members[0] == first) {
            let previous = self.pending.remove(pos);
            if block.first_member_section_break.is_none() {
                block.first_member_section_break = previous.block.first_member_section_break;
            }
        }

        let claimed = block.members.clone();
        debug!(
            comment_id = ?invocation.comment_id(),
            members = claimed.len(),
            nested = nested.len(),
            items = items.len(),
            "prepared doc-part template"
        );
        self.pending.push(PendingDocPart {
            block,
            items,
            template,
        });
        Ok(claimed)
    }

    pub fn commit(&mut self, doc: &mut WordDocument, stamper: &Stamper) -> Result<()> {
        for part in std::mem::take(&mut self.pending) {
            commit_one(doc, stamper, part)?;
        }
        Ok(())
    }

    pub fn reserved(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pending.iter().flat_map(|p| p.block.members.iter().copied())
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

fn commit_one(doc: &mut WordDocument, stamper: &Stamper, part: PendingDocPart) -> Result<()> {
    let block = &part.block;
    let members = block.live_members(doc.main());
    let Some(&anchor) = members.first() else {
        debug!("doc-part was removed, nothing to repeat");
        return Ok(());
    };

    // every item is stamped before anything is inserted
    let mut produced = Vec::new();
    for (index, item) in part.items.iter().enumerate() {
        let mut sub = part.template.clone();
        stamper
            .stamp_in_place(&mut sub, item)
            .map_err(StampError::sub_pass)?;
        let mut nodes = doc.import_body(&sub)?;
        // comments left in an item would repeat their ids
        nodes.retain(|&node| strip_all_anchors(doc.main_mut(), node));

        if let (Some(section), Some(tail)) =
            (block.section_break_before, last_paragraph(doc.main(), &nodes))
        {
            apply_section_break(doc.main_mut(), section, tail)?;
        }
        debug!(item = index, nodes = nodes.len(), "stamped doc-part item");
        produced.extend(nodes);
    }

    let main = doc.main_mut();
    if part.items.is_empty() {
        if let Some(text) = &stamper.settings().empty_repeat_substitute {
            produced.push(text_paragraph(main, text));
        }
    }
    if let (Some(section), Some(tail)) = (
        block.first_member_section_break,
        last_paragraph(main, &produced),
    ) {
        apply_section_break(main, section, tail)?;
    }

    for &node in &produced {
        main.insert_before(anchor, node);
    }
    for &member in &members {
        main.remove(member);
    }
    Ok(())
}
