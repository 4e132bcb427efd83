use crate::error::Result;
use crate::wml::block::{extract_block, extract_nodes, Block};
use crate::wml::comments::strip_all_anchors;
use crate::wml::section::apply_section_break;
use crate::wml::WordDocument;
use crate::xml::XmlDocument;
use indextree::NodeId;
use serde_json::Value;
use tracing::debug;

use super::{last_paragraph, repeat_items, text_paragraph, Invocation};
use crate::stamp::stamper::Stamper;

struct PendingRepeat {
    block: Block,
    items: Vec<Value>,
    comment_id: Option<i64>,
}

/// `repeatParagraph(list)`: the paragraphs a comment spans (or the paragraph
/// of an inline directive) are cloned once per item, in place.
#[derive(Default)]
pub struct ParagraphRepeatProcessor {
    pending: Vec<PendingRepeat>,
}

impl ParagraphRepeatProcessor {
    pub fn collect(
        &mut self,
        doc: &mut XmlDocument,
        invocation: &Invocation<'_>,
        value: Value,
    ) -> Result<()> {
        let items = repeat_items(invocation, value)?;
        let mut block = match invocation.comment {
            Some(wrapper) => extract_block(doc, wrapper)?,
            None => extract_nodes(doc, vec![invocation.paragraph])?,
        };

        // a second directive on the same paragraphs replaces the first
        let first = block.members[0];
        if let Some(pos) = self.pending.iter().position(|p| p.block.members[0] == first) {
            let previous = self.pending.remove(pos);
            if block.first_member_section_break.is_none() {
                block.first_member_section_break = previous.block.first_member_section_break;
            }
        }

        self.pending.push(PendingRepeat {
            block,
            items,
            comment_id: invocation.comment_id(),
        });
        Ok(())
    }

    pub fn commit(&mut self, doc: &mut WordDocument, stamper: &Stamper) -> Result<()> {
        for repeat in std::mem::take(&mut self.pending) {
            commit_one(doc, stamper, repeat)?;
        }
        Ok(())
    }

    /// Paragraphs that get their values per item at commit.
    pub fn reserved(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pending.iter().flat_map(|p| p.block.members.iter().copied())
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

fn commit_one(doc: &mut WordDocument, stamper: &Stamper, repeat: PendingRepeat) -> Result<()> {
    let replacer = stamper.replacer();
    let (main, mut media) = doc.main_with_media();
    let block = &repeat.block;
    let members = block.live_members(main);
    let Some(&anchor) = members.first() else {
        debug!(comment_id = ?repeat.comment_id, "repeated paragraphs were removed, nothing to repeat");
        return Ok(());
    };

    let mut produced = Vec::new();
    if repeat.items.is_empty() {
        if let Some(text) = &stamper.settings().empty_repeat_substitute {
            let substitute = text_paragraph(main, text);
            main.insert_before(anchor, substitute);
            produced.push(substitute);
        }
    }

    let last_item = repeat.items.len().saturating_sub(1);
    for (index, item) in repeat.items.iter().enumerate() {
        let mut clones = Vec::with_capacity(members.len());
        for &member in &members {
            let clone = main.deep_copy(member)?;
            if !strip_all_anchors(main, clone) {
                continue;
            }
            main.insert_before(anchor, clone);
            replacer.replace_in(main, &mut media, clone, item)?;
            clones.push(clone);
        }

        if block.odd_section_breaks && index == last_item {
            if let (Some(section), Some(tail)) =
                (block.section_break_before, last_paragraph(main, &clones))
            {
                apply_section_break(main, section, tail)?;
            }
        }
        produced.extend(clones);
    }

    if let (Some(section), Some(tail)) = (
        block.first_member_section_break,
        last_paragraph(main, &produced),
    ) {
        apply_section_break(main, section, tail)?;
    }

    for &member in &members {
        main.remove(member);
    }
    debug!(
        items = repeat.items.len(),
        members = members.len(),
        produced = produced.len(),
        "repeated paragraphs"
    );
    Ok(())
}
