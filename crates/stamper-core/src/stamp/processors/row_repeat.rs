use crate::error::Result;
use crate::wml::block::{extract_nodes, Block};
use crate::wml::comments::strip_all_anchors;
use crate::wml::node::{enclosing, NodeKind};
use crate::wml::WordDocument;
use crate::xml::XmlDocument;
use indextree::NodeId;
use serde_json::Value;
use tracing::debug;

use super::{repeat_items, Invocation};
use crate::stamp::stamper::Stamper;

struct PendingRows {
    block: Block,
    items: Vec<Value>,
    comment_id: Option<i64>,
}

/// `repeatTableRow(list)`: the row holding the directive is cloned once per
/// item. An empty list removes the row.
#[derive(Default)]
pub struct RowRepeatProcessor {
    pending: Vec<PendingRows>,
}

impl RowRepeatProcessor {
    pub fn collect(
        &mut self,
        doc: &mut XmlDocument,
        invocation: &Invocation<'_>,
        value: Value,
    ) -> Result<()> {
        let items = repeat_items(invocation, value)?;
        let row = enclosing(doc, invocation.paragraph, NodeKind::Row)
            .ok_or_else(|| invocation.invalid("not inside a table row"))?;
        let block = extract_nodes(doc, vec![row])?;

        self.pending.retain(|p| p.block.members[0] != row);
        self.pending.push(PendingRows {
            block,
            items,
            comment_id: invocation.comment_id(),
        });
        Ok(())
    }

    pub fn commit(&mut self, doc: &mut WordDocument, stamper: &Stamper) -> Result<()> {
        let replacer = stamper.replacer();
        for rows in std::mem::take(&mut self.pending) {
            let (main, mut media) = doc.main_with_media();
            let Some(&row) = rows.block.live_members(main).first() else {
                debug!(comment_id = ?rows.comment_id, "repeated row was removed, nothing to repeat");
                continue;
            };

            for item in &rows.items {
                let clone = main.deep_copy(row)?;
                strip_all_anchors(main, clone);
                main.insert_before(row, clone);
                replacer.replace_in(main, &mut media, clone, item)?;
            }
            main.remove(row);
            debug!(items = rows.items.len(), "repeated table row");
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
