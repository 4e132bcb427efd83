use crate::error::Result;
use crate::stamp::expression::json_type_name;
use crate::wml::node::{enclosing, NodeKind};
use crate::xml::XmlDocument;
use indextree::NodeId;
use serde_json::Value;
use tracing::debug;

use super::{DirectiveKind, Invocation};

/// `displayParagraphIf`, `displayTableRowIf` and `displayTableIf`: the
/// paragraph, row or table goes away when the condition is false or null.
#[derive(Default)]
pub struct DisplayIfProcessor {
    doomed: Vec<NodeId>,
}

impl DisplayIfProcessor {
    pub fn collect(
        &mut self,
        doc: &XmlDocument,
        invocation: &Invocation<'_>,
        value: &Value,
    ) -> Result<()> {
        let show = match value {
            Value::Bool(show) => *show,
            Value::Null => false,
            other => {
                return Err(invocation.invalid(format!(
                    "expects a boolean condition, got {}",
                    json_type_name(other)
                )))
            }
        };
        if show {
            return Ok(());
        }

        let target = match invocation.kind {
            DirectiveKind::DisplayTableRowIf => enclosing(doc, invocation.paragraph, NodeKind::Row)
                .ok_or_else(|| invocation.invalid("not inside a table row"))?,
            DirectiveKind::DisplayTableIf => enclosing(doc, invocation.paragraph, NodeKind::Table)
                .ok_or_else(|| invocation.invalid("not inside a table"))?,
            _ => invocation.paragraph,
        };
        if !self.doomed.contains(&target) {
            self.doomed.push(target);
        }
        Ok(())
    }

    pub fn commit(&mut self, doc: &mut XmlDocument) {
        for node in std::mem::take(&mut self.doomed) {
            // already gone with an enclosing table
            if !doc.is_attached(node) {
                continue;
            }
            debug!(kind = ?NodeKind::of(doc, node), "removing hidden node");
            doc.remove(node);
        }
    }

    /// Nodes that will be removed; nothing inside them needs stamping.
    pub fn reserved(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.doomed.iter().copied()
    }

    pub fn reset(&mut self) {
        self.doomed.clear();
    }
}
