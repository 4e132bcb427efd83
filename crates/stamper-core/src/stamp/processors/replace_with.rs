use crate::error::Result;
use crate::wml::run::set_run_text;
use crate::xml::XmlDocument;
use indextree::NodeId;
use serde_json::Value;

use super::{display_text, Invocation};

/// `replaceWordWith(expression)`: the run a comment encloses gets the value
/// as its text, keeping its run properties.
#[derive(Default)]
pub struct ReplaceWithProcessor {
    pending: Vec<(NodeId, String)>,
}

impl ReplaceWithProcessor {
    pub fn collect(&mut self, invocation: &Invocation<'_>, value: &Value) -> Result<()> {
        let run = invocation
            .run
            .ok_or_else(|| invocation.invalid("needs a comment around a single run"))?;
        let text = display_text(value);
        self.pending.retain(|(r, _)| *r != run);
        self.pending.push((run, text));
        Ok(())
    }

    pub fn commit(&mut self, doc: &mut XmlDocument) {
        for (run, text) in std::mem::take(&mut self.pending) {
            if doc.is_attached(run) {
                set_run_text(doc, run, &text);
            }
        }
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
