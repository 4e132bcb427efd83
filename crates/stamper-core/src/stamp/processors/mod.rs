//! Directive processors.
//!
//! Each processor records what it has to do while the document is walked
//! (`collect`) and applies it afterwards (`commit`), so the tree is never
//! restructured under the walker.

pub mod display_if;
pub mod doc_part_repeat;
pub mod paragraph_repeat;
pub mod replace_with;
pub mod row_repeat;
pub mod table_resolver;

use crate::error::{Result, StampError};
use crate::wml::comments::CommentWrapper;
use crate::wml::node::is_paragraph;
use crate::wml::run::text_run;
use crate::wml::WordDocument;
use crate::xml::namespaces::W;
use crate::xml::{XmlDocument, XmlNodeData};
use indextree::NodeId;
use serde_json::Value;
use tracing::debug;

use super::expression::json_type_name;
use super::stamper::Stamper;

pub use display_if::DisplayIfProcessor;
pub use doc_part_repeat::DocPartRepeatProcessor;
pub use paragraph_repeat::ParagraphRepeatProcessor;
pub use replace_with::ReplaceWithProcessor;
pub use row_repeat::RowRepeatProcessor;
pub use table_resolver::{StampTable, TableResolverProcessor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    RepeatParagraph,
    RepeatTableRow,
    RepeatDocPart,
    DisplayParagraphIf,
    DisplayTableRowIf,
    DisplayTableIf,
    ReplaceWordWith,
    ResolveTable,
}

impl DirectiveKind {
    pub const ALL: [DirectiveKind; 8] = [
        DirectiveKind::RepeatParagraph,
        DirectiveKind::RepeatTableRow,
        DirectiveKind::RepeatDocPart,
        DirectiveKind::DisplayParagraphIf,
        DirectiveKind::DisplayTableRowIf,
        DirectiveKind::DisplayTableIf,
        DirectiveKind::ReplaceWordWith,
        DirectiveKind::ResolveTable,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            DirectiveKind::RepeatParagraph => "repeatParagraph",
            DirectiveKind::RepeatTableRow => "repeatTableRow",
            DirectiveKind::RepeatDocPart => "repeatDocPart",
            DirectiveKind::DisplayParagraphIf => "displayParagraphIf",
            DirectiveKind::DisplayTableRowIf => "displayTableRowIf",
            DirectiveKind::DisplayTableIf => "displayTableIf",
            DirectiveKind::ReplaceWordWith => "replaceWordWith",
            DirectiveKind::ResolveTable => "resolveTable",
        }
    }
}

/// A matched directive and the place it was found.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'w> {
    pub kind: DirectiveKind,
    /// Directive text as written, for diagnostics.
    pub text: &'w str,
    pub paragraph: NodeId,
    /// The run a comment encloses exactly, if any.
    pub run: Option<NodeId>,
    pub comment: Option<&'w CommentWrapper>,
}

impl Invocation<'_> {
    pub fn invalid(&self, reason: impl Into<String>) -> StampError {
        StampError::InvalidDirective {
            directive: self.text.to_string(),
            reason: reason.into(),
        }
    }

    pub fn comment_id(&self) -> Option<i64> {
        self.comment.map(|c| c.id)
    }
}

/// The list a repeat directive iterates; `null` repeats zero times.
pub(crate) fn repeat_items(invocation: &Invocation<'_>, value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(invocation.invalid(format!(
            "expects a list, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Text a scalar value is written as; `null` is empty.
pub(crate) fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A detached paragraph holding one plain run.
pub(crate) fn text_paragraph(doc: &mut XmlDocument, text: &str) -> NodeId {
    let paragraph = doc.new_detached(XmlNodeData::element(W::p()));
    let run = text_run(doc, text);
    doc.append(paragraph, run);
    paragraph
}

/// Last of `nodes` that is a paragraph; tables never carry section breaks.
pub(crate) fn last_paragraph(doc: &XmlDocument, nodes: &[NodeId]) -> Option<NodeId> {
    nodes
        .iter()
        .rev()
        .copied()
        .find(|&n| is_paragraph(doc, n))
}

/// One accumulation state per directive family, committed in a fixed order.
#[derive(Default)]
pub struct ProcessorSet {
    paragraph_repeat: ParagraphRepeatProcessor,
    row_repeat: RowRepeatProcessor,
    doc_part_repeat: DocPartRepeatProcessor,
    display_if: DisplayIfProcessor,
    replace_with: ReplaceWithProcessor,
    table_resolver: TableResolverProcessor,
}

impl ProcessorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `invocation` with its evaluated argument. Returns nodes whose
    /// content now belongs to the invocation and must not be walked further.
    pub fn collect(
        &mut self,
        doc: &mut WordDocument,
        invocation: &Invocation<'_>,
        value: Value,
    ) -> Result<Vec<NodeId>> {
        debug!(directive = invocation.kind.name(), comment_id = ?invocation.comment_id(), "collecting directive");
        match invocation.kind {
            DirectiveKind::RepeatParagraph => {
                self.paragraph_repeat.collect(doc.main_mut(), invocation, value)?;
            }
            DirectiveKind::RepeatTableRow => {
                self.row_repeat.collect(doc.main_mut(), invocation, value)?;
            }
            DirectiveKind::RepeatDocPart => {
                return self.doc_part_repeat.collect(doc, invocation, value);
            }
            DirectiveKind::DisplayParagraphIf
            | DirectiveKind::DisplayTableRowIf
            | DirectiveKind::DisplayTableIf => {
                self.display_if.collect(doc.main(), invocation, &value)?;
            }
            DirectiveKind::ReplaceWordWith => {
                self.replace_with.collect(invocation, &value)?;
            }
            DirectiveKind::ResolveTable => {
                self.table_resolver.collect(doc.main(), invocation, value)?;
            }
        }
        Ok(Vec::new())
    }

    /// Nodes whose content is rewritten or dropped at commit; the root
    /// placeholder pass leaves them alone.
    pub fn reserved(&self) -> Vec<NodeId> {
        self.paragraph_repeat
            .reserved()
            .chain(self.row_repeat.reserved())
            .chain(self.doc_part_repeat.reserved())
            .chain(self.display_if.reserved())
            .chain(self.table_resolver.reserved())
            .collect()
    }

    /// Applies everything collected. Removals and rewrites go first and act
    /// on the template, so the repeats clone their outcome and skip members
    /// that are gone.
    pub fn commit(&mut self, doc: &mut WordDocument, stamper: &Stamper) -> Result<()> {
        let substitute = stamper.settings().empty_repeat_substitute.as_deref();
        self.display_if.commit(doc.main_mut());
        self.replace_with.commit(doc.main_mut());
        self.table_resolver.commit(doc.main_mut(), substitute)?;
        self.paragraph_repeat.commit(doc, stamper)?;
        self.row_repeat.commit(doc, stamper)?;
        self.doc_part_repeat.commit(doc, stamper)?;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.paragraph_repeat.reset();
        self.row_repeat.reset();
        self.doc_part_repeat.reset();
        self.display_if.reset();
        self.replace_with.reset();
        self.table_resolver.reset();
    }
}
