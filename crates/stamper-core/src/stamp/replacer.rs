//! Substitution of `${...}` placeholders and line-break markers in
//! paragraphs.

use crate::error::{Result, StampError};
use crate::wml::media::MediaSink;
use crate::wml::node::paragraphs_in;
use crate::wml::run::{break_run, paragraph_text, replace_range, run_text, text_run};
use crate::xml::XmlDocument;
use indextree::NodeId;
use memchr::memmem;
use serde_json::Value;
use tracing::warn;

use super::expression::{json_type_name, ExpressionEvaluator};
use super::placeholder::find_variable;
use super::resolver::ResolverChain;
use super::settings::{StamperSettings, UnresolvedPolicy};

/// Resolves placeholders against a data context, one paragraph at a time.
pub struct PlaceholderReplacer<'s> {
    evaluator: &'s dyn ExpressionEvaluator,
    resolvers: &'s ResolverChain,
    settings: &'s StamperSettings,
}

impl<'s> PlaceholderReplacer<'s> {
    pub fn new(
        evaluator: &'s dyn ExpressionEvaluator,
        resolvers: &'s ResolverChain,
        settings: &'s StamperSettings,
    ) -> Self {
        Self {
            evaluator,
            resolvers,
            settings,
        }
    }

    /// Every paragraph in the subtree of `root`, nested ones included.
    pub fn replace_in(
        &self,
        doc: &mut XmlDocument,
        media: &mut MediaSink<'_>,
        root: NodeId,
        context: &Value,
    ) -> Result<usize> {
        let mut replaced = 0;
        for paragraph in paragraphs_in(doc, root) {
            replaced += self.replace_all(doc, media, paragraph, context)?;
        }
        Ok(replaced)
    }

    /// Like [`replace_in`](Self::replace_in), leaving alone the paragraphs
    /// inside any of `skip`.
    pub fn replace_outside(
        &self,
        doc: &mut XmlDocument,
        media: &mut MediaSink<'_>,
        root: NodeId,
        context: &Value,
        skip: &[NodeId],
    ) -> Result<usize> {
        let mut replaced = 0;
        for paragraph in paragraphs_in(doc, root) {
            if skip.iter().any(|&s| doc.contains(s, paragraph)) {
                continue;
            }
            replaced += self.replace_all(doc, media, paragraph, context)?;
        }
        Ok(replaced)
    }

    /// Replaces every `${...}` of `paragraph` left to right, then turns
    /// line-break markers into breaks. Returns the number of placeholders
    /// substituted. A paragraph without markers is not touched.
    pub fn replace_all(
        &self,
        doc: &mut XmlDocument,
        media: &mut MediaSink<'_>,
        paragraph: NodeId,
        context: &Value,
    ) -> Result<usize> {
        let mut replaced = 0;
        let mut cursor = 0;
        loop {
            let text = paragraph_text(doc, paragraph).text;
            let Some(placeholder) = find_variable(&text, cursor) else {
                break;
            };
            let marker = &text[placeholder.span.clone()];
            let (start, end) = (placeholder.span.start, placeholder.span.end);

            let rendered = self
                .evaluator
                .evaluate(&placeholder.expression, context)
                .map_err(|e| StampError::UnresolvedExpression {
                    expression: marker.to_string(),
                    context_type: json_type_name(context).to_string(),
                    reason: e.to_string(),
                })
                .and_then(|value| self.resolvers.resolve(doc, media, marker, &value));

            let run = match rendered {
                Ok(run) => run,
                Err(err) => match self.settings.unresolved_policy() {
                    UnresolvedPolicy::Fail => return Err(err),
                    UnresolvedPolicy::LeaveEmpty => {
                        warn!(expression = %marker, error = %err, "placeholder left empty");
                        text_run(doc, "")
                    }
                    UnresolvedPolicy::Replace(default) => {
                        warn!(expression = %marker, error = %err, "placeholder replaced by default value");
                        text_run(doc, default)
                    }
                    UnresolvedPolicy::Keep => {
                        warn!(expression = %marker, error = %err, "placeholder left unresolved");
                        cursor = end;
                        continue;
                    }
                },
            };
            let width = run_text(doc, run).len();
            replace_range(doc, paragraph, start, end, &[run])?;
            cursor = start + width;
            replaced += 1;
        }

        self.replace_line_breaks(doc, paragraph)?;
        Ok(replaced)
    }

    fn replace_line_breaks(&self, doc: &mut XmlDocument, paragraph: NodeId) -> Result<()> {
        let needle = self.settings.line_break_placeholder.as_bytes();
        if needle.is_empty() {
            return Ok(());
        }
        let finder = memmem::Finder::new(needle);
        let mut cursor = 0;
        loop {
            let text = paragraph_text(doc, paragraph).text;
            let Some(found) = text.get(cursor..).and_then(|rest| finder.find(rest.as_bytes())) else {
                return Ok(());
            };
            let start = cursor + found;
            let run = break_run(doc);
            replace_range(doc, paragraph, start, start + needle.len(), &[run])?;
            cursor = start;
        }
    }
}
