//! Walks the main story and hands every directive it finds to the
//! processors: comments first, then inline `#{...}` markers.

use std::collections::HashSet;
use std::ops::Range;

use crate::error::{Result, StampError};
use crate::wml::comments::{comments_starting_in, CommentForest, CommentWrapper};
use crate::wml::node::paragraphs_in;
use crate::wml::run::{paragraph_text, replace_range, text_run};
use crate::wml::WordDocument;
use crate::xml::XmlDocument;
use indextree::NodeId;
use serde_json::Value;
use tracing::{debug, warn};

use super::expression::json_type_name;
use super::placeholder::{find_directives, parse_call, DirectiveCall};
use super::processors::{DirectiveKind, Invocation, ProcessorSet};
use super::settings::UnresolvedPolicy;
use super::stamper::Stamper;

/// What to do with an inline marker once the paragraph has been walked.
enum MarkerEdit {
    Delete(Range<usize>),
    Substitute(Range<usize>, String),
}

impl MarkerEdit {
    fn span(&self) -> &Range<usize> {
        match self {
            MarkerEdit::Delete(span) | MarkerEdit::Substitute(span, _) => span,
        }
    }
}

/// Whether a failed directive is handled by the unresolved-expression policy
/// instead of aborting the pass.
fn is_recoverable(err: &StampError) -> bool {
    matches!(
        err,
        StampError::UnresolvedExpression { .. } | StampError::InvalidDirective { .. }
    )
}

pub struct Dispatcher<'a> {
    stamper: &'a Stamper,
    forest: &'a CommentForest,
    context: &'a Value,
    processors: &'a mut ProcessorSet,
    dispatched: HashSet<i64>,
    /// Subtrees handed over to a processor as a whole; their paragraphs are
    /// not walked.
    claimed: Vec<NodeId>,
    consumed: Vec<CommentWrapper>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        stamper: &'a Stamper,
        forest: &'a CommentForest,
        context: &'a Value,
        processors: &'a mut ProcessorSet,
    ) -> Self {
        Self {
            stamper,
            forest,
            context,
            processors,
            dispatched: HashSet::new(),
            claimed: Vec::new(),
            consumed: Vec::new(),
        }
    }

    /// Collects every directive of the main story. Returns the comments whose
    /// directives were taken, so the caller can drop their anchors once the
    /// processors have committed.
    pub fn walk(mut self, doc: &mut WordDocument) -> Result<Vec<CommentWrapper>> {
        let Some(root) = doc.main().root() else {
            return Ok(Vec::new());
        };
        let scope = doc.body().unwrap_or(root);

        for paragraph in paragraphs_in(doc.main(), scope) {
            if !doc.main().is_attached(paragraph) || self.is_claimed(doc.main(), paragraph) {
                continue;
            }

            for (id, run) in comments_starting_in(doc.main(), paragraph) {
                if self.is_claimed(doc.main(), paragraph) {
                    break;
                }
                if let Some(wrapper) = self.dispatchable(id) {
                    self.dispatch_comment(doc, wrapper, paragraph, run)?;
                }
            }

            if !self.is_claimed(doc.main(), paragraph) {
                self.dispatch_inline(doc, paragraph)?;
            }
        }

        debug!(
            consumed = self.consumed.len(),
            claimed = self.claimed.len(),
            "directives collected"
        );
        Ok(self.consumed)
    }

    fn is_claimed(&self, doc: &XmlDocument, node: NodeId) -> bool {
        self.claimed.iter().any(|&c| doc.contains(c, node))
    }

    /// Any wrapper not seen yet. Wrappers nested in a doc-part are marked
    /// seen when the doc-part is taken, since its per-item passes run them.
    fn dispatchable(&self, id: i64) -> Option<&'a CommentWrapper> {
        let forest: &'a CommentForest = self.forest;
        forest.find(id).filter(|_| !self.dispatched.contains(&id))
    }

    fn dispatch_comment(
        &mut self,
        doc: &mut WordDocument,
        wrapper: &'a CommentWrapper,
        paragraph: NodeId,
        run: Option<NodeId>,
    ) -> Result<()> {
        self.dispatched.insert(wrapper.id);
        let text = wrapper.text.trim();
        let Some(call) = parse_call(text) else {
            debug!(comment_id = wrapper.id, text, "comment is not a directive");
            return Ok(());
        };

        match self.invoke(doc, &call, text, paragraph, run, Some(wrapper)) {
            Ok(()) => {
                self.consumed.push(wrapper.clone());
                Ok(())
            }
            Err(err) if is_recoverable(&err) => {
                match self.stamper.settings().unresolved_policy() {
                    UnresolvedPolicy::Fail => return Err(err),
                    UnresolvedPolicy::Keep => {
                        warn!(comment_id = wrapper.id, error = %err, "directive left in place");
                    }
                    UnresolvedPolicy::LeaveEmpty | UnresolvedPolicy::Replace(_) => {
                        warn!(comment_id = wrapper.id, error = %err, "directive dropped");
                        self.consumed.push(wrapper.clone());
                    }
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Inline markers are evaluated left to right; their text is removed (or
    /// substituted) afterwards from the right so earlier spans stay valid.
    fn dispatch_inline(&mut self, doc: &mut WordDocument, paragraph: NodeId) -> Result<()> {
        let text = paragraph_text(doc.main(), paragraph).text;
        let markers = find_directives(&text);
        if markers.is_empty() {
            return Ok(());
        }

        let mut edits = Vec::with_capacity(markers.len());
        for marker in markers {
            let body = marker.expression.trim();
            let outcome = match parse_call(body) {
                Some(call) => self.invoke(doc, &call, body, paragraph, None, None),
                None => Err(StampError::UnresolvedExpression {
                    expression: body.to_string(),
                    context_type: json_type_name(self.context).to_string(),
                    reason: "not a directive call".to_string(),
                }),
            };
            match outcome {
                Ok(()) => edits.push(MarkerEdit::Delete(marker.span)),
                Err(err) if is_recoverable(&err) => {
                    match self.stamper.settings().unresolved_policy() {
                        UnresolvedPolicy::Fail => return Err(err),
                        UnresolvedPolicy::LeaveEmpty => {
                            warn!(error = %err, "inline directive removed");
                            edits.push(MarkerEdit::Delete(marker.span));
                        }
                        UnresolvedPolicy::Replace(default) => {
                            warn!(error = %err, "inline directive replaced with default");
                            edits.push(MarkerEdit::Substitute(marker.span, default.to_string()));
                        }
                        UnresolvedPolicy::Keep => {
                            warn!(error = %err, "inline directive left in place");
                        }
                    }
                }
                Err(err) => return Err(err),
            }
        }

        let main = doc.main_mut();
        for edit in edits.into_iter().rev() {
            let span = edit.span().clone();
            let replacement = match edit {
                MarkerEdit::Delete(_) => Vec::new(),
                MarkerEdit::Substitute(_, text) => vec![text_run(main, &text)],
            };
            replace_range(main, paragraph, span.start, span.end, &replacement)?;
        }
        Ok(())
    }

    fn invoke(
        &mut self,
        doc: &mut WordDocument,
        call: &DirectiveCall,
        text: &str,
        paragraph: NodeId,
        run: Option<NodeId>,
        comment: Option<&CommentWrapper>,
    ) -> Result<()> {
        let unresolved = |reason: String| StampError::UnresolvedExpression {
            expression: text.to_string(),
            context_type: json_type_name(self.context).to_string(),
            reason,
        };
        let kind = DirectiveKind::from_name(&call.name)
            .ok_or_else(|| unresolved(format!("no directive named '{}'", call.name)))?;
        let value = self
            .stamper
            .evaluator()
            .evaluate(&call.argument, self.context)
            .map_err(|e| unresolved(e.to_string()))?;

        let invocation = Invocation {
            kind,
            text,
            paragraph,
            run,
            comment,
        };
        let claimed = self.processors.collect(doc, &invocation, value)?;
        if !claimed.is_empty() {
            let nested = comment.into_iter().flat_map(|c| c.descendants());
            self.dispatched.extend(nested.map(|c| c.id));
            self.claimed.extend(claimed);
        }
        Ok(())
    }
}
