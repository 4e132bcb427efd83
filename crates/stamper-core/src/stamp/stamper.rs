//! Entry points of the stamping engine.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, StampError};
use crate::wml::comments::{build_comment_forest, delete_anchors, orphaned_comments, CommentForest};
use crate::wml::media::MediaSink;
use crate::wml::{Story, WordDocument};

use super::dispatcher::Dispatcher;
use super::expression::{ExpressionEvaluator, PathEvaluator};
use super::processors::ProcessorSet;
use super::replacer::PlaceholderReplacer;
use super::resolver::{ObjectResolver, ResolverChain};
use super::settings::StamperSettings;

/// Counts of one pass over a document, sub-passes excluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StampReport {
    /// Comment directives that were applied or dropped.
    pub directives: usize,
    pub placeholders: usize,
    pub malformed_comments: usize,
}

/// Fills templates from a data context.
///
/// A `Stamper` holds configuration only and can be reused; each call runs a
/// fresh [`StampingSession`].
///
/// ```ignore
/// let stamper = Stamper::new(StamperSettings::default());
/// let output = stamper.stamp_bytes(&template, &serde_json::json!({ "name": "Ada" }))?;
/// ```
pub struct Stamper {
    settings: StamperSettings,
    evaluator: Box<dyn ExpressionEvaluator>,
    resolvers: ResolverChain,
}

impl Default for Stamper {
    fn default() -> Self {
        Self::new(StamperSettings::default())
    }
}

impl Stamper {
    pub fn new(settings: StamperSettings) -> Self {
        let resolvers = ResolverChain::standard(settings.replace_null_values);
        Self {
            settings,
            evaluator: Box::new(PathEvaluator),
            resolvers,
        }
    }

    pub fn with_evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn with_resolver(mut self, resolver: impl ObjectResolver + 'static) -> Self {
        self.resolvers.add(Box::new(resolver));
        self
    }

    pub fn settings(&self) -> &StamperSettings {
        &self.settings
    }

    pub fn evaluator(&self) -> &dyn ExpressionEvaluator {
        self.evaluator.as_ref()
    }

    pub fn replacer(&self) -> PlaceholderReplacer<'_> {
        PlaceholderReplacer::new(self.evaluator.as_ref(), &self.resolvers, &self.settings)
    }

    /// Stamps a copy of `template`. The template is left untouched, also
    /// when the pass fails.
    pub fn stamp(&self, template: &WordDocument, context: &Value) -> Result<WordDocument> {
        let mut document = template.clone();
        let report = self.stamp_in_place(&mut document, context)?;
        info!(
            directives = report.directives,
            placeholders = report.placeholders,
            "document stamped"
        );
        Ok(document)
    }

    pub fn stamp_in_place(&self, document: &mut WordDocument, context: &Value) -> Result<StampReport> {
        StampingSession::new().run(self, document, context)
    }

    /// Reads a `.docx`, stamps it with any serializable context and writes the
    /// result back to bytes.
    pub fn stamp_bytes<T: Serialize + ?Sized>(&self, template: &[u8], context: &T) -> Result<Vec<u8>> {
        let template = WordDocument::from_bytes(template)?;
        let context = serde_json::to_value(context)?;
        self.stamp(&template, &context)?.to_bytes()
    }
}

/// State of one pass: the comment forest of the document being stamped and
/// the directives collected from it.
#[derive(Default)]
pub struct StampingSession {
    forest: CommentForest,
    processors: ProcessorSet,
}

impl StampingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(
        &mut self,
        stamper: &Stamper,
        document: &mut WordDocument,
        context: &Value,
    ) -> Result<StampReport> {
        if stamper.settings().remove_proof_errors {
            document.remove_proof_errors();
        }
        let Some(root) = document.main().root() else {
            return Err(StampError::MissingPart {
                part_path: document.main_path().to_string(),
                document_type: "Word".to_string(),
            });
        };

        self.forest = build_comment_forest(document.main(), root, document.comments());
        for rejected in &self.forest.rejected {
            warn!(error = %rejected, "comment skipped");
        }
        debug!(
            roots = self.forest.roots.len(),
            malformed = self.forest.malformed,
            "comment forest built"
        );

        let consumed =
            Dispatcher::new(stamper, &self.forest, context, &mut self.processors).walk(document)?;

        // blocks the processors rewrite get their values at commit
        let replacer = stamper.replacer();
        let reserved = self.processors.reserved();
        let mut placeholders = {
            let (main, mut media) = document.main_with_media();
            replacer.replace_outside(main, &mut media, root, context, &reserved)?
        };

        self.processors.commit(document, stamper)?;
        self.processors.reset();

        for wrapper in &consumed {
            delete_anchors(document.main_mut(), wrapper);
            document.remove_comment(wrapper.id);
        }
        let orphans = document
            .comments()
            .map(|comments| orphaned_comments(document.main(), root, comments))
            .unwrap_or_default();
        if !orphans.is_empty() {
            debug!(count = orphans.len(), "removing comments left without anchors");
        }
        for id in orphans {
            document.remove_comment(id);
        }

        let (stories, package) = document.stories_with_media();
        for story in stories {
            let Story { path, tree } = story;
            let Some(story_root) = tree.root() else {
                continue;
            };
            let mut media = MediaSink::new(&mut *package, path.as_str());
            placeholders += replacer.replace_in(tree, &mut media, story_root, context)?;
        }

        Ok(StampReport {
            directives: consumed.len(),
            placeholders,
            malformed_comments: self.forest.malformed,
        })
    }
}

/// Stamps `template` with `context` using `options`.
pub fn stamp(template: &WordDocument, context: &Value, options: &StamperSettings) -> Result<WordDocument> {
    Stamper::new(options.clone()).stamp(template, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MAIN: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Dear ${name},</w:t></w:r></w:p></w:body></w:document>"#;

    #[test]
    fn stamp_leaves_template_untouched() {
        let template = WordDocument::from_parts(MAIN, None).unwrap();
        let output = stamp(&template, &json!({ "name": "Ada" }), &StamperSettings::default()).unwrap();
        let body = |d: &WordDocument| d.main().text(d.body().unwrap());
        assert_eq!(body(&output), "Dear Ada,");
        assert_eq!(body(&template), "Dear ${name},");
    }

    #[test]
    fn report_counts_placeholders() {
        let mut document = WordDocument::from_parts(MAIN, None).unwrap();
        let report = Stamper::default()
            .stamp_in_place(&mut document, &json!({ "name": "Ada" }))
            .unwrap();
        assert_eq!(report.placeholders, 1);
        assert_eq!(report.directives, 0);
    }

    #[test]
    fn custom_evaluator_is_used() {
        struct Shout;
        impl ExpressionEvaluator for Shout {
            fn evaluate(
                &self,
                expression: &str,
                _context: &Value,
            ) -> std::result::Result<Value, super::super::expression::EvaluationError> {
                Ok(Value::String(expression.to_uppercase()))
            }
        }
        let template = WordDocument::from_parts(MAIN, None).unwrap();
        let output = Stamper::default()
            .with_evaluator(Shout)
            .stamp(&template, &Value::Null)
            .unwrap();
        assert_eq!(output.main().text(output.body().unwrap()), "Dear NAME,");
    }

    #[test]
    fn registered_resolver_outranks_builtins() {
        struct Upper;
        impl ObjectResolver for Upper {
            fn priority(&self) -> i32 {
                5
            }

            fn can_resolve(&self, value: &Value) -> bool {
                value.is_string()
            }

            fn resolve(
                &self,
                doc: &mut crate::xml::XmlDocument,
                _media: &mut MediaSink<'_>,
                _expression: &str,
                value: &Value,
            ) -> Result<indextree::NodeId> {
                let text = value.as_str().unwrap_or_default().to_uppercase();
                Ok(crate::wml::run::text_run(doc, &text))
            }
        }
        let template = WordDocument::from_parts(MAIN, None).unwrap();
        let output = Stamper::default()
            .with_resolver(Upper)
            .stamp(&template, &json!({ "name": "Ada" }))
            .unwrap();
        assert_eq!(output.main().text(output.body().unwrap()), "Dear ADA,");
    }
}
