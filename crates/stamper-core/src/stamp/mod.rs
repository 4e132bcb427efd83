//! The stamping engine: directive dispatch, placeholder replacement and the
//! [`Stamper`] entry point.

pub mod dispatcher;
pub mod expression;
pub mod placeholder;
pub mod processors;
pub mod replacer;
pub mod resolver;
pub mod settings;
pub mod stamper;

pub use expression::{EvaluationError, ExpressionEvaluator, PathEvaluator};
pub use processors::{DirectiveKind, StampTable};
pub use replacer::PlaceholderReplacer;
pub use resolver::{ImageResolver, NullResolver, ObjectResolver, ResolverChain, StringResolver};
pub use settings::{StamperSettings, UnresolvedPolicy};
pub use stamper::{stamp, StampReport, Stamper, StampingSession};
