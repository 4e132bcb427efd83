pub mod error;
pub mod xml;
pub mod hash;
pub mod package;
pub mod util;
pub mod wml;
pub mod stamp;

pub use error::{Result, StampError};

pub use stamp::{
    stamp, ExpressionEvaluator, ObjectResolver, PathEvaluator, ResolverChain, StampReport, Stamper,
    StamperSettings,
};
pub use wml::WordDocument;
