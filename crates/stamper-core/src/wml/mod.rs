//! WordprocessingML structure: node kinds, runs, sections, comment ranges,
//! blocks and the document package wrapper.

pub mod block;
pub mod comments;
pub mod document;
pub mod media;
pub mod node;
pub mod run;
pub mod section;

pub use block::{extract_block, extract_nodes, Block};
pub use comments::{build_comment_forest, CommentForest, CommentWrapper};
pub use document::{Story, WordDocument};
pub use media::MediaSink;
pub use node::NodeKind;
pub use run::{paragraph_text, ParagraphText, RunSpan};
pub use section::SectionBreak;
