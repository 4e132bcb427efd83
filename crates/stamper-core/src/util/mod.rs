pub mod descendants;
pub mod strings;

pub use descendants::descendants_pruned;
pub use strings::{make_valid_xml, needs_space_preserve};
