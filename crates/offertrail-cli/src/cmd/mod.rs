pub mod attribute;
pub mod completions;
