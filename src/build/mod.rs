//! Serialization: escaping, folding, and tree-to-text assembly.

mod escape;
mod fold;
mod serializer;

pub use escape::dquote_escape;
pub use fold::{MAX_LINE_OCTETS, fold_line, fold_line_into};
pub use serializer::{serialize_component, serialize_line};
