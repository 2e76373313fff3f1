//! Core data model: components, content lines, and values.

mod component;
mod content_line;
mod datetime;
mod structured;
mod value;

pub use component::{Component, Node};
pub use content_line::{ContentLine, Param, normalize_name};
pub use datetime::{DateTimeValue, Period, PeriodEnd, Zone};
pub use structured::{Address, Name};
pub use value::Value;
