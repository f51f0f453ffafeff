//! Shared utilities: task validation and color parsing

pub mod color;
pub mod validation;

pub use color::parse_hex_color;
pub use validation::{TaskValidator, REQUIRED_FIELDS};
