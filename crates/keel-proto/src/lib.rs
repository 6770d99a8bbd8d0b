//! Fixed-length binary records for orders, fills and decrements.
//!
//! Records are packed and can be borrowed directly from wire bytes;
//! decoding into engine types validates every enum and decimal field.

pub mod messages;
pub mod parser;

pub use messages::*;
pub use parser::*;
