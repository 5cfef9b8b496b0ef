//! Input and output formats of the binary.

pub mod csv;
pub mod json;
