//! Parsing of structured code responses.

mod parser;
mod types;

pub use parser::parse;
pub use types::{CodeResponse, FileData, ParseStatus};
