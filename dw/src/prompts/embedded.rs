//! Embedded prompts
//!
//! Compiled into the binary from the `.pmt` files at build time.

use tracing::debug;

pub const SELECT_DIRECTORY: &str = include_str!("../../prompts/select-directory.pmt");
pub const DETERMINE_STRATEGY: &str = include_str!("../../prompts/determine-strategy.pmt");
pub const SELECT_PATTERN: &str = include_str!("../../prompts/select-pattern.pmt");
pub const GENERATE_CONTENT: &str = include_str!("../../prompts/generate-content.pmt");
pub const UPDATE_CONTENT: &str = include_str!("../../prompts/update-content.pmt");

/// Names of all embedded templates
pub const NAMES: &[&str] = &[
    "select-directory",
    "determine-strategy",
    "select-pattern",
    "generate-content",
    "update-content",
];

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "select-directory" => Some(SELECT_DIRECTORY),
        "determine-strategy" => Some(DETERMINE_STRATEGY),
        "select-pattern" => Some(SELECT_PATTERN),
        "generate-content" => Some(GENERATE_CONTENT),
        "update-content" => Some(UPDATE_CONTENT),
        _ => {
            debug!(%name, "get_embedded: no match found");
            None
        }
    }
}
