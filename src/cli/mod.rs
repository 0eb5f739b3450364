//! Command-line arguments and path resolution.

mod args;
mod paths;

pub use args::Cli;
pub use paths::{
    default_prompt_path, read_prompt_file, resolve_output_dir, CODER_PROMPT_FILE,
    GENERAL_PROMPT_FILE,
};
