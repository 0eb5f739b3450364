use clap::Parser;
use std::path::PathBuf;

/// Command-line interface to the Anthropic Claude models.
///
/// Chat about one or more codebases, or ask for code that is written straight
/// to the output directory.
///
/// At the prompt: '/o <instructions>' requests files, '/p' reprints the last
/// reply, '/u' checks the codebases for changes, '/q' quits.
#[derive(Parser, Debug)]
#[command(name = "claudecli")]
#[command(author, version, about)]
pub struct Cli {
    /// Codebase to pass to the model as context. Repeat for several roots
    #[arg(short = 's', long = "source", value_name = "DIR")]
    pub sources: Vec<PathBuf>,

    /// File extensions to include, comma separated (e.g. py,txt,md). Applies to every source
    #[arg(short = 'e', long = "file-extensions", value_delimiter = ',')]
    pub file_extensions: Vec<String>,

    /// Model: 'haiku', 'sonnet', 'opus', or a full model id
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Directory for files generated with /o. Defaults to the current directory
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Overwrite output files that already exist
    #[arg(short = 'f', long)]
    pub force: bool,

    /// System prompt file for code generation. Defaults to ~/.claudecli_coder_system_prompt.txt
    #[arg(long, value_name = "FILE")]
    pub coder_system_prompt: Option<PathBuf>,

    /// System prompt file for conversation. Defaults to ~/.claudecli_general_system_prompt.txt
    #[arg(long, value_name = "FILE")]
    pub general_system_prompt: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Alternate configuration file
    #[arg(long, env = "CLAUDECLI_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}
