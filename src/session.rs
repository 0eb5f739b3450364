//! The interactive session.
//!
//! [`Session`] owns everything that lives across prompts: configuration, the
//! transport, loaded codebases, the conversation history and token totals.
//! Each line the user enters is dispatched by [`Session::handle_line`].

use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::api::{MessagesRequest, ModelTransport, Usage};
use crate::cli::{default_prompt_path, read_prompt_file, CODER_PROMPT_FILE, GENERAL_PROMPT_FILE};
use crate::codebase::{
    apply, build, diff_many, format_size, merge, serialize, Codebase, ScanOptions,
};
use crate::config::Config;
use crate::conversation::{ContinuationRequest, ConversationHistory};
use crate::output::{
    write_concatenated_output, write_fallback_output, write_files, WriteOutcome,
};
use crate::transcript::TranscriptStore;
use crate::turn::{TurnController, XML_DECLARATION, XML_ESCAPE_INSTRUCTION};

pub const DEFAULT_GENERAL_PROMPT: &str = "You are a helpful AI assistant which answers questions \
about programming. Always use code blocks with the appropriate language tags. If asked for a \
table, always format it using Markdown syntax.";

/// System prompts for the two kinds of turn
#[derive(Debug, Clone, Default)]
pub struct SystemPrompts {
    /// Used for `/o` code generation
    pub coder: String,
    /// Used for conversational turns
    pub general: String,
}

impl SystemPrompts {
    /// Load both prompts.
    ///
    /// A path given explicitly must exist. When a default file is absent the
    /// coder prompt is empty and the general prompt is [`DEFAULT_GENERAL_PROMPT`].
    pub fn load(coder: Option<PathBuf>, general: Option<PathBuf>) -> Result<Self> {
        let coder = match load_prompt(coder, CODER_PROMPT_FILE)? {
            Some(prompt) => prompt,
            None => {
                println!("Coder system prompt file not found. Using empty prompt.");
                String::new()
            }
        };

        let general = match load_prompt(general, GENERAL_PROMPT_FILE)? {
            Some(prompt) => prompt,
            None => {
                println!("General system prompt file not found. Using default prompt:");
                println!("{}", DEFAULT_GENERAL_PROMPT);
                DEFAULT_GENERAL_PROMPT.to_string()
            }
        };

        Ok(Self { coder, general })
    }
}

fn load_prompt(explicit: Option<PathBuf>, default_file: &str) -> Result<Option<String>> {
    match explicit {
        Some(path) => match read_prompt_file(&path)? {
            Some(prompt) => Ok(Some(prompt)),
            None => bail!("System prompt file not found: {}", path.display()),
        },
        None => read_prompt_file(&default_prompt_path(default_file)?),
    }
}

/// A line of user input, classified
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Quit,
    /// Blank line: nothing is sent
    Empty,
    /// `/p`: reprint the last reply
    Print,
    /// `/u`: check the codebases for changes
    Update,
    /// `/o <instructions>`: generate files
    Output(&'a str),
    Chat(&'a str),
}

/// Instructions of a `/o` line; `/open ...` and the like are chat.
fn output_instructions(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("/o").or_else(|| line.strip_prefix("/O"))?;
    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}

pub fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    let lower = trimmed.to_lowercase();

    if trimmed.is_empty() {
        Command::Empty
    } else if lower == "/q" {
        Command::Quit
    } else if lower == "/p" {
        Command::Print
    } else if lower == "/u" {
        Command::Update
    } else if let Some(instructions) = output_instructions(trimmed) {
        Command::Output(instructions)
    } else {
        Command::Chat(line.trim_end_matches(['\r', '\n']))
    }
}

/// What the prompt loop does after a line has been handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Continue,
    Quit,
}

/// Fixed per-run settings of a [`Session`]
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: String,
    pub output_dir: PathBuf,
    pub force: bool,
    pub prompts: SystemPrompts,
}

pub struct Session<T: ModelTransport> {
    transport: T,
    config: Config,
    scan_options: ScanOptions,
    settings: SessionSettings,
    codebases: Vec<Codebase>,
    /// Serialized codebases, refreshed after every change check
    context: String,
    history: ConversationHistory,
    /// Changed file contents not yet shown to the model
    pending_changes: String,
    usage: Usage,
    transcript: Option<TranscriptStore>,
}

impl<T: ModelTransport> Session<T> {
    pub fn new(
        transport: T,
        config: Config,
        settings: SessionSettings,
        transcript: Option<TranscriptStore>,
    ) -> Self {
        let scan_options = config.scan_options();
        Self {
            transport,
            config,
            scan_options,
            settings,
            codebases: Vec::new(),
            context: String::new(),
            history: ConversationHistory::new(),
            pending_changes: String::new(),
            usage: Usage::default(),
            transcript,
        }
    }

    /// Snapshot every source root and build the initial context.
    ///
    /// A root that cannot be read is reported and skipped. A root given twice
    /// is loaded once, with the later scan taking precedence.
    pub fn load_codebases(&mut self, sources: &[PathBuf], extensions: &[String]) {
        if !extensions.is_empty() {
            println!(
                "Looking only at source files with extensions: {}",
                extensions.join(",")
            );
        }

        for source in sources {
            println!("Codebase location: {}", source.display());

            let scan = match build(source, extensions, &self.scan_options) {
                Ok(scan) => scan,
                Err(e) => {
                    println!("Error reading codebase: {}", e);
                    continue;
                }
            };

            for warning in &scan.warnings {
                warn!("Skipped {}: {}", warning.path.display(), warning.reason);
            }

            let root = source.canonicalize().unwrap_or_else(|_| source.clone());
            match self.codebases.iter_mut().find(|c| c.root == root) {
                Some(existing) => {
                    existing.snapshot = merge(&existing.snapshot, &scan.snapshot);
                }
                None => self.codebases.push(Codebase {
                    root,
                    extensions: extensions.to_vec(),
                    snapshot: scan.snapshot,
                }),
            }
        }

        if sources.is_empty() {
            return;
        }

        if self.codebases.is_empty() {
            println!(
                "Codebase could not be loaded. Please check the source code location and try again."
            );
            return;
        }

        self.refresh_context();
        let files: usize = self.codebases.iter().map(|c| c.snapshot.len()).sum();
        println!(
            "Codebase size: {} ({} files)\n",
            format_size(&self.context),
            files
        );
    }

    fn refresh_context(&mut self) {
        self.context = if self.codebases.is_empty() {
            String::new()
        } else {
            serialize(self.codebases.iter().map(|c| &c.snapshot))
        };
    }

    /// Diff every codebase against its snapshot and fold the changes in.
    ///
    /// Returns whether anything changed. Changed contents are queued for the
    /// next user message.
    pub fn check_for_changes(&mut self) -> bool {
        if self.codebases.is_empty() {
            return false;
        }

        let result = diff_many(&self.codebases, &self.scan_options);
        for warning in result.diffs.iter().flat_map(|d| &d.warnings) {
            warn!("Skipped {}: {}", warning.path.display(), warning.reason);
        }

        if !result.has_changes() {
            debug!("No codebase changes detected");
            return false;
        }

        println!("Codebase changes detected:\n{}\n", result.summary);

        for (codebase, diff) in self.codebases.iter_mut().zip(&result.diffs) {
            codebase.snapshot = apply(
                &codebase.root,
                &codebase.snapshot,
                &diff.transformation,
                &self.scan_options,
            );
        }
        self.refresh_context();

        if !result.changed_content.is_empty() {
            if !self.pending_changes.is_empty() {
                self.pending_changes.push_str("\n\n");
            }
            self.pending_changes.push_str(&result.changed_content);
        }

        true
    }

    /// Build the user message for a conversational turn.
    ///
    /// The codebase goes in front of the first message only; later messages
    /// carry the contents of files changed since the previous one.
    fn compose_chat_message(&self, text: &str) -> String {
        let mut message = String::new();
        if self.history.is_empty() {
            message.push_str(&self.context);
        } else if !self.pending_changes.is_empty() {
            message.push_str("The following files have changed:\n\n");
            message.push_str(&self.pending_changes);
            message.push_str("\n\n");
        }
        message.push_str(text);
        message
    }

    fn record_turn(&mut self, user: String, reply: &str, usage: Usage) {
        self.history = self.history.with_turn(user, reply);
        self.pending_changes.clear();
        self.usage += usage;

        println!("Tokens: {} | session total: {}", usage, self.usage.total());

        if let Some(transcript) = &self.transcript {
            if let Err(e) = transcript.save(&self.settings.model, &self.history, self.usage) {
                warn!("Failed to save transcript: {:#}", e);
            }
        }
    }

    /// Send a conversational turn. A failed request leaves the history as it was.
    pub async fn chat(&mut self, text: &str) {
        let user = self.compose_chat_message(text);
        let request = MessagesRequest {
            model: self.settings.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: self.settings.prompts.general.clone(),
            messages: self.history.request_messages(&user),
        };

        let response = match self.transport.send(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!("{}", e);
                if e.is_network() {
                    println!("Connection error, try again...");
                } else {
                    println!("Request failed: {}", e);
                }
                return;
            }
        };

        let reply = response.joined_text();
        if reply.trim().is_empty() {
            println!("Received an empty response.");
            return;
        }

        println!("\n{}\n", reply.trim());
        self.record_turn(user, &reply, response.usage);
    }

    /// Generate files from `instructions` and write them to the output directory.
    pub async fn request_files(&mut self, instructions: &str) -> Result<()> {
        // The two-slot request has no room for earlier turns, so the full
        // codebase goes in every time.
        let user = format!("{}{}", self.context, instructions);
        let request = ContinuationRequest::new(
            format!("{}{}", user, XML_ESCAPE_INSTRUCTION),
            XML_DECLARATION,
        );

        let (response, fallback) = {
            let controller = TurnController::new(
                &self.transport,
                &self.settings.model,
                self.config.max_tokens,
            );

            let Some(response) = controller.run(&request, &self.settings.prompts.coder).await
            else {
                println!("Failed to get a response from the AI.");
                return Ok(());
            };

            let fallback = if response.files.is_empty() {
                println!("No files could be parsed from the response. Retrying in plain text...");
                controller
                    .run_plaintext(&user, &self.settings.prompts.coder)
                    .await
            } else {
                None
            };

            (response, fallback)
        };

        let output_dir = self.settings.output_dir.clone();
        let concat_path = write_concatenated_output(&output_dir, &response.content)?;
        println!("\nWriting complete AI output to {}", concat_path.display());

        let mut usage = response.usage;

        if let Some(fallback) = &fallback {
            usage += fallback.usage;
            let path = write_fallback_output(&output_dir, &fallback.content)?;
            println!("Plain-text output written to {}", path.display());
        } else if response.files.is_empty() {
            println!("Files included in the result:\nNil.");
        } else {
            println!("Files included in the result:");
            for file in &response.files {
                println!("- {}\n  Changes: {}", file.path, file.changes);
            }
            println!();
            self.report_writes(&output_dir, &response.files);
        }

        println!("Done!");

        let reply = format!("{}{}", XML_DECLARATION, response.content);
        self.record_turn(user, &reply, usage);
        Ok(())
    }

    fn report_writes(&self, output_dir: &Path, files: &[crate::response::FileData]) {
        for result in write_files(output_dir, files, self.settings.force) {
            match result.outcome {
                WriteOutcome::Written => println!("Wrote {}", result.path.display()),
                WriteOutcome::Skipped => {
                    println!("{} already exists. Skipping...", result.path.display())
                }
                WriteOutcome::Failed(e) => println!("{}", e),
            }
        }
    }

    pub fn print_last_reply(&self) {
        match self.history.last_reply() {
            Some(reply) => println!("\n{}\n", reply),
            None => println!("No reply yet."),
        }
    }

    /// Handle one line of input.
    pub async fn handle_line(&mut self, line: &str) -> Result<PromptOutcome> {
        match parse_command(line) {
            Command::Quit => return Ok(PromptOutcome::Quit),
            Command::Empty => {}
            Command::Print => self.print_last_reply(),
            Command::Update => {
                if !self.check_for_changes() {
                    println!("No changes detected.");
                }
            }
            Command::Output(instructions) => {
                self.check_for_changes();
                self.request_files(instructions).await?;
            }
            Command::Chat(text) => {
                self.check_for_changes();
                self.chat(text).await;
            }
        }
        Ok(PromptOutcome::Continue)
    }

    /// Read lines from stdin until `/q` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        println!(
            "Output files will be written to: {}\n",
            self.settings.output_dir.display()
        );

        let stdin = io::stdin();
        loop {
            print!("[{}] >>> ", self.history.len());
            io::stdout().flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }

            match self.handle_line(&line).await {
                Ok(PromptOutcome::Quit) => break,
                Ok(PromptOutcome::Continue) => {}
                Err(e) => error!("{:#}", e),
            }
        }

        info!("Session token usage: {}", self.usage);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{text_reply, ScriptedTransport};
    use crate::api::TransportError;
    use crate::output::{CONCATENATED_OUTPUT_FILE, FALLBACK_OUTPUT_FILE};
    use crate::turn::PLAINTEXT_PREFIX;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn session(
        replies: Vec<Result<crate::api::MessagesResponse, TransportError>>,
        output_dir: &Path,
    ) -> Session<ScriptedTransport> {
        Session::new(
            ScriptedTransport::new(replies),
            Config::default(),
            SessionSettings {
                model: "test-model".into(),
                output_dir: output_dir.to_path_buf(),
                force: false,
                prompts: SystemPrompts {
                    coder: "coder".into(),
                    general: "general".into(),
                },
            },
            None,
        )
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/q\n"), Command::Quit);
        assert_eq!(parse_command("/Q"), Command::Quit);
        assert_eq!(parse_command("   \n"), Command::Empty);
        assert_eq!(parse_command("/p"), Command::Print);
        assert_eq!(parse_command("/u"), Command::Update);
        assert_eq!(parse_command("/o add a test\n"), Command::Output("add a test"));
        assert_eq!(parse_command("hello\n"), Command::Chat("hello"));
    }

    #[test]
    fn test_output_command_needs_a_separator() {
        assert_eq!(parse_command("/o"), Command::Output(""));
        assert_eq!(parse_command("/O\tfix it"), Command::Output("fix it"));
        assert_eq!(
            parse_command("/open the file please"),
            Command::Chat("/open the file please")
        );
        assert_eq!(parse_command("/options?"), Command::Chat("/options?"));
    }

    #[tokio::test]
    async fn test_quit_and_empty_are_control_flow() {
        let out = TempDir::new().unwrap();
        let mut session = session(vec![], out.path());

        assert_eq!(session.handle_line("").await.unwrap(), PromptOutcome::Continue);
        assert_eq!(session.handle_line("/q").await.unwrap(), PromptOutcome::Quit);
        assert_eq!(session.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_context_is_sent_with_first_message_only() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(src.path().join("a.py"), "print(1)").unwrap();

        let mut session = session(vec![text_reply("first"), text_reply("second")], out.path());
        session.load_codebases(&[src.path().to_path_buf()], &[]);

        session.handle_line("what does it do?").await.unwrap();
        session.handle_line("thanks").await.unwrap();

        let requests = session.transport.requests.borrow();
        assert!(requests[0].messages[0].content.contains("<codebase>"));
        assert!(requests[0].messages[0].content.ends_with("what does it do?"));
        assert_eq!(requests[0].system, "general");
        assert_eq!(requests[0].temperature, 1.0);
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[1].messages[2].content, "thanks");
        drop(requests);

        assert_eq!(session.history.len(), 4);
        assert_eq!(session.history.last_reply(), Some("second"));
        assert_eq!(session.usage.input_tokens, 200);
    }

    #[tokio::test]
    async fn test_transport_failure_rolls_back() {
        let out = TempDir::new().unwrap();
        let mut session = session(
            vec![text_reply("ok"), Err(TransportError::Timeout)],
            out.path(),
        );

        session.handle_line("one").await.unwrap();
        let before = session.history.clone();
        session.handle_line("two").await.unwrap();

        assert_eq!(session.history, before);
        assert_eq!(session.history.len(), 2);
    }

    #[tokio::test]
    async fn test_changed_files_are_prepended_to_next_message() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(src.path().join("a.py"), "v1").unwrap();

        let mut session = session(vec![text_reply("r1"), text_reply("r2")], out.path());
        session.load_codebases(&[src.path().to_path_buf()], &["py".to_string()]);
        session.handle_line("hi").await.unwrap();

        fs::write(src.path().join("a.py"), "v2").unwrap();
        let f = fs::File::options()
            .write(true)
            .open(src.path().join("a.py"))
            .unwrap();
        f.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();

        session.handle_line("/u").await.unwrap();
        assert_eq!(session.codebases[0].snapshot.content("a.py"), Some("v2"));

        session.handle_line("and now?").await.unwrap();

        let requests = session.transport.requests.borrow();
        let last_user = &requests[1].messages[2].content;
        assert!(last_user.contains("Contents of file: "));
        assert!(last_user.contains("v2"));
        assert!(last_user.ends_with("and now?"));
    }

    #[tokio::test]
    async fn test_removed_source_root_does_not_block_chat() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(src.path().join("a.py"), "print(1)").unwrap();

        let mut session = session(vec![text_reply("r1"), text_reply("r2")], out.path());
        session.load_codebases(&[src.path().to_path_buf()], &[]);
        session.handle_line("hi").await.unwrap();

        src.close().unwrap();

        assert!(!session.check_for_changes());
        session.handle_line("still there?").await.unwrap();

        assert_eq!(session.transport.calls(), 2);
        assert_eq!(session.history.last_reply(), Some("r2"));
        assert_eq!(session.codebases[0].snapshot.content("a.py"), Some("print(1)"));
    }

    #[tokio::test]
    async fn test_output_command_writes_files() {
        let out = TempDir::new().unwrap();
        let mut session = session(
            vec![text_reply(
                "\n<root><file><path>pkg/a.py</path><changes>new</changes><content>x = 1</content></file></root>",
            )],
            out.path(),
        );

        session.handle_line("/o write a.py").await.unwrap();

        assert_eq!(
            fs::read_to_string(out.path().join("pkg/a.py")).unwrap(),
            "x = 1"
        );
        assert!(out.path().join(CONCATENATED_OUTPUT_FILE).exists());

        let requests = session.transport.requests.borrow();
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].system, "coder");
        assert_eq!(requests[0].messages[1].content, XML_DECLARATION);
        assert!(requests[0].messages[0]
            .content
            .ends_with(XML_ESCAPE_INSTRUCTION));
    }

    #[tokio::test]
    async fn test_unparseable_output_falls_back_to_plaintext() {
        let out = TempDir::new().unwrap();
        let mut session = session(
            vec![
                text_reply("<doc><file><path>a</path></doc></file>"),
                text_reply(" a.py\nx = 1"),
            ],
            out.path(),
        );

        session.handle_line("/o write a.py").await.unwrap();

        assert_eq!(
            fs::read_to_string(out.path().join(FALLBACK_OUTPUT_FILE)).unwrap(),
            " a.py\nx = 1"
        );
        let requests = session.transport.requests.borrow();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages[1].content, PLAINTEXT_PREFIX);
    }
}
