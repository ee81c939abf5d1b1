use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::demo::DEFAULT_ROWS;
use crate::report::export::ExportFormat;
use crate::session::Theme;

#[derive(Parser, Debug)]
#[command(
    name = "sensitivity-checkr",
    about = "Classify dataset columns by data sensitivity using a hosted language model",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log pipeline progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print one summary line per input
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify the columns of one or more CSV files or JSON schemas
    Classify(ClassifyArgs),

    /// Print the prompt that would be sent for an input, without calling the model
    Prompt(PromptArgs),

    /// Write a synthetic CSV with columns spanning every sensitivity level
    Demo(DemoArgs),

    /// Interactive session: classify files one at a time, browse or clear the history
    Shell(ShellArgs),
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// CSV file(s) or JSON schema file(s), processed in order
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Config file [default: ./.sensitivity-checkr/config.toml, fallback ~/.config/sensitivity-checkr/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Export formats to write after each successful batch
    #[arg(long, value_delimiter = ',', value_name = "FORMATS")]
    pub export: Vec<ExportFormat>,

    /// Directory for exported files
    #[arg(long, default_value = ".", value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Print the recent-runs list after all inputs are processed
    #[arg(long)]
    pub history: bool,
}

#[derive(Args, Debug)]
pub struct PromptArgs {
    /// CSV file or JSON schema file
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Number of rows to generate
    #[arg(long, default_value_t = DEFAULT_ROWS)]
    pub rows: usize,

    /// Random seed; the same seed always produces the same file
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output path
    #[arg(short, long, default_value = "demo_data.csv", value_name = "FILE")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct ShellArgs {
    /// Config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Export formats to write after each successful batch
    #[arg(long, value_delimiter = ',', value_name = "FORMATS")]
    pub export: Vec<ExportFormat>,

    /// Directory for exported files
    #[arg(long, default_value = ".", value_name = "DIR")]
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

/// One line typed at the `shell` prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Classify(PathBuf),
    History,
    Last,
    Clear,
    Theme(Theme),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ShellCommand {
    /// A bare path is shorthand for `classify <path>`.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        match (word.to_ascii_lowercase().as_str(), rest) {
            ("", _) => ShellCommand::Empty,
            ("classify", "") => ShellCommand::Unknown(line.to_string()),
            ("classify", path) => ShellCommand::Classify(PathBuf::from(path)),
            ("history", "") => ShellCommand::History,
            ("last", "") => ShellCommand::Last,
            ("clear", "") => ShellCommand::Clear,
            ("theme", mode) => match mode.to_ascii_lowercase().as_str() {
                "color" | "colour" => ShellCommand::Theme(Theme::Color),
                "plain" => ShellCommand::Theme(Theme::Plain),
                _ => ShellCommand::Unknown(line.to_string()),
            },
            ("help" | "?", "") => ShellCommand::Help,
            ("quit" | "exit", "") => ShellCommand::Quit,
            (_, _) if word.contains('.') || word.contains('/') => {
                ShellCommand::Classify(PathBuf::from(line))
            }
            _ => ShellCommand::Unknown(line.to_string()),
        }
    }
}

pub const SHELL_HELP: &str = "\
 Commands:
   <file> | classify <file>   classify a CSV file or JSON schema
   history                    recent runs with per-column results
   last                       results of the most recent run
   clear                      forget every recorded run
   theme color|plain          switch output styling
   help                       show this list
   quit | exit | Ctrl-D       leave the shell";
