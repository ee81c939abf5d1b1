//! `sensitivity-checkr` — classify dataset columns by data sensitivity with a hosted LLM.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]) and set up logging.
//! 2. Load config ([`config::load_config`]) and the API key ([`config::load_api_key`]).
//! 3. Normalize each input into column descriptors ([`schema::load_input`]).
//! 4. Build the prompt, call the model with retry, parse the reply ([`classifier`]).
//! 5. Record the run in the session history ([`session`]).
//! 6. Render the result and write the requested exports ([`report`]).
//! 7. Exit `0` (every batch classified) or `1` (at least one batch failed).
//!
//! `shell` runs steps 3-6 once per typed path and adds commands to browse,
//! clear, and restyle the session history.

mod classifier;
mod cli;
mod config;
mod demo;
mod error;
mod labels;
mod models;
mod report;
mod schema;
mod session;

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use classifier::client::{GeminiBackend, ModelBackend};
use classifier::Classifier;
use cli::{
    ClassifyArgs, Cli, Command, DemoArgs, PromptArgs, ReportFormat, ShellArgs, ShellCommand, SHELL_HELP,
};
use config::{load_api_key, load_config};
use error::ClassifyError;
use models::ClassificationBatch;
use report::export::{write_exports, ExportFormat, ExportMeta};
use report::terminal;
use schema::NormalizedInput;
use session::{Session, Theme};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let theme = if cli.no_color { Theme::Plain } else { Theme::Color };

    match cli.command {
        Command::Classify(args) => {
            let failures = run_classify(args, theme, cli.quiet).await?;
            // Exit code: 1 if any batch failed
            if failures > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Prompt(args) => run_prompt(args),
        Command::Demo(args) => run_demo(args, cli.quiet),
        Command::Shell(args) => run_shell(args, theme, cli.quiet).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// How one input ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Classified,
    Skipped,
    Failed,
}

/// Output settings shared by `classify` and `shell`.
struct RunOptions<'a> {
    report: ReportFormat,
    export: &'a [ExportFormat],
    out_dir: &'a Path,
    quiet: bool,
}

fn build_classifier(config_override: Option<&Path>) -> Result<Classifier<GeminiBackend>> {
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    let config = load_config(&cwd, config_override)?;
    let api_key = load_api_key(&config.model.api_key_env)?;
    let backend = GeminiBackend::new(&config.model, api_key)?;
    Ok(Classifier::new(backend, &config))
}

/// Classify every input in order; returns the number of failed batches.
async fn run_classify(args: ClassifyArgs, theme: Theme, quiet: bool) -> Result<usize> {
    let classifier = build_classifier(args.config.as_deref())?;
    let mut session = Session::new(theme);
    let opts = RunOptions {
        report: args.report,
        export: &args.export,
        out_dir: &args.out_dir,
        quiet,
    };
    terminal::render_banner(quiet || opts.report != ReportFormat::Terminal);

    let mut failures = 0;
    for path in &args.inputs {
        if process_input(&classifier, &mut session, path, &opts).await? == Outcome::Failed {
            failures += 1;
        }
    }

    if args.history {
        let report = terminal::history_report(session.history.list());
        // Keep stdout a single JSON stream
        match args.report {
            ReportFormat::Terminal => print!("{}", report),
            ReportFormat::Json => eprint!("{}", report),
        }
    }

    info!(inputs = args.inputs.len(), failures, "session finished");
    Ok(failures)
}

/// Load, classify, record, render and export one input.
async fn process_input<B: ModelBackend>(
    classifier: &Classifier<B>,
    session: &mut Session,
    path: &Path,
    opts: &RunOptions<'_>,
) -> Result<Outcome> {
    let terminal_report = opts.report == ReportFormat::Terminal;

    let input = match schema::load_input(path) {
        Ok(input) => input,
        Err(err) => {
            error!(path = %path.display(), %err, "input rejected");
            terminal::render_failure(&path.display().to_string(), &err);
            return Ok(Outcome::Failed);
        }
    };
    session.set_last_input(&input.source_name);

    let batch = match classify_pending(classifier, &input, opts.quiet || !terminal_report).await? {
        Ok(batch) => batch,
        Err(ClassifyError::Cancelled) => {
            let source = session.last_input().unwrap_or(&input.source_name);
            warn!(source, "classification cancelled");
            eprintln!(" {} {}: cancelled", "[SKIP]".yellow().bold(), source);
            return Ok(Outcome::Skipped);
        }
        Err(err) => {
            error!(source = %input.source_name, %err, "batch aborted");
            terminal::render_failure(&input.source_name, &err);
            return Ok(Outcome::Failed);
        }
    };

    if batch.has_warnings() {
        warn!(source = %input.source_name, "some columns need review");
    }
    session.history.record(&input.source_name, batch.results.clone());

    match opts.report {
        ReportFormat::Terminal => terminal::render_batch(&input.source_name, &batch, opts.quiet),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&batch)?),
    }

    if opts.export.is_empty() {
        return Ok(Outcome::Classified);
    }

    let meta = ExportMeta {
        source_name: input.source_name.clone(),
        model: batch.model.clone(),
        generated_at: Utc::now(),
    };
    match write_exports(
        opts.out_dir,
        opts.export,
        &meta,
        &input.table,
        &input.columns,
        &batch.results,
    ) {
        Ok(written) => {
            if !opts.quiet {
                for p in written {
                    eprintln!("  {} wrote {}", "→".cyan(), p.display());
                }
            }
            Ok(Outcome::Classified)
        }
        Err(err) => {
            error!(source = %input.source_name, error = %err, "export failed");
            eprintln!(" {} {}: {:#}", "[ERROR]".red().bold(), input.source_name, err);
            Ok(Outcome::Failed)
        }
    }
}

/// Read commands from stdin until `quit` or end of input.
async fn run_shell(args: ShellArgs, theme: Theme, quiet: bool) -> Result<()> {
    let classifier = build_classifier(args.config.as_deref())?;
    let mut session = Session::new(theme);
    let opts = RunOptions {
        report: ReportFormat::Terminal,
        export: &args.export,
        out_dir: &args.out_dir,
        quiet,
    };
    terminal::render_banner(quiet);
    if !quiet {
        eprintln!("{}\n", SHELL_HELP);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut failures = 0;

    loop {
        eprint!("{} ", ">".cyan().bold());
        std::io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
            eprintln!();
            break;
        };

        match ShellCommand::parse(&line) {
            ShellCommand::Empty => {}
            ShellCommand::Quit => break,
            ShellCommand::Help => eprintln!("{}", SHELL_HELP),
            ShellCommand::Classify(path) => {
                if process_input(&classifier, &mut session, &path, &opts).await? == Outcome::Failed {
                    failures += 1;
                }
            }
            ShellCommand::History => {
                if session.history.is_empty() {
                    eprintln!(" No classification runs in this session.");
                } else {
                    print!("{}", terminal::history_report(session.history.list()));
                }
            }
            ShellCommand::Last => match session.history.latest() {
                Some(entry) => print!("{}", terminal::entry_report(entry)),
                None => eprintln!(" No classification runs in this session."),
            },
            ShellCommand::Clear => {
                let removed = session.history.clear();
                eprintln!("  {} cleared {} run(s)", "→".cyan(), removed);
            }
            ShellCommand::Theme(theme) => {
                session.set_theme(theme);
                eprintln!("  {} theme set to {:?}", "→".cyan(), session.theme());
            }
            ShellCommand::Unknown(text) => {
                eprintln!(
                    " {} unknown command `{}` (type `help`)",
                    "[WARN]".yellow().bold(),
                    text
                );
            }
        }
    }

    info!(runs = session.history.len(), failures, "shell closed");
    Ok(())
}

/// Run one batch behind a spinner. Ctrl-C abandons the pending call.
async fn classify_pending<B: ModelBackend>(
    classifier: &Classifier<B>,
    input: &NormalizedInput,
    quiet: bool,
) -> Result<Result<ClassificationBatch, ClassifyError>> {
    let spinner = if !quiet {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
        );
        pb.set_message(format!(
            "Classifying {} columns from {} with {}",
            input.columns.len(),
            input.source_name,
            classifier.model_name()
        ));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let (pending, handle) = classifier::cancellable(classifier.classify(&input.columns));
    tokio::pin!(pending);

    let outcome = tokio::select! {
        result = &mut pending => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            handle.abort();
            pending.await
        }
    };

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    Ok(outcome)
}

/// Print the prompt an input would produce. No network access, no API key needed.
fn run_prompt(args: PromptArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    let config = load_config(&cwd, args.config.as_deref())?;
    let input = schema::load_input(&args.input)?;
    let request =
        classifier::prompt::build_request(&input.columns, &config.generation, &config.prompt)?;

    println!("{}", request.prompt);
    eprintln!(
        "  {} {} columns, ~{} tokens",
        "→".cyan(),
        request.columns.len(),
        classifier::prompt::estimate_tokens(&request.prompt)
    );
    Ok(())
}

fn run_demo(args: DemoArgs, quiet: bool) -> Result<()> {
    let table = demo::generate(args.rows, args.seed);
    demo::write_csv(&table, &args.output)?;
    if !quiet {
        eprintln!(
            "  {} wrote {} rows x {} columns to {}",
            "→".cyan(),
            table.rows.len(),
            table.headers.len(),
            args.output.display()
        );
    }
    Ok(())
}
