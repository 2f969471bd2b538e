//! MIGOP - make tracked changes visible and version the result.
//!
//! Runs the three-phase workflow against a DOCX file on disk and offers
//! helpers for version identifiers and the recorded version history.

#![allow(clippy::single_match_else)]

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use migop::version::ParsedVersion;
use migop::{
    Config, FileGateway, ResumeInput, VersionIdentifier, WorkflowController, WorkflowEvent,
    WorkflowState,
};

/// Make tracked changes visible and version the result
#[derive(Parser)]
#[command(name = "migop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workflow on a DOCX file
    Run {
        /// Document to process
        docx: PathBuf,

        /// Write the rebuilt document here instead of replacing the input
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record an official version in the version history
        #[arg(long, requires_all = ["committee", "comments"])]
        official: bool,

        /// Approving committee (key or display name)
        #[arg(long)]
        committee: Option<String>,

        /// Comments for the version history entry
        #[arg(long)]
        comments: Option<String>,

        /// Don't wait at pause points
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Generate or decode version identifiers
    Version {
        #[command(subcommand)]
        operation: VersionOperation,
    },

    /// Show the version history recorded for a document
    History {
        /// Document whose history to show
        docx: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum VersionOperation {
    /// Generate an identifier
    Generate {
        /// Version counter
        counter: u64,

        /// Version type tag (B, A or O)
        #[arg(value_name = "TYPE")]
        kind: String,

        /// Timestamp as "YYYY-MM-DD HH:MM:SS" (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Decode an identifier
    Parse {
        /// Identifier such as 1:B:25:10:04:09:15:30
        id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        Commands::Run { docx, output, official, committee, comments, yes } => {
            let resume = if official {
                ResumeInput { is_official: true, committee, comments }
            } else {
                ResumeInput::unofficial()
            };
            cmd_run(docx, output, resume, yes)?;
        }
        Commands::Version { operation } => match operation {
            VersionOperation::Generate { counter, kind, at } => {
                cmd_version_generate(counter, &kind, at.as_deref())?;
            }
            VersionOperation::Parse { id } => cmd_version_parse(&id)?,
        },
        Commands::History { docx, format } => cmd_history(docx, &format)?,
        Commands::Config { path } => cmd_config(path)?,
        Commands::Completions { shell } => cmd_completions(shell),
    }

    Ok(())
}

/// Drive the workflow to completion on a local file.
fn cmd_run(
    docx: PathBuf,
    output: Option<PathBuf>,
    final_input: ResumeInput,
    skip_pauses: bool,
) -> Result<()> {
    if !docx.is_file() {
        anyhow::bail!("Document not found: {}", docx.display());
    }

    let config = Config::load()?;
    let gateway = match output {
        Some(output) => FileGateway::with_output(docx, output),
        None => FileGateway::new(docx),
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let controller = WorkflowController::builder(Arc::new(gateway)).config(config).build();
        let mut events = controller.subscribe();

        controller.start_workflow();
        loop {
            let state = controller.settled().await;
            let failure = drain_events(&mut events);

            match state {
                WorkflowState::Version1Pause => {
                    let version = controller.workflow_data().phase1.version_number;
                    pause("Save the Before version", version.as_ref(), skip_pauses)?;
                    controller.resume_workflow(ResumeInput::unofficial());
                }
                WorkflowState::Version2Pause => {
                    let version = controller.workflow_data().phase2.version_number;
                    pause("Save the After version", version.as_ref(), skip_pauses)?;
                    controller.resume_workflow(final_input.clone());
                }
                WorkflowState::Complete => return Ok(()),
                WorkflowState::Error => {
                    anyhow::bail!(failure.unwrap_or_else(|| "Workflow failed".to_string()));
                }
                WorkflowState::Idle => anyhow::bail!("Workflow was reset"),
                other => anyhow::bail!("Workflow stopped in unexpected state {other}"),
            }
        }
    })
}

/// Print pending events. Returns the failure message, if one was seen.
fn drain_events(events: &mut UnboundedReceiver<WorkflowEvent>) -> Option<String> {
    let mut failure = None;

    while let Ok(event) = events.try_recv() {
        match event {
            WorkflowEvent::StateChanged { new, .. } => println!("[{}] {}", new, new.description()),
            WorkflowEvent::Status { message, .. } => println!("  {message}"),
            WorkflowEvent::Failed { message, detail, state, .. } => {
                eprintln!("Error during {state}: {message}");
                if let Some(detail) = detail.filter(|d| !message.contains(d.as_str())) {
                    eprintln!("  {detail}");
                }
                failure = Some(message);
            }
            WorkflowEvent::Completed { summary } => {
                println!(
                    "\nProcessed {} suggestions ({} insertions, {} deletions)",
                    summary.suggestions_count, summary.insertions, summary.deletions
                );
                if let Some(version) = summary.final_version {
                    println!("Final version: {version}");
                }
                if summary.is_official {
                    println!("Official version recorded in the version history");
                }
            }
        }
    }

    failure
}

fn pause(action: &str, version: Option<&VersionIdentifier>, skip: bool) -> Result<()> {
    if let Some(version) = version {
        println!("\n{action}: {version}");
    }
    if skip {
        return Ok(());
    }

    print!("Press Enter to continue...");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(())
}

fn cmd_version_generate(counter: u64, kind: &str, at: Option<&str>) -> Result<()> {
    let at = match at {
        Some(text) => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
            .with_context(|| format!("Invalid timestamp '{text}' (expected YYYY-MM-DD HH:MM:SS)"))?,
        None => chrono::Local::now().naive_local(),
    };

    let id = VersionIdentifier::generate_tagged(counter, kind, at)?;
    println!("{id}");
    Ok(())
}

fn cmd_version_parse(id: &str) -> Result<()> {
    let parsed: ParsedVersion = id.parse()?;

    println!("Sequence: {}", parsed.sequence);
    println!("Type:     {} ({})", parsed.kind.tag(), parsed.kind.label());
    println!(
        "Date:     {}-{:02}-{:02} {:02}:{:02}:{:02}",
        parsed.full_year(),
        parsed.month,
        parsed.day,
        parsed.hour,
        parsed.minute,
        parsed.second
    );
    println!("Display:  {}", parsed.format_for_display());
    Ok(())
}

fn cmd_history(docx: PathBuf, format: &str) -> Result<()> {
    let gateway = FileGateway::new(docx);
    let rt = tokio::runtime::Runtime::new()?;
    let entries = rt.block_on(gateway.history())?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No version history recorded for {}", gateway.source().display());
        return Ok(());
    }

    for entry in &entries {
        println!("{}  {}", entry.version_number, entry.timestamp);
        println!("  Committee: {}", entry.committee);
        for line in entry.comments.lines() {
            println!("  {line}");
        }
        println!();
    }
    println!("Total: {} entries", entries.len());

    Ok(())
}

fn cmd_config(show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::global_path() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = Config::load()?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "migop", &mut io::stdout());
}
