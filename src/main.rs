//! Pagesmith - local page assembly from PDFs and images
//!
//! Command-line entry point.
//!
//! # Overview
//!
//! The binary drives a headless [`EditorSession`] end to end:
//! - `pagesmith merge a.pdf b.png`: every page of every file, in order
//! - `pagesmith edit a.pdf b.pdf --op "select 1-2" --op "move 1 5" [--extract]`:
//!   flatten the files into one page sequence, apply edit commands, then save
//!   the whole sequence or extract the selection
//!
//! # Execution Flow
//!
//! 1. Load settings from `Pagesmith Data/Pagesmith Settings.yaml` and `PAGESMITH_*`
//! 2. Initialize logging → `logs/pagesmith.<date>`
//! 3. Create tokio runtime with 4 worker threads
//! 4. Add the input files and wait until every file is parsed
//! 5. Run the requested assembly and wait for its artifact
//! 6. Write the artifact to the output directory and print its path (or a
//!    JSON report with `--json`)
//! 7. Shutdown tokio runtime with 5s timeout

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use pagesmith::logging::{self, LoggingOptions};
use pagesmith::models::DocumentStatus;
use pagesmith::script::ScriptParser;
use pagesmith::worker::PdfProcessor;
use pagesmith::{
    APP_NAME, ConfigManager, EditorSession, RawUpload, Settings, TaskKind, VERSION, export,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "pagesmith", version, about = "Reorder, rotate, extract and merge pages from PDFs and images")]
struct Cli {
    /// Directory holding Pagesmith Settings.yaml
    #[arg(long, default_value = "Pagesmith Data", global = true)]
    config_dir: Utf8PathBuf,

    /// Where produced documents are written (overrides the settings file)
    #[arg(long, global = true)]
    output_dir: Option<Utf8PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    /// Print a JSON report instead of the bare output path
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Merge every page of every file, in the order given
    Merge {
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,
    },

    /// Flatten the files into pages, apply edit commands, then save or extract
    Edit {
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,

        /// Edit command such as "rotate 2", "select 1-3" or "move 1 4"; repeatable
        #[arg(long = "op", short = 'o')]
        ops: Vec<String>,

        /// Extract the selected pages instead of saving the whole sequence
        #[arg(long)]
        extract: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let mut settings = config_manager.load_settings()?;
    if cli.debug {
        settings.debug_mode = true;
    }
    if let Some(output_dir) = cli.output_dir {
        settings.output_dir = output_dir.into_string();
    }

    let _log_guard = logging::setup_logging(&LoggingOptions {
        log_dir: Utf8PathBuf::from(&settings.log_dir),
        prefix: "pagesmith".to_string(),
        debug: settings.debug_mode,
        console: true,
        json: settings.json_logs,
    })?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    // Parsing and assembly run on the blocking pool; these threads only
    // drive the session
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("pagesmith-worker")
        .build()?;

    tracing::info!("Tokio runtime initialized with {} worker threads", 4);

    let result = runtime.block_on(run(cli.command, settings, cli.json));

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    result.inspect_err(|e| tracing::error!("{:#}", e))
}

/// What the binary prints with `--json`
#[derive(Debug, Serialize)]
struct Report<'a> {
    kind: TaskKind,
    path: &'a str,
    bytes: usize,
    files: usize,
}

async fn run(command: Command, settings: Settings, json: bool) -> Result<()> {
    let processor = Arc::new(PdfProcessor::new(&settings));
    let session = EditorSession::new(settings.clone(), processor)?;
    let timeout = settings.wait_timeout();

    let (files, kind) = match &command {
        Command::Merge { files } => (files, TaskKind::Save),
        Command::Edit { files, extract, .. } => (
            files,
            if *extract {
                TaskKind::Extract
            } else {
                TaskKind::Save
            },
        ),
    };

    let uploads = files
        .iter()
        .map(|path| RawUpload::from_path(path))
        .collect::<Result<Vec<_>>>()?;
    if session.add_uploads(uploads) == 0 {
        bail!("None of the inputs is a PDF, JPEG or PNG file");
    }

    session
        .wait_for_files_settled(timeout)
        .await
        .context("Files were not parsed in time")?;
    ensure_all_parsed(&session)?;

    let started = match command {
        Command::Merge { .. } => session.merge_files(),
        Command::Edit { ops, extract, .. } => {
            session.init_page_editor();

            let parser = ScriptParser::new();
            for op in &ops {
                for edit in parser.parse_script(op)? {
                    let applied = session.run_command(edit)?;
                    tracing::info!("{}: {}", edit, if applied { "applied" } else { "no change" });
                }
            }

            if extract {
                session.extract_selected()
            } else {
                session.save()
            }
        }
    };
    if !started {
        bail!("Nothing to {}: no pages", kind);
    }

    let artifact = session
        .wait_for_artifact(kind, timeout)
        .await
        .with_context(|| latest_message(&session))?;
    let path = export::write_artifact(Utf8Path::new(&settings.output_dir), kind, &artifact)?;
    if json {
        let report = Report {
            kind,
            path: path.as_str(),
            bytes: artifact.bytes.len(),
            files: session.read(|state| state.files.len()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", path);
    }

    session.metrics().log_summary();
    Ok(())
}

/// Fail with the names of any files that could not be parsed
fn ensure_all_parsed(session: &EditorSession) -> Result<()> {
    let failed: Vec<String> = session.read(|state| {
        state
            .files
            .values()
            .filter(|doc| doc.status == DocumentStatus::Error)
            .map(|doc| doc.name.clone())
            .collect()
    });

    if !failed.is_empty() {
        bail!("Could not read {}: {}", failed.join(", "), latest_message(session));
    }
    Ok(())
}

fn latest_message(session: &EditorSession) -> String {
    session.read(|state| {
        state
            .notifications
            .latest()
            .map(|n| n.message.clone())
            .unwrap_or_default()
    })
}
