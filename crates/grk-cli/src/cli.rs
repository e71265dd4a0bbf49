//! CLI definition and command dispatch for GRK.
//!
//! ## Configuration Precedence
//!
//! 1. CLI flags (`--config`, `--verbose`, `--color`)
//! 2. Environment variables (`GRK_CONFIG`, `GRK_VERBOSE`, `GRK_COLOR`)
//! 3. Project config (`.grounded/config.yaml`) over global config
//!    (`~/.grk/config.yaml` or the `--config` path)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::ui::color::terminal_width;
use crate::ui::{format, table, ColorMode, MessageType, Progress, ProgressMode, Style};

use grk_core::response::suggestions;
use grk_core::{
    AskOptions, AskOutcome, BuildKind, BuildOutcome, BuildReport, ChangeSet, GrkEngine, GrkError,
    Workspace,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Grounded Retrieval Kernel: answer questions about a codebase from its own source
#[derive(Parser, Debug)]
#[command(name = "grk")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "GRK_VERBOSE")]
    pub verbose: bool,

    /// Suppress progress and informational messages
    #[arg(short, long, global = true, env = "GRK_QUIET")]
    pub quiet: bool,

    /// Path to the global configuration file (default: ~/.grk/config.yaml)
    #[arg(long, global = true, env = "GRK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Color output mode
    #[arg(long, global = true, env = "GRK_COLOR", value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create `.grounded/` with a starter project config
    #[command(after_help = r#"EXAMPLES:
    # Initialize the current project
    grk init

    # Typical first-time workflow
    grk init && grk build
"#)]
    Init {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Scan the project and publish a new knowledge-base scan
    #[command(after_help = r#"EXAMPLES:
    # Full scan of the project
    grk build

    # Machine-readable summary
    grk build --json | jq '.stats.chunkCount'
"#)]
    Build {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Publish a scan derived from the current one plus a set of changed files
    #[command(after_help = r#"EXAMPLES:
    # One modified file
    grk rebuild --modified app/Http/Controllers/LoginController.php

    # Feed from git
    grk rebuild $(git diff --name-only HEAD~1 | sed 's/^/--modified /')

    # Mixed change set
    grk rebuild --added src/new.rs --deleted src/old.rs
"#)]
    Rebuild {
        /// File added since the current scan (repeatable)
        #[arg(long = "added", value_name = "PATH")]
        added: Vec<String>,

        /// File modified since the current scan (repeatable)
        #[arg(long = "modified", value_name = "PATH")]
        modified: Vec<String>,

        /// File deleted since the current scan (repeatable)
        #[arg(long = "deleted", value_name = "PATH")]
        deleted: Vec<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show project, scan and model status
    #[command(after_help = r#"EXAMPLES:
    grk status
    grk status --json | jq '.currentScan.scanId'
"#)]
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List retained scans, newest first
    #[command(after_help = r#"EXAMPLES:
    grk scans
    grk scans --json
"#)]
    Scans {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Cross-check the current scan's file index against its chunk set
    #[command(after_help = r#"EXAMPLES:
    grk validate
    grk validate --json | jq '.missingCount'
"#)]
    Validate {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check chunk ids in the current scan for legacy formats and drift
    #[command(name = "verify-ids")]
    #[command(after_help = r#"EXAMPLES:
    # Report only
    grk verify-ids

    # Rewrite legacy ids and publish a migration scan
    grk verify-ids --migrate
"#)]
    VerifyIds {
        /// Publish a scan with legacy ids rewritten
        #[arg(long)]
        migrate: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the chunks a question would be answered from
    #[command(after_help = r#"EXAMPLES:
    grk retrieve "How does LoginController authenticate users?"
    grk retrieve "POST /api/orders" --json | jq '.chunks[].chunk.path'
"#)]
    Retrieve {
        /// The question or search text
        query: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from retrieved project code, with an audit of the evidence
    #[command(after_help = r#"EXAMPLES:
    grk ask "Where is the cart total calculated?"

    # Inspect the prompt without calling the model
    grk ask "How are sessions stored?" --prompt-only

    # Full structured result
    grk ask "What validates login input?" --json | jq '.answer.confidence'
"#)]
    Ask {
        /// The question to answer
        question: String,

        /// Print the prompt instead of calling the model
        #[arg(long)]
        prompt_only: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Entry point
// ============================================================================

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Warnings always show (config issues, skipped records); debug under --verbose.
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = format!(
        "grk_core={},grk_db={},grk_cli={}",
        log_level, log_level, log_level
    );

    tracing_subscriber::fmt()
        .with_env_filter(&filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let style = Style::new(cli.color).with_quiet(cli.quiet);

    let workspace = match Workspace::resolve(Path::new(".")) {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!(
                "{}",
                style.message(MessageType::Err, &format!("Failed to resolve project: {}", e))
            );
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(
        "Project root {} (initialized: {})",
        workspace.root().display(),
        workspace.is_initialized()
    );

    let engine = match build_engine(cli.config.as_deref(), &workspace) {
        Ok(engine) => engine,
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check ~/.grk/config.yaml and .grounded/config.yaml".to_string(),
            };
            let cause = e.chain().nth(1).map(|c| c.to_string());
            eprintln!(
                "{}",
                style.error_with_context(&e.to_string(), cause.as_deref(), Some(&hint))
            );
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Init { json } => handle_init(&style, &engine, &workspace, json),
        Command::Build { json } => handle_build(&style, &engine, &workspace, json),
        Command::Rebuild {
            added,
            modified,
            deleted,
            json,
        } => {
            let changes = ChangeSet {
                added,
                modified,
                deleted,
            };
            handle_rebuild(&style, &engine, &workspace, &changes, json)
        }
        Command::Status { json } => handle_status(&style, &engine, &workspace, json),
        Command::Scans { json } => handle_scans(&style, &engine, &workspace, json),
        Command::Validate { json } => handle_validate(&style, &engine, &workspace, json),
        Command::VerifyIds { migrate, json } => {
            handle_verify_ids(&style, &engine, &workspace, migrate, json)
        }
        Command::Retrieve { query, json } => handle_retrieve(&style, &engine, &workspace, &query, json),
        Command::Ask {
            question,
            prompt_only,
            json,
        } => handle_ask(&style, &engine, &workspace, &question, prompt_only, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                style.error_with_context(&e.to_string(), None, error_hint(&e))
            );
            ExitCode::FAILURE
        }
    }
}

fn build_engine(config: Option<&Path>, workspace: &Workspace) -> anyhow::Result<GrkEngine> {
    GrkEngine::load(config, workspace).context("Failed to initialize GRK engine")
}

fn error_hint(error: &GrkError) -> Option<&'static str> {
    match error {
        GrkError::NotInitialized => Some("Run `grk init` in the project root"),
        GrkError::KnowledgeBaseUnavailable { .. } | GrkError::ScanNotFound(_) => {
            Some("Run `grk build` to publish a scan")
        }
        GrkError::ModelProvider { .. } | GrkError::ModelUnavailable { .. } => {
            Some("Check the `model` section of your config (provider, modelId, baseUrl)")
        }
        GrkError::UnsupportedSchema { .. } => Some("Run `grk build` to publish a scan in the current format"),
        _ => None,
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// ============================================================================
// Command handlers
// ============================================================================

fn handle_init(style: &Style, engine: &GrkEngine, workspace: &Workspace, json: bool) -> Result<(), GrkError> {
    match engine.init(workspace) {
        Ok(report) => {
            if json {
                print_json(&report);
                return Ok(());
            }
            style.print(
                MessageType::Ok,
                &format!(
                    "Initialized GRK project `{}` at {}",
                    report.project,
                    style.file_path(&report.data_dir.display().to_string())
                ),
            );
            println!(
                "{}",
                style.message_detail("Config", &report.config_path.display().to_string())
            );
            style.print(MessageType::Hint, "Run `grk build` to index the project");
            Ok(())
        }
        Err(GrkError::AlreadyInitialized { data_dir }) => {
            if json {
                print_json(&serde_json::json!({
                    "alreadyInitialized": true,
                    "dataDir": data_dir,
                }));
            } else {
                style.print(
                    MessageType::Info,
                    &format!("Project already initialized at {}", data_dir.display()),
                );
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn handle_build(style: &Style, engine: &GrkEngine, workspace: &Workspace, json: bool) -> Result<(), GrkError> {
    let progress = Progress::spinner("Scanning project", ProgressMode::detect(style.is_quiet(), json));
    let outcome = engine.build(workspace);
    progress.finish();
    print_build_outcome(style, &outcome?, json);
    Ok(())
}

fn handle_rebuild(
    style: &Style,
    engine: &GrkEngine,
    workspace: &Workspace,
    changes: &ChangeSet,
    json: bool,
) -> Result<(), GrkError> {
    let progress = Progress::spinner("Rebuilding changed files", ProgressMode::detect(style.is_quiet(), json));
    let outcome = engine.rebuild(workspace, changes);
    progress.finish();
    print_build_outcome(style, &outcome?, json);
    Ok(())
}

fn print_build_outcome(style: &Style, outcome: &BuildOutcome, json: bool) {
    if json {
        print_json(outcome);
        return;
    }
    match outcome {
        BuildOutcome::Published(report) => print_build_report(style, report),
        BuildOutcome::Skipped { lock_path } => {
            style.print(
                MessageType::Skip,
                &format!(
                    "Another build holds the lease at {}; nothing published",
                    lock_path.display()
                ),
            );
        }
    }
}

fn print_build_report(style: &Style, report: &BuildReport) {
    let verb = match report.kind {
        BuildKind::Full => "Published scan",
        BuildKind::Incremental => "Published incremental scan",
        BuildKind::Migration => "Published migration scan",
    };
    style.print(
        MessageType::Ok,
        &format!(
            "{} {} ({} files, {} chunks) in {}",
            verb,
            style.scan_id(&report.scan_id),
            format::format_thousands(report.stats.file_count),
            format::format_thousands(report.stats.chunk_count),
            format::format_millis(report.elapsed_ms)
        ),
    );

    if style.is_quiet() {
        return;
    }
    if let Some(parent) = &report.parent_scan {
        println!("{}", style.message_detail("Parent", parent));
    }
    if let Some(head) = &report.head_commit {
        println!("{}", style.message_detail("Head", head));
    }
    println!(
        "{}",
        style.message_detail(
            "Indexed",
            &format!(
                "{} files, {} lines, {}",
                format::format_thousands(report.stats.indexed_file_count),
                format::format_thousands(report.stats.total_lines),
                format::format_bytes(report.stats.total_bytes)
            )
        )
    );
    println!(
        "{}",
        style.message_detail("File index", &report.file_index_format.to_string())
    );
    if let Some(changes) = &report.changes {
        println!(
            "{}",
            style.message_detail(
                "Changes",
                &format!(
                    "{} added, {} modified, {} deleted ({} chunks written, {} removed)",
                    changes.added_files,
                    changes.modified_files,
                    changes.deleted_files,
                    changes.chunks_written,
                    changes.chunks_removed
                )
            )
        );
    }
    if let Some(migrated) = report.ids_migrated {
        println!("{}", style.message_detail("Ids migrated", &migrated.to_string()));
    }
    if !report.pruned.is_empty() {
        println!("{}", style.message_detail("Pruned", &report.pruned.len().to_string()));
        for scan_id in &report.pruned {
            println!("{}", style.list_item("-", scan_id));
        }
    }
}

fn handle_status(style: &Style, engine: &GrkEngine, workspace: &Workspace, json: bool) -> Result<(), GrkError> {
    let status = engine.status(workspace)?;
    if json {
        print_json(&status);
        return Ok(());
    }

    if !status.initialized {
        style.print(
            MessageType::Warn,
            &format!("No GRK project at {}", status.root.display()),
        );
        style.print(MessageType::Hint, "Run `grk init` to create one");
        return Ok(());
    }

    println!("{}", style.section("Project"));
    println!("  {}", style.key_value("Name", &status.project));
    println!(
        "  {}",
        style.key_value("Root", &style.file_path(&status.root.display().to_string()))
    );
    println!(
        "  {}",
        style.key_value("Model", &format!("{} / {}", status.model_provider, status.model_id))
    );
    println!();

    println!("{}", style.section("Knowledge base"));
    match &status.current_scan {
        Some(scan) => {
            println!(
                "  {}",
                style.key_value(
                    "Current scan",
                    &format!(
                        "{} ({})",
                        style.scan_id(&scan.scan_id),
                        format::format_relative_time(scan.created_at)
                    )
                )
            );
            println!(
                "  {}",
                style.key_value("Files", &format::format_thousands(scan.stats.file_count))
            );
            println!(
                "  {}",
                style.key_value("Chunks", &format::format_thousands(scan.stats.chunk_count))
            );
            if let Some(head) = &scan.head_commit {
                println!("  {}", style.key_value("Head", head));
            }
        }
        None => {
            println!("  {}", style.key_value("Current scan", &style.dim("none")));
        }
    }
    println!("  {}", style.key_value("Scans kept", &status.scan_count.to_string()));
    println!(
        "  {}",
        style.key_value("Stack facts", if status.has_stack_facts { "yes" } else { "no" })
    );
    println!(
        "  {}",
        style.key_value("Route index", if status.has_route_index { "yes" } else { "no" })
    );
    println!("  {}", style.key_value("Questions asked", &status.ask_count.to_string()));

    if status.current_scan.is_none() {
        println!();
        style.print(MessageType::Hint, "Run `grk build` to publish the first scan");
    }
    Ok(())
}

fn handle_scans(style: &Style, engine: &GrkEngine, workspace: &Workspace, json: bool) -> Result<(), GrkError> {
    let listing = engine.scans(workspace)?;
    if json {
        print_json(&listing);
        return Ok(());
    }
    if listing.scans.is_empty() {
        style.print(MessageType::Info, "No scans published yet");
        style.print(MessageType::Hint, "Run `grk build`");
        return Ok(());
    }
    println!(
        "{}",
        table::render_scans_table(&listing.scans, listing.current.as_deref())
    );
    Ok(())
}

fn handle_validate(style: &Style, engine: &GrkEngine, workspace: &Workspace, json: bool) -> Result<(), GrkError> {
    let report = engine.validate(workspace)?;
    if json {
        print_json(&report);
        return Ok(());
    }

    if report.is_consistent() {
        style.print(
            MessageType::Ok,
            &format!(
                "Scan {} is consistent ({} files, {} chunks)",
                style.scan_id(&report.scan_id),
                report.file_count,
                report.chunk_count
            ),
        );
        return Ok(());
    }

    style.print(
        MessageType::Warn,
        &format!(
            "Scan {} has inconsistencies",
            style.scan_id(&report.scan_id)
        ),
    );
    let groups = [
        ("Missing chunks", report.missing_count, &report.missing_samples),
        ("Orphaned chunks", report.orphaned_count, &report.orphaned_samples),
        ("Duplicate ids", report.duplicate_count, &report.duplicate_samples),
    ];
    for (label, count, samples) in groups {
        if count == 0 {
            continue;
        }
        println!("{}", style.message_detail(label, &count.to_string()));
        for id in samples.iter() {
            println!("{}", style.list_item("-", id));
        }
    }
    style.print(MessageType::Hint, "Run `grk build` to publish a fresh scan");
    Ok(())
}

fn handle_verify_ids(
    style: &Style,
    engine: &GrkEngine,
    workspace: &Workspace,
    migrate: bool,
    json: bool,
) -> Result<(), GrkError> {
    let progress = Progress::spinner("Verifying chunk ids", ProgressMode::detect(style.is_quiet(), json));
    let verification = engine.verify_ids(workspace, migrate);
    progress.finish();
    let verification = verification?;

    if json {
        print_json(&verification);
        return Ok(());
    }

    let report = &verification.report;
    if report.is_clean() {
        style.print(
            MessageType::Ok,
            &format!(
                "All {} chunk ids in scan {} are current",
                report.total,
                style.scan_id(&verification.scan_id)
            ),
        );
    } else {
        style.print(
            MessageType::Warn,
            &format!(
                "Scan {} has {} of {} chunk ids needing attention",
                style.scan_id(&verification.scan_id),
                report.total - report.current,
                report.total
            ),
        );
        println!("{}", style.message_detail("Current", &report.current.to_string()));
        println!("{}", style.message_detail("Legacy v2", &report.legacy_v2.to_string()));
        println!("{}", style.message_detail("Legacy v1", &report.legacy_v1.to_string()));
        println!(
            "{}",
            style.message_detail("Unrecognized", &report.unrecognized.to_string())
        );
        if !report.drifted.is_empty() {
            println!(
                "{}",
                style.message_detail("Drifted", &report.drifted.len().to_string())
            );
            for id in &report.drifted {
                println!("{}", style.list_item("~", id));
            }
        }
    }

    match &verification.migration {
        Some(outcome) => print_build_outcome(style, outcome, false),
        None if report.needs_migration() > 0 => {
            style.print(
                MessageType::Hint,
                "Run `grk verify-ids --migrate` to rewrite legacy ids",
            );
        }
        None => {}
    }
    Ok(())
}

fn handle_retrieve(
    style: &Style,
    engine: &GrkEngine,
    workspace: &Workspace,
    query: &str,
    json: bool,
) -> Result<(), GrkError> {
    let retrieval = engine.retrieve(workspace, query)?;
    if json {
        print_json(&retrieval);
        return Ok(());
    }

    if retrieval.is_empty() {
        style.print(MessageType::Warn, "No chunks matched the query");
        for suggestion in suggestions(&retrieval.analysis) {
            style.print(MessageType::Hint, &suggestion);
        }
        return Ok(());
    }

    println!("{}", table::render_retrieval_table(&retrieval.chunks));
    println!();
    let stats = &retrieval.stats;
    style.print(
        MessageType::Info,
        &format!(
            "Selected {} of {} candidates ({}) in {}{}",
            stats.selected,
            stats.candidates,
            format::format_bytes(stats.estimated_bytes),
            format::format_millis(stats.elapsed_ms),
            if stats.keyword_fallback {
                ", keyword fallback"
            } else {
                ""
            }
        ),
    );
    if stats.dropped_at_materialization > 0 {
        style.print(
            MessageType::Warn,
            &format!(
                "{} chunks dropped because their source is no longer readable",
                stats.dropped_at_materialization
            ),
        );
    }
    Ok(())
}

fn handle_ask(
    style: &Style,
    engine: &GrkEngine,
    workspace: &Workspace,
    question: &str,
    prompt_only: bool,
    json: bool,
) -> Result<(), GrkError> {
    let progress = Progress::spinner("Retrieving context", ProgressMode::detect(style.is_quiet(), json));
    let outcome = engine.ask(workspace, question, AskOptions { prompt_only });
    progress.finish();
    let outcome = outcome?;

    if json {
        print_json(&outcome);
        return Ok(());
    }

    match outcome {
        AskOutcome::PromptOnly(preview) => {
            println!("{}", style.section("SYSTEM"));
            println!("{}", preview.prompt.system);
            println!();
            println!("{}", style.section("USER"));
            println!("{}", preview.prompt.user);
            println!();
            style.print(
                MessageType::Info,
                &format!(
                    "{} chunks from scan {}, {} prompt chars",
                    preview.retrieval.selected,
                    style.scan_id(&preview.scan_id),
                    format::format_thousands(preview.prompt.char_count() as u64)
                ),
            );
        }
        AskOutcome::Answered(result) => {
            let answer = &result.answer;
            println!("{}", answer.answer);
            println!();

            if !answer.audit.is_empty() {
                println!("{}", style.section("Sources"));
                println!("{}", table::render_audit_table(&answer.audit));
                println!();
            }

            println!(
                "{}",
                style.key_value("Confidence", &style.confidence(answer.confidence, answer.confidence_score))
            );

            if !answer.limitations.is_empty() {
                println!();
                println!("{}", style.section("Limitations"));
                for limitation in &answer.limitations {
                    println!(
                        "{}",
                        style.list_item("-", &format::one_line(limitation, terminal_width().saturating_sub(4)))
                    );
                }
            }

            for suggestion in &answer.suggestions {
                style.print(MessageType::Hint, suggestion);
            }

            if !style.is_quiet() {
                let usage = &answer.usage;
                println!(
                    "{}",
                    style.dim(&format!(
                        "{} of {} chunks referenced, {} snippets, {} prompt chars, {} completion chars{}",
                        usage.referenced_chunks,
                        usage.chunks,
                        usage.snippets,
                        usage.prompt_chars,
                        usage.completion_chars,
                        answer
                            .model_id
                            .as_deref()
                            .map(|m| format!(" ({})", m))
                            .unwrap_or_default()
                    ))
                );
            }
        }
    }
    Ok(())
}
