// Command-line interface: track, diff, history, list, status, restore.
//
// Thin layer over `Store`: argument parsing, output formatting, exit
// codes.  All engine and persistence behaviour lives in the library.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crate::delta::Op;
use crate::store::{Store, StoreError};
use crate::wire::Metadata;

// ---------------------------------------------------------------------------
// Clap definition
// ---------------------------------------------------------------------------

/// File versioning with delta compression.
#[derive(Parser, Debug)]
#[command(
    name = "fiver",
    version,
    about = "A fast file versioning system using delta compression",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Storage directory for deltas and metadata.
    #[arg(long, global = true, default_value = "./fiver_storage", value_name = "DIR")]
    storage_dir: PathBuf,

    /// Enable verbose output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress non-error output.
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Track a new version of a file.
    Track {
        /// Path to the file to track.
        file: PathBuf,
        /// Message recorded with this version.
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Show the stored delta of a version.
    Diff {
        /// Path to the tracked file.
        file: PathBuf,
        /// Version to inspect (default: latest).
        #[arg(short = 'V', long)]
        version: Option<u32>,
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
        /// Show only the summary line.
        #[arg(long, conflicts_with = "json")]
        brief: bool,
    },
    /// Show version history of a file.
    History {
        /// Path to the tracked file.
        file: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = HistoryFormat::Table)]
        format: HistoryFormat,
        /// Show only the last N versions.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
    /// List all tracked files.
    List {
        /// Output format.
        #[arg(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },
    /// Show current status of a file.
    Status {
        /// Path to the tracked file.
        file: PathBuf,
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },
    /// Restore a file to a specific version.
    Restore {
        /// Path to the tracked file.
        file: PathBuf,
        /// Version to restore.
        #[arg(short = 'V', long)]
        version: u32,
        /// Output path (default: the original path).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HistoryFormat {
    Table,
    Json,
    Brief,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ListFormat {
    Table,
    Json,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse arguments, run the selected command, exit with its status.
pub fn run() -> ! {
    let cli = Cli::parse();
    match dispatch(&cli) {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("fiver: error: {e}");
            process::exit(1);
        }
    }
}

fn dispatch(cli: &Cli) -> Result<(), StoreError> {
    let store = Store::open(&cli.storage_dir)?;
    let out = Output {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match &cli.command {
        Cmd::Track { file, message } => cmd_track(&store, &out, file, message.as_deref()),
        Cmd::Diff {
            file,
            version,
            json,
            brief,
        } => cmd_diff(&store, file, *version, *json, *brief),
        Cmd::History {
            file,
            format,
            limit,
        } => cmd_history(&store, file, *format, *limit),
        Cmd::List { format } => cmd_list(&store, *format),
        Cmd::Status { file, json } => cmd_status(&store, file, *json),
        Cmd::Restore {
            file,
            version,
            output,
            force,
        } => cmd_restore(&store, &out, file, *version, output.as_deref(), *force),
    }
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    fn success(&self, msg: impl std::fmt::Display) {
        if !self.quiet {
            println!("✓ {msg}");
        }
    }

    fn info(&self, msg: impl std::fmt::Display) {
        if self.verbose && !self.quiet {
            println!("ℹ {msg}");
        }
    }
}

/// The file path string used as the store's name key.
fn name_key(file: &Path) -> String {
    file.to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// track
// ---------------------------------------------------------------------------

fn cmd_track(
    store: &Store,
    out: &Output,
    file: &Path,
    message: Option<&str>,
) -> Result<(), StoreError> {
    let name = name_key(file);
    let data = std::fs::read(file)?;
    out.info(format!("tracking '{name}' ({} bytes)", data.len()));

    let receipt = store.track(&name, &data, message.unwrap_or_default())?;
    out.success(format!(
        "Tracked '{}' as version {} ({} operations, {} bytes of delta)",
        name, receipt.version, receipt.operation_count, receipt.delta_size
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

fn cmd_diff(
    store: &Store,
    file: &Path,
    version: Option<u32>,
    json: bool,
    brief: bool,
) -> Result<(), StoreError> {
    let name = name_key(file);
    let version = match version {
        Some(v) => v,
        None => store.latest_version(&name)?,
    };
    let (meta, delta) = store.load(&name, version)?;

    if json {
        let ops: Vec<_> = delta
            .ops()
            .iter()
            .map(|op| match op {
                Op::Copy { ref_offset, length } => serde_json::json!({
                    "type": "copy", "ref_offset": ref_offset, "length": length,
                }),
                Op::Insert { bytes } => serde_json::json!({
                    "type": "insert", "length": bytes.len(),
                }),
                Op::Replace { ref_offset, bytes } => serde_json::json!({
                    "type": "replace", "ref_offset": ref_offset, "length": bytes.len(),
                }),
            })
            .collect();
        let doc = serde_json::json!({
            "file": meta.filename,
            "version": version,
            "original_size": delta.original_size(),
            "new_size": delta.new_size(),
            "delta_size": delta.delta_size(),
            "operation_count": delta.operation_count(),
            "operations": ops,
        });
        println!("{}", serde_json::to_string_pretty(&doc).unwrap());
        return Ok(());
    }

    println!(
        "Delta for '{}' version {}: {} operations, {} -> {} bytes, {} bytes of delta",
        meta.filename,
        version,
        delta.operation_count(),
        delta.original_size(),
        delta.new_size(),
        delta.delta_size()
    );
    if brief {
        return Ok(());
    }

    for (i, op) in delta.ops().iter().enumerate() {
        match op {
            Op::Copy { ref_offset, length } => {
                println!(
                    "  {i}: COPY ref[{}..{}] (length {})",
                    ref_offset,
                    ref_offset + length,
                    length
                );
            }
            Op::Insert { bytes } => {
                println!("  {i}: INSERT {} bytes: {}", bytes.len(), hex_preview(bytes));
            }
            Op::Replace { ref_offset, bytes } => {
                println!(
                    "  {i}: REPLACE ref[{}..{}] with {} bytes: {}",
                    ref_offset,
                    *ref_offset as usize + bytes.len(),
                    bytes.len(),
                    hex_preview(bytes)
                );
            }
        }
    }
    Ok(())
}

/// First 16 payload bytes as hex, with an ellipsis when truncated.
fn hex_preview(bytes: &[u8]) -> String {
    let mut s = bytes
        .iter()
        .take(16)
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() > 16 {
        s.push_str(" ...");
    }
    s
}

// ---------------------------------------------------------------------------
// history
// ---------------------------------------------------------------------------

fn cmd_history(
    store: &Store,
    file: &Path,
    format: HistoryFormat,
    limit: Option<usize>,
) -> Result<(), StoreError> {
    let name = name_key(file);
    let versions = store.versions(&name)?;
    if versions.is_empty() {
        return Err(StoreError::NotTracked(name));
    }

    let mut records: Vec<Metadata> = versions
        .iter()
        .map(|&v| store.metadata(&name, v))
        .collect::<Result<_, _>>()?;
    if let Some(limit) = limit {
        let skip = records.len().saturating_sub(limit);
        records.drain(..skip);
    }

    match format {
        HistoryFormat::Json => {
            let entries: Vec<_> = records
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "version": m.version,
                        "original_size": m.original_size,
                        "delta_size": m.delta_size,
                        "operation_count": m.operation_count,
                        "timestamp": m.timestamp,
                        "checksum": m.checksum,
                        "message": m.message,
                    })
                })
                .collect();
            let doc = serde_json::json!({ "file": name, "versions": entries });
            println!("{}", serde_json::to_string_pretty(&doc).unwrap());
        }
        HistoryFormat::Brief => {
            for m in &records {
                println!("v{}  {} bytes of delta  {}", m.version, m.delta_size, m.message);
            }
        }
        HistoryFormat::Table => {
            println!("History for '{name}' ({} versions)", records.len());
            println!(
                "{:>7}  {:>10}  {:>10}  {:>4}  {:>11}  {}",
                "VERSION", "ORIG SIZE", "DELTA", "OPS", "TIMESTAMP", "MESSAGE"
            );
            for m in &records {
                println!(
                    "{:>7}  {:>10}  {:>10}  {:>4}  {:>11}  {}",
                    m.version, m.original_size, m.delta_size, m.operation_count, m.timestamp,
                    m.message
                );
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn cmd_list(store: &Store, format: ListFormat) -> Result<(), StoreError> {
    let summaries = store.list()?;

    match format {
        ListFormat::Json => {
            let entries: Vec<_> = summaries
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "file": s.name,
                        "versions": s.version_count,
                        "latest_version": s.latest.version,
                        "latest_timestamp": s.latest.timestamp,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries).unwrap());
        }
        ListFormat::Table => {
            if summaries.is_empty() {
                println!("No tracked files.");
                return Ok(());
            }
            println!("{:>8}  {:>11}  {}", "VERSIONS", "TIMESTAMP", "FILE");
            for s in &summaries {
                println!(
                    "{:>8}  {:>11}  {}",
                    s.version_count, s.latest.timestamp, s.name
                );
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

fn cmd_status(store: &Store, file: &Path, json: bool) -> Result<(), StoreError> {
    let name = name_key(file);
    let latest = store.latest_version(&name)?;
    let meta = store.metadata(&name, latest)?;

    // Compare the working file against the reconstructed latest revision.
    let state = match std::fs::read(file) {
        Ok(current) => {
            if current == store.reconstruct(&name, latest)? {
                "unchanged"
            } else {
                "modified"
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => "missing",
        Err(e) => return Err(e.into()),
    };

    if json {
        let doc = serde_json::json!({
            "file": name,
            "latest_version": latest,
            "state": state,
            "delta_size": meta.delta_size,
            "operation_count": meta.operation_count,
            "timestamp": meta.timestamp,
            "message": meta.message,
        });
        println!("{}", serde_json::to_string_pretty(&doc).unwrap());
    } else {
        println!("'{name}': version {latest}, {state}");
        println!(
            "  last tracked at {} ({} operations, {} bytes of delta)",
            meta.timestamp, meta.operation_count, meta.delta_size
        );
        if !meta.message.is_empty() {
            println!("  message: {}", meta.message);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// restore
// ---------------------------------------------------------------------------

fn cmd_restore(
    store: &Store,
    out: &Output,
    file: &Path,
    version: u32,
    output: Option<&Path>,
    force: bool,
) -> Result<(), StoreError> {
    let name = name_key(file);
    let target = output.unwrap_or(file);

    if target.exists() && !force {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!(
                "'{}' exists; pass --force to overwrite",
                target.display()
            ),
        )));
    }

    let written = store.restore_to(&name, version, target)?;
    out.success(format!(
        "Restored '{}' version {} to '{}' ({} bytes)",
        name,
        version,
        target.display(),
        written
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
