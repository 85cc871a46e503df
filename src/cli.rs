//! CLI module - Command-line interface definitions and handlers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::keys::{derive_local_name, derive_name};
use crate::cache::manager::{CacheLimits, CacheManager};
use crate::core::diag::{DiagSink, StderrSink};
use crate::core::paths::default_cache_root;
use crate::core::redact::redact_url_credentials;
use crate::core::util::format_bytes;
use crate::txn::FileTransaction;

/// upkeep - apply file changes transactionally and keep a bounded cache of fetched sources.
#[derive(Parser, Debug)]
#[command(name = "upkeep")]
#[command(
    author,
    version,
    about,
    long_about = r#"upkeep applies multi-file changes with all-or-nothing semantics and
manages an on-disk cache of fetched sources.

A change plan is a JSONL file with one operation per line:

    {"op": "copy", "src": "new/tool.py", "dest": "live/tool.py"}
    {"op": "copy-if-changed", "src": "new/README.md", "dest": "live/README.md"}
    {"op": "delete", "path": "live/legacy.py"}

Either every operation lands, or on the first failure everything already
applied is rolled back from backups.

Examples:
    upkeep apply plan.jsonl
    upkeep apply plan.jsonl --dry-run
    upkeep name https://github.com/acme/widgets.git
    upkeep touch acme__widgets-1a2b3c4d
    upkeep cleanup --max-items 20
    upkeep stats --pretty
"#
)]
pub struct Cli {
    /// Cache root directory.
    #[arg(
        long,
        global = true,
        env = "UPKEEP_CACHE_DIR",
        value_name = "DIR",
        long_help = "Cache root directory holding one subdirectory per cached source.\n\n\
Defaults to <platform cache dir>/upkeep/sources. Can also be set via the\n\
UPKEEP_CACHE_DIR environment variable."
    )]
    pub cache_dir: Option<PathBuf>,

    /// Disable colored output (when applicable).
    #[arg(
        long,
        global = true,
        long_help = "Disable colored output. This is useful when piping to files or when your\n\
terminal does not support ANSI colors."
    )]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Reduce non-essential output. Results are still printed to stdout;\n\
diagnostics on stderr are suppressed."
    )]
    pub quiet: bool,

    /// Verbose mode (more diagnostics).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Enable more detailed diagnostics on stderr, including per-operation\n\
progress and cache eviction decisions."
    )]
    pub verbose: bool,

    /// Pretty-print JSON output with indentation.
    #[arg(
        long,
        global = true,
        long_help = "Pretty-print JSON output with indentation for human readability.\n\
Only affects commands that emit JSON (stats, cleanup)."
    )]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a JSONL change plan transactionally.
    #[command(
        long_about = "Apply every operation in a JSONL change plan inside one transaction.\n\n\
Before each mutation the current state of the target is backed up into a\n\
private scratch directory. If any operation fails, all completed operations\n\
are rolled back in reverse order and the command exits nonzero; on success\n\
the plan is committed and the backups are discarded.\n\n\
Examples:\n\
  upkeep apply plan.jsonl\n\
  upkeep apply plan.jsonl --dry-run\n"
    )]
    Apply {
        /// Path to the JSONL change plan.
        plan: PathBuf,

        /// Parse and list the operations without touching any file.
        #[arg(long)]
        dry_run: bool,
    },

    /// Evict least-recently-used cache entries until limits are met.
    #[command(
        long_about = "Bring the cache back under its limits by deleting the least recently\n\
used entries. The entry-count limit is applied first, then the total-size\n\
limit. Prints how many entries were evicted.\n\n\
Examples:\n\
  upkeep cleanup\n\
  upkeep cleanup --max-items 20 --max-bytes 536870912\n"
    )]
    Cleanup {
        /// Maximum total cache size in bytes (default: 1 GiB).
        #[arg(long, value_name = "BYTES")]
        max_bytes: Option<u64>,

        /// Maximum number of cache entries (default: 50).
        #[arg(long, value_name = "N")]
        max_items: Option<usize>,
    },

    /// Refresh the recency marker of a cache entry.
    #[command(
        long_about = "Mark a cache entry as just used so eviction considers it recent.\n\
The name must be a plain entry name as printed by `stats` or `name`;\n\
paths are refused. Exits nonzero when no such entry exists.\n"
    )]
    Touch {
        /// Entry name as printed by `stats` or `name`.
        name: String,
    },

    /// Print the cache entry name derived for a source.
    #[command(
        long_about = "Derive the stable cache directory name for a source without fetching\n\
anything. GitHub URLs become owner__repo-<hash>; other URLs fall back to\n\
their last path segment plus the hash. With --local the argument is\n\
treated as a directory path instead.\n\n\
Examples:\n\
  upkeep name https://github.com/acme/widgets.git\n\
  upkeep name --local ../checkouts/widgets\n"
    )]
    Name {
        /// Source URL, or a directory path with --local.
        source: String,

        /// Treat the source as a local directory path.
        #[arg(long)]
        local: bool,
    },

    /// List cache entries, least recently used first.
    #[command(
        long_about = "Print one JSON object per cache entry (name, size, last-used time),\n\
least recently used first, followed by a summary line.\n"
    )]
    Stats,
}

/// One operation in a change plan.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
enum PlanOp {
    Copy { src: PathBuf, dest: PathBuf },
    CopyIfChanged { src: PathBuf, dest: PathBuf },
    Delete { path: PathBuf },
}

impl PlanOp {
    fn describe(&self) -> String {
        match self {
            PlanOp::Copy { src, dest } => {
                format!("copy {} -> {}", src.display(), dest.display())
            }
            PlanOp::CopyIfChanged { src, dest } => {
                format!("copy-if-changed {} -> {}", src.display(), dest.display())
            }
            PlanOp::Delete { path } => format!("delete {}", path.display()),
        }
    }
}

#[derive(Serialize)]
struct StatsSummary {
    entries: usize,
    total_bytes: u64,
}

#[derive(Serialize)]
struct CleanupSummary {
    evicted: usize,
    entries: usize,
    total_bytes: u64,
}

pub fn run(cli: Cli) -> Result<()> {
    let diag: Arc<dyn DiagSink> = Arc::new(StderrSink::new(cli.verbose, cli.quiet, !cli.no_color));
    let cache_root = cli.cache_dir.clone().unwrap_or_else(default_cache_root);

    match cli.command {
        Commands::Apply { plan, dry_run } => run_apply(&plan, dry_run, diag),

        Commands::Cleanup {
            max_bytes,
            max_items,
        } => {
            let defaults = CacheLimits::default();
            let limits = CacheLimits {
                max_bytes: max_bytes.unwrap_or(defaults.max_bytes),
                max_items: max_items.unwrap_or(defaults.max_items),
                ..defaults
            };
            run_cleanup(&cache_root, limits, cli.pretty, diag)
        }

        Commands::Touch { name } => run_touch(&cache_root, &name, diag),

        Commands::Name { source, local } => run_name(&source, local, diag),

        Commands::Stats => run_stats(&cache_root, cli.pretty, diag),
    }
}

/// Read a JSONL change plan, skipping blank lines.
fn load_plan(path: &Path) -> Result<Vec<PlanOp>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open plan {}", path.display()))?;

    let mut ops = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read plan {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let op: PlanOp = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid plan operation on line {}", idx + 1))?;
        ops.push(op);
    }
    Ok(ops)
}

fn run_apply(plan_path: &Path, dry_run: bool, diag: Arc<dyn DiagSink>) -> Result<()> {
    let ops = load_plan(plan_path)?;

    if dry_run {
        for op in &ops {
            println!("would {}", op.describe());
        }
        println!("{} operations, none applied (dry run)", ops.len());
        return Ok(());
    }

    let mut txn = FileTransaction::open_with(Arc::clone(&diag))?;
    match apply_ops(&mut txn, &ops) {
        Ok((applied, unchanged)) => {
            txn.commit();
            if unchanged > 0 {
                println!("applied {} operations ({} unchanged)", applied, unchanged);
            } else {
                println!("applied {} operations", applied);
            }
            Ok(())
        }
        Err(err) => {
            let undone = txn.undo_len();
            txn.rollback();
            diag.warn(
                "apply",
                &format!("plan failed, rolled back {} completed operations", undone),
            );
            Err(err)
        }
    }
}

/// Run every operation; returns (applied, unchanged) counts.
fn apply_ops(txn: &mut FileTransaction, ops: &[PlanOp]) -> Result<(usize, usize)> {
    let mut applied = 0;
    let mut unchanged = 0;
    for (idx, op) in ops.iter().enumerate() {
        let step = || format!("Plan step {} failed: {}", idx + 1, op.describe());
        let changed = match op {
            PlanOp::Copy { src, dest } => {
                txn.copy_file(src, dest).with_context(step)?;
                true
            }
            PlanOp::CopyIfChanged { src, dest } => txn.copy_if_changed(src, dest).with_context(step)?,
            PlanOp::Delete { path } => {
                txn.delete_file(path).with_context(step)?;
                true
            }
        };
        if changed {
            applied += 1;
        } else {
            unchanged += 1;
        }
    }
    Ok((applied, unchanged))
}

fn run_cleanup(root: &Path, limits: CacheLimits, pretty: bool, diag: Arc<dyn DiagSink>) -> Result<()> {
    let mgr = CacheManager::with_diag(root, limits, Arc::clone(&diag));
    let bounds = mgr.limits();
    diag.info(
        "cleanup",
        &format!(
            "cleaning {} (max {} entries, max {})",
            mgr.root().display(),
            bounds.max_items,
            format_bytes(bounds.max_bytes)
        ),
    );
    let evicted = mgr.cleanup();
    let remaining = mgr.entries();
    let summary = CleanupSummary {
        evicted,
        entries: remaining.len(),
        total_bytes: remaining.iter().map(|e| e.size_bytes).sum(),
    };
    let line = if pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{}", line);
    Ok(())
}

fn run_touch(root: &Path, name: &str, diag: Arc<dyn DiagSink>) -> Result<()> {
    let mgr = CacheManager::with_diag(root, CacheLimits::default(), diag);
    let touched = mgr
        .touch(name)
        .with_context(|| format!("Failed to touch cache entry {}", name))?;
    if !touched {
        anyhow::bail!("No cache entry named {} under {}", name, mgr.root().display());
    }
    println!("touched {}", name);
    Ok(())
}

fn run_name(source: &str, local: bool, diag: Arc<dyn DiagSink>) -> Result<()> {
    let name = if local {
        derive_local_name(Path::new(source))
    } else {
        diag.info(
            "name",
            &format!("deriving name for {}", redact_url_credentials(source)),
        );
        derive_name(source)
    };
    println!("{}", name);
    Ok(())
}

fn run_stats(root: &Path, pretty: bool, diag: Arc<dyn DiagSink>) -> Result<()> {
    let mgr = CacheManager::with_diag(root, CacheLimits::default(), diag);
    let entries = mgr.entries();

    let mut total = 0u64;
    for entry in &entries {
        total += entry.size_bytes;
        let line = if pretty {
            serde_json::to_string_pretty(entry)?
        } else {
            serde_json::to_string(entry)?
        };
        println!("{}", line);
    }

    let summary = StatsSummary {
        entries: entries.len(),
        total_bytes: total,
    };
    let line = if pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{}", line);
    Ok(())
}
