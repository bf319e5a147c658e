use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use histport::config::ReplayConfig;
use histport::model::ChangesetId;
use histport::progress::ReplayEvent;
use histport::replay::{PlannedChange, ReplicationOptions, Replicator, order_changes};
use histport::source::{DumpSource, HistorySource};
use histport::telemetry;
use histport::users::UsernameMap;
use histport_svn::SvnCli;

mod format;

use format::OutputFormat;

/// Replay version-control history into Subversion
///
/// Every source changeset becomes one Subversion revision carrying the
/// original author (after user mapping), timestamp and comment. Renames,
/// including file swaps and case-only renames, are replayed as moves.
///
/// QUICK START:
///
///   histport plan --changeset 42      # inspect the replay order
///   histport run                      # replay everything from [source].from_changeset
///   histport run --from 1234          # resume after a failure
///
/// Settings are read from histport.toml (see --config).
#[derive(Parser)]
#[command(name = "histport")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'histport <command> --help' for more information on a specific command.")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "HISTPORT_CONFIG", default_value = "histport.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay changesets into the target repository
    ///
    /// Each changeset is committed on its own. On failure nothing of the
    /// failing changeset is committed and the id to resume from is printed.
    Run {
        /// First changeset to replay (overrides [source].from_changeset)
        #[arg(long)]
        from: Option<ChangesetId>,
    },

    /// Show the replay order of one changeset without touching anything
    Plan {
        /// Changeset to plan
        #[arg(long)]
        changeset: ChangesetId,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show how a source committer name is mapped
    Users {
        /// Committer name as recorded in the source history
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ReplayConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let _telemetry = telemetry::init(&config.log);

    match cli.command {
        Commands::Run { from } => run(&cli.config, &config, from),
        Commands::Plan { changeset, format } => plan(&cli.config, &config, changeset, format),
        Commands::Users { name } => {
            let users = user_map(&config);
            println!("{name} -> {}", users.map(&name));
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn run(config_path: &Path, config: &ReplayConfig, from: Option<ChangesetId>) -> Result<()> {
    let source = open_source(config_path, config)?;

    let mut target = SvnCli::new(&config.target.repository_url, &config.target.working_copy);
    if !config.target.svn_bin.as_os_str().is_empty() {
        target = target.with_bin_dir(&config.target.svn_bin);
    }

    let options = ReplicationOptions {
        from: from.unwrap_or(config.source.from_changeset),
        create_repository: if config.target.create_repository {
            config.target.local_repository_path()
        } else {
            None
        },
        initial_checkout: config.target.initial_checkout,
        message_encoding: config.target.message_encoding,
    };
    let replicator =
        Replicator::new(&source, &target, &config.source.root, user_map(config), options);

    let mut total = 0;
    let mut report = |event: &ReplayEvent| match event {
        ReplayEvent::ChangesetsFound { count } => total = *count,
        ReplayEvent::ChangesetCommitted {
            changeset,
            revision,
        } => match revision {
            Some(rev) => println!("Changeset {changeset} -> {rev}  ({total} total)"),
            None => println!("Changeset {changeset}: nothing to commit"),
        },
        _ => {}
    };

    let summary = replicator.run(&mut report)?;
    match summary.last_committed {
        Some(last) => println!(
            "Replayed {} changeset(s), last was {last}{}.",
            summary.replayed,
            if summary.stopped { " (stopped)" } else { "" }
        ),
        None => println!("Nothing to replay."),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// plan
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PlanOutput<'a> {
    changeset: ChangesetId,
    committer: &'a str,
    created_at: DateTime<Utc>,
    comment: &'a str,
    changes: &'a [PlannedChange],
}

fn plan(
    config_path: &Path,
    config: &ReplayConfig,
    id: ChangesetId,
    format: OutputFormat,
) -> Result<()> {
    let source = open_source(config_path, config)?;
    let changeset = source
        .fetch_changeset(id)
        .with_context(|| format!("Failed to read changeset {id}"))?;
    let ordered = order_changes(&changeset)?;

    match format {
        OutputFormat::Json => {
            let out = PlanOutput {
                changeset: changeset.id,
                committer: &changeset.committer,
                created_at: changeset.created_at,
                comment: &changeset.comment,
                changes: &ordered,
            };
            println!("{}", OutputFormat::to_json(&out)?);
        }
        OutputFormat::Text => {
            println!(
                "Changeset {} by {} at {}",
                changeset.id, changeset.committer, changeset.created_at
            );
            for (n, planned) in ordered.iter().enumerate() {
                println!(
                    "{:>4}. {:<18} {:<14} {:<6} {}",
                    n + 1,
                    planned.bucket.to_string(),
                    planned.action.to_string(),
                    planned.change.item.kind.to_string(),
                    planned.change.path()
                );
            }
            if ordered.is_empty() {
                println!("  (no changes to replay)");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The export directory, relative paths taken from the config file's directory.
fn open_source(config_path: &Path, config: &ReplayConfig) -> Result<DumpSource> {
    let dump = if config.source.dump.is_absolute() {
        config.source.dump.clone()
    } else {
        config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&config.source.dump)
    };
    DumpSource::open(&dump)
        .with_context(|| format!("Failed to open history export {}", dump.display()))
}

fn user_map(config: &ReplayConfig) -> UsernameMap {
    config.users.iter().cloned().collect()
}
