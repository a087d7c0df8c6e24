mod logging;

use std::{
	io::{self, Write},
	path::PathBuf,
	process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use console::style;
use shopdb_core::{
	engine::{
		backup,
		bootstrap::{self, BootstrapOutcome},
		restore,
	},
	StoreConfig, StoreHandle,
};

#[derive(Debug, Parser)]
#[command(name = "shopdb", version, about = "Back up, restore and initialise the storefront's JSON data")]
struct Cli {
	/// Directory holding `data/` and `backup/`
	#[arg(long, global = true)]
	root: Option<PathBuf>,

	/// TOML config file (defaults to ./shopdb.toml when present)
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq)]
enum Command {
	/// Snapshot all collections, then prune old snapshots
	Backup,
	/// Copy a snapshot back over the live data (latest by default)
	Restore {
		#[arg(long, value_name = "SNAPSHOT")]
		from: Option<String>,
	},
	/// List snapshots, oldest first
	List,
	/// Keep existing data, else restore the latest snapshot, else seed defaults
	Init,
	/// Re-hash a snapshot against its manifest
	Verify { snapshot: String },
}

fn main() -> ExitCode {
	let cli = match Cli::try_parse() {
		Ok(cli) => cli,
		Err(err) if err.kind() == ErrorKind::InvalidSubcommand => return print_usage(),
		Err(err) => err.exit(),
	};

	let Some(command) = cli.command else {
		return print_usage();
	};

	let config = match StoreConfig::resolve(cli.root.as_deref(), cli.config.as_deref()) {
		Ok(config) => config,
		Err(err) => {
			eprintln!("{} {err}", style("error:").red().bold());
			return ExitCode::FAILURE;
		}
	};
	logging::init(config.log_dir.as_deref());

	match run(command, config) {
		Ok(true) => ExitCode::SUCCESS,
		Ok(false) => ExitCode::FAILURE,
		Err(err) => {
			tracing::error!(error = %format!("{err:#}"), "command failed");
			eprintln!("{} {err:#}", style("error:").red().bold());
			ExitCode::FAILURE
		}
	}
}

/// Usage for a missing or unknown command. Only a failed write is an error.
fn print_usage() -> ExitCode {
	match write_usage(&mut io::stdout().lock()) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("{} cannot print usage: {err}", style("error:").red().bold());
			ExitCode::FAILURE
		}
	}
}

fn write_usage(out: &mut impl Write) -> io::Result<()> {
	Cli::command().write_help(out)?;
	writeln!(out)
}

/// Execute one command. `Ok(false)` means it ran but the outcome needs attention.
fn run(command: Command, config: StoreConfig) -> Result<bool> {
	let db = StoreHandle::new(config);
	match command {
		Command::Backup => {
			let (report, removed) = backup::backup_and_prune(&db).context("backup failed")?;
			println!("{} {}", style("Created").green().bold(), report.snapshot);
			for file in &report.manifest.files {
				println!("  {file}");
			}
			for failed in &report.manifest.failed {
				println!("  {} {}: {}", style("skipped").yellow(), failed.file, failed.error);
			}
			for name in &removed {
				println!("{} {name}", style("Removed").dim());
			}
			Ok(true)
		}
		Command::Restore { from } => {
			let report = match from {
				Some(name) => restore::restore_snapshot(&db, &name).context("restore failed")?,
				None => match restore::restore_from_backup(&db).context("restore failed")? {
					Some(report) => report,
					None => {
						println!("No backups found in {}; nothing restored.", db.backup_dir().display());
						return Ok(true);
					}
				},
			};
			println!("{} from {}", style("Restored").green().bold(), report.snapshot);
			for collection in &report.restored {
				println!("  {collection}");
			}
			for (collection, error) in &report.failed {
				println!("  {} {collection}: {error}", style("failed").red());
			}
			Ok(report.is_complete())
		}
		Command::List => {
			let backups = backup::get_backups(&db).context("cannot list backups")?;
			for name in &backups {
				println!("{name}");
			}
			println!("{} backup(s) in {}", style(backups.len()).bold(), db.backup_dir().display());
			Ok(true)
		}
		Command::Verify { snapshot } => {
			let report = backup::verify_snapshot(&db, &snapshot).context("verify failed")?;
			for file in &report.verified {
				println!("  {} {file}", style("ok").green());
			}
			for file in &report.mismatched {
				println!("  {} {file}", style("mismatch").red());
			}
			for file in &report.missing {
				println!("  {} {file}", style("missing").red());
			}
			for file in &report.unverified {
				println!("  {} {file}", style("no checksum").yellow());
			}
			Ok(report.is_ok())
		}
		Command::Init => {
			let outcome = bootstrap::run(&db).context("bootstrap failed")?;
			Ok(print_bootstrap(&outcome))
		}
	}
}

fn print_bootstrap(outcome: &BootstrapOutcome) -> bool {
	match outcome {
		BootstrapOutcome::KeptExisting => {
			println!("Existing data found; nothing changed.");
			true
		}
		BootstrapOutcome::Restored(report) => {
			println!("{} from {}", style("Restored").green().bold(), report.snapshot);
			report.is_complete()
		}
		BootstrapOutcome::Seeded(collections) => {
			let names: Vec<String> = collections.iter().map(ToString::to_string).collect();
			println!("{} {}", style("Seeded").green().bold(), names.join(", "));
			true
		}
	}
}
