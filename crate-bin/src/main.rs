#![forbid(unsafe_code)]
#![forbid(unused_must_use)]
#![warn(unused_crate_dependencies)]

use std::{path::Path, process::ExitCode, time::SystemTime};

use anyhow::{Context, Result, bail};
use bounded_archive::{Archiver, Budget, Entry};
use clap::Parser;
use colored::Colorize;
use jiff::{Timestamp, tz::TimeZone};
use log::{LevelFilter, warn};

use self::args::{Action, CmdArgs};

mod args;
mod logger;

fn main() -> ExitCode {
    match inner_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        }
    }
}

fn inner_main() -> Result<()> {
    let CmdArgs {
        path,
        max_bytes,
        max_count,
        verbose,
        action,
    } = CmdArgs::parse();

    logger::init(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    })
    .context("Failed to initialize logger")?;

    let archiver = Archiver::open(&path, Budget::new(max_bytes, max_count))
        .with_context(|| format!("Failed to open archive at path '{}'", path.display()))?;

    match action {
        Action::Add { items_path } => {
            for item_path in &items_path {
                if !item_path.is_file() {
                    bail!("No file found at path '{}'", item_path.display());
                }
            }

            for item_path in &items_path {
                add_file(&archiver, item_path)?;
            }
        }

        Action::List => {
            let entries = archiver.entries().context("Failed to list archive")?;

            for entry in &entries {
                println!(
                    "{} {:>10}  {}",
                    format_time(entry.modified).as_str().bright_black(),
                    format_size(entry.len),
                    entry.name.to_string_lossy()
                );
            }

            println!("{} entries", entries.len());
        }

        Action::Status => {
            let usage = archiver.usage().context("Failed to measure archive")?;
            let budget = archiver.budget();

            println!("Archive: {}", archiver.path().display());
            println!("Entries: {} / {}", usage.entries, budget.max_count);
            println!(
                "Size:    {} / {}",
                format_size(usage.bytes),
                format_size(budget.max_bytes)
            );
        }

        Action::Plan { item_path } => {
            let len = item_path
                .metadata()
                .with_context(|| {
                    format!("Failed to get metadata on file '{}'", item_path.display())
                })?
                .len();

            let evicted = archiver
                .plan(len)
                .with_context(|| format!("Cannot archive file '{}'", item_path.display()))?;

            if evicted.is_empty() {
                println!("No file would be evicted");
            }

            for entry in &evicted {
                print_evicted(entry, "Would evict");
            }
        }
    }

    Ok(())
}

fn add_file(archiver: &Archiver, item_path: &Path) -> Result<()> {
    println!("Archiving '{}'...", item_path.display());

    match archiver.archive(item_path) {
        Ok(admission) => {
            for entry in &admission.evicted {
                print_evicted(entry, "Evicted");
            }

            if let Some(leftover) = &admission.leftover {
                warn!(
                    "File was archived but the original at '{}' could not be removed",
                    leftover.display()
                );
            }

            Ok(())
        }

        Err(err) => {
            for entry in err.evicted() {
                warn!(
                    "Entry '{}' was evicted before the failure",
                    entry.path.display()
                );
            }

            Err(err).with_context(|| format!("Failed to archive file '{}'", item_path.display()))
        }
    }
}

fn print_evicted(entry: &Entry, verb: &str) {
    println!(
        "{} '{}' ({}, last modified {})",
        verb.bright_yellow(),
        entry.name.to_string_lossy(),
        format_size(entry.len),
        format_time(entry.modified)
    );
}

fn format_time(time: SystemTime) -> String {
    match Timestamp::try_from(time) {
        Ok(ts) => ts
            .to_zoned(TimeZone::system())
            .strftime("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => "<invalid time>".to_owned(),
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;

    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{value:.1} {}", UNITS[unit])
}
