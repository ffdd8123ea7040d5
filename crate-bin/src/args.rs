use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[clap(about = "Keep a directory within a size and file-count budget")]
pub struct CmdArgs {
    #[clap(help = "Path to the archive directory (must already exist)")]
    pub path: PathBuf,

    #[clap(
        long,
        value_parser = parse_size,
        help = "Size ceiling of the archive, in bytes (accepts K, M and G suffixes)"
    )]
    pub max_bytes: u64,

    #[clap(long, help = "Maximum number of files in the archive")]
    pub max_count: u64,

    #[clap(short, long, global = true, help = "Display debug logs")]
    pub verbose: bool,

    #[clap(subcommand)]
    pub action: Action,
}

#[derive(Parser)]
pub enum Action {
    /// Move files into the archive, evicting the oldest ones as needed
    Add {
        #[clap(required = true, help = "Files to archive")]
        items_path: Vec<PathBuf>,
    },

    /// List the archived files, oldest first
    #[clap(alias = "ls")]
    List,

    /// Show the archive's occupancy against its budget
    Status,

    /// Show which files archiving the provided one would evict
    Plan {
        #[clap(help = "File that would be archived")]
        item_path: PathBuf,
    },
}

/// Parse a size with an optional binary suffix (e.g. `512`, `64K`, `10M`, `2G`)
fn parse_size(input: &str) -> Result<u64, String> {
    let input = input.trim();

    let (digits, multiplier) = match input.char_indices().last() {
        Some((i, 'k' | 'K')) => (&input[..i], 1 << 10),
        Some((i, 'm' | 'M')) => (&input[..i], 1 << 20),
        Some((i, 'g' | 'G')) => (&input[..i], 1 << 30),
        _ => (input, 1),
    };

    let value = digits
        .trim()
        .parse::<u64>()
        .map_err(|err| format!("invalid size '{input}': {err}"))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size '{input}' is too large"))
}
