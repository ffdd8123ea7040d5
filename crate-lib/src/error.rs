use std::{
    fmt::Display,
    io,
    path::{Path, PathBuf},
};

use crate::{
    config::Budget,
    scan::{Entry, Usage},
};

/// Error that occurred while managing an archive directory
#[derive(Debug)]
pub enum ArchiveError {
    /// A filesystem operation failed
    Io {
        /// What was being done
        action: IoAction,

        /// Path the operation was performed on
        path: PathBuf,

        /// Underlying error
        source: io::Error,
    },

    /// The incoming file does not fit in the budget, even with every entry evicted
    EmptyArchiveExhausted {
        /// Size of the incoming file
        incoming_len: u64,

        /// Occupancy of the directory once nothing was left to evict
        usage: Usage,

        /// Budget that could not be satisfied
        budget: Budget,

        /// Entries deleted before running out of candidates
        evicted: Vec<Entry>,
    },

    /// Entries were evicted but the incoming file could not be moved in
    ///
    /// Evictions are permanent, so they are reported here for the caller to act upon.
    AdmissionFailed {
        /// Where the incoming file should have landed
        destination: PathBuf,

        /// Entries that were deleted to make room
        evicted: Vec<Entry>,

        /// Step of the move that failed
        action: IoAction,

        /// Underlying error
        source: io::Error,
    },

    /// The archive path does not exist or is not a directory
    NotADirectory(PathBuf),

    /// The budget cannot admit any file
    InvalidBudget(Budget),

    /// The incoming path is not a regular file
    NotAFile(PathBuf),

    /// The incoming path has no base name
    MissingFileName(PathBuf),

    /// The incoming file is already located inside the archive directory
    AlreadyArchived(PathBuf),
}

impl ArchiveError {
    pub(crate) fn io(action: IoAction, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.as_ref().to_owned(),
            source,
        }
    }

    /// Get the entries that were permanently deleted before this error occurred
    pub fn evicted(&self) -> &[Entry] {
        match self {
            Self::EmptyArchiveExhausted { evicted, .. } | Self::AdmissionFailed { evicted, .. } => {
                evicted
            }

            Self::Io { .. }
            | Self::NotADirectory(_)
            | Self::InvalidBudget(_)
            | Self::NotAFile(_)
            | Self::MissingFileName(_)
            | Self::AlreadyArchived(_) => &[],
        }
    }
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io {
                action,
                path,
                source: _,
            } => write!(f, "Failed to {action} '{}'", path.display()),

            Self::EmptyArchiveExhausted {
                incoming_len,
                usage,
                budget,
                evicted,
            } => write!(
                f,
                "Incoming file of {incoming_len} bytes cannot fit in the archive \
                 ({} entries and {} bytes left after evicting {} entries, budget is {} entries and {} bytes)",
                usage.entries,
                usage.bytes,
                evicted.len(),
                budget.max_count,
                budget.max_bytes
            ),

            Self::AdmissionFailed {
                destination,
                evicted,
                action,
                source: _,
            } => write!(
                f,
                "Evicted {} entries but failed to admit incoming file as '{}' (could not {action})",
                evicted.len(),
                destination.display()
            ),

            Self::NotADirectory(path) => {
                write!(f, "Archive path '{}' is not a directory", path.display())
            }

            Self::InvalidBudget(budget) => write!(
                f,
                "Budget of {} bytes and {} entries cannot admit any file",
                budget.max_bytes, budget.max_count
            ),

            Self::NotAFile(path) => write!(f, "Path '{}' is not a regular file", path.display()),

            Self::MissingFileName(path) => {
                write!(f, "Path '{}' does not have a file name", path.display())
            }

            Self::AlreadyArchived(path) => write!(
                f,
                "File '{}' is already inside the archive directory",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } | Self::AdmissionFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Filesystem operation performed by the archiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoAction {
    Canonicalize,
    ReadDir,
    Stat,
    Remove,
    Rename,
    Copy,
}

impl Display for IoAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Canonicalize => write!(f, "canonicalize"),
            Self::ReadDir => write!(f, "read directory"),
            Self::Stat => write!(f, "get metadata of"),
            Self::Remove => write!(f, "remove"),
            Self::Rename => write!(f, "rename"),
            Self::Copy => write!(f, "copy"),
        }
    }
}
