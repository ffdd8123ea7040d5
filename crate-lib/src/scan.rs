use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use log::debug;
use walkdir::WalkDir;

use crate::error::{ArchiveError, IoAction};

/// A non-directory item located directly inside the archive directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Full path of the entry
    pub path: PathBuf,

    /// Base name of the entry
    pub name: OsString,

    /// Size in bytes
    pub len: u64,

    /// Last modification time
    pub modified: SystemTime,
}

/// Occupancy of an archive directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    /// Number of entries at the top level
    pub entries: u64,

    /// Total size of every file under the directory, nested ones included
    pub bytes: u64,
}

/// State of an archive directory at a given point in time
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub entries: Vec<Entry>,
    pub usage: Usage,
}

/// Scan a directory, collecting its entries and measuring its occupancy
pub fn scan(dir: &Path) -> Result<Snapshot, ArchiveError> {
    let entries = read_entries(dir)?;

    let usage = Usage {
        entries: u64::try_from(entries.len()).unwrap_or(u64::MAX),
        bytes: measure_bytes(dir)?,
    };

    debug!(
        "Scanned '{}': {} entries, {} bytes",
        dir.display(),
        usage.entries,
        usage.bytes
    );

    Ok(Snapshot { entries, usage })
}

/// List the non-directory items located directly inside a directory
///
/// Symbolic links are not followed. Items that vanish while being listed are skipped.
pub fn read_entries(dir: &Path) -> Result<Vec<Entry>, ArchiveError> {
    let read_dir = fs::read_dir(dir).map_err(|err| ArchiveError::io(IoAction::ReadDir, dir, err))?;

    let mut entries = vec![];

    for item in read_dir {
        let item = item.map_err(|err| ArchiveError::io(IoAction::ReadDir, dir, err))?;
        let path = item.path();

        let mt = match item.metadata() {
            Ok(mt) => mt,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(ArchiveError::io(IoAction::Stat, &path, err)),
        };

        if mt.is_dir() {
            continue;
        }

        let modified = mt
            .modified()
            .map_err(|err| ArchiveError::io(IoAction::Stat, &path, err))?;

        entries.push(Entry {
            name: item.file_name(),
            len: mt.len(),
            modified,
            path,
        });
    }

    Ok(entries)
}

/// Compute the total size of all files under a directory, recursively
pub fn measure_bytes(dir: &Path) -> Result<u64, ArchiveError> {
    let mut bytes = 0u64;

    for item in WalkDir::new(dir).min_depth(1) {
        let item = item.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_owned();
            ArchiveError::io(IoAction::ReadDir, path, io::Error::from(err))
        })?;

        if item.file_type().is_dir() {
            continue;
        }

        let mt = match item.metadata() {
            Ok(mt) => mt,
            Err(err) if err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => {
                continue;
            }
            Err(err) => {
                return Err(ArchiveError::io(
                    IoAction::Stat,
                    item.path(),
                    io::Error::from(err),
                ));
            }
        };

        bytes = bytes.saturating_add(mt.len());
    }

    Ok(bytes)
}
