use std::{
    fs::{self, File, Metadata},
    io,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use tempfile::Builder;

use crate::{
    config::Budget,
    error::{ArchiveError, IoAction},
    policy::{eviction_order, pick_victim, plan_evictions},
    scan::{Entry, Usage, read_entries, scan},
};

/// Keeper of a bounded archive directory
///
/// The directory on disk is the only source of truth: it is scanned again on every
/// operation, so files added or removed by other programs are taken into account.
///
/// No locking is performed. Callers sharing a directory between several archivers
/// (in the same process or not) must serialize calls to [`Archiver::archive`] themselves.
#[derive(Debug, Clone)]
pub struct Archiver {
    path: PathBuf,
    budget: Budget,
}

/// Outcome of a successful admission
#[derive(Debug)]
pub struct Admission {
    /// Location of the file inside the archive directory
    pub destination: PathBuf,

    /// Entries that were permanently deleted to make room, oldest first
    pub evicted: Vec<Entry>,

    /// Original file, if it was copied across devices but could not be removed afterwards
    pub leftover: Option<PathBuf>,
}

impl Archiver {
    /// Manage an existing directory with the provided budget
    pub fn open(path: impl AsRef<Path>, budget: Budget) -> Result<Self, ArchiveError> {
        let path = path.as_ref();

        if !budget.is_valid() {
            return Err(ArchiveError::InvalidBudget(budget));
        }

        if !path.is_dir() {
            return Err(ArchiveError::NotADirectory(path.to_owned()));
        }

        let path = fs::canonicalize(path)
            .map_err(|err| ArchiveError::io(IoAction::Canonicalize, path, err))?;

        Ok(Self { path, budget })
    }

    /// Get the (canonical) path of the archive directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// Measure the current occupancy of the archive directory
    pub fn usage(&self) -> Result<Usage, ArchiveError> {
        scan(&self.path).map(|snapshot| snapshot.usage)
    }

    /// List the current entries, from the first to the last to be evicted
    pub fn entries(&self) -> Result<Vec<Entry>, ArchiveError> {
        let mut entries = read_entries(&self.path)?;
        entries.sort_by(eviction_order);
        Ok(entries)
    }

    /// Compute which entries archiving a file of `incoming_len` bytes would evict
    ///
    /// Nothing is deleted.
    pub fn plan(&self, incoming_len: u64) -> Result<Vec<Entry>, ArchiveError> {
        plan_evictions(&self.budget, &scan(&self.path)?, incoming_len)
    }

    /// Move a file into the archive directory, evicting the oldest entries first
    ///
    /// An entry with the same name as the incoming file is replaced.
    /// Symbolic links are rejected, only regular files can be archived.
    ///
    /// If the incoming file cannot fit even in an empty archive, nothing is evicted.
    /// Evictions are permanent: if the final move fails, the deleted entries
    /// are reported through [`ArchiveError::AdmissionFailed`].
    pub fn archive(&self, file: impl AsRef<Path>) -> Result<Admission, ArchiveError> {
        let file = file.as_ref();

        let mt = fs::symlink_metadata(file)
            .map_err(|err| ArchiveError::io(IoAction::Stat, file, err))?;

        if !mt.is_file() {
            return Err(ArchiveError::NotAFile(file.to_owned()));
        }

        let name = file
            .file_name()
            .ok_or_else(|| ArchiveError::MissingFileName(file.to_owned()))?
            .to_owned();

        self.ensure_outside(file)?;

        let incoming_len = mt.len();
        let evicted = self.make_room(incoming_len)?;

        let destination = self.path.join(&name);

        let leftover = match self.move_in(file, &mt, &destination) {
            Ok(leftover) => leftover,
            Err((action, source)) => {
                return Err(if evicted.is_empty() {
                    ArchiveError::Io {
                        action,
                        path: file.to_owned(),
                        source,
                    }
                } else {
                    ArchiveError::AdmissionFailed {
                        destination,
                        evicted,
                        action,
                        source,
                    }
                });
            }
        };

        info!(
            "Archived '{}' ({incoming_len} bytes) after evicting {} entries",
            destination.display(),
            evicted.len()
        );

        Ok(Admission {
            destination,
            evicted,
            leftover,
        })
    }

    /// Evict entries until a file of `incoming_len` bytes fits in the budget
    fn make_room(&self, incoming_len: u64) -> Result<Vec<Entry>, ArchiveError> {
        let mut evicted = vec![];
        let mut snapshot = scan(&self.path)?;

        // Fails when the file cannot fit even once every entry is gone
        plan_evictions(&self.budget, &snapshot, incoming_len)?;

        loop {
            if !self.budget.is_exceeded(snapshot.usage, incoming_len) {
                return Ok(evicted);
            }

            let Some(victim) = pick_victim(&snapshot.entries) else {
                return Err(ArchiveError::EmptyArchiveExhausted {
                    incoming_len,
                    usage: snapshot.usage,
                    budget: self.budget,
                    evicted,
                });
            };

            match fs::remove_file(&victim.path) {
                Ok(()) => {
                    info!(
                        "Evicted '{}' ({} bytes)",
                        victim.path.display(),
                        victim.len
                    );

                    evicted.push(victim.clone());
                }

                // Removed by someone else in the meantime, next scan will tell
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!("Entry '{}' vanished before eviction", victim.path.display());
                }

                Err(err) => return Err(ArchiveError::io(IoAction::Remove, &victim.path, err)),
            }

            snapshot = scan(&self.path)?;
        }
    }

    /// Reject files that already live under the archive directory
    fn ensure_outside(&self, file: &Path) -> Result<(), ArchiveError> {
        let canon = fs::canonicalize(file)
            .map_err(|err| ArchiveError::io(IoAction::Canonicalize, file, err))?;

        if canon.starts_with(&self.path) {
            return Err(ArchiveError::AlreadyArchived(file.to_owned()));
        }

        Ok(())
    }

    /// Move a file to its destination
    ///
    /// Returns the original path if the file had to be copied and the original could not be removed.
    fn move_in(
        &self,
        file: &Path,
        mt: &Metadata,
        destination: &Path,
    ) -> Result<Option<PathBuf>, (IoAction, io::Error)> {
        match fs::rename(file, destination) {
            Ok(()) => Ok(None),

            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                warn!(
                    "Cannot rename '{}' across devices, falling back to copy",
                    file.display()
                );

                self.copy_in(file, mt, destination)
            }

            Err(err) => Err((IoAction::Rename, err)),
        }
    }

    /// Copy a file to a temporary entry, swap it in place, then remove the original
    ///
    /// The temporary entry is removed if anything fails before the swap.
    fn copy_in(
        &self,
        file: &Path,
        mt: &Metadata,
        destination: &Path,
    ) -> Result<Option<PathBuf>, (IoAction, io::Error)> {
        let mut partial = Builder::new()
            .prefix(".")
            .suffix(".partial")
            .tempfile_in(&self.path)
            .map_err(|err| (IoAction::Copy, err))?;

        let mut source = File::open(file).map_err(|err| (IoAction::Copy, err))?;

        io::copy(&mut source, &mut partial).map_err(|err| (IoAction::Copy, err))?;

        let copy = partial.as_file();

        copy.set_permissions(mt.permissions())
            .map_err(|err| (IoAction::Copy, err))?;

        // Keeps the original's place in the eviction order
        if let Ok(modified) = mt.modified() {
            copy.set_modified(modified)
                .map_err(|err| (IoAction::Copy, err))?;
        }

        partial
            .persist(destination)
            .map_err(|err| (IoAction::Rename, err.error))?;

        match fs::remove_file(file) {
            Ok(()) => Ok(None),
            Err(err) => {
                warn!(
                    "Archived a copy of '{}' but failed to remove the original: {err}",
                    file.display()
                );

                Ok(Some(file.to_owned()))
            }
        }
    }
}
