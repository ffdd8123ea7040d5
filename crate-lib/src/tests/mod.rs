use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::{ArchiveError, Archiver, Budget, Entry, IoAction, Usage};


/// Base modification time for entries created by the tests
fn base_time() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

/// Create a file of `len` bytes, last modified `age` seconds after [`base_time`]
fn write_file(dir: &Path, name: &str, len: usize, age: u64) -> Result<PathBuf> {
    let path = dir.join(name);

    let mut file = File::create(&path).context("Failed to create test file")?;
    file.write_all(&vec![b'x'; len])?;
    file.set_modified(base_time() + Duration::from_secs(age))
        .context("Failed to set modification time")?;

    Ok(path)
}

/// An archive directory and a separate directory to deposit incoming files from
struct Fixture {
    archive_dir: TempDir,
    incoming_dir: TempDir,
}

impl Fixture {
    fn new() -> Result<Self> {
        Ok(Self {
            archive_dir: TempDir::new()?,
            incoming_dir: TempDir::new()?,
        })
    }

    fn archiver(&self, max_bytes: u64, max_count: u64) -> Result<Archiver> {
        Archiver::open(self.archive_dir.path(), Budget::new(max_bytes, max_count))
            .context("Failed to open archive directory")
    }

    fn entry(&self, name: &str, len: usize, age: u64) -> Result<PathBuf> {
        write_file(self.archive_dir.path(), name, len, age)
    }

    fn incoming(&self, name: &str, len: usize) -> Result<PathBuf> {
        write_file(self.incoming_dir.path(), name, len, 1_000)
    }

    fn names(&self) -> Result<Vec<String>> {
        let mut names = fs::read_dir(self.archive_dir.path())?
            .map(|item| -> Result<String> {
                Ok(item?.file_name().to_string_lossy().into_owned())
            })
            .collect::<Result<Vec<_>>>()?;

        names.sort();

        Ok(names)
    }
}

fn names_of(entries: &[Entry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| entry.name.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn open_rejects_missing_directory() -> Result<()> {
    let fixture = Fixture::new()?;
    let missing = fixture.archive_dir.path().join("missing");

    assert!(matches!(
        Archiver::open(&missing, Budget::new(100, 10)),
        Err(ArchiveError::NotADirectory(path)) if path == missing
    ));

    Ok(())
}

#[test]
fn open_rejects_empty_budget() -> Result<()> {
    let fixture = Fixture::new()?;

    assert!(matches!(
        Archiver::open(fixture.archive_dir.path(), Budget::new(100, 0)),
        Err(ArchiveError::InvalidBudget(_))
    ));

    assert!(matches!(
        Archiver::open(fixture.archive_dir.path(), Budget::new(0, 10)),
        Err(ArchiveError::InvalidBudget(_))
    ));

    Ok(())
}

#[test]
fn no_eviction_under_budget() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.entry("a", 10, 1)?;
    fixture.entry("b", 10, 2)?;

    let archiver = fixture.archiver(1000, 10)?;
    let incoming = fixture.incoming("c", 10)?;

    let admission = archiver.archive(&incoming)?;

    assert!(admission.evicted.is_empty());
    assert_eq!(admission.destination, archiver.path().join("c"));
    assert!(!incoming.exists());
    assert_eq!(fixture.names()?, ["a", "b", "c"]);

    Ok(())
}

#[test]
fn evicts_oldest_first() -> Result<()> {
    let fixture = Fixture::new()?;

    // Created out of order so that listing order differs from age order
    for (name, age) in [("t3", 3), ("t1", 1), ("t5", 5), ("t2", 2), ("t4", 4)] {
        fixture.entry(name, 10, age)?;
    }

    let archiver = fixture.archiver(45, 100)?;
    let admission = archiver.archive(fixture.incoming("new", 20)?)?;

    assert_eq!(names_of(&admission.evicted), ["t1", "t2", "t3"]);
    assert_eq!(fixture.names()?, ["new", "t4", "t5"]);

    Ok(())
}

#[test]
fn re_archival_replaces_same_name() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.entry("report.csv", 10, 1)?;

    let archiver = fixture.archiver(1000, 10)?;
    archiver.archive(fixture.incoming("report.csv", 25)?)?;

    assert_eq!(fixture.names()?, ["report.csv"]);

    let entries = archiver.entries()?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].len, 25);

    Ok(())
}

#[test]
fn budget_holds_over_many_admissions() -> Result<()> {
    let fixture = Fixture::new()?;
    let budget = Budget::new(200, 4);
    let archiver = fixture.archiver(budget.max_bytes, budget.max_count)?;

    for i in 0..20 {
        let len = 15 + (i * 37) % 60;
        archiver.archive(fixture.incoming(&format!("file-{i}"), len)?)?;

        let Usage { entries, bytes } = archiver.usage()?;
        assert!(entries <= budget.max_count, "{entries} entries after admission {i}");
        assert!(bytes < budget.max_bytes, "{bytes} bytes after admission {i}");
    }

    Ok(())
}

#[test]
fn subdirectories_are_measured_but_never_evicted() -> Result<()> {
    let fixture = Fixture::new()?;

    let nested = fixture.archive_dir.path().join("nested");
    fs::create_dir(&nested)?;
    write_file(&nested, "inner", 40, 0)?;

    fixture.entry("small", 5, 1)?;

    let archiver = fixture.archiver(50, 10)?;

    assert_eq!(
        archiver.usage()?,
        Usage {
            entries: 1,
            bytes: 45
        }
    );

    let incoming = fixture.incoming("new", 10)?;
    let err = archiver.archive(&incoming).unwrap_err();

    assert!(matches!(
        &err,
        ArchiveError::EmptyArchiveExhausted {
            incoming_len: 10,
            usage: Usage {
                entries: 0,
                bytes: 40
            },
            ..
        }
    ));
    assert!(err.evicted().is_empty());

    assert!(nested.join("inner").exists());
    assert!(fixture.archive_dir.path().join("small").exists());
    assert!(incoming.exists());

    Ok(())
}

#[test]
fn plan_matches_archive() -> Result<()> {
    let fixture = Fixture::new()?;

    for (i, len) in [30, 20, 25, 10].into_iter().enumerate() {
        fixture.entry(&format!("e{i}"), len, i as u64)?;
    }

    let archiver = fixture.archiver(100, 3)?;

    let planned = archiver.plan(40)?;
    assert_eq!(fixture.names()?.len(), 4, "planning must not delete anything");

    let admission = archiver.archive(fixture.incoming("new", 40)?)?;

    assert_eq!(names_of(&planned), names_of(&admission.evicted));
    assert_eq!(names_of(&planned), ["e0", "e1"]);

    Ok(())
}

#[test]
fn entries_are_listed_oldest_first() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.entry("b", 1, 20)?;
    fixture.entry("c", 1, 10)?;
    fixture.entry("a", 1, 30)?;
    fs::create_dir(fixture.archive_dir.path().join("dir"))?;

    let archiver = fixture.archiver(100, 10)?;

    assert_eq!(names_of(&archiver.entries()?), ["c", "b", "a"]);

    Ok(())
}

#[test]
fn rejects_file_already_inside_archive() -> Result<()> {
    let fixture = Fixture::new()?;
    let inside = fixture.entry("inside", 10, 1)?;

    let archiver = fixture.archiver(100, 10)?;

    assert!(matches!(
        archiver.archive(&inside),
        Err(ArchiveError::AlreadyArchived(_))
    ));
    assert!(inside.exists());

    Ok(())
}

#[test]
fn rejects_non_file_input() -> Result<()> {
    let fixture = Fixture::new()?;
    let archiver = fixture.archiver(100, 10)?;

    assert!(matches!(
        archiver.archive(fixture.incoming_dir.path()),
        Err(ArchiveError::NotAFile(_))
    ));

    assert!(matches!(
        archiver.archive(fixture.incoming_dir.path().join("missing")),
        Err(ArchiveError::Io { .. })
    ));

    Ok(())
}

#[test]
fn admission_failure_reports_evictions() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.entry("old", 10, 1)?;

    // A directory with the incoming file's name makes the final rename fail
    let blocking = fixture.archive_dir.path().join("new");
    fs::create_dir(&blocking)?;
    write_file(&blocking, "inner", 1, 0)?;

    let archiver = fixture.archiver(1000, 1)?;
    let incoming = fixture.incoming("new", 10)?;

    let err = archiver.archive(&incoming).unwrap_err();

    assert!(matches!(
        &err,
        ArchiveError::AdmissionFailed { destination, .. }
            if *destination == archiver.path().join("new")
    ));
    assert_eq!(names_of(err.evicted()), ["old"]);

    assert!(incoming.exists());
    assert!(blocking.join("inner").exists());

    Ok(())
}

#[test]
fn failed_move_without_evictions_is_plain_io_error() -> Result<()> {
    let fixture = Fixture::new()?;
    fs::create_dir(fixture.archive_dir.path().join("new"))?;

    let archiver = fixture.archiver(1000, 10)?;
    let incoming = fixture.incoming("new", 10)?;

    assert!(matches!(
        archiver.archive(&incoming),
        Err(ArchiveError::Io {
            action: IoAction::Rename,
            ..
        })
    ));
    assert!(incoming.exists());

    Ok(())
}

#[cfg(unix)]
#[test]
fn rejects_symlinked_input() -> Result<()> {
    let fixture = Fixture::new()?;
    let target = fixture.incoming("target", 10)?;
    let link = fixture.incoming_dir.path().join("link");
    std::os::unix::fs::symlink(&target, &link)?;

    let archiver = fixture.archiver(1000, 10)?;

    assert!(matches!(
        archiver.archive(&link),
        Err(ArchiveError::NotAFile(_))
    ));
    assert!(fs::symlink_metadata(&link).is_ok());
    assert!(fixture.names()?.is_empty());

    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn copies_across_devices() -> Result<()> {
    use std::os::unix::fs::MetadataExt;

    let shm = Path::new("/dev/shm");

    let fixture = Fixture::new()?;

    if !shm.is_dir()
        || fs::metadata(shm)?.dev() == fs::metadata(fixture.archive_dir.path())?.dev()
    {
        eprintln!("Skipping: no separate device available for the incoming file");
        return Ok(());
    }

    let other_device = TempDir::new_in(shm)?;
    let incoming = write_file(other_device.path(), "xdev", 42, 7)?;

    fixture.entry("old", 10, 1)?;

    let archiver = fixture.archiver(1000, 1)?;
    let admission = archiver.archive(&incoming)?;

    assert_eq!(names_of(&admission.evicted), ["old"]);
    assert_eq!(admission.leftover, None);
    assert!(!incoming.exists());

    // No temporary copy left behind
    assert_eq!(fixture.names()?, ["xdev"]);

    let entries = archiver.entries()?;
    assert_eq!(entries[0].len, 42);
    assert_eq!(entries[0].modified, base_time() + Duration::from_secs(7));

    Ok(())
}
