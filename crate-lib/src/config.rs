/// Ceilings an archive directory must respect after every admission
///
/// Both limits are exclusive-style: see [`Budget::is_exceeded`] for the exact comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Maximum total size of the directory, in bytes
    pub max_bytes: u64,

    /// Maximum number of entries in the directory, incoming file included
    pub max_count: u64,
}

impl Budget {
    pub fn new(max_bytes: u64, max_count: u64) -> Self {
        Self {
            max_bytes,
            max_count,
        }
    }

    /// Check if the budget can admit at least one file
    pub fn is_valid(&self) -> bool {
        self.max_bytes > 0 && self.max_count > 0
    }
}
