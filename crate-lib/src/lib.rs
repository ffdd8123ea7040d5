#![forbid(unsafe_code)]
#![forbid(unused_must_use)]
#![warn(unused_crate_dependencies)]

//! Size- and count-bounded archive directory
//!
//! Files deposited through an [`Archiver`] are moved into a single directory,
//! after the oldest entries have been evicted so that the directory stays within
//! its configured [`Budget`].

pub mod archiver;
pub mod config;
pub mod error;
pub mod policy;
pub mod scan;

#[cfg(test)]
mod tests;

pub use self::{
    archiver::{Admission, Archiver},
    config::Budget,
    error::{ArchiveError, IoAction},
    scan::{Entry, Snapshot, Usage},
};
