//! # Configuration
//!
//! Options consumed at database construction. Everything has a sensible
//! default so `DbOptions { path, ..Default::default() }` is a working
//! single-node setup.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deployment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Single writable node
    Single,
    /// Cluster member that serves reads only; background loops are not started
    ClusterReadonly,
    /// Cluster member that accepts writes; reclaimed files linger longer so
    /// readers on other nodes can finish with them
    ClusterWritable,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Single
    }
}

/// Long-horizon reclamation criteria applied by `Archive()`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveOptions {
    /// Drop partitions older than this many days
    pub days: Option<u64>,
    /// Drop oldest files once total on-disk size exceeds this many bytes
    pub disk_capacity: Option<u64>,
}

/// Database options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbOptions {
    /// Data root: the meta catalog places segment files under it
    pub path: PathBuf,
    pub mode: Mode,
    /// Minimum number of same-date files before a merge is attempted
    pub merge_trigger_number: usize,
    /// Push freshly merged/built artifacts straight into the cache
    pub insert_cache_immediately: bool,
    /// Byte budget of the index cache
    pub cache_capacity: u64,
    pub archive: ArchiveOptions,
    /// Override for the TO_DELETE reclamation delay; `None` uses the
    /// mode-based default (5 minutes, or 1 day in `ClusterWritable`)
    pub file_ttl: Option<Duration>,
    /// Worker tasks owned by the job scheduler
    pub scheduler_workers: usize,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./quiver-data"),
            mode: Mode::default(),
            merge_trigger_number: 2,
            insert_cache_immediately: false,
            cache_capacity: 2 * 1024 * 1024 * 1024,
            archive: ArchiveOptions::default(),
            file_ttl: None,
            scheduler_workers: 2,
        }
    }
}

impl DbOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Effective TO_DELETE reclamation delay
    pub fn effective_file_ttl(&self) -> Duration {
        match self.file_ttl {
            Some(ttl) => ttl,
            None if self.mode == Mode::ClusterWritable => Duration::from_secs(24 * 3600),
            None => Duration::from_secs(5 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_follows_mode_unless_overridden() {
        let mut options = DbOptions::default();
        assert_eq!(options.effective_file_ttl(), Duration::from_secs(300));

        options.mode = Mode::ClusterWritable;
        assert_eq!(options.effective_file_ttl(), Duration::from_secs(86400));

        options.file_ttl = Some(Duration::ZERO);
        assert_eq!(options.effective_file_ttl(), Duration::ZERO);
    }
}
