//! Filesystem locations and worker limits.

use std::path::{Path, PathBuf};

/// Default mount point of the process filesystem.
pub const PROC_ROOT: &str = "/proc";

/// The runtime directory where named network namespaces are stored.
pub const NETNS_RUN_DIR: &str = "/var/run/netns";

/// Workers allowed per available CPU when scanning processes.
const WORKERS_PER_CPU: usize = 4;

/// Configuration for a [`Netstat`](crate::Netstat) handle.
#[derive(Debug, Clone)]
pub struct NetstatConfig {
    /// Root of the process filesystem (default: `/proc`).
    pub proc_root: PathBuf,
    /// Directory of named namespace handles (default: `/var/run/netns`).
    pub netns_dir: PathBuf,
    /// Upper bound on concurrent per-process scans.
    pub max_workers: usize,
}

impl Default for NetstatConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            proc_root: PathBuf::from(PROC_ROOT),
            netns_dir: PathBuf::from(NETNS_RUN_DIR),
            max_workers: cpus * WORKERS_PER_CPU,
        }
    }
}

impl NetstatConfig {
    /// Use a different process filesystem root.
    pub fn with_proc_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.proc_root = path.into();
        self
    }

    /// Use a different namespace registry.
    pub fn with_netns_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.netns_dir = path.into();
        self
    }

    /// Cap concurrent per-process scans. Zero is treated as one.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    /// Directory holding the tables for `pid`, or the host tables.
    pub fn net_dir(&self, pid: Option<u32>) -> PathBuf {
        match pid {
            Some(pid) => self.proc_root.join(pid.to_string()).join("net"),
            None => self.proc_root.join("net"),
        }
    }

    pub(crate) fn pid_dir(&self, pid: u32) -> PathBuf {
        self.proc_root.join(pid.to_string())
    }

    pub(crate) fn proc_root(&self) -> &Path {
        &self.proc_root
    }
}
