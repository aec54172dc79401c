//! Socket inode to owning process resolution.
//!
//! Every process exposes its open descriptors as symbolic links under
//! `<proc>/<pid>/fd`. Socket descriptors point at `socket:[<inode>]`, which
//! is the same inode printed in the socket tables, so scanning all of them
//! yields an inode → process index.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use netstat::process::{ProcessCache, ProcessIndex};
//!
//! let cache = Arc::new(ProcessCache::new());
//! let index = ProcessIndex::build(&config, &cancel, &cache).await?;
//! if let Some(process) = index.get(107869) {
//!     println!("owned by {}", process);
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::NetstatConfig;
use crate::error::{Error, Result};
use crate::types::Process;

const SOCKET_PREFIX: &str = "socket:[";

/// Extract the command name from a `stat` line.
///
/// The name sits between the first `(` and the last `)`, since it may itself
/// contain spaces and parentheses. Returns an empty string when the line has
/// no such pair.
pub fn process_name(stat: &str) -> &str {
    match (stat.find('('), stat.rfind(')')) {
        (Some(start), Some(end)) if end > start => &stat[start + 1..end],
        _ => "",
    }
}

/// Parse the inode out of a `socket:[<inode>]` link target.
pub fn socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix(SOCKET_PREFIX)?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Per-call cache of process names keyed by PID.
///
/// Inserts are insert-if-absent: two workers racing to load the same PID
/// both end up holding the first value stored.
#[derive(Debug, Default)]
pub struct ProcessCache {
    entries: DashMap<u32, Arc<Process>>,
}

impl ProcessCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `pid`, reading `<proc_root>/<pid>/stat` on a miss.
    ///
    /// An unreadable `stat` yields a process with an empty name.
    pub fn get_or_load(&self, proc_root: &Path, pid: u32) -> Arc<Process> {
        if let Some(cached) = self.entries.get(&pid) {
            return Arc::clone(cached.value());
        }

        let loaded = Arc::new(load_process(proc_root, pid));
        let stored = self.entries.entry(pid).or_insert(loaded);
        Arc::clone(stored.value())
    }

    /// Number of cached processes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_process(proc_root: &Path, pid: u32) -> Process {
    let path = proc_root.join(pid.to_string()).join("stat");
    match std::fs::read_to_string(&path) {
        Ok(stat) => Process {
            pid,
            name: process_name(&stat).to_string(),
        },
        Err(e) => {
            debug!(pid, error = %e, "cannot read process stat");
            Process::unnamed(pid)
        }
    }
}

/// List the numeric (PID) directories under `proc_root`.
pub(crate) async fn list_pids(proc_root: &Path) -> Result<Vec<u32>> {
    let mut dir = tokio::fs::read_dir(proc_root).await?;
    let mut pids = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
            continue;
        };
        // Processes may exit between listing and stat.
        if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            pids.push(pid);
        }
    }
    Ok(pids)
}

fn socket_inodes(fd_dir: &Path) -> Vec<u64> {
    let entries = match std::fs::read_dir(fd_dir) {
        Ok(entries) => entries,
        Err(e) => {
            trace!(path = %fd_dir.display(), error = %e, "skipping fd directory");
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| std::fs::read_link(entry.path()).ok())
        .filter_map(|target| target.to_str().and_then(socket_inode))
        .collect()
}

/// Socket inode → owning process, built once per collection.
///
/// When several processes share a socket (inherited across fork), one of
/// them is reported.
#[derive(Debug, Clone, Default)]
pub struct ProcessIndex {
    by_inode: HashMap<u64, Arc<Process>>,
}

impl ProcessIndex {
    /// Scan every process's descriptors under the configured root.
    ///
    /// Processes are scanned concurrently, at most `max_workers` at a time.
    /// Processes whose `fd` directory cannot be read are skipped. Fails only
    /// if the root itself cannot be listed or `cancel` fires.
    pub async fn build(
        config: &NetstatConfig,
        cancel: &CancellationToken,
        cache: &Arc<ProcessCache>,
    ) -> Result<Self> {
        let pids = list_pids(config.proc_root()).await?;
        debug!(processes = pids.len(), "scanning process descriptors");

        let limit = Arc::new(Semaphore::new(config.max_workers.max(1)));
        let index: Arc<DashMap<u64, Arc<Process>>> = Arc::new(DashMap::new());
        let mut workers = JoinSet::new();

        for pid in pids {
            if cancel.is_cancelled() {
                break;
            }
            let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
                break;
            };

            let fd_dir = config.pid_dir(pid).join("fd");
            let proc_root = config.proc_root().to_path_buf();
            let cache = Arc::clone(cache);
            let index = Arc::clone(&index);
            let cancel = cancel.clone();

            workers.spawn_blocking(move || {
                let _permit = permit;
                if cancel.is_cancelled() {
                    return;
                }
                let inodes = socket_inodes(&fd_dir);
                if inodes.is_empty() {
                    return;
                }
                let process = cache.get_or_load(&proc_root, pid);
                for inode in inodes {
                    index.insert(inode, Arc::clone(&process));
                }
            });
        }

        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "process scan worker failed");
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }

        let by_inode = match Arc::try_unwrap(index) {
            Ok(map) => map.into_iter().collect(),
            Err(shared) => shared
                .iter()
                .map(|e| (*e.key(), Arc::clone(e.value())))
                .collect(),
        };
        Ok(Self { by_inode })
    }

    /// The process owning socket `inode`.
    pub fn get(&self, inode: u64) -> Option<&Arc<Process>> {
        self.by_inode.get(&inode)
    }

    /// Number of indexed sockets.
    pub fn len(&self) -> usize {
        self.by_inode.len()
    }

    /// Check if no sockets were indexed.
    pub fn is_empty(&self) -> bool {
        self.by_inode.is_empty()
    }
}
