//! Named network namespace resolution.
//!
//! Named namespaces (created via `ip netns add <name>`) are bind mounts under
//! `/var/run/netns`. A namespace's tables are only reachable through a process
//! living inside it, at `<proc>/<pid>/net/*`, so each requested name has to be
//! mapped to one such PID. The join key is the namespace inode: the registry
//! entry's inode matches the `net:[<inode>]` target of the process's
//! `ns/net` link.
//!
//! # Example
//!
//! ```ignore
//! use netstat::namespace;
//!
//! let names = namespace::list_names(&config).await?;
//! let pids = namespace::resolve_names(&config, &names, &cancel).await?;
//! for (pid, name) in &pids {
//!     println!("{} is reachable through pid {}", name, pid);
//! }
//! ```

use std::collections::HashMap;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::NetstatConfig;
use crate::error::{Error, Result};
use crate::process::list_pids;

/// List the namespace names in the registry, sorted.
///
/// Directories are skipped. A missing registry is reported as
/// [`Error::RegistryUnavailable`]; callers usually treat it as empty.
pub async fn list_names(config: &NetstatConfig) -> Result<Vec<String>> {
    let registry_unavailable = |source| Error::RegistryUnavailable {
        path: config.netns_dir.clone(),
        source,
    };

    let mut dir = tokio::fs::read_dir(&config.netns_dir)
        .await
        .map_err(registry_unavailable)?;

    let mut names = Vec::new();
    while let Some(entry) = dir.next_entry().await.map_err(registry_unavailable)? {
        if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().to_string());
    }

    names.sort();
    Ok(names)
}

/// Inode of the namespace handle at `path`.
///
/// Tries an open and `fstat` first, which works on the bind mounts `ip netns`
/// creates, then falls back to `stat` through a symlink.
pub async fn namespace_inode(path: &Path) -> io::Result<u64> {
    let opened = match tokio::fs::File::open(path).await {
        Ok(file) => file.metadata().await,
        Err(e) => Err(e),
    };
    match opened {
        Ok(meta) => Ok(meta.ino()),
        Err(e) => {
            trace!(path = %path.display(), error = %e, "open failed, falling back to stat");
            tokio::fs::metadata(path).await.map(|meta| meta.ino())
        }
    }
}

/// The link target a process in namespace `inode` has at `ns/net`.
fn link_target(inode: u64) -> String {
    format!("net:[{}]", inode)
}

/// Map each of `names` to the PID of one process living in it.
///
/// Names whose handle cannot be stat'ed, or which no process lives in, are
/// left out. When two names share an inode the first one wins. The scan
/// stops as soon as every name is claimed. Returns
/// [`Error::NoNamespaceMatch`] when nothing resolved.
pub async fn resolve_names(
    config: &NetstatConfig,
    names: &[String],
    cancel: &CancellationToken,
) -> Result<HashMap<u32, String>> {
    let wanted: Arc<DashMap<String, String>> = Arc::new(DashMap::new());
    for name in names {
        let path = config.netns_dir.join(name);
        match namespace_inode(&path).await {
            Ok(inode) => {
                wanted
                    .entry(link_target(inode))
                    .or_insert_with(|| name.clone());
            }
            Err(e) => debug!(namespace = %name, error = %e, "cannot stat namespace"),
        }
    }
    if wanted.is_empty() {
        return Err(Error::NoNamespaceMatch);
    }

    let pids = list_pids(config.proc_root()).await?;
    let resolved: Arc<DashMap<u32, String>> = Arc::new(DashMap::new());
    let done = cancel.child_token();
    let limit = Arc::new(Semaphore::new(config.max_workers.max(1)));
    let mut workers = JoinSet::new();

    for pid in pids {
        if done.is_cancelled() {
            break;
        }
        let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
            break;
        };

        let link = config.pid_dir(pid).join("ns").join("net");
        let wanted = Arc::clone(&wanted);
        let resolved = Arc::clone(&resolved);
        let done = done.clone();

        workers.spawn(async move {
            let _permit = permit;
            if done.is_cancelled() {
                return;
            }
            let Ok(target) = tokio::fs::read_link(&link).await else {
                return;
            };
            let Some(target) = target.to_str() else {
                return;
            };
            if let Some((_, name)) = wanted.remove(target) {
                trace!(pid, namespace = %name, "namespace claimed");
                resolved.insert(pid, name);
                if wanted.is_empty() {
                    done.cancel();
                }
            }
        });
    }

    while let Some(res) = workers.join_next().await {
        if let Err(e) = res {
            warn!(error = %e, "namespace scan worker failed");
        }
    }

    if cancel.is_cancelled() {
        return Err(Error::cancelled());
    }

    for entry in wanted.iter() {
        debug!(namespace = %entry.value(), "no process found in namespace");
    }

    let resolved: HashMap<u32, String> = match Arc::try_unwrap(resolved) {
        Ok(map) => map.into_iter().collect(),
        Err(shared) => shared
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect(),
    };
    if resolved.is_empty() {
        return Err(Error::NoNamespaceMatch);
    }
    Ok(resolved)
}
