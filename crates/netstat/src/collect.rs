//! Collection of socket tables across transports and namespaces.
//!
//! A collection is a single snapshot: the working set of namespaces is
//! resolved, every `(namespace, transport)` table is read and decoded
//! concurrently, and the merged entries are optionally matched against a
//! freshly built [`ProcessIndex`].

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::NetstatConfig;
use crate::error::{Error, Result};
use crate::namespace;
use crate::parse::decode_table;
use crate::process::{ProcessCache, ProcessIndex};
use crate::types::{SocketEntry, Transport};

/// What to collect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Features {
    /// TCP over IPv4.
    pub tcp: bool,
    /// TCP over IPv6.
    pub tcp6: bool,
    /// UDP over IPv4.
    pub udp: bool,
    /// UDP over IPv6.
    pub udp6: bool,
    /// UDP-Lite over IPv4.
    pub udplite: bool,
    /// UDP-Lite over IPv6.
    pub udplite6: bool,
    /// Raw IPv4.
    pub raw: bool,
    /// Raw IPv6.
    pub raw6: bool,
    /// Resolve the process owning each socket.
    pub processes: bool,
    /// Include every namespace in the registry.
    pub all_namespaces: bool,
    /// Named namespaces to include.
    pub namespace_names: Vec<String>,
    /// Processes whose namespaces to include.
    pub namespace_pids: Vec<u32>,
    /// Skip the host namespace.
    pub exclude_host: bool,
}

impl Features {
    /// Every transport, host namespace only.
    pub fn all_transports() -> Self {
        Self {
            tcp: true,
            tcp6: true,
            udp: true,
            udp6: true,
            udplite: true,
            udplite6: true,
            raw: true,
            raw6: true,
            ..Default::default()
        }
    }

    /// TCP and UDP over both address families.
    pub fn default_transports() -> Self {
        Self {
            tcp: true,
            tcp6: true,
            udp: true,
            udp6: true,
            ..Default::default()
        }
    }

    /// Drop the IPv6 tables.
    pub fn only_ipv4(mut self) -> Self {
        self.tcp6 = false;
        self.udp6 = false;
        self.udplite6 = false;
        self.raw6 = false;
        self
    }

    /// Drop the IPv4 tables.
    pub fn only_ipv6(mut self) -> Self {
        self.tcp = false;
        self.udp = false;
        self.udplite = false;
        self.raw = false;
        self
    }

    /// Resolve owning processes.
    pub fn with_processes(mut self) -> Self {
        self.processes = true;
        self
    }

    /// Add a named namespace.
    pub fn with_namespace(mut self, name: impl Into<String>) -> Self {
        self.namespace_names.push(name.into());
        self
    }

    /// Add the namespace `pid` lives in.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.namespace_pids.push(pid);
        self
    }

    /// Include every registered namespace.
    pub fn with_all_namespaces(mut self) -> Self {
        self.all_namespaces = true;
        self
    }

    /// Skip the host namespace.
    pub fn without_host(mut self) -> Self {
        self.exclude_host = true;
        self
    }

    /// Check if `transport` is enabled.
    pub fn enabled(&self, transport: Transport) -> bool {
        match transport {
            Transport::Tcp => self.tcp,
            Transport::Tcp6 => self.tcp6,
            Transport::Udp => self.udp,
            Transport::Udp6 => self.udp6,
            Transport::UdpLite => self.udplite,
            Transport::UdpLite6 => self.udplite6,
            Transport::Raw => self.raw,
            Transport::Raw6 => self.raw6,
        }
    }

    /// The enabled transports, in table order.
    pub fn transports(&self) -> Vec<Transport> {
        Transport::ALL
            .into_iter()
            .filter(|t| self.enabled(*t))
            .collect()
    }
}

/// One table file to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    /// Namespace label given to every entry of this table.
    pub label: String,
    /// Process the table is read through; `None` for the host.
    pub pid: Option<u32>,
    /// Transport of the table.
    pub transport: Transport,
    /// Path of the table file.
    pub path: PathBuf,
}

/// Handle for collecting socket tables.
///
/// Holds configuration only; every [`collect`](Self::collect) call builds its
/// own namespace mapping, process cache and index, so concurrent calls share
/// nothing.
#[derive(Debug, Clone, Default)]
pub struct Netstat {
    config: NetstatConfig,
}

impl Netstat {
    /// Create a handle reading `/proc` and `/var/run/netns`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle with custom paths and limits.
    pub fn with_config(config: NetstatConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &NetstatConfig {
        &self.config
    }

    /// Compute the tables to read.
    ///
    /// `namespaces` maps resolved PIDs to namespace names. Explicit
    /// `namespace_pids` not in it are labelled with the PID itself. Each
    /// namespace appears once, the host first.
    pub fn tables_for(
        &self,
        features: &Features,
        namespaces: &HashMap<u32, String>,
    ) -> Vec<TableTarget> {
        let mut pids: BTreeMap<u32, String> = namespaces
            .iter()
            .map(|(pid, name)| (*pid, name.clone()))
            .collect();
        for pid in &features.namespace_pids {
            pids.entry(*pid).or_insert_with(|| pid.to_string());
        }

        let host = (!features.exclude_host).then(|| (None, String::new()));
        let units = host
            .into_iter()
            .chain(pids.into_iter().map(|(pid, label)| (Some(pid), label)));

        let transports = features.transports();
        let mut targets = Vec::new();
        for (pid, label) in units {
            let dir = self.config.net_dir(pid);
            for transport in &transports {
                targets.push(TableTarget {
                    label: label.clone(),
                    pid,
                    transport: *transport,
                    path: dir.join(transport.file_name()),
                });
            }
        }
        targets
    }

    /// Collect a snapshot of the selected socket tables.
    ///
    /// `filter` runs once per decoded entry, before the namespace label and
    /// process are attached. Tables that cannot be opened are skipped; a row
    /// that fails to decode aborts the call. If `cancel` fires, the call
    /// returns [`Error::Cancelled`] holding whatever had been merged.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use netstat::{Features, Netstat};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// let netstat = Netstat::new();
    /// let features = Features::default_transports().with_processes();
    /// let listening = netstat
    ///     .collect(&CancellationToken::new(), &features, |e| e.is_listening())
    ///     .await?;
    /// ```
    pub async fn collect<F>(
        &self,
        cancel: &CancellationToken,
        features: &Features,
        filter: F,
    ) -> Result<Vec<SocketEntry>>
    where
        F: Fn(&SocketEntry) -> bool + Send + Sync + 'static,
    {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }

        let namespaces = self.resolve_namespaces(features, cancel).await?;
        let targets = self.tables_for(features, &namespaces);
        debug!(tables = targets.len(), "collecting socket tables");

        let mut entries = read_tables(targets, cancel, Arc::new(filter)).await?;

        if features.processes && !entries.is_empty() {
            let cache = Arc::new(ProcessCache::new());
            match ProcessIndex::build(&self.config, cancel, &cache).await {
                Ok(index) => {
                    for entry in &mut entries {
                        if let Some(process) = index.get(entry.inode) {
                            entry.process = Some(Arc::clone(process));
                        }
                    }
                }
                Err(e) if e.is_cancelled() => {
                    return Err(Error::Cancelled { partial: entries });
                }
                Err(e) => warn!(error = %e, "process index unavailable"),
            }
        }

        Ok(entries)
    }

    async fn resolve_namespaces(
        &self,
        features: &Features,
        cancel: &CancellationToken,
    ) -> Result<HashMap<u32, String>> {
        let mut names = features.namespace_names.clone();
        if features.all_namespaces {
            match namespace::list_names(&self.config).await {
                Ok(registered) => names.extend(registered),
                Err(e) => debug!(error = %e, "namespace registry unavailable"),
            }
        }
        names.sort();
        names.dedup();
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        match namespace::resolve_names(&self.config, &names, cancel).await {
            Ok(resolved) => Ok(resolved),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(error = %e, "namespace resolution failed");
                Ok(HashMap::new())
            }
        }
    }
}

async fn read_tables<F>(
    targets: Vec<TableTarget>,
    cancel: &CancellationToken,
    filter: Arc<F>,
) -> Result<Vec<SocketEntry>>
where
    F: Fn(&SocketEntry) -> bool + Send + Sync + 'static,
{
    let mut workers = JoinSet::new();
    for target in targets {
        let cancel = cancel.clone();
        let filter = Arc::clone(&filter);
        workers.spawn_blocking(move || read_table(&target, &cancel, filter.as_ref()));
    }

    let mut merged = Vec::new();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Error::Cancelled { partial: merged });
            }
            next = workers.join_next() => match next {
                None => break,
                Some(Ok(Ok(entries))) => merged.extend(entries),
                Some(Ok(Err(e))) => return Err(e),
                Some(Err(e)) => warn!(error = %e, "table worker failed"),
            },
        }
    }
    Ok(merged)
}

fn read_table<F>(target: &TableTarget, cancel: &CancellationToken, filter: &F) -> Result<Vec<SocketEntry>>
where
    F: Fn(&SocketEntry) -> bool,
{
    if cancel.is_cancelled() {
        return Ok(Vec::new());
    }

    let file = match File::open(&target.path) {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %target.path.display(), error = %e, "skipping table");
            return Ok(Vec::new());
        }
    };

    let mut entries = match decode_table(&target.path, BufReader::new(file), target.transport, filter) {
        Ok(entries) => entries,
        Err(Error::FileUnavailable { path, source }) => {
            debug!(path = %path.display(), error = %source, "table unreadable");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    for entry in &mut entries {
        entry.namespace.clone_from(&target.label);
    }
    trace!(path = %target.path.display(), entries = entries.len(), "table decoded");
    Ok(entries)
}
