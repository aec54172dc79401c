//! Socket listing for Linux, read from procfs.
//!
//! This crate decodes the kernel socket tables under `/proc/net`
//! (`tcp`, `tcp6`, `udp`, `udp6`, `udplite`, `udplite6`, `raw`, `raw6`),
//! optionally across other network namespaces, and enriches every socket
//! with the process owning it.
//!
//! Namespaces are reached through a process living in them: named
//! namespaces from `/var/run/netns` are resolved to such a process by
//! matching namespace inodes, and explicit PIDs are used directly.
//!
//! # Example
//!
//! ```ignore
//! use netstat::{Features, Netstat};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> netstat::Result<()> {
//!     let netstat = Netstat::new();
//!     let features = Features::default_transports().with_processes();
//!
//!     let entries = netstat
//!         .collect(&CancellationToken::new(), &features, netstat::accept_all)
//!         .await?;
//!     for entry in entries {
//!         println!("{} {} -> {} {}", entry.transport, entry.local, entry.remote, entry.state);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Namespaces
//!
//! ```ignore
//! use netstat::{Features, Netstat};
//!
//! // Sockets of the "blue" namespace only, labelled "blue".
//! let features = Features::default_transports()
//!     .with_namespace("blue")
//!     .without_host();
//! let entries = Netstat::new().collect(&cancel, &features, |e| e.is_listening()).await?;
//! ```

pub mod collect;
pub mod config;
pub mod error;
pub mod namespace;
pub mod parse;
pub mod process;
pub mod types;

// Re-export common types at crate root for convenience
pub use collect::{Features, Netstat, TableTarget};
pub use config::NetstatConfig;
pub use error::{Error, Result};
pub use types::{Process, SocketEntry, TcpState, TimerActive, Transport, accept_all};
