//! Core types for socket table entries.
//!
//! This module provides strongly-typed representations of socket states,
//! timer states, transports and the decoded rows of `/proc/net/*` tables.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;

/// Transport table exposed under `net/` in procfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// TCP over IPv4.
    Tcp,
    /// TCP over IPv6.
    Tcp6,
    /// UDP over IPv4.
    Udp,
    /// UDP over IPv6.
    Udp6,
    /// UDP-Lite over IPv4.
    UdpLite,
    /// UDP-Lite over IPv6.
    UdpLite6,
    /// Raw IPv4.
    Raw,
    /// Raw IPv6.
    Raw6,
}

impl Transport {
    /// Every transport, in table order.
    pub const ALL: [Transport; 8] = [
        Self::Tcp,
        Self::Tcp6,
        Self::Udp,
        Self::Udp6,
        Self::UdpLite,
        Self::UdpLite6,
        Self::Raw,
        Self::Raw6,
    ];

    /// Name of the table file under `net/`.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Tcp6 => "tcp6",
            Self::Udp => "udp",
            Self::Udp6 => "udp6",
            Self::UdpLite => "udplite",
            Self::UdpLite6 => "udplite6",
            Self::Raw => "raw",
            Self::Raw6 => "raw6",
        }
    }

    /// Check if this is an IPv6 table.
    pub fn is_ipv6(&self) -> bool {
        matches!(
            self,
            Self::Tcp6 | Self::Udp6 | Self::UdpLite6 | Self::Raw6
        )
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// TCP socket states as printed in the `st` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum TcpState {
    /// Unknown or out-of-range state.
    Unknown = 0,
    /// Connection established.
    Established = 1,
    /// SYN sent, waiting for matching SYN.
    SynSent = 2,
    /// SYN received, waiting for ACK.
    SynRecv = 3,
    /// FIN sent, waiting for FIN or FIN-ACK.
    FinWait1 = 4,
    /// FIN received, waiting for FIN.
    FinWait2 = 5,
    /// In TIME-WAIT state.
    TimeWait = 6,
    /// Socket is closed.
    Close = 7,
    /// FIN received, close pending.
    CloseWait = 8,
    /// Close wait acknowledged, waiting for FIN.
    LastAck = 9,
    /// Socket is listening.
    Listen = 10,
    /// Both sides sent FIN simultaneously.
    Closing = 11,
}

impl TcpState {
    /// Parse from a raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Established,
            2 => Self::SynSent,
            3 => Self::SynRecv,
            4 => Self::FinWait1,
            5 => Self::FinWait2,
            6 => Self::TimeWait,
            7 => Self::Close,
            8 => Self::CloseWait,
            9 => Self::LastAck,
            10 => Self::Listen,
            11 => Self::Closing,
            _ => Self::Unknown,
        }
    }

    /// Get the state name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Established => "ESTABLISHED",
            Self::SynSent => "SYN_SENT",
            Self::SynRecv => "SYN_RECV",
            Self::FinWait1 => "FIN_WAIT1",
            Self::FinWait2 => "FIN_WAIT2",
            Self::TimeWait => "TIME_WAIT",
            Self::Close => "CLOSE",
            Self::CloseWait => "CLOSE_WAIT",
            Self::LastAck => "LAST_ACK",
            Self::Listen => "LISTEN",
            Self::Closing => "CLOSING",
        }
    }
}

impl fmt::Display for TcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of the socket timer (`tr` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimerActive {
    /// No timer pending.
    Off,
    /// Retransmit timer.
    On,
    /// Keepalive timer.
    KeepAlive,
    /// TIME_WAIT timer.
    TimeWait,
    /// Zero window probe timer.
    Probe,
    /// A code the kernel added after these were named.
    Unknown(u8),
}

impl TimerActive {
    /// Parse from a raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Off,
            1 => Self::On,
            2 => Self::KeepAlive,
            3 => Self::TimeWait,
            4 => Self::Probe,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for TimerActive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("Off"),
            Self::On => f.write_str("On"),
            Self::KeepAlive => f.write_str("KeepAlive"),
            Self::TimeWait => f.write_str("TimeWait"),
            Self::Probe => f.write_str("Probe"),
            Self::Unknown(code) => write!(f, "Unknown({})", code),
        }
    }
}

/// A process owning one or more sockets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Process {
    /// Process ID.
    pub pid: u32,
    /// Command name from `stat`; empty when it could not be read.
    pub name: String,
}

impl Process {
    /// A process whose name is not known.
    pub fn unnamed(pid: u32) -> Self {
        Self {
            pid,
            name: String::new(),
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pid, self.name)
    }
}

/// One row of a kernel socket table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocketEntry {
    /// Table this row came from.
    pub transport: Transport,
    /// Local address and port.
    pub local: SocketAddr,
    /// Remote address and port.
    pub remote: SocketAddr,
    /// Connection state.
    pub state: TcpState,
    /// Transmit queue in bytes.
    pub tx_queue: u64,
    /// Receive queue in bytes.
    pub rx_queue: u64,
    /// Pending timer.
    pub timer_active: TimerActive,
    /// Jiffies until the timer expires.
    pub timer_when: u64,
    /// Unrecovered retransmission timeouts.
    pub retransmits: u64,
    /// Owning user ID.
    pub uid: u32,
    /// Unanswered zero-window probes.
    pub timeout: u64,
    /// Socket inode, the join key against process file descriptors.
    pub inode: u64,
    /// Socket reference count.
    pub ref_count: u64,
    /// Kernel address of the socket.
    pub mem_address: u64,
    /// Owning process, when process enrichment found one.
    pub process: Option<Arc<Process>>,
    /// Namespace the row came from: empty for the host, otherwise the
    /// namespace name or the PID it was read through.
    pub namespace: String,
}

impl SocketEntry {
    /// Check if this is a listening socket.
    pub fn is_listening(&self) -> bool {
        self.state == TcpState::Listen
    }

    /// Check if the row was read from the host namespace.
    pub fn is_host(&self) -> bool {
        self.namespace.is_empty()
    }
}

/// A filter that keeps every entry.
pub fn accept_all(_: &SocketEntry) -> bool {
    true
}
