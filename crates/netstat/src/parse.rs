//! Decoder for the `/proc/net/{tcp,udp,raw,...}` text tables.
//!
//! Every table starts with one header line followed by fixed-order,
//! whitespace-separated rows:
//!
//! ```text
//!   sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
//!    0: 0100007F:13AD 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 107869 1 ffff88022c1e7000 100 0 0 10 0
//! ```
//!
//! Addresses are the kernel's in-memory words printed as hex, so on the
//! little-endian hosts this targets each 32-bit group has to be byte
//! swapped. Columns after the memory address (`raw` drop counters, TCP
//! congestion fields) are ignored.

use std::io::BufRead;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{SocketEntry, TcpState, TimerActive, Transport};

/// Hex digits in an IPv4 address field.
const IPV4_HEX_LEN: usize = 8;
/// Hex digits in an IPv6 address field.
const IPV6_HEX_LEN: usize = 32;
/// Columns up to and including the memory address.
const MIN_FIELDS: usize = 12;

fn hex<T: TryFrom<u64>>(field: &'static str, s: &str) -> Result<T> {
    let malformed = || Error::MalformedHex {
        field,
        value: s.to_string(),
    };
    // from_str_radix also takes a leading '+', which the kernel never prints.
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed());
    }
    let value = u64::from_str_radix(s, 16).map_err(|_| malformed())?;
    T::try_from(value).map_err(|_| malformed())
}

fn dec<T: TryFrom<u64>>(field: &'static str, s: &str) -> Result<T> {
    let malformed = || Error::MalformedDecimal {
        field,
        value: s.to_string(),
    };
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let value: u64 = s.parse().map_err(|_| malformed())?;
    T::try_from(value).map_err(|_| malformed())
}

/// Decode an 8-digit little-endian hex word into an IPv4 address.
pub fn decode_ipv4_hex(s: &str) -> Result<Ipv4Addr> {
    if s.len() != IPV4_HEX_LEN {
        return Err(Error::MalformedHex {
            field: "ipv4 address",
            value: s.to_string(),
        });
    }
    let word: u32 = hex("ipv4 address", s)?;
    Ok(Ipv4Addr::from(word.to_le_bytes()))
}

/// Decode 32 hex digits, four little-endian words, into an IPv6 address.
pub fn decode_ipv6_hex(s: &str) -> Result<Ipv6Addr> {
    if s.len() != IPV6_HEX_LEN || !s.is_ascii() {
        return Err(Error::MalformedHex {
            field: "ipv6 address",
            value: s.to_string(),
        });
    }
    let mut octets = [0u8; 16];
    for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
        let group = &s[i * 8..(i + 1) * 8];
        let word: u32 = hex("ipv6 address", group)?;
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    Ok(Ipv6Addr::from(octets))
}

/// Decode an `address:port` column.
pub fn decode_endpoint(field: &str) -> Result<SocketAddr> {
    let (addr, port) = field
        .split_once(':')
        .ok_or_else(|| Error::BadEndpointFormat(field.to_string()))?;

    let ip = match addr.len() {
        IPV4_HEX_LEN => IpAddr::V4(decode_ipv4_hex(addr)?),
        IPV6_HEX_LEN => IpAddr::V6(decode_ipv6_hex(addr)?),
        _ => return Err(Error::BadEndpointFormat(addr.to_string())),
    };

    let port: u16 =
        hex("port", port).map_err(|_| Error::BadPortFormat(port.to_string()))?;

    Ok(SocketAddr::new(ip, port))
}

fn split_pair<'a>(token: &'a str, what: &str, line: &str) -> Result<(&'a str, &'a str)> {
    token
        .split_once(':')
        .ok_or_else(|| Error::malformed_line(format!("{} is not a colon pair", what), line))
}

/// Decode one data row of a socket table.
///
/// The returned entry has no process and an empty namespace label.
pub fn decode_line(line: &str, transport: Transport) -> Result<SocketEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return Err(Error::malformed_line(
            format!("expected at least {} fields, got {}", MIN_FIELDS, fields.len()),
            line,
        ));
    }

    let slot = fields[0]
        .strip_suffix(':')
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()));
    if slot.is_none() {
        return Err(Error::malformed_line("slot is not `<n>:`", line));
    }

    let local = decode_endpoint(fields[1])?;
    let remote = decode_endpoint(fields[2])?;
    let state: u8 = hex("state", fields[3])?;

    let (tx, rx) = split_pair(fields[4], "tx_queue:rx_queue", line)?;
    let (tr, when) = split_pair(fields[5], "tr:tm->when", line)?;
    let timer: u8 = hex("timer", tr)?;

    Ok(SocketEntry {
        transport,
        local,
        remote,
        state: TcpState::from_u8(state),
        tx_queue: hex("tx_queue", tx)?,
        rx_queue: hex("rx_queue", rx)?,
        timer_active: TimerActive::from_u8(timer),
        timer_when: hex("tm->when", when)?,
        retransmits: hex("retrnsmt", fields[6])?,
        uid: dec("uid", fields[7])?,
        timeout: dec("timeout", fields[8])?,
        inode: dec("inode", fields[9])?,
        ref_count: dec("ref", fields[10])?,
        mem_address: hex("pointer", fields[11])?,
        process: None,
        namespace: String::new(),
    })
}

/// Decode a whole table, keeping the rows `accept` returns true for.
///
/// The first line is always treated as the header. Blank lines and `#`
/// comments are skipped. The first row that fails to decode, including one
/// that is not UTF-8, aborts the table with an [`Error::Table`] naming
/// `path` and the row. [`Error::FileUnavailable`] is reserved for read
/// failures.
pub fn decode_table<R, F>(
    path: &Path,
    reader: R,
    transport: Transport,
    accept: F,
) -> Result<Vec<SocketEntry>>
where
    R: BufRead,
    F: Fn(&SocketEntry) -> bool,
{
    let unavailable = |source| Error::FileUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let table_error = |line: &str, source: Error| Error::Table {
        path: path.to_path_buf(),
        line: line.to_string(),
        source: Box::new(source),
    };

    let mut entries = Vec::new();
    for raw in reader.split(b'\n').skip(1) {
        let raw = raw.map_err(unavailable)?;
        let line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                let lossy = String::from_utf8_lossy(e.as_bytes());
                let lossy = lossy.trim();
                return Err(table_error(lossy, Error::malformed_line("row is not valid UTF-8", lossy)));
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let entry = decode_line(trimmed, transport).map_err(|e| table_error(trimmed, e))?;
        if accept(&entry) {
            entries.push(entry);
        }
    }
    Ok(entries)
}
