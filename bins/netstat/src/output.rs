//! Output formatting for netstat command.

use std::io::{self, Write};

use netstat::SocketEntry;

/// Print entries in JSON format.
pub fn print_json(entries: &[SocketEntry]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    serde_json::to_writer_pretty(&mut handle, entries)?;
    writeln!(handle)?;
    Ok(())
}

/// Print entries as a table.
pub fn print_text(entries: &[SocketEntry], no_header: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    if !no_header {
        writeln!(
            handle,
            "{:<8} {:<23} {:<23} {:<12} {:<24} Namespace",
            "Proto", "Local Address", "Foreign Address", "State", "PID/Program name"
        )?;
    }

    for entry in entries {
        write_entry(&mut handle, entry)?;
    }

    Ok(())
}

fn write_entry<W: Write>(w: &mut W, entry: &SocketEntry) -> io::Result<()> {
    let process = entry
        .process
        .as_ref()
        .map(|p| p.to_string())
        .unwrap_or_default();

    writeln!(
        w,
        "{:<8} {:<23.23} {:<23.23} {:<12} {:<24.24} {}",
        entry.transport.to_string(),
        entry.local.to_string(),
        entry.remote.to_string(),
        entry.state.to_string(),
        process,
        entry.namespace
    )
}
