//! netstat command - socket tables with process and namespace info.
//!
//! Lists TCP, UDP, UDP-Lite and raw sockets from procfs, optionally across
//! named network namespaces or the namespaces of given processes, with the
//! owning process of every socket.

mod output;

use clap::Parser;
use netstat::{Features, Netstat, NetstatConfig, SocketEntry, accept_all};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "netstat", version, about = "Socket tables from procfs")]
struct Cli {
    /// Display listening server sockets.
    #[arg(short = 'l', long)]
    listening: bool,

    /// Display all sockets (default: connected).
    #[arg(short = 'a', long)]
    all: bool,

    /// Display only IPv4 sockets.
    #[arg(short = '4', long)]
    ipv4: bool,

    /// Display only IPv6 sockets.
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Display PID/Program name for sockets.
    #[arg(short = 'p', long)]
    processes: bool,

    /// Display TCP sockets.
    #[arg(short = 't', long)]
    tcp: bool,

    /// Display UDP sockets.
    #[arg(short = 'u', long)]
    udp: bool,

    /// Display UDP-Lite sockets.
    #[arg(short = 'U', long)]
    udplite: bool,

    /// Display raw sockets.
    #[arg(short = 'w', long)]
    raw: bool,

    /// Comma separated PIDs whose network namespaces to include.
    /// A single PID also hides the host namespace.
    #[arg(long, value_delimiter = ',')]
    pids: Vec<u32>,

    /// Include a named network namespace (repeatable).
    #[arg(long = "netns", value_name = "NAME")]
    netns: Vec<String>,

    /// Include every named network namespace.
    #[arg(long)]
    all_netns: bool,

    /// Hide the host network namespace.
    #[arg(long)]
    no_host: bool,

    /// Output in JSON format.
    #[arg(short = 'j', long)]
    json: bool,

    /// Don't display header.
    #[arg(short = 'H', long)]
    no_header: bool,

    /// Process filesystem root.
    #[arg(long, default_value = netstat::config::PROC_ROOT)]
    proc_root: String,

    /// Named network namespace directory.
    #[arg(long, default_value = netstat::config::NETNS_RUN_DIR)]
    netns_dir: String,
}

impl Cli {
    fn features(&self) -> Features {
        let mut features = if self.tcp || self.udp || self.udplite || self.raw {
            Features {
                tcp: self.tcp,
                tcp6: self.tcp,
                udp: self.udp,
                udp6: self.udp,
                udplite: self.udplite,
                udplite6: self.udplite,
                raw: self.raw,
                raw6: self.raw,
                ..Default::default()
            }
        } else {
            Features::default_transports()
        };

        if self.ipv4 && !self.ipv6 {
            features = features.only_ipv4();
        }
        if self.ipv6 && !self.ipv4 {
            features = features.only_ipv6();
        }

        features.processes = self.processes;
        features.all_namespaces = self.all_netns;
        features.namespace_names = self.netns.clone();
        features.namespace_pids = self.pids.clone();
        features.exclude_host = self.no_host || self.pids.len() == 1;
        features
    }

    fn config(&self) -> NetstatConfig {
        NetstatConfig::default()
            .with_proc_root(&self.proc_root)
            .with_netns_dir(&self.netns_dir)
    }

    fn filter(&self) -> fn(&SocketEntry) -> bool {
        if self.all {
            accept_all
        } else if self.listening {
            SocketEntry::is_listening
        } else {
            |e: &SocketEntry| !e.is_listening()
        }
    }
}

fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.processes && !is_root() {
        eprintln!("Not all processes could be identified, you would have to be root to see it all.");
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let netstat = Netstat::with_config(cli.config());
    let entries = netstat
        .collect(&cancel, &cli.features(), cli.filter())
        .await?;

    if cli.json {
        output::print_json(&entries)?;
    } else {
        output::print_text(&entries, cli.no_header)?;
    }

    Ok(())
}
