//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(author, version, about = "Peer-to-peer BLE chat console", long_about = None)]
pub struct Cli {
    /// Bluetooth address of the peer device (e.g. AA:BB:CC:DD:EE:FF)
    pub peer: String,

    /// Your display name; persisted for future sessions
    #[arg(short, long)]
    pub nickname: Option<String>,

    /// Data directory for the history document (default: ~/.blechat)
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 15)]
    pub connect_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
