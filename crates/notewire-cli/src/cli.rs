use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use notewire_server::ServerConfig;

#[derive(Parser)]
#[command(
    name = "notewire",
    about = "Anonymous web notepad with version history and live collaboration",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the notewire server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Storage root for note content and version history
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory served under /static/
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Ceiling on total bytes of current note content
    #[arg(long)]
    pub max_storage_size: Option<i64>,

    /// Cap on a single note's content in bytes
    #[arg(long)]
    pub max_note_size: Option<u64>,

    /// Hours of global inactivity before version history resets
    #[arg(long)]
    pub history_reset_hours: Option<u64>,
}

impl ServeArgs {
    /// Environment-derived defaults with CLI flags layered on top.
    pub fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::from_env();
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(dir) = self.static_dir {
            config.static_dir = dir;
        }
        if let Some(size) = self.max_storage_size {
            config.max_storage_size = size;
        }
        if let Some(size) = self.max_note_size {
            config.max_note_size = size;
        }
        if let Some(hours) = self.history_reset_hours {
            config.history_reset_hours = hours;
        }
        config
    }
}
