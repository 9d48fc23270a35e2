use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use notewire_store::StoreConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Storage root: note files plus the history directory.
    pub data_dir: PathBuf,
    /// Directory served under `/static/`.
    pub static_dir: PathBuf,
    /// Ceiling on total bytes of current note content.
    pub max_storage_size: i64,
    /// Cap on a single note's content.
    pub max_note_size: u64,
    /// Hours of global inactivity after which version history resets.
    pub history_reset_hours: u64,
    /// Per-subscriber outbound queue capacity for live updates.
    pub subscriber_capacity: usize,
    /// Rate-limiter refill, tokens per second per visitor.
    pub rate_limit_per_sec: f64,
    /// Rate-limiter bucket capacity.
    pub rate_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            data_dir: PathBuf::from("notes"),
            static_dir: PathBuf::from("static"),
            max_storage_size: 10 * 1024 * 1024,
            max_note_size: 100 * 1024,
            history_reset_hours: 72,
            subscriber_capacity: 32,
            rate_limit_per_sec: 5.0,
            rate_burst: 10.0,
        }
    }
}

impl ServerConfig {
    /// Defaults with environment overrides applied. Unparseable values are
    /// logged and ignored rather than failing startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(port) = env_parse::<u16>("PORT") {
            config.bind_addr.set_port(port);
        }
        if let Ok(dir) = std::env::var("NOTEWIRE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(size) = env_parse("NOTEWIRE_MAX_STORAGE_SIZE") {
            config.max_storage_size = size;
        }
        if let Some(size) = env_parse("NOTEWIRE_MAX_NOTE_SIZE") {
            config.max_note_size = size;
        }
        if let Some(hours) = env_parse("NOTEWIRE_HISTORY_RESET_HOURS") {
            config.history_reset_hours = hours;
        }
        config
    }

    /// The store-facing slice of this configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_storage_size: self.max_storage_size,
            max_note_size: self.max_note_size,
            history_reset: Duration::from_secs(self.history_reset_hours * 3600),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, raw, "ignoring unparseable environment override");
            None
        }
    }
}
