//! Server configuration from the environment (and `.env` files).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_API_BASE: &str = "http://localhost:4000/api";
pub const DEFAULT_LOCAL_CACHE: &str = ".roi_scenarios_v1.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// SQLite file for saved scenarios. `None` runs without a durable store.
    pub db_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            db_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("PORT") {
            config.port = v.trim().parse().unwrap_or(config.port);
        }
        if let Some(v) = lookup("BIND_ADDR") {
            config.bind_addr = v.trim().parse().unwrap_or(config.bind_addr);
        }
        config.db_path = resolve_data_path(lookup("SCENARIOS_DB_PATH"));

        config
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

/// Blank means unset. Relative paths are anchored at the crate directory,
/// not the caller's cwd.
pub fn resolve_data_path(env_value: Option<String>) -> Option<String> {
    let raw = env_value.filter(|v| !v.trim().is_empty())?;

    let p = PathBuf::from(raw.trim());
    if p.is_absolute() {
        return Some(p.to_string_lossy().to_string());
    }

    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    Some(base.join(p).to_string_lossy().to_string())
}

/// Load `.env` from the usual dotenv search path, then from the crate directory.
pub fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidates = [manifest_dir.join(".env"), manifest_dir.join("../.env")];

    for p in candidates {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }
}
