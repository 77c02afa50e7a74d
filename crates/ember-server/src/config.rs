//! Startup configuration: where data lives on disk and how the process is
//! bootstrapped before the mutable `Configuration` RPC namespace (backed by
//! `ember_rpc::config::ServerConfig`) takes over. Grounded in the teacher's
//! environment-variable-first configuration style (`neomind_core::config::
//! env_vars`), generalized from LLM-backend selection to this project's
//! data-directory/bind-address bootstrap.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Environment variables that override the defaults below, matching the
/// teacher's `EMBER_*`-prefixed convention (`neomind_core::config::env_vars`
/// uses its own project's prefix for the same purpose).
pub mod env_vars {
    pub const DATA_DIR: &str = "EMBER_DATA_DIR";
    pub const TCP_BIND: &str = "EMBER_TCP_BIND";
    pub const WS_BIND: &str = "EMBER_WS_BIND";
    pub const LOG_JSON: &str = "EMBER_LOG_JSON";
}

#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Directory holding `ember.db` (redb) and `ember.toml` (settings).
    pub data_dir: PathBuf,
    pub tcp_bind: SocketAddr,
    pub ws_bind: SocketAddr,
    pub log_json: bool,
}

impl StartupConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("ember.db")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("ember.toml")
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./ember-data"),
            tcp_bind: "0.0.0.0:7890".parse().unwrap(),
            ws_bind: "0.0.0.0:7891".parse().unwrap(),
            log_json: false,
        }
    }
}

/// Apply `EMBER_*` environment overrides on top of whatever the CLI flags
/// already produced. CLI flags that were explicitly passed take priority —
/// this only fills in values the caller left at their `Default`.
pub fn apply_env_overrides(mut config: StartupConfig) -> StartupConfig {
    if let Ok(dir) = std::env::var(env_vars::DATA_DIR) {
        config.data_dir = PathBuf::from(dir);
    }
    if let Ok(addr) = std::env::var(env_vars::TCP_BIND) {
        if let Ok(parsed) = addr.parse() {
            config.tcp_bind = parsed;
        }
    }
    if let Ok(addr) = std::env::var(env_vars::WS_BIND) {
        if let Ok(parsed) = addr.parse() {
            config.ws_bind = parsed;
        }
    }
    if let Ok(flag) = std::env::var(env_vars::LOG_JSON) {
        if let Ok(parsed) = flag.parse() {
            config.log_json = parsed;
        }
    }
    config
}
