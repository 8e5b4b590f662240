//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML persistence.
//! Every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use super::nickname::generate_nickname;
use crate::irc::codec::DEFAULT_MAX_LINE_LEN;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ctcp: CtcpConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where to connect and who to register as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    /// User mode bitmask for the `USER` command (RFC 2812: 8 = +i).
    #[serde(default)]
    pub mode: u8,
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Joined after the server's welcome (`001`).
    #[serde(default)]
    pub channels: Vec<String>,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            nickname: default_nickname(),
            mode: 0,
            realname: default_realname(),
            channels: Vec::new(),
        }
    }
}

/// CTCP auto-reply settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtcpConfig {
    #[serde(default = "default_true")]
    pub reply_version: bool,
    #[serde(default = "default_true")]
    pub reply_source: bool,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_client_version")]
    pub client_version: String,
    #[serde(default = "default_source_url")]
    pub source_url: String,
}

impl Default for CtcpConfig {
    fn default() -> Self {
        Self {
            reply_version: true,
            reply_source: true,
            client_name: default_client_name(),
            client_version: default_client_version(),
            source_url: default_source_url(),
        }
    }
}

/// Limits for the inbound path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Handler invocations allowed in flight at once; the reader waits
    /// beyond this.
    #[serde(default = "default_max_concurrent_handlers")]
    pub max_concurrent_handlers: usize,
    /// Error reports buffered for the caller before new ones are dropped.
    #[serde(default = "default_error_capacity")]
    pub error_capacity: usize,
    /// Longest accepted inbound line, terminator included.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_handlers: default_max_concurrent_handlers(),
            error_capacity: default_error_capacity(),
            max_line_len: default_max_line_len(),
        }
    }
}

/// What the `sifr` binary does when a session dies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default = "default_true")]
    pub reconnect: bool,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_quit_message")]
    pub quit_message: String,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            reconnect: true,
            reconnect_delay_secs: default_reconnect_delay(),
            quit_message: default_quit_message(),
        }
    }
}

/// Diagnostic logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_host() -> String {
    "irc.libera.chat".to_string()
}
fn default_port() -> u16 {
    6667
}
fn default_nickname() -> String {
    generate_nickname()
}
fn default_realname() -> String {
    "sifr".to_string()
}
fn default_true() -> bool {
    true
}
fn default_client_name() -> String {
    "Sifr".to_string()
}
fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
fn default_source_url() -> String {
    "https://github.com/fudanchii/sifr".to_string()
}
fn default_max_concurrent_handlers() -> usize {
    64
}
fn default_error_capacity() -> usize {
    16
}
fn default_max_line_len() -> usize {
    DEFAULT_MAX_LINE_LEN
}
fn default_reconnect_delay() -> u64 {
    10
}
fn default_quit_message() -> String {
    "sifr out".to_string()
}
fn default_log_filter() -> String {
    "info".to_string()
}
