use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory static assets are served from
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// App shell returned for unmatched routes
    #[serde(default = "default_index_file")]
    pub index_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Upgrade path
    #[serde(default = "default_ws_path")]
    pub path: String,
    /// Heartbeat interval in seconds (server sends ping, evicts on the next sweep if no pong)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Outbound queue capacity per connection
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_client_url")]
    pub url: String,
    /// Delay before the first reconnect attempt
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// 1.0 keeps the delay fixed
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
    #[serde(default)]
    pub jitter_factor: f64,
    /// Readings kept in the rolling window
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Interval attached to outbound control messages
    #[serde(default = "default_interval")]
    pub interval: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    "public".to_string()
}

fn default_index_file() -> String {
    "index.html".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_heartbeat_interval() -> u64 {
    30 // 30 seconds
}

fn default_channel_buffer() -> usize {
    32
}

fn default_client_url() -> String {
    "ws://127.0.0.1:3000/ws".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

fn default_history_size() -> usize {
    20
}

fn default_interval() -> u32 {
    1
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("server.static_dir", default_static_dir())?
            .set_default("server.index_file", default_index_file())?
            .set_default("websocket.path", default_ws_path())?
            .set_default("websocket.heartbeat_interval", default_heartbeat_interval() as i64)?
            .set_default("client.url", default_client_url())?
            .set_default("client.reconnect_delay_ms", default_reconnect_delay_ms() as i64)?
            .set_default("log.format", default_log_format())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, WEBSOCKET__HEARTBEAT_INTERVAL, CLIENT__URL, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            // Plain PORT wins over everything else
            .set_override_option("server.port", env::var("PORT").ok())?;

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerConfig {
    pub fn index_path(&self) -> PathBuf {
        PathBuf::from(&self.static_dir).join(&self.index_file)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            index_file: default_index_file(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: default_ws_path(),
            heartbeat_interval: default_heartbeat_interval(),
            channel_buffer: default_channel_buffer(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_client_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            jitter_factor: 0.0,
            history_size: default_history_size(),
            interval: default_interval(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}
