mod settings;

pub use settings::{ClientConfig, LogConfig, ServerConfig, Settings, WebSocketConfig};
