use crate::error::{RelayError, Result};
use std::env;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiServerConfig,
    /// Upstream rosbridge connection
    pub bus: BusConfig,
    /// Buffering, streaming and supervision
    pub relay: RelayConfig,
    /// Container CLI shim
    pub containers: ContainerConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port for the API server (default: 3000)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Allowed CORS origins (comma-separated, empty = local frontend only)
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    /// rosbridge WebSocket URL (ws:// or wss://)
    pub url: String,
    /// Handshake timeout
    pub connect_timeout: Duration,
    /// Pause between reconnect attempts
    pub reconnect_delay: Duration,
    /// Upper bound of the random jitter added to each reconnect pause
    pub reconnect_jitter: Duration,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Message ledger capacity
    pub ledger_capacity: usize,
    /// Camera frame buffer capacity
    pub camera_capacity: usize,
    /// Camera topic subscribed at startup
    pub camera_topic: String,
    /// Message kind of the camera topic
    pub camera_message_type: String,
    /// Push cadence of the camera stream
    pub frame_interval: Duration,
    /// Camera stream counts as active while the last frame is younger than this
    pub stream_timeout: Duration,
    /// Subscription reconciliation poll interval
    pub supervisor_interval: Duration,
    /// Topic commands are published on
    pub command_topic: String,
    /// Message kind of the command topic
    pub command_message_type: String,
    /// Per-client queue length of the log WebSocket
    pub ws_buffer: usize,
}

#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Container CLI binary
    pub binary: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ledger_capacity: 100,
            camera_capacity: 10,
            camera_topic: "/camera/color/image_raw/compressed".to_string(),
            camera_message_type: "sensor_msgs/msg/CompressedImage".to_string(),
            frame_interval: Duration::from_millis(33),
            stream_timeout: Duration::from_secs(5),
            supervisor_interval: Duration::from_secs(2),
            command_topic: "/transcription_text".to_string(),
            command_message_type: "std_msgs/msg/String".to_string(),
            ws_buffer: 256,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            api: ApiServerConfig {
                port: get_env_or("API_PORT", "3000").parse().map_err(|_| {
                    RelayError::InvalidConfig("API_PORT must be a valid port number".into())
                })?,
                host: get_env_or("API_HOST", "0.0.0.0"),
                cors_origins: get_env_or("CORS_ORIGINS", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            bus: BusConfig {
                url: parse_bus_url()?,
                connect_timeout: Duration::from_secs(parse_number(
                    "ROSBRIDGE_CONNECT_TIMEOUT",
                    "10",
                )?),
                reconnect_delay: Duration::from_millis(parse_number(
                    "ROSBRIDGE_RECONNECT_DELAY_MS",
                    "1000",
                )?),
                reconnect_jitter: Duration::from_millis(
                    parse_number("ROSBRIDGE_RECONNECT_JITTER_MS", "250")?,
                ),
            },
            relay: RelayConfig {
                ledger_capacity: parse_capacity("RELAY_LEDGER_CAPACITY", "100")?,
                camera_capacity: parse_capacity("RELAY_CAMERA_CAPACITY", "10")?,
                camera_topic: get_env_or(
                    "RELAY_CAMERA_TOPIC",
                    "/camera/color/image_raw/compressed",
                ),
                camera_message_type: get_env_or(
                    "RELAY_CAMERA_MESSAGE_TYPE",
                    "sensor_msgs/msg/CompressedImage",
                ),
                frame_interval: Duration::from_millis(parse_positive(
                    "RELAY_FRAME_INTERVAL_MS",
                    "33",
                )?),
                stream_timeout: Duration::from_secs(parse_positive(
                    "RELAY_STREAM_TIMEOUT_SECS",
                    "5",
                )?),
                supervisor_interval: Duration::from_millis(parse_positive(
                    "RELAY_SUPERVISOR_INTERVAL_MS",
                    "2000",
                )?),
                command_topic: get_env_or("RELAY_COMMAND_TOPIC", "/transcription_text"),
                command_message_type: get_env_or(
                    "RELAY_COMMAND_MESSAGE_TYPE",
                    "std_msgs/msg/String",
                ),
                ws_buffer: parse_capacity("RELAY_WS_BUFFER", "256")?,
            },
            containers: ContainerConfig {
                binary: get_env_or("DOCKER_BIN", "docker"),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "json"),
            },
        })
    }

    /// Get the API server address
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_bus_url() -> Result<String> {
    let raw = get_env_or("ROSBRIDGE_URL", "ws://localhost:9090");
    let raw = raw.trim();

    let url = Url::parse(raw).map_err(|e| {
        RelayError::InvalidConfig(format!("ROSBRIDGE_URL must be a valid URL: {}", e))
    })?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(RelayError::InvalidConfig(format!(
                "ROSBRIDGE_URL has unsupported scheme: {}",
                other
            )))
        }
    }

    if url.host_str().is_none() {
        return Err(RelayError::InvalidConfig(
            "ROSBRIDGE_URL must include a host".into(),
        ));
    }

    Ok(raw.to_string())
}

fn parse_number(key: &str, default: &str) -> Result<u64> {
    get_env_or(key, default)
        .parse()
        .map_err(|_| RelayError::InvalidConfig(format!("{} must be a valid number", key)))
}

fn parse_positive(key: &str, default: &str) -> Result<u64> {
    match parse_number(key, default)? {
        0 => Err(RelayError::InvalidConfig(format!(
            "{} must be greater than zero",
            key
        ))),
        n => Ok(n),
    }
}

fn parse_capacity(key: &str, default: &str) -> Result<usize> {
    let value = parse_positive(key, default)?;
    usize::try_from(value)
        .map_err(|_| RelayError::InvalidConfig(format!("{} is too large", key)))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
