use crate::error::{ServerError, ServerResult};
use livegrid_engine::transcript::FlashTiming;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "livegrid.config.json";

pub const DEFAULT_PORT: u16 = 9999;

/// Highlight durations are capped at one day
const MAX_HIGHLIGHT_MS: u64 = 86_400_000;

/// Which document the listeners feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    /// Track × measure transcript grid
    #[default]
    Transcript,
    /// Time-indexed event points
    Events,
}

/// Launcher configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Address every listener binds to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// UDP ingestion port; `null` disables UDP
    #[serde(default = "default_udp_port")]
    pub udp_port: Option<u16>,

    /// Newline-delimited TCP ingestion port
    #[serde(default)]
    pub tcp_port: Option<u16>,

    /// HTTP read API port
    #[serde(default)]
    pub http_port: Option<u16>,

    #[serde(default)]
    pub schema: SchemaKind,

    #[serde(default = "default_flash_ms")]
    pub flash_duration_ms: u64,

    #[serde(default = "default_cross_out_ms")]
    pub cross_out_duration_ms: u64,

    /// Status summary interval; `null` disables the reporter
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: Option<u64>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_udp_port() -> Option<u16> {
    Some(DEFAULT_PORT)
}

fn default_flash_ms() -> u64 {
    500
}

fn default_cross_out_ms() -> u64 {
    350
}

fn default_report_interval_ms() -> Option<u64> {
    Some(5000)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            udp_port: default_udp_port(),
            tcp_port: None,
            http_port: None,
            schema: SchemaKind::default(),
            flash_duration_ms: default_flash_ms(),
            cross_out_duration_ms: default_cross_out_ms(),
            report_interval_ms: default_report_interval_ms(),
        }
    }
}

impl ServerConfig {
    /// Load config from an explicit file, or from `livegrid.config.json` in
    /// the working directory when it exists
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_NAME);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback.to_path_buf()
            }
        };

        let content = std::fs::read_to_string(&path)?;
        let config: ServerConfig = serde_json::from_str(&content)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn flash_timing(&self) -> FlashTiming {
        FlashTiming::from_millis(
            self.flash_duration_ms.min(MAX_HIGHLIGHT_MS) as i64,
            self.cross_out_duration_ms.min(MAX_HIGHLIGHT_MS) as i64,
        )
    }

    pub fn report_interval(&self) -> Option<Duration> {
        self.report_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn socket_addr(&self, port: u16) -> ServerResult<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| ServerError::Address(self.bind.clone()))?;
        Ok(SocketAddr::new(ip, port))
    }
}
