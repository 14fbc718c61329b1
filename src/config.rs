//! Client configuration file parser.
//!
//! Flat `key = value` format, one option per line, `#` starts a comment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DashcamError, Result};

// Defaults (seconds unless noted)
const HTTP_PORT:       u16 = 80;
const RTSP_PORT:       u16 = 554;
const CONNECT_TIMEOUT: u64 = 5;
const COMMAND_TIMEOUT: u64 = 5;
const COUNT_TIMEOUT:   u64 = 5;
const LIST_TIMEOUT:    u64 = 10;
const REQUEST_TIMEOUT: u64 = 30;
const DOWNLOAD_IDLE:   u64 = 30;
const POLL_INTERVAL:   u64 = 3;
const PAGE_SIZE:       u32 = 50;

const APP_DIR: &str = "dashcam";

/// Full client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // ── Device ports ──────────────────────────────────────────────────────────
    pub http_port: u16,
    pub rtsp_port: u16,
    // ── Timeouts ──────────────────────────────────────────────────────────────
    /// Connectivity probe.
    pub connect_timeout: u64,
    /// Each `workmodecmd.cgi` command (trigger, start, stop).
    pub command_timeout: u64,
    pub count_timeout:   u64,
    pub list_timeout:    u64,
    /// Ceiling applied to every status, listing and command request.
    pub request_timeout: u64,
    /// Longest silence tolerated mid-download; downloads have no total limit.
    pub download_idle_timeout: u64,
    // ── Polling ───────────────────────────────────────────────────────────────
    pub poll_interval: u64,
    /// `-end` value used for gallery listings.
    pub page_size: u32,
    /// Require a `count=` marker in the probe response, not just HTTP 200.
    pub strict_connectivity: bool,
    // ── Local state ───────────────────────────────────────────────────────────
    /// JSON key-value store holding the camera registry.
    pub store_file:   PathBuf,
    pub download_dir: PathBuf,
    /// External program the RTSP URL is handed to.
    pub player: String,
    pub log_syslog: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_port:           HTTP_PORT,
            rtsp_port:           RTSP_PORT,
            connect_timeout:     CONNECT_TIMEOUT,
            command_timeout:     COMMAND_TIMEOUT,
            count_timeout:       COUNT_TIMEOUT,
            list_timeout:        LIST_TIMEOUT,
            request_timeout:     REQUEST_TIMEOUT,
            download_idle_timeout: DOWNLOAD_IDLE,
            poll_interval:       POLL_INTERVAL,
            page_size:           PAGE_SIZE,
            strict_connectivity: false,
            store_file:          default_store_file(),
            download_dir:        PathBuf::from("."),
            player:              "ffplay".to_string(),
            log_syslog:          false,
        }
    }
}

impl ClientConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout),
            command: Duration::from_secs(self.command_timeout),
            count:   Duration::from_secs(self.count_timeout),
            list:    Duration::from_secs(self.list_timeout),
            request: Duration::from_secs(self.request_timeout),
            download_idle: Duration::from_secs(self.download_idle_timeout),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}

/// Per-operation request timeouts handed to the device client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub command: Duration,
    pub count:   Duration,
    pub list:    Duration,
    pub request: Duration,
    pub download_idle: Duration,
}

/// `<config dir>/dashcam/dashcam.conf`, or `dashcam.conf` if the platform
/// has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join("dashcam.conf"))
        .unwrap_or_else(|| PathBuf::from("dashcam.conf"))
}

fn default_store_file() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join(APP_DIR).join("store.json"))
        .unwrap_or_else(|| PathBuf::from("dashcam-store.json"))
}

fn parse_bool(val: &str) -> bool {
    val == "true" || val == "1" || val == "yes"
}

/// Parse `path` as a `dashcam.conf` key=value configuration file.
pub fn load_config(path: &Path) -> Result<ClientConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| DashcamError::Config(format!("cannot read {}: {e}", path.display())))?;
    Ok(parse_config(&content))
}

/// Load `path` if it exists, otherwise fall back to the defaults.
pub fn load_config_or_default(path: &Path) -> Result<ClientConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(ClientConfig::default())
    }
}

pub fn parse_config(content: &str) -> ClientConfig {
    let mut cfg = ClientConfig::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, '=');
        let key = match parts.next() {
            Some(k) => k.trim().to_ascii_lowercase(),
            None => continue,
        };
        let val = match parts.next() {
            Some(v) => v.trim().to_string(),
            None => continue,
        };
        if val.is_empty() {
            continue;
        }

        match key.as_str() {
            "http_port"           => cfg.http_port           = val.parse().unwrap_or(HTTP_PORT),
            "rtsp_port"           => cfg.rtsp_port           = val.parse().unwrap_or(RTSP_PORT),
            "connect_timeout"     => cfg.connect_timeout     = val.parse().unwrap_or(CONNECT_TIMEOUT),
            "command_timeout"     => cfg.command_timeout     = val.parse().unwrap_or(COMMAND_TIMEOUT),
            "count_timeout"       => cfg.count_timeout       = val.parse().unwrap_or(COUNT_TIMEOUT),
            "list_timeout"        => cfg.list_timeout        = val.parse().unwrap_or(LIST_TIMEOUT),
            "request_timeout"     => cfg.request_timeout     = val.parse().unwrap_or(REQUEST_TIMEOUT),
            "download_idle_timeout" => {
                cfg.download_idle_timeout = val.parse().unwrap_or(DOWNLOAD_IDLE)
            }
            "poll_interval"       => cfg.poll_interval       = val.parse().unwrap_or(POLL_INTERVAL),
            "page_size"           => cfg.page_size           = val.parse().unwrap_or(PAGE_SIZE),
            "strict_connectivity" => cfg.strict_connectivity = parse_bool(&val),
            "store_file"          => cfg.store_file          = PathBuf::from(&val),
            "download_dir"        => cfg.download_dir        = PathBuf::from(&val),
            "player"              => cfg.player              = val,
            "log_syslog"          => cfg.log_syslog          = parse_bool(&val),
            _ => {} // ignore unknown keys
        }
    }

    cfg
}

/// Validate that numeric fields are usable.
pub fn validate_config(cfg: &ClientConfig) -> Result<()> {
    if cfg.http_port == 0 || cfg.rtsp_port == 0 {
        return Err(DashcamError::Config("http_port and rtsp_port must be non-zero".into()));
    }
    let timeouts = [
        ("connect_timeout", cfg.connect_timeout),
        ("command_timeout", cfg.command_timeout),
        ("count_timeout",   cfg.count_timeout),
        ("list_timeout",    cfg.list_timeout),
        ("request_timeout", cfg.request_timeout),
        ("download_idle_timeout", cfg.download_idle_timeout),
        ("poll_interval",   cfg.poll_interval),
    ];
    for (key, val) in timeouts {
        if val == 0 {
            return Err(DashcamError::Config(format!("{key} must be at least 1 second")));
        }
    }
    if cfg.page_size == 0 {
        return Err(DashcamError::Config("page_size must be non-zero".into()));
    }
    if cfg.player.trim().is_empty() {
        return Err(DashcamError::Config("player must not be empty".into()));
    }
    Ok(())
}
