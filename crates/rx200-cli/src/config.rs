//! Configuration Vault – reads/writes `~/.rx200/config.toml`.

use rx200_runtime::ExecutionMode;
use rx200_types::BridgeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted bridge configuration stored in `~/.rx200/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Interface the HTTP server binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP port for the control API and operator UI.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// WebSocket URL of the `rosbridge_server`.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    #[serde(default = "default_arm_topic")]
    pub arm_topic: String,

    #[serde(default = "default_gripper_topic")]
    pub gripper_topic: String,

    #[serde(default = "default_joint_states_topic")]
    pub joint_states_topic: String,

    /// `serial` or `batched`.
    #[serde(default)]
    pub execution_mode: ExecutionMode,

    /// Pause after a sequence step without its own `delay`, in seconds.
    #[serde(default = "default_delay_secs")]
    pub default_delay_secs: f64,

    /// Pause between rosbridge reconnection attempts, in seconds.
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

fn default_bind_address() -> String {
    rx200_cockpit::DEFAULT_BIND_ADDRESS.to_string()
}
fn default_http_port() -> u16 {
    rx200_cockpit::DEFAULT_PORT
}
fn default_rosbridge_url() -> String {
    rx200_middleware::DEFAULT_ROSBRIDGE_URL.to_string()
}
fn default_arm_topic() -> String {
    rx200_middleware::DEFAULT_ARM_TOPIC.to_string()
}
fn default_gripper_topic() -> String {
    rx200_middleware::DEFAULT_GRIPPER_TOPIC.to_string()
}
fn default_joint_states_topic() -> String {
    rx200_middleware::DEFAULT_JOINT_STATES_TOPIC.to_string()
}
fn default_delay_secs() -> f64 {
    rx200_runtime::DEFAULT_STEP_DELAY_SECS
}
fn default_reconnect_secs() -> u64 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            rosbridge_url: default_rosbridge_url(),
            arm_topic: default_arm_topic(),
            gripper_topic: default_gripper_topic(),
            joint_states_topic: default_joint_states_topic(),
            execution_mode: ExecutionMode::default(),
            default_delay_secs: default_delay_secs(),
            reconnect_secs: default_reconnect_secs(),
        }
    }
}

impl Config {
    /// Reject values the bridge cannot run with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if !self.default_delay_secs.is_finite() || self.default_delay_secs < 0.0 {
            return Err(BridgeError::Config(format!(
                "default_delay_secs must be a non-negative number, got {}",
                self.default_delay_secs
            )));
        }
        if !(self.rosbridge_url.starts_with("ws://") || self.rosbridge_url.starts_with("wss://")) {
            return Err(BridgeError::Config(format!(
                "rosbridge_url must be a ws:// or wss:// URL, got {:?}",
                self.rosbridge_url
            )));
        }
        for (field, topic) in [
            ("arm_topic", &self.arm_topic),
            ("gripper_topic", &self.gripper_topic),
            ("joint_states_topic", &self.joint_states_topic),
        ] {
            if !topic.starts_with('/') {
                return Err(BridgeError::Config(format!(
                    "{field} must be an absolute topic name, got {topic:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Return the path to `~/.rx200/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rx200").join("config.toml")
}

/// Load the config from disk with `RX200_*` overrides applied.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, BridgeError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Load the config from a specific path, without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        BridgeError::Config(format!("Failed to read config at {}: {}", path.display(), e))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| BridgeError::Config(format!("Failed to parse config: {}", e)))?;
    Ok(Some(cfg))
}

/// Apply `RX200_*` environment variable overrides to `cfg`.
///
/// Values that do not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `RX200_BIND_ADDRESS` | `bind_address` |
/// | `RX200_HTTP_PORT` | `http_port` |
/// | `RX200_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `RX200_EXECUTION_MODE` | `execution_mode` |
/// | `RX200_DEFAULT_DELAY_SECS` | `default_delay_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("RX200_BIND_ADDRESS") {
        cfg.bind_address = v;
    }
    if let Ok(v) = std::env::var("RX200_HTTP_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.http_port = port;
    }
    if let Ok(v) = std::env::var("RX200_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Ok(v) = std::env::var("RX200_EXECUTION_MODE")
        && let Ok(mode) = v.parse::<ExecutionMode>()
    {
        cfg.execution_mode = mode;
    }
    if let Ok(v) = std::env::var("RX200_DEFAULT_DELAY_SECS")
        && let Ok(secs) = v.parse::<f64>()
        && secs.is_finite()
        && secs >= 0.0
    {
        cfg.default_delay_secs = secs;
    }
}

/// Save the config to disk, creating `~/.rx200/` if necessary.
pub fn save(cfg: &Config) -> Result<(), BridgeError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), BridgeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BridgeError::Config(format!("Failed to create config directory: {}", e))
        })?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                BridgeError::Config(format!("Failed to set config directory permissions: {}", e))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| BridgeError::Config(format!("Failed to serialize config: {}", e)))?;
    let write_error =
        |e: std::io::Error| BridgeError::Config(format!("Failed to write config at {}: {}", path.display(), e));
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(write_error)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_error)?;
    Ok(())
}
