//! Configuration vault – reads/writes `~/.anchorsight/config.toml`.

use anchorsight_runtime::capture::CaptureConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted user configuration stored in `~/.anchorsight/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint receiving capture payloads.
    #[serde(default = "default_classifier_url")]
    pub classifier_url: String,

    /// Endpoint reporting the highest room in use (`nAnchorsHigh`).
    #[serde(default = "default_rooms_url")]
    pub rooms_url: String,

    /// Optional capture fields.  Kept last so it serializes as a table.
    #[serde(default)]
    pub capture: CaptureConfig,
}

fn default_classifier_url() -> String {
    "http://localhost:5000/api/classify".to_string()
}
fn default_rooms_url() -> String {
    "http://localhost:5000/api/rooms".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifier_url: default_classifier_url(),
            rooms_url: default_rooms_url(),
            capture: CaptureConfig::default(),
        }
    }
}

/// Return the path to `~/.anchorsight/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".anchorsight").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `ANCHORSIGHT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ANCHORSIGHT_CLASSIFIER_URL` | `classifier_url` |
/// | `ANCHORSIGHT_ROOMS_URL` | `rooms_url` |
/// | `ANCHORSIGHT_MULTI_USER` | `capture.multi_user` (`true`/`false`/`1`/`0`) |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ANCHORSIGHT_CLASSIFIER_URL") {
        cfg.classifier_url = v;
    }
    if let Ok(v) = std::env::var("ANCHORSIGHT_ROOMS_URL") {
        cfg.rooms_url = v;
    }
    if let Ok(v) = std::env::var("ANCHORSIGHT_MULTI_USER")
        && let Some(multi) = parse_flag(&v)
    {
        cfg.capture.multi_user = multi;
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "multi" => Some(true),
        "0" | "false" | "no" | "single" => Some(false),
        _ => None,
    }
}

/// Save the config to disk, creating `~/.anchorsight/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
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
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
