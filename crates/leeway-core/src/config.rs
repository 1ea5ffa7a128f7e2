use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DesignError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeewayConfig {
    #[serde(default)]
    pub api_keys: ApiKeysConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    #[serde(default)]
    pub gemini: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Ask the backend for `application/json` output.
    #[serde(default = "default_true")]
    pub json_mode: bool,

    /// Images above this size are not attached.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Directory standing in for the device media library.
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,

    /// Where fresh camera captures are written.
    #[serde(default = "default_capture_dir")]
    pub capture_dir: PathBuf,

    /// Camera command as an argv list. `{output}` is replaced by the target
    /// file path. Empty means no camera is available.
    #[serde(default)]
    pub capture_command: Vec<String>,

    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub allow_camera: bool,

    #[serde(default = "default_true")]
    pub allow_media_library: bool,

    /// Copy camera captures into the library before analysis.
    #[serde(default)]
    pub save_captures: bool,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_timeout() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.4
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_true() -> bool {
    true
}
fn default_max_image_bytes() -> u64 {
    20 * 1024 * 1024
}
fn default_library_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Leeway")
}
fn default_capture_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("leeway")
        .join("captures")
}
fn default_capture_timeout() -> u64 {
    30
}

impl Default for LeewayConfig {
    fn default() -> Self {
        Self {
            api_keys: ApiKeysConfig::default(),
            backend: BackendConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_api_base(),
            timeout_seconds: default_timeout(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            json_mode: default_true(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            library_dir: default_library_dir(),
            capture_dir: default_capture_dir(),
            capture_command: Vec::new(),
            capture_timeout_secs: default_capture_timeout(),
            allow_camera: default_true(),
            allow_media_library: default_true(),
            save_captures: false,
        }
    }
}

impl LeewayConfig {
    /// Load config from ~/.config/leeway/config.toml, creating defaults if missing.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = LeewayConfig::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DesignError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        toml::from_str(&contents)
            .map_err(|e| DesignError::Config(format!("Failed to parse config: {e}")))
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| DesignError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DesignError::Config("Could not determine config directory".into()))?;
        Ok(config_dir.join("leeway").join("config.toml"))
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Blank values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            self.api_keys.gemini = key;
        }
        if let Some(base) = get("GEMINI_API_BASE") {
            self.backend.api_base = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(model) = get("LEEWAY_MODEL") {
            self.backend.model = model;
        }
        self
    }

    /// The backend credential, if one is configured.
    pub fn gemini_api_key(&self) -> Option<String> {
        let key = self.api_keys.gemini.trim();
        (!key.is_empty()).then(|| key.to_string())
    }
}
