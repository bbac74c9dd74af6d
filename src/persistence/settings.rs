use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ENV_API_URL: &str = "ARIADNE_API_URL";
pub const ENV_API_TOKEN: &str = "ARIADNE_API_TOKEN";
pub const ENV_TOKEN_FILE: &str = "ARIADNE_TOKEN_FILE";

/// Values taken from `ARIADNE_*` environment variables. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub token_file: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            api_base_url: std::env::var(ENV_API_URL).ok(),
            api_token: std::env::var(ENV_API_TOKEN).ok(),
            token_file: std::env::var_os(ENV_TOKEN_FILE).filter(|p| !p.is_empty()).map(PathBuf::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    // Single base URL for every endpoint, uploads included
    #[serde(default = "AppSettings::default_base_url")]
    pub api_base_url: String,
    #[serde(default = "AppSettings::default_feed_count")]
    pub feed_count: usize,
    // Static bearer token; token_file wins when both are set
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(default = "AppSettings::default_timeout_secs")]
    pub request_timeout_secs: u64,
    // Persist canvas LOD settings between runs
    #[serde(default = "AppSettings::default_true")]
    pub lod_enabled: bool,
    #[serde(default = "AppSettings::default_lod_zoom")]
    pub lod_label_min_zoom: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: Self::default_base_url(),
            feed_count: Self::default_feed_count(),
            api_token: None,
            token_file: None,
            request_timeout_secs: Self::default_timeout_secs(),
            lod_enabled: true,
            lod_label_min_zoom: Self::default_lod_zoom(),
        }
    }
}

impl AppSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/Ariadne
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Ariadne");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\Ariadne
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("Ariadne");
            }
            return PathBuf::from("Ariadne");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/Ariadne or ~/.config/Ariadne
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("Ariadne");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("Ariadne");
        }
    }

    /// Return the directory where the settings file (settings.json) is stored.
    pub fn settings_dir() -> PathBuf {
        Self::config_dir()
    }

    pub fn settings_path() -> PathBuf {
        Self::config_dir().join("settings.json")
    }

    /// Settings as stored in the per-user config dir, without environment
    /// overrides. An absent or unreadable file yields defaults.
    pub fn load_stored() -> Self {
        Self::load_from_or_default(&Self::settings_path())
    }

    pub fn load_from_or_default(path: &std::path::Path) -> Self {
        Self::load_from(path).unwrap_or_else(|e| {
            log::warn!("settings at {} unreadable, using defaults: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut f = fs::File::open(path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        let v: Self = serde_json::from_str(&s)?;
        Ok(v)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::settings_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let s = serde_json::to_string_pretty(self)?;
        let mut f = fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(&EnvOverrides::from_env());
    }

    pub fn apply_overrides(&mut self, overrides: &EnvOverrides) {
        self.api_base_url = resolve_base_url(&self.api_base_url, overrides.api_base_url.as_deref());
        if let Some(token) = overrides.api_token.as_deref().filter(|t| !t.trim().is_empty()) {
            self.api_token = Some(token.to_string());
        }
        if let Some(path) = &overrides.token_file {
            self.token_file = Some(path.clone());
        }
    }

    /// Copy with environment overrides applied. The stored values are left
    /// untouched so they can be saved without leaking env tokens to disk.
    pub fn effective(&self, overrides: &EnvOverrides) -> Self {
        let mut s = self.clone();
        s.apply_overrides(overrides);
        s
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub(crate) fn default_base_url() -> String { "http://localhost:8000".to_string() }
    pub(crate) fn default_feed_count() -> usize { 50 }
    pub(crate) fn default_timeout_secs() -> u64 { 30 }
    pub(crate) fn default_lod_zoom() -> f32 { 1.5 }
    fn default_true() -> bool { true }
}

/// Environment value wins when set and non-empty; trailing slashes are dropped.
pub fn resolve_base_url(file_value: &str, env_value: Option<&str>) -> String {
    let chosen = match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => file_value.trim(),
    };
    chosen.trim_end_matches('/').to_string()
}
