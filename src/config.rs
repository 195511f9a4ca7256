use crate::brightness::MIN_FLOOR;
use crate::error::RemoteError;
use fast_config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "led_remote.json";
pub const DEFAULT_BASE_URL: &str = "http://esp32.local";

pub const DEFAULT_CYCLE_INTERVAL_SECS: f64 = 3.0;
pub const MIN_CYCLE_INTERVAL_SECS: f64 = 0.5;
pub const DEFAULT_DIM_TARGET_PCT: f64 = 70.0;
pub const DEFAULT_DIM_DELAY_MS: u64 = 120;

// Configuration data saved to JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigData {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)] // Playlist, in traversal order
    pub cycle: Vec<PlaylistEntry>,
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval: f64,
    #[serde(default)]
    pub add_to_cycle: bool,
    #[serde(default)]
    pub dim_between: bool,
    #[serde(default = "default_dim_target_pct")]
    pub dim_target_pct: f64,
    #[serde(default = "default_dim_delay")]
    pub dim_delay: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_cycle_interval() -> f64 {
    DEFAULT_CYCLE_INTERVAL_SECS
}

fn default_dim_target_pct() -> f64 {
    DEFAULT_DIM_TARGET_PCT
}

fn default_dim_delay() -> u64 {
    DEFAULT_DIM_DELAY_MS
}

// Default values for a new configuration
impl Default for ConfigData {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: String::new(),
            cycle: vec![], // Start with an empty playlist
            cycle_interval: DEFAULT_CYCLE_INTERVAL_SECS,
            add_to_cycle: false,
            dim_between: false,
            dim_target_pct: DEFAULT_DIM_TARGET_PCT,
            dim_delay: DEFAULT_DIM_DELAY_MS,
        }
    }
}

impl ConfigData {
    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            interval_secs: self.cycle_interval,
            dim_between: self.dim_between,
            dim_target_pct: self.dim_target_pct,
            press_delay_ms: self.dim_delay,
            add_to_cycle: self.add_to_cycle,
        }
        .clamped()
    }

    pub fn set_cycle_settings(&mut self, settings: &CycleSettings) {
        let settings = settings.clamped();
        self.cycle_interval = settings.interval_secs;
        self.dim_between = settings.dim_between;
        self.dim_target_pct = settings.dim_target_pct;
        self.dim_delay = settings.press_delay_ms;
        self.add_to_cycle = settings.add_to_cycle;
    }

    /// The shared secret, if one is configured.
    pub fn auth_key(&self) -> Option<&str> {
        let key = self.auth_token.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

/// One stop on the cycle playlist. Duplicates are allowed and weight the lap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub display_name: String,
    /// CSS colour or gradient shown as the preview while this entry is active.
    pub preview_fill: String,
    /// Opaque button identifier understood by the device firmware.
    pub button_code: String,
}

impl PlaylistEntry {
    pub fn new(
        display_name: impl Into<String>,
        preview_fill: impl Into<String>,
        button_code: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            preview_fill: preview_fill.into(),
            button_code: button_code.into(),
        }
    }
}

impl std::fmt::Display for PlaylistEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} [{}] -> {}", self.display_name, self.preview_fill, self.button_code)
    }
}

/// Live cycle settings. Always handled in clamped form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSettings {
    pub interval_secs: f64,
    pub dim_between: bool,
    pub dim_target_pct: f64,
    pub press_delay_ms: u64,
    pub add_to_cycle: bool,
}

impl Default for CycleSettings {
    fn default() -> Self {
        ConfigData::default().cycle_settings()
    }
}

impl CycleSettings {
    pub fn clamped(mut self) -> Self {
        if !self.interval_secs.is_finite() || self.interval_secs < MIN_CYCLE_INTERVAL_SECS {
            self.interval_secs = MIN_CYCLE_INTERVAL_SECS;
        }
        if self.dim_target_pct.is_nan() {
            self.dim_target_pct = DEFAULT_DIM_TARGET_PCT;
        }
        self.dim_target_pct = self.dim_target_pct.clamp(MIN_FLOOR * 100.0, 100.0);
        self
    }

    /// The tick interval. Values too large for a `Duration` wait forever.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::try_from_secs_f64(self.interval_secs).unwrap_or(std::time::Duration::MAX)
    }

    pub fn press_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.press_delay_ms)
    }
}

/// Somewhere the single persisted record lives.
pub trait RecordStore: Send {
    fn record(&self) -> &ConfigData;
    fn record_mut(&mut self) -> &mut ConfigData;
    fn save(&mut self) -> Result<(), RemoteError>;
}

/// The record on disk, managed through `fast_config`.
pub struct ConfigStore {
    path: PathBuf,
    config: Config<ConfigData>,
}

impl ConfigStore {
    /// Opens (or starts) the record at `path`.
    ///
    /// A file that cannot be parsed is moved aside to `<path>.bak` and the
    /// defaults are used instead, so a corrupt record never blocks startup.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RemoteError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let path_str = path.to_string_lossy().into_owned();
        let config = match Config::new(&path_str, ConfigData::default()) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Config at {} is unreadable ({}), starting from defaults", path.display(), e);
                let backup = backup_path(&path);
                std::fs::rename(&path, &backup)?;
                log::info!("Moved unreadable config to {}", backup.display());
                Config::new(&path_str, ConfigData::default())
                    .map_err(|e| RemoteError::Config(e.to_string()))?
            }
        };

        Ok(Self { path, config })
    }

    /// Opens the record in the user's config directory.
    pub fn open_default() -> Result<Self, RemoteError> {
        Self::open(default_config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for ConfigStore {
    fn record(&self) -> &ConfigData {
        &self.config.data
    }

    fn record_mut(&mut self) -> &mut ConfigData {
        &mut self.config.data
    }

    fn save(&mut self) -> Result<(), RemoteError> {
        self.config
            .save()
            .map_err(|e| RemoteError::Config(e.to_string()))
    }
}

/// Config file location, falling back to the current directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".")) // Fallback to current dir
        .join(CONFIG_FILE_NAME)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// A record kept only in memory. Counts saves so callers can check write-back.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    data: ConfigData,
    saves: usize,
}

impl MemoryStore {
    pub fn new(data: ConfigData) -> Self {
        Self { data, saves: 0 }
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl RecordStore for MemoryStore {
    fn record(&self) -> &ConfigData {
        &self.data
    }

    fn record_mut(&mut self) -> &mut ConfigData {
        &mut self.data
    }

    fn save(&mut self) -> Result<(), RemoteError> {
        self.saves += 1;
        Ok(())
    }
}
