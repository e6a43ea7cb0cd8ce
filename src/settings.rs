use log::{LevelFilter, debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, RwLock};
use std::time::Duration;

use crate::source::{AssetStore, DirAssets, MemoryAssets, Sources};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "docload";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Host serving streamed documents
    #[serde(default = "default_stream_host")]
    pub stream_host: String,

    #[serde(default = "default_stream_port")]
    pub stream_port: u16,

    /// Seconds to wait on a silent stream; 0 waits forever
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Directory holding bundled documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_root: Option<PathBuf>,

    #[serde(default = "default_asset_prefix")]
    pub asset_prefix: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_analytics_period_ms")]
    pub analytics_period_ms: u64,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_stream_host() -> String {
    "localhost".to_string()
}

fn default_stream_port() -> u16 {
    4567
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_asset_prefix() -> String {
    crate::source::DEFAULT_ASSET_PREFIX.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_analytics_period_ms() -> u64 {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            stream_host: default_stream_host(),
            stream_port: default_stream_port(),
            read_timeout_secs: default_read_timeout_secs(),
            asset_root: None,
            asset_prefix: default_asset_prefix(),
            log_level: default_log_level(),
            analytics_period_ms: default_analytics_period_ms(),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }

    #[must_use]
    pub fn analytics_period(&self) -> Duration {
        Duration::from_millis(self.analytics_period_ms.max(1))
    }

    /// Unknown level names fall back to `Info`
    #[must_use]
    pub fn log_level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            LevelFilter::Info
        })
    }

    /// Resolver context built from these settings
    #[must_use]
    pub fn sources(&self) -> Sources {
        let assets: Arc<dyn AssetStore> = match &self.asset_root {
            Some(root) => Arc::new(DirAssets::new(root, self.asset_prefix.clone())),
            None => Arc::new(MemoryAssets::new(self.asset_prefix.clone())),
        };
        Sources::new(assets, self.read_timeout())
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the default location, creating the file if missing
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    load_settings_from_path(&path);
}

pub fn load_settings_from_path(path: &Path) {
    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, path);
        }
        return;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                // Older files only lack fields that serde fills with
                // defaults, so upgrading is a rewrite at the new version.
                if settings.version < CURRENT_VERSION {
                    info!(
                        "Upgrading settings from v{} to v{CURRENT_VERSION}",
                        settings.version
                    );
                    settings.version = CURRENT_VERSION;
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# docload settings
# ============================================================================
# stream_host / stream_port: endpoint serving streamed documents
# read_timeout_secs:         give up on a silent stream after this many
#                            seconds (0 = wait forever)
# asset_root:                directory holding bundled documents
# asset_prefix:              bundle subdirectory asset names live under

"#;

/// Snapshot of the current settings
pub fn get_settings() -> Settings {
    SETTINGS
        .read()
        .map(|s| s.clone())
        .unwrap_or_default()
}

pub fn set_settings(settings: Settings) {
    if let Ok(mut global) = SETTINGS.write() {
        *global = settings;
    }
}
