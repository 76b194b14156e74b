//! Game settings and preferences
//!
//! Persisted separately from scores in LocalStorage.

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_LEVEL_COUNT, DEFAULT_SERVER_URL};
use crate::game::GameConfig;
use crate::platform::KeyValueStorage;
use crate::sim::{LevelTuning, clamp_level_count};

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Audio ===
    /// Mute toggle (speaker buttons)
    pub muted: bool,
    /// Sound effects volume (0.0 - 1.0)
    pub volume: f32,

    // === Game ===
    /// Number of levels; clamped to whole groups of six
    pub level_count: u32,
    /// Score server base URL
    pub server_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            muted: false,
            volume: 0.6,

            level_count: DEFAULT_LEVEL_COUNT,
            server_url: DEFAULT_SERVER_URL.to_string(),
        }
    }
}

impl Settings {
    /// LocalStorage key
    const STORAGE_KEY: &'static str = "circle_rush_settings";

    /// Core configuration derived from these settings
    pub fn game_config(&self) -> GameConfig {
        GameConfig {
            level_count: clamp_level_count(self.level_count),
            tuning: LevelTuning::default(),
        }
    }

    /// Volume actually applied (0 when muted)
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume.clamp(0.0, 1.0)
        }
    }

    /// Server URL without a trailing slash
    pub fn server_base(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// Read from `storage`, falling back to defaults
    pub fn load_from(storage: &impl KeyValueStorage) -> Self {
        let Some(json) = storage.get(Self::STORAGE_KEY) else {
            log::info!("Using default settings");
            return Self::default();
        };
        match serde_json::from_str(&json) {
            Ok(settings) => {
                log::info!("Loaded settings from storage");
                settings
            }
            Err(err) => {
                log::warn!("Ignoring unreadable settings: {err}");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, storage: &impl KeyValueStorage) {
        match serde_json::to_string(self) {
            Ok(json) => match storage.set(Self::STORAGE_KEY, &json) {
                Ok(()) => log::info!("Settings saved"),
                Err(err) => log::warn!("Could not save settings: {err}"),
            },
            Err(err) => log::warn!("Could not encode settings: {err}"),
        }
    }

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        match crate::platform::web::LocalStorage::open() {
            Some(storage) => Self::load_from(&storage),
            None => Self::default(),
        }
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        if let Some(storage) = crate::platform::web::LocalStorage::open() {
            self.save_to(&storage);
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
