//! Circle Rush - click the moving circle as fast as you can
//!
//! Core modules:
//! - `sim`: Level policy, motion, clock and the round state machine
//! - `game`: Level navigation, player session and score display
//! - `scores`: Best-time store (online HTTP backend with offline fallback)
//! - `platform`: Host handles (frames, timers, listeners) and key-value storage
//! - `settings`: Persisted preferences
//! - `audio`: Sound effects and background music (playback is browser-only)

pub mod audio;
pub mod error;
pub mod game;
pub mod platform;
pub mod scores;
pub mod settings;
pub mod sim;

pub use error::StoreError;
pub use game::{Game, GameConfig, GameEvent, StoreRequest};
pub use settings::Settings;

/// Game configuration constants
pub mod consts {
    /// Clock display sampling period (independent of the frame rate)
    pub const CLOCK_SAMPLE_MS: u32 = 10;

    /// Levels per motion-pattern group
    pub const LEVELS_PER_GROUP: u32 = 6;
    /// Default number of levels (four groups)
    pub const DEFAULT_LEVEL_COUNT: u32 = 24;
    /// Smallest configurable level count (one group)
    pub const MIN_LEVEL_COUNT: u32 = LEVELS_PER_GROUP;
    /// Largest configurable level count (four groups)
    pub const MAX_LEVEL_COUNT: u32 = 4 * LEVELS_PER_GROUP;

    /// Circle defaults
    pub const BASE_RADIUS: f32 = 40.0;
    pub const RADIUS_STEP: f32 = 4.0;
    /// Speed in pixels per animation frame
    pub const BASE_SPEED: f32 = 2.0;
    /// Per-sub-level speed increase for groups 1 and 3
    pub const SPEED_STEP: f32 = 0.25;

    /// Static-relocate group timing (seconds)
    pub const APPEAR_TIME_BASE: f32 = 2.4;
    pub const APPEAR_TIME_STEP: f32 = 0.4;
    pub const APPEAR_TIME_MIN: f32 = 0.4;

    /// LocalStorage keys
    pub const OFFLINE_SCORES_KEY: &str = "offlineScores";
    pub const USERNAME_KEY: &str = "username";

    /// Longest accepted player name (characters)
    pub const MAX_NAME_LEN: usize = 32;

    /// Default score server
    pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
}

/// Round a time in seconds to 2 decimal places (the precision scores are kept at)
#[inline]
pub fn round_hundredths(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// Format seconds the way the HUD shows them ("12.34")
#[inline]
pub fn format_seconds(seconds: f64) -> String {
    format!("{:.2}", seconds)
}
