//! Level numbering and per-level circle parameters
//!
//! Levels come in groups of six that share a motion pattern:
//! 1. constant radius, speed ramps up
//! 2. shrinking radius, constant speed
//! 3. shrinking radius, speed ramps up, random spawn point
//! 4. constant radius, circle stands still and jumps on a timer

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// A level number, always within `1..=count` for the configured level count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Level(u32);

impl Level {
    pub const FIRST: Level = Level(1);

    /// Clamp an arbitrary (possibly out-of-range) level number into `1..=count`
    pub fn clamped(n: i64, count: u32) -> Self {
        let count = clamp_level_count(count);
        Level(n.clamp(1, count as i64) as u32)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Motion-pattern group (1-based)
    pub fn group(self) -> u32 {
        self.0.div_ceil(LEVELS_PER_GROUP)
    }

    /// Position within the group (1..=6)
    pub fn index_in_group(self) -> u32 {
        (self.0.max(1) - 1) % LEVELS_PER_GROUP + 1
    }

    /// "GROUP-INDEX", e.g. "2-3"
    pub fn label(self) -> String {
        format!("{}-{}", self.group(), self.index_in_group())
    }

    /// Next level, or `None` at the last one
    pub fn next(self, count: u32) -> Option<Self> {
        (self.0 < clamp_level_count(count)).then(|| Level(self.0 + 1))
    }

    /// Previous level, or `None` at the first one
    pub fn prev(self) -> Option<Self> {
        (self.0 > 1).then(|| Level(self.0 - 1))
    }
}

/// Level counts are whole groups between one and four groups
pub fn clamp_level_count(count: u32) -> u32 {
    let count = count.clamp(MIN_LEVEL_COUNT, MAX_LEVEL_COUNT);
    count - count % LEVELS_PER_GROUP
}

/// How the circle moves during a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnMode {
    /// Continuous motion with wall reflection
    Bounce,
    /// Stationary between random jumps
    StaticRelocate,
}

/// Where the circle appears when the round starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnRule {
    Center,
    Random,
}

/// Circle parameters for one level (fixed for the whole round)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelParams {
    pub radius: f32,
    /// Speed magnitudes in px/frame; the sign is picked at spawn
    pub speed_x: f32,
    pub speed_y: f32,
    pub spawn: SpawnRule,
    pub mode: SpawnMode,
    /// Seconds between jumps (StaticRelocate only)
    pub appear_time: Option<f32>,
    pub label: String,
}

impl LevelParams {
    /// Relocation period in whole milliseconds
    pub fn appear_time_ms(&self) -> Option<u32> {
        self.appear_time.map(|secs| (secs * 1000.0).round() as u32)
    }
}

/// Canonical tuning table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTuning {
    pub base_radius: f32,
    pub radius_step: f32,
    pub base_speed: f32,
    pub speed_step: f32,
    pub appear_time_base: f32,
    pub appear_time_step: f32,
    pub appear_time_min: f32,
}

impl Default for LevelTuning {
    fn default() -> Self {
        Self {
            base_radius: BASE_RADIUS,
            radius_step: RADIUS_STEP,
            base_speed: BASE_SPEED,
            speed_step: SPEED_STEP,
            appear_time_base: APPEAR_TIME_BASE,
            appear_time_step: APPEAR_TIME_STEP,
            appear_time_min: APPEAR_TIME_MIN,
        }
    }
}

impl LevelTuning {
    /// Parameters for `level`. Pure: the same level always yields the same params.
    pub fn params_for(&self, level: Level) -> LevelParams {
        let idx = level.index_in_group() as f32;
        let ramped_speed = self.base_speed * (1.0 + (idx - 1.0) * self.speed_step);
        let shrunk_radius = self.base_radius - idx * self.radius_step;

        let (radius, speed, spawn, mode) = match level.group() {
            1 => (self.base_radius, ramped_speed, SpawnRule::Center, SpawnMode::Bounce),
            2 => (shrunk_radius, self.base_speed, SpawnRule::Center, SpawnMode::Bounce),
            3 => (shrunk_radius, ramped_speed, SpawnRule::Random, SpawnMode::Bounce),
            _ => (self.base_radius, 0.0, SpawnRule::Random, SpawnMode::StaticRelocate),
        };

        let appear_time = (mode == SpawnMode::StaticRelocate).then(|| {
            (self.appear_time_base - (idx - 1.0) * self.appear_time_step).max(self.appear_time_min)
        });

        LevelParams {
            radius,
            speed_x: speed,
            speed_y: speed,
            spawn,
            mode,
            appear_time,
            label: level.label(),
        }
    }
}
