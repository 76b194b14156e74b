//! Deterministic game core
//!
//! Everything here is pure given the host timestamps and the seeded RNG:
//! - No DOM, timers or storage (handles come in through `platform::Host`)
//! - Seeded RNG only
//! - Motion advances once per animation frame

pub mod clock;
pub mod level;
pub mod motion;
pub mod round;

pub use clock::Stopwatch;
pub use level::{Level, LevelParams, LevelTuning, SpawnMode, SpawnRule, clamp_level_count};
pub use motion::{Bounds, MotionState, WallHits, random_position};
pub use round::{Round, RoundOutcome, RoundPhase};
