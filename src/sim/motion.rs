//! Circle motion and wall collision
//!
//! Positions are canvas pixels with the origin at the top-left corner.
//! Velocity is applied once per animation frame, so perceived speed follows
//! the display refresh rate (60 Hz vs 120 Hz monitors differ). That matches
//! how the game has always played and is not corrected here.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::level::{LevelParams, SpawnRule};

/// Playable area (the canvas size in CSS pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Legal centre range on one axis for a circle of `radius`.
    /// Collapses to the midpoint when the axis is narrower than the diameter.
    fn legal_range(extent: f32, radius: f32) -> (f32, f32) {
        if extent >= 2.0 * radius {
            (radius, extent - radius)
        } else {
            (extent / 2.0, extent / 2.0)
        }
    }

    /// True if a circle at `pos` lies fully inside
    pub fn contains_circle(&self, pos: Vec2, radius: f32) -> bool {
        let (min_x, max_x) = Self::legal_range(self.width, radius);
        let (min_y, max_y) = Self::legal_range(self.height, radius);
        (min_x..=max_x).contains(&pos.x) && (min_y..=max_y).contains(&pos.y)
    }
}

/// Which axes touched a wall this frame (feedback only)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WallHits {
    pub x: bool,
    pub y: bool,
}

impl WallHits {
    pub fn any(&self) -> bool {
        self.x || self.y
    }
}

/// The circle's kinematic state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    /// Centre
    pub pos: Vec2,
    /// Pixels per frame, signed
    pub vel: Vec2,
    pub radius: f32,
}

impl MotionState {
    pub fn new(pos: Vec2, vel: Vec2, radius: f32) -> Self {
        Self { pos, vel, radius }
    }

    /// Place a fresh circle for `params`: centre or random position, random
    /// direction on each axis.
    pub fn spawn(params: &LevelParams, bounds: Bounds, rng: &mut impl Rng) -> Self {
        let pos = match params.spawn {
            SpawnRule::Center => bounds.center(),
            SpawnRule::Random => random_position(bounds, params.radius, rng),
        };
        let sign_x = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
        let sign_y = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
        let vel = Vec2::new(params.speed_x * sign_x, params.speed_y * sign_y);
        Self::new(pos, vel, params.radius)
    }

    /// Advance one frame and reflect off the walls.
    ///
    /// The centre is clamped back into the legal range on contact, so the
    /// circle never ends a frame past a wall.
    pub fn advance(&mut self, bounds: Bounds) -> WallHits {
        self.pos += self.vel;
        let r = self.radius;

        let x = reflect_axis(&mut self.pos.x, &mut self.vel.x, bounds.width, r);
        let y = reflect_axis(&mut self.pos.y, &mut self.vel.y, bounds.height, r);
        WallHits { x, y }
    }

    /// Jump to a new random legal position (static-relocate levels)
    pub fn relocate(&mut self, bounds: Bounds, rng: &mut impl Rng) {
        self.pos = random_position(bounds, self.radius, rng);
    }

    /// Pull the centre back inside after the bounds shrank
    pub fn confine(&mut self, bounds: Bounds) {
        let (min_x, max_x) = Bounds::legal_range(bounds.width, self.radius);
        let (min_y, max_y) = Bounds::legal_range(bounds.height, self.radius);
        self.pos.x = self.pos.x.clamp(min_x, max_x);
        self.pos.y = self.pos.y.clamp(min_y, max_y);
    }

    /// Hit test: point within (or on) the circle
    pub fn contains(&self, point: Vec2) -> bool {
        self.pos.distance(point) <= self.radius
    }
}

/// Resolve one axis against `[0, extent]`. Returns true on wall contact.
fn reflect_axis(pos: &mut f32, vel: &mut f32, extent: f32, radius: f32) -> bool {
    let (min, max) = Bounds::legal_range(extent, radius);
    if *pos - radius <= 0.0 {
        *pos = min;
        *vel = vel.abs();
        true
    } else if *pos + radius >= extent {
        *pos = max;
        *vel = -vel.abs();
        true
    } else {
        false
    }
}

/// Uniform position with the circle fully inside `bounds`
pub fn random_position(bounds: Bounds, radius: f32, rng: &mut impl Rng) -> Vec2 {
    let (min_x, max_x) = Bounds::legal_range(bounds.width, radius);
    let (min_y, max_y) = Bounds::legal_range(bounds.height, radius);
    Vec2::new(rng.random_range(min_x..=max_x), rng.random_range(min_y..=max_y))
}
