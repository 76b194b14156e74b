//! Round state machine
//!
//! Idle -> Running -> Ended, with replay going straight from Ended (or a
//! running round) to a fresh Running round. A running round owns exactly one
//! frame loop, one clock interval, one pointer listener and, on
//! static-relocate levels, one relocation timeout. All of them are released on
//! every exit from Running, and events from handles the round no longer holds
//! are dropped.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::clock::Stopwatch;
use super::level::{Level, LevelParams, LevelTuning, SpawnMode};
use super::motion::{Bounds, MotionState, WallHits};
use crate::consts::CLOCK_SAMPLE_MS;
use crate::format_seconds;
use crate::platform::{HandleSlot, Host, HostHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// No round yet (or stopped by switching user)
    Idle,
    /// Clock ticking, circle moving, clicks armed
    Running,
    /// Clock stopped, result on screen
    Ended,
}

/// Result of a finished round
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundOutcome {
    pub round_id: u64,
    pub level: Level,
    /// Seconds, rounded to hundredths
    pub final_time: f64,
}

#[derive(Debug)]
pub struct Round {
    phase: RoundPhase,
    /// Bumped on every start; identifies score submissions
    id: u64,
    level: Level,
    params: Option<LevelParams>,
    motion: Option<MotionState>,
    clock: Stopwatch,
    /// Last sampled elapsed seconds (what the timer display shows)
    displayed_secs: f64,
    frame: HandleSlot,
    clock_timer: HandleSlot,
    relocate_timer: HandleSlot,
    pointer: HandleSlot,
    rng: Pcg32,
}

impl Round {
    pub fn new(seed: u64) -> Self {
        Self {
            phase: RoundPhase::Idle,
            id: 0,
            level: Level::FIRST,
            params: None,
            motion: None,
            clock: Stopwatch::new(),
            displayed_secs: 0.0,
            frame: HandleSlot::new(),
            clock_timer: HandleSlot::new(),
            relocate_timer: HandleSlot::new(),
            pointer: HandleSlot::new(),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn params(&self) -> Option<&LevelParams> {
        self.params.as_ref()
    }

    /// The circle, while a round is running
    pub fn circle(&self) -> Option<&MotionState> {
        match self.phase {
            RoundPhase::Running => self.motion.as_ref(),
            _ => None,
        }
    }

    /// Timer display text ("0.00")
    pub fn timer_text(&self) -> String {
        format_seconds(self.displayed_secs)
    }

    /// Begin a fresh round on `level`. Any previous round (running or not) is
    /// torn down first. Returns the new round id.
    pub fn start(
        &mut self,
        level: Level,
        tuning: &LevelTuning,
        bounds: Bounds,
        now_ms: f64,
        host: &mut dyn Host,
    ) -> u64 {
        self.release_all(host);

        self.id += 1;
        self.level = level;
        let params = tuning.params_for(level);
        self.motion = Some(MotionState::spawn(&params, bounds, &mut self.rng));
        self.clock.start(now_ms);
        self.displayed_secs = 0.0;
        self.phase = RoundPhase::Running;

        let frame = host.request_frame();
        self.frame.replace(host, frame);
        let clock = host.start_interval(CLOCK_SAMPLE_MS);
        self.clock_timer.replace(host, clock);
        let pointer = host.listen_pointer();
        self.pointer.replace(host, pointer);
        if let Some(delay) = params.appear_time_ms() {
            let timeout = host.start_timeout(delay);
            self.relocate_timer.replace(host, timeout);
        }

        log::debug!("Round {} started on level {}", self.id, params.label);
        self.params = Some(params);
        self.id
    }

    /// Animation frame: move the circle (bounce levels) and request the next frame.
    pub fn on_frame(&mut self, handle: HostHandle, bounds: Bounds, host: &mut dyn Host) -> Option<WallHits> {
        if !self.frame.holds(handle) {
            log::debug!("Dropping stale frame {:?}", handle);
            return None;
        }
        self.frame.clear_fired(handle);

        let bounce = self
            .params
            .as_ref()
            .is_some_and(|p| p.mode == SpawnMode::Bounce);
        let hits = match self.motion.as_mut() {
            Some(motion) if bounce => motion.advance(bounds),
            _ => WallHits::default(),
        };

        let next = host.request_frame();
        self.frame.replace(host, next);
        Some(hits)
    }

    /// Clock interval: refresh the displayed time. Returns false for stale handles.
    pub fn on_clock_tick(&mut self, handle: HostHandle, now_ms: f64) -> bool {
        if !self.clock_timer.holds(handle) {
            log::debug!("Dropping stale clock tick {:?}", handle);
            return false;
        }
        self.displayed_secs = self.clock.elapsed_secs(now_ms);
        true
    }

    /// Relocation timeout: jump the circle and re-arm for the next period.
    pub fn on_relocate(&mut self, handle: HostHandle, bounds: Bounds, host: &mut dyn Host) -> bool {
        if !self.relocate_timer.holds(handle) {
            log::debug!("Dropping stale relocation {:?}", handle);
            return false;
        }
        self.relocate_timer.clear_fired(handle);

        let Some(motion) = self.motion.as_mut() else {
            return false;
        };
        motion.relocate(bounds, &mut self.rng);

        if let Some(delay) = self.params.as_ref().and_then(|p| p.appear_time_ms()) {
            let timeout = host.start_timeout(delay);
            self.relocate_timer.replace(host, timeout);
        }
        true
    }

    /// Pointer down at board coordinates. A hit ends the round; misses are ignored.
    pub fn register_click(
        &mut self,
        handle: HostHandle,
        point: Vec2,
        now_ms: f64,
        host: &mut dyn Host,
    ) -> Option<RoundOutcome> {
        if !self.pointer.holds(handle) || self.phase != RoundPhase::Running {
            log::debug!("Ignoring click from {:?} in {:?}", handle, self.phase);
            return None;
        }
        let hit = self.motion.as_ref().is_some_and(|m| m.contains(point));
        if !hit {
            return None;
        }
        self.end(now_ms, host)
    }

    /// Stop the round. Only the first call after a start produces an outcome.
    pub fn end(&mut self, now_ms: f64, host: &mut dyn Host) -> Option<RoundOutcome> {
        if self.phase != RoundPhase::Running {
            log::debug!("end() ignored in {:?}", self.phase);
            return None;
        }
        self.phase = RoundPhase::Ended;
        self.release_all(host);
        self.clock.stop(now_ms);

        let final_time = self.clock.elapsed_hundredths(now_ms);
        self.displayed_secs = final_time;
        Some(RoundOutcome {
            round_id: self.id,
            level: self.level,
            final_time,
        })
    }

    /// Tear everything down and go back to Idle
    pub fn reset(&mut self, host: &mut dyn Host) {
        self.release_all(host);
        self.phase = RoundPhase::Idle;
        self.clock = Stopwatch::new();
        self.displayed_secs = 0.0;
    }

    /// Canvas resized: keep the circle inside
    pub fn resize(&mut self, bounds: Bounds) {
        if let Some(motion) = self.motion.as_mut() {
            motion.confine(bounds);
        }
    }

    fn release_all(&mut self, host: &mut dyn Host) {
        self.frame.release(host);
        self.clock_timer.release(host);
        self.relocate_timer.release(host);
        self.pointer.release(host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HandleKind;
    use crate::platform::manual::ManualHost;

    const BOARD: Bounds = Bounds {
        width: 500.0,
        height: 400.0,
    };

    fn started(level: u32) -> (Round, ManualHost) {
        let mut host = ManualHost::new();
        let mut round = Round::new(7);
        round.start(
            Level::clamped(level as i64, 24),
            &LevelTuning::default(),
            BOARD,
            1000.0,
            &mut host,
        );
        (round, host)
    }

    fn assert_single_loop(host: &ManualHost, relocating: bool) {
        assert_eq!(host.live_count(HandleKind::Frame), 1);
        assert_eq!(host.live_count(HandleKind::Interval), 1);
        assert_eq!(host.live_count(HandleKind::Pointer), 1);
        assert_eq!(host.live_count(HandleKind::Timeout), usize::from(relocating));
    }

    #[test]
    fn test_start_acquires_one_of_each() {
        let (round, host) = started(1);
        assert_eq!(round.phase(), RoundPhase::Running);
        assert_eq!(round.timer_text(), "0.00");
        assert_eq!(round.circle().map(|c| c.pos), Some(Vec2::new(250.0, 200.0)));
        assert_single_loop(&host, false);
    }

    #[test]
    fn test_restart_while_running_never_stacks_loops() {
        let (mut round, mut host) = started(1);
        for _ in 0..5 {
            round.start(Level::FIRST, &LevelTuning::default(), BOARD, 2000.0, &mut host);
            assert_single_loop(&host, false);
        }
        assert_eq!(round.id(), 6);
    }

    #[test]
    fn test_frame_advances_and_rearms() {
        let (mut round, mut host) = started(1);
        let before = round.circle().map(|c| c.pos);
        let frame = host.fire(HandleKind::Frame).unwrap();
        assert!(round.on_frame(frame, BOARD, &mut host).is_some());
        assert_ne!(round.circle().map(|c| c.pos), before);
        assert_single_loop(&host, false);
    }

    #[test]
    fn test_stale_frame_is_dropped() {
        let (mut round, mut host) = started(1);
        let old_frame = host.live_of(HandleKind::Frame).unwrap();
        round.start(Level::FIRST, &LevelTuning::default(), BOARD, 1500.0, &mut host);
        let pos = round.circle().map(|c| c.pos);
        assert!(round.on_frame(old_frame, BOARD, &mut host).is_none());
        assert_eq!(round.circle().map(|c| c.pos), pos);
        assert_single_loop(&host, false);
    }

    #[test]
    fn test_clock_tick_updates_display() {
        let (mut round, mut host) = started(1);
        let tick = host.fire(HandleKind::Interval).unwrap();
        assert!(round.on_clock_tick(tick, 2234.0));
        assert_eq!(round.timer_text(), "1.23");
    }

    #[test]
    fn test_click_center_hits_and_ends() {
        let (mut round, mut host) = started(1);
        let pointer = host.live_of(HandleKind::Pointer).unwrap();
        let outcome = round
            .register_click(pointer, Vec2::new(250.0, 200.0), 3456.0, &mut host)
            .expect("centre click should hit");
        assert_eq!(outcome.final_time, 2.46);
        assert_eq!(outcome.round_id, 1);
        assert_eq!(round.phase(), RoundPhase::Ended);
        assert_eq!(host.total_live(), 0);
        assert_eq!(round.timer_text(), "2.46");
    }

    #[test]
    fn test_miss_changes_nothing() {
        let (mut round, mut host) = started(1);
        let pointer = host.live_of(HandleKind::Pointer).unwrap();
        assert!(round.register_click(pointer, Vec2::new(10.0, 10.0), 2000.0, &mut host).is_none());
        assert_eq!(round.phase(), RoundPhase::Running);
        assert_single_loop(&host, false);
    }

    #[test]
    fn test_double_click_only_ends_once() {
        let (mut round, mut host) = started(1);
        let pointer = host.live_of(HandleKind::Pointer).unwrap();
        let center = Vec2::new(250.0, 200.0);
        assert!(round.register_click(pointer, center, 2000.0, &mut host).is_some());
        assert!(round.register_click(pointer, center, 2001.0, &mut host).is_none());
    }

    #[test]
    fn test_end_is_idempotent() {
        let (mut round, mut host) = started(1);
        let first = round.end(1500.0, &mut host);
        assert_eq!(first.map(|o| o.final_time), Some(0.5));
        assert!(round.end(4000.0, &mut host).is_none());
        assert_eq!(round.timer_text(), "0.50");
    }

    #[test]
    fn test_click_while_idle_is_ignored() {
        let mut host = ManualHost::new();
        let mut round = Round::new(1);
        let bogus = host.listen_pointer();
        assert!(round.register_click(bogus, Vec2::ZERO, 0.0, &mut host).is_none());
        assert_eq!(round.phase(), RoundPhase::Idle);
    }

    #[test]
    fn test_static_level_relocates_on_timer() {
        let (mut round, mut host) = started(19);
        assert_single_loop(&host, true);
        let timeout = host.live_of(HandleKind::Timeout).unwrap();
        assert_eq!(host.scheduled_ms(timeout), Some(2400));

        // Frames do not move a static circle
        let pos = round.circle().map(|c| c.pos);
        let frame = host.fire(HandleKind::Frame).unwrap();
        round.on_frame(frame, BOARD, &mut host);
        assert_eq!(round.circle().map(|c| c.pos), pos);

        let fired = host.fire(HandleKind::Timeout).unwrap();
        assert!(round.on_relocate(fired, BOARD, &mut host));
        assert_single_loop(&host, true);
        let circle = round.circle().unwrap();
        assert!(BOARD.contains_circle(circle.pos, circle.radius));
    }

    #[test]
    fn test_end_cancels_relocation_timer() {
        let (mut round, mut host) = started(24);
        let timeout = host.live_of(HandleKind::Timeout).unwrap();
        round.end(2000.0, &mut host);
        assert!(!host.is_live(timeout));
        assert!(!round.on_relocate(timeout, BOARD, &mut host));
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let (mut round, mut host) = started(3);
        round.reset(&mut host);
        assert_eq!(round.phase(), RoundPhase::Idle);
        assert_eq!(host.total_live(), 0);
        assert!(round.circle().is_none());
        assert_eq!(round.timer_text(), "0.00");
    }
}
