//! Game session: level navigation, player, and score display
//!
//! The game never talks to the score store itself. Operations that need the
//! store return a [`StoreRequest`]; the caller runs it asynchronously and
//! reports back through [`Game::apply_best`] / [`Game::apply_submit`]. Each
//! request carries a ticket, and answers whose ticket is out of date (the
//! level or player changed meanwhile) are dropped.

use glam::Vec2;

use crate::consts::DEFAULT_LEVEL_COUNT;
use crate::format_seconds;
use crate::platform::{Host, HostEvent, HostHandle};
use crate::scores::{ConnectivityMode, PlayerName, PlayerProfile, PlayerSession, SubmitOutcome, is_improvement};
use crate::sim::{
    Bounds, Level, LevelParams, LevelTuning, MotionState, Round, RoundOutcome, RoundPhase, clamp_level_count,
};

#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub level_count: u32,
    pub tuning: LevelTuning,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            level_count: DEFAULT_LEVEL_COUNT,
            tuning: LevelTuning::default(),
        }
    }
}

/// Identifies the level/player a best-time fetch was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestTicket {
    epoch: u64,
}

/// Identifies the round a score submission belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitTicket {
    epoch: u64,
    round_id: u64,
}

/// Work for the score store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRequest {
    FetchBest {
        ticket: BestTicket,
        player: PlayerName,
        level: Level,
    },
    Submit {
        ticket: SubmitTicket,
        player: PlayerName,
        level: Level,
        time: f64,
    },
}

/// Feedback for the UI (sounds, messages)
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    RoundStarted { level: Level },
    WallHit,
    CircleHit,
    RoundEnded { final_time: f64, new_record: bool },
}

/// Shown after a round
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundResult {
    pub final_time: f64,
    pub new_record: bool,
}

impl RoundResult {
    pub fn message(&self) -> String {
        let mut message = format!("Your time: {} sec", format_seconds(self.final_time));
        if self.new_record {
            message.push_str("\nNew High Score! 🎉");
        }
        message
    }
}

pub struct Game {
    config: GameConfig,
    bounds: Bounds,
    level: Level,
    round: Round,
    player: Option<PlayerSession>,
    /// Best time for the current level as currently known (None = "-")
    best: Option<f64>,
    last_score: Option<f64>,
    result: Option<RoundResult>,
    /// Bumped whenever the level or player changes
    epoch: u64,
    events: Vec<GameEvent>,
}

impl Game {
    pub fn new(config: GameConfig, bounds: Bounds, seed: u64) -> Self {
        let config = GameConfig {
            level_count: clamp_level_count(config.level_count),
            ..config
        };
        Self {
            config,
            bounds,
            level: Level::FIRST,
            round: Round::new(seed),
            player: None,
            best: None,
            last_score: None,
            result: None,
            epoch: 0,
            events: Vec::new(),
        }
    }

    // === Accessors (HUD) ===

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn level_count(&self) -> u32 {
        self.config.level_count
    }

    pub fn level_text(&self) -> String {
        format!("LEVEL {}", self.level.label())
    }

    /// Parameters the current level plays with
    pub fn level_params(&self) -> LevelParams {
        self.config.tuning.params_for(self.level)
    }

    pub fn phase(&self) -> RoundPhase {
        self.round.phase()
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn circle(&self) -> Option<&MotionState> {
        self.round.circle()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn timer_text(&self) -> String {
        self.round.timer_text()
    }

    pub fn best_text(&self) -> String {
        self.best.map_or_else(|| "-".to_string(), format_seconds)
    }

    pub fn last_score_text(&self) -> String {
        self.last_score.map_or_else(|| "-".to_string(), format_seconds)
    }

    pub fn result(&self) -> Option<RoundResult> {
        self.result
    }

    pub fn player(&self) -> Option<&PlayerSession> {
        self.player.as_ref()
    }

    pub fn player_label(&self) -> Option<String> {
        self.player
            .as_ref()
            .map(|session| format!("Now Playing: {}", session.player))
    }

    /// Drain pending UI events
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // === Session ===

    /// Player signed in; the profile already carries the current level's best
    pub fn sign_in(&mut self, session: PlayerSession, profile: &PlayerProfile) {
        log::info!("Now playing: {}", session.player);
        self.epoch += 1;
        self.best = profile.best(self.level);
        self.player = Some(session);
    }

    /// The score service switched to offline mode
    pub fn set_offline(&mut self) {
        if let Some(session) = self.player.as_mut() {
            session.mode = ConnectivityMode::Offline;
        }
    }

    /// Stop everything, go back to level 1 and forget the player
    pub fn switch_user(&mut self, host: &mut dyn Host) {
        self.round.reset(host);
        self.epoch += 1;
        self.level = Level::FIRST;
        self.player = None;
        self.best = None;
        self.last_score = None;
        self.result = None;
    }

    pub fn resize(&mut self, bounds: Bounds) {
        self.bounds = bounds;
        self.round.resize(bounds);
    }

    // === Rounds ===

    /// Start (or restart) a round on the current level
    pub fn start(&mut self, now_ms: f64, host: &mut dyn Host) {
        self.result = None;
        self.round
            .start(self.level, &self.config.tuning, self.bounds, now_ms, host);
        self.events.push(GameEvent::RoundStarted { level: self.level });
    }

    /// Stop the running round explicitly
    pub fn end(&mut self, now_ms: f64, host: &mut dyn Host) -> Option<StoreRequest> {
        let outcome = self.round.end(now_ms, host)?;
        self.finish(outcome)
    }

    /// Jump to level `n` (clamped to the valid range) and start playing it
    pub fn change_level(&mut self, n: i64, now_ms: f64, host: &mut dyn Host) -> Option<StoreRequest> {
        self.level = Level::clamped(n, self.config.level_count);
        self.epoch += 1;
        self.best = None;
        self.last_score = None;
        log::info!("Level {}", self.level.label());
        self.start(now_ms, host);
        self.fetch_best_request()
    }

    /// Next level; no-op on the last one
    pub fn next_level(&mut self, now_ms: f64, host: &mut dyn Host) -> Option<StoreRequest> {
        let next = self.level.next(self.config.level_count)?;
        self.change_level(next.get() as i64, now_ms, host)
    }

    /// Previous level; no-op on the first one
    pub fn prev_level(&mut self, now_ms: f64, host: &mut dyn Host) -> Option<StoreRequest> {
        let prev = self.level.prev()?;
        self.change_level(prev.get() as i64, now_ms, host)
    }

    /// Best-time fetch for the current level and player
    pub fn fetch_best_request(&self) -> Option<StoreRequest> {
        let session = self.player.as_ref()?;
        Some(StoreRequest::FetchBest {
            ticket: BestTicket { epoch: self.epoch },
            player: session.player.clone(),
            level: self.level,
        })
    }

    /// Route a fired host handle to the round
    pub fn on_host_event(
        &mut self,
        handle: HostHandle,
        event: HostEvent,
        now_ms: f64,
        host: &mut dyn Host,
    ) -> Option<StoreRequest> {
        match event {
            HostEvent::Frame => {
                if let Some(hits) = self.round.on_frame(handle, self.bounds, host)
                    && hits.any()
                {
                    self.events.push(GameEvent::WallHit);
                }
                None
            }
            HostEvent::Interval => {
                self.round.on_clock_tick(handle, now_ms);
                None
            }
            HostEvent::Timeout => {
                self.round.on_relocate(handle, self.bounds, host);
                None
            }
            HostEvent::Pointer { x, y } => {
                let outcome = self
                    .round
                    .register_click(handle, Vec2::new(x, y), now_ms, host)?;
                self.events.push(GameEvent::CircleHit);
                self.finish(outcome)
            }
        }
    }

    fn finish(&mut self, outcome: RoundOutcome) -> Option<StoreRequest> {
        let final_time = outcome.final_time;
        let new_record = is_improvement(self.best, final_time);
        if new_record {
            self.best = Some(final_time);
        }
        self.last_score = Some(final_time);
        self.result = Some(RoundResult {
            final_time,
            new_record,
        });
        self.events.push(GameEvent::RoundEnded {
            final_time,
            new_record,
        });
        log::info!(
            "Level {} finished in {}s{}",
            outcome.level.label(),
            format_seconds(final_time),
            if new_record { " (new best)" } else { "" }
        );

        if !new_record {
            return None;
        }
        let session = self.player.as_ref()?;
        Some(StoreRequest::Submit {
            ticket: SubmitTicket {
                epoch: self.epoch,
                round_id: outcome.round_id,
            },
            player: session.player.clone(),
            level: outcome.level,
            time: final_time,
        })
    }

    // === Store answers ===

    /// Best time arrived. Returns false if the answer was stale and dropped.
    pub fn apply_best(&mut self, ticket: BestTicket, best: Option<f64>) -> bool {
        if ticket.epoch != self.epoch {
            log::debug!("Dropping stale best time (epoch {} != {})", ticket.epoch, self.epoch);
            return false;
        }
        // A record set locally while the fetch was in flight is still pending upload
        self.best = match (self.best, best) {
            (Some(local), Some(remote)) => Some(local.min(remote)),
            (local, remote) => remote.or(local),
        };
        true
    }

    /// Submission answered. A rejected submit means the server holds a better
    /// time, so the best time is fetched again to match it.
    ///
    /// The best time belongs to the level/player epoch, so the answer still
    /// applies after a replay has started a newer round.
    pub fn apply_submit(&mut self, ticket: SubmitTicket, outcome: SubmitOutcome) -> Option<StoreRequest> {
        if ticket.epoch != self.epoch {
            log::debug!("Dropping stale submit answer for round {}", ticket.round_id);
            return None;
        }
        if outcome.accepted {
            log::info!("New best saved for level {}", self.level.label());
            return None;
        }
        log::info!("Server kept a better time for level {}, refreshing", self.level.label());
        self.fetch_best_request()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use pollster::block_on;

    use super::*;
    use crate::platform::manual::ManualHost;
    use crate::platform::{HandleKind, MemoryStorage};
    use crate::scores::testing::FakeTransport;
    use crate::scores::{ScoreService, ScoreStore};

    const BOARD: Bounds = Bounds {
        width: 500.0,
        height: 400.0,
    };

    fn session(name: &str) -> (PlayerSession, PlayerProfile) {
        let player = PlayerName::parse(name).unwrap();
        let profile = PlayerProfile {
            name: player.clone(),
            scores: BTreeMap::new(),
        };
        (
            PlayerSession {
                player,
                mode: ConnectivityMode::Online,
            },
            profile,
        )
    }

    fn signed_in_game() -> (Game, ManualHost) {
        let mut game = Game::new(GameConfig::default(), BOARD, 42);
        let (session, profile) = session("ada");
        game.sign_in(session, &profile);
        (game, ManualHost::new())
    }

    fn click(game: &mut Game, host: &mut ManualHost, x: f32, y: f32, now_ms: f64) -> Option<StoreRequest> {
        let pointer = host.live_of(HandleKind::Pointer)?;
        game.on_host_event(pointer, HostEvent::Pointer { x, y }, now_ms, host)
    }

    #[test]
    fn test_first_level_click_center_is_new_record() {
        let (mut game, mut host) = signed_in_game();
        game.start(0.0, &mut host);
        assert_eq!(game.level_text(), "LEVEL 1-1");
        assert_eq!(game.circle().map(|c| c.pos), Some(Vec2::new(250.0, 200.0)));

        let request = click(&mut game, &mut host, 250.0, 200.0, 1375.0);
        assert_eq!(game.phase(), RoundPhase::Ended);
        let Some(StoreRequest::Submit { level, time, .. }) = request else {
            panic!("expected a submit, got {request:?}");
        };
        assert_eq!(level, Level::FIRST);
        assert_eq!(time, 1.38);
        assert_eq!(game.best_text(), "1.38");
        assert_eq!(game.last_score_text(), "1.38");
        assert_eq!(
            game.result().map(|r| r.message()),
            Some("Your time: 1.38 sec\nNew High Score! 🎉".to_string())
        );

        let events = game.take_events();
        assert!(events.contains(&GameEvent::CircleHit));
        assert!(events.contains(&GameEvent::RoundEnded {
            final_time: 1.38,
            new_record: true
        }));
    }

    #[test]
    fn test_slower_time_is_not_submitted() {
        let (mut game, mut host) = signed_in_game();
        let ticket = match game.fetch_best_request() {
            Some(StoreRequest::FetchBest { ticket, .. }) => ticket,
            other => panic!("unexpected {other:?}"),
        };
        assert!(game.apply_best(ticket, Some(1.0)));

        game.start(0.0, &mut host);
        assert!(click(&mut game, &mut host, 250.0, 200.0, 2000.0).is_none());
        assert_eq!(game.best_text(), "1.00");
        assert_eq!(game.result().map(|r| r.new_record), Some(false));
        assert_eq!(game.result().map(|r| r.message()), Some("Your time: 2.00 sec".to_string()));
    }

    #[test]
    fn test_end_twice_submits_once() {
        let (mut game, mut host) = signed_in_game();
        game.start(0.0, &mut host);
        assert!(game.end(500.0, &mut host).is_some());
        assert!(game.end(900.0, &mut host).is_none());
        assert_eq!(game.last_score_text(), "0.50");
    }

    #[test]
    fn test_change_level_clamps() {
        let config = GameConfig {
            level_count: 18,
            ..GameConfig::default()
        };
        let mut game = Game::new(config, BOARD, 1);
        let mut host = ManualHost::new();
        game.change_level(19, 0.0, &mut host);
        assert_eq!(game.level().get(), 18);
        assert_eq!(game.phase(), RoundPhase::Running);
        game.change_level(-3, 0.0, &mut host);
        assert_eq!(game.level(), Level::FIRST);
    }

    #[test]
    fn test_change_level_twice_same_params() {
        let (mut game, mut host) = signed_in_game();
        game.change_level(14, 0.0, &mut host);
        let first = game.level_params();
        game.change_level(14, 10.0, &mut host);
        assert_eq!(game.level_params(), first);
        assert_eq!(game.round().params(), Some(&first));
    }

    #[test]
    fn test_change_level_resets_display_and_restarts() {
        let (mut game, mut host) = signed_in_game();
        game.start(0.0, &mut host);
        game.end(1200.0, &mut host);
        assert_eq!(game.last_score_text(), "1.20");

        let request = game.change_level(2, 5000.0, &mut host);
        assert!(matches!(request, Some(StoreRequest::FetchBest { level, .. }) if level.get() == 2));
        assert_eq!(game.last_score_text(), "-");
        assert_eq!(game.best_text(), "-");
        assert!(game.result().is_none());
        assert_eq!(game.phase(), RoundPhase::Running);
        assert_eq!(game.timer_text(), "0.00");
    }

    #[test]
    fn test_level_hopping_keeps_single_loop() {
        let (mut game, mut host) = signed_in_game();
        for n in [1, 5, 19, 24, 3, 20] {
            game.change_level(n, 0.0, &mut host);
            let relocating = game.level_params().appear_time.is_some();
            assert_eq!(host.live_count(HandleKind::Frame), 1);
            assert_eq!(host.live_count(HandleKind::Interval), 1);
            assert_eq!(host.live_count(HandleKind::Pointer), 1);
            assert_eq!(host.live_count(HandleKind::Timeout), usize::from(relocating));
        }
    }

    #[test]
    fn test_next_prev_noop_at_edges() {
        let (mut game, mut host) = signed_in_game();
        assert!(game.prev_level(0.0, &mut host).is_none());
        assert_eq!(game.phase(), RoundPhase::Idle);

        game.change_level(24, 0.0, &mut host);
        let round_id = game.round().id();
        assert!(game.next_level(0.0, &mut host).is_none());
        assert_eq!(game.round().id(), round_id);

        assert!(game.prev_level(0.0, &mut host).is_some());
        assert_eq!(game.level().get(), 23);
    }

    #[test]
    fn test_stale_best_time_dropped() {
        let (mut game, mut host) = signed_in_game();
        let old = match game.change_level(3, 0.0, &mut host) {
            Some(StoreRequest::FetchBest { ticket, .. }) => ticket,
            other => panic!("unexpected {other:?}"),
        };
        game.change_level(4, 0.0, &mut host);
        assert!(!game.apply_best(old, Some(9.99)));
        assert_eq!(game.best_text(), "-");
    }

    #[test]
    fn test_best_fetch_keeps_faster_local_record() {
        let (mut game, mut host) = signed_in_game();
        let ticket = match game.change_level(2, 0.0, &mut host) {
            Some(StoreRequest::FetchBest { ticket, .. }) => ticket,
            other => panic!("unexpected {other:?}"),
        };
        // Round finished before the fetch came back
        game.end(800.0, &mut host);
        assert!(game.apply_best(ticket, Some(3.0)));
        assert_eq!(game.best_text(), "0.80");
        assert!(game.apply_best(ticket, Some(0.5)));
        assert_eq!(game.best_text(), "0.50");
    }

    #[test]
    fn test_rejected_submit_after_replay_still_refetches() {
        let (mut game, mut host) = signed_in_game();
        game.start(0.0, &mut host);
        let ticket = match game.end(3000.0, &mut host) {
            Some(StoreRequest::Submit { ticket, .. }) => ticket,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(game.best_text(), "3.00");

        // Replay pressed before the server answered
        game.start(4000.0, &mut host);
        let refetch = match game.apply_submit(ticket, SubmitOutcome { accepted: false }) {
            Some(StoreRequest::FetchBest { ticket, .. }) => ticket,
            other => panic!("expected a refetch, got {other:?}"),
        };
        assert!(game.apply_best(refetch, Some(2.0)));
        assert_eq!(game.best_text(), "2.00");

        // 2.50 beats the local guess but not the server's record
        assert!(game.end(6500.0, &mut host).is_none());
        assert_eq!(game.result().map(|r| r.new_record), Some(false));
    }

    #[test]
    fn test_submit_answer_dropped_after_level_change() {
        let (mut game, mut host) = signed_in_game();
        game.start(0.0, &mut host);
        let ticket = match game.end(700.0, &mut host) {
            Some(StoreRequest::Submit { ticket, .. }) => ticket,
            other => panic!("unexpected {other:?}"),
        };
        game.change_level(2, 1000.0, &mut host);
        assert!(game.apply_submit(ticket, SubmitOutcome { accepted: false }).is_none());
    }

    #[test]
    fn test_rejected_submit_refetches() {
        let (mut game, mut host) = signed_in_game();
        game.start(0.0, &mut host);
        let ticket = match game.end(700.0, &mut host) {
            Some(StoreRequest::Submit { ticket, .. }) => ticket,
            other => panic!("unexpected {other:?}"),
        };
        let refetch = game.apply_submit(ticket, SubmitOutcome { accepted: false });
        assert!(matches!(refetch, Some(StoreRequest::FetchBest { .. })));
        assert!(game.apply_submit(ticket, SubmitOutcome { accepted: true }).is_none());
    }

    #[test]
    fn test_no_player_no_requests() {
        let mut game = Game::new(GameConfig::default(), BOARD, 3);
        let mut host = ManualHost::new();
        assert!(game.change_level(2, 0.0, &mut host).is_none());
        assert!(game.end(100.0, &mut host).is_none());
        assert_eq!(game.best_text(), "0.10");
    }

    #[test]
    fn test_switch_user_stops_everything() {
        let (mut game, mut host) = signed_in_game();
        game.change_level(8, 0.0, &mut host);
        game.switch_user(&mut host);
        assert_eq!(host.total_live(), 0);
        assert_eq!(game.phase(), RoundPhase::Idle);
        assert_eq!(game.level(), Level::FIRST);
        assert!(game.player().is_none());
        assert!(game.player_label().is_none());
    }

    #[test]
    fn test_wall_hit_event() {
        let mut game = Game::new(GameConfig::default(), Bounds::new(84.0, 84.0), 5);
        let mut host = ManualHost::new();
        game.start(0.0, &mut host);
        let frame = host.fire(HandleKind::Frame).unwrap();
        game.on_host_event(frame, HostEvent::Frame, 16.0, &mut host);
        assert!(game.take_events().contains(&GameEvent::WallHit));
    }

    #[test]
    fn test_offline_session_end_to_end() {
        let transport = FakeTransport::new();
        transport.fail();
        let scores = ScoreService::new(transport.clone(), Rc::new(MemoryStorage::new()), 24);
        let (session, profile) = block_on(scores.sign_in("ada")).unwrap();
        assert_eq!(session.mode, ConnectivityMode::Offline);

        let mut game = Game::new(GameConfig::default(), BOARD, 9);
        let mut host = ManualHost::new();
        game.sign_in(session, &profile);
        if scores.take_offline_notice() {
            game.set_offline();
        }
        game.start(0.0, &mut host);

        let Some(StoreRequest::Submit {
            ticket,
            player,
            level,
            time,
        }) = click(&mut game, &mut host, 250.0, 200.0, 2500.0)
        else {
            panic!("expected submit");
        };
        let outcome = block_on(scores.submit_score(&player, level, time)).unwrap();
        assert!(outcome.accepted);
        assert!(game.apply_submit(ticket, outcome).is_none());

        assert_eq!(block_on(scores.get_best(&player, level)).unwrap(), Some(2.5));
        assert_eq!(
            game.player().map(|s| s.mode),
            Some(ConnectivityMode::Offline)
        );
        // Only the failed ping reached the network
        assert_eq!(transport.call_count(), 1);
    }
}
