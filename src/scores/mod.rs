//! Best-time store
//!
//! One contract ([`ScoreStore`]) with two backends:
//! - [`OnlineScores`]: the score server's HTTP API
//! - [`OfflineScores`]: a JSON map in LocalStorage
//!
//! [`ScoreService`] starts online and drops to offline for the rest of the
//! session on the first connectivity failure, retrying that call locally.
//! It never reconnects.

pub mod offline;
pub mod online;

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;

use crate::consts::MAX_NAME_LEN;
use crate::error::StoreError;
use crate::platform::KeyValueStorage;
use crate::round_hundredths;
use crate::sim::Level;

pub use offline::OfflineScores;
pub use online::{HttpResponse, OnlineScores, Transport};

/// Validated player identifier (trimmed, non-empty)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerName(String);

impl PlayerName {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("Please enter a name!".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(StoreError::Validation(format!(
                "Name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which backend the session uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityMode {
    Online,
    Offline,
}

/// Signed-in player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSession {
    pub player: PlayerName,
    pub mode: ConnectivityMode,
}

/// A player's score table as returned by create-or-load
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProfile {
    pub name: PlayerName,
    /// Level number -> best seconds (None = no score yet)
    pub scores: BTreeMap<u32, Option<f64>>,
}

impl PlayerProfile {
    pub fn best(&self, level: Level) -> Option<f64> {
        self.scores.get(&level.get()).copied().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// True if the time became the new best
    pub accepted: bool,
}

/// Lower is better: `time` replaces `best` iff there is no best yet or it is faster
pub fn is_improvement(best: Option<f64>, time: f64) -> bool {
    best.is_none_or(|best| time < best)
}

/// Scores are positive finite seconds kept at hundredth precision
pub fn validate_time(time: f64) -> Result<f64, StoreError> {
    if !time.is_finite() || time <= 0.0 {
        return Err(StoreError::Validation(format!("Invalid score: {time}")));
    }
    Ok(round_hundredths(time))
}

/// Stored score text ("" = no score, "12.34" = seconds)
pub fn parse_score_text(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>()
        .ok()
        .filter(|t| t.is_finite() && *t > 0.0)
}

/// Persistence contract shared by both backends
#[allow(async_fn_in_trait)]
pub trait ScoreStore {
    /// Idempotent: the first call seeds an empty table, later calls return it unchanged
    async fn create_or_load_player(&self, name: &PlayerName) -> Result<PlayerProfile, StoreError>;

    async fn get_best(&self, name: &PlayerName, level: Level) -> Result<Option<f64>, StoreError>;

    /// Accepted iff there is no best yet or `time` is lower
    async fn submit_score(
        &self,
        name: &PlayerName,
        level: Level,
        time: f64,
    ) -> Result<SubmitOutcome, StoreError>;
}

/// Online store with a one-way fallback to local storage
pub struct ScoreService<T: Transport, S: KeyValueStorage> {
    online: OnlineScores<T>,
    offline: OfflineScores<S>,
    mode: Cell<ConnectivityMode>,
    notice_pending: Cell<bool>,
}

impl<T: Transport, S: KeyValueStorage> ScoreService<T, S> {
    pub fn new(transport: T, storage: S, level_count: u32) -> Self {
        Self {
            online: OnlineScores::new(transport),
            offline: OfflineScores::new(storage, level_count),
            mode: Cell::new(ConnectivityMode::Online),
            notice_pending: Cell::new(false),
        }
    }

    pub fn mode(&self) -> ConnectivityMode {
        self.mode.get()
    }

    pub fn offline(&self) -> &OfflineScores<S> {
        &self.offline
    }

    /// True once, right after the session switched to offline mode
    pub fn take_offline_notice(&self) -> bool {
        self.notice_pending.replace(false)
    }

    fn go_offline(&self, reason: &StoreError) {
        if self.mode.get() == ConnectivityMode::Online {
            log::warn!("Server error ({reason}), switching to offline mode");
            self.mode.set(ConnectivityMode::Offline);
            self.notice_pending.set(true);
        }
    }

    /// Liveness check (`GET /ping`). A failed check switches to offline mode.
    pub async fn check_connectivity(&self) -> ConnectivityMode {
        if self.mode() == ConnectivityMode::Online {
            match self.online.ping().await {
                Ok(true) => {}
                Ok(false) => self.go_offline(&StoreError::Unavailable),
                Err(err) => self.go_offline(&err),
            }
        }
        self.mode()
    }

    /// Validate the name, pick the backend, then create or load the player.
    /// Validation errors are returned so the caller can prompt again.
    pub async fn sign_in(&self, raw_name: &str) -> Result<(PlayerSession, PlayerProfile), StoreError> {
        let name = PlayerName::parse(raw_name)?;
        self.check_connectivity().await;
        let profile = self.create_or_load_player(&name).await?;
        if let Err(err) = self.offline.remember_player(&name) {
            log::warn!("Could not remember player name: {err}");
        }
        log::info!("Signed in as {} ({:?})", name, self.mode());
        let session = PlayerSession {
            player: name,
            mode: self.mode(),
        };
        Ok((session, profile))
    }
}

impl<T: Transport, S: KeyValueStorage> ScoreStore for ScoreService<T, S> {
    async fn create_or_load_player(&self, name: &PlayerName) -> Result<PlayerProfile, StoreError> {
        if self.mode() == ConnectivityMode::Online {
            match self.online.create_or_load_player(name).await {
                Err(err) if err.is_connectivity() => self.go_offline(&err),
                result => return result,
            }
        }
        self.offline.create_or_load_player(name).await
    }

    async fn get_best(&self, name: &PlayerName, level: Level) -> Result<Option<f64>, StoreError> {
        if self.mode() == ConnectivityMode::Online {
            match self.online.get_best(name, level).await {
                Err(err) if err.is_connectivity() => self.go_offline(&err),
                result => return result,
            }
        }
        self.offline.get_best(name, level).await
    }

    async fn submit_score(
        &self,
        name: &PlayerName,
        level: Level,
        time: f64,
    ) -> Result<SubmitOutcome, StoreError> {
        if self.mode() == ConnectivityMode::Online {
            match self.online.submit_score(name, level, time).await {
                Err(err) if err.is_connectivity() => self.go_offline(&err),
                result => return result,
            }
        }
        self.offline.submit_score(name, level, time).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport shared by the score tests

    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Default)]
    pub struct FakeTransport {
        replies: RefCell<VecDeque<Result<HttpResponse, StoreError>>>,
        pub calls: RefCell<Vec<(String, String, Option<String>)>>,
    }

    impl FakeTransport {
        pub fn new() -> Rc<Self> {
            Rc::new(Self::default())
        }

        pub fn reply(&self, status: u16, body: &str) {
            self.replies.borrow_mut().push_back(Ok(HttpResponse {
                status,
                body: body.to_string(),
            }));
        }

        pub fn fail(&self) {
            self.replies
                .borrow_mut()
                .push_back(Err(StoreError::Transport("connection refused".into())));
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }

        fn next(&self) -> Result<HttpResponse, StoreError> {
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(StoreError::Transport("no scripted reply".into())))
        }
    }

    impl Transport for Rc<FakeTransport> {
        async fn get(&self, path: &str) -> Result<HttpResponse, StoreError> {
            self.calls
                .borrow_mut()
                .push(("GET".into(), path.to_string(), None));
            self.next()
        }

        async fn post_json(&self, path: &str, body: &str) -> Result<HttpResponse, StoreError> {
            self.calls
                .borrow_mut()
                .push(("POST".into(), path.to_string(), Some(body.to_string())));
            self.next()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use pollster::block_on;

    use super::testing::FakeTransport;
    use super::*;
    use crate::platform::MemoryStorage;

    fn service(transport: &Rc<FakeTransport>) -> ScoreService<Rc<FakeTransport>, Rc<MemoryStorage>> {
        ScoreService::new(transport.clone(), Rc::new(MemoryStorage::new()), 18)
    }

    fn name(raw: &str) -> PlayerName {
        PlayerName::parse(raw).unwrap()
    }

    #[test]
    fn test_player_name_validation() {
        assert_eq!(name("  ada ").as_str(), "ada");
        assert!(matches!(PlayerName::parse("   "), Err(StoreError::Validation(_))));
        assert!(PlayerName::parse(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_improvement_rule() {
        assert!(is_improvement(None, 5.0));
        assert!(is_improvement(Some(5.0), 4.99));
        assert!(!is_improvement(Some(5.0), 5.0));
        assert!(!is_improvement(Some(5.0), 6.0));
    }

    #[test]
    fn test_score_text_parsing() {
        assert_eq!(parse_score_text(""), None);
        assert_eq!(parse_score_text("12.34"), Some(12.34));
        assert_eq!(parse_score_text("abc"), None);
        assert_eq!(parse_score_text("0"), None);
    }

    #[test]
    fn test_validate_time() {
        assert_eq!(validate_time(1.234), Ok(1.23));
        assert!(validate_time(0.0).is_err());
        assert!(validate_time(f64::NAN).is_err());
    }

    #[test]
    fn test_failed_ping_goes_offline_for_good() {
        let transport = FakeTransport::new();
        transport.fail();
        let scores = service(&transport);

        assert_eq!(block_on(scores.check_connectivity()), ConnectivityMode::Offline);
        assert!(scores.take_offline_notice());
        assert!(!scores.take_offline_notice());

        let ada = name("ada");
        block_on(scores.create_or_load_player(&ada)).unwrap();
        let outcome = block_on(scores.submit_score(&ada, Level::FIRST, 3.21)).unwrap();
        assert!(outcome.accepted);
        assert_eq!(block_on(scores.get_best(&ada, Level::FIRST)).unwrap(), Some(3.21));

        // Only the ping ever hit the network
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_ping_not_ok_goes_offline() {
        let transport = FakeTransport::new();
        transport.reply(200, r#"{"status":"degraded"}"#);
        let scores = service(&transport);
        assert_eq!(block_on(scores.check_connectivity()), ConnectivityMode::Offline);
    }

    #[test]
    fn test_sign_in_online() {
        let transport = FakeTransport::new();
        transport.reply(200, r#"{"status":"ok"}"#);
        transport.reply(
            200,
            r#"{"success":true,"message":"User loaded","data":{"1":"","2":"4.50"}}"#,
        );
        let scores = service(&transport);

        let (session, profile) = block_on(scores.sign_in(" ada ")).unwrap();
        assert_eq!(session.mode, ConnectivityMode::Online);
        assert_eq!(session.player.as_str(), "ada");
        assert_eq!(profile.best(Level::FIRST), None);
        assert_eq!(profile.best(Level::clamped(2, 18)), Some(4.5));
        assert!(!scores.take_offline_notice());
        assert_eq!(scores.offline().last_player().as_deref(), Some("ada"));
    }

    #[test]
    fn test_sign_in_503_falls_back_offline() {
        let transport = FakeTransport::new();
        transport.reply(200, r#"{"status":"ok"}"#);
        transport.reply(503, "");
        let scores = service(&transport);

        let (session, profile) = block_on(scores.sign_in("ada")).unwrap();
        assert_eq!(session.mode, ConnectivityMode::Offline);
        assert_eq!(profile.scores.len(), 18);
        assert!(scores.take_offline_notice());
    }

    #[test]
    fn test_sign_in_empty_name_blocks_without_network() {
        let transport = FakeTransport::new();
        let scores = service(&transport);
        assert!(matches!(block_on(scores.sign_in("  ")), Err(StoreError::Validation(_))));
        assert_eq!(transport.call_count(), 0);
        assert_eq!(scores.mode(), ConnectivityMode::Online);
    }

    #[test]
    fn test_submit_transport_failure_retries_offline_once() {
        let transport = FakeTransport::new();
        transport.fail();
        let scores = service(&transport);
        let ada = name("ada");

        let outcome = block_on(scores.submit_score(&ada, Level::FIRST, 2.5)).unwrap();
        assert!(outcome.accepted);
        assert_eq!(scores.mode(), ConnectivityMode::Offline);
        assert_eq!(transport.call_count(), 1);

        // Later calls stay local
        let slower = block_on(scores.submit_score(&ada, Level::FIRST, 3.0)).unwrap();
        assert!(!slower.accepted);
        assert_eq!(block_on(scores.get_best(&ada, Level::FIRST)).unwrap(), Some(2.5));
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_online_get_best_stays_online() {
        let transport = FakeTransport::new();
        transport.reply(200, r#"{"level":"3","highScore":7.25}"#);
        let scores = service(&transport);
        let best = block_on(scores.get_best(&name("ada"), Level::clamped(3, 18))).unwrap();
        assert_eq!(best, Some(7.25));
        assert_eq!(scores.mode(), ConnectivityMode::Online);
    }
}
