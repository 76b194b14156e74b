//! Local fallback backend
//!
//! Scores live under the `offlineScores` key as
//! `{"<username>": {"<level>": "12.34"}}`, and the last player name under
//! `username`. Both are plain text with no schema version.

use std::collections::BTreeMap;

use super::{
    PlayerName, PlayerProfile, ScoreStore, SubmitOutcome, is_improvement, parse_score_text, validate_time,
};
use crate::consts::{OFFLINE_SCORES_KEY, USERNAME_KEY};
use crate::error::StoreError;
use crate::format_seconds;
use crate::platform::KeyValueStorage;
use crate::sim::{Level, clamp_level_count};

/// player -> level -> score text
type ScoreTable = BTreeMap<String, BTreeMap<String, String>>;

pub struct OfflineScores<S: KeyValueStorage> {
    storage: S,
    level_count: u32,
}

impl<S: KeyValueStorage> OfflineScores<S> {
    pub fn new(storage: S, level_count: u32) -> Self {
        Self {
            storage,
            level_count: clamp_level_count(level_count),
        }
    }

    fn load_table(&self) -> ScoreTable {
        let Some(json) = self.storage.get(OFFLINE_SCORES_KEY) else {
            return ScoreTable::new();
        };
        serde_json::from_str(&json).unwrap_or_else(|err| {
            log::warn!("Ignoring unreadable offline scores: {err}");
            ScoreTable::new()
        })
    }

    fn save_table(&self, table: &ScoreTable) -> Result<(), StoreError> {
        let json = serde_json::to_string(table).map_err(|err| StoreError::Storage(err.to_string()))?;
        self.storage.set(OFFLINE_SCORES_KEY, &json)
    }

    fn read_best(&self, table: &ScoreTable, name: &PlayerName, level: Level) -> Option<f64> {
        table
            .get(name.as_str())
            .and_then(|levels| levels.get(&level.get().to_string()))
            .and_then(|text| parse_score_text(text))
    }

    /// Persist the name so the prompt can be pre-filled next visit
    pub fn remember_player(&self, name: &PlayerName) -> Result<(), StoreError> {
        self.storage.set(USERNAME_KEY, name.as_str())
    }

    pub fn last_player(&self) -> Option<String> {
        self.storage
            .get(USERNAME_KEY)
            .filter(|name| !name.trim().is_empty())
    }
}

impl<S: KeyValueStorage> ScoreStore for OfflineScores<S> {
    async fn create_or_load_player(&self, name: &PlayerName) -> Result<PlayerProfile, StoreError> {
        let mut table = self.load_table();
        if !table.contains_key(name.as_str()) {
            let empty = (1..=self.level_count)
                .map(|level| (level.to_string(), String::new()))
                .collect();
            table.insert(name.as_str().to_string(), empty);
            self.save_table(&table)?;
            log::info!("Created offline score table for {name}");
        }

        let scores = table
            .get(name.as_str())
            .map(|levels| {
                levels
                    .iter()
                    .filter_map(|(level, text)| Some((level.parse::<u32>().ok()?, parse_score_text(text))))
                    .collect()
            })
            .unwrap_or_default();
        Ok(PlayerProfile {
            name: name.clone(),
            scores,
        })
    }

    async fn get_best(&self, name: &PlayerName, level: Level) -> Result<Option<f64>, StoreError> {
        Ok(self.read_best(&self.load_table(), name, level))
    }

    async fn submit_score(
        &self,
        name: &PlayerName,
        level: Level,
        time: f64,
    ) -> Result<SubmitOutcome, StoreError> {
        let time = validate_time(time)?;
        let mut table = self.load_table();
        if !is_improvement(self.read_best(&table, name, level), time) {
            return Ok(SubmitOutcome { accepted: false });
        }

        table
            .entry(name.as_str().to_string())
            .or_default()
            .insert(level.get().to_string(), format_seconds(time));
        self.save_table(&table)?;
        Ok(SubmitOutcome { accepted: true })
    }
}
