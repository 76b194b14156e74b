//! Score server backend
//!
//! Endpoints:
//! - `POST /user {username}` -> `{success, message, data: {level: "" | "12.34"}}`
//! - `GET /highscores/:username/:level` -> `{level, highScore: number | null}`
//! - `POST /highscores/:username/:level {highScore}` -> `{success, message}`
//! - `GET /ping` -> `{status: "ok"}`
//!
//! The server applies the lower-wins rule itself; its answer is the truth.

use std::collections::BTreeMap;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{PlayerName, PlayerProfile, ScoreStore, SubmitOutcome, parse_score_text, validate_time};
use crate::error::StoreError;
use crate::sim::Level;

/// Raw HTTP reply
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP client. `Err` means the request never got an answer.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get(&self, path: &str) -> Result<HttpResponse, StoreError>;
    async fn post_json(&self, path: &str, body: &str) -> Result<HttpResponse, StoreError>;
}

#[derive(Serialize)]
struct CreateUserRequest<'a> {
    username: &'a str,
}

#[derive(Deserialize)]
struct CreateUserResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HighScoreResponse {
    #[serde(default)]
    high_score: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    high_score: f64,
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct PingResponse {
    status: String,
}

pub struct OnlineScores<T: Transport> {
    transport: T,
}

impl<T: Transport> OnlineScores<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// True if the server answered `{status: "ok"}`
    pub async fn ping(&self) -> Result<bool, StoreError> {
        let response = check_status(self.transport.get("/ping").await?)?;
        let ping: PingResponse = decode(&response)?;
        Ok(ping.status == "ok")
    }
}

fn score_path(name: &PlayerName, level: Level) -> String {
    format!(
        "/highscores/{}/{}",
        utf8_percent_encode(name.as_str(), NON_ALPHANUMERIC),
        level.get()
    )
}

/// Map status codes onto the error taxonomy
fn check_status(response: HttpResponse) -> Result<HttpResponse, StoreError> {
    match response.status {
        _ if response.is_success() => Ok(response),
        503 => Err(StoreError::Unavailable),
        400 => Err(StoreError::Validation(server_message(&response.body))),
        status => Err(StoreError::Transport(format!("HTTP {status}"))),
    }
}

fn decode<'a, D: Deserialize<'a>>(response: &'a HttpResponse) -> Result<D, StoreError> {
    serde_json::from_str(&response.body)
        .map_err(|err| StoreError::Transport(format!("malformed response: {err}")))
}

/// Best-effort `message`/`error` field from an error body
fn server_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "rejected by server".to_string())
}

/// Stored scores arrive as text ("", "12.34") or, occasionally, numbers
fn score_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::String(text) => parse_score_text(text),
        Value::Number(n) => n.as_f64().filter(|t| *t > 0.0),
        _ => None,
    }
}

impl<T: Transport> ScoreStore for OnlineScores<T> {
    async fn create_or_load_player(&self, name: &PlayerName) -> Result<PlayerProfile, StoreError> {
        let body = serde_json::to_string(&CreateUserRequest {
            username: name.as_str(),
        })
        .map_err(|err| StoreError::Validation(err.to_string()))?;
        let response = check_status(self.transport.post_json("/user", &body).await?)?;
        let reply: CreateUserResponse = decode(&response)?;
        if !reply.success {
            return Err(StoreError::Validation(
                reply.message.unwrap_or_else(|| "Error loading user!".to_string()),
            ));
        }

        let scores = reply
            .data
            .iter()
            .filter_map(|(level, value)| Some((level.parse::<u32>().ok()?, score_from_value(value))))
            .collect();
        Ok(PlayerProfile {
            name: name.clone(),
            scores,
        })
    }

    async fn get_best(&self, name: &PlayerName, level: Level) -> Result<Option<f64>, StoreError> {
        let response = self.transport.get(&score_path(name, level)).await?;
        if response.status == 404 {
            // Unknown player: nothing recorded yet
            return Ok(None);
        }
        let response = check_status(response)?;
        let reply: HighScoreResponse = decode(&response)?;
        Ok(reply.high_score.filter(|t| t.is_finite() && *t > 0.0))
    }

    async fn submit_score(
        &self,
        name: &PlayerName,
        level: Level,
        time: f64,
    ) -> Result<SubmitOutcome, StoreError> {
        let time = validate_time(time)?;
        let body = serde_json::to_string(&SubmitRequest { high_score: time })
            .map_err(|err| StoreError::Validation(err.to_string()))?;
        let response = self
            .transport
            .post_json(&score_path(name, level), &body)
            .await?;
        if response.status == 404 {
            return Ok(SubmitOutcome { accepted: false });
        }
        let response = check_status(response)?;
        let reply: SubmitResponse = decode(&response)?;
        if let Some(message) = &reply.message {
            log::debug!("Server: {message}");
        }
        Ok(SubmitOutcome {
            accepted: reply.success,
        })
    }
}
