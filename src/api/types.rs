//! API request and response types

use crate::render::Reply;
use crate::state_machine::{Action, ActionParseError, ActionPayload};
use serde::{Deserialize, Serialize};

/// User identity as sent by transports: chat ids are often numeric
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl UserId {
    pub fn into_string(self) -> String {
        match self {
            UserId::Number(n) => n.to_string(),
            UserId::Text(s) => s.trim().to_string(),
        }
    }
}

/// Inbound action record: either a named action with payload, or the id
/// of a choice the user picked
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub user_id: UserId,
    pub action: Option<String>,
    #[serde(default)]
    pub payload: ActionPayload,
    pub callback: Option<String>,
}

impl ActionRequest {
    /// `None` if the record names neither an action nor a callback
    pub fn parse_action(&self) -> Option<Result<Action, ActionParseError>> {
        match (&self.action, &self.callback) {
            (Some(kind), _) => Some(Action::from_kind(kind, self.payload.clone())),
            (None, Some(callback)) => Some(Action::from_callback(callback)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub replies: Vec<Reply>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
