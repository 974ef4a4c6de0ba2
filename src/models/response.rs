use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Interested,
    Confirmed,
    Passed,
}

/// One player's reply to one request. Created by the player's first respond
/// call; after that only the fulfillment engine mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub player_id: Uuid,
    pub status: ResponseStatus,
    pub created_at: DateTime<Utc>,
    /// Set once the engine resolves the response (confirm or pass).
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateResponseBody {
    pub status: ResponseStatus,
}
