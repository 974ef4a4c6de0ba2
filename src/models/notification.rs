use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::request::Audience;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    RequestOpened,
    PlayerInterested { player_id: Uuid },
    PlayerConfirmed { player_id: Uuid },
    PlayerPassed { player_id: Uuid },
    AudienceExpanded { audience: Audience },
    RequestCancelled,
}

/// Well-formed outbound event. Carries enough to reconstruct a human-readable
/// message; delivery, retries, and channel choice belong to the notification
/// service.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub request_id: Uuid,
    pub club: String,
    pub date_time: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
    pub recipients: Vec<Uuid>,
}
