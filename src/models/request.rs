use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::player::PlayerPublic;
use super::response::GameResponse;

/// Audience is a one-way escalation lattice: crews < club < regional.
/// The derived ordering is what makes expansion monotonicity checkable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Crews,
    Club,
    Regional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// First eligible responders are auto-confirmed up to capacity.
    QuickFill,
    /// Responses stage as interested until the organizer confirms or passes.
    OrganizerPicks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Open,
    Filled,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRequest {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub date_time: DateTime<Utc>,
    pub club: String,
    pub court: Option<String>,
    pub spots_needed: u32,
    pub spots_filled: u32,
    pub skill_min: Option<i32>,
    pub skill_max: Option<i32>,
    pub mode: FillMode,
    pub audience: Audience,
    pub target_crew_ids: Vec<Uuid>,
    pub status: RequestStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameRequest {
    pub fn is_open(&self) -> bool {
        self.status == RequestStatus::Open
    }

    pub fn has_capacity(&self) -> bool {
        self.spots_filled < self.spots_needed
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequestBody {
    #[serde(rename = "dateTime")]
    pub date_time: DateTime<Utc>,
    pub club: String,
    pub court: Option<String>,
    #[serde(rename = "spotsNeeded")]
    pub spots_needed: u32,
    #[serde(rename = "skillMin")]
    pub skill_min: Option<i32>,
    #[serde(rename = "skillMax")]
    pub skill_max: Option<i32>,
    #[serde(default = "default_mode")]
    pub mode: FillMode,
    #[serde(default = "default_audience")]
    pub audience: Audience,
    #[serde(rename = "targetCrewIds", default)]
    pub target_crew_ids: Vec<Uuid>,
    pub notes: Option<String>,
}

fn default_mode() -> FillMode {
    FillMode::QuickFill
}

fn default_audience() -> Audience {
    Audience::Crews
}

#[derive(Debug, Deserialize)]
pub struct ExpandAudienceBody {
    pub audience: Audience,
}

/// Viewer-scoped projection of a request. The full response list is only
/// populated for the organizer.
#[derive(Debug, Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: GameRequest,
    pub organizer: Option<PlayerPublic>,
    #[serde(rename = "myResponse")]
    pub my_response: Option<GameResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses: Option<Vec<GameResponse>>,
}
