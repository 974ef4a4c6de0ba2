use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is allowed to discover this player's presence and be notified about
/// them. `Hidden` players also see only their own requests when listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Everyone,
    CrewsOnly,
    Hidden,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub home_club: Option<String>,
    pub other_clubs: Vec<String>,
    /// Numeric rating (PTI). Absent means the player is never skill-filtered.
    pub skill_rating: Option<i32>,
    pub skill_verified: bool,
    pub visibility: Visibility,
}

impl Player {
    pub fn plays_at(&self, club: &str) -> bool {
        self.home_club.as_deref() == Some(club) || self.other_clubs.iter().any(|c| c == club)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerPublic {
    pub id: Uuid,
    pub name: String,
    pub home_club: Option<String>,
    pub skill_rating: Option<i32>,
}

impl From<&Player> for PlayerPublic {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            home_club: p.home_club.clone(),
            skill_rating: p.skill_rating,
        }
    }
}
