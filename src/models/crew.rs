use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrewKind {
    InviteOnly,
    Open,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crew {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub kind: CrewKind,
    /// Always includes the creator.
    pub member_ids: HashSet<Uuid>,
}

impl Crew {
    pub fn has_member(&self, player_id: Uuid) -> bool {
        self.created_by == player_id || self.member_ids.contains(&player_id)
    }
}
