use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::models::crew::Crew;
use crate::models::player::Player;

/// Read-only view of the profile and membership directories. The engine
/// consumes this; it never writes through it. Production backs this with the
/// profile/membership service, tests and local runs use `InMemoryDirectory`.
pub trait PlayerDirectory: Send + Sync {
    fn player(&self, id: Uuid) -> Option<Player>;
    fn crew(&self, id: Uuid) -> Option<Crew>;
    /// Crews the player belongs to.
    fn crews_of(&self, player_id: Uuid) -> Vec<Uuid>;
    /// Players whose home club or other clubs include `club`.
    fn players_at_club(&self, club: &str) -> Vec<Uuid>;
    /// Players in the same region/league as `club`. When no region mapping
    /// exists for the club, this widens to every registered player.
    fn players_in_region_of(&self, club: &str) -> Vec<Uuid>;
}

#[derive(Default)]
pub struct InMemoryDirectory {
    inner: RwLock<DirectoryState>,
}

#[derive(Default)]
struct DirectoryState {
    players: HashMap<Uuid, Player>,
    crews: HashMap<Uuid, Crew>,
    club_regions: HashMap<String, String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_player(&self, player: Player) {
        let mut state = self.inner.write().unwrap();
        state.players.insert(player.id, player);
    }

    pub fn upsert_crew(&self, crew: Crew) {
        let mut state = self.inner.write().unwrap();
        state.crews.insert(crew.id, crew);
    }

    pub fn set_club_region(&self, club: impl Into<String>, region: impl Into<String>) {
        let mut state = self.inner.write().unwrap();
        state.club_regions.insert(club.into(), region.into());
    }
}

impl PlayerDirectory for InMemoryDirectory {
    fn player(&self, id: Uuid) -> Option<Player> {
        self.inner.read().unwrap().players.get(&id).cloned()
    }

    fn crew(&self, id: Uuid) -> Option<Crew> {
        self.inner.read().unwrap().crews.get(&id).cloned()
    }

    fn crews_of(&self, player_id: Uuid) -> Vec<Uuid> {
        let state = self.inner.read().unwrap();
        state
            .crews
            .values()
            .filter(|c| c.has_member(player_id))
            .map(|c| c.id)
            .collect()
    }

    fn players_at_club(&self, club: &str) -> Vec<Uuid> {
        let state = self.inner.read().unwrap();
        state
            .players
            .values()
            .filter(|p| p.plays_at(club))
            .map(|p| p.id)
            .collect()
    }

    fn players_in_region_of(&self, club: &str) -> Vec<Uuid> {
        let state = self.inner.read().unwrap();
        let Some(region) = state.club_regions.get(club) else {
            return state.players.keys().copied().collect();
        };

        let region_clubs: Vec<&str> = state
            .club_regions
            .iter()
            .filter(|(_, r)| *r == region)
            .map(|(c, _)| c.as_str())
            .collect();

        state
            .players
            .values()
            .filter(|p| region_clubs.iter().any(|c| p.plays_at(c)))
            .map(|p| p.id)
            .collect()
    }
}
