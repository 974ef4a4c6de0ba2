use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::directory::PlayerDirectory;
use crate::models::request::{Audience, GameRequest};

/// Computes who may see and respond to a request. Pure read over the
/// directory; never mutates anything.
#[derive(Clone)]
pub struct EligibilityResolver {
    directory: Arc<dyn PlayerDirectory>,
}

impl EligibilityResolver {
    pub fn new(directory: Arc<dyn PlayerDirectory>) -> Self {
        Self { directory }
    }

    pub fn eligible_players(&self, request: &GameRequest) -> HashSet<Uuid> {
        let mut eligible: HashSet<Uuid> = HashSet::new();

        match request.audience {
            Audience::Crews => {
                for crew_id in &request.target_crew_ids {
                    // Unknown crews, or crews the organizer is not part of,
                    // are dropped from the union rather than failing the
                    // request. Audience is advisory; respond still gates.
                    let Some(crew) = self.directory.crew(*crew_id) else {
                        continue;
                    };
                    if !crew.has_member(request.organizer_id) {
                        continue;
                    }
                    eligible.extend(crew.member_ids.iter().copied());
                }
            }
            Audience::Club => {
                eligible.extend(self.directory.players_at_club(&request.club));
            }
            Audience::Regional => {
                eligible.extend(self.directory.players_in_region_of(&request.club));
            }
        }

        // Organizer is always visible-to-self.
        eligible.insert(request.organizer_id);
        eligible
    }

    pub fn is_eligible(&self, request: &GameRequest, player_id: Uuid) -> bool {
        player_id == request.organizer_id || self.eligible_players(request).contains(&player_id)
    }
}
