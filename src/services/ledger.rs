use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::response::{GameResponse, ResponseStatus};

/// Outcome of a record call. Re-recording for the same player is not an
/// error: the client's "I'm In" button must survive double-taps and retries.
pub enum Recorded {
    Inserted(GameResponse),
    Existing(GameResponse),
}

/// Append-only record of player responses for one request. Insertion order is
/// arrival order, which is the quick-fill tie-break.
#[derive(Debug, Default)]
pub struct ResponseLedger {
    responses: Vec<GameResponse>,
    by_player: HashMap<Uuid, usize>,
}

impl ResponseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        request_id: Uuid,
        player_id: Uuid,
        status: ResponseStatus,
    ) -> Recorded {
        if let Some(&idx) = self.by_player.get(&player_id) {
            return Recorded::Existing(self.responses[idx].clone());
        }

        let now = Utc::now();
        let response = GameResponse {
            id: Uuid::new_v4(),
            request_id,
            player_id,
            status,
            created_at: now,
            // Quick-fill records responses already resolved.
            decided_at: (status != ResponseStatus::Interested).then_some(now),
        };
        self.by_player.insert(player_id, self.responses.len());
        self.responses.push(response.clone());
        Recorded::Inserted(response)
    }

    pub fn get(&self, response_id: Uuid) -> Option<&GameResponse> {
        self.responses.iter().find(|r| r.id == response_id)
    }

    pub fn for_player(&self, player_id: Uuid) -> Option<&GameResponse> {
        self.by_player
            .get(&player_id)
            .map(|&idx| &self.responses[idx])
    }

    pub fn count_confirmed(&self) -> usize {
        self.responses
            .iter()
            .filter(|r| r.status == ResponseStatus::Confirmed)
            .count()
    }

    /// Responses in a given status, ordered by created_at ascending.
    pub fn list_by_status(&self, status: ResponseStatus) -> Vec<&GameResponse> {
        self.responses
            .iter()
            .filter(|r| r.status == status)
            .collect()
    }

    pub fn all(&self) -> &[GameResponse] {
        &self.responses
    }

    /// Moves a response to a resolved status, stamping decided_at.
    pub fn resolve(&mut self, response_id: Uuid, status: ResponseStatus) -> Option<GameResponse> {
        let response = self.responses.iter_mut().find(|r| r.id == response_id)?;
        response.status = status;
        response.decided_at = Some(Utc::now());
        Some(response.clone())
    }

    /// Fill-time cleanup: every response still interested goes to passed so
    /// nothing is left dangling once the request leaves open. Returns the
    /// affected player ids.
    pub fn pass_all_interested(&mut self) -> Vec<Uuid> {
        let now = Utc::now();
        let mut passed = Vec::new();
        for response in &mut self.responses {
            if response.status == ResponseStatus::Interested {
                response.status = ResponseStatus::Passed;
                response.decided_at = Some(now);
                passed.push(response.player_id);
            }
        }
        passed
    }
}
