use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::directory::PlayerDirectory;
use crate::error::{AppError, AppResult};
use crate::models::notification::{EventKind, NotificationEvent};
use crate::models::player::{PlayerPublic, Visibility};
use crate::models::request::{
    Audience, CreateRequestBody, FillMode, GameRequest, RequestDetail, RequestStatus,
};
use crate::models::response::{GameResponse, ResponseStatus};

use super::eligibility::EligibilityResolver;
use super::ledger::{Recorded, ResponseLedger};
use super::notifier::Notifier;
use super::skill;

/// A request and its response ledger, mutated together or not at all. The
/// wrapping Mutex is the single-writer serialization point per request id;
/// racing responders for the last spot resolve deterministically under it.
struct RequestEntry {
    request: GameRequest,
    ledger: ResponseLedger,
}

/// Drives requests through open -> filled/cancelled, admits or queues
/// responses, and emits one notification event per state change.
#[derive(Clone)]
pub struct FulfillmentEngine {
    requests: Arc<RwLock<HashMap<Uuid, Arc<Mutex<RequestEntry>>>>>,
    resolver: EligibilityResolver,
    directory: Arc<dyn PlayerDirectory>,
    notifier: Arc<dyn Notifier>,
    max_spots: u32,
}

impl FulfillmentEngine {
    pub fn new(
        directory: Arc<dyn PlayerDirectory>,
        notifier: Arc<dyn Notifier>,
        max_spots: u32,
    ) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            resolver: EligibilityResolver::new(directory.clone()),
            directory,
            notifier,
            max_spots,
        }
    }

    pub async fn create_request(
        &self,
        organizer_id: Uuid,
        body: CreateRequestBody,
    ) -> AppResult<GameRequest> {
        if body.spots_needed < 1 || body.spots_needed > self.max_spots {
            return Err(AppError::BadRequest(format!(
                "spotsNeeded must be between 1 and {}",
                self.max_spots
            )));
        }
        if let (Some(min), Some(max)) = (body.skill_min, body.skill_max) {
            if min > max {
                return Err(AppError::BadRequest(
                    "skillMin must not exceed skillMax".into(),
                ));
            }
        }

        let now = Utc::now();
        let request = GameRequest {
            id: Uuid::new_v4(),
            organizer_id,
            date_time: body.date_time,
            club: body.club,
            court: body.court,
            spots_needed: body.spots_needed,
            spots_filled: 0,
            skill_min: body.skill_min,
            skill_max: body.skill_max,
            mode: body.mode,
            audience: body.audience,
            target_crew_ids: body.target_crew_ids,
            status: RequestStatus::Open,
            notes: body.notes,
            created_at: now,
            updated_at: now,
        };

        let recipients: Vec<Uuid> = self
            .resolver
            .eligible_players(&request)
            .into_iter()
            .filter(|&id| id != organizer_id && self.should_notify(&request, id))
            .collect();

        let mut requests = self.requests.write().await;
        requests.insert(
            request.id,
            Arc::new(Mutex::new(RequestEntry {
                request: request.clone(),
                ledger: ResponseLedger::new(),
            })),
        );
        drop(requests);

        tracing::info!(request_id = %request.id, club = %request.club, "request created");
        self.notifier
            .publish(event(&request, EventKind::RequestOpened, recipients));

        Ok(request)
    }

    pub async fn respond(&self, request_id: Uuid, player_id: Uuid) -> AppResult<GameResponse> {
        let entry = self.entry(request_id).await?;
        let mut entry = entry.lock().await;

        // Idempotency before any gating: a retried tap returns the original
        // row even if the request has since filled or been cancelled.
        if let Some(existing) = entry.ledger.for_player(player_id) {
            return Ok(existing.clone());
        }

        if player_id == entry.request.organizer_id {
            return Err(AppError::BadRequest(
                "Cannot respond to your own request".into(),
            ));
        }
        if entry.request.status == RequestStatus::Cancelled {
            return Err(AppError::RequestClosed("Request was cancelled".into()));
        }
        if entry.request.mode == FillMode::OrganizerPicks && !entry.request.is_open() {
            return Err(AppError::RequestClosed("Request is no longer open".into()));
        }

        if !self.resolver.is_eligible(&entry.request, player_id) {
            return Err(AppError::NotEligible(
                "You are not in this request's audience".into(),
            ));
        }
        let rating = self
            .directory
            .player(player_id)
            .and_then(|p| p.skill_rating);
        if !skill::within_skill_range(&entry.request, rating) {
            return Err(AppError::SkillMismatch(
                "Your rating is outside this request's skill range".into(),
            ));
        }

        let (response, kind, recipients) = match entry.request.mode {
            FillMode::QuickFill => {
                if entry.request.is_open() && entry.request.has_capacity() {
                    let response = record(&mut entry.ledger, request_id, player_id, ResponseStatus::Confirmed);
                    entry.request.spots_filled += 1;
                    if !entry.request.has_capacity() {
                        entry.request.status = RequestStatus::Filled;
                        entry.ledger.pass_all_interested();
                        tracing::info!(request_id = %request_id, "request filled");
                    }
                    let organizer = entry.request.organizer_id;
                    (
                        response,
                        EventKind::PlayerConfirmed { player_id },
                        vec![organizer, player_id],
                    )
                } else {
                    // Race lost or already full: the attempt is still recorded
                    // so the caller gets a definitive "game is full" answer.
                    let response = record(&mut entry.ledger, request_id, player_id, ResponseStatus::Passed);
                    (response, EventKind::PlayerPassed { player_id }, vec![player_id])
                }
            }
            FillMode::OrganizerPicks => {
                let response = record(&mut entry.ledger, request_id, player_id, ResponseStatus::Interested);
                let organizer = entry.request.organizer_id;
                (
                    response,
                    EventKind::PlayerInterested { player_id },
                    vec![organizer],
                )
            }
        };

        debug_assert_eq!(
            entry.ledger.count_confirmed() as u32,
            entry.request.spots_filled
        );
        entry.request.updated_at = Utc::now();
        self.notifier.publish(event(&entry.request, kind, recipients));
        Ok(response)
    }

    pub async fn update_response(
        &self,
        request_id: Uuid,
        response_id: Uuid,
        caller_id: Uuid,
        new_status: ResponseStatus,
    ) -> AppResult<GameResponse> {
        let entry = self.entry(request_id).await?;
        let mut entry = entry.lock().await;

        if caller_id != entry.request.organizer_id {
            return Err(AppError::NotOrganizer);
        }
        if new_status == ResponseStatus::Interested {
            return Err(AppError::BadRequest(
                "Status must be confirmed or passed".into(),
            ));
        }

        let current = entry
            .ledger
            .get(response_id)
            .ok_or_else(|| AppError::NotFound("Response not found".into()))?;
        let player_id = current.player_id;
        let current_status = current.status;

        // Capacity is checked before response mutability so confirming into a
        // full game reports the real problem.
        if new_status == ResponseStatus::Confirmed && !entry.request.has_capacity() {
            return Err(AppError::CapacityExceeded);
        }
        if entry.request.status == RequestStatus::Cancelled {
            return Err(AppError::RequestClosed("Request was cancelled".into()));
        }
        if current_status != ResponseStatus::Interested {
            return Err(AppError::InvalidResponseState(
                "Only interested responses can be updated".into(),
            ));
        }

        let response = match entry.ledger.resolve(response_id, new_status) {
            Some(r) => r,
            None => return Err(AppError::NotFound("Response not found".into())),
        };

        let kind = match new_status {
            ResponseStatus::Confirmed => {
                entry.request.spots_filled += 1;
                if !entry.request.has_capacity() {
                    entry.request.status = RequestStatus::Filled;
                    entry.ledger.pass_all_interested();
                    tracing::info!(request_id = %request_id, "request filled");
                }
                EventKind::PlayerConfirmed { player_id }
            }
            ResponseStatus::Passed => EventKind::PlayerPassed { player_id },
            ResponseStatus::Interested => unreachable!("rejected above"),
        };

        debug_assert_eq!(
            entry.ledger.count_confirmed() as u32,
            entry.request.spots_filled
        );
        entry.request.updated_at = Utc::now();
        self.notifier
            .publish(event(&entry.request, kind, vec![player_id]));
        Ok(response)
    }

    pub async fn cancel(&self, request_id: Uuid, caller_id: Uuid) -> AppResult<GameRequest> {
        let entry = self.entry(request_id).await?;
        let mut entry = entry.lock().await;

        if caller_id != entry.request.organizer_id {
            return Err(AppError::NotOrganizer);
        }
        if !entry.request.is_open() {
            return Err(AppError::RequestClosed("Request is no longer open".into()));
        }

        entry.request.status = RequestStatus::Cancelled;
        entry.request.updated_at = Utc::now();

        // Response rows keep the status they had at cancellation time.
        let recipients: Vec<Uuid> = [ResponseStatus::Interested, ResponseStatus::Confirmed]
            .into_iter()
            .flat_map(|s| entry.ledger.list_by_status(s))
            .map(|r| r.player_id)
            .collect();

        tracing::info!(request_id = %request_id, "request cancelled");
        self.notifier
            .publish(event(&entry.request, EventKind::RequestCancelled, recipients));
        Ok(entry.request.clone())
    }

    pub async fn expand_audience(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
        new_audience: Audience,
    ) -> AppResult<GameRequest> {
        let entry = self.entry(request_id).await?;
        let mut entry = entry.lock().await;

        if caller_id != entry.request.organizer_id {
            return Err(AppError::NotOrganizer);
        }
        if !entry.request.is_open() {
            return Err(AppError::RequestClosed("Request is no longer open".into()));
        }
        if new_audience <= entry.request.audience {
            return Err(AppError::InvalidTransition(format!(
                "Audience can only escalate, {:?} does not widen {:?}",
                new_audience, entry.request.audience
            )));
        }

        entry.request.audience = new_audience;
        entry.request.updated_at = Utc::now();

        // Existing responses are untouched; only newly reachable players are
        // told about the request.
        let organizer = entry.request.organizer_id;
        let recipients: Vec<Uuid> = self
            .resolver
            .eligible_players(&entry.request)
            .into_iter()
            .filter(|&id| {
                id != organizer
                    && entry.ledger.for_player(id).is_none()
                    && self.should_notify(&entry.request, id)
            })
            .collect();

        self.notifier.publish(event(
            &entry.request,
            EventKind::AudienceExpanded {
                audience: new_audience,
            },
            recipients,
        ));
        Ok(entry.request.clone())
    }

    pub async fn get_request(&self, request_id: Uuid, viewer_id: Uuid) -> AppResult<RequestDetail> {
        let entry = self.entry(request_id).await?;
        let entry = entry.lock().await;

        let responses = (viewer_id == entry.request.organizer_id)
            .then(|| entry.ledger.all().to_vec());
        Ok(RequestDetail {
            organizer: self.organizer_public(&entry.request),
            my_response: entry.ledger.for_player(viewer_id).cloned(),
            responses,
            request: entry.request.clone(),
        })
    }

    /// Open, future-dated requests the viewer may see, soonest first.
    pub async fn list_open(&self, viewer_id: Uuid) -> Vec<RequestDetail> {
        let entries: Vec<Arc<Mutex<RequestEntry>>> = {
            let requests = self.requests.read().await;
            requests.values().cloned().collect()
        };

        let viewer = self.directory.player(viewer_id);
        let viewer_visibility = viewer
            .as_ref()
            .map(|p| p.visibility)
            .unwrap_or(Visibility::Everyone);
        let now = Utc::now();

        let mut visible = Vec::new();
        for entry in entries {
            let entry = entry.lock().await;
            let request = &entry.request;
            if !request.is_open() || request.date_time <= now {
                continue;
            }

            let own = request.organizer_id == viewer_id;
            let included = own
                || match viewer_visibility {
                    Visibility::Hidden => false,
                    Visibility::CrewsOnly => {
                        request.audience == Audience::Crews && {
                            let my_crews = self.directory.crews_of(viewer_id);
                            request
                                .target_crew_ids
                                .iter()
                                .any(|cid| my_crews.contains(cid))
                        }
                    }
                    Visibility::Everyone => self.resolver.is_eligible(request, viewer_id),
                };
            if !included {
                continue;
            }

            visible.push(RequestDetail {
                organizer: self.organizer_public(request),
                my_response: entry.ledger.for_player(viewer_id).cloned(),
                responses: None,
                request: request.clone(),
            });
        }

        visible.sort_by_key(|d| d.request.date_time);
        visible
    }

    pub async fn tracked_requests(&self) -> usize {
        self.requests.read().await.len()
    }

    fn organizer_public(&self, request: &GameRequest) -> Option<PlayerPublic> {
        self.directory
            .player(request.organizer_id)
            .as_ref()
            .map(PlayerPublic::from)
    }

    async fn entry(&self, request_id: Uuid) -> AppResult<Arc<Mutex<RequestEntry>>> {
        let requests = self.requests.read().await;
        requests
            .get(&request_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Request not found".into()))
    }

    /// Whether a player should receive fan-out for this request. Hidden
    /// players are never notified; crews-only players only through a target
    /// crew; everyone gets the skill range applied as a courtesy filter.
    fn should_notify(&self, request: &GameRequest, player_id: Uuid) -> bool {
        let Some(player) = self.directory.player(player_id) else {
            return false;
        };
        let in_range = skill::within_skill_range(request, player.skill_rating);
        match player.visibility {
            Visibility::Hidden => false,
            Visibility::CrewsOnly => {
                in_range
                    && request.audience == Audience::Crews
                    && request.target_crew_ids.iter().any(|cid| {
                        self.directory
                            .crew(*cid)
                            .is_some_and(|c| c.has_member(player_id))
                    })
            }
            Visibility::Everyone => in_range,
        }
    }
}

fn record(
    ledger: &mut ResponseLedger,
    request_id: Uuid,
    player_id: Uuid,
    status: ResponseStatus,
) -> GameResponse {
    match ledger.record(request_id, player_id, status) {
        Recorded::Inserted(r) | Recorded::Existing(r) => r,
    }
}

fn event(request: &GameRequest, kind: EventKind, recipients: Vec<Uuid>) -> NotificationEvent {
    NotificationEvent {
        request_id: request.id,
        club: request.club.clone(),
        date_time: request.date_time,
        kind,
        recipients,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::models::crew::{Crew, CrewKind};
    use crate::models::player::Player;
    use crate::services::notifier::RecordingNotifier;
    use chrono::Duration;
    use std::collections::HashSet;

    struct Fixture {
        engine: FulfillmentEngine,
        directory: Arc<InMemoryDirectory>,
        notifier: Arc<RecordingNotifier>,
        organizer: Uuid,
        crew_id: Uuid,
        players: Vec<Uuid>,
    }

    fn player(name: &str, rating: Option<i32>) -> Player {
        Player {
            id: Uuid::new_v4(),
            name: name.into(),
            home_club: Some("Riverside Racquet".into()),
            other_clubs: vec![],
            skill_rating: rating,
            skill_verified: rating.is_some(),
            visibility: Visibility::Everyone,
        }
    }

    /// Organizer plus three crew-mates at the same club.
    fn fixture() -> Fixture {
        let directory = Arc::new(InMemoryDirectory::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let organizer = player("Org", Some(35));
        let a = player("A", Some(30));
        let b = player("B", Some(40));
        let c = player("C", None);
        let players = vec![a.id, b.id, c.id];

        let mut member_ids: HashSet<Uuid> = players.iter().copied().collect();
        member_ids.insert(organizer.id);
        let crew = Crew {
            id: Uuid::new_v4(),
            name: "Regulars".into(),
            created_by: organizer.id,
            kind: CrewKind::InviteOnly,
            member_ids,
        };

        let organizer_id = organizer.id;
        for p in [organizer, a, b, c] {
            directory.upsert_player(p);
        }
        let crew_id = crew.id;
        directory.upsert_crew(crew);

        let engine = FulfillmentEngine::new(directory.clone(), notifier.clone(), 3);
        Fixture {
            engine,
            directory,
            notifier,
            organizer: organizer_id,
            crew_id,
            players,
        }
    }

    fn body(fx: &Fixture, spots: u32, mode: FillMode) -> CreateRequestBody {
        CreateRequestBody {
            date_time: Utc::now() + Duration::hours(6),
            club: "Riverside Racquet".into(),
            court: None,
            spots_needed: spots,
            skill_min: None,
            skill_max: None,
            mode,
            audience: Audience::Crews,
            target_crew_ids: vec![fx.crew_id],
            notes: None,
        }
    }

    #[tokio::test]
    async fn quick_fill_confirms_until_capacity_then_passes() {
        let fx = fixture();
        let request = fx
            .engine
            .create_request(fx.organizer, body(&fx, 2, FillMode::QuickFill))
            .await
            .unwrap();

        let r1 = fx.engine.respond(request.id, fx.players[0]).await.unwrap();
        let r2 = fx.engine.respond(request.id, fx.players[1]).await.unwrap();
        let r3 = fx.engine.respond(request.id, fx.players[2]).await.unwrap();

        assert_eq!(r1.status, ResponseStatus::Confirmed);
        assert_eq!(r2.status, ResponseStatus::Confirmed);
        assert_eq!(r3.status, ResponseStatus::Passed);

        let detail = fx.engine.get_request(request.id, fx.organizer).await.unwrap();
        assert_eq!(detail.request.status, RequestStatus::Filled);
        assert_eq!(detail.request.spots_filled, 2);
    }

    #[tokio::test]
    async fn quick_fill_race_resolves_exactly_one_winner() {
        let fx = fixture();
        let request = fx
            .engine
            .create_request(fx.organizer, body(&fx, 1, FillMode::QuickFill))
            .await
            .unwrap();

        let e1 = fx.engine.clone();
        let e2 = fx.engine.clone();
        let (p1, p2) = (fx.players[0], fx.players[1]);
        let id = request.id;
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { e1.respond(id, p1).await }),
            tokio::spawn(async move { e2.respond(id, p2).await }),
        );
        let r1 = r1.unwrap().unwrap();
        let r2 = r2.unwrap().unwrap();

        let statuses = [r1.status, r2.status];
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == ResponseStatus::Confirmed)
                .count(),
            1
        );
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == ResponseStatus::Passed)
                .count(),
            1
        );

        let detail = fx.engine.get_request(id, fx.organizer).await.unwrap();
        assert_eq!(detail.request.status, RequestStatus::Filled);
        assert_eq!(detail.request.spots_filled, 1);
        let confirmed = detail
            .responses
            .unwrap()
            .iter()
            .filter(|r| r.status == ResponseStatus::Confirmed)
            .count();
        assert_eq!(confirmed as u32, detail.request.spots_filled);
    }

    #[tokio::test]
    async fn respond_is_idempotent() {
        let fx = fixture();
        let request = fx
            .engine
            .create_request(fx.organizer, body(&fx, 2, FillMode::QuickFill))
            .await
            .unwrap();

        let first = fx.engine.respond(request.id, fx.players[0]).await.unwrap();
        let second = fx.engine.respond(request.id, fx.players[0]).await.unwrap();

        assert_eq!(first.id, second.id);
        let detail = fx.engine.get_request(request.id, fx.organizer).await.unwrap();
        assert_eq!(detail.request.spots_filled, 1);

        // Only one confirmation event went out.
        let confirms = fx
            .notifier
            .events()
            .iter()
            .filter(|e| matches!(e.kind, EventKind::PlayerConfirmed { .. }))
            .count();
        assert_eq!(confirms, 1);
    }

    #[tokio::test]
    async fn respond_gates_on_eligibility_and_skill() {
        let fx = fixture();
        let outsider = player("Out", Some(30));
        fx.directory.upsert_player(outsider.clone());

        let mut b = body(&fx, 2, FillMode::QuickFill);
        b.skill_min = Some(20);
        b.skill_max = Some(50);
        let request = fx.engine.create_request(fx.organizer, b).await.unwrap();

        let err = fx.engine.respond(request.id, outsider.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotEligible(_)));

        let hotshot = player("Hot", Some(55));
        fx.directory.upsert_player(hotshot.clone());
        let mut crew = fx.directory.crew(fx.crew_id).unwrap();
        crew.member_ids.insert(hotshot.id);
        fx.directory.upsert_crew(crew);

        let err = fx.engine.respond(request.id, hotshot.id).await.unwrap_err();
        assert!(matches!(err, AppError::SkillMismatch(_)));

        // Unrated crew member is never skill-filtered.
        let unrated = fx.players[2];
        let ok = fx.engine.respond(request.id, unrated).await.unwrap();
        assert_eq!(ok.status, ResponseStatus::Confirmed);
    }

    #[tokio::test]
    async fn organizer_picks_flow_and_capacity_exceeded() {
        let fx = fixture();
        let request = fx
            .engine
            .create_request(fx.organizer, body(&fx, 2, FillMode::OrganizerPicks))
            .await
            .unwrap();

        let mut responses = Vec::new();
        for p in &fx.players {
            let r = fx.engine.respond(request.id, *p).await.unwrap();
            assert_eq!(r.status, ResponseStatus::Interested);
            responses.push(r);
        }
        let detail = fx.engine.get_request(request.id, fx.organizer).await.unwrap();
        assert_eq!(detail.request.spots_filled, 0);

        let a = fx
            .engine
            .update_response(
                request.id,
                responses[0].id,
                fx.organizer,
                ResponseStatus::Confirmed,
            )
            .await
            .unwrap();
        assert_eq!(a.status, ResponseStatus::Confirmed);

        let b = fx
            .engine
            .update_response(
                request.id,
                responses[1].id,
                fx.organizer,
                ResponseStatus::Confirmed,
            )
            .await
            .unwrap();
        assert_eq!(b.status, ResponseStatus::Confirmed);

        let detail = fx.engine.get_request(request.id, fx.organizer).await.unwrap();
        assert_eq!(detail.request.status, RequestStatus::Filled);
        assert_eq!(detail.request.spots_filled, 2);

        // C was auto-passed at fill time, but confirming into a full game
        // still reports the capacity problem.
        let err = fx
            .engine
            .update_response(
                request.id,
                responses[2].id,
                fx.organizer,
                ResponseStatus::Confirmed,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded));

        let detail = fx.engine.get_request(request.id, fx.organizer).await.unwrap();
        let c = detail
            .responses
            .unwrap()
            .into_iter()
            .find(|r| r.id == responses[2].id)
            .unwrap();
        assert_eq!(c.status, ResponseStatus::Passed);
        assert!(c.decided_at.is_some());
    }

    #[tokio::test]
    async fn update_response_authorization_and_state_checks() {
        let fx = fixture();
        let request = fx
            .engine
            .create_request(fx.organizer, body(&fx, 2, FillMode::OrganizerPicks))
            .await
            .unwrap();
        let r = fx.engine.respond(request.id, fx.players[0]).await.unwrap();

        let err = fx
            .engine
            .update_response(request.id, r.id, fx.players[1], ResponseStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotOrganizer));

        let err = fx
            .engine
            .update_response(request.id, r.id, fx.organizer, ResponseStatus::Interested)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        fx.engine
            .update_response(request.id, r.id, fx.organizer, ResponseStatus::Passed)
            .await
            .unwrap();
        let err = fx
            .engine
            .update_response(request.id, r.id, fx.organizer, ResponseStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidResponseState(_)));
    }

    #[tokio::test]
    async fn cancel_preserves_history_and_notifies_responders() {
        let fx = fixture();
        let request = fx
            .engine
            .create_request(fx.organizer, body(&fx, 3, FillMode::OrganizerPicks))
            .await
            .unwrap();
        let a = fx.engine.respond(request.id, fx.players[0]).await.unwrap();
        let b = fx.engine.respond(request.id, fx.players[1]).await.unwrap();
        fx.engine
            .update_response(request.id, a.id, fx.organizer, ResponseStatus::Confirmed)
            .await
            .unwrap();

        let err = fx.engine.cancel(request.id, fx.players[0]).await.unwrap_err();
        assert!(matches!(err, AppError::NotOrganizer));

        let cancelled = fx.engine.cancel(request.id, fx.organizer).await.unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);

        let events = fx.notifier.events();
        let cancel_event = events
            .iter()
            .find(|e| e.kind == EventKind::RequestCancelled)
            .unwrap();
        let recipients: HashSet<Uuid> = cancel_event.recipients.iter().copied().collect();
        assert!(recipients.contains(&fx.players[0]));
        assert!(recipients.contains(&fx.players[1]));

        // Statuses as they were at cancellation time.
        let detail = fx.engine.get_request(request.id, fx.organizer).await.unwrap();
        let rows = detail.responses.unwrap();
        assert_eq!(
            rows.iter().find(|r| r.id == a.id).unwrap().status,
            ResponseStatus::Confirmed
        );
        assert_eq!(
            rows.iter().find(|r| r.id == b.id).unwrap().status,
            ResponseStatus::Interested
        );

        let err = fx.engine.respond(request.id, fx.players[2]).await.unwrap_err();
        assert!(matches!(err, AppError::RequestClosed(_)));

        let err = fx.engine.cancel(request.id, fx.organizer).await.unwrap_err();
        assert!(matches!(err, AppError::RequestClosed(_)));
    }

    #[tokio::test]
    async fn audience_expansion_is_monotonic() {
        let fx = fixture();
        let request = fx
            .engine
            .create_request(fx.organizer, body(&fx, 2, FillMode::QuickFill))
            .await
            .unwrap();

        // crews -> regional skips club and is fine
        let widened = fx
            .engine
            .expand_audience(request.id, fx.organizer, Audience::Regional)
            .await
            .unwrap();
        assert_eq!(widened.audience, Audience::Regional);

        let err = fx
            .engine
            .expand_audience(request.id, fx.organizer, Audience::Club)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let err = fx
            .engine
            .expand_audience(request.id, fx.organizer, Audience::Regional)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let err = fx
            .engine
            .expand_audience(request.id, fx.players[0], Audience::Regional)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotOrganizer));
    }

    #[tokio::test]
    async fn expansion_rejected_once_closed() {
        let fx = fixture();
        let request = fx
            .engine
            .create_request(fx.organizer, body(&fx, 1, FillMode::QuickFill))
            .await
            .unwrap();
        fx.engine.respond(request.id, fx.players[0]).await.unwrap();

        let err = fx
            .engine
            .expand_audience(request.id, fx.organizer, Audience::Regional)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RequestClosed(_)));
    }

    #[tokio::test]
    async fn expansion_notifies_only_new_audience() {
        let fx = fixture();
        let newcomer = player("New", None);
        fx.directory.upsert_player(newcomer.clone());

        let request = fx
            .engine
            .create_request(fx.organizer, body(&fx, 2, FillMode::OrganizerPicks))
            .await
            .unwrap();
        fx.engine.respond(request.id, fx.players[0]).await.unwrap();

        fx.engine
            .expand_audience(request.id, fx.organizer, Audience::Club)
            .await
            .unwrap();

        let events = fx.notifier.events();
        let expand_event = events
            .iter()
            .find(|e| matches!(e.kind, EventKind::AudienceExpanded { .. }))
            .unwrap();
        let recipients: HashSet<Uuid> = expand_event.recipients.iter().copied().collect();
        assert!(recipients.contains(&newcomer.id));
        // Players who already responded are not re-notified.
        assert!(!recipients.contains(&fx.players[0]));
        assert!(!recipients.contains(&fx.organizer));
    }

    #[tokio::test]
    async fn create_request_validation() {
        let fx = fixture();

        let mut b = body(&fx, 0, FillMode::QuickFill);
        let err = fx.engine.create_request(fx.organizer, b.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        b.spots_needed = 4;
        let err = fx.engine.create_request(fx.organizer, b.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        b.spots_needed = 2;
        b.skill_min = Some(50);
        b.skill_max = Some(20);
        let err = fx.engine.create_request(fx.organizer, b).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn create_request_fans_out_to_eligible_audience() {
        let fx = fixture();
        let mut hermit = player("Hermit", None);
        hermit.visibility = Visibility::Hidden;
        fx.directory.upsert_player(hermit.clone());
        let mut crew = fx.directory.crew(fx.crew_id).unwrap();
        crew.member_ids.insert(hermit.id);
        fx.directory.upsert_crew(crew);

        let request = fx
            .engine
            .create_request(fx.organizer, body(&fx, 2, FillMode::QuickFill))
            .await
            .unwrap();

        let events = fx.notifier.events();
        let opened = events
            .iter()
            .find(|e| e.kind == EventKind::RequestOpened)
            .unwrap();
        assert_eq!(opened.request_id, request.id);
        let recipients: HashSet<Uuid> = opened.recipients.iter().copied().collect();
        for p in &fx.players {
            assert!(recipients.contains(p));
        }
        assert!(!recipients.contains(&fx.organizer));
        assert!(!recipients.contains(&hermit.id));
    }

    #[tokio::test]
    async fn list_open_scopes_to_viewer() {
        let fx = fixture();
        let mut soon = body(&fx, 2, FillMode::QuickFill);
        soon.date_time = Utc::now() + Duration::hours(2);
        let mut later = body(&fx, 2, FillMode::QuickFill);
        later.date_time = Utc::now() + Duration::hours(8);

        let later_req = fx.engine.create_request(fx.organizer, later).await.unwrap();
        let soon_req = fx.engine.create_request(fx.organizer, soon).await.unwrap();

        // A crew member sees both, soonest first.
        let listed = fx.engine.list_open(fx.players[0]).await;
        let ids: Vec<Uuid> = listed.iter().map(|d| d.request.id).collect();
        assert_eq!(ids, vec![soon_req.id, later_req.id]);

        // A stranger sees neither.
        let stranger = player("Stranger", None);
        fx.directory.upsert_player(stranger.clone());
        assert!(fx.engine.list_open(stranger.id).await.is_empty());

        // A hidden viewer only sees their own requests.
        let mut hermit = player("Hermit", None);
        hermit.visibility = Visibility::Hidden;
        fx.directory.upsert_player(hermit.clone());
        let mut crew = fx.directory.crew(fx.crew_id).unwrap();
        crew.member_ids.insert(hermit.id);
        fx.directory.upsert_crew(crew);
        assert!(fx.engine.list_open(hermit.id).await.is_empty());

        // Cancelled requests drop out of the listing.
        fx.engine.cancel(soon_req.id, fx.organizer).await.unwrap();
        let listed = fx.engine.list_open(fx.players[0]).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].request.id, later_req.id);
        assert!(listed[0].responses.is_none());
    }

    #[tokio::test]
    async fn get_request_embeds_viewer_projection() {
        let fx = fixture();
        let request = fx
            .engine
            .create_request(fx.organizer, body(&fx, 2, FillMode::OrganizerPicks))
            .await
            .unwrap();
        let mine = fx.engine.respond(request.id, fx.players[0]).await.unwrap();

        let as_player = fx
            .engine
            .get_request(request.id, fx.players[0])
            .await
            .unwrap();
        assert_eq!(as_player.my_response.unwrap().id, mine.id);
        assert!(as_player.responses.is_none());

        let as_organizer = fx.engine.get_request(request.id, fx.organizer).await.unwrap();
        assert_eq!(as_organizer.responses.unwrap().len(), 1);
    }
}
