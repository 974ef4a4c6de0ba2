use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::CallerPlayer;
use crate::models::request::{CreateRequestBody, ExpandAudienceBody};
use crate::models::response::UpdateResponseBody;
use crate::AppState;

pub async fn create_request(
    State(state): State<AppState>,
    caller: axum::Extension<CallerPlayer>,
    Json(body): Json<CreateRequestBody>,
) -> AppResult<Json<Value>> {
    let request = state.engine.create_request(caller.id, body).await?;
    Ok(Json(json!({ "request": request })))
}

pub async fn list_requests(
    State(state): State<AppState>,
    caller: axum::Extension<CallerPlayer>,
) -> AppResult<Json<Value>> {
    let requests = state.engine.list_open(caller.id).await;
    Ok(Json(json!({ "requests": requests })))
}

pub async fn get_request(
    State(state): State<AppState>,
    caller: axum::Extension<CallerPlayer>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let detail = state.engine.get_request(id, caller.id).await?;
    Ok(Json(json!({ "request": detail })))
}

pub async fn respond(
    State(state): State<AppState>,
    caller: axum::Extension<CallerPlayer>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let response = state.engine.respond(id, caller.id).await?;
    Ok(Json(json!({ "response": response })))
}

pub async fn update_response(
    State(state): State<AppState>,
    caller: axum::Extension<CallerPlayer>,
    Path((id, response_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateResponseBody>,
) -> AppResult<Json<Value>> {
    let response = state
        .engine
        .update_response(id, response_id, caller.id, body.status)
        .await?;
    Ok(Json(json!({ "response": response })))
}

pub async fn expand_audience(
    State(state): State<AppState>,
    caller: axum::Extension<CallerPlayer>,
    Path(id): Path<Uuid>,
    Json(body): Json<ExpandAudienceBody>,
) -> AppResult<Json<Value>> {
    let request = state
        .engine
        .expand_audience(id, caller.id, body.audience)
        .await?;
    Ok(Json(json!({ "request": request })))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    caller: axum::Extension<CallerPlayer>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let request = state.engine.cancel(id, caller.id).await?;
    Ok(Json(json!({ "request": request })))
}
