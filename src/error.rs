use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited,

    // Fulfillment taxonomy. All client-recoverable; the engine never retries
    // these on the caller's behalf.
    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("Skill mismatch: {0}")]
    SkillMismatch(String),

    #[error("Request closed: {0}")]
    RequestClosed(String),

    #[error("Only the organizer can do this")]
    NotOrganizer,

    #[error("No spots available")]
    CapacityExceeded,

    #[error("Invalid response state: {0}")]
    InvalidResponseState(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    /// Stable machine-readable code, independent of the human message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::RateLimited => "rate_limited",
            AppError::NotEligible(_) => "not_eligible",
            AppError::SkillMismatch(_) => "skill_mismatch",
            AppError::RequestClosed(_) => "request_closed",
            AppError::NotOrganizer => "not_organizer",
            AppError::CapacityExceeded => "capacity_exceeded",
            AppError::InvalidResponseState(_) => "invalid_response_state",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::Jwt(_) => "unauthorized",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotEligible(_) | AppError::NotOrganizer => StatusCode::FORBIDDEN,
            AppError::SkillMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RequestClosed(_)
            | AppError::CapacityExceeded
            | AppError::InvalidResponseState(_)
            | AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
        };

        let message = match &self {
            AppError::Jwt(_) => "Invalid token".to_string(),
            other => other.to_string(),
        };

        let body = json!({ "error": { "code": self.code(), "message": message } });
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
