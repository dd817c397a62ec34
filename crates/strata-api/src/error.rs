use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, message: msg.into() }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::FORBIDDEN, message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::NOT_FOUND, message: msg.into() }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::CONFLICT, message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: msg.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

/// §7's taxonomy collapsed into one mapping: lease conflicts are `409`,
/// everything else the Store can report is either a client-visible
/// not-found/validation case or an internal failure.
impl From<strata_store::StoreError> for ApiError {
    fn from(e: strata_store::StoreError) -> Self {
        use strata_store::StoreError::*;
        match e {
            NotFound { .. } => ApiError::not_found(e.to_string()),
            LockConflict { .. } => ApiError::conflict(e.to_string()),
            DuplicateDns(_) | ReferentialConstraint(_) => ApiError::bad_request(e.to_string()),
            Serialization(_) | Internal(_) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<strata_supervisor::SupervisorError> for ApiError {
    fn from(e: strata_supervisor::SupervisorError) -> Self {
        use strata_supervisor::SupervisorError::*;
        match e {
            Store(store_err) => store_err.into(),
            Scheduling(_) => ApiError::bad_request(e.to_string()),
            IllegalTransition { .. } => ApiError::bad_request(e.to_string()),
            Driver(_) | Events(_) | Internal(_) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<strata_domain::DomainError> for ApiError {
    fn from(e: strata_domain::DomainError) -> Self {
        use strata_domain::DomainError::*;
        match e {
            ApiLocked | DeletionLocked => ApiError::forbidden(e.to_string()),
            _ => ApiError::bad_request(e.to_string()),
        }
    }
}

impl From<strata_driver::DriverError> for ApiError {
    fn from(e: strata_driver::DriverError) -> Self {
        ApiError::internal(e.to_string())
    }
}

impl From<strata_events::EventsError> for ApiError {
    fn from(e: strata_events::EventsError) -> Self {
        ApiError::internal(e.to_string())
    }
}
