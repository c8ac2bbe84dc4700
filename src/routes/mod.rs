// Route exports
pub mod matches;
pub mod profile;

use actix_web::{error, http::StatusCode, web, HttpRequest, HttpResponse};
use std::sync::Arc;
use crate::core::Matcher;
use crate::models::ErrorResponse;
use crate::services::{CacheManager, Datastore, RepositoryError, WorkflowError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Datastore>,
    pub cache: Arc<CacheManager>,
    pub matcher: Matcher,
    pub default_limit: usize,
    pub max_limit: usize,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(matches::configure)
            .configure(profile::configure),
    );
}

/// JSON error response for payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Query payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// Build an error body with the given status
pub(crate) fn error_response(status: StatusCode, error: &str, message: impl ToString) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: error.to_string(),
        message: message.to_string(),
        status_code: status.as_u16(),
    })
}

pub(crate) fn validation_error(errors: validator::ValidationErrors) -> HttpResponse {
    error_response(StatusCode::BAD_REQUEST, "Validation failed", errors)
}

pub(crate) fn repository_error(context: &str, err: &RepositoryError) -> HttpResponse {
    match err {
        RepositoryError::NotFound(_) => error_response(StatusCode::NOT_FOUND, context, err),
        _ => {
            tracing::error!("{}: {}", context, err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, context, err)
        }
    }
}

pub(crate) fn workflow_error(err: &WorkflowError) -> HttpResponse {
    let status = match err {
        WorkflowError::SelfRequest | WorkflowError::SelfBlock | WorkflowError::InvalidTransition => {
            StatusCode::BAD_REQUEST
        }
        WorkflowError::Forbidden(..) | WorkflowError::Blocked(..) => StatusCode::FORBIDDEN,
        WorkflowError::UnknownUser(_) | WorkflowError::RequestNotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::DuplicateRequest(..)
        | WorkflowError::AlreadyMatched(..)
        | WorkflowError::NotPending(..) => StatusCode::CONFLICT,
        WorkflowError::Repository(inner) => return repository_error("Datastore error", inner),
    };

    let context = match err {
        WorkflowError::SelfBlock => "Block refused",
        _ => "Match request refused",
    };
    error_response(status, context, err)
}

/// Drop every cached search page for the given users
pub(crate) async fn invalidate_searches(cache: &CacheManager, user_ids: &[&str]) {
    for user_id in user_ids {
        let prefix = crate::services::CacheKey::search_prefix(user_id);
        if let Err(e) = cache.invalidate_prefix(&prefix).await {
            tracing::warn!("Failed to invalidate cache for {}: {}", user_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;

    #[test]
    fn test_workflow_error_statuses() {
        let cases = [
            (WorkflowError::SelfRequest, 400),
            (WorkflowError::InvalidTransition, 400),
            (WorkflowError::SelfBlock, 400),
            (WorkflowError::Blocked("a".into(), "b".into()), 403),
            (
                WorkflowError::Forbidden("a".into(), "r".into(), RequestStatus::Accepted),
                403,
            ),
            (WorkflowError::RequestNotFound("r".into()), 404),
            (WorkflowError::UnknownUser("x".into()), 404),
            (WorkflowError::DuplicateRequest("a".into(), "b".into()), 409),
            (WorkflowError::NotPending("r".into(), RequestStatus::Rejected), 409),
            (
                WorkflowError::Repository(RepositoryError::ApiError("boom".into())),
                500,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(workflow_error(&err).status().as_u16(), expected, "{}", err);
        }
    }

    #[test]
    fn test_json_error_status() {
        let err = JsonError {
            error: "invalid_json".to_string(),
            message: "bad".to_string(),
            status_code: 400,
        };
        assert_eq!(error::ResponseError::status_code(&err), StatusCode::BAD_REQUEST);
    }
}
