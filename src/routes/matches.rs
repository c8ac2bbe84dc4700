use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::models::{
    FindMatchesResponse, HealthResponse, MatchesResponse, RequestsResponse, RespondToRequest,
    SearchMatchesQuery, SendMatchRequest, UserQuery,
};
use crate::routes::{invalidate_searches, repository_error, validation_error, workflow_error, AppState};
use crate::services::{respond_to_request, send_request, CacheError, CacheKey};

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches/search", web::get().to(search_matches))
        .route("/matches/requests", web::get().to(list_requests))
        .route("/matches/request", web::post().to(create_request))
        .route("/matches/request/{request_id}", web::put().to(update_request))
        .route("/matches", web::get().to(list_matches));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = match state.store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Health check against {} failed: {}", state.store.backend_name(), e);
            false
        }
    };

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        backend: state.store.backend_name().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Ranked roommate candidates
///
/// GET /api/v1/matches/search?user_id={id}&limit={n}
async fn search_matches(
    state: web::Data<AppState>,
    query: web::Query<SearchMatchesQuery>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return validation_error(errors);
    }

    let user_id = &query.user_id;
    let limit = query
        .limit
        .map(usize::from)
        .unwrap_or(state.default_limit)
        .min(state.max_limit);

    let cache_key = CacheKey::search(user_id, limit);
    match state.cache.get::<FindMatchesResponse>(&cache_key).await {
        Ok(cached) => {
            tracing::debug!("Serving cached matches for {}", user_id);
            return HttpResponse::Ok().json(cached);
        }
        Err(CacheError::CacheMiss(_)) => {}
        Err(e) => tracing::warn!("Cache read failed for {}: {}", cache_key, e),
    }

    tracing::info!("Finding matches for user: {}, limit: {}", user_id, limit);

    let generation = state.cache.generation();
    let result = match state.matcher.find_matches(&*state.store, user_id, limit).await {
        Ok(result) => result,
        Err(e) => return repository_error("Failed to find matches", &e),
    };

    let response = FindMatchesResponse {
        matches: result.matches,
        total_candidates: result.total_candidates,
    };

    tracing::info!(
        "Returning {} matches for user {} (from {} candidates)",
        response.matches.len(),
        user_id,
        response.total_candidates
    );

    if let Err(e) = state.cache.set_if_current(&cache_key, &response, generation).await {
        tracing::warn!("Failed to cache matches for {}: {}", user_id, e);
    }

    HttpResponse::Ok().json(response)
}

/// Confirmed matches for a user
///
/// GET /api/v1/matches?user_id={id}
async fn list_matches(
    state: web::Data<AppState>,
    query: web::Query<UserQuery>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return validation_error(errors);
    }

    match state.store.matches_for_user(&query.user_id).await {
        Ok(matches) => HttpResponse::Ok().json(MatchesResponse { matches }),
        Err(e) => repository_error("Failed to fetch matches", &e),
    }
}

/// Requests a user has sent or received
///
/// GET /api/v1/matches/requests?user_id={id}
async fn list_requests(
    state: web::Data<AppState>,
    query: web::Query<UserQuery>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return validation_error(errors);
    }

    match state.store.requests_for_user(&query.user_id).await {
        Ok(requests) => HttpResponse::Ok().json(RequestsResponse { requests }),
        Err(e) => repository_error("Failed to fetch match requests", &e),
    }
}

/// Send a match request
///
/// POST /api/v1/matches/request
///
/// Request body:
/// ```json
/// {
///   "sender_id": "string",
///   "receiver_id": "string",
///   "message": "string"
/// }
/// ```
async fn create_request(
    state: web::Data<AppState>,
    req: web::Json<SendMatchRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let SendMatchRequest { sender_id, receiver_id, message } = req.into_inner();

    match send_request(&*state.store, &sender_id, &receiver_id, message).await {
        Ok(request) => {
            invalidate_searches(&state.cache, &[sender_id.as_str(), receiver_id.as_str()]).await;
            HttpResponse::Created().json(request)
        }
        Err(e) => workflow_error(&e),
    }
}

/// Accept, reject or cancel a request
///
/// PUT /api/v1/matches/request/{request_id}
///
/// Request body:
/// ```json
/// {
///   "user_id": "string",
///   "status": "accepted|rejected|cancelled"
/// }
/// ```
async fn update_request(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<RespondToRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let request_id = path.into_inner();

    match respond_to_request(&*state.store, &state.matcher, &request_id, &req.user_id, req.status).await {
        Ok(response) => {
            invalidate_searches(
                &state.cache,
                &[
                    response.request.sender_id.as_str(),
                    response.request.receiver_id.as_str(),
                ],
            )
            .await;

            HttpResponse::Ok().json(serde_json::json!({
                "request": response.request,
                "match": response.created_match,
            }))
        }
        Err(e) => workflow_error(&e),
    }
}
