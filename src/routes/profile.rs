use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use validator::Validate;
use crate::models::{BasicPreferenceRequest, LifestylePreferenceRequest, ProfileRequest, UserQuery};
use crate::routes::{error_response, repository_error, validation_error, workflow_error, AppState};
use crate::services::{block_user, unblock_user, CacheKey};

/// Configure profile, preference and block routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Registered ahead of the scope so "block" is not taken for a user id
    cfg.service(
        web::resource("/profile/block/{blocked_id}")
            .route(web::post().to(create_block))
            .route(web::delete().to(remove_block)),
    );
    cfg.service(
        web::scope("/profile/{user_id}")
            .route("", web::get().to(get_profile))
            .route("", web::put().to(put_profile))
            .route("/preferences/basic", web::get().to(get_basic_preference))
            .route("/preferences/basic", web::put().to(put_basic_preference))
            .route("/preferences/lifestyle", web::get().to(get_lifestyle_preference))
            .route("/preferences/lifestyle", web::put().to(put_lifestyle_preference)),
    );
}

fn not_found(what: &str, user_id: &str) -> HttpResponse {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("{} not found", what),
        format!("No {} for user {}", what.to_lowercase(), user_id),
    )
}

/// Scores are symmetric, so one user's edit can reorder anyone's results
async fn invalidate_all_searches(state: &AppState) {
    if let Err(e) = state.cache.invalidate_prefix(CacheKey::SEARCH_PREFIX).await {
        tracing::warn!("Failed to invalidate search cache: {}", e);
    }
}

async fn get_profile(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let user_id = path.into_inner();

    match state.store.get_profile(&user_id).await {
        Ok(Some(profile)) => HttpResponse::Ok().json(profile),
        Ok(None) => not_found("Profile", &user_id),
        Err(e) => repository_error("Failed to fetch profile", &e),
    }
}

/// PUT /api/v1/profile/{user_id}
async fn put_profile(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<ProfileRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let user_id = path.into_inner();
    let profile = req.into_inner().into_profile(&user_id);

    match state.store.upsert_profile(&profile).await {
        Ok(saved) => {
            tracing::info!("Profile saved for {}", user_id);
            invalidate_all_searches(&state).await;
            HttpResponse::Ok().json(saved)
        }
        Err(e) => repository_error("Failed to save profile", &e),
    }
}

async fn get_basic_preference(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let user_id = path.into_inner();

    match state.store.get_basic_preference(&user_id).await {
        Ok(Some(preference)) => HttpResponse::Ok().json(preference),
        Ok(None) => not_found("Basic preference", &user_id),
        Err(e) => repository_error("Failed to fetch basic preference", &e),
    }
}

/// PUT /api/v1/profile/{user_id}/preferences/basic
///
/// Rejects age_min > age_max and budget_min > budget_max.
async fn put_basic_preference(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<BasicPreferenceRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let user_id = path.into_inner();
    let preference = req.into_inner().into_preference(&user_id);

    match state.store.upsert_basic_preference(&preference).await {
        Ok(saved) => {
            tracing::info!("Basic preference saved for {}", user_id);
            invalidate_all_searches(&state).await;
            HttpResponse::Ok().json(saved)
        }
        Err(e) => repository_error("Failed to save basic preference", &e),
    }
}

async fn get_lifestyle_preference(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let user_id = path.into_inner();

    match state.store.get_lifestyle_preference(&user_id).await {
        Ok(Some(preference)) => HttpResponse::Ok().json(preference),
        Ok(None) => not_found("Lifestyle preference", &user_id),
        Err(e) => repository_error("Failed to fetch lifestyle preference", &e),
    }
}

async fn put_lifestyle_preference(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<LifestylePreferenceRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let user_id = path.into_inner();
    let preference = req.into_inner().into_preference(&user_id);

    match state.store.upsert_lifestyle_preference(&preference).await {
        Ok(saved) => {
            tracing::info!("Lifestyle preference saved for {}", user_id);
            invalidate_all_searches(&state).await;
            HttpResponse::Ok().json(saved)
        }
        Err(e) => repository_error("Failed to save lifestyle preference", &e),
    }
}

/// Block a user
///
/// POST /api/v1/profile/block/{blocked_id}?user_id={blocker}
async fn create_block(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<UserQuery>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return validation_error(errors);
    }

    let blocked_id = path.into_inner();

    match block_user(&*state.store, &query.user_id, &blocked_id).await {
        Ok(block) => HttpResponse::Created().json(block),
        Err(e) => workflow_error(&e),
    }
}

/// Lift a block
///
/// DELETE /api/v1/profile/block/{blocked_id}?user_id={blocker}
async fn remove_block(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<UserQuery>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return validation_error(errors);
    }

    let blocked_id = path.into_inner();

    match unblock_user(&*state.store, &query.user_id, &blocked_id).await {
        Ok(removed) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "removed": removed,
        })),
        Err(e) => workflow_error(&e),
    }
}
