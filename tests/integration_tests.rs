// Integration tests for Roommate Match
//
// Drives the HTTP surface end to end against the in-memory datastore.

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;
use roommate_match::core::Matcher;
use roommate_match::models::{FindMatchesResponse, MatchRequest, MatchesResponse, RequestStatus};
use roommate_match::routes::{
    self, handle_json_payload_error, handle_query_payload_error, AppState,
};
use roommate_match::services::{CacheManager, MemoryStore};

fn app_state() -> AppState {
    AppState {
        store: Arc::new(MemoryStore::new()),
        cache: Arc::new(CacheManager::in_memory(1000, 60)),
        matcher: Matcher::default(),
        default_limit: 10,
        max_limit: 100,
    }
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
                .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
                .configure(routes::configure_routes),
        )
        .await
    };
}

fn lifestyle(sleep: &str, guests: &str) -> Value {
    json!({
        "sleep_schedule": sleep,
        "cleanliness": "very_clean",
        "guest_policy": guests,
        "smoking": false,
        "pets": false
    })
}

fn basic(budget_min: u32, budget_max: u32) -> Value {
    json!({
        "gender_preference": "any",
        "age_min": 20,
        "age_max": 30,
        "budget_min": budget_min,
        "budget_max": budget_max
    })
}

/// alice, bob and carol are fully described; erin has only a profile;
/// dave is outside everyone's age window
const SEED: &[(&str, u8, &str)] = &[
    ("alice", 21, "female"),
    ("bob", 22, "male"),
    ("carol", 23, "female"),
    ("dave", 40, "male"),
    ("erin", 25, "female"),
];

macro_rules! put_ok {
    ($app:expr, $uri:expr, $body:expr) => {{
        let req = test::TestRequest::put().uri($uri).set_json($body).to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "PUT {}", $uri);
    }};
}

macro_rules! seed {
    ($app:expr) => {{
        for (id, age, gender) in SEED {
            put_ok!($app, &format!("/api/v1/profile/{}", id), json!({"age": age, "gender": gender}));
        }

        put_ok!($app, "/api/v1/profile/alice/preferences/basic", basic(400, 600));
        put_ok!($app, "/api/v1/profile/alice/preferences/lifestyle", lifestyle("night_owl", "sometimes"));

        put_ok!($app, "/api/v1/profile/bob/preferences/basic", basic(450, 650));
        put_ok!($app, "/api/v1/profile/bob/preferences/lifestyle", lifestyle("night_owl", "often"));

        put_ok!($app, "/api/v1/profile/carol/preferences/basic", basic(400, 600));
        put_ok!($app, "/api/v1/profile/carol/preferences/lifestyle", lifestyle("early_bird", "sometimes"));
    }};
}

/// Candidate ids and scores from a search, plus the candidate count
macro_rules! search_ids {
    ($app:expr, $user:expr) => {{
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/matches/search?user_id={}", $user))
            .to_request();
        let body: FindMatchesResponse = test::call_and_read_body_json(&$app, req).await;

        let ids: Vec<(String, u8)> = body
            .matches
            .iter()
            .map(|m| (m.candidate_id.clone(), m.compatibility_score))
            .collect();
        (ids, body.total_candidates)
    }};
}

#[actix_web::test]
async fn test_integration_search_ranks_candidates() {
    let app = init_app!(app_state());
    seed!(app);

    let (ranked, total) = search_ids!(app, "alice");

    assert_eq!(total, 3);
    assert_eq!(
        ranked,
        vec![
            ("bob".to_string(), 100),
            ("carol".to_string(), 89),
            ("erin".to_string(), 50),
        ]
    );
}

#[actix_web::test]
async fn test_integration_limit_truncates_after_ranking() {
    let app = init_app!(app_state());
    seed!(app);

    let req = test::TestRequest::get()
        .uri("/api/v1/matches/search?user_id=alice&limit=1")
        .to_request();
    let body: FindMatchesResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body.matches.len(), 1);
    assert_eq!(body.matches[0].candidate_id, "bob");
    assert_eq!(body.matches[0].rank, 1);
    assert_eq!(body.total_candidates, 3);
}

#[actix_web::test]
async fn test_integration_default_limit_truncates_large_pool() {
    let app = init_app!(app_state());
    seed!(app);

    // Twelve more profile-only candidates inside alice's age window
    for i in 0..12 {
        put_ok!(app, &format!("/api/v1/profile/extra-{:02}", i), json!({"age": 24, "gender": "male"}));
    }

    let (ranked, total) = search_ids!(app, "alice");

    assert_eq!(total, 15);
    assert_eq!(ranked.len(), 10);
    assert_eq!(ranked[0], ("bob".to_string(), 100));
    assert_eq!(ranked[1], ("carol".to_string(), 89));
    // Neutral scores tie and fall back to id order
    assert_eq!(ranked[2], ("erin".to_string(), 50));
    assert_eq!(ranked[3], ("extra-00".to_string(), 50));
    assert_eq!(ranked[9].0, "extra-06");
}

#[actix_web::test]
async fn test_integration_request_lifecycle() {
    let app = init_app!(app_state());
    seed!(app);

    // Warm the cache so the exclusion below proves invalidation
    search_ids!(app, "alice");

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/request")
        .set_json(json!({"sender_id": "alice", "receiver_id": "bob", "message": "Hi!"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let request: MatchRequest = test::read_body_json(resp).await;
    assert_eq!(request.status, RequestStatus::Pending);

    // Pending receivers are excluded from the sender's search
    let (ranked, _) = search_ids!(app, "alice");
    assert!(ranked.iter().all(|(id, _)| id != "bob"));

    // The reverse direction is a duplicate
    let req = test::TestRequest::post()
        .uri("/api/v1/matches/request")
        .set_json(json!({"sender_id": "bob", "receiver_id": "alice"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    // Only the receiver may accept
    let uri = format!("/api/v1/matches/request/{}", request.request_id);
    let req = test::TestRequest::put()
        .uri(&uri)
        .set_json(json!({"user_id": "alice", "status": "accepted"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
        .uri(&uri)
        .set_json(json!({"user_id": "bob", "status": "accepted"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["request"]["status"], "accepted");
    assert_eq!(body["match"]["user1_id"], "alice");
    assert_eq!(body["match"]["user2_id"], "bob");
    assert_eq!(body["match"]["compatibility_score"], 100);

    let req = test::TestRequest::get()
        .uri("/api/v1/matches?user_id=bob")
        .to_request();
    let matches: MatchesResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(matches.matches.len(), 1);

    // Confirmed partners stay out of each other's results
    let (ranked, _) = search_ids!(app, "bob");
    assert_eq!(
        ranked.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
        vec!["carol", "erin"]
    );

    // Accepting twice is refused
    let req = test::TestRequest::put()
        .uri(&uri)
        .set_json(json!({"user_id": "bob", "status": "rejected"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get()
        .uri("/api/v1/matches/requests?user_id=alice")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["requests"].as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn test_integration_block_refuses_requests() {
    let app = init_app!(app_state());
    seed!(app);

    let req = test::TestRequest::post()
        .uri("/api/v1/profile/block/bob?user_id=alice")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    // Either side of a block is refused
    for (sender, receiver) in [("alice", "bob"), ("bob", "alice")] {
        let req = test::TestRequest::post()
            .uri("/api/v1/matches/request")
            .set_json(json!({"sender_id": sender, "receiver_id": receiver}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    let req = test::TestRequest::delete()
        .uri("/api/v1/profile/block/bob?user_id=alice")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/request")
        .set_json(json!({"sender_id": "bob", "receiver_id": "alice"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
}

#[actix_web::test]
async fn test_integration_preference_update_refreshes_results() {
    let app = init_app!(app_state());
    seed!(app);

    let (before, _) = search_ids!(app, "alice");
    assert_eq!(before[1], ("carol".to_string(), 89));

    put_ok!(app, "/api/v1/profile/carol/preferences/lifestyle", lifestyle("night_owl", "sometimes"));

    let (after, _) = search_ids!(app, "alice");
    assert_eq!(after[0], ("bob".to_string(), 100));
    assert_eq!(after[1], ("carol".to_string(), 100));
}

#[actix_web::test]
async fn test_integration_bad_input() {
    let app = init_app!(app_state());

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/request")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_json");

    let req = test::TestRequest::get()
        .uri("/api/v1/matches/search?limit=5")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/request")
        .set_json(json!({"sender_id": "alice", "receiver_id": "alice"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/request")
        .set_json(json!({"sender_id": "alice", "receiver_id": "ghost"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_integration_health() {
    let app = init_app!(app_state());

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
