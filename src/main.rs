use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use roommate_match::config::{BackendKind, LoggingSettings, Settings};
use roommate_match::core::Matcher;
use roommate_match::routes::{self, handle_json_payload_error, handle_query_payload_error, AppState};
use roommate_match::services::{
    CacheManager, Datastore, MemoryStore, PostgresClient, RepositoryError, SupabaseClient,
    SupabaseTables,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match logging.format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "compact" => subscriber.compact().init(),
        _ => subscriber.init(),
    }
}

async fn connect_store(settings: &Settings) -> Result<Arc<dyn Datastore>, RepositoryError> {
    match settings.backend.kind {
        BackendKind::Supabase => {
            let supabase = settings.supabase.as_ref().ok_or_else(|| {
                RepositoryError::ApiError("missing [supabase] settings".to_string())
            })?;

            let tables = SupabaseTables {
                profiles: supabase.tables.profiles.clone(),
                basic_preferences: supabase.tables.basic_preferences.clone(),
                lifestyle_preferences: supabase.tables.lifestyle_preferences.clone(),
                match_requests: supabase.tables.match_requests.clone(),
                matches: supabase.tables.matches.clone(),
                blocks: supabase.tables.blocks.clone(),
            };

            let client = SupabaseClient::new(
                supabase.url.clone(),
                supabase.service_key.clone(),
                tables,
                supabase.timeout_secs,
            )?;
            info!("Supabase client initialized ({})", supabase.url);
            Ok(Arc::new(client))
        }
        BackendKind::Postgres => {
            let database = settings.database.as_ref().ok_or_else(|| {
                RepositoryError::ApiError("missing [database] settings".to_string())
            })?;

            let client = PostgresClient::from_settings(
                &database.url,
                database.max_connections,
                database.min_connections,
                database.acquire_timeout_secs,
                database.idle_timeout_secs,
            )
            .await?;
            info!(
                "PostgreSQL client initialized (max: {} connections)",
                database.max_connections.unwrap_or(10)
            );
            Ok(Arc::new(client))
        }
        BackendKind::Memory => {
            warn!("Using the in-memory datastore; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn connect_cache(settings: &Settings) -> Arc<CacheManager> {
    let cache = &settings.cache;

    let manager = match &cache.redis_url {
        Some(url) => match CacheManager::new(url, cache.l1_cache_size, cache.ttl_secs).await {
            Ok(manager) => manager,
            Err(e) => {
                warn!("Failed to connect to Redis ({}), using in-process cache only", e);
                CacheManager::in_memory(cache.l1_cache_size, cache.ttl_secs)
            }
        },
        None => CacheManager::in_memory(cache.l1_cache_size, cache.ttl_secs),
    };

    let stats = manager.stats();
    info!(
        "Cache manager initialized (L1: {} entries, L2: {}, TTL: {}s)",
        cache.l1_cache_size, stats.l2_enabled, stats.ttl_secs
    );

    Arc::new(manager)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(&LoggingSettings::default());
            error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_tracing(&settings.logging);

    info!("Starting roommate matching service...");

    let store = connect_store(&settings).await.map_err(|e| {
        error!("Failed to initialize {:?} backend: {}", settings.backend.kind, e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    let cache = connect_cache(&settings).await;

    let weights = settings.scoring.weights.to_criteria();
    let matcher = Matcher::new(
        weights,
        settings.matching.candidate_pool_size,
        settings.matching.lookup_concurrency,
    );

    info!("Matcher initialized with weights: {:?}", weights);

    let app_state = AppState {
        store,
        cache,
        matcher,
        default_limit: settings.matching.default_limit,
        max_limit: settings.matching.max_limit,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
