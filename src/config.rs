use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use crate::models::CriteriaWeights;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub backend: BackendSettings,
    pub supabase: Option<SupabaseSettings>,
    pub database: Option<DatabaseSettings>,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

/// Which datastore serves profiles, preferences and requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Supabase,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub kind: BackendKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseSettings {
    pub url: String,
    pub service_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub tables: TableSettings,
}

fn default_timeout_secs() -> u64 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct TableSettings {
    #[serde(default = "default_profiles_table")]
    pub profiles: String,
    #[serde(default = "default_basic_preferences_table")]
    pub basic_preferences: String,
    #[serde(default = "default_lifestyle_preferences_table")]
    pub lifestyle_preferences: String,
    #[serde(default = "default_match_requests_table")]
    pub match_requests: String,
    #[serde(default = "default_matches_table")]
    pub matches: String,
    #[serde(default = "default_blocks_table")]
    pub blocks: String,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            profiles: default_profiles_table(),
            basic_preferences: default_basic_preferences_table(),
            lifestyle_preferences: default_lifestyle_preferences_table(),
            match_requests: default_match_requests_table(),
            matches: default_matches_table(),
            blocks: default_blocks_table(),
        }
    }
}

fn default_profiles_table() -> String { "profile".to_string() }
fn default_basic_preferences_table() -> String { "basic_preference".to_string() }
fn default_lifestyle_preferences_table() -> String { "lifestyle_preference".to_string() }
fn default_match_requests_table() -> String { "match_request".to_string() }
fn default_matches_table() -> String { "match".to_string() }
fn default_blocks_table() -> String { "block".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub redis_url: Option<String>,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_l1_cache_size")]
    pub l1_cache_size: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: default_cache_ttl(),
            l1_cache_size: default_l1_cache_size(),
        }
    }
}

fn default_cache_ttl() -> u64 { 300 }
fn default_l1_cache_size() -> u64 { 10_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default = "default_candidate_pool_size")]
    pub candidate_pool_size: usize,
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            candidate_pool_size: default_candidate_pool_size(),
            lookup_concurrency: default_lookup_concurrency(),
        }
    }
}

fn default_limit() -> usize { crate::core::matcher::DEFAULT_RESULT_LIMIT }
fn default_max_limit() -> usize { 100 }
fn default_candidate_pool_size() -> usize { crate::core::matcher::DEFAULT_CANDIDATE_POOL_SIZE }
fn default_lookup_concurrency() -> usize { crate::core::matcher::DEFAULT_LOOKUP_CONCURRENCY }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

/// Points awarded per satisfied criterion
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_age_weight")]
    pub age: u32,
    #[serde(default = "default_budget_weight")]
    pub budget: u32,
    #[serde(default = "default_gender_weight")]
    pub gender: u32,
    #[serde(default = "default_sleep_weight")]
    pub sleep: u32,
    #[serde(default = "default_cleanliness_weight")]
    pub cleanliness: u32,
    #[serde(default = "default_habits_weight")]
    pub habits: u32,
    #[serde(default = "default_guests_weight")]
    pub guests: u32,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            age: default_age_weight(),
            budget: default_budget_weight(),
            gender: default_gender_weight(),
            sleep: default_sleep_weight(),
            cleanliness: default_cleanliness_weight(),
            habits: default_habits_weight(),
            guests: default_guests_weight(),
        }
    }
}

impl WeightsConfig {
    pub fn to_criteria(&self) -> CriteriaWeights {
        CriteriaWeights {
            age: self.age,
            budget: self.budget,
            gender: self.gender,
            sleep: self.sleep,
            cleanliness: self.cleanliness,
            habits: self.habits,
            guests: self.guests,
        }
    }
}

fn default_age_weight() -> u32 { 20 }
fn default_budget_weight() -> u32 { 20 }
fn default_gender_weight() -> u32 { 15 }
fn default_sleep_weight() -> u32 { 10 }
fn default_cleanliness_weight() -> u32 { 10 }
fn default_habits_weight() -> u32 { 10 }
fn default_guests_weight() -> u32 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "full".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables prefixed with ROOMIE, e.g. ROOMIE__SERVER__PORT
    /// 5. DATABASE_URL, SUPABASE_URL, SUPABASE_SERVICE_KEY and REDIS_URL
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(environment())
            .build()?;

        let settings: Settings = substitute_env_vars(settings)?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check backend sections, limits and the weight total
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend.kind {
            BackendKind::Supabase if self.supabase.is_none() => Err(ConfigError::Message(
                "backend.kind = \"supabase\" requires a [supabase] section".to_string(),
            )),
            BackendKind::Postgres if self.database.is_none() => Err(ConfigError::Message(
                "backend.kind = \"postgres\" requires a [database] section".to_string(),
            )),
            _ if self.matching.default_limit == 0
                || self.matching.default_limit > self.matching.max_limit =>
            {
                Err(ConfigError::Message(format!(
                    "matching.default_limit must be between 1 and max_limit ({})",
                    self.matching.max_limit
                )))
            }
            _ => match self.scoring.weights.to_criteria().total() {
                None => Err(ConfigError::Message(format!(
                    "scoring.weights must sum to at most {}",
                    u32::MAX
                ))),
                Some(0) => Err(ConfigError::Message(
                    "scoring.weights must not all be zero".to_string(),
                )),
                Some(_) => Ok(()),
            },
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("ROOMIE")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Apply the conventional unprefixed variables on top of the layered config
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("DATABASE_URL", "database.url"),
        ("SUPABASE_URL", "supabase.url"),
        ("SUPABASE_SERVICE_KEY", "supabase.service_key"),
        ("REDIS_URL", "cache.redis_url"),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (var, key) in overrides {
        if let Ok(value) = env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}
