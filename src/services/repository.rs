//! Datastore ports used by the matcher, the request workflow and the routes.
//!
//! Reads that find nothing return `Ok(None)` or an empty list. Errors are
//! reserved for the datastore itself misbehaving.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use crate::models::{
    BasicPreference, Block, CandidateQuery, LifestylePreference, Match, MatchRequest, Profile,
    RequestStatus, UserSnapshot,
};

/// Errors that can occur when talking to a datastore backend
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Profiles and preference records
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, RepositoryError>;

    async fn get_basic_preference(
        &self,
        user_id: &str,
    ) -> Result<Option<BasicPreference>, RepositoryError>;

    async fn get_lifestyle_preference(
        &self,
        user_id: &str,
    ) -> Result<Option<LifestylePreference>, RepositoryError>;

    /// Profiles satisfying the query's hard constraints, ordered by user id
    async fn search_profiles(&self, query: &CandidateQuery) -> Result<Vec<Profile>, RepositoryError>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, RepositoryError>;

    async fn upsert_basic_preference(
        &self,
        preference: &BasicPreference,
    ) -> Result<BasicPreference, RepositoryError>;

    async fn upsert_lifestyle_preference(
        &self,
        preference: &LifestylePreference,
    ) -> Result<LifestylePreference, RepositoryError>;

    /// Fetch all three records for a user concurrently
    async fn snapshot(&self, user_id: &str) -> Result<UserSnapshot, RepositoryError> {
        let (profile, basic, lifestyle) = tokio::try_join!(
            self.get_profile(user_id),
            self.get_basic_preference(user_id),
            self.get_lifestyle_preference(user_id),
        )?;

        Ok(UserSnapshot { profile, basic, lifestyle })
    }
}

/// Match requests and confirmed matches
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Receivers of the user's still-pending outgoing requests
    async fn pending_receivers(&self, sender_id: &str) -> Result<Vec<String>, RepositoryError>;

    /// Partners in the user's active matches
    async fn match_partners(&self, user_id: &str) -> Result<Vec<String>, RepositoryError>;

    async fn insert_match_request(&self, request: &MatchRequest) -> Result<(), RepositoryError>;

    async fn get_match_request(
        &self,
        request_id: &str,
    ) -> Result<Option<MatchRequest>, RepositoryError>;

    /// Requests the user sent or received, newest first
    async fn requests_for_user(&self, user_id: &str) -> Result<Vec<MatchRequest>, RepositoryError>;

    /// Fails with `NotFound` when no such request exists
    async fn update_request_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<MatchRequest, RepositoryError>;

    async fn insert_match(&self, m: &Match) -> Result<(), RepositoryError>;

    /// Active matches the user is part of, newest first
    async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, RepositoryError>;

    /// Record that `blocker_id` blocks `blocked_id`. Blocking twice keeps the first record.
    async fn block_user(&self, blocker_id: &str, blocked_id: &str) -> Result<Block, RepositoryError>;

    /// Returns whether a block was removed
    async fn unblock_user(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RepositoryError>;

    /// True when `blocker_id` has blocked `blocked_id`; the reverse direction is not consulted
    async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RepositoryError>;
}

/// A complete backend, as injected into the application state
#[async_trait]
pub trait Datastore: UserRepository + MatchRepository {
    fn backend_name(&self) -> &'static str;

    async fn health_check(&self) -> Result<bool, RepositoryError>;
}
