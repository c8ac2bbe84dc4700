use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use crate::core::filters::matches_candidate_query;
use crate::models::{
    BasicPreference, Block, CandidateQuery, LifestylePreference, Match, MatchRequest, MatchStatus,
    Profile, RequestStatus,
};
use crate::services::repository::{Datastore, MatchRepository, RepositoryError, UserRepository};

#[derive(Debug, Default)]
struct Tables {
    profiles: BTreeMap<String, Profile>,
    basic: BTreeMap<String, BasicPreference>,
    lifestyle: BTreeMap<String, LifestylePreference>,
    requests: Vec<MatchRequest>,
    matches: Vec<Match>,
    blocks: Vec<Block>,
}

/// In-process datastore for local development and tests
///
/// Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, RepositoryError> {
        Ok(self.tables.read().await.profiles.get(user_id).cloned())
    }

    async fn get_basic_preference(
        &self,
        user_id: &str,
    ) -> Result<Option<BasicPreference>, RepositoryError> {
        Ok(self.tables.read().await.basic.get(user_id).cloned())
    }

    async fn get_lifestyle_preference(
        &self,
        user_id: &str,
    ) -> Result<Option<LifestylePreference>, RepositoryError> {
        Ok(self.tables.read().await.lifestyle.get(user_id).cloned())
    }

    async fn search_profiles(&self, query: &CandidateQuery) -> Result<Vec<Profile>, RepositoryError> {
        let tables = self.tables.read().await;

        // BTreeMap iteration is already ordered by user id
        Ok(tables
            .profiles
            .values()
            .filter(|profile| matches_candidate_query(profile, query))
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, RepositoryError> {
        self.tables
            .write()
            .await
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(profile.clone())
    }

    async fn upsert_basic_preference(
        &self,
        preference: &BasicPreference,
    ) -> Result<BasicPreference, RepositoryError> {
        self.tables
            .write()
            .await
            .basic
            .insert(preference.user_id.clone(), preference.clone());
        Ok(preference.clone())
    }

    async fn upsert_lifestyle_preference(
        &self,
        preference: &LifestylePreference,
    ) -> Result<LifestylePreference, RepositoryError> {
        self.tables
            .write()
            .await
            .lifestyle
            .insert(preference.user_id.clone(), preference.clone());
        Ok(preference.clone())
    }
}

#[async_trait]
impl MatchRepository for MemoryStore {
    async fn pending_receivers(&self, sender_id: &str) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .requests
            .iter()
            .filter(|r| r.sender_id == sender_id && r.status == RequestStatus::Pending)
            .map(|r| r.receiver_id.clone())
            .collect())
    }

    async fn match_partners(&self, user_id: &str) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .matches
            .iter()
            .filter(|m| m.status == MatchStatus::Active)
            .filter_map(|m| m.partner_of(user_id).map(str::to_string))
            .collect())
    }

    async fn insert_match_request(&self, request: &MatchRequest) -> Result<(), RepositoryError> {
        self.tables.write().await.requests.push(request.clone());
        Ok(())
    }

    async fn get_match_request(
        &self,
        request_id: &str,
    ) -> Result<Option<MatchRequest>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .requests
            .iter()
            .find(|r| r.request_id == request_id)
            .cloned())
    }

    async fn requests_for_user(&self, user_id: &str) -> Result<Vec<MatchRequest>, RepositoryError> {
        let mut requests: Vec<MatchRequest> = self
            .tables
            .read()
            .await
            .requests
            .iter()
            .filter(|r| r.involves(user_id))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn update_request_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<MatchRequest, RepositoryError> {
        let mut tables = self.tables.write().await;
        let request = tables
            .requests
            .iter_mut()
            .find(|r| r.request_id == request_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Match request {}", request_id)))?;

        request.status = status;
        request.updated_at = updated_at;
        Ok(request.clone())
    }

    async fn insert_match(&self, m: &Match) -> Result<(), RepositoryError> {
        self.tables.write().await.matches.push(m.clone());
        Ok(())
    }

    async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, RepositoryError> {
        let mut matches: Vec<Match> = self
            .tables
            .read()
            .await
            .matches
            .iter()
            .filter(|m| m.status == MatchStatus::Active && m.partner_of(user_id).is_some())
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.matched_at.cmp(&a.matched_at));
        Ok(matches)
    }

    async fn block_user(&self, blocker_id: &str, blocked_id: &str) -> Result<Block, RepositoryError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .blocks
            .iter()
            .find(|b| b.blocker_id == blocker_id && b.blocked_id == blocked_id)
        {
            return Ok(existing.clone());
        }

        let block = Block::new(blocker_id, blocked_id);
        tables.blocks.push(block.clone());
        Ok(block)
    }

    async fn unblock_user(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let before = tables.blocks.len();
        tables
            .blocks
            .retain(|b| !(b.blocker_id == blocker_id && b.blocked_id == blocked_id));
        Ok(tables.blocks.len() < before)
    }

    async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .blocks
            .iter()
            .any(|b| b.blocker_id == blocker_id && b.blocked_id == blocked_id))
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<bool, RepositoryError> {
        Ok(true)
    }
}
