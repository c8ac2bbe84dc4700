use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use crate::models::{
    BasicPreference, Block, CandidateQuery, LifestylePreference, Match, MatchRequest, Profile,
    RequestStatus,
};
use crate::services::repository::{Datastore, MatchRepository, RepositoryError, UserRepository};

/// Table names in the hosted database
#[derive(Debug, Clone)]
pub struct SupabaseTables {
    pub profiles: String,
    pub basic_preferences: String,
    pub lifestyle_preferences: String,
    pub match_requests: String,
    pub matches: String,
    pub blocks: String,
}

impl Default for SupabaseTables {
    fn default() -> Self {
        Self {
            profiles: "profile".to_string(),
            basic_preferences: "basic_preference".to_string(),
            lifestyle_preferences: "lifestyle_preference".to_string(),
            match_requests: "match_request".to_string(),
            matches: "match".to_string(),
            blocks: "block".to_string(),
        }
    }
}

/// Supabase REST (PostgREST) client
///
/// Handles all communication with the hosted database including:
/// - Reading and upserting profiles and preferences
/// - Searching candidate profiles
/// - Recording match requests and confirmed matches
/// - Recording and lifting blocks
pub struct SupabaseClient {
    base_url: String,
    service_key: String,
    client: Client,
    tables: SupabaseTables,
}

impl SupabaseClient {
    /// Create a new Supabase client
    pub fn new(
        base_url: String,
        service_key: String,
        tables: SupabaseTables,
        timeout_secs: u64,
    ) -> Result<Self, RepositoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            service_key,
            client,
            tables,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// GET rows matching the given PostgREST filters
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(String, String)],
    ) -> Result<Vec<T>, RepositoryError> {
        tracing::debug!("Selecting from {} with {:?}", table, filters);

        let response = self
            .authorized(self.client.get(self.table_url(table)))
            .query(&[("select", "*")])
            .query(filters)
            .send()
            .await?;

        parse_rows(response, table).await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<T>, RepositoryError> {
        let filters = [(column.to_string(), eq(value)), ("limit".to_string(), "1".to_string())];
        Ok(self.select(table, &filters).await?.into_iter().next())
    }

    /// POST a row, merging on `on_conflict` when given
    async fn insert<T, B>(
        &self,
        table: &str,
        body: &B,
        on_conflict: Option<&str>,
    ) -> Result<Vec<T>, RepositoryError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut builder = self.authorized(self.client.post(self.table_url(table)));
        let prefer = match on_conflict {
            Some(column) => {
                builder = builder.query(&[("on_conflict", column)]);
                "resolution=merge-duplicates,return=representation"
            }
            None => "return=representation",
        };

        let response = builder.header("Prefer", prefer).json(body).send().await?;
        parse_rows(response, table).await
    }

    async fn upsert_row<T>(&self, table: &str, row: &T) -> Result<T, RepositoryError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.insert::<T, T>(table, row, Some("user_id"))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::InvalidResponse(format!("Upsert into {} returned no rows", table)))
    }
}

/// PostgREST equality filter value
fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Double-quote a value so PostgREST reads `,` `.` `(` and `)` inside it literally
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// PostgREST list literal, quoting each value
fn in_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| quoted(v)).collect();
    format!("({})", items.join(","))
}

fn block_filters(blocker_id: &str, blocked_id: &str) -> Vec<(String, String)> {
    vec![
        ("blocker_id".to_string(), eq(blocker_id)),
        ("blocked_id".to_string(), eq(blocked_id)),
    ]
}

/// `or=` filter matching `value` in either of two columns
fn either_column(first: &str, second: &str, value: &str) -> String {
    let value = quoted(value);
    format!("({first}.eq.{value},{second}.eq.{value})")
}

async fn parse_rows<T: DeserializeOwned>(response: Response, table: &str) -> Result<Vec<T>, RepositoryError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read body".to_string());
        tracing::error!("Supabase request on {} failed: {} - {}", table, status, body);
        return Err(RepositoryError::ApiError(format!("{} on {}: {}", status, table, body)));
    }

    response
        .json::<Vec<T>>()
        .await
        .map_err(|e| RepositoryError::InvalidResponse(format!("Failed to parse {} rows: {}", table, e)))
}

/// Build the PostgREST filters for a candidate search
pub fn candidate_filters(query: &CandidateQuery) -> Vec<(String, String)> {
    let mut filters = vec![("user_id".to_string(), format!("neq.{}", query.requester_id))];

    if !query.exclude_user_ids.is_empty() {
        filters.push((
            "user_id".to_string(),
            format!("not.in.{}", in_list(&query.exclude_user_ids)),
        ));
    }
    if let Some(gender) = query.gender {
        // serde gives the same snake_case labels the column stores
        let label = serde_json::to_value(gender)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        filters.push(("gender".to_string(), eq(&label)));
    }
    if let Some(min) = query.min_age {
        filters.push(("age".to_string(), format!("gte.{}", min)));
    }
    if let Some(max) = query.max_age {
        filters.push(("age".to_string(), format!("lte.{}", max)));
    }

    filters.push(("order".to_string(), "user_id.asc".to_string()));
    filters.push(("limit".to_string(), query.limit.to_string()));
    filters
}

#[async_trait]
impl UserRepository for SupabaseClient {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, RepositoryError> {
        self.select_one(&self.tables.profiles, "user_id", user_id).await
    }

    async fn get_basic_preference(
        &self,
        user_id: &str,
    ) -> Result<Option<BasicPreference>, RepositoryError> {
        self.select_one(&self.tables.basic_preferences, "user_id", user_id).await
    }

    async fn get_lifestyle_preference(
        &self,
        user_id: &str,
    ) -> Result<Option<LifestylePreference>, RepositoryError> {
        self.select_one(&self.tables.lifestyle_preferences, "user_id", user_id).await
    }

    async fn search_profiles(&self, query: &CandidateQuery) -> Result<Vec<Profile>, RepositoryError> {
        let profiles: Vec<Profile> = self
            .select(&self.tables.profiles, &candidate_filters(query))
            .await?;

        tracing::debug!("Queried {} candidates for {}", profiles.len(), query.requester_id);
        Ok(profiles)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, RepositoryError> {
        self.upsert_row(&self.tables.profiles, profile).await
    }

    async fn upsert_basic_preference(
        &self,
        preference: &BasicPreference,
    ) -> Result<BasicPreference, RepositoryError> {
        self.upsert_row(&self.tables.basic_preferences, preference).await
    }

    async fn upsert_lifestyle_preference(
        &self,
        preference: &LifestylePreference,
    ) -> Result<LifestylePreference, RepositoryError> {
        self.upsert_row(&self.tables.lifestyle_preferences, preference).await
    }
}

#[async_trait]
impl MatchRepository for SupabaseClient {
    async fn pending_receivers(&self, sender_id: &str) -> Result<Vec<String>, RepositoryError> {
        let filters = [
            ("sender_id".to_string(), eq(sender_id)),
            ("status".to_string(), eq("pending")),
        ];
        let requests: Vec<MatchRequest> = self.select(&self.tables.match_requests, &filters).await?;
        Ok(requests.into_iter().map(|r| r.receiver_id).collect())
    }

    async fn match_partners(&self, user_id: &str) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .matches_for_user(user_id)
            .await?
            .iter()
            .filter_map(|m| m.partner_of(user_id).map(str::to_string))
            .collect())
    }

    async fn insert_match_request(&self, request: &MatchRequest) -> Result<(), RepositoryError> {
        self.insert::<MatchRequest, _>(&self.tables.match_requests, request, None)
            .await?;
        Ok(())
    }

    async fn get_match_request(
        &self,
        request_id: &str,
    ) -> Result<Option<MatchRequest>, RepositoryError> {
        self.select_one(&self.tables.match_requests, "request_id", request_id).await
    }

    async fn requests_for_user(&self, user_id: &str) -> Result<Vec<MatchRequest>, RepositoryError> {
        let filters = [
            ("or".to_string(), either_column("sender_id", "receiver_id", user_id)),
            ("order".to_string(), "created_at.desc".to_string()),
        ];
        self.select(&self.tables.match_requests, &filters).await
    }

    async fn update_request_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<MatchRequest, RepositoryError> {
        let response = self
            .authorized(self.client.patch(self.table_url(&self.tables.match_requests)))
            .query(&[("request_id", eq(request_id))])
            .header("Prefer", "return=representation")
            .json(&json!({ "status": status, "updated_at": updated_at }))
            .send()
            .await?;

        parse_rows::<MatchRequest>(response, &self.tables.match_requests)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound(format!("Match request {}", request_id)))
    }

    async fn insert_match(&self, m: &Match) -> Result<(), RepositoryError> {
        self.insert::<Match, _>(&self.tables.matches, m, None).await?;
        Ok(())
    }

    async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, RepositoryError> {
        let filters = [
            ("or".to_string(), either_column("user1_id", "user2_id", user_id)),
            ("status".to_string(), eq("active")),
            ("order".to_string(), "matched_at.desc".to_string()),
        ];
        self.select(&self.tables.matches, &filters).await
    }

    async fn block_user(&self, blocker_id: &str, blocked_id: &str) -> Result<Block, RepositoryError> {
        let filters = block_filters(blocker_id, blocked_id);
        let existing: Vec<Block> = self.select(&self.tables.blocks, &filters).await?;
        if let Some(block) = existing.into_iter().next() {
            return Ok(block);
        }

        self.insert::<Block, _>(&self.tables.blocks, &Block::new(blocker_id, blocked_id), None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RepositoryError::InvalidResponse(format!("Insert into {} returned no rows", self.tables.blocks))
            })
    }

    async fn unblock_user(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RepositoryError> {
        let response = self
            .authorized(self.client.delete(self.table_url(&self.tables.blocks)))
            .query(&block_filters(blocker_id, blocked_id))
            .header("Prefer", "return=representation")
            .send()
            .await?;

        let removed: Vec<Block> = parse_rows(response, &self.tables.blocks).await?;
        Ok(!removed.is_empty())
    }

    async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RepositoryError> {
        let mut filters = block_filters(blocker_id, blocked_id);
        filters.push(("limit".to_string(), "1".to_string()));

        let rows: Vec<Block> = self.select(&self.tables.blocks, &filters).await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl Datastore for SupabaseClient {
    fn backend_name(&self) -> &'static str {
        "supabase"
    }

    async fn health_check(&self) -> Result<bool, RepositoryError> {
        let filters = [("limit".to_string(), "1".to_string())];
        self.select::<Profile>(&self.tables.profiles, &filters)
            .await
            .map(|_| true)
    }
}
