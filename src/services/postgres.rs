use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use std::time::Duration;
use crate::models::{
    BasicPreference, Block, CandidateQuery, Cleanliness, Gender, GenderPreference, GuestPolicy,
    LifestylePreference, Match, MatchRequest, MatchStatus, Profile, RequestStatus, SleepSchedule,
};
use crate::services::repository::{Datastore, MatchRepository, RepositoryError, UserRepository};

/// Column-typed mirror of `profile`
#[derive(Debug, FromRow)]
struct ProfileRow {
    user_id: String,
    age: i16,
    gender: Gender,
    bio: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(Profile {
            age: narrow(row.age, "profile.age")?,
            user_id: row.user_id,
            gender: row.gender,
            bio: row.bio,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BasicPreferenceRow {
    user_id: String,
    gender_preference: GenderPreference,
    age_min: i16,
    age_max: i16,
    budget_min: Option<i64>,
    budget_max: Option<i64>,
    location_preference: Option<String>,
}

impl TryFrom<BasicPreferenceRow> for BasicPreference {
    type Error = RepositoryError;

    fn try_from(row: BasicPreferenceRow) -> Result<Self, Self::Error> {
        Ok(BasicPreference {
            age_min: narrow(row.age_min, "basic_preference.age_min")?,
            age_max: narrow(row.age_max, "basic_preference.age_max")?,
            budget_min: row.budget_min.map(|b| narrow(b, "basic_preference.budget_min")).transpose()?,
            budget_max: row.budget_max.map(|b| narrow(b, "basic_preference.budget_max")).transpose()?,
            user_id: row.user_id,
            gender_preference: row.gender_preference,
            location_preference: row.location_preference,
        })
    }
}

#[derive(Debug, FromRow)]
struct LifestylePreferenceRow {
    user_id: String,
    sleep_schedule: SleepSchedule,
    cleanliness: Cleanliness,
    guest_policy: GuestPolicy,
    smoking: bool,
    pets: bool,
}

impl From<LifestylePreferenceRow> for LifestylePreference {
    fn from(row: LifestylePreferenceRow) -> Self {
        LifestylePreference {
            user_id: row.user_id,
            sleep_schedule: row.sleep_schedule,
            cleanliness: row.cleanliness,
            guest_policy: row.guest_policy,
            smoking: row.smoking,
            pets: row.pets,
        }
    }
}

#[derive(Debug, FromRow)]
struct MatchRequestRow {
    request_id: String,
    sender_id: String,
    receiver_id: String,
    status: RequestStatus,
    message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MatchRequestRow> for MatchRequest {
    fn from(row: MatchRequestRow) -> Self {
        MatchRequest {
            request_id: row.request_id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            status: row.status,
            message: row.message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MatchRow {
    match_id: String,
    user1_id: String,
    user2_id: String,
    compatibility_score: i16,
    status: MatchStatus,
    matched_at: DateTime<Utc>,
}

impl TryFrom<MatchRow> for Match {
    type Error = RepositoryError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        Ok(Match {
            compatibility_score: narrow(row.compatibility_score, "match.compatibility_score")?,
            match_id: row.match_id,
            user1_id: row.user1_id,
            user2_id: row.user2_id,
            status: row.status,
            matched_at: row.matched_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BlockRow {
    block_id: String,
    blocker_id: String,
    blocked_id: String,
    created_at: DateTime<Utc>,
}

impl From<BlockRow> for Block {
    fn from(row: BlockRow) -> Self {
        Block {
            block_id: row.block_id,
            blocker_id: row.blocker_id,
            blocked_id: row.blocked_id,
            created_at: row.created_at,
        }
    }
}

/// Convert a wider database integer, rejecting out-of-range values
fn narrow<W, N>(value: W, column: &str) -> Result<N, RepositoryError>
where
    W: Copy + std::fmt::Display,
    N: TryFrom<W>,
{
    N::try_from(value).map_err(|_| {
        RepositoryError::InvalidResponse(format!("{} out of range: {}", column, value))
    })
}

/// PostgreSQL datastore
///
/// Talks to the same schema the hosted backend exposes, directly over a
/// connection pool. Migrations run on startup.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout_secs: u64,
        idle_timeout_secs: u64,
    ) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(idle_timeout_secs))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, RepositoryError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            acquire_timeout_secs.unwrap_or(5),
            idle_timeout_secs.unwrap_or(600),
        )
        .await
    }
}

#[async_trait]
impl UserRepository for PostgresClient {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, RepositoryError> {
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM profile WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Profile::try_from)
            .transpose()
    }

    async fn get_basic_preference(
        &self,
        user_id: &str,
    ) -> Result<Option<BasicPreference>, RepositoryError> {
        sqlx::query_as::<_, BasicPreferenceRow>("SELECT * FROM basic_preference WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(BasicPreference::try_from)
            .transpose()
    }

    async fn get_lifestyle_preference(
        &self,
        user_id: &str,
    ) -> Result<Option<LifestylePreference>, RepositoryError> {
        let row = sqlx::query_as::<_, LifestylePreferenceRow>(
            "SELECT * FROM lifestyle_preference WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LifestylePreference::from))
    }

    async fn search_profiles(&self, query: &CandidateQuery) -> Result<Vec<Profile>, RepositoryError> {
        let sql = r#"
            SELECT * FROM profile
            WHERE user_id <> $1
              AND user_id <> ALL($2)
              AND ($3::gender IS NULL OR gender = $3)
              AND ($4::smallint IS NULL OR age >= $4)
              AND ($5::smallint IS NULL OR age <= $5)
            ORDER BY user_id
            LIMIT $6
        "#;

        let rows = sqlx::query_as::<_, ProfileRow>(sql)
            .bind(&query.requester_id)
            .bind(&query.exclude_user_ids)
            .bind(query.gender)
            .bind(query.min_age.map(i16::from))
            .bind(query.max_age.map(i16::from))
            .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!("Queried {} candidates for {}", rows.len(), query.requester_id);

        rows.into_iter().map(Profile::try_from).collect()
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, RepositoryError> {
        let sql = r#"
            INSERT INTO profile (user_id, age, gender, bio, updated_at)
            VALUES ($1, $2, $3, $4, COALESCE($5, NOW()))
            ON CONFLICT (user_id)
            DO UPDATE SET
                age = EXCLUDED.age,
                gender = EXCLUDED.gender,
                bio = EXCLUDED.bio,
                updated_at = EXCLUDED.updated_at
            RETURNING *
        "#;

        sqlx::query_as::<_, ProfileRow>(sql)
            .bind(&profile.user_id)
            .bind(i16::from(profile.age))
            .bind(profile.gender)
            .bind(&profile.bio)
            .bind(profile.updated_at)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }

    async fn upsert_basic_preference(
        &self,
        preference: &BasicPreference,
    ) -> Result<BasicPreference, RepositoryError> {
        let sql = r#"
            INSERT INTO basic_preference
                (user_id, gender_preference, age_min, age_max, budget_min, budget_max, location_preference)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id)
            DO UPDATE SET
                gender_preference = EXCLUDED.gender_preference,
                age_min = EXCLUDED.age_min,
                age_max = EXCLUDED.age_max,
                budget_min = EXCLUDED.budget_min,
                budget_max = EXCLUDED.budget_max,
                location_preference = EXCLUDED.location_preference
            RETURNING *
        "#;

        sqlx::query_as::<_, BasicPreferenceRow>(sql)
            .bind(&preference.user_id)
            .bind(preference.gender_preference)
            .bind(i16::from(preference.age_min))
            .bind(i16::from(preference.age_max))
            .bind(preference.budget_min.map(i64::from))
            .bind(preference.budget_max.map(i64::from))
            .bind(&preference.location_preference)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }

    async fn upsert_lifestyle_preference(
        &self,
        preference: &LifestylePreference,
    ) -> Result<LifestylePreference, RepositoryError> {
        let sql = r#"
            INSERT INTO lifestyle_preference
                (user_id, sleep_schedule, cleanliness, guest_policy, smoking, pets)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id)
            DO UPDATE SET
                sleep_schedule = EXCLUDED.sleep_schedule,
                cleanliness = EXCLUDED.cleanliness,
                guest_policy = EXCLUDED.guest_policy,
                smoking = EXCLUDED.smoking,
                pets = EXCLUDED.pets
            RETURNING *
        "#;

        let row = sqlx::query_as::<_, LifestylePreferenceRow>(sql)
            .bind(&preference.user_id)
            .bind(preference.sleep_schedule)
            .bind(preference.cleanliness)
            .bind(preference.guest_policy)
            .bind(preference.smoking)
            .bind(preference.pets)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }
}

#[async_trait]
impl MatchRepository for PostgresClient {
    async fn pending_receivers(&self, sender_id: &str) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT receiver_id FROM match_request WHERE sender_id = $1 AND status = 'pending'",
        )
        .bind(sender_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("receiver_id")).collect())
    }

    async fn match_partners(&self, user_id: &str) -> Result<Vec<String>, RepositoryError> {
        let sql = r#"
            SELECT CASE WHEN user1_id = $1 THEN user2_id ELSE user1_id END AS partner_id
            FROM "match"
            WHERE (user1_id = $1 OR user2_id = $1) AND status = 'active'
        "#;

        let rows = sqlx::query(sql).bind(user_id).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| row.get("partner_id")).collect())
    }

    async fn insert_match_request(&self, request: &MatchRequest) -> Result<(), RepositoryError> {
        let sql = r#"
            INSERT INTO match_request
                (request_id, sender_id, receiver_id, status, message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#;

        sqlx::query(sql)
            .bind(&request.request_id)
            .bind(&request.sender_id)
            .bind(&request.receiver_id)
            .bind(request.status)
            .bind(&request.message)
            .bind(request.created_at)
            .bind(request.updated_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            "Inserted match request {}: {} -> {}",
            request.request_id,
            request.sender_id,
            request.receiver_id
        );
        Ok(())
    }

    async fn get_match_request(
        &self,
        request_id: &str,
    ) -> Result<Option<MatchRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, MatchRequestRow>(
            "SELECT * FROM match_request WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MatchRequest::from))
    }

    async fn requests_for_user(&self, user_id: &str) -> Result<Vec<MatchRequest>, RepositoryError> {
        let sql = r#"
            SELECT * FROM match_request
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY created_at DESC
        "#;

        let rows = sqlx::query_as::<_, MatchRequestRow>(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(MatchRequest::from).collect())
    }

    async fn update_request_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<MatchRequest, RepositoryError> {
        let sql = r#"
            UPDATE match_request
            SET status = $2, updated_at = $3
            WHERE request_id = $1
            RETURNING *
        "#;

        sqlx::query_as::<_, MatchRequestRow>(sql)
            .bind(request_id)
            .bind(status)
            .bind(updated_at)
            .fetch_optional(&self.pool)
            .await?
            .map(MatchRequest::from)
            .ok_or_else(|| RepositoryError::NotFound(format!("Match request {}", request_id)))
    }

    async fn insert_match(&self, m: &Match) -> Result<(), RepositoryError> {
        let sql = r#"
            INSERT INTO "match"
                (match_id, user1_id, user2_id, compatibility_score, status, matched_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#;

        sqlx::query(sql)
            .bind(&m.match_id)
            .bind(&m.user1_id)
            .bind(&m.user2_id)
            .bind(i16::from(m.compatibility_score))
            .bind(m.status)
            .bind(m.matched_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, RepositoryError> {
        let sql = r#"
            SELECT * FROM "match"
            WHERE (user1_id = $1 OR user2_id = $1) AND status = 'active'
            ORDER BY matched_at DESC
        "#;

        let rows = sqlx::query_as::<_, MatchRow>(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Match::try_from).collect()
    }

    async fn block_user(&self, blocker_id: &str, blocked_id: &str) -> Result<Block, RepositoryError> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let sql = r#"
            INSERT INTO block (block_id, blocker_id, blocked_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (blocker_id, blocked_id)
            DO UPDATE SET blocker_id = EXCLUDED.blocker_id
            RETURNING *
        "#;

        let block = Block::new(blocker_id, blocked_id);
        let row = sqlx::query_as::<_, BlockRow>(sql)
            .bind(&block.block_id)
            .bind(&block.blocker_id)
            .bind(&block.blocked_id)
            .bind(block.created_at)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!("Block recorded: {} -> {}", blocker_id, blocked_id);
        Ok(Block::from(row))
    }

    async fn unblock_user(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM block WHERE blocker_id = $1 AND blocked_id = $2")
            .bind(blocker_id)
            .bind(blocked_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM block WHERE blocker_id = $1 AND blocked_id = $2) AS blocked",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("blocked"))
    }
}

#[async_trait]
impl Datastore for PostgresClient {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, RepositoryError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
