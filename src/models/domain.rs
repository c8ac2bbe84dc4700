use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declared gender on a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "gender", rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

/// Gender a user is willing to share with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "gender_preference", rename_all = "snake_case")]
pub enum GenderPreference {
    Any,
    Male,
    Female,
    Other,
}

impl GenderPreference {
    /// Whether a person of `gender` satisfies this preference
    pub fn accepts(self, gender: Gender) -> bool {
        self.required_gender().map_or(true, |wanted| wanted == gender)
    }

    /// The gender a candidate must have, or `None` for `any`
    pub fn required_gender(self) -> Option<Gender> {
        match self {
            GenderPreference::Any => None,
            GenderPreference::Male => Some(Gender::Male),
            GenderPreference::Female => Some(Gender::Female),
            GenderPreference::Other => Some(Gender::Other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "sleep_schedule", rename_all = "snake_case")]
pub enum SleepSchedule {
    EarlyBird,
    Normal,
    NightOwl,
    Flexible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "cleanliness", rename_all = "snake_case")]
pub enum Cleanliness {
    VeryClean,
    Moderate,
    Relaxed,
}

/// How often a user has guests over, ordered from least to most
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "guest_policy", rename_all = "snake_case")]
pub enum GuestPolicy {
    Never,
    Rarely,
    Sometimes,
    Often,
}

impl GuestPolicy {
    pub fn ordinal(self) -> u8 {
        match self {
            GuestPolicy::Never => 0,
            GuestPolicy::Rarely => 1,
            GuestPolicy::Sometimes => 2,
            GuestPolicy::Often => 3,
        }
    }
}

/// A user's public profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub age: u8,
    pub gender: Gender,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Hard constraints a user places on a prospective roommate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicPreference {
    pub user_id: String,
    pub gender_preference: GenderPreference,
    pub age_min: u8,
    pub age_max: u8,
    #[serde(default)]
    pub budget_min: Option<u32>,
    #[serde(default)]
    pub budget_max: Option<u32>,
    #[serde(default)]
    pub location_preference: Option<String>,
}

impl BasicPreference {
    pub fn accepts_age(&self, age: u8) -> bool {
        age >= self.age_min && age <= self.age_max
    }

    /// Budget bounds with a missing minimum read as 0 and a missing maximum as unbounded
    pub fn budget_bounds(&self) -> (u32, u32) {
        (self.budget_min.unwrap_or(0), self.budget_max.unwrap_or(u32::MAX))
    }
}

/// Daily-living habits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifestylePreference {
    pub user_id: String,
    pub sleep_schedule: SleepSchedule,
    pub cleanliness: Cleanliness,
    pub guest_policy: GuestPolicy,
    pub smoking: bool,
    pub pets: bool,
}

/// Everything the scorer knows about one user. Each part may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub profile: Option<Profile>,
    pub basic: Option<BasicPreference>,
    pub lifestyle: Option<LifestylePreference>,
}

/// How a compatibility score was arrived at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOutcome {
    /// All records present; weighted criteria evaluated
    Computed(u8),
    /// At least one profile does not exist
    ProfileMissing,
    /// A profile exists but its owner has not set both preference records
    PreferencesMissing,
    /// The candidate's records could not be fetched
    LookupFailed,
}

pub const PROFILE_MISSING_SCORE: u8 = 0;
pub const NEUTRAL_SCORE: u8 = 50;

impl ScoreOutcome {
    pub fn value(self) -> u8 {
        match self {
            ScoreOutcome::Computed(score) => score,
            ScoreOutcome::ProfileMissing => PROFILE_MISSING_SCORE,
            ScoreOutcome::PreferencesMissing | ScoreOutcome::LookupFailed => NEUTRAL_SCORE,
        }
    }
}

/// A ranked candidate returned by match search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub requester_id: String,
    pub candidate_id: String,
    pub compatibility_score: u8,
    pub rank: usize,
    pub outcome: ScoreOutcome,
    pub profile: Profile,
    pub basic_preference: Option<BasicPreference>,
    pub lifestyle_preference: Option<LifestylePreference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// A roommate request from one user to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub request_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchRequest {
    pub fn involves(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    /// True when the request connects `a` and `b` in either direction
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "match_status", rename_all = "lowercase")]
pub enum MatchStatus {
    Active,
    Inactive,
}

/// A confirmed pairing. `user1_id` always sorts before `user2_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub compatibility_score: u8,
    pub status: MatchStatus,
    pub matched_at: DateTime<Utc>,
}

impl Match {
    pub fn new(a: &str, b: &str, compatibility_score: u8) -> Self {
        let (user1_id, user2_id) = if a < b { (a, b) } else { (b, a) };
        Self {
            match_id: uuid::Uuid::new_v4().to_string(),
            user1_id: user1_id.to_string(),
            user2_id: user2_id.to_string(),
            compatibility_score,
            status: MatchStatus::Active,
            matched_at: Utc::now(),
        }
    }

    /// The other half of the pair, if `user_id` is part of it
    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        if self.user1_id == user_id {
            Some(&self.user2_id)
        } else if self.user2_id == user_id {
            Some(&self.user1_id)
        } else {
            None
        }
    }
}

/// One user hiding from another. Blocks are directional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_id: String,
    pub blocker_id: String,
    pub blocked_id: String,
    pub created_at: DateTime<Utc>,
}

impl Block {
    pub fn new(blocker_id: &str, blocked_id: &str) -> Self {
        Self {
            block_id: uuid::Uuid::new_v4().to_string(),
            blocker_id: blocker_id.to_string(),
            blocked_id: blocked_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Candidate query parameters handed to a repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateQuery {
    pub requester_id: String,
    pub gender: Option<Gender>,
    pub min_age: Option<u8>,
    pub max_age: Option<u8>,
    pub exclude_user_ids: Vec<String>,
    pub limit: usize,
}

/// Points awarded per criterion. The score denominator is their sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriteriaWeights {
    pub age: u32,
    pub budget: u32,
    pub gender: u32,
    pub sleep: u32,
    pub cleanliness: u32,
    pub habits: u32,
    pub guests: u32,
}

impl CriteriaWeights {
    pub fn as_array(&self) -> [u32; 7] {
        [
            self.age,
            self.budget,
            self.gender,
            self.sleep,
            self.cleanliness,
            self.habits,
            self.guests,
        ]
    }

    /// Sum of all weights, or `None` when it does not fit in a `u32`
    pub fn total(&self) -> Option<u32> {
        self.as_array().into_iter().try_fold(0u32, u32::checked_add)
    }
}

impl Default for CriteriaWeights {
    fn default() -> Self {
        Self {
            age: 20,
            budget: 20,
            gender: 15,
            sleep: 10,
            cleanliness: 10,
            habits: 10,
            guests: 5,
        }
    }
}
