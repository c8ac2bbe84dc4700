use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use crate::models::domain::{
    BasicPreference, Cleanliness, Gender, GenderPreference, GuestPolicy, LifestylePreference,
    Profile, RequestStatus, SleepSchedule,
};

/// Query string for match search
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchMatchesQuery {
    #[validate(length(min = 1))]
    #[serde(alias = "userId")]
    pub user_id: String,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u16>,
}

/// Query string naming the acting user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserQuery {
    #[validate(length(min = 1))]
    #[serde(alias = "userId")]
    pub user_id: String,
}

/// Request to send a match request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMatchRequest {
    #[validate(length(min = 1))]
    pub sender_id: String,
    #[validate(length(min = 1))]
    pub receiver_id: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub message: Option<String>,
}

/// Accept, reject or cancel a pending request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RespondToRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    pub status: RequestStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(range(min = 18, max = 100))]
    pub age: u8,
    pub gender: Gender,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub bio: Option<String>,
}

impl ProfileRequest {
    pub fn into_profile(self, user_id: &str) -> Profile {
        Profile {
            user_id: user_id.to_string(),
            age: self.age,
            gender: self.gender,
            bio: self.bio,
            updated_at: Some(chrono::Utc::now()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_basic_preference"))]
pub struct BasicPreferenceRequest {
    pub gender_preference: GenderPreference,
    #[validate(range(min = 18, max = 100))]
    pub age_min: u8,
    #[validate(range(max = 100))]
    pub age_max: u8,
    #[serde(default)]
    pub budget_min: Option<u32>,
    #[serde(default)]
    pub budget_max: Option<u32>,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub location_preference: Option<String>,
}

fn validate_basic_preference(req: &BasicPreferenceRequest) -> Result<(), ValidationError> {
    if req.age_min > req.age_max {
        return Err(ValidationError::new("age_min_exceeds_age_max"));
    }
    if let (Some(min), Some(max)) = (req.budget_min, req.budget_max) {
        if min > max {
            return Err(ValidationError::new("budget_min_exceeds_budget_max"));
        }
    }
    Ok(())
}

impl BasicPreferenceRequest {
    pub fn into_preference(self, user_id: &str) -> BasicPreference {
        BasicPreference {
            user_id: user_id.to_string(),
            gender_preference: self.gender_preference,
            age_min: self.age_min,
            age_max: self.age_max,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            location_preference: self.location_preference,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LifestylePreferenceRequest {
    pub sleep_schedule: SleepSchedule,
    pub cleanliness: Cleanliness,
    pub guest_policy: GuestPolicy,
    pub smoking: bool,
    pub pets: bool,
}

impl LifestylePreferenceRequest {
    pub fn into_preference(self, user_id: &str) -> LifestylePreference {
        LifestylePreference {
            user_id: user_id.to_string(),
            sleep_schedule: self.sleep_schedule,
            cleanliness: self.cleanliness,
            guest_policy: self.guest_policy,
            smoking: self.smoking,
            pets: self.pets,
        }
    }
}
