use crate::models::{BasicPreference, CandidateQuery, Profile};

/// Build the repository query for a requester
///
/// The requester is always excluded alongside `excluded`. Without a basic
/// preference no gender or age restriction is applied and the whole
/// population (up to `pool_size`) is eligible.
pub fn build_candidate_query(
    requester_id: &str,
    preference: Option<&BasicPreference>,
    excluded: impl IntoIterator<Item = String>,
    pool_size: usize,
) -> CandidateQuery {
    let mut exclude_user_ids = vec![requester_id.to_string()];
    for id in excluded {
        if !exclude_user_ids.contains(&id) {
            exclude_user_ids.push(id);
        }
    }

    CandidateQuery {
        requester_id: requester_id.to_string(),
        gender: preference.and_then(|p| p.gender_preference.required_gender()),
        min_age: preference.map(|p| p.age_min),
        max_age: preference.map(|p| p.age_max),
        exclude_user_ids,
        limit: pool_size,
    }
}

/// Whether a user id is ruled out by the query's exclusion list
#[inline]
pub fn is_excluded(user_id: &str, query: &CandidateQuery) -> bool {
    user_id == query.requester_id || query.exclude_user_ids.iter().any(|id| id == user_id)
}

/// Check a profile against every hard constraint of the query
#[inline]
pub fn matches_candidate_query(profile: &Profile, query: &CandidateQuery) -> bool {
    if is_excluded(&profile.user_id, query) {
        return false;
    }

    if let Some(gender) = query.gender {
        if profile.gender != gender {
            return false;
        }
    }

    if query.min_age.is_some_and(|min| profile.age < min) {
        return false;
    }

    if query.max_age.is_some_and(|max| profile.age > max) {
        return false;
    }

    true
}
