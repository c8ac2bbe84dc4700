use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use crate::core::{
    filters::{build_candidate_query, is_excluded},
    scoring::compatibility_score,
};
use crate::models::{CandidateResult, CriteriaWeights, Profile, ScoreOutcome, UserSnapshot};
use crate::services::repository::{MatchRepository, RepositoryError, UserRepository};

pub const DEFAULT_RESULT_LIMIT: usize = 10;
pub const DEFAULT_CANDIDATE_POOL_SIZE: usize = 50;
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;

/// Result of the matching process
#[derive(Debug)]
pub struct MatchResult {
    pub matches: Vec<CandidateResult>,
    pub total_candidates: usize,
}

/// A candidate after scoring, before ranking
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub snapshot: UserSnapshot,
    pub profile: Profile,
    pub outcome: ScoreOutcome,
}

/// Main matching orchestrator
///
/// # Pipeline Stages
/// 1. Requester lookup and exclusion sets
/// 2. Repository search over hard constraints
/// 3. Per-candidate preference lookups and scoring
/// 4. Ranking and truncation
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: CriteriaWeights,
    candidate_pool_size: usize,
    lookup_concurrency: usize,
}

impl Matcher {
    pub fn new(weights: CriteriaWeights, candidate_pool_size: usize, lookup_concurrency: usize) -> Self {
        Self {
            weights,
            candidate_pool_size,
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    pub fn with_default_weights() -> Self {
        Self::new(
            CriteriaWeights::default(),
            DEFAULT_CANDIDATE_POOL_SIZE,
            DEFAULT_LOOKUP_CONCURRENCY,
        )
    }

    pub fn weights(&self) -> &CriteriaWeights {
        &self.weights
    }

    /// Score two users with this matcher's weights
    pub fn score(&self, a: &UserSnapshot, b: &UserSnapshot) -> ScoreOutcome {
        compatibility_score(a, b, &self.weights)
    }

    /// Find ranked candidates for a requester
    ///
    /// # Arguments
    /// * `repo` - Datastore holding users, requests and matches
    /// * `requester_id` - The user searching
    /// * `limit` - Maximum number of matches to return
    ///
    /// # Returns
    /// MatchResult with at most `limit` candidates, best first. A candidate
    /// whose records cannot be fetched is kept with a neutral score.
    pub async fn find_matches<R>(
        &self,
        repo: &R,
        requester_id: &str,
        limit: usize,
    ) -> Result<MatchResult, RepositoryError>
    where
        R: UserRepository + MatchRepository + ?Sized,
    {
        // Stage 1: requester and exclusions
        let (requester, pending, partners) = tokio::try_join!(
            repo.snapshot(requester_id),
            repo.pending_receivers(requester_id),
            repo.match_partners(requester_id),
        )?;

        let query = build_candidate_query(
            requester_id,
            requester.basic.as_ref(),
            pending.into_iter().chain(partners),
            self.candidate_pool_size,
        );

        // Stage 2: hard constraints
        let mut seen = HashSet::new();
        let candidates: Vec<Profile> = repo
            .search_profiles(&query)
            .await?
            .into_iter()
            .filter(|profile| !is_excluded(&profile.user_id, &query))
            .filter(|profile| seen.insert(profile.user_id.clone()))
            .collect();

        let total_candidates = candidates.len();

        tracing::debug!(
            "Scoring {} candidates for {} ({} excluded)",
            total_candidates,
            requester_id,
            query.exclude_user_ids.len()
        );

        // Stage 3: lookups and scoring
        let scored: Vec<ScoredCandidate> = stream::iter(candidates)
            .map(|profile| self.score_candidate(repo, &requester, profile))
            .buffered(self.lookup_concurrency)
            .collect()
            .await;

        // Stage 4: ranking
        Ok(MatchResult {
            matches: rank_candidates(requester_id, scored, limit),
            total_candidates,
        })
    }

    async fn score_candidate<R>(
        &self,
        repo: &R,
        requester: &UserSnapshot,
        profile: Profile,
    ) -> ScoredCandidate
    where
        R: UserRepository + ?Sized,
    {
        let lookups = tokio::try_join!(
            repo.get_basic_preference(&profile.user_id),
            repo.get_lifestyle_preference(&profile.user_id),
        );

        match lookups {
            Ok((basic, lifestyle)) => {
                let snapshot = UserSnapshot {
                    profile: Some(profile.clone()),
                    basic,
                    lifestyle,
                };
                let outcome = self.score(requester, &snapshot);
                ScoredCandidate { snapshot, profile, outcome }
            }
            Err(e) => {
                tracing::warn!(
                    "Lookup failed for candidate {}, using neutral score: {}",
                    profile.user_id,
                    e
                );
                ScoredCandidate {
                    snapshot: UserSnapshot {
                        profile: Some(profile.clone()),
                        basic: None,
                        lifestyle: None,
                    },
                    profile,
                    outcome: ScoreOutcome::LookupFailed,
                }
            }
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

/// Sort by score (descending) then candidate id (ascending), truncate, assign ranks
pub fn rank_candidates(
    requester_id: &str,
    mut scored: Vec<ScoredCandidate>,
    limit: usize,
) -> Vec<CandidateResult> {
    scored.sort_by(|a, b| {
        b.outcome
            .value()
            .cmp(&a.outcome.value())
            .then_with(|| a.profile.user_id.cmp(&b.profile.user_id))
    });
    scored.truncate(limit);

    scored
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| CandidateResult {
            requester_id: requester_id.to_string(),
            candidate_id: candidate.profile.user_id.clone(),
            compatibility_score: candidate.outcome.value(),
            rank: i + 1,
            outcome: candidate.outcome,
            profile: candidate.profile,
            basic_preference: candidate.snapshot.basic,
            lifestyle_preference: candidate.snapshot.lifestyle,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use crate::models::{
        BasicPreference, Block, CandidateQuery, Cleanliness, Gender, GenderPreference, GuestPolicy,
        LifestylePreference, Match, MatchRequest, RequestStatus, SleepSchedule,
    };
    use crate::services::memory::MemoryStore;

    async fn add_user(
        store: &MemoryStore,
        id: &str,
        age: u8,
        gender: Gender,
        gender_preference: GenderPreference,
        sleep: SleepSchedule,
    ) {
        store
            .upsert_profile(&Profile {
                user_id: id.to_string(),
                age,
                gender,
                bio: None,
                updated_at: None,
            })
            .await
            .unwrap();
        store
            .upsert_basic_preference(&BasicPreference {
                user_id: id.to_string(),
                gender_preference,
                age_min: 18,
                age_max: 30,
                budget_min: Some(400),
                budget_max: Some(800),
                location_preference: None,
            })
            .await
            .unwrap();
        store
            .upsert_lifestyle_preference(&LifestylePreference {
                user_id: id.to_string(),
                sleep_schedule: sleep,
                cleanliness: Cleanliness::Moderate,
                guest_policy: GuestPolicy::Rarely,
                smoking: false,
                pets: false,
            })
            .await
            .unwrap();
    }

    fn pending(sender: &str, receiver: &str) -> MatchRequest {
        MatchRequest {
            request_id: format!("{}-{}", sender, receiver),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            status: RequestStatus::Pending,
            message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ids(result: &MatchResult) -> Vec<&str> {
        result.matches.iter().map(|m| m.candidate_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_find_matches_basic() {
        let store = MemoryStore::new();
        add_user(&store, "me", 21, Gender::Female, GenderPreference::Female, SleepSchedule::NightOwl).await;
        add_user(&store, "close", 22, Gender::Female, GenderPreference::Any, SleepSchedule::NightOwl).await;
        add_user(&store, "early", 22, Gender::Female, GenderPreference::Any, SleepSchedule::EarlyBird).await;
        add_user(&store, "male", 22, Gender::Male, GenderPreference::Any, SleepSchedule::NightOwl).await;

        let result = Matcher::default().find_matches(&store, "me", 10).await.unwrap();

        assert_eq!(ids(&result), vec!["close", "early"]);
        assert_eq!(result.matches[0].compatibility_score, 100);
        assert_eq!(result.matches[1].compatibility_score, 89);
        assert_eq!(result.matches[0].rank, 1);
        assert_eq!(result.matches[1].rank, 2);
        assert_eq!(result.total_candidates, 2);
    }

    #[tokio::test]
    async fn test_excludes_requested_and_matched_users() {
        let store = MemoryStore::new();
        for id in ["me", "requested", "matched", "inbound", "free"] {
            add_user(&store, id, 22, Gender::Other, GenderPreference::Any, SleepSchedule::Normal).await;
        }
        store.insert_match_request(&pending("me", "requested")).await.unwrap();
        store.insert_match_request(&pending("inbound", "me")).await.unwrap();
        store.insert_match(&Match::new("matched", "me", 90)).await.unwrap();

        let result = Matcher::default().find_matches(&store, "me", 10).await.unwrap();

        // an inbound request does not hide its sender
        assert_eq!(ids(&result), vec!["free", "inbound"]);
    }

    #[tokio::test]
    async fn test_requester_without_preferences_sees_everyone() {
        let store = MemoryStore::new();
        store
            .upsert_profile(&Profile {
                user_id: "me".to_string(),
                age: 19,
                gender: Gender::Male,
                bio: None,
                updated_at: None,
            })
            .await
            .unwrap();
        add_user(&store, "a", 60, Gender::Female, GenderPreference::Female, SleepSchedule::Normal).await;
        add_user(&store, "b", 20, Gender::Male, GenderPreference::Any, SleepSchedule::Normal).await;

        let result = Matcher::default().find_matches(&store, "me", 10).await.unwrap();

        assert_eq!(ids(&result), vec!["a", "b"]);
        for m in &result.matches {
            assert_eq!(m.outcome, ScoreOutcome::PreferencesMissing);
            assert_eq!(m.compatibility_score, 50);
        }
    }

    #[tokio::test]
    async fn test_requester_without_profile_scores_zero() {
        let store = MemoryStore::new();
        add_user(&store, "a", 22, Gender::Female, GenderPreference::Any, SleepSchedule::Normal).await;

        let result = Matcher::default().find_matches(&store, "ghost", 10).await.unwrap();

        assert_eq!(ids(&result), vec!["a"]);
        assert_eq!(result.matches[0].outcome, ScoreOutcome::ProfileMissing);
        assert_eq!(result.matches[0].compatibility_score, 0);
    }

    #[tokio::test]
    async fn test_respects_limit_and_tie_break() {
        let store = MemoryStore::new();
        add_user(&store, "me", 22, Gender::Other, GenderPreference::Any, SleepSchedule::Normal).await;
        for i in (0..20).rev() {
            let id = format!("user{:02}", i);
            add_user(&store, &id, 22, Gender::Other, GenderPreference::Any, SleepSchedule::Normal).await;
        }

        let result = Matcher::default().find_matches(&store, "me", 5).await.unwrap();

        assert_eq!(ids(&result), vec!["user00", "user01", "user02", "user03", "user04"]);
        assert_eq!(result.total_candidates, 20);
    }

    /// Delegates to a MemoryStore but fails preference lookups for one user
    struct FlakyStore {
        inner: MemoryStore,
        broken_user: String,
    }

    #[async_trait]
    impl UserRepository for FlakyStore {
        async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, RepositoryError> {
            self.inner.get_profile(user_id).await
        }

        async fn get_basic_preference(
            &self,
            user_id: &str,
        ) -> Result<Option<BasicPreference>, RepositoryError> {
            if user_id == self.broken_user {
                return Err(RepositoryError::ApiError("connection reset".to_string()));
            }
            self.inner.get_basic_preference(user_id).await
        }

        async fn get_lifestyle_preference(
            &self,
            user_id: &str,
        ) -> Result<Option<LifestylePreference>, RepositoryError> {
            self.inner.get_lifestyle_preference(user_id).await
        }

        async fn search_profiles(&self, query: &CandidateQuery) -> Result<Vec<Profile>, RepositoryError> {
            self.inner.search_profiles(query).await
        }

        async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, RepositoryError> {
            self.inner.upsert_profile(profile).await
        }

        async fn upsert_basic_preference(
            &self,
            preference: &BasicPreference,
        ) -> Result<BasicPreference, RepositoryError> {
            self.inner.upsert_basic_preference(preference).await
        }

        async fn upsert_lifestyle_preference(
            &self,
            preference: &LifestylePreference,
        ) -> Result<LifestylePreference, RepositoryError> {
            self.inner.upsert_lifestyle_preference(preference).await
        }
    }

    #[async_trait]
    impl MatchRepository for FlakyStore {
        async fn pending_receivers(&self, sender_id: &str) -> Result<Vec<String>, RepositoryError> {
            self.inner.pending_receivers(sender_id).await
        }

        async fn match_partners(&self, user_id: &str) -> Result<Vec<String>, RepositoryError> {
            self.inner.match_partners(user_id).await
        }

        async fn insert_match_request(&self, request: &MatchRequest) -> Result<(), RepositoryError> {
            self.inner.insert_match_request(request).await
        }

        async fn get_match_request(
            &self,
            request_id: &str,
        ) -> Result<Option<MatchRequest>, RepositoryError> {
            self.inner.get_match_request(request_id).await
        }

        async fn requests_for_user(&self, user_id: &str) -> Result<Vec<MatchRequest>, RepositoryError> {
            self.inner.requests_for_user(user_id).await
        }

        async fn update_request_status(
            &self,
            request_id: &str,
            status: RequestStatus,
            updated_at: DateTime<Utc>,
        ) -> Result<MatchRequest, RepositoryError> {
            self.inner.update_request_status(request_id, status, updated_at).await
        }

        async fn insert_match(&self, m: &Match) -> Result<(), RepositoryError> {
            self.inner.insert_match(m).await
        }

        async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>, RepositoryError> {
            self.inner.matches_for_user(user_id).await
        }

        async fn block_user(&self, blocker_id: &str, blocked_id: &str) -> Result<Block, RepositoryError> {
            self.inner.block_user(blocker_id, blocked_id).await
        }

        async fn unblock_user(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RepositoryError> {
            self.inner.unblock_user(blocker_id, blocked_id).await
        }

        async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RepositoryError> {
            self.inner.is_blocked(blocker_id, blocked_id).await
        }
    }

    #[tokio::test]
    async fn test_lookup_failure_is_isolated() {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            broken_user: "broken".to_string(),
        };
        add_user(&store.inner, "me", 22, Gender::Other, GenderPreference::Any, SleepSchedule::Normal).await;
        add_user(&store.inner, "broken", 22, Gender::Other, GenderPreference::Any, SleepSchedule::Normal).await;
        add_user(&store.inner, "fine", 22, Gender::Other, GenderPreference::Any, SleepSchedule::EarlyBird).await;

        let result = Matcher::default().find_matches(&store, "me", 10).await.unwrap();

        assert_eq!(ids(&result), vec!["fine", "broken"]);
        assert_eq!(result.matches[1].outcome, ScoreOutcome::LookupFailed);
        assert_eq!(result.matches[1].compatibility_score, 50);
    }

    #[test]
    fn test_rank_candidates_orders_and_truncates() {
        let candidate = |id: &str, outcome: ScoreOutcome| ScoredCandidate {
            snapshot: UserSnapshot::default(),
            profile: Profile {
                user_id: id.to_string(),
                age: 20,
                gender: Gender::Other,
                bio: None,
                updated_at: None,
            },
            outcome,
        };

        let ranked = rank_candidates(
            "me",
            vec![
                candidate("c", ScoreOutcome::Computed(50)),
                candidate("a", ScoreOutcome::ProfileMissing),
                candidate("b", ScoreOutcome::LookupFailed),
                candidate("d", ScoreOutcome::Computed(95)),
            ],
            3,
        );

        let order: Vec<_> = ranked.iter().map(|r| (r.candidate_id.as_str(), r.rank)).collect();
        assert_eq!(order, vec![("d", 1), ("b", 2), ("c", 3)]);
        assert!(ranked.iter().all(|r| r.requester_id == "me"));
    }
}
