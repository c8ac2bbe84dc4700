// Core algorithm exports
pub mod filters;
pub mod matcher;
pub mod scoring;

pub use filters::{build_candidate_query, is_excluded, matches_candidate_query};
pub use matcher::{rank_candidates, MatchResult, Matcher, ScoredCandidate};
pub use scoring::compatibility_score;
