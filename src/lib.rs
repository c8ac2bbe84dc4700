//! Roommate Match - compatibility scoring and candidate search for student housing
//!
//! This library scores how well two students would live together and runs a
//! multi-stage search that turns a user's preferences into a ranked list of
//! roommate candidates. Match requests and confirmed matches are handled by
//! the request workflow in [`services::workflow`].

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{compatibility_score, Matcher, MatchResult};
pub use crate::models::{CandidateResult, CriteriaWeights, ScoreOutcome, UserSnapshot};
pub use crate::services::{Datastore, MemoryStore, RepositoryError};
