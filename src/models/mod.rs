// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BasicPreference, Block, CandidateQuery, CandidateResult, Cleanliness, CriteriaWeights, Gender,
    GenderPreference, GuestPolicy, LifestylePreference, Match, MatchRequest, MatchStatus, Profile,
    RequestStatus, ScoreOutcome, SleepSchedule, UserSnapshot,
};
pub use requests::{
    BasicPreferenceRequest, LifestylePreferenceRequest, ProfileRequest, RespondToRequest,
    SearchMatchesQuery, SendMatchRequest, UserQuery,
};
pub use responses::{ErrorResponse, FindMatchesResponse, HealthResponse, MatchesResponse, RequestsResponse};
