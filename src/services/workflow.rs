//! Match-request lifecycle: send, then accept, reject or cancel. Also blocks,
//! which stop requests in both directions.

use chrono::Utc;
use thiserror::Error;
use crate::core::Matcher;
use crate::models::{Block, Match, MatchRequest, RequestStatus};
use crate::services::repository::{MatchRepository, RepositoryError, UserRepository};

/// Reasons a request operation is refused
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cannot send a match request to yourself")]
    SelfRequest,

    #[error("User {0} has no profile")]
    UnknownUser(String),

    #[error("A pending request already exists between {0} and {1}")]
    DuplicateRequest(String, String),

    #[error("Users {0} and {1} are already matched")]
    AlreadyMatched(String, String),

    #[error("Match request {0} not found")]
    RequestNotFound(String),

    #[error("User {0} may not mark request {1} as {2}")]
    Forbidden(String, String, RequestStatus),

    #[error("Match request {0} is already {1}")]
    NotPending(String, RequestStatus),

    #[error("Cannot move a request back to pending")]
    InvalidTransition,

    #[error("Cannot block yourself")]
    SelfBlock,

    #[error("A block between {0} and {1} prevents this request")]
    Blocked(String, String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Create a pending request from `sender_id` to `receiver_id`
pub async fn send_request<R>(
    repo: &R,
    sender_id: &str,
    receiver_id: &str,
    message: Option<String>,
) -> Result<MatchRequest, WorkflowError>
where
    R: UserRepository + MatchRepository + ?Sized,
{
    if sender_id == receiver_id {
        return Err(WorkflowError::SelfRequest);
    }

    let (receiver, existing, partners, blocked_by_sender, blocked_by_receiver) = tokio::try_join!(
        repo.get_profile(receiver_id),
        repo.requests_for_user(sender_id),
        repo.match_partners(sender_id),
        repo.is_blocked(sender_id, receiver_id),
        repo.is_blocked(receiver_id, sender_id),
    )?;

    if receiver.is_none() {
        return Err(WorkflowError::UnknownUser(receiver_id.to_string()));
    }

    if blocked_by_sender || blocked_by_receiver {
        return Err(WorkflowError::Blocked(
            sender_id.to_string(),
            receiver_id.to_string(),
        ));
    }

    if partners.iter().any(|p| p == receiver_id) {
        return Err(WorkflowError::AlreadyMatched(
            sender_id.to_string(),
            receiver_id.to_string(),
        ));
    }

    if existing
        .iter()
        .any(|r| r.status == RequestStatus::Pending && r.connects(sender_id, receiver_id))
    {
        return Err(WorkflowError::DuplicateRequest(
            sender_id.to_string(),
            receiver_id.to_string(),
        ));
    }

    let now = Utc::now();
    let request = MatchRequest {
        request_id: uuid::Uuid::new_v4().to_string(),
        sender_id: sender_id.to_string(),
        receiver_id: receiver_id.to_string(),
        status: RequestStatus::Pending,
        message,
        created_at: now,
        updated_at: now,
    };

    repo.insert_match_request(&request).await?;

    tracing::info!("Match request {}: {} -> {}", request.request_id, sender_id, receiver_id);

    Ok(request)
}

/// Outcome of responding to a request
#[derive(Debug, Clone)]
pub struct RequestResponse {
    pub request: MatchRequest,
    pub created_match: Option<Match>,
}

/// Accept, reject or cancel a pending request
///
/// Only the receiver may accept or reject; only the sender may cancel.
/// Accepting records a confirmed match scored with `matcher`.
pub async fn respond_to_request<R>(
    repo: &R,
    matcher: &Matcher,
    request_id: &str,
    actor_id: &str,
    status: RequestStatus,
) -> Result<RequestResponse, WorkflowError>
where
    R: UserRepository + MatchRepository + ?Sized,
{
    if status == RequestStatus::Pending {
        return Err(WorkflowError::InvalidTransition);
    }

    let request = repo
        .get_match_request(request_id)
        .await?
        .ok_or_else(|| WorkflowError::RequestNotFound(request_id.to_string()))?;

    let allowed = match status {
        RequestStatus::Accepted | RequestStatus::Rejected => request.receiver_id == actor_id,
        RequestStatus::Cancelled => request.sender_id == actor_id,
        RequestStatus::Pending => false,
    };
    if !allowed {
        return Err(WorkflowError::Forbidden(
            actor_id.to_string(),
            request_id.to_string(),
            status,
        ));
    }

    if request.status != RequestStatus::Pending {
        return Err(WorkflowError::NotPending(request_id.to_string(), request.status));
    }

    if status != RequestStatus::Accepted {
        let updated = repo.update_request_status(request_id, status, Utc::now()).await?;
        tracing::info!("Match request {} marked {} by {}", request_id, status, actor_id);
        return Ok(RequestResponse {
            request: updated,
            created_match: None,
        });
    }

    // Lookups run before any write; a failure here leaves the request pending
    let (sender, receiver) = tokio::try_join!(
        repo.snapshot(&request.sender_id),
        repo.snapshot(&request.receiver_id),
    )?;
    let score = matcher.score(&sender, &receiver).value();
    let confirmed = Match::new(&request.sender_id, &request.receiver_id, score);

    let updated = repo.update_request_status(request_id, status, Utc::now()).await?;

    if let Err(e) = repo.insert_match(&confirmed).await {
        tracing::warn!("Recording match for request {} failed, reopening it: {}", request_id, e);
        if let Err(revert) = repo
            .update_request_status(request_id, RequestStatus::Pending, Utc::now())
            .await
        {
            tracing::error!("Request {} left accepted without a match: {}", request_id, revert);
        }
        return Err(e.into());
    }

    tracing::info!(
        "Match {} confirmed between {} and {} (score {})",
        confirmed.match_id,
        confirmed.user1_id,
        confirmed.user2_id,
        score
    );

    Ok(RequestResponse {
        request: updated,
        created_match: Some(confirmed),
    })
}

/// Block `blocked_id` on behalf of `blocker_id`
///
/// Both users must have a profile. Blocking an already blocked user returns
/// the existing block.
pub async fn block_user<R>(repo: &R, blocker_id: &str, blocked_id: &str) -> Result<Block, WorkflowError>
where
    R: UserRepository + MatchRepository + ?Sized,
{
    if blocker_id == blocked_id {
        return Err(WorkflowError::SelfBlock);
    }

    let (blocker, blocked) = tokio::try_join!(
        repo.get_profile(blocker_id),
        repo.get_profile(blocked_id),
    )?;
    if blocker.is_none() {
        return Err(WorkflowError::UnknownUser(blocker_id.to_string()));
    }
    if blocked.is_none() {
        return Err(WorkflowError::UnknownUser(blocked_id.to_string()));
    }

    let block = repo.block_user(blocker_id, blocked_id).await?;
    tracing::info!("{} blocked {}", blocker_id, blocked_id);
    Ok(block)
}

/// Lift a block. Returns whether one existed.
pub async fn unblock_user<R>(repo: &R, blocker_id: &str, blocked_id: &str) -> Result<bool, WorkflowError>
where
    R: MatchRepository + ?Sized,
{
    let removed = repo.unblock_user(blocker_id, blocked_id).await?;
    if removed {
        tracing::info!("{} unblocked {}", blocker_id, blocked_id);
    }
    Ok(removed)
}
