use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::models::ChallengeEntity,
    dto::{
        common::RangeDto,
        format_timestamp, format_timestamp_opt,
        validation::{NUMBER_MIN, validate_user_id},
    },
    state::lifecycle::{ChallengeStatus, MatchOutcome},
};

/// Payload used to issue a new challenge.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateChallengeRequest {
    /// What the challenge is about.
    pub description: String,
    /// Initiator uid; must match the authenticated caller.
    pub from_user: String,
    /// Recipient uid.
    pub to_user: String,
}

impl Validate for CreateChallengeRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let description = self.description.trim();
        if description.is_empty() || description.len() > 500 {
            let mut err = ValidationError::new("description_length");
            err.message = Some("Description must be between 1 and 500 characters".into());
            errors.add("description", err);
        }

        if let Err(err) = validate_user_id(&self.from_user) {
            errors.add("from_user", err);
        }
        if let Err(err) = validate_user_id(&self.to_user) {
            errors.add("to_user", err);
        }
        if !self.from_user.trim().is_empty() && self.from_user == self.to_user {
            let mut err = ValidationError::new("self_challenge");
            err.message = Some("Cannot create challenge for yourself".into());
            errors.add("to_user", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used by the recipient to accept or reject a challenge.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RespondChallengeRequest {
    /// Whether the challenge is accepted.
    pub accepted: bool,
    /// Number range for the game; required when accepting.
    #[serde(default)]
    pub range: Option<RangeDto>,
}

impl Validate for RespondChallengeRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match (&self.accepted, &self.range) {
            (true, Some(range)) => {
                if let Err(range_errors) = range.validate() {
                    errors.merge_self("range", Err(range_errors));
                }
            }
            (true, None) => {
                let mut err = ValidationError::new("range_required");
                err.message = Some("Accepting a challenge requires a number range".into());
                errors.add("range", err);
            }
            (false, _) => {}
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload carrying one participant's own number pick.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitNumberRequest {
    /// The picked number; must lie inside the agreed range.
    #[validate(range(min = 1))]
    pub number: i64,
}

/// Payload used to resolve a challenge with both numbers at once.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveChallengeRequest {
    /// Challenge to resolve.
    pub challenge_id: String,
    /// Submitted numbers keyed by participant uid; exactly the two
    /// participants must appear.
    #[schema(value_type = Object)]
    pub numbers: IndexMap<String, i64>,
}

impl Validate for ResolveChallengeRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.challenge_id.trim().is_empty() {
            let mut err = ValidationError::new("challenge_id_blank");
            err.message = Some("Challenge ID cannot be empty".into());
            errors.add("challenge_id", err);
        }

        if self.numbers.len() != 2 {
            let mut err = ValidationError::new("numbers_arity");
            err.message = Some("Numbers must be provided for exactly 2 users".into());
            errors.add("numbers", err);
        }
        for (user_id, number) in &self.numbers {
            if user_id.trim().is_empty() || *number < NUMBER_MIN {
                let mut err = ValidationError::new("numbers_entry");
                err.message = Some("Invalid user ID or number".into());
                errors.add("numbers", err);
                break;
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Challenge projection exposed to REST and WebSocket clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChallengeSummary {
    /// Challenge id.
    pub id: String,
    /// Challenge description.
    pub description: String,
    /// Initiator uid.
    pub from_user: String,
    /// Recipient uid.
    pub to_user: String,
    /// Resolved display name for the initiator, present on enriched listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_user_display: Option<String>,
    /// Resolved display name for the recipient, present on enriched listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_user_display: Option<String>,
    /// Lifecycle status.
    pub status: ChallengeStatus,
    /// Agreed range, once accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeDto>,
    /// Final numbers keyed by participant, once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub numbers: Option<IndexMap<String, i64>>,
    /// Outcome, once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchOutcome>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last update timestamp (RFC 3339).
    pub updated_at: String,
    /// Completion timestamp (RFC 3339), once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<ChallengeEntity> for ChallengeSummary {
    fn from(entity: ChallengeEntity) -> Self {
        Self {
            id: entity.id,
            description: entity.description,
            from_user: entity.from_user,
            to_user: entity.to_user,
            from_user_display: None,
            to_user_display: None,
            status: entity.status,
            range: entity.range.map(Into::into),
            numbers: entity.numbers,
            result: entity.result,
            created_at: format_timestamp(entity.created_at),
            updated_at: format_timestamp(entity.updated_at),
            completed_at: format_timestamp_opt(entity.completed_at),
        }
    }
}

/// One page of a user's challenges.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengeListResponse {
    /// Challenges on this page.
    pub challenges: Vec<ChallengeSummary>,
    /// Total matching challenges across all pages.
    pub total: usize,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub per_page: u32,
}

/// Quick status tallies over a user's created challenges.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengeQuickStats {
    /// Challenges the user created.
    pub total_challenges: usize,
    /// Still pending.
    pub pending_challenges: usize,
    /// Waiting on the second number.
    pub active_challenges: usize,
    /// Completed.
    pub completed_challenges: usize,
    /// Completed with a match.
    pub matches_won: usize,
    /// Completed without a match.
    pub matches_lost: usize,
}

/// Outcome payload returned by the resolve endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolveChallengeResponse {
    /// Challenge that was resolved.
    pub challenge_id: String,
    /// Match outcome.
    pub result: MatchOutcome,
    /// Submitted numbers keyed by participant.
    #[schema(value_type = Object)]
    pub numbers: IndexMap<String, i64>,
    /// Resolution timestamp (RFC 3339).
    pub resolved_at: String,
}

/// Query parameters for challenge listings.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListChallengesQuery {
    /// Optional status filter (`pending`, `accepted`, `rejected`, `active`,
    /// `completed`).
    #[serde(default)]
    pub status: Option<String>,
    /// 1-based page number.
    #[serde(default)]
    pub page: Option<u32>,
    /// Page size, 1–100.
    #[serde(default)]
    pub per_page: Option<u32>,
}
