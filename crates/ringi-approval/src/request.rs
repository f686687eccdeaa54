//! Approval requests and their vote history.

use chrono::{DateTime, Utc};
use ringi_core::{Principal, PrincipalId, PrincipalRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::flow::FlowId;

/// Unique identifier for an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting for an approver of the current step to pick it up.
    Pending,
    /// Under review at the current step.
    Reviewing,
    /// Every voting step was satisfied.
    Approved,
    /// An approver rejected it.
    Rejected,
    /// Sent back to the requester for changes.
    Returned,
    /// Withdrawn by the requester.
    Cancelled,
    /// Passed its deadline before finishing.
    Expired,
}

impl RequestStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::Cancelled | Self::Expired
        )
    }

    /// The wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewing => "reviewing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refinement of the status used by editing and cancellation gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubStatus {
    /// The current step has no approval in this round.
    NoApprovals,
    /// The current step already has at least one approval in this round.
    PartiallyApproved,
}

/// What an approver decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteAction {
    /// Approve the current step.
    Approve,
    /// Reject the whole request.
    Reject,
    /// Send the request back to the requester.
    Return,
}

impl fmt::Display for VoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => f.write_str("approve"),
            Self::Reject => f.write_str("reject"),
            Self::Return => f.write_str("return"),
        }
    }
}

/// One recorded vote. Votes are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Who voted, as they were when voting.
    pub voter: Principal,
    /// The resolved approver slots the voter matched.
    pub matched: Vec<PrincipalRef>,
    /// Step the vote was cast on.
    pub step: u32,
    /// Submission round the vote belongs to.
    pub round: u32,
    /// The decision.
    pub action: VoteAction,
    /// When it was cast.
    pub acted_at: DateTime<Utc>,
    /// Free-form comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Recorded by the engine rather than the voter.
    #[serde(default)]
    pub implicit: bool,
}

/// What the caller submits for approval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    /// Snapshot of the business record.
    pub data: Value,
    /// Reference to the business record in the caller's system.
    pub data_ref: Option<String>,
    /// Request metadata exposed under `request.*`.
    pub request_meta: Value,
}

impl Submission {
    /// Submit a data snapshot.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self {
            data,
            data_ref: None,
            request_meta: Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach a reference to the business record.
    #[must_use]
    pub fn with_data_ref(mut self, data_ref: impl Into<String>) -> Self {
        self.data_ref = Some(data_ref.into());
        self
    }

    /// Attach request metadata.
    #[must_use]
    pub fn with_request_meta(mut self, meta: Value) -> Self {
        self.request_meta = meta;
        self
    }
}

/// A piece of business data moving through an approval flow.
///
/// Only the state machine mutates a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique identifier.
    pub id: RequestId,
    /// The flow driving this request.
    pub flow_id: FlowId,
    /// Business area (the flow's `flow_type`).
    pub business_code: String,
    /// Caller reference to the business record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_ref: Option<String>,
    /// Snapshot of the business record.
    pub data: Value,
    /// Request metadata.
    pub request_meta: Value,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// The step currently collecting votes.
    pub current_step: u32,
    /// Submission round; starts at 1 and increments on resubmission.
    pub round: u32,
    /// Every vote ever cast, by step.
    pub per_step_votes: BTreeMap<u32, Vec<Vote>>,
    /// The requester.
    pub created_by: Principal,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Last transition time.
    pub updated_at: DateTime<Utc>,
    /// Deadline, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Approver who started the review of the current step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<PrincipalId>,
    /// Step that issued the most recent return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_from: Option<u32>,
    /// Optimistic concurrency counter, bumped on every persisted change.
    pub version: u64,
}

impl ApprovalRequest {
    /// Votes on `step` in the current round.
    pub fn current_votes(&self, step: u32) -> impl Iterator<Item = &Vote> {
        let round = self.round;
        self.per_step_votes
            .get(&step)
            .into_iter()
            .flatten()
            .filter(move |v| v.round == round)
    }

    /// Whether `actor` already voted on `step` in the current round.
    #[must_use]
    pub fn has_voted(&self, actor: &PrincipalId, step: u32) -> bool {
        self.current_votes(step).any(|v| v.voter.id == *actor)
    }

    /// Sub-status of the current step.
    #[must_use]
    pub fn sub_status(&self) -> SubStatus {
        if self
            .current_votes(self.current_step)
            .any(|v| v.action == VoteAction::Approve)
        {
            SubStatus::PartiallyApproved
        } else {
            SubStatus::NoApprovals
        }
    }

    /// Total number of votes recorded across all steps and rounds.
    #[must_use]
    pub fn vote_count(&self) -> usize {
        self.per_step_votes.values().map(Vec::len).sum()
    }

    /// Whether the deadline has passed at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.expires_at.is_some_and(|at| now >= at)
    }

    pub(crate) fn record(&mut self, vote: Vote) {
        self.per_step_votes.entry(vote.step).or_default().push(vote);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> ApprovalRequest {
        let now = Utc::now();
        ApprovalRequest {
            id: RequestId::new(),
            flow_id: FlowId(1),
            business_code: "estimate".into(),
            data_ref: None,
            data: json!({}),
            request_meta: json!({}),
            status: RequestStatus::Reviewing,
            current_step: 1,
            round: 2,
            per_step_votes: BTreeMap::new(),
            created_by: Principal::new("1"),
            created_at: now,
            updated_at: now,
            expires_at: None,
            reviewer: None,
            returned_from: None,
            version: 0,
        }
    }

    fn vote(voter: &str, round: u32, action: VoteAction) -> Vote {
        Vote {
            voter: Principal::new(voter),
            matched: vec![PrincipalRef::user(voter)],
            step: 1,
            round,
            action,
            acted_at: Utc::now(),
            comment: None,
            implicit: false,
        }
    }

    #[test]
    fn test_request_id_display() {
        let id = RequestId::new();
        assert!(id.to_string().starts_with("req:"));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Expired.is_terminal());
        assert!(!RequestStatus::Returned.is_terminal());
        assert!(!RequestStatus::Reviewing.is_terminal());
    }

    #[test]
    fn test_only_current_round_counts() {
        let mut r = request();
        r.record(vote("5", 1, VoteAction::Approve));
        assert_eq!(r.sub_status(), SubStatus::NoApprovals);
        assert!(!r.has_voted(&PrincipalId::new("5"), 1));

        r.record(vote("5", 2, VoteAction::Approve));
        assert_eq!(r.sub_status(), SubStatus::PartiallyApproved);
        assert!(r.has_voted(&PrincipalId::new("5"), 1));
        assert_eq!(r.vote_count(), 2);
    }

    #[test]
    fn test_is_due() {
        let mut r = request();
        let now = Utc::now();
        assert!(!r.is_due(now));
        r.expires_at = Some(now);
        assert!(r.is_due(now));
        r.status = RequestStatus::Approved;
        assert!(!r.is_due(now));
    }
}
