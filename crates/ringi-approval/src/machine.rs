//! The approval step state machine.
//!
//! [`StepMachine`] applies one transition to one [`ApprovalRequest`] in
//! memory. It never performs I/O: the engine loads the request, runs a
//! transition under the request's lock, and persists the result.
//!
//! ```text
//! submit ──► Pending ──start_reviewing──► Reviewing ──approve (step satisfied)──► Pending (next step)
//!              │                              │                               └─► Approved (last step)
//!              │                              ├──reject──► Rejected
//!              │                              └──return──► Returned ──resubmit──► Pending (return target)
//!              └──cancel (gate permitting)──► Cancelled
//! any non-terminal state past its deadline ──► Expired
//! ```
//!
//! Approver guards are evaluated with `user` bound to the requester, so the
//! resolved slots of a step depend only on the request, never on who asks.

use chrono::{DateTime, FixedOffset, Utc};
use ringi_core::{Context, Principal};
use serde_json::Value;

use crate::error::{ApprovalError, ApprovalResult};
use crate::flow::{ApprovalFlow, ApprovalStep, ReturnTarget};
use crate::request::{
    ApprovalRequest, RequestId, RequestStatus, Submission, Vote, VoteAction,
};
use crate::resolve::ResolvedStep;

/// Comment recorded on implicit requester approvals.
pub const AUTO_APPROVE_COMMENT: &str = "auto-approved: requester is an approver";

/// Applies transitions for requests of a single flow at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct StepMachine<'a> {
    flow: &'a ApprovalFlow,
    now: DateTime<Utc>,
    offset: FixedOffset,
    return_target: ReturnTarget,
}

impl<'a> StepMachine<'a> {
    /// Create a machine for `flow` at instant `now`.
    ///
    /// `offset` is the local offset used to build `current_time.*`.
    #[must_use]
    pub fn new(flow: &'a ApprovalFlow, now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            flow,
            now,
            offset,
            return_target: flow.return_target.unwrap_or_default(),
        }
    }

    /// Use `target` when the flow does not set its own return target.
    #[must_use]
    pub fn with_default_return_target(mut self, target: ReturnTarget) -> Self {
        self.return_target = self.flow.return_target.unwrap_or(target);
        self
    }

    /// The return target in effect.
    #[must_use]
    pub fn return_target(&self) -> ReturnTarget {
        self.return_target
    }

    /// The evaluation context of `request`: the requester as `user`, its
    /// data snapshot, its metadata, and the machine's instant.
    #[must_use]
    pub fn context(&self, request: &ApprovalRequest) -> Context {
        Context::builder()
            .user(&request.created_by)
            .data(request.data.clone())
            .request(request.request_meta.clone())
            .at(self.now, self.offset)
            .build()
    }

    fn flow_step(&self, number: u32) -> ApprovalResult<&'a ApprovalStep> {
        self.flow.step(number).ok_or_else(|| {
            ApprovalError::Configuration(format!("{} has no step {number}", self.flow.id))
        })
    }

    /// Resolve the approver slots of the request's current step.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Configuration`] if the step is missing or no
    /// approver resolves.
    pub fn resolve_current(&self, request: &ApprovalRequest) -> ApprovalResult<ResolvedStep> {
        let step = self.flow_step(request.current_step)?;
        ResolvedStep::resolve(step, &self.context(request))
    }

    /// Create a request on the first voting step.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::PermissionDenied`] if `requester` may not submit.
    /// - [`ApprovalError::Configuration`] if the flow has no satisfiable
    ///   first step.
    pub fn submit(
        &self,
        requester: Principal,
        submission: Submission,
        expires_at: Option<DateTime<Utc>>,
    ) -> ApprovalResult<ApprovalRequest> {
        if !self.flow.can_submit(&requester) {
            return Err(ApprovalError::denied(
                &requester,
                format!("not an eligible requester for {}", self.flow.id),
            ));
        }
        let first = self.flow.first_voting_step().ok_or_else(|| {
            ApprovalError::Configuration(format!("{} has no voting step", self.flow.id))
        })?;

        let mut request = ApprovalRequest {
            id: RequestId::new(),
            flow_id: self.flow.id,
            business_code: self.flow.flow_type.clone(),
            data_ref: submission.data_ref,
            data: submission.data,
            request_meta: submission.request_meta,
            status: RequestStatus::Pending,
            current_step: first,
            round: 1,
            per_step_votes: std::collections::BTreeMap::new(),
            created_by: requester,
            created_at: self.now,
            updated_at: self.now,
            expires_at,
            reviewer: None,
            returned_from: None,
            version: 0,
        };
        self.enter_step(&mut request, first)?;

        tracing::info!(
            request_id = %request.id,
            flow_id = self.flow.id.0,
            step = request.current_step,
            actor = %request.created_by,
            status = %request.status,
            "approval request submitted"
        );
        Ok(request)
    }

    /// Pick up the current step for review.
    ///
    /// Returns `false` when `actor` already holds the review (no change).
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::InvalidStateTransition`] on terminal or returned
    ///   requests, or when another approver holds the review.
    /// - [`ApprovalError::PermissionDenied`] if `actor` is not an approver of
    ///   the current step.
    pub fn start_reviewing(
        &self,
        request: &mut ApprovalRequest,
        actor: &Principal,
    ) -> ApprovalResult<bool> {
        const ACTION: &str = "start reviewing";
        ensure_active(request, ACTION)?;
        match request.status {
            RequestStatus::Pending => {},
            RequestStatus::Reviewing if request.reviewer.as_ref() == Some(&actor.id) => {
                return Ok(false);
            },
            RequestStatus::Reviewing => {
                return Err(ApprovalError::invalid(
                    request.status,
                    ACTION,
                    "another approver is already reviewing",
                ));
            },
            status => {
                return Err(ApprovalError::invalid(
                    status,
                    ACTION,
                    "request is waiting for resubmission",
                ));
            },
        }

        let resolved = self.resolve_current(request)?;
        if !resolved.is_approver(actor) {
            return Err(ApprovalError::denied(
                actor,
                format!("not an approver of step {}", request.current_step),
            ));
        }

        request.status = RequestStatus::Reviewing;
        request.reviewer = Some(actor.id.clone());
        tracing::info!(
            request_id = %request.id,
            step = request.current_step,
            actor = %actor,
            "review started"
        );
        Ok(true)
    }

    /// Record a vote on the current step and apply its consequence.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::InvalidStateTransition`] unless the request is
    ///   under review, or if `actor` already voted on this step this round.
    /// - [`ApprovalError::PermissionDenied`] if `actor` is not an approver of
    ///   the current step.
    /// - [`ApprovalError::Configuration`] if the next step cannot be entered.
    pub fn vote(
        &self,
        request: &mut ApprovalRequest,
        actor: &Principal,
        action: VoteAction,
        comment: Option<String>,
    ) -> ApprovalResult<()> {
        let verb = action.to_string();
        ensure_active(request, &verb)?;
        if request.status != RequestStatus::Reviewing {
            return Err(ApprovalError::invalid(
                request.status,
                verb,
                "request is not under review",
            ));
        }

        let number = request.current_step;
        let resolved = self.resolve_current(request)?;
        let matched = resolved.matching(actor);
        if matched.is_empty() {
            return Err(ApprovalError::denied(
                actor,
                format!("not an approver of step {number}"),
            ));
        }
        if request.has_voted(&actor.id, number) {
            return Err(ApprovalError::invalid(
                request.status,
                verb,
                format!("{actor} already voted on step {number}"),
            ));
        }

        request.record(Vote {
            voter: actor.clone(),
            matched,
            step: number,
            round: request.round,
            action,
            acted_at: self.now,
            comment,
            implicit: false,
        });

        match action {
            VoteAction::Reject => {
                request.status = RequestStatus::Rejected;
                request.reviewer = None;
            },
            VoteAction::Return => {
                request.status = RequestStatus::Returned;
                request.returned_from = Some(number);
                request.reviewer = None;
            },
            VoteAction::Approve => {
                let step = self.flow_step(number)?;
                if is_satisfied(request, step, &resolved) {
                    self.advance(request, number)?;
                }
            },
        }

        tracing::info!(
            request_id = %request.id,
            step = number,
            actor = %actor,
            action = %action,
            status = %request.status,
            current_step = request.current_step,
            "vote recorded"
        );
        Ok(())
    }

    /// Withdraw the request.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::PermissionDenied`] unless `actor` is the requester.
    /// - [`ApprovalError::InvalidStateTransition`] if the request is terminal
    ///   or the current step's cancellation gate is closed.
    pub fn cancel(&self, request: &mut ApprovalRequest, actor: &Principal) -> ApprovalResult<()> {
        const ACTION: &str = "cancel";
        ensure_active(request, ACTION)?;
        if actor.id != request.created_by.id {
            return Err(ApprovalError::denied(actor, "only the requester may cancel"));
        }

        let step = self.flow_step(request.current_step)?;
        if !step
            .cancellation_conditions
            .allows(request.status, request.sub_status())
        {
            return Err(ApprovalError::invalid(
                request.status,
                ACTION,
                format!("cancellation is closed at step {} in this state", step.step),
            ));
        }

        let from = request.status;
        request.status = RequestStatus::Cancelled;
        request.reviewer = None;
        tracing::info!(request_id = %request.id, actor = %actor, %from, "request cancelled");
        Ok(())
    }

    /// Whether `actor` may edit the request's data right now.
    #[must_use]
    pub fn can_edit(&self, request: &ApprovalRequest, actor: &Principal) -> bool {
        if request.status.is_terminal() || actor.id != request.created_by.id {
            return false;
        }
        self.flow.step(request.current_step).is_some_and(|step| {
            step.editing_conditions
                .allows(request.status, request.sub_status())
        })
    }

    /// Send a returned request back into approval, optionally with new data.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::PermissionDenied`] unless `actor` is the requester.
    /// - [`ApprovalError::InvalidStateTransition`] unless the request is
    ///   returned.
    /// - [`ApprovalError::Configuration`] if the target step cannot be entered.
    pub fn resubmit(
        &self,
        request: &mut ApprovalRequest,
        actor: &Principal,
        data: Option<Value>,
    ) -> ApprovalResult<()> {
        const ACTION: &str = "resubmit";
        ensure_active(request, ACTION)?;
        if actor.id != request.created_by.id {
            return Err(ApprovalError::denied(actor, "only the requester may resubmit"));
        }
        if request.status != RequestStatus::Returned {
            return Err(ApprovalError::invalid(
                request.status,
                ACTION,
                "only returned requests can be resubmitted",
            ));
        }

        let first = self.flow.first_voting_step().ok_or_else(|| {
            ApprovalError::Configuration(format!("{} has no voting step", self.flow.id))
        })?;
        let from = request.returned_from.unwrap_or(request.current_step);
        let target = match self.return_target {
            ReturnTarget::FirstStep => first,
            ReturnTarget::SameStep => from,
            ReturnTarget::PreviousStep => self.flow.previous_voting_step(from).unwrap_or(first),
        };

        if let Some(data) = data {
            request.data = data;
        }
        request.round = request.round.saturating_add(1);
        self.enter_step(request, target)?;

        tracing::info!(
            request_id = %request.id,
            round = request.round,
            step = request.current_step,
            status = %request.status,
            "request resubmitted"
        );
        Ok(())
    }

    /// Move the request to `Expired` if its deadline has passed.
    ///
    /// Returns whether the request changed.
    pub fn expire_if_due(&self, request: &mut ApprovalRequest) -> bool {
        if !request.is_due(self.now) {
            return false;
        }
        let from = request.status;
        request.status = RequestStatus::Expired;
        request.reviewer = None;
        request.updated_at = self.now;
        tracing::info!(request_id = %request.id, %from, "request expired");
        true
    }

    fn advance(&self, request: &mut ApprovalRequest, from: u32) -> ApprovalResult<()> {
        match self.flow.next_voting_step(from) {
            Some(next) => self.enter_step(request, next),
            None => {
                request.status = RequestStatus::Approved;
                request.reviewer = None;
                tracing::info!(request_id = %request.id, "request approved");
                Ok(())
            },
        }
    }

    /// Make `number` the current step, then cascade through requester
    /// auto-approvals for as long as they satisfy the step entered.
    fn enter_step(&self, request: &mut ApprovalRequest, number: u32) -> ApprovalResult<()> {
        let mut number = number;
        loop {
            request.current_step = number;
            request.status = RequestStatus::Pending;
            request.reviewer = None;

            let step = self.flow_step(number)?;
            let resolved = ResolvedStep::resolve(step, &self.context(request))?;
            if !step.auto_approve_if_requester || request.has_voted(&request.created_by.id, number) {
                return Ok(());
            }
            let matched = resolved.matching(&request.created_by);
            if matched.is_empty() {
                return Ok(());
            }

            request.record(Vote {
                voter: request.created_by.clone(),
                matched,
                step: number,
                round: request.round,
                action: VoteAction::Approve,
                acted_at: self.now,
                comment: Some(AUTO_APPROVE_COMMENT.to_owned()),
                implicit: true,
            });
            tracing::debug!(request_id = %request.id, step = number, "requester auto-approved step");

            if !is_satisfied(request, step, &resolved) {
                return Ok(());
            }
            match self.flow.next_voting_step(number) {
                Some(next) => number = next,
                None => {
                    request.status = RequestStatus::Approved;
                    tracing::info!(request_id = %request.id, "request approved");
                    return Ok(());
                },
            }
        }
    }
}

fn is_satisfied(request: &ApprovalRequest, step: &ApprovalStep, resolved: &ResolvedStep) -> bool {
    let approvals = request
        .current_votes(step.step)
        .filter(|v| v.action == VoteAction::Approve)
        .map(|v| &v.voter);
    let filled = resolved.filled_by(approvals);
    step.approval_type.is_satisfied(filled, resolved.slots.len())
}

fn ensure_active(request: &ApprovalRequest, action: &str) -> ApprovalResult<()> {
    if request.status.is_terminal() {
        return Err(ApprovalError::invalid(
            request.status,
            action,
            format!("request is already {}", request.status),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
