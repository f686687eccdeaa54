//! The approval engine: repositories, clock, and per-request serialisation
//! around the [`StepMachine`].
//!
//! Every mutating operation follows the same discipline:
//!
//! 1. Acquire the request's lock from the lock table.
//! 2. Read the request and its flow.
//! 3. Expire it if its deadline has passed (the operation then fails).
//! 4. Apply the transition in memory.
//! 5. Persist with an optimistic version check.
//!
//! A failed transition persists nothing.

use chrono::{DateTime, FixedOffset, Offset, TimeDelta, Utc};
use dashmap::DashMap;
use ringi_core::{Clock, Principal, SystemClock};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{ApprovalError, ApprovalResult};
use crate::flow::{ApprovalFlow, FlowId, ReturnTarget};
use crate::machine::StepMachine;
use crate::repository::FlowRepository;
use crate::request::{ApprovalRequest, RequestId, RequestStatus, Submission, VoteAction};
use crate::selector::FlowSelector;
use crate::store::RequestStore;

/// Default local offset: UTC+9 (JST).
pub const DEFAULT_TIMEZONE_OFFSET_MINUTES: i32 = 540;

/// Upper bound on request lifetimes (ten years).
pub const MAX_REQUEST_TTL_HOURS: u32 = 87_600;

/// Engine-wide defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Offset used to build `current_time.*`.
    pub timezone_offset: FixedOffset,
    /// Request lifetime for flows that do not set one; 0 means none.
    pub default_request_ttl_hours: u32,
    /// Return target for flows that do not set one.
    pub default_return_target: ReturnTarget,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timezone_offset: offset_from_minutes(DEFAULT_TIMEZONE_OFFSET_MINUTES)
                .unwrap_or_else(|| Utc.fix()),
            default_request_ttl_hours: 0,
            default_return_target: ReturnTarget::FirstStep,
        }
    }
}

fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

impl EngineSettings {
    /// Set the local offset in minutes east of UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Configuration`] if the offset is out of range.
    pub fn with_timezone_offset_minutes(mut self, minutes: i32) -> ApprovalResult<Self> {
        self.timezone_offset = offset_from_minutes(minutes).ok_or_else(|| {
            ApprovalError::Configuration(format!("timezone offset {minutes} minutes is out of range"))
        })?;
        Ok(self)
    }

    /// Set the default request lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Configuration`] above [`MAX_REQUEST_TTL_HOURS`].
    pub fn with_default_ttl_hours(mut self, hours: u32) -> ApprovalResult<Self> {
        if hours > MAX_REQUEST_TTL_HOURS {
            return Err(ApprovalError::Configuration(format!(
                "request ttl of {hours} hours exceeds {MAX_REQUEST_TTL_HOURS}"
            )));
        }
        self.default_request_ttl_hours = hours;
        Ok(self)
    }

    /// Set the default return target.
    #[must_use]
    pub fn with_return_target(mut self, target: ReturnTarget) -> Self {
        self.default_return_target = target;
        self
    }
}

/// An action an actor takes on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestAction {
    /// Pick up the current step.
    StartReview,
    /// Approve the current step.
    Approve,
    /// Reject the request.
    Reject,
    /// Return the request to the requester.
    Return,
    /// Withdraw the request (requester only).
    Cancel,
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StartReview => "start reviewing",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Return => "return",
            Self::Cancel => "cancel",
        })
    }
}

/// Drives approval requests through their flows.
pub struct ApprovalEngine {
    flows: Arc<dyn FlowRepository>,
    selector: FlowSelector,
    store: Arc<dyn RequestStore>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    locks: DashMap<RequestId, Arc<Mutex<()>>>,
}

impl fmt::Debug for ApprovalEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalEngine")
            .field("clock", &self.clock)
            .field("settings", &self.settings)
            .field("locked_requests", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl ApprovalEngine {
    /// Create an engine with the system clock and default settings.
    #[must_use]
    pub fn new(flows: Arc<dyn FlowRepository>, store: Arc<dyn RequestStore>) -> Self {
        Self {
            selector: FlowSelector::new(Arc::clone(&flows)),
            flows,
            store,
            clock: Arc::new(SystemClock),
            settings: EngineSettings::default(),
            locks: DashMap::new(),
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The settings in effect.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Select the flow for `data`; `None` is a normal outcome.
    ///
    /// # Errors
    ///
    /// Returns an error only if the flow repository fails.
    pub async fn select_flow(&self, flow_type: &str, data: &Value) -> ApprovalResult<Option<ApprovalFlow>> {
        self.selector.select(flow_type, data).await
    }

    /// Submit data for approval against a specific flow.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::NotFound`] if the flow does not exist or is inactive.
    /// - [`ApprovalError::PermissionDenied`] if `requester` may not submit.
    /// - [`ApprovalError::Configuration`] if the first step is unsatisfiable.
    pub async fn submit(
        &self,
        flow_id: FlowId,
        requester: Principal,
        submission: Submission,
    ) -> ApprovalResult<ApprovalRequest> {
        let flow = self
            .flows
            .flow(flow_id)
            .await?
            .filter(|f| f.is_active)
            .ok_or_else(|| ApprovalError::NotFound(flow_id.to_string()))?;

        let now = self.clock.now();
        let expires_at = self.expiry_for(&flow, now);
        let request = self
            .machine(&flow, now)
            .submit(requester, submission, expires_at)?;
        self.store.insert(request.clone()).await?;
        Ok(request)
    }

    /// Select a flow for the submission's data and submit against it.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::NotFound`] when no flow matches, plus every
    /// error of [`ApprovalEngine::submit`].
    pub async fn select_and_submit(
        &self,
        flow_type: &str,
        requester: Principal,
        submission: Submission,
    ) -> ApprovalResult<ApprovalRequest> {
        let flow = self
            .select_flow(flow_type, &submission.data)
            .await?
            .ok_or_else(|| ApprovalError::NotFound(format!("flow for `{flow_type}`")))?;
        self.submit(flow.id, requester, submission).await
    }

    /// Apply `action` by `actor` to a request.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::NotFound`] if the request does not exist.
    /// - [`ApprovalError::InvalidStateTransition`] for terminal, expired, or
    ///   otherwise ineligible states.
    /// - [`ApprovalError::PermissionDenied`] if `actor` may not act.
    /// - [`ApprovalError::Conflict`] if the stored request changed underneath.
    pub async fn act(
        &self,
        id: &RequestId,
        actor: &Principal,
        action: RequestAction,
        comment: Option<String>,
    ) -> ApprovalResult<ApprovalRequest> {
        let label = action.to_string();
        match action {
            RequestAction::StartReview => {
                self.transition(id, &label, |m, r| m.start_reviewing(r, actor))
                    .await
            },
            RequestAction::Approve | RequestAction::Reject | RequestAction::Return => {
                let vote = match action {
                    RequestAction::Reject => VoteAction::Reject,
                    RequestAction::Return => VoteAction::Return,
                    _ => VoteAction::Approve,
                };
                self.transition(id, &label, move |m, r| {
                    m.vote(r, actor, vote, comment).map(|()| true)
                })
                .await
            },
            RequestAction::Cancel => {
                self.transition(id, &label, |m, r| m.cancel(r, actor).map(|()| true))
                    .await
            },
        }
    }

    /// Send a returned request back into approval.
    ///
    /// # Errors
    ///
    /// See [`StepMachine::resubmit`], plus [`ApprovalError::NotFound`] and
    /// [`ApprovalError::Conflict`].
    pub async fn resubmit(
        &self,
        id: &RequestId,
        actor: &Principal,
        data: Option<Value>,
    ) -> ApprovalResult<ApprovalRequest> {
        self.transition(id, "resubmit", move |m, r| {
            m.resubmit(r, actor, data).map(|()| true)
        })
        .await
    }

    /// Fetch a request, expiring it first if its deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::NotFound`] if the request does not exist.
    pub async fn get(&self, id: &RequestId) -> ApprovalResult<ApprovalRequest> {
        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock().await;
            self.get_locked(id).await
        };
        drop(lock);
        self.forget_lock(id);
        result
    }

    async fn get_locked(&self, id: &RequestId) -> ApprovalResult<ApprovalRequest> {
        let mut request = self.load(id).await?;
        let now = self.clock.now();
        if !request.is_due(now) {
            return Ok(request);
        }
        let flow = self.flow_for(&request).await?;
        let expected = request.version;
        if self.machine(&flow, now).expire_if_due(&mut request) {
            request = self.store.update(request, expected).await?;
        }
        Ok(request)
    }

    /// Whether `actor` may edit the request right now.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::NotFound`] if the request does not exist.
    pub async fn can_edit(&self, id: &RequestId, actor: &Principal) -> ApprovalResult<bool> {
        let request = self.get(id).await?;
        let flow = self.flow_for(&request).await?;
        Ok(self.machine(&flow, self.clock.now()).can_edit(&request, actor))
    }

    /// Expire every open request whose deadline is at or before `now`.
    ///
    /// Returns the ids that were expired.
    ///
    /// # Errors
    ///
    /// Returns the first storage or repository error encountered.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> ApprovalResult<Vec<RequestId>> {
        let mut expired = Vec::new();
        for id in self.store.open_requests().await? {
            let lock = self.lock_for(&id);
            let result = {
                let _guard = lock.lock().await;
                self.expire_locked(&id, now).await
            };
            drop(lock);
            self.forget_lock(&id);
            if result? {
                expired.push(id);
            }
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired overdue approval requests");
        }
        Ok(expired)
    }

    async fn expire_locked(&self, id: &RequestId, now: DateTime<Utc>) -> ApprovalResult<bool> {
        let Some(mut request) = self.store.get(id).await? else {
            return Ok(false);
        };
        if !request.is_due(now) {
            return Ok(false);
        }
        let flow = self.flow_for(&request).await?;
        let expected = request.version;
        if !self.machine(&flow, now).expire_if_due(&mut request) {
            return Ok(false);
        }
        self.store.update(request, expected).await?;
        Ok(true)
    }

    fn machine<'a>(&self, flow: &'a ApprovalFlow, now: DateTime<Utc>) -> StepMachine<'a> {
        StepMachine::new(flow, now, self.settings.timezone_offset)
            .with_default_return_target(self.settings.default_return_target)
    }

    fn expiry_for(&self, flow: &ApprovalFlow, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let hours = flow
            .expires_after_hours
            .unwrap_or(self.settings.default_request_ttl_hours);
        if hours == 0 {
            return None;
        }
        now.checked_add_signed(TimeDelta::try_hours(i64::from(hours))?)
    }

    async fn load(&self, id: &RequestId) -> ApprovalResult<ApprovalRequest> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ApprovalError::NotFound(id.to_string()))
    }

    async fn flow_for(&self, request: &ApprovalRequest) -> ApprovalResult<ApprovalFlow> {
        self.flows
            .flow(request.flow_id)
            .await?
            .ok_or_else(|| ApprovalError::NotFound(request.flow_id.to_string()))
    }

    fn lock_for(&self, id: &RequestId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Drop the lock entry of a request nobody else is holding or waiting on.
    ///
    /// Called on every exit path once the caller's own handle is dropped, so
    /// the table only ever holds entries for in-flight operations.
    fn forget_lock(&self, id: &RequestId) {
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn transition<F>(
        &self,
        id: &RequestId,
        action: &str,
        apply: F,
    ) -> ApprovalResult<ApprovalRequest>
    where
        F: FnOnce(&StepMachine<'_>, &mut ApprovalRequest) -> ApprovalResult<bool> + Send,
    {
        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock().await;
            self.transition_locked(id, action, apply).await
        };
        drop(lock);
        self.forget_lock(id);
        result
    }

    async fn transition_locked<F>(
        &self,
        id: &RequestId,
        action: &str,
        apply: F,
    ) -> ApprovalResult<ApprovalRequest>
    where
        F: FnOnce(&StepMachine<'_>, &mut ApprovalRequest) -> ApprovalResult<bool> + Send,
    {
        let mut request = self.load(id).await?;
        let flow = self.flow_for(&request).await?;
        let now = self.clock.now();
        let machine = self.machine(&flow, now);
        let expected = request.version;

        if machine.expire_if_due(&mut request) {
            self.store.update(request, expected).await?;
            return Err(ApprovalError::invalid(
                RequestStatus::Expired,
                action,
                "request has expired",
            ));
        }

        if !apply(&machine, &mut request)? {
            return Ok(request);
        }
        request.updated_at = now;
        self.store.update(request, expected).await
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
