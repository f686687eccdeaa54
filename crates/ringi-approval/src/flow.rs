//! Approval flow configuration.
//!
//! An [`ApprovalFlow`] is a reusable pipeline for one business area: a flat
//! applicability matcher ([`FlowConditions`]), who may submit against it,
//! and an ordered list of [`ApprovalStep`]s. Step 0 is the synthetic
//! "request created" step and never votes.
//!
//! Flows are decoded once from JSON and checked with
//! [`ApprovalFlow::validate`] before they are served to the engine.

use ringi_core::condition::as_number;
use ringi_core::types::canonical_id;
use ringi_core::{ConditionNode, Principal, PrincipalKind, PrincipalRef};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{ApprovalError, ApprovalResult};
use crate::request::{RequestStatus, SubStatus};

/// Maximum nesting of conditional approvers accepted by validation.
pub const MAX_APPROVER_DEPTH: usize = 8;

/// Identifier of a flow record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub i64);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow:{}", self.0)
    }
}

fn de_id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    values
        .iter()
        .map(|v| {
            canonical_id(v).ok_or_else(|| {
                de::Error::custom(format!("expected a string or integer identifier, found {v}"))
            })
        })
        .collect()
}

/// Structural applicability matcher for a flow.
///
/// Each present bound must hold against the submitted data. Empty lists
/// count as absent, so an all-default value matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowConditions {
    /// Inclusive lower bound on `data.amount`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_min: Option<f64>,
    /// Inclusive upper bound on `data.amount`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_max: Option<f64>,
    /// Allowed values of `data.department_id`.
    #[serde(default, deserialize_with = "de_id_list", skip_serializing_if = "Vec::is_empty")]
    pub departments: Vec<String>,
    /// Allowed values of `data.vendor_type`.
    #[serde(default, deserialize_with = "de_id_list", skip_serializing_if = "Vec::is_empty")]
    pub vendor_types: Vec<String>,
    /// Allowed values of `data.project_type`.
    #[serde(default, deserialize_with = "de_id_list", skip_serializing_if = "Vec::is_empty")]
    pub project_types: Vec<String>,
}

impl FlowConditions {
    /// Whether no bound is set.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.amount_min.is_none()
            && self.amount_max.is_none()
            && self.departments.is_empty()
            && self.vendor_types.is_empty()
            && self.project_types.is_empty()
    }

    /// Whether `data` satisfies every present bound.
    ///
    /// A bound whose field is missing or not comparable does not hold.
    #[must_use]
    pub fn matches(&self, data: &Value) -> bool {
        if self.amount_min.is_some() || self.amount_max.is_some() {
            let Some(amount) = data.get("amount").and_then(as_number) else {
                return false;
            };
            if self.amount_min.is_some_and(|min| amount < min)
                || self.amount_max.is_some_and(|max| amount > max)
            {
                return false;
            }
        }

        one_of(&self.departments, data.get("department_id"))
            && one_of(&self.vendor_types, data.get("vendor_type"))
            && one_of(&self.project_types, data.get("project_type"))
    }
}

fn one_of(allowed: &[String], value: Option<&Value>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    value
        .and_then(canonical_id)
        .is_some_and(|v| allowed.iter().any(|a| *a == v))
}

/// How a step's votes combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalType {
    /// Every resolved approver must approve.
    #[default]
    Required,
    /// Any one approval satisfies the step.
    Optional,
    /// Strictly more than half of the resolved approvers must approve.
    Majority,
    /// Every resolved approver must approve.
    Unanimous,
}

impl ApprovalType {
    /// Whether `approved` of `total` slots satisfy the step.
    #[must_use]
    pub fn is_satisfied(self, approved: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        match self {
            Self::Required | Self::Unanimous => approved >= total,
            Self::Optional => approved >= 1,
            Self::Majority => approved.saturating_mul(2) > total,
        }
    }
}

/// Where a returned request restarts when it is resubmitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnTarget {
    /// The first voting step.
    #[default]
    FirstStep,
    /// The step that issued the return.
    SameStep,
    /// One voting step before the one that issued the return.
    PreviousStep,
}

impl ReturnTarget {
    /// The wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstStep => "first_step",
            Self::SameStep => "same_step",
            Self::PreviousStep => "previous_step",
        }
    }
}

impl std::str::FromStr for ReturnTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_step" => Ok(Self::FirstStep),
            "same_step" => Ok(Self::SameStep),
            "previous_step" => Ok(Self::PreviousStep),
            other => Err(format!(
                "unknown return target `{other}` (expected first_step, same_step or previous_step)"
            )),
        }
    }
}

/// Per-state permission flags for editing or cancelling a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateGate {
    /// Allowed while pending.
    pub pending: bool,
    /// Allowed while under review.
    pub reviewing: bool,
    /// Allowed while returned to the requester.
    pub returned: bool,
    /// Additionally required when the current step already has an approval.
    pub partially_approved: bool,
}

impl StateGate {
    /// Open while pending or returned, closed otherwise.
    #[must_use]
    pub fn pending_or_returned() -> Self {
        Self {
            pending: true,
            reviewing: false,
            returned: true,
            partially_approved: false,
        }
    }

    /// Whether the gate is open for this `(status, sub_status)` pair.
    #[must_use]
    pub fn allows(&self, status: RequestStatus, sub_status: SubStatus) -> bool {
        let by_status = match status {
            RequestStatus::Pending => self.pending,
            RequestStatus::Reviewing => self.reviewing,
            RequestStatus::Returned => self.returned,
            _ => false,
        };
        by_status && (sub_status != SubStatus::PartiallyApproved || self.partially_approved)
    }
}

/// Someone eligible to vote at a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Approver {
    /// A fixed principal reference.
    Static(PrincipalRef),
    /// A branch that contributes `approvers` only when `condition` holds.
    Conditional {
        /// Guard, evaluated against the request context.
        condition: ConditionNode,
        /// Approvers contributed when the guard holds.
        approvers: Vec<Approver>,
    },
}

impl Approver {
    /// Nesting depth; a static approver has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Static(_) => 1,
            Self::Conditional { approvers, .. } => approvers
                .iter()
                .map(Self::depth)
                .max()
                .unwrap_or(0)
                .saturating_add(1),
        }
    }
}

impl From<PrincipalRef> for Approver {
    fn from(r: PrincipalRef) -> Self {
        Self::Static(r)
    }
}

#[derive(Deserialize)]
struct RawApprover {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    condition: Option<ConditionNode>,
    #[serde(default)]
    approvers: Option<Vec<Approver>>,
}

impl<'de> Deserialize<'de> for Approver {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawApprover::deserialize(deserializer)?;
        let kind = match raw.kind.as_str() {
            "conditional" => {
                let condition = raw
                    .condition
                    .ok_or_else(|| de::Error::missing_field("condition"))?;
                let approvers = raw
                    .approvers
                    .ok_or_else(|| de::Error::missing_field("approvers"))?;
                return Ok(Self::Conditional {
                    condition,
                    approvers,
                });
            },
            "user" => PrincipalKind::User,
            "department" => PrincipalKind::Department,
            "position" => PrincipalKind::Position,
            "system_level" => PrincipalKind::SystemLevel,
            other => {
                return Err(de::Error::unknown_variant(other, &[
                    "user",
                    "department",
                    "position",
                    "system_level",
                    "conditional",
                ]));
            },
        };
        let value = raw.value.ok_or_else(|| de::Error::missing_field("value"))?;
        let value = canonical_id(&value).ok_or_else(|| {
            de::Error::custom(format!("expected a string or integer approver value, found {value}"))
        })?;
        Ok(Self::Static(PrincipalRef::new(kind, value)))
    }
}

impl Serialize for Approver {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Static(r) => r.serialize(serializer),
            Self::Conditional {
                condition,
                approvers,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", "conditional")?;
                map.serialize_entry("condition", condition)?;
                map.serialize_entry("approvers", approvers)?;
                map.end()
            },
        }
    }
}

/// One stage of a flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalStep {
    /// Position in the flow; 0 is the creation step.
    pub step: u32,
    /// Display name.
    pub name: String,
    /// Who may vote.
    pub approvers: Vec<Approver>,
    /// How votes combine.
    pub approval_type: ApprovalType,
    /// Record an implicit approval when the requester is an approver.
    pub auto_approve_if_requester: bool,
    /// When the requester may edit the request.
    pub editing_conditions: StateGate,
    /// When the requester may cancel the request.
    pub cancellation_conditions: StateGate,
}

impl ApprovalStep {
    /// Create a voting step with default gates.
    #[must_use]
    pub fn new(step: u32, name: impl Into<String>, approval_type: ApprovalType) -> Self {
        Self {
            step,
            name: name.into(),
            approvers: Vec::new(),
            approval_type,
            auto_approve_if_requester: false,
            editing_conditions: StateGate::pending_or_returned(),
            cancellation_conditions: StateGate::pending_or_returned(),
        }
    }

    /// Add an approver.
    #[must_use]
    pub fn with_approver(mut self, approver: impl Into<Approver>) -> Self {
        self.approvers.push(approver.into());
        self
    }

    /// Enable requester auto-approval.
    #[must_use]
    pub fn with_auto_approve(mut self) -> Self {
        self.auto_approve_if_requester = true;
        self
    }

    /// Replace the cancellation gate.
    #[must_use]
    pub fn with_cancellation(mut self, gate: StateGate) -> Self {
        self.cancellation_conditions = gate;
        self
    }

    /// Replace the editing gate.
    #[must_use]
    pub fn with_editing(mut self, gate: StateGate) -> Self {
        self.editing_conditions = gate;
        self
    }

    /// Whether this step collects votes.
    #[must_use]
    pub fn is_voting(&self) -> bool {
        self.step > 0
    }
}

#[derive(Deserialize)]
struct StepCondition {
    #[serde(rename = "type")]
    kind: Option<ApprovalType>,
}

#[derive(Deserialize)]
struct RawStep {
    step: u32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    approvers: Vec<Approver>,
    #[serde(default)]
    approval_type: Option<ApprovalType>,
    #[serde(default)]
    condition: Option<StepCondition>,
    #[serde(default)]
    auto_approve_if_requester: bool,
    #[serde(default)]
    editing_conditions: Option<StateGate>,
    #[serde(default)]
    cancellation_conditions: Option<StateGate>,
}

impl<'de> Deserialize<'de> for ApprovalStep {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawStep::deserialize(deserializer)?;
        let aliased = raw.condition.and_then(|c| c.kind);
        let approval_type = match (raw.approval_type, aliased) {
            (Some(a), Some(b)) if a != b => {
                return Err(de::Error::custom(format!(
                    "step {}: approval_type {a:?} conflicts with condition.type {b:?}",
                    raw.step
                )));
            },
            (Some(t), _) | (None, Some(t)) => t,
            (None, None) => ApprovalType::default(),
        };
        Ok(Self {
            step: raw.step,
            name: raw.name,
            approvers: raw.approvers,
            approval_type,
            auto_approve_if_requester: raw.auto_approve_if_requester,
            editing_conditions: raw
                .editing_conditions
                .unwrap_or_else(StateGate::pending_or_returned),
            cancellation_conditions: raw
                .cancellation_conditions
                .unwrap_or_else(StateGate::pending_or_returned),
        })
    }
}

fn default_active() -> bool {
    true
}

/// A configured approval pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalFlow {
    /// Record identifier; breaks priority ties (lower first).
    pub id: FlowId,
    /// Business area this flow serves, e.g. `estimate`.
    pub flow_type: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Applicability matcher.
    #[serde(default)]
    pub conditions: FlowConditions,
    /// Who may submit; empty means anyone.
    #[serde(default)]
    pub requesters: Vec<PrincipalRef>,
    /// The steps, keyed by their `step` number.
    pub approval_steps: Vec<ApprovalStep>,
    /// Selection order key; lower is more specific.
    #[serde(default)]
    pub priority: i32,
    /// Inactive flows are never selected.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Restart point after a return; the engine default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_target: Option<ReturnTarget>,
    /// Request lifetime; the engine default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_after_hours: Option<u32>,
}

impl ApprovalFlow {
    /// Create an active catch-all flow with no steps.
    #[must_use]
    pub fn new(id: i64, flow_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: FlowId(id),
            flow_type: flow_type.into(),
            name: name.into(),
            conditions: FlowConditions::default(),
            requesters: Vec::new(),
            approval_steps: Vec::new(),
            priority: 0,
            is_active: true,
            return_target: None,
            expires_after_hours: None,
        }
    }

    /// Append a step.
    #[must_use]
    pub fn with_step(mut self, step: ApprovalStep) -> Self {
        self.approval_steps.push(step);
        self
    }

    /// Set the applicability matcher.
    #[must_use]
    pub fn with_conditions(mut self, conditions: FlowConditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Restrict who may submit.
    #[must_use]
    pub fn with_requester(mut self, requester: PrincipalRef) -> Self {
        self.requesters.push(requester);
        self
    }

    /// Set the return target.
    #[must_use]
    pub fn with_return_target(mut self, target: ReturnTarget) -> Self {
        self.return_target = Some(target);
        self
    }

    /// Set the request lifetime.
    #[must_use]
    pub fn with_expiry_hours(mut self, hours: u32) -> Self {
        self.expires_after_hours = Some(hours);
        self
    }

    /// Mark the flow inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Look up a step by number.
    #[must_use]
    pub fn step(&self, number: u32) -> Option<&ApprovalStep> {
        self.approval_steps.iter().find(|s| s.step == number)
    }

    fn voting_numbers(&self) -> BTreeSet<u32> {
        self.approval_steps
            .iter()
            .filter(|s| s.is_voting())
            .map(|s| s.step)
            .collect()
    }

    /// The first step that collects votes.
    #[must_use]
    pub fn first_voting_step(&self) -> Option<u32> {
        self.voting_numbers().first().copied()
    }

    /// The voting step after `step`, if any.
    #[must_use]
    pub fn next_voting_step(&self, step: u32) -> Option<u32> {
        self.voting_numbers().into_iter().find(|&n| n > step)
    }

    /// The voting step before `step`, if any.
    #[must_use]
    pub fn previous_voting_step(&self, step: u32) -> Option<u32> {
        self.voting_numbers().into_iter().rev().find(|&n| n < step)
    }

    /// Whether `principal` may submit against this flow.
    #[must_use]
    pub fn can_submit(&self, principal: &Principal) -> bool {
        self.requesters.is_empty() || self.requesters.iter().any(|r| r.matches(principal))
    }

    /// Check the structural invariants of the flow.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Configuration`] naming the first violation.
    pub fn validate(&self) -> ApprovalResult<()> {
        let fail = |msg: String| Err(ApprovalError::Configuration(format!("{}: {msg}", self.id)));

        let mut numbers: Vec<u32> = self.approval_steps.iter().map(|s| s.step).collect();
        numbers.sort_unstable();
        if let Some(pair) = numbers.windows(2).find(|w| w[0] == w[1]) {
            return fail(format!("step {} is defined more than once", pair[0]));
        }

        let Some(&start) = numbers.first() else {
            return fail("flow has no steps".to_owned());
        };
        if start > 1 {
            return fail(format!("steps must start at 0 or 1, found {start}"));
        }
        let mut expected = start;
        for &n in &numbers {
            if n != expected {
                return fail(format!("steps must be contiguous; expected {expected}, found {n}"));
            }
            expected = expected.saturating_add(1);
        }

        if !self.approval_steps.iter().any(ApprovalStep::is_voting) {
            return fail("flow has no voting step".to_owned());
        }

        for step in &self.approval_steps {
            if !step.is_voting() {
                if !step.approvers.is_empty() {
                    return fail("step 0 must not have approvers".to_owned());
                }
                continue;
            }
            if step.approvers.is_empty() {
                return fail(format!("step {} has no approvers", step.step));
            }
            for approver in &step.approvers {
                if approver.depth() > MAX_APPROVER_DEPTH {
                    return fail(format!(
                        "step {}: conditional approvers nest deeper than {MAX_APPROVER_DEPTH}",
                        step.step
                    ));
                }
                if has_empty_branch(approver) {
                    return fail(format!(
                        "step {}: conditional approver has no approvers",
                        step.step
                    ));
                }
            }
            if step
                .approvers
                .iter()
                .all(|a| matches!(a, Approver::Conditional { .. }))
            {
                tracing::warn!(
                    flow_id = self.id.0,
                    step = step.step,
                    "step has only conditional approvers and may be unsatisfiable"
                );
            }
        }
        Ok(())
    }
}

fn has_empty_branch(approver: &Approver) -> bool {
    match approver {
        Approver::Static(_) => false,
        Approver::Conditional { approvers, .. } => {
            approvers.is_empty() || approvers.iter().any(has_empty_branch)
        },
    }
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod tests;
