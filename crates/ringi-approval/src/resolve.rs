//! Expansion of a step's approvers into concrete voting slots.

use ringi_core::{Context, Principal, PrincipalRef};

use crate::error::{ApprovalError, ApprovalResult};
use crate::flow::{ApprovalStep, Approver};

/// Expand `approvers` against `ctx` into distinct static references.
///
/// Conditional branches contribute only when their guard holds. Order is
/// first-seen.
#[must_use]
pub fn resolve_approvers(approvers: &[Approver], ctx: &Context) -> Vec<PrincipalRef> {
    let mut out = Vec::new();
    collect(approvers, ctx, &mut out);
    out
}

fn collect(approvers: &[Approver], ctx: &Context, out: &mut Vec<PrincipalRef>) {
    for approver in approvers {
        match approver {
            Approver::Static(r) => {
                if !out.contains(r) {
                    out.push(r.clone());
                }
            },
            Approver::Conditional {
                condition,
                approvers,
            } => {
                if condition.evaluate(ctx) {
                    collect(approvers, ctx, out);
                }
            },
        }
    }
}

/// The voting slots of one step for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    /// Step number.
    pub step: u32,
    /// Distinct approver slots.
    pub slots: Vec<PrincipalRef>,
}

impl ResolvedStep {
    /// Resolve `step` against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Configuration`] when no approver resolves, in
    /// which case the step can never be satisfied.
    pub fn resolve(step: &ApprovalStep, ctx: &Context) -> ApprovalResult<Self> {
        let slots = resolve_approvers(&step.approvers, ctx);
        if slots.is_empty() {
            tracing::warn!(step = step.step, "no approver resolves for step");
            return Err(ApprovalError::Configuration(format!(
                "step {} has no approver for this request",
                step.step
            )));
        }
        Ok(Self {
            step: step.step,
            slots,
        })
    }

    /// The slots `principal` fills.
    #[must_use]
    pub fn matching(&self, principal: &Principal) -> Vec<PrincipalRef> {
        self.slots
            .iter()
            .filter(|slot| slot.matches(principal))
            .cloned()
            .collect()
    }

    /// Whether `principal` fills at least one slot.
    #[must_use]
    pub fn is_approver(&self, principal: &Principal) -> bool {
        self.slots.iter().any(|slot| slot.matches(principal))
    }

    /// How many slots are filled by any of `voters`.
    #[must_use]
    pub fn filled_by<'a>(&self, voters: impl IntoIterator<Item = &'a Principal>) -> usize {
        let voters: Vec<&Principal> = voters.into_iter().collect();
        self.slots
            .iter()
            .filter(|slot| voters.iter().any(|v| slot.matches(v)))
            .count()
    }
}
