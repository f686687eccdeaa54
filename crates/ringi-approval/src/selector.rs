//! Flow selection.
//!
//! Among the active flows of a type whose [`FlowConditions`] match the
//! submitted data, the lowest `priority` wins and ties go to the lowest id.
//! Finding nothing is a normal outcome.
//!
//! [`FlowConditions`]: crate::flow::FlowConditions

use serde_json::Value;
use std::sync::Arc;

use crate::error::ApprovalResult;
use crate::flow::ApprovalFlow;
use crate::repository::FlowRepository;

/// Pick the authoritative flow from `flows` for `data`.
#[must_use]
pub fn select_flow<'a>(
    flows: &'a [ApprovalFlow],
    flow_type: &str,
    data: &Value,
) -> Option<&'a ApprovalFlow> {
    flows
        .iter()
        .filter(|f| f.is_active && f.flow_type == flow_type && f.conditions.matches(data))
        .min_by_key(|f| (f.priority, f.id))
}

/// Selects flows through a [`FlowRepository`].
#[derive(Clone)]
pub struct FlowSelector {
    repository: Arc<dyn FlowRepository>,
}

impl std::fmt::Debug for FlowSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowSelector").finish_non_exhaustive()
    }
}

impl FlowSelector {
    /// Create a selector over `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn FlowRepository>) -> Self {
        Self { repository }
    }

    /// Select the flow for `data`, or `None` if no active flow matches.
    ///
    /// # Errors
    ///
    /// Returns an error only if the repository cannot be read.
    pub async fn select(&self, flow_type: &str, data: &Value) -> ApprovalResult<Option<ApprovalFlow>> {
        let flows = self.repository.active_flows(flow_type).await?;
        let selected = select_flow(&flows, flow_type, data).cloned();
        match &selected {
            Some(flow) => tracing::debug!(
                flow_type,
                flow_id = flow.id.0,
                priority = flow.priority,
                candidates = flows.len(),
                "flow selected"
            ),
            None => tracing::debug!(flow_type, candidates = flows.len(), "no flow matched"),
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{ApprovalStep, ApprovalType, FlowConditions, FlowId};
    use crate::repository::InMemoryFlowRepository;
    use ringi_core::PrincipalRef;
    use serde_json::json;

    fn flow(id: i64, priority: i32, conditions: FlowConditions) -> ApprovalFlow {
        ApprovalFlow::new(id, "estimate", "flow")
            .with_priority(priority)
            .with_conditions(conditions)
            .with_step(
                ApprovalStep::new(1, "review", ApprovalType::Optional)
                    .with_approver(PrincipalRef::user("1")),
            )
    }

    fn small_amounts() -> FlowConditions {
        FlowConditions {
            amount_min: Some(0.0),
            amount_max: Some(1_000_000.0),
            ..FlowConditions::default()
        }
    }

    #[tokio::test]
    async fn test_most_specific_flow_wins() {
        let repo = InMemoryFlowRepository::from_flows(vec![
            flow(1, 10, FlowConditions::default()),
            flow(2, 1, small_amounts()),
        ])
        .unwrap();
        let selector = FlowSelector::new(Arc::new(repo));

        let small = selector.select("estimate", &json!({"amount": 500_000})).await.unwrap();
        assert_eq!(small.unwrap().id, FlowId(2));

        let large = selector.select("estimate", &json!({"amount": 5_000_000})).await.unwrap();
        assert_eq!(large.unwrap().id, FlowId(1));
    }

    #[test]
    fn test_tie_breaks_on_lowest_id() {
        let flows = vec![flow(9, 5, FlowConditions::default()), flow(4, 5, FlowConditions::default())];
        assert_eq!(select_flow(&flows, "estimate", &json!({})).unwrap().id, FlowId(4));
    }

    #[test]
    fn test_no_match_is_none() {
        let flows = vec![flow(1, 1, small_amounts())];
        assert!(select_flow(&flows, "estimate", &json!({"amount": 2_000_000})).is_none());
        assert!(select_flow(&flows, "purchase", &json!({"amount": 1})).is_none());
        assert!(select_flow(&[], "estimate", &json!({})).is_none());
    }

    #[test]
    fn test_inactive_ignored() {
        let flows = vec![flow(1, 1, FlowConditions::default()).inactive(), flow(2, 9, FlowConditions::default())];
        assert_eq!(select_flow(&flows, "estimate", &json!({})).unwrap().id, FlowId(2));
    }
}
