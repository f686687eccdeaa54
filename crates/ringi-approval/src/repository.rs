//! Flow repository collaborator.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{ApprovalError, ApprovalResult};
use crate::flow::{ApprovalFlow, FlowId};

/// Source of already-decoded, validated approval flows.
#[async_trait]
pub trait FlowRepository: Send + Sync {
    /// Active flows of `flow_type`, in any order.
    async fn active_flows(&self, flow_type: &str) -> ApprovalResult<Vec<ApprovalFlow>>;

    /// A flow by id, active or not.
    ///
    /// In-flight requests keep using their flow after it is deactivated.
    async fn flow(&self, id: FlowId) -> ApprovalResult<Option<ApprovalFlow>>;
}

/// In-memory flow repository for tests and file-backed catalogs.
#[derive(Debug, Default)]
pub struct InMemoryFlowRepository {
    flows: RwLock<BTreeMap<FlowId, ApprovalFlow>>,
}

impl InMemoryFlowRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from a catalog, validating every flow.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Configuration`] if a flow is invalid or two
    /// flows share an id.
    pub fn from_flows(flows: Vec<ApprovalFlow>) -> ApprovalResult<Self> {
        let mut map = BTreeMap::new();
        for flow in flows {
            flow.validate()?;
            let id = flow.id;
            if map.insert(id, flow).is_some() {
                return Err(ApprovalError::Configuration(format!("duplicate {id}")));
            }
        }
        Ok(Self {
            flows: RwLock::new(map),
        })
    }

    /// Validate and add or replace a flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the flow is invalid or the lock is poisoned.
    pub fn upsert(&self, flow: ApprovalFlow) -> ApprovalResult<()> {
        flow.validate()?;
        let mut flows = self
            .flows
            .write()
            .map_err(|e| ApprovalError::Repository(e.to_string()))?;
        flows.insert(flow.id, flow);
        Ok(())
    }

    /// Number of stored flows, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flows
            .read()
            .unwrap_or_else(|e| {
                tracing::warn!("flow repository lock poisoned, recovering");
                e.into_inner()
            })
            .len()
    }

    /// Whether the repository holds no flows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FlowRepository for InMemoryFlowRepository {
    async fn active_flows(&self, flow_type: &str) -> ApprovalResult<Vec<ApprovalFlow>> {
        let flows = self
            .flows
            .read()
            .map_err(|e| ApprovalError::Repository(e.to_string()))?;
        Ok(flows
            .values()
            .filter(|f| f.is_active && f.flow_type == flow_type)
            .cloned()
            .collect())
    }

    async fn flow(&self, id: FlowId) -> ApprovalResult<Option<ApprovalFlow>> {
        let flows = self
            .flows
            .read()
            .map_err(|e| ApprovalError::Repository(e.to_string()))?;
        Ok(flows.get(&id).cloned())
    }
}
