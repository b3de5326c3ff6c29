//! The flow executor interface. Drives the interactive
//! authentication/registration flow and, eventually, emits a signed
//! assertion; the concrete flow graph and its provider (default in-directory
//! password, or a federated provider) are external collaborators.

use aegis_core::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    Authentication,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowInitRequest {
    pub application_id: String,
    pub flow_type: FlowType,
    pub requested_permissions: Vec<String>,
    pub required_attributes: Vec<String>,
    pub required_locales: Option<String>,
}

pub trait FlowExecutor: Send + Sync {
    /// Initiates a flow, returning its `flow_id`.
    fn initiate(&self, request: &FlowInitRequest) -> CoreResult<String>;
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Deterministic fake used by this crate's own tests; a fuller fake with
    /// recorded calls lives in `aegis-testkit`.
    pub struct SequentialFlowExecutor {
        counter: AtomicU64,
    }

    impl Default for SequentialFlowExecutor {
        fn default() -> Self {
            Self {
                counter: AtomicU64::new(1),
            }
        }
    }

    impl FlowExecutor for SequentialFlowExecutor {
        fn initiate(&self, _request: &FlowInitRequest) -> CoreResult<String> {
            let id = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("flow-{id}"))
        }
    }
}
