//! Minimal `FlowExecutor` wiring: allocates a flow id and nothing more.
//! The actual interactive authentication/registration flow graph is an
//! external engine; a real deployment swaps this for a client that calls
//! into it.

use aegis_core::CoreResult;
use aegis_oauth::{FlowExecutor, FlowInitRequest};
use uuid::Uuid;

pub struct UuidFlowExecutor;

impl FlowExecutor for UuidFlowExecutor {
    fn initiate(&self, _request: &FlowInitRequest) -> CoreResult<String> {
        Ok(Uuid::new_v4().to_string())
    }
}
