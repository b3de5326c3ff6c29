//! Reusable fakes for the OU hierarchy resolver, app registry, flow
//! executor, and assertion verifier, shared by integration tests so no
//! crate has to hand-roll its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use aegis_authz::OuHierarchyResolver;
use aegis_core::CoreResult;
use aegis_oauth::{AppRegistry, FlowExecutor, FlowInitRequest, RegisteredApp};
use serde_json::{Map, Value};

/// A resolver backed by an explicit `child -> parent` map.
pub struct MapOuHierarchyResolver {
    pub parent_of: HashMap<String, String>,
}

impl MapOuHierarchyResolver {
    pub fn new(parent_of: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            parent_of: parent_of.into_iter().collect(),
        }
    }
}

impl OuHierarchyResolver for MapOuHierarchyResolver {
    fn is_ancestor_or_self(&self, candidate: &str, of: &str) -> CoreResult<bool> {
        Ok(self.get_ancestor_ou_ids(of)?.iter().any(|id| id == candidate))
    }

    fn get_ancestor_ou_ids(&self, of: &str) -> CoreResult<Vec<String>> {
        let mut chain = vec![of.to_string()];
        let mut current = of.to_string();
        while let Some(parent) = self.parent_of.get(&current) {
            chain.push(parent.clone());
            current = parent.clone();
        }
        Ok(chain)
    }
}

/// An `OuHierarchyResolver` that always fails, for exercising the
/// deny-safe-on-error behavior of the inheritance policy.
pub struct FailingOuHierarchyResolver;

impl OuHierarchyResolver for FailingOuHierarchyResolver {
    fn is_ancestor_or_self(&self, _candidate: &str, _of: &str) -> CoreResult<bool> {
        Err(aegis_core::CoreError::system_error("ou hierarchy store unreachable"))
    }

    fn get_ancestor_ou_ids(&self, _of: &str) -> CoreResult<Vec<String>> {
        Err(aegis_core::CoreError::system_error("ou hierarchy store unreachable"))
    }
}

#[derive(Default)]
pub struct InMemoryAppRegistry {
    apps: Mutex<HashMap<String, RegisteredApp>>,
}

impl InMemoryAppRegistry {
    pub fn with_apps(apps: impl IntoIterator<Item = RegisteredApp>) -> Self {
        let mut map = HashMap::new();
        for app in apps {
            map.insert(app.client_id.clone(), app);
        }
        Self { apps: Mutex::new(map) }
    }
}

impl AppRegistry for InMemoryAppRegistry {
    fn get(&self, client_id: &str) -> CoreResult<Option<RegisteredApp>> {
        Ok(self.apps.lock().expect("app registry mutex poisoned").get(client_id).cloned())
    }
}

/// Hands out `flow-1`, `flow-2`, ... in call order, and records every
/// request it was asked to initiate.
pub struct RecordingFlowExecutor {
    counter: AtomicU64,
    pub requests: Mutex<Vec<FlowInitRequest>>,
}

impl Default for RecordingFlowExecutor {
    fn default() -> Self {
        Self {
            counter: AtomicU64::new(1),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl FlowExecutor for RecordingFlowExecutor {
    fn initiate(&self, request: &FlowInitRequest) -> CoreResult<String> {
        self.requests.lock().expect("flow executor mutex poisoned").push(request.clone());
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("flow-{id}"))
    }
}

/// An `AssertionVerifier` that returns a fixed claim map regardless of the
/// assertion text, for tests that want to drive leg 2 without a real signer.
pub struct FixedAssertionVerifier(pub Map<String, Value>);

impl FixedAssertionVerifier {
    pub fn with_sub(sub: &str) -> Self {
        let mut map = Map::new();
        map.insert("sub".to_string(), Value::String(sub.to_string()));
        Self(map)
    }
}

impl aegis_oauth::AssertionVerifier for FixedAssertionVerifier {
    fn verify(&self, _assertion: &str) -> CoreResult<Map<String, Value>> {
        Ok(self.0.clone())
    }
}

pub struct FailingAssertionVerifier;

impl aegis_oauth::AssertionVerifier for FailingAssertionVerifier {
    fn verify(&self, _assertion: &str) -> CoreResult<Map<String, Value>> {
        Err(aegis_core::CoreError::invalid_request("signature verification failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_resolver_chains_to_root() {
        let resolver = MapOuHierarchyResolver::new([
            ("team-a".to_string(), "dept-1".to_string()),
            ("dept-1".to_string(), "org-root".to_string()),
        ]);
        assert_eq!(
            resolver.get_ancestor_ou_ids("team-a").unwrap(),
            vec!["team-a", "dept-1", "org-root"]
        );
    }

    #[test]
    fn failing_resolver_is_deny_safe() {
        let resolver = FailingOuHierarchyResolver;
        assert!(resolver.is_ancestor_or_self("a", "b").is_err());
    }

    #[test]
    fn recording_flow_executor_captures_requests_and_counts_up() {
        let executor = RecordingFlowExecutor::default();
        let first = executor
            .initiate(&FlowInitRequest {
                application_id: "c1".into(),
                flow_type: aegis_oauth::FlowType::Authentication,
                requested_permissions: vec![],
                required_attributes: vec![],
                required_locales: None,
            })
            .unwrap();
        let second = executor
            .initiate(&FlowInitRequest {
                application_id: "c1".into(),
                flow_type: aegis_oauth::FlowType::Authentication,
                requested_permissions: vec![],
                required_attributes: vec![],
                required_locales: None,
            })
            .unwrap();
        assert_eq!(first, "flow-1");
        assert_eq!(second, "flow-2");
        assert_eq!(executor.requests.lock().unwrap().len(), 2);
    }
}
