use crate::registry::{MockDefinition, MockRegistry, MockSelector};
use kiln_core::transport::RequestFn;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Scoped resource: pushes its [`MockDefinition`] onto the registry when
/// constructed, pops it on drop — a scope guard standing in for a
/// with-block-style context manager.
pub struct MockGuard {
    registry: MockRegistry,
    definition: Arc<MockDefinition>,
}

impl MockGuard {
    fn new(registry: MockRegistry, definition: Arc<MockDefinition>) -> Self {
        registry.push(definition.clone());
        Self { registry, definition }
    }
}

impl Drop for MockGuard {
    fn drop(&mut self) {
        self.registry.pop(&self.definition);
    }
}

/// Installs `request_fn` as a transport override for calls matching
/// `service_name`/`endpoint`, active until the returned guard drops.
pub fn use_mock(
    registry: &MockRegistry,
    request_fn: RequestFn,
    service_name: Option<String>,
    endpoint: Option<String>,
    offset: u64,
    limit: u64,
) -> MockGuard {
    let selector = MockSelector { service_name, endpoint };
    let definition = MockDefinition::use_mock(selector, request_fn, offset, limit);
    MockGuard::new(registry.clone(), definition)
}

/// Splices `patch` into the matching endpoint's `mock` sub-map, active
/// until the returned guard drops.
pub fn patch_mock_desc(
    registry: &MockRegistry,
    patch: Value,
    service_name: Option<String>,
    endpoint: Option<String>,
    offset: u64,
    limit: u64,
) -> MockGuard {
    let selector = MockSelector { service_name, endpoint };
    let definition = MockDefinition::patch_mock(selector, patch, offset, limit);
    MockGuard::new(registry.clone(), definition)
}

/// Decorator-equivalent: runs `fut` with `guard` held, popping the mock
/// definition once `fut` completes (success or panic-unwind) rather than
/// requiring the caller to manage the guard's lifetime explicitly.
pub async fn with_mock<F: Future>(guard: MockGuard, fut: F) -> F::Output {
    let out = fut.await;
    drop(guard);
    out
}
