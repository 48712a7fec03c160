use kiln_core::transport::RequestFn;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Optional service-name/endpoint filter on a [`MockDefinition`]. An absent
/// field matches anything; selectors *filter* which entries a consult can
/// land on, they never consume offset/limit on a mismatch.
#[derive(Debug, Clone, Default)]
pub struct MockSelector {
    pub service_name: Option<String>,
    pub endpoint: Option<String>,
}

impl MockSelector {
    pub fn matches(&self, service_name: &str, endpoint: &str) -> bool {
        self.service_name.as_deref().map_or(true, |s| s == service_name)
            && self.endpoint.as_deref().map_or(true, |e| e == endpoint)
    }
}

/// What a matching, live entry hands back to the `Mock` plugin.
pub enum MockOutcome {
    /// Install directly as the session's `request` override.
    UseMock(Arc<RequestFn>),
    /// Splice into the local `endpoint.mock` sub-map before constructing a
    /// stub from it.
    PatchMock(Value),
}

enum MockPayload {
    UseMock(Arc<RequestFn>),
    PatchMock(Value),
}

impl MockPayload {
    fn to_outcome(&self) -> MockOutcome {
        match self {
            MockPayload::UseMock(f) => MockOutcome::UseMock(f.clone()),
            MockPayload::PatchMock(v) => MockOutcome::PatchMock(v.clone()),
        }
    }
}

/// `0` remaining uses means unlimited and is never consumed to exhaustion.
enum Limit {
    Unlimited,
    Remaining(Mutex<u64>),
}

impl Limit {
    fn new(limit: u64) -> Self {
        if limit == 0 {
            Limit::Unlimited
        } else {
            Limit::Remaining(Mutex::new(limit))
        }
    }

    /// Returns `true` once this consult exhausts the remaining uses — the
    /// entry should be removed from the registry.
    fn consume(&self) -> bool {
        match self {
            Limit::Unlimited => false,
            Limit::Remaining(m) => {
                let mut remaining = m.lock().unwrap();
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
        }
    }
}

/// One entry in the mock registry.
pub struct MockDefinition {
    pub selector: MockSelector,
    offset: Mutex<u64>,
    limit: Limit,
    payload: MockPayload,
}

impl MockDefinition {
    pub fn use_mock(selector: MockSelector, request_fn: RequestFn, offset: u64, limit: u64) -> Arc<Self> {
        Arc::new(Self {
            selector,
            offset: Mutex::new(offset),
            limit: Limit::new(limit),
            payload: MockPayload::UseMock(Arc::new(request_fn)),
        })
    }

    pub fn patch_mock(selector: MockSelector, patch: Value, offset: u64, limit: u64) -> Arc<Self> {
        Arc::new(Self {
            selector,
            offset: Mutex::new(offset),
            limit: Limit::new(limit),
            payload: MockPayload::PatchMock(patch),
        })
    }

    /// Returns `true` if this consult was absorbed by the offset skip
    /// window (still waiting), `false` if the entry is now live.
    fn tick_offset(&self) -> bool {
        let mut offset = self.offset.lock().unwrap();
        if *offset > 0 {
            *offset -= 1;
            true
        } else {
            false
        }
    }
}

/// Ordered sequence of [`MockDefinition`] entries, consulted in insertion
/// order with the most recently pushed entry first.
#[derive(Clone, Default)]
pub struct MockRegistry {
    entries: Arc<Mutex<Vec<Arc<MockDefinition>>>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends an entry so it is consulted before anything already
    /// registered.
    pub fn push(&self, definition: Arc<MockDefinition>) {
        self.entries.lock().unwrap().insert(0, definition);
    }

    /// Removes an entry by identity (pointer equality), not value — two
    /// definitions with identical fields are distinct entries.
    pub fn pop(&self, definition: &Arc<MockDefinition>) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(pos) = entries.iter().position(|d| Arc::ptr_eq(d, definition)) {
            entries.remove(pos);
        }
    }

    /// Linear scan, most-recently-pushed entry first. A selector mismatch
    /// is skipped without touching offset/limit; a matching entry still in
    /// its offset skip window decrements the offset and the scan continues
    /// to later entries — it is never returned, and it never blocks a later
    /// entry from serving the call.
    pub fn next_mock(&self, service_name: &str, endpoint: &str) -> Option<MockOutcome> {
        let mut entries = self.entries.lock().unwrap();
        let mut idx = 0;
        while idx < entries.len() {
            let def = entries[idx].clone();
            if !def.selector.matches(service_name, endpoint) {
                idx += 1;
                continue;
            }
            if def.tick_offset() {
                idx += 1;
                continue;
            }
            let outcome = def.payload.to_outcome();
            if def.limit.consume() {
                entries.remove(idx);
            }
            return Some(outcome);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::transport::OutgoingRequest;
    use kiln_core::ServiceError;

    fn noop_request_fn() -> RequestFn {
        Box::new(|_req: OutgoingRequest| Box::pin(async { Err(ServiceError::Internal("noop".into())) }))
    }

    #[test]
    fn push_prepends_and_scan_is_most_recent_first() {
        let registry = MockRegistry::new();
        let first = MockDefinition::patch_mock(MockSelector::default(), Value::from(1), 0, 0);
        let second = MockDefinition::patch_mock(MockSelector::default(), Value::from(2), 0, 0);
        registry.push(first.clone());
        registry.push(second.clone());

        match registry.next_mock("svc", "ep").unwrap() {
            MockOutcome::PatchMock(v) => assert_eq!(v, Value::from(2)),
            _ => panic!("expected patch"),
        }
    }

    #[test]
    fn pop_removes_by_identity() {
        let registry = MockRegistry::new();
        let def = MockDefinition::patch_mock(MockSelector::default(), Value::from(1), 0, 0);
        registry.push(def.clone());
        assert_eq!(registry.len(), 1);
        registry.pop(&def);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn selector_mismatch_does_not_consume_offset_or_limit() {
        let registry = MockRegistry::new();
        let selector = MockSelector {
            service_name: None,
            endpoint: Some("other".to_string()),
        };
        let def = MockDefinition::patch_mock(selector, Value::from(1), 1, 1);
        registry.push(def);
        assert!(registry.next_mock("svc", "lookup").is_none());
        // Still registered, offset untouched.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn offset_then_limit_then_falls_through() {
        // S6: push UseMock(limit=2), perform 3 calls. Calls 1 and 2 return
        // the mock; call 3 falls through (registry empty).
        let registry = MockRegistry::new();
        let def = MockDefinition::use_mock(MockSelector::default(), noop_request_fn(), 0, 2);
        registry.push(def);

        assert!(matches!(registry.next_mock("svc", "ep"), Some(MockOutcome::UseMock(_))));
        assert!(matches!(registry.next_mock("svc", "ep"), Some(MockOutcome::UseMock(_))));
        assert!(registry.next_mock("svc", "ep").is_none());
    }

    #[test]
    fn offset_skips_without_returning_then_goes_live() {
        let registry = MockRegistry::new();
        let def = MockDefinition::patch_mock(MockSelector::default(), Value::from("live"), 2, 1);
        registry.push(def);

        assert!(registry.next_mock("svc", "ep").is_none());
        assert!(registry.next_mock("svc", "ep").is_none());
        match registry.next_mock("svc", "ep").unwrap() {
            MockOutcome::PatchMock(v) => assert_eq!(v, Value::from("live")),
            _ => panic!("expected patch"),
        }
        // Limit exhausted after one live return.
        assert!(registry.next_mock("svc", "ep").is_none());
    }

    #[test]
    fn a_skipped_matching_entry_lets_a_later_entry_serve_the_call() {
        let registry = MockRegistry::new();
        let waiting = MockDefinition::patch_mock(MockSelector::default(), Value::from("waiting"), 5, 1);
        let ready = MockDefinition::patch_mock(MockSelector::default(), Value::from("ready"), 0, 1);
        registry.push(waiting);
        registry.push(ready);

        match registry.next_mock("svc", "ep").unwrap() {
            MockOutcome::PatchMock(v) => assert_eq!(v, Value::from("ready")),
            _ => panic!("expected patch"),
        }
    }
}
