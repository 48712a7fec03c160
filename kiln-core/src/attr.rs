use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;

/// Side-map-backed wrapper around an underlying object.
///
/// Reads of ordinary attributes go straight to the wrapped object via
/// [`AttrMap::inner`]; this type only models the *added* surface: data
/// attached after construction (`tracking_token`, elapsed timers, …) and
/// callables installed to override or decorate a named operation (the
/// transport's `request`, in practice — the only callable any bundled
/// plugin ever touches). Rust can't dynamically graft a new field onto an
/// arbitrary `T`, so writes always land in the side map rather than
/// conditionally on the underlying object.
pub struct AttrMap<T> {
    obj: T,
    data: HashMap<String, Value>,
    callables: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl<T> AttrMap<T> {
    pub fn new(obj: T) -> Self {
        Self {
            obj,
            data: HashMap::new(),
            callables: HashMap::new(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.obj
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.obj
    }

    pub fn into_inner(self) -> T {
        self.obj
    }

    /// Side-mapping assignment that always wins over the underlying object.
    pub fn override_attr(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn get_attr(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Snapshot of non-callable side-map entries — what loggers read to
    /// capture `tracking_token`, `elapsed`, and similar added attributes.
    pub fn get_wrapper_data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    /// Installs or replaces a callable attribute outright.
    pub fn override_callable<F>(&mut self, key: impl Into<String>, callable: F)
    where
        F: Send + Sync + 'static,
    {
        self.callables.insert(key.into(), Box::new(callable));
    }

    pub fn get_callable<F: 'static>(&self, key: &str) -> Option<&F> {
        self.callables.get(key).and_then(|b| b.downcast_ref::<F>())
    }

    /// Reads the current callable — or `default` if none has been installed
    /// yet, standing in for "fall through to the underlying object" — and
    /// replaces it with `decorator(current)`.
    pub fn decorate_callable<F>(&mut self, key: &str, default: F, decorator: impl FnOnce(F) -> F)
    where
        F: Send + Sync + 'static,
    {
        let current = self
            .callables
            .remove(key)
            .and_then(|b| b.downcast::<F>().ok())
            .map(|b| *b)
            .unwrap_or(default);
        self.callables.insert(key.into(), Box::new(decorator(current)));
    }
}
