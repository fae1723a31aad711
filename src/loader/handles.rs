//! Tracked wrappers around wasmtime modules and instances
//!
//! The wrappers add exactly two things to the underlying wasmtime objects: a
//! process-unique id the registries key on, and a drop hook that unregisters
//! the id. The wasmtime objects themselves are exposed unchanged, so anything
//! that works against a `wasmtime::Module`/`wasmtime::Instance` keeps working
//! against a tracked one.
//!
//! Handles are cheap clones of an inner `Arc`; the registry entry lives
//! exactly as long as the last clone. An instance holds the handle of the
//! module that produced it, so a module's binary and engine binding stay
//! derivable while any of its instances is alive, even after the caller lets
//! its own module handle go out of scope. The inner `Weak` back-reference
//! means a handle that outlives its [`Symbolicator`](crate::Symbolicator)
//! degrades quietly instead of keeping the registries alive.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use wasmtime::Store;

use crate::domain::{InstanceId, ModuleId};
use crate::symbolicator::SharedState;

/// Handle to one compiled module tracked by the loader
#[derive(Clone)]
pub struct TrackedModule {
    inner: Arc<ModuleInner>,
}

struct ModuleInner {
    id: ModuleId,
    module: wasmtime::Module,
    shared: Weak<SharedState>,
}

impl TrackedModule {
    pub(crate) fn new(id: ModuleId, module: wasmtime::Module, shared: Weak<SharedState>) -> Self {
        Self { inner: Arc::new(ModuleInner { id, module, shared }) }
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.inner.id
    }

    /// The underlying wasmtime module, behaviorally identical to one created
    /// without instrumentation.
    #[must_use]
    pub fn module(&self) -> &wasmtime::Module {
        &self.inner.module
    }
}

impl Drop for ModuleInner {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.forget_module(self.id);
        }
    }
}

/// Handle to one running instance tracked by the loader
#[derive(Clone)]
pub struct TrackedInstance {
    inner: Arc<InstanceInner>,
}

struct InstanceInner {
    id: InstanceId,
    /// The producing module's handle. Holding it (not just its id) keeps the
    /// module's registrations alive for as long as this instance is.
    module: TrackedModule,
    instance: wasmtime::Instance,
    store: Mutex<Store<()>>,
    shared: Weak<SharedState>,
}

impl TrackedInstance {
    pub(crate) fn new(
        id: InstanceId,
        module: TrackedModule,
        instance: wasmtime::Instance,
        store: Store<()>,
        shared: Weak<SharedState>,
    ) -> Self {
        Self {
            inner: Arc::new(InstanceInner {
                id,
                module,
                instance,
                store: Mutex::new(store),
                shared,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    /// The module this instance was produced from, recorded at creation time.
    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.inner.module.id()
    }

    /// Handle of the producing module.
    #[must_use]
    pub fn module(&self) -> &TrackedModule {
        &self.inner.module
    }

    /// Invoke a nullary exported function by name.
    ///
    /// # Errors
    /// Propagates the wasmtime error unchanged, including any trap raised by
    /// the guest; a trap's error chain carries the `WasmBacktrace` the trace
    /// formatter consumes.
    pub fn call_export(&self, name: &str) -> anyhow::Result<()> {
        let mut store = self.inner.store.lock();
        let func = self.inner.instance.get_typed_func::<(), ()>(&mut *store, name)?;
        func.call(&mut *store, ())
    }

    /// Run `f` with the instance and its store, for access beyond
    /// [`call_export`](Self::call_export).
    pub fn with_store<R>(&self, f: impl FnOnce(&mut Store<()>, wasmtime::Instance) -> R) -> R {
        let mut store = self.inner.store.lock();
        f(&mut store, self.inner.instance)
    }
}

impl Drop for InstanceInner {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.forget_instance(self.id);
        }
    }
}
