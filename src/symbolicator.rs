//! Process-wide wiring: registries, engine cache and the opaque engine blob
//!
//! A [`Symbolicator`] is constructed once, at install time, with the bytes of
//! the offline-built symbolication engine. It hands out [`Loader`]s (the
//! intercepted creation paths) and [`TraceFormatter`]s (the rendering hook);
//! all of them share the same registries, so a module loaded anywhere in the
//! process is resolvable from any trace.

use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use wasmtime::Engine;

use crate::domain::{InstanceId, ModuleId, SymbolicationError};
use crate::engine::{EngineBinding, EngineCache};
use crate::loader::{Loader, TrackedInstance, TrackedModule};
use crate::registry::{BinaryRegistry, InstanceRegistry};
use crate::trace::TraceFormatter;

/// State shared by every loader, handle and formatter.
///
/// Handles hold a `Weak` to this so their `Drop` hooks can unregister without
/// keeping the whole symbolicator alive. The three mutexes are never nested;
/// each is taken briefly for one map operation, or (for the engine cache) for
/// the check-construct-insert sequence so that the first writer wins and
/// construction happens at most once per module.
pub(crate) struct SharedState {
    pub(crate) engine_wasm: Vec<u8>,
    pub(crate) wasm_engine: Engine,
    pub(crate) binaries: Mutex<BinaryRegistry>,
    pub(crate) instances: Mutex<InstanceRegistry>,
    pub(crate) engines: Mutex<EngineCache>,
}

impl SharedState {
    /// Resolve an instance to its module's engine binding, constructing the
    /// binding on first use. `None` means symbolication is unavailable for
    /// this instance (untracked handle, missing binary, or sticky failure) and
    /// the caller should fall back to default rendering.
    pub(crate) fn binding_for_instance(
        &self,
        instance: InstanceId,
    ) -> Option<Arc<Mutex<EngineBinding>>> {
        let Some(module) = self.instances.lock().lookup(instance) else {
            debug!("{}", SymbolicationError::UntrackedHandle(instance));
            return None;
        };
        // Fetch the binary before taking the cache lock; the locks never nest.
        let binary = self.binaries.lock().lookup(module);
        self.engines.lock().get_or_init(module, binary, &self.wasm_engine, &self.engine_wasm)
    }

    /// Lifecycle hook from [`TrackedModule`]'s drop.
    pub(crate) fn forget_module(&self, module: ModuleId) {
        self.binaries.lock().remove(module);
        self.engines.lock().evict(module);
    }

    /// Lifecycle hook from [`TrackedInstance`]'s drop.
    pub(crate) fn forget_instance(&self, instance: InstanceId) {
        self.instances.lock().remove(instance);
    }
}

/// Entry point for embedding wasm stack-trace symbolication.
///
/// Cheap to clone; all clones share one set of registries and one engine
/// cache. The engine blob is supplied as bytes (typically via
/// `include_bytes!` of the artifact produced by the offline engine build) and
/// is instantiated lazily, once per module that actually shows up in a trace.
#[derive(Clone)]
pub struct Symbolicator {
    shared: Arc<SharedState>,
}

impl Symbolicator {
    #[must_use]
    pub fn new(engine_wasm: impl Into<Vec<u8>>) -> Self {
        Self {
            shared: Arc::new(SharedState {
                engine_wasm: engine_wasm.into(),
                wasm_engine: Engine::default(),
                binaries: Mutex::new(BinaryRegistry::new()),
                instances: Mutex::new(InstanceRegistry::new()),
                engines: Mutex::new(EngineCache::new()),
            }),
        }
    }

    /// The intercepted module/instance creation paths.
    #[must_use]
    pub fn loader(&self) -> Loader {
        Loader::new(Arc::clone(&self.shared))
    }

    /// The replacement stack-trace rendering hook.
    #[must_use]
    pub fn formatter(&self) -> TraceFormatter {
        TraceFormatter::new(Arc::clone(&self.shared))
    }

    /// The engine binding serving `instance`, if symbolication is available
    /// for it. Constructs the binding on first use; repeated calls return the
    /// identical cached binding.
    #[must_use]
    pub fn engine_for(&self, instance: &TrackedInstance) -> Option<Arc<Mutex<EngineBinding>>> {
        self.shared.binding_for_instance(instance.id())
    }

    /// The raw bytes `module` was compiled from, if they were captured.
    #[must_use]
    pub fn binary_for(&self, module: &TrackedModule) -> Option<Arc<[u8]>> {
        self.shared.binaries.lock().lookup(module.id())
    }

    /// The module that produced `instance`, if it was created through a
    /// tracked path.
    #[must_use]
    pub fn module_for(&self, instance: &TrackedInstance) -> Option<ModuleId> {
        self.shared.instances.lock().lookup(instance.id())
    }

    /// How many engine constructions have actually run. Stays at one per
    /// module thanks to the sticky cache.
    #[must_use]
    pub fn engine_construction_attempts(&self) -> u64 {
        self.shared.engines.lock().construction_attempts()
    }
}
