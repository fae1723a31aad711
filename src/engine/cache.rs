//! Per-module memoization of engine bindings
//!
//! Constructing an [`EngineBinding`] is expensive (the engine parses the
//! binary's debug metadata), so it happens at most once per module no matter
//! how many instances or stack traces reference it. Failures are just as
//! sticky as successes: once construction fails for a module it is never
//! retried for the rest of the process lifetime.

use log::{info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wasmtime::Engine;

use crate::domain::{ModuleId, SymbolicationError};
use crate::engine::binding::EngineBinding;

/// Cache state for one module
enum CacheEntry {
    /// Construction succeeded; the binding is shared by every lookup
    Ready(Arc<Mutex<EngineBinding>>),
    /// Sticky failure sentinel, never retried
    Failed,
}

#[derive(Default)]
pub struct EngineCache {
    entries: HashMap<ModuleId, CacheEntry>,
    construction_attempts: u64,
}

impl EngineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the binding for `module`, constructing it on first use.
    ///
    /// `binary` is the registry's answer for the module's source bytes; `None`
    /// means the module was created before instrumentation was installed or
    /// through an untracked path, which is recorded as a sticky failure.
    ///
    /// All failure modes are absorbed here: they are logged, cached as the
    /// failure sentinel and surface as `None`. The caller degrades to default
    /// trace rendering.
    pub fn get_or_init(
        &mut self,
        module: ModuleId,
        binary: Option<Arc<[u8]>>,
        engine: &Engine,
        engine_wasm: &[u8],
    ) -> Option<Arc<Mutex<EngineBinding>>> {
        match self.entries.get(&module) {
            Some(CacheEntry::Ready(binding)) => return Some(Arc::clone(binding)),
            Some(CacheEntry::Failed) => return None,
            None => {}
        }

        let Some(binary) = binary else {
            let err = SymbolicationError::MissingBinary(module);
            warn!("{err}; caching sticky failure");
            self.entries.insert(module, CacheEntry::Failed);
            return None;
        };

        self.construction_attempts += 1;
        match EngineBinding::new(engine, engine_wasm, binary) {
            Ok(binding) => {
                info!("constructed symbolication engine for {module}");
                let binding = Arc::new(Mutex::new(binding));
                self.entries.insert(module, CacheEntry::Ready(Arc::clone(&binding)));
                Some(binding)
            }
            Err(e) => {
                let err = SymbolicationError::EngineConstruction {
                    module,
                    reason: format!("{e:#}"),
                };
                warn!("{err}; caching sticky failure");
                self.entries.insert(module, CacheEntry::Failed);
                None
            }
        }
    }

    /// Lifecycle hook: drop the binding (or sentinel) when its module handle
    /// is dropped. Module ids are never reused, so eviction cannot resurrect
    /// a failed entry.
    pub fn evict(&mut self, module: ModuleId) {
        self.entries.remove(&module);
    }

    /// Number of times an engine construction was actually attempted.
    ///
    /// Stays at one per module regardless of how many lookups follow; exposed
    /// so embedders (and tests) can observe the memoization.
    #[must_use]
    pub fn construction_attempts(&self) -> u64 {
        self.construction_attempts
    }
}
