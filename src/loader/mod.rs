//! Intercepted module/instance creation paths
//!
//! Rust has no global `WebAssembly` object to monkey-patch, so interception is
//! an explicit facade: every way this embedding turns bytes into a compiled
//! module or a running instance goes through [`Loader`], which delegates to
//! wasmtime first and records the side-channel bookkeeping after. The
//! before/after contract per entry point:
//!
//! | entry point              | delegate                   | records              |
//! |--------------------------|----------------------------|----------------------|
//! | `module_from_bytes`      | `Module::new`              | module ↔ binary      |
//! | `instance_from_module`   | `Instance::new`            | instance ↔ module    |
//! | `compile`                | `Module::new` (off-thread) | module ↔ binary      |
//! | `compile_streaming`      | tee + streamed compile     | module ↔ binary      |
//! | `instantiate`            | compile + instantiate      | both                 |
//! | `instantiate_streaming`  | tee + compile + instantiate| both                 |
//! | `instantiate_module`     | `Instance::new`            | instance ↔ module    |
//! | `adopt_module`           | none (module from elsewhere)| nothing             |
//!
//! Delegation happens first and its result is returned unchanged: the same
//! modules, instances and errors come out as without instrumentation. When the
//! bytes cannot be captured ([`adopt_module`](Loader::adopt_module)), the
//! handle still works; symbolication for it degrades later in the engine
//! cache, never here.

pub mod handles;
pub(crate) mod streaming;

pub use handles::{TrackedInstance, TrackedModule};
pub use streaming::ByteChunk;

use anyhow::{Context as _, Result};
use futures::Stream;
use log::debug;
use std::io;
use std::sync::Arc;
use wasmtime::{Module, Store};

use crate::domain::{InstanceId, ModuleId};
use crate::symbolicator::SharedState;

/// The intercepted loader surface.
///
/// Obtained from [`Symbolicator::loader`](crate::Symbolicator::loader); cheap
/// to clone, all clones feed the same registries.
#[derive(Clone)]
pub struct Loader {
    shared: Arc<SharedState>,
}

impl Loader {
    pub(crate) fn new(shared: Arc<SharedState>) -> Self {
        Self { shared }
    }

    /// Synchronous module construction from bytes.
    ///
    /// # Errors
    /// Exactly the errors `wasmtime::Module::new` produces for these bytes.
    pub fn module_from_bytes(&self, bytes: &[u8]) -> Result<TrackedModule> {
        let module = Module::new(&self.shared.wasm_engine, bytes)?;
        Ok(self.track_module(module, Some(Arc::from(bytes))))
    }

    /// Synchronous instantiation of a tracked module.
    ///
    /// # Errors
    /// Exactly the errors `wasmtime::Instance::new` produces for this module.
    pub fn instance_from_module(&self, module: &TrackedModule) -> Result<TrackedInstance> {
        let mut store = Store::new(&self.shared.wasm_engine, ());
        let instance = wasmtime::Instance::new(&mut store, module.module(), &[])?;
        Ok(self.track_instance(module, instance, store))
    }

    /// Asynchronous compile-from-bytes; compilation runs off the async
    /// executor.
    ///
    /// # Errors
    /// Compilation errors, unchanged.
    pub async fn compile(&self, bytes: &[u8]) -> Result<TrackedModule> {
        let engine = self.shared.wasm_engine.clone();
        let source: Arc<[u8]> = Arc::from(bytes);
        let compile_source = Arc::clone(&source);
        let module =
            tokio::task::spawn_blocking(move || Module::new(&engine, &compile_source)).await??;
        Ok(self.track_module(module, Some(source)))
    }

    /// Asynchronous compile from a streamed source (a network response body).
    ///
    /// The stream is consumed exactly once: it is tee'd, one copy feeds the
    /// streaming compile delegate and the other is materialized for the binary
    /// registry, both concurrently. The binary is recorded only after both
    /// complete.
    ///
    /// # Errors
    /// The first stream read error, or the compilation error, unchanged.
    pub async fn compile_streaming<S>(&self, source: S) -> Result<TrackedModule>
    where
        S: Stream<Item = io::Result<ByteChunk>> + Unpin,
    {
        let (module, bytes) = self.compile_streaming_delegate(source).await?;
        Ok(self.track_module(module, Some(bytes)))
    }

    /// Asynchronous instantiate-from-bytes; records both associations.
    ///
    /// # Errors
    /// Compilation or instantiation errors, unchanged.
    pub async fn instantiate(&self, bytes: &[u8]) -> Result<(TrackedModule, TrackedInstance)> {
        let module = self.compile(bytes).await?;
        let instance = self.instance_from_module(&module)?;
        Ok((module, instance))
    }

    /// Asynchronous instantiate from a streamed source; tees as
    /// [`compile_streaming`](Self::compile_streaming) and records both
    /// associations.
    ///
    /// # Errors
    /// The first stream read error, or the compilation/instantiation error,
    /// unchanged.
    pub async fn instantiate_streaming<S>(
        &self,
        source: S,
    ) -> Result<(TrackedModule, TrackedInstance)>
    where
        S: Stream<Item = io::Result<ByteChunk>> + Unpin,
    {
        let module = self.compile_streaming(source).await?;
        let instance = self.instance_from_module(&module)?;
        Ok((module, instance))
    }

    /// Asynchronous instantiation of an existing module. No bytes are
    /// available at this call; only the instance ↔ module association is
    /// recorded, and a missing binary is handled later by the engine cache.
    ///
    /// # Errors
    /// Instantiation errors, unchanged.
    pub async fn instantiate_module(&self, module: &TrackedModule) -> Result<TrackedInstance> {
        self.instance_from_module(module)
    }

    /// Wrap a module compiled outside the tracked paths. Its bytes were never
    /// observed, so instances of it render with default trace text.
    #[must_use]
    pub fn adopt_module(&self, module: Module) -> TrackedModule {
        self.track_module(module, None)
    }

    async fn compile_streaming_delegate<S>(&self, source: S) -> Result<(Module, Arc<[u8]>)>
    where
        S: Stream<Item = io::Result<ByteChunk>> + Unpin,
    {
        let (driver, compile_rx, capture_rx) = streaming::tee(source);
        let (drove, module, bytes) = futures::join!(
            driver,
            streaming::compile_chunks(&self.shared.wasm_engine, compile_rx),
            streaming::materialize(capture_rx),
        );
        drove.context("failed to read module source stream")?;
        Ok((module?, Arc::from(bytes)))
    }

    fn track_module(&self, module: Module, binary: Option<Arc<[u8]>>) -> TrackedModule {
        let id = ModuleId::next();
        if let Some(binary) = binary {
            debug!("recorded {} source bytes for {id}", binary.len());
            self.shared.binaries.lock().record(id, binary);
        } else {
            debug!("{id} adopted without source bytes, symbolication unavailable");
        }
        TrackedModule::new(id, module, Arc::downgrade(&self.shared))
    }

    fn track_instance(
        &self,
        module: &TrackedModule,
        instance: wasmtime::Instance,
        store: Store<()>,
    ) -> TrackedInstance {
        let id = InstanceId::next();
        self.shared.instances.lock().record(id, module.id());
        debug!("recorded {id} created from {}", module.id());
        // The instance carries the module handle so the module's binary stays
        // registered while any instance of it is alive.
        TrackedInstance::new(id, module.clone(), instance, store, Arc::downgrade(&self.shared))
    }
}
