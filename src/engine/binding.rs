//! Host side of the symbolication engine protocol
//!
//! The engine is an opaque wasm blob built offline. It knows how to parse the
//! DWARF sections embedded in a wasm binary and map a code offset to a symbol
//! and source location; this module knows nothing about DWARF and treats the
//! blob purely through its ABI:
//!
//! - exports: `init(file_len) -> base_offset` and `address_to_frame(offset)`,
//!   plus its linear `memory`
//! - imports (namespace `env`): `read_chunk`, `on_frame`, `on_error`, `print`
//!
//! The engine never receives a full copy of the target binary. It pulls byte
//! ranges on demand through `read_chunk`, and it reports results exclusively
//! through the `on_frame`/`on_error` callbacks. [`EngineBinding`] converts that
//! callback protocol into a synchronous request/response: one
//! [`address_to_frame`](EngineBinding::address_to_frame) call returns a tagged
//! result instead of leaving the caller to inspect callback state.
//!
//! Addresses reported by the host runtime are relative to the start of the
//! wasm file, while DWARF addresses are relative to the code section. `init`
//! returns the code section offset as `base_offset`; every lookup subtracts it
//! first. An address below `base_offset` is a caller bug and degrades to a
//! resolution failure, never a panic.
//!
//! Everything here is synchronous by design: resolution runs inside trace
//! formatting, which is not an async context.

use anyhow::{bail, Context as _, Result};
use log::debug;
use std::sync::Arc;
use wasmtime::{Caller, Engine, Extern, Linker, Memory, Module, Store, TypedFunc};

use crate::domain::{Frame, SymbolicationError};

/// Import namespace the engine blob expects its callbacks under.
const CALLBACK_NAMESPACE: &str = "env";

/// Per-binding host state visible to the callback imports.
struct EngineHost {
    /// The original bytes of the module being symbolicated
    binary: Arc<[u8]>,
    /// Frame captured by the most recent `on_frame` callback.
    /// Multiple callbacks during one call collapse to the last one received
    /// (inlined frames are not expanded).
    last_frame: Option<Frame>,
    /// Message captured by the most recent `on_error` callback
    last_error: Option<String>,
}

/// One live symbolication engine wired to one binary
pub struct EngineBinding {
    store: Store<EngineHost>,
    resolve: TypedFunc<u32, ()>,
    base_offset: u64,
}

impl EngineBinding {
    /// Instantiate the engine blob against `binary` and run its `init`.
    ///
    /// # Errors
    /// Fails if the blob does not compile, does not match the expected ABI, or
    /// signals an error during `init` (typically missing or malformed debug
    /// data). Callers cache this failure; construction is attempted at most
    /// once per module.
    pub fn new(engine: &Engine, engine_wasm: &[u8], binary: Arc<[u8]>) -> Result<Self> {
        let module =
            Module::new(engine, engine_wasm).context("failed to compile symbolication engine")?;

        let file_len = u32::try_from(binary.len())
            .context("binary too large for the engine's 32-bit address space")?;

        let host = EngineHost { binary, last_frame: None, last_error: None };
        let mut store = Store::new(engine, host);

        let mut linker: Linker<EngineHost> = Linker::new(engine);
        Self::link_callbacks(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &module)
            .context("failed to instantiate symbolication engine")?;

        let init = instance
            .get_typed_func::<u32, i32>(&mut store, "init")
            .context("engine does not export init(file_len) -> base_offset")?;
        let resolve = instance
            .get_typed_func::<u32, ()>(&mut store, "address_to_frame")
            .context("engine does not export address_to_frame(offset)")?;

        let base = init.call(&mut store, file_len).context("engine init trapped")?;
        if let Some(message) = store.data_mut().last_error.take() {
            bail!("engine init failed: {message}");
        }
        if base < 0 {
            bail!("engine init failed with status {base}");
        }

        debug!("engine initialized, base offset 0x{base:x}");
        Ok(Self { store, resolve, base_offset: u64::from(base.unsigned_abs()) })
    }

    /// Code-section offset established by `init`.
    ///
    /// Absolute addresses are translated to engine offsets by subtracting this.
    #[must_use]
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Resolve one absolute address to a frame.
    ///
    /// Returns `Ok(None)` when the engine completed without producing either a
    /// frame or an error (address outside any known range).
    ///
    /// # Errors
    /// - [`SymbolicationError::UnresolvableAddress`] if the address is below
    ///   `base_offset` or does not fit the engine's pointer width
    /// - [`SymbolicationError::EngineRuntime`] if the engine reported an error
    ///   or trapped mid-call
    pub fn address_to_frame(&mut self, address: u64) -> Result<Option<Frame>, SymbolicationError> {
        let offset = address
            .checked_sub(self.base_offset)
            .and_then(|offset| u32::try_from(offset).ok())
            .ok_or(SymbolicationError::UnresolvableAddress { address })?;

        let host = self.store.data_mut();
        host.last_frame = None;
        host.last_error = None;

        if let Err(trap) = self.resolve.call(&mut self.store, offset) {
            return Err(SymbolicationError::EngineRuntime(format!("{trap:#}")));
        }
        if let Some(message) = self.store.data_mut().last_error.take() {
            return Err(SymbolicationError::EngineRuntime(message));
        }
        Ok(self.store.data_mut().last_frame.take())
    }

    /// Define the four callback imports the engine blob links against.
    ///
    /// The names, arities and argument order here are the full integration
    /// contract with the offline-built engine; they must not change
    /// independently on either side.
    fn link_callbacks(linker: &mut Linker<EngineHost>) -> Result<()> {
        linker.func_wrap(
            CALLBACK_NAMESPACE,
            "read_chunk",
            |mut caller: Caller<'_, EngineHost>, dest: u32, src: u32, len: u32| -> u32 {
                let Some(memory) = engine_memory(&mut caller) else { return 0 };
                let binary = Arc::clone(&caller.data().binary);
                let start = (src as usize).min(binary.len());
                let end = start.saturating_add(len as usize).min(binary.len());
                let chunk = &binary[start..end];
                if chunk.is_empty() {
                    return 0;
                }
                match memory.write(&mut caller, dest as usize, chunk) {
                    Ok(()) => u32::try_from(chunk.len()).unwrap_or(0),
                    Err(_) => 0,
                }
            },
        )?;

        linker.func_wrap(
            CALLBACK_NAMESPACE,
            "on_frame",
            |mut caller: Caller<'_, EngineHost>,
             symbol: u32,
             symbol_len: u32,
             location: u32,
             location_len: u32,
             line: u32,
             column: u32| {
                let Some(memory) = engine_memory(&mut caller) else { return };
                let symbol = read_utf8(memory, &caller, symbol, symbol_len);
                let location = read_utf8(memory, &caller, location, location_len);
                caller.data_mut().last_frame = Some(Frame { symbol, location, line, column });
            },
        )?;

        linker.func_wrap(
            CALLBACK_NAMESPACE,
            "on_error",
            |mut caller: Caller<'_, EngineHost>, message: u32, len: u32| {
                let Some(memory) = engine_memory(&mut caller) else { return };
                let message = read_utf8(memory, &caller, message, len);
                caller.data_mut().last_error = Some(message);
            },
        )?;

        linker.func_wrap(
            CALLBACK_NAMESPACE,
            "print",
            |mut caller: Caller<'_, EngineHost>, message: u32, len: u32| {
                let Some(memory) = engine_memory(&mut caller) else { return };
                let message = read_utf8(memory, &caller, message, len);
                debug!("engine: {message}");
            },
        )?;

        Ok(())
    }
}

/// The engine's exported linear memory, if it has one.
fn engine_memory(caller: &mut Caller<'_, EngineHost>) -> Option<Memory> {
    caller.get_export("memory").and_then(Extern::into_memory)
}

/// Decode a pointer/length pair out of engine memory as UTF-8 text.
///
/// Out-of-bounds ranges are clamped rather than trapped; a misbehaving engine
/// yields truncated text, not a crash during trace formatting.
fn read_utf8(memory: Memory, caller: &Caller<'_, EngineHost>, ptr: u32, len: u32) -> String {
    let data = memory.data(caller);
    let start = (ptr as usize).min(data.len());
    let end = start.saturating_add(len as usize).min(data.len());
    String::from_utf8_lossy(&data[start..end]).into_owned()
}
