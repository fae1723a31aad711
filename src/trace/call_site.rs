//! Call sites: the formatter's view of one raw stack frame
//!
//! The formatter does not walk wasmtime backtraces directly; it consumes
//! [`CallSite`]s, which carry just enough to decide between symbolication and
//! default rendering. Keeping the adapter separate also keeps the formatter
//! testable with synthetic call sites.

use rustc_demangle::demangle;
use wasmtime::{FrameInfo, WasmBacktrace};

use crate::domain::InstanceId;
use crate::loader::TrackedInstance;

/// One entry of a raw stack trace
#[derive(Debug, Clone)]
pub enum CallSite {
    /// A frame inside a compiled-module instance, identified by its
    /// file-relative address. `default_text` is what the frame renders as
    /// when symbolication is unavailable or fails.
    Wasm { instance: InstanceId, address: u64, default_text: String },
    /// Anything else; rendered as-is.
    Host { text: String },
}

/// Extract call sites from a guest error's backtrace.
///
/// Traps raised while calling into a tracked instance carry a
/// `WasmBacktrace` in their error chain. Frames that report a module offset
/// become [`CallSite::Wasm`] attributed to the instance the host was calling;
/// frames without one (no address map available) degrade to
/// [`CallSite::Host`]. An error with no backtrace yields no call sites.
///
/// Attribution is per call, not per frame: every wasm frame is assumed to
/// belong to `instance`. That holds while instances are instantiated without
/// imports; if guests ever link functions from other tracked modules, frames
/// crossing module boundaries need their own attribution before this adapter
/// can symbolicate them correctly.
#[must_use]
pub fn call_sites_from_error(error: &anyhow::Error, instance: &TrackedInstance) -> Vec<CallSite> {
    let Some(backtrace) = error.downcast_ref::<WasmBacktrace>() else {
        return Vec::new();
    };
    backtrace
        .frames()
        .iter()
        .map(|frame| {
            let default_text = default_frame_text(frame);
            match frame.module_offset() {
                Some(offset) => CallSite::Wasm {
                    instance: instance.id(),
                    address: offset as u64,
                    default_text,
                },
                None => CallSite::Host { text: default_text },
            }
        })
        .collect()
}

/// The host runtime's own rendering of a frame: demangled function name (or a
/// positional placeholder) plus the raw module offset.
fn default_frame_text(frame: &FrameInfo) -> String {
    let name = frame.func_name().map_or_else(
        || format!("wasm-function[{}]", frame.func_index()),
        |name| format!("{:#}", demangle(name)),
    );
    match frame.module_offset() {
        Some(offset) => format!("{name} (wasm offset 0x{offset:x})"),
        None => name,
    }
}
