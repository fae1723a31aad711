//! # wasmsym - Runtime Symbolication of WebAssembly Stack Traces
//!
//! When a wasm guest traps, the host reports raw byte offsets like `0x5c`
//! where a source location should be. wasmsym turns those offsets into
//! `run_fib (src/lib.rs:10:5)` using the DWARF debug metadata embedded in the
//! guest binary itself — without the code that loads or calls the guest doing
//! anything beyond going through the tracked loader.
//!
//! The DWARF parsing is not done here. It lives in an opaque *symbolication
//! engine*: a wasm blob built once, offline, and supplied to
//! [`Symbolicator::new`]. This crate owns everything around that blob — the
//! data-exchange protocol with it, the lazy once-per-module lifecycle, and the
//! bookkeeping that correlates binaries, compiled modules and running
//! instances so a stack frame can find its way back to the right bytes.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Embedder                            │
//! │      loads guests, calls exports, catches trap errors      │
//! └──────────────┬────────────────────────────┬────────────────┘
//!                │ create                     │ render
//!                ▼                            ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │          Loader          │   │      TraceFormatter      │
//! │  (intercepted creation   │   │  header + one line per   │
//! │   paths, tee'd streams)  │   │  frame, per-frame        │
//! └──────────────┬───────────┘   │  fallback                │
//!                │ records       └────────────┬─────────────┘
//!                ▼                            │ lookup
//! ┌──────────────────────────┐                ▼
//! │  BinaryRegistry          │   ┌──────────────────────────┐
//! │    module ↔ raw bytes    │◀──│       EngineCache        │
//! │  InstanceRegistry        │   │  one binding per module, │
//! │    instance ↔ module     │   │  sticky failures         │
//! └──────────────────────────┘   └────────────┬─────────────┘
//!                                             ▼
//!                                ┌──────────────────────────┐
//!                                │      EngineBinding       │
//!                                │  init / address_to_frame │
//!                                │  read_chunk / on_frame / │
//!                                │  on_error / print  ABI   │
//!                                └──────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`loader`]: the intercepted creation paths. Delegates to wasmtime first,
//!   records second; streamed sources are tee'd so the compiler and the
//!   registry each get a full copy of bytes that can only be read once.
//! - [`registry`]: the weak module↔bytes and instance↔module correlations.
//!   Handle drop hooks keep entries from outliving their handles.
//! - [`engine`]: the host side of the engine ABI and the per-module cache
//!   (construction at most once, failures sticky for the process lifetime).
//! - [`trace`]: call-site extraction from trap backtraces and the replacement
//!   trace rendering, including the string-based fallback path.
//! - [`domain`]: ids, the [`Frame`] result type, structured errors.
//!
//! ## Failure Model
//!
//! Nothing in this crate is fatal to the embedder. Engine construction
//! failures are logged and cached as permanent negatives; per-address failures
//! cost that one frame its symbolication; untracked handles simply render with
//! default text. The worst case is a stack trace with fewer symbolicated
//! frames than ideal — never a missing trace, never a crash.
//!
//! ## Typical Usage
//!
//! ```rust,ignore
//! let sym = Symbolicator::new(include_bytes!("../engine/symbolication_engine.wasm"));
//! let loader = sym.loader();
//!
//! let (module, instance) = loader.instantiate(&guest_bytes).await?;
//! if let Err(trap) = instance.call_export("run_fib") {
//!     eprintln!("{}", sym.formatter().render_error(&trap, &instance));
//! }
//! ```
//!
//! ## Known Limitations
//!
//! - Inlined frames are not expanded; when the engine reports several
//!   candidate frames for one address, only the last one is kept.
//! - Only the default DWARF layout embedded in the wasm binary is supported.
//! - Symbol data is not persisted across process restarts.

pub mod domain;
pub mod engine;
pub mod loader;
pub mod registry;
pub mod symbolicator;
pub mod trace;

pub use domain::{Frame, InstanceId, ModuleId, SymbolicationError};
pub use loader::{Loader, TrackedInstance, TrackedModule};
pub use symbolicator::Symbolicator;
pub use trace::{call_sites_from_error, CallSite, TraceFormatter};
