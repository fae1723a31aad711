//! The symbolication engine binding and its per-module cache
//!
//! The actual address-to-symbol work happens inside an opaque wasm blob built
//! offline; see [`binding`] for the host side of its ABI and [`cache`] for the
//! once-per-module construction policy.

pub mod binding;
pub mod cache;

pub use binding::EngineBinding;
pub use cache::EngineCache;
