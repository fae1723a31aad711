//! Domain model for wasmsym
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod frame;
pub mod types;

// Re-export common types for convenience
pub use errors::SymbolicationError;
pub use frame::Frame;
pub use types::{InstanceId, ModuleId};
