//! Structured error types for wasmsym
//!
//! Using thiserror for automatic Display implementation and error chaining.
//!
//! None of these errors are ever fatal to the embedding process: construction
//! failures are cached as sticky negatives by the engine cache, and resolution
//! failures degrade individual trace lines to their default rendering.

use super::types::{InstanceId, ModuleId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SymbolicationError {
    #[error("failed to construct symbolication engine for {module}: {reason}")]
    EngineConstruction { module: ModuleId, reason: String },

    #[error("symbolication engine reported an error: {0}")]
    EngineRuntime(String),

    #[error("address 0x{address:x} cannot be resolved to a frame")]
    UnresolvableAddress { address: u64 },

    #[error("{0} was not created through a tracked loader path")]
    UntrackedHandle(InstanceId),

    #[error("no binary recorded for {0}")]
    MissingBinary(ModuleId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolvable_address_display() {
        let err = SymbolicationError::UnresolvableAddress { address: 0x1f40 };
        assert_eq!(err.to_string(), "address 0x1f40 cannot be resolved to a frame");
    }

    #[test]
    fn test_untracked_handle_display() {
        let err = SymbolicationError::UntrackedHandle(InstanceId(3));
        assert!(err.to_string().contains("instance#3"));
    }
}
