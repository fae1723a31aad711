//! The resolved result of one address lookup

use std::fmt;

/// One resolved stack frame: symbol plus source location.
///
/// Frames are ephemeral. They are produced by the engine's `on_frame` callback
/// during a single synchronous resolution call and formatted immediately;
/// nothing persists them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Demangled function name, empty if the engine found none
    pub symbol: String,
    /// Source file path, empty if unknown
    pub location: String,
    /// 1-based source line, 0 if unknown
    pub line: u32,
    /// 1-based source column, 0 if unknown
    pub column: u32,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{}:{})", self.symbol, self.location, self.line, self.column)
    }
}
