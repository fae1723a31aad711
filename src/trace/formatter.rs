//! Replacement stack-trace rendering
//!
//! Produces the host's multi-line trace convention: the error's own
//! description on the first line, then one `    at …` line per frame. Only
//! frames that resolve through the symbolication engine differ from default
//! rendering; everything else passes through, so downstream log parsers keep
//! working.
//!
//! Failure policy (per frame, never per trace):
//! - no engine available for the instance → the frame's default text
//! - engine available but resolution failed → default text annotated
//!   ` <unresolved>`
//! - host frame → its text, untouched
//!
//! Rendering is infallible by construction. A malformed address, a missing
//! binary or a misbehaving engine cost one frame's symbolication, never the
//! trace.

use log::debug;
use std::sync::Arc;

use crate::domain::{Frame, InstanceId};
use crate::loader::TrackedInstance;
use crate::symbolicator::SharedState;
use crate::trace::call_site::{call_sites_from_error, CallSite};

/// Outcome of one address lookup, from the formatter's point of view
enum Resolution {
    /// No engine binding for this instance; use default rendering unannotated
    Unavailable,
    Resolved(Frame),
    /// An engine exists but this address failed; annotate the default text
    Failed,
}

pub struct TraceFormatter {
    shared: Arc<SharedState>,
}

impl TraceFormatter {
    pub(crate) fn new(shared: Arc<SharedState>) -> Self {
        Self { shared }
    }

    /// Render a guest error as a full symbolicated trace.
    ///
    /// Convenience over [`render`](Self::render) for the common case of a trap
    /// caught while calling into `instance`. The header is the root cause's
    /// description (the trap itself), not the backtrace wrapper wasmtime
    /// layers on top of it.
    #[must_use]
    pub fn render_error(&self, error: &anyhow::Error, instance: &TrackedInstance) -> String {
        let call_sites = call_sites_from_error(error, instance);
        self.render(&error.root_cause().to_string(), &call_sites)
    }

    /// Render a header line followed by one line per call site.
    #[must_use]
    pub fn render(&self, description: &str, call_sites: &[CallSite]) -> String {
        let mut out = String::from(description);
        for site in call_sites {
            out.push_str("\n    at ");
            out.push_str(&self.render_call_site(site));
        }
        out
    }

    /// String-based secondary path for when only rendered trace text is
    /// available. Each line's last hexadecimal token is treated as an address
    /// and resolved against `instance`; lines that resolve are rewritten,
    /// every other line passes through unchanged, line terminators (`\n` or
    /// `\r\n`, trailing or not) included.
    #[must_use]
    pub fn render_text(&self, text: &str, instance: &TrackedInstance) -> String {
        let mut out = String::with_capacity(text.len());
        for piece in text.split_inclusive('\n') {
            let (line, terminator) = match piece.strip_suffix("\r\n") {
                Some(line) => (line, "\r\n"),
                None => match piece.strip_suffix('\n') {
                    Some(line) => (line, "\n"),
                    None => (piece, ""),
                },
            };
            out.push_str(&self.render_text_line(line, instance.id()));
            out.push_str(terminator);
        }
        out
    }

    fn render_call_site(&self, site: &CallSite) -> String {
        match site {
            CallSite::Host { text } => text.clone(),
            CallSite::Wasm { instance, address, default_text } => {
                match self.resolve(*instance, *address) {
                    Resolution::Resolved(frame) => frame.to_string(),
                    Resolution::Unavailable => default_text.clone(),
                    Resolution::Failed => format!("{default_text} <unresolved>"),
                }
            }
        }
    }

    fn render_text_line(&self, line: &str, instance: InstanceId) -> String {
        let Some(address) = extract_hex_address(line) else {
            return line.to_string();
        };
        match self.resolve(instance, address) {
            Resolution::Resolved(frame) => {
                let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
                format!("{indent}at {frame}")
            }
            Resolution::Unavailable | Resolution::Failed => line.to_string(),
        }
    }

    fn resolve(&self, instance: InstanceId, address: u64) -> Resolution {
        let Some(binding) = self.shared.binding_for_instance(instance) else {
            return Resolution::Unavailable;
        };
        let mut binding = binding.lock();
        match binding.address_to_frame(address) {
            Ok(Some(frame)) => Resolution::Resolved(frame),
            Ok(None) => {
                debug!("no frame for address 0x{address:x}");
                Resolution::Failed
            }
            Err(e) => {
                debug!("failed to resolve address 0x{address:x}: {e}");
                Resolution::Failed
            }
        }
    }
}

/// Last `0x…` hexadecimal token in a line, the position V8-style renderings
/// put the instruction offset.
fn extract_hex_address(line: &str) -> Option<u64> {
    let mut found = None;
    let mut rest = line;
    while let Some(idx) = rest.find("0x") {
        let digits = &rest[idx + 2..];
        let end = digits.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(digits.len());
        if end > 0 {
            if let Ok(value) = u64::from_str_radix(&digits[..end], 16) {
                found = Some(value);
            }
        }
        rest = &rest[idx + 2..];
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_hex_address() {
        assert_eq!(extract_hex_address("    at foo (wasm offset 0x5c)"), Some(0x5c));
        assert_eq!(
            extract_hex_address("at wasm://wasm/0005cace:wasm-function[1]:0x5c"),
            Some(0x5c)
        );
        assert_eq!(extract_hex_address("no token here"), None);
        assert_eq!(extract_hex_address("bare 0x without digits"), None);
    }

    #[test]
    fn test_extract_hex_address_takes_last_token() {
        assert_eq!(extract_hex_address("0x10 then 0x20"), Some(0x20));
    }
}
