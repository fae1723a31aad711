//! Stack-trace rendering with on-demand symbolication

pub mod call_site;
pub mod formatter;

pub use call_site::{call_sites_from_error, CallSite};
pub use formatter::TraceFormatter;
