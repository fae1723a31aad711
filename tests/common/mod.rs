//! Shared fixtures: tiny WAT engines that speak the symbolication engine ABI,
//! and a guest module that deterministically traps.
//!
//! The real engine is an offline-built blob that parses DWARF; these stand-ins
//! implement the same `init`/`address_to_frame` exports and `env` imports with
//! hardcoded behavior, which keeps the protocol tests deterministic.

#![allow(dead_code)]

use futures::Stream;
use std::io;
use wasmsym::Symbolicator;

/// Engine with base offset 0 that reports `run_fib (src/lib.rs:10:5)` for any
/// offset below 4096 and an error above.
pub const FIXED_FRAME_ENGINE: &str = r#"
(module
  (import "env" "read_chunk" (func $read_chunk (param i32 i32 i32) (result i32)))
  (import "env" "on_frame" (func $on_frame (param i32 i32 i32 i32 i32 i32)))
  (import "env" "on_error" (func $on_error (param i32 i32)))
  (import "env" "print" (func $print (param i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "run_fib")
  (data (i32.const 16) "src/lib.rs")
  (data (i32.const 32) "address out of range")
  (func (export "init") (param i32) (result i32)
    i32.const 0)
  (func (export "address_to_frame") (param $offset i32)
    local.get $offset
    i32.const 4096
    i32.lt_u
    if
      i32.const 0
      i32.const 7
      i32.const 16
      i32.const 10
      i32.const 10
      i32.const 5
      call $on_frame
    else
      i32.const 32
      i32.const 20
      call $on_error
    end))
"#;

/// Same frame data as [`FIXED_FRAME_ENGINE`] but with a base offset of 64,
/// for exercising the address translation arithmetic.
pub const OFFSET_ENGINE: &str = r#"
(module
  (import "env" "read_chunk" (func $read_chunk (param i32 i32 i32) (result i32)))
  (import "env" "on_frame" (func $on_frame (param i32 i32 i32 i32 i32 i32)))
  (import "env" "on_error" (func $on_error (param i32 i32)))
  (import "env" "print" (func $print (param i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "run_fib")
  (data (i32.const 16) "src/lib.rs")
  (data (i32.const 32) "address out of range")
  (func (export "init") (param i32) (result i32)
    i32.const 64)
  (func (export "address_to_frame") (param $offset i32)
    local.get $offset
    i32.const 4096
    i32.lt_u
    if
      i32.const 0
      i32.const 7
      i32.const 16
      i32.const 10
      i32.const 10
      i32.const 5
      call $on_frame
    else
      i32.const 32
      i32.const 20
      call $on_error
    end))
"#;

/// Engine whose `init` pulls the first byte of the target binary through
/// `read_chunk` and returns it as the base offset, proving the host feeds it
/// the right bytes.
pub const PROBE_ENGINE: &str = r#"
(module
  (import "env" "read_chunk" (func $read_chunk (param i32 i32 i32) (result i32)))
  (import "env" "on_frame" (func $on_frame (param i32 i32 i32 i32 i32 i32)))
  (import "env" "on_error" (func $on_error (param i32 i32)))
  (import "env" "print" (func $print (param i32 i32)))
  (memory (export "memory") 1)
  (func (export "init") (param $len i32) (result i32)
    (drop (call $read_chunk (i32.const 128) (i32.const 0) (i32.const 1)))
    (i32.load8_u (i32.const 128)))
  (func (export "address_to_frame") (param i32)))
"#;

/// Engine that reports two candidate frames per address, the way inlining
/// does: a `detour (src/inline.rs:3:1)` candidate first, then
/// `run_fib (src/lib.rs:10:5)`. Only the last report should survive.
pub const MULTI_FRAME_ENGINE: &str = r#"
(module
  (import "env" "read_chunk" (func $read_chunk (param i32 i32 i32) (result i32)))
  (import "env" "on_frame" (func $on_frame (param i32 i32 i32 i32 i32 i32)))
  (import "env" "on_error" (func $on_error (param i32 i32)))
  (import "env" "print" (func $print (param i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "detour")
  (data (i32.const 16) "src/inline.rs")
  (data (i32.const 48) "run_fib")
  (data (i32.const 64) "src/lib.rs")
  (func (export "init") (param i32) (result i32)
    i32.const 0)
  (func (export "address_to_frame") (param i32)
    (call $on_frame (i32.const 0) (i32.const 6) (i32.const 16) (i32.const 13) (i32.const 3) (i32.const 1))
    (call $on_frame (i32.const 48) (i32.const 7) (i32.const 64) (i32.const 10) (i32.const 10) (i32.const 5))))
"#;

/// Engine that completes every lookup without reporting a frame or an error,
/// the address-outside-known-ranges case.
pub const SILENT_ENGINE: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "init") (param i32) (result i32)
    i32.const 0)
  (func (export "address_to_frame") (param i32)))
"#;

/// Engine that cannot initialize, the malformed-debug-data case.
pub const FAILING_ENGINE: &str = r#"
(module
  (import "env" "on_error" (func $on_error (param i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "no debug data")
  (func (export "init") (param i32) (result i32)
    (call $on_error (i32.const 0) (i32.const 13))
    (i32.const -2))
  (func (export "address_to_frame") (param i32)))
"#;

/// Guest whose only interesting export deterministically traps.
pub const TRAPPING_GUEST: &str = r#"
(module
  (func $boom (export "boom")
    unreachable)
  (func (export "fine")))
"#;

pub fn symbolicator_with(engine_wat: &str) -> Symbolicator {
    let _ = env_logger::builder().is_test(true).try_init();
    Symbolicator::new(engine_wat.as_bytes())
}

/// A network-response-shaped stream delivering `bytes` in small chunks.
pub fn chunked_stream(
    bytes: &[u8],
    chunk_size: usize,
) -> impl Stream<Item = io::Result<Vec<u8>>> + Unpin {
    let chunks: Vec<io::Result<Vec<u8>>> =
        bytes.chunks(chunk_size).map(|c| Ok(c.to_vec())).collect();
    futures::stream::iter(chunks)
}
