//! Trace rendering: header preservation, per-frame fallback, string path.

mod common;

use common::{symbolicator_with, FIXED_FRAME_ENGINE, OFFSET_ENGINE, SILENT_ENGINE, TRAPPING_GUEST};
use wasmsym::{CallSite, InstanceId, Symbolicator, TrackedInstance};

fn tracked_instance(sym: &Symbolicator) -> TrackedInstance {
    let loader = sym.loader();
    let module = loader.module_from_bytes(TRAPPING_GUEST.as_bytes()).unwrap();
    loader.instance_from_module(&module).unwrap()
}

#[test]
fn test_header_line_and_frame_lines() {
    let sym = symbolicator_with(FIXED_FRAME_ENGINE);
    let instance = tracked_instance(&sym);

    let call_sites = vec![
        CallSite::Wasm {
            instance: instance.id(),
            address: 0x40,
            default_text: "wasm-function[0] (wasm offset 0x40)".to_string(),
        },
        CallSite::Host { text: "native_caller".to_string() },
    ];

    let rendered = sym.formatter().render("boom: something broke", &call_sites);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "boom: something broke");
    assert_eq!(lines[1], "    at run_fib (src/lib.rs:10:5)");
    assert_eq!(lines[2], "    at native_caller");
}

#[test]
fn test_unknown_instance_falls_back_to_default_text() {
    let sym = symbolicator_with(FIXED_FRAME_ENGINE);

    let call_sites = vec![CallSite::Wasm {
        instance: InstanceId(u64::MAX),
        address: 0x40,
        default_text: "wasm-function[0] (wasm offset 0x40)".to_string(),
    }];

    let rendered = sym.formatter().render("boom", &call_sites);
    // No engine available: default rendering, no unresolved annotation
    assert_eq!(rendered, "boom\n    at wasm-function[0] (wasm offset 0x40)");
}

#[test]
fn test_resolution_failure_annotates_default_text() {
    let sym = symbolicator_with(OFFSET_ENGINE);
    let instance = tracked_instance(&sym);

    // Below the engine's base offset: resolution fails, frame is annotated,
    // trace is otherwise intact
    let call_sites = vec![
        CallSite::Wasm {
            instance: instance.id(),
            address: 0x2,
            default_text: "wasm-function[0] (wasm offset 0x2)".to_string(),
        },
        CallSite::Wasm {
            instance: instance.id(),
            address: 100,
            default_text: "wasm-function[1] (wasm offset 0x64)".to_string(),
        },
    ];

    let rendered = sym.formatter().render("boom", &call_sites);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[1], "    at wasm-function[0] (wasm offset 0x2) <unresolved>");
    assert_eq!(lines[2], "    at run_fib (src/lib.rs:10:5)");
}

#[test]
fn test_missing_frame_annotates_default_text() {
    let sym = symbolicator_with(SILENT_ENGINE);
    let instance = tracked_instance(&sym);

    // The engine completes without a frame and without an error; the frame
    // still falls back, annotated
    let call_sites = vec![CallSite::Wasm {
        instance: instance.id(),
        address: 0x40,
        default_text: "wasm-function[0] (wasm offset 0x40)".to_string(),
    }];

    let rendered = sym.formatter().render("boom", &call_sites);
    assert_eq!(rendered, "boom\n    at wasm-function[0] (wasm offset 0x40) <unresolved>");
}

#[test]
fn test_empty_trace_is_just_the_header() {
    let sym = symbolicator_with(FIXED_FRAME_ENGINE);
    assert_eq!(sym.formatter().render("lonely error", &[]), "lonely error");
}

#[test]
fn test_text_path_rewrites_lines_with_hex_tokens() {
    let sym = symbolicator_with(FIXED_FRAME_ENGINE);
    let instance = tracked_instance(&sym);

    let raw = "Error: boom\n    at wasm://wasm/0005cace:wasm-function[1]:0x5c\n    at runMain (node:internal:123)";
    let rendered = sym.formatter().render_text(raw, &instance);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "Error: boom");
    assert_eq!(lines[1], "    at run_fib (src/lib.rs:10:5)");
    // No hex token: passed through untouched
    assert_eq!(lines[2], "    at runMain (node:internal:123)");
}

#[test]
fn test_text_path_preserves_line_terminators() {
    let sym = symbolicator_with(FIXED_FRAME_ENGINE);
    let instance = tracked_instance(&sym);

    let raw = "Error: boom\r\n    at native (file.js:1)\r\n    at wasm-function[1]:0x5c\n";
    let rendered = sym.formatter().render_text(raw, &instance);
    assert_eq!(
        rendered,
        "Error: boom\r\n    at native (file.js:1)\r\n    at run_fib (src/lib.rs:10:5)\n"
    );

    // No trailing newline in, none out
    assert_eq!(sym.formatter().render_text("plain line", &instance), "plain line");
}

#[test]
fn test_text_path_passes_unresolvable_lines_through() {
    let sym = symbolicator_with(OFFSET_ENGINE);
    let instance = tracked_instance(&sym);

    // 0x2 is below the base offset, so the line must survive unchanged
    let raw = "    at wasm-function[0]:0x2";
    assert_eq!(sym.formatter().render_text(raw, &instance), raw);
}
