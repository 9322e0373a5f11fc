//! Shared test helpers for integration tests.
//!
//! Provides WAT guests, resource sources and bridge factory functions used
//! across all integration test files.

#![allow(dead_code)]

use std::sync::Arc;

use kiln_bridge::{Bridge, BridgeConfig, ModuleSpec};
use kiln_hostapi::MemSource;

pub const APP_PATH: &str = "app.wasm";

// ── Guests ──

/// A primary guest that records every ABI call in globals.
///
/// `seq` accumulates one decimal digit per call, in call order:
/// 1 pointer_moved, 2 pointer_button, 3 key_changed, 4 render_frame,
/// 5 file_loaded, 6 file_failed.
pub const APP_WAT: &str = r#"
(module
  (import "env" "memory" (memory 2))
  (import "env" "fetch_file" (func $fetch_file (param i32) (result i32)))
  (import "env" "console_log" (func $console_log (param i32)))

  (data (i32.const 1024) "assets/hello.txt\00")
  (data (i32.const 1056) "missing.bin\00")
  (data (i32.const 1088) "guest ready\00")

  (global $heap (mut i32) (i32.const 0))
  (global $heap_base (mut i32) (i32.const 0))
  (global $seq (mut i32) (i32.const 0))
  (global $frames (mut i32) (i32.const 0))
  (global $width (mut f64) (f64.const 0))
  (global $height (mut f64) (f64.const 0))
  (global $px (mut f64) (f64.const 0))
  (global $py (mut f64) (f64.const 0))
  (global $button (mut i32) (i32.const -1))
  (global $pressed (mut i32) (i32.const -1))
  (global $key (mut i32) (i32.const -1))
  (global $loaded_id (mut i32) (i32.const 0))
  (global $loaded_len (mut i32) (i32.const 0))
  (global $loaded_first (mut i32) (i32.const 0))
  (global $loaded_url_first (mut i32) (i32.const 0))
  (global $failed_id (mut i32) (i32.const 0))
  (global $failed_code (mut i32) (i32.const 0))
  (global $allocs (mut i32) (i32.const 0))
  (global $frees (mut i32) (i32.const 0))

  (func $record (param i32)
    global.get $seq i32.const 10 i32.mul local.get 0 i32.add global.set $seq)

  (func (export "get_stack_base") (result i32) i32.const 8192)
  (func (export "initialize") (param i32)
    local.get 0 global.set $heap
    local.get 0 global.set $heap_base
    i32.const 1088 call $console_log)
  (func (export "render_frame") (param f64 f64)
    local.get 0 global.set $width
    local.get 1 global.set $height
    global.get $frames i32.const 1 i32.add global.set $frames
    i32.const 4 call $record)
  (func (export "pointer_moved") (param f64 f64)
    local.get 0 global.set $px
    local.get 1 global.set $py
    i32.const 1 call $record)
  (func (export "pointer_button") (param i32 i32 f64 f64)
    local.get 0 global.set $button
    local.get 1 global.set $pressed
    local.get 2 global.set $px
    local.get 3 global.set $py
    i32.const 2 call $record)
  (func (export "key_changed") (param i32 i32)
    local.get 0 global.set $key
    local.get 1 global.set $pressed
    i32.const 3 call $record)

  (func (export "alloc") (param $arena i32) (param $size i32) (result i32)
    (local $ptr i32)
    global.get $heap local.set $ptr
    global.get $heap
    local.get $size i32.const 7 i32.add i32.const -8 i32.and
    i32.add global.set $heap
    global.get $allocs i32.const 1 i32.add global.set $allocs
    local.get $ptr)
  (func (export "free") (param i32 i32 i32)
    global.get $frees i32.const 1 i32.add global.set $frees)

  (func (export "file_loaded") (param $id i32) (param $url i32) (param $data i32) (param $len i32)
    local.get $id global.set $loaded_id
    local.get $len global.set $loaded_len
    local.get $data i32.load8_u global.set $loaded_first
    local.get $url i32.load8_u global.set $loaded_url_first
    i32.const 5 call $record)
  (func (export "file_failed") (param $id i32) (param $url i32) (param $code i32)
    local.get $id global.set $failed_id
    local.get $code global.set $failed_code
    i32.const 6 call $record)

  (func (export "request_files") (result i32)
    i32.const 1024 call $fetch_file drop
    i32.const 1056 call $fetch_file)
  (func (export "scribble")
    i32.const 16 i32.const 0 i32.store8)
  (func (export "spin") (loop $l br $l))

  (func (export "seq") (result i32) global.get $seq)
  (func (export "frames") (result i32) global.get $frames)
  (func (export "width") (result f64) global.get $width)
  (func (export "height") (result f64) global.get $height)
  (func (export "px") (result f64) global.get $px)
  (func (export "py") (result f64) global.get $py)
  (func (export "button") (result i32) global.get $button)
  (func (export "pressed") (result i32) global.get $pressed)
  (func (export "key") (result i32) global.get $key)
  (func (export "heap_base") (result i32) global.get $heap_base)
  (func (export "loaded_id") (result i32) global.get $loaded_id)
  (func (export "loaded_len") (result i32) global.get $loaded_len)
  (func (export "loaded_first") (result i32) global.get $loaded_first)
  (func (export "loaded_url_first") (result i32) global.get $loaded_url_first)
  (func (export "failed_id") (result i32) global.get $failed_id)
  (func (export "failed_code") (result i32) global.get $failed_code)
  (func (export "allocs") (result i32) global.get $allocs)
  (func (export "frees") (result i32) global.get $frees)
)
"#;

/// `APP_WAT` with an allocator that returns null for requests over `limit`
/// bytes. Refused requests are not counted in `allocs`.
pub fn app_with_alloc_limit(limit: u32) -> String {
    APP_WAT.replace(
        "global.get $heap local.set $ptr",
        &format!(
            "local.get $size i32.const {} i32.gt_u if i32.const 0 return end
    global.get $heap local.set $ptr",
            limit
        ),
    )
}

/// The minimal primary ABI with `render_body` as the frame callback and
/// empty bodies elsewhere. `extra` is spliced into the module.
pub fn primary_wat(render_body: &str, extra: &str) -> String {
    format!(
        r#"(module
  (import "env" "memory" (memory 1))
  {}
  (func (export "get_stack_base") (result i32) i32.const 4096)
  (func (export "initialize") (param i32))
  (func (export "render_frame") (param f64 f64) {})
  (func (export "pointer_moved") (param f64 f64))
  (func (export "pointer_button") (param i32 i32 f64 f64))
  (func (export "alloc") (param i32 i32) (result i32) i32.const 0)
  (func (export "free") (param i32 i32 i32))
)"#,
        extra, render_body
    )
}

// ── Logging ──

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ── Sources ──

pub fn source_with(files: &[(&str, &str)]) -> MemSource {
    let mut source = MemSource::new();
    for (path, contents) in files {
        source.insert(*path, contents.as_bytes().to_vec());
    }
    source
}

// ── Bridge Factories ──

pub fn bridge(source: MemSource, config: BridgeConfig) -> Bridge {
    init_logging();
    Bridge::new(config, Arc::new(source)).unwrap()
}

/// A bridge with `APP_WAT` loaded as the primary module and initialized.
pub fn ready_app(config: BridgeConfig) -> Bridge {
    let source = source_with(&[(APP_PATH, APP_WAT), ("assets/hello.txt", "hello")]);
    ready_bridge(source, config)
}

/// Load `APP_PATH` from `source` as the primary module and compute the layout.
pub fn ready_bridge(source: MemSource, config: BridgeConfig) -> Bridge {
    let mut bridge = bridge(source, config);
    bridge.load(&ModuleSpec::primary("app", APP_PATH)).unwrap();
    bridge.compute_layout().unwrap();
    bridge
}

/// Read one of `APP_WAT`'s i32 getters.
pub fn peek(bridge: &mut Bridge, getter: &str) -> i32 {
    bridge.call_primary::<(), i32>(getter, ()).unwrap()
}

/// Read one of `APP_WAT`'s f64 getters.
pub fn peek_f64(bridge: &mut Bridge, getter: &str) -> f64 {
    bridge.call_primary::<(), f64>(getter, ()).unwrap()
}
