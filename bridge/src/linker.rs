//! Host service registration via the Wasmtime linker.
//!
//! Registers the console, print, time, heap and fetch imports under `env`. Each
//! function:
//! 1. Reads its pointer arguments through the bound linear memory
//! 2. Performs the operation on the `BridgeContext`
//! 3. Traps with a `HostCallError` on any boundary violation
//!
//! Drawing imports live in `canvas.rs` and `gl.rs`, math intrinsics in
//! `intrinsics.rs`.

use std::time::{SystemTime, UNIX_EPOCH};

use wasmtime::{Caller, Linker, WasmBacktrace};

use crate::context::BridgeContext;
use crate::error::{BridgeError, HostCallError};
use crate::marshal;

/// Module name every host import is registered under.
pub const IMPORT_MODULE: &str = "env";

/// `log` target for guest console output.
pub const GUEST_LOG_TARGET: &str = "kiln::guest";

/// Severity of a guest console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Debug,
    Log,
    Info,
    Notify,
    Other,
    Warn,
    Error,
}

impl ConsoleLevel {
    /// Level for the numeric code taken by `console_write_line`.
    /// Unknown codes log at `Log`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ConsoleLevel::Debug,
            1 => ConsoleLevel::Log,
            2 => ConsoleLevel::Info,
            3 => ConsoleLevel::Notify,
            4 => ConsoleLevel::Other,
            5 => ConsoleLevel::Warn,
            6 => ConsoleLevel::Error,
            _ => ConsoleLevel::Log,
        }
    }

    pub fn log_level(self) -> log::Level {
        match self {
            ConsoleLevel::Debug => log::Level::Debug,
            ConsoleLevel::Log | ConsoleLevel::Info | ConsoleLevel::Notify | ConsoleLevel::Other => {
                log::Level::Info
            }
            ConsoleLevel::Warn => log::Level::Warn,
            ConsoleLevel::Error => log::Level::Error,
        }
    }
}

/// One line of guest console output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub level: ConsoleLevel,
    pub message: String,
}

/// Read a NUL-terminated guest string, trapping on failure.
pub(crate) fn guest_string(
    caller: &Caller<'_, BridgeContext>,
    import: &str,
    ptr: i32,
) -> anyhow::Result<String> {
    marshal::read_c_string(caller, ptr as u32)
        .map_err(|e| HostCallError::from(e).trap(import))
}

fn console(caller: &mut Caller<'_, BridgeContext>, level: ConsoleLevel, message: String) {
    log::log!(target: GUEST_LOG_TARGET, level.log_level(), "{}", message);
    caller.data_mut().record_console(ConsoleLine { level, message });
}

/// Register console, print, time, heap and fetch functions with the linker.
pub fn register_host_services(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    register_console(linker)?;
    register_print(linker)?;
    register_time(linker)?;
    register_heap(linker)?;
    register_fetch(linker)?;
    Ok(())
}

// ── Console ──

fn register_console(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    const LEVELS: [(&str, ConsoleLevel); 7] = [
        ("console_debug", ConsoleLevel::Debug),
        ("console_log", ConsoleLevel::Log),
        ("console_info", ConsoleLevel::Info),
        ("console_notify", ConsoleLevel::Notify),
        ("console_other", ConsoleLevel::Other),
        ("console_warn", ConsoleLevel::Warn),
        ("console_error", ConsoleLevel::Error),
    ];
    for (name, level) in LEVELS {
        linker.func_wrap(
            IMPORT_MODULE,
            name,
            move |mut caller: Caller<'_, BridgeContext>, ptr: i32| -> anyhow::Result<()> {
                let message = guest_string(&caller, name, ptr)?;
                console(&mut caller, level, message);
                Ok(())
            },
        )?;
    }

    linker.func_wrap(
        IMPORT_MODULE,
        "console_write_line",
        |mut caller: Caller<'_, BridgeContext>, level: i32, ptr: i32| -> anyhow::Result<()> {
            let message = guest_string(&caller, "console_write_line", ptr)?;
            console(&mut caller, ConsoleLevel::from_code(level), message);
            Ok(())
        },
    )?;
    Ok(())
}

fn register_print(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "print_number",
        |mut caller: Caller<'_, BridgeContext>, number: i32| {
            let message = format!("Number: 0x{:x} ({})", number, number);
            console(&mut caller, ConsoleLevel::Log, message);
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "print_integer",
        |mut caller: Caller<'_, BridgeContext>, label: i32, value: i32| -> anyhow::Result<()> {
            let label = guest_string(&caller, "print_integer", label)?;
            console(&mut caller, ConsoleLevel::Log, format!("{}: {}", label, value));
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "print_float",
        |mut caller: Caller<'_, BridgeContext>, label: i32, value: f64| -> anyhow::Result<()> {
            let label = guest_string(&caller, "print_float", label)?;
            console(&mut caller, ConsoleLevel::Log, format!("{}: {}", label, value));
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "print_string",
        |mut caller: Caller<'_, BridgeContext>, label: i32, ptr: i32| -> anyhow::Result<()> {
            let label = guest_string(&caller, "print_string", label)?;
            let text = guest_string(&caller, "print_string", ptr)?;
            console(&mut caller, ConsoleLevel::Log, format!("{}: {}", label, text));
            Ok(())
        },
    )?;

    // The trace is empty unless the engine captures wasm backtraces.
    linker.func_wrap(
        IMPORT_MODULE,
        "print_call_stack",
        |mut caller: Caller<'_, BridgeContext>, label: i32| -> anyhow::Result<()> {
            let label = guest_string(&caller, "print_call_stack", label)?;
            let trace = WasmBacktrace::capture(&caller);
            let message = format!("{} (Stack Trace):\n{}", label, trace);
            console(&mut caller, ConsoleLevel::Log, message);
            Ok(())
        },
    )?;
    Ok(())
}

// ── Information ──

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

fn register_time(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    linker.func_wrap(IMPORT_MODULE, "time_now", now_millis)?;
    Ok(())
}

// ── Memory ──

fn register_heap(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    // Bytes between the heap base and the end of memory.
    linker.func_wrap(
        IMPORT_MODULE,
        "heap_size",
        |caller: Caller<'_, BridgeContext>| -> anyhow::Result<i32> {
            let memory = caller
                .data()
                .bound_memory()
                .map_err(|e| e.trap("heap_size"))?;
            let heap_base = caller.data().layout().map_or(0, |l| l.heap_base as u64);
            let size = memory.size(&caller).saturating_sub(heap_base);
            Ok(i32::try_from(size).unwrap_or(i32::MAX))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "heap_grow",
        |mut caller: Caller<'_, BridgeContext>, pages: i32| -> anyhow::Result<()> {
            let memory = caller
                .data()
                .bound_memory()
                .map_err(|e| e.trap("heap_grow"))?;
            let pages = u64::try_from(pages).unwrap_or(0);
            memory
                .grow(&mut caller, pages)
                .map_err(|e| HostCallError::from(e).trap("heap_grow"))?;
            log::info!(
                "grew guest memory by {} page{} (now {} pages)",
                pages,
                if pages == 1 { "" } else { "s" },
                memory.pages(&caller)
            );
            Ok(())
        },
    )?;
    Ok(())
}

// ── Fetch ──

fn register_fetch(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "fetch_file",
        |mut caller: Caller<'_, BridgeContext>, url_ptr: i32| -> anyhow::Result<i32> {
            let url = guest_string(&caller, "fetch_file", url_ptr)?;
            let id = caller.data_mut().fetches.enqueue(url.clone());
            log::debug!("fetch request {} queued for '{}'", id, url);
            Ok(id)
        },
    )?;
    Ok(())
}
