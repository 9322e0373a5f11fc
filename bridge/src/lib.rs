//! `kiln-bridge` — Wasmtime host bridge for canvas/GL guest modules.
//!
//! Loads one or more WebAssembly modules into a shared store, composes
//! their imports from host services and each other's exports, and drives
//! the primary module with input events and animation frames:
//!
//! - **Composition:** layered import providers, optional modules with stubs
//! - **Host services:** console, time, heap queries, math intrinsics
//! - **Drawing:** 2D canvas and GL-style imports over `kiln-hostapi` backends
//! - **Handles:** guest-visible integers for host GL objects, never reused
//! - **Fetches:** asynchronous file loads delivered at frame boundaries
//! - **Memory layout:** heap placed above the guest stack, memory grown to fit
//!
//! The entry points are [`Bridge`] for loading and [`Driver`] for running.

pub mod error;
pub mod config;
pub mod memory;
pub mod handles;
pub mod layout;
pub mod marshal;
pub mod context;
pub mod linker;
pub mod intrinsics;
pub mod canvas;
pub mod gl;
pub mod fetch;
pub mod compose;
pub mod validation;
pub mod runtime;
pub mod driver;

pub use error::{BridgeError, HostCallError};
pub use config::{BridgeConfig, GuestAbi};
pub use compose::{GuestModule, ImportOverride, ModuleRole, ModuleSpec, ScalarType, Signature};
pub use context::BridgeContext;
pub use driver::{Driver, EventSource, HostEvent, RunStats, ScriptedEvents};
pub use handles::INVALID_HANDLE;
pub use layout::MemoryLayout;
pub use linker::{ConsoleLevel, ConsoleLine};
pub use runtime::Bridge;
