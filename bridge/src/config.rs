//! Bridge configuration.

/// Names of the exports the bridge calls on the primary guest module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestAbi {
    /// `() -> i32`: address of the guest's stack base.
    pub stack_base: String,
    /// `(i32)`: receives the computed heap base.
    pub initialize: String,
    /// `(f64, f64)`: per-frame update/render with drawable size.
    pub render_frame: String,
    /// `(f64, f64)`: pointer position.
    pub pointer_moved: String,
    /// `(i32, i32, f64, f64)`: button, pressed, position.
    pub pointer_button: String,
    /// Optional `(i32, i32)`: key code, pressed.
    pub key_changed: String,
    /// `(i32, i32) -> i32`: arena, size.
    pub alloc: String,
    /// `(i32, i32, i32)`: arena, pointer, size.
    pub free: String,
    /// Optional `(i32, i32, i32, i32)`: request id, url, data, length.
    pub file_loaded: String,
    /// Optional `(i32, i32, i32)`: request id, url, error code.
    pub file_failed: String,
    /// Optional exported memory; the shared `env.memory` is used otherwise.
    pub memory: String,
}

impl Default for GuestAbi {
    fn default() -> Self {
        Self {
            stack_base: "get_stack_base".into(),
            initialize: "initialize".into(),
            render_frame: "render_frame".into(),
            pointer_moved: "pointer_moved".into(),
            pointer_button: "pointer_button".into(),
            key_changed: "key_changed".into(),
            alloc: "alloc".into(),
            free: "free".into(),
            file_loaded: "file_loaded".into(),
            file_failed: "file_failed".into(),
            memory: "memory".into(),
        }
    }
}

/// Configuration for the bridge.
///
/// Controls linear memory bounds, the guest heap layout, display scaling
/// and optional instruction fuel.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Initial pages of the shared `env.memory` (1 page = 64 KiB).
    pub initial_memory_pages: u32,

    /// Maximum linear memory pages.
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Bytes at address 0 the guest must never write.
    pub protected_region_size: u32,

    /// Fill the protected region with `0x55` and scan it after every frame.
    pub check_protected_region: bool,

    /// Gap between the reported stack base and the heap, before page
    /// alignment.
    pub stack_safety_margin: u32,

    /// Device pixels per device-independent unit.
    pub pixel_ratio: f64,

    /// Position of the drawing surface inside the window, subtracted from
    /// pointer coordinates.
    pub container_offset: (f64, f64),

    /// Recent guest console lines kept on the context for inspection.
    /// `0` keeps none; output is always sent to the `log` facade.
    pub console_history: usize,

    /// Wasmtime fuel granted to every host-to-guest call. `None` disables
    /// metering.
    pub fuel_per_call: Option<u64>,

    /// Export names of the primary module.
    pub abi: GuestAbi,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            initial_memory_pages: 7,
            max_memory_pages: 256,       // 16 MiB
            protected_region_size: 1024,
            check_protected_region: false,
            stack_safety_margin: 1024,
            pixel_ratio: 1.0,
            container_offset: (0.0, 0.0),
            console_history: 0,
            fuel_per_call: None,
            abi: GuestAbi::default(),
        }
    }
}
