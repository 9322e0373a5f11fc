//! Host state held in the Wasmtime `Store`.
//!
//! `BridgeContext` is the `T` of `Store<BridgeContext>`: every host import
//! reaches the bound memory, handle tables, backends and pending fetches
//! through its `Caller`. It lives as long as the `Bridge`.

use std::collections::VecDeque;
use std::sync::Arc;

use wasmtime::{StoreLimits, StoreLimitsBuilder};

use kiln_hostapi::{GlBackend, ResourceSource, Surface2d};

use crate::config::BridgeConfig;
use crate::error::HostCallError;
use crate::fetch::FetchQueue;
use crate::handles::GlResources;
use crate::layout::MemoryLayout;
use crate::linker::ConsoleLine;
use crate::marshal::GuestAllocator;
use crate::memory::{LinearMemory, WASM_PAGE_SIZE};

pub struct BridgeContext {
    config: BridgeConfig,
    /// Memory the guest addresses; set when the primary module loads.
    memory: Option<LinearMemory>,
    allocator: Option<GuestAllocator>,
    layout: Option<MemoryLayout>,
    pub(crate) resources: GlResources,
    pub(crate) surface: Option<Box<dyn Surface2d>>,
    pub(crate) gl: Option<Box<dyn GlBackend>>,
    pub(crate) fetches: FetchQueue,
    source: Arc<dyn ResourceSource>,
    pub(crate) limits: StoreLimits,
    console: VecDeque<ConsoleLine>,
}

impl BridgeContext {
    pub fn new(config: BridgeConfig, source: Arc<dyn ResourceSource>) -> Self {
        let limits = StoreLimitsBuilder::new()
            .memory_size((config.max_memory_pages as u64 * WASM_PAGE_SIZE) as usize)
            .build();
        Self {
            config,
            memory: None,
            allocator: None,
            layout: None,
            resources: GlResources::default(),
            surface: None,
            gl: None,
            fetches: FetchQueue::new(),
            source,
            limits,
            console: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn memory(&self) -> Option<LinearMemory> {
        self.memory
    }

    pub fn allocator(&self) -> Option<GuestAllocator> {
        self.allocator.clone()
    }

    pub fn layout(&self) -> Option<MemoryLayout> {
        self.layout
    }

    pub fn resources(&self) -> &GlResources {
        &self.resources
    }

    pub fn source(&self) -> &Arc<dyn ResourceSource> {
        &self.source
    }

    /// Fetch requests issued by the guest and not yet delivered.
    pub fn pending_fetches(&self) -> usize {
        self.fetches.len()
    }

    /// Most recent guest console lines, oldest first.
    pub fn console_history(&self) -> impl Iterator<Item = &ConsoleLine> {
        self.console.iter()
    }

    pub(crate) fn bind_memory(&mut self, memory: LinearMemory) {
        self.memory = Some(memory);
    }

    pub(crate) fn bind_allocator(&mut self, allocator: GuestAllocator) {
        self.allocator = Some(allocator);
    }

    pub(crate) fn set_layout(&mut self, layout: MemoryLayout) {
        self.layout = Some(layout);
    }

    pub(crate) fn clear_layout(&mut self) {
        self.layout = None;
    }

    pub(crate) fn bound_memory(&self) -> Result<LinearMemory, HostCallError> {
        self.memory.ok_or(HostCallError::MemoryUnbound)
    }

    pub(crate) fn surface_mut(&mut self) -> Result<&mut Box<dyn Surface2d>, HostCallError> {
        self.surface
            .as_mut()
            .ok_or(HostCallError::MissingBackend("2d surface"))
    }

    pub(crate) fn gl_mut(&mut self) -> Result<&mut Box<dyn GlBackend>, HostCallError> {
        self.gl.as_mut().ok_or(HostCallError::MissingBackend("gl"))
    }

    pub(crate) fn record_console(&mut self, line: ConsoleLine) {
        let limit = self.config.console_history;
        if limit == 0 {
            return;
        }
        if self.console.len() == limit {
            self.console.pop_front();
        }
        self.console.push_back(line);
    }
}
