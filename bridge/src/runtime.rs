//! Bridge runtime: Wasmtime engine, module loading, and guest calls.
//!
//! The `Bridge` owns one `Store<BridgeContext>` shared by every guest
//! module, so modules can call each other's exports and share `env.memory`.
//! Typical lifecycle:
//!
//! 1. `Bridge::new` with a `ResourceSource`, then attach drawing backends
//! 2. `load` each module in dependency order, the primary one included
//! 3. `compute_layout` once
//! 4. hand the bridge to a `Driver` for events and frames

use std::sync::Arc;

use wasmtime::{
    Config, Engine, Func, Memory, MemoryType, Module, Store, Trap, WasmParams, WasmResults,
};

use kiln_hostapi::{GlBackend, ResourceSource, Surface2d};

use crate::compose::{check_imports, Environment, GuestModule, ModuleRole, ModuleSpec};
use crate::config::BridgeConfig;
use crate::context::BridgeContext;
use crate::error::{BridgeError, HostCallError};
use crate::layout::MemoryLayout;
use crate::marshal::GuestAllocator;
use crate::memory::{GuestAddress, LinearMemory, PROTECTED_FILL};
use crate::validation::{validate_imports, validate_primary};

/// Host side of a set of composed guest modules.
pub struct Bridge {
    engine: Engine,
    store: Store<BridgeContext>,
    env: Environment,
    modules: Vec<GuestModule>,
    primary: Option<usize>,
    shared_memory: LinearMemory,
}

impl Bridge {
    /// Create a bridge whose modules are fetched from `source`.
    ///
    /// The shared `env.memory` is created here with
    /// `initial_memory_pages`, bounded by `max_memory_pages`.
    pub fn new(config: BridgeConfig, source: Arc<dyn ResourceSource>) -> Result<Self, BridgeError> {
        let engine = create_engine(&config)?;
        let memory_type =
            MemoryType::new(config.initial_memory_pages, Some(config.max_memory_pages));

        let mut store = Store::new(&engine, BridgeContext::new(config, source));
        store.limiter(|ctx| &mut ctx.limits);

        let memory = Memory::new(&mut store, memory_type)?;
        let env = Environment::new(&engine, &store, memory)?;

        Ok(Self {
            engine,
            store,
            env,
            modules: Vec::new(),
            primary: None,
            shared_memory: LinearMemory::new(memory),
        })
    }

    /// Attach the backend for `canvas_*` imports.
    pub fn with_surface(mut self, surface: impl Surface2d + 'static) -> Self {
        self.store.data_mut().surface = Some(Box::new(surface));
        self
    }

    /// Attach the backend for `gl_*` imports.
    pub fn with_gl(mut self, gl: impl GlBackend + 'static) -> Self {
        self.store.data_mut().gl = Some(Box::new(gl));
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        self.store.data().config()
    }

    pub fn context(&self) -> &BridgeContext {
        self.store.data()
    }

    pub fn context_mut(&mut self) -> &mut BridgeContext {
        self.store.data_mut()
    }

    pub fn store(&self) -> &Store<BridgeContext> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<BridgeContext> {
        &mut self.store
    }

    /// The memory guests address: the primary module's once it is bound,
    /// the shared `env.memory` before that.
    pub fn memory(&self) -> LinearMemory {
        self.context().memory().unwrap_or(self.shared_memory)
    }

    pub fn shared_memory(&self) -> LinearMemory {
        self.shared_memory
    }

    pub fn modules(&self) -> &[GuestModule] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&GuestModule> {
        self.modules.iter().find(|m| m.name() == name)
    }

    pub fn primary(&self) -> Option<&GuestModule> {
        self.primary.and_then(|index| self.modules.get(index))
    }

    pub fn layout(&self) -> Option<MemoryLayout> {
        self.context().layout()
    }

    /// Fetch, compile, validate and instantiate a module.
    ///
    /// Its exports become importable by every module loaded after it. An
    /// optional module that fails at any step is replaced by a stub.
    pub fn load(&mut self, spec: &ModuleSpec) -> Result<&GuestModule, BridgeError> {
        if self.module(&spec.name).is_some() {
            return Err(BridgeError::ValidationError(format!(
                "module '{}' already loaded",
                spec.name
            )));
        }
        if spec.role == ModuleRole::Primary && self.primary.is_some() {
            return Err(BridgeError::ValidationError(format!(
                "cannot load '{}': a primary module is already loaded",
                spec.name
            )));
        }

        let module = match self.instantiate(spec) {
            Ok(module) => module,
            Err(e) if spec.role == ModuleRole::Optional => {
                log::warn!(
                    "optional module '{}' unavailable, substituting stub: {}",
                    spec.name,
                    e
                );
                GuestModule::stub(spec, &mut self.store)
            }
            Err(e) => {
                log::error!("failed to load module '{}': {}", spec.name, e);
                return Err(e);
            }
        };

        self.env.add_exports(&self.store, &module)?;
        if spec.role == ModuleRole::Primary {
            self.bind_primary(&module)?;
            self.primary = Some(self.modules.len());
        }
        log::info!(
            "loaded module '{}' from '{}' ({} exports{})",
            spec.name,
            spec.path,
            module.export_names().count(),
            if module.is_stub() { ", stub" } else { "" }
        );

        let index = self.modules.len();
        self.modules.push(module);
        Ok(&self.modules[index])
    }

    fn instantiate(&mut self, spec: &ModuleSpec) -> Result<GuestModule, BridgeError> {
        let source = self.context().source().clone();
        let bytes = source.fetch(&spec.path).map_err(|source| BridgeError::Fetch {
            path: spec.path.clone(),
            source,
        })?;

        let module = Module::new(&self.engine, &bytes)?;
        validate_imports(&module)?;
        if spec.role == ModuleRole::Primary {
            validate_primary(&module, &self.config().abi)?;
        }

        let linker = self.env.linker_for(&mut self.store, spec)?;
        check_imports(&linker, &mut self.store, &module, &spec.name)?;

        self.refuel()?;
        let instance = linker
            .instantiate(&mut self.store, &module)
            .map_err(instantiation_error)?;
        Ok(GuestModule::instantiated(spec, instance, &mut self.store))
    }

    /// Bind the primary module's memory and allocator to the context.
    fn bind_primary(&mut self, module: &GuestModule) -> Result<(), BridgeError> {
        let abi = self.config().abi.clone();
        let memory = module
            .memory(&abi.memory)
            .map(LinearMemory::new)
            .unwrap_or(self.shared_memory);

        let alloc = module
            .func(&abi.alloc)
            .ok_or_else(|| missing_export(module, &abi.alloc))?
            .typed::<(i32, i32), i32>(&self.store)?;
        let free = module
            .func(&abi.free)
            .ok_or_else(|| missing_export(module, &abi.free))?
            .typed::<(i32, i32, i32), ()>(&self.store)?;

        let ctx = self.store.data_mut();
        ctx.bind_memory(memory);
        ctx.bind_allocator(GuestAllocator { alloc, free });

        if self.config().check_protected_region {
            let size = self.config().protected_region_size as usize;
            memory.fill(&mut self.store, 0, size, PROTECTED_FILL)?;
        }
        Ok(())
    }

    /// Query the guest's stack base, place the heap, and initialize the guest.
    ///
    /// Memory is grown first if the heap base lies beyond its end. Succeeds
    /// at most once; if `initialize` fails the layout is discarded and the
    /// guest stays unready.
    pub fn compute_layout(&mut self) -> Result<MemoryLayout, BridgeError> {
        if self.layout().is_some() {
            return Err(BridgeError::LayoutAlreadyComputed);
        }
        let abi = self.config().abi.clone();
        let margin = self.config().stack_safety_margin;

        let stack_base: i32 = self.call_primary(&abi.stack_base, ())?;
        let layout = MemoryLayout::from_stack_base(stack_base, margin)?;

        let memory = self.memory();
        let pages = layout.pages_needed(memory.size(&self.store));
        if pages > 0 {
            let previous = memory.grow(&mut self.store, pages)?;
            log::info!(
                "grew guest memory from {} to {} pages for the heap",
                previous,
                previous + pages
            );
        }

        self.context_mut().set_layout(layout);
        log::info!(
            "guest layout: stack base {:#x}, heap base {:#x}",
            layout.stack_base,
            layout.heap_base
        );
        if let Err(e) = self.call_primary::<i32, ()>(&abi.initialize, layout.heap_base as i32) {
            log::error!("guest initialization failed: {}", e);
            self.context_mut().clear_layout();
            return Err(e);
        }
        Ok(layout)
    }

    /// Call an export of a loaded module by name.
    pub fn call<P, R>(&mut self, module: &str, export: &str, params: P) -> Result<R, BridgeError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let guest = self
            .module(module)
            .ok_or_else(|| BridgeError::UnknownModule(module.to_string()))?;
        let func = guest
            .func(export)
            .ok_or_else(|| missing_export(guest, export))?;
        self.invoke(func, params)
    }

    /// Call an export of the primary module.
    pub fn call_primary<P, R>(&mut self, export: &str, params: P) -> Result<R, BridgeError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let primary = self.primary().ok_or(BridgeError::NoPrimaryModule)?;
        let func = primary
            .func(export)
            .ok_or_else(|| missing_export(primary, export))?;
        self.invoke(func, params)
    }

    pub(crate) fn primary_export(&self, name: &str) -> Option<Func> {
        self.primary().and_then(|m| m.func(name))
    }

    /// Call `func` with fresh fuel, mapping traps to `BridgeError`.
    pub(crate) fn invoke<P, R>(&mut self, func: Func, params: P) -> Result<R, BridgeError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let typed = func.typed::<P, R>(&self.store)?;
        self.refuel()?;
        typed
            .call(&mut self.store, params)
            .map_err(handle_trap)
    }

    /// Reset the fuel budget when metering is enabled.
    pub(crate) fn refuel(&mut self) -> Result<(), BridgeError> {
        if let Some(fuel) = self.config().fuel_per_call {
            self.store.set_fuel(fuel)?;
        }
        Ok(())
    }

    /// Scan the protected region and restore it if the guest wrote there.
    ///
    /// Returns the first corrupted address. Always `None` unless
    /// `check_protected_region` is enabled.
    pub fn check_protected_region(&mut self) -> Option<GuestAddress> {
        if !self.config().check_protected_region {
            return None;
        }
        let size = self.config().protected_region_size as usize;
        let memory = self.memory();
        match memory.first_mismatch(&self.store, 0, size, PROTECTED_FILL) {
            Ok(None) => None,
            Ok(Some(addr)) => {
                log::warn!(
                    "guest wrote to the protected region at {:#x}; restoring",
                    addr
                );
                if let Err(e) = memory.fill(&mut self.store, 0, size, PROTECTED_FILL) {
                    log::warn!("could not restore the protected region: {}", e);
                }
                Some(addr)
            }
            Err(e) => {
                log::warn!("protected region check skipped: {}", e);
                None
            }
        }
    }
}

/// Create a Wasmtime engine for guest modules.
fn create_engine(config: &BridgeConfig) -> Result<Engine, BridgeError> {
    let mut wasm_config = Config::new();

    // Fuel metering only when a per-call budget is set
    wasm_config.consume_fuel(config.fuel_per_call.is_some());

    // All guests run on the host thread that owns the store
    wasm_config.wasm_threads(false);
    wasm_config.wasm_multi_memory(false);

    Ok(Engine::new(&wasm_config)?)
}

fn missing_export(module: &GuestModule, name: &str) -> BridgeError {
    BridgeError::MissingExport {
        module: module.name().to_string(),
        name: name.to_string(),
    }
}

/// Convert a failed guest call into a `BridgeError`, logging it.
fn handle_trap(err: anyhow::Error) -> BridgeError {
    let err = BridgeError::from_trap(err);
    log::error!("guest call failed: {}", err);
    err
}

/// Traps raised by start functions map like call traps; link failures stay
/// Wasmtime errors.
fn instantiation_error(err: anyhow::Error) -> BridgeError {
    if err.downcast_ref::<Trap>().is_some() || err.downcast_ref::<HostCallError>().is_some() {
        handle_trap(err)
    } else {
        BridgeError::Wasmtime(err)
    }
}
