//! Module composition.
//!
//! Each guest module is instantiated against an import environment built
//! from ordered providers. Later providers shadow earlier ones:
//!
//! 1. host math intrinsics
//! 2. host services (console, time, heap, fetch, shared memory, canvas, GL)
//! 3. exports of previously loaded modules, in load order
//! 4. per-module overrides from the `ModuleSpec`
//!
//! Every import must resolve before instantiation. An optional module that
//! fails to load is replaced by a stub whose declared exports return zero.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use wasmtime::{
    Engine, Extern, Func, FuncType, Instance, Linker, Memory, Module, Store, Val, ValType,
};

use crate::canvas::register_canvas_functions;
use crate::context::BridgeContext;
use crate::error::BridgeError;
use crate::gl::register_gl_functions;
use crate::intrinsics::register_intrinsics;
use crate::linker::{register_host_services, IMPORT_MODULE};

/// Numeric value types that may cross the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    I32,
    I64,
    F32,
    F64,
}

impl ScalarType {
    pub fn val_type(self) -> ValType {
        match self {
            ScalarType::I32 => ValType::I32,
            ScalarType::I64 => ValType::I64,
            ScalarType::F32 => ValType::F32,
            ScalarType::F64 => ValType::F64,
        }
    }

    pub fn zero(self) -> Val {
        match self {
            ScalarType::I32 => Val::I32(0),
            ScalarType::I64 => Val::I64(0),
            ScalarType::F32 => Val::F32(0),
            ScalarType::F64 => Val::F64(0),
        }
    }

    pub fn matches(self, ty: &ValType) -> bool {
        matches!(
            (self, ty),
            (ScalarType::I32, ValType::I32)
                | (ScalarType::I64, ValType::I64)
                | (ScalarType::F32, ValType::F32)
                | (ScalarType::F64, ValType::F64)
        )
    }
}

/// A function signature over scalar types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<ScalarType>,
    pub results: Vec<ScalarType>,
}

impl Signature {
    pub fn new(params: &[ScalarType], results: &[ScalarType]) -> Self {
        Self {
            params: params.to_vec(),
            results: results.to_vec(),
        }
    }

    pub fn func_type(&self, engine: &Engine) -> FuncType {
        FuncType::new(
            engine,
            self.params.iter().map(|t| t.val_type()),
            self.results.iter().map(|t| t.val_type()),
        )
    }

    pub fn matches(&self, ty: &FuncType) -> bool {
        let params: Vec<ValType> = ty.params().collect();
        let results: Vec<ValType> = ty.results().collect();
        params.len() == self.params.len()
            && results.len() == self.results.len()
            && self.params.iter().zip(&params).all(|(s, t)| s.matches(t))
            && self.results.iter().zip(&results).all(|(s, t)| s.matches(t))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> {:?}", self.params, self.results)
    }
}

/// How a module failure is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleRole {
    /// The application module: its ABI exports drive the bridge. At most one.
    Primary,
    /// Load failure aborts.
    Required,
    /// Load failure substitutes a stub.
    Optional,
}

/// An export a stub module provides when its optional module is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubExport {
    pub name: String,
    pub signature: Signature,
}

type OverrideBody = dyn Fn(&[Val], &mut [Val]) -> anyhow::Result<()> + Send + Sync;

/// A host function that shadows every other provider for one module.
#[derive(Clone)]
pub struct ImportOverride {
    pub name: String,
    pub signature: Signature,
    body: Arc<OverrideBody>,
}

impl ImportOverride {
    pub fn new(
        name: impl Into<String>,
        signature: Signature,
        body: impl Fn(&[Val], &mut [Val]) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            signature,
            body: Arc::new(body),
        }
    }

    fn to_func(&self, store: &mut Store<BridgeContext>) -> Func {
        let ty = self.signature.func_type(store.engine());
        let body = Arc::clone(&self.body);
        Func::new(store, ty, move |_caller, params, results| body(params, results))
    }
}

impl fmt::Debug for ImportOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportOverride")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// What to load and how.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub name: String,
    /// Path relative to the resource source root.
    pub path: String,
    pub role: ModuleRole,
    pub stub_exports: Vec<StubExport>,
    pub overrides: Vec<ImportOverride>,
}

impl ModuleSpec {
    pub fn new(name: impl Into<String>, path: impl Into<String>, role: ModuleRole) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            role,
            stub_exports: Vec::new(),
            overrides: Vec::new(),
        }
    }

    pub fn primary(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, path, ModuleRole::Primary)
    }

    pub fn required(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, path, ModuleRole::Required)
    }

    pub fn optional(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, path, ModuleRole::Optional)
    }

    /// Declare an export the stub provides if this module fails to load.
    pub fn with_stub_export(mut self, name: impl Into<String>, signature: Signature) -> Self {
        self.stub_exports.push(StubExport {
            name: name.into(),
            signature,
        });
        self
    }

    pub fn with_override(mut self, import: ImportOverride) -> Self {
        self.overrides.push(import);
        self
    }
}

#[derive(Debug, Clone)]
pub enum ModuleKind {
    Instantiated(Instance),
    Stubbed,
}

/// A loaded module and its exports.
#[derive(Debug, Clone)]
pub struct GuestModule {
    name: String,
    role: ModuleRole,
    kind: ModuleKind,
    exports: BTreeMap<String, Extern>,
}

impl GuestModule {
    pub(crate) fn instantiated(
        spec: &ModuleSpec,
        instance: Instance,
        store: &mut Store<BridgeContext>,
    ) -> Self {
        let exports = instance
            .exports(&mut *store)
            .map(|e| (e.name().to_string(), e.into_extern()))
            .collect();
        Self {
            name: spec.name.clone(),
            role: spec.role,
            kind: ModuleKind::Instantiated(instance),
            exports,
        }
    }

    /// Stand-in for a missing optional module.
    pub(crate) fn stub(spec: &ModuleSpec, store: &mut Store<BridgeContext>) -> Self {
        let mut exports = BTreeMap::new();
        for export in &spec.stub_exports {
            let ty = export.signature.func_type(store.engine());
            let results = export.signature.results.clone();
            let func = Func::new(&mut *store, ty, move |_caller, _params, out| {
                for (slot, ty) in out.iter_mut().zip(&results) {
                    *slot = ty.zero();
                }
                Ok(())
            });
            exports.insert(export.name.clone(), Extern::Func(func));
        }
        Self {
            name: spec.name.clone(),
            role: spec.role,
            kind: ModuleKind::Stubbed,
            exports,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ModuleRole {
        self.role
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    pub fn is_stub(&self) -> bool {
        matches!(self.kind, ModuleKind::Stubbed)
    }

    pub fn export(&self, name: &str) -> Option<&Extern> {
        self.exports.get(name)
    }

    pub fn func(&self, name: &str) -> Option<Func> {
        self.exports.get(name).and_then(|e| e.clone().into_func())
    }

    pub fn memory(&self, name: &str) -> Option<Memory> {
        self.exports.get(name).and_then(|e| e.clone().into_memory())
    }

    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }
}

/// The layered import environment shared by all loads.
pub(crate) struct Environment {
    linker: Linker<BridgeContext>,
}

impl Environment {
    /// Register host providers in ascending precedence.
    pub fn new(
        engine: &Engine,
        store: &Store<BridgeContext>,
        memory: Memory,
    ) -> Result<Self, BridgeError> {
        let mut linker = Linker::new(engine);
        linker.allow_shadowing(true);
        register_intrinsics(&mut linker)?;
        register_host_services(&mut linker)?;
        linker.define(store, IMPORT_MODULE, "memory", memory)?;
        register_canvas_functions(&mut linker)?;
        register_gl_functions(&mut linker)?;
        Ok(Self { linker })
    }

    /// Make `module`'s exports visible to every later load.
    pub fn add_exports(
        &mut self,
        store: &Store<BridgeContext>,
        module: &GuestModule,
    ) -> Result<(), BridgeError> {
        for (name, export) in &module.exports {
            self.linker.define(store, IMPORT_MODULE, name, export.clone())?;
        }
        Ok(())
    }

    /// The environment for one module, with its overrides on top.
    pub fn linker_for(
        &self,
        store: &mut Store<BridgeContext>,
        spec: &ModuleSpec,
    ) -> Result<Linker<BridgeContext>, BridgeError> {
        let mut linker = self.linker.clone();
        for import in &spec.overrides {
            let func = import.to_func(store);
            linker.define(&*store, IMPORT_MODULE, &import.name, func)?;
        }
        Ok(linker)
    }
}

/// Fail if any import of `module` has no provider in `linker`.
pub(crate) fn check_imports(
    linker: &Linker<BridgeContext>,
    store: &mut Store<BridgeContext>,
    module: &Module,
    module_name: &str,
) -> Result<(), BridgeError> {
    for import in module.imports() {
        if linker.get_by_import(&mut *store, &import).is_none() {
            return Err(BridgeError::UnresolvedImport {
                module: module_name.to_string(),
                import_module: import.module().to_string(),
                name: import.name().to_string(),
            });
        }
    }
    Ok(())
}
