//! Guest module validation: ABI checks before instantiation.
//!
//! Every module is checked for imports the bridge can never satisfy:
//!
//! 1. No WASI imports
//! 2. Only function and memory imports
//!
//! The primary module must also export the guest ABI with the right
//! signatures. Optional ABI exports are checked only when present.

use wasmtime::{ExternType, Module};

use crate::compose::{ScalarType, Signature};
use crate::config::GuestAbi;
use crate::error::BridgeError;

use ScalarType::{F64, I32};

/// Validate imports of any module before it is composed.
pub fn validate_imports(module: &Module) -> Result<(), BridgeError> {
    for import in module.imports() {
        let module_name = import.module();

        // Reject WASI imports
        if module_name.starts_with("wasi") {
            return Err(BridgeError::ValidationError(format!(
                "WASI import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if !matches!(import.ty(), ExternType::Func(_) | ExternType::Memory(_)) {
            return Err(BridgeError::ValidationError(format!(
                "only function and memory imports are supported: {}::{}",
                module_name,
                import.name()
            )));
        }
    }
    Ok(())
}

/// Check that the primary module exports the guest ABI.
pub fn validate_primary(module: &Module, abi: &GuestAbi) -> Result<(), BridgeError> {
    let required = [
        (abi.stack_base.as_str(), Signature::new(&[], &[I32])),
        (abi.initialize.as_str(), Signature::new(&[I32], &[])),
        (abi.render_frame.as_str(), Signature::new(&[F64, F64], &[])),
        (abi.pointer_moved.as_str(), Signature::new(&[F64, F64], &[])),
        (
            abi.pointer_button.as_str(),
            Signature::new(&[I32, I32, F64, F64], &[]),
        ),
        (abi.alloc.as_str(), Signature::new(&[I32, I32], &[I32])),
        (abi.free.as_str(), Signature::new(&[I32, I32, I32], &[])),
    ];
    let optional = [
        (abi.key_changed.as_str(), Signature::new(&[I32, I32], &[])),
        (
            abi.file_loaded.as_str(),
            Signature::new(&[I32, I32, I32, I32], &[]),
        ),
        (abi.file_failed.as_str(), Signature::new(&[I32, I32, I32], &[])),
    ];

    for (name, expected) in &required {
        match export_type(module, name) {
            Some(ty) => check_function(name, &ty, expected)?,
            None => {
                return Err(BridgeError::ValidationError(format!(
                    "missing required export: {}",
                    name
                )))
            }
        }
    }
    for (name, expected) in &optional {
        if let Some(ty) = export_type(module, name) {
            check_function(name, &ty, expected)?;
        }
    }

    if let Some(ty) = export_type(module, &abi.memory) {
        if !matches!(ty, ExternType::Memory(_)) {
            return Err(BridgeError::ValidationError(format!(
                "export '{}' must be a memory",
                abi.memory
            )));
        }
    }
    Ok(())
}

fn export_type(module: &Module, name: &str) -> Option<ExternType> {
    module.get_export(name)
}

fn check_function(name: &str, ty: &ExternType, expected: &Signature) -> Result<(), BridgeError> {
    let func_ty = match ty {
        ExternType::Func(ft) => ft,
        _ => {
            return Err(BridgeError::ValidationError(format!(
                "export '{}' must be a function",
                name
            )))
        }
    };
    if !expected.matches(func_ty) {
        return Err(BridgeError::ValidationError(format!(
            "export '{}' has wrong signature: expected {}",
            name, expected
        )));
    }
    Ok(())
}
