//! libm-style math imports.
//!
//! Guests built without a math library import these by their C names.
//! Both the `f32` and `f64` variant of each function is provided.

use wasmtime::Linker;

use crate::context::BridgeContext;
use crate::error::BridgeError;
use crate::linker::IMPORT_MODULE;

/// Every intrinsic name registered by [`register_intrinsics`].
pub const INTRINSIC_NAMES: &[&str] = &[
    "fminf", "fmin", "fmaxf", "fmax", "fmodf", "fmod", "roundf", "round", "sinf", "sin", "asinf",
    "asin", "cosf", "cos", "acosf", "acos", "tanf", "tan", "atanf", "atan", "atan2f", "atan2",
    "powf", "pow", "cbrtf", "cbrt", "scalbnf", "scalbn", "copysignf", "copysign",
];

/// `x * 2^n` without intermediate overflow for large `|n|`.
pub fn scalbn(mut x: f64, n: i32) -> f64 {
    let mut n = n.clamp(-2200, 2200);
    while n > 1000 {
        x *= 2f64.powi(1000);
        n -= 1000;
    }
    while n < -1000 {
        x *= 2f64.powi(-1000);
        n += 1000;
    }
    x * 2f64.powi(n)
}

pub fn scalbnf(x: f32, n: i32) -> f32 {
    scalbn(f64::from(x), n.clamp(-400, 400)) as f32
}

pub fn register_intrinsics(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    let env = IMPORT_MODULE;

    linker.func_wrap(env, "fminf", |a: f32, b: f32| a.min(b))?;
    linker.func_wrap(env, "fmin", |a: f64, b: f64| a.min(b))?;
    linker.func_wrap(env, "fmaxf", |a: f32, b: f32| a.max(b))?;
    linker.func_wrap(env, "fmax", |a: f64, b: f64| a.max(b))?;
    linker.func_wrap(env, "fmodf", |n: f32, d: f32| n % d)?;
    linker.func_wrap(env, "fmod", |n: f64, d: f64| n % d)?;
    linker.func_wrap(env, "roundf", f32::round)?;
    linker.func_wrap(env, "round", f64::round)?;

    linker.func_wrap(env, "sinf", f32::sin)?;
    linker.func_wrap(env, "sin", f64::sin)?;
    linker.func_wrap(env, "asinf", f32::asin)?;
    linker.func_wrap(env, "asin", f64::asin)?;
    linker.func_wrap(env, "cosf", f32::cos)?;
    linker.func_wrap(env, "cos", f64::cos)?;
    linker.func_wrap(env, "acosf", f32::acos)?;
    linker.func_wrap(env, "acos", f64::acos)?;
    linker.func_wrap(env, "tanf", f32::tan)?;
    linker.func_wrap(env, "tan", f64::tan)?;
    linker.func_wrap(env, "atanf", f32::atan)?;
    linker.func_wrap(env, "atan", f64::atan)?;
    linker.func_wrap(env, "atan2f", |y: f32, x: f32| y.atan2(x))?;
    linker.func_wrap(env, "atan2", |y: f64, x: f64| y.atan2(x))?;

    linker.func_wrap(env, "powf", |v: f32, p: f32| v.powf(p))?;
    linker.func_wrap(env, "pow", |v: f64, p: f64| v.powf(p))?;
    linker.func_wrap(env, "cbrtf", f32::cbrt)?;
    linker.func_wrap(env, "cbrt", f64::cbrt)?;
    linker.func_wrap(env, "scalbnf", scalbnf)?;
    linker.func_wrap(env, "scalbn", scalbn)?;
    linker.func_wrap(env, "copysignf", |m: f32, s: f32| m.copysign(s))?;
    linker.func_wrap(env, "copysign", |m: f64, s: f64| m.copysign(s))?;
    Ok(())
}
