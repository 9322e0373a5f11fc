//! `kiln-hostapi` — host capability interfaces for the Kiln bridge.
//!
//! This crate defines what the bridge needs from its embedding host,
//! independent of Wasmtime:
//!
//! - `Surface2d` — immediate 2D drawing in device pixels
//! - `GlBackend` — retained GL-style pipeline driven by `GlCommand`s
//! - `ResourceSource` — module bytes and fetched files by path
//! - `DirSource` / `MemSource` — filesystem and in-memory sources
//! - `RecordingSurface` / `RecordingGl` — headless backends that record calls
//! - `FetchError` / `BackendError` — host-side error types

pub mod error;
pub mod types;
pub mod traits;
pub mod dir_source;
pub mod mem_source;
pub mod recording;

// Re-export commonly used types at the crate root.
pub use error::{BackendError, FetchError, FETCH_ALLOCATION_FAILED};
pub use types::{
    gl, AttribPointer, GlAttribLocation, GlBuffer, GlCommand, GlObjectKind, GlProgram, GlShader,
    GlTexture, GlUniformLocation, GlVertexArray, Point, Rect, Rgba, TexImage, UniformValue,
};
pub use traits::{GlBackend, ResourceSource, Surface2d};
pub use dir_source::DirSource;
pub use mem_source::MemSource;
pub use recording::{CommandLog, DrawCommand, RecordingGl, RecordingSurface};
