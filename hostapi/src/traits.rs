//! Host capability traits.
//!
//! The bridge never talks to a real canvas, GPU or file server directly.
//! It holds one implementation of each trait below and routes guest calls
//! through them after marshalling arguments and resolving handles.

use crate::error::{BackendError, FetchError};
use crate::types::{
    GlAttribLocation, GlCommand, GlObjectKind, GlProgram, GlUniformLocation, Point, Rect, Rgba,
};

/// Immediate-mode 2D drawing surface.
///
/// All coordinates are device pixels.
pub trait Surface2d {
    /// Current drawable size in device pixels.
    fn size(&self) -> (u32, u32);

    /// Clear the whole surface.
    fn clear(&mut self) -> Result<(), BackendError>;

    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> Result<(), BackendError>;

    /// Fill a rectangle with rounded corners.
    ///
    /// Callers guarantee `radius <= min(width, height) / 2`.
    fn fill_rounded_rect(&mut self, rect: Rect, radius: f64, color: Rgba)
        -> Result<(), BackendError>;

    fn stroke_line(
        &mut self,
        from: Point,
        to: Point,
        thickness: f64,
        color: Rgba,
    ) -> Result<(), BackendError>;
}

/// Retained GL-style pipeline.
///
/// Object creation and location queries return backend names; everything
/// else is a [`GlCommand`]. Backends do not need to validate call order:
/// misuse is reported as a `BackendError` and surfaced through
/// [`take_error`](GlBackend::take_error).
pub trait GlBackend {
    /// Create a new object of the given kind.
    fn create(&mut self, kind: GlObjectKind) -> Result<u32, BackendError>;

    /// Look up a vertex attribute in a linked program. `None` when the
    /// program has no active attribute of that name.
    fn attrib_location(&mut self, program: GlProgram, name: &str) -> Option<GlAttribLocation>;

    /// Look up a uniform in a linked program. `None` when unknown.
    fn uniform_location(&mut self, program: GlProgram, name: &str) -> Option<GlUniformLocation>;

    /// Execute one pipeline command.
    fn execute(&mut self, command: GlCommand) -> Result<(), BackendError>;

    /// Return and clear the oldest recorded error code, `0` if none.
    fn take_error(&mut self) -> u32;
}

/// Source of module bytes and fetched files.
///
/// Paths are relative to whatever root the implementation serves from.
pub trait ResourceSource: Send + Sync {
    /// Fetch the complete contents at `path`.
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;

    /// Check whether `path` exists.
    ///
    /// Default implementation uses `fetch()`, but sources may optimize this.
    fn contains(&self, path: &str) -> bool {
        self.fetch(path).is_ok()
    }
}
