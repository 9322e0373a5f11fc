//! Dense integer handles for host-owned GL resources.
//!
//! Guests never hold host objects. Each create/lookup call appends the
//! host object to a per-kind table and hands the guest its index. Tables
//! are append-only; handles are never reused.

use std::fmt;

use kiln_hostapi::{
    GlAttribLocation, GlBuffer, GlProgram, GlShader, GlTexture, GlUniformLocation, GlVertexArray,
};

/// Sentinel returned to the guest when a lookup or creation fails.
/// Never a valid handle.
pub const INVALID_HANDLE: i32 = -1;

/// Kind of resource a handle table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Shader,
    Program,
    Texture,
    Buffer,
    VertexArray,
    AttribLocation,
    UniformLocation,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Shader => "shader",
            ResourceKind::Program => "program",
            ResourceKind::Texture => "texture",
            ResourceKind::Buffer => "buffer",
            ResourceKind::VertexArray => "vertex array",
            ResourceKind::AttribLocation => "attribute location",
            ResourceKind::UniformLocation => "uniform location",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    #[error("{kind} handle {handle} out of range (table holds {len})")]
    OutOfRange {
        kind: ResourceKind,
        handle: i32,
        len: usize,
    },

    #[error("{kind} handle table exhausted")]
    Exhausted { kind: ResourceKind },
}

/// Append-only table mapping dense handles to host objects.
#[derive(Debug, Clone)]
pub struct HandleTable<T> {
    kind: ResourceKind,
    entries: Vec<T>,
}

impl<T> HandleTable<T> {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Store `obj` and return its handle, equal to the previous length.
    pub fn allocate(&mut self, obj: T) -> Result<i32, HandleError> {
        let handle = i32::try_from(self.entries.len())
            .map_err(|_| HandleError::Exhausted { kind: self.kind })?;
        self.entries.push(obj);
        Ok(handle)
    }

    /// Look up a handle. Defined for every handle in `[0, len)`.
    pub fn resolve(&self, handle: i32) -> Result<&T, HandleError> {
        usize::try_from(handle)
            .ok()
            .and_then(|idx| self.entries.get(idx))
            .ok_or(HandleError::OutOfRange {
                kind: self.kind,
                handle,
                len: self.entries.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A uniform location together with the program handle it was looked up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub program: i32,
    pub location: GlUniformLocation,
}

/// One handle table per GL resource kind.
#[derive(Debug, Clone)]
pub struct GlResources {
    pub shaders: HandleTable<GlShader>,
    pub programs: HandleTable<GlProgram>,
    pub textures: HandleTable<GlTexture>,
    pub buffers: HandleTable<GlBuffer>,
    pub vertex_arrays: HandleTable<GlVertexArray>,
    pub attribs: HandleTable<GlAttribLocation>,
    pub uniforms: HandleTable<UniformSlot>,
}

impl Default for GlResources {
    fn default() -> Self {
        Self {
            shaders: HandleTable::new(ResourceKind::Shader),
            programs: HandleTable::new(ResourceKind::Program),
            textures: HandleTable::new(ResourceKind::Texture),
            buffers: HandleTable::new(ResourceKind::Buffer),
            vertex_arrays: HandleTable::new(ResourceKind::VertexArray),
            attribs: HandleTable::new(ResourceKind::AttribLocation),
            uniforms: HandleTable::new(ResourceKind::UniformLocation),
        }
    }
}
