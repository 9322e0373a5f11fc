//! String and buffer marshalling across linear memory.
//!
//! Strings cross the boundary as NUL-terminated single-byte runs; each byte
//! maps to the code point of the same value (Latin-1). Host-to-guest
//! transfers allocate through the primary module's exported allocator, so
//! the guest owns and frees every buffer the host writes.

use wasmtime::{AsContext, AsContextMut, TypedFunc};

use crate::context::BridgeContext;
use crate::memory::{self, GuestAddress, MemoryError};

/// Arena index selecting the guest's default heap.
pub const DEFAULT_ARENA: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarshalError {
    #[error("null string pointer")]
    NullPointer,

    #[error("string at {addr:#x} is not terminated before the end of memory")]
    MalformedString { addr: GuestAddress },

    #[error("character {ch:?} has no single-byte encoding")]
    Unencodable { ch: char },

    #[error("guest allocator returned null for {size} bytes")]
    AllocationFailed { size: usize },

    #[error("guest allocator not bound; load the primary module first")]
    NoAllocator,

    #[error("guest memory not bound")]
    MemoryUnbound,

    #[error("guest allocator trapped: {0}")]
    AllocatorTrapped(String),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// The primary module's `alloc(arena, size) -> ptr` and
/// `free(arena, ptr, size)` exports.
#[derive(Clone)]
pub struct GuestAllocator {
    pub alloc: TypedFunc<(i32, i32), i32>,
    pub free: TypedFunc<(i32, i32, i32), ()>,
}

/// Encode `text` one byte per character.
pub fn encode_latin1(text: &str) -> Result<Vec<u8>, MarshalError> {
    text.chars()
        .map(|ch| u8::try_from(ch).map_err(|_| MarshalError::Unencodable { ch }))
        .collect()
}

pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Read the NUL-terminated string at `addr`.
pub fn read_c_string(
    store: impl AsContext<Data = BridgeContext>,
    addr: GuestAddress,
) -> Result<String, MarshalError> {
    if addr == 0 {
        return Err(MarshalError::NullPointer);
    }
    let store = store.as_context();
    let memory = store.data().memory().ok_or(MarshalError::MemoryUnbound)?;
    let data = memory.raw().data(&store);
    let end = memory::find_nul(data, addr)?.ok_or(MarshalError::MalformedString { addr })?;
    Ok(decode_latin1(&data[addr as usize..end]))
}

/// Copy `text` plus a NUL into a fresh guest allocation from `arena`.
pub fn write_string(
    store: impl AsContextMut<Data = BridgeContext>,
    text: &str,
    arena: i32,
) -> Result<GuestAddress, MarshalError> {
    let mut bytes = encode_latin1(text)?;
    bytes.push(0);
    write_buffer(store, &bytes, arena)
}

/// Copy `bytes` into a fresh guest allocation from `arena`.
///
/// Nothing is written if the guest allocator returns null.
pub fn write_buffer(
    mut store: impl AsContextMut<Data = BridgeContext>,
    bytes: &[u8],
    arena: i32,
) -> Result<GuestAddress, MarshalError> {
    let (allocator, memory) = {
        let ctx = store.as_context();
        let allocator = ctx.data().allocator().ok_or(MarshalError::NoAllocator)?;
        let memory = ctx.data().memory().ok_or(MarshalError::MemoryUnbound)?;
        (allocator, memory)
    };
    let size = i32::try_from(bytes.len().max(1))
        .map_err(|_| MarshalError::AllocationFailed { size: bytes.len() })?;
    let ptr = allocator
        .alloc
        .call(&mut store, (arena, size))
        .map_err(|e| MarshalError::AllocatorTrapped(format!("{:#}", e)))?;
    if ptr == 0 {
        return Err(MarshalError::AllocationFailed { size: bytes.len() });
    }
    let addr = ptr as GuestAddress;
    memory.write(&mut store, addr, bytes)?;
    Ok(addr)
}

/// Return `len` bytes at `addr` to the guest allocator.
pub fn free(
    mut store: impl AsContextMut<Data = BridgeContext>,
    addr: GuestAddress,
    len: usize,
    arena: i32,
) -> Result<(), MarshalError> {
    let allocator = store
        .as_context()
        .data()
        .allocator()
        .ok_or(MarshalError::NoAllocator)?;
    let size = i32::try_from(len.max(1)).map_err(|_| MarshalError::AllocationFailed { size: len })?;
    allocator
        .free
        .call(&mut store, (arena, addr as i32, size))
        .map_err(|e| MarshalError::AllocatorTrapped(format!("{:#}", e)))
}
