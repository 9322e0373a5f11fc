//! Bounds-checked access to the guest's linear memory.
//!
//! The slice helpers validate an address range against a raw byte slice;
//! `LinearMemory` wraps a `wasmtime::Memory` and applies the same checks
//! through any store context (the `Store` itself or a host `Caller`).
//! Slices are never kept across calls that may grow memory: every access
//! re-borrows from the store.

use std::ops::Range;

use wasmtime::{AsContext, AsContextMut, Memory};

/// Size of one WebAssembly page.
pub const WASM_PAGE_SIZE: u64 = 65536;

/// Byte written over the protected region at address 0.
pub const PROTECTED_FILL: u8 = 0x55;

/// Offset into linear memory. `0` doubles as the null address.
pub type GuestAddress = u32;

/// Linear memory access errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("memory access out of bounds: {len} bytes at {addr:#x} (memory size {size})")]
    OutOfBounds { addr: u64, len: u64, size: u64 },

    #[error("failed to grow memory by {pages} pages (currently {current} pages)")]
    GrowFailed { pages: u64, current: u64 },
}

/// Validate that `[addr, addr+len)` lies within a memory of `mem_size` bytes.
pub fn validate_range(
    mem_size: usize,
    addr: GuestAddress,
    len: usize,
) -> Result<Range<usize>, MemoryError> {
    let start = addr as usize;
    let out_of_bounds = || MemoryError::OutOfBounds {
        addr: addr as u64,
        len: len as u64,
        size: mem_size as u64,
    };
    let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
    if end > mem_size {
        return Err(out_of_bounds());
    }
    Ok(start..end)
}

/// Read `len` bytes from `mem` at `addr`.
pub fn read_bytes(mem: &[u8], addr: GuestAddress, len: usize) -> Result<Vec<u8>, MemoryError> {
    let range = validate_range(mem.len(), addr, len)?;
    Ok(mem[range].to_vec())
}

/// Write `data` into `mem` at `addr`.
pub fn write_bytes(mem: &mut [u8], addr: GuestAddress, data: &[u8]) -> Result<(), MemoryError> {
    let range = validate_range(mem.len(), addr, data.len())?;
    mem[range].copy_from_slice(data);
    Ok(())
}

/// Find the offset of the first NUL at or after `addr`.
///
/// Returns `None` if memory ends first.
pub fn find_nul(mem: &[u8], addr: GuestAddress) -> Result<Option<usize>, MemoryError> {
    let start = validate_range(mem.len(), addr, 0)?.start;
    Ok(mem[start..].iter().position(|&b| b == 0).map(|n| start + n))
}

/// A view of one guest linear memory.
///
/// Cheap to copy; all state lives in the store.
#[derive(Debug, Clone, Copy)]
pub struct LinearMemory {
    memory: Memory,
}

impl LinearMemory {
    pub fn new(memory: Memory) -> Self {
        Self { memory }
    }

    /// The underlying Wasmtime memory.
    pub fn raw(&self) -> Memory {
        self.memory
    }

    /// Current size in bytes. Always a whole number of pages.
    pub fn size(&self, store: impl AsContext) -> u64 {
        self.memory.data_size(&store) as u64
    }

    /// Current size in pages.
    pub fn pages(&self, store: impl AsContext) -> u64 {
        self.memory.size(&store)
    }

    pub fn read(
        &self,
        store: impl AsContext,
        addr: GuestAddress,
        len: usize,
    ) -> Result<Vec<u8>, MemoryError> {
        read_bytes(self.memory.data(&store), addr, len)
    }

    pub fn write(
        &self,
        mut store: impl AsContextMut,
        addr: GuestAddress,
        data: &[u8],
    ) -> Result<(), MemoryError> {
        write_bytes(self.memory.data_mut(&mut store), addr, data)
    }

    pub fn read_i32(&self, store: impl AsContext, addr: GuestAddress) -> Result<i32, MemoryError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.read(store, addr, 4)?);
        Ok(i32::from_le_bytes(buf))
    }

    pub fn write_i32(
        &self,
        store: impl AsContextMut,
        addr: GuestAddress,
        value: i32,
    ) -> Result<(), MemoryError> {
        self.write(store, addr, &value.to_le_bytes())
    }

    pub fn read_f32(&self, store: impl AsContext, addr: GuestAddress) -> Result<f32, MemoryError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.read(store, addr, 4)?);
        Ok(f32::from_le_bytes(buf))
    }

    pub fn read_f64(&self, store: impl AsContext, addr: GuestAddress) -> Result<f64, MemoryError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.read(store, addr, 8)?);
        Ok(f64::from_le_bytes(buf))
    }

    /// Read `count` consecutive little-endian `f32`s.
    pub fn read_f32s(
        &self,
        store: impl AsContext,
        addr: GuestAddress,
        count: usize,
    ) -> Result<Vec<f32>, MemoryError> {
        let len = count.checked_mul(4).ok_or(MemoryError::OutOfBounds {
            addr: addr as u64,
            len: u64::MAX,
            size: self.size(&store),
        })?;
        let bytes = self.read(&store, addr, len)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Set `len` bytes at `addr` to `byte`.
    pub fn fill(
        &self,
        mut store: impl AsContextMut,
        addr: GuestAddress,
        len: usize,
        byte: u8,
    ) -> Result<(), MemoryError> {
        let data = self.memory.data_mut(&mut store);
        let range = validate_range(data.len(), addr, len)?;
        data[range].fill(byte);
        Ok(())
    }

    /// Offset of the first byte in `[addr, addr+len)` that differs from `byte`.
    pub fn first_mismatch(
        &self,
        store: impl AsContext,
        addr: GuestAddress,
        len: usize,
        byte: u8,
    ) -> Result<Option<GuestAddress>, MemoryError> {
        let data = self.memory.data(&store);
        let range = validate_range(data.len(), addr, len)?;
        Ok(data[range]
            .iter()
            .position(|&b| b != byte)
            .map(|n| addr + n as GuestAddress))
    }

    /// Grow by `pages` pages, returning the previous size in pages.
    ///
    /// `grow(0)` leaves memory untouched.
    pub fn grow(&self, mut store: impl AsContextMut, pages: u64) -> Result<u64, MemoryError> {
        let current = self.memory.size(&store);
        if pages == 0 {
            return Ok(current);
        }
        self.memory
            .grow(&mut store, pages)
            .map_err(|_| MemoryError::GrowFailed { pages, current })
    }
}
