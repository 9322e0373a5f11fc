//! Guest stack/heap layout.
//!
//! The guest reports where its stack begins; the heap starts a safety
//! margin above that, rounded up to a page boundary.

use crate::memory::{GuestAddress, WASM_PAGE_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("guest reported negative stack base {0}")]
    NegativeStackBase(i32),

    #[error(
        "heap base for stack base {stack_base:#x} + margin {margin} \
         exceeds the 32-bit address space"
    )]
    AddressOverflow { stack_base: u32, margin: u32 },
}

/// Round `value` up to the next multiple of `align` (a power of two).
pub fn align_up(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Where the guest stack ends and its heap arena begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    pub stack_base: GuestAddress,
    pub heap_base: GuestAddress,
}

impl MemoryLayout {
    /// Derive the layout from the guest's reported stack base.
    pub fn from_stack_base(stack_base: i32, margin: u32) -> Result<Self, LayoutError> {
        let stack_base =
            u32::try_from(stack_base).map_err(|_| LayoutError::NegativeStackBase(stack_base))?;
        let heap_base = align_up(stack_base as u64 + margin as u64, WASM_PAGE_SIZE);
        let heap_base = u32::try_from(heap_base)
            .map_err(|_| LayoutError::AddressOverflow { stack_base, margin })?;
        Ok(Self {
            stack_base,
            heap_base,
        })
    }

    /// Pages to grow a memory of `memory_size` bytes by so that `heap_base`
    /// is addressable.
    pub fn pages_needed(&self, memory_size: u64) -> u64 {
        let heap_base = self.heap_base as u64;
        if heap_base < memory_size {
            0
        } else {
            (heap_base - memory_size) / WASM_PAGE_SIZE + 1
        }
    }
}
