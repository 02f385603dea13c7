//! CPU-visible model of GPU memory blocks.

use bitflags::bitflags;
use nxgpu_dksh::align_up;

/// Alignment and size granule of memory blocks, in bytes.
pub const MEMBLOCK_ALIGN: usize = 0x1000;

/// Poison byte filling freshly created blocks.
///
/// Blocks start poisoned, not zeroed; [`MemBlockFlags::ZERO_FILL_INIT`]
/// requests zeroed contents instead.
pub const BLOCK_FILL: u8 = 0xCC;

bitflags! {
    /// Properties of an allocated memory block.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct MemBlockFlags: u32 {
        /// CPU mapping is uncached.
        const CPU_UNCACHED = 1 << 0;
        /// GPU mapping is cached.
        const GPU_CACHED = 1 << 1;
        /// Block may hold shader code.
        const CODE = 1 << 2;
        /// Block may back image storage.
        const IMAGE = 1 << 3;
        /// Initialize contents to zero instead of [`BLOCK_FILL`].
        const ZERO_FILL_INIT = 1 << 4;
    }
}

/// An aligned, CPU-visible memory block.
///
/// Requested sizes round up to [`MEMBLOCK_ALIGN`].
#[derive(Debug, Clone)]
pub struct MemBlock {
    flags: MemBlockFlags,
    data: Vec<u8>,
}

impl MemBlock {
    /// Allocates a block of at least `size` bytes.
    pub fn new(size: usize, flags: MemBlockFlags) -> Self {
        let size = align_up(size, MEMBLOCK_ALIGN);
        let fill = if flags.contains(MemBlockFlags::ZERO_FILL_INIT) {
            0x00
        } else {
            BLOCK_FILL
        };
        Self {
            flags,
            data: vec![fill; size],
        }
    }

    /// Rounded size of the block in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Flags the block was created with.
    pub fn flags(&self) -> MemBlockFlags {
        self.flags
    }

    /// CPU view of the block contents.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable CPU view of the block contents.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
