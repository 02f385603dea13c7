//! Execution seam for compute conformance tests.
//!
//! [`ComputeBackend`] is the narrow queue interface the test runner drives:
//! load a `DKSH` container, dispatch workgroups, wait for idle, read back the
//! bound result buffer. [`LoopbackBackend`] is the in-process implementation
//! used off-device; a hardware queue implements the same trait behind its FFI
//! layer.

#![forbid(unsafe_code)]

mod loopback;
mod memblock;

pub use crate::loopback::{LoopbackBackend, QueueConfig, PER_WARP_SCRATCH_ALIGN};
pub use crate::memblock::{MemBlock, MemBlockFlags, BLOCK_FILL, MEMBLOCK_ALIGN};

use nxgpu_dksh::{DkshError, ShaderStage};
use thiserror::Error;

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors produced by compute backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("shader container rejected: {0}")]
    InvalidContainer(#[from] DkshError),

    #[error("expected exactly one program in the container, found {0}")]
    ProgramCount(usize),

    #[error("expected a compute program, found a {0:?} program")]
    WrongStage(ShaderStage),

    #[error("entrypoint offset {offset:#x} lies outside the {code_len}-byte code region")]
    EntryOutOfRange { offset: usize, code_len: usize },

    #[error("code region of {needed} bytes exceeds code memory capacity {capacity}")]
    CodeMemoryExhausted { needed: usize, capacity: usize },

    #[error("program needs {needed} bytes of per-warp scratch, queue budget is {budget}")]
    ScratchBudgetExceeded { needed: u32, budget: u32 },

    #[error("dispatch with an empty workgroup grid {0:?}")]
    EmptyDispatch([u32; 3]),

    #[error("no shader loaded")]
    NoShaderLoaded,

    #[error("{0} dispatches still in flight; wait for idle before reading results")]
    PendingWork(usize),

    #[error("result read of {len} bytes exceeds result buffer capacity {capacity}")]
    ResultOutOfRange { len: usize, capacity: usize },
}

/// A queue that runs compute programs from `DKSH` containers.
///
/// The usage protocol mirrors the hardware queue: load a shader, dispatch,
/// wait idle, then read results. One shader and one storage (result) buffer
/// are bound at a time, which is all the compute tests need.
pub trait ComputeBackend {
    /// Loads a compute shader from complete container bytes.
    ///
    /// `entry_offset` is the byte offset within the code region where
    /// execution begins; the containers the generator emits use offset zero.
    fn load_shader(&mut self, container: &[u8], entry_offset: u32) -> Result<()>;

    /// Dispatches a grid of workgroups using the loaded shader.
    fn dispatch(&mut self, groups: [u32; 3]) -> Result<()>;

    /// Blocks until all dispatched work has completed.
    fn wait_idle(&mut self) -> Result<()>;

    /// Copies `out.len()` bytes from the start of the result buffer.
    ///
    /// Results are defined only after [`ComputeBackend::wait_idle`].
    fn read_results(&mut self, out: &mut [u8]) -> Result<()>;
}
