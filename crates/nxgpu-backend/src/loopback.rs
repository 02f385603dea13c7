//! In-process queue double used to run the harness off-device.

use nxgpu_dksh::{DkshFile, StagePayload};
use tracing::debug;

use crate::memblock::{MemBlock, MemBlockFlags, MEMBLOCK_ALIGN};
use crate::{BackendError, ComputeBackend, Result};

/// Scratch memory budget granule per warp, in bytes.
pub const PER_WARP_SCRATCH_ALIGN: u32 = 512;

const CODE_MEM_SIZE: usize = 512 * 1024;
const RESULT_MEM_SIZE: usize = MEMBLOCK_ALIGN;

/// Queue-level execution limits, mirroring queue creation parameters on the
/// real device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Per-warp scratch memory budget, in bytes.
    pub per_warp_scratch_size: u32,
    /// Capacity of the code memory block, in bytes.
    pub code_mem_size: usize,
    /// Capacity of the bound result (storage) buffer, in bytes.
    pub result_mem_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            per_warp_scratch_size: 8 * PER_WARP_SCRATCH_ALIGN,
            code_mem_size: CODE_MEM_SIZE,
            result_mem_size: RESULT_MEM_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LoadedShader {
    /// Resolved start of execution within the code block.
    start: usize,
    /// Length of the uploaded code region, including zeroed slack.
    region_len: usize,
}

/// Software stand-in for the hardware compute queue.
///
/// `load_shader` validates the container exactly as the loader would (single
/// compute program, entrypoint inside the code region, scratch demand within
/// the queue budget), then uploads the code region into an internal code
/// block, zero filling the slack up to the declared 256-rounded code size so
/// later reads of the region are deterministic.
///
/// `dispatch` "executes" the program by copying the code region, starting at
/// the entrypoint, into the result block and zero extending to the block's
/// size. The point is to exercise container generation and harness plumbing
/// deterministically, not to interpret GPU code. Reading results while
/// dispatches are in flight is an error; callers must wait for idle first.
#[derive(Debug)]
pub struct LoopbackBackend {
    config: QueueConfig,
    code: MemBlock,
    results: MemBlock,
    loaded: Option<LoadedShader>,
    in_flight: usize,
}

impl LoopbackBackend {
    /// Creates a queue double with [`QueueConfig::default`] limits.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Creates a queue double with explicit limits.
    pub fn with_config(config: QueueConfig) -> Self {
        let code = MemBlock::new(
            config.code_mem_size,
            MemBlockFlags::CPU_UNCACHED | MemBlockFlags::GPU_CACHED | MemBlockFlags::CODE,
        );
        let results = MemBlock::new(
            config.result_mem_size,
            MemBlockFlags::CPU_UNCACHED | MemBlockFlags::GPU_CACHED,
        );
        Self {
            config,
            code,
            results,
            loaded: None,
            in_flight: 0,
        }
    }

    /// The configured queue limits.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

impl Default for LoopbackBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for LoopbackBackend {
    fn load_shader(&mut self, container: &[u8], entry_offset: u32) -> Result<()> {
        let file = DkshFile::parse(container)?;
        let programs = file.programs();
        if programs.len() != 1 {
            return Err(BackendError::ProgramCount(programs.len()));
        }
        let prog = programs[0];
        let StagePayload::Compute(_) = prog.payload else {
            return Err(BackendError::WrongStage(prog.stage()));
        };

        if prog.per_warp_scratch_size > self.config.per_warp_scratch_size {
            return Err(BackendError::ScratchBudgetExceeded {
                needed: prog.per_warp_scratch_size,
                budget: self.config.per_warp_scratch_size,
            });
        }

        let code = file.code();
        let declared = file.header().code_size as usize;
        let region_len = declared.max(code.len());
        if region_len > self.code.size() {
            return Err(BackendError::CodeMemoryExhausted {
                needed: region_len,
                capacity: self.code.size(),
            });
        }

        let start = (entry_offset as usize)
            .checked_add(prog.entrypoint as usize)
            .filter(|&start| start <= code.len())
            .ok_or(BackendError::EntryOutOfRange {
                offset: entry_offset as usize,
                code_len: code.len(),
            })?;

        self.code.bytes_mut()[..code.len()].copy_from_slice(code);
        self.code.bytes_mut()[code.len()..region_len].fill(0);
        self.loaded = Some(LoadedShader { start, region_len });

        debug!(
            code_len = code.len(),
            region_len,
            start,
            num_gprs = prog.num_gprs,
            scratch = prog.per_warp_scratch_size,
            "loaded compute shader"
        );
        Ok(())
    }

    fn dispatch(&mut self, groups: [u32; 3]) -> Result<()> {
        let shader = self.loaded.ok_or(BackendError::NoShaderLoaded)?;
        if groups.iter().any(|&g| g == 0) {
            return Err(BackendError::EmptyDispatch(groups));
        }

        let src = &self.code.bytes()[shader.start..shader.region_len];
        let results = self.results.bytes_mut();
        let copied = src.len().min(results.len());
        results[..copied].copy_from_slice(&src[..copied]);
        results[copied..].fill(0);
        self.in_flight += 1;

        debug!(?groups, copied, "dispatched compute work");
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.in_flight = 0;
        Ok(())
    }

    fn read_results(&mut self, out: &mut [u8]) -> Result<()> {
        if self.in_flight != 0 {
            return Err(BackendError::PendingWork(self.in_flight));
        }
        let results = self.results.bytes();
        if out.len() > results.len() {
            return Err(BackendError::ResultOutOfRange {
                len: out.len(),
                capacity: results.len(),
            });
        }
        out.copy_from_slice(&results[..out.len()]);
        Ok(())
    }
}
