//! Builder and parser for `DKSH` shader binary containers.
//!
//! `DKSH` is the container format the deko3d loader consumes: a small
//! little-endian header, a table of per-shader program descriptors, zero
//! padding up to a 256-byte boundary, then raw machine code. This crate
//! provides:
//!
//! - An exact size calculator and a writer for single-program compute
//!   containers, suitable for wrapping freshly assembled code so the loader
//!   will accept it.
//! - A strict, zero-copy [`DkshFile`] parser for **untrusted** container
//!   bytes that validates every offset before use and never panics on
//!   malformed data.
//!
//! All multi-byte fields are little-endian. The writer produces byte-for-byte
//! deterministic output for identical inputs.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod format;
mod reader;
mod writer;

#[cfg(test)]
mod proptests;

pub use crate::error::{DkshError, Result};
pub use crate::format::{
    align_up, ComputePayload, DkshHeader, FragmentPayload, GeometryPayload, ProgramHeader,
    ShaderStage, StagePayload, TessEvalPayload, VertexPayload, CODE_SECTION_ALIGN, CRS_STACK_SIZE,
    DKSH_MAGIC, LOCAL_MEM_ALIGN, SHARED_MEM_ALIGN, WARP_LANES,
};
pub use crate::reader::DkshFile;
pub use crate::writer::{build_compute_dksh, compute_dksh_size, write_compute_dksh, ComputeParams};
