//! On-wire layout of the `DKSH` container.
//!
//! A container is laid out as:
//!
//! ```text
//! +0                    24-byte DkshHeader
//! +programs_off         num_programs x 64-byte ProgramHeader
//! ...                   zero padding
//! +control_size         raw shader machine code
//! ```
//!
//! `control_size` is the header plus program table rounded up to 256 bytes,
//! so the code section always starts on a 256-byte boundary. All fields are
//! little-endian.

use crate::error::{DkshError, Result};

/// Container magic: the ASCII bytes `DKSH` read as a little-endian word.
pub const DKSH_MAGIC: u32 = 0x4853_4B44;

/// Alignment of the code section (and of the control section that precedes
/// it), in bytes.
pub const CODE_SECTION_ALIGN: usize = 256;

/// Granule the loader expects per-thread local memory sizes rounded to, in
/// bytes.
pub const LOCAL_MEM_ALIGN: usize = 16;

/// Granule shared memory sizes are rounded to, in bytes.
pub const SHARED_MEM_ALIGN: usize = 256;

/// Threads per warp on the target GPU; scales local memory into the per-warp
/// scratch requirement.
pub const WARP_LANES: u32 = 32;

/// Fixed control-return-stack spill area reserved per warp, in bytes.
pub const CRS_STACK_SIZE: u32 = 0x800;

/// Size of the per-stage payload region inside a program descriptor.
pub(crate) const STAGE_PAYLOAD_SIZE: usize = 36;

/// Byte offset of the code section in a single-program container.
pub(crate) const CONTROL_SECTION_SIZE: usize =
    align_up(DkshHeader::SIZE + ProgramHeader::SIZE, CODE_SECTION_ALIGN);

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a nonzero power of two.
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// The fixed 24-byte header at the start of every container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DkshHeader {
    /// Must be [`DKSH_MAGIC`].
    pub magic: u32,
    /// Size of this header in bytes; always 24 in the versions we emit.
    pub header_size: u32,
    /// Bytes from the start of the container to the code section.
    pub control_size: u32,
    /// Declared size of the code section, rounded up to 256 bytes.
    ///
    /// This is the figure the loader allocates for code memory; the container
    /// itself may end before `control_size + code_size` (the rounded tail is
    /// don't-care and is not required to be present).
    pub code_size: u32,
    /// Byte offset of the program descriptor table; equals `header_size`.
    pub programs_off: u32,
    /// Number of program descriptors in the table.
    pub num_programs: u32,
}

impl DkshHeader {
    /// Encoded size of the header in bytes.
    pub const SIZE: usize = 24;

    /// Encodes this header into its fixed wire form.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.header_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.control_size.to_le_bytes());
        out[12..16].copy_from_slice(&self.code_size.to_le_bytes());
        out[16..20].copy_from_slice(&self.programs_off.to_le_bytes());
        out[20..24].copy_from_slice(&self.num_programs.to_le_bytes());
        out
    }

    /// Decodes a header from the first [`Self::SIZE`] bytes of `bytes`.
    ///
    /// Only the field widths are checked here; semantic validation (magic,
    /// bounds) is the parser's job.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(DkshError::Truncated {
                what: "container header",
                need: Self::SIZE,
                got: bytes.len(),
            });
        }
        Ok(Self {
            magic: read_u32(bytes, 0),
            header_size: read_u32(bytes, 4),
            control_size: read_u32(bytes, 8),
            code_size: read_u32(bytes, 12),
            programs_off: read_u32(bytes, 16),
            num_programs: read_u32(bytes, 20),
        })
    }
}

/// Shader stage tag stored in the first word of each program descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ShaderStage {
    /// Vertex program.
    Vertex = 0,
    /// Tessellation control program.
    TessCtrl = 1,
    /// Tessellation evaluation program.
    TessEval = 2,
    /// Geometry program.
    Geometry = 3,
    /// Fragment program.
    Fragment = 4,
    /// Compute program.
    Compute = 5,
}

impl ShaderStage {
    /// Decodes a stage tag, returning `None` for values the format does not
    /// define.
    pub const fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Vertex,
            1 => Self::TessCtrl,
            2 => Self::TessEval,
            3 => Self::Geometry,
            4 => Self::Fragment,
            5 => Self::Compute,
            _ => return None,
        })
    }
}

/// Extra descriptor data for vertex programs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VertexPayload {
    /// Entrypoint of the alternate (position-only) program variant.
    pub alt_entrypoint: u32,
    /// Register count of the alternate program variant.
    pub alt_num_gprs: u32,
}

/// Extra descriptor data for fragment programs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FragmentPayload {
    /// Whether [`Self::table_3d1`] carries meaningful values.
    pub has_table_3d1: bool,
    /// Forces depth/stencil tests to run before the shader.
    pub early_fragment_tests: bool,
    /// Sample mask reflects coverage after the depth test.
    pub post_depth_coverage: bool,
    /// Run the shader per sample rather than per pixel.
    pub sample_shading: bool,
    /// Raw values for the 0x3d1 method table.
    pub table_3d1: [u32; 4],
    /// Raw value for the 0xd8 method.
    pub param_d8: u32,
    /// Raw value for the 0x65b method.
    pub param_65b: u16,
    /// Raw value for the 0x489 method.
    pub param_489: u16,
}

/// Extra descriptor data for geometry programs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GeometryPayload {
    /// Raw flag for the 0x47c method.
    pub flag_47c: bool,
    /// Whether [`Self::table_490`] carries meaningful values.
    pub has_table_490: bool,
    /// Raw values for the 0x490 method table.
    pub table_490: [u32; 8],
}

/// Extra descriptor data for tessellation evaluation programs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TessEvalPayload {
    /// Raw value for the 0xc8 method.
    pub param_c8: u32,
}

/// Extra descriptor data for compute programs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ComputePayload {
    /// Workgroup dimensions in threads; true values, not biased.
    pub block_dims: [u32; 3],
    /// Shared memory per workgroup, rounded up to 256 bytes.
    pub shared_mem_size: u32,
    /// Positive-offset local memory per thread, rounded up to 16 bytes.
    pub local_pos_mem_size: u32,
    /// Negative-offset local memory per thread; zero in code we emit.
    pub local_neg_mem_size: u32,
    /// Control-return-stack spill area per warp.
    pub crs_size: u32,
    /// Barriers the program uses.
    pub num_barriers: u32,
}

/// Per-stage payload stored in the 36-byte tail region of a program
/// descriptor.
///
/// Exactly one member is meaningful per program, selected by the stage tag;
/// the encoded region is zero beyond the selected member, so identical
/// payloads encode to identical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePayload {
    /// Vertex program payload.
    Vertex(VertexPayload),
    /// Tessellation control programs carry no payload.
    TessCtrl,
    /// Tessellation evaluation program payload.
    TessEval(TessEvalPayload),
    /// Geometry program payload.
    Geometry(GeometryPayload),
    /// Fragment program payload.
    Fragment(FragmentPayload),
    /// Compute program payload.
    Compute(ComputePayload),
}

impl StagePayload {
    /// The stage tag this payload belongs to.
    pub const fn stage(&self) -> ShaderStage {
        match self {
            StagePayload::Vertex(_) => ShaderStage::Vertex,
            StagePayload::TessCtrl => ShaderStage::TessCtrl,
            StagePayload::TessEval(_) => ShaderStage::TessEval,
            StagePayload::Geometry(_) => ShaderStage::Geometry,
            StagePayload::Fragment(_) => ShaderStage::Fragment,
            StagePayload::Compute(_) => ShaderStage::Compute,
        }
    }

    /// Encodes the payload into the descriptor's payload region.
    ///
    /// `out` must be exactly [`STAGE_PAYLOAD_SIZE`] bytes and is fully
    /// overwritten (unused bytes become zero).
    pub(crate) fn encode_into(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), STAGE_PAYLOAD_SIZE);
        out.fill(0);
        match self {
            StagePayload::Vertex(v) => {
                out[0..4].copy_from_slice(&v.alt_entrypoint.to_le_bytes());
                out[4..8].copy_from_slice(&v.alt_num_gprs.to_le_bytes());
            }
            StagePayload::TessCtrl => {}
            StagePayload::TessEval(t) => {
                out[0..4].copy_from_slice(&t.param_c8.to_le_bytes());
            }
            StagePayload::Geometry(g) => {
                out[0] = g.flag_47c as u8;
                out[1] = g.has_table_490 as u8;
                // bytes 2..4 are struct padding
                for (i, word) in g.table_490.iter().enumerate() {
                    let off = 4 + i * 4;
                    out[off..off + 4].copy_from_slice(&word.to_le_bytes());
                }
            }
            StagePayload::Fragment(f) => {
                out[0] = f.has_table_3d1 as u8;
                out[1] = f.early_fragment_tests as u8;
                out[2] = f.post_depth_coverage as u8;
                out[3] = f.sample_shading as u8;
                for (i, word) in f.table_3d1.iter().enumerate() {
                    let off = 4 + i * 4;
                    out[off..off + 4].copy_from_slice(&word.to_le_bytes());
                }
                out[20..24].copy_from_slice(&f.param_d8.to_le_bytes());
                out[24..26].copy_from_slice(&f.param_65b.to_le_bytes());
                out[26..28].copy_from_slice(&f.param_489.to_le_bytes());
            }
            StagePayload::Compute(c) => {
                for (i, dim) in c.block_dims.iter().enumerate() {
                    let off = i * 4;
                    out[off..off + 4].copy_from_slice(&dim.to_le_bytes());
                }
                out[12..16].copy_from_slice(&c.shared_mem_size.to_le_bytes());
                out[16..20].copy_from_slice(&c.local_pos_mem_size.to_le_bytes());
                out[20..24].copy_from_slice(&c.local_neg_mem_size.to_le_bytes());
                out[24..28].copy_from_slice(&c.crs_size.to_le_bytes());
                out[28..32].copy_from_slice(&c.num_barriers.to_le_bytes());
            }
        }
    }

    /// Decodes the payload member selected by `stage` from the descriptor's
    /// payload region.
    pub(crate) fn parse(stage: ShaderStage, bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), STAGE_PAYLOAD_SIZE);
        match stage {
            ShaderStage::Vertex => StagePayload::Vertex(VertexPayload {
                alt_entrypoint: read_u32(bytes, 0),
                alt_num_gprs: read_u32(bytes, 4),
            }),
            ShaderStage::TessCtrl => StagePayload::TessCtrl,
            ShaderStage::TessEval => StagePayload::TessEval(TessEvalPayload {
                param_c8: read_u32(bytes, 0),
            }),
            ShaderStage::Geometry => {
                let mut table_490 = [0u32; 8];
                for (i, word) in table_490.iter_mut().enumerate() {
                    *word = read_u32(bytes, 4 + i * 4);
                }
                StagePayload::Geometry(GeometryPayload {
                    flag_47c: bytes[0] != 0,
                    has_table_490: bytes[1] != 0,
                    table_490,
                })
            }
            ShaderStage::Fragment => {
                let mut table_3d1 = [0u32; 4];
                for (i, word) in table_3d1.iter_mut().enumerate() {
                    *word = read_u32(bytes, 4 + i * 4);
                }
                StagePayload::Fragment(FragmentPayload {
                    has_table_3d1: bytes[0] != 0,
                    early_fragment_tests: bytes[1] != 0,
                    post_depth_coverage: bytes[2] != 0,
                    sample_shading: bytes[3] != 0,
                    table_3d1,
                    param_d8: read_u32(bytes, 20),
                    param_65b: read_u16(bytes, 24),
                    param_489: read_u16(bytes, 26),
                })
            }
            ShaderStage::Compute => {
                let mut block_dims = [0u32; 3];
                for (i, dim) in block_dims.iter_mut().enumerate() {
                    *dim = read_u32(bytes, i * 4);
                }
                StagePayload::Compute(ComputePayload {
                    block_dims,
                    shared_mem_size: read_u32(bytes, 12),
                    local_pos_mem_size: read_u32(bytes, 16),
                    local_neg_mem_size: read_u32(bytes, 20),
                    crs_size: read_u32(bytes, 24),
                    num_barriers: read_u32(bytes, 28),
                })
            }
        }
    }
}

/// A 64-byte program descriptor.
///
/// One per shader program, laid out back to back at
/// [`DkshHeader::programs_off`]. The stage tag is carried by the payload;
/// [`ProgramHeader::stage`] reads it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    /// Byte offset of the program's entrypoint within the code section.
    pub entrypoint: u32,
    /// General-purpose registers the program uses.
    pub num_gprs: u32,
    /// Offset of the driver constant buffer within the code section, or zero.
    pub constbuf1_off: u32,
    /// Size of the driver constant buffer, or zero.
    pub constbuf1_size: u32,
    /// Scratch memory the program needs per warp, in bytes.
    pub per_warp_scratch_size: u32,
    /// Stage-specific descriptor data.
    pub payload: StagePayload,
}

impl ProgramHeader {
    /// Encoded size of a program descriptor in bytes.
    pub const SIZE: usize = 64;

    const PAYLOAD_OFF: usize = 24;
    const RESERVED_OFF: usize = 60;

    /// The stage tag stored in the descriptor's first word.
    pub const fn stage(&self) -> ShaderStage {
        self.payload.stage()
    }

    /// Encodes this descriptor into its fixed wire form.
    ///
    /// The unused payload tail and the reserved trailing word encode as zero.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&(self.stage() as u32).to_le_bytes());
        out[4..8].copy_from_slice(&self.entrypoint.to_le_bytes());
        out[8..12].copy_from_slice(&self.num_gprs.to_le_bytes());
        out[12..16].copy_from_slice(&self.constbuf1_off.to_le_bytes());
        out[16..20].copy_from_slice(&self.constbuf1_size.to_le_bytes());
        out[20..24].copy_from_slice(&self.per_warp_scratch_size.to_le_bytes());
        self.payload
            .encode_into(&mut out[Self::PAYLOAD_OFF..Self::RESERVED_OFF]);
        out
    }

    /// Decodes a descriptor from the first [`Self::SIZE`] bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(DkshError::Truncated {
                what: "program descriptor",
                need: Self::SIZE,
                got: bytes.len(),
            });
        }
        let tag = read_u32(bytes, 0);
        let stage = ShaderStage::from_u32(tag).ok_or(DkshError::UnknownStage(tag))?;
        Ok(Self {
            entrypoint: read_u32(bytes, 4),
            num_gprs: read_u32(bytes, 8),
            constbuf1_off: read_u32(bytes, 12),
            constbuf1_size: read_u32(bytes, 16),
            per_warp_scratch_size: read_u32(bytes, 20),
            payload: StagePayload::parse(stage, &bytes[Self::PAYLOAD_OFF..Self::RESERVED_OFF]),
        })
    }
}

#[inline]
fn read_u32(bytes: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

#[inline]
fn read_u16(bytes: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([bytes[off], bytes[off + 1]])
}
