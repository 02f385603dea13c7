//! Writer for single-program compute containers.
//!
//! This is the path used to wrap freshly assembled compute code so the
//! loader will accept it: one header, one compute program descriptor, zero
//! padding to the code section boundary, then the code verbatim.

use crate::format::{
    align_up, ComputePayload, DkshHeader, ProgramHeader, StagePayload, CODE_SECTION_ALIGN,
    CONTROL_SECTION_SIZE, CRS_STACK_SIZE, DKSH_MAGIC, LOCAL_MEM_ALIGN, SHARED_MEM_ALIGN,
    WARP_LANES,
};

/// Parameters for a compute program descriptor.
///
/// Values are taken verbatim; the writer rounds only where the loader
/// requires rounded figures (local and shared memory sizes). Field widths
/// match the wire format, so range policing for the narrower hardware limits
/// (register count, workgroup dimensions) belongs to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeParams {
    /// General-purpose registers the code uses.
    pub num_gprs: u32,
    /// Workgroup dimensions in threads; true values, not biased.
    pub block_dims: [u32; 3],
    /// Per-thread local memory the code needs, in bytes.
    pub local_mem_size: u32,
    /// Shared memory per workgroup, in bytes.
    pub shared_mem_size: u32,
    /// Barriers the code uses.
    pub num_barriers: u32,
}

/// Exact size in bytes of a single-program compute container wrapping
/// `code_size` bytes of machine code.
///
/// This is a total function with no over-estimation: it is valid for any
/// `code_size` (including zero), and [`write_compute_dksh`] fills exactly
/// this many bytes. Callers allocate with it before generating.
pub const fn compute_dksh_size(code_size: usize) -> usize {
    CONTROL_SECTION_SIZE + code_size
}

/// Writes a complete single-program compute container into `dest`.
///
/// Exactly [`compute_dksh_size`]`(code.len())` bytes of `dest` are written;
/// any excess destination bytes are left untouched. Output is deterministic:
/// identical inputs produce identical bytes, including the zeroed padding and
/// unused descriptor fields.
///
/// The descriptor stores the rounded figures the loader expects:
/// local memory rounds up to 16 bytes, shared memory to 256, and the
/// per-warp scratch requirement is `rounded_local * 32 + 0x800`. The
/// header's declared code size is `code.len()` rounded up to 256 bytes; the
/// container itself ends after the last code byte.
///
/// # Panics
///
/// Panics if `dest` is shorter than [`compute_dksh_size`]`(code.len())`.
pub fn write_compute_dksh(dest: &mut [u8], code: &[u8], params: &ComputeParams) {
    let total = compute_dksh_size(code.len());
    assert!(
        dest.len() >= total,
        "destination too small for container: need {total} bytes, got {}",
        dest.len()
    );

    let header = DkshHeader {
        magic: DKSH_MAGIC,
        header_size: DkshHeader::SIZE as u32,
        control_size: CONTROL_SECTION_SIZE as u32,
        code_size: align_up(code.len(), CODE_SECTION_ALIGN) as u32,
        programs_off: DkshHeader::SIZE as u32,
        num_programs: 1,
    };

    let local_pos = align_up(params.local_mem_size as usize, LOCAL_MEM_ALIGN) as u32;
    let local_neg = 0u32;

    let prog = ProgramHeader {
        entrypoint: 0,
        num_gprs: params.num_gprs,
        constbuf1_off: 0,
        constbuf1_size: 0,
        per_warp_scratch_size: (local_pos + local_neg) * WARP_LANES + CRS_STACK_SIZE,
        payload: StagePayload::Compute(ComputePayload {
            block_dims: params.block_dims,
            shared_mem_size: align_up(params.shared_mem_size as usize, SHARED_MEM_ALIGN) as u32,
            local_pos_mem_size: local_pos,
            local_neg_mem_size: local_neg,
            crs_size: CRS_STACK_SIZE,
            num_barriers: params.num_barriers,
        }),
    };

    let table_end = DkshHeader::SIZE + ProgramHeader::SIZE;
    dest[..DkshHeader::SIZE].copy_from_slice(&header.encode());
    dest[DkshHeader::SIZE..table_end].copy_from_slice(&prog.encode());
    dest[table_end..CONTROL_SECTION_SIZE].fill(0);
    dest[CONTROL_SECTION_SIZE..total].copy_from_slice(code);
}

/// Allocates and writes a single-program compute container.
///
/// Convenience wrapper over [`compute_dksh_size`] + [`write_compute_dksh`].
pub fn build_compute_dksh(code: &[u8], params: &ComputeParams) -> Vec<u8> {
    let mut out = vec![0u8; compute_dksh_size(code.len())];
    write_compute_dksh(&mut out, code, params);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ShaderStage;
    use crate::reader::DkshFile;

    fn plain_params() -> ComputeParams {
        ComputeParams {
            num_gprs: 8,
            block_dims: [1, 1, 1],
            local_mem_size: 0,
            shared_mem_size: 0,
            num_barriers: 0,
        }
    }

    #[test]
    fn four_byte_program_yields_260_byte_container() {
        let code = [0xEFu8, 0xBE, 0xAD, 0xDE];
        let blob = build_compute_dksh(&code, &plain_params());

        assert_eq!(blob.len(), 260);
        assert_eq!(compute_dksh_size(code.len()), 260);

        let word = |off: usize| u32::from_le_bytes(blob[off..off + 4].try_into().unwrap());
        assert_eq!(&blob[0..4], b"DKSH");
        assert_eq!(word(4), 24); // header size
        assert_eq!(word(8), 256); // control size
        assert_eq!(word(12), 256); // declared code size, rounded
        assert_eq!(word(16), 24); // programs offset
        assert_eq!(word(20), 1); // program count

        assert_eq!(word(24), 5); // compute stage tag
        assert_eq!(word(28), 0); // entrypoint
        assert_eq!(word(32), 8); // num_gprs
        assert_eq!(word(44), 0x800); // per-warp scratch: crs only

        // Padding between the program table and the code section is zero.
        assert!(blob[88..256].iter().all(|&b| b == 0));
        assert_eq!(&blob[256..260], &code);
    }

    #[test]
    fn empty_code_yields_control_section_only() {
        let blob = build_compute_dksh(&[], &plain_params());
        assert_eq!(blob.len(), 256);
        assert_eq!(compute_dksh_size(0), 256);

        let parsed = DkshFile::parse(&blob).unwrap();
        assert_eq!(parsed.header().code_size, 0);
        assert!(parsed.code().is_empty());
    }

    #[test]
    fn local_mem_rounds_to_sixteen_byte_granules() {
        for (local, rounded) in [(0u32, 0u32), (1, 16), (15, 16), (16, 16), (17, 32), (512, 512)]
        {
            let params = ComputeParams {
                local_mem_size: local,
                ..plain_params()
            };
            let blob = build_compute_dksh(&[0u8; 8], &params);
            let parsed = DkshFile::parse(&blob).unwrap();
            let prog = parsed.programs()[0];

            let expected_scratch = rounded * 32 + 0x800;
            assert_eq!(
                prog.per_warp_scratch_size, expected_scratch,
                "local_mem_size={local}"
            );
            match prog.payload {
                StagePayload::Compute(c) => {
                    assert_eq!(c.local_pos_mem_size, rounded, "local_mem_size={local}");
                    assert_eq!(c.local_neg_mem_size, 0);
                    assert_eq!(c.crs_size, 0x800);
                }
                other => panic!("expected compute payload, got {other:?}"),
            }
        }
    }

    #[test]
    fn shared_mem_rounds_to_code_section_granules() {
        for (shared, rounded) in [(0u32, 0u32), (1, 256), (256, 256), (257, 512)] {
            let params = ComputeParams {
                shared_mem_size: shared,
                ..plain_params()
            };
            let blob = build_compute_dksh(&[0u8; 8], &params);
            let parsed = DkshFile::parse(&blob).unwrap();
            match parsed.programs()[0].payload {
                StagePayload::Compute(c) => {
                    assert_eq!(c.shared_mem_size, rounded, "shared_mem_size={shared}")
                }
                other => panic!("expected compute payload, got {other:?}"),
            }
        }
    }

    #[test]
    fn block_dims_and_barriers_are_verbatim() {
        let params = ComputeParams {
            num_gprs: 64,
            block_dims: [7, 3, 2],
            local_mem_size: 0,
            shared_mem_size: 0,
            num_barriers: 5,
        };
        let blob = build_compute_dksh(&[0u8; 16], &params);
        let parsed = DkshFile::parse(&blob).unwrap();
        let prog = parsed.programs()[0];

        assert_eq!(prog.stage(), ShaderStage::Compute);
        assert_eq!(prog.num_gprs, 64);
        match prog.payload {
            StagePayload::Compute(c) => {
                assert_eq!(c.block_dims, [7, 3, 2]);
                assert_eq!(c.num_barriers, 5);
            }
            other => panic!("expected compute payload, got {other:?}"),
        }
    }

    #[test]
    fn large_local_mem_stays_in_range() {
        let params = ComputeParams {
            local_mem_size: 4096,
            ..plain_params()
        };
        let blob = build_compute_dksh(&[0u8; 4], &params);
        let parsed = DkshFile::parse(&blob).unwrap();
        assert_eq!(parsed.programs()[0].per_warp_scratch_size, 4096 * 32 + 0x800);
    }

    #[test]
    fn write_into_oversized_buffer_leaves_tail_untouched() {
        let code = [0xAAu8, 0xBB, 0xCC, 0xDD];
        let total = compute_dksh_size(code.len());
        let mut dest = vec![0xCCu8; total + 32];
        write_compute_dksh(&mut dest, &code, &plain_params());

        assert_eq!(&dest[256..260], &code);
        assert!(dest[total..].iter().all(|&b| b == 0xCC));
    }

    #[test]
    #[should_panic(expected = "destination too small")]
    fn short_destination_panics() {
        let mut dest = vec![0u8; 259];
        write_compute_dksh(&mut dest, &[0u8; 4], &plain_params());
    }

    #[test]
    fn identical_inputs_produce_identical_bytes() {
        let code = [1u8, 2, 3, 4, 5];
        let params = ComputeParams {
            num_gprs: 16,
            block_dims: [8, 8, 1],
            local_mem_size: 24,
            shared_mem_size: 100,
            num_barriers: 1,
        };
        assert_eq!(
            build_compute_dksh(&code, &params),
            build_compute_dksh(&code, &params)
        );
    }
}
