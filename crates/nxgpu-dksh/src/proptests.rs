use crate::{
    align_up, build_compute_dksh, compute_dksh_size, ComputeParams, DkshFile, ShaderStage,
    StagePayload, CODE_SECTION_ALIGN,
};
use proptest::prelude::*;

const MAX_CODE_LEN: usize = 4 * 1024;

fn params_strategy() -> impl Strategy<Value = ComputeParams> {
    (
        0u32..256,
        (1u32..=256, 1u32..=256, 1u32..=64),
        0u32..=65536,
        0u32..=49152,
        0u32..=16,
    )
        .prop_map(
            |(num_gprs, (x, y, z), local_mem_size, shared_mem_size, num_barriers)| ComputeParams {
                num_gprs,
                block_dims: [x, y, z],
                local_mem_size,
                shared_mem_size,
                num_barriers,
            },
        )
}

proptest! {
    #[test]
    fn container_length_matches_calculator(
        code in prop::collection::vec(any::<u8>(), 0..MAX_CODE_LEN),
        params in params_strategy(),
    ) {
        let blob = build_compute_dksh(&code, &params);
        prop_assert_eq!(blob.len(), compute_dksh_size(code.len()));
    }

    #[test]
    fn generated_containers_parse_back(
        code in prop::collection::vec(any::<u8>(), 0..MAX_CODE_LEN),
        params in params_strategy(),
    ) {
        let blob = build_compute_dksh(&code, &params);
        let parsed = DkshFile::parse(&blob).unwrap();

        let header = parsed.header();
        prop_assert_eq!(header.num_programs, 1);
        prop_assert_eq!(header.control_size, 256);
        prop_assert_eq!(
            header.code_size as usize,
            align_up(code.len(), CODE_SECTION_ALIGN)
        );
        prop_assert_eq!(parsed.code(), &code[..]);

        let prog = parsed.programs()[0];
        prop_assert_eq!(prog.stage(), ShaderStage::Compute);
        prop_assert_eq!(prog.entrypoint, 0);
        prop_assert_eq!(prog.num_gprs, params.num_gprs);
        match prog.payload {
            StagePayload::Compute(c) => {
                prop_assert_eq!(c.block_dims, params.block_dims);
                prop_assert_eq!(c.num_barriers, params.num_barriers);
            }
            other => prop_assert!(false, "expected compute payload, got {:?}", other),
        }
    }

    #[test]
    fn scratch_follows_rounded_local_mem(
        local in 0u32..=1 << 20,
        code in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let params = ComputeParams {
            num_gprs: 8,
            block_dims: [1, 1, 1],
            local_mem_size: local,
            shared_mem_size: 0,
            num_barriers: 0,
        };
        let blob = build_compute_dksh(&code, &params);
        let parsed = DkshFile::parse(&blob).unwrap();
        let rounded = align_up(local as usize, 16) as u32;
        prop_assert_eq!(
            parsed.programs()[0].per_warp_scratch_size,
            rounded * 32 + 0x800
        );
    }

    #[test]
    fn writer_is_deterministic(
        code in prop::collection::vec(any::<u8>(), 0..MAX_CODE_LEN),
        params in params_strategy(),
    ) {
        prop_assert_eq!(
            build_compute_dksh(&code, &params),
            build_compute_dksh(&code, &params)
        );
    }
}
