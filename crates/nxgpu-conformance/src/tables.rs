//! Built-in smoke table.
//!
//! These rows are deterministic against the loopback queue double, which
//! echoes the loaded code region into the result buffer. They exist so the
//! generator, backend plumbing, and reporting are exercised end to end by the
//! harness itself; per-instruction corpora are data supplied by callers.

use crate::{ComputeTestDescriptor, Expectation};

const CONSTANT_CODE: [u8; 4] = [0xEF, 0xBE, 0xAD, 0xDE];
const HIGH_BYTE_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0xFF];
const WORD_PAIR_CODE: [u8; 8] = [0x44, 0x33, 0x22, 0x11, 0x88, 0x77, 0x66, 0x55];
const ZERO_FILL_CODE: [u8; 4] = [0x01, 0x00, 0x00, 0x00];
const HASH_CODE: [u8; 8] = [0x10, 0x32, 0x54, 0x76, 0x98, 0xBA, 0xDC, 0xFE];
const ANSWER_CODE: [u8; 4] = [0x2A, 0x00, 0x00, 0x00];

/// Golden for [`HASH_CODE`] zero extended to the 4096-byte result block.
const HASH_GOLDEN: [u64; 4] = [
    0xd84af2c9791e4321,
    0xb43bfbf4fb32e6cd,
    0x7b3827c79c970abf,
    0xf1a9d2219eeed73d,
];

static BUILTIN_TESTS: [ComputeTestDescriptor; 6] = [
    ComputeTestDescriptor::single(
        "Constant",
        Expectation::Word(0xdead_beef),
        &CONSTANT_CODE,
        8,
    ),
    ComputeTestDescriptor::single(
        "Constant high byte",
        Expectation::Word(0xff00_0000),
        &HIGH_BYTE_CODE,
        8,
    ),
    ComputeTestDescriptor::single(
        "Word pair",
        Expectation::Words(&[0x1122_3344, 0x5566_7788]),
        &WORD_PAIR_CODE,
        8,
    ),
    // Words past the end of the 4-byte program must read back zero: the
    // loader zero fills the code region up to its declared 256-byte size.
    ComputeTestDescriptor::single(
        "Code slack zero fill",
        Expectation::Words(&[1, 0, 0, 0]),
        &ZERO_FILL_CODE,
        8,
    ),
    ComputeTestDescriptor::single(
        "Result buffer hash",
        Expectation::Sha256(HASH_GOLDEN),
        &HASH_CODE,
        8,
    ),
    // Full-width descriptor: multi-dimensional workgroup, two dispatch
    // groups, and a local memory demand that lands exactly on the default
    // queue scratch budget.
    ComputeTestDescriptor {
        name: "Workgroup and local memory",
        expectation: Expectation::Word(42),
        code: &ANSWER_CODE,
        num_gprs: 16,
        workgroup_x_minus_1: 7,
        workgroup_y_minus_1: 3,
        workgroup_z_minus_1: 0,
        num_invokes_x_minus_1: 1,
        num_invokes_y_minus_1: 0,
        num_invokes_z_minus_1: 0,
        local_mem_size: 64,
        shared_mem_size: 256,
        num_barriers: 1,
    },
];

/// The harness's own smoke tests.
pub fn builtin_tests() -> &'static [ComputeTestDescriptor] {
    &BUILTIN_TESTS
}
