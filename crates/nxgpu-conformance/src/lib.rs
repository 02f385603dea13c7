//! Compute conformance harness for `DKSH` shader containers.
//!
//! Test tables are rows of [`ComputeTestDescriptor`]: raw shader code plus the
//! launch geometry and an [`Expectation`] over the result buffer. The runner
//! generates a container for each row, feeds it through a
//! [`ComputeBackend`](nxgpu_backend::ComputeBackend), and compares what comes
//! back, printing the classic dot-padded `Passed`/`Failed` console lines and
//! accumulating a JSON-serializable [`RunReport`].
//!
//! Three comparison forms cover the table families:
//!
//! - [`Expectation::Word`]: the first result word must match.
//! - [`Expectation::Words`]: the leading result words must match element-wise.
//! - [`Expectation::Sha256`]: the whole result buffer must hash to a golden,
//!   stored as four little-endian `u64` words.
//!
//! The built-in [`builtin_tests`] table runs against the loopback queue double
//! so the whole pipeline is testable off-device; real instruction corpora are
//! data supplied by callers.

#![forbid(unsafe_code)]

mod hash;
mod report;
mod tables;

pub use hash::{format_golden, sha256_words, HexDigest};
pub use report::{
    sanitize_case_filename, write_case_report, CaseReport, CaseResult, RunReport, HARNESS_NAME,
};
pub use tables::builtin_tests;

use std::io::{self, BufRead as _, Write as _};
use std::path::PathBuf;
use std::time::Instant;

use nxgpu_backend::{BackendError, ComputeBackend, MEMBLOCK_ALIGN};
use nxgpu_dksh::{build_compute_dksh, ComputeParams};
use tracing::debug;

/// Size of the bound result (storage) buffer: one memory block granule.
pub const RESULT_BUFFER_SIZE: usize = MEMBLOCK_ALIGN;

/// Column the progress dots pad out to.
const PROGRESS_COLUMN: usize = 40;

/// Tests between interactive pauses when pacing is on.
const PACE_INTERVAL: usize = 43;

/// One row of a compute test table.
///
/// Workgroup and dispatch dimensions use the table encoding: stored value is
/// the true dimension minus one, so a `u8` spans the hardware range 1..=256.
#[derive(Debug, Clone, Copy)]
pub struct ComputeTestDescriptor {
    pub name: &'static str,
    pub expectation: Expectation,
    /// Raw shader code placed in the container verbatim.
    pub code: &'static [u8],
    pub num_gprs: u8,
    pub workgroup_x_minus_1: u8,
    pub workgroup_y_minus_1: u8,
    pub workgroup_z_minus_1: u8,
    pub num_invokes_x_minus_1: u8,
    pub num_invokes_y_minus_1: u8,
    pub num_invokes_z_minus_1: u8,
    pub local_mem_size: u16,
    pub shared_mem_size: u16,
    pub num_barriers: u16,
}

impl ComputeTestDescriptor {
    /// Row with a 1x1x1 workgroup, a single dispatch group, and no local or
    /// shared memory. Most single-warp rows have this shape.
    pub const fn single(
        name: &'static str,
        expectation: Expectation,
        code: &'static [u8],
        num_gprs: u8,
    ) -> Self {
        Self {
            name,
            expectation,
            code,
            num_gprs,
            workgroup_x_minus_1: 0,
            workgroup_y_minus_1: 0,
            workgroup_z_minus_1: 0,
            num_invokes_x_minus_1: 0,
            num_invokes_y_minus_1: 0,
            num_invokes_z_minus_1: 0,
            local_mem_size: 0,
            shared_mem_size: 0,
            num_barriers: 0,
        }
    }

    /// True 1-based workgroup dimensions.
    pub const fn workgroup_dims(&self) -> [u32; 3] {
        [
            self.workgroup_x_minus_1 as u32 + 1,
            self.workgroup_y_minus_1 as u32 + 1,
            self.workgroup_z_minus_1 as u32 + 1,
        ]
    }

    /// True 1-based dispatch group counts.
    pub const fn dispatch_dims(&self) -> [u32; 3] {
        [
            self.num_invokes_x_minus_1 as u32 + 1,
            self.num_invokes_y_minus_1 as u32 + 1,
            self.num_invokes_z_minus_1 as u32 + 1,
        ]
    }

    /// Container generation parameters for this row.
    pub fn params(&self) -> ComputeParams {
        ComputeParams {
            num_gprs: self.num_gprs as u32,
            block_dims: self.workgroup_dims(),
            local_mem_size: self.local_mem_size as u32,
            shared_mem_size: self.shared_mem_size as u32,
            num_barriers: self.num_barriers as u32,
        }
    }
}

/// What a row expects of the result buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// First result word equals this value.
    Word(u32),
    /// Leading result words equal this slice element-wise.
    Words(&'static [u32]),
    /// The whole result buffer hashes to this SHA-256 golden, stored as four
    /// little-endian `u64` words.
    Sha256([u64; 4]),
}

impl Expectation {
    fn read_len(&self) -> usize {
        match self {
            Expectation::Word(_) => 4,
            Expectation::Words(words) => words.len() * 4,
            Expectation::Sha256(_) => RESULT_BUFFER_SIZE,
        }
    }
}

/// Knobs for one harness run.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Skip interactive pauses (batch/CI runs).
    pub automatic: bool,
    /// Only run tests whose name contains this substring (case-insensitive).
    pub filter: Option<String>,
    /// Write the aggregate JSON report here.
    pub report_path: Option<PathBuf>,
    /// Write one JSON file per executed test into this directory.
    pub case_report_dir: Option<PathBuf>,
}

impl RunConfig {
    fn selects(&self, name: &str) -> bool {
        match &self.filter {
            Some(filter) => name
                .to_ascii_lowercase()
                .contains(&filter.to_ascii_lowercase()),
            None => true,
        }
    }
}

/// Runs every selected row of `tests` against `backend`.
///
/// Prints one progress line per test and the percentage/time summary at the
/// end; failures are recorded in the report rather than aborting the run.
/// Only report I/O can fail.
pub fn run_compute_tests(
    backend: &mut dyn ComputeBackend,
    tests: &[ComputeTestDescriptor],
    config: &RunConfig,
) -> io::Result<RunReport> {
    let selected: Vec<&ComputeTestDescriptor> =
        tests.iter().filter(|t| config.selects(t.name)).collect();

    println!("Running compute tests...\n");

    let mut report = RunReport::new();
    let start = Instant::now();

    for (idx, desc) in selected.iter().enumerate() {
        let header = format!("{:2}/{:2} Test: {} ", idx + 1, selected.len(), desc.name);
        let dots = PROGRESS_COLUMN.saturating_sub(header.len());
        print!("{header}{} ", ".".repeat(dots));
        io::stdout().flush()?;

        let checked = match execute_test(backend, desc) {
            Ok(raw) => check_results(desc, &raw),
            Err(err) => Checked {
                pass: false,
                detail: Some(format!("{} backend error: {err}", desc.name)),
                observed: Vec::new(),
                expected: Vec::new(),
            },
        };

        println!("{}", if checked.pass { "Passed" } else { "Failed" });
        debug!(name = desc.name, pass = checked.pass, "test finished");

        report.record(desc.name, checked.pass);
        if let Some(detail) = checked.detail {
            report.failure_details.push(detail);
        }
        if let Some(dir) = &config.case_report_dir {
            write_case_report(
                dir,
                &CaseReport {
                    name: desc.name.to_string(),
                    pass: checked.pass,
                    results: checked.observed,
                    expected: checked.expected,
                },
            )?;
        }

        if !config.automatic && idx != 0 && idx % PACE_INTERVAL == 0 {
            wait_for_enter("Press Enter to continue...")?;
        }
    }

    report.elapsed_seconds = start.elapsed().as_secs_f64();
    report.print_summary();

    if let Some(path) = &config.report_path {
        report.write_json(path)?;
    }

    Ok(report)
}

/// Blocks until the operator presses Enter.
pub fn wait_for_enter(prompt: &str) -> io::Result<()> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

fn execute_test(
    backend: &mut dyn ComputeBackend,
    desc: &ComputeTestDescriptor,
) -> Result<Vec<u8>, BackendError> {
    let container = build_compute_dksh(desc.code, &desc.params());
    backend.load_shader(&container, 0)?;
    backend.dispatch(desc.dispatch_dims())?;
    backend.wait_idle()?;

    let mut raw = vec![0u8; desc.expectation.read_len()];
    backend.read_results(&mut raw)?;
    Ok(raw)
}

struct Checked {
    pass: bool,
    detail: Option<String>,
    observed: Vec<u32>,
    expected: Vec<u32>,
}

fn check_results(desc: &ComputeTestDescriptor, raw: &[u8]) -> Checked {
    match desc.expectation {
        Expectation::Word(want) => {
            let got = read_word(raw, 0);
            Checked {
                pass: got == want,
                detail: (got != want)
                    .then(|| format!("{} expected {want:#010x}, got {got:#010x}", desc.name)),
                observed: vec![got],
                expected: vec![want],
            }
        }
        Expectation::Words(want) => {
            let got: Vec<u32> = (0..want.len()).map(|i| read_word(raw, i)).collect();
            let mismatch = want.iter().zip(got.iter()).position(|(w, g)| w != g);
            Checked {
                pass: mismatch.is_none(),
                detail: mismatch.map(|i| {
                    format!(
                        "{} word {i} expected {:#010x}, got {:#010x}",
                        desc.name, want[i], got[i]
                    )
                }),
                observed: got,
                expected: want.to_vec(),
            }
        }
        Expectation::Sha256(want) => {
            let got = sha256_words(raw);
            Checked {
                pass: got == want,
                detail: (got != want).then(|| {
                    format!(
                        "{} expected {}, got {}",
                        desc.name,
                        HexDigest(want),
                        HexDigest(got)
                    )
                }),
                observed: split_words(&got),
                expected: split_words(&want),
            }
        }
    }
}

fn read_word(raw: &[u8], idx: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&raw[idx * 4..idx * 4 + 4]);
    u32::from_le_bytes(word)
}

/// Digest words as `u32` pairs (low half first) for per-case report arrays.
fn split_words(words: &[u64; 4]) -> Vec<u32> {
    let mut out = Vec::with_capacity(8);
    for word in words {
        out.push(*word as u32);
        out.push((*word >> 32) as u32);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nxgpu_backend::LoopbackBackend;

    const ECHO_CODE: [u8; 4] = [0xEF, 0xBE, 0xAD, 0xDE];

    fn automatic() -> RunConfig {
        RunConfig {
            automatic: true,
            ..RunConfig::default()
        }
    }

    #[test]
    fn minus_one_dims_recover_true_values() {
        let desc = ComputeTestDescriptor {
            workgroup_x_minus_1: 255,
            workgroup_y_minus_1: 7,
            num_invokes_x_minus_1: 3,
            num_invokes_z_minus_1: 63,
            ..ComputeTestDescriptor::single("dims", Expectation::Word(0), &ECHO_CODE, 8)
        };

        assert_eq!(desc.workgroup_dims(), [256, 8, 1]);
        assert_eq!(desc.dispatch_dims(), [4, 1, 64]);
        assert_eq!(desc.params().block_dims, [256, 8, 1]);
    }

    #[test]
    fn single_rows_are_one_by_one() {
        let desc = ComputeTestDescriptor::single("s", Expectation::Word(0), &ECHO_CODE, 8);
        assert_eq!(desc.workgroup_dims(), [1, 1, 1]);
        assert_eq!(desc.dispatch_dims(), [1, 1, 1]);
        assert_eq!(desc.local_mem_size, 0);
        assert_eq!(desc.shared_mem_size, 0);
    }

    #[test]
    fn builtin_table_passes_on_the_loopback_queue() {
        let mut backend = LoopbackBackend::new();
        let report = run_compute_tests(&mut backend, builtin_tests(), &automatic()).unwrap();

        assert_eq!(report.total, builtin_tests().len());
        assert_eq!(report.failures, 0);
        assert!(report.all_passed());
        assert!(report.failure_details.is_empty());
        assert_eq!(report.results[0].name, "Constant");
    }

    #[test]
    fn word_mismatch_is_counted_and_detailed() {
        let table = [ComputeTestDescriptor::single(
            "Constant",
            Expectation::Word(0x1234_5678),
            &ECHO_CODE,
            8,
        )];

        let mut backend = LoopbackBackend::new();
        let report = run_compute_tests(&mut backend, &table, &automatic()).unwrap();

        assert_eq!(report.failures, 1);
        assert!(!report.results[0].pass);
        assert_eq!(
            report.failure_details[0],
            "Constant expected 0x12345678, got 0xdeadbeef"
        );
    }

    #[test]
    fn words_mismatch_reports_the_offending_index() {
        let table = [ComputeTestDescriptor::single(
            "Word pair",
            Expectation::Words(&[0xdead_beef, 7]),
            &ECHO_CODE,
            8,
        )];

        let mut backend = LoopbackBackend::new();
        let report = run_compute_tests(&mut backend, &table, &automatic()).unwrap();

        assert_eq!(report.failures, 1);
        assert_eq!(
            report.failure_details[0],
            "Word pair word 1 expected 0x00000007, got 0x00000000"
        );
    }

    #[test]
    fn filter_selects_case_insensitive_substrings() {
        let config = RunConfig {
            automatic: true,
            filter: Some("CONSTANT".to_string()),
            ..RunConfig::default()
        };

        let mut backend = LoopbackBackend::new();
        let report = run_compute_tests(&mut backend, builtin_tests(), &config).unwrap();

        assert!(report.total >= 1);
        assert!(report.total < builtin_tests().len());
        assert!(report
            .results
            .iter()
            .all(|r| r.name.to_ascii_lowercase().contains("constant")));
    }

    #[test]
    fn sha256_expectation_matches_a_computed_golden() {
        // The loopback queue echoes the code region (here 4 bytes padded to
        // the declared 256) into the result buffer and zero fills the rest.
        let mut expected_buffer = vec![0u8; RESULT_BUFFER_SIZE];
        expected_buffer[..4].copy_from_slice(&ECHO_CODE);
        let golden = sha256_words(&expected_buffer);

        let table = [ComputeTestDescriptor::single(
            "Result hash",
            Expectation::Sha256(golden),
            &ECHO_CODE,
            8,
        )];

        let mut backend = LoopbackBackend::new();
        let report = run_compute_tests(&mut backend, &table, &automatic()).unwrap();
        assert!(report.all_passed(), "{:?}", report.failure_details);
    }

    #[test]
    fn sha256_mismatch_prints_both_digests() {
        let table = [ComputeTestDescriptor::single(
            "Result hash",
            Expectation::Sha256([1, 2, 3, 4]),
            &ECHO_CODE,
            8,
        )];

        let mut backend = LoopbackBackend::new();
        let report = run_compute_tests(&mut backend, &table, &automatic()).unwrap();

        assert_eq!(report.failures, 1);
        let detail = &report.failure_details[0];
        assert!(detail.starts_with("Result hash expected 0x"));
        assert!(detail.contains(", got 0x"));
    }

    #[test]
    fn backend_errors_fail_the_case_without_aborting() {
        // Local memory demand far over the default queue scratch budget.
        let table = [
            ComputeTestDescriptor {
                local_mem_size: 4096,
                ..ComputeTestDescriptor::single(
                    "Scratch hog",
                    Expectation::Word(0),
                    &ECHO_CODE,
                    8,
                )
            },
            ComputeTestDescriptor::single(
                "Constant",
                Expectation::Word(0xdead_beef),
                &ECHO_CODE,
                8,
            ),
        ];

        let mut backend = LoopbackBackend::new();
        let report = run_compute_tests(&mut backend, &table, &automatic()).unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.failures, 1);
        assert!(report.failure_details[0].starts_with("Scratch hog backend error:"));
        assert!(report.results[1].pass);
    }

    #[test]
    fn case_reports_are_written_per_test() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            automatic: true,
            case_report_dir: Some(dir.path().to_path_buf()),
            ..RunConfig::default()
        };

        let mut backend = LoopbackBackend::new();
        run_compute_tests(&mut backend, builtin_tests(), &config).unwrap();

        let path = dir.path().join("Code_slack_zero_fill.json");
        let case: CaseReport =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(case.pass);
        assert_eq!(case.results, case.expected);
    }
}
