use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Name stamped into aggregate reports.
pub const HARNESS_NAME: &str = "nxgputests";

/// Aggregate outcome of one harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub name: String,
    pub results: Vec<CaseResult>,
    pub total: usize,
    pub failures: usize,
    pub failure_details: Vec<String>,
    pub elapsed_seconds: f64,
}

/// One pass/fail row in the aggregate report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub pass: bool,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            name: HARNESS_NAME.to_string(),
            results: Vec::new(),
            total: 0,
            failures: 0,
            failure_details: Vec::new(),
            elapsed_seconds: 0.0,
        }
    }

    pub fn record(&mut self, name: &str, pass: bool) {
        self.results.push(CaseResult {
            name: name.to_string(),
            pass,
        });
        self.total += 1;
        if !pass {
            self.failures += 1;
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failures == 0
    }

    /// Whole-number pass percentage, truncated.
    pub fn percent_passed(&self) -> usize {
        if self.total == 0 {
            return 100;
        }
        (self.total - self.failures) * 100 / self.total
    }

    pub fn print_summary(&self) {
        println!(
            "\n{:3}% tests passed, {} tests failed out of {}\n",
            self.percent_passed(),
            self.failures,
            self.total
        );
        println!("Total Test time (real) = {:.2} sec", self.elapsed_seconds);
    }

    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, contents)
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-test detail written alongside the aggregate report: the compared word
/// arrays, so a failing case can be diagnosed without rerunning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: String,
    pub pass: bool,
    pub results: Vec<u32>,
    pub expected: Vec<u32>,
}

/// Maps a test name onto a filesystem-safe file stem: spaces become `_` and
/// `|` becomes `l`.
pub fn sanitize_case_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' => '_',
            '|' => 'l',
            other => other,
        })
        .collect()
}

/// Writes one per-case JSON file under `dir`, creating the directory as
/// needed. Returns the path written.
pub fn write_case_report(dir: &Path, case: &CaseReport) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", sanitize_case_filename(&case.name)));
    let contents = serde_json::to_string_pretty(case).map_err(io::Error::other)?;
    std::fs::write(&path, contents)?;
    Ok(path)
}
