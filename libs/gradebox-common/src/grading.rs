/// Output-to-Verdict Mapper - Raw Output Grading
///
/// **Core Responsibility:**
/// Turn the combined output of one program run into one verdict per test case.
///
/// **Critical Properties:**
/// - Knows nothing about sandboxes or languages
/// - Never fails: anything it cannot interpret becomes `Verdict::Unknown`
/// - Preserves test case order and identity
///
/// **Strategies (one per deployment, never mixed):**
/// - `LinePositional`: output line i belongs to test case i
/// - `MarkerScanning`: look for the marker lines a test-mode program prints
use crate::assembler::ReportStyle;
use crate::types::{GradedTestCase, TestCase, Verdict};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradingStrategy {
    #[serde(alias = "line-positional")]
    Lines,
    #[default]
    #[serde(alias = "marker-scanning")]
    Markers,
}

impl GradingStrategy {
    /// Report style the assembled program must use for this strategy
    pub fn report_style(self) -> ReportStyle {
        match self {
            GradingStrategy::Lines => ReportStyle::Lines,
            GradingStrategy::Markers => ReportStyle::Markers,
        }
    }
}

impl fmt::Display for GradingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradingStrategy::Lines => write!(f, "lines"),
            GradingStrategy::Markers => write!(f, "markers"),
        }
    }
}

impl FromStr for GradingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lines" | "line-positional" => Ok(GradingStrategy::Lines),
            "markers" | "marker-scanning" => Ok(GradingStrategy::Markers),
            other => Err(format!(
                "unknown grading strategy '{}' (expected 'lines' or 'markers')",
                other
            )),
        }
    }
}

/// Grade `raw_output` against `test_cases` with the chosen strategy
pub fn grade(
    strategy: GradingStrategy,
    raw_output: &str,
    test_cases: &[TestCase],
) -> Vec<GradedTestCase> {
    match strategy {
        GradingStrategy::Lines => grade_lines(raw_output, test_cases),
        GradingStrategy::Markers => grade_markers(raw_output, test_cases),
    }
}

/// Line-positional grading.
///
/// The output is trimmed and split on `\n`; line i is the actual output of
/// test case i and is recorded whether or not it matches. A test case with an
/// expectation but no line fails.
pub fn grade_lines(raw_output: &str, test_cases: &[TestCase]) -> Vec<GradedTestCase> {
    let lines: Vec<&str> = raw_output
        .trim()
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    test_cases
        .iter()
        .enumerate()
        .map(|(idx, test_case)| {
            let line = lines.get(idx).copied();
            let status = match (&test_case.expected_output, line) {
                (None, _) => Verdict::Unknown,
                (Some(expected), Some(line)) if line == expected => Verdict::Passed,
                (Some(_), _) => Verdict::Failed,
            };
            GradedTestCase::new(test_case, status, line.map(str::to_string))
        })
        .collect()
}

/// Marker-scanning grading.
///
/// Marker numbers are 1-based ordinals. Lines are matched whole so that
/// `Test 1` never matches a `Test 11` marker. A failure marker for a test
/// outranks any pass marker for it: the program's stderr shares the stream
/// and can print either.
pub fn grade_markers(raw_output: &str, test_cases: &[TestCase]) -> Vec<GradedTestCase> {
    let lines: Vec<&str> = raw_output.lines().map(str::trim_end).collect();

    test_cases
        .iter()
        .enumerate()
        .map(|(idx, test_case)| {
            let n = idx + 1;

            if let Some(actual) = find_failure(&lines, n) {
                return GradedTestCase::new(test_case, Verdict::Failed, actual);
            }

            let passed = format!("Test {} passed", n);
            if lines.iter().any(|line| *line == passed) {
                GradedTestCase::new(
                    test_case,
                    Verdict::Passed,
                    test_case.expected_output.clone(),
                )
            } else {
                GradedTestCase::new(test_case, Verdict::Unknown, None)
            }
        })
        .collect()
}

/// Find the failure marker for test `n` and extract what the program got.
///
/// `Some(None)` means the marker was present but the actual value could not
/// be extracted.
fn find_failure(lines: &[&str], n: usize) -> Option<Option<String>> {
    let prefix = format!("Test {} failed", n);
    let line = lines.iter().find(|line| {
        line.strip_prefix(prefix.as_str())
            .map_or(false, |rest| rest.is_empty() || rest.starts_with(':'))
    })?;

    // Greedy on the expectation: the actual value follows the last ", got "
    let pattern = format!(r"^Test {} failed: expected .*, got (.*)$", n);
    let actual = Regex::new(&pattern)
        .ok()
        .and_then(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| unescape_marker_value(m.as_str()));

    Some(actual)
}

/// Undo the `\\`, `\n`, `\r` escaping applied to marker values
fn unescape_marker_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
