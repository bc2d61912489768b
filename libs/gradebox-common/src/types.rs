use serde::{Deserialize, Serialize};

/// One request's code, harness snippet, language and test cases.
///
/// The harness field keeps the historical wire names: `execution_test_cases`
/// is canonical, `execute_code` and `harness` are accepted on input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub language: String,
    pub code: String,
    #[serde(
        rename = "execution_test_cases",
        alias = "execute_code",
        alias = "harness",
        default
    )]
    pub harness: String,
    #[serde(default)]
    pub test_cases: Vec<TestCaseInput>,
}

/// Test case as it arrives on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseInput {
    #[serde(default)]
    pub id: Option<i64>,
    pub input: String,
    #[serde(default, alias = "expected_output")]
    pub output: Option<String>,
}

/// Test case with a resolved identity and expectation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub id: i64,
    pub input: String,
    pub expected_output: Option<String>,
}

impl Submission {
    /// Resolve wire test cases in order.
    ///
    /// A missing id becomes the 1-based position; an empty expected output is
    /// treated as "no expectation".
    pub fn test_cases(&self) -> Vec<TestCase> {
        self.test_cases
            .iter()
            .enumerate()
            .map(|(idx, tc)| TestCase {
                id: tc.id.unwrap_or((idx + 1) as i64),
                input: tc.input.clone(),
                expected_output: tc.output.clone().filter(|o| !o.is_empty()),
            })
            .collect()
    }
}

/// Classification assigned to one test case after grading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Passed,
    Failed,
    Unknown,
}

impl Verdict {
    /// Pass/fail flag, absent when the verdict is unknown
    pub fn as_flag(self) -> Option<bool> {
        match self {
            Verdict::Passed => Some(true),
            Verdict::Failed => Some(false),
            Verdict::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedTestCase {
    pub id: i64,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    /// Actual output captured for this test case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_true: Option<bool>,
    pub status: Verdict,
}

impl GradedTestCase {
    pub fn new(test_case: &TestCase, status: Verdict, output: Option<String>) -> Self {
        Self {
            id: test_case.id,
            input: test_case.input.clone(),
            expected_output: test_case.expected_output.clone(),
            output,
            is_true: status.as_flag(),
            status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub language_id: String,
    pub code: String,
    pub is_accepted: bool,
    /// Wall-clock seconds
    pub execution_time: f64,
    /// Megabytes, best effort
    pub memory_usage: f64,
    pub test_cases: Vec<GradedTestCase>,
}

/// Accepted when every test case passed; a submission without test cases is
/// accepted.
pub fn is_accepted(graded: &[GradedTestCase]) -> bool {
    graded.iter().all(|tc| tc.status == Verdict::Passed)
}
