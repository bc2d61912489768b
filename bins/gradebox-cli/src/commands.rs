// CLI commands for working with submissions offline
use anyhow::{bail, Context, Result};
use gradebox_common::assembler::{assemble_with, AssembleOptions, ReportStyle, INPUT_ANCHOR};
use gradebox_common::config::LanguageTable;
use gradebox_common::grading::{self, GradingStrategy};
use gradebox_common::types::{self, Submission, Verdict};
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// Load a submission JSON file
fn load_submission(path: &Path) -> Result<Submission> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read submission {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse submission {}", path.display()))
}

/// Assemble a submission's program text
pub fn assemble(path: &Path, style: ReportStyle, config: Option<&Path>) -> Result<String> {
    let languages = LanguageTable::load_or_builtin(config)?;
    let submission = load_submission(path)?;

    let Some(language) = languages.get(&submission.language) else {
        bail!(
            "Unsupported language '{}' (configured: {})",
            submission.language,
            languages.names().join(", ")
        );
    };

    let test_cases = submission.test_cases();
    let options = AssembleOptions {
        style,
        test_flag: &language.test_flag,
    };
    let program = assemble_with(
        &options,
        &language.name,
        &submission.code,
        &submission.harness,
        &test_cases,
    );

    if program.missing_anchor {
        eprintln!(
            "⚠ Harness has no '{}' anchor; every test case runs it unchanged",
            INPUT_ANCHOR
        );
    }
    if program.fallback {
        eprintln!(
            "⚠ No program template for '{}'; code and harness concatenated",
            submission.language
        );
    }

    Ok(program.source)
}

/// Grade a captured output file and render the result as JSON
pub fn grade(path: &Path, output: &Path, strategy: GradingStrategy) -> Result<String> {
    let submission = load_submission(path)?;
    let raw_output = fs::read_to_string(output)
        .with_context(|| format!("Failed to read output {}", output.display()))?;

    let test_cases = submission.test_cases();
    let graded = grading::grade(strategy, &raw_output, &test_cases);
    let passed = graded.iter().filter(|tc| tc.status == Verdict::Passed).count();

    let report = serde_json::json!({
        "strategy": strategy,
        "is_accepted": types::is_accepted(&graded),
        "summary": {
            "total_tests": graded.len(),
            "passed": passed,
            "failed": graded.len() - passed,
        },
        "test_cases": graded,
    });

    serde_json::to_string_pretty(&report).context("Failed to render grading report")
}

/// Render the language table
pub fn list_languages(config: Option<&Path>) -> Result<String> {
    let languages = LanguageTable::load_or_builtin(config)?;

    let mut out = String::new();
    for lang in languages.iter() {
        writeln!(
            out,
            "{:<10} sandbox={:<14} file={}{:<14} run=\"{}\"",
            lang.name,
            lang.sandbox_name(),
            lang.work_dir,
            lang.file_name(),
            lang.command(false)
        )?;
    }
    Ok(out)
}
