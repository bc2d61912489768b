/// Code Assembler - Program Text Construction
///
/// **Core Responsibility:**
/// Build the one runnable program that gets injected into a sandbox from
/// (language, user code, harness snippet, test cases).
///
/// **Properties:**
/// - Pure: identical inputs always produce byte-identical programs
/// - Knows nothing about sandboxes, commands or grading
///
/// **Modes:**
/// - No test cases: user code, then the harness once under the entry point
/// - Test cases: one harness variant per test case with the input anchor
///   replaced by the test input, followed by a marker line
///   (`Test N passed` / `Test N failed: expected E, got A`)
/// - Language without a template: user code and harness concatenated as-is
///
/// Values inside a failure marker are escaped (`\\`, `\n`, `\r`) so that
/// every marker stays on one line.
use crate::config::DEFAULT_TEST_FLAG;
use crate::template::HarnessTemplate;
use crate::types::TestCase;
use std::fmt::Write;

/// Token in a harness that stands for "read one line of input"
pub const INPUT_ANCHOR: &str = "input()";

/// How a test-mode program reports per-test results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportStyle {
    /// Marker lines compared inside the program
    #[default]
    Markers,
    /// The bare harness output, one line per test case
    Lines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleOptions<'a> {
    pub style: ReportStyle,
    /// First program argument selecting the test branch; must be the flag
    /// the run command appends
    pub test_flag: &'a str,
}

impl Default for AssembleOptions<'_> {
    fn default() -> Self {
        Self {
            style: ReportStyle::default(),
            test_flag: DEFAULT_TEST_FLAG,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Template {
    Python,
    Go,
}

impl Template {
    fn for_language(language: &str) -> Option<Self> {
        match language {
            "python" => Some(Template::Python),
            "go" => Some(Template::Go),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledProgram {
    pub source: String,
    /// The program must be run with the language's test flag
    pub test_mode: bool,
    /// Test cases were given but the harness has no input anchor
    pub missing_anchor: bool,
    /// No template exists for the language; code was concatenated
    pub fallback: bool,
}

/// Assemble with marker reporting and the default test flag
pub fn assemble(
    language: &str,
    user_code: &str,
    harness: &str,
    test_cases: &[TestCase],
) -> AssembledProgram {
    assemble_with(&AssembleOptions::default(), language, user_code, harness, test_cases)
}

pub fn assemble_with(
    options: &AssembleOptions<'_>,
    language: &str,
    user_code: &str,
    harness: &str,
    test_cases: &[TestCase],
) -> AssembledProgram {
    let Some(template) = Template::for_language(language) else {
        return AssembledProgram {
            source: format!("{}\n\n{}", user_code, harness),
            test_mode: false,
            missing_anchor: false,
            fallback: true,
        };
    };

    let harness_tpl = HarnessTemplate::parse(harness, INPUT_ANCHOR);
    let source = match template {
        Template::Python => python_program(options, user_code, &harness_tpl, test_cases),
        Template::Go => go_program(options, user_code, &harness_tpl, test_cases),
    };

    AssembledProgram {
        source,
        test_mode: !test_cases.is_empty(),
        missing_anchor: !test_cases.is_empty() && !harness_tpl.has_anchor(),
        fallback: false,
    }
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

const PYTHON_CAPTURE_HELPER: &str = r#"def _gradebox_capture(run):
    import contextlib
    import io
    buffer = io.StringIO()
    with contextlib.redirect_stdout(buffer):
        run()
    return buffer.getvalue().strip()


def _gradebox_marker_value(value):
    return value.replace('\\', '\\\\').replace('\r', '\\r').replace('\n', '\\n')


"#;

fn python_program(
    options: &AssembleOptions<'_>,
    user_code: &str,
    harness: &HarnessTemplate<'_>,
    test_cases: &[TestCase],
) -> String {
    let mut out = String::new();
    out.push_str(user_code);
    out.push_str("\n\n");

    if test_cases.is_empty() {
        out.push_str("if __name__ == '__main__':\n");
        push_block(&mut out, &harness.original(), "    ", "pass");
        return out;
    }

    out.push_str(PYTHON_CAPTURE_HELPER);
    out.push_str("if __name__ == '__main__':\n");
    out.push_str("    import sys\n");
    let _ = writeln!(
        out,
        "    if len(sys.argv) > 1 and sys.argv[1] == {}:",
        python_literal(options.test_flag)
    );

    for (idx, test_case) in test_cases.iter().enumerate() {
        let n = idx + 1;
        let body = harness.fill(&python_literal(&test_case.input));
        let _ = writeln!(out, "        # Test {}", n);

        match (options.style, &test_case.expected_output) {
            (ReportStyle::Markers, Some(expected)) => {
                let _ = writeln!(out, "        def _gradebox_test_{}():", n);
                push_block(&mut out, &body, "            ", "pass");
                let _ = writeln!(out, "        expected_output = {}", python_literal(expected));
                out.push_str("        try:\n");
                let _ = writeln!(out, "            result = _gradebox_capture(_gradebox_test_{})", n);
                out.push_str("        except Exception as exc:\n");
                out.push_str("            result = f\"{type(exc).__name__}: {exc}\"\n");
                out.push_str("        if result != expected_output.strip():\n");
                let _ = writeln!(
                    out,
                    "            print(f\"Test {} failed: expected {{_gradebox_marker_value(expected_output)}}, got {{_gradebox_marker_value(result)}}\")",
                    n
                );
                out.push_str("        else:\n");
                let _ = writeln!(out, "            print(\"Test {} passed\")", n);
            }
            _ => push_block(&mut out, &body, "        ", "pass"),
        }
    }

    out.push_str("    else:\n");
    push_block(&mut out, &harness.original(), "        ", "pass");
    out
}

/// Single-quoted Python string literal
fn python_literal(value: &str) -> String {
    let mut lit = String::with_capacity(value.len() + 2);
    lit.push('\'');
    for c in value.chars() {
        match c {
            '\\' => lit.push_str("\\\\"),
            '\'' => lit.push_str("\\'"),
            '\n' => lit.push_str("\\n"),
            '\r' => lit.push_str("\\r"),
            '\t' => lit.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(lit, "\\x{:02x}", c as u32);
            }
            c => lit.push(c),
        }
    }
    lit.push('\'');
    lit
}

// ---------------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------------

const GO_PREAMBLE: &str = "\
package main

import (
\t\"bufio\"
\t\"fmt\"
\t\"io\"
\t\"os\"
\t\"strings\"
)

";

const GO_HELPERS: &str = "\
var stdinReader = bufio.NewReader(os.Stdin)

func input() string {
\tline, _ := stdinReader.ReadString('\\n')
\treturn strings.TrimRight(line, \"\\r\\n\")
}

func captureOutput(run func()) string {
\tr, w, err := os.Pipe()
\tif err != nil {
\t\treturn err.Error()
\t}
\tstdout := os.Stdout
\tos.Stdout = w
\tdone := make(chan string)
\tgo func() {
\t\tout, _ := io.ReadAll(r)
\t\tdone <- string(out)
\t}()
\tpanicked := func() (msg string) {
\t\tdefer func() {
\t\t\tif rec := recover(); rec != nil {
\t\t\t\tmsg = fmt.Sprint(\"panic: \", rec)
\t\t\t}
\t\t}()
\t\trun()
\t\treturn \"\"
\t}()
\tw.Close()
\tos.Stdout = stdout
\tout := strings.TrimSpace(<-done)
\tif panicked != \"\" {
\t\treturn panicked
\t}
\treturn out
}

func markerValue(s string) string {
\treturn strings.NewReplacer(`\\`, `\\\\`, \"\\r\", `\\r`, \"\\n\", `\\n`).Replace(s)
}

";

fn go_program(
    options: &AssembleOptions<'_>,
    user_code: &str,
    harness: &HarnessTemplate<'_>,
    test_cases: &[TestCase],
) -> String {
    let mut out = String::from(GO_PREAMBLE);
    out.push_str(&strip_package_clause(user_code));
    out.push_str("\n\n");
    out.push_str(GO_HELPERS);
    out.push_str("func main() {\n");

    if !test_cases.is_empty() {
        let _ = writeln!(
            out,
            "\tif len(os.Args) > 1 && os.Args[1] == {} {{",
            go_literal(options.test_flag)
        );
        for (idx, test_case) in test_cases.iter().enumerate() {
            let n = idx + 1;
            let body = harness.fill(&go_literal(&test_case.input));
            let _ = writeln!(out, "\t\t// Test {}", n);
            out.push_str("\t\t{\n");

            match (options.style, &test_case.expected_output) {
                (ReportStyle::Markers, Some(expected)) => {
                    let _ = writeln!(out, "\t\t\texpected := {}", go_literal(expected));
                    out.push_str("\t\t\tresult := captureOutput(func() {\n");
                    push_block(&mut out, &body, "\t\t\t\t", "");
                    out.push_str("\t\t\t})\n");
                    out.push_str("\t\t\tif result == strings.TrimSpace(expected) {\n");
                    let _ = writeln!(out, "\t\t\t\tfmt.Println(\"Test {} passed\")", n);
                    out.push_str("\t\t\t} else {\n");
                    let _ = writeln!(
                        out,
                        "\t\t\t\tfmt.Printf(\"Test {} failed: expected %s, got %s\\n\", markerValue(expected), markerValue(result))",
                        n
                    );
                    out.push_str("\t\t\t}\n");
                }
                _ => push_block(&mut out, &body, "\t\t\t", ""),
            }

            out.push_str("\t\t}\n");
        }
        out.push_str("\t\treturn\n");
        out.push_str("\t}\n");
    }

    push_block(&mut out, &harness.original(), "\t", "");
    out.push_str("}\n");
    out
}

/// Double-quoted Go string literal
fn go_literal(value: &str) -> String {
    let mut lit = String::with_capacity(value.len() + 2);
    lit.push('"');
    for c in value.chars() {
        match c {
            '\\' => lit.push_str("\\\\"),
            '"' => lit.push_str("\\\""),
            '\n' => lit.push_str("\\n"),
            '\r' => lit.push_str("\\r"),
            '\t' => lit.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(lit, "\\u{:04x}", c as u32);
            }
            c => lit.push(c),
        }
    }
    lit.push('"');
    lit
}

/// The preamble declares `package main`; drop the user's own clause.
/// Comments ahead of the clause are kept.
fn strip_package_clause(code: &str) -> String {
    let mut rest = code;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("//") {
            rest = after.find('\n').map_or("", |end| &after[end + 1..]);
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            match after.find("*/") {
                Some(end) => rest = &after[end + 2..],
                None => return code.to_string(),
            }
        } else {
            break;
        }
    }

    let trimmed = rest.trim_start();
    let Some(after) = trimmed.strip_prefix("package ") else {
        return code.to_string();
    };
    let clause_start = code.len() - trimmed.len();
    let tail = after.find('\n').map_or("", |end| &after[end + 1..]);
    format!("{}{}", &code[..clause_start], tail)
}

// ---------------------------------------------------------------------------

/// Write `text` line by line at `indent`, or `empty` if it has no content
fn push_block(out: &mut String, text: &str, indent: &str, empty: &str) {
    if text.trim().is_empty() {
        if !empty.is_empty() {
            out.push_str(indent);
            out.push_str(empty);
            out.push('\n');
        }
        return;
    }
    for line in text.lines() {
        if !line.trim().is_empty() {
            out.push_str(indent);
            out.push_str(line);
        }
        out.push('\n');
    }
}
