/// Submission Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Run one submission through the pipeline and produce its result:
/// 1. Validate the language against the language table
/// 2. Assemble the program (gradebox_common::assembler)
/// 3. Inject it into the language's sandbox (engine.rs)
/// 4. Run it and drain its output (engine.rs)
/// 5. Grade the output (gradebox_common::grading)
///
/// Steps run strictly in sequence. Nothing touches a sandbox before the
/// language is known to be supported.
use crate::engine::{self, ExecutionError, InjectionError, SandboxRuntime};
use gradebox_common::assembler::{assemble_with, AssembleOptions, INPUT_ANCHOR};
use gradebox_common::config::LanguageTable;
use gradebox_common::grading::{self, GradingStrategy};
use gradebox_common::types::{self, ExecutionResult, Submission};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error(transparent)]
    Injection(#[from] InjectionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub strategy: GradingStrategy,
    /// `None` lets a run block for as long as the program runs
    pub exec_timeout: Option<Duration>,
    /// Hold a per-sandbox lock across injection and execution
    pub serialize_sandboxes: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            strategy: GradingStrategy::default(),
            exec_timeout: None,
            serialize_sandboxes: true,
        }
    }
}

pub struct Pipeline {
    runtime: Arc<dyn SandboxRuntime>,
    languages: LanguageTable,
    options: PipelineOptions,
    sandbox_locks: HashMap<String, Mutex<()>>,
}

impl Pipeline {
    pub fn new(
        runtime: Arc<dyn SandboxRuntime>,
        languages: LanguageTable,
        options: PipelineOptions,
    ) -> Self {
        let sandbox_locks = languages
            .iter()
            .map(|lang| (lang.sandbox_name(), Mutex::new(())))
            .collect();

        Self {
            runtime,
            languages,
            options,
            sandbox_locks,
        }
    }

    pub fn languages(&self) -> &LanguageTable {
        &self.languages
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    #[instrument(
        skip(self, submission),
        fields(
            submission_id = %uuid::Uuid::new_v4(),
            language = %submission.language,
            test_cases = submission.test_cases.len(),
        )
    )]
    pub async fn execute(&self, submission: &Submission) -> Result<ExecutionResult, SubmitError> {
        let Some(language) = self.languages.get(&submission.language) else {
            warn!("Rejected submission for unsupported language");
            return Err(SubmitError::UnsupportedLanguage(submission.language.clone()));
        };

        let test_cases = submission.test_cases();
        let strategy = self.options.strategy;

        let assemble_options = AssembleOptions {
            style: strategy.report_style(),
            test_flag: &language.test_flag,
        };
        let program = assemble_with(
            &assemble_options,
            &language.name,
            &submission.code,
            &submission.harness,
            &test_cases,
        );

        if program.missing_anchor {
            warn!(
                anchor = INPUT_ANCHOR,
                "Harness has no input anchor; emitted unchanged for every test case"
            );
        }
        if program.fallback {
            debug!("No program template for language; code and harness concatenated");
        }

        let sandbox = language.sandbox_name();
        let command = language.command(program.test_mode);

        let guard = match self.sandbox_locks.get(&sandbox) {
            Some(lock) if self.options.serialize_sandboxes => Some(lock.lock().await),
            _ => None,
        };

        engine::inject_program(self.runtime.as_ref(), language, &program.source)
            .await
            .map_err(|e| {
                error!(sandbox = %sandbox, error = %e, "Program injection failed");
                e
            })?;

        let raw = engine::run_command(
            self.runtime.as_ref(),
            &sandbox,
            &command,
            self.options.exec_timeout,
        )
        .await
        .map_err(|e| {
            error!(sandbox = %sandbox, command = %command, error = %e, "Execution failed");
            e
        })?;

        drop(guard);

        let graded = grading::grade(strategy, &raw.output, &test_cases);
        let is_accepted = types::is_accepted(&graded);

        info!(
            sandbox = %sandbox,
            strategy = %strategy,
            test_mode = program.test_mode,
            elapsed_ms = raw.elapsed.as_millis() as u64,
            memory_mb = raw.memory_mb,
            passed = graded.iter().filter(|tc| tc.is_true == Some(true)).count(),
            is_accepted,
            "Submission executed"
        );

        Ok(ExecutionResult {
            language_id: submission.language.clone(),
            code: submission.code.clone(),
            is_accepted,
            execution_time: raw.elapsed.as_secs_f64(),
            memory_usage: raw.memory_mb,
            test_cases: graded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRuntime;
    use gradebox_common::config::LanguageConfig;
    use gradebox_common::types::{TestCaseInput, Verdict};

    fn pipeline(runtime: Arc<FakeRuntime>, options: PipelineOptions) -> Pipeline {
        Pipeline::new(runtime, LanguageTable::builtin(), options)
    }

    fn add_submission() -> Submission {
        Submission {
            language: "python".to_string(),
            code: "def add(a,b): return a+b".to_string(),
            harness: "print(add(*map(int,input().split())))".to_string(),
            test_cases: vec![TestCaseInput {
                id: None,
                input: "2 3".to_string(),
                output: Some("5".to_string()),
            }],
        }
    }

    #[tokio::test]
    async fn test_unsupported_language_touches_no_sandbox() {
        let runtime = Arc::new(FakeRuntime::with_output("irrelevant"));
        let pipeline = pipeline(runtime.clone(), PipelineOptions::default());

        for language in ["cobol", "Python", ""] {
            let mut submission = add_submission();
            submission.language = language.to_string();

            let result = pipeline.execute(&submission).await;
            assert!(matches!(result, Err(SubmitError::UnsupportedLanguage(_))));
        }
        assert_eq!(runtime.calls(), 0);
    }

    #[tokio::test]
    async fn test_python_add_end_to_end() {
        let runtime = Arc::new(FakeRuntime::with_output("Test 1 passed\n"));
        let pipeline = pipeline(runtime.clone(), PipelineOptions::default());

        let result = pipeline.execute(&add_submission()).await.unwrap();

        assert!(result.is_accepted);
        assert_eq!(result.language_id, "python");
        assert_eq!(result.code, "def add(a,b): return a+b");
        assert_eq!(result.test_cases.len(), 1);
        assert_eq!(result.test_cases[0].id, 1);
        assert_eq!(result.test_cases[0].status, Verdict::Passed);

        let program = runtime.file("python-app", "/app/solution.py").unwrap();
        assert!(program.contains("print(add(*map(int,'2 3'.split())))"));
        assert!(program.contains("Test 1 passed"));

        let commands = runtime.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, "python-app");
        assert_eq!(
            commands[0].1,
            vec!["sh", "-c", "python3 /app/solution.py test"]
        );
    }

    #[tokio::test]
    async fn test_program_and_command_share_test_flag() {
        let runtime = Arc::new(FakeRuntime::with_output("Test 1 passed\n"));
        let mut python = LanguageConfig::new("python", "solution.py", "python3 /app/solution.py");
        python.test_flag = "--test".to_string();
        let languages = LanguageTable::from_configs(vec![python]).unwrap();
        let pipeline = Pipeline::new(runtime.clone(), languages, PipelineOptions::default());

        let result = pipeline.execute(&add_submission()).await.unwrap();
        assert!(result.is_accepted);

        let program = runtime.file("python-app", "/app/solution.py").unwrap();
        assert!(program.contains("sys.argv[1] == '--test':"));
        assert_eq!(
            runtime.commands()[0].1,
            vec!["sh", "-c", "python3 /app/solution.py --test"]
        );
    }

    #[tokio::test]
    async fn test_failure_marker_rejects_submission() {
        let runtime = Arc::new(FakeRuntime::with_output(
            "Test 1 passed\nTest 2 failed: expected 7, got 5\n",
        ));
        let pipeline = pipeline(runtime, PipelineOptions::default());

        let mut submission = add_submission();
        submission.test_cases.push(TestCaseInput {
            id: Some(9),
            input: "3 4".to_string(),
            output: Some("7".to_string()),
        });

        let result = pipeline.execute(&submission).await.unwrap();
        assert!(!result.is_accepted);
        assert_eq!(result.test_cases[1].id, 9);
        assert_eq!(result.test_cases[1].status, Verdict::Failed);
        assert_eq!(result.test_cases[1].output.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_without_test_cases_runs_plain_command() {
        let runtime = Arc::new(FakeRuntime::with_output("hello\n"));
        let pipeline = pipeline(runtime.clone(), PipelineOptions::default());

        let submission = Submission {
            language: "go".to_string(),
            code: "func greet() string { return \"hello\" }".to_string(),
            harness: "fmt.Println(greet())".to_string(),
            test_cases: vec![],
        };

        let result = pipeline.execute(&submission).await.unwrap();
        assert!(result.is_accepted);
        assert!(result.test_cases.is_empty());
        assert_eq!(
            runtime.commands()[0].1,
            vec!["sh", "-c", "go run /app/solution.go"]
        );
        assert!(runtime.file("go-app", "/app/solution.go").is_some());
    }

    #[tokio::test]
    async fn test_second_injection_overwrites_first() {
        let runtime = Arc::new(FakeRuntime::with_output(""));
        let pipeline = pipeline(runtime.clone(), PipelineOptions::default());

        let mut first = add_submission();
        first.code = "def add(a,b): return 'A'".to_string();
        let mut second = add_submission();
        second.code = "def add(a,b): return 'B'".to_string();

        pipeline.execute(&first).await.unwrap();
        pipeline.execute(&second).await.unwrap();

        let program = runtime.file("python-app", "/app/solution.py").unwrap();
        assert!(program.contains("return 'B'"));
        assert!(!program.contains("return 'A'"));
        assert_eq!(runtime.file_count(), 1);
    }

    #[tokio::test]
    async fn test_timing_and_memory_are_non_negative() {
        let runtime = Arc::new(FakeRuntime::slow("Test 1 passed\n", Duration::from_millis(20)));
        let pipeline = pipeline(runtime, PipelineOptions::default());

        let before = std::time::Instant::now();
        let result = pipeline.execute(&add_submission()).await.unwrap();
        let wall = before.elapsed().as_secs_f64();

        assert!(result.execution_time.is_finite());
        assert!(result.execution_time >= 0.02);
        assert!(result.execution_time <= wall);
        assert!(result.memory_usage >= 0.0);
    }

    #[tokio::test]
    async fn test_line_positional_strategy() {
        let runtime = Arc::new(FakeRuntime::with_output("4\n"));
        let options = PipelineOptions {
            strategy: GradingStrategy::Lines,
            ..Default::default()
        };
        let pipeline = pipeline(runtime.clone(), options);

        let submission = Submission {
            language: "python".to_string(),
            code: "def add(a,b): return a+b".to_string(),
            harness: "print(add(*map(int,input().split())))".to_string(),
            test_cases: vec![TestCaseInput {
                id: Some(1),
                input: "2 2".to_string(),
                output: Some("4".to_string()),
            }],
        };

        let result = pipeline.execute(&submission).await.unwrap();
        assert!(result.is_accepted);
        assert_eq!(result.test_cases[0].id, 1);
        assert_eq!(result.test_cases[0].output.as_deref(), Some("4"));
        assert_eq!(result.test_cases[0].is_true, Some(true));

        let program = runtime.file("python-app", "/app/solution.py").unwrap();
        assert!(!program.contains("passed"));
    }

    #[tokio::test]
    async fn test_timeout_is_an_execution_error() {
        let runtime = Arc::new(FakeRuntime::hanging());
        let options = PipelineOptions {
            exec_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let pipeline = pipeline(runtime, options);

        let result = pipeline.execute(&add_submission()).await;
        assert!(matches!(
            result,
            Err(SubmitError::Execution(ExecutionError::TimedOut(_)))
        ));
    }

    #[tokio::test]
    async fn test_copy_failure_skips_execution() {
        let runtime = Arc::new(FakeRuntime::failing_copy());
        let pipeline = pipeline(runtime.clone(), PipelineOptions::default());

        let result = pipeline.execute(&add_submission()).await;
        assert!(matches!(result, Err(SubmitError::Injection(InjectionError::Copy { .. }))));
        assert!(runtime.commands().is_empty());
    }

    #[tokio::test]
    async fn test_exec_create_failure() {
        let runtime = Arc::new(FakeRuntime::failing_create());
        let pipeline = pipeline(runtime, PipelineOptions::default());

        let result = pipeline.execute(&add_submission()).await;
        assert!(matches!(
            result,
            Err(SubmitError::Execution(ExecutionError::CreateSession { .. }))
        ));
    }

    #[tokio::test]
    async fn test_attach_failure() {
        let runtime = Arc::new(FakeRuntime::failing_attach());
        let pipeline = pipeline(runtime.clone(), PipelineOptions::default());

        let result = pipeline.execute(&add_submission()).await;
        assert!(matches!(
            result,
            Err(SubmitError::Execution(ExecutionError::Attach(_)))
        ));
        // Not retried
        assert_eq!(runtime.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_discards_partial_output() {
        let runtime = Arc::new(FakeRuntime::failing_read("Test 1 passed\nTest 2 passed\n"));
        let pipeline = pipeline(runtime.clone(), PipelineOptions::default());

        let result = pipeline.execute(&add_submission()).await;
        assert!(matches!(
            result,
            Err(SubmitError::Execution(ExecutionError::ReadOutput(_)))
        ));
        assert_eq!(runtime.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_serialized_sandbox_runs_one_at_a_time() {
        let runtime = Arc::new(FakeRuntime::slow("Test 1 passed\n", Duration::from_millis(30)));
        let pipeline = Arc::new(pipeline(runtime.clone(), PipelineOptions::default()));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { pipeline.execute(&add_submission()).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(runtime.max_concurrent_runs(), 1);
    }
}
