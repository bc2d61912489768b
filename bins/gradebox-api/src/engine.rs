/// Execution Engine - Sandbox File Injection and Command Execution
///
/// **Core Responsibility:**
/// Put an assembled program into a running sandbox and run it there,
/// capturing combined output, wall-clock time and a memory reading.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to talk to sandboxes (via `SandboxRuntime`)
/// - Engine does NOT assemble programs
/// - Engine does NOT grade output
///
/// **Sandbox Assumptions:**
/// Sandboxes are long-lived, one per language, already running with the
/// toolchain installed. The engine never creates, starts or removes them.
/// Every injection overwrites the previous program at the same path.
use crate::memory;
use async_trait::async_trait;
use bollard::container::UploadToContainerOptions;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::Docker;
use futures_util::stream::{BoxStream, StreamExt};
use gradebox_common::archive::{self, ArchiveError};
use gradebox_common::config::LanguageConfig;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("failed to build program archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("failed to copy program into sandbox '{sandbox}' at {path}: {message}")]
    Copy {
        sandbox: String,
        path: String,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to create exec in sandbox '{sandbox}': {message}")]
    CreateSession { sandbox: String, message: String },

    #[error("failed to attach to exec: {0}")]
    Attach(String),

    #[error("failed to read exec output: {0}")]
    ReadOutput(String),

    #[error("execution did not finish within {}ms", .0.as_millis())]
    TimedOut(Duration),
}

/// Combined stdout/stderr of one exec session
pub type OutputStream = BoxStream<'static, Result<Vec<u8>, ExecutionError>>;

/// The two primitives consumed from the container runtime
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Extract a tar archive into `target_dir` of a running sandbox
    async fn copy_archive(
        &self,
        sandbox: &str,
        target_dir: &str,
        archive: Vec<u8>,
    ) -> Result<(), InjectionError>;

    /// Create a one-shot exec session and return its id
    async fn create_exec(&self, sandbox: &str, cmd: Vec<String>) -> Result<String, ExecutionError>;

    /// Start an exec session attached to its combined output
    async fn attach_exec(&self, exec_id: &str) -> Result<OutputStream, ExecutionError>;
}

/// Docker-backed runtime using the local daemon
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn connect() -> anyhow::Result<Self> {
        use anyhow::Context;

        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker daemon")?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl SandboxRuntime for DockerRuntime {
    async fn copy_archive(
        &self,
        sandbox: &str,
        target_dir: &str,
        archive: Vec<u8>,
    ) -> Result<(), InjectionError> {
        let options = UploadToContainerOptions {
            path: target_dir.to_string(),
            ..Default::default()
        };

        self.docker
            .upload_to_container(sandbox, Some(options), archive.into())
            .await
            .map_err(|e| InjectionError::Copy {
                sandbox: sandbox.to_string(),
                path: target_dir.to_string(),
                message: e.to_string(),
            })
    }

    async fn create_exec(&self, sandbox: &str, cmd: Vec<String>) -> Result<String, ExecutionError> {
        let exec_config = CreateExecOptions {
            cmd: Some(cmd),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(sandbox, exec_config)
            .await
            .map_err(|e| ExecutionError::CreateSession {
                sandbox: sandbox.to_string(),
                message: e.to_string(),
            })?;

        Ok(exec.id)
    }

    async fn attach_exec(&self, exec_id: &str) -> Result<OutputStream, ExecutionError> {
        let start_config = StartExecOptions {
            detach: false,
            ..Default::default()
        };

        let started = self
            .docker
            .start_exec(exec_id, Some(start_config))
            .await
            .map_err(|e| ExecutionError::Attach(e.to_string()))?;

        match started {
            StartExecResults::Attached { output, .. } => Ok(output
                .map(|msg| {
                    msg.map(|log_output| log_output.into_bytes().to_vec())
                        .map_err(|e| ExecutionError::ReadOutput(e.to_string()))
                })
                .boxed()),
            StartExecResults::Detached => {
                Err(ExecutionError::Attach("exec started detached".to_string()))
            }
        }
    }
}

/// Raw result of one program run
#[derive(Debug, Clone)]
pub struct RawExecution {
    pub output: String,
    pub elapsed: Duration,
    /// Orchestrator RSS in MB, see [`memory::resident_memory_mb`]
    pub memory_mb: f64,
}

/// Pack `source` as the language's program file and copy it into its sandbox
pub async fn inject_program(
    runtime: &dyn SandboxRuntime,
    language: &LanguageConfig,
    source: &str,
) -> Result<(), InjectionError> {
    let archive = archive::pack(language.file_name(), source.as_bytes())?;
    let sandbox = language.sandbox_name();

    debug!(
        sandbox = %sandbox,
        path = %language.work_dir,
        file = language.file_name(),
        bytes = archive.len(),
        "Copying program archive"
    );

    runtime
        .copy_archive(&sandbox, &language.work_dir, archive)
        .await
}

/// Run `command` through `sh -c` inside `sandbox` and drain all output.
///
/// Timing starts right before the exec session is created and stops once the
/// output stream is exhausted. With `timeout == None` the drain blocks for as
/// long as the program runs. When a timeout fires the exec is abandoned, not
/// killed: the sandboxed process keeps running.
pub async fn run_command(
    runtime: &dyn SandboxRuntime,
    sandbox: &str,
    command: &str,
    timeout: Option<Duration>,
) -> Result<RawExecution, ExecutionError> {
    let cmd = vec!["sh".to_string(), "-c".to_string(), command.to_string()];

    let start_time = Instant::now();

    let drain = async {
        let exec_id = runtime.create_exec(sandbox, cmd).await?;
        let mut stream = runtime.attach_exec(&exec_id).await?;

        let mut output = Vec::new();
        while let Some(chunk) = stream.next().await {
            output.extend_from_slice(&chunk?);
        }
        Ok::<Vec<u8>, ExecutionError>(output)
    };

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, drain)
            .await
            .map_err(|_| ExecutionError::TimedOut(limit))??,
        None => drain.await?,
    };

    let elapsed = start_time.elapsed();
    let memory_mb = memory::resident_memory_mb();

    debug!(
        sandbox = %sandbox,
        elapsed_ms = elapsed.as_millis() as u64,
        output_bytes = output.len(),
        "Exec drained"
    );

    Ok(RawExecution {
        output: String::from_utf8_lossy(&output).into_owned(),
        elapsed,
        memory_mb,
    })
}
