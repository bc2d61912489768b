// In-memory sandbox runtime for pipeline and handler tests

use crate::engine::{ExecutionError, InjectionError, OutputStream, SandboxRuntime};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct FakeRuntime {
    /// (sandbox, full path) -> file content
    files: Mutex<HashMap<(String, String), String>>,
    commands: Mutex<Vec<(String, Vec<String>)>>,
    calls: AtomicUsize,
    output: String,
    hang: bool,
    fail_copy: bool,
    fail_create: bool,
    fail_attach: bool,
    fail_read: bool,
    run_delay: Option<Duration>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl FakeRuntime {
    pub fn with_output(output: &str) -> Self {
        Self {
            output: output.to_string(),
            ..Default::default()
        }
    }

    /// Exec output never ends
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn failing_copy() -> Self {
        Self {
            fail_copy: true,
            ..Default::default()
        }
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    pub fn failing_attach() -> Self {
        Self {
            fail_attach: true,
            ..Default::default()
        }
    }

    /// Yields the first chunk of `output`, then a read error
    pub fn failing_read(output: &str) -> Self {
        Self {
            output: output.to_string(),
            fail_read: true,
            ..Default::default()
        }
    }

    /// Each run takes `delay`; tracks how many runs overlap
    pub fn slow(output: &str, delay: Duration) -> Self {
        Self {
            output: output.to_string(),
            run_delay: Some(delay),
            ..Default::default()
        }
    }

    /// Number of runtime primitives invoked
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn file(&self, sandbox: &str, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(&(sandbox.to_string(), path.to_string()))
            .cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        self.commands.lock().unwrap().clone()
    }

    pub fn max_concurrent_runs(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SandboxRuntime for FakeRuntime {
    async fn copy_archive(
        &self,
        sandbox: &str,
        target_dir: &str,
        archive: Vec<u8>,
    ) -> Result<(), InjectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_copy {
            return Err(InjectionError::Copy {
                sandbox: sandbox.to_string(),
                path: target_dir.to_string(),
                message: "No such container".to_string(),
            });
        }

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let mut tar = tar::Archive::new(std::io::Cursor::new(archive));
        let mut files = self.files.lock().unwrap();
        for entry in tar.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            files.insert(
                (sandbox.to_string(), format!("{}{}", target_dir, name)),
                content,
            );
        }
        Ok(())
    }

    async fn create_exec(&self, sandbox: &str, cmd: Vec<String>) -> Result<String, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create {
            return Err(ExecutionError::CreateSession {
                sandbox: sandbox.to_string(),
                message: "container is not running".to_string(),
            });
        }

        let mut commands = self.commands.lock().unwrap();
        commands.push((sandbox.to_string(), cmd));
        Ok(format!("exec-{}", commands.len()))
    }

    async fn attach_exec(&self, _exec_id: &str) -> Result<OutputStream, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_attach {
            return Err(ExecutionError::Attach("exec session vanished".to_string()));
        }
        if self.hang {
            return Ok(stream::pending().boxed());
        }

        let mut chunks: Vec<Result<Vec<u8>, ExecutionError>> = self
            .output
            .split_inclusive('\n')
            .map(|chunk| Ok(chunk.as_bytes().to_vec()))
            .collect();
        if self.fail_read {
            let at = chunks.len().min(1);
            chunks.insert(
                at,
                Err(ExecutionError::ReadOutput("connection reset by peer".to_string())),
            );
        }

        let delay = self.run_delay;
        let active = self.active.clone();
        let finish = stream::once(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        });

        Ok(stream::iter(chunks).chain(finish).boxed())
    }
}
