//! Collector process runner.
//!
//! Launches one collector executable as
//! `<exe> <scenario_code> <num_objects> <object_size> <heap_size_mib>`,
//! waits for it with a hard timeout, and hands back its stdout. A process
//! that outlives the timeout is killed and reaped before returning.

use crate::error::SimulationError;
use crate::model::Algorithm;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

/// One collector invocation
#[derive(Debug, Clone)]
pub struct CollectorInvocation<'a> {
    pub algorithm: Algorithm,
    pub executable: &'a Path,
    pub scenario_code: u32,
    pub num_objects: u64,
    pub object_size: u64,
    pub heap_size_mib: u64,
}

impl CollectorInvocation<'_> {
    /// Positional arguments in the order the collectors read them.
    pub fn args(&self) -> [String; 4] {
        [
            self.scenario_code.to_string(),
            self.num_objects.to_string(),
            self.object_size.to_string(),
            self.heap_size_mib.to_string(),
        ]
    }
}

/// Runs collector executables with a fixed timeout. Never retries.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the collector and return its captured stdout.
    ///
    /// The exit code does not matter; whatever was printed goes to the
    /// parser. stderr is logged and dropped.
    pub async fn run(
        &self,
        invocation: &CollectorInvocation<'_>,
    ) -> Result<String, SimulationError> {
        let algorithm = invocation.algorithm;
        let executable = invocation.executable;

        if !tokio::fs::try_exists(executable).await.unwrap_or(false) {
            let err = SimulationError::ExecutableNotFound {
                algorithm,
                path: executable.to_path_buf(),
            };
            error!("{}", err);
            return Err(err);
        }

        let args = invocation.args();
        info!("Running {} simulator: {} {}", algorithm, executable.display(), args.join(" "));

        let exec_error = move |e: io::Error| SimulationError::ProcessExecutionError {
            algorithm,
            message: e.to_string(),
        };

        let start = Instant::now();
        let mut child = Command::new(executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("{} simulator failed to start: {}", algorithm, e);
                exec_error(e)
            })?;

        let mut stdout_task = spawn_drain(child.stdout.take());
        let mut stderr_task = spawn_drain(child.stderr.take());

        // The deadline covers both pipes reaching EOF, not just the exit.
        // A descendant holding stdout open keeps the pipe alive after the
        // collector itself has exited.
        let collected = tokio::time::timeout(self.timeout, async {
            let (status, stdout, stderr) =
                tokio::join!(child.wait(), &mut stdout_task, &mut stderr_task);
            Ok::<_, io::Error>((status?, drained(stdout)?, drained(stderr).unwrap_or_default()))
        })
        .await;

        let (status, stdout, stderr) = match collected {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!("{} simulator wait failed: {}", algorithm, e);
                stdout_task.abort();
                stderr_task.abort();
                return Err(exec_error(e));
            }
            Err(_) => {
                error!("{} simulator timeout after {:?}", algorithm, self.timeout);
                match child.try_wait() {
                    // Exited already, only its pipes were still open
                    Ok(Some(_)) => {}
                    // kill() also waits, so the child is reaped here
                    _ => {
                        if let Err(e) = child.kill().await {
                            warn!("Failed to kill {} simulator: {}", algorithm, e);
                        }
                    }
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(SimulationError::ProcessTimeout {
                    algorithm,
                    timeout: self.timeout,
                });
            }
        };

        if !status.success() {
            warn!("{} simulator exited with {}", algorithm, status);
        }
        debug!("{} stdout:\n{}", algorithm, stdout);
        if !stderr.is_empty() {
            debug!("{} stderr:\n{}", algorithm, stderr);
        }
        info!("{} simulator finished in {:?}", algorithm, start.elapsed());

        Ok(stdout)
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS))
    }
}

fn spawn_drain<R>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

fn drained(joined: Result<io::Result<Vec<u8>>, JoinError>) -> io::Result<String> {
    let bytes = joined.map_err(io::Error::other)??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Write an executable shell script into `dir`.
    #[cfg(unix)]
    pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn invocation(path: &Path) -> CollectorInvocation<'_> {
        CollectorInvocation {
            algorithm: Algorithm::ReferenceCounting,
            executable: path,
            scenario_code: 2,
            num_objects: 8,
            object_size: 64,
            heap_size_mib: 32,
        }
    }

    #[test]
    fn test_argument_order() {
        let path = PathBuf::from("/bin/true");
        assert_eq!(invocation(&path).args(), ["2", "8", "64", "32"]);
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let path = PathBuf::from("/definitely/not/here/rc_sim");
        let err = ProcessRunner::default().run(&invocation(&path)).await.unwrap_err();
        assert_eq!(
            err,
            SimulationError::ExecutableNotFound {
                algorithm: Algorithm::ReferenceCounting,
                path,
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout_and_args() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "echo_args.sh",
            "echo \"args:$1 $2 $3 $4\"\necho \"noise\" >&2\nexit 3",
        );

        let stdout = ProcessRunner::default().run(&invocation(&script)).await.unwrap();
        assert_eq!(stdout.trim(), "args:2 8 64 32");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "hang.sh", "exec sleep 30");

        let runner = ProcessRunner::new(Duration::from_millis(200));
        let start = Instant::now();
        let err = runner.run(&invocation(&script)).await.unwrap_err();

        assert!(matches!(err, SimulationError::ProcessTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_covers_inherited_stdout() {
        let dir = tempfile::tempdir().unwrap();
        // The collector exits at once but a background child keeps stdout open.
        let script = write_script(
            dir.path(),
            "detached.sh",
            "sleep 5 &\necho '[RC_STATS]'\nexit 0",
        );

        let runner = ProcessRunner::new(Duration::from_millis(500));
        let start = Instant::now();
        let err = runner.run(&invocation(&script)).await.unwrap_err();

        assert!(matches!(err, SimulationError::ProcessTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unlaunchable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_executable");
        std::fs::write(&path, "plain text").unwrap();

        let err = ProcessRunner::default().run(&invocation(&path)).await.unwrap_err();
        assert!(matches!(err, SimulationError::ProcessExecutionError { .. }));
    }
}
