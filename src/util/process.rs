//! Subprocess execution utilities.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

/// How often a bounded wait polls the child.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Error raised while running a subprocess.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` did not finish within {}s and was killed", .after.as_secs())]
    TimedOut { program: PathBuf, after: Duration },
}

impl ProcessError {
    /// Whether the program itself could not be found.
    pub fn is_not_found(&self) -> bool {
        match self {
            ProcessError::Spawn { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Stderr decoded lossily, trimmed.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// With `own_group`, the child leads a new process group so a timeout
    /// can kill everything it started.
    fn build_command(&self, own_group: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        #[cfg(unix)]
        if own_group {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        #[cfg(not(unix))]
        let _ = own_group;

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    /// Execute the command and wait for completion.
    pub fn exec(&self) -> Result<ProcessOutput, ProcessError> {
        self.exec_with_timeout(None)
    }

    /// Execute the command, killing it if it outlives `timeout`.
    ///
    /// Once spawned, the child is reaped on every path, timeouts included.
    pub fn exec_with_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ProcessError> {
        let mut child = self
            .build_command(timeout.is_some())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Drain both pipes concurrently so a chatty compiler cannot block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let waited = match timeout {
            Some(limit) => self.wait_bounded(&mut child, limit),
            None => child.wait().map_err(|source| ProcessError::Wait {
                program: self.program.clone(),
                source,
            }),
        };

        // The pipes close once every holder is gone. After a timeout that is
        // only certain when the whole group was killed; otherwise the readers
        // are left detached.
        let status = match waited {
            Ok(status) => status,
            Err(err) => {
                if cfg!(unix) && timeout.is_some() {
                    join(stdout);
                    join(stderr);
                }
                return Err(err);
            }
        };

        Ok(ProcessOutput {
            status,
            stdout: join(stdout),
            stderr: join(stderr),
        })
    }

    fn wait_bounded(&self, child: &mut Child, limit: Duration) -> Result<ExitStatus, ProcessError> {
        let deadline = Instant::now() + limit;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    tracing::warn!(
                        "`{}` exceeded {}s, killing it",
                        self.program.display(),
                        limit.as_secs()
                    );
                    terminate(child);
                    return Err(ProcessError::TimedOut {
                        program: self.program.clone(),
                        after: limit,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    terminate(child);
                    return Err(ProcessError::Wait {
                        program: self.program.clone(),
                        source,
                    });
                }
            }
        }
    }

    /// Display the command for logs and error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Kill `child` with its process group, then reap it.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Ok(pid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill(2) takes no pointers; a negative pid names the group
        // the child leads since it was spawned with `process_group(0)`.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Find an executable in PATH.
pub fn find_executable(name: impl AsRef<OsStr>) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find a C compiler.
pub fn find_c_compiler() -> Option<PathBuf> {
    // Check CC environment variable first
    if let Ok(cc) = std::env::var("CC") {
        if let Some(path) = find_executable(&cc) {
            return Some(path);
        }
    }

    for compiler in &["cc", "clang", "gcc"] {
        if let Some(path) = find_executable(compiler) {
            return Some(path);
        }
    }

    None
}
