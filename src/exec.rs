//! Bounded subprocess execution for gate tools and the Python introspector.
//!
//! Every child runs under a wall-clock timeout; when the sandbox is enabled
//! an address-space cap is applied before exec. Output is drained on
//! dedicated threads so a chatty child cannot deadlock on a full pipe.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Resource limits applied to one child process.
#[derive(Debug, Clone, Copy)]
pub struct ExecLimits {
    pub timeout: Duration,
    /// Address-space cap in MiB; `None` leaves the child unconfined.
    pub memory_mb: Option<u64>,
}

impl ExecLimits {
    pub fn timeout_only(timeout: Duration) -> Self {
        Self {
            timeout,
            memory_mb: None,
        }
    }
}

/// Outcome of a bounded subprocess run.
#[derive(Debug)]
pub struct ExecResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn apply_memory_cap(command: &mut Command, memory_mb: u64) {
    use std::os::unix::process::CommandExt;
    let bytes = memory_mb.saturating_mul(1024 * 1024);
    // SAFETY: the pre_exec closure runs in the forked child before exec and
    // only calls the async-signal-safe `setrlimit`; no allocation or locking
    // happens inside it.
    unsafe {
        command.pre_exec(move || {
            let limit = libc::rlimit {
                rlim_cur: bytes as libc::rlim_t,
                rlim_max: bytes as libc::rlim_t,
            };
            if libc::setrlimit(libc::RLIMIT_AS, &limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn apply_memory_cap(_command: &mut Command, _memory_mb: u64) {}

/// Run a command with optional stdin bytes under the given limits.
pub fn run_limited(
    program: &str,
    args: &[String],
    stdin_bytes: Option<&[u8]>,
    cwd: Option<&Path>,
    limits: ExecLimits,
) -> std::io::Result<ExecResult> {
    let mut command = Command::new(program);
    command.args(args);
    command.stdin(if stdin_bytes.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    if let Some(memory_mb) = limits.memory_mb {
        apply_memory_cap(&mut command, memory_mb);
    }

    let mut child = command.spawn()?;

    if let (Some(bytes), Some(mut stdin)) = (stdin_bytes, child.stdin.take()) {
        // A child that exits early closes the pipe; that is not an error.
        let _ = stdin.write_all(bytes);
    }

    let stdout_handle = child.stdout.take().map(spawn_reader);
    let stderr_handle = child.stderr.take().map(spawn_reader);

    let (exit_code, timed_out) = wait_with_timeout(&mut child, limits.timeout)?;

    let stdout = stdout_handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    let stderr = stderr_handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    Ok(ExecResult {
        stdout,
        stderr,
        exit_code,
        timed_out,
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = reader.read_to_end(&mut buffer);
        buffer
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<(Option<i32>, bool)> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status.code(), false));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok((None, true));
        }
        thread::sleep(Duration::from_millis(10));
    }
}
