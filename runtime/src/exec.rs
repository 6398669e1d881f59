//! Resource-limited subprocess execution.
//!
//! Runs the image tool with `RLIMIT_AS` / `RLIMIT_CPU` applied in the child
//! before exec, splits its standard output into logical lines (the tool
//! rewrites its progress line with `\r`), and classifies the way it exited.

use diskimg_core::error::{ImageError, Result};
use diskimg_core::limits::ProcessLimits;
use std::ffi::OsStr;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};

/// Diagnostics the tool prints when an allocation fails under `RLIMIT_AS`.
const OOM_MARKERS: [&str; 3] = ["Cannot allocate memory", "Out of memory", "out of memory"];

/// Splits a byte stream into lines terminated by `\n` or `\r`.
///
/// Empty lines are skipped. Bytes after the last terminator stay pending
/// until more input arrives; [`LineSplitter::finish`] hands them back so the
/// caller can decide what to do with an unterminated tail.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, calling `emit` once per completed line.
    pub fn feed(&mut self, chunk: &[u8], mut emit: impl FnMut(&str)) {
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.pending.is_empty() {
                    emit(&String::from_utf8_lossy(&self.pending));
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
            }
        }
    }

    /// Consume the splitter, returning the unterminated tail (possibly empty).
    pub fn finish(self) -> Vec<u8> {
        self.pending
    }
}

/// Run `binary` with `args`, returning its standard output.
///
/// `on_line` is called synchronously, in order, for every complete line of
/// standard output. A trailing line without a terminator is not passed to
/// `on_line` (it is still part of the returned output). Standard error is
/// drained on a helper thread and only surfaces in the `output` of a
/// failure, after whatever the tool wrote to standard output.
///
/// Fails when the process cannot be started, exits non-zero, or is killed;
/// a kill while limits are in force is reported as
/// [`ImageError::ResourceLimitExceeded`].
pub fn execute_with_limits<S: AsRef<OsStr>>(
    limits: Option<&ProcessLimits>,
    mut on_line: Option<&mut dyn FnMut(&str)>,
    binary: impl AsRef<OsStr>,
    args: &[S],
) -> Result<Vec<u8>> {
    let binary = binary.as_ref();
    let binary_name = binary.to_string_lossy().into_owned();
    let limits = limits.filter(|l| !l.is_unbounded()).copied();

    tracing::debug!(
        binary = %binary_name,
        args = ?args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>(),
        limits = ?limits,
        "Executing subprocess"
    );

    let mut cmd = Command::new(binary);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        if let Some(limits) = limits {
            // SAFETY: the hook only calls setrlimit, which is async-signal-safe,
            // and does not allocate.
            unsafe {
                cmd.pre_exec(move || apply_limits(&limits));
            }
        }
    }

    let mut child = cmd.spawn().map_err(|source| ImageError::Spawn {
        binary: binary_name.clone(),
        source,
    })?;

    let stderr_handle = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = stderr.read_to_end(&mut buffer);
            buffer
        })
    });

    let mut stdout_buf = Vec::new();
    if let Some(mut stdout) = child.stdout.take() {
        let mut splitter = LineSplitter::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = match stdout.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            };
            stdout_buf.extend_from_slice(&chunk[..n]);
            splitter.feed(&chunk[..n], |line| {
                if let Some(handler) = on_line.as_deref_mut() {
                    handler(line);
                }
            });
        }
        let tail = splitter.finish();
        if !tail.is_empty() {
            tracing::trace!(
                binary = %binary_name,
                tail = %String::from_utf8_lossy(&tail),
                "Discarding unterminated output line"
            );
        }
    }

    let status = child.wait()?;
    let stderr_buf = stderr_handle
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default();

    check_status(&binary_name, status, limits.as_ref(), stdout_buf, &stderr_buf)
}

/// Map an exit status onto success or the error taxonomy.
fn check_status(
    binary: &str,
    status: ExitStatus,
    limits: Option<&ProcessLimits>,
    stdout: Vec<u8>,
    stderr: &[u8],
) -> Result<Vec<u8>> {
    if !stderr.is_empty() {
        tracing::debug!(
            binary,
            stderr = %String::from_utf8_lossy(stderr).trim_end(),
            "Subprocess wrote to stderr"
        );
    }
    if status.success() {
        return Ok(stdout);
    }

    let mut output = stdout;
    output.extend_from_slice(stderr);
    let text = String::from_utf8_lossy(&output).trim_end().to_string();

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            if limits.is_some() && is_limit_signal(signal) {
                tracing::warn!(binary, signal, "Subprocess killed by resource limit");
                return Err(ImageError::ResourceLimitExceeded {
                    binary: binary.to_string(),
                    reason: format!("killed by signal {} ({})", signal, signal_name(signal)),
                    output: text,
                });
            }
            tracing::warn!(binary, signal, "Subprocess killed by signal");
            return Err(ImageError::SubprocessFailed {
                binary: binary.to_string(),
                status: format!("signal {}", signal),
                output: text,
            });
        }
    }

    let code = status.code().unwrap_or(-1);
    let address_space_limited = limits.is_some_and(|l| l.address_space_bytes > 0);
    if address_space_limited && OOM_MARKERS.iter().any(|m| text.contains(m)) {
        tracing::warn!(binary, code, "Subprocess ran out of address space");
        return Err(ImageError::ResourceLimitExceeded {
            binary: binary.to_string(),
            reason: "ran out of memory under the address-space limit".to_string(),
            output: text,
        });
    }

    tracing::warn!(binary, code, "Subprocess failed");
    Err(ImageError::SubprocessFailed {
        binary: binary.to_string(),
        status: format!("exit status {}", code),
        output: text,
    })
}

#[cfg(unix)]
fn is_limit_signal(signal: i32) -> bool {
    matches!(
        signal,
        libc::SIGXCPU | libc::SIGKILL | libc::SIGSEGV | libc::SIGABRT
    )
}

#[cfg(unix)]
fn signal_name(signal: i32) -> &'static str {
    match signal {
        libc::SIGXCPU => "CPU time limit",
        libc::SIGKILL => "killed",
        libc::SIGSEGV => "segmentation fault",
        libc::SIGABRT => "aborted",
        _ => "unknown",
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
type RlimitResource = libc::__rlimit_resource_t;

#[cfg(all(unix, not(all(target_os = "linux", target_env = "gnu"))))]
type RlimitResource = libc::c_int;

/// Runs in the forked child: no allocation, no locking.
#[cfg(unix)]
fn apply_limits(limits: &ProcessLimits) -> std::io::Result<()> {
    if limits.address_space_bytes > 0 {
        set_rlimit(
            libc::RLIMIT_AS,
            limits.address_space_bytes,
            limits.address_space_bytes,
        )?;
    }
    // soft = limit → SIGXCPU, hard = limit + 1 → SIGKILL
    if limits.cpu_time_secs > 0 {
        set_rlimit(
            libc::RLIMIT_CPU,
            limits.cpu_time_secs,
            limits.cpu_time_secs.saturating_add(1),
        )?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_rlimit(resource: RlimitResource, soft: u64, hard: u64) -> std::io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: soft as libc::rlim_t,
        rlim_max: hard as libc::rlim_t,
    };
    if unsafe { libc::setrlimit(resource, &limit) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
