// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::ffi::CString;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use bytes::Bytes;
use nix::errno::Errno;
use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, setsid, ForkResult, Pid};
use tokio::io::unix::AsyncFd;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::boundary::BoundaryBuffer;
use super::nbio::{read_chunk, set_nonblocking, write_all, PtyFd};
use super::{Backend, BackendInput};
use crate::event::ExitStatus;

/// Environment variables never forwarded into a spawned login shell: they
/// redirect dynamic linking or shell startup to attacker-controlled code.
const TOXIC_ENV_VARS: &[&str] =
    &["LD_PRELOAD", "LD_LIBRARY_PATH", "DYLD_INSERT_LIBRARIES", "DYLD_LIBRARY_PATH", "BASH_ENV", "ENV", "PS4"];

/// Login shells tried, in order, when `$SHELL` is unset or fails to exec
/// (spec §4.2 step 2).
const FALLBACK_SHELLS: &[&str] = &["/bin/bash", "/bin/zsh", "/bin/sh"];

/// Native PTY backend that spawns a child process via `forkpty`.
///
/// Each session owns one `NativePty`; the child runs in its own session and
/// process group so signals sent by [`Backend::signal`] reach the whole
/// subtree (e.g. an agent that forks its own children).
pub struct NativePty {
    master: AsyncFd<PtyFd>,
    child_pid: Pid,
    cols: Arc<AtomicU16>,
    rows: Arc<AtomicU16>,
    kill_grace: Duration,
}

impl NativePty {
    /// Spawn a child process on a new PTY.
    ///
    /// `command` must have at least one element (the program to run). The
    /// child is launched through a login shell (`$SHELL -l -c 'exec ...'`,
    /// falling back through [`FALLBACK_SHELLS`] on `ENOENT`/`EACCES`/`EPERM`)
    /// so it inherits the same environment a user's interactive shell would
    /// build (spec §4.2 step 2); if no shell is usable `command` is exec'd
    /// directly. `cwd` sets the child's working directory; `env` is applied
    /// on top of `TERM`/`ATTN` (driver-specific variables, login-shell
    /// capture, hook socket paths — see [`capture_login_shell_env`]).
    /// `kill_grace` bounds the SIGTERM-to-SIGKILL window in [`Backend::run`].
    // forkpty requires unsafe: post-fork child is partially initialized.
    #[allow(unsafe_code)]
    pub fn spawn(
        command: &[String],
        cols: u16,
        rows: u16,
        cwd: &Path,
        env: &[(String, String)],
        kill_grace: Duration,
    ) -> anyhow::Result<Self> {
        let winsize = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // SAFETY: forkpty is unsafe because the child is in a
        // partially-initialized state after fork. We immediately exec.
        let result = unsafe { forkpty(&winsize, None) }.context("forkpty failed")?;
        let ForkptyResult { master, fork_result } = result;

        match fork_result {
            ForkResult::Child => {
                let _ = setsid();
                if std::env::set_current_dir(cwd).is_err() {
                    std::process::exit(127);
                }

                for key in TOXIC_ENV_VARS {
                    std::env::remove_var(key);
                }
                std::env::set_var("TERM", "xterm-256color");
                std::env::set_var("ATTN", "1");
                for (key, value) in env {
                    std::env::set_var(key, value);
                }

                exec_via_login_shell(command);
                std::process::exit(127);
            }
            ForkResult::Parent { child } => {
                set_nonblocking(&master)?;
                let afd = AsyncFd::new(PtyFd(master)).context("AsyncFd::new failed")?;
                Ok(Self {
                    master: afd,
                    child_pid: child,
                    cols: Arc::new(AtomicU16::new(cols)),
                    rows: Arc::new(AtomicU16::new(rows)),
                    kill_grace,
                })
            }
        }
    }
}

/// Try each login-shell candidate, falling through to the next on
/// `ENOENT`/`EACCES`/`EPERM`; as a last resort, exec `command` directly.
/// Only returns if every attempt fails to exec at all (the caller exits).
// execvp never returns on success; this only runs post-fork in the child.
#[allow(unsafe_code)]
fn exec_via_login_shell(command: &[String]) {
    let exec_line = build_exec_line(command);
    let flag_l = c"-l".to_owned();
    let flag_c = c"-c".to_owned();

    for shell in login_shell_candidates() {
        let (Ok(shell_c), Ok(line_c)) = (CString::new(shell.as_bytes()), CString::new(exec_line.as_bytes())) else {
            continue;
        };
        let args = [shell_c.clone(), flag_l.clone(), flag_c.clone(), line_c];
        match execvp(&shell_c, &args) {
            Ok(never) => match never {},
            Err(Errno::ENOENT) | Err(Errno::EACCES) | Err(Errno::EPERM) => continue,
            Err(_) => break,
        }
    }

    if let Ok(c_args) = command.iter().map(|s| CString::new(s.as_bytes())).collect::<Result<Vec<CString>, _>>() {
        if let Some(first) = c_args.first() {
            let _ = execvp(first, &c_args);
        }
    }
}

/// Candidate login shells: `$SHELL` first if set and non-empty, then
/// [`FALLBACK_SHELLS`], deduplicated.
fn login_shell_candidates() -> Vec<String> {
    let mut candidates = Vec::new();
    if let Ok(shell) = std::env::var("SHELL") {
        if !shell.is_empty() {
            candidates.push(shell);
        }
    }
    for fallback in FALLBACK_SHELLS {
        if !candidates.iter().any(|c| c == fallback) {
            candidates.push((*fallback).to_string());
        }
    }
    candidates
}

/// Single-quote a shell argument, escaping embedded single quotes.
fn quote_shell_arg(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('\'');
    for ch in arg.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Build the `exec <argv...>` line passed to a login shell's `-c`.
fn build_exec_line(command: &[String]) -> String {
    let mut line = String::from("exec");
    for arg in command {
        line.push(' ');
        line.push_str(&quote_shell_arg(arg));
    }
    line
}

/// Capture environment variables the way a real login shell would set them
/// (spec §4.2 step 1): run `$SHELL -l -c 'env -0'` for each
/// [`login_shell_candidates`] entry, bounded by `timeout`, and parse the
/// null-separated `KEY=VALUE` output. Falls back to an empty list if every
/// candidate fails or times out, so a missing or broken shell never blocks
/// session launch; failures are logged the way `SubprocessClassifier`
/// treats its own subprocess errors as non-fatal.
pub async fn capture_login_shell_env(timeout: Duration) -> Vec<(String, String)> {
    for shell in login_shell_candidates() {
        match tokio::time::timeout(timeout, run_env_dump(&shell)).await {
            Ok(Ok(vars)) => return filter_toxic(vars),
            Ok(Err(err)) => {
                tracing::debug!(shell = %shell, %err, "login shell env capture failed, trying next candidate");
            }
            Err(_) => {
                tracing::warn!(shell = %shell, "login shell env capture timed out");
            }
        }
    }
    Vec::new()
}

async fn run_env_dump(shell: &str) -> anyhow::Result<Vec<(String, String)>> {
    let output = Command::new(shell)
        .arg("-l")
        .arg("-c")
        .arg("env -0")
        .kill_on_drop(true)
        .output()
        .await
        .context("spawning login shell for env capture")?;
    if !output.status.success() {
        bail!("login shell env capture exited with {:?}", output.status.code());
    }
    Ok(parse_null_separated_env(&output.stdout))
}

fn parse_null_separated_env(bytes: &[u8]) -> Vec<(String, String)> {
    bytes
        .split(|&b| b == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let text = String::from_utf8_lossy(entry);
            let (key, value) = text.split_once('=')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn filter_toxic(vars: Vec<(String, String)>) -> Vec<(String, String)> {
    vars.into_iter().filter(|(key, _)| !TOXIC_ENV_VARS.contains(&key.as_str())).collect()
}

impl Backend for NativePty {
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        mut input_rx: mpsc::Receiver<BackendInput>,
        mut resize_rx: mpsc::Receiver<(u16, u16)>,
        mut signal_rx: mpsc::Receiver<Signal>,
        shutdown: CancellationToken,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<ExitStatus>> + Send + '_>>
    {
        let pid = self.child_pid;
        let kill_grace = self.kill_grace;
        Box::pin(async move {
            let mut buf = vec![0u8; 8192];
            let mut input_closed = false;
            let mut carryover = BoundaryBuffer::new();

            // Kill contract (spec §4.2): SIGTERM on shutdown, SIGKILL after
            // `kill_grace` if the child hasn't exited by then. `closing`
            // guards against re-arming the grace window on a second
            // cancellation signal; `escalated` guards against a second
            // SIGKILL once the deadline fires.
            let mut closing = false;
            let mut escalated = false;
            let mut grace_deadline = tokio::time::Instant::now();

            loop {
                tokio::select! {
                    result = read_chunk(&self.master, &mut buf) => {
                        match result {
                            Ok(0) => break,
                            Ok(n) => {
                                if let Some(data) = carryover.push(&buf[..n]) {
                                    if output_tx.send(data).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    input = input_rx.recv(), if !input_closed => {
                        match input {
                            Some(BackendInput::Write(data)) => {
                                write_all(&self.master, &data).await?;
                            }
                            Some(BackendInput::Drain(ack)) => {
                                let _ = ack.send(());
                            }
                            None => input_closed = true,
                        }
                    }
                    resize = resize_rx.recv() => {
                        if let Some((cols, rows)) = resize {
                            self.resize(cols, rows)?;
                        }
                    }
                    signal = signal_rx.recv() => {
                        if let Some(sig) = signal {
                            self.signal(sig)?;
                        }
                    }
                    _ = shutdown.cancelled(), if !closing => {
                        closing = true;
                        grace_deadline = tokio::time::Instant::now() + kill_grace;
                        let _ = self.signal(Signal::SIGTERM);
                    }
                    _ = tokio::time::sleep_until(grace_deadline), if closing && !escalated => {
                        escalated = true;
                        let _ = self.signal(Signal::SIGKILL);
                    }
                }
            }

            // EOF or shutdown: nothing more is coming to complete a held-back
            // sequence, so flush it as-is rather than dropping it.
            if let Some(tail) = carryover.take_remaining() {
                let _ = output_tx.send(tail).await;
            }

            let status = tokio::task::spawn_blocking(move || wait_for_exit(pid))
                .await
                .context("join wait thread")??;
            Ok(status)
        })
    }

    // TIOCSWINSZ ioctl requires unsafe for the libc::ioctl call.
    #[allow(unsafe_code)]
    fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        self.cols.store(cols, Ordering::Relaxed);
        self.rows.store(rows, Ordering::Relaxed);

        let ws = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // SAFETY: TIOCSWINSZ is a well-defined ioctl that sets the window
        // size on the PTY master fd. `ws` is fully initialized above.
        let ret = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if ret < 0 {
            bail!("TIOCSWINSZ ioctl failed: {}", std::io::Error::last_os_error());
        }

        Ok(())
    }

    fn child_pid(&self) -> Option<u32> {
        Some(self.child_pid.as_raw() as u32)
    }

    fn signal(&self, sig: Signal) -> anyhow::Result<()> {
        killpg(self.child_pid, sig).or_else(|_| kill(self.child_pid, sig))?;
        Ok(())
    }
}

impl Drop for NativePty {
    fn drop(&mut self) {
        // Best-effort graceful shutdown: SIGHUP then SIGKILL after a grace
        // window handled by the supervisor; this is the last-resort cleanup
        // if the session entry is dropped without an orderly shutdown.
        let _ = killpg(self.child_pid, Signal::SIGHUP);
        std::thread::sleep(std::time::Duration::from_millis(50));
        let _ = killpg(self.child_pid, Signal::SIGKILL);
        let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
    }
}

/// Block until the child exits and convert to our `ExitStatus`.
fn wait_for_exit(pid: Pid) -> anyhow::Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus { code: Some(code), signal: None }),
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                return Ok(ExitStatus { code: None, signal: Some(sig as i32) })
            }
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => bail!("waitpid failed: {e}"),
        }
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
