// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod boundary;
pub mod nbio;
pub mod spawn;

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::event::ExitStatus;

/// Input sent to the PTY backend: either raw bytes to write or a drain
/// synchronization point.
#[derive(Debug)]
pub enum BackendInput {
    /// Raw bytes to write to the PTY.
    Write(Bytes),
    /// Drain marker: since the backend processes messages sequentially,
    /// all prior writes are complete when this is received. The sender
    /// is notified via the oneshot channel.
    Drain(tokio::sync::oneshot::Sender<()>),
}

/// Terminal backend abstraction over a spawned agent process.
///
/// Object-safe for use as `Box<dyn Backend>` so the session runtime doesn't
/// need to know which concrete PTY implementation backs a given session.
pub trait Backend: Send + 'static {
    /// `signal_rx` carries signal requests through the same task that owns
    /// `&mut self`, since [`Backend::signal`] only needs `&self` but `run`
    /// borrows `self` exclusively for its whole lifetime — the channel
    /// avoids requiring interior mutability just to reach the child PID.
    ///
    /// `shutdown` is the session-wide cancellation token (spec §4.2 kill
    /// contract, §4.7). When it fires, `run` detaches from waiting on
    /// further PTY output and instead drives the child through SIGTERM,
    /// a grace window, and SIGKILL, always waiting for the exit status
    /// before returning.
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        input_rx: mpsc::Receiver<BackendInput>,
        resize_rx: mpsc::Receiver<(u16, u16)>,
        signal_rx: mpsc::Receiver<nix::sys::signal::Signal>,
        shutdown: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ExitStatus>> + Send + '_>>;

    fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()>;

    fn child_pid(&self) -> Option<u32>;

    /// Send a Unix signal to the child process group (spec §6 `signal` command).
    fn signal(&self, sig: nix::sys::signal::Signal) -> anyhow::Result<()>;
}

/// Conversion trait so both concrete backends and `Box<dyn Backend>` can be
/// passed to session construction without explicit boxing at the call site.
pub trait Boxed {
    fn boxed(self) -> Box<dyn Backend>;
}

impl<T: Backend> Boxed for T {
    fn boxed(self) -> Box<dyn Backend> {
        Box::new(self)
    }
}

impl Boxed for Box<dyn Backend> {
    fn boxed(self) -> Box<dyn Backend> {
        self
    }
}
