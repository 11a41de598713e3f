// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod spawn;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::event::ExitStatus;

/// Terminal backend abstraction over the PTY.
///
/// Object-safe for use as `Box<dyn Backend>`; the session loop owns the
/// running future while the handle side keeps `resize`/`child_pid`.
pub trait Backend: Send + 'static {
    /// Drive the backend: pump child output into `output_tx`, write bytes
    /// arriving on `input_rx`, apply window sizes from `resize_rx`.
    /// Resolves with the child's exit status.
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        input_rx: mpsc::Receiver<Bytes>,
        resize_rx: mpsc::Receiver<(u16, u16)>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ExitStatus>> + Send + '_>>;

    /// Set the terminal window size. Best-effort after child exit.
    fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()>;

    fn child_pid(&self) -> Option<u32>;
}
