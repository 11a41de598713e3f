// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use bytes::Bytes;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, Pid};
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;

use super::Backend;
use crate::event::ExitStatus;

/// Newtype wrapper around the PTY master fd for use with `AsyncFd`.
#[derive(Debug)]
struct MasterFd(OwnedFd);

impl AsRawFd for MasterFd {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.0.as_raw_fd()
    }
}

/// Shell child spawned on a fresh PTY via `forkpty`.
///
/// The child gets `TERM=xterm-256color` and `COLORTERM=truecolor` forced;
/// everything else in the environment (`LANG`, `LC_ALL`, ...) passes
/// through from the parent. An optional starting directory is applied
/// before exec.
pub struct ShellPty {
    master: AsyncFd<MasterFd>,
    child_pid: Pid,
}

impl ShellPty {
    // forkpty requires unsafe: post-fork child is partially initialized
    #[allow(unsafe_code)]
    pub fn spawn(shell: &str, cwd: Option<&Path>, cols: u16, rows: u16) -> anyhow::Result<Self> {
        let winsize = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // Resolve before the fork so a bad cwd fails the spawn, not the child.
        let start_dir: Option<PathBuf> = match cwd {
            Some(dir) => {
                if !dir.is_dir() {
                    bail!("starting directory {} does not exist", dir.display());
                }
                Some(dir.to_path_buf())
            }
            None => None,
        };

        // SAFETY: forkpty is unsafe because the child is in a
        // partially-initialized state after fork. We only touch env, cwd,
        // and exec.
        let result = unsafe { forkpty(&winsize, None) }.context("forkpty failed")?;

        match result {
            ForkptyResult::Child => {
                std::env::set_var("TERM", "xterm-256color");
                std::env::set_var("COLORTERM", "truecolor");
                if let Some(dir) = start_dir {
                    let _ = std::env::set_current_dir(&dir);
                }

                // On exec failure there is no parent to report to; exit
                // with the conventional not-found code.
                if let Ok(argv0) = CString::new(shell.as_bytes()) {
                    let _ = execvp(&argv0, &[argv0.clone()]);
                }
                std::process::exit(127);
            }
            ForkptyResult::Parent { child, master } => {
                set_nonblocking(&master)?;
                let afd = AsyncFd::new(MasterFd(master)).context("AsyncFd::new failed")?;
                Ok(Self { master: afd, child_pid: child })
            }
        }
    }
}

impl Backend for ShellPty {
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        mut input_rx: mpsc::Receiver<Bytes>,
        mut resize_rx: mpsc::Receiver<(u16, u16)>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<ExitStatus>> + Send + '_>>
    {
        let pid = self.child_pid;
        Box::pin(async move {
            let mut buf = vec![0u8; 8192];
            let mut input_closed = false;

            loop {
                tokio::select! {
                    result = read_chunk(&self.master, &mut buf) => {
                        match result {
                            Ok(0) => break,
                            Ok(n) => {
                                let data = Bytes::copy_from_slice(&buf[..n]);
                                if output_tx.send(data).await.is_err() {
                                    break;
                                }
                            }
                            // EIO from the master means the slave side is gone.
                            Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    input = input_rx.recv(), if !input_closed => {
                        match input {
                            Some(data) => write_all(&self.master, &data).await?,
                            None => input_closed = true,
                        }
                    }
                    size = resize_rx.recv() => {
                        if let Some((cols, rows)) = size {
                            let _ = apply_winsize(self.master.as_raw_fd(), cols, rows);
                        }
                    }
                }
            }

            // Reap on a blocking thread to keep the runtime free.
            let status = tokio::task::spawn_blocking(move || wait_for_exit(pid))
                .await
                .context("join wait thread")??;
            Ok(status)
        })
    }

    fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        apply_winsize(self.master.as_raw_fd(), cols, rows)
    }

    fn child_pid(&self) -> Option<u32> {
        Some(self.child_pid.as_raw() as u32)
    }
}

impl Drop for ShellPty {
    fn drop(&mut self) {
        // Best-effort shutdown: SIGHUP, brief grace, then SIGKILL.
        let _ = kill(self.child_pid, Signal::SIGHUP);
        std::thread::sleep(std::time::Duration::from_millis(50));
        let _ = kill(self.child_pid, Signal::SIGKILL);
        let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
    }
}

// TIOCSWINSZ ioctl requires unsafe for the libc::ioctl call
#[allow(unsafe_code)]
fn apply_winsize(fd: i32, cols: u16, rows: u16) -> anyhow::Result<()> {
    let ws = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };
    // SAFETY: TIOCSWINSZ sets the window size on the PTY master fd; the
    // Winsize struct is fully initialized. The ioctl also delivers
    // SIGWINCH to the child.
    let ret = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &ws) };
    if ret < 0 {
        bail!("TIOCSWINSZ ioctl failed: {}", io::Error::last_os_error());
    }
    Ok(())
}

fn set_nonblocking(fd: &OwnedFd) -> io::Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(io_err)?;
    let flags = OFlag::from_bits_truncate(flags);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK)).map_err(io_err)?;
    Ok(())
}

async fn read_chunk(afd: &AsyncFd<MasterFd>, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let mut guard = afd.readable().await?;
        match guard.try_io(|inner| nix::unistd::read(&inner.get_ref().0, buf).map_err(io_err)) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

async fn write_all(afd: &AsyncFd<MasterFd>, data: &[u8]) -> io::Result<()> {
    let mut offset = 0;
    while offset < data.len() {
        let mut guard = afd.writable().await?;
        match guard
            .try_io(|inner| nix::unistd::write(&inner.get_ref().0, &data[offset..]).map_err(io_err))
        {
            Ok(Ok(n)) => offset += n,
            Ok(Err(e)) => return Err(e),
            Err(_would_block) => continue,
        }
    }
    Ok(())
}

fn io_err(e: nix::errno::Errno) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}

/// Block until the child exits and convert to our `ExitStatus`.
fn wait_for_exit(pid: Pid) -> anyhow::Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                return Ok(ExitStatus { code: Some(code), signal: None });
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                return Ok(ExitStatus { code: None, signal: Some(sig as i32) });
            }
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => bail!("waitpid failed: {e}"),
        }
    }
}
