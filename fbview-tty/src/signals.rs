//! Process signal flags.
//!
//! Handlers only record that a signal arrived and write a byte to a
//! non-blocking wakeup pipe. The input source polls the pipe next to its
//! devices, so a signal landing just before `poll` still wakes it, and then
//! turns the flags into events on the normal control path.

use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use anyhow::{Context, Result};

static TERMINATE_REQUESTED: AtomicBool = AtomicBool::new(false);
static RESUME_REQUESTED: AtomicBool = AtomicBool::new(false);
static WAKE_READ: AtomicI32 = AtomicI32::new(-1);
static WAKE_WRITE: AtomicI32 = AtomicI32::new(-1);

pub(crate) extern "C" fn record_signal(signal: libc::c_int) {
    if signal == libc::SIGCONT {
        RESUME_REQUESTED.store(true, Ordering::SeqCst);
    } else {
        TERMINATE_REQUESTED.store(true, Ordering::SeqCst);
    }
    let fd = WAKE_WRITE.load(Ordering::SeqCst);
    if fd >= 0 {
        // SAFETY: write(2) is async-signal-safe. A full pipe already holds a
        // pending wakeup, so a failed write is ignored; errno is restored for
        // the interrupted code.
        unsafe {
            let errno = *libc::__errno_location();
            libc::write(fd, [1u8].as_ptr().cast(), 1);
            *libc::__errno_location() = errno;
        }
    }
}

/// Creates the wakeup pipe and installs handlers for SIGINT, SIGTERM and
/// SIGCONT. Calling it again is a no-op.
pub fn install() -> Result<()> {
    if WAKE_READ.load(Ordering::SeqCst) >= 0 {
        return Ok(());
    }
    let mut fds = [-1; 2];
    // SAFETY: `fds` has room for the two descriptors pipe2 returns.
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
    if rc != 0 {
        return Err(io::Error::last_os_error()).context("failed to create signal wakeup pipe");
    }
    WAKE_READ.store(fds[0], Ordering::SeqCst);
    WAKE_WRITE.store(fds[1], Ordering::SeqCst);

    for signal in [libc::SIGINT, libc::SIGTERM, libc::SIGCONT] {
        // SAFETY: the action is fully initialized before use and the handler
        // only touches atomics and write(2).
        let rc = unsafe {
            let mut action: libc::sigaction = mem::zeroed();
            action.sa_sigaction = record_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = 0;
            libc::sigaction(signal, &action, ptr::null_mut())
        };
        if rc != 0 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("failed to install handler for signal {signal}"));
        }
    }
    Ok(())
}

/// Read end of the wakeup pipe, once `install` has run.
pub fn wake_fd() -> Option<RawFd> {
    let fd = WAKE_READ.load(Ordering::SeqCst);
    (fd >= 0).then_some(fd)
}

/// Empties the wakeup pipe so the next `poll` blocks again.
pub fn drain_wakeups() {
    let Some(fd) = wake_fd() else {
        return;
    };
    let mut buf = [0u8; 64];
    loop {
        // SAFETY: `buf` is valid for `buf.len()` bytes; the pipe is non-blocking.
        let read = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if read <= 0 {
            break;
        }
    }
}

/// Returns and clears the pending termination request.
pub fn take_terminate() -> bool {
    TERMINATE_REQUESTED.swap(false, Ordering::SeqCst)
}

/// Returns and clears the pending resume request.
pub fn take_resume() -> bool {
    RESUME_REQUESTED.swap(false, Ordering::SeqCst)
}
