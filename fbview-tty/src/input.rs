use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::os::fd::{AsFd, AsRawFd};
use std::path::Path;

use anyhow::{Context, Result};
use fbview_core::{EventSource, InputEvent};
use tracing::{debug, info, warn};

use crate::signals;
use crate::terminal::Terminal;
use crate::touch::{decode_records, translate_touch, BATCH_EVENTS, EVENT_SIZE};

const KEY_BUFFER: usize = 32;

/// Keyboard bytes from the terminal multiplexed with an optional touch panel.
pub struct TtyInput {
    keyboard: File,
    touch: Option<File>,
    touch_midpoint: i32,
    pending: VecDeque<u8>,
    ended: bool,
    restore_terminal: bool,
}

impl TtyInput {
    /// Reads keys from stdin and, when it can be opened, touches from
    /// `touch_device`.
    pub fn stdin(touch_device: &Path, touch_midpoint: i32) -> Result<Self> {
        let keyboard = io::stdin()
            .as_fd()
            .try_clone_to_owned()
            .context("failed to duplicate stdin")?;
        let touch = match File::open(touch_device) {
            Ok(file) => {
                info!(device = %touch_device.display(), "touch input enabled");
                Some(file)
            }
            Err(err) => {
                debug!(?err, device = %touch_device.display(), "touch device unavailable");
                None
            }
        };
        let mut input = Self::new(File::from(keyboard), touch, touch_midpoint);
        input.restore_terminal = true;
        Ok(input)
    }

    pub fn new(keyboard: File, touch: Option<File>, touch_midpoint: i32) -> Self {
        Self {
            keyboard,
            touch,
            touch_midpoint,
            pending: VecDeque::new(),
            ended: false,
            restore_terminal: false,
        }
    }

    fn wait_readable(&self) -> Result<(bool, bool)> {
        let mut fds = vec![libc::pollfd {
            fd: self.keyboard.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        }];
        let touch_slot = self.touch.as_ref().map(|touch| {
            fds.push(libc::pollfd {
                fd: touch.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            });
            fds.len() - 1
        });
        let wake_slot = signals::wake_fd().map(|fd| {
            fds.push(libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            });
            fds.len() - 1
        });
        // SAFETY: `fds` is a live, correctly sized array of pollfd records.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let ready =
            |fd: &libc::pollfd| fd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0;
        if wake_slot.is_some_and(|slot| ready(&fds[slot])) {
            signals::drain_wakeups();
        }
        let keyboard = ready(&fds[0]);
        let touch = touch_slot.is_some_and(|slot| ready(&fds[slot]));
        Ok((keyboard, touch))
    }

    fn read_touch(&mut self) {
        let Some(device) = self.touch.as_mut() else {
            return;
        };
        let mut buf = vec![0u8; EVENT_SIZE * BATCH_EVENTS];
        match device.read(&mut buf) {
            Ok(0) => {
                warn!("touch device closed");
                self.touch = None;
            }
            Ok(len) => {
                let records = decode_records(&buf[..len]);
                if let Some(key) = translate_touch(&records, self.touch_midpoint) {
                    debug!(key = %char::from(key), "touch");
                    self.pending.push_back(key);
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(?err, "touch read failed, disabling touch input");
                self.touch = None;
            }
        }
    }

    fn read_keyboard(&mut self) -> Result<()> {
        let mut buf = [0u8; KEY_BUFFER];
        match self.keyboard.read(&mut buf) {
            Ok(0) => self.ended = true,
            Ok(len) => self.pending.extend(&buf[..len]),
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err).context("failed to read keyboard"),
        }
        Ok(())
    }
}

impl EventSource for TtyInput {
    fn next_event(&mut self) -> Result<InputEvent> {
        loop {
            if signals::take_terminate() {
                return Ok(InputEvent::Terminate);
            }
            if signals::take_resume() {
                if self.restore_terminal {
                    Terminal::resume()?;
                }
                return Ok(InputEvent::Resume);
            }
            if let Some(key) = self.pending.pop_front() {
                return Ok(InputEvent::Key(key));
            }
            if self.ended {
                return Ok(InputEvent::End);
            }

            let (keyboard, touch) = match self.wait_readable() {
                Ok(ready) => ready,
                Err(err) => match err.downcast_ref::<io::Error>() {
                    Some(io_err) if io_err.kind() == ErrorKind::Interrupted => continue,
                    _ => return Err(err.context("failed to wait for input")),
                },
            };
            if touch {
                self.read_touch();
            }
            if keyboard {
                self.read_keyboard()?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Seek, SeekFrom, Write};
    use std::os::fd::OwnedFd;
    use std::os::unix::net::UnixStream;
    use std::sync::{Mutex, MutexGuard};

    use super::*;
    use crate::touch::{encode_record, TouchRecord, ABS_Y, BTN_TOUCH, EV_ABS, EV_KEY};

    // signal flags are process-wide
    static SIGNALS: Mutex<()> = Mutex::new(());

    fn lock_signals() -> MutexGuard<'static, ()> {
        SIGNALS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn file_with(bytes: &[u8]) -> File {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file
    }

    #[test]
    fn keyboard_bytes_become_single_key_events() {
        let _guard = lock_signals();
        let mut input = TtyInput::new(file_with(b"12J"), None, 1056);
        assert_eq!(input.next_event().unwrap(), InputEvent::Key(b'1'));
        assert_eq!(input.next_event().unwrap(), InputEvent::Key(b'2'));
        assert_eq!(input.next_event().unwrap(), InputEvent::Key(b'J'));
        assert_eq!(input.next_event().unwrap(), InputEvent::End);
        assert_eq!(input.next_event().unwrap(), InputEvent::End);
    }

    #[test]
    fn touch_press_is_delivered_before_end_of_keyboard() {
        let _guard = lock_signals();
        let mut raw = encode_record(TouchRecord {
            kind: EV_KEY,
            code: BTN_TOUCH,
            value: 1,
        });
        raw.extend(encode_record(TouchRecord {
            kind: EV_ABS,
            code: ABS_Y,
            value: 1800,
        }));
        let mut input = TtyInput::new(file_with(b""), Some(file_with(&raw)), 1056);
        assert_eq!(input.next_event().unwrap(), InputEvent::Key(b'J'));
        assert_eq!(input.next_event().unwrap(), InputEvent::End);
    }

    #[test]
    fn signal_before_poll_wakes_idle_input() {
        let _guard = lock_signals();
        signals::install().unwrap();
        let (keyboard, _peer) = UnixStream::pair().unwrap();
        let mut input = TtyInput::new(File::from(OwnedFd::from(keyboard)), None, 1056);

        // the flag is already set when poll starts, so only the wakeup pipe
        // can end the wait
        signals::record_signal(libc::SIGTERM);
        assert_eq!(input.wait_readable().unwrap(), (false, false));
        assert_eq!(input.next_event().unwrap(), InputEvent::Terminate);

        signals::record_signal(libc::SIGCONT);
        assert_eq!(input.next_event().unwrap(), InputEvent::Resume);
        signals::drain_wakeups();
    }
}
