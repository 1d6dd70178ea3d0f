use std::thread;

use anyhow::Result;
use tracing::{info, warn};

use crate::compositor::DisplayBackend;
use crate::error::ViewerError;
use crate::navigator::{LoopAction, Navigator};

/// One logical input, already translated from the raw devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(u8),
    /// The process was continued after a stop.
    Resume,
    /// A termination signal arrived.
    Terminate,
    End,
}

/// Blocking source of input events.
pub trait EventSource {
    fn next_event(&mut self) -> Result<InputEvent>;
}

/// Where the one-line status report goes.
pub trait StatusSink {
    fn show_status(&mut self, line: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    EndOfInput,
    Terminated,
}

/// Paints once, then handles events until quit, end of input or a
/// termination request. Only a failed document reopen or a display failure
/// ends the loop with an error.
pub fn run_session(
    navigator: &mut Navigator,
    events: &mut dyn EventSource,
    display: &mut dyn DisplayBackend,
    status: &mut dyn StatusSink,
) -> Result<ExitReason, ViewerError> {
    navigator.redraw(display)?;

    loop {
        let event = match events.next_event() {
            Ok(event) => event,
            Err(err) => {
                warn!(?err, "input read failed, ending session");
                return Ok(ExitReason::EndOfInput);
            }
        };

        let key = match event {
            InputEvent::Key(key) => key,
            InputEvent::End => return Ok(ExitReason::EndOfInput),
            InputEvent::Terminate => {
                info!("termination requested");
                return Ok(ExitReason::Terminated);
            }
            InputEvent::Resume => {
                display.reinit().map_err(|err| ViewerError::display(&err))?;
                navigator.redraw(display)?;
                continue;
            }
        };

        match navigator.handle_key(key)? {
            LoopAction::Continue => {}
            LoopAction::ContinueRedraw => navigator.redraw(display)?,
            LoopAction::ShowStatus => {
                if let Err(err) = status.show_status(&navigator.status_line()) {
                    warn!(?err, "failed to write status line");
                }
            }
            LoopAction::Sleep(duration) => thread::sleep(duration),
            LoopAction::Quit => return Ok(ExitReason::Quit),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;

    use anyhow::anyhow;

    use super::*;
    use crate::geometry::Extent;
    use crate::navigator::StartOptions;
    use crate::testing::{FakeProvider, RecordingDisplay};

    struct Script(VecDeque<Result<InputEvent>>);

    impl Script {
        fn keys(keys: &[u8]) -> Self {
            Self(keys.iter().map(|&k| Ok(InputEvent::Key(k))).collect())
        }

        fn then(mut self, event: Result<InputEvent>) -> Self {
            self.0.push_back(event);
            self
        }
    }

    impl EventSource for Script {
        fn next_event(&mut self) -> Result<InputEvent> {
            self.0.pop_front().unwrap_or(Ok(InputEvent::End))
        }
    }

    #[derive(Default)]
    struct Lines(Vec<String>);

    impl StatusSink for Lines {
        fn show_status(&mut self, line: &str) -> Result<()> {
            self.0.push(line.to_string());
            Ok(())
        }
    }

    fn setup(pages: usize) -> (Navigator, FakeProvider, RecordingDisplay) {
        let provider = FakeProvider::new(pages, 40, 20);
        let options = StartOptions {
            page: 1,
            zoom: 10,
            default_zoom: 10,
            rotation: 0,
            vertical_offset: 0,
        };
        let nav = Navigator::open(
            Box::new(provider.clone()),
            PathBuf::from("notes.pdf"),
            options,
            Extent::new(16, 16),
        )
        .unwrap();
        (nav, provider, RecordingDisplay::new(16, 16))
    }

    #[test]
    fn quit_ends_session_and_redraws_only_on_demand() {
        let (mut nav, _, mut display) = setup(5);
        let mut events = Script::keys(b"3xJq");
        let mut status = Lines::default();
        let exit = run_session(&mut nav, &mut events, &mut display, &mut status).unwrap();
        assert_eq!(exit, ExitReason::Quit);
        // initial paint and the page step; the digit and `x` do not repaint
        assert_eq!(display.presents, 2);
        assert_eq!(nav.current_page(), 4);
    }

    #[test]
    fn failed_page_step_does_not_repaint() {
        let (mut nav, _, mut display) = setup(2);
        let mut events = Script::keys(b"K");
        let exit = run_session(&mut nav, &mut events, &mut display, &mut Lines::default()).unwrap();
        assert_eq!(exit, ExitReason::EndOfInput);
        assert_eq!(display.presents, 1);
    }

    #[test]
    fn status_request_writes_line() {
        let (mut nav, _, mut display) = setup(3);
        let mut events = Script::keys(b"Ji");
        let mut status = Lines::default();
        run_session(&mut nav, &mut events, &mut display, &mut status).unwrap();
        assert_eq!(status.0.len(), 1);
        assert!(status.0[0].contains("page:2(3)"));
    }

    #[test]
    fn terminate_and_resume_events() {
        let (mut nav, _, mut display) = setup(3);
        let mut events = Script::keys(b"")
            .then(Ok(InputEvent::Resume))
            .then(Ok(InputEvent::Terminate))
            .then(Ok(InputEvent::Key(b'J')));
        let exit = run_session(&mut nav, &mut events, &mut display, &mut Lines::default()).unwrap();
        assert_eq!(exit, ExitReason::Terminated);
        assert_eq!(display.presents, 2);
        assert_eq!(nav.current_page(), 1);
    }

    #[test]
    fn read_error_is_end_of_input() {
        let (mut nav, _, mut display) = setup(3);
        let mut events = Script::keys(b"J").then(Err(anyhow!("device vanished")));
        let exit = run_session(&mut nav, &mut events, &mut display, &mut Lines::default()).unwrap();
        assert_eq!(exit, ExitReason::EndOfInput);
        assert_eq!(nav.current_page(), 2);
    }

    #[test]
    fn failed_reload_is_fatal() {
        let (mut nav, provider, mut display) = setup(3);
        provider.fail_open.set(true);
        let mut events = Script::keys(b"eJ");
        let result = run_session(&mut nav, &mut events, &mut display, &mut Lines::default());
        assert!(matches!(result, Err(ViewerError::Open { .. })));
    }
}
