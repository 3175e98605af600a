//! Line-oriented terminal UI surface
//!
//! Commands are read from a helper thread so polling never blocks:
//! `write`/`w` and `interrupt`/`i` rebind a hotkey, `exit`/`quit`/`q`
//! (or end of input) closes the application.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::debug;

use super::{UiEvent, UiSurface};
use crate::broker::Action;
use crate::platform::CollaboratorError;

const BANNER: &str = "\
Retypes the clipboard as keystrokes.
Copy text to the clipboard, then press the write hotkey.
Commands: write | interrupt (rebind hotkey), exit";

/// Parse one console command
pub fn parse_command(line: &str) -> Option<UiEvent> {
    match line.trim().to_lowercase().as_str() {
        "w" | "write" => Some(UiEvent::Rebind(Action::Write)),
        "i" | "interrupt" => Some(UiEvent::Rebind(Action::Interrupt)),
        "q" | "quit" | "exit" | "stop" => Some(UiEvent::Close),
        _ => None,
    }
}

/// UI surface on stdin/stdout
pub struct ConsoleUi {
    lines: Receiver<String>,
    output: Box<dyn Write + Send>,
    closed: bool,
}

impl ConsoleUi {
    /// Read commands from stdin and print to stdout
    pub fn new() -> io::Result<Self> {
        Self::with_io(BufReader::new(io::stdin()), Box::new(io::stdout()))
    }

    pub fn with_io<R>(input: R, mut output: Box<dyn Write + Send>) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || {
                for line in input.lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                debug!("console input closed");
            })?;

        writeln!(output, "{}", BANNER)?;
        Ok(Self {
            lines: rx,
            output,
            closed: false,
        })
    }
}

impl UiSurface for ConsoleUi {
    fn poll_event(&mut self) -> Option<UiEvent> {
        loop {
            match self.lines.try_recv() {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_command(&line) {
                        Some(event) => return Some(event),
                        None => {
                            if let Err(e) =
                                writeln!(self.output, "unknown command: {}", line.trim())
                            {
                                debug!(error = %e, "failed to write to console");
                            }
                        }
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    if self.closed {
                        return None;
                    }
                    self.closed = true;
                    return Some(UiEvent::Close);
                }
            }
        }
    }

    fn show(&mut self, action: Action, value: &str) -> Result<(), CollaboratorError> {
        writeln!(self.output, "{:<10} {}", action.to_string(), value)
            .and_then(|()| self.output.flush())
            .map_err(|e| CollaboratorError::Ui(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    /// Accepts writes until `broken` is set
    #[derive(Clone, Default)]
    struct BrokenPipe {
        broken: Arc<AtomicBool>,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn next_event(ui: &mut ConsoleUi) -> Option<UiEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(event) = ui.poll_event() {
                return Some(event);
            }
            thread::sleep(Duration::from_millis(1));
        }
        None
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("w"), Some(UiEvent::Rebind(Action::Write)));
        assert_eq!(
            parse_command("  Interrupt "),
            Some(UiEvent::Rebind(Action::Interrupt))
        );
        assert_eq!(parse_command("quit"), Some(UiEvent::Close));
        assert_eq!(parse_command("dance"), None);
    }

    #[test]
    fn test_events_then_close_on_eof() {
        let out = SharedBuf::default();
        let input = Cursor::new("write\n\nbogus\ni\n");
        let mut ui = ConsoleUi::with_io(input, Box::new(out.clone())).unwrap();

        assert_eq!(next_event(&mut ui), Some(UiEvent::Rebind(Action::Write)));
        assert_eq!(next_event(&mut ui), Some(UiEvent::Rebind(Action::Interrupt)));
        assert_eq!(next_event(&mut ui), Some(UiEvent::Close));
        // Close is reported once
        assert_eq!(ui.poll_event(), None);

        assert!(out.text().contains("unknown command: bogus"));
    }

    #[test]
    fn test_show_prints_label() {
        let out = SharedBuf::default();
        let mut ui = ConsoleUi::with_io(Cursor::new(""), Box::new(out.clone())).unwrap();

        ui.show(Action::Write, "ctrl+alt+v").unwrap();
        assert!(out.text().lines().any(|line| line == "write      ctrl+alt+v"));
    }

    #[test]
    fn test_output_errors_do_not_stop_polling() {
        let out = BrokenPipe::default();
        let input = Cursor::new("bogus\nwrite\n");
        let mut ui = ConsoleUi::with_io(input, Box::new(out.clone())).unwrap();
        out.broken.store(true, Ordering::SeqCst);

        assert_eq!(next_event(&mut ui), Some(UiEvent::Rebind(Action::Write)));
        assert!(matches!(
            ui.show(Action::Write, "f9"),
            Err(CollaboratorError::Ui(_))
        ));
        assert_eq!(next_event(&mut ui), Some(UiEvent::Close));
    }
}
