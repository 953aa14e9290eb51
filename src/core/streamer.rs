//! Graph streamer
//!
//! Owns the process that prints the graph log, the parser thread reading
//! its output, and the teardown of both.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::parser::{parse_rows_streaming, CancelToken, ParseOptions, ParserControl, RowBatch};

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to spawn log command: {0}")]
    Spawn(#[source] io::Error),

    #[error("Log command failed: {0}")]
    Command(String),

    #[error("Failed to read log: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to wait for log command: {0}")]
    Wait(#[source] io::Error),

    #[error("Log command exited with {0}")]
    Exit(ExitStatus),

    #[error("Row stream is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// First thing seen on one of the child's output pipes
enum Peek {
    /// Stdout reader and whether it has data waiting
    Output(BufReader<ChildStdout>, io::Result<bool>),
    /// Everything the child wrote to stderr
    Error(String),
}

/// A live row stream backed by a byte source
pub struct GraphStreamer {
    control: Mutex<Option<SyncSender<ParserControl>>>,
    rows: Mutex<Receiver<RowBatch>>,
    child: Mutex<Option<Child>>,
    parser: Mutex<Option<JoinHandle<()>>>,
    cancel: CancelToken,
    closed: AtomicBool,
    exhausted: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GraphStreamer {
    /// Run `command` and stream its stdout.
    ///
    /// Fails with [`StreamError::Command`] when the process writes to stderr
    /// and exits before printing anything; a process that prints nothing at
    /// all yields an empty stream.
    pub fn spawn(mut command: Command, batch_size: usize, options: ParseOptions) -> Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        info!("Starting log command: {:?}", command);
        let mut child = command.spawn().map_err(StreamError::Spawn)?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(StreamError::Spawn(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "log command output was not captured",
                )));
            }
        };

        let (peek_tx, peek_rx) = mpsc::channel();
        let stdout_tx = peek_tx.clone();
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            let has_data = reader.fill_buf().map(|buf| !buf.is_empty());
            let _ = stdout_tx.send(Peek::Output(reader, has_data));
        });
        thread::spawn(move || {
            let mut text = String::new();
            if let Err(err) = BufReader::new(stderr).read_to_string(&mut text) {
                debug!("Stopped reading log command stderr: {}", err);
            }
            if !text.trim().is_empty() {
                warn!("Log command stderr: {}", text.trim());
            }
            let _ = peek_tx.send(Peek::Error(text));
        });

        let mut reader = None;
        let mut failure = None;
        while let Ok(peek) = peek_rx.recv() {
            match peek {
                Peek::Output(output, has_data) => {
                    let has_data = has_data.unwrap_or_else(|err| {
                        warn!("Failed to peek log command output: {}", err);
                        false
                    });
                    reader = Some(output);
                    if has_data {
                        break;
                    }
                }
                Peek::Error(text) if !text.trim().is_empty() => {
                    failure = Some(text.trim().to_string());
                    break;
                }
                Peek::Error(_) => {}
            }
        }

        let reader = match (reader, failure) {
            (Some(reader), None) => reader,
            (_, failure) => {
                if let Err(err) = reap(child, true) {
                    debug!("Ignoring teardown error of failed log command: {}", err);
                }
                return Err(StreamError::Command(
                    failure.unwrap_or_else(|| "no output".to_string()),
                ));
            }
        };

        Ok(Self::start(reader, Some(child), batch_size, options))
    }

    /// Stream rows from any byte source that has no process attached
    pub fn from_reader<R>(reader: R, batch_size: usize, options: ParseOptions) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::start(BufReader::new(reader), None, batch_size, options)
    }

    fn start<R>(reader: R, child: Option<Child>, batch_size: usize, options: ParseOptions) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let cancel = CancelToken::new();
        let (control, control_rx) = mpsc::sync_channel(0);
        let (rows, parser) =
            parse_rows_streaming(reader, control_rx, batch_size, options, cancel.clone());
        Self {
            control: Mutex::new(Some(control)),
            rows: Mutex::new(rows),
            child: Mutex::new(child),
            parser: Mutex::new(Some(parser)),
            cancel,
            closed: AtomicBool::new(false),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Ask the parser for its next batch and wait for it
    pub fn request_more(&self) -> Result<RowBatch> {
        let rows = lock(&self.rows);
        let control = lock(&self.control).clone().ok_or(StreamError::Closed)?;

        if control.send(ParserControl::RequestMore).is_err() {
            return self.finished();
        }
        drop(control);

        match rows.recv() {
            Ok(batch) => {
                if !batch.has_more {
                    self.exhausted.store(true, Ordering::SeqCst);
                }
                Ok(batch)
            }
            Err(_) => self.finished(),
        }
    }

    fn finished(&self) -> Result<RowBatch> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StreamError::Closed);
        }
        self.exhausted.store(true, Ordering::SeqCst);
        Ok(RowBatch::default())
    }

    /// Whether the source has been read to the end
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }

    /// Stop the parser and the process. Only the first call does anything.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(control) = lock(&self.control).take() {
            // Only lands if the parser is already waiting for us
            if control.try_send(ParserControl::Close).is_ok() {
                debug!("Sent close to row parser");
            }
        }
        self.cancel.cancel();

        let child = lock(&self.child).take();
        let had_child = child.is_some();
        let result = match child {
            Some(child) => reap(child, !self.is_exhausted()),
            None => Ok(()),
        };

        // Without a process to kill, the parser may still be blocked on its source
        if let Some(parser) = lock(&self.parser).take() {
            if had_child {
                if parser.join().is_err() {
                    warn!("Row parser thread panicked");
                }
            } else if !parser.is_finished() {
                debug!("Row parser still blocked on its source; detaching it");
            }
        }
        result
    }
}

impl Drop for GraphStreamer {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("Error while closing graph stream: {}", err);
        }
    }
}

/// How long a fully read process gets to exit on its own
const EXIT_POLLS: usize = 20;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Kill the process if it is still running and collect its exit status.
///
/// A failed exit is only reported when the output was fully read and the
/// process ended on its own.
fn reap(mut child: Child, interrupted: bool) -> Result<()> {
    let mut exited = child.try_wait();
    if !interrupted {
        for _ in 0..EXIT_POLLS {
            if !matches!(exited, Ok(None)) {
                break;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
            exited = child.try_wait();
        }
    }

    let killed = match exited {
        Ok(Some(_)) => false,
        Ok(None) => {
            if let Err(err) = child.kill() {
                if err.kind() != io::ErrorKind::InvalidInput {
                    warn!("Failed to kill log command: {}", err);
                }
            }
            true
        }
        Err(err) => {
            warn!("Failed to poll log command: {}", err);
            false
        }
    };

    let status = child.wait().map_err(StreamError::Wait)?;
    if status.success() || killed || interrupted {
        if !status.success() {
            debug!("Suppressed exit status of closed log command: {}", status);
        }
        return Ok(());
    }
    Err(StreamError::Exit(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    fn synthetic_log(n: usize) -> Vec<u8> {
        let mut log = String::new();
        for i in 0..n {
            let id: String = format!("{:04}", i)
                .chars()
                .map(|d| (b'k' + d.to_digit(10).unwrap_or(0) as u8) as char)
                .collect();
            log.push_str(&format!("○  kx{} user {:08x}\n│  row {}\n", id, 0x2000_0000 + i, i));
        }
        log.into_bytes()
    }

    #[test]
    fn test_request_more_pages_through_rows() {
        let streamer = GraphStreamer::from_reader(Cursor::new(synthetic_log(70)), 50, ParseOptions::default());

        let first = streamer.request_more().unwrap();
        assert_eq!(first.rows.len(), 51);
        assert!(first.has_more);
        assert!(!streamer.is_exhausted());

        let second = streamer.request_more().unwrap();
        assert_eq!(second.rows.len(), 19);
        assert!(!second.has_more);
        assert!(streamer.is_exhausted());
        assert_eq!(second.rows[0].index, 51);

        let after = streamer.request_more().unwrap();
        assert!(after.rows.is_empty());
        assert!(!after.has_more);
        streamer.close().unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let streamer = GraphStreamer::from_reader(Cursor::new(synthetic_log(70)), 10, ParseOptions::default());
        streamer.request_more().unwrap();
        streamer.close().unwrap();
        streamer.close().unwrap();
        assert!(matches!(streamer.request_more(), Err(StreamError::Closed)));
    }

    /// Reader that blocks until its sender goes away
    struct Stalled(std::sync::mpsc::Receiver<()>);

    impl std::io::Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn test_close_detaches_blocked_reader() {
        let (release, gate) = std::sync::mpsc::channel();
        let streamer = GraphStreamer::from_reader(Stalled(gate), 10, ParseOptions::default());
        let started = std::time::Instant::now();
        streamer.close().unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert!(matches!(streamer.request_more(), Err(StreamError::Closed)));
        drop(release);
    }

    #[test]
    fn test_close_from_several_threads() {
        let streamer = Arc::new(GraphStreamer::from_reader(
            Cursor::new(synthetic_log(200)),
            20,
            ParseOptions::default(),
        ));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let streamer = streamer.clone();
                thread::spawn(move || streamer.close())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert!(matches!(streamer.request_more(), Err(StreamError::Closed)));
    }

    #[cfg(unix)]
    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    #[cfg(unix)]
    fn test_spawn_streams_stdout() {
        let streamer = GraphStreamer::spawn(
            sh("printf '@  kzmyrxrn me 7f3a2b1c\\n│  hello\\n◆  zzzzzzzz root 00000000\\n'"),
            50,
            ParseOptions::default(),
        )
        .unwrap();
        let batch = streamer.request_more().unwrap();
        assert_eq!(batch.rows.len(), 2);
        assert!(!batch.has_more);
        assert_eq!(batch.rows[1].commit.change_id, "zzzzzzzz");
        streamer.close().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn test_spawn_reports_stderr() {
        let result = GraphStreamer::spawn(
            sh("echo 'Error: revset not found' >&2; exit 1"),
            50,
            ParseOptions::default(),
        );
        match result {
            Err(StreamError::Command(text)) => assert_eq!(text, "Error: revset not found"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected the command to fail"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_spawn_empty_result_is_not_an_error() {
        let streamer = GraphStreamer::spawn(sh("exit 0"), 50, ParseOptions::default()).unwrap();
        let batch = streamer.request_more().unwrap();
        assert!(batch.rows.is_empty());
        assert!(!batch.has_more);
        streamer.close().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn test_close_kills_running_process() {
        let streamer = GraphStreamer::spawn(
            sh("printf '@  kzmyrxrn me 7f3a2b1c\\n'; exec sleep 30"),
            50,
            ParseOptions::default(),
        )
        .unwrap();
        let started = std::time::Instant::now();
        streamer.close().unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[test]
    #[cfg(unix)]
    fn test_failed_exit_after_full_read_is_reported() {
        let streamer = GraphStreamer::spawn(
            sh("printf '@  kzmyrxrn me 7f3a2b1c\\n'; exit 3"),
            50,
            ParseOptions::default(),
        )
        .unwrap();
        let batch = streamer.request_more().unwrap();
        assert_eq!(batch.rows.len(), 1);
        assert!(!batch.has_more);
        assert!(matches!(streamer.close(), Err(StreamError::Exit(_))));
        assert!(streamer.close().is_ok());
    }

    #[test]
    fn test_spawn_missing_binary() {
        let result = GraphStreamer::spawn(
            Command::new("jjgraph-test-no-such-binary"),
            50,
            ParseOptions::default(),
        );
        assert!(matches!(result, Err(StreamError::Spawn(_))));
    }
}
