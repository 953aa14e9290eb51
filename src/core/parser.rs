//! Row stream parser
//!
//! Turns the text of a graph log into rows and hands them to the UI in
//! batches, one batch per request.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::line::GraphRowLine;
use super::row::Row;
use super::segment::SegmentParser;

/// Messages the consumer sends to a streaming parser
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParserControl {
    /// Flush the buffered rows and keep reading
    RequestMore,
    /// Stop without flushing
    Close,
}

/// Rows handed from the parser to the consumer
#[derive(Debug, Default)]
pub struct RowBatch {
    pub rows: Vec<Row>,
    /// More rows may follow
    pub has_more: bool,
}

/// Markers the parser looks for in the log output
#[derive(Clone, Debug)]
pub struct ParseOptions {
    /// Rune that marks elided revisions in the gutter
    pub elision_marker: char,
    /// Token that marks a hidden revision on its header line
    pub hidden_marker: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            elision_marker: '~',
            hidden_marker: "hidden".to_string(),
        }
    }
}

/// Cancellation flag shared by a stream's owner and its parser thread
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Incremental line-to-row parser
pub struct RowParser {
    options: ParseOptions,
    segments: SegmentParser,
    current: Option<Row>,
    started: usize,
}

impl RowParser {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            segments: SegmentParser::new(),
            current: None,
            started: 0,
        }
    }

    /// Feed one raw line; returns the row it completed, if any
    pub fn push_line(&mut self, raw: &[u8]) -> Option<Row> {
        let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let mut line = GraphRowLine::new(self.segments.parse(raw));

        if let Some(prefixes) = line.parse_row_prefixes(&self.options.hidden_marker) {
            let index = self.started;
            self.started += 1;
            let row = Row::new(line, prefixes, index, index.checked_sub(1));
            return self.current.replace(row);
        }

        match self.current.as_mut() {
            Some(row) => row.add_line(line, self.options.elision_marker),
            None => warn!("skipping line before first revision: {:?}", line.text()),
        }
        None
    }

    /// Close the open row at end of input
    pub fn finish(&mut self) -> Option<Row> {
        self.current.take()
    }
}

/// Parse a whole log at once
pub fn parse_rows<R: BufRead>(reader: R, options: ParseOptions) -> io::Result<Vec<Row>> {
    let mut parser = RowParser::new(options);
    let mut rows = Vec::new();
    for line in reader.split(b'\n') {
        rows.extend(parser.push_line(&line?));
    }
    rows.extend(parser.finish());
    Ok(rows)
}

/// Parse a log on a background thread, releasing rows on demand.
///
/// The parser buffers rows until it holds more than `batch_size`, then
/// waits on `control`. The returned receiver yields one [`RowBatch`] per
/// [`ParserControl::RequestMore`].
pub fn parse_rows_streaming<R>(
    reader: R,
    control: Receiver<ParserControl>,
    batch_size: usize,
    options: ParseOptions,
    cancel: CancelToken,
) -> (Receiver<RowBatch>, JoinHandle<()>)
where
    R: BufRead + Send + 'static,
{
    let (output, rows) = mpsc::sync_channel(1);
    let parser = StreamParser {
        reader,
        control,
        output,
        batch_size,
        rows: RowParser::new(options),
        buffer: Vec::new(),
        cancel,
    };
    let handle = thread::spawn(move || parser.run());
    (rows, handle)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParserState {
    Running,
    AwaitingControl { has_more: bool },
    Closed,
}

struct StreamParser<R> {
    reader: R,
    control: Receiver<ParserControl>,
    output: SyncSender<RowBatch>,
    batch_size: usize,
    rows: RowParser,
    buffer: Vec<Row>,
    cancel: CancelToken,
}

impl<R: BufRead> StreamParser<R> {
    fn run(mut self) {
        let mut line = Vec::with_capacity(256);
        let mut state = ParserState::Running;
        loop {
            state = match state {
                ParserState::Running => self.step(&mut line),
                ParserState::AwaitingControl { has_more } => self.await_control(has_more),
                ParserState::Closed => break,
            };
        }
        debug!("row parser finished");
    }

    fn step(&mut self, line: &mut Vec<u8>) -> ParserState {
        if self.cancel.is_cancelled() {
            return ParserState::Closed;
        }
        let at_end = match self.reader.fill_buf() {
            Ok(buf) => buf.is_empty(),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => return ParserState::Running,
            Err(err) => {
                warn!("failed to read log output: {}", err);
                true
            }
        };
        if at_end {
            return self.end_of_input();
        }

        if self.buffer.len() > self.batch_size {
            return ParserState::AwaitingControl { has_more: true };
        }

        line.clear();
        if let Err(err) = self.reader.read_until(b'\n', line) {
            warn!("failed to read log output: {}", err);
            return self.end_of_input();
        }
        self.buffer.extend(self.rows.push_line(line.as_slice()));
        ParserState::Running
    }

    fn end_of_input(&mut self) -> ParserState {
        self.buffer.extend(self.rows.finish());
        if self.buffer.is_empty() {
            self.await_shutdown();
            return ParserState::Closed;
        }
        ParserState::AwaitingControl { has_more: false }
    }

    fn await_control(&mut self, has_more: bool) -> ParserState {
        match self.control.recv() {
            Ok(ParserControl::RequestMore) if !self.cancel.is_cancelled() => {
                let rows = std::mem::take(&mut self.buffer);
                debug!("sending {} rows (has_more={})", rows.len(), has_more);
                if self.output.send(RowBatch { rows, has_more }).is_err() {
                    return ParserState::Closed;
                }
                if has_more {
                    ParserState::Running
                } else {
                    self.await_shutdown();
                    ParserState::Closed
                }
            }
            _ => ParserState::Closed,
        }
    }

    /// Hold the output channel open until the consumer says goodbye
    fn await_shutdown(&self) {
        let _ = self.control.recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::line::LineFlags;
    use std::io::Cursor;

    fn change_id(i: usize) -> String {
        let letters: Vec<char> = ('k'..='z').collect();
        let mut n = i;
        let mut id = String::new();
        for _ in 0..8 {
            id.push(letters[n % letters.len()]);
            n /= letters.len();
        }
        id
    }

    fn synthetic_log(n: usize, description_lines: usize) -> String {
        let mut log = String::new();
        for i in 0..n {
            log.push_str(&format!(
                "○  \x1b[1;35m{}\x1b[0m user 2024-01-01 \x1b[34m{:08x}\x1b[0m\n",
                change_id(i),
                0x1000_0000 + i
            ));
            for d in 0..description_lines {
                log.push_str(&format!("│  description {} of row {}\n", d, i));
            }
        }
        log
    }

    fn stream(log: String, batch_size: usize) -> (SyncSender<ParserControl>, Receiver<RowBatch>, JoinHandle<()>) {
        let (control_tx, control_rx) = mpsc::sync_channel(0);
        let (rows, handle) = parse_rows_streaming(
            Cursor::new(log.into_bytes()),
            control_rx,
            batch_size,
            ParseOptions::default(),
            CancelToken::new(),
        );
        (control_tx, rows, handle)
    }

    fn request(control: &SyncSender<ParserControl>, rows: &Receiver<RowBatch>) -> Option<RowBatch> {
        control.send(ParserControl::RequestMore).ok()?;
        rows.recv().ok()
    }

    #[test]
    fn test_batches_cover_all_rows_in_order() {
        let (control, rows, handle) = stream(synthetic_log(70, 0), 50);

        let first = request(&control, &rows).unwrap();
        assert_eq!(first.rows.len(), 51);
        assert!(first.has_more);

        let second = request(&control, &rows).unwrap();
        assert_eq!(second.rows.len(), 19);
        assert!(!second.has_more);

        let all: Vec<Row> = first.rows.into_iter().chain(second.rows).collect();
        for (i, row) in all.iter().enumerate() {
            assert_eq!(row.index, i);
            assert_eq!(row.commit.change_id, change_id(i));
        }

        control.send(ParserControl::Close).unwrap();
        assert!(rows.recv().is_err());
        handle.join().unwrap();
    }

    #[test]
    fn test_multi_line_rows_batch_by_row_count() {
        let (control, rows, handle) = stream(synthetic_log(10, 2), 4);

        let mut received = Vec::new();
        loop {
            let batch = request(&control, &rows).unwrap();
            assert!(batch.rows.iter().all(|r| r.lines.len() == 3));
            received.extend(batch.rows);
            if !batch.has_more {
                break;
            }
        }
        assert_eq!(received.len(), 10);
        drop(control);
        handle.join().unwrap();
    }

    #[test]
    fn test_close_before_any_request() {
        let (control, rows, handle) = stream(synthetic_log(70, 0), 50);
        control.send(ParserControl::Close).unwrap();
        assert!(rows.recv().is_err());
        handle.join().unwrap();
    }

    #[test]
    fn test_dropped_control_channel_stops_parser() {
        let (control, rows, handle) = stream(synthetic_log(5, 1), 50);
        drop(control);
        assert!(rows.recv().is_err());
        handle.join().unwrap();
    }

    #[test]
    fn test_cancelled_parser_sends_nothing() {
        let (control_tx, control_rx) = mpsc::sync_channel(0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let (rows, handle) = parse_rows_streaming(
            Cursor::new(synthetic_log(3, 0).into_bytes()),
            control_rx,
            50,
            ParseOptions::default(),
            cancel,
        );
        assert!(rows.recv().is_err());
        assert!(control_tx.send(ParserControl::RequestMore).is_err());
        handle.join().unwrap();
    }

    #[test]
    fn test_empty_input_yields_no_batch() {
        let (control, rows, handle) = stream(String::new(), 50);
        assert!(request(&control, &rows).is_none());
        handle.join().unwrap();
    }

    #[test]
    fn test_parse_rows_links_previous() {
        let rows = parse_rows(Cursor::new(synthetic_log(3, 1)), ParseOptions::default()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].previous, None);
        assert_eq!(rows[2].previous, Some(1));
        assert_eq!(rows[1].lines[1].flags, LineFlags::HIGHLIGHTABLE);
    }

    #[test]
    fn test_lines_before_first_revision_are_skipped() {
        let log = format!("warning: stale working copy\n{}", synthetic_log(2, 0));
        let rows = parse_rows(Cursor::new(log), ParseOptions::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].lines.len(), 1);
    }

    #[test]
    fn test_crlf_and_style_across_lines() {
        let log = "@  kzmyrxrn me 7f3a2b1c\r\n│  \x1b[33mstyled\n│  still\x1b[0m\r\n";
        let rows = parse_rows(Cursor::new(log), ParseOptions::default()).unwrap();
        let row = &rows[0];
        assert_eq!(row.lines.len(), 3);
        assert_eq!(row.lines[0].text(), "@  kzmyrxrn me 7f3a2b1c");
        assert_eq!(row.lines[2].segments[0].params, vec![33]);
    }

    #[test]
    fn test_description_with_hash_stays_in_row() {
        let log = "@  \x1b[1;35mkzmyrxrn\x1b[0m me \x1b[34m7f3a2b1c\x1b[0m\n\
                   │  \x1b[37mRevert 1a2b3c4d because it broke CI\x1b[0m\n\
                   ◆  \x1b[1;35mzzzzzzzz\x1b[0m root() \x1b[34m00000000\x1b[0m\n";
        let rows = parse_rows(Cursor::new(log), ParseOptions::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].commit.change_id, "kzmyrxrn");
        assert_eq!(rows[0].lines.len(), 2);
        assert_eq!(rows[0].lines[1].flags, LineFlags::HIGHLIGHTABLE);
        assert_eq!(rows[0].description_lines(), vec![1]);
        assert_eq!(rows[1].commit.change_id, "zzzzzzzz");
    }
}
