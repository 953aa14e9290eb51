//! Revisions view state
//!
//! The rows loaded so far, the cursor over them, and what the user did with
//! them (marks, the details panel). Rows are pulled from the stream lazily as
//! the cursor or the window approaches the end of what is loaded.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, info, warn};

use crate::config::Color;
use crate::core::{parse_rows, GraphStreamer, ParseOptions, Row, StreamError};
use crate::ui::{Decoration, DecoratorStack, RenderPos, RowContext, RowDecorator, Status};

/// Where the graph text comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Program and arguments printing the graph
    Command(Vec<String>),
    /// A saved log, read at once
    File(PathBuf),
    /// Standard input, read once
    Stdin,
}

impl Source {
    fn describe(&self) -> String {
        match self {
            Source::Command(argv) => argv.join(" "),
            Source::File(path) => path.display().to_string(),
            Source::Stdin => "stdin".to_string(),
        }
    }
}

/// Which identifier to copy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdKind {
    Change,
    Commit,
}

pub struct Revisions {
    source: Source,
    batch_size: usize,
    options: ParseOptions,
    rows: Vec<Row>,
    cursor: usize,
    stream: Option<GraphStreamer>,
    has_more: bool,
    /// Change ids of marked rows
    marks: HashSet<String>,
    /// Change id of the row showing details
    details: Option<String>,
    /// Whether stdin was already consumed
    stdin_read: bool,
}

impl Revisions {
    /// Open `source` and load the first batch
    pub fn open(source: Source, batch_size: usize, options: ParseOptions) -> Result<Self, StreamError> {
        let mut revisions = Self {
            source,
            batch_size,
            options,
            rows: Vec::new(),
            cursor: 0,
            stream: None,
            has_more: false,
            marks: HashSet::new(),
            details: None,
            stdin_read: false,
        };
        revisions.reload()?;
        Ok(revisions)
    }

    fn reload(&mut self) -> Result<(), StreamError> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.close() {
                warn!("Error closing previous stream: {}", e);
            }
        }
        self.rows.clear();
        self.has_more = false;

        info!("Loading revisions from {}", self.source.describe());
        match &self.source {
            Source::Command(argv) => {
                let (program, args) = argv
                    .split_first()
                    .ok_or_else(|| StreamError::Command("empty log command".to_string()))?;
                let mut command = Command::new(program);
                command.args(args);
                self.stream = Some(GraphStreamer::spawn(command, self.batch_size, self.options.clone())?);
                self.has_more = true;
            }
            Source::File(path) => {
                let file = File::open(path).map_err(StreamError::Read)?;
                self.rows = parse_rows(BufReader::new(file), self.options.clone()).map_err(StreamError::Read)?;
            }
            Source::Stdin => {
                self.stdin_read = true;
                self.stream = Some(GraphStreamer::from_reader(
                    io::stdin(),
                    self.batch_size,
                    self.options.clone(),
                ));
                self.has_more = true;
            }
        }
        self.load_more()?;
        Ok(())
    }

    /// Pull the next batch from the stream; returns the number of new rows
    pub fn load_more(&mut self) -> Result<usize, StreamError> {
        if !self.has_more {
            return Ok(0);
        }
        let Some(stream) = self.stream.as_ref() else {
            self.has_more = false;
            return Ok(0);
        };

        let batch = stream.request_more()?;
        let count = batch.rows.len();
        self.rows.extend(batch.rows);
        self.has_more = batch.has_more;
        debug!("Loaded {} rows ({} total, more: {})", count, self.rows.len(), self.has_more);

        if !self.has_more {
            if let Some(stream) = self.stream.take() {
                stream.close()?;
            }
        }
        Ok(count)
    }

    /// Load more rows once the window has shown the last loaded one
    pub fn ensure_loaded(&mut self, last_row_index: usize) -> Result<(), StreamError> {
        if self.has_more && last_row_index + 1 >= self.rows.len() {
            self.load_more()?;
        }
        Ok(())
    }

    /// Re-run the source, keeping the cursor on the same change if it survives
    pub fn refresh(&mut self) -> Result<(), StreamError> {
        if !self.can_refresh() {
            return Ok(());
        }
        let selected = self.selected().map(|row| row.commit.change_id.clone());
        let previous_cursor = self.cursor;
        self.reload()?;

        let mut found = None;
        if let Some(change_id) = selected {
            loop {
                found = self.rows.iter().position(|r| r.commit.change_id == change_id);
                if found.is_some() || !self.has_more {
                    break;
                }
                if self.load_more()? == 0 && !self.has_more {
                    break;
                }
            }
        }
        self.cursor = found.unwrap_or(previous_cursor).min(self.rows.len().saturating_sub(1));

        let live: HashSet<&str> = self.rows.iter().map(|r| r.commit.change_id.as_str()).collect();
        if self.has_more {
            // Unloaded rows may still carry marks
            return Ok(());
        }
        self.marks.retain(|id| live.contains(id.as_str()));
        Ok(())
    }

    /// Stdin can only be read once
    pub fn can_refresh(&self) -> bool {
        !(self.source == Source::Stdin && self.stdin_read)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn selected(&self) -> Option<&Row> {
        self.rows.get(self.cursor)
    }

    /// Move the cursor, loading rows when moving past the loaded ones
    pub fn move_by(&mut self, delta: isize) -> Result<(), StreamError> {
        if delta >= 0 {
            let target = self.cursor.saturating_add(delta as usize);
            while target >= self.rows.len() && self.has_more {
                self.load_more()?;
            }
            self.cursor = target.min(self.rows.len().saturating_sub(1));
        } else {
            self.cursor = self.cursor.saturating_sub(delta.unsigned_abs());
        }
        Ok(())
    }

    pub fn top(&mut self) {
        self.cursor = 0;
    }

    /// Load everything and select the last row
    pub fn bottom(&mut self) -> Result<(), StreamError> {
        while self.has_more {
            self.load_more()?;
        }
        self.cursor = self.rows.len().saturating_sub(1);
        Ok(())
    }

    pub fn toggle_mark(&mut self) {
        let Some(change_id) = self.selected().map(|r| r.commit.change_id.clone()) else {
            return;
        };
        if !self.marks.remove(&change_id) {
            self.marks.insert(change_id);
        }
    }

    pub fn marked_count(&self) -> usize {
        self.marks.len()
    }

    pub fn toggle_details(&mut self) {
        let selected = self.selected().map(|r| r.commit.change_id.clone());
        if self.details == selected {
            self.details = None;
        } else {
            self.details = selected;
        }
    }

    /// Identifier of the selected row
    pub fn selected_id(&self, kind: IdKind) -> Option<&str> {
        let commit = &self.selected()?.commit;
        Some(match kind {
            IdKind::Change => commit.change_id.as_str(),
            IdKind::Commit => commit.commit_id.as_str(),
        })
    }

    /// Decorators showing marks and the details panel
    pub fn decorators(&self, mark: Color, detail: Color) -> DecoratorStack<'_> {
        DecoratorStack::new()
            .with(MarkDecorator {
                marks: &self.marks,
                color: mark,
            })
            .with(DetailsDecorator {
                change_id: self.details.as_deref(),
                color: detail,
            })
    }

    /// Status bar text for the current state
    pub fn status(&self) -> Status {
        let left = match self.selected() {
            Some(row) => {
                let mut text = format!("{} {}", row.commit.change_id, row.commit.commit_id);
                if row.commit.hidden {
                    text.push_str(" (hidden)");
                }
                text
            }
            None => "no revisions".to_string(),
        };
        let mut right = format!(
            "{}/{}{}",
            (self.cursor + 1).min(self.rows.len()),
            self.rows.len(),
            if self.has_more { "+" } else { "" }
        );
        if !self.marks.is_empty() {
            right = format!("{} marked  {}", self.marked_count(), right);
        }
        Status {
            left,
            right,
            error: false,
        }
    }
}

/// Check mark in front of the change id of marked rows
struct MarkDecorator<'a> {
    marks: &'a HashSet<String>,
    color: Color,
}

impl RowDecorator for MarkDecorator<'_> {
    fn decorate(&self, ctx: &RowContext<'_>, pos: RenderPos) -> Option<Decoration> {
        if pos != RenderPos::BeforeChangeId || !self.marks.contains(&ctx.row.commit.change_id) {
            return None;
        }
        Some(Decoration::highlighted(format!("{}✓\x1b[0m ", self.color.fg_escape())))
    }
}

/// Identifier panel below the row it was opened on
struct DetailsDecorator<'a> {
    change_id: Option<&'a str>,
    color: Color,
}

impl RowDecorator for DetailsDecorator<'_> {
    fn decorate(&self, ctx: &RowContext<'_>, pos: RenderPos) -> Option<Decoration> {
        let commit = &ctx.row.commit;
        if pos != RenderPos::AfterRow || self.change_id != Some(commit.change_id.as_str()) {
            return None;
        }
        let color = self.color.fg_escape();
        let mut lines = vec![
            format!("{}change {}\x1b[0m", color, commit.change_id),
            format!("{}commit {}\x1b[0m", color, commit.commit_id),
            format!("{}row {} ({} lines)\x1b[0m", color, ctx.row.index + 1, ctx.row.height()),
        ];
        if commit.hidden {
            lines.push(format!("{}hidden\x1b[0m", color));
        }
        Some(Decoration::new(lines.join("\n")))
    }
}
