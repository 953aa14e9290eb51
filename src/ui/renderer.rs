//! Terminal renderer using crossterm
//!
//! Draws rendered graph lines and the status bar to the console.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use super::iterator::StyledLine;
use crate::config::ColorScheme;
use crate::core::segment;

/// Text shown in the status bar
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub left: String,
    pub right: String,
    /// Draw `left` in the error color
    pub error: bool,
}

/// Terminal renderer
pub struct Renderer {
    scheme: ColorScheme,
    show_status: bool,
    /// Whether the terminal has been initialized
    initialized: bool,
}

impl Renderer {
    pub fn new(scheme: ColorScheme, show_status: bool) -> Self {
        Self {
            scheme,
            show_status,
            initialized: false,
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        debug!("Entering raw mode");
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            crossterm::event::EnableMouseCapture,
            DisableLineWrap,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        stdout.flush()?;
        self.initialized = true;
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show, EnableLineWrap);
        let _ = execute!(stdout, crossterm::event::DisableMouseCapture);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        // Disable raw mode - this is the most important part
        terminal::disable_raw_mode()?;
        debug!("Left raw mode");
        Ok(())
    }

    /// Lines available to the graph on a terminal `rows` high
    pub fn graph_height(&self, rows: u16) -> usize {
        let reserved = if self.show_status { 1 } else { 0 };
        (rows as usize).saturating_sub(reserved)
    }

    /// Draw one frame
    pub fn draw(&mut self, lines: &[StyledLine], status: &Status) -> io::Result<()> {
        let (cols, rows) = Self::size()?;
        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(65536, stdout.lock());
        self.write_frame(&mut stdout, lines, status, cols, rows)?;
        stdout.flush()
    }

    fn write_frame<W: Write>(
        &self,
        out: &mut W,
        lines: &[StyledLine],
        status: &Status,
        cols: u16,
        rows: u16,
    ) -> io::Result<()> {
        // Begin synchronized update (reduces flicker)
        write!(out, "\x1b[?2026h")?;

        let height = self.graph_height(rows);
        for row in 0..height {
            queue!(out, MoveTo(0, row as u16), Clear(ClearType::CurrentLine))?;
            if let Some(line) = lines.get(row) {
                let line = segment::merge_adjacent(segment::truncate(line, cols as usize));
                write!(out, "{}", segment::to_ansi(&line))?;
            }
        }

        if self.show_status && rows > 0 {
            let fg = if status.error {
                self.scheme.status_error_fg
            } else {
                self.scheme.status_bar_fg
            };
            queue!(
                out,
                MoveTo(0, rows - 1),
                SetBackgroundColor(self.scheme.status_bar_bg.to_crossterm()),
                SetForegroundColor(fg.to_crossterm())
            )?;
            write!(out, "{}", format_status(&status.left, &status.right, cols as usize))?;
            queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;
        }

        // End synchronized update
        write!(out, "\x1b[?2026l")?;
        Ok(())
    }

    /// Get terminal size
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Lay out `left` and `right` on one line exactly `width` cells wide
pub fn format_status(left: &str, right: &str, width: usize) -> String {
    let right_width = right.width();
    if right_width >= width {
        return clamp(left, width);
    }
    let left = clamp(left, (width - right_width).saturating_sub(1));
    let gap = width - left.width() - right_width;
    format!("{}{}{}", left, " ".repeat(gap), right)
}

fn clamp(text: &str, width: usize) -> String {
    let clamped = segment::truncate(&[segment::Segment::plain(text)], width);
    let text = segment::plain_text(&clamped);
    let pad = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(pad))
}
