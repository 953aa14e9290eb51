//! Windowed renderer.
//!
//! Keeps a sliding window of terminal lines over variable-height rows so the
//! selected row is always fully visible, and only renders the rows the
//! window touches.

use tracing::trace;

use super::iterator::{RowIterator, StyledLine};
use crate::core::segment;

/// Visible line range, persisted across frames
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewRange {
    /// First visible line
    pub start: usize,
    /// One past the last visible line
    pub end: usize,
    /// Last row the renderer visited
    pub last_row_index: usize,
}

#[derive(Debug, Default)]
pub struct WindowedRenderer {
    view: ViewRange,
    last_height: Option<usize>,
    selected: Option<(usize, usize)>,
}

impl WindowedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> ViewRange {
        self.view
    }

    /// Line span `[start, end)` of the selected row in the last frame
    #[allow(dead_code)]
    pub fn selected(&self) -> Option<(usize, usize)> {
        self.selected
    }

    /// Scroll back to the top, e.g. after the rows were replaced
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Render one frame of at most `height` lines, each clamped to `width` cells
    pub fn render(&mut self, rows: &mut dyn RowIterator, width: usize, height: usize) -> Vec<StyledLine> {
        if self.last_height != Some(height) {
            self.view.end = self.view.start + height;
            self.last_height = Some(height);
        }
        if rows.is_empty() {
            self.selected = None;
            return Vec::new();
        }

        let mut buffer: Vec<StyledLine> = Vec::new();
        let mut buffer_start = None;
        let mut line = 0;
        self.selected = None;

        while rows.advance() {
            self.view.last_row_index = rows.index();
            let highlighted = rows.is_highlighted();

            if buffer_start.is_none() && !highlighted {
                let row_height = rows.row_height();
                if line + row_height <= self.view.start {
                    line += row_height;
                    continue;
                }
            }
            if buffer_start.is_none() {
                buffer_start = Some(line);
            }

            let before = buffer.len();
            rows.render(&mut buffer);
            let selected_start = line;
            line += buffer.len() - before;
            if highlighted {
                self.selected = Some((selected_start, line));
            }

            if self.selected.is_some() && line > self.view.end {
                break;
            }
        }

        if let Some((selected_start, selected_end)) = self.selected {
            if selected_start <= self.view.start {
                self.view.start = selected_start;
                self.view.end = selected_start + height;
            } else if selected_end > self.view.end {
                self.view.end = selected_end;
                self.view.start = selected_end.saturating_sub(height);
            }
        }
        trace!(
            "window {}..{} selected {:?} last row {}",
            self.view.start,
            self.view.end,
            self.selected,
            self.view.last_row_index
        );

        let offset = buffer_start.unwrap_or(line);
        let from = self.view.start.saturating_sub(offset).min(buffer.len());
        let to = self.view.end.saturating_sub(offset).min(buffer.len());
        buffer
            .drain(from..to)
            .map(|l| segment::truncate(&l, width))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{parse_rows, ParseOptions, Row};
    use crate::ui::decoration::{Decoration, NoDecorations, RenderPos, RowContext, RowDecorator};
    use crate::ui::iterator::{GraphRowIterator, RenderStyle};
    use std::io::Cursor;

    fn change_id(i: usize) -> String {
        format!("{:03}", i)
            .chars()
            .map(|d| (b'k' + d.to_digit(10).unwrap() as u8) as char)
            .collect::<String>()
            + "wxyz"
    }

    /// Rows of height 1 + `i % 3` lines
    fn rows(n: usize) -> Vec<Row> {
        let mut log = String::new();
        for i in 0..n {
            log.push_str(&format!("○  {} me {:08x}\n", change_id(i), 0x3000_0000 + i));
            for d in 0..i % 3 {
                log.push_str(&format!("│  row {} line {}\n", i, d));
            }
        }
        parse_rows(Cursor::new(log), ParseOptions::default()).unwrap()
    }

    fn frame(window: &mut WindowedRenderer, rows: &[Row], cursor: usize, decorator: &dyn RowDecorator, height: usize) -> Vec<String> {
        let mut iter = GraphRowIterator::new(rows, cursor, decorator, RenderStyle::default());
        window
            .render(&mut iter, 80, height)
            .iter()
            .map(|l| segment::plain_text(l))
            .collect()
    }

    fn assert_selected_visible(window: &WindowedRenderer) {
        let view = window.view();
        let (start, end) = window.selected().unwrap();
        assert!(view.start <= start && end <= view.end, "{:?} not in {:?}", (start, end), view);
        assert_eq!(view.end - view.start, window.last_height.unwrap());
    }

    #[test]
    fn test_first_frame_starts_at_top() {
        let rows = rows(30);
        let mut window = WindowedRenderer::new();
        let lines = frame(&mut window, &rows, 0, &NoDecorations, 10);
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], rows[0].lines[0].text());
        assert_eq!(window.view().start, 0);
        assert_eq!(window.selected(), Some((0, 1)));
    }

    #[test]
    fn test_selection_stays_visible_scrolling_down_and_up() {
        let rows = rows(40);
        let mut window = WindowedRenderer::new();
        for cursor in 0..rows.len() {
            let lines = frame(&mut window, &rows, cursor, &NoDecorations, 7);
            assert_selected_visible(&window);
            let (start, _) = window.selected().unwrap();
            let top = window.view().start;
            assert_eq!(lines[start - top], rows[cursor].lines[0].text());
        }
        for cursor in (0..rows.len()).rev() {
            frame(&mut window, &rows, cursor, &NoDecorations, 7);
            assert_selected_visible(&window);
        }
        assert_eq!(window.view().start, 0);
    }

    #[test]
    fn test_window_does_not_move_while_selection_visible() {
        let rows = rows(40);
        let mut window = WindowedRenderer::new();
        frame(&mut window, &rows, 0, &NoDecorations, 10);
        frame(&mut window, &rows, 3, &NoDecorations, 10);
        assert_eq!(window.view().start, 0);
        assert_eq!(window.view().end, 10);
    }

    #[test]
    fn test_jump_to_bottom_pins_selection_to_last_line() {
        let rows = rows(40);
        let mut window = WindowedRenderer::new();
        frame(&mut window, &rows, 0, &NoDecorations, 10);
        let lines = frame(&mut window, &rows, 39, &NoDecorations, 10);
        let (_, end) = window.selected().unwrap();
        assert_eq!(window.view().end, end);
        assert_eq!(lines.len(), 10);
        assert_eq!(window.view().last_row_index, 39);
    }

    #[test]
    fn test_stops_after_window_is_filled() {
        let rows = rows(100);
        let mut window = WindowedRenderer::new();
        frame(&mut window, &rows, 2, &NoDecorations, 5);
        assert!(window.view().last_row_index < 10);
    }

    #[test]
    fn test_resize_keeps_selection_visible() {
        let rows = rows(40);
        let mut window = WindowedRenderer::new();
        for cursor in 0..20 {
            frame(&mut window, &rows, cursor, &NoDecorations, 12);
        }
        let lines = frame(&mut window, &rows, 19, &NoDecorations, 4);
        assert_eq!(lines.len(), 4);
        assert_selected_visible(&window);
    }

    struct Details(usize);

    impl RowDecorator for Details {
        fn decorate(&self, ctx: &RowContext<'_>, pos: RenderPos) -> Option<Decoration> {
            (pos == RenderPos::AfterRow && ctx.index == self.0).then(|| Decoration::new("a\nb\nc\nd"))
        }
    }

    #[test]
    fn test_decoration_lines_count_toward_selection() {
        let rows = rows(40);
        let mut window = WindowedRenderer::new();
        for cursor in 0..15 {
            frame(&mut window, &rows, cursor, &Details(cursor), 8);
            assert_selected_visible(&window);
        }
        let (start, end) = window.selected().unwrap();
        assert_eq!(end - start, rows[14].height() + 4);
    }

    #[test]
    fn test_lines_are_clamped_to_width() {
        let rows = rows(3);
        let mut window = WindowedRenderer::new();
        let mut iter = GraphRowIterator::new(&rows, 0, &NoDecorations, RenderStyle::default());
        let lines = window.render(&mut iter, 5, 3);
        assert!(lines.iter().all(|l| segment::width(l) <= 5));
        assert_eq!(segment::plain_text(&lines[0]), "○  kk");
    }

    #[test]
    fn test_empty_collection() {
        let rows: Vec<Row> = Vec::new();
        let mut window = WindowedRenderer::new();
        assert!(frame(&mut window, &rows, 0, &NoDecorations, 10).is_empty());
        assert_eq!(window.selected(), None);
    }
}
