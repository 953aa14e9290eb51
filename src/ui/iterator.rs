//! Row iteration for the windowed renderer.
//!
//! The iterator owns everything about how a single row turns into terminal
//! lines: selection recoloring, decoration text and the gutter continuation
//! under injected lines.

use super::decoration::{Decoration, RenderPos, RowContext, RowDecorator};
use crate::core::segment::{self, Segment};
use crate::core::{GraphRowLine, LineFlags, Row};

/// One rendered terminal line
pub type StyledLine = Vec<Segment>;

/// Cursor over a collection of rows
pub trait RowIterator {
    /// Number of rows in the collection
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move to the next row; false once exhausted
    fn advance(&mut self) -> bool;

    /// Position of the current row
    fn index(&self) -> usize;

    /// Whether the current row is the selected one
    fn is_highlighted(&self) -> bool;

    /// Number of lines [`render`](Self::render) produces for the current row
    fn row_height(&self) -> usize;

    /// Append the current row's lines to `out`
    fn render(&self, out: &mut Vec<StyledLine>);
}

/// Styling applied to the selected row
#[derive(Clone, Debug, Default)]
pub struct RenderStyle {
    /// Background parameters of the selection band, e.g. `[48, 5, 236]`
    pub selected_bg: Vec<u16>,
    /// Selected lines are padded to this width; 0 leaves them ragged
    pub width: usize,
}

/// Iterator over a slice of parsed rows
pub struct GraphRowIterator<'a> {
    rows: &'a [Row],
    position: Option<usize>,
    cursor: usize,
    decorator: &'a dyn RowDecorator,
    style: RenderStyle,
}

/// A laid out line and whether it carries the selection band
struct Painted {
    segments: StyledLine,
    band: bool,
}

impl<'a> GraphRowIterator<'a> {
    pub fn new(rows: &'a [Row], cursor: usize, decorator: &'a dyn RowDecorator, style: RenderStyle) -> Self {
        Self {
            rows,
            position: None,
            cursor,
            decorator,
            style,
        }
    }

    fn context(&self) -> Option<RowContext<'a>> {
        let index = self.position?;
        let row = self.rows.get(index)?;
        Some(RowContext {
            row,
            index,
            highlighted: index == self.cursor,
        })
    }

    fn paint(&self, segments: &[Segment], on: bool) -> StyledLine {
        if on {
            segments
                .iter()
                .map(|s| s.recolor(&self.style.selected_bg))
                .collect()
        } else {
            segments.to_vec()
        }
    }

    fn layout(&self, ctx: &RowContext<'a>) -> Vec<Painted> {
        let row = ctx.row;
        let mut lines = Vec::new();

        if ctx.index == 0 {
            if let Some(top) = self.decorator.decorate(ctx, RenderPos::TopOfView) {
                self.push_block(&mut lines, &[], &[], &top, ctx.highlighted);
            }
        }

        if let Some(before) = self.decorator.decorate(ctx, RenderPos::BeforeRow) {
            let above = row
                .previous
                .and_then(|p| self.rows.get(p))
                .and_then(|r| r.lines.last());
            let gutter = match above {
                Some(line) => line.extend(row.indent).segments,
                None => vec![Segment::plain(" ".repeat(row.indent))],
            };
            self.push_block(&mut lines, &gutter, &gutter, &before, ctx.highlighted);
        }

        lines.push(Painted {
            segments: self.header(ctx),
            band: ctx.highlighted,
        });

        let body = row.body();
        let description = row.description_lines();
        let block = self
            .decorator
            .decorate(ctx, RenderPos::ReplaceDescription)
            .map(|d| (RenderPos::ReplaceDescription, d))
            .or_else(|| {
                self.decorator
                    .decorate(ctx, RenderPos::OverlayDescription)
                    .map(|d| (RenderPos::OverlayDescription, d))
            });
        let described: Vec<&GraphRowLine> = description.iter().map(|&i| &body[i]).collect();

        let mut pending = block.as_ref();
        if description.is_empty() {
            if let Some((pos, decoration)) = pending.take() {
                self.description_block(&mut lines, ctx, *pos, decoration, &described);
            }
        }
        for (i, line) in body.iter().enumerate().skip(1) {
            if block.is_some() && description.contains(&i) {
                if let Some((pos, decoration)) = pending.take() {
                    self.description_block(&mut lines, ctx, *pos, decoration, &described);
                }
                continue;
            }
            lines.push(self.original(ctx, line));
        }

        if let Some(after) = self.decorator.decorate(ctx, RenderPos::AfterRow) {
            let gutter = body
                .last()
                .map(|l| l.extend(row.indent).segments)
                .unwrap_or_default();
            self.push_block(&mut lines, &gutter, &gutter, &after, ctx.highlighted);
        }

        for line in row.elided() {
            lines.push(self.original(ctx, line));
        }
        lines
    }

    fn original(&self, ctx: &RowContext<'a>, line: &GraphRowLine) -> Painted {
        let band = ctx.highlighted && line.flags.contains(LineFlags::HIGHLIGHTABLE);
        Painted {
            segments: self.paint(&line.segments, band),
            band,
        }
    }

    /// Header line with glyph, id and bookmark decorations spliced in
    fn header(&self, ctx: &RowContext<'a>) -> StyledLine {
        let row = ctx.row;
        let header = row.header();
        let band = ctx.highlighted;

        let mut original = header.segments.clone();
        if let Some(glyph) = self.decorator.decorate(ctx, RenderPos::Glyph) {
            let replacement = segment::plain_text(&segment::parse(glyph.text.as_bytes()))
                .chars()
                .next();
            if let (Some(col), Some(ch)) = (header.glyph_col(row.indent), replacement) {
                original = replace_char(&original, col, ch);
            }
        }

        let mut before_change = self.inline(ctx, RenderPos::BeforeChangeId);
        let mut before_commit = self.inline(ctx, RenderPos::BeforeCommitId);
        let mut out = Vec::with_capacity(original.len() + 4);
        for idx in 0..=original.len() {
            if header.change_id_idx == Some(idx) {
                out.append(&mut before_change);
            }
            if header.commit_id_idx == Some(idx) {
                out.append(&mut before_commit);
            }
            if let Some(segment) = original.get(idx) {
                out.extend(self.paint(std::slice::from_ref(segment), band));
            }
        }

        let mut bookmarks = self.inline(ctx, RenderPos::Bookmarks);
        if !bookmarks.is_empty() {
            out.extend(self.paint(&[Segment::plain(" ")], band));
            out.append(&mut bookmarks);
        }
        out
    }

    /// First line of an inline decoration, painted if it inherits the band
    fn inline(&self, ctx: &RowContext<'a>, pos: RenderPos) -> StyledLine {
        self.decorator
            .decorate(ctx, pos)
            .map(|d| {
                let first = d.text.lines().next().unwrap_or_default();
                self.paint(&segment::parse(first.as_bytes()), ctx.highlighted && d.inherit_highlight)
            })
            .unwrap_or_default()
    }

    /// Lines of injected text, the first behind `first_gutter`, the rest behind `gutter`
    fn push_block(
        &self,
        lines: &mut Vec<Painted>,
        first_gutter: &[Segment],
        gutter: &[Segment],
        decoration: &Decoration,
        highlighted: bool,
    ) {
        let band = highlighted && decoration.inherit_highlight;
        for (n, text) in segment::parse_lines(&decoration.text).into_iter().enumerate() {
            let mut segments = self.paint(if n == 0 { first_gutter } else { gutter }, band);
            segments.extend(self.paint(&text, band));
            lines.push(Painted { segments, band });
        }
    }

    fn description_block(
        &self,
        lines: &mut Vec<Painted>,
        ctx: &RowContext<'a>,
        pos: RenderPos,
        decoration: &Decoration,
        described: &[&GraphRowLine],
    ) {
        let indent = ctx.row.indent;
        if pos == RenderPos::ReplaceDescription {
            let base = described.first().copied().unwrap_or_else(|| ctx.row.header());
            let first = match described.first() {
                Some(line) => line.chop(indent).0,
                None => base.extend(indent).segments,
            };
            let rest = base.extend(indent).segments;
            self.push_block(lines, &first, &rest, decoration, ctx.highlighted);
            return;
        }

        let overlay = segment::parse_lines(&decoration.text);
        let overlay_band = ctx.highlighted && decoration.inherit_highlight;
        let below = described
            .last()
            .copied()
            .unwrap_or_else(|| ctx.row.header())
            .extend(indent)
            .segments;
        for k in 0..described.len().max(overlay.len()) {
            match (described.get(k), overlay.get(k)) {
                (Some(line), Some(text)) => {
                    let band = ctx.highlighted && line.flags.contains(LineFlags::HIGHLIGHTABLE);
                    let (gutter, rest) = line.chop(indent);
                    let mut segments = self.paint(&gutter, band);
                    segments.extend(self.paint(text, overlay_band));
                    segments.extend(self.paint(&segment::skip_width(&rest, segment::width(text)), band));
                    lines.push(Painted { segments, band });
                }
                (Some(line), None) => lines.push(self.original(ctx, line)),
                (None, Some(text)) => {
                    let mut segments = self.paint(&below, overlay_band);
                    segments.extend(self.paint(text, overlay_band));
                    lines.push(Painted {
                        segments,
                        band: overlay_band,
                    });
                }
                (None, None) => {}
            }
        }
    }
}

impl RowIterator for GraphRowIterator<'_> {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn advance(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p + 1);
        if next >= self.rows.len() {
            self.position = Some(self.rows.len());
            return false;
        }
        self.position = Some(next);
        true
    }

    fn index(&self) -> usize {
        self.position.unwrap_or(0)
    }

    fn is_highlighted(&self) -> bool {
        self.position == Some(self.cursor) && self.cursor < self.rows.len()
    }

    fn row_height(&self) -> usize {
        self.context().map_or(0, |ctx| self.layout(&ctx).len())
    }

    fn render(&self, out: &mut Vec<StyledLine>) {
        let Some(ctx) = self.context() else {
            return;
        };
        for line in self.layout(&ctx) {
            let mut segments = line.segments;
            if line.band && self.style.width > 0 {
                let used = segment::width(&segments);
                if used < self.style.width {
                    let fill = Segment::plain(" ".repeat(self.style.width - used));
                    segments.push(fill.recolor(&self.style.selected_bg));
                }
            }
            out.push(segments);
        }
    }
}

/// Replace the character at column `col`, keeping its style
fn replace_char(segments: &[Segment], col: usize, replacement: char) -> Vec<Segment> {
    let mut start = 0;
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        let len = segment.char_count();
        if (start..start + len).contains(&col) {
            let offset = col - start;
            let text: String = segment
                .text
                .chars()
                .enumerate()
                .map(|(i, ch)| if i == offset { replacement } else { ch })
                .collect();
            out.push(segment.with_text(text));
        } else {
            out.push(segment.clone());
        }
        start += len;
    }
    out
}
