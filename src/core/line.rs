//! Graph lines
//!
//! A line of log output split into styled segments, plus the role it plays
//! inside a row (revision header, description band, elision marker).

use bitflags::bitflags;

use super::segment::Segment;

bitflags! {
    /// Role of a line within its row
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct LineFlags: u8 {
        const REVISION      = 0b0001;
        const HIGHLIGHTABLE = 0b0010;
        const ELIDED        = 0b0100;
    }
}

/// Glyphs that keep a graph edge going when a line is extended
const CONNECTORS: &[char] = &[
    '│', '├', '┤', '┼', '╭', '╮', '╯', '╰', '┌', '┐', '└', '┘', '┬', '┴', '|',
];

/// Single-character tokens that belong to the graph, never to a change id
const NODE_GLYPHS: &[char] = &['@', 'o', 'x', '*', '○', '◆', '◉', '●', '×', '◌', '~'];

/// Identifiers found on a revision line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowPrefixes {
    pub change_id: String,
    pub commit_id: String,
    /// Column where the change id starts
    pub change_id_col: usize,
    pub hidden: bool,
}

/// One printed line of the graph
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphRowLine {
    pub segments: Vec<Segment>,
    pub flags: LineFlags,
    /// Segment index where the change id starts
    pub change_id_idx: Option<usize>,
    /// Segment index where the commit id starts
    pub commit_id_idx: Option<usize>,
}

/// A whitespace-separated token located by character column
#[derive(Debug)]
struct Token {
    start: usize,
    text: String,
}

impl Token {
    fn is_aligned(&self, boundaries: &[usize]) -> bool {
        let end = self.start + self.text.chars().count();
        boundaries.contains(&self.start) && boundaries.contains(&end)
    }
}

impl GraphRowLine {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            ..Default::default()
        }
    }

    /// Text without styling
    pub fn text(&self) -> String {
        super::segment::plain_text(&self.segments)
    }

    /// Whether `rune` appears within the first `indent` characters
    pub fn gutter_contains(&self, rune: char, indent: usize) -> bool {
        self.text().chars().take(indent).any(|ch| ch == rune)
    }

    /// Column of the node glyph within the gutter
    pub fn glyph_col(&self, indent: usize) -> Option<usize> {
        self.text().chars().take(indent).position(|ch| NODE_GLYPHS.contains(&ch))
    }

    /// Look for a change id followed by a commit id.
    ///
    /// Colored output prints both identifiers as runs of their own, so on a
    /// styled line each must start and end on a segment boundary. Plain text
    /// has no such runs; there the change id must follow a node glyph.
    ///
    /// On success the segments are split so both identifiers start on a
    /// segment boundary, and `change_id_idx`/`commit_id_idx` point at them.
    pub fn parse_row_prefixes(&mut self, hidden_marker: &str) -> Option<RowPrefixes> {
        let text = self.text();
        let tokens = tokenize(&text);
        let first = tokens.iter().position(|t| !is_graph_token(&t.text))?;
        let change = &tokens[first];
        if !is_change_id_like(&change.text) {
            return None;
        }

        let boundaries = self.is_styled().then(|| self.boundaries());
        let aligned = |token: &Token| boundaries.as_deref().map_or(true, |b| token.is_aligned(b));
        if !aligned(change) {
            return None;
        }
        if boundaries.is_none() && !text.chars().take(change.start).any(|ch| NODE_GLYPHS.contains(&ch)) {
            return None;
        }

        let mut hidden = false;
        let mut commit = None;
        for token in &tokens[first + 1..] {
            if is_commit_id_like(&token.text) && aligned(token) {
                commit = Some(token);
                break;
            }
            if !hidden_marker.is_empty() && token.text == hidden_marker {
                hidden = true;
            }
        }
        let commit = commit?;

        let prefixes = RowPrefixes {
            change_id: change.text.clone(),
            commit_id: commit.text.clone(),
            change_id_col: change.start,
            hidden,
        };
        let commit_col = commit.start;
        self.change_id_idx = Some(self.split_at_col(prefixes.change_id_col));
        self.commit_id_idx = Some(self.split_at_col(commit_col));
        Some(prefixes)
    }

    fn is_styled(&self) -> bool {
        self.segments.iter().any(|s| !s.params.is_empty())
    }

    /// Columns where a segment starts, plus the end of the line
    fn boundaries(&self) -> Vec<usize> {
        let mut col = 0;
        let mut boundaries = vec![0];
        for segment in &self.segments {
            col += segment.char_count();
            boundaries.push(col);
        }
        boundaries
    }

    /// Find a hex token equal to `commit_id` on this line and mark its segment
    pub fn find_commit_id(&mut self, commit_id: &str) -> Option<usize> {
        if commit_id.is_empty() {
            return None;
        }
        let col = tokenize(&self.text())
            .into_iter()
            .find(|t| t.text == commit_id && is_commit_id_like(&t.text))?
            .start;
        let idx = self.split_at_col(col);
        self.commit_id_idx = Some(idx);
        Some(idx)
    }

    /// Split the segment containing `col` so that `col` starts a segment;
    /// returns that segment's index
    fn split_at_col(&mut self, col: usize) -> usize {
        let mut start = 0;
        for idx in 0..self.segments.len() {
            let len = self.segments[idx].char_count();
            if col == start {
                return idx;
            }
            if col < start + len {
                let (left, right) = self.segments[idx].split_at_char(col - start);
                self.segments[idx] = left;
                self.segments.insert(idx + 1, right);
                for slot in [&mut self.change_id_idx, &mut self.commit_id_idx] {
                    if let Some(i) = slot {
                        if *i > idx {
                            *i += 1;
                        }
                    }
                }
                return idx + 1;
            }
            start += len;
        }
        self.segments.len()
    }

    /// Split into the first `indent` characters and the rest
    pub fn chop(&self, indent: usize) -> (Vec<Segment>, Vec<Segment>) {
        let mut gutter = Vec::new();
        let mut rest = Vec::new();
        let mut remaining = indent;
        for segment in &self.segments {
            if remaining == 0 {
                rest.push(segment.clone());
                continue;
            }
            let len = segment.char_count();
            if len <= remaining {
                remaining -= len;
                gutter.push(segment.clone());
            } else {
                let (left, right) = segment.split_at_char(remaining);
                remaining = 0;
                gutter.push(left);
                rest.push(right);
            }
        }
        (gutter, rest)
    }

    /// Gutter-only continuation of this line, exactly `indent` characters wide
    pub fn extend(&self, indent: usize) -> GraphRowLine {
        let mut segments = Vec::new();
        let mut remaining = indent;
        for segment in &self.segments {
            if remaining == 0 {
                break;
            }
            let text: String = segment
                .text
                .chars()
                .take(remaining)
                .map(extend_glyph)
                .collect();
            remaining -= text.chars().count();
            segments.push(segment.with_text(text));
        }
        if remaining > 0 {
            segments.push(Segment::plain(" ".repeat(remaining)));
        }
        GraphRowLine::new(segments)
    }
}

fn extend_glyph(ch: char) -> char {
    match ch {
        '|' => '|',
        c if CONNECTORS.contains(&c) => '│',
        _ => ' ',
    }
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<Token> = None;
    for (col, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            if let Some(token) = current.take() {
                tokens.push(token);
            }
            continue;
        }
        match current.as_mut() {
            Some(token) => token.text.push(ch),
            None => {
                current = Some(Token {
                    start: col,
                    text: ch.to_string(),
                })
            }
        }
    }
    tokens.extend(current);
    tokens
}

fn is_graph_token(token: &str) -> bool {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if NODE_GLYPHS.contains(&ch) => true,
        _ => token.chars().all(|ch| !ch.is_alphanumeric()),
    }
}

fn is_change_id_like(token: &str) -> bool {
    token.chars().count() >= 2 && token.chars().all(char::is_alphabetic)
}

/// Hex run long enough to be an id; short all-letter runs are usually words
fn is_commit_id_like(token: &str) -> bool {
    token.len() >= 6
        && token.chars().all(|ch| ch.is_ascii_hexdigit())
        && (token.len() >= 8 || token.chars().any(|ch| ch.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::segment::{parse, plain_text};

    fn line(raw: &str) -> GraphRowLine {
        GraphRowLine::new(parse(raw.as_bytes()))
    }

    #[test]
    fn test_prefixes_split_segments() {
        let mut l = line("@  \x1b[1;35mk\x1b[0m\x1b[90mzmyrxrn\x1b[0m a@b.c 2024-01-01 \x1b[34m7f3a\x1b[0m\x1b[90m2b1c\x1b[0m");
        let prefixes = l.parse_row_prefixes("hidden").unwrap();
        assert_eq!(prefixes.change_id, "kzmyrxrn");
        assert_eq!(prefixes.commit_id, "7f3a2b1c");
        assert_eq!(prefixes.change_id_col, 3);
        assert!(!prefixes.hidden);

        let change = l.change_id_idx.unwrap();
        assert_eq!(l.segments[change].text, "k");
        assert_eq!(plain_text(&l.segments[..change]), "@  ");
        let commit = l.commit_id_idx.unwrap();
        assert_eq!(l.segments[commit].text, "7f3a");
    }

    #[test]
    fn test_prefixes_plain_text_and_hidden() {
        let mut l = line("│ ○  qpvuntsm hidden user 1234abcd");
        let prefixes = l.parse_row_prefixes("hidden").unwrap();
        assert_eq!(prefixes.change_id_col, 5);
        assert!(prefixes.hidden);
        assert_eq!(l.segments[l.change_id_idx.unwrap()].text, "qpvuntsm hidden user ");
        assert_eq!(l.segments[l.commit_id_idx.unwrap()].text, "1234abcd");
    }

    #[test]
    fn test_ascii_node_is_not_a_change_id() {
        let mut l = line("o  zzzzzzzz root() 00000000");
        let prefixes = l.parse_row_prefixes("hidden").unwrap();
        assert_eq!(prefixes.change_id, "zzzzzzzz");
    }

    #[test]
    fn test_description_without_commit_is_not_revision() {
        let mut l = line("│  add streaming parser");
        assert!(l.parse_row_prefixes("hidden").is_none());
        assert_eq!(l.change_id_idx, None);

        let mut l = line("~  (elided revisions)");
        assert!(l.parse_row_prefixes("hidden").is_none());
    }

    #[test]
    fn test_description_with_hash_is_not_revision() {
        let mut l = line("│  \x1b[37mRevert 1a2b3c4d because it broke CI\x1b[0m");
        assert!(l.parse_row_prefixes("hidden").is_none());
        assert_eq!(l.change_id_idx, None);

        let mut l = line("│  \x1b[1;35mkzmyrxrn\x1b[0m merge \x1b[37mabc1234 into main\x1b[0m");
        assert!(l.parse_row_prefixes("hidden").is_none());

        let mut l = line("│ │  Merge abc1234 into main");
        assert!(l.parse_row_prefixes("hidden").is_none());
    }

    #[test]
    fn test_chop_splits_inside_segment() {
        let l = line("\x1b[32m│ │\x1b[0m  text");
        let (gutter, rest) = l.chop(2);
        assert_eq!(gutter, vec![Segment::new("│ ", vec![32])]);
        assert_eq!(plain_text(&rest), "│  text");
        assert_eq!(rest[0].params, vec![32]);
    }

    #[test]
    fn test_extend_maps_glyphs() {
        let l = line("\x1b[33m├─╮\x1b[0m ◆ ~");
        let extended = l.extend(7);
        assert_eq!(extended.text(), "│ │    ");
        assert_eq!(extended.segments[0].params, vec![33]);
    }

    #[test]
    fn test_extend_pads_short_lines() {
        let l = line("│");
        assert_eq!(l.extend(4).text(), "│   ");
        assert_eq!(l.extend(4).text().chars().count(), 4);
    }

    #[test]
    fn test_glyph_col() {
        let l = line("│ @  kzmyrxrn me 7f3a2b1c");
        assert_eq!(l.glyph_col(5), Some(2));
        assert_eq!(line("│ │  text").glyph_col(5), None);
    }

    #[test]
    fn test_find_commit_id() {
        let mut l = line("│  commit 7f3a2b1c");
        assert_eq!(l.find_commit_id("deadbeef"), None);
        let idx = l.find_commit_id("7f3a2b1c").unwrap();
        assert_eq!(l.segments[idx].text, "7f3a2b1c");
    }
}
