//! Styled text segments
//!
//! Parses SGR escape sequences into runs of text that share the same
//! parameter list, and turns them back into escaped strings.

use std::fmt;

use unicode_width::UnicodeWidthChar;

const ESC: u8 = 0x1B;

/// A run of text with the SGR parameters that were active when it was printed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// Ordered SGR parameters; empty means no styling
    pub params: Vec<u16>,
}

impl Segment {
    pub fn new(text: impl Into<String>, params: Vec<u16>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    /// Plain, unstyled text
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    /// Two segments are style-equal when their parameter lists match element-wise
    pub fn style_eq(&self, other: &Segment) -> bool {
        self.params == other.params
    }

    /// Number of characters (not bytes) in the segment
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Display width in terminal cells
    pub fn width(&self) -> usize {
        self.text.chars().map(|ch| ch.width().unwrap_or(0)).sum()
    }

    /// Replace the background of this segment, keeping every other parameter
    pub fn recolor(&self, background: &[u16]) -> Segment {
        let mut params = strip_background(&self.params);
        params.extend_from_slice(background);
        Segment {
            text: self.text.clone(),
            params,
        }
    }

    /// Same style, different text
    pub fn with_text(&self, text: impl Into<String>) -> Segment {
        Segment {
            text: text.into(),
            params: self.params.clone(),
        }
    }

    /// Split at a character index, returning the left and right halves
    pub fn split_at_char(&self, at: usize) -> (Segment, Segment) {
        let byte = self
            .text
            .char_indices()
            .nth(at)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len());
        let (left, right) = self.text.split_at(byte);
        (self.with_text(left), self.with_text(right))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            return f.write_str(&self.text);
        }
        write!(f, "\x1b[")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, "m{}\x1b[0m", self.text)
    }
}

/// Stateful SGR parser.
///
/// The active parameter list survives between calls so a stream can be fed
/// one line at a time without losing styles that span a line break.
#[derive(Debug, Default)]
pub struct SegmentParser {
    active: Vec<u16>,
}

impl SegmentParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters currently in effect
    #[allow(dead_code)]
    pub fn active(&self) -> &[u16] {
        &self.active
    }

    /// Parse a chunk of raw bytes into segments
    pub fn parse(&mut self, bytes: &[u8]) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut literal: Vec<u8> = Vec::with_capacity(bytes.len());
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] == ESC && bytes.get(i + 1) == Some(&b'[') {
                match scan_csi(&bytes[i + 2..]) {
                    Csi::Sgr(len) => {
                        let params = parse_params(&bytes[i + 2..i + 2 + len]);
                        self.apply(params, &mut literal, &mut segments);
                        i += len + 3;
                        continue;
                    }
                    Csi::Other(len) => {
                        // Cursor/erase controls carry nothing we can draw
                        i += len + 3;
                        continue;
                    }
                    Csi::Unterminated => {}
                }
            }
            literal.push(bytes[i]);
            i += 1;
        }

        self.flush(&mut literal, &mut segments);
        segments
    }

    fn apply(&mut self, params: Vec<u16>, literal: &mut Vec<u8>, out: &mut Vec<Segment>) {
        if params.is_empty() || params == [0] {
            if self.active.is_empty() {
                return;
            }
            self.flush(literal, out);
            self.active.clear();
            return;
        }
        self.flush(literal, out);
        self.active.extend(params);
    }

    fn flush(&self, literal: &mut Vec<u8>, out: &mut Vec<Segment>) {
        if literal.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(literal).into_owned();
        literal.clear();
        out.push(Segment::new(text, self.active.clone()));
    }
}

enum Csi {
    /// SGR sequence whose parameter bytes have the given length
    Sgr(usize),
    /// Some other complete control sequence
    Other(usize),
    Unterminated,
}

/// Scan the bytes following `ESC [` for the final byte of the sequence
fn scan_csi(rest: &[u8]) -> Csi {
    for (i, &b) in rest.iter().enumerate() {
        match b {
            0x30..=0x3F | 0x20..=0x2F => continue,
            b'm' => return Csi::Sgr(i),
            0x40..=0x7E => return Csi::Other(i),
            _ => return Csi::Unterminated,
        }
    }
    Csi::Unterminated
}

fn parse_params(raw: &[u8]) -> Vec<u16> {
    raw.split(|&b| b == b';' || b == b':')
        .filter(|field| !field.is_empty())
        .filter_map(|field| std::str::from_utf8(field).ok()?.parse::<u16>().ok())
        .collect()
}

/// Parse a complete byte string into segments
pub fn parse(bytes: &[u8]) -> Vec<Segment> {
    SegmentParser::new().parse(bytes)
}

/// Parse text that may contain newlines into one segment list per line
pub fn parse_lines(text: &str) -> Vec<Vec<Segment>> {
    let mut parser = SegmentParser::new();
    text.trim_end_matches('\n')
        .split('\n')
        .map(|line| parser.parse(line.trim_end_matches('\r').as_bytes()))
        .collect()
}

/// Remove background parameters, consuming extended colour forms atomically
fn strip_background(params: &[u16]) -> Vec<u16> {
    let mut out = Vec::with_capacity(params.len());
    let mut i = 0;
    while i < params.len() {
        let p = params[i];
        let span = extended_span(&params[i..]);
        match p {
            40..=47 | 49 | 100..=107 => {}
            48 => {}
            _ => out.extend_from_slice(&params[i..i + span]),
        }
        i += span;
    }
    out
}

/// Length of the parameter group starting at `params[0]`
fn extended_span(params: &[u16]) -> usize {
    match params {
        [38 | 48 | 58, 5, ..] => 3.min(params.len()),
        [38 | 48 | 58, 2, ..] => 5.min(params.len()),
        [38 | 48 | 58, ..] => 2.min(params.len()),
        _ => 1,
    }
}

/// Merge neighbouring segments that share a style
pub fn merge_adjacent(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment.text.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.style_eq(&segment) => last.text.push_str(&segment.text),
            _ => out.push(segment),
        }
    }
    out
}

/// Display width of a run of segments
pub fn width(segments: &[Segment]) -> usize {
    segments.iter().map(Segment::width).sum()
}

/// Clamp a run of segments to `max_width` terminal cells
pub fn truncate(segments: &[Segment], max_width: usize) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut used = 0;
    for segment in segments {
        if used + segment.width() <= max_width {
            used += segment.width();
            out.push(segment.clone());
            continue;
        }
        let mut text = String::new();
        for ch in segment.text.chars() {
            let w = ch.width().unwrap_or(0);
            if used + w > max_width {
                break;
            }
            used += w;
            text.push(ch);
        }
        if !text.is_empty() {
            out.push(segment.with_text(text));
        }
        break;
    }
    out
}

/// Drop the first `columns` terminal cells of a run of segments
pub fn skip_width(segments: &[Segment], columns: usize) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut skipped = 0;
    for segment in segments {
        if skipped >= columns {
            out.push(segment.clone());
            continue;
        }
        let text: String = segment
            .text
            .chars()
            .skip_while(|ch| {
                let w = ch.width().unwrap_or(0);
                if skipped + w <= columns && skipped < columns {
                    skipped += w;
                    true
                } else {
                    false
                }
            })
            .collect();
        if !text.is_empty() {
            skipped = columns;
            out.push(segment.with_text(text));
        }
    }
    out
}

/// Serialize a run of segments into an escaped string
pub fn to_ansi(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.to_string()).collect()
}

/// Concatenated text without styling
pub fn plain_text(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}
