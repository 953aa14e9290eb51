//! Rows of the commit graph
//!
//! A row is every printed line belonging to one history entry: the
//! revision header, its continuation lines and an optional elision marker.

use super::line::{GraphRowLine, LineFlags, RowPrefixes};

/// Identity of the revision a row describes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Commit {
    pub change_id: String,
    pub commit_id: String,
    /// Marked hidden/obsolete by the log output
    pub hidden: bool,
}

/// One history entry of the graph
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub commit: Commit,
    pub lines: Vec<GraphRowLine>,
    /// Gutter width shared by every line of the row
    pub indent: usize,
    /// Position of this row in stream order
    pub index: usize,
    /// Stream position of the row printed just above this one
    pub previous: Option<usize>,
}

impl Row {
    /// Start a row from its revision header line
    pub fn new(mut header: GraphRowLine, prefixes: RowPrefixes, index: usize, previous: Option<usize>) -> Self {
        header.flags = LineFlags::REVISION | LineFlags::HIGHLIGHTABLE;
        Self {
            commit: Commit {
                change_id: prefixes.change_id,
                commit_id: prefixes.commit_id,
                hidden: prefixes.hidden,
            },
            lines: vec![header],
            indent: prefixes.change_id_col,
            index,
            previous,
        }
    }

    /// Append a line and classify it
    pub fn add_line(&mut self, mut line: GraphRowLine, elision_marker: char) {
        let inherited = self
            .lines
            .last()
            .map_or(LineFlags::HIGHLIGHTABLE, |last| last.flags & LineFlags::HIGHLIGHTABLE);
        if line.gutter_contains(elision_marker, self.indent) {
            line.flags = LineFlags::ELIDED;
        } else if line.find_commit_id(&self.commit.commit_id).is_some() {
            line.flags = LineFlags::REVISION | inherited;
        } else {
            line.flags = inherited;
        }
        self.lines.push(line);
    }

    /// Number of printed lines
    pub fn height(&self) -> usize {
        self.lines.len()
    }

    /// The revision header
    pub fn header(&self) -> &GraphRowLine {
        &self.lines[0]
    }

    /// Lines before the first elision marker
    pub fn body(&self) -> &[GraphRowLine] {
        let end = self
            .lines
            .iter()
            .position(|l| l.flags.contains(LineFlags::ELIDED))
            .unwrap_or(self.lines.len());
        &self.lines[..end]
    }

    /// Lines from the first elision marker on
    pub fn elided(&self) -> &[GraphRowLine] {
        &self.lines[self.body().len()..]
    }

    /// Indices of the description band: highlightable body lines below the header
    pub fn description_lines(&self) -> Vec<usize> {
        self.body()
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, l)| {
                l.flags.contains(LineFlags::HIGHLIGHTABLE) && !l.flags.contains(LineFlags::REVISION)
            })
            .map(|(i, _)| i)
            .collect()
    }
}
