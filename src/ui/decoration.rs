//! Decoration hooks.
//!
//! A decorator injects text at fixed anchors of a row while it renders.
//! Text may carry its own SGR styling; it picks up the selection band only
//! when it asks to.

use crate::core::Row;

/// Where injected text lands in a row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderPos {
    /// Lines above the row, under the previous row's connectors
    BeforeRow,
    /// Lines below the row body, above any elision marker
    AfterRow,
    /// Replaces the node glyph with the first character of the text
    Glyph,
    /// Inline, right before the change id
    BeforeChangeId,
    /// Inline, right before the commit id
    BeforeCommitId,
    /// Appended to the header line after the bookmarks
    Bookmarks,
    /// Lines shown instead of the description
    ReplaceDescription,
    /// Lines drawn over the description, keeping what sticks out
    OverlayDescription,
    /// Lines above the first row of the view
    TopOfView,
    /// Not drawn anywhere; decorators are never asked for it
    #[allow(dead_code)]
    None,
}

impl RenderPos {
    /// Anchors that only take the first line of their text
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            RenderPos::Glyph | RenderPos::BeforeChangeId | RenderPos::BeforeCommitId | RenderPos::Bookmarks
        )
    }
}

/// Text a decorator injects
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Decoration {
    pub text: String,
    /// Recolor with the selection band when the row is highlighted
    pub inherit_highlight: bool,
}

impl Decoration {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            inherit_highlight: false,
        }
    }

    pub fn highlighted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            inherit_highlight: true,
        }
    }
}

/// The row being rendered
#[derive(Clone, Copy, Debug)]
pub struct RowContext<'a> {
    pub row: &'a Row,
    /// Position in the iterated collection
    pub index: usize,
    pub highlighted: bool,
}

pub trait RowDecorator {
    fn decorate(&self, ctx: &RowContext<'_>, pos: RenderPos) -> Option<Decoration>;
}

/// Decorator that never injects anything
#[cfg(test)]
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDecorations;

#[cfg(test)]
impl RowDecorator for NoDecorations {
    fn decorate(&self, _ctx: &RowContext<'_>, _pos: RenderPos) -> Option<Decoration> {
        None
    }
}

/// Several decorators answering as one.
///
/// Line anchors stack their texts top to bottom, inline anchors concatenate
/// them, and the description and glyph anchors take the first answer.
/// Combined text inherits the highlight only if every part does.
#[derive(Default)]
pub struct DecoratorStack<'a> {
    decorators: Vec<Box<dyn RowDecorator + 'a>>,
}

impl<'a> DecoratorStack<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, decorator: impl RowDecorator + 'a) {
        self.decorators.push(Box::new(decorator));
    }

    pub fn with(mut self, decorator: impl RowDecorator + 'a) -> Self {
        self.push(decorator);
        self
    }
}

impl RowDecorator for DecoratorStack<'_> {
    fn decorate(&self, ctx: &RowContext<'_>, pos: RenderPos) -> Option<Decoration> {
        let mut answers = self.decorators.iter().filter_map(|d| d.decorate(ctx, pos));
        match pos {
            RenderPos::None => None,
            RenderPos::Glyph | RenderPos::ReplaceDescription | RenderPos::OverlayDescription => {
                answers.next()
            }
            _ => {
                let separator = if pos.is_inline() { "" } else { "\n" };
                answers.reduce(|mut acc, next| {
                    acc.text.push_str(separator);
                    acc.text.push_str(&next.text);
                    acc.inherit_highlight &= next.inherit_highlight;
                    acc
                })
            }
        }
    }
}
