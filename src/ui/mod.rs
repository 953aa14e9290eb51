//! User interface rendering and input handling.
//!
//! This module provides all UI-related functionality:
//!
//! - **decoration**: hooks injecting text at anchors of a row
//! - **iterator**: row traversal and per-row rendering with selection recoloring
//! - **window**: line-based sliding window keeping the selected row visible
//! - **renderer**: crossterm output of a frame plus the status bar
//! - **keymapper**: keyboard and mouse input to view actions

pub mod decoration;
pub mod iterator;
pub mod keymapper;
pub mod renderer;
pub mod window;

pub use decoration::{Decoration, DecoratorStack, RenderPos, RowContext, RowDecorator};
pub use iterator::{GraphRowIterator, RenderStyle, StyledLine};
pub use keymapper::{Action, KeyMapper};
pub use renderer::{Renderer, Status};
pub use window::WindowedRenderer;
