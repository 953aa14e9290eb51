//! Graph stream components.
//!
//! Everything between the bytes of a log command and the rows the UI draws:
//!
//! - **segment**: styled text runs and the ANSI SGR codec
//! - **line**: graph lines, their roles and gutter helpers
//! - **row**: rows grouping the lines of one revision
//! - **parser**: incremental row parser with batched, on-demand delivery
//! - **streamer**: process ownership and teardown around the parser
//!
//! # Architecture
//!
//! ```text
//! GraphStreamer
//! ├── Child (log command, killed on close)
//! └── parser thread
//!     ├── SegmentParser (ANSI → Segment)
//!     └── RowParser (lines → Row)
//! ```

pub mod line;
pub mod parser;
pub mod row;
pub mod segment;
pub mod streamer;

pub use line::{GraphRowLine, LineFlags};
pub use parser::{parse_rows, ParseOptions};
pub use row::Row;
pub use streamer::{GraphStreamer, StreamError};
