#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Virtual screen model for telterm.
//!
//! [`ScreenGrid`] holds the character cells, cursor, scroll region and
//! scrollback. [`EscapeDecoder`] turns a decoded character stream into grid
//! mutations. [`VirtualTerminal`] ties both to a [`Codepage`] behind a lock
//! so that the network task can feed bytes while consumers take snapshots.

mod cell;
mod charset;
mod codepage;
mod decoder;
mod grid;
mod scrollback;
mod terminal;

pub use cell::Cell;
pub use cell::Color;
pub use cell::DEFAULT_BG;
pub use cell::DEFAULT_FG;
pub use charset::line_drawing_glyph;
pub use codepage::Codepage;
pub use decoder::DecoderMode;
pub use decoder::DecoderOptions;
pub use decoder::EscapeDecoder;
pub use grid::CursorPosition;
pub use grid::ScreenGrid;
pub use grid::MAX_COLS;
pub use grid::MAX_ROWS;
pub use grid::MIN_COLS;
pub use grid::MIN_ROWS;
pub use scrollback::Scrollback;
pub use scrollback::DEFAULT_SCROLLBACK;
pub use terminal::ScreenSnapshot;
pub use terminal::VirtualTerminal;
