//! Shared handle over a decoder and its screen.
//!
//! [`VirtualTerminal`] is cheap to clone. The link's event task feeds bytes
//! through [`VirtualTerminal::process`] while readers take snapshots, and a
//! generation counter tells them whether anything changed.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use telterm_common::mutex_lock_or_recover;

use crate::cell::Cell;
use crate::codepage::Codepage;
use crate::decoder::DecoderOptions;
use crate::decoder::EscapeDecoder;
use crate::grid::row_to_text;
use crate::grid::CursorPosition;
use crate::grid::ScreenGrid;
use crate::scrollback::DEFAULT_SCROLLBACK;

/// Immutable copy of the visible screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenSnapshot {
    pub cols: usize,
    pub rows: usize,
    pub cursor: CursorPosition,
    pub cells: Vec<Vec<Cell>>,
}

impl ScreenSnapshot {
    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Row text with trailing blanks trimmed.
    pub fn row_text(&self, row: usize) -> Option<String> {
        self.cells.get(row).map(|r| row_to_text(r))
    }
}

/// Shared handle to a decoder and its screen.
///
/// Clones share state. The network task calls [`process`](Self::process)
/// while readers take snapshots; every mutation bumps
/// [`generation`](Self::generation) so a renderer can tell whether anything
/// changed since its last frame.
#[derive(Debug, Clone)]
pub struct VirtualTerminal {
    decoder: Arc<Mutex<EscapeDecoder>>,
    generation: Arc<AtomicU64>,
}

impl VirtualTerminal {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self::with_options(
            cols,
            rows,
            DEFAULT_SCROLLBACK,
            Codepage::default(),
            DecoderOptions::default(),
        )
    }

    pub fn with_options(
        cols: usize,
        rows: usize,
        scrollback: usize,
        codepage: Codepage,
        options: DecoderOptions,
    ) -> Self {
        let grid = ScreenGrid::with_scrollback(cols, rows, scrollback);
        Self {
            decoder: Arc::new(Mutex::new(EscapeDecoder::with_options(
                grid, codepage, options,
            ))),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn process(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut decoder = mutex_lock_or_recover(&self.decoder);
        decoder.feed(data);
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Feeds text that is already decoded, e.g. a local echo.
    pub fn process_str(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut decoder = mutex_lock_or_recover(&self.decoder);
        decoder.feed_str(text);
        self.generation.fetch_add(1, Ordering::Release);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ScreenSnapshot {
        let decoder = mutex_lock_or_recover(&self.decoder);
        let grid = decoder.grid();
        ScreenSnapshot {
            cols: grid.cols(),
            rows: grid.rows(),
            cursor: grid.cursor(),
            cells: grid.snapshot_rows(),
        }
    }

    /// Visible rows as text with trailing blank rows removed.
    pub fn screen_text(&self) -> String {
        let decoder = mutex_lock_or_recover(&self.decoder);
        let text = decoder.grid().extract_plain_text();
        text.trim_end_matches('\n').to_string()
    }

    /// Scrollback followed by the visible rows, one trimmed line per row.
    pub fn history(&self) -> Vec<String> {
        let decoder = mutex_lock_or_recover(&self.decoder);
        decoder
            .grid()
            .snapshot_history()
            .iter()
            .map(|row| row_to_text(row))
            .collect()
    }

    pub fn cursor(&self) -> CursorPosition {
        mutex_lock_or_recover(&self.decoder).grid().cursor()
    }

    /// `(cols, rows)` currently in effect.
    pub fn size(&self) -> (usize, usize) {
        let decoder = mutex_lock_or_recover(&self.decoder);
        (decoder.grid().cols(), decoder.grid().rows())
    }

    /// Resizes the grid and returns the clamped size actually applied.
    pub fn resize(&self, cols: usize, rows: usize) -> (usize, usize) {
        let mut decoder = mutex_lock_or_recover(&self.decoder);
        let grid = decoder.grid_mut();
        grid.resize(cols, rows);
        let applied = (grid.cols(), grid.rows());
        self.generation.fetch_add(1, Ordering::Release);
        applied
    }

    pub fn codepage(&self) -> Codepage {
        mutex_lock_or_recover(&self.decoder).codepage()
    }

    /// Runs `f` against the grid under the lock.
    pub fn with_grid<R>(&self, f: impl FnOnce(&ScreenGrid) -> R) -> R {
        let decoder = mutex_lock_or_recover(&self.decoder);
        f(decoder.grid())
    }
}
