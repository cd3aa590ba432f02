//! The character grid: cells, cursor, scroll region, attributes, scrollback.
//!
//! Every operation clamps its inputs to the grid. Nothing here panics on
//! out-of-range coordinates or counts; callers (the escape decoder) pass
//! whatever the byte stream asked for.

use crate::cell::Cell;
use crate::cell::Color;
use crate::cell::DEFAULT_BG;
use crate::cell::DEFAULT_FG;
use crate::charset::line_drawing_glyph;
use crate::scrollback::Scrollback;
use crate::scrollback::DEFAULT_SCROLLBACK;

pub const MIN_ROWS: usize = 10;
pub const MAX_ROWS: usize = 200;
pub const MIN_COLS: usize = 20;
pub const MAX_COLS: usize = 400;

const TAB_WIDTH: usize = 8;

/// Zero-based cursor coordinates, read as one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPosition {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy)]
struct SavedCursor {
    cursor: CursorPosition,
    fg: Color,
    bg: Color,
    bold: bool,
    reverse: bool,
}

#[derive(Debug, Clone)]
pub struct ScreenGrid {
    cols: usize,
    rows: usize,
    lines: Vec<Vec<Cell>>,
    cursor_x: usize,
    cursor_y: usize,
    scroll_top: usize,
    scroll_bottom: usize,
    fg: Color,
    bg: Color,
    bold: bool,
    reverse: bool,
    line_drawing: bool,
    saved: Option<SavedCursor>,
    scrollback: Scrollback,
}

impl ScreenGrid {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self::with_scrollback(cols, rows, DEFAULT_SCROLLBACK)
    }

    pub fn with_scrollback(cols: usize, rows: usize, scrollback: usize) -> Self {
        let cols = cols.clamp(MIN_COLS, MAX_COLS);
        let rows = rows.clamp(MIN_ROWS, MAX_ROWS);
        Self {
            cols,
            rows,
            lines: vec![vec![Cell::default(); cols]; rows],
            cursor_x: 0,
            cursor_y: 0,
            scroll_top: 0,
            scroll_bottom: rows - 1,
            fg: DEFAULT_FG,
            bg: DEFAULT_BG,
            bold: false,
            reverse: false,
            line_drawing: false,
            saved: None,
            scrollback: Scrollback::new(scrollback),
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.lines.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.lines.get(row).map(Vec::as_slice)
    }

    pub fn cursor(&self) -> CursorPosition {
        CursorPosition {
            row: self.cursor_y,
            col: self.cursor_x,
        }
    }

    /// Inclusive `(top, bottom)` rows of the scroll region.
    pub fn scroll_region(&self) -> (usize, usize) {
        (self.scroll_top, self.scroll_bottom)
    }

    pub fn current_fg(&self) -> Color {
        self.fg
    }

    pub fn current_bg(&self) -> Color {
        self.bg
    }

    pub fn bold(&self) -> bool {
        self.bold
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn line_drawing(&self) -> bool {
        self.line_drawing
    }

    pub fn set_line_drawing(&mut self, enabled: bool) {
        self.line_drawing = enabled;
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    // ---------------------------------------------------------------------
    // Character output
    // ---------------------------------------------------------------------

    /// Writes one character, interpreting the C0 controls a text stream
    /// carries (LF, CR, BS, HT, BEL). Other control characters are dropped.
    pub fn put_char(&mut self, ch: char) {
        match ch {
            '\n' => self.index(),
            '\r' => self.cursor_x = 0,
            '\x08' => self.cursor_x = self.cursor_x.saturating_sub(1),
            '\t' => self.tab(),
            '\x07' => {}
            c if c.is_control() => {}
            c => self.write_glyph(c),
        }
    }

    fn write_glyph(&mut self, ch: char) {
        let glyph = if self.line_drawing {
            line_drawing_glyph(ch)
        } else {
            ch
        };
        self.lines[self.cursor_y][self.cursor_x] = Cell::new(glyph, self.fg, self.bg);
        self.cursor_x += 1;
        if self.cursor_x >= self.cols {
            self.cursor_x = 0;
            self.index();
        }
    }

    fn tab(&mut self) {
        let next = (self.cursor_x / TAB_WIDTH + 1) * TAB_WIDTH;
        self.cursor_x = next.min(self.cols - 1);
    }

    // ---------------------------------------------------------------------
    // Cursor movement
    // ---------------------------------------------------------------------

    /// Absolute move to zero-based `(row, col)`; negative or oversized values
    /// are clamped.
    pub fn set_cursor(&mut self, row: i64, col: i64) {
        self.cursor_y = clamp_index(row, self.rows);
        self.cursor_x = clamp_index(col, self.cols);
    }

    pub fn set_cursor_row(&mut self, row: i64) {
        self.cursor_y = clamp_index(row, self.rows);
    }

    pub fn set_cursor_col(&mut self, col: i64) {
        self.cursor_x = clamp_index(col, self.cols);
    }

    pub fn cursor_up(&mut self, n: usize) {
        self.cursor_y = self.cursor_y.saturating_sub(n);
    }

    pub fn cursor_down(&mut self, n: usize) {
        self.cursor_y = self.cursor_y.saturating_add(n).min(self.rows - 1);
    }

    pub fn cursor_forward(&mut self, n: usize) {
        self.cursor_x = self.cursor_x.saturating_add(n).min(self.cols - 1);
    }

    pub fn cursor_back(&mut self, n: usize) {
        self.cursor_x = self.cursor_x.saturating_sub(n);
    }

    pub fn carriage_return(&mut self) {
        self.cursor_x = 0;
    }

    /// Moves down one row, scrolling the region up when the cursor sits on
    /// its bottom row. Below the region the cursor just stops at the last row.
    pub fn index(&mut self) {
        if self.cursor_y == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor_y + 1 < self.rows {
            self.cursor_y += 1;
        }
    }

    /// Moves up one row, scrolling the region down when the cursor sits on
    /// its top row.
    pub fn reverse_index(&mut self) {
        if self.cursor_y == self.scroll_top {
            self.scroll_down(1);
        } else {
            self.cursor_y = self.cursor_y.saturating_sub(1);
        }
    }

    pub fn next_line(&mut self) {
        self.cursor_x = 0;
        self.index();
    }

    /// Stores cursor and attributes in the single save slot.
    pub fn save_cursor(&mut self) {
        self.saved = Some(SavedCursor {
            cursor: self.cursor(),
            fg: self.fg,
            bg: self.bg,
            bold: self.bold,
            reverse: self.reverse,
        });
    }

    /// Restores the save slot; homes the cursor if nothing was saved.
    pub fn restore_cursor(&mut self) {
        match self.saved {
            Some(saved) => {
                self.cursor_y = saved.cursor.row.min(self.rows - 1);
                self.cursor_x = saved.cursor.col.min(self.cols - 1);
                self.fg = saved.fg;
                self.bg = saved.bg;
                self.bold = saved.bold;
                self.reverse = saved.reverse;
            }
            None => {
                self.cursor_x = 0;
                self.cursor_y = 0;
            }
        }
    }

    // ---------------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------------

    /// Default colors, bold and reverse video off.
    pub fn reset_attributes(&mut self) {
        self.fg = DEFAULT_FG;
        self.bg = DEFAULT_BG;
        self.bold = false;
        self.reverse = false;
    }

    pub fn set_fg(&mut self, color: Color) {
        self.fg = color;
    }

    pub fn set_bg(&mut self, color: Color) {
        self.bg = color;
    }

    pub fn set_bold(&mut self, bold: bool) {
        self.bold = bold;
    }

    /// Enables or disables reverse video by swapping the current pair.
    /// Repeating the current state is a no-op.
    pub fn set_reverse(&mut self, reverse: bool) {
        if self.reverse != reverse {
            std::mem::swap(&mut self.fg, &mut self.bg);
            self.reverse = reverse;
        }
    }

    // ---------------------------------------------------------------------
    // Erasing
    // ---------------------------------------------------------------------

    fn blank(&self) -> Cell {
        Cell::blank(self.fg, self.bg)
    }

    fn blank_row(&self) -> Vec<Cell> {
        vec![self.blank(); self.cols]
    }

    /// ED: 0 cursor to end, 1 start to cursor, 2 whole screen, 3 scrollback
    /// only.
    pub fn erase_in_display(&mut self, mode: u16) {
        let blank = self.blank();
        match mode {
            0 => {
                self.lines[self.cursor_y][self.cursor_x..].fill(blank);
                for row in &mut self.lines[self.cursor_y + 1..] {
                    row.fill(blank);
                }
            }
            1 => {
                for row in &mut self.lines[..self.cursor_y] {
                    row.fill(blank);
                }
                self.lines[self.cursor_y][..=self.cursor_x].fill(blank);
            }
            2 => {
                for row in &mut self.lines {
                    row.fill(blank);
                }
            }
            3 => self.scrollback.clear(),
            _ => {}
        }
    }

    /// EL: modes 0-2 of [`erase_in_display`](Self::erase_in_display),
    /// limited to the cursor row.
    pub fn erase_in_line(&mut self, mode: u16) {
        let blank = self.blank();
        let x = self.cursor_x;
        let line = &mut self.lines[self.cursor_y];
        match mode {
            0 => line[x..].fill(blank),
            1 => line[..=x].fill(blank),
            2 => line.fill(blank),
            _ => {}
        }
    }

    // ---------------------------------------------------------------------
    // Scroll region
    // ---------------------------------------------------------------------

    /// Sets the inclusive scroll region from zero-based rows and homes the
    /// cursor. A region that is empty after clamping resets to full screen.
    pub fn set_scroll_region(&mut self, top: i64, bottom: i64) {
        let top = clamp_index(top, self.rows);
        let bottom = clamp_index(bottom, self.rows);
        if top < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        } else {
            self.reset_scroll_region();
        }
        self.cursor_x = 0;
        self.cursor_y = 0;
    }

    pub fn reset_scroll_region(&mut self) {
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
    }

    /// Scrolls the region up by `n` lines. Rows leaving the top of a region
    /// that starts at row 0 are appended to the scrollback.
    pub fn scroll_up(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let n = n.min(bottom - top + 1);
        if n == 0 {
            return;
        }
        self.lines[top..=bottom].rotate_left(n);
        let blank_row = self.blank_row();
        let evicted: Vec<Vec<Cell>> = self.lines[bottom + 1 - n..=bottom]
            .iter_mut()
            .map(|row| std::mem::replace(row, blank_row.clone()))
            .collect();
        if top == 0 {
            for row in evicted {
                self.scrollback.push(row);
            }
        }
    }

    /// Scrolls the region down by `n` lines, blanking the top rows.
    pub fn scroll_down(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let n = n.min(bottom - top + 1);
        if n == 0 {
            return;
        }
        self.lines[top..=bottom].rotate_right(n);
        let blank_row = self.blank_row();
        for row in &mut self.lines[top..top + n] {
            row.clone_from(&blank_row);
        }
    }

    /// IL: inserts blank lines at the cursor row, pushing the rest of the
    /// region down. No effect when the cursor is outside the region.
    pub fn insert_lines(&mut self, n: usize) {
        let (y, bottom) = (self.cursor_y, self.scroll_bottom);
        if y < self.scroll_top || y > bottom {
            return;
        }
        let n = n.min(bottom - y + 1);
        if n == 0 {
            return;
        }
        self.lines[y..=bottom].rotate_right(n);
        let blank_row = self.blank_row();
        for row in &mut self.lines[y..y + n] {
            row.clone_from(&blank_row);
        }
    }

    /// DL: deletes lines at the cursor row, pulling the rest of the region
    /// up. No effect when the cursor is outside the region.
    pub fn delete_lines(&mut self, n: usize) {
        let (y, bottom) = (self.cursor_y, self.scroll_bottom);
        if y < self.scroll_top || y > bottom {
            return;
        }
        let n = n.min(bottom - y + 1);
        if n == 0 {
            return;
        }
        self.lines[y..=bottom].rotate_left(n);
        let blank_row = self.blank_row();
        for row in &mut self.lines[bottom + 1 - n..=bottom] {
            row.clone_from(&blank_row);
        }
    }

    /// ICH: shifts the rest of the cursor row right, dropping cells pushed
    /// past the last column.
    pub fn insert_chars(&mut self, n: usize) {
        let x = self.cursor_x;
        let n = n.min(self.cols - x);
        if n == 0 {
            return;
        }
        let blank = self.blank();
        let line = &mut self.lines[self.cursor_y][x..];
        line.rotate_right(n);
        line[..n].fill(blank);
    }

    /// DCH: shifts the rest of the cursor row left, blanking the tail.
    pub fn delete_chars(&mut self, n: usize) {
        let x = self.cursor_x;
        let n = n.min(self.cols - x);
        if n == 0 {
            return;
        }
        let blank = self.blank();
        let line = &mut self.lines[self.cursor_y][x..];
        line.rotate_left(n);
        let len = line.len();
        line[len - n..].fill(blank);
    }

    // ---------------------------------------------------------------------
    // Whole-screen operations
    // ---------------------------------------------------------------------

    /// RIS: blank grid, home cursor, default attributes, line drawing off,
    /// full-screen region. Scrollback is kept.
    pub fn full_reset(&mut self) {
        self.reset_attributes();
        self.line_drawing = false;
        self.saved = None;
        self.reset_scroll_region();
        for row in &mut self.lines {
            row.fill(Cell::default());
        }
        self.cursor_x = 0;
        self.cursor_y = 0;
    }

    /// Reallocates the grid, keeping the overlapping top-left block.
    /// The scroll region resets to full screen; scrollback is untouched.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let cols = cols.clamp(MIN_COLS, MAX_COLS);
        let rows = rows.clamp(MIN_ROWS, MAX_ROWS);
        if cols == self.cols && rows == self.rows {
            return;
        }
        let mut lines = vec![vec![Cell::default(); cols]; rows];
        for (new_row, old_row) in lines.iter_mut().zip(&self.lines) {
            let keep = cols.min(old_row.len());
            new_row[..keep].copy_from_slice(&old_row[..keep]);
        }
        self.lines = lines;
        self.cols = cols;
        self.rows = rows;
        self.cursor_x = self.cursor_x.min(cols - 1);
        self.cursor_y = self.cursor_y.min(rows - 1);
        self.reset_scroll_region();
    }

    /// Grid rows as text, each trimmed of trailing blanks, joined by `\n`.
    pub fn extract_plain_text(&self) -> String {
        self.lines
            .iter()
            .map(|row| row_to_text(row))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Scrollback rows (oldest first) followed by the current grid rows.
    pub fn snapshot_history(&self) -> Vec<Vec<Cell>> {
        self.scrollback
            .iter()
            .map(<[Cell]>::to_vec)
            .chain(self.lines.iter().cloned())
            .collect()
    }

    pub fn snapshot_rows(&self) -> Vec<Vec<Cell>> {
        self.lines.clone()
    }
}

/// Row text with trailing blank cells removed.
pub(crate) fn row_to_text(row: &[Cell]) -> String {
    let end = row
        .iter()
        .rposition(|c| !c.is_blank())
        .map_or(0, |i| i + 1);
    row[..end].iter().map(Cell::ch).collect()
}

fn clamp_index(value: i64, len: usize) -> usize {
    if value <= 0 {
        0
    } else {
        (value as usize).min(len - 1)
    }
}
