//! ANSI/VT100 escape-sequence decoder.
//!
//! A character-at-a-time state machine over four modes. Text characters go
//! straight to [`ScreenGrid::put_char`]; `ESC` starts a sequence that is
//! either a single-character escape, a charset designation, or a CSI with
//! numeric parameters. Unknown sequences are dropped silently and a
//! sequence cut at the end of a chunk simply waits for the next call.

use tracing::trace;

use crate::cell::Color;
use crate::codepage::Codepage;
use crate::grid::ScreenGrid;

const ESC: char = '\x1b';
const MAX_PARAMS: usize = 16;

/// Which G-set a charset escape designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetSlot {
    /// `ESC (`
    G0,
    /// `ESC )`
    G1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderMode {
    #[default]
    Text,
    Escape,
    Csi,
    Charset(CharsetSlot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderOptions {
    /// Honor `ESC 7`/`ESC 8` and `CSI s`/`CSI u` with a one-slot register.
    /// Off by default: those sequences are parsed and ignored.
    pub save_restore_cursor: bool,
}

/// Owns the screen and drives it from a byte or character stream.
#[derive(Debug, Clone)]
pub struct EscapeDecoder {
    grid: ScreenGrid,
    codepage: Codepage,
    options: DecoderOptions,
    mode: DecoderMode,
    params: Vec<u16>,
    current: Option<u16>,
    private: bool,
}

impl EscapeDecoder {
    pub fn new(grid: ScreenGrid) -> Self {
        Self::with_options(grid, Codepage::default(), DecoderOptions::default())
    }

    pub fn with_options(grid: ScreenGrid, codepage: Codepage, options: DecoderOptions) -> Self {
        Self {
            grid,
            codepage,
            options,
            mode: DecoderMode::Text,
            params: Vec::new(),
            current: None,
            private: false,
        }
    }

    pub fn grid(&self) -> &ScreenGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut ScreenGrid {
        &mut self.grid
    }

    pub fn codepage(&self) -> Codepage {
        self.codepage
    }

    pub fn mode(&self) -> DecoderMode {
        self.mode
    }

    /// Decodes raw bytes through the codepage and runs them through the
    /// state machine.
    pub fn feed(&mut self, bytes: &[u8]) {
        let text = self.codepage.decode(bytes);
        self.feed_str(&text);
    }

    pub fn feed_str(&mut self, text: &str) {
        self.feed_chars(text.chars());
    }

    pub fn feed_chars<I>(&mut self, chars: I)
    where
        I: IntoIterator<Item = char>,
    {
        for ch in chars {
            self.advance(ch);
        }
    }

    fn advance(&mut self, ch: char) {
        self.mode = match self.mode {
            DecoderMode::Text => self.on_text(ch),
            DecoderMode::Escape => self.on_escape(ch),
            DecoderMode::Csi => self.on_csi(ch),
            DecoderMode::Charset(slot) => self.on_charset(slot, ch),
        };
    }

    fn on_text(&mut self, ch: char) -> DecoderMode {
        if ch == ESC {
            DecoderMode::Escape
        } else {
            self.grid.put_char(ch);
            DecoderMode::Text
        }
    }

    fn on_escape(&mut self, ch: char) -> DecoderMode {
        match ch {
            '[' => {
                self.params.clear();
                self.current = None;
                self.private = false;
                return DecoderMode::Csi;
            }
            '(' => return DecoderMode::Charset(CharsetSlot::G0),
            ')' => return DecoderMode::Charset(CharsetSlot::G1),
            ESC => return DecoderMode::Escape,
            'M' => self.grid.reverse_index(),
            'D' => self.grid.index(),
            'E' => self.grid.next_line(),
            '7' if self.options.save_restore_cursor => self.grid.save_cursor(),
            '8' if self.options.save_restore_cursor => self.grid.restore_cursor(),
            'c' => self.grid.full_reset(),
            other => trace!(final_char = ?other, "Ignoring escape sequence"),
        }
        DecoderMode::Text
    }

    fn on_charset(&mut self, slot: CharsetSlot, ch: char) -> DecoderMode {
        if slot == CharsetSlot::G0 {
            match ch {
                '0' => self.grid.set_line_drawing(true),
                'B' => self.grid.set_line_drawing(false),
                _ => {}
            }
        }
        DecoderMode::Text
    }

    fn on_csi(&mut self, ch: char) -> DecoderMode {
        match ch {
            '0'..='9' => {
                let digit = ch as u16 - '0' as u16;
                let value = self.current.unwrap_or(0);
                self.current = Some(value.saturating_mul(10).saturating_add(digit));
                DecoderMode::Csi
            }
            ';' | ':' => {
                self.push_param();
                DecoderMode::Csi
            }
            ESC => DecoderMode::Escape,
            '\x20'..='\x2f' | '<' | '=' | '>' | '?' => {
                self.private = true;
                DecoderMode::Csi
            }
            c if c.is_control() => {
                self.grid.put_char(c);
                DecoderMode::Csi
            }
            final_byte => {
                if self.current.is_some() || !self.params.is_empty() {
                    self.push_param();
                }
                if self.private {
                    trace!(final_byte = ?final_byte, params = ?self.params, "Ignoring private CSI");
                } else {
                    self.dispatch_csi(final_byte);
                }
                DecoderMode::Text
            }
        }
    }

    /// Closes the current slot. An empty slot between separators counts as
    /// a typed 0; only a sequence with no parameters at all falls back to
    /// the dispatch defaults.
    fn push_param(&mut self) {
        let value = self.current.take().unwrap_or(0);
        if self.params.len() < MAX_PARAMS {
            self.params.push(value);
        }
    }

    /// Parameter `i`, or `default` when the sequence did not reach it.
    fn param(&self, i: usize, default: u16) -> u16 {
        self.params.get(i).copied().unwrap_or(default)
    }

    fn count(&self) -> usize {
        self.param(0, 1) as usize
    }

    /// One-based parameter converted to a zero-based coordinate.
    fn coord(&self, i: usize, default: u16) -> i64 {
        i64::from(self.param(i, default)) - 1
    }

    fn dispatch_csi(&mut self, final_byte: char) {
        match final_byte {
            'H' | 'f' => {
                let (row, col) = (self.coord(0, 1), self.coord(1, 1));
                self.grid.set_cursor(row, col);
            }
            'A' => self.grid.cursor_up(self.count()),
            'B' => self.grid.cursor_down(self.count()),
            'C' => self.grid.cursor_forward(self.count()),
            'D' => self.grid.cursor_back(self.count()),
            'E' => {
                self.grid.carriage_return();
                self.grid.cursor_down(self.count());
            }
            'F' => {
                self.grid.carriage_return();
                self.grid.cursor_up(self.count());
            }
            'G' => self.grid.set_cursor_col(self.coord(0, 1)),
            'd' => self.grid.set_cursor_row(self.coord(0, 1)),
            'J' => self.grid.erase_in_display(self.param(0, 0)),
            'K' => self.grid.erase_in_line(self.param(0, 0)),
            'r' => {
                if self.params.len() >= 2 {
                    let rows = u16::try_from(self.grid.rows()).unwrap_or(u16::MAX);
                    let (top, bottom) = (self.coord(0, 1), self.coord(1, rows));
                    self.grid.set_scroll_region(top, bottom);
                } else {
                    self.grid.reset_scroll_region();
                    self.grid.set_cursor(0, 0);
                }
            }
            'L' => self.grid.insert_lines(self.count()),
            'M' => self.grid.delete_lines(self.count()),
            '@' => self.grid.insert_chars(self.count()),
            'P' => self.grid.delete_chars(self.count()),
            'S' => self.grid.scroll_up(self.count()),
            'T' => self.grid.scroll_down(self.count()),
            'm' => self.select_graphic_rendition(),
            's' if self.options.save_restore_cursor => self.grid.save_cursor(),
            'u' if self.options.save_restore_cursor => self.grid.restore_cursor(),
            'h' | 'l' | 'n' | 's' | 'u' => {}
            other => trace!(final_byte = ?other, params = ?self.params, "Ignoring CSI"),
        }
    }

    fn select_graphic_rendition(&mut self) {
        if self.params.is_empty() {
            self.grid.reset_attributes();
            return;
        }
        for i in 0..self.params.len() {
            let value = self.param(i, 0);
            match value {
                0 => self.grid.reset_attributes(),
                1 => self.grid.set_bold(true),
                22 => self.grid.set_bold(false),
                7 => self.grid.set_reverse(true),
                27 => self.grid.set_reverse(false),
                30..=37 => {
                    let offset = (value - 30) as u8;
                    let color = if self.grid.bold() {
                        Color::bright(offset)
                    } else {
                        Color::normal(offset)
                    };
                    if let Some(color) = color {
                        self.grid.set_fg(color);
                    }
                }
                39 => self.grid.set_fg(crate::DEFAULT_FG),
                40..=47 => {
                    if let Some(color) = Color::normal((value - 40) as u8) {
                        self.grid.set_bg(color);
                    }
                }
                49 => self.grid.set_bg(crate::DEFAULT_BG),
                90..=97 => {
                    if let Some(color) = Color::bright((value - 90) as u8) {
                        self.grid.set_fg(color);
                    }
                }
                100..=107 => {
                    if let Some(color) = Color::bright((value - 100) as u8) {
                        self.grid.set_bg(color);
                    }
                }
                _ => {}
            }
        }
    }
}
