//! Screen cell and the 16-color ANSI palette.

/// One of the sixteen colors a cell can carry.
///
/// The first eight are the normal SGR 30-37 / 40-47 colors, the last eight
/// their bright counterparts (SGR 90-97 / 100-107, or 30-37 with bold).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    DarkRed,
    DarkGreen,
    DarkYellow,
    DarkBlue,
    DarkMagenta,
    DarkCyan,
    LightGray,
    DarkGray,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

pub const DEFAULT_FG: Color = Color::LightGray;
pub const DEFAULT_BG: Color = Color::Black;

const PALETTE: [Color; 16] = [
    Color::Black,
    Color::DarkRed,
    Color::DarkGreen,
    Color::DarkYellow,
    Color::DarkBlue,
    Color::DarkMagenta,
    Color::DarkCyan,
    Color::LightGray,
    Color::DarkGray,
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::White,
];

impl Color {
    /// Color for an ANSI palette index (0-15).
    pub fn from_index(index: u8) -> Option<Self> {
        PALETTE.get(index as usize).copied()
    }

    /// Normal color for an SGR offset (0-7), as selected by 30-37 and 40-47.
    pub fn normal(offset: u8) -> Option<Self> {
        if offset < 8 {
            Self::from_index(offset)
        } else {
            None
        }
    }

    /// Bright color for an SGR offset (0-7), as selected by 90-97 and 100-107.
    pub fn bright(offset: u8) -> Option<Self> {
        if offset < 8 {
            Self::from_index(offset + 8)
        } else {
            None
        }
    }

    /// ANSI palette index (0-15).
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn is_bright(self) -> bool {
        self.index() >= 8
    }

    /// RGB value used by renderers.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Color::Black => (0, 0, 0),
            Color::DarkRed => (128, 0, 0),
            Color::DarkGreen => (0, 128, 0),
            Color::DarkYellow => (128, 128, 0),
            Color::DarkBlue => (0, 0, 128),
            Color::DarkMagenta => (128, 0, 128),
            Color::DarkCyan => (0, 128, 128),
            Color::LightGray => (192, 192, 192),
            Color::DarkGray => (128, 128, 128),
            Color::Red => (255, 0, 0),
            Color::Green => (0, 255, 0),
            Color::Yellow => (255, 255, 0),
            Color::Blue => (0, 0, 255),
            Color::Magenta => (255, 0, 255),
            Color::Cyan => (0, 255, 255),
            Color::White => (255, 255, 255),
        }
    }
}

/// A single character position on the screen.
///
/// Cells are values: the grid replaces them, it never mutates one in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    pub const fn new(ch: char, fg: Color, bg: Color) -> Self {
        Self { ch, fg, bg }
    }

    /// A space in the given colors.
    pub const fn blank(fg: Color, bg: Color) -> Self {
        Self::new(' ', fg, bg)
    }

    pub fn ch(&self) -> char {
        self.ch
    }

    pub fn fg(&self) -> Color {
        self.fg
    }

    pub fn bg(&self) -> Color {
        self.bg
    }

    pub fn is_blank(&self) -> bool {
        self.ch == ' '
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank(DEFAULT_FG, DEFAULT_BG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cell_is_blank_default_pair() {
        let cell = Cell::default();
        assert!(cell.is_blank());
        assert_eq!(cell.fg(), Color::LightGray);
        assert_eq!(cell.bg(), Color::Black);
    }

    #[test]
    fn test_normal_and_bright_tables() {
        assert_eq!(Color::normal(1), Some(Color::DarkRed));
        assert_eq!(Color::bright(1), Some(Color::Red));
        assert_eq!(Color::normal(7), Some(Color::LightGray));
        assert_eq!(Color::bright(7), Some(Color::White));
        assert_eq!(Color::bright(0), Some(Color::DarkGray));
        assert_eq!(Color::normal(8), None);
        assert_eq!(Color::bright(8), None);
    }

    #[test]
    fn test_index_round_trip() {
        for i in 0..16u8 {
            let color = Color::from_index(i).unwrap();
            assert_eq!(color.index(), i);
            assert_eq!(color.is_bright(), i >= 8);
        }
        assert_eq!(Color::from_index(16), None);
    }

    #[test]
    fn test_rgb_extremes() {
        assert_eq!(Color::Black.rgb(), (0, 0, 0));
        assert_eq!(Color::White.rgb(), (255, 255, 255));
        assert_eq!(Color::LightGray.rgb(), (192, 192, 192));
    }
}
