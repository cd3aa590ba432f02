//! Text dumps of screen rows.

use std::io::Write;

use crossterm::queue;
use crossterm::style;
use telterm_screen::Cell;
use telterm_screen::Color;
use telterm_screen::DEFAULT_BG;
use tracing::debug;

/// Rows as plain text. Trailing blanks and trailing empty rows are dropped;
/// every remaining row ends with `\n`.
pub fn render_plain(rows: &[Vec<Cell>]) -> String {
    let mut out = String::new();
    for row in &rows[..content_rows(rows)] {
        let end = row
            .iter()
            .rposition(|c| !c.is_blank())
            .map_or(0, |i| i + 1);
        out.extend(row[..end].iter().map(Cell::ch));
        out.push('\n');
    }
    out
}

/// Rows with SGR color sequences, one style change per run of equal colors.
/// Colors are reset at the end of every row.
pub fn render_ansi(rows: &[Vec<Cell>]) -> String {
    let mut out = Vec::new();

    for row in &rows[..content_rows(rows)] {
        let end = row
            .iter()
            .rposition(|c| !c.is_blank() || c.bg() != DEFAULT_BG)
            .map_or(0, |i| i + 1);
        let row = &row[..end];

        let mut col = 0;
        while col < row.len() {
            let (fg, bg) = (row[col].fg(), row[col].bg());
            let mut run_end = col + 1;
            while run_end < row.len() && row[run_end].fg() == fg && row[run_end].bg() == bg {
                run_end += 1;
            }

            if let Err(err) = apply_colors(&mut out, fg, bg) {
                debug!(error = %err, "Failed to apply terminal style");
            }
            let text: String = row[col..run_end].iter().map(Cell::ch).collect();
            if let Err(err) = queue!(out, style::Print(text)) {
                debug!(error = %err, "Failed to write terminal text");
            }
            col = run_end;
        }

        if let Err(err) = queue!(out, style::ResetColor, style::Print("\n")) {
            debug!(error = %err, "Failed to write terminal newline");
        }
    }

    String::from_utf8(out).unwrap_or_else(|err| {
        debug!(error = %err, "Failed to decode terminal output as UTF-8");
        String::new()
    })
}

fn content_rows(rows: &[Vec<Cell>]) -> usize {
    rows.iter()
        .rposition(|row| row.iter().any(|c| !c.is_blank()))
        .map_or(0, |i| i + 1)
}

fn apply_colors(out: &mut impl Write, fg: Color, bg: Color) -> std::io::Result<()> {
    queue!(
        out,
        style::SetForegroundColor(to_crossterm_color(fg)),
        style::SetBackgroundColor(to_crossterm_color(bg))
    )
}

fn to_crossterm_color(color: Color) -> style::Color {
    match color {
        Color::Black => style::Color::Black,
        Color::DarkRed => style::Color::DarkRed,
        Color::DarkGreen => style::Color::DarkGreen,
        Color::DarkYellow => style::Color::DarkYellow,
        Color::DarkBlue => style::Color::DarkBlue,
        Color::DarkMagenta => style::Color::DarkMagenta,
        Color::DarkCyan => style::Color::DarkCyan,
        Color::LightGray => style::Color::Grey,
        Color::DarkGray => style::Color::DarkGrey,
        Color::Red => style::Color::Red,
        Color::Green => style::Color::Green,
        Color::Yellow => style::Color::Yellow,
        Color::Blue => style::Color::Blue,
        Color::Magenta => style::Color::Magenta,
        Color::Cyan => style::Color::Cyan,
        Color::White => style::Color::White,
    }
}
