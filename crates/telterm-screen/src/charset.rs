//! DEC special graphics (line drawing) substitution.

/// Box-drawing glyph for `ch` under the DEC special graphics set.
///
/// Characters outside the table are returned unchanged.
pub fn line_drawing_glyph(ch: char) -> char {
    match ch {
        '`' => '◆',
        'a' => '▒',
        'f' => '°',
        'g' => '±',
        'h' => '␤',
        'i' => '␋',
        'j' => '┘',
        'k' => '┐',
        'l' => '┌',
        'm' => '└',
        'n' => '┼',
        'o' => '⎺',
        'p' => '⎻',
        'q' => '─',
        'r' => '⎼',
        's' => '⎽',
        't' => '├',
        'u' => '┤',
        'v' => '┴',
        'w' => '┬',
        'x' => '│',
        'y' => '≤',
        'z' => '≥',
        '{' => 'π',
        '|' => '≠',
        '}' => '£',
        '~' => '·',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_corners_and_lines() {
        assert_eq!(line_drawing_glyph('l'), '┌');
        assert_eq!(line_drawing_glyph('k'), '┐');
        assert_eq!(line_drawing_glyph('m'), '└');
        assert_eq!(line_drawing_glyph('j'), '┘');
        assert_eq!(line_drawing_glyph('q'), '─');
        assert_eq!(line_drawing_glyph('x'), '│');
        assert_eq!(line_drawing_glyph('n'), '┼');
    }

    #[test]
    fn test_unmapped_passthrough() {
        assert_eq!(line_drawing_glyph('A'), 'A');
        assert_eq!(line_drawing_glyph('0'), '0');
        assert_eq!(line_drawing_glyph(' '), ' ');
    }
}
