//! Single-byte character encodings for the byte stream.
//!
//! The same [`Codepage`] value must be used to decode server output and to
//! encode outgoing lines, otherwise box-drawing and accented glyphs do not
//! round-trip.

use std::borrow::Cow;

use encoding_rs::Encoding;
use tracing::warn;

/// Upper half (0x80-0xFF) of IBM code page 437.
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', //
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', //
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', //
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', //
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', //
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀', //
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', //
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

/// Byte <-> character mapping used on both directions of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codepage {
    /// IBM PC code page 437. ASCII below 0x80 so control bytes stay controls.
    #[default]
    Cp437,
    /// Byte-preserving mapping: byte `b` is `U+00b`.
    Latin1,
    /// Any single-byte WHATWG encoding, e.g. `ibm866` or `windows-1252`.
    Whatwg(&'static Encoding),
}

impl Codepage {
    /// Resolves a user-supplied label.
    ///
    /// Unknown labels and multi-byte encodings fall back to [`Codepage::Latin1`].
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "cp437" | "ibm437" | "437" | "dos" => Codepage::Cp437,
            "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" | "binary" => Codepage::Latin1,
            _ => match Encoding::for_label(normalized.as_bytes()) {
                Some(encoding) if encoding.is_single_byte() => Codepage::Whatwg(encoding),
                Some(encoding) => {
                    warn!(
                        label = %label,
                        encoding = encoding.name(),
                        "Encoding is not single-byte; falling back to latin1"
                    );
                    Codepage::Latin1
                }
                None => {
                    warn!(label = %label, "Unknown encoding label; falling back to latin1");
                    Codepage::Latin1
                }
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codepage::Cp437 => "cp437",
            Codepage::Latin1 => "latin1",
            Codepage::Whatwg(encoding) => encoding.name(),
        }
    }

    pub fn decode_byte(&self, byte: u8) -> char {
        match self {
            Codepage::Cp437 => cp437_char(byte),
            Codepage::Latin1 => byte as char,
            Codepage::Whatwg(encoding) => {
                match encoding.decode_without_bom_handling_and_without_replacement(&[byte]) {
                    Some(text) => text.chars().next().unwrap_or(byte as char),
                    None => byte as char,
                }
            }
        }
    }

    /// Decodes a chunk of bytes. Never fails: bytes a WHATWG page cannot map
    /// are decoded with the Latin-1 mapping instead.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            Codepage::Cp437 => Cow::Owned(bytes.iter().map(|&b| cp437_char(b)).collect()),
            Codepage::Latin1 => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
            Codepage::Whatwg(encoding) => {
                match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
                    Some(text) => text,
                    None => Cow::Owned(bytes.iter().map(|&b| self.decode_byte(b)).collect()),
                }
            }
        }
    }

    /// Encodes text for the wire. Characters the page cannot express become `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        text.chars().map(|c| self.encode_char(c).unwrap_or(b'?')).collect()
    }

    pub fn encode_char(&self, c: char) -> Option<u8> {
        match self {
            Codepage::Cp437 => {
                if c.is_ascii() {
                    Some(c as u8)
                } else {
                    CP437_HIGH
                        .iter()
                        .position(|&g| g == c)
                        .map(|i| 0x80 + i as u8)
                }
            }
            Codepage::Latin1 => u8::try_from(u32::from(c)).ok(),
            Codepage::Whatwg(encoding) => {
                let mut buf = [0u8; 4];
                let (bytes, _, had_errors) = encoding.encode(c.encode_utf8(&mut buf));
                if had_errors || bytes.len() != 1 {
                    None
                } else {
                    Some(bytes[0])
                }
            }
        }
    }
}

fn cp437_char(byte: u8) -> char {
    if byte < 0x80 {
        byte as char
    } else {
        CP437_HIGH[(byte - 0x80) as usize]
    }
}
