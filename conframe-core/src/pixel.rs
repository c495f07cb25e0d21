use serde::{Deserialize, Serialize};

/// The 16 console colors, in palette order (index 0..=15).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermColor {
    Black = 0,
    DarkBlue = 1,
    DarkGreen = 2,
    DarkCyan = 3,
    DarkRed = 4,
    DarkMagenta = 5,
    DarkYellow = 6,
    Gray = 7,
    DarkGray = 8,
    Blue = 9,
    Green = 10,
    Cyan = 11,
    Red = 12,
    Magenta = 13,
    Yellow = 14,
    White = 15,
}

impl TermColor {
    pub const ALL: [TermColor; 16] = [
        TermColor::Black,
        TermColor::DarkBlue,
        TermColor::DarkGreen,
        TermColor::DarkCyan,
        TermColor::DarkRed,
        TermColor::DarkMagenta,
        TermColor::DarkYellow,
        TermColor::Gray,
        TermColor::DarkGray,
        TermColor::Blue,
        TermColor::Green,
        TermColor::Cyan,
        TermColor::Red,
        TermColor::Magenta,
        TermColor::Yellow,
        TermColor::White,
    ];

    /// Palette index -> color. Only the low 4 bits are used.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index & 0x0f]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl From<TermColor> for crossterm::style::Color {
    fn from(c: TermColor) -> Self {
        use crossterm::style::Color;
        match c {
            TermColor::Black => Color::Black,
            TermColor::DarkBlue => Color::DarkBlue,
            TermColor::DarkGreen => Color::DarkGreen,
            TermColor::DarkCyan => Color::DarkCyan,
            TermColor::DarkRed => Color::DarkRed,
            TermColor::DarkMagenta => Color::DarkMagenta,
            TermColor::DarkYellow => Color::DarkYellow,
            TermColor::Gray => Color::Grey,
            TermColor::DarkGray => Color::DarkGrey,
            TermColor::Blue => Color::Blue,
            TermColor::Green => Color::Green,
            TermColor::Cyan => Color::Cyan,
            TermColor::Red => Color::Red,
            TermColor::Magenta => Color::Magenta,
            TermColor::Yellow => Color::Yellow,
            TermColor::White => Color::White,
        }
    }
}

/// A single terminal cell: foreground color, background color and glyph.
///
/// Pixels are replaced wholesale; the engine never patches individual fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    pub fg: TermColor,
    pub bg: TermColor,
    pub glyph: char,
}

impl Pixel {
    /// Blank cell: black background, space glyph.
    pub const BLANK: Pixel = Pixel {
        fg: TermColor::Gray,
        bg: TermColor::Black,
        glyph: ' ',
    };

    pub fn new(fg: TermColor, bg: TermColor, glyph: char) -> Self {
        Self { fg, bg, glyph }
    }

    /// A space glyph on the given background, foreground left at default.
    pub fn solid(bg: TermColor) -> Self {
        Self { bg, ..Self::BLANK }
    }
}

impl Default for Pixel {
    fn default() -> Self {
        Self::BLANK
    }
}
