use crate::pixel::TermColor;

/// An 8-bit RGB sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Euclidean distance in RGB space.
    pub fn distance(self, other: Rgb) -> f64 {
        let dr = self.r as f64 - other.r as f64;
        let dg = self.g as f64 - other.g as f64;
        let db = self.b as f64 - other.b as f64;
        (dr * dr + dg * dg + db * db).sqrt()
    }
}

impl From<image::Rgb<u8>> for Rgb {
    fn from(p: image::Rgb<u8>) -> Self {
        let [r, g, b] = p.0;
        Self { r, g, b }
    }
}

/// The standard 8 low-intensity + 8 high-intensity console colors.
pub const DOS_COLORS: [Rgb; 16] = [
    Rgb::new(0x00, 0x00, 0x00),
    Rgb::new(0x00, 0x00, 0xa8),
    Rgb::new(0x00, 0xa8, 0x00),
    Rgb::new(0x00, 0xa8, 0xa8),
    Rgb::new(0xa8, 0x00, 0x00),
    Rgb::new(0xa8, 0x00, 0xa8),
    Rgb::new(0xa8, 0xa8, 0x00),
    Rgb::new(0xa8, 0xa8, 0xa8),
    Rgb::new(0x54, 0x54, 0x54),
    Rgb::new(0x54, 0x54, 0xff),
    Rgb::new(0x54, 0xff, 0x54),
    Rgb::new(0x54, 0xff, 0xff),
    Rgb::new(0xff, 0x54, 0x54),
    Rgb::new(0xff, 0x54, 0xff),
    Rgb::new(0xff, 0xff, 0x54),
    Rgb::new(0xff, 0xff, 0xff),
];

/// A fixed 16-entry palette, one entry per [`TermColor`].
///
/// Passed by value wherever quantization happens, so callers can swap in a
/// palette that matches their terminal theme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: [Rgb; 16],
}

impl Palette {
    pub fn new(colors: [Rgb; 16]) -> Self {
        Self { colors }
    }

    pub fn dos() -> Self {
        Self::new(DOS_COLORS)
    }

    pub fn colors(&self) -> &[Rgb; 16] {
        &self.colors
    }

    pub fn rgb(&self, color: TermColor) -> Rgb {
        self.colors[color.index()]
    }

    /// Index of the entry closest to `color`.
    ///
    /// Scans left to right and only moves on a strictly smaller distance, so
    /// ties resolve to the lower index.
    pub fn nearest_index(&self, color: Rgb) -> usize {
        let mut nearest = 0;
        let mut best = color.distance(self.colors[0]);
        for (i, entry) in self.colors.iter().enumerate().skip(1) {
            let d = color.distance(*entry);
            if d < best {
                best = d;
                nearest = i;
            }
        }
        nearest
    }

    pub fn nearest_color(&self, color: Rgb) -> TermColor {
        TermColor::from_index(self.nearest_index(color))
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::dos()
    }
}
