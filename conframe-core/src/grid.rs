use serde::{Deserialize, Serialize};

use crate::error::GridShapeError;
use crate::pixel::Pixel;

/// A row-major grid of pixels, origin top-left.
///
/// Cell `(col, row)` lives at `row * width + col`. Dimensions are fixed for
/// the grid's lifetime; reallocate a new grid to change them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GridRepr")]
pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<Pixel>,
}

/// Serialized form of a [`Grid`], shape-checked on the way in.
#[derive(Deserialize)]
pub(crate) struct GridRepr {
    width: u16,
    height: u16,
    cells: Vec<Pixel>,
}

impl TryFrom<GridRepr> for Grid {
    type Error = GridShapeError;

    fn try_from(repr: GridRepr) -> Result<Self, Self::Error> {
        let GridRepr { width, height, cells } = repr;
        let len = cells.len();
        Grid::from_cells(width, height, cells).ok_or(GridShapeError {
            width,
            height,
            cells: len,
        })
    }
}

impl Grid {
    /// A `width` x `height` grid filled with [`Pixel::BLANK`].
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Pixel::BLANK; width as usize * height as usize],
        }
    }

    /// Build a grid from existing cells. Returns `None` if the cell count
    /// does not match the dimensions.
    pub fn from_cells(width: u16, height: u16, cells: Vec<Pixel>) -> Option<Self> {
        if cells.len() != width as usize * height as usize {
            return None;
        }
        Some(Self { width, height, cells })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn index_of(&self, col: u16, row: u16) -> Option<usize> {
        if col < self.width && row < self.height {
            Some(row as usize * self.width as usize + col as usize)
        } else {
            None
        }
    }

    /// `(col, row)` of a linear index. Only meaningful for `index < len()`.
    pub fn position_of(&self, index: usize) -> (u16, u16) {
        let w = self.width.max(1) as usize;
        ((index % w) as u16, (index / w) as u16)
    }

    pub fn get(&self, col: u16, row: u16) -> Option<Pixel> {
        self.index_of(col, row).map(|i| self.cells[i])
    }

    /// Replace the pixel at `(col, row)`. Returns `false` when out of range.
    pub fn set(&mut self, col: u16, row: u16, pixel: Pixel) -> bool {
        match self.index_of(col, row) {
            Some(i) => {
                self.cells[i] = pixel;
                true
            }
            None => false,
        }
    }

    /// Write `text` left to right starting at `(col, row)`, clipped at the
    /// right edge. Only the glyphs change; colors come from `template`.
    pub fn put_str(&mut self, col: u16, row: u16, text: &str, template: Pixel) {
        for (i, ch) in text.chars().enumerate() {
            let Ok(offset) = u16::try_from(i) else { break };
            let Some(c) = col.checked_add(offset) else { break };
            if !self.set(c, row, Pixel { glyph: ch, ..template }) {
                break;
            }
        }
    }

    pub fn fill(&mut self, pixel: Pixel) {
        self.cells.fill(pixel);
    }

    pub fn cells(&self) -> &[Pixel] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [Pixel] {
        &mut self.cells
    }

    /// Overwrite this grid's cells with `other`'s. Both grids must have the
    /// same dimensions; the engine keeps that invariant.
    pub(crate) fn copy_from(&mut self, other: &Grid) {
        debug_assert_eq!(self.len(), other.len());
        self.cells.copy_from_slice(&other.cells);
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(0, 0)
    }
}
