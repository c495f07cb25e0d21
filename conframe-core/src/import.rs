use std::path::Path;

use tracing::debug;

use crate::error::ImportError;
use crate::grid::Grid;
use crate::palette::Palette;
use crate::pixel::Pixel;

/// Decode a bitmap into a grid with one cell per source pixel.
///
/// Each pixel is quantized independently to `palette` and becomes the cell's
/// background; glyph and foreground keep their defaults. No scaling or
/// dithering is applied.
pub fn load_grid(path: impl AsRef<Path>, palette: &Palette) -> Result<Grid, ImportError> {
    let path = path.as_ref();
    let invalid = || ImportError::InvalidImage {
        path: path.to_path_buf(),
    };

    let img = image::open(path).map_err(|err| {
        debug!(path = %path.display(), %err, "image decode failed");
        invalid()
    })?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    let (Ok(cols), Ok(rows)) = (u16::try_from(width), u16::try_from(height)) else {
        return Err(ImportError::TooLarge { width, height });
    };

    let cells = rgb
        .pixels()
        .map(|p| Pixel::solid(palette.nearest_color((*p).into())))
        .collect();
    Grid::from_cells(cols, rows, cells).ok_or_else(invalid)
}
