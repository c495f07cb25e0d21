pub mod dump;
pub mod error;
pub mod extension;
pub mod framebuffer;
pub mod grid;
pub mod import;
pub mod palette;
pub mod pixel;
pub mod surface;

pub use dump::FrameDumpExtension;
pub use error::{ConfigError, DumpError, EngineError, GridShapeError, ImportError};
pub use extension::{DrawExtension, FrameInfo};
pub use framebuffer::FrameBuffer;
pub use grid::Grid;
pub use palette::{Palette, Rgb};
pub use pixel::{Pixel, TermColor};
pub use surface::{CrosstermSurface, HeadlessSurface, Surface};
