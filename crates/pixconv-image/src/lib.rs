#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// image representation for filtering purposes.
pub mod image;

/// Error types for the image module.
pub mod error;

/// sample bit depths.
pub mod depth;

/// color lookup tables for indexed images.
pub mod colormap;

/// word-packed raster storage.
pub mod raster;

pub use crate::colormap::{Colormap, RgbEntry};
pub use crate::depth::PixelDepth;
pub use crate::error::ImageError;
pub use crate::image::{Image, ImageSize};
pub use crate::raster::{compose_rgb, extract_rgb, Raster, RgbChannel, RowsMut};
