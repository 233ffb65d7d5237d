/// An error type for the image module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// Error when channel and shape are not valid.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when the image size is not valid.
    #[error("Invalid image size ({0}, {1}) doesn't match ({2}, {3})")]
    InvalidImageSize(usize, usize, usize, usize),

    /// Error when an image has no pixels.
    #[error("Image size ({0}, {1}) has no pixels")]
    EmptyImage(usize, usize),

    /// Error when the pixel index is out of bounds.
    #[error("Pixel index ({0}, {1}) out of bounds ({2}, {3})")]
    PixelIndexOutOfBounds(usize, usize, usize, usize),

    /// Error when the channel index is out of bounds.
    #[error("Channel index {0} is out of bounds {1}")]
    ChannelIndexOutOfBounds(usize, usize),

    /// Error when the pixel data cannot be cast to the target type.
    #[error("Failed to cast image data")]
    CastError,

    /// Error when a bit depth is not part of the supported set.
    #[error("Unsupported depth: {0} bits per pixel")]
    UnsupportedDepth(u32),

    /// Error when a sample does not fit in the raster depth.
    #[error("Sample value {0} does not fit in {1} bits")]
    InvalidSampleValue(u32, u32),

    /// Error when a colormap index has no entry.
    #[error("Colormap index {0} out of range (colormap has {1} entries)")]
    InvalidColormapIndex(usize, usize),

    /// Error when a colormap cannot take more entries.
    #[error("Colormap is full ({0} entries)")]
    ColormapFull(usize),

    /// Error when an operation needs a raster of a different depth.
    #[error("Depth mismatch: expected {0} bpp, got {1} bpp")]
    DepthMismatch(u32, u32),
}
