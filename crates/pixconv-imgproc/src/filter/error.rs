use pixconv_image::{ImageError, PixelDepth};

use crate::parallel::ParallelError;

/// An error type for kernel construction and convolution.
#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    /// A width, height or size parameter is zero or inconsistent.
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),

    /// The kernel anchor lies outside the kernel.
    #[error("Anchor ({0}, {1}) outside kernel of size {2}x{3}")]
    InvalidAnchor(usize, usize, usize, usize),

    /// Malformed textual kernel.
    #[error("Failed to parse kernel at line {0}: {1}")]
    ParseError(usize, String),

    /// The kernel does not fit in the image.
    #[error("Kernel of size {0}x{1} does not fit image of size {2}x{3}")]
    InvalidKernel(usize, usize, usize, usize),

    /// The depth is not supported by the requested operation.
    #[error("Unsupported depth {0} for {1}")]
    UnsupportedDepth(PixelDepth, &'static str),

    /// The tile grid does not fit the kernel footprint.
    #[error("Invalid tiling {0}x{1}: {2}")]
    InvalidTiling(usize, usize, String),

    /// Error from the image buffer.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Error reading or writing a kernel file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error from the parallel executor.
    #[error(transparent)]
    Parallel(#[from] ParallelError),
}
