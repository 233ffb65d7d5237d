//! Filter operations
//!
//! Kernels, kernel generators and the convolvers that apply them: a generic
//! correlation for arbitrary kernels, a two-pass path for separable kernel
//! pairs, a sliding-sum box filter for flat kernels and an RGB dispatcher.
//!
//! Every convolver replicates the nearest edge sample for taps that fall
//! outside the image.

/// Filter error type
mod error;
pub use error::FilterError;

/// Convolution kernel type
mod kernel;
pub use kernel::Kernel;

/// Filter kernels
pub mod kernels;

/// Generic convolution
mod convolution;
pub use convolution::*;

/// Separable filter operations
mod separable_filter;
pub use separable_filter::*;

/// Flat kernel block convolution
mod block;
pub use block::*;

/// Per channel convolution of RGB rasters
mod rgb;
pub use rgb::*;
