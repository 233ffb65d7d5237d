use pixconv_image::{PixelDepth, Raster, RgbChannel};

use super::{
    convolution::convolve_with_strategy, separable_filter::convolve_sep_with_strategy, FilterError,
    Kernel,
};
use crate::parallel::{self, ExecutionStrategy};

/// Convolve each channel of an RGB raster with a kernel.
///
/// Every channel goes through [`super::convolve`] with normalization and an
/// 8 bit result, and the channels are merged back into an RGB raster.
pub fn convolve_rgb(src: &Raster, kernel: &Kernel) -> Result<Raster, FilterError> {
    per_channel(src, |plane| {
        convolve_with_strategy(
            plane,
            kernel,
            PixelDepth::Bit8,
            true,
            ExecutionStrategy::Serial,
        )
    })
}

/// Convolve each channel of an RGB raster with a separable pair of kernels.
///
/// See [`convolve_rgb`] and [`super::convolve_sep`].
pub fn convolve_rgb_sep(
    src: &Raster,
    kernel_x: &Kernel,
    kernel_y: &Kernel,
) -> Result<Raster, FilterError> {
    per_channel(src, |plane| {
        convolve_sep_with_strategy(
            plane,
            kernel_x,
            kernel_y,
            PixelDepth::Bit8,
            true,
            ExecutionStrategy::Serial,
        )
    })
}

fn per_channel<F>(src: &Raster, f: F) -> Result<Raster, FilterError>
where
    F: Fn(&Raster) -> Result<Raster, FilterError> + Send + Sync,
{
    if src.depth() != PixelDepth::Rgb {
        return Err(FilterError::UnsupportedDepth(src.depth(), "rgb convolution"));
    }

    let planes = RgbChannel::ALL
        .iter()
        .map(|&ch| src.rgb_component(ch))
        .collect::<Result<Vec<_>, _>>()?;

    // one worker per channel
    let filtered = parallel::map_indexed(
        ExecutionStrategy::default(),
        planes.len(),
        src.size().area() * planes.len(),
        |i| f(&planes[i]),
    )?
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;

    match filtered.as_slice() {
        [r, g, b] => Ok(Raster::from_rgb_components(r, g, b)?),
        _ => Err(FilterError::InvalidDimension(format!(
            "expected 3 channels, got {}",
            filtered.len()
        ))),
    }
}
