use pixconv_image::{Image, ImageSize, PixelDepth, Raster};

use super::{kernel::ZERO_SUM_EPS, FilterError, Kernel};
use crate::parallel::{self, ExecutionStrategy};

/// Convolve a gray raster with a kernel.
///
/// Each output pixel is the correlation of the kernel, anchored at that
/// pixel, with the source. Taps that fall outside the image reuse the
/// nearest edge sample.
///
/// # Arguments
///
/// * `src` - The source raster: 2, 4, 8 or 16 bpp, optionally colormapped.
/// * `kernel` - The kernel, no larger than the image.
/// * `out_depth` - The depth of the result: 8, 16 or 32 bpp.
/// * `normalize` - Divide by the kernel sum before quantizing.
///
/// # Returns
///
/// The convolved raster. Values are rounded to the nearest integer and
/// saturate at `[0, 2^bits - 1]`.
pub fn convolve(
    src: &Raster,
    kernel: &Kernel,
    out_depth: PixelDepth,
    normalize: bool,
) -> Result<Raster, FilterError> {
    convolve_with_strategy(src, kernel, out_depth, normalize, ExecutionStrategy::default())
}

/// Convolve a gray raster with a kernel using the given execution strategy.
///
/// See [`convolve`].
pub fn convolve_with_strategy(
    src: &Raster,
    kernel: &Kernel,
    out_depth: PixelDepth,
    normalize: bool,
    strategy: ExecutionStrategy,
) -> Result<Raster, FilterError> {
    check_output_depth(out_depth)?;
    let input = gray_samples(src)?;
    check_kernel_fits(kernel.height(), kernel.width(), input.size())?;

    log::debug!(
        "convolve {} with {}x{} kernel anchored at ({}, {}), normalize: {normalize}",
        input.size(),
        kernel.height(),
        kernel.width(),
        kernel.cy(),
        kernel.cx()
    );

    let raw = correlate(&input, kernel, strategy)?;
    quantize(&raw, normalization(kernel.sum(), normalize), out_depth)
}

/// Convolve a float image with a kernel, without any rounding.
///
/// The edge policy is the same as [`convolve`]; the kernel is applied as is.
pub fn convolve_float(src: &Image<f64, 1>, kernel: &Kernel) -> Result<Image<f64, 1>, FilterError> {
    if src.size().is_empty() {
        return Err(FilterError::InvalidDimension(format!(
            "empty image {}",
            src.size()
        )));
    }
    check_kernel_fits(kernel.height(), kernel.width(), src.size())?;
    correlate(src, kernel, ExecutionStrategy::default())
}

fn correlate(
    src: &Image<f64, 1>,
    kernel: &Kernel,
    strategy: ExecutionStrategy,
) -> Result<Image<f64, 1>, FilterError> {
    let (width, height) = (src.width(), src.height());
    let kw = kernel.width();
    let cols = replicate_index(width, kw, kernel.cx());
    let rows = replicate_index(height, kernel.height(), kernel.cy());

    let src_data = src.as_slice();
    let mut dst = vec![0.0; src_data.len()];

    parallel::for_each_row(strategy, &mut dst, width, |y, dst_row| {
        for (x, out) in dst_row.iter_mut().enumerate() {
            let taps = &cols[x..x + kw];
            *out = kernel
                .as_slice()
                .chunks_exact(kw)
                .zip(&rows[y..])
                .map(|(krow, &r)| {
                    let src_row = &src_data[r * width..(r + 1) * width];
                    krow.iter()
                        .zip(taps)
                        .map(|(&k, &c)| k * src_row[c])
                        .sum::<f64>()
                })
                .sum();
        }
    })?;

    Ok(Image::new(src.size(), dst)?)
}

/// Clamped source indices for a 1D window sweep.
///
/// Entry `i` is `i - anchor` clamped to `[0, len - 1]`, so the taps of
/// output `p` are entries `p..p + klen`.
pub(crate) fn replicate_index(len: usize, klen: usize, anchor: usize) -> Vec<usize> {
    let last = len.saturating_sub(1);
    (0..len + klen - 1)
        .map(|i| i.saturating_sub(anchor).min(last))
        .collect()
}

/// Unpack a gray raster into float samples, resolving a colormap first.
pub(crate) fn gray_samples(src: &Raster) -> Result<Image<f64, 1>, FilterError> {
    let supported = match (src.depth(), src.colormap().is_some()) {
        (PixelDepth::Bit2 | PixelDepth::Bit4 | PixelDepth::Bit8, _) => true,
        (PixelDepth::Bit16, false) => true,
        _ => false,
    };
    if !supported {
        return Err(FilterError::UnsupportedDepth(src.depth(), "convolution"));
    }

    Ok(src.to_gray()?.samples()?.cast::<f64>()?)
}

pub(crate) fn check_output_depth(depth: PixelDepth) -> Result<(), FilterError> {
    match depth {
        PixelDepth::Bit8 | PixelDepth::Bit16 | PixelDepth::Bit32 => Ok(()),
        d => Err(FilterError::UnsupportedDepth(d, "convolution output")),
    }
}

pub(crate) fn check_kernel_fits(
    kernel_height: usize,
    kernel_width: usize,
    size: ImageSize,
) -> Result<(), FilterError> {
    if kernel_height > size.height || kernel_width > size.width {
        return Err(FilterError::InvalidKernel(
            kernel_height,
            kernel_width,
            size.height,
            size.width,
        ));
    }
    Ok(())
}

/// The divisor applied to raw sums before quantizing.
pub(crate) fn normalization(sum: f64, normalize: bool) -> f64 {
    if !normalize {
        return 1.0;
    }
    if sum.abs() < ZERO_SUM_EPS {
        log::warn!("kernel sum {sum} is ~0; not normalizing");
        return 1.0;
    }
    sum
}

/// Round `raw / divisor` to the nearest integer and saturate to the depth.
pub(crate) fn quantize(
    raw: &Image<f64, 1>,
    divisor: f64,
    depth: PixelDepth,
) -> Result<Raster, FilterError> {
    let max = depth.max_value() as f64;
    let mut out = Raster::new(raw.size(), depth)?;
    let mut line = vec![0u32; raw.width()];
    {
        let mut rows = out.rows_mut();
        for (y, src_row) in raw.as_slice().chunks_exact(raw.width()).enumerate() {
            for (dst, &v) in line.iter_mut().zip(src_row) {
                *dst = (v / divisor + 0.5).floor().clamp(0.0, max) as u32;
            }
            rows.pack_row(y, &line);
        }
    }
    Ok(out)
}
