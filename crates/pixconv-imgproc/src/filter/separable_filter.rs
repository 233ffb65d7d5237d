use pixconv_image::{Image, PixelDepth, Raster};

use super::{
    convolution::{
        check_kernel_fits, check_output_depth, gray_samples, normalization, quantize,
        replicate_index,
    },
    FilterError, Kernel,
};
use crate::parallel::{self, ExecutionStrategy};

/// A separable 2D filter that applies horizontal and vertical 1D correlations sequentially.
///
/// The intermediate horizontal result is kept in `f64`, so the only rounding
/// happens when the final result is quantized.
struct SeparableFilter<'a> {
    kernel_x: &'a [f64],
    kernel_y: &'a [f64],
    anchor_x: usize,
    anchor_y: usize,
}

impl<'a> SeparableFilter<'a> {
    /// Create a new separable filter with the given kernels.
    ///
    /// # Arguments
    ///
    /// * `kernel_x` - The horizontal kernel, a single row.
    /// * `kernel_y` - The vertical kernel, a single column.
    fn new(kernel_x: &'a Kernel, kernel_y: &'a Kernel) -> Result<Self, FilterError> {
        if kernel_x.height() != 1 || kernel_y.width() != 1 {
            return Err(FilterError::InvalidDimension(format!(
                "separable kernels must be 1xN and Mx1, got {}x{} and {}x{}",
                kernel_x.height(),
                kernel_x.width(),
                kernel_y.height(),
                kernel_y.width()
            )));
        }

        Ok(Self {
            kernel_x: kernel_x.as_slice(),
            kernel_y: kernel_y.as_slice(),
            anchor_x: kernel_x.cx(),
            anchor_y: kernel_y.cy(),
        })
    }

    /// Apply the filter to an image with execution strategy control.
    ///
    /// Performs horizontal filtering followed by vertical filtering using a temporary buffer.
    fn apply(
        &self,
        src: &Image<f64, 1>,
        strategy: ExecutionStrategy,
    ) -> Result<Image<f64, 1>, FilterError> {
        let (width, height) = (src.width(), src.height());
        let cols = replicate_index(width, self.kernel_x.len(), self.anchor_x);
        let rows = replicate_index(height, self.kernel_y.len(), self.anchor_y);
        let src_data = src.as_slice();

        // horizontal
        let mut temp = vec![0.0; src_data.len()];
        parallel::for_each_row(strategy, &mut temp, width, |y, row| {
            let src_row = &src_data[y * width..(y + 1) * width];
            for (x, out) in row.iter_mut().enumerate() {
                *out = self
                    .kernel_x
                    .iter()
                    .zip(&cols[x..])
                    .map(|(&k, &c)| k * src_row[c])
                    .sum();
            }
        })?;

        // vertical
        let mut dst = vec![0.0; src_data.len()];
        parallel::for_each_row(strategy, &mut dst, width, |y, row| {
            let taps = &rows[y..y + self.kernel_y.len()];
            for (x, out) in row.iter_mut().enumerate() {
                *out = self
                    .kernel_y
                    .iter()
                    .zip(taps)
                    .map(|(&k, &r)| k * temp[r * width + x])
                    .sum();
            }
        })?;

        Ok(Image::new(src.size(), dst)?)
    }
}

/// Convolve a gray raster with a separable pair of kernels.
///
/// Equivalent to [`super::convolve`] with `Kernel::outer(kernel_x, kernel_y)`
/// up to floating point rounding, at a cost proportional to `w + h` taps per
/// pixel instead of `w * h`. Edges are replicated in both passes.
///
/// # Arguments
///
/// * `src` - The source raster: 2, 4, 8 or 16 bpp, optionally colormapped.
/// * `kernel_x` - The horizontal kernel, a `1 x w` row.
/// * `kernel_y` - The vertical kernel, an `h x 1` column.
/// * `out_depth` - The depth of the result: 8, 16 or 32 bpp.
/// * `normalize` - Divide by the product of the kernel sums before quantizing.
pub fn convolve_sep(
    src: &Raster,
    kernel_x: &Kernel,
    kernel_y: &Kernel,
    out_depth: PixelDepth,
    normalize: bool,
) -> Result<Raster, FilterError> {
    convolve_sep_with_strategy(
        src,
        kernel_x,
        kernel_y,
        out_depth,
        normalize,
        ExecutionStrategy::default(),
    )
}

/// Convolve a gray raster with a separable pair of kernels using the given execution strategy.
pub fn convolve_sep_with_strategy(
    src: &Raster,
    kernel_x: &Kernel,
    kernel_y: &Kernel,
    out_depth: PixelDepth,
    normalize: bool,
    strategy: ExecutionStrategy,
) -> Result<Raster, FilterError> {
    let filter = SeparableFilter::new(kernel_x, kernel_y)?;
    check_output_depth(out_depth)?;
    let input = gray_samples(src)?;
    check_kernel_fits(kernel_y.height(), kernel_x.width(), input.size())?;

    log::debug!(
        "separable convolve {} with 1x{} and {}x1 kernels",
        input.size(),
        kernel_x.width(),
        kernel_y.height()
    );

    let raw = filter.apply(&input, strategy)?;
    let divisor = normalization(kernel_x.sum() * kernel_y.sum(), normalize);
    quantize(&raw, divisor, out_depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{
        convolve,
        kernels::{make_flat_kernel, make_gaussian_kernel, make_gaussian_kernel_sep},
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_gray(width: usize, height: usize, seed: u64) -> Result<Raster, FilterError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let samples = (0..width * height)
            .map(|_| rng.random_range(0..256u32))
            .collect::<Vec<_>>();
        Ok(Raster::from_samples(
            [width, height].into(),
            PixelDepth::Bit8,
            &samples,
        )?)
    }

    #[test]
    fn test_separable_matches_gaussian() -> Result<(), FilterError> {
        let src = random_gray(40, 30, 42)?;
        for (h, w, sx, sy) in [(5, 5, 3.0, 5.0), (7, 3, 1.0, 2.0), (3, 9, 2.5, 0.8)] {
            let full = make_gaussian_kernel(h, w, sx, sy)?;
            let (kx, ky) = make_gaussian_kernel_sep(h, w, sx, sy)?;

            let expected = convolve(&src, &full, PixelDepth::Bit8, true)?;
            let actual = convolve_sep(&src, &kx, &ky, PixelDepth::Bit8, true)?;
            assert_eq!(actual, expected, "{h}x{w} sx={sx} sy={sy}");
        }
        Ok(())
    }

    #[test]
    fn test_separable_matches_flat() -> Result<(), FilterError> {
        let src = random_gray(25, 21, 7)?;
        let full = make_flat_kernel(7, 7, 3, 3)?;
        let kx = make_flat_kernel(1, 7, 0, 3)?;
        let ky = make_flat_kernel(7, 1, 3, 0)?;

        let expected = convolve(&src, &full, PixelDepth::Bit8, true)?;
        let actual = convolve_sep(&src, &kx, &ky, PixelDepth::Bit8, true)?;
        let (a, e) = (actual.samples()?, expected.samples()?);
        let max_diff = a
            .as_slice()
            .iter()
            .zip(e.as_slice())
            .map(|(&x, &y)| x.abs_diff(y))
            .max()
            .unwrap_or_default();
        assert!(max_diff <= 1, "max diff {max_diff}");
        Ok(())
    }

    #[test]
    fn test_separable_unnormalized_sums() -> Result<(), FilterError> {
        let src = Raster::from_samples([3, 3].into(), PixelDepth::Bit8, &[10; 9])?;
        let kx = Kernel::from_data(1, 3, 0, 1, vec![1.0, 1.0, 1.0])?;
        let ky = Kernel::from_data(3, 1, 1, 0, vec![1.0, 2.0, 1.0])?;
        let dst = convolve_sep(&src, &kx, &ky, PixelDepth::Bit16, false)?;
        assert!(dst.samples()?.as_slice().iter().all(|&p| p == 120));
        Ok(())
    }

    #[test]
    fn test_separable_rejects_bad_shapes() -> Result<(), FilterError> {
        let src = random_gray(8, 8, 1)?;
        let kx = Kernel::from_data(1, 3, 0, 1, vec![1.0; 3])?;
        let ky = Kernel::from_data(3, 1, 1, 0, vec![1.0; 3])?;
        assert!(matches!(
            convolve_sep(&src, &ky, &kx, PixelDepth::Bit8, true),
            Err(FilterError::InvalidDimension(_))
        ));

        let tall = Kernel::from_data(9, 1, 4, 0, vec![1.0; 9])?;
        assert!(matches!(
            convolve_sep(&src, &kx, &tall, PixelDepth::Bit8, true),
            Err(FilterError::InvalidKernel(9, 3, 8, 8))
        ));
        Ok(())
    }

    #[test]
    fn test_separable_strategies_agree() -> Result<(), FilterError> {
        let src = random_gray(33, 19, 3)?;
        let (kx, ky) = make_gaussian_kernel_sep(5, 5, 1.2, 1.2)?;
        let serial = convolve_sep_with_strategy(
            &src,
            &kx,
            &ky,
            PixelDepth::Bit8,
            true,
            ExecutionStrategy::Serial,
        )?;
        let parallel = convolve_sep_with_strategy(
            &src,
            &kx,
            &ky,
            PixelDepth::Bit8,
            true,
            ExecutionStrategy::Parallel,
        )?;
        assert_eq!(serial, parallel);
        Ok(())
    }
}
