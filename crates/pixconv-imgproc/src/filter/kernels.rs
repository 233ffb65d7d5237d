use std::f64::consts::PI;

use super::{FilterError, Kernel};

/// Create a flat (box) kernel.
///
/// Every coefficient is `1 / (height * width)`, so the kernel sums to one.
///
/// # Arguments
///
/// * `height` - The number of kernel rows.
/// * `width` - The number of kernel columns.
/// * `cy` - The anchor row.
/// * `cx` - The anchor column.
///
/// # Returns
///
/// The flat kernel.
pub fn make_flat_kernel(
    height: usize,
    width: usize,
    cy: usize,
    cx: usize,
) -> Result<Kernel, FilterError> {
    if height == 0 || width == 0 {
        return Err(FilterError::InvalidDimension(format!(
            "flat kernel size {height}x{width} must be positive"
        )));
    }
    let val = 1.0 / (height * width) as f64;
    Kernel::from_data(height, width, cy, cx, vec![val; height * width])
}

/// Create a gaussian kernel anchored at its center `(height / 2, width / 2)`.
///
/// # Arguments
///
/// * `height` - The number of kernel rows.
/// * `width` - The number of kernel columns.
/// * `stdev_x` - The horizontal standard deviation.
/// * `stdev_y` - The vertical standard deviation.
///
/// # Returns
///
/// The gaussian kernel, normalized to sum to one.
pub fn make_gaussian_kernel(
    height: usize,
    width: usize,
    stdev_x: f64,
    stdev_y: f64,
) -> Result<Kernel, FilterError> {
    check_stdev(stdev_x)?;
    check_stdev(stdev_y)?;
    check_size(height, width)?;

    let (cy, cx) = (height / 2, width / 2);
    let mut data = Vec::with_capacity(height * width);
    for y in 0..height {
        let dy = y as f64 - cy as f64;
        for x in 0..width {
            let dx = x as f64 - cx as f64;
            data.push(
                (-(dx * dx / (2.0 * stdev_x * stdev_x) + dy * dy / (2.0 * stdev_y * stdev_y)))
                    .exp(),
            );
        }
    }

    Ok(Kernel::from_data(height, width, cy, cx, data)?.normalize(1.0))
}

/// Create the separable factors of a gaussian kernel.
///
/// The horizontal factor is a `1 x width` row anchored at `(0, width / 2)`
/// and the vertical factor a `height x 1` column anchored at
/// `(height / 2, 0)`. Each sums to one, and their outer product matches
/// [`make_gaussian_kernel`] up to rounding.
///
/// # Returns
///
/// The pair `(kernel_x, kernel_y)`.
pub fn make_gaussian_kernel_sep(
    height: usize,
    width: usize,
    stdev_x: f64,
    stdev_y: f64,
) -> Result<(Kernel, Kernel), FilterError> {
    check_stdev(stdev_x)?;
    check_stdev(stdev_y)?;
    check_size(height, width)?;

    let kernel_x = Kernel::from_data(1, width, 0, width / 2, gaussian_1d(width, stdev_x))?;
    let kernel_y = Kernel::from_data(height, 1, height / 2, 0, gaussian_1d(height, stdev_y))?;
    Ok((kernel_x, kernel_y))
}

/// Create a difference of gaussians kernel.
///
/// Both gaussians are sampled from the unit-area continuous profile
/// `exp(-r^2 / (2 s^2)) / (2 pi s^2)` about the center
/// `(height / 2, width / 2)`, and the kernel is `G(stdev1) - G(stdev2)`.
/// The result is not renormalized: it is a band-pass filter and its sum is
/// whatever the truncated profiles leave.
pub fn make_dog_kernel(
    height: usize,
    width: usize,
    stdev1: f64,
    stdev2: f64,
) -> Result<Kernel, FilterError> {
    check_stdev(stdev1)?;
    check_stdev(stdev2)?;
    check_size(height, width)?;

    let (cy, cx) = (height / 2, width / 2);
    let (var1, var2) = (stdev1 * stdev1, stdev2 * stdev2);
    let (norm1, norm2) = (1.0 / (2.0 * PI * var1), 1.0 / (2.0 * PI * var2));

    let mut data = Vec::with_capacity(height * width);
    for y in 0..height {
        let dy = y as f64 - cy as f64;
        for x in 0..width {
            let dx = x as f64 - cx as f64;
            let r2 = dx * dx + dy * dy;
            data.push(norm1 * (-r2 / (2.0 * var1)).exp() - norm2 * (-r2 / (2.0 * var2)).exp());
        }
    }

    Kernel::from_data(height, width, cy, cx, data)
}

fn gaussian_1d(size: usize, stdev: f64) -> Vec<f64> {
    let center = (size / 2) as f64;
    let mut kernel = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / (2.0 * stdev * stdev)).exp()
        })
        .collect::<Vec<_>>();

    // normalize the kernel
    let norm = kernel.iter().sum::<f64>();
    kernel.iter_mut().for_each(|k| *k /= norm);
    kernel
}

fn check_size(height: usize, width: usize) -> Result<(), FilterError> {
    if height == 0 || width == 0 {
        return Err(FilterError::InvalidDimension(format!(
            "kernel size {height}x{width} must be positive"
        )));
    }
    Ok(())
}

fn check_stdev(stdev: f64) -> Result<(), FilterError> {
    if !(stdev > 0.0 && stdev.is_finite()) {
        return Err(FilterError::InvalidDimension(format!(
            "standard deviation {stdev} must be positive"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_make_flat_kernel() -> Result<(), FilterError> {
        let kernel = make_flat_kernel(3, 5, 1, 2)?;
        assert_eq!((kernel.height(), kernel.width()), (3, 5));
        assert_eq!((kernel.cy(), kernel.cx()), (1, 2));
        assert!(kernel.as_slice().iter().all(|&k| k == 1.0 / 15.0));
        assert_relative_eq!(kernel.sum(), 1.0, epsilon = 1e-12);

        assert!(matches!(
            make_flat_kernel(0, 5, 0, 0),
            Err(FilterError::InvalidDimension(_))
        ));
        assert!(matches!(
            make_flat_kernel(3, 3, 1, 3),
            Err(FilterError::InvalidAnchor(1, 3, 3, 3))
        ));
        Ok(())
    }

    #[test]
    fn test_make_gaussian_kernel() -> Result<(), FilterError> {
        let kernel = make_gaussian_kernel(5, 7, 2.0, 1.0)?;
        assert_eq!((kernel.cy(), kernel.cx()), (2, 3));
        assert_relative_eq!(kernel.sum(), 1.0, epsilon = 1e-12);

        // the peak is at the anchor and the profile is symmetric
        let (_, max) = kernel.min_max();
        assert_eq!(kernel.get(2, 3), Some(max));
        assert_relative_eq!(
            kernel.get(0, 0).unwrap_or_default(),
            kernel.get(4, 6).unwrap_or_default(),
            epsilon = 1e-15
        );
        // wider horizontally than vertically
        assert!(kernel.get(2, 4) > kernel.get(3, 3));

        assert!(matches!(
            make_gaussian_kernel(5, 5, 0.0, 1.0),
            Err(FilterError::InvalidDimension(_))
        ));
        Ok(())
    }

    #[test]
    fn test_make_gaussian_kernel_sep() -> Result<(), FilterError> {
        let (kx, ky) = make_gaussian_kernel_sep(5, 7, 3.0, 5.0)?;
        assert_eq!((kx.height(), kx.width(), kx.cy(), kx.cx()), (1, 7, 0, 3));
        assert_eq!((ky.height(), ky.width(), ky.cy(), ky.cx()), (5, 1, 2, 0));
        assert_relative_eq!(kx.sum(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(ky.sum(), 1.0, epsilon = 1e-12);

        let full = make_gaussian_kernel(5, 7, 3.0, 5.0)?;
        let outer = Kernel::outer(&kx, &ky)?;
        assert_eq!((outer.cy(), outer.cx()), (full.cy(), full.cx()));
        for (a, b) in outer.as_slice().iter().zip(full.as_slice()) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }
        Ok(())
    }

    #[test]
    fn test_make_dog_kernel() -> Result<(), FilterError> {
        let kernel = make_dog_kernel(7, 7, 1.5, 2.7)?;
        assert_eq!((kernel.cy(), kernel.cx()), (3, 3));

        // a narrow minus a wide gaussian: positive center, negative rim
        assert!(kernel.get(3, 3).unwrap_or_default() > 0.0);
        assert!(kernel.get(0, 0).unwrap_or_default() < 0.0);

        // not renormalized: the truncated profiles leave a small positive sum
        let sum = kernel.sum();
        assert!(sum > 0.0 && sum < 0.5, "unexpected DoG sum {sum}");
        assert!((sum - 1.0).abs() > 1e-3);

        let swapped = make_dog_kernel(7, 7, 2.7, 1.5)?;
        assert_relative_eq!(swapped.sum(), -sum, epsilon = 1e-12);
        Ok(())
    }
}
