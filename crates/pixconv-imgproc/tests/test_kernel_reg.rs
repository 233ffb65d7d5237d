use pixconv_image::{compose_rgb, PixelDepth, Raster, RgbChannel};
use pixconv_imgproc::filter::{
    block_convolve, block_convolve_tiled, convolve, convolve_rgb, convolve_rgb_sep, convolve_sep,
    kernels::{make_dog_kernel, make_flat_kernel, make_gaussian_kernel, make_gaussian_kernel_sep},
    FilterError, Kernel,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

const KDATA: &str = " 20.3    50   80  50   20 \
                      51.4   100  140  100  50 \
                      92.5   160  200  160  90 \
                      53.7   100  140  100  50 \
                      24.9    50   80   50  20 ";

/// A smooth gradient with seeded noise, so windows hold varied values.
fn test_image(width: usize, height: usize, seed: u64) -> Raster {
    let mut rng = StdRng::seed_from_u64(seed);
    let samples = (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            let base = (x * 255 / width + y * 255 / height) / 2;
            (base as i32 + rng.random_range(-40..=40)).clamp(0, 255) as u32
        })
        .collect::<Vec<_>>();
    Raster::from_samples([width, height].into(), PixelDepth::Bit8, &samples).unwrap()
}

fn max_abs_diff(a: &Raster, b: &Raster) -> u32 {
    let (a, b) = (a.samples().unwrap(), b.samples().unwrap());
    a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(&p, &q)| p.abs_diff(q))
        .max()
        .unwrap_or_default()
}

#[test]
fn kernel_round_trips_through_text_and_file() -> Result<(), FilterError> {
    let kernel = Kernel::from_str_values(5, 5, 2, 2, KDATA)?;
    let parsed: Kernel = kernel.to_string().parse()?;
    assert_eq!(parsed, kernel);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("kern.kel");
    std::fs::write(
        &path,
        "# small 3x5 kernel\n\
         3 5\n\
         1 2\n\
         20.5   50   80    50   20\n\
         82.    120  180   120  80\n\
         22.1   50   80    50   20\n",
    )?;
    let from_file = Kernel::from_file(&path)?;
    assert_eq!((from_file.height(), from_file.width()), (3, 5));
    assert_eq!((from_file.cy(), from_file.cx()), (1, 2));

    let copy = dir.path().join("copy.kel");
    from_file.write_file(&copy)?;
    assert_eq!(Kernel::from_file(&copy)?, from_file);

    let generated = make_dog_kernel(7, 7, 1.5, 2.7)?;
    assert_eq!(generated.to_string().parse::<Kernel>()?, generated);
    Ok(())
}

#[test]
fn kernel_from_image_patch() -> Result<(), FilterError> {
    let patch = Raster::from_samples(
        [5, 3].into(),
        PixelDepth::Bit8,
        &[20, 50, 80, 50, 20, 80, 120, 180, 120, 80, 20, 50, 80, 50, 20],
    )?;
    let kernel = Kernel::from_image(&patch, 1, 2)?;

    let src = test_image(40, 30, 1);
    let dst = convolve(&src, &kernel, PixelDepth::Bit8, true)?;
    assert_eq!(dst.size(), src.size());

    // normalized convolution with a positive kernel stays within the input range
    let (src_s, dst_s) = (src.samples()?, dst.samples()?);
    let lo = src_s.as_slice().iter().min().copied().unwrap_or_default();
    let hi = src_s.as_slice().iter().max().copied().unwrap_or_default();
    assert!(dst_s.as_slice().iter().all(|&p| p >= lo && p <= hi));
    Ok(())
}

#[test]
fn separable_gaussian_matches_full_kernel() -> Result<(), FilterError> {
    let src = test_image(80, 60, 2);
    let full = make_gaussian_kernel(5, 5, 3.0, 5.0)?;
    let (kx, ky) = make_gaussian_kernel_sep(5, 5, 3.0, 5.0)?;

    let a = convolve(&src, &full, PixelDepth::Bit8, true)?;
    let b = convolve_sep(&src, &kx, &ky, PixelDepth::Bit8, true)?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn tiled_block_convolution_is_exact() -> Result<(), FilterError> {
    let src = test_image(120, 90, 3);
    let expected = block_convolve(&src, 5, 5)?;
    for nx in 1..=8 {
        for ny in 1..=8 {
            let tiled = block_convolve_tiled(&src, 5, 5, nx, ny)?;
            assert_eq!(tiled, expected, "tiles {nx}x{ny}");
        }
    }
    Ok(())
}

#[test]
fn block_and_generic_flat_agree() -> Result<(), FilterError> {
    let src = test_image(70, 50, 4);
    for (a, b) in [(1, 1), (2, 3), (5, 5), (7, 2)] {
        let flat = make_flat_kernel(2 * b + 1, 2 * a + 1, b, a)?;
        let generic = convolve(&src, &flat, PixelDepth::Bit8, true)?;
        let block = block_convolve(&src, a, b)?;
        let diff = max_abs_diff(&generic, &block);
        assert!(diff <= 1, "half {a}x{b}: max diff {diff}");
    }
    Ok(())
}

#[test]
fn dog_on_uniform_image_scales_by_sum() -> Result<(), FilterError> {
    let kernel = make_dog_kernel(7, 7, 1.5, 2.7)?;
    let sum = kernel.sum();
    assert!(sum.abs() > 1e-3 && (sum - 1.0).abs() > 1e-3);

    for v in [40u32, 128, 250] {
        let src = Raster::from_samples([20, 20].into(), PixelDepth::Bit8, &[v; 400])?;
        let dst = convolve(&src, &kernel, PixelDepth::Bit8, false)?;
        let expected = (v as f64 * sum + 0.5).floor().clamp(0.0, 255.0) as u32;
        assert!(dst.samples()?.as_slice().iter().all(|&p| p == expected));
    }
    Ok(())
}

#[test]
fn rgb_flat_and_separable_agree() -> Result<(), FilterError> {
    let (w, h) = (60, 45);
    let mut rng = StdRng::seed_from_u64(5);
    let samples = (0..w * h)
        .map(|_| compose_rgb(rng.random(), rng.random(), rng.random()))
        .collect::<Vec<_>>();
    let src = Raster::from_samples([w, h].into(), PixelDepth::Rgb, &samples)?;

    let full = make_flat_kernel(7, 7, 3, 3)?;
    let kx = make_flat_kernel(1, 7, 0, 3)?;
    let ky = make_flat_kernel(7, 1, 3, 0)?;
    let a = convolve_rgb(&src, &full)?;
    let b = convolve_rgb_sep(&src, &kx, &ky)?;

    assert_eq!(a, b);

    // the box filter agrees with both on every channel
    let boxed = block_convolve(&src, 3, 3)?;
    for ch in RgbChannel::ALL {
        let diff = max_abs_diff(&a.rgb_component(ch)?, &boxed.rgb_component(ch)?);
        assert!(diff <= 1, "{ch:?}: max diff {diff}");
    }
    Ok(())
}

#[test]
fn invalid_inputs_are_rejected() {
    assert!(matches!(
        make_flat_kernel(0, 5, 0, 0),
        Err(FilterError::InvalidDimension(_))
    ));
    assert!(matches!(
        Kernel::from_data(5, 5, 5, 5, vec![0.0; 25]),
        Err(FilterError::InvalidAnchor(5, 5, 5, 5))
    ));
    assert!(matches!(
        Kernel::from_str_values(5, 5, 5, 5, KDATA),
        Err(FilterError::InvalidAnchor(5, 5, 5, 5))
    ));

    let src = test_image(10, 10, 6);
    assert!(matches!(
        block_convolve_tiled(&src, 2, 2, 6, 1),
        Err(FilterError::InvalidTiling(6, 1, _))
    ));
}
