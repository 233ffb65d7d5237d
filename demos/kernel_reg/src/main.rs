use argh::FromArgs;
use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use pixconv::{
    image::{compose_rgb, PixelDepth, Raster, RgbChannel},
    imgproc::filter::{self, kernels, Kernel},
};

const KDATA: &str = " 20.3    50   80  50   20 \
                      51.4   100  140  100  50 \
                      92.5   160  200  160  90 \
                      53.7   100  140  100  50 \
                      24.9    50   80   50  20 ";

#[derive(FromArgs)]
/// Run the kernel and convolution regression sequence on a synthetic image
struct Args {
    /// the width of the synthetic image
    #[argh(option, default = "640")]
    width: usize,

    /// the height of the synthetic image
    #[argh(option, default = "480")]
    height: usize,

    /// the largest tile count tried along each axis
    #[argh(option, default = "7")]
    max_tiles: usize,

    /// directory to write kernel files and rendered kernels to
    #[argh(option)]
    output_dir: Option<PathBuf>,
}

fn synthetic_gray(width: usize, height: usize) -> Result<Raster, Box<dyn std::error::Error>> {
    let samples = (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            let ramp = (x * 255 / width + y * 255 / height) / 2;
            let texture = (x * 13 + y * 7 + (x * y) % 17) % 48;
            ((ramp + texture) as u32).min(255)
        })
        .collect::<Vec<_>>();
    Ok(Raster::from_samples(
        [width, height].into(),
        PixelDepth::Bit8,
        &samples,
    )?)
}

fn synthetic_rgb(gray: &Raster) -> Result<Raster, Box<dyn std::error::Error>> {
    let samples = gray
        .samples()?
        .as_slice()
        .iter()
        .map(|&v| compose_rgb(v as u8, 255 - v as u8, (v / 2) as u8))
        .collect::<Vec<_>>();
    Ok(Raster::from_samples(gray.size(), PixelDepth::Rgb, &samples)?)
}

/// Write an 8 bpp raster as a binary PGM.
fn write_pgm(raster: &Raster, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut bytes = format!("P5\n{} {}\n255\n", raster.width(), raster.height()).into_bytes();
    bytes.extend(raster.samples()?.as_slice().iter().map(|&v| v as u8));
    std::fs::write(path, bytes)?;
    Ok(())
}

fn max_diff(a: &Raster, b: &Raster) -> Result<u32, Box<dyn std::error::Error>> {
    let (a, b) = (a.samples()?, b.samples()?);
    Ok(a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(&p, &q)| p.abs_diff(q))
        .max()
        .unwrap_or_default())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let gray = synthetic_gray(args.width, args.height)?;
    let mut failures = 0;

    // kernel literal, text form and file round trip
    let kernel = Kernel::from_str_values(5, 5, 2, 2, KDATA)?;
    let parsed: Kernel = kernel.to_string().parse()?;
    if parsed != kernel {
        log::error!("kernel text round trip changed the kernel");
        failures += 1;
    }
    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("kern1.kel");
        kernel.write_file(&path)?;
        if Kernel::from_file(&path)? != kernel {
            log::error!("kernel file round trip changed the kernel");
            failures += 1;
        }
    }

    // generic convolution with the literal kernel
    let now = Instant::now();
    let dst = filter::convolve(&gray, &kernel, PixelDepth::Bit8, true)?;
    log::info!(
        "convolve 5x5 literal kernel on {}: {:?}",
        dst.size(),
        now.elapsed()
    );

    // full gaussian versus its separable factors
    let full = kernels::make_gaussian_kernel(5, 5, 3.0, 5.0)?;
    let (kx, ky) = kernels::make_gaussian_kernel_sep(5, 5, 3.0, 5.0)?;
    let now = Instant::now();
    let a = filter::convolve(&gray, &full, PixelDepth::Bit8, true)?;
    let t_full = now.elapsed();
    let now = Instant::now();
    let b = filter::convolve_sep(&gray, &kx, &ky, PixelDepth::Bit8, true)?;
    let t_sep = now.elapsed();
    let diff = max_diff(&a, &b)?;
    log::info!("gaussian full {t_full:?}, separable {t_sep:?}, max diff {diff}");
    if diff != 0 {
        failures += 1;
    }

    // box filter, untiled versus every tiling
    let now = Instant::now();
    let boxed = filter::block_convolve(&gray, 5, 5)?;
    log::info!("block convolve 11x11: {:?}", now.elapsed());
    for nx in 1..=args.max_tiles {
        for ny in 1..=args.max_tiles {
            let tiled = filter::block_convolve_tiled(&gray, 5, 5, nx, ny)?;
            if tiled != boxed {
                log::error!("tiling {nx}x{ny} differs from the untiled result");
                failures += 1;
            }
        }
    }

    // box filter versus generic flat kernel
    let flat = kernels::make_flat_kernel(11, 11, 5, 5)?;
    let generic = filter::convolve(&gray, &flat, PixelDepth::Bit8, true)?;
    let diff = max_diff(&generic, &boxed)?;
    log::info!("flat generic versus block: max diff {diff}");
    if diff > 1 {
        failures += 1;
    }

    // difference of gaussians, unnormalized
    let dog = kernels::make_dog_kernel(7, 7, 1.5, 2.7)?;
    let band = filter::convolve(&gray, &dog, PixelDepth::Bit8, false)?;
    log::info!("DoG kernel sum {:.6}, output {}", dog.sum(), band.size());

    // RGB, flat 7x7 versus 1x7 and 7x1
    let rgb = synthetic_rgb(&gray)?;
    let flat7 = kernels::make_flat_kernel(7, 7, 3, 3)?;
    let flat_x = kernels::make_flat_kernel(1, 7, 0, 3)?;
    let flat_y = kernels::make_flat_kernel(7, 1, 3, 0)?;
    let now = Instant::now();
    let c1 = filter::convolve_rgb(&rgb, &flat7)?;
    let t_full = now.elapsed();
    let now = Instant::now();
    let c2 = filter::convolve_rgb_sep(&rgb, &flat_x, &flat_y)?;
    let t_sep = now.elapsed();
    for ch in RgbChannel::ALL {
        let diff = max_diff(&c1.rgb_component(ch)?, &c2.rgb_component(ch)?)?;
        if diff != 0 {
            log::error!("{ch:?}: full and separable RGB differ by {diff}");
            failures += 1;
        }
    }
    log::info!("rgb full {t_full:?}, separable {t_sep:?}");

    if let Some(dir) = &args.output_dir {
        for (name, k) in [("literal", &kernel), ("gaussian", &full), ("dog", &dog)] {
            let path = dir.join(format!("{name}.pgm"));
            write_pgm(&k.render(17, 1)?, &path)?;
            log::debug!("wrote {}", path.display());
        }
    }

    if failures > 0 {
        return Err(format!("{failures} regression checks failed").into());
    }
    log::info!("all regression checks passed");
    Ok(())
}
