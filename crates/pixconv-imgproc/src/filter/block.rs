use pixconv_image::{Image, ImageSize, PixelDepth, Raster, RgbChannel};

use super::{convolution::replicate_index, FilterError};
use crate::parallel::{self, ExecutionStrategy};

/// A rectangle of output pixels, `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Tile {
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
}

impl Tile {
    fn whole(size: ImageSize) -> Self {
        Self {
            x0: 0,
            x1: size.width,
            y0: 0,
            y1: size.height,
        }
    }

    fn width(&self) -> usize {
        self.x1 - self.x0
    }

    fn height(&self) -> usize {
        self.y1 - self.y0
    }
}

/// A flat window of `(2 * half_width + 1) x (2 * half_height + 1)` pixels
/// centered on the output pixel, already reduced to fit the image.
#[derive(Clone, Copy, Debug)]
struct BoxWindow {
    half_width: usize,
    half_height: usize,
}

impl BoxWindow {
    fn fit(size: ImageSize, half_width: usize, half_height: usize) -> Result<Self, FilterError> {
        if size.is_empty() {
            return Err(FilterError::InvalidDimension(format!("empty image {size}")));
        }
        Ok(Self {
            half_width: fit_half(half_width, size.width, "width"),
            half_height: fit_half(half_height, size.height, "height"),
        })
    }

    fn area(&self) -> u64 {
        ((2 * self.half_width + 1) * (2 * self.half_height + 1)) as u64
    }

    /// Window sums for every pixel of `tile`, row-major.
    ///
    /// A vector of column sums over the tile's halo columns slides down the
    /// tile one row at a time; each row then slides a horizontal running sum
    /// across those column sums. Every output costs a constant number of
    /// additions whatever the window size.
    fn tile_sums(&self, plane: &Image<u32, 1>, tile: Tile) -> Vec<u64> {
        let (width, height) = (plane.width(), plane.height());
        let (kw, kh) = (2 * self.half_width + 1, 2 * self.half_height + 1);
        let cols = replicate_index(width, kw, self.half_width);
        let rows = replicate_index(height, kh, self.half_height);
        let halo = &cols[tile.x0..tile.x1 + kw - 1];
        let src = plane.as_slice();

        let add_row = |colsum: &mut [u64], r: usize| {
            let line = &src[r * width..(r + 1) * width];
            for (acc, &c) in colsum.iter_mut().zip(halo) {
                *acc += line[c] as u64;
            }
        };
        let sub_row = |colsum: &mut [u64], r: usize| {
            let line = &src[r * width..(r + 1) * width];
            for (acc, &c) in colsum.iter_mut().zip(halo) {
                *acc -= line[c] as u64;
            }
        };

        let mut colsum = vec![0u64; halo.len()];
        for &r in &rows[tile.y0..tile.y0 + kh] {
            add_row(&mut colsum, r);
        }

        let mut sums = Vec::with_capacity(tile.width() * tile.height());
        for y in tile.y0..tile.y1 {
            if y > tile.y0 {
                add_row(&mut colsum, rows[y + kh - 1]);
                sub_row(&mut colsum, rows[y - 1]);
            }

            let mut acc = colsum[..kw].iter().sum::<u64>();
            sums.push(acc);
            for x in 1..tile.width() {
                acc += colsum[x + kw - 1];
                acc -= colsum[x - 1];
                sums.push(acc);
            }
        }
        sums
    }

    /// Box mean of one plane, computing `tiles` with the given strategy.
    fn mean_plane(
        &self,
        plane: &Image<u32, 1>,
        tiles: &[Tile],
        strategy: ExecutionStrategy,
    ) -> Result<Vec<u32>, FilterError> {
        let width = plane.width();
        let area = self.area();
        let results = parallel::map_indexed(strategy, tiles.len(), plane.size().area(), |i| {
            self.tile_sums(plane, tiles[i])
        })?;

        let mut out = vec![0u32; plane.size().area()];
        for (tile, sums) in tiles.iter().zip(results) {
            for (dy, row) in sums.chunks_exact(tile.width()).enumerate() {
                let start = (tile.y0 + dy) * width + tile.x0;
                for (dst, &s) in out[start..start + tile.width()].iter_mut().zip(row) {
                    *dst = ((s + area / 2) / area) as u32;
                }
            }
        }
        Ok(out)
    }
}

/// Shrink a half size so the window fits in a dimension of `len` pixels.
fn fit_half(half: usize, len: usize, axis: &str) -> usize {
    let max = (len - 1) / 2;
    if half > max {
        log::warn!("block {axis} half size {half} too large for {len} pixels; reducing to {max}");
        return max;
    }
    half
}

/// Split `len` pixels into `n` bands of `len / n`, the last band taking the remainder.
fn bands(len: usize, n: usize) -> Vec<(usize, usize)> {
    let step = len / n;
    (0..n)
        .map(|i| {
            let end = if i + 1 == n { len } else { (i + 1) * step };
            (i * step, end)
        })
        .collect()
}

/// The 8 bit planes of a raster: one for gray, three for RGB.
fn planes(src: &Raster) -> Result<Vec<Image<u32, 1>>, FilterError> {
    match src.depth() {
        PixelDepth::Rgb => RgbChannel::ALL
            .iter()
            .map(|&ch| -> Result<Image<u32, 1>, FilterError> {
                Ok(src.rgb_component(ch)?.samples()?)
            })
            .collect(),
        PixelDepth::Bit8 => Ok(vec![src.to_gray()?.samples()?]),
        d if src.colormap().is_some() => {
            log::debug!("resolving colormap of {d} raster for block convolution");
            Ok(vec![src.to_gray()?.samples()?])
        }
        d => Err(FilterError::UnsupportedDepth(d, "block convolution")),
    }
}

fn assemble(size: ImageSize, planes: Vec<Vec<u32>>) -> Result<Raster, FilterError> {
    let rasters = planes
        .iter()
        .map(|plane| Raster::from_samples(size, PixelDepth::Bit8, plane))
        .collect::<Result<Vec<_>, _>>()?;

    match rasters.as_slice() {
        [gray] => Ok(gray.clone()),
        [r, g, b] => Ok(Raster::from_rgb_components(r, g, b)?),
        _ => Err(FilterError::InvalidDimension(format!(
            "cannot assemble {} planes",
            rasters.len()
        ))),
    }
}

/// Convolve a raster with a flat kernel using running sums.
///
/// The kernel is `(2 * half_height + 1) x (2 * half_width + 1)` and centered
/// on the output pixel; out-of-image samples replicate the nearest edge.
/// Each output pixel costs the same whatever the kernel size.
///
/// A kernel larger than the image is reduced so that `2 * half + 1` fits
/// in each dimension.
///
/// # Arguments
///
/// * `src` - The source raster: 8 bpp gray, colormapped, or RGB.
/// * `half_width` - The horizontal half size of the kernel.
/// * `half_height` - The vertical half size of the kernel.
///
/// # Returns
///
/// The filtered raster, 8 bpp gray or RGB.
///
/// # Examples
///
/// ```
/// use pixconv_image::{PixelDepth, Raster};
/// use pixconv_imgproc::filter::block_convolve;
///
/// let src = Raster::from_samples([3, 1].into(), PixelDepth::Bit8, &[0, 90, 0]).unwrap();
/// let dst = block_convolve(&src, 1, 0).unwrap();
/// assert_eq!(dst.samples().unwrap().as_slice(), &[30, 30, 30]);
/// ```
pub fn block_convolve(
    src: &Raster,
    half_width: usize,
    half_height: usize,
) -> Result<Raster, FilterError> {
    let window = BoxWindow::fit(src.size(), half_width, half_height)?;
    log::debug!(
        "block convolve {} with {}x{} box",
        src.size(),
        2 * window.half_height + 1,
        2 * window.half_width + 1
    );

    let tiles = [Tile::whole(src.size())];
    let planes = planes(src)?
        .iter()
        .map(|plane| window.mean_plane(plane, &tiles, ExecutionStrategy::Serial))
        .collect::<Result<Vec<_>, _>>()?;
    assemble(src.size(), planes)
}

/// Tiled version of [`block_convolve`].
///
/// The image is split into `n_tiles_x x n_tiles_y` tiles that are filtered
/// independently, each seeding its running sums from the source pixels around
/// it. The result is identical to [`block_convolve`].
///
/// # Errors
///
/// Fails with [`FilterError::InvalidTiling`] when a tile count is zero or when
/// `len / n` is below `max(half, 1)` along an axis, with `half` taken after
/// kernel reduction. The threshold is the half size, not the full window
/// `2 * half + 1`: tiles narrower than the window are accepted and still exact.
pub fn block_convolve_tiled(
    src: &Raster,
    half_width: usize,
    half_height: usize,
    n_tiles_x: usize,
    n_tiles_y: usize,
) -> Result<Raster, FilterError> {
    block_convolve_tiled_with_strategy(
        src,
        half_width,
        half_height,
        n_tiles_x,
        n_tiles_y,
        ExecutionStrategy::default(),
    )
}

/// Tiled block convolution scheduling the tiles with the given execution strategy.
pub fn block_convolve_tiled_with_strategy(
    src: &Raster,
    half_width: usize,
    half_height: usize,
    n_tiles_x: usize,
    n_tiles_y: usize,
    strategy: ExecutionStrategy,
) -> Result<Raster, FilterError> {
    let size = src.size();
    let window = BoxWindow::fit(size, half_width, half_height)?;

    for (n, len, half, axis) in [
        (n_tiles_x, size.width, window.half_width, "width"),
        (n_tiles_y, size.height, window.half_height, "height"),
    ] {
        if n == 0 {
            return Err(FilterError::InvalidTiling(
                n_tiles_x,
                n_tiles_y,
                format!("tile count along {axis} must be positive"),
            ));
        }
        if len / n < half.max(1) {
            return Err(FilterError::InvalidTiling(
                n_tiles_x,
                n_tiles_y,
                format!(
                    "tile {axis} {} smaller than kernel half size {half}",
                    len / n
                ),
            ));
        }
    }

    log::debug!(
        "block convolve {size} with {}x{} box in {n_tiles_x}x{n_tiles_y} tiles",
        2 * window.half_height + 1,
        2 * window.half_width + 1
    );

    let tiles = bands(size.height, n_tiles_y)
        .into_iter()
        .flat_map(|(y0, y1)| {
            bands(size.width, n_tiles_x)
                .into_iter()
                .map(move |(x0, x1)| Tile { x0, x1, y0, y1 })
        })
        .collect::<Vec<_>>();

    let planes = planes(src)?
        .iter()
        .map(|plane| window.mean_plane(plane, &tiles, strategy))
        .collect::<Result<Vec<_>, _>>()?;
    assemble(size, planes)
}

/// Unnormalized window sums of a gray raster.
///
/// Same window and edge policy as [`block_convolve`], without the division
/// by the window area.
pub fn block_sum(
    src: &Raster,
    half_width: usize,
    half_height: usize,
) -> Result<Image<u64, 1>, FilterError> {
    if src.depth() == PixelDepth::Rgb {
        return Err(FilterError::UnsupportedDepth(src.depth(), "block sum"));
    }
    let window = BoxWindow::fit(src.size(), half_width, half_height)?;
    let plane = planes(src)?
        .pop()
        .ok_or_else(|| FilterError::InvalidDimension("no plane to sum".to_string()))?;
    let sums = window.tile_sums(&plane, Tile::whole(src.size()));
    Ok(Image::new(src.size(), sums)?)
}
