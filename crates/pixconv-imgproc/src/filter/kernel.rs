use std::{fmt, path::Path, str::FromStr};

use pixconv_image::{ImageSize, PixelDepth, Raster};

use super::FilterError;

/// Below this magnitude a kernel sum is treated as zero.
pub(crate) const ZERO_SUM_EPS: f64 = 1e-5;

/// Gray level of the anchor marker in [`Kernel::render`].
const ANCHOR_MARK: u32 = 128;

/// A 2D convolution kernel.
///
/// A dense row-major grid of `height x width` signed coefficients with an
/// anchor `(cy, cx)`: the cell aligned with the output pixel being computed.
/// Kernels are immutable; every algebra operation returns a new kernel.
///
/// The text form (see [`FromStr`] and [`fmt::Display`]) is
///
/// ```text
/// # comment lines start with '#'
/// <height> <width>
/// <cy> <cx>
/// <height lines of width numbers>
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    height: usize,
    width: usize,
    cy: usize,
    cx: usize,
    data: Vec<f64>,
}

impl Kernel {
    /// Create a kernel with every coefficient set to zero.
    ///
    /// # Errors
    ///
    /// Fails with [`FilterError::InvalidDimension`] for an empty kernel and
    /// with [`FilterError::InvalidAnchor`] when the anchor is out of bounds.
    pub fn new(height: usize, width: usize, cy: usize, cx: usize) -> Result<Self, FilterError> {
        let count = height.checked_mul(width).ok_or_else(|| {
            FilterError::InvalidDimension(format!("kernel size {height}x{width} overflows"))
        })?;
        Self::from_data(height, width, cy, cx, vec![0.0; count])
    }

    /// Create a kernel from `height * width` coefficients in row-major order.
    ///
    /// # Arguments
    ///
    /// * `height` - Number of kernel rows.
    /// * `width` - Number of kernel columns.
    /// * `cy` - Anchor row.
    /// * `cx` - Anchor column.
    /// * `data` - The coefficients.
    ///
    /// # Examples
    ///
    /// ```
    /// use pixconv_imgproc::filter::Kernel;
    ///
    /// let kernel = Kernel::from_data(1, 3, 0, 1, vec![1.0, 2.0, 1.0]).unwrap();
    /// assert_eq!(kernel.sum(), 4.0);
    /// assert_eq!(kernel.get(0, 1), Some(2.0));
    /// ```
    pub fn from_data(
        height: usize,
        width: usize,
        cy: usize,
        cx: usize,
        data: Vec<f64>,
    ) -> Result<Self, FilterError> {
        if height == 0 || width == 0 {
            return Err(FilterError::InvalidDimension(format!(
                "kernel size {height}x{width} must be positive"
            )));
        }

        if cy >= height || cx >= width {
            return Err(FilterError::InvalidAnchor(cy, cx, height, width));
        }

        if height.checked_mul(width) != Some(data.len()) {
            return Err(FilterError::InvalidDimension(format!(
                "{} coefficients for a {height}x{width} kernel",
                data.len()
            )));
        }

        Ok(Self {
            height,
            width,
            cy,
            cx,
            data,
        })
    }

    /// Create a kernel from whitespace separated coefficients.
    ///
    /// # Errors
    ///
    /// Fails with [`FilterError::ParseError`] if a token is not a number or
    /// the number of values is not `height * width`.
    pub fn from_str_values(
        height: usize,
        width: usize,
        cy: usize,
        cx: usize,
        text: &str,
    ) -> Result<Self, FilterError> {
        let count = height.checked_mul(width).ok_or_else(|| {
            FilterError::ParseError(1, format!("kernel size {height}x{width} overflows"))
        })?;
        let data = parse_numbers(1, text)?;
        if data.len() != count {
            return Err(FilterError::ParseError(
                1,
                format!(
                    "expected {count} values for a {height}x{width} kernel, found {}",
                    data.len()
                ),
            ));
        }
        Self::from_data(height, width, cy, cx, data)
    }

    /// Create a kernel whose coefficients are the samples of an image.
    ///
    /// Colormapped rasters are resolved to gray first.
    pub fn from_image(raster: &Raster, cy: usize, cx: usize) -> Result<Self, FilterError> {
        if raster.depth() == PixelDepth::Rgb {
            return Err(FilterError::UnsupportedDepth(
                raster.depth(),
                "kernel from image",
            ));
        }

        let gray = raster.to_gray()?;
        let data = gray
            .samples()?
            .as_slice()
            .iter()
            .map(|&v| v as f64)
            .collect();

        Self::from_data(gray.height(), gray.width(), cy, cx, data)
    }

    /// Read a kernel in text form from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FilterError> {
        std::fs::read_to_string(path)?.parse()
    }

    /// Write the kernel in text form to a file.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), FilterError> {
        std::fs::write(path, self.to_string())?;
        Ok(())
    }

    /// Create the 2D kernel of a separable pair.
    ///
    /// `kernel_x` must be a single row and `kernel_y` a single column; the
    /// result takes its anchor column from `kernel_x` and its anchor row from
    /// `kernel_y`.
    pub fn outer(kernel_x: &Kernel, kernel_y: &Kernel) -> Result<Self, FilterError> {
        if kernel_x.height != 1 || kernel_y.width != 1 {
            return Err(FilterError::InvalidDimension(format!(
                "separable pair must be 1xN and Mx1, got {}x{} and {}x{}",
                kernel_x.height, kernel_x.width, kernel_y.height, kernel_y.width
            )));
        }

        let data = kernel_y
            .data
            .iter()
            .flat_map(|&ky| kernel_x.data.iter().map(move |&kx| ky * kx))
            .collect();

        Self::from_data(
            kernel_y.height,
            kernel_x.width,
            kernel_y.cy,
            kernel_x.cx,
            data,
        )
    }

    /// Number of kernel rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of kernel columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Anchor row.
    pub fn cy(&self) -> usize {
        self.cy
    }

    /// Anchor column.
    pub fn cx(&self) -> usize {
        self.cx
    }

    /// The coefficients in row-major order.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// The coefficient at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.height || col >= self.width {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    /// Sum of all coefficients.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Smallest and largest coefficient.
    pub fn min_max(&self) -> (f64, f64) {
        self.data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Scale the coefficients so that they sum to `target`.
    ///
    /// A kernel whose sum is (nearly) zero cannot be rescaled and is returned
    /// unchanged.
    pub fn normalize(&self, target: f64) -> Kernel {
        let sum = self.sum();
        if sum.abs() < ZERO_SUM_EPS {
            log::warn!("kernel sum {sum} is ~0; not normalizing");
            return self.clone();
        }

        let factor = target / sum;
        Kernel {
            data: self.data.iter().map(|v| v * factor).collect(),
            ..self.clone()
        }
    }

    /// Rotate the kernel by 180 degrees about its center.
    ///
    /// The anchor moves with its cell, so correlating with the inverted
    /// kernel is a true convolution with the original one.
    pub fn invert(&self) -> Kernel {
        Kernel {
            height: self.height,
            width: self.width,
            cy: self.height - 1 - self.cy,
            cx: self.width - 1 - self.cx,
            data: self.data.iter().rev().copied().collect(),
        }
    }

    /// Compute `a * self + b * other` coefficient-wise.
    ///
    /// # Errors
    ///
    /// Both kernels must have the same size and anchor.
    pub fn linear_combination(&self, a: f64, other: &Kernel, b: f64) -> Result<Kernel, FilterError> {
        if self.height != other.height
            || self.width != other.width
            || self.cy != other.cy
            || self.cx != other.cx
        {
            return Err(FilterError::InvalidDimension(format!(
                "cannot combine {}x{} kernel anchored at ({}, {}) with {}x{} kernel anchored at ({}, {})",
                self.height, self.width, self.cy, self.cx, other.height, other.width, other.cy, other.cx
            )));
        }

        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&x, &y)| a * x + b * y)
            .collect();

        Ok(Kernel {
            data,
            ..self.clone()
        })
    }

    /// Render the kernel as an 8 bpp raster for inspection.
    ///
    /// Every coefficient becomes a `cell_size` square whose gray level is
    /// proportional to its magnitude, cells are separated by black grid lines
    /// `grid` pixels wide, and the anchor cell is marked with a gray cross.
    pub fn render(&self, cell_size: usize, grid: usize) -> Result<Raster, FilterError> {
        if cell_size == 0 {
            return Err(FilterError::InvalidDimension(
                "cell size must be positive".to_string(),
            ));
        }

        let max_abs = self.data.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let period = cell_size + grid;
        let size = ImageSize {
            width: self.width * cell_size + (self.width + 1) * grid,
            height: self.height * cell_size + (self.height + 1) * grid,
        };

        // cell index and offset inside the cell, None on grid lines
        let locate = |p: usize, n: usize| -> Option<(usize, usize)> {
            let (q, r) = (p / period, p % period);
            (r >= grid && q < n).then(|| (q, r - grid))
        };

        let mut raster = Raster::new(size, PixelDepth::Bit8)?;
        let mut line = vec![0u32; size.width];
        {
            let mut rows = raster.rows_mut();
            for y in 0..size.height {
                line.fill(0);
                if let Some((row, dy)) = locate(y, self.height) {
                    for (x, out) in line.iter_mut().enumerate() {
                        let Some((col, dx)) = locate(x, self.width) else {
                            continue;
                        };
                        let is_mark = row == self.cy
                            && col == self.cx
                            && cell_size >= 3
                            && (dy == cell_size / 2 || dx == cell_size / 2);
                        *out = if is_mark {
                            ANCHOR_MARK
                        } else if max_abs > 0.0 {
                            let v = self.data[row * self.width + col].abs();
                            (255.0 * v / max_abs + 0.5) as u32
                        } else {
                            0
                        };
                    }
                }
                rows.pack_row(y, &line);
            }
        }

        Ok(raster)
    }
}

impl fmt::Display for Kernel {
    /// Write the kernel in text form.
    ///
    /// Coefficients use the shortest decimal that reads back to the same
    /// `f64`, so parsing the output reproduces the kernel exactly.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.height, self.width)?;
        writeln!(f, "{} {}", self.cy, self.cx)?;
        for row in self.data.chunks_exact(self.width) {
            let line = row
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl FromStr for Kernel {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));
        let last_line = s.lines().count();

        let (ln, dims) = lines
            .next()
            .ok_or_else(|| FilterError::ParseError(last_line, "missing size line".to_string()))?;
        let (height, width) = parse_pair(ln, dims)?;
        if height.checked_mul(width).is_none() {
            return Err(FilterError::ParseError(
                ln,
                format!("kernel size {height}x{width} overflows"),
            ));
        }

        let (ln, anchor) = lines
            .next()
            .ok_or_else(|| FilterError::ParseError(last_line, "missing anchor line".to_string()))?;
        let (cy, cx) = parse_pair(ln, anchor)?;

        // sized by the rows actually read, not by the header
        let mut data = Vec::new();
        for r in 0..height {
            let (ln, row) = lines.next().ok_or_else(|| {
                FilterError::ParseError(
                    last_line,
                    format!("expected {height} rows of coefficients, found {r}"),
                )
            })?;
            let values = parse_numbers(ln, row)?;
            if values.len() != width {
                return Err(FilterError::ParseError(
                    ln,
                    format!("expected {width} coefficients, found {}", values.len()),
                ));
            }
            data.extend(values);
        }

        if let Some((ln, _)) = lines.next() {
            return Err(FilterError::ParseError(
                ln,
                format!("unexpected data after {height} rows"),
            ));
        }

        Kernel::from_data(height, width, cy, cx, data)
    }
}

fn parse_numbers(ln: usize, text: &str) -> Result<Vec<f64>, FilterError> {
    text.split_whitespace()
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|e| FilterError::ParseError(ln, format!("'{tok}': {e}")))
        })
        .collect()
}

fn parse_pair(ln: usize, text: &str) -> Result<(usize, usize), FilterError> {
    let values = text
        .split_whitespace()
        .map(|tok| {
            tok.parse::<usize>()
                .map_err(|e| FilterError::ParseError(ln, format!("'{tok}': {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match values.as_slice() {
        [a, b] => Ok((*a, *b)),
        _ => Err(FilterError::ParseError(
            ln,
            format!("expected 2 integers, found {}", values.len()),
        )),
    }
}
