use crate::{
    colormap::Colormap,
    depth::PixelDepth,
    error::ImageError,
    image::{Image, ImageSize},
};

/// One of the color samples packed in an [`PixelDepth::Rgb`] word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RgbChannel {
    /// Red sample, the most significant byte.
    Red,
    /// Green sample.
    Green,
    /// Blue sample.
    Blue,
}

impl RgbChannel {
    /// All channels in storage order.
    pub const ALL: [RgbChannel; 3] = [RgbChannel::Red, RgbChannel::Green, RgbChannel::Blue];

    fn shift(&self) -> u32 {
        match self {
            RgbChannel::Red => 24,
            RgbChannel::Green => 16,
            RgbChannel::Blue => 8,
        }
    }
}

/// Pack red, green and blue samples into an RGB word.
pub fn compose_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8)
}

/// Unpack an RGB word into its red, green and blue samples.
pub fn extract_rgb(word: u32) -> (u8, u8, u8) {
    ((word >> 24) as u8, (word >> 16) as u8, (word >> 8) as u8)
}

/// A raster with samples packed into 32-bit words.
///
/// Each line occupies `wpl` words. Sub-word pixels are packed most
/// significant bits first, so pixel 0 of an 8 bpp line lives in the top byte
/// of the first word. Bits past the last pixel of a line are padding and are
/// kept at zero.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    size: ImageSize,
    depth: PixelDepth,
    wpl: usize,
    data: Vec<u32>,
    colormap: Option<Colormap>,
}

impl Raster {
    /// Create a zeroed raster.
    ///
    /// # Errors
    ///
    /// The size must cover at least one pixel.
    pub fn new(size: ImageSize, depth: PixelDepth) -> Result<Self, ImageError> {
        if size.is_empty() {
            return Err(ImageError::EmptyImage(size.width, size.height));
        }
        let wpl = depth.words_per_line(size.width);
        Ok(Self {
            size,
            depth,
            wpl,
            data: vec![0; wpl * size.height],
            colormap: None,
        })
    }

    /// Create a raster from unpacked row-major samples.
    ///
    /// For [`PixelDepth::Rgb`] each sample is a packed RGB word.
    ///
    /// # Errors
    ///
    /// Fails if `samples` does not hold one value per pixel or a value
    /// exceeds the depth.
    pub fn from_samples(
        size: ImageSize,
        depth: PixelDepth,
        samples: &[u32],
    ) -> Result<Self, ImageError> {
        if samples.len() != size.area() {
            return Err(ImageError::InvalidChannelShape(samples.len(), size.area()));
        }
        let mut raster = Self::new(size, depth)?;
        {
            let mut rows = raster.rows_mut();
            for (y, line) in samples.chunks_exact(size.width).enumerate() {
                let words = rows.row_mut(y);
                for (x, &val) in line.iter().enumerate() {
                    if depth != PixelDepth::Rgb && val > depth.max_value() {
                        return Err(ImageError::InvalidSampleValue(val, depth.bits()));
                    }
                    put_sample(words, depth, x, val);
                }
            }
        }
        Ok(raster)
    }

    /// Create an RGB raster from an interleaved 3 channel image.
    pub fn from_rgb_image(image: &Image<u8, 3>) -> Result<Self, ImageError> {
        let samples = image
            .as_slice()
            .chunks_exact(3)
            .map(|px| compose_rgb(px[0], px[1], px[2]))
            .collect::<Vec<u32>>();
        Self::from_samples(image.size(), PixelDepth::Rgb, &samples)
    }

    /// Attach a colormap.
    ///
    /// # Errors
    ///
    /// The colormap must index rasters of the same depth, and every sample
    /// must have an entry.
    pub fn with_colormap(mut self, colormap: Colormap) -> Result<Self, ImageError> {
        if colormap.depth() != self.depth {
            return Err(ImageError::DepthMismatch(
                self.depth.bits(),
                colormap.depth().bits(),
            ));
        }
        for y in 0..self.size.height {
            for x in 0..self.size.width {
                let idx = get_sample(self.row(y), self.depth, x) as usize;
                if idx >= colormap.len() {
                    return Err(ImageError::InvalidColormapIndex(idx, colormap.len()));
                }
            }
        }
        self.colormap = Some(colormap);
        Ok(self)
    }

    /// Get the size of the raster in pixels.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Get the width of the raster in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Get the height of the raster in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Bits per pixel.
    pub fn depth(&self) -> PixelDepth {
        self.depth
    }

    /// Words per line.
    pub fn wpl(&self) -> usize {
        self.wpl
    }

    /// The attached colormap, if any.
    pub fn colormap(&self) -> Option<&Colormap> {
        self.colormap.as_ref()
    }

    /// All packed words, line after line.
    pub fn words(&self) -> &[u32] {
        &self.data
    }

    /// The packed words of line `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y` is not a valid row.
    pub fn row(&self, y: usize) -> &[u32] {
        &self.data[y * self.wpl..(y + 1) * self.wpl]
    }

    /// Borrow the lines mutably.
    ///
    /// Padding bits are cleared when the returned guard goes out of scope,
    /// whichever way the scope is left.
    pub fn rows_mut(&mut self) -> RowsMut<'_> {
        RowsMut { raster: self }
    }

    /// Get the sample at `(x, y)`.
    pub fn get_pixel(&self, x: usize, y: usize) -> Result<u32, ImageError> {
        self.check_bounds(x, y)?;
        Ok(get_sample(self.row(y), self.depth, x))
    }

    /// Set the sample at `(x, y)`.
    pub fn set_pixel(&mut self, x: usize, y: usize, val: u32) -> Result<(), ImageError> {
        self.check_bounds(x, y)?;
        if self.depth != PixelDepth::Rgb && val > self.depth.max_value() {
            return Err(ImageError::InvalidSampleValue(val, self.depth.bits()));
        }
        if let Some(cmap) = &self.colormap {
            if val as usize >= cmap.len() {
                return Err(ImageError::InvalidColormapIndex(val as usize, cmap.len()));
            }
        }
        let (depth, wpl) = (self.depth, self.wpl);
        put_sample(&mut self.data[y * wpl..(y + 1) * wpl], depth, x, val);
        Ok(())
    }

    /// Unpack line `y` into `dst`, one sample per pixel.
    ///
    /// # Panics
    ///
    /// Panics if `y` is not a valid row or `dst` is shorter than the width.
    pub fn unpack_row(&self, y: usize, dst: &mut [u32]) {
        let words = self.row(y);
        for (x, out) in dst.iter_mut().take(self.size.width).enumerate() {
            *out = get_sample(words, self.depth, x);
        }
    }

    /// Unpack every sample into a direct single channel image.
    pub fn samples(&self) -> Result<Image<u32, 1>, ImageError> {
        let mut data = vec![0u32; self.size.area()];
        for (y, line) in data.chunks_exact_mut(self.size.width).enumerate() {
            self.unpack_row(y, line);
        }
        Image::new(self.size, data)
    }

    /// Resolve a colormap to direct 8 bpp gray samples.
    ///
    /// A raster without colormap is returned as a copy.
    pub fn to_gray(&self) -> Result<Raster, ImageError> {
        let Some(cmap) = &self.colormap else {
            return Ok(self.clone());
        };

        log::debug!(
            "resolving {} entry colormap of {} raster to gray",
            cmap.len(),
            self.depth
        );

        let table = cmap.gray_table()?;
        let mut gray = Raster::new(self.size, PixelDepth::Bit8)?;
        let mut line = vec![0u32; self.size.width];
        {
            let mut rows = gray.rows_mut();
            for y in 0..self.size.height {
                self.unpack_row(y, &mut line);
                let words = rows.row_mut(y);
                for (x, &idx) in line.iter().enumerate() {
                    let val = *table
                        .get(idx as usize)
                        .ok_or(ImageError::InvalidColormapIndex(idx as usize, table.len()))?;
                    put_sample(words, PixelDepth::Bit8, x, val as u32);
                }
            }
        }
        Ok(gray)
    }

    /// Extract one color channel of an RGB raster as an 8 bpp raster.
    pub fn rgb_component(&self, channel: RgbChannel) -> Result<Raster, ImageError> {
        self.expect_depth(PixelDepth::Rgb)?;
        let mut out = Raster::new(self.size, PixelDepth::Bit8)?;
        let shift = channel.shift();
        {
            let mut rows = out.rows_mut();
            for y in 0..self.size.height {
                let src = self.row(y);
                let dst = rows.row_mut(y);
                for (x, &word) in src.iter().enumerate() {
                    put_sample(dst, PixelDepth::Bit8, x, (word >> shift) & 0xff);
                }
            }
        }
        Ok(out)
    }

    /// Combine three 8 bpp rasters into an RGB raster.
    pub fn from_rgb_components(
        red: &Raster,
        green: &Raster,
        blue: &Raster,
    ) -> Result<Raster, ImageError> {
        for plane in [red, green, blue] {
            plane.expect_depth(PixelDepth::Bit8)?;
            if plane.size() != red.size() {
                return Err(ImageError::InvalidImageSize(
                    plane.width(),
                    plane.height(),
                    red.width(),
                    red.height(),
                ));
            }
        }

        let mut out = Raster::new(red.size(), PixelDepth::Rgb)?;
        {
            let mut rows = out.rows_mut();
            for y in 0..red.height() {
                let (r, g, b) = (red.row(y), green.row(y), blue.row(y));
                for (x, word) in rows.row_mut(y).iter_mut().enumerate() {
                    *word = compose_rgb(
                        get_sample(r, PixelDepth::Bit8, x) as u8,
                        get_sample(g, PixelDepth::Bit8, x) as u8,
                        get_sample(b, PixelDepth::Bit8, x) as u8,
                    );
                }
            }
        }
        Ok(out)
    }

    /// Unpack an RGB raster into an interleaved 3 channel image.
    pub fn to_rgb_image(&self) -> Result<Image<u8, 3>, ImageError> {
        self.expect_depth(PixelDepth::Rgb)?;
        let mut data = Vec::with_capacity(self.size.area() * 3);
        for y in 0..self.size.height {
            for &word in self.row(y) {
                let (r, g, b) = extract_rgb(word);
                data.extend_from_slice(&[r, g, b]);
            }
        }
        Image::new(self.size, data)
    }

    fn expect_depth(&self, depth: PixelDepth) -> Result<(), ImageError> {
        if self.depth != depth {
            return Err(ImageError::DepthMismatch(depth.bits(), self.depth.bits()));
        }
        Ok(())
    }

    fn check_bounds(&self, x: usize, y: usize) -> Result<(), ImageError> {
        if x >= self.size.width || y >= self.size.height {
            return Err(ImageError::PixelIndexOutOfBounds(
                x,
                y,
                self.size.width,
                self.size.height,
            ));
        }
        Ok(())
    }

    fn clear_padding(&mut self) {
        let used_bits = self.size.width * self.depth.bits() as usize;
        let tail = used_bits % 32;
        if tail == 0 {
            return;
        }
        let mask = !(u32::MAX >> tail);
        let last = used_bits / 32;
        for line in self.data.chunks_exact_mut(self.wpl) {
            line[last] &= mask;
        }
    }
}

/// Scoped mutable access to the packed lines of a [`Raster`].
///
/// Dropping the guard zeroes the padding bits past the last pixel of every
/// line.
pub struct RowsMut<'a> {
    raster: &'a mut Raster,
}

impl RowsMut<'_> {
    /// Number of lines.
    pub fn len(&self) -> usize {
        self.raster.size.height
    }

    /// Whether there are no lines.
    pub fn is_empty(&self) -> bool {
        self.raster.size.height == 0
    }

    /// Depth of the samples in each line.
    pub fn depth(&self) -> PixelDepth {
        self.raster.depth
    }

    /// The packed words of line `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y` is not a valid row.
    pub fn row_mut(&mut self, y: usize) -> &mut [u32] {
        let wpl = self.raster.wpl;
        &mut self.raster.data[y * wpl..(y + 1) * wpl]
    }

    /// Iterate over all lines.
    pub fn iter_mut(&mut self) -> std::slice::ChunksExactMut<'_, u32> {
        let wpl = self.raster.wpl;
        self.raster.data.chunks_exact_mut(wpl)
    }

    /// Write unpacked samples into line `y`.
    ///
    /// Samples are masked to the depth.
    pub fn pack_row(&mut self, y: usize, samples: &[u32]) {
        let depth = self.raster.depth;
        let width = self.raster.size.width;
        let mask = depth.max_value();
        let words = self.row_mut(y);
        for (x, &val) in samples.iter().take(width).enumerate() {
            let val = if depth == PixelDepth::Rgb { val } else { val & mask };
            put_sample(words, depth, x, val);
        }
    }
}

impl Drop for RowsMut<'_> {
    fn drop(&mut self) {
        self.raster.clear_padding();
    }
}

fn get_sample(words: &[u32], depth: PixelDepth, x: usize) -> u32 {
    match depth {
        PixelDepth::Bit1 => (words[x >> 5] >> (31 - (x & 31))) & 0x1,
        PixelDepth::Bit2 => (words[x >> 4] >> (2 * (15 - (x & 15)))) & 0x3,
        PixelDepth::Bit4 => (words[x >> 3] >> (4 * (7 - (x & 7)))) & 0xf,
        PixelDepth::Bit8 => (words[x >> 2] >> (8 * (3 - (x & 3)))) & 0xff,
        PixelDepth::Bit16 => (words[x >> 1] >> (16 * (1 - (x & 1)))) & 0xffff,
        PixelDepth::Bit32 | PixelDepth::Rgb => words[x],
    }
}

fn put_sample(words: &mut [u32], depth: PixelDepth, x: usize, val: u32) {
    let (idx, shift, mask) = match depth {
        PixelDepth::Bit1 => (x >> 5, 31 - (x & 31), 0x1),
        PixelDepth::Bit2 => (x >> 4, 2 * (15 - (x & 15)), 0x3),
        PixelDepth::Bit4 => (x >> 3, 4 * (7 - (x & 7)), 0xf),
        PixelDepth::Bit8 => (x >> 2, 8 * (3 - (x & 3)), 0xff),
        PixelDepth::Bit16 => (x >> 1, 16 * (1 - (x & 1)), 0xffff),
        PixelDepth::Bit32 | PixelDepth::Rgb => {
            words[x] = val;
            return;
        }
    };
    let word = &mut words[idx];
    *word = (*word & !(mask << shift)) | ((val & mask) << shift);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_layout() -> Result<(), ImageError> {
        let raster = Raster::from_samples([5, 2].into(), PixelDepth::Bit8, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])?;
        assert_eq!(raster.wpl(), 2);
        assert_eq!(raster.row(0), &[0x01020304, 0x05000000]);
        assert_eq!(raster.row(1), &[0x06070809, 0x0a000000]);
        assert_eq!(raster.get_pixel(4, 1)?, 10);
        Ok(())
    }

    #[test]
    fn test_raster_subbyte_depths() -> Result<(), ImageError> {
        for depth in [PixelDepth::Bit1, PixelDepth::Bit2, PixelDepth::Bit4, PixelDepth::Bit16] {
            let size = ImageSize {
                width: 37,
                height: 3,
            };
            let max = depth.max_value();
            let samples = (0..size.area() as u32).map(|i| i % (max + 1)).collect::<Vec<_>>();
            let raster = Raster::from_samples(size, depth, &samples)?;
            assert_eq!(raster.samples()?.as_slice(), samples.as_slice());
        }
        Ok(())
    }

    #[test]
    fn test_raster_rejects_bad_samples() {
        let res = Raster::from_samples([2, 1].into(), PixelDepth::Bit2, &[1, 4]);
        assert_eq!(res, Err(ImageError::InvalidSampleValue(4, 2)));
        let res = Raster::new([0, 3].into(), PixelDepth::Bit8);
        assert_eq!(res, Err(ImageError::EmptyImage(0, 3)));
    }

    #[test]
    fn test_rows_mut_clears_padding() -> Result<(), ImageError> {
        let mut raster = Raster::new([3, 2].into(), PixelDepth::Bit8)?;
        {
            let mut rows = raster.rows_mut();
            for line in rows.iter_mut() {
                line[0] = u32::MAX;
            }
        }
        assert_eq!(raster.row(0), &[0xffffff00]);
        assert_eq!(raster.row(1), &[0xffffff00]);
        Ok(())
    }

    #[test]
    fn test_rows_mut_clears_padding_on_early_exit() -> Result<(), ImageError> {
        fn fill_then_fail(raster: &mut Raster) -> Result<(), ImageError> {
            let mut rows = raster.rows_mut();
            rows.row_mut(0)[0] = u32::MAX;
            Err(ImageError::CastError)
        }

        let mut raster = Raster::new([1, 1].into(), PixelDepth::Bit4)?;
        assert!(fill_then_fail(&mut raster).is_err());
        assert_eq!(raster.row(0), &[0xf0000000]);
        Ok(())
    }

    #[test]
    fn test_colormap_to_gray() -> Result<(), ImageError> {
        let cmap = Colormap::gray_ramp(PixelDepth::Bit2)?;
        let raster =
            Raster::from_samples([4, 1].into(), PixelDepth::Bit2, &[0, 1, 2, 3])?.with_colormap(cmap)?;
        let gray = raster.to_gray()?;
        assert_eq!(gray.depth(), PixelDepth::Bit8);
        assert!(gray.colormap().is_none());
        assert_eq!(gray.samples()?.as_slice(), &[0, 85, 170, 255]);
        Ok(())
    }

    #[test]
    fn test_colormap_index_checked() -> Result<(), ImageError> {
        let mut cmap = Colormap::new(PixelDepth::Bit2)?;
        cmap.add_color(0, 0, 0)?;
        let res = Raster::from_samples([2, 1].into(), PixelDepth::Bit2, &[0, 1])?.with_colormap(cmap);
        assert_eq!(res, Err(ImageError::InvalidColormapIndex(1, 1)));
        Ok(())
    }

    #[test]
    fn test_rgb_components() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new([2, 1].into(), vec![10, 20, 30, 40, 50, 60])?;
        let rgb = Raster::from_rgb_image(&image)?;
        assert_eq!(rgb.get_pixel(1, 0)?, compose_rgb(40, 50, 60));

        let green = rgb.rgb_component(RgbChannel::Green)?;
        assert_eq!(green.samples()?.as_slice(), &[20, 50]);

        let red = rgb.rgb_component(RgbChannel::Red)?;
        let blue = rgb.rgb_component(RgbChannel::Blue)?;
        let merged = Raster::from_rgb_components(&red, &green, &blue)?;
        assert_eq!(merged, rgb);
        assert_eq!(merged.to_rgb_image()?, image);

        assert_eq!(
            green.rgb_component(RgbChannel::Red),
            Err(ImageError::DepthMismatch(32, 8))
        );
        Ok(())
    }
}
