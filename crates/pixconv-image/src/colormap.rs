use crate::{depth::PixelDepth, error::ImageError};

/// Weights used to collapse a color entry to a gray level.
const RED_WEIGHT: f32 = 0.3;
const GREEN_WEIGHT: f32 = 0.5;
const BLUE_WEIGHT: f32 = 0.2;

/// One color lookup table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgbEntry {
    /// Red component.
    pub r: u8,
    /// Green component.
    pub g: u8,
    /// Blue component.
    pub b: u8,
}

/// A color lookup table attached to an indexed raster.
///
/// Index samples of a colormapped raster are resolved through the table to
/// direct values before any filtering happens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Colormap {
    depth: PixelDepth,
    entries: Vec<RgbEntry>,
}

impl Colormap {
    /// Create an empty colormap for rasters of the given depth.
    ///
    /// # Errors
    ///
    /// Only 1, 2, 4 and 8 bpp rasters can carry a colormap.
    pub fn new(depth: PixelDepth) -> Result<Self, ImageError> {
        match depth {
            PixelDepth::Bit1 | PixelDepth::Bit2 | PixelDepth::Bit4 | PixelDepth::Bit8 => {
                Ok(Self {
                    depth,
                    entries: Vec::new(),
                })
            }
            d => Err(ImageError::UnsupportedDepth(d.bits())),
        }
    }

    /// Create a linear gray ramp covering every index of the depth.
    pub fn gray_ramp(depth: PixelDepth) -> Result<Self, ImageError> {
        let mut cmap = Self::new(depth)?;
        let n = cmap.capacity();
        for i in 0..n {
            let val = if n > 1 { (i * 255 / (n - 1)) as u8 } else { 0 };
            cmap.add_color(val, val, val)?;
        }
        Ok(cmap)
    }

    /// Depth of the rasters this colormap indexes.
    pub fn depth(&self) -> PixelDepth {
        self.depth
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        1usize << self.depth.bits()
    }

    /// Number of entries in use.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the colormap has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry and return its index.
    pub fn add_color(&mut self, r: u8, g: u8, b: u8) -> Result<usize, ImageError> {
        if self.entries.len() >= self.capacity() {
            return Err(ImageError::ColormapFull(self.capacity()));
        }
        self.entries.push(RgbEntry { r, g, b });
        Ok(self.entries.len() - 1)
    }

    /// Get the entry at `index`.
    pub fn get(&self, index: usize) -> Result<RgbEntry, ImageError> {
        self.entries
            .get(index)
            .copied()
            .ok_or(ImageError::InvalidColormapIndex(index, self.entries.len()))
    }

    /// Whether every entry has equal red, green and blue components.
    pub fn is_gray(&self) -> bool {
        self.entries.iter().all(|e| e.r == e.g && e.g == e.b)
    }

    /// Gray level an index resolves to.
    ///
    /// Gray tables return the entry's level as is; color tables use a
    /// weighted sum of the components.
    pub fn gray_value(&self, index: usize) -> Result<u8, ImageError> {
        let entry = self.get(index)?;
        if entry.r == entry.g && entry.g == entry.b {
            return Ok(entry.r);
        }
        let val = RED_WEIGHT * entry.r as f32
            + GREEN_WEIGHT * entry.g as f32
            + BLUE_WEIGHT * entry.b as f32
            + 0.5;
        Ok(val.min(255.0) as u8)
    }

    /// Gray level for every entry, in index order.
    pub fn gray_table(&self) -> Result<Vec<u8>, ImageError> {
        (0..self.entries.len()).map(|i| self.gray_value(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colormap_capacity() -> Result<(), ImageError> {
        let mut cmap = Colormap::new(PixelDepth::Bit1)?;
        cmap.add_color(0, 0, 0)?;
        cmap.add_color(255, 255, 255)?;
        assert_eq!(cmap.add_color(1, 1, 1), Err(ImageError::ColormapFull(2)));
        assert!(Colormap::new(PixelDepth::Bit16).is_err());
        Ok(())
    }

    #[test]
    fn test_gray_ramp() -> Result<(), ImageError> {
        let cmap = Colormap::gray_ramp(PixelDepth::Bit2)?;
        assert_eq!(cmap.gray_table()?, vec![0, 85, 170, 255]);
        assert!(cmap.is_gray());
        Ok(())
    }

    #[test]
    fn test_color_to_gray() -> Result<(), ImageError> {
        let mut cmap = Colormap::new(PixelDepth::Bit8)?;
        let idx = cmap.add_color(100, 200, 50)?;
        // 0.3 * 100 + 0.5 * 200 + 0.2 * 50 = 140
        assert_eq!(cmap.gray_value(idx)?, 140);
        assert_eq!(
            cmap.gray_value(7),
            Err(ImageError::InvalidColormapIndex(7, 1))
        );
        Ok(())
    }
}
