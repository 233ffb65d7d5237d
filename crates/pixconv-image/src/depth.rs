use crate::error::ImageError;

/// Bits per pixel of a [`Raster`](crate::Raster).
///
/// The set of depths is closed: every operation that depends on the depth
/// matches on this enum instead of dispatching through a trait.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelDepth {
    /// 1 bit per pixel (binary).
    Bit1,
    /// 2 bits per pixel.
    Bit2,
    /// 4 bits per pixel.
    Bit4,
    /// 8 bits per pixel.
    Bit8,
    /// 16 bits per pixel.
    Bit16,
    /// 32 bits per pixel, a single scalar sample.
    Bit32,
    /// 32 bits per pixel holding 8-bit red, green and blue samples.
    Rgb,
}

impl PixelDepth {
    /// Number of storage bits one pixel takes.
    pub fn bits(&self) -> u32 {
        match self {
            PixelDepth::Bit1 => 1,
            PixelDepth::Bit2 => 2,
            PixelDepth::Bit4 => 4,
            PixelDepth::Bit8 => 8,
            PixelDepth::Bit16 => 16,
            PixelDepth::Bit32 | PixelDepth::Rgb => 32,
        }
    }

    /// Largest sample value representable at this depth.
    ///
    /// For [`PixelDepth::Rgb`] this is the per-channel maximum.
    pub fn max_value(&self) -> u32 {
        match self {
            PixelDepth::Bit32 => u32::MAX,
            PixelDepth::Rgb => 255,
            d => (1u32 << d.bits()) - 1,
        }
    }

    /// Scalar depth for a number of bits.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::UnsupportedDepth`] for anything outside 1/2/4/8/16/32.
    pub fn from_bits(bits: u32) -> Result<Self, ImageError> {
        match bits {
            1 => Ok(PixelDepth::Bit1),
            2 => Ok(PixelDepth::Bit2),
            4 => Ok(PixelDepth::Bit4),
            8 => Ok(PixelDepth::Bit8),
            16 => Ok(PixelDepth::Bit16),
            32 => Ok(PixelDepth::Bit32),
            _ => Err(ImageError::UnsupportedDepth(bits)),
        }
    }

    /// Whether several pixels share one byte.
    pub fn is_subbyte(&self) -> bool {
        self.bits() < 8
    }

    /// Number of 32-bit words needed for one line of `width` pixels.
    pub fn words_per_line(&self, width: usize) -> usize {
        (width * self.bits() as usize).div_ceil(32)
    }
}

impl std::fmt::Display for PixelDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PixelDepth::Rgb => write!(f, "rgb"),
            d => write!(f, "{} bpp", d.bits()),
        }
    }
}
