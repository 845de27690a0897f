use crate::AboveMaxLen;

/// The error type for palette extraction and swatch rendering.
///
/// Color space round trips never fail: out of gamut or non-finite channels are
/// clamped instead of being reported. Decoding and encoding image files is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaletteError {
    /// The requested palette size is zero or more than the number of colors available.
    #[error("palette size {k} is outside the valid range of 1..={max}")]
    InvalidParameter {
        /// The requested palette size.
        k: u16,
        /// The largest palette size the image supports.
        max: u16,
    },
    /// The image has no pixels to take colors from.
    #[error("the image has no pixels")]
    EmptyInput,
    /// The swatch size is zero or the strip would not fit in an image.
    #[error("invalid swatch size {swatch_size} for a palette of {colors} colors")]
    InvalidSwatchSize {
        /// The requested swatch size.
        swatch_size: u32,
        /// The number of colors in the palette.
        colors: usize,
    },
    /// The image has more pixels than are supported.
    #[error("the image is too large: {0}")]
    TooManyPixels(#[from] AboveMaxLen<u32>),
}
