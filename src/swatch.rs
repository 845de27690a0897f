//! Rendering of ordered palettes into strips of solid color swatches.

use crate::{OrderedPalette, PaletteError};
use image::{GenericImage, Rgb, RgbImage};

/// The geometry of a swatch strip.
///
/// Each palette color is drawn as a `swatch_width` wide rectangle spanning the full `height`
/// of the strip, placed left to right in palette order.
/// The strip is at least `min_width` pixels wide; any area right of the last swatch stays black.
///
/// # Examples
/// ```
/// # use img2palette::SwatchLayout;
/// let layout = SwatchLayout::square(3);
/// assert_eq!(layout.dimensions(4), Some((12, 3)));
///
/// let layout = SwatchLayout::PREVIEW;
/// assert_eq!(layout.dimensions(2), Some((60, 40)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwatchLayout {
    /// The width of each swatch.
    pub swatch_width: u32,
    /// The height of the strip (and of each swatch).
    pub height: u32,
    /// The minimum width of the strip.
    pub min_width: u32,
}

impl SwatchLayout {
    /// The layout used for on-screen previews:
    /// 20 pixel wide swatches in a strip that is 40 pixels tall and at least 60 pixels wide.
    pub const PREVIEW: Self = Self {
        swatch_width: 20,
        height: 40,
        min_width: 60,
    };

    /// The default swatch size for [`SwatchLayout::square`].
    pub const DEFAULT_SWATCH_SIZE: u32 = 3;

    /// A layout of abutting `size` by `size` squares.
    #[must_use]
    pub const fn square(size: u32) -> Self {
        Self {
            swatch_width: size,
            height: size,
            min_width: 0,
        }
    }

    /// Returns the width and height of the strip for a palette of `colors` colors,
    /// or `None` if the swatches are empty or the width would overflow a `u32`.
    #[must_use]
    pub fn dimensions(&self, colors: usize) -> Option<(u32, u32)> {
        if self.swatch_width == 0 || self.height == 0 {
            return None;
        }

        let colors = u32::try_from(colors).ok()?;
        let width = self.swatch_width.checked_mul(colors)?.max(self.min_width);
        Some((width, self.height))
    }
}

impl Default for SwatchLayout {
    fn default() -> Self {
        Self::square(Self::DEFAULT_SWATCH_SIZE)
    }
}

/// Returns the error for a layout that cannot hold a palette of `colors` colors.
fn invalid_layout(layout: &SwatchLayout, colors: usize) -> PaletteError {
    PaletteError::InvalidSwatchSize {
        swatch_size: layout.swatch_width.min(layout.height),
        colors,
    }
}

/// Draws the swatches of `palette` onto `sink`, starting at its top left corner.
///
/// Pixels of `sink` outside of the swatches are left untouched.
///
/// # Errors
/// Returns [`PaletteError::InvalidSwatchSize`] if the layout has an empty swatch,
/// or if the swatches do not fit into `sink`.
pub fn paint_swatches<I>(
    palette: &OrderedPalette,
    layout: SwatchLayout,
    sink: &mut I,
) -> Result<(), PaletteError>
where
    I: GenericImage<Pixel = Rgb<u8>>,
{
    let (width, height) = layout
        .dimensions(palette.len())
        .ok_or_else(|| invalid_layout(&layout, palette.len()))?;

    if sink.width() < width || sink.height() < height {
        return Err(invalid_layout(&layout, palette.len()));
    }

    for (i, color) in (0..).zip(palette.to_srgb8()) {
        let pixel = Rgb([color.red, color.green, color.blue]);
        let x0 = i * layout.swatch_width;
        for y in 0..height {
            for x in x0..(x0 + layout.swatch_width) {
                sink.put_pixel(x, y, pixel);
            }
        }
    }

    Ok(())
}

/// Renders `palette` into a new image with the given `layout`.
///
/// # Errors
/// Returns [`PaletteError::InvalidSwatchSize`] if the layout has an empty swatch
/// or the strip width would overflow a `u32`.
pub fn render_swatch_strip_with(
    palette: &OrderedPalette,
    layout: SwatchLayout,
) -> Result<RgbImage, PaletteError> {
    let (width, height) = layout
        .dimensions(palette.len())
        .ok_or_else(|| invalid_layout(&layout, palette.len()))?;

    let mut strip = RgbImage::new(width, height);
    paint_swatches(palette, layout, &mut strip)?;
    Ok(strip)
}

/// Renders `palette` into a `k * swatch_size` by `swatch_size` image of abutting squares,
/// where `k` is the number of colors in the palette.
///
/// Each normalized channel `v` becomes `round(v * 255)`, with halves rounded away from zero.
///
/// # Errors
/// Returns [`PaletteError::InvalidSwatchSize`] if `swatch_size` is `0`
/// or the strip width would overflow a `u32`.
///
/// # Examples
/// ```
/// # use img2palette::{render_swatch_strip, sequence::sequence};
/// # use palette::Srgb;
/// # fn main() -> Result<(), img2palette::PaletteError> {
/// let palette = sequence(&[Srgb::new(255, 255, 255), Srgb::new(0, 0, 0)]);
/// let strip = render_swatch_strip(&palette, 3)?;
/// assert_eq!(strip.dimensions(), (6, 3));
/// assert_eq!(strip.get_pixel(0, 0).0, [0, 0, 0]);
/// assert_eq!(strip.get_pixel(5, 2).0, [255, 255, 255]);
/// # Ok(())
/// # }
/// ```
pub fn render_swatch_strip(
    palette: &OrderedPalette,
    swatch_size: u32,
) -> Result<RgbImage, PaletteError> {
    render_swatch_strip_with(palette, SwatchLayout::square(swatch_size)).map_err(|err| match err {
        PaletteError::InvalidSwatchSize { colors, .. } => {
            PaletteError::InvalidSwatchSize { swatch_size, colors }
        }
        err => err,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{sequence::sequence, tests::*};
    use palette::Srgb;

    #[test]
    fn strip_geometry() {
        let palette = sequence(&test_data(7));
        for size in [1, 3, 10] {
            let strip = render_swatch_strip(&palette, size).unwrap();
            assert_eq!(strip.dimensions(), (7 * size, size));
        }
    }

    #[test]
    fn pixel_placement() {
        let palette = sequence(&test_data(16));
        let colors = palette.to_srgb8();
        let s = 4;
        let strip = render_swatch_strip(&palette, s).unwrap();

        for (i, color) in (0..).zip(&colors) {
            for offset in 0..s {
                for y in 0..s {
                    let pixel = strip.get_pixel(i * s + offset, y);
                    assert_eq!(pixel.0, [color.red, color.green, color.blue]);
                }
            }
        }
    }

    #[test]
    fn single_color() {
        let palette = sequence(&[Srgb::new(10, 200, 30)]);
        let strip = render_swatch_strip(&palette, 3).unwrap();
        assert_eq!(strip.dimensions(), (3, 3));
        assert!(strip.pixels().all(|pixel| pixel.0 == [10, 200, 30]));
    }

    #[test]
    fn zero_swatch_size() {
        let palette = sequence(&[Srgb::new(1, 2, 3), Srgb::new(4, 5, 6)]);
        assert_eq!(
            render_swatch_strip(&palette, 0),
            Err(PaletteError::InvalidSwatchSize { swatch_size: 0, colors: 2 })
        );
    }

    #[test]
    fn overflowing_width() {
        let palette = sequence(&[Srgb::new(1, 2, 3), Srgb::new(4, 5, 6)]);
        let layout = SwatchLayout { swatch_width: u32::MAX, height: 1, min_width: 0 };
        assert_eq!(layout.dimensions(2), None);
        assert!(render_swatch_strip_with(&palette, layout).is_err());
    }

    #[test]
    fn preview_minimum_width() {
        let palette = sequence(&[Srgb::new(0, 0, 0), Srgb::new(255, 255, 255)]);
        let strip = render_swatch_strip_with(&palette, SwatchLayout::PREVIEW).unwrap();
        assert_eq!(strip.dimensions(), (60, 40));
        assert_eq!(strip.get_pixel(0, 39).0, [0, 0, 0]);
        assert_eq!(strip.get_pixel(39, 0).0, [255, 255, 255]);
        assert_eq!(strip.get_pixel(40, 0).0, [0, 0, 0]);
        assert_eq!(strip.get_pixel(59, 39).0, [0, 0, 0]);

        let palette = sequence(&test_data(5));
        let strip = render_swatch_strip_with(&palette, SwatchLayout::PREVIEW).unwrap();
        assert_eq!(strip.dimensions(), (100, 40));
    }

    #[test]
    fn paint_into_larger_sink() {
        let palette = sequence(&[Srgb::new(9, 9, 9), Srgb::new(200, 200, 200)]);
        let mut sink = RgbImage::from_pixel(10, 5, Rgb([1, 2, 3]));
        paint_swatches(&palette, SwatchLayout::square(2), &mut sink).unwrap();

        assert_eq!(sink.get_pixel(0, 0).0, [9, 9, 9]);
        assert_eq!(sink.get_pixel(3, 1).0, [200, 200, 200]);
        assert_eq!(sink.get_pixel(4, 0).0, [1, 2, 3]);
        assert_eq!(sink.get_pixel(0, 2).0, [1, 2, 3]);

        let mut small = RgbImage::new(3, 2);
        assert!(paint_swatches(&palette, SwatchLayout::square(2), &mut small).is_err());
    }
}
