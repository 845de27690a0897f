//! Median cut color quantization.
//!
//! The colors start out in a single box. The box with the largest product of pixel count and
//! channel range is repeatedly split in two along its widest channel at the pixel-weighted median,
//! until there are `k` boxes. The palette is the pixel-weighted mean color of each box,
//! and the counts are the number of pixels in each box
//! (i.e., the histogram of the quantized image).
//!
//! The result only depends on the input colors and counts, so it is fully deterministic.
//! Since only boxes with at least two distinct colors are split, exactly `k` colors are returned
//! as long as the input has at least `k` distinct colors.

use crate::{ColorComponents, ColorCounts, PaletteSize, QuantizeOutput};
use palette::cast;

/// The number of components in the color types.
const N: usize = 3;

/// A box over a contiguous range of the color entries.
#[derive(Debug, Clone, Copy)]
struct ColorBox {
    /// The index of the first entry (inclusive).
    start: usize,
    /// The index of the last entry (exclusive).
    end: usize,
    /// The number of pixels in the box.
    count: u64,
    /// The component-wise minimum.
    min: [u8; N],
    /// The component-wise maximum.
    max: [u8; N],
}

impl ColorBox {
    /// Creates a new [`ColorBox`] spanning `entries[start..end]`.
    fn new(entries: &[([u8; N], u32)], start: usize, end: usize) -> Self {
        let mut count = 0;
        let mut min = [u8::MAX; N];
        let mut max = [u8::MIN; N];

        for &(color, n) in &entries[start..end] {
            count += u64::from(n);
            for c in 0..N {
                min[c] = min[c].min(color[c]);
                max[c] = max[c].max(color[c]);
            }
        }

        Self { start, end, count, min, max }
    }

    /// Returns the channel with the largest range and that range.
    /// Ties go to the earlier channel.
    fn widest_channel(&self) -> (usize, u8) {
        let mut widest = (0, 0);
        for c in 0..N {
            let range = self.max[c] - self.min[c];
            if range > widest.1 {
                widest = (c, range);
            }
        }
        widest
    }

    /// The split priority of this box. Boxes with a priority of zero have a single distinct color.
    fn priority(&self) -> u64 {
        self.count * u64::from(self.widest_channel().1)
    }

    /// Splits the box along its widest channel at the weighted median,
    /// leaving at least one entry on each side.
    fn split(self, entries: &mut [([u8; N], u32)]) -> (Self, Self) {
        let Self { start, end, count, .. } = self;
        let (channel, _) = self.widest_channel();

        entries[start..end].sort_unstable_by_key(|&(color, _)| (color[channel], color));

        let half = count.div_ceil(2);
        let mut sum = 0;
        let mut split = end - 1;
        for (i, &(_, n)) in entries[start..(end - 1)].iter().enumerate() {
            sum += u64::from(n);
            if sum >= half {
                split = start + i + 1;
                break;
            }
        }

        (Self::new(entries, start, split), Self::new(entries, split, end))
    }

    /// Returns the pixel-weighted mean color of the box, rounded to the nearest integer.
    fn mean_color(&self, entries: &[([u8; N], u32)]) -> [u8; N] {
        let mut sums = [0u64; N];
        for &(color, n) in &entries[self.start..self.end] {
            for c in 0..N {
                sums[c] += u64::from(n) * u64::from(color[c]);
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        sums.map(|sum| ((sum + self.count / 2) / self.count) as u8)
    }
}

/// Returns the boxes resulting from median cut.
fn cut(entries: &mut [([u8; N], u32)], k: usize) -> Vec<ColorBox> {
    let mut boxes = Vec::with_capacity(k);
    boxes.push(ColorBox::new(entries, 0, entries.len()));

    while boxes.len() < k {
        let mut best = None;
        let mut best_priority = 0;
        for (i, b) in boxes.iter().enumerate() {
            let priority = b.priority();
            if priority > best_priority {
                best = Some(i);
                best_priority = priority;
            }
        }

        let Some(i) = best else {
            // every box holds a single distinct color
            break;
        };

        let (lower, upper) = boxes[i].split(entries);
        boxes[i] = lower;
        boxes.push(upper);
    }

    boxes
}

/// Computes a color palette from the given `color_counts` with at most `palette_size` entries.
///
/// Exactly `palette_size` entries are returned if `color_counts` has at least that many distinct colors.
/// If `color_counts` has no more colors than `palette_size`,
/// then the colors themselves are returned as the palette.
#[must_use]
pub fn palette<Color>(
    color_counts: &impl ColorCounts<Color>,
    palette_size: PaletteSize,
) -> QuantizeOutput<Color>
where
    Color: ColorComponents<u8, N>,
{
    let k = palette_size.as_usize();

    if k == 0 || color_counts.is_empty() {
        QuantizeOutput::default()
    } else if color_counts.len() <= k {
        QuantizeOutput::trivial_palette(color_counts)
    } else {
        let mut entries = color_counts
            .color_components()
            .iter()
            .enumerate()
            .map(|(i, &color)| (color, color_counts.count(i)))
            .collect::<Vec<_>>();

        let boxes = cut(&mut entries, k);

        log::debug!(
            "median cut split {} colors into {} boxes",
            entries.len(),
            boxes.len()
        );

        #[allow(clippy::cast_possible_truncation)]
        let (palette, counts) = boxes
            .iter()
            .map(|b| (cast::from_array::<Color>(b.mean_color(&entries)), b.count as u32))
            .unzip();

        QuantizeOutput { palette, counts }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{tests::*, ColorSlice, UniqueColorCounts};
    use palette::Srgb;

    #[test]
    fn empty_input() {
        let colors = ColorSlice::<Srgb<u8>>::new_unchecked(&[]);
        assert_eq!(palette(&colors, PaletteSize::MAX), QuantizeOutput::default());

        let colors = test_data_256();
        let colors = ColorSlice::try_from(colors.as_slice()).unwrap();
        assert_eq!(palette(&colors, PaletteSize::from(0u8)), QuantizeOutput::default());
    }

    #[test]
    fn not_enough_colors() {
        let len = 64;
        let colors = &test_data_1024()[..len];
        let colors = ColorSlice::try_from(colors).unwrap();
        let unique = UniqueColorCounts::new(colors);

        let result = palette(&unique, PaletteSize::MAX);
        assert_eq!(result.palette, unique.colors());
        assert_eq!(result.counts, unique.counts());
    }

    #[test]
    fn exact_palette_size() {
        let colors = test_data_1024();
        let colors = [colors.as_slice(); 3].concat();
        let colors = ColorSlice::try_from(colors.as_slice()).unwrap();
        let unique = UniqueColorCounts::new(colors);

        for k in [1u8, 2, 3, 7, 16, 100, 255] {
            let result = palette(&unique, k.into());
            assert_eq!(result.palette.len(), usize::from(k));
            assert_eq!(result.counts.len(), usize::from(k));
            assert_eq!(result.counts.iter().sum::<u32>(), colors.num_colors());
        }

        let result = palette(&unique, PaletteSize::MAX);
        assert_eq!(result.palette.len(), 256);
    }

    #[test]
    fn weighted_median_split() {
        let colors = [
            Srgb::new(0, 0, 0),
            Srgb::new(0, 0, 0),
            Srgb::new(0, 0, 0),
            Srgb::new(10, 0, 0),
            Srgb::new(200, 0, 0),
        ];
        let unique = UniqueColorCounts::new(ColorSlice::try_from(colors.as_slice()).unwrap());

        let result = palette(&unique, PaletteSize::from(2u8));
        assert_eq!(result.palette, [Srgb::new(0, 0, 0), Srgb::new(105, 0, 0)]);
        assert_eq!(result.counts, [3, 2]);
    }

    #[test]
    fn splits_widest_channel() {
        let colors = [
            Srgb::new(0, 0, 100),
            Srgb::new(5, 0, 0),
            Srgb::new(0, 0, 0),
            Srgb::new(5, 0, 100),
        ];
        let unique = UniqueColorCounts::new(ColorSlice::try_from(colors.as_slice()).unwrap());

        // blue has the largest range, so the two halves differ in blue only
        let result = palette(&unique, PaletteSize::from(2u8));
        assert_eq!(result.palette, [Srgb::new(3, 0, 0), Srgb::new(3, 0, 100)]);
        assert_eq!(result.counts, [2, 2]);
    }

    #[test]
    fn deterministic_and_order_independent() {
        let colors = test_data_1024();
        let mut reversed = colors.clone();
        reversed.reverse();

        let a = UniqueColorCounts::new(ColorSlice::try_from(colors.as_slice()).unwrap());
        let b = UniqueColorCounts::new(ColorSlice::try_from(reversed.as_slice()).unwrap());

        assert_eq!(palette(&a, PaletteSize::from(48u8)), palette(&a, PaletteSize::from(48u8)));
        assert_eq!(palette(&a, PaletteSize::from(48u8)), palette(&b, PaletteSize::from(48u8)));
    }

    #[test]
    fn solid_color() {
        let colors = vec![Srgb::new(255, 0, 0); 2500];
        let unique = UniqueColorCounts::new(ColorSlice::try_from(colors.as_slice()).unwrap());

        let result = palette(&unique, PaletteSize::from(1u8));
        assert_eq!(result.palette, [Srgb::new(255, 0, 0)]);
        assert_eq!(result.counts, [2500]);
    }
}
