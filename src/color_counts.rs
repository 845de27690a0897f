//! Contains the code for color/pixel deduplication and associated traits and types.

use crate::{AboveMaxLen, ColorComponents, ColorSlice};
use bitvec::vec::BitVec;
use image::RgbImage;
use palette::{
    cast::{self, AsArrays},
    Srgb,
};
use std::ops::Range;

/// A generalization trait over regular [`ColorSlice`]s and deduplicated pixels like [`UniqueColorCounts`].
pub trait ColorCounts<Color>
where
    Color: ColorComponents<u8, 3>,
{
    /// The slice of colors to reduce.
    ///
    /// The colors need not be unique,
    /// but the length of this slice must not be greater than [`MAX_PIXELS`](crate::MAX_PIXELS).
    fn colors(&self) -> &[Color];

    /// The total number of pixels in the (original) color slice.
    ///
    /// For [`ColorSlice`]s, this is simply the length of the slice.
    /// For [`UniqueColorCounts`], this is the length of the input before deduplication.
    /// This must be equal to the sum of `counts` (or `num_colors` if `counts` is `None`).
    fn total_count(&self) -> u32;

    /// The number of pixels corresponding to each `Color` in the slice returned by `colors`.
    ///
    /// For [`ColorSlice`]s, this returns `None`, indicating each `Color` has a count of `1`.
    ///
    /// Each count must be nonzero, and the returned slice (if any)
    /// must have the same length as the slice returned by `colors`.
    fn counts(&self) -> Option<&[u32]>;

    /// The slice returned by `colors` casted to a slice of component arrays.
    fn color_components(&self) -> &[[u8; 3]] {
        self.colors().as_arrays()
    }

    /// The count of the color at index `i`, treating a missing `counts` slice as all ones.
    fn count(&self, i: usize) -> u32 {
        self.counts().map_or(1, |counts| counts[i])
    }

    /// The length of the slice returned by `colors` as a `u32`.
    #[allow(clippy::cast_possible_truncation)]
    fn num_colors(&self) -> u32 {
        self.len() as u32
    }

    /// The length of the slice returned by `colors`.
    fn len(&self) -> usize {
        self.colors().len()
    }

    /// Whether or not the slice returned by `colors` is empty.
    fn is_empty(&self) -> bool {
        self.colors().is_empty()
    }
}

impl<'a, Color> ColorCounts<Color> for ColorSlice<'a, Color>
where
    Color: ColorComponents<u8, 3>,
{
    fn colors(&self) -> &[Color] {
        self
    }

    fn total_count(&self) -> u32 {
        self.num_colors()
    }

    fn counts(&self) -> Option<&[u32]> {
        None
    }

    fn num_colors(&self) -> u32 {
        self.num_colors()
    }
}

impl<Color> ColorCounts<Color> for UniqueColorCounts<Color>
where
    Color: ColorComponents<u8, 3>,
{
    fn colors(&self) -> &[Color] {
        &self.colors
    }

    fn total_count(&self) -> u32 {
        self.total_count
    }

    fn counts(&self) -> Option<&[u32]> {
        Some(&self.counts)
    }
}

/// A byte-sized Radix
const RADIX: usize = u8::MAX as usize + 1;

/// Returns the range associated with the `i`-th chunk.
#[inline]
fn chunk_range(chunks: &[u32], i: usize) -> Range<usize> {
    (chunks[i] as usize)..(chunks[i + 1] as usize)
}

/// Deduplicated colors and their frequency counts.
///
/// The unique colors are sorted by their components in ascending order,
/// so two [`UniqueColorCounts`] built from the same pixels in a different order are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueColorCounts<Color>
where
    Color: ColorComponents<u8, 3>,
{
    /// The unique colors.
    colors: Vec<Color>,
    /// The number of times each color was present in the original color slice/image.
    counts: Vec<u32>,
    /// The total number of pixels/colors in the original color slice/image.
    total_count: u32,
}

impl<Color> Default for UniqueColorCounts<Color>
where
    Color: ColorComponents<u8, 3>,
{
    fn default() -> Self {
        Self {
            colors: Vec::new(),
            counts: Vec::new(),
            total_count: 0,
        }
    }
}

impl<Color> UniqueColorCounts<Color>
where
    Color: ColorComponents<u8, 3>,
{
    /// Returns the slice of unique colors.
    #[must_use]
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Returns a slice for the number of times each unique color was present in the original color slice/image.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Returns the number of original pixels/colors.
    ///
    /// This is equal to the sum of [`UniqueColorCounts::counts`].
    #[must_use]
    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    /// Returns the number of unique colors.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn num_colors(&self) -> u32 {
        self.colors.len() as u32
    }

    /// Creates a new [`UniqueColorCounts`] from a [`ColorSlice`].
    ///
    /// The pixels are bucketed by their red component with a counting sort,
    /// and then each bucket is counted over its green and blue components.
    #[must_use]
    pub fn new(pixels: ColorSlice<Color>) -> Self {
        if pixels.is_empty() {
            return Self::default();
        }

        let total_count = pixels.num_colors();

        let mut colors = Vec::new();
        let mut counts = Vec::new();
        let mut green_blue = vec![[0u8; 2]; pixels.len()];

        let mut lower_counts = vec![[0u32; RADIX]; RADIX];
        let mut bitmask: BitVec = BitVec::repeat(false, RADIX * RADIX);

        let mut red_prefix = [0u32; RADIX + 1];
        for &[r, ..] in pixels.as_arrays() {
            red_prefix[usize::from(r)] += 1;
        }
        for i in 1..=RADIX {
            red_prefix[i] += red_prefix[i - 1];
        }

        for &[r, g, b] in pixels.as_arrays() {
            let r = usize::from(r);
            let j = red_prefix[r] - 1;
            green_blue[j as usize] = [g, b];
            red_prefix[r] = j;
        }
        red_prefix[RADIX] = total_count;

        for r in 0..RADIX {
            let chunk = chunk_range(&red_prefix, r);

            if chunk.is_empty() {
                continue;
            }

            #[allow(clippy::cast_possible_truncation)]
            let red = r as u8;
            let green_blue = &green_blue[chunk.clone()];

            if chunk.len() < RADIX * RADIX / 4 {
                // sparse bucket: only visit the bins that were hit
                for gb in green_blue {
                    let [g, b] = gb.map(usize::from);
                    lower_counts[g][b] += 1;
                    bitmask.set(g * RADIX + b, true);
                }

                for i in bitmask.iter_ones() {
                    let g = i / RADIX;
                    let b = i % RADIX;
                    #[allow(clippy::cast_possible_truncation)]
                    colors.push(cast::from_array([red, g as u8, b as u8]));
                    counts.push(lower_counts[g][b]);
                    lower_counts[g][b] = 0;
                }

                bitmask.fill(false);
            } else {
                for &[g, b] in green_blue {
                    lower_counts[usize::from(g)][usize::from(b)] += 1;
                }

                for (g, row) in lower_counts.iter_mut().enumerate() {
                    for (b, count) in row.iter_mut().enumerate() {
                        if *count > 0 {
                            #[allow(clippy::cast_possible_truncation)]
                            colors.push(cast::from_array([red, g as u8, b as u8]));
                            counts.push(*count);
                            *count = 0;
                        }
                    }
                }
            }
        }

        Self { colors, counts, total_count }
    }
}

impl UniqueColorCounts<Srgb<u8>> {
    /// Tries to create a new [`UniqueColorCounts`] from a [`RgbImage`].
    ///
    /// # Errors
    /// Return an error if the number of pixels in the image are above [`MAX_PIXELS`](crate::MAX_PIXELS).
    pub fn try_from_rgbimage(image: &RgbImage) -> Result<Self, AboveMaxLen<u32>> {
        image.try_into().map(Self::new)
    }
}
