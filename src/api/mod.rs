//! Contains the types and functions for the high level palette extraction API.

mod palette_pipeline;
mod strategy;

pub use palette_pipeline::PalettePipeline;
pub use strategy::{QuantizeOptions, Strategy};

#[cfg(feature = "kmeans")]
pub use strategy::KmeansOptions;

use crate::{OrderedPalette, PaletteError, PaletteSize, UniqueColorCounts};
use image::RgbImage;
use palette::Srgb;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;
use std::borrow::Cow;

/// The seed used to pick source pixels when downsampling.
const SAMPLE_SEED: u64 = 0x5eed;

/// Splits `len` source pixels into `cells` contiguous, non-empty ranges.
///
/// Returns the `cells + 1` range boundaries. `cells` must be in `1..=len`.
#[allow(clippy::cast_possible_truncation)]
fn cell_bounds(len: u32, cells: u32) -> Vec<u32> {
    (0..=cells)
        .map(|i| (u64::from(i) * u64::from(len) / u64::from(cells)) as u32)
        .collect()
}

/// Returns the image to reduce: `image` itself if it fits into `working_size`,
/// otherwise a downsampled copy at most `working_size` large.
///
/// Each working pixel covers a rectangle of source pixels and takes the color of one of them,
/// picked at random with a fixed seed. So, no new colors are introduced, the result is
/// deterministic, and every color keeps roughly its share of the image
/// (even for dithered or striped images that line up with the sampling grid).
fn working_image(image: &RgbImage, (width, height): (u32, u32)) -> Cow<'_, RgbImage> {
    let (src_width, src_height) = image.dimensions();
    if src_width <= width && src_height <= height {
        return Cow::Borrowed(image);
    }

    let width = width.clamp(1, src_width);
    let height = height.clamp(1, src_height);
    let columns = cell_bounds(src_width, width);
    let rows = cell_bounds(src_height, height);

    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(SAMPLE_SEED);
    let mut working = RgbImage::new(width, height);
    for (y, row) in (0..).zip(rows.windows(2)) {
        for (x, column) in (0..).zip(columns.windows(2)) {
            let src_x = rng.gen_range(column[0]..column[1]);
            let src_y = rng.gen_range(row[0]..row[1]);
            working.put_pixel(x, y, *image.get_pixel(src_x, src_y));
        }
    }

    Cow::Owned(working)
}

/// Downsamples `image` to the working resolution of `strategy` and counts its unique colors.
///
/// These are the colors the reducer of `strategy` works with,
/// so their number (capped at `256`) is the largest supported palette size.
///
/// # Errors
/// Returns [`PaletteError::TooManyPixels`] if `image` has more than [`MAX_PIXELS`](crate::MAX_PIXELS) pixels.
pub fn working_color_counts(
    image: &RgbImage,
    strategy: &Strategy,
) -> Result<UniqueColorCounts<Srgb<u8>>, PaletteError> {
    let working = working_image(image, strategy.working_size());
    let color_counts = UniqueColorCounts::try_from_rgbimage(&working)?;

    log::debug!(
        "{}x{} working image for {} has {} distinct colors",
        working.width(),
        working.height(),
        strategy.name(),
        color_counts.num_colors(),
    );

    Ok(color_counts)
}

/// Returns the largest palette size supported by `image` with the given strategy.
///
/// This is the number of distinct colors in the working image of the strategy, capped at `256`.
/// It is `0` only for images without pixels.
#[must_use]
pub fn max_palette_size(image: &RgbImage, strategy: &Strategy) -> PaletteSize {
    working_color_counts(image, strategy).map_or(PaletteSize::from(0u8), |color_counts| {
        PaletteSize::from_count_clamped(color_counts.num_colors())
    })
}

/// Extracts a perceptually ordered palette of exactly `k` colors from `image`.
///
/// # Errors
/// Returns [`PaletteError::EmptyInput`] if `image` has no pixels,
/// and [`PaletteError::InvalidParameter`] if `k` is `0` or greater than [`max_palette_size`].
///
/// # Examples
/// ```
/// # use img2palette::{extract_palette, Strategy};
/// # use image::{Rgb, RgbImage};
/// # fn main() -> Result<(), img2palette::PaletteError> {
/// let img = RgbImage::from_fn(10, 10, |x, y| {
///     if (x + y) % 2 == 0 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
/// });
///
/// let palette = extract_palette(&img, 2, Strategy::quantize())?;
/// assert_eq!(
///     palette.to_srgb8(),
///     [palette::Srgb::new(0, 0, 0), palette::Srgb::new(255, 255, 255)]
/// );
/// # Ok(())
/// # }
/// ```
pub fn extract_palette(
    image: &RgbImage,
    k: u16,
    strategy: impl Into<Strategy>,
) -> Result<OrderedPalette, PaletteError> {
    pipeline(image, k, strategy.into())?.ordered_palette()
}

/// Extracts a perceptually ordered palette of exactly `k` colors from `image`,
/// clustering in parallel on the current [`rayon`] thread pool.
///
/// The result is identical to [`extract_palette`] for any number of threads.
///
/// # Errors
/// See [`extract_palette`].
#[cfg(feature = "threads")]
pub fn extract_palette_par(
    image: &RgbImage,
    k: u16,
    strategy: impl Into<Strategy>,
) -> Result<OrderedPalette, PaletteError> {
    pipeline(image, k, strategy.into())?.ordered_palette_par()
}

/// Creates the pipeline for the free functions.
fn pipeline(image: &RgbImage, k: u16, strategy: Strategy) -> Result<PalettePipeline<'_>, PaletteError> {
    let pipeline = PalettePipeline::try_from(image)?.strategy(strategy);
    match PaletteSize::try_from(k) {
        Ok(k) => Ok(pipeline.palette_size(k)),
        Err(_) => Err(PaletteError::InvalidParameter {
            k,
            max: pipeline.max_palette_size().into_inner(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::*;
    use image::Rgb;
    use palette::Srgb;

    fn checkerboard(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    /// Alternating one pixel wide red and blue columns.
    fn stripes(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if x % 2 == 0 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, (((x + y) / 2) % 256) as u8])
        })
    }

    fn strategies() -> Vec<Strategy> {
        let mut strategies = vec![Strategy::quantize()];
        #[cfg(feature = "kmeans")]
        strategies.push(KmeansOptions::new().runs(2).max_iterations(50).into());
        strategies
    }

    #[test]
    fn working_image_downsamples_large_images() {
        let img = gradient(600, 400);
        let working = working_image(&img, (256, 256));
        assert_eq!(working.dimensions(), (256, 256));

        let img = gradient(300, 100);
        assert_eq!(working_image(&img, (256, 256)).dimensions(), (256, 100));

        let img = gradient(200, 100);
        assert!(matches!(working_image(&img, (256, 256)), Cow::Borrowed(_)));
    }

    #[test]
    fn downsampling_adds_no_colors() {
        let colors = test_data(5);
        let img = tiled_image(513, 301, &colors);
        let working = working_image(&img, (100, 100));

        for pixel in working.pixels() {
            assert!(colors.contains(&Srgb::from(pixel.0)));
        }
    }

    #[test]
    fn downsampling_keeps_color_shares() {
        let img = checkerboard(512);
        let working = working_image(&img, (256, 256));
        let white = working.pixels().filter(|pixel| pixel.0 == [255, 255, 255]).count();
        let total = 256 * 256;
        assert!(white * 20 >= total * 9 && white * 20 <= total * 11, "{white} of {total} are white");

        let img = stripes(512, 512);
        let working = working_image(&img, (256, 256));
        assert!(working.pixels().any(|pixel| pixel.0 == [255, 0, 0]));
        assert!(working.pixels().any(|pixel| pixel.0 == [0, 0, 255]));
    }

    #[test]
    fn downsampling_is_deterministic() {
        let img = tiled_image(640, 480, &test_data(50));
        assert_eq!(working_image(&img, (100, 100)), working_image(&img, (100, 100)));
    }

    #[test]
    fn large_black_and_white() {
        let img = checkerboard(512);
        for strategy in strategies() {
            assert_eq!(max_palette_size(&img, &strategy), PaletteSize::from(2u8));
            let palette = extract_palette(&img, 2, strategy).unwrap();
            assert_eq!(palette.to_srgb8(), [Srgb::new(0, 0, 0), Srgb::new(255, 255, 255)]);
        }
    }

    #[test]
    fn large_one_pixel_stripes() {
        let img = stripes(512, 512);
        for strategy in strategies() {
            assert_eq!(max_palette_size(&img, &strategy), PaletteSize::from(2u8));
            let mut colors = extract_palette(&img, 2, strategy.clone()).unwrap().to_srgb8();
            colors.sort_by_key(|color| (color.red, color.green, color.blue));
            assert_eq!(colors, [Srgb::new(0, 0, 255), Srgb::new(255, 0, 0)]);

            let palette = extract_palette(&img, 1, strategy).unwrap();
            assert_eq!(palette.len(), 1);
        }
    }

    #[test]
    fn max_size() {
        let img = tiled_image(512, 512, &test_data(4));
        assert_eq!(max_palette_size(&img, &Strategy::quantize()), PaletteSize::from(4u8));

        let img = gradient(300, 300);
        assert_eq!(max_palette_size(&img, &Strategy::quantize()), PaletteSize::MAX);

        let empty = RgbImage::new(0, 0);
        assert_eq!(max_palette_size(&empty, &Strategy::quantize()), PaletteSize::from(0u8));
    }

    #[test]
    fn clamped_size() {
        let img = tiled_image(16, 16, &test_data(6));
        let pipeline = PalettePipeline::try_from(&img).unwrap();
        assert_eq!(pipeline.clamped_palette_size(0), PaletteSize::from(1u8));
        assert_eq!(pipeline.clamped_palette_size(4), PaletteSize::from(4u8));
        assert_eq!(pipeline.clamped_palette_size(1000), PaletteSize::from(6u8));
    }

    #[test]
    fn invalid_palette_size() {
        let img = tiled_image(10, 10, &test_data(3));

        for strategy in strategies() {
            assert_eq!(
                extract_palette(&img, 0, strategy.clone()),
                Err(PaletteError::InvalidParameter { k: 0, max: 3 })
            );
            assert_eq!(
                extract_palette(&img, 4, strategy.clone()),
                Err(PaletteError::InvalidParameter { k: 4, max: 3 })
            );
            assert_eq!(
                extract_palette(&img, 300, strategy),
                Err(PaletteError::InvalidParameter { k: 300, max: 3 })
            );
        }
    }

    #[test]
    fn empty_image() {
        let img = RgbImage::new(0, 7);
        for strategy in strategies() {
            assert_eq!(extract_palette(&img, 1, strategy), Err(PaletteError::EmptyInput));
        }
        assert!(matches!(
            PalettePipeline::try_from(&RgbImage::new(0, 0)),
            Err(PaletteError::EmptyInput)
        ));
    }

    #[test]
    fn black_and_white() {
        let img = checkerboard(10);
        for strategy in strategies() {
            let palette = extract_palette(&img, 2, strategy).unwrap();
            assert_eq!(palette.to_srgb8(), [Srgb::new(0, 0, 0), Srgb::new(255, 255, 255)]);
        }
    }

    #[test]
    fn solid_color() {
        let img = RgbImage::from_pixel(50, 50, Rgb([255, 0, 0]));
        for strategy in strategies() {
            let palette = extract_palette(&img, 1, strategy).unwrap();
            assert_eq!(palette.to_srgb8(), [Srgb::new(255, 0, 0)]);
        }
    }

    #[test]
    fn exact_palette_size() {
        let img = gradient(320, 240);
        for strategy in strategies() {
            for k in [1, 2, 7, 16, 64] {
                let palette = extract_palette(&img, k, strategy.clone()).unwrap();
                assert_eq!(palette.len(), usize::from(k));
            }
        }
    }

    #[test]
    fn default_palette_size_is_max() {
        let img = tiled_image(20, 20, &test_data(9));
        for strategy in strategies() {
            let pipeline = PalettePipeline::try_from(&img).unwrap().strategy(strategy);
            assert_eq!(pipeline.ordered_palette().unwrap().len(), 9);
        }
    }

    #[test]
    fn deterministic() {
        let img = gradient(320, 240);
        for strategy in strategies() {
            let a = extract_palette(&img, 12, strategy.clone()).unwrap();
            let b = extract_palette(&img, 12, strategy).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn darkest_color_first() {
        let img = gradient(320, 240);
        for strategy in strategies() {
            let palette = extract_palette(&img, 10, strategy).unwrap();
            let lightness = palette
                .to_srgb8()
                .into_iter()
                .map(|color| crate::sequence::srgb_to_lab(color).l)
                .collect::<Vec<_>>();

            // the stored colors went through a Lab round trip, so allow for rounding
            let min = lightness.iter().copied().fold(f64::INFINITY, f64::min);
            assert!(lightness[0] <= min + 0.5);
        }
    }

    #[test]
    #[cfg(feature = "kmeans")]
    fn cluster_seed_changes_nothing_for_trivial_palettes() {
        let img = tiled_image(30, 30, &test_data(5));
        let a = extract_palette(&img, 5, KmeansOptions::new().seed(1)).unwrap();
        let b = extract_palette(&img, 5, KmeansOptions::new().seed(2)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    #[cfg(feature = "kmeans")]
    fn mismatched_initial_centroids_are_ignored() {
        let img = gradient(120, 80);
        let centroids = crate::kmeans::Centroids::try_from(test_data(3)).unwrap();
        let with = KmeansOptions::new().runs(2).initial_centroids(centroids.clone());
        let without = KmeansOptions::new().runs(2);

        assert_eq!(
            extract_palette(&img, 5, with).unwrap(),
            extract_palette(&img, 5, without).unwrap()
        );

        let palette = extract_palette(&img, 3, KmeansOptions::new().initial_centroids(centroids));
        assert_eq!(palette.unwrap().len(), 3);
    }

    #[test]
    #[cfg(feature = "threads")]
    fn parallel_matches_single_threaded() {
        let img = gradient(320, 240);
        for strategy in strategies() {
            let expected = extract_palette(&img, 16, strategy.clone()).unwrap();
            for threads in [1, 3] {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
                let actual = pool.install(|| extract_palette_par(&img, 16, strategy.clone()));
                assert_eq!(actual.unwrap(), expected);
            }
        }
    }
}
