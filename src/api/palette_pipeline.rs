use super::working_color_counts;
use crate::{
    median_cut, sequence::sequence, OrderedPalette, PaletteError, PaletteSize, Strategy,
    UniqueColorCounts, MAX_PIXELS,
};
use std::cell::OnceCell;

#[cfg(feature = "kmeans")]
use crate::kmeans;

use image::RgbImage;
use palette::Srgb;

/// A builder struct to specify options to extract an ordered palette from an image.
///
/// # Examples
/// To start, create a [`PalettePipeline`] from an [`RgbImage`]:
/// ```no_run
/// # use img2palette::PalettePipeline;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let img = image::open("some image")?.into_rgb8();
/// let pipeline = PalettePipeline::try_from(&img)?;
/// # Ok(())
/// # }
/// ```
///
/// Then, you can change different options like the number of colors in the palette:
/// ```
/// # use img2palette::{PalettePipeline, PaletteSize, Strategy};
/// # fn main() -> Result<(), img2palette::PaletteError> {
/// # let img = image::RgbImage::from_fn(8, 8, |x, y| image::Rgb([x as u8 * 30, y as u8 * 30, 0]));
/// let pipeline = PalettePipeline::try_from(&img)?
///     .palette_size(PaletteSize::from(8u8))
///     .strategy(Strategy::cluster());
/// # Ok(())
/// # }
/// ```
///
/// The palette size must be between `1` and [`PalettePipeline::max_palette_size`],
/// the number of distinct colors in the downsampled working image (at most `256`).
/// If no palette size is set, the maximum is used.
/// The working image is downsampled and counted once per pipeline and strategy,
/// so asking for the maximum before running the pipeline costs nothing extra.
///
/// Finally, run the pipeline:
/// ```
/// # use img2palette::{PalettePipeline, PaletteSize};
/// # fn main() -> Result<(), img2palette::PaletteError> {
/// # let img = image::RgbImage::from_fn(8, 8, |x, y| image::Rgb([x as u8 * 30, y as u8 * 30, 0]));
/// # let pipeline = PalettePipeline::try_from(&img)?.palette_size(PaletteSize::from(8u8));
/// let palette = pipeline.ordered_palette()?;
/// assert_eq!(palette.len(), 8);
/// # Ok(())
/// # }
/// ```
///
/// Or, with the clustering step parallelized across multiple threads (needs the `threads` feature):
/// ```no_run
/// # use img2palette::PalettePipeline;
/// # fn main() -> Result<(), img2palette::PaletteError> {
/// # let img = image::RgbImage::new(8, 8);
/// # let pipeline = PalettePipeline::try_from(&img)?;
/// let palette = pipeline.ordered_palette_par()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct PalettePipeline<'a> {
    /// The input image.
    pub(crate) image: &'a RgbImage,
    /// The number of colors to put in the palette, or `None` for the maximum.
    pub(crate) k: Option<u16>,
    /// The color reduction strategy to use.
    pub(crate) strategy: Strategy,
    /// The unique colors of the working image for `strategy`, once computed.
    pub(crate) color_counts: OnceCell<UniqueColorCounts<Srgb<u8>>>,
}

impl<'a> TryFrom<&'a RgbImage> for PalettePipeline<'a> {
    type Error = PaletteError;

    fn try_from(image: &'a RgbImage) -> Result<Self, Self::Error> {
        let pixels = u64::from(image.width()) * u64::from(image.height());
        if pixels == 0 {
            Err(PaletteError::EmptyInput)
        } else if pixels > u64::from(MAX_PIXELS) {
            Err(crate::AboveMaxLen(MAX_PIXELS).into())
        } else {
            Ok(Self {
                image,
                k: None,
                strategy: Strategy::default(),
                color_counts: OnceCell::new(),
            })
        }
    }
}

impl<'a> PalettePipeline<'a> {
    /// Sets the palette size which determines the (exact) number of colors in the palette.
    ///
    /// The default is [`PalettePipeline::max_palette_size`].
    pub fn palette_size(mut self, size: PaletteSize) -> Self {
        self.k = Some(size.into_inner());
        self
    }

    /// Sets the color reduction strategy to use.
    ///
    /// The default strategy is [`Strategy::Quantize`].
    pub fn strategy(mut self, strategy: impl Into<Strategy>) -> Self {
        let strategy = strategy.into();
        if strategy.working_size() != self.strategy.working_size() {
            self.color_counts = OnceCell::new();
        }
        self.strategy = strategy;
        self
    }

    /// Returns the unique colors of the working image, computing them on first use.
    fn working_color_counts(&self) -> Result<&UniqueColorCounts<Srgb<u8>>, PaletteError> {
        if let Some(color_counts) = self.color_counts.get() {
            return Ok(color_counts);
        }
        let color_counts = working_color_counts(self.image, &self.strategy)?;
        Ok(self.color_counts.get_or_init(|| color_counts))
    }

    /// Returns the largest supported palette size for the current strategy:
    /// the number of distinct colors in the working image, capped at `256`.
    #[must_use]
    pub fn max_palette_size(&self) -> PaletteSize {
        self.working_color_counts()
            .map_or(PaletteSize::from(0u8), |color_counts| {
                PaletteSize::from_count_clamped(color_counts.num_colors())
            })
    }

    /// Clamps `k` into the range of valid palette sizes, `1..=max_palette_size`.
    #[must_use]
    pub fn clamped_palette_size(&self, k: u16) -> PaletteSize {
        let max = self.max_palette_size();
        PaletteSize::from_clamped(k.clamp(1, max.into_inner().max(1)))
    }

    /// Returns the unique colors of the working image alongside the validated palette size.
    fn prepare(&self) -> Result<(&UniqueColorCounts<Srgb<u8>>, PaletteSize), PaletteError> {
        let color_counts = self.working_color_counts()?;

        let max = PaletteSize::from_count_clamped(color_counts.num_colors());
        let k = self.k.unwrap_or(max.into_inner());

        log::debug!(
            "reducing {} distinct colors to {k} colors using {}",
            color_counts.num_colors(),
            self.strategy.name(),
        );

        if k == 0 || k > max.into_inner() {
            Err(PaletteError::InvalidParameter { k, max: max.into_inner() })
        } else {
            Ok((color_counts, PaletteSize::from_clamped(k)))
        }
    }

    /// Computes the `k` representative colors of the image, in no particular perceptual order.
    ///
    /// # Errors
    /// Returns [`PaletteError::InvalidParameter`] if the palette size is `0`
    /// or greater than [`PalettePipeline::max_palette_size`].
    pub fn representative_colors(&self) -> Result<Vec<Srgb<u8>>, PaletteError> {
        let (color_counts, k) = self.prepare()?;
        Ok(reduce(color_counts, k, &self.strategy))
    }

    /// Computes the ordered palette of the image.
    ///
    /// # Errors
    /// See [`PalettePipeline::representative_colors`].
    pub fn ordered_palette(&self) -> Result<OrderedPalette, PaletteError> {
        self.representative_colors().map(|colors| sequence(&colors))
    }
}

#[cfg(feature = "threads")]
impl<'a> PalettePipeline<'a> {
    /// Computes the `k` representative colors of the image in parallel.
    ///
    /// The result is identical to [`PalettePipeline::representative_colors`].
    ///
    /// # Errors
    /// See [`PalettePipeline::representative_colors`].
    pub fn representative_colors_par(&self) -> Result<Vec<Srgb<u8>>, PaletteError> {
        let (color_counts, k) = self.prepare()?;
        Ok(reduce_par(color_counts, k, &self.strategy))
    }

    /// Computes the ordered palette of the image in parallel.
    ///
    /// The result is identical to [`PalettePipeline::ordered_palette`].
    ///
    /// # Errors
    /// See [`PalettePipeline::representative_colors`].
    pub fn ordered_palette_par(&self) -> Result<OrderedPalette, PaletteError> {
        self.representative_colors_par().map(|colors| sequence(&colors))
    }
}

/// Returns the initial centroids to use for a palette of size `k`, if any.
#[cfg(feature = "kmeans")]
fn initial_centroids(
    options: &crate::KmeansOptions,
    k: PaletteSize,
) -> Option<kmeans::Centroids<Srgb<u8>>> {
    let centroids = options.initial_centroids.as_ref()?;
    if centroids.palette_size() == k {
        Some(centroids.clone())
    } else {
        log::warn!(
            "ignoring {} initial centroids for a palette of {k} colors",
            centroids.num_colors()
        );
        None
    }
}

/// Reduces the unique colors to `k` representative colors with the given strategy.
fn reduce(
    color_counts: &UniqueColorCounts<Srgb<u8>>,
    k: PaletteSize,
    strategy: &Strategy,
) -> Vec<Srgb<u8>> {
    match strategy {
        Strategy::Quantize(_) => median_cut::palette(color_counts, k).palette,
        #[cfg(feature = "kmeans")]
        Strategy::Cluster(options) => match initial_centroids(options, k) {
            Some(centroids) => {
                kmeans::palette_from_centroids(color_counts, centroids, &options.params).palette
            }
            None => kmeans::palette(color_counts, k, &options.params).palette,
        },
    }
}

/// Reduces the unique colors to `k` representative colors with the given strategy in parallel.
#[cfg(feature = "threads")]
fn reduce_par(
    color_counts: &UniqueColorCounts<Srgb<u8>>,
    k: PaletteSize,
    strategy: &Strategy,
) -> Vec<Srgb<u8>> {
    match strategy {
        Strategy::Quantize(_) => median_cut::palette(color_counts, k).palette,
        #[cfg(feature = "kmeans")]
        Strategy::Cluster(options) => match initial_centroids(options, k) {
            Some(centroids) => {
                kmeans::palette_from_centroids_par(color_counts, centroids, &options.params)
                    .palette
            }
            None => kmeans::palette_par(color_counts, k, &options.params).palette,
        },
    }
}
