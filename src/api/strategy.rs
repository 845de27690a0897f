//! Contains the builder structs for the supported color reduction strategies.

#[cfg(feature = "kmeans")]
use crate::kmeans::{Centroids, KmeansParams};
#[cfg(feature = "kmeans")]
use palette::Srgb;

/// Clamps both dimensions of a working size to at least `1`.
const fn at_least_one((width, height): (u32, u32)) -> (u32, u32) {
    (if width == 0 { 1 } else { width }, if height == 0 { 1 } else { height })
}

/// A builder struct to specify the parameters for median cut quantization.
///
/// # Examples
/// ```
/// # use img2palette::QuantizeOptions;
/// let options = QuantizeOptions::new().working_size(128, 128);
/// assert_eq!(options.get_working_size(), (128, 128));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizeOptions {
    /// The resolution that larger images are downsampled to.
    pub(crate) working_size: (u32, u32),
}

impl Default for QuantizeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl QuantizeOptions {
    /// The default working resolution for median cut quantization.
    pub const DEFAULT_WORKING_SIZE: (u32, u32) = (256, 256);

    /// Creates a new [`QuantizeOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self { working_size: Self::DEFAULT_WORKING_SIZE }
    }

    /// Sets the working resolution.
    ///
    /// Images larger than this in either dimension are resized to exactly this size
    /// with nearest neighbor sampling. Zero dimensions are treated as `1`.
    ///
    /// The default working resolution is `256x256`.
    #[must_use]
    pub const fn working_size(mut self, width: u32, height: u32) -> Self {
        self.working_size = at_least_one((width, height));
        self
    }

    /// Returns the working resolution.
    #[must_use]
    pub const fn get_working_size(&self) -> (u32, u32) {
        self.working_size
    }
}

/// A builder struct to specify the parameters for k-means clustering.
///
/// # Examples
/// ```
/// # use img2palette::KmeansOptions;
/// let options = KmeansOptions::new()
///     .seed(42)
///     .runs(4)
///     .max_iterations(100);
/// ```
#[cfg(feature = "kmeans")]
#[derive(Debug, Clone, PartialEq)]
pub struct KmeansOptions {
    /// The resolution that larger images are downsampled to.
    pub(crate) working_size: (u32, u32),
    /// The clustering parameters.
    pub(crate) params: KmeansParams,
    /// The initial centroids to use instead of k-means++.
    pub(crate) initial_centroids: Option<Centroids<Srgb<u8>>>,
}

#[cfg(feature = "kmeans")]
impl Default for KmeansOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "kmeans")]
impl KmeansOptions {
    /// The default working resolution for k-means clustering.
    pub const DEFAULT_WORKING_SIZE: (u32, u32) = (100, 100);

    /// Creates a new [`KmeansOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            working_size: Self::DEFAULT_WORKING_SIZE,
            params: KmeansParams::new(),
            initial_centroids: None,
        }
    }

    /// Sets the working resolution.
    ///
    /// Images larger than this in either dimension are resized to exactly this size
    /// with nearest neighbor sampling. Zero dimensions are treated as `1`.
    ///
    /// The default working resolution is `100x100`.
    #[must_use]
    pub const fn working_size(mut self, width: u32, height: u32) -> Self {
        self.working_size = at_least_one((width, height));
        self
    }

    /// Sets the seed value for the random number generator.
    ///
    /// The default seed is `0`.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.params.seed = seed;
        self
    }

    /// Sets the number of independent k-means++ runs. The run with the lowest inertia is kept.
    ///
    /// The default is `10` runs. A value of `0` is treated as `1`.
    #[must_use]
    pub const fn runs(mut self, runs: u32) -> Self {
        self.params.runs = runs;
        self
    }

    /// Sets the maximum number of iterations for each run.
    ///
    /// The default is `300` iterations.
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.params.max_iterations = max_iterations;
        self
    }

    /// Sets the convergence tolerance, relative to the mean channel variance of the colors.
    ///
    /// The default tolerance is `1e-4`.
    #[must_use]
    pub const fn tolerance(mut self, tolerance: f64) -> Self {
        self.params.tolerance = tolerance;
        self
    }

    /// Sets the initial centroids, replacing k-means++ seeding with a single run.
    ///
    /// The centroids are only used if their number matches the requested palette size.
    #[must_use]
    pub fn initial_centroids(mut self, centroids: Centroids<Srgb<u8>>) -> Self {
        self.initial_centroids = Some(centroids);
        self
    }

    /// Returns the working resolution.
    #[must_use]
    pub const fn get_working_size(&self) -> (u32, u32) {
        self.working_size
    }

    /// Returns the clustering parameters.
    #[must_use]
    pub const fn params(&self) -> &KmeansParams {
        &self.params
    }
}

/// The set of supported color reduction strategies.
///
/// If the `kmeans` feature is enabled, then support will be added for k-means clustering.
/// Otherwise, only median cut quantization is supported.
///
/// Both strategies produce exactly the requested number of colors,
/// as long as the working image has at least that many distinct colors.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Median cut quantization of a 256x256 (by default) working image.
    ///
    /// This is quick and fully deterministic.
    ///
    /// See the [`median_cut`](crate::median_cut) module for more details.
    Quantize(QuantizeOptions),
    /// K-means clustering of a 100x100 (by default) working image.
    ///
    /// This is slower, but tends to find colors that better represent large areas of the image.
    /// The results are deterministic for a fixed seed.
    ///
    /// See the [`kmeans`](crate::kmeans) module for more details.
    #[cfg(feature = "kmeans")]
    Cluster(KmeansOptions),
}

impl Strategy {
    /// Creates a new [`Strategy::Quantize`] with default options.
    #[must_use]
    pub const fn quantize() -> Self {
        Self::Quantize(QuantizeOptions::new())
    }

    /// Creates a new [`Strategy::Cluster`] with default options.
    #[cfg(feature = "kmeans")]
    #[must_use]
    pub const fn cluster() -> Self {
        Self::Cluster(KmeansOptions::new())
    }

    /// Returns the working resolution of this strategy.
    #[must_use]
    pub const fn working_size(&self) -> (u32, u32) {
        match self {
            Self::Quantize(options) => options.working_size,
            #[cfg(feature = "kmeans")]
            Self::Cluster(options) => options.working_size,
        }
    }

    /// Returns a short name for this strategy.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Quantize(_) => "quantize",
            #[cfg(feature = "kmeans")]
            Self::Cluster(_) => "cluster",
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::quantize()
    }
}

impl From<QuantizeOptions> for Strategy {
    fn from(options: QuantizeOptions) -> Self {
        Self::Quantize(options)
    }
}

#[cfg(feature = "kmeans")]
impl From<KmeansOptions> for Strategy {
    fn from(options: KmeansOptions) -> Self {
        Self::Cluster(options)
    }
}
