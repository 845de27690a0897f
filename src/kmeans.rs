//! Color reduction through weighted k-means clustering.
//!
//! Each unique color is a point weighted by its pixel count,
//! which is equivalent to clustering every pixel of the image.
//! The clustering itself is Lloyd's algorithm:
//! points are assigned to their nearest centroid (squared euclidean distance in RGB),
//! and every centroid is then moved to the weighted mean of its points.
//!
//! Centroids are seeded with k-means++ unless they are provided through [`Centroids`].
//! Seeding is driven by a [`Xoroshiro128PlusPlus`] generator created from a fixed seed,
//! and several independent runs are made, keeping the one with the lowest inertia
//! (the sum of weighted squared distances from each point to its centroid).
//!
//! Assignments are computed over fixed size chunks of points, and the per-chunk results are
//! combined in chunk order using integer sums. So, the parallel functions return the exact same
//! result as the single-threaded ones, regardless of the number of threads.

use crate::{
    AboveMaxLen, ColorComponents, ColorCounts, PaletteSize, QuantizeOutput, MAX_COLORS, MAX_K,
};
use palette::cast;
use rand::{
    distributions::{Distribution, WeightedIndex},
    SeedableRng,
};
use rand_distr::weighted_alias::WeightedAliasIndex;
use rand_xoshiro::Xoroshiro128PlusPlus;
use std::array;
use wide::{f32x8, CmpLt};

#[cfg(feature = "threads")]
use rayon::prelude::*;

/// The number of points in each chunk of the assignment step.
const CHUNK_SIZE: usize = 4096;

/// The number of components in the color types.
const N: usize = 3;

/// A new type wrapper around `Vec<Color>` with the invariant that the length of the
/// inner `Vec` must not be greater than [`MAX_COLORS`].
///
/// These are used as the starting centroids of a single k-means run in place of k-means++.
///
/// # Examples
/// ```
/// # use img2palette::kmeans::Centroids;
/// # use palette::Srgb;
/// # fn main() -> Result<(), img2palette::AboveMaxLen<u16>> {
/// let centroids = Centroids::try_from(vec![Srgb::new(0, 0, 0), Srgb::new(255, 255, 255)])?;
/// assert_eq!(centroids.num_colors(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Centroids<Color>(Vec<Color>);

impl<Color> Centroids<Color> {
    /// Returns the inner `Vec` of centroids.
    #[must_use]
    pub fn into_inner(self) -> Vec<Color> {
        self.0
    }

    /// Creates a new [`Centroids`] by truncating the input `Vec` to a max length of [`MAX_COLORS`].
    #[must_use]
    pub fn from_truncated(mut centroids: Vec<Color>) -> Self {
        centroids.truncate(MAX_K);
        Self(centroids)
    }

    /// Returns the number of centroids.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn num_colors(&self) -> u16 {
        self.0.len() as u16
    }

    /// Returns the number of centroids as a [`PaletteSize`].
    #[must_use]
    pub fn palette_size(&self) -> PaletteSize {
        PaletteSize::from_clamped(self.num_colors())
    }
}

impl<Color> AsRef<[Color]> for Centroids<Color> {
    fn as_ref(&self) -> &[Color] {
        &self.0
    }
}

impl<Color> From<Centroids<Color>> for Vec<Color> {
    fn from(value: Centroids<Color>) -> Self {
        value.into_inner()
    }
}

impl<Color> TryFrom<Vec<Color>> for Centroids<Color> {
    type Error = AboveMaxLen<u16>;

    fn try_from(colors: Vec<Color>) -> Result<Self, Self::Error> {
        if colors.len() <= MAX_K {
            Ok(Self(colors))
        } else {
            Err(AboveMaxLen(MAX_COLORS))
        }
    }
}

/// The parameters that control the k-means clustering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmeansParams {
    /// The seed value for the random number generator.
    pub seed: u64,
    /// The number of independent k-means++ runs.
    pub runs: u32,
    /// The maximum number of iterations for each run.
    pub max_iterations: u32,
    /// The relative tolerance on the centroid shift used to declare convergence.
    pub tolerance: f64,
}

impl KmeansParams {
    /// Creates a new [`KmeansParams`] with default values:
    /// a seed of `0`, `10` runs, at most `300` iterations, and a tolerance of `1e-4`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seed: 0,
            runs: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the index of the centroid in `centroids` closest to `query`.
///
/// `centroids` holds the components of 8 centroids per chunk.
/// Unused lanes in the last chunk must be set to infinity.
#[inline]
fn simd_argmin(centroids: &[[f32x8; N]], query: [f32; N]) -> usize {
    let incr = f32x8::ONE;
    let mut cur_chunk = f32x8::ZERO;
    let mut min_chunk = cur_chunk;
    let mut min_distance = f32x8::splat(f32::INFINITY);

    let query = query.map(f32x8::splat);

    for chunk in centroids {
        let distance = array::from_fn::<_, N, _>(|i| {
            let diff = query[i] - chunk[i];
            diff * diff
        })
        .into_iter()
        .fold(f32x8::ZERO, |a, b| a + b);

        let mask = distance.cmp_lt(min_distance);
        min_chunk = mask.blend(cur_chunk, min_chunk);
        min_distance = min_distance.fast_min(distance);
        cur_chunk += incr;
    }

    let mut min_lane = 0;
    let mut min_dist = f32::INFINITY;
    for (i, &v) in min_distance.as_array_ref().iter().enumerate() {
        if v < min_dist {
            min_dist = v;
            min_lane = i;
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let min_chunk = min_chunk.as_array_ref()[min_lane] as usize;

    min_chunk * 8 + min_lane
}

/// Returns the squared euclidean distance between a color and a centroid.
#[inline]
fn squared_distance(color: [u8; N], centroid: [f64; N]) -> f64 {
    (0..N)
        .map(|c| {
            let diff = f64::from(color[c]) - centroid[c];
            diff * diff
        })
        .sum()
}

/// Converts a color to a centroid position.
fn to_centroid(color: [u8; N]) -> [f64; N] {
    color.map(f64::from)
}

/// Rounds a centroid component to the nearest 8-bit value.
fn round_component(value: f64) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        value.round().clamp(0.0, 255.0) as u8
    }
}

/// The centroids of one iteration, laid out for [`simd_argmin`].
struct Centers {
    /// The centroid positions.
    positions: Vec<[f64; N]>,
    /// The centroid components in chunks of 8.
    lanes: Vec<[f32x8; N]>,
}

impl Centers {
    /// Creates a new [`Centers`] from the given centroid positions.
    fn new(positions: Vec<[f64; N]>) -> Self {
        let lanes = positions
            .chunks(8)
            .map(|chunk| {
                array::from_fn(|c| {
                    let mut lane = [f32::INFINITY; 8];
                    for (l, position) in lane.iter_mut().zip(chunk) {
                        #[allow(clippy::cast_possible_truncation)]
                        {
                            *l = position[c] as f32;
                        }
                    }
                    f32x8::new(lane)
                })
            })
            .collect();

        Self { positions, lanes }
    }

    /// The number of centroids.
    fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns the index of the centroid nearest to `color`.
    #[inline]
    fn nearest(&self, color: [u8; N]) -> usize {
        simd_argmin(&self.lanes, color.map(f32::from))
    }
}

/// The accumulated result of assigning a range of points.
#[derive(Debug, Clone)]
struct Partial {
    /// The weighted component sums of the points assigned to each centroid.
    sums: Vec<[u64; N]>,
    /// The total weight of the points assigned to each centroid.
    counts: Vec<u64>,
    /// The weighted sum of squared distances to the assigned centroids.
    inertia: f64,
    /// The number of points whose assignment changed.
    changed: usize,
}

impl Partial {
    /// Creates an empty [`Partial`] for `k` centroids.
    fn new(k: usize) -> Self {
        Self {
            sums: vec![[0; N]; k],
            counts: vec![0; k],
            inertia: 0.0,
            changed: 0,
        }
    }

    /// Adds `other` to `self`.
    fn merge(mut self, other: Self) -> Self {
        for (sum, other) in self.sums.iter_mut().zip(other.sums) {
            for c in 0..N {
                sum[c] += other[c];
            }
        }
        for (count, other) in self.counts.iter_mut().zip(other.counts) {
            *count += other;
        }
        self.inertia += other.inertia;
        self.changed += other.changed;
        self
    }
}

/// Assigns each point in the chunk to its nearest centroid.
fn assign_chunk(
    points: &[[u8; N]],
    weights: &[u32],
    centers: &Centers,
    assignments: &mut [u16],
) -> Partial {
    let mut partial = Partial::new(centers.len());

    for ((&color, &weight), assignment) in points.iter().zip(weights).zip(assignments) {
        let i = centers.nearest(color);
        let weight = u64::from(weight);

        for c in 0..N {
            partial.sums[i][c] += weight * u64::from(color[c]);
        }
        partial.counts[i] += weight;
        #[allow(clippy::cast_precision_loss)]
        {
            partial.inertia += weight as f64 * squared_distance(color, centers.positions[i]);
        }

        #[allow(clippy::cast_possible_truncation)]
        let i = i as u16;
        if *assignment != i {
            *assignment = i;
            partial.changed += 1;
        }
    }

    partial
}

/// The function signature for the assignment step.
type Assign = fn(&[[u8; N]], &[u32], &Centers, &mut [u16]) -> Partial;

/// Assigns all points to their nearest centroid.
fn assign(points: &[[u8; N]], weights: &[u32], centers: &Centers, assignments: &mut [u16]) -> Partial {
    points
        .chunks(CHUNK_SIZE)
        .zip(weights.chunks(CHUNK_SIZE))
        .zip(assignments.chunks_mut(CHUNK_SIZE))
        .map(|((points, weights), assignments)| assign_chunk(points, weights, centers, assignments))
        .fold(Partial::new(centers.len()), Partial::merge)
}

/// Assigns all points to their nearest centroid in parallel.
#[cfg(feature = "threads")]
fn assign_par(
    points: &[[u8; N]],
    weights: &[u32],
    centers: &Centers,
    assignments: &mut [u16],
) -> Partial {
    points
        .par_chunks(CHUNK_SIZE)
        .zip(weights.par_chunks(CHUNK_SIZE))
        .zip(assignments.par_chunks_mut(CHUNK_SIZE))
        .map(|((points, weights), assignments)| assign_chunk(points, weights, centers, assignments))
        .collect::<Vec<_>>()
        .into_iter()
        .fold(Partial::new(centers.len()), Partial::merge)
}

/// The weighted points to cluster.
struct Points<'a> {
    /// The point positions.
    colors: &'a [[u8; N]],
    /// The weight of each point.
    weights: Vec<u32>,
}

impl<'a> Points<'a> {
    /// Creates a new [`Points`] from the given `color_counts`.
    fn new<Color>(color_counts: &'a impl ColorCounts<Color>) -> Self
    where
        Color: ColorComponents<u8, N>,
    {
        let weights = match color_counts.counts() {
            Some(counts) => counts.to_vec(),
            None => vec![1; color_counts.len()],
        };

        Self { colors: color_counts.color_components(), weights }
    }

    /// Returns the mean over the channels of the weighted per-channel variance.
    fn mean_variance(&self) -> f64 {
        let total = self.weights.iter().copied().map(f64::from).sum::<f64>();
        if total == 0.0 {
            return 0.0;
        }

        let mut mean = [0.0; N];
        for (color, &weight) in self.colors.iter().zip(&self.weights) {
            for c in 0..N {
                mean[c] += f64::from(weight) * f64::from(color[c]);
            }
        }
        let mean = mean.map(|sum| sum / total);

        let variance = self
            .colors
            .iter()
            .zip(&self.weights)
            .map(|(&color, &weight)| f64::from(weight) * squared_distance(color, mean))
            .sum::<f64>();

        variance / total / (N as f64)
    }

    /// The alias table used to sample points by weight.
    fn alias_index(&self) -> Option<WeightedAliasIndex<u64>> {
        // Fails only for empty inputs or zero weights, which callers rule out.
        WeightedAliasIndex::new(self.weights.iter().copied().map(u64::from).collect()).ok()
    }

    /// Chooses `k` initial centroids from the points with k-means++.
    ///
    /// The first centroid is sampled by weight, and each subsequent centroid is sampled
    /// with a probability proportional to its weight times its squared distance
    /// to the nearest centroid chosen so far.
    fn kmeans_plus_plus(&self, k: usize, rng: &mut Xoroshiro128PlusPlus) -> Vec<[f64; N]> {
        let mut centroids = Vec::with_capacity(k);

        let first = self.alias_index().map_or(0, |dist| dist.sample(rng));
        centroids.push(to_centroid(self.colors[first]));

        let mut min_distance = self
            .colors
            .iter()
            .map(|&color| squared_distance(color, centroids[0]))
            .collect::<Vec<_>>();

        while centroids.len() < k {
            let potential = min_distance
                .iter()
                .zip(&self.weights)
                .map(|(&d, &w)| d * f64::from(w));

            let next = match WeightedIndex::new(potential) {
                Ok(dist) => dist.sample(rng),
                Err(_) => farthest(&min_distance),
            };

            let centroid = to_centroid(self.colors[next]);
            centroids.push(centroid);

            for (d, &color) in min_distance.iter_mut().zip(self.colors) {
                *d = d.min(squared_distance(color, centroid));
            }
        }

        centroids
    }
}

/// Returns the index of the largest distance, preferring the earliest index on ties.
fn farthest(distances: &[f64]) -> usize {
    let mut max = 0;
    for (i, &d) in distances.iter().enumerate() {
        if d > distances[max] {
            max = i;
        }
    }
    max
}

/// The result of a single k-means run.
struct Run {
    /// The final centroid positions.
    centroids: Vec<[f64; N]>,
    /// The total weight assigned to each centroid.
    counts: Vec<u64>,
    /// The weighted sum of squared distances to the final centroids.
    inertia: f64,
    /// The number of iterations performed.
    iterations: u32,
}

/// Moves centroids that were left without points onto the points
/// farthest from their current centroid.
fn relocate_empty(
    points: &Points,
    centers: &Centers,
    assignments: &[u16],
    counts: &[u64],
    centroids: &mut [[f64; N]],
) {
    let empty = counts
        .iter()
        .enumerate()
        .filter_map(|(i, &count)| (count == 0).then_some(i))
        .collect::<Vec<_>>();

    if empty.is_empty() {
        return;
    }

    let mut farthest = points
        .colors
        .iter()
        .zip(assignments)
        .enumerate()
        .map(|(i, (&color, &a))| (squared_distance(color, centers.positions[usize::from(a)]), i))
        .collect::<Vec<_>>();

    farthest.sort_by(|(a, i), (b, j)| b.total_cmp(a).then(i.cmp(j)));

    for (&cluster, &(_, i)) in empty.iter().zip(&farthest) {
        centroids[cluster] = to_centroid(points.colors[i]);
    }
}

/// Runs Lloyd's algorithm from the given initial centroids.
fn lloyd(
    points: &Points,
    initial: Vec<[f64; N]>,
    params: &KmeansParams,
    threshold: f64,
    assign: Assign,
) -> Run {
    let mut assignments = vec![u16::MAX; points.colors.len()];
    let mut centers = Centers::new(initial);
    let mut iterations = 0;

    while iterations < params.max_iterations {
        iterations += 1;

        let partial = assign(points.colors, &points.weights, &centers, &mut assignments);
        if partial.changed == 0 {
            break;
        }

        #[allow(clippy::cast_precision_loss)]
        let mut centroids = partial
            .sums
            .iter()
            .zip(&partial.counts)
            .zip(&centers.positions)
            .map(|((sum, &count), &old)| {
                if count == 0 {
                    old
                } else {
                    sum.map(|s| s as f64 / count as f64)
                }
            })
            .collect::<Vec<_>>();

        relocate_empty(points, &centers, &assignments, &partial.counts, &mut centroids);

        let shift = centroids
            .iter()
            .zip(&centers.positions)
            .map(|(new, old)| (0..N).map(|c| (new[c] - old[c]).powi(2)).sum::<f64>())
            .sum::<f64>();

        centers = Centers::new(centroids);

        if shift <= threshold {
            break;
        }
    }

    let Partial { counts, inertia, .. } =
        assign(points.colors, &points.weights, &centers, &mut assignments);

    Run {
        centroids: centers.positions,
        counts,
        inertia,
        iterations,
    }
}

/// Converts a k-means run into a [`QuantizeOutput`].
fn into_output<Color>(run: Run) -> QuantizeOutput<Color>
where
    Color: ColorComponents<u8, N>,
{
    let palette = run
        .centroids
        .iter()
        .map(|centroid| cast::from_array(centroid.map(round_component)))
        .collect();

    #[allow(clippy::cast_possible_truncation)]
    let counts = run.counts.iter().map(|&count| count as u32).collect();

    QuantizeOutput { palette, counts }
}

/// Runs k-means++ seeded k-means `params.runs` times and keeps the run with the lowest inertia.
fn best_of_runs<Color>(
    color_counts: &impl ColorCounts<Color>,
    palette_size: PaletteSize,
    params: &KmeansParams,
    assign: Assign,
) -> QuantizeOutput<Color>
where
    Color: ColorComponents<u8, N>,
{
    let k = palette_size.as_usize();

    if k == 0 || color_counts.is_empty() {
        return QuantizeOutput::default();
    }
    if color_counts.len() <= k {
        return QuantizeOutput::trivial_palette(color_counts);
    }

    let points = Points::new(color_counts);
    let threshold = params.tolerance * points.mean_variance();
    let rng = &mut Xoroshiro128PlusPlus::seed_from_u64(params.seed);

    let mut best: Option<Run> = None;
    for run in 0..params.runs.max(1) {
        let initial = points.kmeans_plus_plus(k, rng);
        let result = lloyd(&points, initial, params, threshold, assign);

        log::debug!(
            "k-means run {run} finished after {} iterations with an inertia of {}",
            result.iterations,
            result.inertia
        );

        if best.as_ref().map_or(true, |best| result.inertia < best.inertia) {
            best = Some(result);
        }
    }

    best.map(into_output).unwrap_or_default()
}

/// Runs k-means once from the given initial centroids.
fn from_centroids<Color>(
    color_counts: &impl ColorCounts<Color>,
    initial_centroids: Centroids<Color>,
    params: &KmeansParams,
    assign: Assign,
) -> QuantizeOutput<Color>
where
    Color: ColorComponents<u8, N>,
{
    let k = initial_centroids.0.len();

    if k == 0 || color_counts.is_empty() {
        return QuantizeOutput::default();
    }
    if color_counts.len() <= k {
        return QuantizeOutput::trivial_palette(color_counts);
    }

    let points = Points::new(color_counts);
    let threshold = params.tolerance * points.mean_variance();
    let initial = initial_centroids
        .into_inner()
        .into_iter()
        .map(|color| to_centroid(cast::into_array(color)))
        .collect();

    let result = lloyd(&points, initial, params, threshold, assign);

    log::debug!(
        "k-means from {k} initial centroids finished after {} iterations with an inertia of {}",
        result.iterations,
        result.inertia
    );

    into_output(result)
}

/// Computes a color palette from the given `color_counts` with exactly `palette_size` entries
/// using k-means++ seeded k-means.
///
/// If `color_counts` has no more colors than `palette_size`,
/// then the colors themselves are returned as the palette.
/// Both fields of the output will be empty if `color_counts` is empty or `palette_size` is `0`.
#[must_use]
pub fn palette<Color>(
    color_counts: &impl ColorCounts<Color>,
    palette_size: PaletteSize,
    params: &KmeansParams,
) -> QuantizeOutput<Color>
where
    Color: ColorComponents<u8, N>,
{
    best_of_runs(color_counts, palette_size, params, assign)
}

/// Computes a color palette from the given `color_counts` by running k-means once,
/// starting from `initial_centroids`.
///
/// The palette has one entry per initial centroid, in the same order.
/// `params.seed` and `params.runs` are ignored.
#[must_use]
pub fn palette_from_centroids<Color>(
    color_counts: &impl ColorCounts<Color>,
    initial_centroids: Centroids<Color>,
    params: &KmeansParams,
) -> QuantizeOutput<Color>
where
    Color: ColorComponents<u8, N>,
{
    from_centroids(color_counts, initial_centroids, params, assign)
}

/// Computes a color palette in parallel using k-means++ seeded k-means.
///
/// The output is identical to [`palette`] for any number of threads.
#[cfg(feature = "threads")]
#[must_use]
pub fn palette_par<Color>(
    color_counts: &impl ColorCounts<Color>,
    palette_size: PaletteSize,
    params: &KmeansParams,
) -> QuantizeOutput<Color>
where
    Color: ColorComponents<u8, N>,
{
    best_of_runs(color_counts, palette_size, params, assign_par)
}

/// Computes a color palette in parallel by running k-means once, starting from `initial_centroids`.
///
/// The output is identical to [`palette_from_centroids`] for any number of threads.
#[cfg(feature = "threads")]
#[must_use]
pub fn palette_from_centroids_par<Color>(
    color_counts: &impl ColorCounts<Color>,
    initial_centroids: Centroids<Color>,
    params: &KmeansParams,
) -> QuantizeOutput<Color>
where
    Color: ColorComponents<u8, N>,
{
    from_centroids(color_counts, initial_centroids, params, assign_par)
}
