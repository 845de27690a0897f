//! Perceptual ordering of palette colors.
//!
//! The colors are converted to CIELAB (D65) and chained together greedily:
//! the chain starts at the darkest color (lowest L*), and each following color is the remaining color
//! with the smallest CIEDE2000 difference to the last color in the chain.
//! This is a nearest neighbor heuristic, not a shortest path,
//! but it keeps adjacent swatches visually close.
//!
//! Ties are resolved by position: colors with equal L* keep their input order,
//! and among equally distant candidates the earliest one in the (L*-sorted) pool wins.

use ordered_float::OrderedFloat;
use palette::{
    color_difference::Ciede2000, convert::FromColorUnclamped, white_point::D65, FromColor, Lab,
    Srgb,
};

/// The CIELAB color type used for ordering.
pub type LabColor = Lab<D65, f64>;

/// Converts an 8-bit sRGB color to CIELAB through linear sRGB and CIE XYZ.
#[must_use]
pub fn srgb_to_lab(color: Srgb<u8>) -> LabColor {
    Lab::from_color(color.into_format::<f64>())
}

/// Converts a CIELAB color back to normalized sRGB.
///
/// Channels outside of `0.0..=1.0` are clamped, and non-finite channels become `0.0`.
#[must_use]
pub fn lab_to_srgb(color: LabColor) -> Srgb<f64> {
    let srgb = Srgb::<f64>::from_color_unclamped(color);
    Srgb::new(
        clamp_channel(srgb.red),
        clamp_channel(srgb.green),
        clamp_channel(srgb.blue),
    )
}

/// Clamps a normalized channel into `0.0..=1.0`, mapping non-finite values to `0.0`.
fn clamp_channel(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Converts a normalized channel to 8 bits by rounding `value * 255` half away from zero.
#[must_use]
pub fn channel_to_u8(value: f64) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (clamp_channel(value) * 255.0).round() as u8
    }
}

/// Converts a normalized sRGB color to 8-bit sRGB (see [`channel_to_u8`]).
#[must_use]
pub fn to_srgb8(color: Srgb<f64>) -> Srgb<u8> {
    Srgb::new(
        channel_to_u8(color.red),
        channel_to_u8(color.green),
        channel_to_u8(color.blue),
    )
}

/// Returns the CIEDE2000 color difference between two CIELAB colors.
#[must_use]
pub fn ciede2000(a: LabColor, b: LabColor) -> f64 {
    a.difference(b)
}

/// Returns the order in which to visit `colors` as a permutation of their indices.
///
/// The first index is the color with the lowest L* (the earliest one on ties).
/// Every following index is the unvisited color with the smallest CIEDE2000 difference
/// to the previous one, where ties go to the candidate with the lower L* and then the lower index.
///
/// This runs in `O(n^2)` time. No differences are computed for less than two colors.
#[must_use]
pub fn nearest_neighbor_chain(colors: &[LabColor]) -> Vec<usize> {
    let mut pool = (0..colors.len()).collect::<Vec<_>>();
    pool.sort_by_key(|&i| OrderedFloat(colors[i].l));

    let mut removed = vec![false; pool.len()];
    let mut chain = Vec::with_capacity(pool.len());

    let Some(&darkest) = pool.first() else {
        return chain;
    };

    removed[0] = true;
    chain.push(darkest);

    for _ in 1..pool.len() {
        let last = colors[chain[chain.len() - 1]];

        let mut nearest = None;
        let mut min_distance = f64::INFINITY;
        for (slot, &i) in pool.iter().enumerate() {
            if removed[slot] {
                continue;
            }

            let distance = ciede2000(last, colors[i]);
            if nearest.is_none() || distance < min_distance {
                nearest = Some(slot);
                min_distance = distance;
            }
        }

        if let Some(slot) = nearest {
            log::trace!("chained color {} at a difference of {min_distance}", pool[slot]);
            removed[slot] = true;
            chain.push(pool[slot]);
        }
    }

    chain
}

/// A palette whose colors are ordered so that neighboring colors are perceptually close.
///
/// The colors are stored as normalized sRGB, clamped to `0.0..=1.0`.
/// The first color has the lowest L* of all colors in the palette.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderedPalette {
    /// The ordered colors.
    colors: Vec<Srgb<f64>>,
}

impl OrderedPalette {
    /// Returns the ordered colors as normalized sRGB.
    #[must_use]
    pub fn colors(&self) -> &[Srgb<f64>] {
        &self.colors
    }

    /// Returns the ordered colors as 8-bit sRGB.
    #[must_use]
    pub fn to_srgb8(&self) -> Vec<Srgb<u8>> {
        self.colors.iter().copied().map(to_srgb8).collect()
    }

    /// Returns the number of colors in the palette.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether or not the palette has no colors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Returns the inner `Vec` of normalized sRGB colors.
    #[must_use]
    pub fn into_inner(self) -> Vec<Srgb<f64>> {
        self.colors
    }
}

impl From<OrderedPalette> for Vec<Srgb<f64>> {
    fn from(palette: OrderedPalette) -> Self {
        palette.into_inner()
    }
}

/// Orders the given colors by a greedy CIEDE2000 nearest neighbor chain.
///
/// The returned palette is a permutation of `colors` after a round trip through CIELAB.
/// See the [module documentation](self) for the ordering rules.
///
/// # Examples
/// ```
/// # use img2palette::sequence::sequence;
/// # use palette::Srgb;
/// let colors = [Srgb::new(255, 255, 255), Srgb::new(250, 10, 10), Srgb::new(0, 0, 0)];
/// let palette = sequence(&colors);
/// assert_eq!(palette.to_srgb8()[0], Srgb::new(0, 0, 0));
/// ```
#[must_use]
pub fn sequence(colors: &[Srgb<u8>]) -> OrderedPalette {
    let labs = colors.iter().copied().map(srgb_to_lab).collect::<Vec<_>>();
    let chain = nearest_neighbor_chain(&labs);
    let colors = chain.into_iter().map(|i| lab_to_srgb(labs[i])).collect();
    OrderedPalette { colors }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::*;

    fn lab(l: f64, a: f64, b: f64) -> LabColor {
        Lab::new(l, a, b)
    }

    #[test]
    fn lab_round_trip_within_one() {
        let mut colors = test_data(4096);
        for r in (0..=255u8).step_by(15) {
            for g in (0..=255u8).step_by(15) {
                for b in (0..=255u8).step_by(15) {
                    colors.push(Srgb::new(r, g, b));
                }
            }
        }

        for color in colors {
            let back = to_srgb8(lab_to_srgb(srgb_to_lab(color)));
            let pairs = palette::cast::into_array(back).into_iter().zip(palette::cast::into_array(color));
            for (x, y) in pairs {
                assert!(x.abs_diff(y) <= 1, "{color:?} became {back:?}");
            }
        }
    }

    #[test]
    fn black_and_white_lightness() {
        let black = srgb_to_lab(Srgb::new(0, 0, 0));
        let white = srgb_to_lab(Srgb::new(255, 255, 255));
        assert!(black.l.abs() < 1e-6);
        assert!((white.l - 100.0).abs() < 1e-3);
        assert!(white.a.abs() < 1e-3 && white.b.abs() < 1e-3);
    }

    #[test]
    fn ciede2000_reference_pairs() {
        // pairs from Sharma, Wu & Dalal (2005), "The CIEDE2000 Color-Difference Formula"
        let pairs = [
            (lab(50.0, 2.6772, -79.7751), lab(50.0, 0.0, -82.7485), 2.0425),
            (lab(50.0, 0.0, 0.0), lab(50.0, -1.0, 2.0), 2.3669),
            (lab(50.0, 2.5, 0.0), lab(73.0, 25.0, -18.0), 27.1492),
            (lab(60.2574, -34.0099, 36.2677), lab(60.4626, -34.1751, 39.4387), 1.2644),
            (lab(2.0776, 0.0795, -1.1350), lab(0.9033, -0.0636, -0.5514), 0.9082),
        ];

        for (a, b, expected) in pairs {
            assert!((ciede2000(a, b) - expected).abs() < 1e-3);
            assert!((ciede2000(b, a) - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn channel_rounding() {
        assert_eq!(channel_to_u8(0.0), 0);
        assert_eq!(channel_to_u8(1.0), 255);
        assert_eq!(channel_to_u8(0.5), 128); // 127.5 rounds away from zero
        assert_eq!(channel_to_u8(-0.25), 0);
        assert_eq!(channel_to_u8(1.75), 255);
        assert_eq!(channel_to_u8(f64::NAN), 0);
        assert_eq!(channel_to_u8(f64::INFINITY), 0);
    }

    #[test]
    fn out_of_gamut_is_clamped() {
        // far outside of the sRGB gamut
        let srgb = lab_to_srgb(lab(50.0, 120.0, -120.0));
        for c in [srgb.red, srgb.green, srgb.blue] {
            assert!((0.0..=1.0).contains(&c));
        }

        let srgb = lab_to_srgb(lab(f64::NAN, 0.0, 0.0));
        assert_eq!(srgb, Srgb::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn empty_and_single() {
        assert!(nearest_neighbor_chain(&[]).is_empty());
        assert!(sequence(&[]).is_empty());

        assert_eq!(nearest_neighbor_chain(&[lab(40.0, 1.0, 2.0)]), [0]);
        let palette = sequence(&[Srgb::new(12, 34, 56)]);
        assert_eq!(palette.to_srgb8(), [Srgb::new(12, 34, 56)]);
    }

    #[test]
    fn black_then_white() {
        let palette = sequence(&[Srgb::new(255, 255, 255), Srgb::new(0, 0, 0)]);
        assert_eq!(palette.to_srgb8(), [Srgb::new(0, 0, 0), Srgb::new(255, 255, 255)]);
    }

    #[test]
    fn darkest_first_with_stable_ties() {
        let colors = [lab(50.0, 10.0, 0.0), lab(20.0, 0.0, 0.0), lab(20.0, 5.0, 0.0)];
        assert_eq!(nearest_neighbor_chain(&colors), [1, 2, 0]);
    }

    #[test]
    fn equal_distances_pick_earliest_candidate() {
        // both candidates lie at the same difference from the darkest color
        let colors = [
            lab(50.0, 0.0, 0.0),
            lab(10.0, 0.0, 0.0),
            lab(30.0, 0.0, 10.0),
            lab(30.0, 0.0, -10.0),
        ];
        let chain = nearest_neighbor_chain(&colors);
        assert_eq!(chain[..2], [1, 2]);
    }

    #[test]
    fn identical_colors_keep_order() {
        let colors = [lab(60.0, 3.0, -4.0); 5];
        assert_eq!(nearest_neighbor_chain(&colors), [0, 1, 2, 3, 4]);

        let palette = sequence(&[Srgb::new(255, 0, 0); 4]);
        assert_eq!(palette.to_srgb8(), [Srgb::new(255, 0, 0); 4]);
    }

    #[test]
    fn greedy_choice_at_every_step() {
        let colors = test_data(100);
        let labs = colors.iter().copied().map(srgb_to_lab).collect::<Vec<_>>();
        let chain = nearest_neighbor_chain(&labs);

        let min_l = labs.iter().map(|lab| OrderedFloat(lab.l)).min().unwrap();
        assert_eq!(OrderedFloat(labs[chain[0]].l), min_l);

        for i in 1..chain.len() {
            let last = labs[chain[i - 1]];
            let chosen = ciede2000(last, labs[chain[i]]);
            for &other in &chain[(i + 1)..] {
                assert!(chosen <= ciede2000(last, labs[other]));
            }
        }
    }

    #[test]
    fn sequence_is_a_permutation() {
        let colors = test_data_256();
        let palette = sequence(&colors);
        assert_eq!(palette.len(), colors.len());

        let mut actual = palette.to_srgb8();
        let mut expected = colors;
        actual.sort_by_key(|srgb| srgb.into_components());
        expected.sort_by_key(|srgb| srgb.into_components());
        assert_eq!(actual, expected);
    }
}
