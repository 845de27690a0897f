//! A library for extracting small, perceptually ordered color palettes from images.
//!
//! Palette extraction happens in three steps:
//! 1. A color reducer collapses the pixels of a downsampled working image into `k`
//!    representative colors, either through median cut quantization (see [`median_cut`])
//!    or through k-means clustering (see [`kmeans`]).
//! 2. The [`sequence`] step converts these colors to CIELAB and chains them together
//!    by nearest CIEDE2000 difference, starting from the darkest color.
//! 3. The [`swatch`] step renders the ordered palette into a strip of solid squares.
//!
//! # Features
//! `img2palette` has several `cargo` features that can be turned off or on:
//! - `kmeans`: adds k-means clustering as a color reduction strategy.
//! - `threads`: exposes parallel versions of the clustering step via [`rayon`].
//! - `cli`: builds the `img2palette` command line tool.
//!
//! # High-Level API
//! To get started, see [`extract_palette`] or the [`PalettePipeline`] builder:
//! ```no_run
//! # use img2palette::{PalettePipeline, Strategy, KmeansOptions, render_swatch_strip};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("some image")?.into_rgb8();
//!
//! let pipeline = PalettePipeline::try_from(&img)?
//!     .strategy(Strategy::Cluster(KmeansOptions::new().seed(42)));
//!
//! // let the caller pick any k up to the number of colors in the working image
//! let k = pipeline.max_palette_size().into_inner().min(16);
//! let palette = pipeline.palette_size(k.try_into()?).ordered_palette_par()?;
//!
//! render_swatch_strip(&palette, 3)?.save("some image_color_palette.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! Note that some of the options and functions above require certain features to be enabled.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

mod api;
mod color_counts;
mod error;
mod traits;
mod types;

#[cfg(feature = "threads")]
mod workers;

pub mod median_cut;
pub mod sequence;
pub mod swatch;

#[cfg(feature = "kmeans")]
pub mod kmeans;

pub use api::*;
pub use color_counts::*;
pub use error::PaletteError;
pub use sequence::OrderedPalette;
pub use swatch::{paint_swatches, render_swatch_strip, render_swatch_strip_with, SwatchLayout};
pub use traits::*;
pub use types::*;

#[cfg(feature = "threads")]
pub use workers::{worker_count, worker_pool, WORKERS_ENV};

/// The maximum supported image size in number of pixels is `u32::MAX`.
pub const MAX_PIXELS: u32 = u32::MAX;

/// The maximum supported number of palette colors is `256`.
pub const MAX_COLORS: u16 = u8::MAX as u16 + 1;

/// `MAX_COLORS` as a `usize` for array and `Vec` lengths.
#[cfg(feature = "kmeans")]
pub(crate) const MAX_K: usize = MAX_COLORS as usize;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_docs_in_private_items)]
pub(crate) mod tests {
    use image::RgbImage;
    use palette::Srgb;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoroshiro128PlusPlus;
    use std::collections::HashSet;

    /// Returns `len` distinct, randomly generated colors.
    pub fn test_data(len: usize) -> Vec<Srgb<u8>> {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(42);
        let mut seen = HashSet::with_capacity(len);
        let mut colors = Vec::with_capacity(len);
        while colors.len() < len {
            let color: [u8; 3] = [rng.gen(), rng.gen(), rng.gen()];
            if seen.insert(color) {
                colors.push(Srgb::from(color));
            }
        }
        colors
    }

    pub fn test_data_256() -> Vec<Srgb<u8>> {
        test_data(256)
    }

    pub fn test_data_1024() -> Vec<Srgb<u8>> {
        test_data(1024)
    }

    /// Builds an image by repeating `colors` over its pixels in row-major order.
    pub fn tiled_image(width: u32, height: u32, colors: &[Srgb<u8>]) -> RgbImage {
        let mut i = 0;
        RgbImage::from_fn(width, height, |_, _| {
            let Srgb { red, green, blue, .. } = colors[i % colors.len()];
            i += 1;
            image::Rgb([red, green, blue])
        })
    }
}
