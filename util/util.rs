#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use image::{Rgb, RgbImage};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;

pub fn load_images(images: &[PathBuf]) -> Vec<(String, RgbImage)> {
    images
        .iter()
        .map(|path| {
            image::open(path).map(|image| {
                (
                    path.file_name().unwrap().to_owned().into_string().unwrap(),
                    image.into_rgb8(),
                )
            })
        })
        .collect::<Result<_, _>>()
        .expect("loaded each image")
}

/// Loads every image in `dir`, or nothing if `dir` does not exist.
pub fn load_image_dir(dir: impl AsRef<Path>) -> Vec<(String, RgbImage)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths = entries
        .collect::<Result<Vec<_>, _>>()
        .expect("read each file")
        .iter()
        .map(std::fs::DirEntry::path)
        .collect::<Vec<_>>();

    paths.sort();

    load_images(&paths)
}

/// A smooth two dimensional gradient.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        let b = ((x + y) * 255 / (width + height).max(1)) as u8;
        Rgb([r, g, b])
    })
}

/// Large blocks of a few colors with sparse per-pixel noise.
pub fn blocks(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    let colors = (0..12)
        .map(|_| Rgb([rng.gen::<u8>(), rng.gen(), rng.gen()]))
        .collect::<Vec<_>>();

    RgbImage::from_fn(width, height, |x, y| {
        let Rgb([r, g, b]) = colors[((x / 64 + y / 48 * 7) % 12) as usize];
        if rng.gen_ratio(1, 20) {
            Rgb([r.wrapping_add(rng.gen_range(0..8)), g, b.wrapping_sub(rng.gen_range(0..8))])
        } else {
            Rgb([r, g, b])
        }
    })
}

/// Uniform noise, the worst case for the number of distinct colors.
pub fn noise(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    RgbImage::from_fn(width, height, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]))
}

pub const BENCH_DIR: &str = "img/bench";

static BENCH_IMAGES: OnceLock<Vec<(String, RgbImage)>> = OnceLock::new();

pub fn load_bench_images() -> Vec<(String, RgbImage)> {
    let mut images = vec![
        ("gradient".to_owned(), gradient(1920, 1080)),
        ("blocks".to_owned(), blocks(1920, 1080, 1)),
        ("noise".to_owned(), noise(1024, 1024, 2)),
    ];
    images.extend(load_image_dir(BENCH_DIR));
    images
}

/// Synthetic images plus any images found in [`BENCH_DIR`].
pub fn bench_images() -> &'static [(String, RgbImage)] {
    BENCH_IMAGES.get_or_init(load_bench_images)
}
