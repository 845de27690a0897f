#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice
)]

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use img2palette::{
    render_swatch_strip, worker_pool, KmeansOptions, PalettePipeline, Strategy, SwatchLayout,
};

#[derive(Copy, Clone, ValueEnum)]
enum CliStrategy {
    Quantize,
    Cluster,
}

impl Display for CliStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CliStrategy::Quantize => "quantize",
                CliStrategy::Cluster => "cluster",
            }
        )
    }
}

/// Extracts a perceptually ordered color palette from an image and saves it as a swatch strip.
#[derive(Parser)]
#[command(version, about)]
pub struct Options {
    /// The image to extract the palette from.
    input: PathBuf,

    /// Where to save the swatch strip. Defaults to `<input stem>_color_palette.png`
    /// next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// The number of colors in the palette. Defaults to the largest supported palette size,
    /// and out of range values are clamped.
    #[arg(short, long)]
    k: Option<u16>,

    /// How to reduce the image to a palette: median cut quantization of a 256x256 working image,
    /// or k-means clustering of a 100x100 working image.
    #[arg(long, default_value_t = CliStrategy::Quantize)]
    strategy: CliStrategy,

    /// The width and height of each swatch in pixels.
    #[arg(long, default_value_t = SwatchLayout::DEFAULT_SWATCH_SIZE)]
    swatch_size: u32,

    /// The seed for k-means clustering.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// The number of worker threads. Defaults to `IMG2PALETTE_WORKERS` or half of the CPUs.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Log debug output, including stage timings and the palette colors.
    /// Otherwise, the log level is read from `RUST_LOG` and defaults to warnings.
    #[arg(long)]
    verbose: bool,
}

/// Returns the default output path for `input`: `<stem>_color_palette.png` in the same directory.
fn default_output(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    input.with_file_name(format!("{stem}_color_palette.png"))
}

fn init_logger(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn main() -> anyhow::Result<()> {
    let options = Options::parse();
    init_logger(options.verbose);

    let pool = match options.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new().num_threads(threads).build()?,
        None => worker_pool()?,
    };

    pool.install(|| run(options))
}

fn run(options: Options) -> anyhow::Result<()> {
    let Options {
        input, output, k, strategy, swatch_size, seed, ..
    } = options;

    macro_rules! timed {
        ($name: literal, $val: expr) => {{
            let time = std::time::Instant::now();
            let value = $val;
            log::info!("{} took {}ms", $name, time.elapsed().as_millis());
            value
        }};
    }

    let image = timed!(
        "read image",
        image::open(&input).with_context(|| format!("failed to read {}", input.display()))?
    )
    .into_rgb8();

    let strategy = match strategy {
        CliStrategy::Quantize => Strategy::quantize(),
        CliStrategy::Cluster => KmeansOptions::new().seed(seed).into(),
    };

    let pipeline = PalettePipeline::try_from(&image)
        .with_context(|| format!("cannot extract a palette from {}", input.display()))?
        .strategy(strategy);

    let max = pipeline.max_palette_size();
    let k = match k {
        Some(k) => {
            let clamped = pipeline.clamped_palette_size(k);
            if clamped.into_inner() != k {
                log::warn!("palette size {k} is outside of 1..={max}, using {clamped} instead");
            }
            clamped
        }
        None => max,
    };

    let palette = timed!(
        "palette extraction",
        pipeline.palette_size(k).ordered_palette_par()?
    );

    for color in palette.to_srgb8() {
        log::debug!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue);
    }

    let strip = render_swatch_strip(&palette, swatch_size)?;

    let output = output.unwrap_or_else(|| default_output(&input));
    timed!(
        "write image",
        strip
            .save(&output)
            .with_context(|| format!("failed to write {}", output.display()))?
    );

    println!("{}", output.display());

    Ok(())
}
