use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tilewire::{
    CancelToken, DisplaySink, PixelRect, ProtocolDecoder, RenderConfig, RenderWindow, Renderer,
    StreamDriver, StreamSummary, TilewireResult,
};

#[derive(Parser, Debug)]
#[command(name = "tilewire", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Decode a captured tile stream into a PNG.
    Decode(DecodeArgs),
    /// Run a renderer command and decode its live stream into a PNG.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct DecodeArgs {
    /// Captured chunk stream (a renderer's raw stdout).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Render configuration JSON.
    #[arg(long)]
    config: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Render configuration JSON.
    #[arg(long)]
    config: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Renderer command line; it must write the tile stream to stdout.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    command: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Decode(args) => cmd_decode(args),
        Cmd::Run(args) => cmd_run(args),
    }
}

fn cmd_decode(args: DecodeArgs) -> anyhow::Result<()> {
    let config = RenderConfig::from_json_file(&args.config)?;
    let window = config.window()?;

    let file = File::open(&args.in_path)
        .with_context(|| format!("open capture '{}'", args.in_path.display()))?;
    let decoder = ProtocolDecoder::with_byte_order(BufReader::new(file), config.byte_order);

    let mut sink = ImageSink::new(&window);
    let summary = StreamDriver::new(
        decoder,
        window,
        config.total_pixels(&window),
        &mut sink,
    )
    .run()?;

    sink.save(&args.out)?;
    report(&summary);
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let config = RenderConfig::from_json_file(&args.config)?;
    let window = config.window()?;

    let mut parts = args.command.iter();
    let program = parts.next().context("renderer command is empty")?;
    let mut command = Command::new(program);
    command.args(parts);

    let mut sink = ImageSink::new(&window);
    let mut last_percent = -1i32;
    let summary = Renderer::new().render(
        &config,
        command,
        &mut sink,
        CancelToken::new(),
        |fraction| {
            let percent = (fraction * 100.0) as i32;
            if percent != last_percent {
                last_percent = percent;
                eprint!("\rrendering: {percent:3}%");
            }
        },
    )?;
    eprintln!();

    sink.save(&args.out)?;
    report(&summary);
    Ok(())
}

fn report(summary: &StreamSummary) {
    println!(
        "rendering ended: {} ({} pixels delivered)",
        summary.end, summary.rendered_pixels
    );
}

/// Accumulates committed rectangles into an RGBA image covering the render
/// window. The sink's display space has a bottom-left origin; the image
/// crate's rows grow downward, so rows flip on write.
struct ImageSink {
    image: image::Rgba32FImage,
}

impl ImageSink {
    fn new(window: &RenderWindow) -> Self {
        Self {
            image: image::Rgba32FImage::new(window.width(), window.height()),
        }
    }

    fn save(self, path: &Path) -> anyhow::Result<()> {
        image::DynamicImage::ImageRgba32F(self.image)
            .to_rgba8()
            .save(path)
            .with_context(|| format!("write '{}'", path.display()))?;
        Ok(())
    }
}

impl DisplaySink for ImageSink {
    fn commit(&mut self, rect: &PixelRect) -> TilewireResult<()> {
        let channels = rect.channels as usize;
        for row in 0..rect.height {
            let Some(flipped_y) = self
                .image
                .height()
                .checked_sub(1 + rect.y + row) else { continue };
            for col in 0..rect.width {
                let x = rect.x + col;
                if x >= self.image.width() {
                    continue;
                }
                let base = (row * rect.width + col) as usize * channels;
                let px = rgba_from_samples(&rect.data[base..base + channels]);
                self.image.put_pixel(x, flipped_y, image::Rgba(px));
            }
        }
        Ok(())
    }
}

fn rgba_from_samples(samples: &[f32]) -> [f32; 4] {
    match samples {
        [v] => [*v, *v, *v, 1.0],
        [v, a] => [*v, *v, *v, *a],
        [r, g, b] => [*r, *g, *b, 1.0],
        [r, g, b, a, ..] => [*r, *g, *b, *a],
        [] => [0.0, 0.0, 0.0, 0.0],
    }
}
