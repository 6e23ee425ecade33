//! roi-slicer CLI: run the region engines and exports from the command line.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use roi_slicer::{
    load_image, AutoDetector, CancelToken, CandidateRegion, ExportManager, Point, RectInput,
    RoiSet, SlicerConfig, SmartSeed, SmartSegmenter, SuperpixelSegmenter,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "roi-slicer")]
#[command(about = "Extract screenshot regions and export automation datasets")]
#[command(version)]
struct Cli {
    /// JSON configuration file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the uniformly coloured region under a seed point.
    Detect {
        #[arg(long)]
        image: PathBuf,

        /// Seed point as `x,y`.
        #[arg(long, value_parser = parse_point)]
        seed: Point,

        /// Colour tolerance override.
        #[arg(long)]
        tolerance: Option<f32>,

        /// Collect every region coloured like the seed.
        #[arg(long)]
        similar: bool,
    },
    /// Propose every red dot, button and icon in a screenshot.
    DetectAll {
        #[arg(long)]
        image: PathBuf,
    },
    /// Refine a box (`--rect x,y,w,h`) or points (`--point x,y`) into a foreground region.
    Refine {
        #[arg(long)]
        image: PathBuf,

        #[arg(long, value_parser = parse_rect, conflicts_with = "point")]
        rect: Option<RectInput>,

        #[arg(long, value_parser = parse_point)]
        point: Vec<Point>,

        /// Refinement pass limit override.
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Compute superpixels and print atom statistics.
    Superpixel {
        #[arg(long)]
        image: PathBuf,

        /// Requested atom count.
        #[arg(long)]
        regions: Option<u32>,

        /// Write per-atom statistics (JSON).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export crops, JSON and scripts for a saved ROI document.
    Export {
        #[arg(long)]
        image: PathBuf,

        /// ROI document written by the editor.
        #[arg(long)]
        rois: PathBuf,

        /// Output directory; the configured one when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write the default configuration file.
    InitConfig {
        #[arg(long, default_value = "roi_slicer.json")]
        out: PathBuf,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SlicerConfig::from_json_file(path)?,
        None => SlicerConfig::default(),
    };

    match cli.command {
        Commands::Detect {
            image,
            seed,
            tolerance,
            similar,
        } => run_detect(&config, &image, seed, tolerance, similar),
        Commands::DetectAll { image } => run_detect_all(&config, &image),
        Commands::Refine {
            image,
            rect,
            point,
            iterations,
        } => run_refine(&config, &image, rect, point, iterations),
        Commands::Superpixel {
            image,
            regions,
            out,
        } => run_superpixel(&config, &image, regions, out.as_deref()),
        Commands::Export { image, rois, out } => run_export(&config, &image, &rois, out),
        Commands::InitConfig { out } => {
            SlicerConfig::default().to_json_file(&out)?;
            tracing::info!("Default configuration written to {}", out.display());
            Ok(())
        }
    }
}

fn run_detect(
    config: &SlicerConfig,
    image_path: &Path,
    seed: Point,
    tolerance: Option<f32>,
    similar: bool,
) -> CliResult<()> {
    let image = load_image(image_path)?;
    let detector = AutoDetector::with_params(config.auto_detect.clone());
    let tolerance = tolerance.unwrap_or(config.auto_detect.tolerance);
    let found = if similar {
        detector.detect_similar(image.pixels(), seed, tolerance)?
    } else {
        detector.detect(image.pixels(), seed, tolerance)?
    };
    print_candidate(found.as_ref())
}

fn run_detect_all(config: &SlicerConfig, image_path: &Path) -> CliResult<()> {
    let image = load_image(image_path)?;
    let found = AutoDetector::with_params(config.auto_detect.clone()).detect_all(image.pixels())?;
    tracing::info!("Found {} regions", found.len());
    let values: Vec<_> = found.iter().map(candidate_json).collect();
    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}

fn run_refine(
    config: &SlicerConfig,
    image_path: &Path,
    rect: Option<RectInput>,
    points: Vec<Point>,
    iterations: Option<u32>,
) -> CliResult<()> {
    let seed = match rect {
        Some(rect) => SmartSeed::Rect(rect),
        None if !points.is_empty() => SmartSeed::Points(points),
        None => return Err("either --rect or --point is required".into()),
    };
    let image = load_image(image_path)?;
    let segmenter = SmartSegmenter::with_params(config.smart.clone());
    let iterations = iterations.unwrap_or(config.smart.iterations);
    let candidate = segmenter.refine(image.pixels(), &seed, iterations, &CancelToken::new())?;
    print_candidate(Some(&candidate))
}

fn run_superpixel(
    config: &SlicerConfig,
    image_path: &Path,
    regions: Option<u32>,
    out: Option<&Path>,
) -> CliResult<()> {
    let image = load_image(image_path)?;
    let params = config.superpixel.clone();
    let target = regions.unwrap_or_else(|| params.region_count_for(image.size()));
    let compactness = params.compactness;
    let map = SuperpixelSegmenter::with_params(params).precompute(
        image.pixels(),
        target,
        compactness,
        &CancelToken::new(),
    )?;
    tracing::info!("Computed {} atoms (requested {})", map.len(), target);

    if let Some(out) = out {
        let atoms: Vec<_> = map
            .atoms()
            .iter()
            .map(|atom| {
                serde_json::json!({
                    "id": atom.id,
                    "area": atom.area,
                    "bounds": atom.bounds,
                    "mean_rgb": atom.mean_rgb,
                    "neighbors": atom.neighbors,
                })
            })
            .collect();
        std::fs::write(out, serde_json::to_string_pretty(&atoms)?)?;
        tracing::info!("Atom statistics written to {}", out.display());
    }
    Ok(())
}

fn run_export(
    config: &SlicerConfig,
    image_path: &Path,
    rois_path: &Path,
    out: Option<PathBuf>,
) -> CliResult<()> {
    let image = load_image(image_path)?;
    let rois = RoiSet::from_json(&std::fs::read_to_string(rois_path)?)?;
    if rois.image_size() != image.size() {
        return Err(format!(
            "ROI document is for {:?}, image is {:?}",
            rois.image_size(),
            image.size()
        )
        .into());
    }

    let out = out.unwrap_or_else(|| PathBuf::from(&config.export.output_dir));
    let report = ExportManager::with_config(config.export.clone()).export_bundle(
        image.pixels(),
        rois.as_slice(),
        &out,
    )?;
    for failure in &report.failures {
        tracing::warn!("{:?}: {}", failure.item, failure.error.user_message());
    }
    tracing::info!(
        "Exported {} ROIs to {} ({} files)",
        rois.len(),
        out.display(),
        report.written.len()
    );
    if report.is_complete() {
        Ok(())
    } else {
        Err(format!("{} export steps failed", report.failures.len()).into())
    }
}

fn candidate_json(candidate: &CandidateRegion) -> serde_json::Value {
    serde_json::json!({
        "rect": candidate.rect,
        "area": candidate.area(),
        "masked": candidate.mask.is_some(),
    })
}

fn print_candidate(candidate: Option<&CandidateRegion>) -> CliResult<()> {
    let value = candidate.map_or(serde_json::Value::Null, candidate_json);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn parse_point(s: &str) -> Result<Point, String> {
    match parse_ints(s)?.as_slice() {
        &[x, y] => Ok(Point::new(x as i32, y as i32)),
        _ => Err(format!("expected x,y but got `{s}`")),
    }
}

fn parse_rect(s: &str) -> Result<RectInput, String> {
    match parse_ints(s)?.as_slice() {
        &[x, y, w, h] => Ok(RectInput::new(x, y, w, h)),
        _ => Err(format!("expected x,y,w,h but got `{s}`")),
    }
}

fn parse_ints(s: &str) -> Result<Vec<i64>, String> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|e| format!("`{part}`: {e}"))
        })
        .collect()
}
