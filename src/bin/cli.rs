//! Command-line front end for facial color screening.
//!
//! Usage:
//!   face-chroma <image>                          # Human-readable output
//!   face-chroma <image> --json                   # JSON output
//!   face-chroma <image> -o report.json --json    # Save to file
//!   face-chroma <image> --regions faces.json     # Skip detection, use given polygons

use clap::Parser;
use face_chroma::{
    diagnose_path, ChannelOrder, DetectorSettings, DiagnosticConfig, DiagnosticResult,
    DlibLandmarker, FaceLandmarker, FaceReport, PrecomputedLandmarker, Region, RegionStatistics,
    Thresholds,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "face-chroma")]
#[command(author, version, about = "Screen a face photo for color-based symptoms", long_about = None)]
struct Args {
    /// Input image file
    #[arg(required = true)]
    image: PathBuf,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Face detector model path
    #[arg(long, default_value = "seeta_fd_frontal_v1.0.bin")]
    detector: PathBuf,

    /// Landmark model path (.dat, .dat.bz2 or .bin)
    #[arg(long, default_value = "shape_predictor_68_face_landmarks.dat.bz2")]
    landmarks: PathBuf,

    /// JSON file with region polygons per face; replaces detection
    #[arg(long, conflicts_with_all = ["detector", "landmarks"])]
    regions: Option<PathBuf>,

    /// Minimum face size for detection
    #[arg(long, default_value = "20")]
    min_face_size: u32,

    /// JSON file overriding the diagnostic thresholds
    #[arg(long)]
    thresholds: Option<PathBuf>,

    /// Read pixels in BGR order, as the thresholds were calibrated
    #[arg(long)]
    bgr: bool,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Output {
    image: String,
    width: u32,
    height: u32,
    faces: Vec<FaceOutput>,
}

#[derive(Serialize)]
struct FaceOutput {
    /// Face index (1-based)
    index: usize,
    #[serde(flatten)]
    report: Option<FaceReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    regions: Vec<RegionOutput>,
    message: String,
}

impl FaceOutput {
    fn new(index: usize, outcome: face_chroma::Result<FaceReport>) -> Self {
        match outcome {
            Ok(report) => {
                let regions = Region::ALL
                    .iter()
                    .filter_map(|r| report.statistics.get(*r).map(|s| RegionOutput::new(*r, s)))
                    .collect();
                Self {
                    index,
                    message: report.result.message(),
                    regions,
                    report: Some(report),
                    error: None,
                }
            }
            Err(e) => Self {
                index,
                message: format!("Analysis failed: {}", e),
                regions: Vec::new(),
                report: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
struct RegionOutput {
    region: Region,
    pixels: i64,
    mean_a: Option<f64>,
    mean_b: Option<f64>,
}

impl RegionOutput {
    fn new(region: Region, stats: RegionStatistics) -> Self {
        Self {
            region,
            pixels: stats.count,
            mean_a: stats.mean_a(),
            mean_b: region.needs_b().then(|| stats.mean_b()).flatten(),
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let thresholds = match &args.thresholds {
        Some(path) => Thresholds::load(path)?,
        None => Thresholds::default(),
    };
    let config = DiagnosticConfig {
        thresholds,
        channel_order: if args.bgr {
            ChannelOrder::Bgr
        } else {
            ChannelOrder::Rgb
        },
    };

    let mut landmarker: Box<dyn FaceLandmarker> = match &args.regions {
        Some(path) => {
            tracing::info!("Using region polygons from {:?}", path);
            Box::new(PrecomputedLandmarker::load(path)?)
        }
        None => {
            tracing::info!(
                "Loading detector {:?} and landmarks {:?}",
                args.detector,
                args.landmarks
            );
            let settings = DetectorSettings {
                min_face_size: args.min_face_size,
                ..DetectorSettings::default()
            };
            Box::new(DlibLandmarker::open(&args.detector, &args.landmarks, settings)?)
        }
    };

    let (image, reports) = diagnose_path(&args.image, landmarker.as_mut(), &config)?;

    let faces = reports
        .into_iter()
        .enumerate()
        .map(|(i, outcome)| FaceOutput::new(i + 1, outcome))
        .collect();

    let output = Output {
        image: args.image.display().to_string(),
        width: image.width(),
        height: image.height(),
        faces,
    };

    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        tracing::info!("Output written to {:?}", path);
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!("Image: {} ({}x{})\n", output.image, output.width, output.height));

    if let [face] = output.faces.as_slice() {
        if face
            .report
            .as_ref()
            .is_some_and(|r| r.result == DiagnosticResult::NoFaceDetected)
        {
            s.push_str("\nNo face detected.\n");
            return s;
        }
    }
    s.push_str(&format!("Faces analysed: {}\n", output.faces.len()));

    for face in &output.faces {
        s.push_str(&format!("\n--- Face {} ---\n", face.index));
        let Some(report) = &face.report else {
            s.push_str(&face.message);
            s.push('\n');
            continue;
        };
        if let Some(bbox) = report.face {
            s.push_str(&format!(
                "Bounding box: {}x{} at ({}, {})\n",
                bbox.width, bbox.height, bbox.x, bbox.y
            ));
        }

        if !face.regions.is_empty() {
            s.push_str("\nRegions:\n");
            for region in &face.regions {
                s.push_str(&format!("  {:<12} {:>6} px", region.region.name(), region.pixels));
                if let Some(a) = region.mean_a {
                    s.push_str(&format!("  a* {:>7.3}", a));
                }
                if let Some(b) = region.mean_b {
                    s.push_str(&format!("  b* {:>7.3}", b));
                }
                s.push('\n');
            }
        }

        if let Some(ratios) = report.ratios {
            s.push_str("\nRatios:\n");
            s.push_str(&format!("  Eye a*:     {:.3}\n", ratios.a_sum_eye));
            s.push_str(&format!("  Eye b*:     {:.3}\n", ratios.b_sum_eye));
            s.push_str(&format!("  Lip a*:     {:.3}\n", ratios.a_sum_lip));
            s.push_str(&format!("  Eye ratio:  {:.3}\n", ratios.eye_ratio));
        }

        s.push('\n');
        s.push_str(&face.message);
        s.push('\n');
    }

    s
}
