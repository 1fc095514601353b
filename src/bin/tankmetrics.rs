//! Tank Metrics CLI - Command-line interface for tank metrics
//!
//! Commands:
//! - analyze: Compute the summary report for one positions/annotation pair
//! - inspect-roi: Show the ROI and calibration derived from an annotation file
//! - validate: Check a positions CSV and summarize its tracks

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tank_metrics::calibration::RoiCalibrator;
use tank_metrics::config::CalibrationMaxima;
use tank_metrics::input::{read_annotation, read_positions, CsvLayout};
use tank_metrics::report::{write_report, ReportFormat};
use tank_metrics::tracks::select_latest_tracks;
use tank_metrics::{ConfigLayer, MetricsError, TankProcessor, PRODUCER_NAME, VERSION};

/// Tank Metrics - behavioral metrics from tracked positions in a tank
#[derive(Parser)]
#[command(name = "tankmetrics")]
#[command(version = VERSION)]
#[command(about = "Compute region time, freezing and depth metrics from tracker output", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the summary report for one run
    Analyze(AnalyzeArgs),

    /// Show the ROI and calibration derived from an annotation file
    InspectRoi {
        /// Annotation file
        #[arg(short, long)]
        annotation: PathBuf,

        /// Physical width of the tank (calibrates x)
        #[arg(long)]
        max_x: Option<f64>,

        /// Physical height of the tank (calibrates y)
        #[arg(long)]
        max_y: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a positions CSV and summarize its tracks
    Validate {
        /// Positions CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// CSV layout
        #[arg(long, value_enum, default_value = "auto")]
        layout: LayoutArg,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Positions CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// Annotation file holding the tank ROI
    #[arg(short, long)]
    annotation: PathBuf,

    /// Output file path (use - for stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Total trial length in seconds (exclusive with --fps)
    #[arg(long, conflicts_with = "time_minutes")]
    time: Option<f64>,

    /// Total trial length in minutes (exclusive with --fps)
    #[arg(long)]
    time_minutes: Option<f64>,

    /// Video frame rate (exclusive with --time)
    #[arg(long)]
    fps: Option<f64>,

    /// Physical width of the tank (calibrates x)
    #[arg(long)]
    max_x: Option<f64>,

    /// Physical height of the tank (calibrates distance from bottom)
    #[arg(long)]
    max_y: Option<f64>,

    /// Displacement in pixels below which the animal counts as still
    #[arg(long)]
    freezing_threshold: Option<f64>,

    /// Minimum freezing episode length in seconds
    #[arg(long)]
    freezing_min_duration: Option<f64>,

    /// Width of the region breakdown bins in seconds
    #[arg(long)]
    bin_seconds: Option<f64>,

    /// JSON configuration file; command-line options take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV layout
    #[arg(long, value_enum, default_value = "auto")]
    layout: LayoutArg,

    /// Output format (defaults to pretty JSON on a terminal, compact JSON otherwise)
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Append CSV rows to an existing output file
    #[arg(long)]
    append: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    /// Detect from the first line
    Auto,
    /// Headerless wide layout, six columns per track
    Ctrax,
    /// Header track_id,frame_index,x,y
    Long,
}

impl From<LayoutArg> for CsvLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Auto => CsvLayout::Auto,
            LayoutArg::Ctrax => CsvLayout::Ctrax,
            LayoutArg::Long => CsvLayout::Long,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Flat CSV row
    Csv,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => ReportFormat::Json,
            FormatArg::JsonPretty => ReportFormat::JsonPretty,
            FormatArg::Csv => ReportFormat::Csv,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "tank_metrics=debug,tankmetrics=debug,warn"
    } else {
        "tank_metrics=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), MetricsError> {
    match cli.command {
        Commands::Analyze(args) => cmd_analyze(args),
        Commands::InspectRoi {
            annotation,
            max_x,
            max_y,
            json,
        } => cmd_inspect_roi(&annotation, CalibrationMaxima { max_x, max_y }, json),
        Commands::Validate {
            input,
            layout,
            json,
        } => cmd_validate(&input, layout.into(), json),
    }
}

fn cmd_analyze(args: AnalyzeArgs) -> Result<(), MetricsError> {
    let file_layer = match &args.config {
        Some(path) => load_config_layer(path)?,
        None => ConfigLayer::default(),
    };

    let cli_layer = ConfigLayer {
        time_sec: args.time.or(args.time_minutes.map(|m| m * 60.0)),
        fps: args.fps,
        max_x: args.max_x,
        max_y: args.max_y,
        freezing_threshold_px: args.freezing_threshold,
        freezing_min_duration_sec: args.freezing_min_duration,
        bin_seconds: args.bin_seconds,
    };

    let processor = TankProcessor::new(file_layer.merge(cli_layer).resolve()?);
    debug!(config = ?processor.config(), "resolved run configuration");
    let report = processor.analyze_files(&args.input, &args.annotation, args.layout.into())?;

    let to_stdout = args.output.as_os_str() == "-";
    let format = match args.format {
        Some(format) => format.into(),
        None if to_stdout && atty::is(atty::Stream::Stdout) => ReportFormat::JsonPretty,
        None => ReportFormat::Json,
    };

    write_report(&report, &args.output, format, args.append)
}

fn load_config_layer(path: &Path) -> Result<ConfigLayer, MetricsError> {
    let json = fs::read_to_string(path).map_err(|e| {
        MetricsError::Configuration(format!("cannot read config file {}: {}", path.display(), e))
    })?;
    ConfigLayer::from_json(&json)
}

fn cmd_inspect_roi(
    annotation_path: &Path,
    maxima: CalibrationMaxima,
    json: bool,
) -> Result<(), MetricsError> {
    let annotation = read_annotation(annotation_path)?;
    let (roi, calibration) = RoiCalibrator::extract(&annotation, &maxima)?;

    let report = RoiReport {
        annotation: annotation_path.display().to_string(),
        parameters: annotation.parameters.iter().cloned().collect(),
        polygons: annotation.roi_polygons.len(),
        left: roi.x_min,
        right: roi.x_max,
        top: roi.y_min,
        bottom: roi.y_max,
        units_per_pixel_x: calibration.units_per_pixel_x,
        units_per_pixel_y: calibration.units_per_pixel_y,
        unit: calibration.unit.as_str().to_string(),
    };

    if json {
        println!("{}", to_json_pretty(&report)?);
    } else {
        println!("ROI Report");
        println!("==========");
        println!("Annotation: {}", report.annotation);
        for (key, value) in &report.parameters {
            println!("  {}: {}", key, value);
        }
        println!("Polygons:   {}", report.polygons);
        println!("Left:       {}", report.left);
        println!("Right:      {}", report.right);
        println!("Top:        {}", report.top);
        println!("Bottom:     {}", report.bottom);
        println!(
            "Scale:      {} x {} {} per pixel",
            report.units_per_pixel_x, report.units_per_pixel_y, report.unit
        );
    }

    Ok(())
}

fn cmd_validate(input: &Path, layout: CsvLayout, json: bool) -> Result<(), MetricsError> {
    let samples = read_positions(input, layout)?;
    let selection = select_latest_tracks(&samples);

    let report = ValidationReport {
        producer: PRODUCER_NAME.to_string(),
        input: input.display().to_string(),
        samples: samples.len(),
        tracks: selection.track_count,
        frames: selection.samples.len(),
        first_frame: selection.samples.first().map(|s| s.frame_index),
        last_frame: selection.samples.last().map(|s| s.frame_index),
        gap_frames: selection.gap_frames,
    };

    if json {
        println!("{}", to_json_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Input:       {}", report.input);
        println!("Samples:     {}", report.samples);
        println!("Tracks:      {}", report.tracks);
        println!("Frames:      {}", report.frames);
        if let (Some(first), Some(last)) = (report.first_frame, report.last_frame) {
            println!("Frame range: {}..={}", first, last);
        }
        println!("Gap frames:  {}", report.gap_frames);
    }

    if report.frames == 0 {
        Err(MetricsError::InputFormat(format!(
            "{}: no position samples with a valid track",
            report.input
        )))
    } else {
        Ok(())
    }
}

fn to_json_pretty<T: serde::Serialize>(value: &T) -> Result<String, MetricsError> {
    serde_json::to_string_pretty(value).map_err(|e| MetricsError::Output(e.to_string()))
}

// Report types

#[derive(serde::Serialize)]
struct RoiReport {
    annotation: String,
    parameters: BTreeMap<String, String>,
    polygons: usize,
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
    units_per_pixel_x: f64,
    units_per_pixel_y: f64,
    unit: String,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    producer: String,
    input: String,
    samples: usize,
    tracks: usize,
    frames: usize,
    first_frame: Option<u64>,
    last_frame: Option<u64>,
    gap_frames: u64,
}

// Error types

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MetricsError> for CliError {
    fn from(e: MetricsError) -> Self {
        let hint = match &e {
            MetricsError::Configuration(_) => {
                "Give exactly one of --time/--time-minutes or --fps and check the annotation ROI"
            }
            MetricsError::InputFormat(_) => "Check the positions CSV and annotation file contents",
            MetricsError::Output(_) => "Check the output path and permissions",
        };
        CliError {
            code: e.code().to_string(),
            message: e.to_string(),
            hint: Some(hint.to_string()),
        }
    }
}
