use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use recapture::config::{self, Config, ConfigFormat};
use recapture::logging::{self, MetricsCollector};
use recapture::pipeline::{FrameMetrics, FrameProcessor, RegistrationMode, RegistrationStage};
use recapture::utils::{drawing, load_image};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "recapture")]
#[command(about = "Overlay a captured template onto camera frames by feature or phase registration")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a template against a sequence of frames
    Run {
        /// Path to the template image
        #[arg(short, long)]
        template: PathBuf,

        /// Frame images, processed in order
        #[arg(short, long, num_args = 1.., required = true)]
        frames: Vec<PathBuf>,

        /// Registration mode
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Hamming distance limit for matches
        #[arg(short, long)]
        distance_limit: Option<u32>,

        /// Directory for the annotated frames
        #[arg(short, long, default_value = "results/frames")]
        output_dir: PathBuf,

        /// Write per-frame metrics as JSON
        #[arg(long)]
        metrics_json: Option<PathBuf>,

        /// Write every recorded stage timing as JSON
        #[arg(long)]
        history_json: Option<PathBuf>,
    },

    /// Detect keypoints on a single image and draw them
    Inspect {
        /// Path to the image
        #[arg(short, long)]
        image: PathBuf,

        /// Output file for the visualization
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the default configuration
    InitConfig {
        /// Output file
        #[arg(short, long, default_value = "recapture.toml")]
        output: PathBuf,

        #[arg(short, long, value_enum, default_value = "toml")]
        format: FormatArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Feature,
    Area,
}

impl From<ModeArg> for RegistrationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Feature => RegistrationMode::FeatureBased,
            ModeArg::Area => RegistrationMode::AreaBased,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Toml,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, config_problems) = config::load_config(cli.config.as_deref());
    match cli.verbose {
        0 => {}
        1 => config.logging.global_level = "debug".to_string(),
        _ => {
            config.logging.global_level = "trace".to_string();
            config.logging.pipeline_level = "trace".to_string();
        }
    }
    let _log_guard = logging::init_logging(&config.logging)?;
    if !config_problems.is_empty() {
        for problem in &config_problems {
            tracing::warn!(%problem, "Configuration rejected");
        }
        tracing::warn!("Using default configuration instead");
    }

    match cli.command {
        Commands::Run {
            template,
            frames,
            mode,
            distance_limit,
            output_dir,
            metrics_json,
            history_json,
        } => {
            let reports = Reports {
                metrics_json: metrics_json.as_deref(),
                history_json: history_json.as_deref(),
            };
            handle_run(&config, &template, &frames, mode, distance_limit, &output_dir, reports)?;
        }
        Commands::Inspect { image, output } => {
            handle_inspect(&config, &image, output.as_deref())?;
        }
        Commands::InitConfig { output, format } => {
            let format = match format {
                FormatArg::Toml => ConfigFormat::Toml,
                FormatArg::Json => ConfigFormat::Json,
            };
            Config::default().save_to_file(&output, format)?;
            println!("Default configuration written to {}", output.display());
        }
    }

    Ok(())
}

/// Optional JSON outputs of a run
struct Reports<'a> {
    metrics_json: Option<&'a Path>,
    history_json: Option<&'a Path>,
}

fn handle_run(
    config: &Config,
    template_path: &Path,
    frame_paths: &[PathBuf],
    mode: Option<ModeArg>,
    distance_limit: Option<u32>,
    output_dir: &Path,
    reports: Reports<'_>,
) -> anyhow::Result<()> {
    let mut processor = FrameProcessor::new(config);
    if let Some(mode) = mode {
        processor.set_mode(mode.into());
    }
    if let Some(limit) = distance_limit {
        processor.set_distance_limit(limit);
    }

    let summary = processor
        .load_template_from_path(template_path)
        .with_context(|| format!("loading template {}", template_path.display()))?;
    println!(
        "Template: {}x{} (from {}x{}), {} keypoints",
        summary.width, summary.height, summary.source_width, summary.source_height, summary.keypoints
    );

    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let mut all_metrics: Vec<FrameMetrics> = Vec::with_capacity(frame_paths.len());
    for (index, frame_path) in frame_paths.iter().enumerate() {
        let frame = image::open(frame_path).with_context(|| format!("reading frame {}", frame_path.display()))?;
        let (width, height) = (frame.width(), frame.height());
        processor.set_view_size(width, height)?;

        let output = processor.process(&frame)?;
        let out_path = output_dir.join(format!("frame_{:04}.png", index));
        output
            .frame
            .save(&out_path)
            .with_context(|| format!("writing {}", out_path.display()))?;

        println!("\n{} -> {}", frame_path.display(), out_path.display());
        println!("{}", output.metrics);
        all_metrics.push(output.metrics);
    }

    if let Some(path) = reports.metrics_json {
        fs::write(path, serde_json::to_string_pretty(&all_metrics)?)
            .with_context(|| format!("writing metrics {}", path.display()))?;
        println!("\nMetrics written to {}", path.display());
    }

    match (processor.metrics_history(), reports.history_json) {
        (Some(history), path) => {
            if let Some(path) = path {
                fs::write(path, history.export_to_json()?)
                    .with_context(|| format!("writing stage history {}", path.display()))?;
                println!("\nStage history written to {}", path.display());
            }
            print_stage_summary(&history);
        }
        (None, Some(path)) => {
            tracing::warn!(path = %path.display(), "Stage history is disabled by record_history, nothing written");
        }
        (None, None) => {}
    }

    Ok(())
}

fn print_stage_summary(history: &MetricsCollector) {
    println!("\n{:<12} {:>6} {:>9} {:>9} {:>9} {:>9}", "Stage", "Count", "Mean ms", "Median", "P95", "Max");
    println!("{}", "-".repeat(60));
    for stage in RegistrationStage::ALL {
        if let Some(stats) = history.calculate_stats(stage.name()) {
            println!(
                "{:<12} {:>6} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
                stats.operation, stats.count, stats.mean_ms, stats.median_ms, stats.p95_ms, stats.max_ms
            );
        }
    }
}

fn handle_inspect(config: &Config, image_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let mut image = load_image(image_path)?;
    let processor = FrameProcessor::new(config);
    let extractor = processor.extractor();

    let features = extractor.detect_and_describe(&image);
    println!(
        "{}: {}x{}, {} keypoints described by {}/{}",
        image_path.display(),
        image.width(),
        image.height(),
        features.len(),
        extractor.detector_name(),
        extractor.descriptor_name()
    );

    if let Some(output) = output {
        drawing::draw_keypoints(&mut image, features.keypoints(), config.registration.keypoint_radius);
        image
            .save(output)
            .with_context(|| format!("writing {}", output.display()))?;
        println!("Visualization written to {}", output.display());
    }

    Ok(())
}
