//! ngp-render CLI - render a still image from an Instant-NGP snapshot.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use ngp_render::config::{NetworkConfig, RenderConfig, SceneMeta};
use ngp_render::field::NgpField;
use ngp_render::grid::OccupancyGrid;
use ngp_render::render::{save_heatmap_png, save_png, Camera, Renderer, MAX_IMAGE_SIDE};
use ngp_render::snapshot::{ParameterLayout, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Verbosity {
    Quiet,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    fn filter(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone)]
struct Options {
    scene: String,
    data: String,
    steps: usize,
    width: u32,
    height: u32,
    name: Option<String>,
    threshold: f32,
    frame: usize,
    root: PathBuf,
    config: PathBuf,
    heatmap: bool,
    verbosity: Verbosity,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            scene: "lego".to_string(),
            data: "ISCAData".to_string(),
            steps: 256,
            width: 800,
            height: 800,
            name: None,
            threshold: 0.2,
            frame: 0,
            root: PathBuf::from("."),
            config: PathBuf::from("configs/base.json"),
            heatmap: false,
            verbosity: Verbosity::Info,
        }
    }
}

impl Options {
    fn output_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("FTD_{}", self.scene))
    }

    fn snapshot_path(&self) -> PathBuf {
        self.root
            .join("snapshots")
            .join(&self.data)
            .join(format!("{}.msgpack", self.scene))
    }

    fn transforms_path(&self) -> PathBuf {
        self.root
            .join("data/nerf_synthetic")
            .join(&self.scene)
            .join("transforms_test.json")
    }

    fn config_path(&self) -> PathBuf {
        if self.config.is_absolute() {
            self.config.clone()
        } else {
            self.root.join(&self.config)
        }
    }

    fn output_path(&self, suffix: &str) -> PathBuf {
        self.root
            .join("outputs")
            .join(format!("{}{}.png", self.output_name(), suffix))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.steps < 2 {
            bail!("--steps must be at least 2 (got {})", self.steps);
        }
        for (flag, side) in [("--width", self.width), ("--height", self.height)] {
            if !(1..=MAX_IMAGE_SIDE).contains(&side) {
                bail!("{} must be in 1..={} (got {})", flag, MAX_IMAGE_SIDE, side);
            }
        }
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            bail!("--threshold must be finite and non-negative (got {})", self.threshold);
        }
        Ok(())
    }
}

fn parse_value<T>(flag: &str, value: Option<&String>) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = value else {
        bail!("missing value for {}", flag);
    };
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid value '{}' for {}: {}", value, flag, e))
}

/// Returns `None` when help was requested.
fn parse_args(args: &[String]) -> anyhow::Result<Option<Options>> {
    let mut opts = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-v" | "--verbose" => opts.verbosity = opts.verbosity.max(Verbosity::Debug),
            "-vv" | "--trace" => opts.verbosity = Verbosity::Trace,
            "-q" | "--quiet" => opts.verbosity = Verbosity::Quiet,
            "--heatmap" => opts.heatmap = true,
            "--scene" => opts.scene = parse_value(arg, iter.next())?,
            "--data" => opts.data = parse_value(arg, iter.next())?,
            "--steps" => opts.steps = parse_value(arg, iter.next())?,
            "-W" | "--width" => opts.width = parse_value(arg, iter.next())?,
            "-H" | "--height" => opts.height = parse_value(arg, iter.next())?,
            "--name" => opts.name = Some(parse_value(arg, iter.next())?),
            "--threshold" => opts.threshold = parse_value(arg, iter.next())?,
            "--frame" => opts.frame = parse_value(arg, iter.next())?,
            "--root" => opts.root = parse_value(arg, iter.next())?,
            "--config" => opts.config = parse_value(arg, iter.next())?,
            other => bail!("unknown argument '{}' (see --help)", other),
        }
    }
    opts.validate()?;
    Ok(Some(opts))
}

fn print_help() {
    println!("ngp-render - occupancy-guided Instant-NGP renderer");
    println!();
    println!("USAGE:");
    println!("    ngp-render [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --scene <name>        Scene name (default: lego)");
    println!("    --data <dir>          Snapshot collection under snapshots/ (default: ISCAData)");
    println!("    --steps <n>           Coarse probes per ray (default: 256)");
    println!("    -W, --width <px>      Image width (default: 800)");
    println!("    -H, --height <px>     Image height (default: 800)");
    println!("    --name <out>          Output name under outputs/ (default: FTD_<scene>)");
    println!("    --threshold <f>       Density curve threshold (default: 0.2)");
    println!("    --frame <i>           Test frame to render (default: 0)");
    println!("    --root <dir>          Directory holding snapshots/, data/, outputs/ (default: .)");
    println!("    --config <path>       Network hyperparameters (default: configs/base.json)");
    println!("    --heatmap             Also write a fine-sample count heatmap");
    println!("    -v, --verbose         Show debug output");
    println!("    -vv, --trace          Show trace output (very verbose)");
    println!("    -q, --quiet           Only warnings and errors");
    println!("    -h, --help            Show this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG              Overrides the log filter");
    println!("    NGP_TRACE=1           Write a Chrome trace to trace.json (--features trace)");
    println!();
    println!("EXAMPLES:");
    println!("    ngp-render --scene lego                 # outputs/FTD_lego.png");
    println!("    ngp-render --scene ship -W 400 -H 400   # Quick preview");
    println!("    ngp-render --threshold 0.3 --heatmap    # Fewer samples, with heatmap");
}

fn fmt_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
}

fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()))
}

/// Install the log subscriber; with `NGP_TRACE=1` also record a Chrome trace.
#[cfg(feature = "trace")]
fn init_tracing(verbosity: Verbosity) -> Option<tracing_chrome::FlushGuard> {
    let (chrome, guard) = if env::var("NGP_TRACE").ok().as_deref() == Some("1") {
        let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
            .file("trace.json")
            .build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(fmt_layer())
        .with(chrome)
        .try_init();
    guard
}

#[cfg(not(feature = "trace"))]
fn init_tracing(verbosity: Verbosity) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(fmt_layer())
        .try_init();
}

fn run(opts: &Options) -> anyhow::Result<()> {
    info!(
        "ngp-render {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("NGP_BUILD_DATE").unwrap_or("unknown"),
        option_env!("NGP_BUILD_TIME").unwrap_or("unknown")
    );

    let config_path = opts.config_path();
    let network = NetworkConfig::load(&config_path)
        .with_context(|| format!("loading network config {}", config_path.display()))?;
    let layout = ParameterLayout::from_network(&network);
    debug!(?layout, total = layout.total(), "parameter layout");

    let snapshot_path = opts.snapshot_path();
    let snapshot = Snapshot::load(&snapshot_path, &layout)
        .with_context(|| format!("loading snapshot {}", snapshot_path.display()))?;

    let transforms_path = opts.transforms_path();
    let scene = SceneMeta::load(&transforms_path)
        .with_context(|| format!("loading scene metadata {}", transforms_path.display()))?;
    let camera = Camera::from_scene(&scene, opts.frame, opts.width, opts.height)
        .with_context(|| format!("building camera for frame {}", opts.frame))?;

    let config = RenderConfig::default()
        .with_probe_count(opts.steps)
        .with_threshold(opts.threshold);
    let grid = OccupancyGrid::from_raw(&snapshot.density, config.aabb);
    let field = NgpField::new(&snapshot.params, &network).context("building feature field")?;
    drop(snapshot);

    let renderer = Renderer::new(config, Arc::new(grid), Arc::new(field))?
        .with_progress(opts.verbosity > Verbosity::Quiet);
    let output = renderer.render(&camera)?;

    let image_path = opts.output_path("");
    save_png(&image_path, output.width, output.height, &output.image)
        .with_context(|| format!("writing {}", image_path.display()))?;
    if opts.heatmap {
        let heatmap_path = opts.output_path("_samples");
        save_heatmap_png(&heatmap_path, output.width, output.height, &output.sample_counts)
            .with_context(|| format!("writing {}", heatmap_path.display()))?;
    }

    let stats = output.stats;
    let lit = stats.rays_with_peaks.max(1);
    info!(
        "{} rays, {} empty, {} with peaks, {:.1} fine samples per lit ray, {} truncated",
        stats.rays,
        stats.empty_rays,
        stats.rays_with_peaks,
        stats.fine_samples as f64 / lit as f64,
        stats.truncated_rays
    );
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let opts = match parse_args(&args) {
        Ok(Some(opts)) => opts,
        Ok(None) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = init_tracing(opts.verbosity);
    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
