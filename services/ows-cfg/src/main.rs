//! ows-cfg
//!
//! Resolve an OWS configuration file and query the policies it defines.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ows_common::bbox::solar_offset_for_longitude;
use ows_common::time::parse_instant;
use ows_config::{load_config, LimitDecision, ResolvedConfig, ResolvedLayer, Service};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ows-cfg")]
#[command(about = "Resolve and inspect OWS layer configuration")]
struct Args {
    /// Configuration file (.json, .yaml or .yml)
    #[arg(short, long, global = true, env = "OWS_CONFIG", default_value = "ows_cfg.yaml")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the whole document and list its layers and styles
    Check {
        /// Configuration file; overrides --config
        file: Option<PathBuf>,
    },

    /// Print the catalogue search window for a layer and instant
    SearchTimes {
        #[arg(long)]
        layer: String,

        /// ISO 8601 instant or date
        #[arg(long)]
        time: String,

        /// Longitude of the request centre, used by raw layers
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Print the caching and fallback decision for a request
    CachePolicy {
        #[arg(long)]
        layer: String,

        #[arg(long, default_value = "wms")]
        service: String,

        /// Number of datasets the request touches
        #[arg(long)]
        datasets: usize,

        #[arg(long)]
        zoom: Option<f64>,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args);

    let path = match &args.command {
        Command::Check { file: Some(file) } => file.clone(),
        _ => args.config.clone(),
    };
    let cfg = load_config(&path)
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    info!(config = %path.display(), layers = cfg.layers().len(), "Configuration resolved");

    match args.command {
        Command::Check { .. } => check(&cfg),
        Command::SearchTimes { layer, time, lon } => search_times(&cfg, &layer, &time, lon),
        Command::CachePolicy {
            layer,
            service,
            datasets,
            zoom,
        } => cache_policy(&cfg, &layer, &service, datasets, zoom),
    }
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn find_layer<'a>(cfg: &'a ResolvedConfig, name: &str) -> Result<&'a ResolvedLayer> {
    cfg.layer(name)
        .ok_or_else(|| anyhow!("no layer named '{}'", name))
}

fn check(cfg: &ResolvedConfig) -> Result<()> {
    for layer in cfg.layers() {
        let folder = layer.folder.as_deref().unwrap_or("-");
        println!(
            "{} [{}] time_resolution={:?} styles={}",
            layer.name,
            folder,
            layer.time_resolution,
            layer.styles.len()
        );
        for style in &layer.styles {
            let marker = if style.name == layer.default_style { "*" } else { " " };
            println!(
                "  {} {} ({}) bands={}",
                marker,
                style.name,
                style.kind.name(),
                style.needed_bands.join(",")
            );
        }
    }
    println!(
        "{} layers, {} named resource limits",
        cfg.layers().len(),
        cfg.resource_limits.len()
    );
    Ok(())
}

fn search_times(cfg: &ResolvedConfig, layer: &str, time: &str, lon: Option<f64>) -> Result<()> {
    let layer = find_layer(cfg, layer)?;
    let t = parse_instant(time).with_context(|| format!("invalid time '{}'", time))?;

    let resolution = layer.time_resolution;
    let window = match lon {
        Some(lon) => resolution.search_times_with_offset(t, solar_offset_for_longitude(lon)),
        None => resolution.search_times(t, None),
    }
    .with_context(|| format!("no search window for layer '{}'", layer.name))?;
    debug!(layer = %layer.name, %t, "computed search window");

    let groupby = layer.dataset_groupby();
    println!("start: {}", window.start.to_rfc3339());
    println!("end:   {}", window.end.to_rfc3339());
    println!("group: {} ({})", groupby.dimension(), groupby.units());
    Ok(())
}

fn cache_policy(
    cfg: &ResolvedConfig,
    layer: &str,
    service: &str,
    datasets: usize,
    zoom: Option<f64>,
) -> Result<()> {
    let layer = find_layer(cfg, layer)?;
    let service: Service = service.parse().map_err(|e: String| anyhow!(e))?;
    let limits = layer.resource_limits.service(service);

    match limits.decide(datasets, zoom) {
        LimitDecision::Render { max_age: 0 } => println!("render, no caching"),
        LimitDecision::Render { max_age } => println!("render, cache for {}s", max_age),
        LimitDecision::ZoomedOutFill(colour) => {
            let [r, g, b, a] = colour.to_array();
            println!("zoomed out, fill with rgba({}, {}, {}, {})", r, g, b, a);
        }
        LimitDecision::TooManyDatasets => println!(
            "too many datasets for {} ({} > {})",
            service,
            datasets,
            limits.max_datasets.unwrap_or_default()
        ),
    }
    Ok(())
}
