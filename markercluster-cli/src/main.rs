//! markercluster CLI
//!
//! Clusters map markers from CSV files or event logs and benchmarks the
//! clustering index on synthetic data.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand};

use markercluster_algorithms::{partition, ClusterIndex, FeedStatus, MarkerFeed};
use markercluster_core::{ClusterId, ClusteringConfig, Marker, MarkerId};
use markercluster_io::{ClusterWriter, OutputFormat};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    MarkerIo(#[from] markercluster_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] markercluster_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Marker feed failed: {0}")]
    Feed(String),
}

/// Clusters map markers the way the map view does.
#[derive(Parser)]
#[command(name = "markercluster")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (enables info and debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Clustering radius, given directly or as a pixel radius at a zoom level.
#[derive(clap::Args, Debug, Clone, Copy)]
struct RadiusArgs {
    /// Clustering radius in degrees
    #[arg(short, long, conflicts_with = "zoom")]
    radius: Option<f64>,

    /// Map zoom level used to derive the radius
    #[arg(short, long)]
    zoom: Option<f64>,

    /// Screen radius in pixels, used with --zoom
    #[arg(long, default_value = "60.0")]
    pixel_radius: f64,
}

impl RadiusArgs {
    fn config(self) -> Result<ClusteringConfig> {
        let config = match (self.radius, self.zoom) {
            (Some(radius), _) => ClusteringConfig::new().with_radius(radius),
            (None, Some(zoom)) => ClusteringConfig::for_zoom(zoom, self.pixel_radius),
            (None, None) => ClusteringConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster markers from an `id,lat,lon` CSV file
    Cluster {
        /// Input CSV file
        input: PathBuf,

        #[command(flatten)]
        radius: RadiusArgs,

        /// Output file (.csv or .json); CSV on stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write `marker,cluster` rows to this CSV file
        #[arg(long)]
        assignments: Option<PathBuf>,
    },

    /// Replay a JSON-lines event log through a background feed
    Replay {
        /// Input event log
        input: PathBuf,

        #[command(flatten)]
        radius: RadiusArgs,

        /// Events per batch handed to the index
        #[arg(long, default_value = "256")]
        batch_size: usize,

        /// Output file (.csv or .json); CSV on stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Benchmark clustering on synthetic markers
    Benchmark {
        /// Number of synthetic markers
        #[arg(short, long, default_value = "100000")]
        markers: usize,

        /// Radii to benchmark, in degrees
        #[arg(long, value_delimiter = ',', default_value = "0.05,0.5,5.0")]
        radii: Vec<f64>,

        /// Number of iterations
        #[arg(short, long, default_value = "3")]
        iterations: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Cluster {
            input,
            radius,
            output,
            assignments,
        } => {
            let config = radius.config()?;
            log::info!("reading {}", input.display());
            log::info!("radius: {} degrees", config.radius);

            let start = Instant::now();
            let markers = markercluster_io::read_markers_csv(&input)?;
            let mut index = ClusterIndex::new(config)?;
            let added = index.add_markers(&markers);
            let elapsed = start.elapsed();

            write_summaries(&index, output.as_deref())?;
            if let Some(path) = assignments {
                let rows = assignment_rows(&index);
                ClusterWriter::create(&path)?.write_assignments_csv(&rows)?;
                log::info!("wrote {} assignments to {}", rows.len(), path.display());
            }

            eprintln!(
                "Clustered {} of {} markers into {} clusters in {:.2}s",
                added,
                markers.len(),
                index.len(),
                elapsed.as_secs_f64()
            );
            if cli.verbose {
                print_statistics(&index)?;
            }
        }

        Commands::Replay {
            input,
            radius,
            batch_size,
            output,
        } => {
            let config = radius.config()?;
            let batch_size = batch_size.max(1);
            log::info!("replaying {}", input.display());
            log::info!("radius: {} degrees", config.radius);

            let start = Instant::now();
            let mut index = ClusterIndex::new(config)?;
            let mut feed = MarkerFeed::spawn(markercluster_algorithms::DEFAULT_FEED_CAPACITY, {
                let input = input.clone();
                move |sender| {
                    let events =
                        markercluster_io::read_events(&input).map_err(|e| e.to_string())?;
                    for chunk in events.chunks(batch_size) {
                        if !sender.send_events(chunk.to_vec()) {
                            break;
                        }
                    }
                    Ok(())
                }
            });

            let report = feed.wait_into(&mut index);
            if let FeedStatus::Failed(message) = report.status {
                return Err(CliError::Feed(message));
            }
            let elapsed = start.elapsed();

            write_summaries(&index, output.as_deref())?;

            eprintln!(
                "Replayed {} events in {} batches ({} rejected) in {:.2}s",
                report.applied,
                report.batches,
                report.rejected,
                elapsed.as_secs_f64()
            );
            eprintln!(
                "{} markers in {} clusters",
                index.marker_count(),
                index.len()
            );
            if cli.verbose {
                print_statistics(&index)?;
            }
        }

        Commands::Benchmark {
            markers,
            radii,
            iterations,
        } => {
            let iterations = iterations.max(1);
            let base = synthetic_markers(markers);

            println!(
                "Benchmarking with {} markers, {} iterations",
                base.len(),
                iterations
            );
            println!(
                "{:<10} | {:<10} | {:<15} | {:<15} | {:<15}",
                "Radius", "Clusters", "Mean Time (ms)", "Min Time (ms)", "Max Time (ms)"
            );
            println!("{:-<78}", "");

            for radius in radii {
                let config = ClusteringConfig::new().with_radius(radius);
                config.validate()?;

                // Warmup
                let clusters = partition(base.clone(), &config)?.len();

                let mut times = Vec::with_capacity(iterations);
                for _ in 0..iterations {
                    let start = Instant::now();
                    let _ = partition(base.clone(), &config)?;
                    times.push(start.elapsed().as_secs_f64() * 1000.0);
                }

                let min_time = times.iter().fold(f64::INFINITY, |a, &b| a.min(b));
                let max_time = times.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                let mean_time = times.iter().sum::<f64>() / times.len() as f64;

                println!(
                    "{:<10} | {:<10} | {:<15.2} | {:<15.2} | {:<15.2}",
                    radius, clusters, mean_time, min_time, max_time
                );
            }
        }
    }

    Ok(())
}

fn write_summaries(index: &ClusterIndex, output: Option<&Path>) -> Result<()> {
    let clusters = index.clusters();
    match output {
        Some(path) => {
            ClusterWriter::create(path)?
                .write_summaries(&clusters, OutputFormat::from_path(path))?;
        }
        None => {
            let stdout = std::io::stdout();
            ClusterWriter::new(stdout.lock()).write_summaries(&clusters, OutputFormat::Csv)?;
        }
    }
    Ok(())
}

fn assignment_rows(index: &ClusterIndex) -> Vec<(MarkerId, ClusterId)> {
    let mut rows: Vec<_> = index
        .iter()
        .flat_map(|(id, cluster)| cluster.markers().map(move |m| (m.id, id)))
        .collect();
    rows.sort_unstable_by_key(|&(marker, _)| marker);
    rows
}

fn print_statistics(index: &ClusterIndex) -> Result<()> {
    eprintln!("{}", serde_json::to_string_pretty(index.statistics())?);
    Ok(())
}

/// Markers scattered around a handful of hotspots, from a fixed-seed LCG.
fn synthetic_markers(count: usize) -> Vec<Marker> {
    const HOTSPOTS: [(f64, f64); 5] = [
        (40.7, -74.0),
        (51.5, -0.1),
        (35.7, 139.7),
        (-33.9, 18.4),
        (-23.5, -46.6),
    ];

    let mut seed: u64 = 42;
    let mut next = move || {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        (seed >> 11) as f64 / (1u64 << 53) as f64
    };

    (0..count)
        .map(|i| {
            let (lat, lon) = HOTSPOTS[i % HOTSPOTS.len()];
            let spread = if i % 10 == 0 { 20.0 } else { 2.0 };
            Marker::new(
                i as u64,
                (lat + (next() - 0.5) * spread).clamp(-90.0, 90.0),
                (lon + (next() - 0.5) * spread).clamp(-180.0, 180.0),
            )
        })
        .collect()
}
