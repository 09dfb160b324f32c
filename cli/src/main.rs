//! `track3d` CLI: run simulated scenarios through the tracker and report metrics.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sim::scenarios::{Scenario, ScenarioKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracker_core::metrics::TrackingMetrics;
use tracker_core::pipeline::{Pipeline, PipelineConfig};
use tracker_core::track::TrackStatus;

/// Objects farther than this from every confirmed track count as missed.
const MATCH_DISTANCE: f64 = 3.0;

#[derive(Parser)]
#[command(name = "track3d", about = "Lidar/camera multi-object tracker CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named scenario in batch mode and output metrics.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Tracker configuration (JSON); defaults are used for missing fields
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the default tracker configuration as JSON.
    PrintConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            config,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            run_scenario(scenario, seed, config, output.as_deref())?;
        }
        Commands::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(&PipelineConfig::default())?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: PipelineConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    info!(path = %path.display(), "loaded tracker configuration");
    Ok(config)
}

fn run_scenario(
    kind: ScenarioKind,
    seed: u64,
    config: PipelineConfig,
    output_path: Option<&Path>,
) -> Result<()> {
    let mut scenario = Scenario::build(kind, seed);
    let mut simulator = scenario.simulator();

    let dt = scenario.sim_dt;
    if (config.kf.dt - dt).abs() > 1e-9 {
        warn!(
            filter_dt = config.kf.dt,
            sim_dt = dt,
            "filter time step differs from the simulation step"
        );
    }
    let mut pipeline = Pipeline::new(config).context("invalid tracker configuration")?;
    let mut metrics = TrackingMetrics::default();

    let duration = scenario.duration;
    let mut sim_time = 0.0f64;
    let mut total_batches = 0usize;
    let mut total_measurements = 0usize;
    let mut births = 0usize;
    let mut deletions = 0usize;
    let mut confirmations = 0usize;
    let mut cycle_time_us = 0u64;

    println!(
        "Running scenario '{}' (seed={}, duration={:.0}s)...",
        scenario.name, seed, duration
    );

    let start = std::time::Instant::now();

    while sim_time < duration {
        // Step targets
        for target in &mut scenario.targets {
            target.step(dt);
        }
        sim_time += dt;

        // One prediction per cycle, then every sensor batch in turn
        pipeline.predict(sim_time);
        let batches = simulator.generate_batches(&scenario.targets, sim_time)?;
        for batch in batches {
            total_batches += 1;
            total_measurements += batch.measurements.len();
            let out = pipeline.associate_and_update(&batch.measurements)?;
            debug!(
                sensor = %batch.sensor_name,
                time = batch.time,
                measurements = batch.measurements.len(),
                updates = out.updates.len(),
                "processed batch"
            );
            cycle_time_us += out.total_time_us;
            births += out.births.len();
            deletions += out.deletions.len();
            confirmations += out.confirmations.len();
        }

        let truths: Vec<_> = scenario
            .targets
            .iter()
            .filter(|t| t.is_active(sim_time))
            .map(|t| t.ground_truth(sim_time))
            .collect();
        metrics.accumulate(pipeline.tracks(), &truths, MATCH_DISTANCE);
    }

    if total_batches == 0 {
        bail!("scenario '{}' produced no sensor batches", scenario.name);
    }

    let elapsed = start.elapsed();
    let count = |status: TrackStatus| {
        pipeline
            .tracks()
            .iter()
            .filter(|t| t.status == status)
            .count()
    };
    println!(
        "Done: {} ticks, {} batches, {} measurements, {} tracks alive, elapsed={:.2}s",
        metrics.n_frames,
        total_batches,
        total_measurements,
        pipeline.tracks().len(),
        elapsed.as_secs_f64(),
    );
    println!(
        "Tracks: {} confirmed, {} tentative, {} initialized ({} born, {} confirmed, {} deleted)",
        count(TrackStatus::Confirmed),
        count(TrackStatus::Tentative),
        count(TrackStatus::Initialized),
        births,
        confirmations,
        deletions,
    );
    println!(
        "Association + update time: {:.2} ms total",
        cycle_time_us as f64 / 1000.0
    );
    println!(
        "RMSE pos={:.3} m vel={:.3} m/s, precision={:.3}, recall={:.3}",
        metrics.rmse_position(),
        metrics.rmse_velocity(),
        metrics.precision(),
        metrics.recall(),
    );

    // Output metrics
    if let Some(opath) = output_path {
        let tracks: Vec<_> = pipeline
            .tracks()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "status": t.status,
                    "score": t.score,
                    "position": [t.state[0], t.state[1], t.state[2]],
                    "velocity": [t.state[3], t.state[4], t.state[5]],
                    "shape": t.shape,
                    "yaw": t.yaw,
                })
            })
            .collect();
        let json = serde_json::json!({
            "scenario": scenario.name,
            "seed": seed,
            "elapsed_s": elapsed.as_secs_f64(),
            "total_batches": total_batches,
            "cycle_time_us": cycle_time_us,
            "births": births,
            "deletions": deletions,
            "final_tracks": tracks,
            "metrics": metrics,
            "rmse_position": metrics.rmse_position(),
            "rmse_velocity": metrics.rmse_velocity(),
        });
        std::fs::write(opath, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("writing {}", opath.display()))?;
        println!("Metrics saved to {}", opath.display());
    }

    Ok(())
}
