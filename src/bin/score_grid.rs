//! Score Grid
//!
//! Fits the suitability model on presence/background tables and projects it
//! onto a grid table, writing `id,raw,suitability` for rasterization.
//!
//! Usage:
//!   score_grid <config.json> <presence.csv> <background.csv> <grid.csv> <out.csv>
//!
//! Ctrl-C is not intercepted; set `workers` in the config to bound CPU use.

use anyhow::{bail, Context};
use habitat_scorer_rust::{CancellationToken, FeatureTable, SuitabilityConfig, SuitabilityEngine};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ID_COLUMN: &str = "id";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "habitat_scorer_rust=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 6 {
        bail!(
            "usage: {} <config.json> <presence.csv> <background.csv> <grid.csv> <out.csv>",
            args.first().map(String::as_str).unwrap_or("score_grid")
        );
    }
    let paths: Vec<PathBuf> = args[1..].iter().map(PathBuf::from).collect();

    println!("\n{}", "=".repeat(80));
    println!("HABITAT SUITABILITY: GRID PROJECTION");
    println!("{}", "=".repeat(80));

    let total_start = Instant::now();
    let config = SuitabilityConfig::load(&paths[0])?;

    println!("\nLoading training tables...");
    let presence = FeatureTable::from_csv(&paths[1], ID_COLUMN)?;
    let background = FeatureTable::from_csv(&paths[2], ID_COLUMN)?;

    let mut engine = SuitabilityEngine::new(config)?;
    engine
        .fit(presence, background)
        .context("Failed to fit densities")?;
    println!("✓ Densities fitted");

    println!("\nLoading grid from {:?}...", paths[3]);
    let grid = FeatureTable::from_csv(&paths[3], ID_COLUMN)?;
    println!("  {} grid points", grid.len());

    let project_start = Instant::now();
    let scored = engine
        .project(&grid, &CancellationToken::new())
        .context("Grid projection failed")?;
    let project_time = project_start.elapsed();

    scored.write_csv(&paths[4])?;
    println!("\n✓ Saved: {:?}", paths[4]);

    println!("\n{}", "=".repeat(80));
    println!("COMPLETE");
    println!("{}", "=".repeat(80));
    println!(
        "\nProjection: {:.2}s ({:.0} points/s)",
        project_time.as_secs_f64(),
        scored.len() as f64 / project_time.as_secs_f64().max(1e-9)
    );
    println!("Total time: {:.2}s", total_start.elapsed().as_secs_f64());

    Ok(())
}
