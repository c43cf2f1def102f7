//! Fit and Evaluate
//!
//! Fits presence/background densities from two feature tables, scores the
//! training points and reports discrimination (AUC, max-TSS threshold).
//!
//! Usage:
//!   fit_and_evaluate <config.json> <presence.csv> <background.csv> [report.json]
//!
//! Both tables need an `id` column; every other column is a covariate.

use anyhow::{bail, Context};
use habitat_scorer_rust::{FeatureTable, SuitabilityConfig, SuitabilityEngine};
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
    if args.len() < 4 {
        bail!(
            "usage: {} <config.json> <presence.csv> <background.csv> [report.json]",
            args.first().map(String::as_str).unwrap_or("fit_and_evaluate")
        );
    }
    let config_path = PathBuf::from(&args[1]);
    let presence_path = PathBuf::from(&args[2]);
    let background_path = PathBuf::from(&args[3]);
    let report_path = args.get(4).map(PathBuf::from);

    println!("\n{}", "=".repeat(80));
    println!("HABITAT SUITABILITY: FIT AND EVALUATE");
    println!("{}", "=".repeat(80));

    let total_start = Instant::now();

    println!("\nLoading configuration from {:?}...", config_path);
    let config = SuitabilityConfig::load(&config_path)?;

    println!("Loading feature tables...");
    let presence = FeatureTable::from_csv(&presence_path, ID_COLUMN)?;
    let background = FeatureTable::from_csv(&background_path, ID_COLUMN)?;
    println!(
        "  {} presence, {} background, {} covariates",
        presence.len(),
        background.len(),
        presence.dim()
    );

    let fit_start = Instant::now();
    let mut engine = SuitabilityEngine::new(config)?;
    let result = engine
        .run(presence, background)
        .context("Suitability model failed")?;
    let fit_time = fit_start.elapsed();

    if let Some(scorer) = engine.scorer() {
        println!("\nScaling: {:?}", scorer.transform().mode());
        println!("Bandwidths (preprocessed units):");
        println!("  presence:   {:?}", scorer.densities().presence.bandwidths());
        println!("  background: {:?}", scorer.densities().background.bandwidths());
    }

    println!("\n{}", result.log_line());

    if let Some(path) = report_path {
        std::fs::write(&path, serde_json::to_string_pretty(&result)?)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        println!("\n✓ Saved: {:?}", path);
    }

    println!("\n{}", "=".repeat(80));
    println!("COMPLETE");
    println!("{}", "=".repeat(80));
    println!("\nFit + evaluate: {:.2}s", fit_time.as_secs_f64());
    println!("Total time: {:.2}s", total_start.elapsed().as_secs_f64());

    Ok(())
}
