//! Castle narrative run
//!
//! Usage: `cargo run --example castle_pipeline -- [castles.json] [config.json]`
//!
//! Without a castles file a few built-in castles are processed. Settings come
//! from the optional config file and `CASTLE_PIPELINE_*` variables.

use std::sync::Arc;

use anyhow::Context;
use castle_pipeline::batch::{BatchDispatcher, FanoutObserver, TracingObserver};
use castle_pipeline::castle::{load_source_castles, NarrativePipeline, SourceCastle};
use castle_pipeline::config::PipelineConfig;
use castle_pipeline::metrics::MetricsObserver;
use castle_pipeline::sink::SqliteSink;
use castle_pipeline::telemetry::{init_tracing, DEFAULT_FILTER};
use tracing::info;

fn builtin_castles() -> Vec<SourceCastle> {
    let castle = |name: &str, country: &str, location: &str, style: &str, year: &str, description: &str| {
        SourceCastle {
            name: name.to_string(),
            country: country.to_string(),
            location: location.to_string(),
            architectural_style: style.to_string(),
            year_built: year.to_string(),
            description: description.to_string(),
            source: "builtin".to_string(),
            ..SourceCastle::default()
        }
    };

    vec![
        castle("Warwick Castle", "United Kingdom", "Warwick", "Norman", "1068",
            "Built by King William after the conquest. It withstood a siege in 1264."),
        castle("Chateau de Chambord", "France", "Chambord", "Renaissance", "1519",
            "Royal hunting lodge commissioned by King Francis of the French crown."),
        castle("Alhambra", "Spain", "Granada", "Islamic", "1238",
            "Palace and fortress complex that fell in the conquest of Granada."),
        castle("Neuschwanstein", "Germany", "Schwangau", "Gothic Revival", "1869",
            "Palace built for King Ludwig of Bavaria."),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(DEFAULT_FILTER, false)?;

    let mut args = std::env::args().skip(1);
    let castles_path = args.next();
    let config_path = args.next();

    let config = match config_path {
        Some(path) => PipelineConfig::from_json_file(&path)
            .with_context(|| format!("reading config {}", path))?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides()?;
    config.validate()?;

    let sources = match castles_path {
        Some(path) => load_source_castles(&path).with_context(|| format!("reading castles {}", path))?,
        None => builtin_castles(),
    };

    let metrics = Arc::new(MetricsObserver::new()?);
    let observer = FanoutObserver::new()
        .with(Arc::new(TracingObserver))
        .with(metrics.clone());

    let sink = SqliteSink::connect(config.sink_config()).await?;
    let dispatcher = BatchDispatcher::new(config.dispatcher_config(), Arc::new(sink))
        .with_observer(Arc::new(observer));

    let pipeline = NarrativePipeline::new(dispatcher);

    // Ctrl-C stops the run at the next batch boundary
    let control = pipeline.dispatcher().control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            control.stop();
        }
    });

    let summary = pipeline.process_sources(sources).await?;

    info!(
        succeeded = summary.total_succeeded,
        failed = summary.total_failed,
        stopped_early = summary.stopped_early,
        "Narrative run finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("{}", metrics.export()?);

    Ok(())
}
