//! Closed-loop demo: the full pipeline against a synthetic signal.
//!
//! Seeds a coarse raster of measurements, then cycles ask → dispatch →
//! simulate → tell. Every stage goes through the real machinery — the
//! channel-backed document stream, the ingestion loop, the recording
//! dispatcher — only the detector is synthetic.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use serde_json::json;
use tracing::info;

use wafer_scout_core::runtime::AgentRuntime;
use wafer_scout_core::stubs::{
    run_record, synthetic_observable, ChannelStream, FlatUnpacker, RecordingDispatcher,
};
use wafer_scout_core::{ClusterAgent, RunRecord};

use super::AgentArgs;

/// Arguments for `wafer-scout run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub agent: AgentArgs,

    /// Ask/measure cycles to run
    #[arg(long, default_value_t = 10)]
    pub cycles: usize,

    /// Suggestions requested per cycle
    #[arg(long, default_value_t = 3)]
    pub batch: usize,

    /// Seed measurements before the first ask
    #[arg(long, default_value_t = 12)]
    pub seeds: usize,
}

/// Drive the loop and print the final report as JSON.
pub async fn handle(args: RunArgs) -> anyhow::Result<()> {
    let config = args.agent.to_config()?;
    let motor_names = config.motor_names.clone();
    let agent = Arc::new(ClusterAgent::new(config)?);

    let unpacker = Arc::new(FlatUnpacker::new(motor_names.clone()));
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let mut runtime = AgentRuntime::new(agent.clone(), unpacker, dispatcher.clone());

    let (tx, stream) = ChannelStream::new(64);
    runtime.start(Box::new(stream))?;

    // Seed a coarse raster so the first refit has enough samples.
    let seeds = seed_positions(&args.agent, args.seeds);
    for position in &seeds {
        tx.send(measure(&motor_names, position)).await?;
    }
    wait_for_told(&runtime, seeds.len()).await;
    info!(seeds = seeds.len(), "seed raster ingested");

    let mut measured = seeds.len();
    let mut dispatched = 0usize;
    for cycle in 0..args.cycles {
        let suggestions = runtime.ask_and_dispatch(args.batch).await?;
        if suggestions.is_empty() {
            info!(cycle, "candidate supply exhausted, stopping early");
            break;
        }
        wait_for_plans(&dispatcher, dispatched + suggestions.len()).await;

        // "Measure" each newly dispatched absolute position and feed the
        // result back through the stream, as the beamline would.
        let plans = dispatcher.plans();
        for plan in &plans[dispatched..] {
            let position: Vec<f64> = motor_names
                .iter()
                .map(|name| plan.kwargs[name].as_f64().unwrap_or(0.0))
                .collect();
            tx.send(measure(&motor_names, &position)).await?;
            measured += 1;
        }
        dispatched = plans.len();
        wait_for_told(&runtime, measured).await;

        info!(
            cycle,
            suggestions = suggestions.len(),
            cache_len = agent.cache_len(),
            "cycle complete"
        );
    }

    let report = agent.report()?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    drop(tx);
    runtime.stop().await;
    Ok(())
}

fn measure(motor_names: &[String], position: &[f64]) -> RunRecord {
    let motors: Vec<(&str, f64)> = motor_names
        .iter()
        .map(|n| n.as_str())
        .zip(position.iter().copied())
        .collect();
    run_record(&motors, json!(synthetic_observable(position)))
}

/// Evenly spaced raster inside the bounds, one row per seed in 1-D, a
/// square-ish grid in 2-D.
fn seed_positions(agent: &AgentArgs, count: usize) -> Vec<Vec<f64>> {
    let span = agent.hi - agent.lo;
    match agent.dim {
        1 => (0..count)
            .map(|i| vec![agent.lo + span * (i as f64 + 0.5) / count as f64])
            .collect(),
        _ => {
            let side = (count as f64).sqrt().ceil() as usize;
            (0..count)
                .map(|i| {
                    let row = i / side;
                    let col = i % side;
                    vec![
                        agent.lo + span * (col as f64 + 0.5) / side as f64,
                        agent.lo + span * (row as f64 + 0.5) / side as f64,
                    ]
                })
                .collect()
        }
    }
}

async fn wait_for_told(runtime: &AgentRuntime, target: usize) {
    for _ in 0..500 {
        if runtime.documents_told() + runtime.documents_skipped() >= target {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn wait_for_plans(dispatcher: &RecordingDispatcher, target: usize) {
    for _ in 0..500 {
        if dispatcher.plans().len() >= target {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
