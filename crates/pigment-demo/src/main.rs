//! pigment-demo binary
//!
//! Runs a scripted editing session against a small canvas and prints the
//! resulting history and pixels as JSON.
//!
//! ```bash
//! pigment-demo --width 4 --height 4 fill:0,0,4,4:ff0000 stroke:0,0;1,1:00ff00 undo
//! RUST_LOG=pigment_history=debug pigment-demo --config history.ron fill:0,0,2,2:0000ff rewind
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pigment_demo::session::parse_color;
use pigment_demo::{Session, Step};
use pigment_history::HistoryConfig;
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Drive the pigment history engine from the command line.
#[derive(Parser, Debug)]
#[command(name = "pigment-demo")]
#[command(about = "Run scripted edits against a canvas with undo history")]
struct Args {
    /// History configuration file (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Canvas width in pixels
    #[arg(long, default_value_t = 8)]
    width: u32,

    /// Canvas height in pixels
    #[arg(long, default_value_t = 8)]
    height: u32,

    /// Background color (RRGGBB)
    #[arg(long, default_value = "ffffff", value_parser = parse_color)]
    background: u32,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Steps to run, in order (e.g. fill:0,0,4,4:ff0000 undo)
    #[arg(required = true)]
    steps: Vec<Step>,
}

#[derive(Serialize)]
struct Report {
    steps: Vec<StepReport>,
    summary: pigment_demo::Summary,
}

#[derive(Serialize)]
struct StepReport {
    step: String,
    #[serde(flatten)]
    outcome: pigment_demo::StepOutcome,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => HistoryConfig::load(path)
            .with_context(|| format!("failed to load history config from {}", path.display()))?,
        None => HistoryConfig::default(),
    };
    tracing::info!(
        width = args.width,
        height = args.height,
        steps = args.steps.len(),
        "starting session"
    );

    let mut session = Session::new(config, args.width, args.height, args.background)
        .context("failed to start session")?;

    let mut steps = Vec::with_capacity(args.steps.len());
    for step in &args.steps {
        let outcome = session.run(step).with_context(|| format!("step '{step}' failed"))?;
        tracing::info!(step = %step, ?outcome, "step finished");
        steps.push(StepReport {
            step: step.to_string(),
            outcome,
        });
    }

    let report = Report {
        steps,
        summary: session.summary(),
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}
