//! Run command.

use super::alert::build_transport;
use super::{close_gallery, open_gallery};
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use vitalwatch::config::VitalwatchConfig;
use vitalwatch::services::{
    AlertDispatcher, CooldownTracker, IdentityResolver, MonitoringLoop, ShutdownSignal,
};
use vitalwatch::sources::{Replay, SimulatedVitalsSource, VitalsSource};

/// Arguments for `run`.
#[derive(Args)]
pub struct RunArgs {
    /// Recorded session to replay (JSON Lines).
    #[arg(long)]
    replay: PathBuf,

    /// Replace recorded vitals with simulated readings.
    #[arg(long)]
    simulate_vitals: bool,

    /// Probability that a simulated reading is critical.
    #[arg(long, default_value_t = 0.0, requires = "simulate_vitals")]
    critical_probability: f64,

    /// Seed for simulated readings.
    #[arg(long, requires = "simulate_vitals")]
    seed: Option<u64>,

    /// Send alerts on the blocking pool instead of inline.
    #[arg(long)]
    background_dispatch: bool,

    /// Target frame rate; 0 is unpaced.
    #[arg(long)]
    fps: Option<u32>,

    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,
}

/// Run command.
pub async fn cmd_run(config: VitalwatchConfig, args: RunArgs) -> anyhow::Result<()> {
    let gallery = Arc::new(open_gallery(&config)?);
    if gallery.is_empty() {
        tracing::warn!("no identities enrolled, every face will resolve as unknown");
    }

    let Replay {
        frames,
        detector,
        extractor,
        vitals,
    } = Replay::open(&args.replay)?;

    let vitals: Box<dyn VitalsSource> = if args.simulate_vitals {
        let source = args
            .seed
            .map_or_else(SimulatedVitalsSource::new, SimulatedVitalsSource::seeded);
        Box::new(source.with_critical_probability(args.critical_probability)?)
    } else {
        Box::new(vitals)
    };

    let transport = build_transport(&config.transport).await?;
    let dispatcher = Arc::new(AlertDispatcher::new(
        transport,
        CooldownTracker::new(config.alerts.cooldown),
    ));
    let resolver = IdentityResolver::new(Arc::clone(&gallery), config.resolver);

    let mut monitor = config.monitor_config();
    if let Some(fps) = args.fps {
        monitor.fps = fps;
    }
    monitor.background_dispatch |= args.background_dispatch;

    let shutdown = ShutdownSignal::new();
    let handler = shutdown.clone();
    ctrlc::set_handler(move || handler.trigger()).context("failed to install Ctrl-C handler")?;

    let stats = MonitoringLoop::new(
        Box::new(frames),
        Box::new(detector),
        Box::new(extractor),
        vitals,
        resolver,
        dispatcher,
        monitor,
    )
    .run(&shutdown)
    .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{stats}");
    }

    close_gallery(gallery)?;
    Ok(())
}
