//! Perception Driver - Main Entry Point
//!
//! Runs the dual-rate pipeline against synthetic collaborators.
//! Enter toggles pause, Ctrl-C stops.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use perception_driver::constants;
use perception_driver::logic::capabilities::{StatusSink, VideoSource};
use perception_driver::logic::clock::{Clock, MonotonicClock};
use perception_driver::logic::config::PipelineConfig;
use perception_driver::logic::synthetic::{
    CanvasRenderer, EngineProfile, SyntheticAccounting, SyntheticEngine, SyntheticWebcam,
    TerminalStatus,
};
use perception_driver::{start, Collaborators};

const FRAME_WIDTH: u32 = 1920;
const FRAME_HEIGHT: u32 = 1080;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Both loops share one thread; they only interleave at await points.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    rt.block_on(run())
}

async fn run() -> anyhow::Result<()> {
    log::info!("{} v{}", constants::APP_NAME, constants::APP_VERSION);
    log::info!("platform: {} | arch: {}", std::env::consts::OS, std::env::consts::ARCH);

    let config = PipelineConfig::from_env();
    log::info!("config: {}", serde_json::to_string(&config)?);

    let status = Arc::new(TerminalStatus::default());
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let accounting = Arc::new(SyntheticAccounting::new(0));

    status.set_status("loading...");
    let profile = EngineProfile {
        latency: Duration::from_millis(25),
        jitter_ms: 15,
        leak_every: std::env::var("PIPELINE_DEMO_LEAK_EVERY").ok().and_then(|s| s.parse().ok()),
        fail_every: std::env::var("PIPELINE_DEMO_FAIL_EVERY").ok().and_then(|s| s.parse().ok()),
        ..Default::default()
    };
    let mut engine = SyntheticEngine::new(profile, Arc::clone(&accounting));

    status.set_status("initializing...");
    let webcam = Arc::new(SyntheticWebcam::new(FRAME_WIDTH, FRAME_HEIGHT, Arc::clone(&clock)));
    engine
        .warmup(&webcam.current_frame())
        .await
        .context("engine warmup failed")?;
    log::info!("webcam: {}x{}", FRAME_WIDTH, FRAME_HEIGHT);

    let handle = start(
        config,
        Collaborators {
            engine,
            renderer: CanvasRenderer::new(Duration::from_millis(4)),
            video: webcam.clone(),
            accounting,
            status,
            clock,
        },
    )?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line {
                Ok(Some(_)) => {
                    let paused = webcam.toggle();
                    log::info!("video {}", if paused { "paused" } else { "playing" });
                }
                // stdin closed: keep running until Ctrl-C
                Ok(None) => {
                    tokio::signal::ctrl_c().await?;
                    break;
                }
                Err(e) => {
                    log::warn!("stdin error: {}", e);
                    tokio::signal::ctrl_c().await?;
                    break;
                }
            },
        }
    }

    println!();
    log::info!("status: {}", serde_json::to_string(&handle.status())?);
    handle.shutdown().await;
    Ok(())
}
