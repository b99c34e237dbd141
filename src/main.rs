//! Helios Video Recorder - camera to encoder to disk

use std::sync::Arc;

use color_eyre::Result;
use tracing::info;

use helios::hal::sim::{SimConfig, SimHardware};
use helios::hal::FileSink;
use helios::pipeline::PipelineDriver;
use helios::{utils, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("helios=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Helios launching...");

    // Load configuration
    let config = Config::default();
    helios::CONFIG.store(Arc::new(config.clone()));

    // Simulated HAL stands in for the board's camera/encoder stack.
    let hw = SimHardware::new(SimConfig {
        frame_limit: config.pipeline.frame_limit,
        frame_interval: utils::frame_interval(config.capture.fps),
        ..SimConfig::default()
    });

    let sink = FileSink::create(&config.output.path)?;
    info!("Recording to {}", config.output.path);

    let mut driver = PipelineDriver::new(&hw, &hw, &hw, Box::new(sink), &config)?;

    // Ctrl-C drains the pipeline instead of killing it mid-frame.
    let events = driver.events();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, draining pipeline");
            events.post_end_of_stream();
        }
    });

    // The driver loop blocks on the event notifier; keep it off the runtime.
    tokio::task::spawn_blocking(move || driver.run()).await??;

    info!("Helios shutting down");
    Ok(())
}
