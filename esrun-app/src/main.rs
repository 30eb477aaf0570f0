mod console;

use std::fs::File;

use anyhow::{Context, Result};
use esrun_session::{
    NullEmitter, PortEmitter, Session, SessionConfig, SessionError, TriggerEmitter,
};
use esrun_timing::MonotonicClock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use console::{CharDeviceTrigger, ConsoleSurface, StdinInput};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: esrun <config.json>")?;
    let file = File::open(&path).with_context(|| format!("cannot open config {path}"))?;
    let config: SessionConfig =
        serde_json::from_reader(file).with_context(|| format!("invalid config {path}"))?;

    let clock = MonotonicClock::new();
    if config.hardware_trigger {
        let device = config
            .trigger_device
            .clone()
            .context("hardware_trigger is set but trigger_device is not")?;
        let port = CharDeviceTrigger::open(&device)
            .with_context(|| format!("cannot open trigger device {}", device.display()))?;
        run(config, clock.clone(), PortEmitter::new(port, clock))
    } else {
        run(config, clock, NullEmitter)
    }
}

fn run<E: TriggerEmitter>(config: SessionConfig, clock: MonotonicClock, trigger: E) -> Result<()> {
    let surface = ConsoleSurface::new(clock.clone());
    let input = StdinInput::spawn(clock.clone());
    let session = Session::new(config, clock, surface, input, trigger)?;

    match session.run() {
        Ok(report) => {
            info!(
                volumes = report.volumes,
                trials = report.records.len(),
                "session complete"
            );
            Ok(())
        }
        Err(SessionError::Aborted) => {
            info!("session aborted by operator, completed trials are on disk");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
