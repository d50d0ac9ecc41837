use anyhow::{Context, Result};
use log::{debug, error, info};
use quadrature::{
    gpio::SysfsPort, logs::write_log, Configuration, QuadratureDecoder, QueuedListener,
    RotationEvent,
};
use std::{env, thread, time::Duration};

const DEFAULT_CONFIGURATION_PATH: &str = "/etc/rotary.json";

// Pending journal writes before events are dropped
const JOURNAL_QUEUE: usize = 64;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let path = env::var("ROTARY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIGURATION_PATH.to_string());
    let config = Configuration::load_from_path(&path)?;
    info!("Configuration loaded from {}: {:?}", path, config);

    let phase_a = SysfsPort::open(&config.phase_a).context("could not open phase A")?;
    let phase_b = SysfsPort::open(&config.phase_b).context("could not open phase B")?;
    let decoder = QuadratureDecoder::new(phase_a, phase_b, &config.decoder)?;
    let (a, b) = decoder.levels()?;
    info!("Decoder ready, phase A={} phase B={}", a, b);

    decoder.subscribe(|event: &RotationEvent| info!("Turning knob {:?}", event.direction));

    // File I/O stays off the GPIO poller threads
    if let Some(dir) = config.log_dir.clone() {
        let (journal, events) = QueuedListener::bounded(JOURNAL_QUEUE);
        decoder.subscribe(journal);
        thread::Builder::new()
            .name("journal".into())
            .spawn(move || {
                for event in events {
                    if let Err(e) = write_log(&dir, event) {
                        error!("Could not write journal: {:#}", e);
                    }
                }
            })
            .context("could not spawn journal thread")?;
    }

    loop {
        thread::sleep(STATS_INTERVAL);
        debug!("{:?} state={:?}", decoder.stats(), decoder.state());
    }
}
