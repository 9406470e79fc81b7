mod api;
mod config;
mod error;
mod models;
mod scheduler;
mod sensors;
mod utils;
mod window;

use log::{error, info, warn, LevelFilter};
use std::env;
use tokio::signal::unix::{signal, SignalKind};

use api::Reporter;
use config::{resolve_config_path, ConfigStore};
use scheduler::{Cadence, Scheduler};
use sensors::{Dht11, Sampler, Sgp30};

const I2C_BUS: u8 = 1;

/// `mief-agent <PiID> <PiSecret>`: exactly two arguments carry a new identity
fn identity_from_args(args: &[String]) -> Option<(&str, &str)> {
    match args {
        [pi_id, pi_secret] => Some((pi_id.as_str(), pi_secret.as_str())),
        _ => None,
    }
}

fn log_level(debug_mode: bool) -> LevelFilter {
    if debug_mode {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; verbosity is narrowed once the config is known
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config_path = resolve_config_path();
    let mut store = match ConfigStore::load(&config_path) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Storing an identity never touches the sensors
    let args: Vec<String> = env::args().skip(1).collect();
    if let Some((pi_id, pi_secret)) = identity_from_args(&args) {
        if let Err(e) = store.set_identity(pi_id, pi_secret) {
            error!("Setting PiID or PiSecret failed: {}", e);
            return Err(e.into());
        }
        info!(
            "PiID and PiSecret set from command line: PiID = {}, config = {}",
            pi_id,
            store.path().display()
        );
        info!("Exiting without sampling");
        return Ok(());
    }

    log::set_max_level(log_level(store.config().debug_mode));

    // Sensors
    let mut sampler = Sampler::new(
        Box::new(Sgp30::new(I2C_BUS)),
        Box::new(Dht11::new(store.config().dht11_pin)),
        store.baseline(),
    );
    if sampler.initialize(store.baseline()).is_err() {
        warn!("Gas sensor unavailable, retrying on the next sample");
    }

    let reporter = Reporter::http()?;
    let scheduler = Scheduler::new(sampler, reporter, store, Cadence::default());

    // Handle Ctrl+C and SIGTERM gracefully
    let (tx, rx) = tokio::sync::oneshot::channel();
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
            }
            _ = sigterm.recv() => {}
        }
        let _ = tx.send(());
    });

    scheduler.run(rx).await;
    info!("Program terminated by signal. Exiting gracefully.");

    Ok(())
}
