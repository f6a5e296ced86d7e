//! Multicast market-data server binary.
//!
//! Usage: `server [config_path] [tcp_port]`
//!
//! `config_path` defaults to `config/reuters_config.json`. The second
//! argument is the legacy TCP session port; it is parsed for compatibility
//! and ignored — distribution is connectionless multicast.

use fxcast_rs::publisher::MulticastConfig;
use fxcast_rs::server::ServerDriver;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config/reuters_config.json";
const DEFAULT_TCP_PORT: u16 = 11501;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let tcp_port: u16 = args
        .next()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_TCP_PORT);
    if tcp_port != DEFAULT_TCP_PORT {
        warn!(tcp_port, "legacy TCP port argument is ignored");
    }

    info!("FX market-data server with multicast distribution");

    let config = match MulticastConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, path = %config_path, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let driver = match ServerDriver::new(config) {
        Ok(driver) => driver,
        Err(err) => {
            error!(error = %err, "server initialization failed");
            std::process::exit(1);
        }
    };

    let running = driver.running_flag();
    if let Err(err) = ctrlc::set_handler(move || {
        running.store(false, Ordering::Release);
    }) {
        error!(error = %err, "failed to install signal handler");
        std::process::exit(1);
    }

    info!("press Ctrl+C to shut down");
    if let Err(err) = driver.run() {
        error!(error = %err, "server terminated abnormally");
        std::process::exit(1);
    }
}
