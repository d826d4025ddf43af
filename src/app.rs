use std::path::PathBuf;

use flexi_logger::{FlexiLoggerError, Logger, LoggerHandle};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::core::{
    config::{ConfigManager, Settings},
    control_room::ControlRoom,
    seed,
};

const CONFIG_DIR_ENV: &str = "PLOT_WATCH_CONFIG_DIR";

fn init_logging(settings: &Settings) -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_env_or_str(&settings.log_level)?
        .log_to_stderr()
        .format(flexi_logger::detailed_format)
        .start()
}

fn config_dir() -> PathBuf {
    std::env::var_os(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Run the monitoring core until Ctrl-C.
pub fn run() {
    let config_manager = ConfigManager::new(config_dir());
    let settings = config_manager.load();

    let _logger = match init_logging(&settings) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Logging unavailable: {e}");
            None
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return;
        }
    };

    runtime.block_on(serve(settings));
}

async fn serve(settings: Settings) {
    let room = ControlRoom::with_settings(&settings);

    if settings.seed_plots > 0 {
        let mut rng = StdRng::from_os_rng();
        match seed::seed_plots(room.registry(), settings.seed_plots, &mut rng) {
            Ok(ids) => info!("Seeded {} plots", ids.len()),
            Err(e) => warn!("Seeding stopped early: {}", e),
        }
    }

    let stats = room.stats();
    info!(
        "Monitoring {} plots ({} armed, {} disarmed), {} employees on roster",
        stats.total,
        stats.active,
        stats.inactive,
        room.list_employees().len()
    );

    let scheduler = room.start_scheduler();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
    scheduler.shutdown().await;

    let stats = room.stats();
    info!(
        "Final state: {} plots, {} in emergency, {} low battery, {} open calls",
        stats.total,
        stats.emergency,
        stats.low_battery,
        room.list_calls(Default::default()).len()
    );
}
