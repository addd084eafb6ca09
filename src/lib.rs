pub mod channels;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod mqtt;
pub mod options;
pub mod prelude;
pub mod scheduler;
pub mod wr3223;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::coordinator::Coordinator;
use crate::mqtt::Mqtt;
use crate::options::Options;
use crate::prelude::*;
use crate::wr3223::{Driver, DriverStats, DriverTask};

use std::time::Duration;

/// Everything started by [`app`], stopped together.
pub struct Components {
    pub coordinator: Coordinator,
    pub mqtt: Mqtt,
    pub driver: DriverTask,
}

impl Components {
    /// The driver goes first so nothing is polled or written while the
    /// plumbing behind it shuts down.
    pub async fn stop(self) -> Option<DriverStats> {
        info!("Stopping all components...");

        let stats = self.driver.stop().await;
        self.coordinator.stop();
        self.mqtt.stop();

        info!("Shutdown complete");
        stats
    }
}

pub fn init_logging(level: &str) {
    if let Err(e) = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init()
    {
        warn!("logging already initialised: {}", e);
    }
}

/// Start the driver, coordinator and MQTT client and run until `shutdown_rx` fires.
pub async fn app(mut shutdown_rx: broadcast::Receiver<()>, config: ConfigWrapper) -> Result<()> {
    info!("wr3223-bridge {} starting", CARGO_PKG_VERSION);

    info!("Initializing channels...");
    let channels = Channels::new();

    info!("Initializing components...");

    info!("  Creating WR3223 driver...");
    let driver = Driver::new(config.wr3223(), channels.clone())?;

    info!("  Creating Coordinator...");
    let coordinator = Coordinator::new(config.clone(), channels.clone(), driver.handle());
    let coordinator_clone = coordinator.clone();
    let coordinator_handle = tokio::spawn(async move {
        if let Err(e) = coordinator_clone.start().await {
            error!("Coordinator task failed: {}", e);
        }
    });

    info!("  Creating MQTT client...");
    let mqtt = Mqtt::new(config.clone(), channels.clone());
    let mqtt_clone = mqtt.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = mqtt_clone.start().await {
            error!("MQTT task failed: {}", e);
        }
    });

    info!("  Starting WR3223 driver...");
    let driver = driver.start(config.wr3223().refresh());

    info!("Waiting for shutdown signal...");
    let _ = shutdown_rx.recv().await;

    info!("Shutdown signal received, stopping components...");
    let components = Components {
        coordinator,
        mqtt,
        driver,
    };
    if let Some(stats) = components.stop().await {
        stats.print_summary();
    }

    if let Err(e) = coordinator_handle.await {
        error!("Error waiting for coordinator task: {}", e);
    }
    if let Err(e) = mqtt_handle.await {
        error!("Error waiting for MQTT task: {}", e);
    }

    info!("Application shutdown complete");
    Ok(())
}

/// Load config, set up logging and signal handling, then run [`app`].
pub async fn run(options: Options) -> Result<()> {
    let config = match ConfigWrapper::new(options.config_file.clone()) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            bail!("Failed to load config {}: {}", options.config_file, e);
        }
    };

    init_logging(config.loglevel());
    config.log_summary();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
        }
        let _ = shutdown_tx_clone.send(());
    });

    if let Some(runtime) = options.runtime {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(runtime)).await;
            info!("runtime limit of {}s reached", runtime);
            let _ = shutdown_tx.send(());
        });
    }

    app(shutdown_rx, config).await
}
