use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pisite::AppConfig;
use pisite::backend::selected_backend;
use pisite::GpioController;
use pisite::tach::measure_fan_rpm;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .or_else(|| std::env::var("PISITE_CONFIG").ok())
        .unwrap_or_else(|| "config.json".to_string());
    let config = AppConfig::load_from_file(&config_path)?;
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.tach.output));

    let backend = Arc::new(selected_backend("fan-reader"));
    let controller = Arc::new(GpioController::new(backend));
    let config = Arc::new(config);

    info!(
        "reading tach on {} line {}, writing {}",
        config.gpio.device,
        config.tach.pin,
        output.display()
    );

    let interval = Duration::from_millis(config.tach.interval_ms);
    loop {
        let controller = controller.clone();
        let tach_config = config.clone();
        let measured = tokio::task::spawn_blocking(move || {
            measure_fan_rpm(&controller, &tach_config.gpio.device, &tach_config.tach)
        })
        .await;

        match measured {
            Ok(Ok((edges, rpm))) => {
                info!("{edges} events read");
                if let Err(e) = tokio::fs::write(&output, format!("{rpm}")).await {
                    warn!("cannot write {}: {e}", output.display());
                }
            }
            Ok(Err(e)) => error!("tach measurement failed: {e}"),
            Err(e) => error!("tach task failed: {e}"),
        }

        tokio::time::sleep(interval).await;
    }
}
