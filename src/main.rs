use chrono::Utc;
use log::{error, info, warn};
use p1telegram::{Config, MeterHealth, MeterStatus, P1Reader, TelegramReport};
use std::env;
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    // Initialize logging
    let default_filter = std::env::var("P1_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut health = MeterHealth::new(config.offline_threshold);

    let mut reader = P1Reader::new(config, tx);
    let reader_task = tokio::spawn(async move {
        reader.start_thread().await;
    });

    while let Some(event) = rx.recv().await {
        let change = match event {
            Ok(telegram) => {
                let report = TelegramReport::new(&telegram, Utc::now());
                match report.to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => error!("Unable to serialize telegram: {}", e),
                }
                health.record_success()
            }
            Err(e) => {
                warn!("Telegram dropped: {}", e);
                health.record_failure()
            }
        };

        match change {
            Some(MeterStatus::Online) => info!("Meter is online"),
            Some(MeterStatus::Offline) => warn!("Meter is offline after {} failed telegrams", health.consecutive_failures),
            _ => {}
        }
    }

    let _ = reader_task.await;
    info!("Reader finished after {} telegrams", health.telegrams_received);
}
