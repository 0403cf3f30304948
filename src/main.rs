mod api;
mod cli;
mod config;
mod daemon;
mod drivers;
mod error;
mod flow_sensor;
mod frontend;
mod measurement;
mod ptmath;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};

use cli::Args;
use config::Config;
use daemon::MeasurementDaemon;
use frontend::FrontendPort;
use state::{ConfigStore, ResultsStore};

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    if args.show_default_config {
        let template = Config::default_template()?;
        println!("{}", serde_yml::to_string(&template)?);
        return Ok(());
    }

    info!("loading configuration from {}", args.config.display());
    let config = Config::load_or_default(&args.config)?;

    let config_store = ConfigStore::new(config.clone());
    let results_store = ResultsStore::new();

    let daemon = Arc::new(MeasurementDaemon::new(config_store.clone(), results_store.clone()));
    daemon.launch()?;

    let frontend: Option<Box<dyn FrontendPort>> = if config.mqtt.enabled {
        match frontend::mqtt::MqttFrontend::connect(config.mqtt.clone()) {
            Ok(mqtt) => Some(Box::new(mqtt)),
            Err(e) => {
                error!("failed to connect MQTT frontend: {e}");
                None
            }
        }
    } else {
        None
    };

    let api = api::ApiDispatcher::new(config_store.clone(), results_store.clone(), daemon.calibrator());

    let shutdown_requested = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let ctrlc_flag = shutdown_requested.clone();
    ctrlc::set_handler(move || {
        ctrlc_flag.store(true, std::sync::atomic::Ordering::SeqCst);
    })?;

    info!("picalor_core running, press Ctrl+C to stop");
    while !shutdown_requested.load(std::sync::atomic::Ordering::SeqCst) {
        if let Some(fe) = frontend.as_ref() {
            if let Some(request) = fe.poll_command() {
                match api.dispatch(&request.name, &request.payload) {
                    Ok(body) => {
                        if let Err(e) = fe.publish_command_response(&request.name, true, &body) {
                            warn!("failed to publish command response: {e}");
                        }
                    }
                    Err(e) => {
                        let body = serde_json::json!({ "error": e.to_string() });
                        if let Err(e) = fe.publish_command_response(&request.name, false, &body) {
                            warn!("failed to publish command error response: {e}");
                        }
                    }
                }
            }
            let results = results_store.snapshot();
            if let Ok(json) = results.to_json() {
                if let Err(e) = fe.publish_results(&json) {
                    warn!("failed to publish results: {e}");
                }
            }
        }
        std::thread::sleep(Duration::from_millis(200));
    }

    info!("shutdown requested, stopping measurement daemon");
    daemon.shutdown();
    daemon.join()?;
    Ok(())
}
