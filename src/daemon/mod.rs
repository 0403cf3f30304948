//! The measurement daemon: a single worker thread that owns the ADC and
//! GPIO drivers and drives one acquisition tick per scan interval.
//!
//! This is deliberately a `std::thread`, not a tokio task: every operation
//! it performs (SPI reads, the GPIO spinlock) is a blocking call, which is
//! the same reasoning the acquisition subsystem in this codebase uses for
//! its own hardware callback threads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::config::adcs::AdcConfig;
use crate::config::flow_sensors::FlowSensorConfig;
use crate::config::{Config, ReloadKind};
use crate::drivers::{create_adc_driver, create_gpio_driver, AdcDriver, GpioDriver};
use crate::flow_sensor::{FixedFlowSensor, FlowSensor, PulseFlowSensor};
use crate::measurement::{apply_measurement, measure_wheatstone_factor, Calibrator, MeasurementChannel};
use crate::state::results::{ChannelResult, Results};
use crate::state::{ConfigStore, ResultsStore, Signal};

struct WorkerState {
    adc_drivers: HashMap<String, Box<dyn AdcDriver>>,
    /// Live ADC configuration, refreshed independently of `adc_drivers` by
    /// both [`apply_no_restart_update`] and a completed calibration, since
    /// `r_s`/`r_offset`/`filter_size`/`adc_offset` can all change without
    /// tearing down the driver handle itself.
    adc_configs: HashMap<String, AdcConfig>,
    gpio_driver: Box<dyn GpioDriver>,
    channels: Vec<MeasurementChannel>,
}

/// Owns the worker thread and the signals used to control it.
pub struct MeasurementDaemon {
    config_store: Arc<ConfigStore>,
    results_store: Arc<ResultsStore>,
    shutdown: Signal,
    handle: Mutex<Option<JoinHandle<()>>>,
    calibrator: Arc<Calibrator>,
}

impl MeasurementDaemon {
    pub fn new(config_store: Arc<ConfigStore>, results_store: Arc<ResultsStore>) -> Self {
        Self {
            config_store,
            results_store,
            shutdown: Signal::new(),
            handle: Mutex::new(None),
            calibrator: Arc::new(Calibrator::new()),
        }
    }

    /// Spawn the worker thread. Returns once the thread has been started;
    /// does not wait for the first tick.
    pub fn launch(self: &Arc<Self>) -> Result<()> {
        let daemon = self.clone();
        let initial_config = daemon.config_store.current();
        let mut state = build_worker_state(&initial_config)?;

        let handle = std::thread::Builder::new()
            .name("picalor-worker".to_string())
            .spawn(move || daemon.run(&mut state))
            .map_err(|e| anyhow::anyhow!("failed to spawn worker thread: {e}"))?;

        *self.handle.lock().unwrap() = Some(handle);
        info!("measurement daemon launched");
        Ok(())
    }

    /// The single calibrator every ADC/temp channel in the daemon shares;
    /// a frontend's calibration command addresses it by `(adc_key,
    /// temp_ch_idx)` rather than reaching into per-channel state.
    pub fn calibrator(&self) -> Arc<Calibrator> {
        self.calibrator.clone()
    }

    /// Request the worker thread stop after its current tick.
    pub fn shutdown(&self) {
        self.shutdown.set();
    }

    /// Block until the worker thread has exited.
    pub fn join(&self) -> Result<()> {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("worker thread panicked"))?;
        }
        Ok(())
    }

    fn run(&self, state: &mut WorkerState) {
        info!("measurement worker thread started");
        let mut tick_count: u64 = 0;

        loop {
            // Fixed tick priority: shutdown, then a staged reconfiguration
            // (no-restart absorbed in place, full-restart rebuilding
            // drivers), then a pending calibration request, and only then
            // ordinary acquisition.
            if self.shutdown.is_set() {
                info!("measurement worker thread shutting down");
                for adc in state.adc_drivers.values_mut() {
                    if let Err(e) = adc.stop() {
                        warn!("error stopping ADC driver: {e}");
                    }
                }
                self.calibrator.reset();
                return;
            }

            let old_config = self.config_store.current();
            if let Some(new_config) = self.config_store.take_pending() {
                let kind = old_config.reload_kind(&new_config);
                match kind {
                    ReloadKind::NoRestart => {
                        debug!("applying no-restart configuration update");
                        apply_no_restart_update(state, &new_config);
                    }
                    ReloadKind::FullRestart => {
                        info!("applying full-restart configuration update");
                        match build_worker_state(&new_config) {
                            Ok(new_state) => *state = new_state,
                            Err(e) => error!("failed to rebuild worker state: {e}"),
                        }
                    }
                }
            }

            let tick_start = Instant::now();
            if self.calibrator.is_requested() {
                self.service_calibration(state);
            } else {
                let results = run_tick(state, tick_count);
                self.results_store.publish(results);
                tick_count += 1;
            }

            let scan_interval = Duration::from_secs(self.config_store.current().scan_interval_s);
            let elapsed = tick_start.elapsed();
            if elapsed < scan_interval {
                if self.shutdown.wait_timeout(scan_interval - elapsed) {
                    continue; // loop head will observe shutdown and exit
                }
            } else {
                warn!(
                    "acquisition tick took {:?}, longer than the {:?} scan interval",
                    elapsed, scan_interval
                );
            }
        }
    }

    /// Service one pending calibration point: measure the requested temp
    /// channel's Wheatstone factor against its board's reference resistor,
    /// apply it, and release the caller via [`Calibrator::finish`].
    fn service_calibration(&self, state: &mut WorkerState) {
        let req = match self.calibrator.take_pending() {
            Some(req) => req,
            None => {
                self.calibrator.finish();
                return;
            }
        };

        let measured = match (
            state.adc_drivers.get_mut(&req.adc_key),
            state.adc_configs.get(&req.adc_key),
        ) {
            (Some(adc), Some(adc_cfg)) => {
                measure_wheatstone_factor(adc.as_mut(), adc_cfg, req.temp_ch_idx)
            }
            _ => Err(anyhow::anyhow!("unknown ADC '{}'", req.adc_key)),
        };

        match measured {
            Ok(wh) => {
                if let Some(adc_cfg) = state.adc_configs.get_mut(&req.adc_key) {
                    if let Some(temp_ch) = adc_cfg.temp_chs.get_mut(req.temp_ch_idx) {
                        if let Some((r_s, r_offset)) = apply_measurement(temp_ch, &req, wh) {
                            info!(
                                "calibration of {}[{}] complete: r_s={r_s:.3} r_offset={r_offset:.3}",
                                req.adc_key, req.temp_ch_idx
                            );
                        }
                        let snapshot = temp_ch.clone();
                        self.config_store.mutate_current(|cfg| {
                            if let Some(adc) = cfg.adcs.get_mut(&req.adc_key) {
                                if let Some(tc) = adc.temp_chs.get_mut(req.temp_ch_idx) {
                                    *tc = snapshot;
                                }
                            }
                        });
                    }
                }
            }
            Err(e) => error!("calibration measurement failed: {e}"),
        }

        self.calibrator.finish();
    }
}

fn apply_no_restart_update(state: &mut WorkerState, new_config: &Config) {
    for (name, adc_cfg) in &new_config.adcs {
        state.adc_configs.insert(name.clone(), adc_cfg.clone());
    }

    for (channel, channel_cfg) in state.channels.iter_mut().zip(new_config.channels.iter()) {
        if let Some(fluid_cfg) = new_config.fluids.get(&channel_cfg.fluid) {
            channel.fluid = fluid_cfg.clone();
        }
        channel.power_offset = channel_cfg.power_offset;
        channel.power_gain = channel_cfg.power_gain;
        channel.r_0_up = channel_cfg.r_0_up;
        channel.r_0_dn = channel_cfg.r_0_dn;
        channel.r_wires_up = channel_cfg.r_wires_up;
        channel.r_wires_dn = channel_cfg.r_wires_dn;
        channel.flow_temp_ch = channel_cfg.flow_temp_ch;
    }
}

fn build_worker_state(config: &Config) -> Result<WorkerState> {
    let mut adc_drivers = HashMap::new();
    let mut adc_configs = HashMap::new();
    for (name, adc_cfg) in &config.adcs {
        adc_drivers.insert(
            name.clone(),
            create_adc_driver(adc_cfg.driver, &adc_cfg.spi_device)?,
        );
        adc_configs.insert(name.clone(), adc_cfg.clone());
    }

    let mut gpio_driver = create_gpio_driver(crate::drivers::DriverKind::Mock)?;

    let mut flow_sensors: HashMap<usize, FlowSensor> = HashMap::new();
    for (idx, flow_cfg) in config.flow_sensors.iter().enumerate() {
        match flow_cfg {
            FlowSensorConfig::Fixed(f) => {
                flow_sensors.insert(idx, FlowSensor::Fixed(FixedFlowSensor::new(f.liters_per_second)));
            }
            FlowSensorConfig::Pulse(p) => {
                let sensor = Arc::new(PulseFlowSensor::new(
                    p.liters_per_pulse,
                    Duration::from_secs_f64(p.timeout_s),
                ));
                let callback_sensor = sensor.clone();
                gpio_driver.watch_falling_edge(
                    p.gpio_pin,
                    Box::new(move |tick| callback_sensor.on_edge(tick)),
                )?;
                flow_sensors.insert(idx, FlowSensor::Pulse(sensor));
            }
        }
    }

    let mut channels = Vec::new();
    for channel_cfg in &config.channels {
        let adc_cfg = config.adcs.get(&channel_cfg.adc).ok_or_else(|| {
            anyhow::anyhow!(
                "channel '{}' references unknown ADC '{}'",
                channel_cfg.name,
                channel_cfg.adc
            )
        })?;
        let fluid_cfg = config
            .fluids
            .get(&channel_cfg.fluid)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "channel '{}' references unknown fluid '{}'",
                    channel_cfg.name,
                    channel_cfg.fluid
                )
            })?
            .clone();
        let flow_sensor = take_flow_sensor(&mut flow_sensors, channel_cfg.flow_sensor)?;
        channels.push(MeasurementChannel::new(
            channel_cfg,
            adc_cfg,
            fluid_cfg,
            flow_sensor,
        )?);
    }

    Ok(WorkerState {
        adc_drivers,
        adc_configs,
        gpio_driver,
        channels,
    })
}

fn take_flow_sensor(pool: &mut HashMap<usize, FlowSensor>, index: usize) -> Result<FlowSensor> {
    match pool.remove(&index) {
        Some(FlowSensor::Fixed(f)) => Ok(FlowSensor::Fixed(FixedFlowSensor::new(
            f.rate_liters_per_second(),
        ))),
        Some(FlowSensor::Pulse(p)) => Ok(FlowSensor::Pulse(p)),
        None => Err(anyhow::anyhow!("unknown flow sensor index {index}")),
    }
}

/// Run one acquisition tick: scan every channel's bridge before computing
/// any channel's power, so a `flow_temp_ch` cross-reference always sees
/// this tick's temperature rather than a stale one from the last.
fn run_tick(state: &mut WorkerState, tick_count: u64) -> Results {
    let mut temps: Vec<Option<(f64, f64)>> = Vec::with_capacity(state.channels.len());
    let mut scan_errors: Vec<Option<String>> = Vec::with_capacity(state.channels.len());

    for channel in state.channels.iter() {
        let outcome = match (
            state.adc_drivers.get_mut(&channel.adc_key),
            state.adc_configs.get(&channel.adc_key),
        ) {
            (Some(adc), Some(adc_cfg)) => channel.scan_sensors(adc.as_mut(), adc_cfg),
            _ => Err(anyhow::anyhow!("unknown ADC '{}'", channel.adc_key)),
        };
        match outcome {
            Ok(t) => {
                temps.push(Some(t));
                scan_errors.push(None);
            }
            Err(e) => {
                temps.push(None);
                scan_errors.push(Some(e.to_string()));
            }
        }
    }

    let mut channels = Vec::with_capacity(state.channels.len());
    for (i, channel) in state.channels.iter().enumerate() {
        let mut result = ChannelResult {
            name: channel.name.clone(),
            ..Default::default()
        };

        if let Some(err) = &scan_errors[i] {
            result.error = Some(err.clone());
            channels.push(result);
            continue;
        }

        let (t_up, t_dn) = temps[i].expect("scan_errors[i] is None, so temps[i] must be Some");
        result.t_upstream = Some(t_up);
        result.t_downstream = Some(t_dn);

        let t_flow = temps
            .get(channel.flow_temp_ch)
            .copied()
            .flatten()
            .map(|(up, _)| up);
        if let Some(t_flow) = t_flow {
            let (flow_kg_sec, power_w) = channel.calculate_power(t_up, t_dn, t_flow);
            result.flow_kg_sec = flow_kg_sec;
            result.power_w = power_w;
        }

        channels.push(result);
    }

    Results {
        tick_count,
        last_tick_at: Some(chrono::Local::now()),
        channels,
        datalogs: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::measurement::CalibrationRequest;
    use crate::measurement::CalValueKey;
    use std::time::Duration;

    #[test]
    fn worker_runs_a_tick_and_publishes_results() {
        let mut config = Config::default_template().unwrap();
        config.scan_interval_s = 1;
        let config_store = ConfigStore::new(config);
        let results_store = ResultsStore::new();
        let daemon = Arc::new(MeasurementDaemon::new(config_store, results_store.clone()));
        daemon.launch().unwrap();

        std::thread::sleep(Duration::from_millis(100));
        daemon.shutdown();
        daemon.join().unwrap();

        let snapshot = results_store.snapshot();
        assert!(snapshot.tick_count >= 1);
        assert_eq!(snapshot.channels.len(), 1);
    }

    #[test]
    fn no_restart_config_update_changes_filter_size_without_rebuild() {
        let config = Config::default_template().unwrap();
        let config_store = ConfigStore::new(config.clone());
        let results_store = ResultsStore::new();
        let daemon = Arc::new(MeasurementDaemon::new(config_store.clone(), results_store));
        daemon.launch().unwrap();

        let mut new_config = config.clone();
        new_config.adcs.get_mut("adc0").unwrap().filter_size = 16;
        assert_eq!(
            config_store.stage_pending(new_config).unwrap(),
            ReloadKind::NoRestart
        );

        std::thread::sleep(Duration::from_millis(100));
        daemon.shutdown();
        daemon.join().unwrap();
    }

    #[test]
    fn calibration_request_is_serviced_on_a_later_tick() {
        let mut config = Config::default_template().unwrap();
        config.scan_interval_s = 1;
        let config_store = ConfigStore::new(config);
        let results_store = ResultsStore::new();
        let daemon = Arc::new(MeasurementDaemon::new(config_store.clone(), results_store));
        daemon.launch().unwrap();

        let calibrator = daemon.calibrator();
        calibrator
            .request_point(
                &config_store.current().adcs,
                CalibrationRequest {
                    adc_key: "adc0".to_string(),
                    temp_ch_idx: 0,
                    value_key: CalValueKey::CalRA,
                    cal_resistance: 1000.0,
                },
            )
            .unwrap();
        calibrator.wait_for_point(Duration::from_secs(5)).unwrap();

        let updated = config_store.current();
        assert!(updated.adcs["adc0"].temp_chs[0].cal_r_a.is_some());

        daemon.shutdown();
        daemon.join().unwrap();
    }
}
