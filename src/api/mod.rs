//! Command dispatch: translates named commands (arriving from a frontend's
//! command topic, or a CLI subcommand) into operations on the shared
//! configuration and results stores.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::info;
use serde_json::{json, Value};

use crate::config::Config;
use crate::measurement::{CalValueKey, CalibrationRequest, Calibrator};
use crate::state::{ConfigStore, ResultsStore};

/// How long a calibration command blocks waiting for the worker to record
/// the requested point before giving up.
const CALIBRATION_WAIT: Duration = Duration::from_secs(30);

/// Dispatches named commands against the running daemon's shared state.
///
/// This does not itself own a worker thread or drivers; it is the thin
/// translation layer a frontend's command topic or the CLI calls into.
pub struct ApiDispatcher {
    config_store: Arc<ConfigStore>,
    results_store: Arc<ResultsStore>,
    calibrator: Arc<Calibrator>,
}

impl ApiDispatcher {
    pub fn new(
        config_store: Arc<ConfigStore>,
        results_store: Arc<ResultsStore>,
        calibrator: Arc<Calibrator>,
    ) -> Self {
        Self {
            config_store,
            results_store,
            calibrator,
        }
    }

    /// Dispatch a named command with a JSON payload, returning the JSON
    /// response body. Errors here correspond to the `<cmd_resp>/err/...`
    /// topic in the MQTT frontend; success to `<cmd_resp>/ok/...`.
    pub fn dispatch(&self, command: &str, payload: &Value) -> Result<Value> {
        match command {
            "get_results" => Ok(self.results_store.snapshot().to_json()?),
            "get_config" => Ok(serde_json::to_value(self.config_store.current())?),
            "upload_config" => self.upload_config(payload),
            "calibrate_temp_channel" => self.calibrate_temp_channel(payload),
            _ => bail!("unknown command '{command}'"),
        }
    }

    fn upload_config(&self, payload: &Value) -> Result<Value> {
        let new_config: Config =
            serde_json::from_value(payload.clone()).context("parsing uploaded configuration")?;
        let kind = self.config_store.stage_pending(new_config)?;
        info!("staged configuration update: {kind:?}");
        Ok(json!({ "reload": format!("{kind:?}") }))
    }

    fn calibrate_temp_channel(&self, payload: &Value) -> Result<Value> {
        let adc_key = payload
            .get("adc_key")
            .and_then(Value::as_str)
            .context("calibrate_temp_channel requires an 'adc_key' field")?
            .to_string();
        let temp_ch_idx = payload
            .get("temp_ch_idx")
            .and_then(Value::as_u64)
            .context("calibrate_temp_channel requires a numeric 'temp_ch_idx' field")?
            as usize;
        let value_key_str = payload
            .get("value_key")
            .and_then(Value::as_str)
            .context("calibrate_temp_channel requires a 'value_key' field ('cal_r_a' or 'cal_r_b')")?;
        let cal_resistance = payload
            .get("cal_resistance")
            .and_then(Value::as_f64)
            .context("calibrate_temp_channel requires a numeric 'cal_resistance' field")?;

        let value_key = CalValueKey::parse(value_key_str)?;
        let request = CalibrationRequest {
            adc_key: adc_key.clone(),
            temp_ch_idx,
            value_key,
            cal_resistance,
        };

        let config = self.config_store.current();
        self.calibrator.request_point(&config.adcs, request)?;
        self.calibrator.wait_for_point(CALIBRATION_WAIT)?;

        let updated = self.config_store.current();
        let temp_ch = updated
            .adcs
            .get(&adc_key)
            .and_then(|adc| adc.temp_chs.get(temp_ch_idx));
        match temp_ch {
            Some(tc) if tc.cal_wh_a.is_some() && tc.cal_wh_b.is_some() => Ok(json!({
                "adc_key": adc_key,
                "temp_ch_idx": temp_ch_idx,
                "complete": true,
                "r_s": tc.r_s,
                "r_offset": tc.r_offset,
            })),
            _ => Ok(json!({
                "adc_key": adc_key,
                "temp_ch_idx": temp_ch_idx,
                "complete": false,
            })),
        }
    }
}
