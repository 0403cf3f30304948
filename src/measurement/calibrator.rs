//! Two-point in-situ resistance calibration.
//!
//! Calibration runs as a ping-pong handoff between a caller (the API
//! dispatcher, typically) and the measurement worker thread: the caller
//! requests a point against a specific `(adc_key, temp_ch_idx)`, with a
//! known reference resistance, the worker measures the Wheatstone factor on
//! its next tick and applies it via [`apply_measurement`], and the caller is
//! released from its bounded wait once the worker has done so. Only one
//! calibration request is serviced at a time, since servicing one steals the
//! ADC thread away from ordinary acquisition.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::config::adcs::{AdcConfig, TempChannelConfig};
use crate::state::Signal;
use std::collections::BTreeMap;

/// Upper bound on a plausible reference resistance for a calibration point,
/// in ohms. A value above this, or at or below zero, is rejected before it
/// is ever handed to the worker thread.
const MAX_CAL_RESISTANCE_OHMS: f64 = 10_000.0;

/// Which of a temp channel's two calibration slots a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalValueKey {
    CalRA,
    CalRB,
}

impl CalValueKey {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "cal_r_a" => Ok(CalValueKey::CalRA),
            "cal_r_b" => Ok(CalValueKey::CalRB),
            other => bail!("value_key must be 'cal_r_a' or 'cal_r_b', got '{other}'"),
        }
    }
}

/// A single calibration point request: measure the Wheatstone factor of
/// `adc_key`'s temp channel `temp_ch_idx` against a known reference
/// resistance `cal_resistance`, and record it as `value_key`.
#[derive(Debug, Clone)]
pub struct CalibrationRequest {
    pub adc_key: String,
    pub temp_ch_idx: usize,
    pub value_key: CalValueKey,
    pub cal_resistance: f64,
}

/// Drives the two-point calibration handoff between a caller and the
/// worker thread. A single instance serves every ADC and temp channel in
/// the daemon; only one calibration can be in flight at a time.
pub struct Calibrator {
    /// Set by the caller to request a point be recorded, cleared by the
    /// worker once it has done so.
    calibration_mode_enabled: Signal,
    /// Cleared by the caller before a request, set by the worker once the
    /// requested point has been recorded.
    cal_data_ready: Signal,
    active: Mutex<bool>,
    pending: Mutex<Option<CalibrationRequest>>,
}

impl Calibrator {
    /// Fixed size of the `temp_ch_idx` addressing range, independent of how
    /// many temp channels any particular ADC is actually configured with.
    pub const MAX_TEMP_CHANNELS: usize = 7;

    pub fn new() -> Self {
        Self {
            calibration_mode_enabled: Signal::new(),
            cal_data_ready: Signal::new(),
            active: Mutex::new(false),
            pending: Mutex::new(None),
        }
    }

    /// Request that the worker record a calibration point on its next tick.
    /// Validates `req` against `adcs` and rejects it if a calibration is
    /// already in progress, before mutating any state.
    pub fn request_point(&self, adcs: &BTreeMap<String, AdcConfig>, req: CalibrationRequest) -> Result<()> {
        if !(req.cal_resistance.is_finite()
            && req.cal_resistance > 0.0
            && req.cal_resistance <= MAX_CAL_RESISTANCE_OHMS)
        {
            bail!(
                "calibration resistance {} is out of range (0, {MAX_CAL_RESISTANCE_OHMS}]",
                req.cal_resistance
            );
        }
        if req.temp_ch_idx >= Self::MAX_TEMP_CHANNELS {
            bail!(
                "temp_ch_idx {} is out of range [0, {})",
                req.temp_ch_idx,
                Self::MAX_TEMP_CHANNELS
            );
        }
        let adc_cfg = adcs
            .get(&req.adc_key)
            .ok_or_else(|| anyhow!("unknown ADC '{}'", req.adc_key))?;
        if req.temp_ch_idx >= adc_cfg.temp_chs.len() {
            bail!(
                "ADC '{}' has no temp channel at index {}",
                req.adc_key,
                req.temp_ch_idx
            );
        }

        let mut active = self.active.lock().unwrap();
        if *active {
            bail!("a calibration is already in progress");
        }
        *active = true;
        drop(active);

        *self.pending.lock().unwrap() = Some(req);
        self.cal_data_ready.clear();
        self.calibration_mode_enabled.set();
        Ok(())
    }

    /// Block until the worker has recorded the requested point, or
    /// `timeout` elapses.
    pub fn wait_for_point(&self, timeout: Duration) -> Result<()> {
        if self.cal_data_ready.wait_timeout(timeout) {
            Ok(())
        } else {
            bail!("timed out waiting for calibration point")
        }
    }

    /// Whether the worker should service a calibration request on this
    /// tick.
    pub fn is_requested(&self) -> bool {
        self.calibration_mode_enabled.is_set()
    }

    /// Called by the worker to take the pending request and address which
    /// ADC/temp channel to measure.
    pub fn take_pending(&self) -> Option<CalibrationRequest> {
        self.pending.lock().unwrap().take()
    }

    /// Called by the worker once it has applied the measured point via
    /// [`apply_measurement`], releasing the caller and allowing a future
    /// request.
    pub fn finish(&self) {
        self.calibration_mode_enabled.clear();
        self.cal_data_ready.set();
        *self.active.lock().unwrap() = false;
    }

    /// Discard any pending request and clear both signals, e.g. on worker
    /// shutdown with a calibration left in flight.
    pub fn reset(&self) {
        *self.pending.lock().unwrap() = None;
        *self.active.lock().unwrap() = false;
        self.calibration_mode_enabled.clear();
        self.cal_data_ready.clear();
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply a freshly-measured Wheatstone factor to a temp channel's stored
/// calibration point. If both points from a prior, completed calibration
/// are already set, they are invalidated before the new point is recorded.
/// Once both `cal_r_a`/`cal_wh_a` and `cal_r_b`/`cal_wh_b` are present,
/// solves for `(r_s, r_offset)` and writes them into `temp_ch`.
///
/// Returns `Some((r_s, r_offset))` if this point completed the pair,
/// `None` otherwise.
pub fn apply_measurement(
    temp_ch: &mut TempChannelConfig,
    req: &CalibrationRequest,
    measured_wh: f64,
) -> Option<(f64, f64)> {
    if temp_ch.cal_wh_a.is_some() && temp_ch.cal_wh_b.is_some() {
        temp_ch.cal_r_a = None;
        temp_ch.cal_r_b = None;
        temp_ch.cal_wh_a = None;
        temp_ch.cal_wh_b = None;
    }

    match req.value_key {
        CalValueKey::CalRA => {
            temp_ch.cal_r_a = Some(req.cal_resistance);
            temp_ch.cal_wh_a = Some(measured_wh);
        }
        CalValueKey::CalRB => {
            temp_ch.cal_r_b = Some(req.cal_resistance);
            temp_ch.cal_wh_b = Some(measured_wh);
        }
    }

    let (cal_r_a, wh_a, cal_r_b, wh_b) = match (
        temp_ch.cal_r_a,
        temp_ch.cal_wh_a,
        temp_ch.cal_r_b,
        temp_ch.cal_wh_b,
    ) {
        (Some(ra), Some(wa), Some(rb), Some(wb)) => (ra, wa, rb, wb),
        _ => return None,
    };
    if (wh_a - wh_b).abs() < f64::EPSILON {
        return None;
    }

    let r_s = (cal_r_a - cal_r_b) / (wh_a - wh_b);
    let r_offset = r_s * wh_a - cal_r_a;
    temp_ch.r_s = r_s;
    temp_ch.r_offset = r_offset;
    Some((r_s, r_offset))
}
