//! A single differential-temperature measurement channel: a cascaded
//! Wheatstone bridge across two Pt1000 taps sharing one reference resistor,
//! a flow sensor, and the fluid flowing between them.

use anyhow::{anyhow, Result};

use crate::config::adcs::AdcConfig;
use crate::config::fluids::FluidConfig;
use crate::config::measurements::MeasurementChannelConfig;
use crate::drivers::AdcDriver;
use crate::flow_sensor::FlowSensor;
use crate::measurement::fluid::{flow_kg_per_sec, thermal_power_watts};
use crate::ptmath::{pt_rtd_temperature, wheatstone, wheatstone_factor};

/// Raw ADC full-scale code for a 24-bit signed converter; every raw code
/// read off the bridge is normalized by this before it is used as a
/// Wheatstone voltage ratio.
pub const ADC_FULL_SCALE_CODE: f64 = (1i64 << 23) as f64;

/// A fully wired measurement channel: which ADC and temp channel indices
/// its bridge cascade reads from, the flow sensor and fluid feeding its
/// power computation, and the pre-computed mux sequence for its scan.
pub struct MeasurementChannel {
    pub name: String,
    pub adc_key: String,
    pub temp_ch_up: usize,
    pub temp_ch_dn: usize,
    pub flow_temp_ch: usize,
    pub fluid: FluidConfig,
    pub flow_sensor: FlowSensor,
    pub power_offset: f64,
    pub power_gain: f64,
    pub r_0_up: f64,
    pub r_0_dn: f64,
    pub r_wires_up: f64,
    pub r_wires_dn: f64,
    /// `[r_ref vs AINCOM, upstream vs r_ref, downstream vs upstream]`,
    /// pre-encoded mux codes read straight from `adc_cfg`.
    mux_seq: [u8; 3],
}

impl MeasurementChannel {
    pub fn new(
        config: &MeasurementChannelConfig,
        adc_cfg: &AdcConfig,
        fluid: FluidConfig,
        flow_sensor: FlowSensor,
    ) -> Result<Self> {
        let up = adc_cfg.temp_chs.get(config.temp_ch_up).ok_or_else(|| {
            anyhow!(
                "channel '{}' references temp_ch_up {} but ADC only has {} temp channels",
                config.name,
                config.temp_ch_up,
                adc_cfg.temp_chs.len()
            )
        })?;
        let dn = adc_cfg.temp_chs.get(config.temp_ch_dn).ok_or_else(|| {
            anyhow!(
                "channel '{}' references temp_ch_dn {} but ADC only has {} temp channels",
                config.name,
                config.temp_ch_dn,
                adc_cfg.temp_chs.len()
            )
        })?;

        Ok(Self {
            name: config.name.clone(),
            adc_key: config.adc.clone(),
            temp_ch_up: config.temp_ch_up,
            temp_ch_dn: config.temp_ch_dn,
            flow_temp_ch: config.flow_temp_ch,
            fluid,
            flow_sensor,
            power_offset: config.power_offset,
            power_gain: config.power_gain,
            r_0_up: config.r_0_up,
            r_0_dn: config.r_0_dn,
            r_wires_up: config.r_wires_up,
            r_wires_dn: config.r_wires_dn,
            mux_seq: [adc_cfg.r_ref.mux, up.mux, dn.mux],
        })
    }

    /// Scan this channel's cascaded bridge and solve for its upstream and
    /// downstream temperatures.
    ///
    /// `adc_cfg` must be the same ADC this channel was built against; the
    /// caller is responsible for looking it up, since the daemon refreshes
    /// live ADC configuration (calibration, NoRestart edits) independently
    /// of the driver handles.
    ///
    /// Only an I/O failure from `adc` is returned as `Err`; an unsolvable
    /// bridge (e.g. a degenerate denominator) surfaces as `NaN` in the
    /// returned temperatures rather than aborting the tick.
    pub fn scan_sensors(&self, adc: &mut dyn AdcDriver, adc_cfg: &AdcConfig) -> Result<(f64, f64)> {
        let up = &adc_cfg.temp_chs[self.temp_ch_up];
        let dn = &adc_cfg.temp_chs[self.temp_ch_dn];
        let filter_size = adc_cfg.filter_size.max(1) as usize;

        let raw = scan_averaged(adc, &self.mux_seq, filter_size)?;
        let avg_ref = (raw[0] - adc_cfg.r_ref.adc_offset as f64) / ADC_FULL_SCALE_CODE;
        let avg_up = (raw[1] - up.adc_offset as f64) / ADC_FULL_SCALE_CODE;
        let avg_dn = (raw[2] - dn.adc_offset as f64) / ADC_FULL_SCALE_CODE;

        let n_ref = adc_cfg.r_ref.n_ref();
        let r_upstream_raw = wheatstone(avg_up, avg_ref, n_ref, up.r_s);
        let r_upstream = r_upstream_raw - up.r_offset - self.r_wires_up;

        let n_ref_dn = up.r_s / r_upstream_raw;
        let r_downstream_raw = wheatstone(avg_dn, avg_up + avg_ref, n_ref_dn, dn.r_s);
        let r_downstream = r_downstream_raw - dn.r_offset - self.r_wires_dn;

        let t_upstream = pt_rtd_temperature(r_upstream, self.r_0_up);
        let t_downstream = pt_rtd_temperature(r_downstream, self.r_0_dn);
        Ok((t_upstream, t_downstream))
    }

    /// Compute this tick's mass flow rate and thermal power from its
    /// upstream/downstream temperatures and the fluid temperature reported
    /// by `t_flow` (typically another channel's `t_upstream`).
    ///
    /// `None` in either slot means the flow sensor hasn't filled its
    /// averaging window yet; `Some(NaN)` means a timed-out flow sensor or
    /// an unsolvable bridge.
    pub fn calculate_power(
        &self,
        t_upstream: f64,
        t_downstream: f64,
        t_flow: f64,
    ) -> (Option<f64>, Option<f64>) {
        let flow_l_s = match self.flow_sensor.rate_liters_per_second() {
            Some(f) => f,
            None => return (None, None),
        };
        if !flow_l_s.is_finite() {
            return (Some(f64::NAN), None);
        }

        let density = self.fluid.density.evaluate(t_flow);
        let flow_kg_sec = flow_kg_per_sec(flow_l_s, density);

        if !(t_upstream.is_finite() && t_downstream.is_finite()) {
            return (Some(flow_kg_sec), None);
        }

        let t_avg = 0.5 * (t_upstream + t_downstream);
        let specific_heat = self.fluid.specific_heat.evaluate(t_avg);
        let power_w = thermal_power_watts(
            self.power_gain,
            self.power_offset,
            flow_kg_sec,
            specific_heat,
            t_downstream - t_upstream,
        );
        (Some(flow_kg_sec), Some(power_w))
    }

    /// Re-anchor this channel's power reading to zero at its current value,
    /// by folding it into `power_offset`.
    pub fn tare_power(&mut self, current_power_w: f64) {
        self.power_offset += current_power_w;
    }
}

/// Measure the Wheatstone factor of a single temp channel against its
/// board's reference resistor, for calibration. Unlike
/// [`MeasurementChannel::scan_sensors`] this only scans a 2-entry sequence
/// (`[r_ref, temp_ch]`), since calibration never needs the cascaded
/// downstream tap.
pub fn measure_wheatstone_factor(
    adc: &mut dyn AdcDriver,
    adc_cfg: &AdcConfig,
    temp_ch_idx: usize,
) -> Result<f64> {
    let temp_ch = adc_cfg
        .temp_chs
        .get(temp_ch_idx)
        .ok_or_else(|| anyhow!("ADC has no temp channel at index {temp_ch_idx}"))?;
    let mux_seq = [adc_cfg.r_ref.mux, temp_ch.mux];
    let filter_size = adc_cfg.filter_size.max(1) as usize;

    let raw = scan_averaged(adc, &mux_seq, filter_size)?;
    let avg_ref = (raw[0] - adc_cfg.r_ref.adc_offset as f64) / ADC_FULL_SCALE_CODE;
    let avg_ch = (raw[1] - temp_ch.adc_offset as f64) / ADC_FULL_SCALE_CODE;

    Ok(wheatstone_factor(avg_ch, avg_ref, adc_cfg.r_ref.n_ref()))
}

/// Scan `mux_seq` for `filter_size` rows (one `read_sequence` call, then
/// `filter_size - 1` `read_continue` calls) into a ring buffer and return
/// the column-wise mean raw code for each mux entry.
fn scan_averaged(adc: &mut dyn AdcDriver, mux_seq: &[u8], filter_size: usize) -> Result<Vec<f64>> {
    let mut buffer: Vec<Vec<i32>> = vec![vec![0i32; mux_seq.len()]; filter_size];
    adc.read_sequence(mux_seq, &mut buffer[0])?;
    for row in buffer.iter_mut().skip(1) {
        adc.read_continue(mux_seq, row)?;
    }

    let mut sums = vec![0i64; mux_seq.len()];
    for row in &buffer {
        for (col, code) in row.iter().enumerate() {
            sums[col] += *code as i64;
        }
    }
    Ok(sums
        .into_iter()
        .map(|s| s as f64 / buffer.len() as f64)
        .collect())
}
