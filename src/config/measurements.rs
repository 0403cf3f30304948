//! Configuration for a single differential-temperature measurement channel.

use serde::{Deserialize, Serialize};

fn default_power_gain() -> f64 {
    1.0
}

/// A differential temperature + flow + power measurement channel: two
/// Pt1000 taps cascaded through one ADC's reference resistor, a flow
/// sensor, and the fluid flowing between them.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MeasurementChannelConfig {
    pub name: String,
    /// Key of the [`crate::config::adcs::AdcConfig`] this channel's bridge
    /// cascade is wired to.
    pub adc: String,
    /// Index into `adcs[adc].temp_chs` for the upstream Pt1000 tap.
    pub temp_ch_up: usize,
    /// Index into `adcs[adc].temp_chs` for the downstream Pt1000 tap.
    pub temp_ch_dn: usize,
    /// Index into the document's `flow_sensors` list.
    pub flow_sensor: usize,
    /// Index into the document's `channels` list whose computed upstream
    /// temperature is used as this channel's fluid (flow) temperature, for
    /// the density lookup. Channels commonly reference themselves.
    pub flow_temp_ch: usize,
    /// Key of the [`crate::config::fluids::FluidConfig`] flowing through
    /// this channel.
    pub fluid: String,
    /// Subtracted from the computed power, in watts; set by
    /// [`crate::measurement::channel::MeasurementChannel::tare_power`].
    #[serde(default)]
    pub power_offset: f64,
    /// Multiplies the computed power before `power_offset` is applied.
    #[serde(default = "default_power_gain")]
    pub power_gain: f64,
    /// Nominal 0 degC resistance of the upstream Pt1000 element, in ohms.
    pub r_0_up: f64,
    /// Nominal 0 degC resistance of the downstream Pt1000 element, in ohms.
    pub r_0_dn: f64,
    /// Lead-wire resistance subtracted from the upstream leg, in ohms.
    #[serde(default)]
    pub r_wires_up: f64,
    /// Lead-wire resistance subtracted from the downstream leg, in ohms.
    #[serde(default)]
    pub r_wires_dn: f64,
    /// Free-form operator notes; not interpreted by the daemon.
    #[serde(default)]
    pub info: String,
}

impl MeasurementChannelConfig {
    /// Self-contained checks that don't require cross-referencing the rest
    /// of the document; see [`crate::config::Config::validate`] for the
    /// referential invariants (valid `adc`/`temp_ch_up`/`temp_ch_dn`/
    /// `flow_sensor`/`flow_temp_ch`/`fluid`).
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("channel name must not be empty".into());
        }
        if self.adc.trim().is_empty() {
            return Err(format!("channel '{}' does not reference an ADC", self.name));
        }
        if self.fluid.trim().is_empty() {
            return Err(format!("channel '{}' does not reference a fluid", self.name));
        }
        if !(self.r_0_up.is_finite() && self.r_0_up > 0.0) {
            return Err(format!(
                "channel '{}' has an invalid r_0_up: {}",
                self.name, self.r_0_up
            ));
        }
        if !(self.r_0_dn.is_finite() && self.r_0_dn > 0.0) {
            return Err(format!(
                "channel '{}' has an invalid r_0_dn: {}",
                self.name, self.r_0_dn
            ));
        }
        if !self.power_gain.is_finite() {
            return Err(format!(
                "channel '{}' has a non-finite power_gain",
                self.name
            ));
        }
        if !self.power_offset.is_finite() {
            return Err(format!(
                "channel '{}' has a non-finite power_offset",
                self.name
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MeasurementChannelConfig {
        MeasurementChannelConfig {
            name: "ch0".to_string(),
            adc: "adc0".to_string(),
            temp_ch_up: 0,
            temp_ch_dn: 1,
            flow_sensor: 0,
            flow_temp_ch: 0,
            fluid: "water".to_string(),
            power_offset: 0.0,
            power_gain: 1.0,
            r_0_up: 1000.0,
            r_0_dn: 1000.0,
            r_wires_up: 0.0,
            r_wires_dn: 0.0,
            info: String::new(),
        }
    }

    #[test]
    fn sample_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_missing_adc_reference() {
        let mut c = sample();
        c.adc = "".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_r_0() {
        let mut c = sample();
        c.r_0_up = 0.0;
        assert!(c.validate().is_err());
    }
}
