//! Configuration for the two flow sensing strategies a channel can use.

use serde::{Deserialize, Serialize};

/// Which GPIO pin a pulse sensor is wired to, and its calibration factor.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PulseFlowSensorConfig {
    pub name: String,
    #[serde(default)]
    pub driver: crate::drivers::DriverKind,
    pub gpio_pin: u8,
    pub liters_per_pulse: f64,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: f64,
}

fn default_timeout_s() -> f64 {
    10.0
}

/// A constant, operator-supplied flow rate.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FixedFlowSensorConfig {
    pub name: String,
    pub liters_per_second: f64,
}

/// Union of the two flow sensing strategies, selected by the `type` tag.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowSensorConfig {
    Pulse(PulseFlowSensorConfig),
    Fixed(FixedFlowSensorConfig),
}

impl FlowSensorConfig {
    pub fn name(&self) -> &str {
        match self {
            FlowSensorConfig::Pulse(p) => &p.name,
            FlowSensorConfig::Fixed(f) => &f.name,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            FlowSensorConfig::Pulse(p) => {
                if p.name.trim().is_empty() {
                    return Err("flow sensor name must not be empty".into());
                }
                if !(p.liters_per_pulse.is_finite() && p.liters_per_pulse > 0.0) {
                    return Err(format!(
                        "flow sensor '{}' has an invalid liters_per_pulse: {}",
                        p.name, p.liters_per_pulse
                    ));
                }
                if !(p.timeout_s.is_finite() && p.timeout_s > 0.0) {
                    return Err(format!(
                        "flow sensor '{}' has an invalid timeout_s: {}",
                        p.name, p.timeout_s
                    ));
                }
                Ok(())
            }
            FlowSensorConfig::Fixed(f) => {
                if f.name.trim().is_empty() {
                    return Err("flow sensor name must not be empty".into());
                }
                if !(f.liters_per_second.is_finite() && f.liters_per_second >= 0.0) {
                    return Err(format!(
                        "flow sensor '{}' has an invalid liters_per_second: {}",
                        f.name, f.liters_per_second
                    ));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_sensor_accepts_zero_flow() {
        let f = FlowSensorConfig::Fixed(FixedFlowSensorConfig {
            name: "bypass".to_string(),
            liters_per_second: 0.0,
        });
        assert!(f.validate().is_ok());
    }

    #[test]
    fn pulse_sensor_rejects_negative_calibration() {
        let f = FlowSensorConfig::Pulse(PulseFlowSensorConfig {
            name: "flow0".to_string(),
            driver: crate::drivers::DriverKind::Mock,
            gpio_pin: 4,
            liters_per_pulse: -0.001,
            timeout_s: 10.0,
        });
        assert!(f.validate().is_err());
    }
}
