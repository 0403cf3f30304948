//! Configuration for a single 24-bit delta-sigma ADC instance: its reference
//! tap and the cascade of Pt1000 temperature channels it multiplexes.

use serde::{Deserialize, Serialize};

use crate::drivers::DriverKind;

fn default_spi_device() -> String {
    "/dev/spidev0.0".to_string()
}

fn default_aincom_mux() -> u8 {
    0x08
}

fn default_filter_size() -> u32 {
    8
}

/// The series/reference resistor tap shared by every temp channel on an ADC
/// board, used as the excitation side of each Wheatstone solve.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RefResistorConfig {
    /// High-side series resistor, in ohms.
    pub r_s: f64,
    /// Reference leg resistor, in ohms.
    pub r_ref: f64,
    /// Pre-encoded ADC mux code for r_ref vs AINCOM.
    pub mux: u8,
    /// Raw ADC code subtracted from every r_ref column reading.
    #[serde(default)]
    pub adc_offset: i32,
}

impl RefResistorConfig {
    /// `nref = rs0/r0`, the reference ratio threaded through every
    /// Wheatstone solve on this board.
    pub fn n_ref(&self) -> f64 {
        self.r_s / self.r_ref
    }
}

/// One physical Pt1000 input on an ADC board.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TempChannelConfig {
    /// Pre-encoded ADC mux code for this channel vs the previous tap in the
    /// cascade.
    pub mux: u8,
    /// Series resistor for this leg, in ohms; overwritten once a two-point
    /// calibration completes.
    pub r_s: f64,
    /// Resistance offset applied after the Wheatstone solve, in ohms;
    /// overwritten once a two-point calibration completes.
    #[serde(default)]
    pub r_offset: f64,
    /// Raw ADC code subtracted from this column's readings.
    #[serde(default)]
    pub adc_offset: i32,
    /// Known reference resistance recorded for calibration point A.
    #[serde(default)]
    pub cal_r_a: Option<f64>,
    /// Known reference resistance recorded for calibration point B.
    #[serde(default)]
    pub cal_r_b: Option<f64>,
    /// Measured Wheatstone factor at `cal_r_a`.
    #[serde(default)]
    pub cal_wh_a: Option<f64>,
    /// Measured Wheatstone factor at `cal_r_b`.
    #[serde(default)]
    pub cal_wh_b: Option<f64>,
}

/// One physical ADC board, multiplexing a reference tap and a cascade of
/// Pt1000 temperature channels.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AdcConfig {
    /// Which driver backend to construct for this ADC.
    #[serde(default)]
    pub driver: DriverKind,
    /// SPI device path, only meaningful for the native driver.
    #[serde(default = "default_spi_device")]
    pub spi_device: String,
    /// Number of samples averaged per reported conversion.
    #[serde(default = "default_filter_size")]
    pub filter_size: u32,
    pub r_ref: RefResistorConfig,
    /// Pre-encoded mux code for AINCOM, the bridge's common negative input.
    #[serde(default = "default_aincom_mux")]
    pub aincom: u8,
    pub temp_chs: Vec<TempChannelConfig>,
}

impl AdcConfig {
    pub fn validate(&self, name: &str) -> Result<(), String> {
        if name.trim().is_empty() {
            return Err("ADC name must not be empty".into());
        }
        if self.filter_size < 1 {
            return Err(format!(
                "ADC '{name}' has filter_size {} but it must be at least 1",
                self.filter_size
            ));
        }
        if !(self.r_ref.r_s.is_finite() && self.r_ref.r_s > 0.0) {
            return Err(format!(
                "ADC '{name}' has an invalid r_ref.r_s: {}",
                self.r_ref.r_s
            ));
        }
        if !(self.r_ref.r_ref.is_finite() && self.r_ref.r_ref > 0.0) {
            return Err(format!(
                "ADC '{name}' has an invalid r_ref.r_ref: {}",
                self.r_ref.r_ref
            ));
        }
        if self.temp_chs.is_empty() {
            return Err(format!("ADC '{name}' has no temperature channels"));
        }
        for (i, ch) in self.temp_chs.iter().enumerate() {
            if !(ch.r_s.is_finite() && ch.r_s > 0.0) {
                return Err(format!(
                    "ADC '{name}' temp channel {i} has an invalid r_s: {}",
                    ch.r_s
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AdcConfig {
        AdcConfig {
            driver: DriverKind::Mock,
            spi_device: default_spi_device(),
            filter_size: 8,
            r_ref: RefResistorConfig {
                r_s: 10_000.0,
                r_ref: 10_000.0,
                mux: 0x01,
                adc_offset: 0,
            },
            aincom: default_aincom_mux(),
            temp_chs: vec![
                TempChannelConfig {
                    mux: 0x12,
                    r_s: 1000.0,
                    r_offset: 0.0,
                    adc_offset: 0,
                    cal_r_a: None,
                    cal_r_b: None,
                    cal_wh_a: None,
                    cal_wh_b: None,
                },
                TempChannelConfig {
                    mux: 0x23,
                    r_s: 1000.0,
                    r_offset: 0.0,
                    adc_offset: 0,
                    cal_r_a: None,
                    cal_r_b: None,
                    cal_wh_a: None,
                    cal_wh_b: None,
                },
            ],
        }
    }

    #[test]
    fn sample_is_valid() {
        assert!(sample().validate("adc0").is_ok());
    }

    #[test]
    fn rejects_filter_size_zero() {
        let mut a = sample();
        a.filter_size = 0;
        assert!(a.validate("adc0").is_err());
    }

    #[test]
    fn rejects_no_temp_channels() {
        let mut a = sample();
        a.temp_chs.clear();
        assert!(a.validate("adc0").is_err());
    }

    #[test]
    fn n_ref_divides_series_by_reference() {
        let a = sample();
        assert_eq!(a.r_ref.n_ref(), 1.0);
    }
}
