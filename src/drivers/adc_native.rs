//! Native ADC driver for the Raspberry Pi-class single-board computer.
//!
//! This talks to the real 24-bit delta-sigma ADC over SPI. Out of scope for
//! this crate: only the stub wiring is provided so the driver factory has a
//! concrete, compiling target to select in the field.

use anyhow::{anyhow, Result};

use crate::drivers::AdcDriver;

/// Native SPI-backed ADC driver.
pub struct NativeAdcDriver {
    spi_device: String,
}

impl NativeAdcDriver {
    pub fn new(spi_device: &str) -> Result<Self> {
        // TODO: open and configure the SPI device here.
        Ok(Self {
            spi_device: spi_device.to_string(),
        })
    }
}

impl AdcDriver for NativeAdcDriver {
    fn read_sequence(&mut self, _mux_seq: &[u8], _dest: &mut [i32]) -> Result<()> {
        Err(anyhow!(
            "native ADC driver ({}) not yet implemented",
            self.spi_device
        ))
    }

    fn read_continue(&mut self, _mux_seq: &[u8], _dest: &mut [i32]) -> Result<()> {
        Err(anyhow!("native ADC driver not yet implemented"))
    }

    fn cal_self(&mut self) -> Result<()> {
        Err(anyhow!("native ADC driver not yet implemented"))
    }

    fn stop(&mut self) -> Result<()> {
        Err(anyhow!("native ADC driver not yet implemented"))
    }
}
