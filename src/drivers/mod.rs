//! Hardware driver abstractions for the ADC and GPIO peripherals.
//!
//! The measurement worker only ever talks to these traits; which
//! implementation backs them is chosen at startup by [`create_adc_driver`]
//! and [`create_gpio_driver`] based on configuration, the same
//! trait-plus-factory shape the thermal regulation subsystem uses for its
//! I2C bus.

mod adc_mock;
mod adc_native;
mod gpio_mock;
mod gpio_native;

pub use adc_mock::MockAdcDriver;
pub use adc_native::NativeAdcDriver;
pub use gpio_mock::MockGpioDriver;
pub use gpio_native::NativeGpioDriver;

use anyhow::Result;

/// A 24-bit delta-sigma ADC exposing a multiplexed channel sequence.
///
/// `mux_seq` entries are pre-encoded mux codes, `(positive_mux << 4) |
/// negative_mux`. A call fully scans the sequence in order, writing one raw
/// signed code per entry into `dest` (which must be at least `mux_seq.len()`
/// long).
pub trait AdcDriver: Send {
    /// Program `mux_seq` and perform the first full scan, one conversion per
    /// entry, into `dest`.
    fn read_sequence(&mut self, mux_seq: &[u8], dest: &mut [i32]) -> Result<()>;

    /// Re-scan the previously programmed sequence into `dest`.
    fn read_continue(&mut self, mux_seq: &[u8], dest: &mut [i32]) -> Result<()>;

    /// Run the ADC's self-calibration routine.
    fn cal_self(&mut self) -> Result<()>;

    /// Release any underlying resources.
    fn stop(&mut self) -> Result<()>;
}

/// A GPIO line configured as a pulled-up input with a falling-edge
/// callback, used for pulse-timing flow sensors.
pub trait GpioDriver: Send {
    /// Configure `pin` as an input with an internal pull-up and register a
    /// callback invoked on every falling edge with the driver's
    /// free-running microsecond tick at the moment of the edge.
    fn watch_falling_edge(&mut self, pin: u8, callback: Box<dyn Fn(u32) + Send + Sync>)
        -> Result<()>;

    /// The driver's free-running microsecond tick, independent of any edge.
    fn get_current_tick(&self) -> u32;

    /// Stop watching `pin` and release its callback.
    fn cancel(&mut self, pin: u8) -> Result<()>;
}

/// Which concrete driver to construct, named by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    Mock,
    Native,
}

impl Default for DriverKind {
    fn default() -> Self {
        DriverKind::Mock
    }
}

/// Construct the configured ADC driver implementation.
pub fn create_adc_driver(kind: DriverKind, spi_device: &str) -> Result<Box<dyn AdcDriver>> {
    match kind {
        DriverKind::Mock => Ok(Box::new(MockAdcDriver::new())),
        DriverKind::Native => Ok(Box::new(NativeAdcDriver::new(spi_device)?)),
    }
}

/// Construct the configured GPIO driver implementation.
pub fn create_gpio_driver(kind: DriverKind) -> Result<Box<dyn GpioDriver>> {
    match kind {
        DriverKind::Mock => Ok(Box::new(MockGpioDriver::new())),
        DriverKind::Native => Ok(Box::new(NativeGpioDriver::new()?)),
    }
}
