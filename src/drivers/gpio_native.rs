//! Native GPIO driver for the Raspberry Pi-class single-board computer.
//!
//! Out of scope for this crate: real GPIO access requires a running
//! pigpio-style daemon or direct /dev/gpiochip access, neither of which is
//! implemented here.

use anyhow::{anyhow, Result};

use crate::drivers::GpioDriver;

pub struct NativeGpioDriver;

impl NativeGpioDriver {
    pub fn new() -> Result<Self> {
        // TODO: connect to the system GPIO interface here.
        Ok(Self)
    }
}

impl GpioDriver for NativeGpioDriver {
    fn watch_falling_edge(
        &mut self,
        _pin: u8,
        _callback: Box<dyn Fn(u32) + Send + Sync>,
    ) -> Result<()> {
        Err(anyhow!("native GPIO driver not yet implemented"))
    }

    fn get_current_tick(&self) -> u32 {
        0
    }

    fn cancel(&mut self, _pin: u8) -> Result<()> {
        Err(anyhow!("native GPIO driver not yet implemented"))
    }
}
