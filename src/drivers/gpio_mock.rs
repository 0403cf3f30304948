//! In-process mock GPIO driver. Tests drive edges directly with
//! [`MockGpioDriver::fire_edge`] instead of waiting on real hardware.

use std::collections::HashMap;

use anyhow::Result;

use crate::drivers::GpioDriver;

type Callback = Box<dyn Fn(u32) + Send + Sync>;

pub struct MockGpioDriver {
    callbacks: HashMap<u8, Callback>,
    tick: u32,
}

impl MockGpioDriver {
    pub fn new() -> Self {
        Self {
            callbacks: HashMap::new(),
            tick: 0,
        }
    }

    /// Simulate a falling edge on `pin` at the driver's current tick,
    /// invoking the registered callback if any, then advance the tick.
    pub fn fire_edge(&mut self, pin: u8) {
        if let Some(cb) = self.callbacks.get(&pin) {
            cb(self.tick);
        }
        self.tick = self.tick.wrapping_add(1);
    }

    /// Advance the free-running tick without firing an edge, e.g. to
    /// simulate elapsed time between edges.
    pub fn advance_tick(&mut self, delta_us: u32) {
        self.tick = self.tick.wrapping_add(delta_us);
    }
}

impl Default for MockGpioDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioDriver for MockGpioDriver {
    fn watch_falling_edge(&mut self, pin: u8, callback: Callback) -> Result<()> {
        self.callbacks.insert(pin, callback);
        Ok(())
    }

    fn get_current_tick(&self) -> u32 {
        self.tick
    }

    fn cancel(&mut self, pin: u8) -> Result<()> {
        self.callbacks.remove(&pin);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn fires_registered_callback_with_current_tick() {
        let mut gpio = MockGpioDriver::new();
        let last_tick = Arc::new(AtomicU32::new(u32::MAX));
        let captured = last_tick.clone();
        gpio.watch_falling_edge(
            4,
            Box::new(move |tick| captured.store(tick, Ordering::SeqCst)),
        )
        .unwrap();
        gpio.fire_edge(4);
        assert_eq!(last_tick.load(Ordering::SeqCst), 0);
        gpio.fire_edge(4);
        assert_eq!(last_tick.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_stops_delivering_edges() {
        let mut gpio = MockGpioDriver::new();
        let count = Arc::new(AtomicU32::new(0));
        let captured = count.clone();
        gpio.watch_falling_edge(4, Box::new(move |_| {
            captured.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        gpio.fire_edge(4);
        gpio.cancel(4).unwrap();
        gpio.fire_edge(4);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
