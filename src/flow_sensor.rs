//! Mass flow sensing: either a pulse-timing sensor fed by a GPIO falling-edge
//! callback, or a fixed flow rate configured by the operator.
//!
//! The pulse variant keeps its running state behind a [`spin::Mutex`]
//! instead of `std::sync::Mutex`: the critical section is a handful of
//! integer writes touched from a hardware callback context where blocking
//! is undesirable, the same tradeoff the stabilizer firmware in this pack
//! makes for its ADC sample buffer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use spin::Mutex as SpinMutex;

/// Minimum averaging window, in microseconds, before a pulse rate is
/// considered stable enough to report.
pub const MIN_AVG_PERIOD_US: u64 = 200_000;

#[derive(Debug, Clone, Copy)]
struct PulseState {
    /// Tick (microseconds, free-running 32-bit) of the first edge in the
    /// current averaging window.
    window_start_tick: u32,
    /// Tick of the most recent edge.
    last_tick: u32,
    /// Edges observed since `window_start_tick`. Initialized to -1 so the
    /// first edge only opens the window instead of being counted as a full
    /// period, avoiding a half-period bias on startup.
    n_cycles: i64,
}

impl PulseState {
    fn new() -> Self {
        Self {
            window_start_tick: 0,
            last_tick: 0,
            n_cycles: -1,
        }
    }
}

/// A pulse-per-volume flow sensor driven by GPIO falling edges.
pub struct PulseFlowSensor {
    state: SpinMutex<PulseState>,
    /// Volume, in liters, represented by one pulse.
    liters_per_pulse: f64,
    last_edge_wall_clock: SpinMutex<Option<Instant>>,
    /// How long with no edges before the rate is reported as unknown.
    timeout: Duration,
}

impl PulseFlowSensor {
    pub fn new(liters_per_pulse: f64, timeout: Duration) -> Self {
        Self {
            state: SpinMutex::new(PulseState::new()),
            liters_per_pulse,
            last_edge_wall_clock: SpinMutex::new(None),
            timeout,
        }
    }

    /// GPIO falling-edge callback. `tick` is the driver's free-running
    /// 32-bit microsecond counter, which wraps every ~71 minutes; all
    /// arithmetic here is performed with wrapping unsigned subtraction so a
    /// wraparound mid-window doesn't corrupt the elapsed-time computation.
    pub fn on_edge(&self, tick: u32) {
        let mut st = self.state.lock();
        if st.n_cycles < 0 {
            st.window_start_tick = tick;
            st.n_cycles = 0;
        } else {
            st.n_cycles += 1;
        }
        st.last_tick = tick;
        drop(st);
        *self.last_edge_wall_clock.lock() = Some(Instant::now());
    }

    /// Average flow rate in liters/second since the window opened, or
    /// `None` if fewer than `MIN_AVG_PERIOD_US` have elapsed, or `NaN` if no
    /// edge has arrived within `timeout`.
    pub fn rate_liters_per_second(&self) -> Option<f64> {
        let last_edge = *self.last_edge_wall_clock.lock();
        if let Some(t) = last_edge {
            if t.elapsed() > self.timeout {
                return Some(f64::NAN);
            }
        }

        let st = *self.state.lock();
        if st.n_cycles <= 0 {
            return None;
        }
        let elapsed_us = st.last_tick.wrapping_sub(st.window_start_tick) as u64;
        if elapsed_us < MIN_AVG_PERIOD_US {
            return None;
        }
        let elapsed_s = elapsed_us as f64 / 1_000_000.0;
        let pulses_per_s = st.n_cycles as f64 / elapsed_s;
        Some(pulses_per_s * self.liters_per_pulse)
    }

    /// Reset the averaging window, e.g. after a reconfiguration.
    pub fn reset(&self) {
        *self.state.lock() = PulseState::new();
        *self.last_edge_wall_clock.lock() = None;
    }
}

/// A flow sensor reporting a fixed, operator-configured rate: no hardware
/// behind it, used for channels with a constant or externally-metered flow.
pub struct FixedFlowSensor {
    liters_per_second: f64,
}

impl FixedFlowSensor {
    pub fn new(liters_per_second: f64) -> Self {
        Self { liters_per_second }
    }

    pub fn rate_liters_per_second(&self) -> f64 {
        self.liters_per_second
    }
}

/// Either flow sensing strategy a measurement channel can be configured
/// with. The pulse variant is held behind an [`Arc`] so the same instance
/// can be shared with the GPIO driver's edge callback.
pub enum FlowSensor {
    Pulse(Arc<PulseFlowSensor>),
    Fixed(FixedFlowSensor),
}

impl FlowSensor {
    /// Current rate in liters/second, or `NaN` if a pulse sensor has timed
    /// out, or `None` if a pulse sensor's window hasn't filled yet.
    pub fn rate_liters_per_second(&self) -> Option<f64> {
        match self {
            FlowSensor::Pulse(p) => p.rate_liters_per_second(),
            FlowSensor::Fixed(f) => Some(f.rate_liters_per_second()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_sensor_reports_none_before_window_fills() {
        let s = PulseFlowSensor::new(0.001, Duration::from_secs(5));
        s.on_edge(0);
        s.on_edge(1_000);
        assert_eq!(s.rate_liters_per_second(), None);
    }

    #[test]
    fn pulse_sensor_reports_rate_once_window_elapses() {
        let s = PulseFlowSensor::new(0.001, Duration::from_secs(5));
        // 100 edges spread over 1 second (1_000_000us) = 100 pulses/s
        s.on_edge(0);
        for i in 1..=100u32 {
            s.on_edge(i * 10_000);
        }
        let rate = s.rate_liters_per_second().expect("window should have filled");
        assert!((rate - 0.1).abs() < 1e-6, "unexpected rate {rate}");
    }

    #[test]
    fn pulse_sensor_handles_tick_wraparound() {
        let s = PulseFlowSensor::new(0.001, Duration::from_secs(5));
        let near_wrap = u32::MAX - 50_000;
        s.on_edge(near_wrap);
        for i in 1..=10u32 {
            s.on_edge(near_wrap.wrapping_add(i * 30_000));
        }
        // total elapsed = 300_000us, which exceeds MIN_AVG_PERIOD_US
        let rate = s.rate_liters_per_second();
        assert!(rate.is_some());
        assert!(rate.unwrap() > 0.0);
    }

    #[test]
    fn fixed_flow_sensor_returns_configured_rate() {
        let f = FixedFlowSensor::new(0.25);
        assert_eq!(f.rate_liters_per_second(), 0.25);
    }

    #[test]
    fn reset_clears_the_averaging_window() {
        let s = PulseFlowSensor::new(0.001, Duration::from_secs(5));
        s.on_edge(0);
        s.on_edge(500_000);
        s.reset();
        assert_eq!(s.rate_liters_per_second(), None);
    }
}
