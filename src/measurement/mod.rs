//! Per-channel measurement computation: bridge-to-temperature conversion,
//! flow-to-power conversion, and the two-point calibration state machine.

pub mod calibrator;
pub mod channel;
pub mod fluid;

pub use calibrator::{apply_measurement, CalValueKey, CalibrationRequest, Calibrator};
pub use channel::{measure_wheatstone_factor, MeasurementChannel, ADC_FULL_SCALE_CODE};
