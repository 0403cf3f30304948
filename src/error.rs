//! Error taxonomy for the calorimetry core.
//!
//! Every fallible operation in the measurement pipeline returns one of these
//! variants, wrapped in [`anyhow::Error`] at call sites that don't need to
//! match on the specific kind. Only [`PicalorError::Fatal`] is expected to
//! terminate the worker thread; everything else is logged and the tick
//! continues.

use thiserror::Error;

/// The error kinds a running daemon can surface to its caller or frontend.
#[derive(Debug, Error)]
pub enum PicalorError {
    /// A configuration document failed validation before being applied.
    #[error("configuration validation failed: {0}")]
    ConfigValidation(String),

    /// An ADC, GPIO or other hardware driver call failed.
    #[error("driver failure: {0}")]
    DriverFailure(String),

    /// A computation produced a non-finite value or divided by zero.
    ///
    /// Not fatal: the affected field is reported as `null`/`NaN` and
    /// measurement continues on the next tick.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// A bounded wait (flow sensor settle, calibration handoff, MQTT
    /// connect) elapsed without the expected signal.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// The frontend transport failed to publish or connect.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// An unrecoverable condition; the worker thread should stop.
    #[error("fatal error: {0}")]
    Fatal(String),
}
