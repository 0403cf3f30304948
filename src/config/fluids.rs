//! Fluid property definitions referenced by measurement channels.
//!
//! Density and specific heat are temperature-dependent: each is a
//! [`PropertyModel`], evaluated at whatever temperature the channel pipeline
//! measured for that quantity (flow temperature for density, the up/down
//! average for specific heat) rather than a fixed scalar.

use serde::{Deserialize, Serialize};

/// A scalar thermophysical property as a function of temperature in degrees
/// Celsius.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyModel {
    /// A rational function `num(t) / denom(t)`, each a polynomial with
    /// coefficients ordered highest-degree first.
    Polynomial { num: Vec<f64>, denom: Vec<f64> },
    /// Piecewise-linear interpolation over `(t_ref[i], values[i])` pairs,
    /// `t_ref` ascending. Clamped to the first/last value outside the table.
    Interp { t_ref: Vec<f64>, values: Vec<f64> },
}

impl PropertyModel {
    /// A model that is constant at every temperature.
    pub fn constant(value: f64) -> Self {
        PropertyModel::Polynomial {
            num: vec![value],
            denom: vec![1.0],
        }
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        match self {
            PropertyModel::Polynomial { num, denom } => horner(num, t) / horner(denom, t),
            PropertyModel::Interp { t_ref, values } => interp_linear(t_ref, values, t),
        }
    }

    fn validate(&self, label: &str) -> Result<(), String> {
        match self {
            PropertyModel::Polynomial { num, denom } => {
                if num.is_empty() || denom.is_empty() {
                    return Err(format!(
                        "{label} polynomial must have at least one coefficient in both num and denom"
                    ));
                }
                Ok(())
            }
            PropertyModel::Interp { t_ref, values } => {
                if t_ref.is_empty() || t_ref.len() != values.len() {
                    return Err(format!(
                        "{label} interpolation table must be non-empty with matching t_ref/values lengths"
                    ));
                }
                if !t_ref.windows(2).all(|w| w[0] < w[1]) {
                    return Err(format!("{label} interpolation table t_ref must be strictly ascending"));
                }
                Ok(())
            }
        }
    }
}

fn horner(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().fold(0.0, |acc, &c| acc * x + c)
}

fn interp_linear(t_ref: &[f64], values: &[f64], t: f64) -> f64 {
    if t_ref.is_empty() {
        return f64::NAN;
    }
    if t <= t_ref[0] {
        return values[0];
    }
    let last = t_ref.len() - 1;
    if t >= t_ref[last] {
        return values[last];
    }
    for i in 1..t_ref.len() {
        if t <= t_ref[i] {
            let span = t_ref[i] - t_ref[i - 1];
            let frac = (t - t_ref[i - 1]) / span;
            return values[i - 1] + frac * (values[i] - values[i - 1]);
        }
    }
    values[last]
}

/// Thermophysical properties of a working fluid.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FluidConfig {
    /// Density in kg/m^3, as a function of flow temperature.
    pub density: PropertyModel,
    /// Specific heat capacity in J/(kg*K), as a function of the up/down
    /// average temperature.
    pub specific_heat: PropertyModel,
}

impl FluidConfig {
    pub fn validate(&self, name: &str) -> Result<(), String> {
        if name.trim().is_empty() {
            return Err("fluid name must not be empty".into());
        }
        self.density.validate(&format!("fluid '{name}' density"))?;
        self.specific_heat
            .validate(&format!("fluid '{name}' specific_heat"))?;
        Ok(())
    }
}

/// Water at approximately room temperature, the default fluid for a
/// freshly-created channel. Modeled as constant across the operating range;
/// a calibrated deployment would replace this with a fitted polynomial.
pub fn default_water() -> FluidConfig {
    FluidConfig {
        density: PropertyModel::constant(1000.0),
        specific_heat: PropertyModel::constant(4184.0),
    }
}
