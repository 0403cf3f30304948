//! Thermal power computation from a flow rate and temperature difference.
//!
//! Fluid properties are temperature-dependent (see
//! [`crate::config::fluids::PropertyModel`]), so converting a volumetric
//! flow rate to a mass flow rate and then to a power figure are two
//! separate steps rather than one fixed formula.

/// Convert a volumetric flow rate to a mass flow rate.
///
/// `flow_liter_sec` is in liters/second, `density_kg_per_m3` in kg/m^3;
/// `1 L = 0.001 m^3` so the result is in kg/s.
pub fn flow_kg_per_sec(flow_liter_sec: f64, density_kg_per_m3: f64) -> f64 {
    flow_liter_sec * density_kg_per_m3 * 0.001
}

/// Thermal power, in watts, carried by a mass flow `flow_kg_sec` with
/// specific heat `specific_heat_j_per_kg_k` across a temperature difference
/// `delta_t_c`, scaled by `power_gain` and offset by `power_offset`.
///
/// `P = power_gain * flow_kg_sec * c_p * dT - power_offset`.
pub fn thermal_power_watts(
    power_gain: f64,
    power_offset: f64,
    flow_kg_sec: f64,
    specific_heat_j_per_kg_k: f64,
    delta_t_c: f64,
) -> f64 {
    power_gain * flow_kg_sec * specific_heat_j_per_kg_k * delta_t_c - power_offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn flow_conversion_matches_scenario_numbers() {
        // 1.0 L/s of water (1000 kg/m^3) is 1.0 kg/s.
        assert_relative_eq!(flow_kg_per_sec(1.0, 1000.0), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn power_matches_reference_scenario() {
        let flow = flow_kg_per_sec(1.0, 1000.0);
        let p = thermal_power_watts(1.0, 0.0, flow, 4184.0, 10.0);
        assert_relative_eq!(p, 41_840.0, epsilon = 41.84);
    }

    #[test]
    fn power_offset_is_subtracted_after_gain() {
        let flow = flow_kg_per_sec(1.0, 1000.0);
        let p = thermal_power_watts(1.0, 100.0, flow, 4184.0, 10.0);
        assert_relative_eq!(p, 41_740.0, epsilon = 41.84);
    }

    #[test]
    fn power_gain_scales_linearly() {
        let flow = flow_kg_per_sec(1.0, 1000.0);
        let p = thermal_power_watts(2.0, 0.0, flow, 4184.0, 10.0);
        assert_relative_eq!(p, 83_680.0, epsilon = 83.68);
    }

    #[test]
    fn zero_flow_gives_zero_power_before_offset() {
        assert_relative_eq!(
            thermal_power_watts(1.0, 0.0, 0.0, 4184.0, 25.0),
            0.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn negative_delta_gives_negative_power() {
        let flow = flow_kg_per_sec(1.0, 1000.0);
        assert!(thermal_power_watts(1.0, 0.0, flow, 4184.0, -5.0) < 0.0);
    }
}
