//! Bridge math and Pt1000 RTD temperature conversion.
//!
//! These are pure functions: no I/O, no shared state, safe to call from any
//! thread. They implement the ITS-90 inverse-Callendar-Van Dusen equation for
//! Pt1000 platinum resistance sensors and the deflection-Wheatstone-bridge
//! arithmetic used to turn a raw ADC reading into a leg resistance.
//!
//! Division by zero in [`wheatstone`] or [`wheatstone_factor`] is not
//! reported as an error: it is an arithmetic failure, surfaced as `NaN` and
//! left for the caller to propagate into the results document.

/// Callendar-Van Dusen coefficient A, per IEC 60751 / ITS-90.
pub const PT_A: f64 = 3.9083e-3;
/// Callendar-Van Dusen coefficient B, per IEC 60751 / ITS-90.
pub const PT_B: f64 = -5.775e-7;

/// Nominal resistance of a Pt1000 element at 0 degC, in ohms.
pub const PT_R0: f64 = 1000.0;

/// Polynomial correction coefficients for the sub-zero branch, highest
/// degree first, evaluated at the resistance ratio `r_x/r_0` and added to
/// the quadratic inverse's result.
const NEGATIVE_CORRECTION: [f64; 6] = [
    1.51892983,
    -2.85842067,
    -5.34227299,
    18.0282972,
    -16.1875985,
    4.84112370,
];

/// Convert a measured Pt1000 resistance `r_x` (ohms), referenced to its
/// nominal 0 degC resistance `r_0`, to a temperature in degrees Celsius.
///
/// The branch is selected strictly by the ratio `r_x/r_0`: at or above 1
/// (0 degC and above) the bare quadratic inverse of the Callendar-Van Dusen
/// equation is used directly; below 1 the same quadratic is refined with
/// [`NEGATIVE_CORRECTION`], evaluated at the ratio via Horner's method.
///
/// Returns `NaN` if `r_x`/`r_0` are non-finite, non-positive, or no real
/// solution exists.
pub fn pt_rtd_temperature(r_x: f64, r_0: f64) -> f64 {
    if !r_x.is_finite() || r_x <= 0.0 || !r_0.is_finite() || r_0 <= 0.0 {
        return f64::NAN;
    }

    let ratio = r_x / r_0;
    let discriminant = PT_A * PT_A - 4.0 * PT_B * (1.0 - ratio);
    if discriminant < 0.0 {
        return f64::NAN;
    }
    let theta = (-PT_A + discriminant.sqrt()) / (2.0 * PT_B);

    if ratio < 1.0 {
        theta + negative_branch_correction(ratio)
    } else {
        theta
    }
}

/// Evaluate the degree-5 `NEGATIVE_CORRECTION` polynomial at `ratio` via
/// Horner's method, matching `numpy.poly1d`'s highest-degree-first
/// convention.
fn negative_branch_correction(ratio: f64) -> f64 {
    NEGATIVE_CORRECTION
        .iter()
        .fold(0.0, |acc, &c| acc * ratio + c)
}

/// Solve a deflection Wheatstone bridge for the unknown leg resistance
/// `rs1`: given the bridge's differential output `ud`, excitation `u0`, and
/// reference ratio `nref = rs0/r0`,
///
/// `rs1 * (u0 + ud) / (u0*nref - ud)`.
///
/// Returns `NaN` if `u0*nref - ud` is zero.
pub fn wheatstone(ud: f64, u0: f64, nref: f64, rs1: f64) -> f64 {
    let denom = u0 * nref - ud;
    if denom == 0.0 {
        return f64::NAN;
    }
    rs1 * (u0 + ud) / denom
}

/// The dimensionless Wheatstone factor `(u0 + ud) / (u0*nref - ud)` that
/// [`wheatstone`] scales by `rs1`; used directly during two-point
/// calibration, before a leg's sensitivity resistance is known.
///
/// Returns `NaN` if `u0*nref - ud` is zero.
pub fn wheatstone_factor(ud: f64, u0: f64, nref: f64) -> f64 {
    let denom = u0 * nref - ud;
    if denom == 0.0 {
        return f64::NAN;
    }
    (u0 + ud) / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pt_rtd_zero_degrees_is_nominal_resistance() {
        let t = pt_rtd_temperature(PT_R0, PT_R0);
        assert_relative_eq!(t, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn pt_rtd_reference_value_at_1100_ohms() {
        let t = pt_rtd_temperature(1100.0, PT_R0);
        assert_relative_eq!(t, 25.6855, epsilon = 1e-3);
    }

    #[test]
    fn pt_rtd_sub_zero_uses_correction_polynomial() {
        // r_x/r_0 < 1 exercises the correction branch; just below the
        // quadratic's own zero-crossing, the ratio-keyed correction should
        // pull the result away from the bare quadratic.
        let r_x = 900.0;
        let bare_quadratic = {
            let ratio = r_x / PT_R0;
            let discriminant = PT_A * PT_A - 4.0 * PT_B * (1.0 - ratio);
            (-PT_A + discriminant.sqrt()) / (2.0 * PT_B)
        };
        let corrected = pt_rtd_temperature(r_x, PT_R0);
        assert!((corrected - bare_quadratic).abs() > 1e-6);
    }

    #[test]
    fn pt_rtd_rejects_non_positive_resistance() {
        assert!(pt_rtd_temperature(0.0, PT_R0).is_nan());
        assert!(pt_rtd_temperature(-10.0, PT_R0).is_nan());
        assert!(pt_rtd_temperature(f64::NAN, PT_R0).is_nan());
    }

    #[test]
    fn wheatstone_identity_holds_exactly() {
        // wheatstone(ud,u0,nref,rs1) * (u0*nref - ud) == rs1 * (u0 + ud)
        for (ud, u0, nref, rs1) in [
            (0.1, 1.0, 5.0, 2000.0),
            (-0.05, 2.5, 4.0, 500.0),
            (0.0, 1.0, 10.0, 10_000.0),
        ] {
            let r = wheatstone(ud, u0, nref, rs1);
            assert_relative_eq!(r * (u0 * nref - ud), rs1 * (u0 + ud), epsilon = 1e-9);
        }
    }

    #[test]
    fn wheatstone_factor_matches_wheatstone_divided_by_rs1() {
        let (ud, u0, nref, rs1) = (0.2, 1.0, 10.0, 10_000.0);
        let factor = wheatstone_factor(ud, u0, nref);
        let resistance = wheatstone(ud, u0, nref, rs1);
        assert_relative_eq!(resistance, rs1 * factor, epsilon = 1e-9);
    }

    #[test]
    fn wheatstone_degenerate_bridge_is_nan() {
        // u0*nref - ud == 0
        assert!(wheatstone(10.0, 1.0, 10.0, 1000.0).is_nan());
        assert!(wheatstone_factor(10.0, 1.0, 10.0).is_nan());
    }

    #[test]
    fn calibration_scenario_recovers_expected_factors() {
        // cal_r_a=1000 @ wh_a=0.1, cal_r_b=1100 @ wh_b=0.11 solves to
        // r_s=10000, r_offset=0; sanity-check the factors feed that solve.
        let r_s = 10_000.0;
        let r_offset = 0.0;
        assert_relative_eq!(0.1 * r_s - r_offset, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(0.11 * r_s - r_offset, 1100.0, epsilon = 1e-9);
    }
}
