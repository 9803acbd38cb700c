//! Decimal precision policy for geometry serialization.
//!
//! The number of decimals written per coordinate depends on the unit of the
//! first axis of the target CRS.

use crate::Crs;

/// For degrees: 11.132 mm at the equator, finer elsewhere.
pub const NUM_DECIMAL_PLACES_DEGREE: u32 = 7;

/// For metric (or other linear) units: 10 mm.
pub const NUM_DECIMAL_PLACES_OTHER: u32 = 2;

/// Maximum number of decimal places to emit for coordinates in `crs`.
pub fn decimals_for(crs: &Crs) -> u32 {
    if crs.first_axis_unit().is_angular() {
        NUM_DECIMAL_PLACES_DEGREE
    } else {
        NUM_DECIMAL_PLACES_OTHER
    }
}

/// Round `value` to at most `decimals` decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    // Very large magnitudes overflow the scaled value; keep them untouched.
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}
