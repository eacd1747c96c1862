//! Guards for weights and scores.
//!
//! Every intermediate that is stored or compared goes through one of these
//! helpers first; NaN and infinities are replaced by an explicit default.

pub const MIN_RELATION_WEIGHT: f64 = 0.1;
pub const MAX_RELATION_WEIGHT: f64 = 1.0;

/// Returns `value` when finite, `default` otherwise.
pub fn safe_number(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

/// Division that yields `default` for a zero/non-finite denominator or result.
pub fn safe_div(numerator: f64, denominator: f64, default: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        return default;
    }
    safe_number(numerator / denominator, default)
}

/// Natural log guarded against non-positive input.
pub fn safe_ln(value: f64) -> f64 {
    if value > 0.0 {
        safe_number(value.ln(), 0.0)
    } else {
        0.0
    }
}

pub fn safe_sqrt(value: f64) -> f64 {
    if value > 0.0 {
        safe_number(value.sqrt(), 0.0)
    } else {
        0.0
    }
}

/// Clamp into the relation weight range `[0.1, 1.0]`.
pub fn clamp_relation_weight(weight: f64) -> f64 {
    safe_number(weight, MIN_RELATION_WEIGHT).clamp(MIN_RELATION_WEIGHT, MAX_RELATION_WEIGHT)
}

pub fn clamp_unit(value: f64) -> f64 {
    safe_number(value, 0.0).clamp(0.0, 1.0)
}

/// Round to the given number of decimals, for presentation only.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    safe_number((value * factor).round() / factor, 0.0)
}
