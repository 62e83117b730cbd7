//! Exponential response function.
//!
//! Step response:
//!
//! - `s(t) = A (1 - exp(-t/a))`
//!
//! and the block response sampled at step `dt`:
//!
//! - `b_k = s((k + 1) dt) - s(k dt)`
//!
//! Numerical notes:
//! - `1 - exp(-x)` is computed as `-expm1(-x)` to avoid cancellation for small `x`.
//! - The block is truncated once the step response reaches `CUTOFF` of its
//!   final value `A`.

/// Fraction of the final step value at which the block response is truncated.
pub const CUTOFF: f64 = 0.999;

/// Hard cap on block length (in steps).
const MAX_BLOCK_LEN: usize = 100_000;

/// Compute the step response `A (1 - exp(-t/a))`.
pub fn step(gain: f64, scale: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    let x = t / scale;
    -gain * (-x).exp_m1()
}

/// Time (days) after which the step response exceeds `CUTOFF · A`.
pub fn cutoff_time(scale: f64) -> f64 {
    -scale * (1.0 - CUTOFF).ln()
}

/// Block response at step `dt` days.
///
/// Returns an empty vector if `scale` or `dt` are not positive and finite;
/// callers treat that as a degenerate parameter set.
pub fn block(gain: f64, scale: f64, dt: f64) -> Vec<f64> {
    if !(scale.is_finite() && scale > 0.0 && dt.is_finite() && dt > 0.0) {
        return Vec::new();
    }
    let n = ((cutoff_time(scale) / dt).ceil() as usize).clamp(1, MAX_BLOCK_LEN);
    let mut out = Vec::with_capacity(n);
    let mut prev = 0.0;
    for k in 1..=n {
        let s = step(gain, scale, k as f64 * dt);
        out.push(s - prev);
        prev = s;
    }
    out
}
