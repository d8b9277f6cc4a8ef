//! Term-count estimators.
//!
//! Each estimator returns how many terms of its series must be evaluated so
//! that the truncation error of the standard density `f(u | w)` stays below
//! `exp(ln_err)`. Arguments are the standardized decision time `u = t / a²`,
//! the relative starting point `w`, and the tolerance on the natural-log
//! scale (the caller's tolerance is rescaled by the density prefactor, which
//! can over- or underflow in the linear domain).
//!
//! Counts are total numbers of series terms, so small-time and large-time
//! counts are directly comparable as evaluation cost.

use crate::constants::{LN_2, LN_PI, LN_SQRT_2PI, MAX_TERMS, PI_SQ};
use crate::math::ceil_terms;

/// Term-count estimator signature: `(u, w, ln_err) -> terms`.
pub type NumFn = fn(f64, f64, f64) -> usize;

/// `ln(2·sqrt(2πu)·ε)`: both small-time bounds switch on its sign.
#[inline]
fn ln_small_arg(u: f64, ln_err: f64) -> f64 {
    LN_2 + LN_SQRT_2PI + 0.5 * u.ln() + ln_err
}

/// Small-time count, Gondan-style pair bound.
///
/// The truncated series keeps the central term and `K` symmetric pairs. Past
/// `2K - w >= sqrt(u)` the terms decrease, and the omitted tail is bounded by
/// `exp(-(2K - w)² / (2u)) / (2·sqrt(2πu))`; `K` is the smallest pair count
/// meeting both conditions. Returned as the span `2K + 1`.
pub fn ks_gondan(u: f64, w: f64, ln_err: f64) -> usize {
    let k_mono = 0.5 * (u.sqrt() + w);
    let ln_arg = ln_small_arg(u, ln_err);
    let k = if ln_arg < 0.0 { k_mono.max(0.5 * (w + (-2.0 * u * ln_arg).sqrt())) } else { k_mono };

    let pairs = ceil_terms(k);
    if pairs >= MAX_TERMS / 2 { MAX_TERMS } else { 2 * pairs + 1 }
}

/// Small-time count, Navarro & Fuss (2009) bound.
///
/// Independent of `w`; the span it describes is
/// `k ∈ [-⌊(n-1)/2⌋, ⌈(n-1)/2⌉]` of the symmetric series.
pub fn ks_navarro(u: f64, _w: f64, ln_err: f64) -> usize {
    let ln_arg = ln_small_arg(u, ln_err);
    let k = if ln_arg < 0.0 { 2.0 + (-2.0 * u * ln_arg).sqrt() } else { 2.0 };
    ceil_terms(k.max(u.sqrt() + 1.0))
}

/// Large-time count, Navarro & Fuss (2009) bound.
///
/// Shrinks as `u` grows, the opposite trend to the small-time counts.
pub fn kl_navarro(u: f64, _w: f64, ln_err: f64) -> usize {
    let k_min = 1.0 / (std::f64::consts::PI * u.sqrt());
    let ln_arg = LN_PI + u.ln() + ln_err;
    let k = if ln_arg < 0.0 { (-2.0 * ln_arg / (PI_SQ * u)).sqrt().max(k_min) } else { k_min };
    ceil_terms(k)
}
