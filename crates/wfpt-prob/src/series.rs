//! Truncated series for the standard first-passage density `f(u | w)`.
//!
//! `f(u | w)` is the lower-boundary density of a unit Wiener process with no
//! drift, boundary separation 1 and relative start `w`, at standardized time
//! `u`. Two expansions are available:
//!
//! - small-time: `(2πu³)^{-1/2} Σ_{k∈ℤ} (w + 2k) exp(-(w + 2k)² / (2u))`,
//!   which re-indexes into the alternating series
//!   `Σ_{j≥0} (-1)^j r_j exp(-r_j² / (2u))` with `r_j = j + w` for even `j`
//!   and `r_j = j + 1 - w` for odd `j` (`r_j` strictly increasing);
//! - large-time: `π Σ_{k≥1} k exp(-k²π²u / 2) sin(kπw)`.
//!
//! Kernels return a [`Series`] holding `sum · exp(log_scale)`: terms are
//! scaled by the largest term magnitude before summation, so nothing
//! overflows and the log-domain assemblers keep full precision when the
//! density underflows in the linear domain.

use std::f64::consts::PI;

use crate::constants::{EXP_UNDERFLOW, LN_PI, LN_SQRT_2PI, PI_SQ};
use crate::math::CompensatedSum;

/// Summation kernel signature: `(u, w, terms, ln_err) -> Series`.
pub type SumFn = fn(f64, f64, usize, f64) -> Series;

/// A series value represented as `sum · exp(log_scale)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Series {
    /// Log of the common factor pulled out of every term.
    pub log_scale: f64,
    /// Sum of the scaled terms.
    pub sum: f64,
}

impl Series {
    /// The empty series.
    pub const ZERO: Series = Series { log_scale: 0.0, sum: 0.0 };

    /// Linear value.
    pub fn value(self) -> f64 {
        self.scaled_value(0.0)
    }

    /// Natural log of the value (`-∞` for a non-positive sum).
    pub fn ln(self) -> f64 {
        self.scaled_ln(0.0)
    }

    /// Linear value multiplied by `exp(ln_factor)`.
    ///
    /// A truncated sum that is not positive carries no usable density and
    /// maps to zero.
    pub fn scaled_value(self, ln_factor: f64) -> f64 {
        if !(self.sum > 0.0) {
            return 0.0;
        }
        let x = self.sum * (self.log_scale + ln_factor).exp();
        if x.is_nan() { 0.0 } else { x }
    }

    /// `ln(value) + ln_factor`, computed without leaving the log domain.
    pub fn scaled_ln(self, ln_factor: f64) -> f64 {
        if !(self.sum > 0.0) {
            return f64::NEG_INFINITY;
        }
        let x = self.log_scale + ln_factor + self.sum.ln();
        if x.is_nan() { f64::NEG_INFINITY } else { x }
    }
}

#[inline]
fn in_domain(u: f64) -> bool {
    u > 0.0 && u.is_finite()
}

/// `r_j` of the alternating small-time series.
#[inline]
fn small_r(j: usize, w: f64) -> f64 {
    if j % 2 == 0 { j as f64 + w } else { j as f64 + 1.0 - w }
}

/// `r · exp(-r²/(2u))` divided by `exp(peak)`; only used for `r >= 1`.
#[inline]
fn scaled_term(r: f64, u: f64, peak: f64) -> f64 {
    r * (-r * r / (2.0 * u) - peak).exp()
}

/// Largest `ln(r_j) - r_j²/(2u)` over `j < n`.
///
/// The exponent is unimodal in `r` with its maximum at `r = sqrt(u)`, and
/// `r_j ∈ (j, j + 1)`, so only the central term and the terms bracketing
/// `sqrt(u)` need checking.
fn small_peak(u: f64, w: f64, n: usize) -> f64 {
    let g = |r: f64| r.ln() - r * r / (2.0 * u);
    let mut peak = g(w);
    if n > 1 {
        let s = u.sqrt();
        let j_floor = s.floor() as usize;
        for j in [j_floor.saturating_sub(1), j_floor, s.ceil() as usize] {
            let j = j.min(n - 1);
            if j > 0 {
                peak = peak.max(g(small_r(j, w)));
            }
        }
    }
    peak
}

/// Shared setup of the small-time kernels: `(peak, log_scale, central term)`.
#[inline]
fn small_setup(u: f64, w: f64, n: usize) -> Option<(f64, f64, f64)> {
    if !in_domain(u) {
        return None;
    }
    let peak = small_peak(u, w, n);
    if !peak.is_finite() {
        return None;
    }
    let log_scale = peak - LN_SQRT_2PI - 1.5 * u.ln();
    let central = (w.ln() - w * w / (2.0 * u) - peak).exp();
    Some((peak, log_scale, central))
}

/// Small-time sum, 2017 pair form, precision-tuned.
///
/// Evaluates the central term and at most `(n - 1) / 2` pairs
/// `(2j + w)e^{…} - (2j - w)e^{…}`, head-first with compensated summation.
/// Once the terms are decreasing (`2j - w >= sqrt(u)`) it stops as soon as
/// the next omitted term drops below the tolerance: the remainder is an
/// alternating series with decreasing magnitudes, bounded by its first term.
/// `n = 0` keeps the leading term only.
pub fn small_sum_eps_17(u: f64, w: f64, n: usize, ln_err: f64) -> Series {
    let pairs = n.saturating_sub(1) / 2;
    let Some((peak, log_scale, central)) = small_setup(u, w, 2 * pairs + 1) else {
        return Series::ZERO;
    };
    let thresh = (ln_err - log_scale).exp();
    let sqrt_u = u.sqrt();

    let mut acc = CompensatedSum::new(central);
    for j in 1..=pairs {
        let two_j = 2.0 * j as f64;
        let r_neg = two_j - w;
        let neg = scaled_term(r_neg, u, peak);
        if r_neg >= sqrt_u && neg < thresh {
            break;
        }
        acc.add(scaled_term(two_j + w, u, peak) - neg);
    }
    Series { log_scale, sum: acc.value() }
}

/// Small-time sum, 2014 alternating form, precision-tuned.
///
/// At most `n` terms of the alternating series with the same early exit as
/// [`small_sum_eps_17`]. `n = 0` keeps the leading term only.
pub fn small_sum_eps_14(u: f64, w: f64, n: usize, ln_err: f64) -> Series {
    let n = n.max(1);
    let Some((peak, log_scale, central)) = small_setup(u, w, n) else {
        return Series::ZERO;
    };
    let thresh = (ln_err - log_scale).exp();
    let sqrt_u = u.sqrt();

    let mut acc = CompensatedSum::new(central);
    for j in 1..n {
        let r = small_r(j, w);
        let term = scaled_term(r, u, peak);
        if r >= sqrt_u && term < thresh {
            break;
        }
        acc.add(if j % 2 == 0 { term } else { -term });
    }
    Series { log_scale, sum: acc.value() }
}

/// Small-time sum, 2017 pair form, baseline.
///
/// Exactly the span `k ∈ [-⌊(n-1)/2⌋, ⌈(n-1)/2⌉]` of the symmetric series,
/// pairs combined and summed tail-first. `n = 0` is the empty sum.
pub fn small_sum_2017(u: f64, w: f64, n: usize, _ln_err: f64) -> Series {
    if n == 0 {
        return Series::ZERO;
    }
    let neg_pairs = (n - 1) / 2;
    let pos_pairs = n / 2;
    let Some((peak, log_scale, central)) = small_setup(u, w, 2 * pos_pairs + 1) else {
        return Series::ZERO;
    };

    let mut sum = 0.0;
    if pos_pairs > neg_pairs {
        sum += scaled_term(2.0 * pos_pairs as f64 + w, u, peak);
    }
    for k in (1..=neg_pairs).rev() {
        let two_k = 2.0 * k as f64;
        sum += scaled_term(two_k + w, u, peak) - scaled_term(two_k - w, u, peak);
    }
    sum += central;
    Series { log_scale, sum }
}

/// Small-time sum, 2014 alternating form, baseline.
///
/// Exactly the first `n` alternating terms. Positive and negative parts are
/// accumulated separately, tail-first, and subtracted once. `n = 0` is the
/// empty sum.
pub fn small_sum_2014(u: f64, w: f64, n: usize, _ln_err: f64) -> Series {
    if n == 0 {
        return Series::ZERO;
    }
    let Some((peak, log_scale, central)) = small_setup(u, w, n) else {
        return Series::ZERO;
    };

    let (mut pos, mut neg) = (0.0, 0.0);
    for j in (1..n).rev() {
        let term = scaled_term(small_r(j, w), u, peak);
        if j % 2 == 0 {
            pos += term;
        } else {
            neg += term;
        }
    }
    pos += central;
    Series { log_scale, sum: pos - neg }
}

/// Large-time sum (Navarro & Fuss 2009).
///
/// Terms are scaled by the first exponential `exp(-π²u/2)` and summed
/// tail-first. Trailing terms whose exponential underflows to exactly zero
/// are skipped, which leaves the value and the error bound untouched.
/// `n = 0` is the empty sum.
///
/// Returns `None` when the sum is not resolvable in `f64`: at small `u` the
/// terms cancel, and the rounding floor `(n + 1)·ε·Σ|term|` either exceeds
/// the tolerance or swamps the sum itself. The floor is first checked on the
/// estimate `Σ|term| ≈ 1 / π²u`, so hopeless sums exit before the loop.
pub fn large_sum_resolved(u: f64, w: f64, n: usize, ln_err: f64) -> Option<Series> {
    if n == 0 || !in_domain(u) {
        return Some(Series::ZERO);
    }
    let decay = 0.5 * PI_SQ * u;
    let k_zero = (1.0 + EXP_UNDERFLOW / decay).sqrt();
    let n = if k_zero < n as f64 { (k_zero.ceil() as usize).max(1) } else { n };

    let log_scale = LN_PI - decay;
    let tol = (ln_err - log_scale).exp();
    let rounding = (n as f64 + 1.0) * f64::EPSILON;
    if rounding * (0.5 / decay).max(1.0) > tol {
        return None;
    }

    let (mut sum, mut abs) = (0.0, 0.0);
    for k in (1..=n).rev() {
        let kf = k as f64;
        let term = kf * (-(kf * kf - 1.0) * decay).exp() * (kf * PI * w).sin();
        sum += term;
        abs += term.abs();
    }
    let floor = rounding * abs;
    if floor > tol || sum.abs() <= floor {
        return None;
    }
    Some(Series { log_scale, sum })
}

/// [`large_sum_resolved`] with an unresolvable sum reported as zero.
pub fn large_sum_navarro(u: f64, w: f64, n: usize, ln_err: f64) -> Series {
    large_sum_resolved(u, w, n, ln_err).unwrap_or(Series::ZERO)
}
