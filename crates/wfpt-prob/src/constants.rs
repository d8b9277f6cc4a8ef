//! Process-wide numeric constants.

/// Drift-rate variability at or below this value uses the fixed-drift density.
pub const SV_THRESH: f64 = 0.0;

/// Natural log of π.
pub const LN_PI: f64 = 1.144_729_885_849_400_2;

/// Natural log of `sqrt(2π)`.
pub const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Natural log of 2.
pub const LN_2: f64 = std::f64::consts::LN_2;

/// π².
pub const PI_SQ: f64 = std::f64::consts::PI * std::f64::consts::PI;

/// Ceiling on any term count.
///
/// Estimators saturate here instead of overflowing as the tolerance goes to
/// zero or the time argument degenerates, which bounds every summation loop.
pub const MAX_TERMS: usize = 1_000_000_000;

/// Default large-time term cap (effectively uncapped).
pub const DEFAULT_MAX_TERMS_LARGE: usize = MAX_TERMS;

/// Default standardized time (`t / a²`) at which the combined assembler
/// switches from the small-time to the large-time series.
pub const DEFAULT_CROSSOVER: f64 = 0.5;

/// `exp(-x)` is exactly zero in `f64` for `x` above this.
pub(crate) const EXP_UNDERFLOW: f64 = 746.0;
