//! Small numerically-stable helpers shared by the series code.

use crate::constants::MAX_TERMS;

/// Neumaier-compensated running sum.
///
/// Used where terms must be accumulated head-first (early-exit kernels), so
/// tail-first ordering is not available to control rounding.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompensatedSum {
    sum: f64,
    comp: f64,
}

impl CompensatedSum {
    /// Start from `x`.
    #[inline]
    pub fn new(x: f64) -> Self {
        Self { sum: x, comp: 0.0 }
    }

    /// Add `x`.
    #[inline]
    pub fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.comp += (self.sum - t) + x;
        } else {
            self.comp += (x - t) + self.sum;
        }
        self.sum = t;
    }

    /// Compensated total.
    #[inline]
    pub fn value(&self) -> f64 {
        self.sum + self.comp
    }
}

/// Round a real-valued term bound up to a count.
///
/// Saturates at [`MAX_TERMS`]; `NaN` (an unbounded requirement) saturates too,
/// and non-positive bounds give zero.
#[inline]
pub fn ceil_terms(k: f64) -> usize {
    if k.is_nan() || k >= MAX_TERMS as f64 {
        MAX_TERMS
    } else if k <= 0.0 {
        0
    } else {
        k.ceil() as usize
    }
}
