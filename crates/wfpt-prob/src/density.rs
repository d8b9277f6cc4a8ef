//! Density assemblers.
//!
//! Every assembler evaluates the lower-boundary first-passage density
//! `p(t) = (M / a²) · f(t / a² | w)` of a unit-coefficient Wiener process.
//! The multiplier `M` carries the drift (and drift variability) and is kept
//! on the log scale, as is the error budget handed to the series layer.
//!
//! Assemblers never fail: parameters outside the domain give `0` in the
//! linear domain and `-∞` in the log domain.

use serde::{Deserialize, Serialize};
use wfpt_core::WienerParams;

use crate::constants::{DEFAULT_CROSSOVER, DEFAULT_MAX_TERMS_LARGE, SV_THRESH};
use crate::series::{Series, SumFn, large_sum_resolved};
use crate::terms::{NumFn, kl_navarro};

/// Assembler signature: `(t, params, err, kernels) -> density`.
pub type DenFn = fn(f64, &WienerParams, f64, &Kernels) -> f64;

/// A trial mapped onto the standard density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standardized {
    /// Standardized decision time `t / a²`.
    pub u: f64,
    /// `ln(M / a²)`.
    pub log_mult: f64,
    /// Tolerance on `f(u | w)`, natural-log scale.
    pub log_err: f64,
}

/// Map a decision time and parameters onto the standard density.
///
/// Returns `None` outside the domain: non-positive or non-finite `t`,
/// invalid parameters, non-positive or non-finite `err`, or a multiplier that
/// is not finite in the log domain.
pub fn standardize(t: f64, params: &WienerParams, err: f64) -> Option<Standardized> {
    if !(t > 0.0 && t.is_finite() && err > 0.0 && err.is_finite()) || !params.is_valid() {
        return None;
    }
    let WienerParams { a, v, w, sv } = *params;
    let u = t / (a * a);
    if !(u > 0.0 && u.is_finite()) {
        return None;
    }

    let log_m = if sv > SV_THRESH {
        let s2t = sv * sv * t;
        let aws = a * w * sv;
        (aws * aws - 2.0 * a * v * w - v * v * t) / (2.0 * (1.0 + s2t)) - 0.5 * s2t.ln_1p()
    } else {
        -v * a * w - 0.5 * v * v * t
    };
    let log_mult = log_m - 2.0 * a.ln();
    if !log_mult.is_finite() {
        return None;
    }
    Some(Standardized { u, log_mult, log_err: err.ln() - log_mult })
}

/// Series selection evaluated under the multiplier of [`fb`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Selection {
    /// Small-time series, as in [`fs`].
    Small,
    /// Large-time series, as in [`fl`].
    Large,
    /// Cheaper of the two, as in [`ff`].
    #[default]
    Fast,
    /// Fixed crossover, as in [`fc`].
    Combined,
}

impl Selection {
    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Selection::Small => "small",
            Selection::Large => "large",
            Selection::Fast => "both",
            Selection::Combined => "combined",
        }
    }

    fn pick(self) -> Pick {
        match self {
            Selection::Small => Kernels::small,
            Selection::Large => Kernels::large,
            Selection::Fast => Kernels::fast,
            Selection::Combined => Kernels::combined,
        }
    }
}

/// Series strategy shared by the assemblers of one batch.
#[derive(Debug, Clone, Copy)]
pub struct Kernels {
    /// Small-time term-count estimator.
    pub numf: NumFn,
    /// Small-time summation kernel.
    pub sumf: SumFn,
    /// Cap on the large-time term count.
    pub max_terms_large: usize,
    /// Standardized time at which [`fc`] switches to the large-time series.
    pub crossover: f64,
    /// Series selection of [`fb`].
    pub inner: Selection,
}

impl Kernels {
    /// Kernels with the default large-time cap and crossover.
    pub fn new(numf: NumFn, sumf: SumFn) -> Self {
        Self {
            numf,
            sumf,
            max_terms_large: DEFAULT_MAX_TERMS_LARGE,
            crossover: DEFAULT_CROSSOVER,
            inner: Selection::Fast,
        }
    }

    /// Override the large-time term cap.
    pub fn with_max_terms_large(mut self, max_terms_large: usize) -> Self {
        self.max_terms_large = max_terms_large;
        self
    }

    /// Override the crossover time of [`fc`].
    pub fn with_crossover(mut self, crossover: f64) -> Self {
        self.crossover = crossover;
        self
    }

    /// Override the series selection of [`fb`].
    pub fn with_inner(mut self, inner: Selection) -> Self {
        self.inner = inner;
        self
    }

    fn small_count(&self, s: &Standardized, w: f64) -> usize {
        (self.numf)(s.u, w, s.log_err)
    }

    fn small(&self, s: &Standardized, w: f64) -> Series {
        (self.sumf)(s.u, w, self.small_count(s, w), s.log_err)
    }

    // Unresolvable large-time sums fall back to the small-time series.
    fn large_with(&self, s: &Standardized, w: f64, n: usize) -> Series {
        match large_sum_resolved(s.u, w, n.min(self.max_terms_large), s.log_err) {
            Some(series) => series,
            None => self.small(s, w),
        }
    }

    fn large(&self, s: &Standardized, w: f64) -> Series {
        self.large_with(s, w, kl_navarro(s.u, w, s.log_err))
    }

    fn fast(&self, s: &Standardized, w: f64) -> Series {
        let ns = self.small_count(s, w);
        let nl = kl_navarro(s.u, w, s.log_err);
        if ns < nl { (self.sumf)(s.u, w, ns, s.log_err) } else { self.large_with(s, w, nl) }
    }

    fn combined(&self, s: &Standardized, w: f64) -> Series {
        if s.u < self.crossover { self.small(s, w) } else { self.large(s, w) }
    }
}

type Pick = fn(&Kernels, &Standardized, f64) -> Series;

#[inline]
fn linear(t: f64, params: &WienerParams, err: f64, kernels: &Kernels, pick: Pick) -> f64 {
    match standardize(t, params, err) {
        Some(s) => pick(kernels, &s, params.w).scaled_value(s.log_mult),
        None => 0.0,
    }
}

#[inline]
fn log(t: f64, params: &WienerParams, err: f64, kernels: &Kernels, pick: Pick) -> f64 {
    match standardize(t, params, err) {
        Some(s) => pick(kernels, &s, params.w).scaled_ln(s.log_mult),
        None => f64::NEG_INFINITY,
    }
}

/// Fast density: evaluates whichever series needs fewer terms.
///
/// Ties go to the large-time series.
pub fn ff(t: f64, params: &WienerParams, err: f64, kernels: &Kernels) -> f64 {
    linear(t, params, err, kernels, Kernels::fast)
}

/// Log of [`ff`].
pub fn ff_log(t: f64, params: &WienerParams, err: f64, kernels: &Kernels) -> f64 {
    log(t, params, err, kernels, Kernels::fast)
}

/// Small-time series only.
pub fn fs(t: f64, params: &WienerParams, err: f64, kernels: &Kernels) -> f64 {
    linear(t, params, err, kernels, Kernels::small)
}

/// Log of [`fs`].
pub fn fs_log(t: f64, params: &WienerParams, err: f64, kernels: &Kernels) -> f64 {
    log(t, params, err, kernels, Kernels::small)
}

/// Large-time series only, with the term count capped at
/// [`Kernels::max_terms_large`].
///
/// Where cancellation leaves the large-time sum below `f64` resolution
/// (small `u`), the small-time series is evaluated instead.
pub fn fl(t: f64, params: &WienerParams, err: f64, kernels: &Kernels) -> f64 {
    linear(t, params, err, kernels, Kernels::large)
}

/// Log of [`fl`].
pub fn fl_log(t: f64, params: &WienerParams, err: f64, kernels: &Kernels) -> f64 {
    log(t, params, err, kernels, Kernels::large)
}

/// Combined density: small-time series below [`Kernels::crossover`]
/// (standardized time), large-time series from there on.
pub fn fc(t: f64, params: &WienerParams, err: f64, kernels: &Kernels) -> f64 {
    linear(t, params, err, kernels, Kernels::combined)
}

/// Log of [`fc`].
pub fn fc_log(t: f64, params: &WienerParams, err: f64, kernels: &Kernels) -> f64 {
    log(t, params, err, kernels, Kernels::combined)
}

/// Drift-variability density.
///
/// The drift rate is integrated over `N(v, sv²)` in closed form, which only
/// changes the multiplier `M`; the series follow [`Kernels::inner`]. With
/// `sv <= SV_THRESH` the multiplier is the fixed-drift one, so `fb` equals
/// the assembler named by [`Kernels::inner`].
pub fn fb(t: f64, params: &WienerParams, err: f64, kernels: &Kernels) -> f64 {
    linear(t, params, err, kernels, kernels.inner.pick())
}

/// Log of [`fb`].
pub fn fb_log(t: f64, params: &WienerParams, err: f64, kernels: &Kernels) -> f64 {
    log(t, params, err, kernels, kernels.inner.pick())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{small_sum_2014, small_sum_2017, small_sum_eps_14, small_sum_eps_17};
    use crate::terms::{ks_gondan, ks_navarro};
    use approx::assert_relative_eq;
    use statrs::distribution::{Continuous, Normal};

    const PAIRS: [(DenFn, DenFn); 5] =
        [(ff, ff_log), (fs, fs_log), (fl, fl_log), (fc, fc_log), (fb, fb_log)];

    fn all_kernels() -> Vec<Kernels> {
        vec![
            Kernels::new(ks_gondan, small_sum_eps_17),
            Kernels::new(ks_gondan, small_sum_eps_14),
            Kernels::new(ks_navarro, small_sum_2017),
            Kernels::new(ks_navarro, small_sum_2014),
        ]
    }

    fn simpson(f: impl Fn(f64) -> f64, lo: f64, hi: f64, n: usize) -> f64 {
        let n = n + n % 2;
        let h = (hi - lo) / n as f64;
        let mut acc = f(lo) + f(hi);
        for i in 1..n {
            let x = lo + i as f64 * h;
            acc += if i % 2 == 1 { 4.0 * f(x) } else { 2.0 * f(x) };
        }
        acc * h / 3.0
    }

    #[test]
    fn test_log_matches_linear() {
        let ts = [0.002, 0.01, 0.1, 0.5, 1.0, 3.0, 10.0];
        for kernels in all_kernels() {
            for &a in &[0.8, 2.0] {
                for &v in &[-1.0, 0.5] {
                    for &w in &[0.3, 0.6] {
                        for &sv in &[0.0, 0.7] {
                            let p = WienerParams::new(a, v, w, sv);
                            for &t in &ts {
                                for (lin, lg) in PAIRS {
                                    let d = lin(t, &p, 1e-8, &kernels);
                                    let ld = lg(t, &p, 1e-8, &kernels);
                                    assert!(d >= 0.0 && d.is_finite(), "t={t} p={p:?}: {d}");
                                    assert!(!ld.is_nan(), "t={t} p={p:?}");
                                    assert_relative_eq!(ld.exp(), d, max_relative = 1e-10);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_fast_uses_cheaper_series() {
        let p = WienerParams::new(1.0, 1.0, 0.5, 0.0);
        let err = 1e-6;
        for kernels in all_kernels() {
            let small_time = standardize(0.001, &p, err).unwrap();
            assert!(
                (kernels.numf)(small_time.u, p.w, small_time.log_err)
                    < kl_navarro(small_time.u, p.w, small_time.log_err)
            );
            let d = ff(0.001, &p, err, &kernels);
            assert!(d > 0.0 && d.is_finite());
            assert_eq!(d, fs(0.001, &p, err, &kernels));

            let large_time = standardize(5.0, &p, err).unwrap();
            assert!(
                (kernels.numf)(large_time.u, p.w, large_time.log_err)
                    >= kl_navarro(large_time.u, p.w, large_time.log_err)
            );
            let d = ff(5.0, &p, err, &kernels);
            assert!(d > 0.0 && d.is_finite());
            assert_eq!(d, fl(5.0, &p, err, &kernels));
        }
    }

    #[test]
    fn test_fast_matches_forced_series_on_grid() {
        let kernels = Kernels::new(ks_gondan, small_sum_eps_17);
        let p = WienerParams::new(1.3, -0.4, 0.35, 0.0);
        for i in 0..40 {
            let t = 0.005 * 1.25f64.powi(i);
            let s = standardize(t, &p, 1e-9).unwrap();
            let forced = if ks_gondan(s.u, p.w, s.log_err) < kl_navarro(s.u, p.w, s.log_err) {
                fs(t, &p, 1e-9, &kernels)
            } else {
                fl(t, &p, 1e-9, &kernels)
            };
            assert_eq!(ff(t, &p, 1e-9, &kernels), forced, "t={t}");
            // Both series are accurate here; the choice only affects cost.
            assert!((fs(t, &p, 1e-9, &kernels) - fl(t, &p, 1e-9, &kernels)).abs() < 1e-8);
        }
    }

    #[test]
    fn test_combined_switches_at_crossover() {
        let p = WienerParams::new(2.0, 0.3, 0.5, 0.0);
        let kernels = Kernels::new(ks_gondan, small_sum_eps_17).with_crossover(0.25);
        // u = t / 4
        assert_eq!(fc(0.9, &p, 1e-8, &kernels), fs(0.9, &p, 1e-8, &kernels));
        assert_eq!(fc(1.0, &p, 1e-8, &kernels), fl(1.0, &p, 1e-8, &kernels));
        assert_eq!(fc_log(1.1, &p, 1e-8, &kernels), fl_log(1.1, &p, 1e-8, &kernels));
    }

    #[test]
    fn test_invalid_domain_gives_sentinel() {
        let kernels = Kernels::new(ks_gondan, small_sum_eps_17);
        let ok = WienerParams::new(1.0, 0.5, 0.5, 0.0);
        let cases = [
            (0.0, ok, 1e-6),
            (-0.2, ok, 1e-6),
            (f64::NAN, ok, 1e-6),
            (f64::INFINITY, ok, 1e-6),
            (0.5, WienerParams::new(0.0, 0.5, 0.5, 0.0), 1e-6),
            (0.5, WienerParams::new(1.0, 0.5, 0.0, 0.0), 1e-6),
            (0.5, WienerParams::new(1.0, 0.5, 1.0, 0.0), 1e-6),
            (0.5, WienerParams::new(1.0, 0.5, 0.5, -1.0), 1e-6),
            (0.5, WienerParams::new(1.0, f64::INFINITY, 0.5, 0.0), 1e-6),
            (0.5, ok, 0.0),
            (0.5, ok, -1e-6),
            (0.5, ok, f64::NAN),
        ];
        for (t, p, err) in cases {
            for (lin, lg) in PAIRS {
                assert_eq!(lin(t, &p, err, &kernels), 0.0, "t={t} p={p:?} err={err}");
                assert_eq!(lg(t, &p, err, &kernels), f64::NEG_INFINITY, "t={t} p={p:?} err={err}");
            }
        }
    }

    #[test]
    fn test_variability_follows_inner_selection() {
        let p = WienerParams::new(1.4, 0.9, 0.45, 0.0);
        let with_sv = WienerParams { sv: 0.6, ..p };
        let wrapped: [(Selection, DenFn, DenFn); 4] = [
            (Selection::Small, fs, fs_log),
            (Selection::Large, fl, fl_log),
            (Selection::Fast, ff, ff_log),
            (Selection::Combined, fc, fc_log),
        ];
        for base in all_kernels() {
            for (inner, lin, lg) in wrapped {
                let kernels = base.with_inner(inner);
                for &t in &[0.02, 0.4, 2.0] {
                    assert_eq!(fb(t, &p, 1e-7, &kernels), lin(t, &p, 1e-7, &kernels));
                    assert_eq!(fb_log(t, &p, 1e-7, &kernels), lg(t, &p, 1e-7, &kernels));
                    assert!(fb(t, &with_sv, 1e-7, &kernels) != fb(t, &p, 1e-7, &kernels));
                }
            }
        }

        // At t = 2 the fast selection takes the large-time series.
        let fast = Kernels::new(ks_gondan, small_sum_eps_17);
        let small = fast.with_inner(Selection::Small);
        let s = standardize(2.0, &with_sv, 1e-7).unwrap();
        assert!(ks_gondan(s.u, p.w, s.log_err) >= kl_navarro(s.u, p.w, s.log_err));
        let (b_small, b_fast) = (fb(2.0, &with_sv, 1e-7, &small), fb(2.0, &with_sv, 1e-7, &fast));
        assert_eq!(b_small, fs(2.0, &with_sv, 1e-7, &small));
        assert_eq!(b_fast, fl(2.0, &with_sv, 1e-7, &fast));
        assert!(b_small != b_fast);
        assert!((b_small - b_fast).abs() < 1e-6);
    }

    #[test]
    fn test_variability_matches_quadrature_over_drift() {
        let kernels = Kernels::new(ks_gondan, small_sum_eps_17);
        let (a, v, w, sv) = (1.5, 0.7, 0.4, 0.8);
        let prior = Normal::new(v, sv).unwrap();
        for &t in &[0.3, 1.0, 2.5] {
            let integrand = |vi: f64| {
                ff(t, &WienerParams::new(a, vi, w, 0.0), 1e-13, &kernels) * prior.pdf(vi)
            };
            let reference = simpson(integrand, v - 10.0 * sv, v + 10.0 * sv, 2000);
            let got = fb(t, &WienerParams::new(a, v, w, sv), 1e-13, &kernels);
            assert_relative_eq!(got, reference, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_tiny_variability_is_continuous() {
        let kernels = Kernels::new(ks_gondan, small_sum_eps_17);
        let p = WienerParams::new(1.0, 1.2, 0.6, 0.0);
        let tiny = WienerParams { sv: 1e-300, ..p };
        let fixed = fb(0.7, &p, 1e-10, &kernels);
        assert_relative_eq!(fb(0.7, &tiny, 1e-10, &kernels), fixed, max_relative = 1e-12);
    }

    #[test]
    fn test_lower_density_integrates_to_lower_probability() {
        let kernels = Kernels::new(ks_gondan, small_sum_eps_17);
        let (a, v, w) = (1.0, 1.0, 0.5);
        let p = WienerParams::new(a, v, w, 0.0);
        let expected =
            ((-2.0 * v * a * w).exp() - (-2.0 * v * a).exp()) / (1.0 - (-2.0 * v * a).exp());
        assert_relative_eq!(expected, 0.268_941_421_369_995, max_relative = 1e-9);
        let mass = simpson(|t| ff(t, &p, 1e-12, &kernels), 0.0, 20.0, 40_000);
        assert_relative_eq!(mass, expected, max_relative = 1e-6);
    }

    #[test]
    fn test_log_density_survives_large_boundary() {
        let kernels = Kernels::new(ks_gondan, small_sum_eps_17);
        let p = WienerParams::new(100.0, 1.0, 0.5, 0.0);
        assert_eq!(fs(0.5, &p, 1e-6, &kernels), 0.0);
        for lg in [ff_log, fs_log, fc_log, fb_log] {
            let ld = lg(0.5, &p, 1e-6, &kernels);
            assert!(ld.is_finite() && ld < -2000.0, "{ld}");
        }
        assert_relative_eq!(
            fs_log(0.5, &p, 1e-6, &kernels),
            ff_log(0.5, &p, 1e-6, &kernels),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_large_term_cap_bounds_work() {
        let p = WienerParams::new(1.0, 0.0, 0.5, 0.0);
        let capped = Kernels::new(ks_gondan, small_sum_eps_17).with_max_terms_large(1);
        let full = Kernels::new(ks_gondan, small_sum_eps_17);
        let d_capped = fl(0.05, &p, 1e-8, &capped);
        let d_full = fl(0.05, &p, 1e-8, &full);
        assert!(d_capped.is_finite() && d_capped >= 0.0);
        assert!((d_capped - d_full).abs() > 1e-3);
        // Large times need a single term anyway.
        assert_eq!(fl(4.0, &p, 1e-8, &capped), fl(4.0, &p, 1e-8, &full));
    }

    #[test]
    fn test_large_series_falls_back_under_cancellation() {
        let err = 1e-6;
        // Strong drift against a start near the lower boundary: M is huge,
        // so the large-time sum must resolve far below its own rounding floor.
        let cases = [(20.0, -30.0, 0.9, 0.5), (5.0, -10.0, 0.9, 0.05), (1e3, -1e2, 0.999_999, 5.0)];
        for kernels in all_kernels() {
            for (a, v, w, t) in cases {
                let p = WienerParams::new(a, v, w, 0.0);
                let d = fl(t, &p, err, &kernels);
                assert!(d.is_finite() && d >= 0.0, "a={a} t={t}: {d}");
                assert!((d - ff(t, &p, err, &kernels)).abs() <= err, "a={a} t={t}: {d}");
                assert_eq!(d, fs(t, &p, err, &kernels));
                let ld = fl_log(t, &p, err, &kernels);
                assert!(ld.is_finite(), "a={a} t={t}: {ld}");
                assert_eq!(ld, ff_log(t, &p, err, &kernels));
            }
        }
        let p = WienerParams::new(20.0, -30.0, 0.9, 0.0);
        let d = fs(0.5, &p, err, &all_kernels()[0]);
        assert!(d > 1e-4, "{d}");
    }

    #[test]
    fn test_saturated_large_count_returns_promptly() {
        let kernels = Kernels::new(ks_gondan, small_sum_eps_17);
        let p = WienerParams::new(1e3, -1e2, 0.5, 0.0);
        let (t, err) = (1e-10, 1e-15);
        let s = standardize(t, &p, err).unwrap();
        assert_eq!(kl_navarro(s.u, p.w, s.log_err), crate::constants::MAX_TERMS);

        let start = std::time::Instant::now();
        let d = fl(t, &p, err, &kernels);
        let ld = fl_log(t, &p, err, &kernels);
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
        assert_eq!(d, fs(t, &p, err, &kernels));
        assert_eq!(ld, fs_log(t, &p, err, &kernels));
    }
}
