//! Method dispatcher.
//!
//! Resolves the method-selection strings into a [`Method`]: the small-time
//! term-count estimator, the small-time summation kernel, the density
//! assembler and the decision-time threshold `rt0`. Resolution happens once
//! per batch; the resulting table of `fn` pointers is read-only afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use wfpt_core::{Error, Result, WienerParams};

use crate::constants::{DEFAULT_CROSSOVER, DEFAULT_MAX_TERMS_LARGE};
use crate::density::{self, DenFn, Kernels, Selection};
use crate::series::{self, SumFn};
use crate::terms::{self, NumFn};

/// Small-time term-count bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SmallTerms {
    /// Tight, `w`-dependent pair bound ([`terms::ks_gondan`]).
    Gondan,
    /// Navarro & Fuss bound ([`terms::ks_navarro`]).
    Navarro,
}

impl SmallTerms {
    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            SmallTerms::Gondan => "Gondan",
            SmallTerms::Navarro => "Navarro",
        }
    }

    fn numf(self) -> NumFn {
        match self {
            SmallTerms::Gondan => terms::ks_gondan,
            SmallTerms::Navarro => terms::ks_navarro,
        }
    }
}

impl FromStr for SmallTerms {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gondan" | "g" => Ok(SmallTerms::Gondan),
            "navarro" | "n" => Ok(SmallTerms::Navarro),
            _ => Err(Error::Config(format!(
                "unknown n_terms_small '{s}', expected 'Gondan' or 'Navarro'"
            ))),
        }
    }
}

/// Small-time summation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SmallSummation {
    /// 2017 pair form with early exit ([`series::small_sum_eps_17`]).
    Eps2017,
    /// 2014 alternating form with early exit ([`series::small_sum_eps_14`]).
    Eps2014,
    /// 2017 pair form over the full span ([`series::small_sum_2017`]).
    Baseline2017,
    /// 2014 alternating form over the full span ([`series::small_sum_2014`]).
    Baseline2014,
}

impl SmallSummation {
    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            SmallSummation::Eps2017 => "eps_2017",
            SmallSummation::Eps2014 => "eps_2014",
            SmallSummation::Baseline2017 => "2017",
            SmallSummation::Baseline2014 => "2014",
        }
    }

    /// Whether the kernel stops early on the tolerance (and so treats its
    /// term count as a cap rather than an exact span).
    pub fn is_precision_tuned(self) -> bool {
        matches!(self, SmallSummation::Eps2017 | SmallSummation::Eps2014)
    }

    fn sumf(self) -> SumFn {
        match self {
            SmallSummation::Eps2017 => series::small_sum_eps_17,
            SmallSummation::Eps2014 => series::small_sum_eps_14,
            SmallSummation::Baseline2017 => series::small_sum_2017,
            SmallSummation::Baseline2014 => series::small_sum_2014,
        }
    }
}

impl FromStr for SmallSummation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eps_2017" => Ok(SmallSummation::Eps2017),
            "eps_2014" => Ok(SmallSummation::Eps2014),
            "2017" => Ok(SmallSummation::Baseline2017),
            "2014" => Ok(SmallSummation::Baseline2014),
            _ => Err(Error::Config(format!(
                "unknown summation_small '{s}', expected one of eps_2017, eps_2014, 2017, 2014"
            ))),
        }
    }
}

/// Which density assembler to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scale {
    /// Small-time series only.
    Small,
    /// Large-time series only.
    Large,
    /// Cheaper of the two series per trial.
    Fast,
    /// Fixed crossover time between the two series.
    Combined,
    /// Drift-variability aware.
    Variable,
}

impl Scale {
    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Scale::Small => "small",
            Scale::Large => "large",
            Scale::Fast => "both",
            Scale::Combined => "combined",
            Scale::Variable => "sv",
        }
    }

    fn denf(self, log_prob: bool) -> DenFn {
        match (self, log_prob) {
            (Scale::Small, false) => density::fs,
            (Scale::Small, true) => density::fs_log,
            (Scale::Large, false) => density::fl,
            (Scale::Large, true) => density::fl_log,
            (Scale::Fast, false) => density::ff,
            (Scale::Fast, true) => density::ff_log,
            (Scale::Combined, false) => density::fc,
            (Scale::Combined, true) => density::fc_log,
            (Scale::Variable, false) => density::fb,
            (Scale::Variable, true) => density::fb_log,
        }
    }
}

impl FromStr for Scale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "s" => Ok(Scale::Small),
            "large" | "l" => Ok(Scale::Large),
            "both" | "b" | "fast" | "f" => Ok(Scale::Fast),
            "combined" | "c" => Ok(Scale::Combined),
            "sv" | "variable" => Ok(Scale::Variable),
            _ => Err(Error::Config(format!(
                "unknown scale '{s}', expected small, large, both, combined or sv"
            ))),
        }
    }
}

impl FromStr for Selection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "s" => Ok(Selection::Small),
            "large" | "l" => Ok(Selection::Large),
            "both" | "b" | "fast" | "f" => Ok(Selection::Fast),
            "combined" | "c" => Ok(Selection::Combined),
            _ => Err(Error::Config(format!(
                "unknown sv_series '{s}', expected small, large, both or combined"
            ))),
        }
    }
}

macro_rules! string_serde {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<String> for $ty {
            type Error = Error;

            fn try_from(s: String) -> Result<Self> {
                s.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> String {
                value.as_str().to_string()
            }
        }
    )*};
}

string_serde!(SmallTerms, SmallSummation, Scale, Selection);

fn default_max_terms_large() -> usize {
    DEFAULT_MAX_TERMS_LARGE
}

fn default_crossover() -> f64 {
    DEFAULT_CROSSOVER
}

/// Method configuration as found in input files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodConfig {
    /// Small-time term-count bound.
    #[serde(default = "default_n_terms_small")]
    pub n_terms_small: SmallTerms,
    /// Small-time summation kernel.
    #[serde(default = "default_summation_small")]
    pub summation_small: SmallSummation,
    /// Density assembler.
    #[serde(default = "default_scale")]
    pub scale: Scale,
    /// Return log-densities.
    #[serde(default)]
    pub log_prob: bool,
    /// Cap on the large-time term count.
    #[serde(default = "default_max_terms_large")]
    pub max_terms_large: usize,
    /// Crossover (standardized time) of the combined assembler.
    #[serde(default = "default_crossover")]
    pub crossover: f64,
    /// Series selection under the drift-variability multiplier (`scale = "sv"`).
    #[serde(default)]
    pub sv_series: Selection,
}

fn default_n_terms_small() -> SmallTerms {
    SmallTerms::Gondan
}

fn default_summation_small() -> SmallSummation {
    SmallSummation::Eps2017
}

fn default_scale() -> Scale {
    Scale::Fast
}

impl Default for MethodConfig {
    fn default() -> Self {
        Self {
            n_terms_small: default_n_terms_small(),
            summation_small: default_summation_small(),
            scale: default_scale(),
            log_prob: false,
            max_terms_large: DEFAULT_MAX_TERMS_LARGE,
            crossover: DEFAULT_CROSSOVER,
            sv_series: Selection::Fast,
        }
    }
}

/// A resolved method, shared read-only by every trial of a batch.
#[derive(Debug, Clone, Copy)]
pub struct Method {
    config: MethodConfig,
    kernels: Kernels,
    denf: DenFn,
    rt0: f64,
}

impl Method {
    /// Resolve a configuration.
    ///
    /// The Gondan bound is a cap that the precision-tuned kernels shorten
    /// adaptively; the Navarro bound describes an exact span consumed by the
    /// baseline kernels. Mixing the two families is rejected.
    pub fn from_config(config: &MethodConfig) -> Result<Self> {
        let compatible = match config.n_terms_small {
            SmallTerms::Gondan => config.summation_small.is_precision_tuned(),
            SmallTerms::Navarro => !config.summation_small.is_precision_tuned(),
        };
        if !compatible {
            return Err(Error::Config(format!(
                "summation_small '{}' does not match the bound of n_terms_small '{}' \
                 (Gondan pairs with eps_2017/eps_2014, Navarro with 2017/2014)",
                config.summation_small, config.n_terms_small
            )));
        }
        if !(config.crossover.is_finite() && config.crossover >= 0.0) {
            return Err(Error::Config(format!(
                "crossover must be finite and >= 0, got {}",
                config.crossover
            )));
        }

        let kernels = Kernels::new(config.n_terms_small.numf(), config.summation_small.sumf())
            .with_max_terms_large(config.max_terms_large)
            .with_crossover(config.crossover)
            .with_inner(config.sv_series);
        Ok(Self { config: *config, kernels, denf: config.scale.denf(config.log_prob), rt0: 0.0 })
    }

    /// Configuration this method was resolved from.
    pub fn config(&self) -> &MethodConfig {
        &self.config
    }

    /// Series strategy handed to the assembler.
    pub fn kernels(&self) -> &Kernels {
        &self.kernels
    }

    /// Bound density assembler.
    pub fn denf(&self) -> DenFn {
        self.denf
    }

    /// Decision times at or below this value get the sentinel without
    /// reaching the assembler.
    pub fn rt0(&self) -> f64 {
        self.rt0
    }

    /// Whether densities are returned on the log scale.
    pub fn log_prob(&self) -> bool {
        self.config.log_prob
    }

    /// Value reported for trials outside the domain: `0` or `-∞`.
    pub fn sentinel(&self) -> f64 {
        if self.config.log_prob { f64::NEG_INFINITY } else { 0.0 }
    }

    /// Density (or log-density) of one lower-boundary trial at decision time `t`.
    #[inline]
    pub fn density(&self, t: f64, params: &WienerParams, err: f64) -> f64 {
        (self.denf)(t, params, err, &self.kernels)
    }
}

/// Resolve the method-selection strings into a [`Method`] with default
/// large-time cap and crossover.
pub fn determine_method(
    n_terms_small: &str,
    summation_small: &str,
    scale: &str,
    log_prob: bool,
) -> Result<Method> {
    let config = MethodConfig {
        n_terms_small: n_terms_small.parse()?,
        summation_small: summation_small.parse()?,
        scale: scale.parse()?,
        log_prob,
        ..MethodConfig::default()
    };
    Method::from_config(&config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("G".parse::<SmallTerms>().unwrap(), SmallTerms::Gondan);
        assert_eq!("navarro".parse::<SmallTerms>().unwrap(), SmallTerms::Navarro);
        assert_eq!("EPS_2014".parse::<SmallSummation>().unwrap(), SmallSummation::Eps2014);
        assert_eq!("2017".parse::<SmallSummation>().unwrap(), SmallSummation::Baseline2017);
        for (s, scale) in [
            ("s", Scale::Small),
            ("Large", Scale::Large),
            ("b", Scale::Fast),
            ("fast", Scale::Fast),
            ("c", Scale::Combined),
            ("variable", Scale::Variable),
        ] {
            assert_eq!(s.parse::<Scale>().unwrap(), scale);
        }
        assert_eq!("L".parse::<Selection>().unwrap(), Selection::Large);
        assert_eq!("both".parse::<Selection>().unwrap(), Selection::Fast);
        assert!(matches!("sv".parse::<Selection>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_strings_are_config_errors() {
        for err in [
            determine_method("Blurton", "eps_2017", "both", false).unwrap_err(),
            determine_method("Gondan", "eps_2020", "both", false).unwrap_err(),
            determine_method("Gondan", "eps_2017", "medium", false).unwrap_err(),
        ] {
            assert!(matches!(err, Error::Config(_)), "{err}");
        }
    }

    #[test]
    fn test_incompatible_pairings_rejected() {
        for (terms, sum) in
            [("Gondan", "2017"), ("Gondan", "2014"), ("Navarro", "eps_2017"), ("N", "eps_2014")]
        {
            let err = determine_method(terms, sum, "small", false).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{terms}/{sum}: {err}");
        }
        for (terms, sum) in
            [("Gondan", "eps_2017"), ("G", "eps_2014"), ("Navarro", "2017"), ("n", "2014")]
        {
            assert!(determine_method(terms, sum, "small", false).is_ok(), "{terms}/{sum}");
        }
    }

    #[test]
    fn test_binding_selects_assembler() {
        let p = WienerParams::new(1.2, 0.4, 0.55, 0.0);
        let cases: [(&str, bool, DenFn); 10] = [
            ("small", false, density::fs),
            ("small", true, density::fs_log),
            ("large", false, density::fl),
            ("large", true, density::fl_log),
            ("both", false, density::ff),
            ("both", true, density::ff_log),
            ("combined", false, density::fc),
            ("combined", true, density::fc_log),
            ("sv", false, density::fb),
            ("sv", true, density::fb_log),
        ];
        for (scale, log_prob, expected) in cases {
            let m = determine_method("Gondan", "eps_2017", scale, log_prob).unwrap();
            assert_eq!(m.rt0(), 0.0);
            assert_eq!(m.log_prob(), log_prob);
            for t in [0.01, 0.3, 2.0] {
                assert_eq!(m.density(t, &p, 1e-8), expected(t, &p, 1e-8, m.kernels()));
            }
        }
    }

    #[test]
    fn test_sentinel_follows_domain() {
        let lin = determine_method("Gondan", "eps_2017", "both", false).unwrap();
        let log = determine_method("Gondan", "eps_2017", "both", true).unwrap();
        assert_eq!(lin.sentinel(), 0.0);
        assert_eq!(log.sentinel(), f64::NEG_INFINITY);
        let p = WienerParams::new(1.0, 0.0, 0.5, 0.0);
        assert_eq!(lin.density(0.0, &p, 1e-6), lin.sentinel());
        assert_eq!(log.density(0.0, &p, 1e-6), log.sentinel());
    }

    #[test]
    fn test_config_serde_defaults_and_names() {
        let cfg: MethodConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, MethodConfig::default());
        assert_eq!(cfg.max_terms_large, DEFAULT_MAX_TERMS_LARGE);

        let cfg: MethodConfig = serde_json::from_str(
            r#"{"n_terms_small": "N", "summation_small": "2014", "scale": "c", "log_prob": true,
                "crossover": 0.8}"#,
        )
        .unwrap();
        assert_eq!(cfg.n_terms_small, SmallTerms::Navarro);
        assert_eq!(cfg.scale, Scale::Combined);
        let m = Method::from_config(&cfg).unwrap();
        assert_eq!(m.kernels().crossover, 0.8);

        let json = serde_json::to_value(cfg).unwrap();
        assert_eq!(json["n_terms_small"], "Navarro");
        assert_eq!(json["summation_small"], "2014");
        assert_eq!(json["scale"], "combined");

        assert!(serde_json::from_str::<MethodConfig>(r#"{"scale": "tiny"}"#).is_err());
        assert!(serde_json::from_str::<MethodConfig>(r#"{"bogus": 1}"#).is_err());
    }

    #[test]
    fn test_sv_series_binds_inner_selection() {
        let cfg: MethodConfig =
            serde_json::from_str(r#"{"scale": "sv", "sv_series": "small"}"#).unwrap();
        assert_eq!(cfg.sv_series, Selection::Small);
        let m = Method::from_config(&cfg).unwrap();
        assert_eq!(m.kernels().inner, Selection::Small);
        assert_eq!(serde_json::to_value(cfg).unwrap()["sv_series"], "small");

        let p = WienerParams::new(1.4, 0.9, 0.45, 0.6);
        for t in [0.02, 0.4, 2.0] {
            assert_eq!(m.density(t, &p, 1e-7), density::fs(t, &p, 1e-7, m.kernels()));
        }
        assert_eq!(MethodConfig::default().sv_series, Selection::Fast);
    }

    #[test]
    fn test_bad_crossover_rejected() {
        let cfg = MethodConfig { crossover: f64::NAN, ..MethodConfig::default() };
        assert!(matches!(Method::from_config(&cfg), Err(Error::Config(_))));
    }
}
