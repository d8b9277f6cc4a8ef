//! Batch evaluation over recycled trial vectors.
//!
//! Every per-trial input is a vector; shorter vectors are recycled (index
//! modulo length) up to the longest one. Trials are independent and run in
//! parallel with rayon against a single read-only [`Method`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use wfpt_core::{Error, Response, Result, WienerParams};

use crate::method::Method;

fn default_sv() -> Vec<f64> {
    vec![0.0]
}

fn default_sigma() -> Vec<f64> {
    vec![1.0]
}

fn default_err() -> Vec<f64> {
    vec![1e-6]
}

/// Per-trial inputs of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrialData {
    /// Response times.
    pub rt: Vec<f64>,
    /// Boundary hit by each trial.
    pub response: Vec<Response>,
    /// Boundary separation.
    pub a: Vec<f64>,
    /// Drift rate.
    pub v: Vec<f64>,
    /// Non-decision time.
    pub t0: Vec<f64>,
    /// Relative starting point.
    pub w: Vec<f64>,
    /// Across-trial drift-rate standard deviation (default `0`).
    #[serde(default = "default_sv")]
    pub sv: Vec<f64>,
    /// Diffusion coefficient (default `1`).
    #[serde(default = "default_sigma")]
    pub sigma: Vec<f64>,
    /// Absolute error tolerance on the density (default `1e-6`).
    #[serde(default = "default_err")]
    pub err: Vec<f64>,
}

enum Outcome {
    Density(f64),
    NonPositiveTime,
    Invalid,
}

#[inline]
fn pick(xs: &[f64], i: usize) -> f64 {
    xs[i % xs.len()]
}

impl TrialData {
    fn columns(&self) -> [(&'static str, usize); 9] {
        [
            ("rt", self.rt.len()),
            ("response", self.response.len()),
            ("a", self.a.len()),
            ("v", self.v.len()),
            ("t0", self.t0.len()),
            ("w", self.w.len()),
            ("sv", self.sv.len()),
            ("sigma", self.sigma.len()),
            ("err", self.err.len()),
        ]
    }

    /// Number of trials after recycling (length of the longest vector).
    pub fn len(&self) -> usize {
        self.columns().iter().map(|&(_, n)| n).max().unwrap_or(0)
    }

    /// Whether the batch holds no trials.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every vector is non-empty; returns the batch length.
    pub fn validate(&self) -> Result<usize> {
        if let Some((name, _)) = self.columns().into_iter().find(|&(_, n)| n == 0) {
            return Err(Error::Validation(format!("input vector '{name}' must be non-empty")));
        }
        Ok(self.len())
    }

    /// Lower-boundary parameters, decision time and tolerance of trial `i`.
    ///
    /// Upper-boundary trials are reflected and every trial is rescaled to a
    /// unit diffusion coefficient. `None` when `sigma`, `rt` or `t0` is out of
    /// range.
    fn lower_boundary(&self, i: usize) -> Option<(f64, WienerParams, f64)> {
        let sigma = pick(&self.sigma, i);
        let (rt, t0) = (pick(&self.rt, i), pick(&self.t0, i));
        if !(sigma > 0.0 && sigma.is_finite() && rt.is_finite() && t0.is_finite() && t0 >= 0.0) {
            return None;
        }
        let params = WienerParams::new(
            pick(&self.a, i),
            pick(&self.v, i),
            pick(&self.w, i),
            pick(&self.sv, i),
        )
        .for_response(self.response[i % self.response.len()])
        .rescaled(sigma);
        Some((rt - t0, params, pick(&self.err, i)))
    }

    fn evaluate_one(&self, i: usize, method: &Method) -> Outcome {
        let Some((t, params, err)) = self.lower_boundary(i) else {
            return Outcome::Invalid;
        };
        if !params.is_valid() || !(err > 0.0 && err.is_finite()) {
            return Outcome::Invalid;
        }
        if t <= method.rt0() {
            return Outcome::NonPositiveTime;
        }
        Outcome::Density(method.density(t, &params, err))
    }
}

/// Evaluate every trial of `data` with `method`.
///
/// Output order matches the (recycled) input order. Trials with invalid
/// parameters, or whose decision time `rt - t0` is at or below the method's
/// `rt0`, get [`Method::sentinel`].
pub fn evaluate(data: &TrialData, method: &Method) -> Result<Vec<f64>> {
    let n = data.validate()?;
    let sentinel = method.sentinel();

    let outcomes: Vec<Outcome> =
        (0..n).into_par_iter().with_min_len(16).map(|i| data.evaluate_one(i, method)).collect();

    let (mut invalid, mut early) = (0usize, 0usize);
    let out: Vec<f64> = outcomes
        .into_iter()
        .map(|o| match o {
            Outcome::Density(d) => d,
            Outcome::NonPositiveTime => {
                early += 1;
                sentinel
            }
            Outcome::Invalid => {
                invalid += 1;
                sentinel
            }
        })
        .collect();

    if invalid > 0 {
        tracing::warn!(invalid, trials = n, "trials with invalid parameters set to {sentinel}");
    }
    if early > 0 {
        tracing::debug!(trials = early, rt0 = method.rt0(), "decision time at or below rt0");
    }
    Ok(out)
}
