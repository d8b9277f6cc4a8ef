//! Common data types for wfpt

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Boundary hit by a trial.
///
/// Deserializes from the encodings found in behavioural data files:
/// `"lower"`/`"upper"` (also `"l"`/`"u"`), the integer codes `1`/`2` (as numbers
/// or strings), and booleans (`false` = lower, `true` = upper).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "RawResponse")]
pub enum Response {
    /// Lower boundary (coded `1`).
    Lower,
    /// Upper boundary (coded `2`).
    Upper,
}

impl Response {
    /// Integer code (`1` lower, `2` upper).
    pub fn code(self) -> u8 {
        match self {
            Response::Lower => 1,
            Response::Upper => 2,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Lower => f.write_str("lower"),
            Response::Upper => f.write_str("upper"),
        }
    }
}

impl FromStr for Response {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lower" | "l" | "1" => Ok(Response::Lower),
            "upper" | "u" | "2" => Ok(Response::Upper),
            other => Err(Error::Validation(format!(
                "response must be 'lower'/'upper' or 1/2, got '{other}'"
            ))),
        }
    }
}

impl TryFrom<i64> for Response {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            1 => Ok(Response::Lower),
            2 => Ok(Response::Upper),
            other => Err(Error::Validation(format!("response code must be 1 or 2, got {other}"))),
        }
    }
}

impl From<bool> for Response {
    fn from(upper: bool) -> Self {
        if upper { Response::Upper } else { Response::Lower }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawResponse {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl TryFrom<RawResponse> for Response {
    type Error = Error;

    fn try_from(raw: RawResponse) -> Result<Self> {
        match raw {
            RawResponse::Bool(b) => Ok(b.into()),
            RawResponse::Int(i) => Response::try_from(i),
            RawResponse::Text(s) => s.parse(),
        }
    }
}

/// Parameters of a two-boundary Wiener diffusion for a single trial.
///
/// Densities are always evaluated at the lower boundary; an upper-boundary
/// response is handled by [`WienerParams::reflect`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WienerParams {
    /// Boundary separation (`a > 0`).
    pub a: f64,
    /// Drift rate.
    pub v: f64,
    /// Relative starting point (`0 < w < 1`).
    pub w: f64,
    /// Across-trial standard deviation of the drift rate (`sv >= 0`).
    #[serde(default)]
    pub sv: f64,
}

impl WienerParams {
    /// Create a new parameter set.
    pub fn new(a: f64, v: f64, w: f64, sv: f64) -> Self {
        Self { a, v, w, sv }
    }

    /// Mirror the process so the upper boundary becomes the lower one.
    pub fn reflect(self) -> Self {
        Self { v: -self.v, w: 1.0 - self.w, ..self }
    }

    /// Parameters for the lower-boundary density of the given response.
    pub fn for_response(self, response: Response) -> Self {
        match response {
            Response::Lower => self,
            Response::Upper => self.reflect(),
        }
    }

    /// Rescale to unit diffusion coefficient.
    ///
    /// A process with coefficient `sigma` is the unit process with `a`, `v`
    /// and `sv` divided by `sigma`; time is unchanged.
    pub fn rescaled(self, sigma: f64) -> Self {
        if sigma == 1.0 {
            return self;
        }
        Self { a: self.a / sigma, v: self.v / sigma, w: self.w, sv: self.sv / sigma }
    }

    /// Whether the parameters lie inside the density's domain.
    pub fn is_valid(&self) -> bool {
        self.a.is_finite()
            && self.a > 0.0
            && self.v.is_finite()
            && self.w > 0.0
            && self.w < 1.0
            && self.sv.is_finite()
            && self.sv >= 0.0
    }
}
