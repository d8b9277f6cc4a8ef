//! Wiener first-passage time densities for wfpt.
//!
//! This crate hosts the density evaluation engine:
//! - term-count estimators bounding the series truncation error
//! - small-time and large-time summation kernels
//! - density assemblers (linear and log domain)
//! - the method dispatcher binding the above once per batch
//! - a batch driver evaluating recycled trial vectors in parallel

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod constants;
pub mod density;
pub mod math;
pub mod method;
pub mod series;
pub mod terms;

pub use batch::{TrialData, evaluate};
pub use density::{DenFn, Kernels, Selection, Standardized, standardize};
pub use method::{Method, MethodConfig, Scale, SmallSummation, SmallTerms, determine_method};
pub use series::{Series, SumFn};
pub use terms::NumFn;
