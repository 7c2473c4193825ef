//! Bounded Levenberg-Marquardt solver.
//!
//! A damped Gauss-Newton iteration with box constraints, gain-ratio damping
//! control ([`TrustRegion`]) and scipy-like termination codes
//! ([`ConvergenceStatus`]).

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod trust_region;

pub use algorithm::{BoundedLevenbergMarquardt, LmResult};
pub use config::LmConfig;
pub use convergence::ConvergenceStatus;
pub use trust_region::TrustRegion;
