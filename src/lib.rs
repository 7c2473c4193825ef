//! # spectrafit-rs
//!
//! `spectrafit-rs` fits time series of plasma emission spectra with a sum of
//! Gaussian lines on a constant background, under user-declared constraints
//! that tie the amplitudes, widths or shifts of several lines to one shared
//! free variable.
//!
//! The library provides:
//! - A line catalog and a constraint compiler turning grouping rules into
//!   validated per-quantity descriptors
//! - A parameter index laying out the reduced vector of free variables
//! - A multi-Gaussian model with an analytic Jacobian and an optional
//!   doublet component
//! - A bounded Levenberg-Marquardt solver
//! - A batch driver with retry, failure isolation, chained or parallel
//!   fitting, and extraction of temperatures, velocities and line ratios
//!
//! ## Basic Usage
//!
//! ```rust
//! use ndarray::Array1;
//! use spectrafit_rs::catalog::{LineCatalog, LineEntry};
//! use spectrafit_rs::constraints::{ConstraintSet, ConstraintSpec, LineAttribute};
//! use spectrafit_rs::fit::{fit, FitConfig};
//! use spectrafit_rs::spectra::Spectra;
//! use spectrafit_rs::synthetic::{spectrum, SyntheticLine};
//!
//! let catalog = LineCatalog::new()
//!     .with_line("a", LineEntry::new(3.95e-10, "ArXVII")).unwrap()
//!     .with_line("b", LineEntry::new(3.98e-10, "ArXVII")).unwrap();
//!
//! let axis = Array1::linspace(3.93e-10, 4.00e-10, 300);
//! let data = spectrum(
//!     &axis,
//!     &[
//!         SyntheticLine::new(3.95e-10, 50.0, 2e-7, 0.0),
//!         SyntheticLine::new(3.98e-10, 20.0, 2e-7, 0.0),
//!     ],
//!     3.0,
//! );
//! let spectra = Spectra::single(axis, data).unwrap();
//!
//! let constraints = ConstraintSet::new()
//!     .with_width(ConstraintSpec::ByAttribute(LineAttribute::Ion));
//! let result = fit(&catalog, &spectra, None, &constraints, FitConfig::default()).unwrap();
//! assert!(result.converged()[0]);
//! ```

pub mod bounds;
pub mod catalog;
pub mod constraints;
pub mod error;
pub mod fit;
pub mod index;
pub mod initial;
pub mod lm;
pub mod model;
pub mod problem;
pub mod scaling;
pub mod spectra;
pub mod synthetic;
pub mod utils;

// Re-exports for convenience
pub use bounds::{Bounds, BoundsConfig};
pub use catalog::{LineCatalog, LineEntry};
pub use constraints::{ConstraintSet, ConstraintSpec, LineAttribute, QuantityKind, WavelengthWindow};
pub use error::{Result, SpectraFitError};
pub use fit::{fit, BatchResult, FitConfig, SampleFit, SpectralFitter};
pub use index::ParameterIndex;
pub use lm::{BoundedLevenbergMarquardt, LmConfig};
pub use model::{JacobianMode, SpectralModel};
pub use problem::Problem;
pub use scaling::Scales;
pub use spectra::Spectra;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
