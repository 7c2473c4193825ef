//! Batch fitting: configuration, the per-spectrum solver loop, result types
//! and extraction of physical quantities.

pub mod config;
pub mod extract;
pub mod result;
pub mod solver;

pub use config::{FitConfig, ELEMENTARY_CHARGE};
pub use extract::{Extractor, PhysicalQuantities, SPEED_OF_LIGHT};
pub use result::{BatchResult, BatchSummary, Diagnostics, LineRatio, SampleFit, SampleStatus};
pub use solver::{fit, SpectralFitter};
