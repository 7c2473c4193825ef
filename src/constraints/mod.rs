//! # Line Constraints
//!
//! Users describe which spectral lines share a free amplitude, width or
//! shift variable with a [`ConstraintSpec`] per quantity, bundled in a
//! [`ConstraintSet`] together with the doubling flag. The [`compile`]
//! step selects the active lines of a catalog inside a wavelength window
//! and validates every specification into a [`ConstraintDescriptor`]:
//! each active line belongs to exactly one group and carries a finite
//! coefficient relative to that group's free variable.
//!
//! ```rust
//! use spectrafit_rs::catalog::{LineCatalog, LineEntry};
//! use spectrafit_rs::constraints::{compile, ConstraintSet, ConstraintSpec, LineAttribute, WavelengthWindow};
//!
//! let catalog = LineCatalog::new()
//!     .with_line("w", LineEntry::new(3.949e-10, "ArXVII")).unwrap()
//!     .with_line("z", LineEntry::new(3.994e-10, "ArXVII")).unwrap();
//!
//! // One shared width (temperature) for the ion
//! let set = ConstraintSet::new().with_width(ConstraintSpec::ByAttribute(LineAttribute::Ion));
//! let compiled = compile(&catalog, WavelengthWindow::all(), &set).unwrap();
//! assert_eq!(compiled.line_count(), 2);
//! ```

pub mod compiler;
pub mod descriptor;
pub mod spec;

pub use compiler::{compile, ActiveLine, CompiledLines, WavelengthWindow};
pub use descriptor::ConstraintDescriptor;
pub use spec::{ConstraintSet, ConstraintSpec, KeyedLine, LineAttribute, QuantityKind};
