//! User-level constraint specifications.
//!
//! A constraint specification says which active lines share one free
//! variable for a given physical quantity. It is an explicit strategy enum
//! rather than an attribute looked up by name at runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::LineEntry;

/// Physical quantity a constraint applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityKind {
    Amplitude,
    Width,
    Shift,
}

impl QuantityKind {
    /// Segment order of the flat parameter vector.
    pub const ALL: [QuantityKind; 3] = [
        QuantityKind::Amplitude,
        QuantityKind::Width,
        QuantityKind::Shift,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            QuantityKind::Amplitude => "amplitude",
            QuantityKind::Width => "width",
            QuantityKind::Shift => "shift",
        }
    }
}

/// Catalog attribute lines can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineAttribute {
    /// The emitting ion
    Ion,
    /// The optional catalog grouping key
    GroupKey,
    /// The display symbol
    Symbol,
}

impl LineAttribute {
    /// Value of the attribute for `entry`, if present.
    pub fn value_of<'a>(&self, entry: &'a LineEntry) -> Option<&'a str> {
        match self {
            LineAttribute::Ion => Some(entry.ion.as_str()),
            LineAttribute::GroupKey => entry.group_key.as_deref(),
            LineAttribute::Symbol => entry.symbol.as_deref(),
        }
    }
}

/// Group key and coefficient of one line in a [`ConstraintSpec::Keyed`] table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedLine {
    pub key: String,
    #[serde(default = "default_coefficient")]
    pub coefficient: f64,
}

fn default_coefficient() -> f64 {
    1.0
}

/// How lines share a free variable for one quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConstraintSpec {
    /// Every line has its own free variable
    #[default]
    Independent,

    /// Lines with equal attribute value share a variable
    ByAttribute(LineAttribute),

    /// Named groups of line identifiers; unlisted lines stay independent
    Explicit(BTreeMap<String, Vec<String>>),

    /// Per-line group key and coefficient; unlisted lines stay independent
    Keyed(BTreeMap<String, KeyedLine>),

    /// Already compiled table: `membership[group][line]` over active lines in wavelength order
    Precompiled {
        groups: Vec<String>,
        membership: Vec<Vec<bool>>,
        #[serde(default)]
        coefficients: Option<Vec<f64>>,
    },
}

impl ConstraintSpec {
    /// Group the given lines explicitly.
    pub fn explicit(groups: &[(&str, &[&str])]) -> Self {
        let table = groups
            .iter()
            .map(|(name, members)| {
                (
                    name.to_string(),
                    members.iter().map(|m| m.to_string()).collect(),
                )
            })
            .collect();
        ConstraintSpec::Explicit(table)
    }
}

/// The full set of constraints handed to the compiler.
///
/// The default is "every line independent, no doubling".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintSet {
    pub amplitude: ConstraintSpec,
    pub width: ConstraintSpec,
    pub shift: ConstraintSpec,
    /// Model every line as a primary and a doublet component
    pub doubling: bool,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amplitude(mut self, spec: ConstraintSpec) -> Self {
        self.amplitude = spec;
        self
    }

    pub fn with_width(mut self, spec: ConstraintSpec) -> Self {
        self.width = spec;
        self
    }

    pub fn with_shift(mut self, spec: ConstraintSpec) -> Self {
        self.shift = spec;
        self
    }

    pub fn with_doubling(mut self, doubling: bool) -> Self {
        self.doubling = doubling;
        self
    }

    pub fn spec(&self, kind: QuantityKind) -> &ConstraintSpec {
        match kind {
            QuantityKind::Amplitude => &self.amplitude,
            QuantityKind::Width => &self.width,
            QuantityKind::Shift => &self.shift,
        }
    }
}
