//! Line selection and constraint compilation.
//!
//! Selects the catalog lines falling inside a wavelength window, sorts them
//! by wavelength and turns each [`ConstraintSpec`] into a validated
//! [`ConstraintDescriptor`] over that active set.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::catalog::{LineCatalog, LineEntry};
use crate::constraints::descriptor::ConstraintDescriptor;
use crate::constraints::spec::{ConstraintSet, ConstraintSpec, QuantityKind};
use crate::error::{Result, SpectraFitError};

/// Inclusive wavelength window, open on a side when `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WavelengthWindow {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl WavelengthWindow {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// No restriction.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, wavelength: f64) -> bool {
        self.min.map_or(true, |min| wavelength >= min)
            && self.max.map_or(true, |max| wavelength <= max)
    }
}

/// A line retained for fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveLine {
    pub id: String,
    pub wavelength: f64,
    pub ion: String,
    pub symbol: String,
    /// Ion mass in kg, NaN when the catalog has none
    pub mass: f64,
}

/// Output of the compiler: the active lines and one descriptor per quantity.
#[derive(Debug, Clone)]
pub struct CompiledLines {
    lines: Vec<ActiveLine>,
    amplitude: ConstraintDescriptor,
    width: ConstraintDescriptor,
    shift: ConstraintDescriptor,
    doubling: bool,
}

impl CompiledLines {
    /// Active lines sorted by ascending wavelength.
    pub fn lines(&self) -> &[ActiveLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn descriptor(&self, kind: QuantityKind) -> &ConstraintDescriptor {
        match kind {
            QuantityKind::Amplitude => &self.amplitude,
            QuantityKind::Width => &self.width,
            QuantityKind::Shift => &self.shift,
        }
    }

    pub fn doubling(&self) -> bool {
        self.doubling
    }

    /// Position of a line identifier among the active lines.
    pub fn position(&self, id: &str) -> Result<usize> {
        self.lines
            .iter()
            .position(|line| line.id == id)
            .ok_or_else(|| SpectraFitError::LineNotFound(id.to_string()))
    }

    /// Rest wavelengths in line order.
    pub fn wavelengths(&self) -> Vec<f64> {
        self.lines.iter().map(|line| line.wavelength).collect()
    }
}

/// Select the active lines and compile every constraint.
pub fn compile(
    catalog: &LineCatalog,
    window: WavelengthWindow,
    constraints: &ConstraintSet,
) -> Result<CompiledLines> {
    let mut selected: Vec<(&str, &LineEntry)> = catalog
        .iter()
        .filter(|(_, entry)| window.contains(entry.wavelength))
        .collect();
    if selected.is_empty() {
        return Err(SpectraFitError::Configuration(format!(
            "no catalog line inside the wavelength window {:?}",
            window
        )));
    }
    // Stable: equal wavelengths keep catalog order
    selected.sort_by(|a, b| a.1.wavelength.total_cmp(&b.1.wavelength));

    let lines: Vec<ActiveLine> = selected
        .iter()
        .map(|(id, entry)| ActiveLine {
            id: id.to_string(),
            wavelength: entry.wavelength,
            ion: entry.ion.clone(),
            symbol: entry.symbol.clone().unwrap_or_else(|| id.to_string()),
            mass: entry.mass.unwrap_or(f64::NAN),
        })
        .collect();

    let amplitude = compile_kind(
        QuantityKind::Amplitude,
        &constraints.amplitude,
        catalog,
        &selected,
    )?;
    let width = compile_kind(QuantityKind::Width, &constraints.width, catalog, &selected)?;
    let shift = compile_kind(QuantityKind::Shift, &constraints.shift, catalog, &selected)?;

    tracing::debug!(
        lines = lines.len(),
        amplitude_groups = amplitude.group_count(),
        width_groups = width.group_count(),
        shift_groups = shift.group_count(),
        doubling = constraints.doubling,
        "compiled line constraints"
    );

    Ok(CompiledLines {
        lines,
        amplitude,
        width,
        shift,
        doubling: constraints.doubling,
    })
}

fn compile_kind(
    kind: QuantityKind,
    spec: &ConstraintSpec,
    catalog: &LineCatalog,
    selected: &[(&str, &LineEntry)],
) -> Result<ConstraintDescriptor> {
    let ids: Vec<String> = selected.iter().map(|(id, _)| id.to_string()).collect();
    let n = ids.len();

    match spec {
        ConstraintSpec::Independent => ConstraintDescriptor::independent(kind, &ids),

        ConstraintSpec::ByAttribute(attribute) => {
            let keys: Vec<String> = selected
                .iter()
                .map(|(id, entry)| attribute.value_of(entry).unwrap_or(*id).to_string())
                .collect();
            let groups: Vec<String> = keys
                .iter()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let assignment = assign_by_name(&groups, &keys);
            let coefficients = selected
                .iter()
                .map(|(_, entry)| entry.coefficient.unwrap_or(1.0))
                .collect();
            ConstraintDescriptor::new(kind, groups, assignment, coefficients)
        }

        ConstraintSpec::Explicit(table) => {
            let active: HashSet<&str> = ids.iter().map(String::as_str).collect();
            let mut owner: HashMap<&str, &str> = HashMap::new();
            for (group, members) in table {
                for member in members {
                    if !catalog.contains(member) {
                        return Err(SpectraFitError::Configuration(format!(
                            "{} group `{}` names unknown line `{}`",
                            kind.name(),
                            group,
                            member
                        )));
                    }
                    if let Some(previous) = owner.insert(member.as_str(), group.as_str()) {
                        return Err(SpectraFitError::Configuration(format!(
                            "{}: line `{}` listed in both `{}` and `{}`",
                            kind.name(),
                            member,
                            previous,
                            group
                        )));
                    }
                }
            }
            // Lines outside the window drop out silently
            owner.retain(|line, _| active.contains(line));
            let keys: Vec<String> = ids
                .iter()
                .map(|id| owner.get(id.as_str()).map_or(id.as_str(), |g| *g).to_string())
                .collect();
            let listed: BTreeSet<&str> = owner.values().copied().collect();
            let singletons: BTreeSet<&str> = ids
                .iter()
                .map(String::as_str)
                .filter(|id| !owner.contains_key(id))
                .collect();
            let groups = ordered_groups(listed, singletons);
            let assignment = assign_by_name(&groups, &keys);
            ConstraintDescriptor::new(kind, groups, assignment, vec![1.0; n])
        }

        ConstraintSpec::Keyed(table) => {
            if let Some(unknown) = table.keys().find(|id| !catalog.contains(id)) {
                return Err(SpectraFitError::Configuration(format!(
                    "{} table names unknown line `{}`",
                    kind.name(),
                    unknown
                )));
            }
            let mut keys = Vec::with_capacity(n);
            let mut coefficients = Vec::with_capacity(n);
            let mut listed = BTreeSet::new();
            let mut singletons = BTreeSet::new();
            for id in &ids {
                match table.get(id) {
                    Some(keyed) => {
                        listed.insert(keyed.key.as_str());
                        keys.push(keyed.key.clone());
                        coefficients.push(keyed.coefficient);
                    }
                    None => {
                        singletons.insert(id.as_str());
                        keys.push(id.clone());
                        coefficients.push(1.0);
                    }
                }
            }
            let groups = ordered_groups(listed, singletons);
            let assignment = assign_by_name(&groups, &keys);
            ConstraintDescriptor::new(kind, groups, assignment, coefficients)
        }

        ConstraintSpec::Precompiled {
            groups,
            membership,
            coefficients,
        } => {
            let coefficients = match coefficients {
                Some(c) if c.len() != n => {
                    return Err(SpectraFitError::Configuration(format!(
                        "{} table has {} coefficients for {} active lines",
                        kind.name(),
                        c.len(),
                        n
                    )))
                }
                Some(c) => c.clone(),
                None => vec![1.0; n],
            };
            ConstraintDescriptor::from_membership(kind, groups.clone(), membership, coefficients)
        }
    }
}

/// Listed group names first, then singleton names, each sorted. A name in
/// both sets is kept twice so the descriptor reports the clash.
fn ordered_groups(listed: BTreeSet<&str>, singletons: BTreeSet<&str>) -> Vec<String> {
    listed
        .into_iter()
        .chain(singletons)
        .map(str::to_string)
        .collect()
}

fn assign_by_name(groups: &[String], keys: &[String]) -> Vec<usize> {
    let position: BTreeMap<&str, usize> = groups
        .iter()
        .enumerate()
        .rev()
        .map(|(i, g)| (g.as_str(), i))
        .collect();
    keys.iter()
        .map(|key| position.get(key.as_str()).copied().unwrap_or(usize::MAX))
        .collect()
}
