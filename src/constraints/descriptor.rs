//! Compiled constraint descriptor.

use crate::constraints::spec::QuantityKind;
use crate::error::{Result, SpectraFitError};

/// Partition of the active lines into named groups for one quantity.
///
/// `assignment[line]` is the group index of each active line and
/// `coefficients[line]` its value relative to the group's free variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDescriptor {
    kind: QuantityKind,
    groups: Vec<String>,
    assignment: Vec<usize>,
    coefficients: Vec<f64>,
}

impl ConstraintDescriptor {
    /// Build and validate a descriptor.
    pub fn new(
        kind: QuantityKind,
        groups: Vec<String>,
        assignment: Vec<usize>,
        coefficients: Vec<f64>,
    ) -> Result<Self> {
        let descriptor = Self {
            kind,
            groups,
            assignment,
            coefficients,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// One group per line, coefficients 1.
    pub fn independent(kind: QuantityKind, line_ids: &[String]) -> Result<Self> {
        let n = line_ids.len();
        Self::new(kind, line_ids.to_vec(), (0..n).collect(), vec![1.0; n])
    }

    /// Build from a boolean membership table `membership[group][line]`.
    ///
    /// Every column must contain exactly one `true`.
    pub fn from_membership(
        kind: QuantityKind,
        groups: Vec<String>,
        membership: &[Vec<bool>],
        coefficients: Vec<f64>,
    ) -> Result<Self> {
        if membership.len() != groups.len() {
            return Err(SpectraFitError::Configuration(format!(
                "{} table has {} membership rows for {} groups",
                kind.name(),
                membership.len(),
                groups.len()
            )));
        }
        let n_lines = coefficients.len();
        let mut assignment = Vec::with_capacity(n_lines);
        for line in 0..n_lines {
            let mut owner = None;
            for (group, row) in membership.iter().enumerate() {
                if row.len() != n_lines {
                    return Err(SpectraFitError::Configuration(format!(
                        "{} group `{}` has {} columns, expected {}",
                        kind.name(),
                        groups[group],
                        row.len(),
                        n_lines
                    )));
                }
                if row[line] {
                    if owner.is_some() {
                        return Err(SpectraFitError::Configuration(format!(
                            "{} constraint assigns line {} to several groups",
                            kind.name(),
                            line
                        )));
                    }
                    owner = Some(group);
                }
            }
            match owner {
                Some(group) => assignment.push(group),
                None => {
                    return Err(SpectraFitError::Configuration(format!(
                        "{} constraint leaves line {} unassigned",
                        kind.name(),
                        line
                    )))
                }
            }
        }
        Self::new(kind, groups, assignment, coefficients)
    }

    fn validate(&self) -> Result<()> {
        let name = self.kind.name();
        if self.assignment.len() != self.coefficients.len() {
            return Err(SpectraFitError::Configuration(format!(
                "{}: {} assignments but {} coefficients",
                name,
                self.assignment.len(),
                self.coefficients.len()
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for group in &self.groups {
            if !seen.insert(group.as_str()) {
                return Err(SpectraFitError::Configuration(format!(
                    "{}: duplicate group name `{}`",
                    name, group
                )));
            }
        }

        let mut counts = vec![0usize; self.groups.len()];
        for (line, &group) in self.assignment.iter().enumerate() {
            if group >= self.groups.len() {
                return Err(SpectraFitError::Configuration(format!(
                    "{}: line {} points to missing group {}",
                    name, line, group
                )));
            }
            counts[group] += 1;
        }
        if let Some(empty) = counts.iter().position(|&c| c == 0) {
            return Err(SpectraFitError::Configuration(format!(
                "{}: group `{}` has no active line",
                name, self.groups[empty]
            )));
        }

        for (line, &coef) in self.coefficients.iter().enumerate() {
            if !coef.is_finite() {
                return Err(SpectraFitError::Configuration(format!(
                    "{}: coefficient of line {} is not finite ({})",
                    name, line, coef
                )));
            }
            // Widths enter as a denominator of the profile exponent
            if self.kind == QuantityKind::Width && coef <= 0.0 {
                return Err(SpectraFitError::Configuration(format!(
                    "width: coefficient of line {} must be positive, got {}",
                    line, coef
                )));
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> QuantityKind {
        self.kind
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn line_count(&self) -> usize {
        self.assignment.len()
    }

    /// Group index per line.
    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Member lines of each group, in line order.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.groups.len()];
        for (line, &group) in self.assignment.iter().enumerate() {
            members[group].push(line);
        }
        members
    }

    /// Whether several lines actually share a variable.
    pub fn is_reduced(&self) -> bool {
        self.groups.len() < self.assignment.len()
    }
}
