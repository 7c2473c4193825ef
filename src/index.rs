//! Flat parameter-vector layout.
//!
//! The optimizer works on one flat vector laid out as
//!
//! ```text
//! [background | amplitude groups | width groups | shift groups | (doublet shift, doublet ratio)]
//! ```
//!
//! For every quantity the index stores, per active line, the position of the
//! free variable feeding it (used for model evaluation) and, per group, the
//! member lines (used to sum Jacobian contributions).

use crate::constraints::{CompiledLines, ConstraintDescriptor, QuantityKind};
use crate::error::{Result, SpectraFitError};

/// What a slot of the flat vector represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    Background,
    Amplitude,
    Width,
    Shift,
    DoubletShift,
    DoubletRatio,
}

/// Layout of one quantity's groups inside the flat vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    kind: QuantityKind,
    offset: usize,
    line_to_param: Vec<usize>,
    members: Vec<Vec<usize>>,
}

impl Segment {
    fn new(kind: QuantityKind, offset: usize, descriptor: &ConstraintDescriptor) -> Self {
        let line_to_param = descriptor
            .assignment()
            .iter()
            .map(|&group| offset + group)
            .collect();
        Self {
            kind,
            offset,
            line_to_param,
            members: descriptor.members(),
        }
    }

    pub fn kind(&self) -> QuantityKind {
        self.kind
    }

    /// First flat position of the segment.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of free variables (groups).
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Flat positions covered by the segment.
    pub fn positions(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len()
    }

    /// Flat position of the free variable feeding each line.
    pub fn line_to_param(&self) -> &[usize] {
        &self.line_to_param
    }

    /// Member lines of each group, indexed by group.
    pub fn members(&self) -> &[Vec<usize>] {
        &self.members
    }
}

/// Flat positions of the two doublet scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoubletSlots {
    pub shift: usize,
    pub ratio: usize,
}

/// Immutable index built once per fit configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterIndex {
    n_lines: usize,
    size: usize,
    amplitude: Segment,
    width: Segment,
    shift: Segment,
    doublet: Option<DoubletSlots>,
    amplitude_reference: Vec<usize>,
}

impl ParameterIndex {
    /// Background always sits at position 0.
    pub const BACKGROUND: usize = 0;

    /// Build the layout from the line count, the three descriptors and the doubling flag.
    pub fn build(
        n_lines: usize,
        amplitude: &ConstraintDescriptor,
        width: &ConstraintDescriptor,
        shift: &ConstraintDescriptor,
        doubling: bool,
    ) -> Result<Self> {
        for descriptor in [amplitude, width, shift] {
            if descriptor.line_count() != n_lines {
                return Err(SpectraFitError::Consistency(format!(
                    "{} descriptor covers {} lines, expected {}",
                    descriptor.kind().name(),
                    descriptor.line_count(),
                    n_lines
                )));
            }
        }

        let mut offset = 1;
        let amplitude_segment = Segment::new(QuantityKind::Amplitude, offset, amplitude);
        offset += amplitude_segment.len();
        let width_segment = Segment::new(QuantityKind::Width, offset, width);
        offset += width_segment.len();
        let shift_segment = Segment::new(QuantityKind::Shift, offset, shift);
        offset += shift_segment.len();

        let doublet = if doubling {
            let slots = DoubletSlots {
                shift: offset,
                ratio: offset + 1,
            };
            offset += 2;
            Some(slots)
        } else {
            None
        };

        // Reference line per amplitude group: the member with coefficient closest to one
        let coefs = amplitude.coefficients();
        let amplitude_reference = amplitude_segment
            .members()
            .iter()
            .map(|members| {
                members
                    .iter()
                    .copied()
                    .min_by(|&a, &b| (coefs[a] - 1.0).abs().total_cmp(&(coefs[b] - 1.0).abs()))
                    .unwrap_or(0)
            })
            .collect();

        let index = Self {
            n_lines,
            size: offset,
            amplitude: amplitude_segment,
            width: width_segment,
            shift: shift_segment,
            doublet,
            amplitude_reference,
        };
        index.check_layout(
            1 + amplitude.group_count()
                + width.group_count()
                + shift.group_count()
                + if doubling { 2 } else { 0 },
        )?;
        Ok(index)
    }

    /// Build from compiler output.
    pub fn from_compiled(compiled: &CompiledLines) -> Result<Self> {
        Self::build(
            compiled.line_count(),
            compiled.descriptor(QuantityKind::Amplitude),
            compiled.descriptor(QuantityKind::Width),
            compiled.descriptor(QuantityKind::Shift),
            compiled.doubling(),
        )
    }

    /// Every slot must be covered exactly once and the size must match the declared count.
    fn check_layout(&self, declared: usize) -> Result<()> {
        if self.size != declared {
            return Err(SpectraFitError::Consistency(format!(
                "layout has {} slots but {} free variables were declared",
                self.size, declared
            )));
        }
        let mut covered = vec![0usize; self.size];
        covered[Self::BACKGROUND] += 1;
        for segment in self.segments() {
            for position in segment.positions() {
                covered[position] += 1;
            }
            for (group, members) in segment.members().iter().enumerate() {
                for &line in members {
                    if segment.line_to_param()[line] != segment.offset() + group {
                        return Err(SpectraFitError::Consistency(format!(
                            "{} line {} is not fed by its group slot",
                            segment.kind().name(),
                            line
                        )));
                    }
                }
            }
        }
        if let Some(slots) = self.doublet {
            covered[slots.shift] += 1;
            covered[slots.ratio] += 1;
        }
        if let Some(position) = covered.iter().position(|&c| c != 1) {
            return Err(SpectraFitError::Consistency(format!(
                "slot {} is covered {} times",
                position, covered[position]
            )));
        }
        Ok(())
    }

    /// Length of the flat vector.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn line_count(&self) -> usize {
        self.n_lines
    }

    pub fn segment(&self, kind: QuantityKind) -> &Segment {
        match kind {
            QuantityKind::Amplitude => &self.amplitude,
            QuantityKind::Width => &self.width,
            QuantityKind::Shift => &self.shift,
        }
    }

    /// Segments in layout order.
    pub fn segments(&self) -> [&Segment; 3] {
        [&self.amplitude, &self.width, &self.shift]
    }

    pub fn doublet(&self) -> Option<DoubletSlots> {
        self.doublet
    }

    pub fn is_doubled(&self) -> bool {
        self.doublet.is_some()
    }

    /// Reference line of each amplitude group.
    pub fn amplitude_reference(&self) -> &[usize] {
        &self.amplitude_reference
    }

    /// Role of every slot, in flat order.
    pub fn roles(&self) -> Vec<ParamRole> {
        let mut roles = vec![ParamRole::Background; self.size];
        for segment in self.segments() {
            let role = match segment.kind() {
                QuantityKind::Amplitude => ParamRole::Amplitude,
                QuantityKind::Width => ParamRole::Width,
                QuantityKind::Shift => ParamRole::Shift,
            };
            for position in segment.positions() {
                roles[position] = role;
            }
        }
        if let Some(slots) = self.doublet {
            roles[slots.shift] = ParamRole::DoubletShift;
            roles[slots.ratio] = ParamRole::DoubletRatio;
        }
        roles
    }
}
