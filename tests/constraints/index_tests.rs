//! Parameter layout over compiled constraints.

use spectrafit_rs::bounds::BoundsConfig;
use spectrafit_rs::constraints::{
    compile, ConstraintSet, ConstraintSpec, LineAttribute, QuantityKind, WavelengthWindow,
};
use spectrafit_rs::index::{ParamRole, ParameterIndex};

use crate::test_helpers::argon_catalog;

fn index(set: &ConstraintSet) -> ParameterIndex {
    let compiled = compile(&argon_catalog(), WavelengthWindow::all(), set).unwrap();
    ParameterIndex::from_compiled(&compiled).unwrap()
}

#[test]
fn test_shared_width_shrinks_segment() {
    let independent = index(&ConstraintSet::default());
    let shared = index(
        &ConstraintSet::new().with_width(ConstraintSpec::explicit(&[("all", &["w", "x", "z"][..])])),
    );

    assert_eq!(independent.size(), 10);
    assert_eq!(shared.size(), 8);
    let width = shared.segment(QuantityKind::Width);
    assert_eq!(width.len(), 1);
    assert!(width.len() < shared.line_count());
    // shift segment moves down behind the single width slot
    assert_eq!(shared.segment(QuantityKind::Shift).positions(), 5..8);
}

#[test]
fn test_doubling_adds_two_slots() {
    for set in [
        ConstraintSet::default(),
        ConstraintSet::new()
            .with_width(ConstraintSpec::ByAttribute(LineAttribute::Ion))
            .with_shift(ConstraintSpec::ByAttribute(LineAttribute::Ion)),
    ] {
        let plain = index(&set);
        let doubled = index(&set.clone().with_doubling(true));
        assert_eq!(doubled.size(), plain.size() + 2);

        let slots = doubled.doublet().unwrap();
        let roles = doubled.roles();
        assert_eq!(roles[slots.shift], ParamRole::DoubletShift);
        assert_eq!(roles[slots.ratio], ParamRole::DoubletRatio);
    }
}

#[test]
fn test_every_slot_gets_bounds_of_its_kind() {
    let index = index(
        &ConstraintSet::new()
            .with_width(ConstraintSpec::ByAttribute(LineAttribute::Ion))
            .with_doubling(true),
    );
    let config = BoundsConfig::default();
    let bounds = config.build(&index).unwrap();
    assert_eq!(bounds.len(), index.size());
    for (bound, role) in bounds.iter().zip(index.roles()) {
        assert_eq!(*bound, config.for_role(role));
    }
}
