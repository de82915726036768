//! Transform-then-gate flows over fixture documents

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use xosc_model::ScenarioDocument;
use xosc_test_utils::{arb_scenario, fixture_schema, two_vehicle_scenario, ScenarioBuilder, WeatherSpec};
use xosc_transform::{
    extract, render, GateError, InjectionConfig, Injector, Reducer, ValidationGate,
    VocabularyValidator,
};

fn gate(excluding: &[&str]) -> ValidationGate {
    let validator = VocabularyValidator::from_schema_text(&fixture_schema(excluding)).unwrap();
    ValidationGate::new(Arc::new(validator))
}

#[test]
fn reduced_reference_scenario_is_admitted_and_reparses() {
    let reduced = Reducer::new()
        .reduce(two_vehicle_scenario().document())
        .unwrap();
    let text = gate(&[]).admit(&reduced.document).unwrap();
    let again = ScenarioDocument::parse(&text).unwrap();
    assert_eq!(again, reduced.document);
}

#[test]
fn injected_precipitation_rejected_by_schema_is_not_admitted() {
    let doc = ScenarioBuilder::new()
        .environment("2020-01-01T00:00:00")
        .weather(WeatherSpec {
            precipitation: None,
            ..WeatherSpec::default()
        })
        .document();
    let gate = gate(&["Precipitation"]);
    assert!(gate.admit(&doc).is_ok());

    let mut rng = StdRng::seed_from_u64(7);
    let injected = Injector::new(InjectionConfig::default())
        .unwrap()
        .inject(doc, &mut rng)
        .unwrap();
    assert!(matches!(
        gate.admit(&injected.document),
        Err(GateError::Rejected(reason)) if reason.contains("Precipitation")
    ));
}

#[test]
fn digest_survives_serialization() {
    let doc = two_vehicle_scenario().document();
    let reparsed = ScenarioDocument::parse(&doc.to_xml().unwrap()).unwrap();
    assert_eq!(render(&extract(&doc)), render(&extract(&reparsed)));
}

proptest! {
    #[test]
    fn injected_documents_pass_or_are_rejected(builder in arb_scenario(), seed in any::<u64>()) {
        let injected = Injector::new(InjectionConfig::always())
            .unwrap()
            .inject(builder.document(), &mut StdRng::seed_from_u64(seed))
            .unwrap();
        prop_assert!(gate(&[]).admit(&injected.document).is_ok());
        let strict = gate(&["BoundingBox"]);
        prop_assert!(matches!(
            strict.admit(&injected.document),
            Err(GateError::Rejected(_))
        ));
    }
}
