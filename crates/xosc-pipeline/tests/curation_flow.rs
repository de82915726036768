//! End-to-end curation: reduce a corpus, build a dataset from it, reverse it,
//! then check every document it holds.

use async_trait::async_trait;
use std::fs;
use xosc_pipeline::{
    build_dataset, check_dataset, load_records, resolve_dataset_path, reverse_dataset,
    BatchRunner, CheckReport, GenerateError, PipelineConfig, Stage, TextGenerator,
    ValidatorKind,
};
use xosc_test_utils::{fixture_schema, two_vehicle_scenario, Cap, ScenarioBuilder};
use xosc_transform::ValidationGate;

struct Echo;

#[async_trait]
impl TextGenerator for Echo {
    async fn generate(&self, _system: &str, user: &str) -> Result<String, GenerateError> {
        let entities = user.lines().filter(|l| l.starts_with("- ")).count();
        Ok(format!("A scene with {entities} listed items."))
    }
}

#[tokio::test]
async fn reduced_corpus_becomes_a_checked_dataset() {
    let work = tempfile::tempdir().unwrap();
    let schema = work.path().join("schema.xsd");
    fs::write(&schema, fixture_schema(&[])).unwrap();

    let corpus = work.path().join("corpus");
    fs::create_dir(&corpus).unwrap();
    fs::write(corpus.join("Town04_follow.xosc"), two_vehicle_scenario().build()).unwrap();
    fs::write(
        corpus.join("Town01_walk.xosc"),
        ScenarioBuilder::new()
            .ego()
            .entity("walker", Cap::Pedestrian)
            .environment("2022-05-05T08:00:00")
            .story("only", &[("mg", &["walker"])])
            .build(),
    )
    .unwrap();

    let config = PipelineConfig::default()
        .with_schema_path(&schema)
        .with_validator(ValidatorKind::Vocabulary);
    let gate = ValidationGate::new(config.build_validator());
    let reduced = work.path().join("reduced");
    let report = BatchRunner::new(gate.clone(), config.injection.clone())
        .unwrap()
        .run(Stage::Reduce, &corpus, &reduced)
        .unwrap();
    assert_eq!((report.total, report.written), (2, 2));

    let dataset = work.path().join("dataset").join("all.jsonl");
    let errors = work.path().join("error_files.txt");
    let built = build_dataset(&Echo, &reduced, &dataset, &errors).await.unwrap();
    assert_eq!((built.written, built.skipped), (2, 0));
    assert!(built.errors.is_empty());

    let reversed = resolve_dataset_path(&work.path().join("reversed"));
    let summary = reverse_dataset(&dataset, &reversed).unwrap();
    assert_eq!(summary.written, 2);
    let reversed_records = load_records(&reversed).unwrap().records;
    assert!(reversed_records[0].user.contains("<OpenSCENARIO"));

    assert_eq!(
        check_dataset(&gate, &dataset).unwrap(),
        CheckReport {
            total: 2,
            valid: 2,
            ..CheckReport::default()
        }
    );
}

#[test]
fn injection_keeps_documents_valid_under_full_vocabulary() {
    let work = tempfile::tempdir().unwrap();
    let schema = work.path().join("schema.xsd");
    fs::write(&schema, fixture_schema(&[])).unwrap();
    let corpus = work.path().join("corpus");
    fs::create_dir(&corpus).unwrap();
    for i in 0..6 {
        fs::write(
            corpus.join(format!("s{i}.xosc")),
            two_vehicle_scenario().build(),
        )
        .unwrap();
    }

    let config = PipelineConfig::default()
        .with_schema_path(&schema)
        .with_validator(ValidatorKind::Vocabulary);
    let gate = ValidationGate::new(config.build_validator());
    let out = work.path().join("injected");
    let report = BatchRunner::new(gate, xosc_transform::InjectionConfig::always())
        .unwrap()
        .run(Stage::Inject { seed: config.seed }, &corpus, &out)
        .unwrap();
    assert_eq!(report.written, 6);
    for i in 0..6 {
        let text = fs::read_to_string(out.join(format!("s{i}.xosc"))).unwrap();
        assert!(text.contains("walker.pedestrian.0001"));
    }
}
