//! Parallel batch runner
//!
//! Each input file runs its whole stage sequence on a rayon worker with no
//! state shared between documents. Per-document failures are logged and
//! collected; an unusable schema sets a shared abort flag, remaining files are
//! skipped and the batch returns [`BatchError::SchemaUnavailable`].

use crate::corpus::{file_name, list_documents, prepare_output};
use crate::error::{BatchError, StageError};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use xosc_model::ScenarioDocument;
use xosc_transform::{seed_for, InjectionConfig, Injector, Reducer, ValidationGate};

/// Document-rewriting stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Keep originals that validate, unchanged
    Filter,
    /// Reduce, then validate
    Reduce,
    /// Mutate with a per-file seed derived from `seed`, then validate
    Inject { seed: u64 },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter => f.write_str("filter"),
            Self::Reduce => f.write_str("reduce"),
            Self::Inject { .. } => f.write_str("inject"),
        }
    }
}

/// A document that was not written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub file: String,
    pub reason: String,
}

/// Outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub written: usize,
    /// Documents the schema rejected
    pub rejected: usize,
    /// Every document not written, rejections included
    pub failures: Vec<FileFailure>,
}

impl BatchReport {
    /// Documents that failed for a reason other than schema rejection
    #[inline]
    #[must_use]
    pub fn errored(&self) -> usize {
        self.failures.len() - self.rejected
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total:    {}", self.total)?;
        writeln!(f, "Written:  {}", self.written)?;
        writeln!(f, "Rejected: {}", self.rejected)?;
        write!(f, "Errors:   {}", self.errored())?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.file, failure.reason)?;
        }
        Ok(())
    }
}

/// Runs document stages over a directory
#[derive(Debug, Clone)]
pub struct BatchRunner {
    gate: ValidationGate,
    reducer: Reducer,
    injector: Injector,
}

impl BatchRunner {
    /// Create a runner.
    ///
    /// # Errors
    /// Returns [`BatchError::Config`] if the injection rates are invalid.
    pub fn new(gate: ValidationGate, injection: InjectionConfig) -> Result<Self, BatchError> {
        Ok(Self {
            gate,
            reducer: Reducer::new(),
            injector: Injector::new(injection)?,
        })
    }

    /// Run a stage from `input` into `output`.
    ///
    /// # Errors
    /// Returns [`BatchError`] if the directories are unusable or the schema
    /// is unavailable.
    pub fn run(&self, stage: Stage, input: &Path, output: &Path) -> Result<BatchReport, BatchError> {
        self.gate
            .preflight()
            .map_err(|e| BatchError::SchemaUnavailable(e.to_string()))?;
        let files = list_documents(input)?;
        prepare_output(output)?;
        tracing::info!(%stage, files = files.len(), input = %input.display(), "batch started");

        let report = run_files(&files, |path| self.process(stage, path, output))?;
        tracing::info!(%stage, written = report.written, rejected = report.rejected, "batch finished");
        Ok(report)
    }

    fn process(&self, stage: Stage, path: &Path, output: &Path) -> Result<(), StageError> {
        let name = file_name(path);
        let text = fs::read_to_string(path)?;
        let accepted = match stage {
            Stage::Filter => {
                self.gate.check(&text)?;
                text
            }
            Stage::Reduce => {
                let reduction = self.reducer.reduce(ScenarioDocument::parse(&text)?)?;
                tracing::debug!(file = %name, report = %reduction.report, "reduced");
                self.gate.admit(&reduction.document)?
            }
            Stage::Inject { seed } => {
                let mut rng = StdRng::seed_from_u64(seed_for(seed, &name));
                let injection = self
                    .injector
                    .inject(ScenarioDocument::parse(&text)?, &mut rng)?;
                tracing::debug!(file = %name, report = %injection.report, "injected");
                self.gate.admit(&injection.document)?
            }
        };
        fs::write(output.join(&name), accepted)?;
        tracing::info!(file = %name, "written");
        Ok(())
    }
}

/// Apply `process` to every file in parallel and fold the outcomes.
///
/// # Errors
/// Returns [`BatchError::SchemaUnavailable`] if any file hit an unusable
/// schema.
pub(crate) fn run_files<F>(files: &[PathBuf], process: F) -> Result<BatchReport, BatchError>
where
    F: Fn(&Path) -> Result<(), StageError> + Sync,
{
    let abort = AtomicBool::new(false);
    let fatal: Mutex<Option<String>> = Mutex::new(None);

    let outcomes: Vec<(String, Option<Result<(), StageError>>)> = files
        .par_iter()
        .map(|path| {
            let name = file_name(path);
            if abort.load(Ordering::Acquire) {
                return (name, None);
            }
            let result = process(path);
            if let Some(reason) = result.as_ref().err().and_then(StageError::fatal_reason) {
                abort.store(true, Ordering::Release);
                fatal.lock().get_or_insert_with(|| reason.to_string());
            }
            (name, Some(result))
        })
        .collect();

    if let Some(reason) = fatal.into_inner() {
        tracing::error!(%reason, "schema unavailable, batch aborted");
        return Err(BatchError::SchemaUnavailable(reason));
    }

    let mut report = BatchReport {
        total: files.len(),
        ..BatchReport::default()
    };
    for (file, outcome) in outcomes {
        match outcome {
            Some(Ok(())) => report.written += 1,
            Some(Err(err)) => {
                if err.is_rejection() {
                    report.rejected += 1;
                    tracing::warn!(%file, reason = %err, "rejected");
                } else {
                    tracing::warn!(%file, error = %err, "failed");
                }
                report.failures.push(FileFailure {
                    file,
                    reason: err.to_string(),
                });
            }
            None => {}
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use xosc_test_utils::{fixture_schema, two_vehicle_scenario, Cap, ScenarioBuilder};
    use xosc_transform::{GateError, VocabularyValidator};

    fn gate(excluding: &[&str]) -> ValidationGate {
        let validator =
            VocabularyValidator::from_schema_text(&fixture_schema(excluding)).unwrap();
        ValidationGate::new(Arc::new(validator))
    }

    fn runner(excluding: &[&str]) -> BatchRunner {
        BatchRunner::new(gate(excluding), InjectionConfig::default()).unwrap()
    }

    struct Corpus {
        input: tempfile::TempDir,
        output: tempfile::TempDir,
    }

    fn corpus(files: &[(&str, String)]) -> Corpus {
        let input = tempfile::tempdir().unwrap();
        for (name, text) in files {
            fs::write(input.path().join(name), text).unwrap();
        }
        Corpus {
            input,
            output: tempfile::tempdir().unwrap(),
        }
    }

    #[test]
    fn filter_keeps_valid_originals_verbatim() {
        let valid = two_vehicle_scenario().build();
        let c = corpus(&[
            ("a.xosc", valid.clone()),
            ("b.xosc", "<OpenSCENARIO><Bogus/></OpenSCENARIO>".to_string()),
        ]);
        let report = runner(&[])
            .run(Stage::Filter, c.input.path(), c.output.path())
            .unwrap();
        assert_eq!((report.total, report.written, report.rejected), (2, 1, 1));
        assert_eq!(report.failures[0].file, "b.xosc");
        assert_eq!(fs::read_to_string(c.output.path().join("a.xosc")).unwrap(), valid);
        assert!(!c.output.path().join("b.xosc").exists());
    }

    #[test]
    fn reduce_writes_reduced_documents_and_records_parse_errors() {
        let c = corpus(&[
            ("ok.xosc", two_vehicle_scenario().build()),
            ("broken.xosc", "<OpenSCENARIO>".to_string()),
        ]);
        let report = runner(&[])
            .run(Stage::Reduce, c.input.path(), c.output.path())
            .unwrap();
        assert_eq!((report.written, report.rejected, report.errored()), (1, 0, 1));
        let text = fs::read_to_string(c.output.path().join("ok.xosc")).unwrap();
        let doc = ScenarioDocument::parse(&text).unwrap();
        assert!(doc.entity("v2").is_none());
        assert_eq!(doc.stories().len(), 1);
    }

    #[test]
    fn inject_is_reproducible_per_file() {
        let text = ScenarioBuilder::new()
            .ego()
            .entity("v1", Cap::Vehicle)
            .environment("2020-01-01T10:00:00")
            .build();
        let first = corpus(&[("s.xosc", text.clone()), ("t.xosc", text.clone())]);
        let second = corpus(&[("s.xosc", text)]);
        let runner = runner(&[]);
        runner
            .run(Stage::Inject { seed: 42 }, first.input.path(), first.output.path())
            .unwrap();
        runner
            .run(Stage::Inject { seed: 42 }, second.input.path(), second.output.path())
            .unwrap();
        let read = |dir: &tempfile::TempDir| fs::read_to_string(dir.path().join("s.xosc")).unwrap();
        assert_eq!(read(&first.output), read(&second.output));
    }

    #[test]
    fn rejected_mutation_is_discarded() {
        let c = corpus(&[("s.xosc", two_vehicle_scenario().build())]);
        let report = BatchRunner::new(gate(&["BoundingBox"]), InjectionConfig::always())
            .unwrap()
            .run(Stage::Inject { seed: 1 }, c.input.path(), c.output.path())
            .unwrap();
        assert_eq!((report.written, report.rejected), (0, 1));
        assert!(!c.output.path().join("s.xosc").exists());
    }

    #[test]
    fn missing_schema_aborts_before_work() {
        let c = corpus(&[("s.xosc", two_vehicle_scenario().build())]);
        let gate = ValidationGate::new(Arc::new(VocabularyValidator::load(
            &c.input.path().join("missing.xsd"),
        )));
        let err = BatchRunner::new(gate, InjectionConfig::default())
            .unwrap()
            .run(Stage::Filter, c.input.path(), c.output.path())
            .unwrap_err();
        assert!(matches!(err, BatchError::SchemaUnavailable(_)));
        assert!(!c.output.path().join("s.xosc").exists());
    }

    #[test]
    fn schema_failure_mid_batch_aborts() {
        let files: Vec<PathBuf> = (0..8).map(|i| PathBuf::from(format!("{i}.xosc"))).collect();
        let result = run_files(&files, |path| {
            if path.ends_with("3.xosc") {
                Err(GateError::SchemaUnavailable("compile error".into()).into())
            } else {
                Ok(())
            }
        });
        assert!(matches!(
            result,
            Err(BatchError::SchemaUnavailable(reason)) if reason == "compile error"
        ));
    }

    #[test]
    fn report_display_lists_failures() {
        let report = BatchReport {
            total: 2,
            written: 1,
            rejected: 1,
            failures: vec![FileFailure {
                file: "b.xosc".into(),
                reason: "bad".into(),
            }],
        };
        let text = report.to_string();
        assert!(text.contains("Rejected: 1"));
        assert!(text.ends_with("b.xosc: bad"));
    }
}
