//! Dataset records and the stages that build, reverse and check them
//!
//! A dataset is a JSONL file of [`DatasetRecord`]s. In a generator record
//! `user` is a scene description and `assistant` the full document text; a
//! reversed record swaps the two for training the analyst direction.

use crate::corpus::{file_name, file_stem, list_documents};
use crate::error::DatasetError;
use crate::generate::TextGenerator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use xosc_model::{ContentHash, ScenarioDocument};
use xosc_transform::{extract, GateError, ValidationGate};

/// System prompt of generator records (description → document)
pub const GENERATOR_PROMPT: &str = "Act as an OpenSCENARIO 1.0 generator for ADS testing in CARLA. \
I will give you a scene description in English and you must return one valid .xosc file, XML only, encoded in UTF-8, starting with <OpenScenario> and ending with </OpenScenario>. \
The file must be schema-compliant, and executable in CARLA without modifications. \
The scenario must include: the map (<RoadNetwork>), <Environment> with <TimeOfDay> and <Weather>, exactly one ego vehicle, any other entities with unique names, initial positions using <WorldPosition>, and a valid <Storyboard> with deterministic triggers/events/actions. \
Use realistic defaults if details are missing (no randomness), but never omit these features. \
No comments or extra text, only the .xosc.";

const ANALYST_REQUIREMENTS: &str = "Your task is to produce ONE natural-language description of the scene for an LLM dataset that will regenerate the scenario. \
Requirements: English only; 4-5 sentences; 50-100 words; natural wording (e.g., 'a red traffic light', not XML tag names); \
mention vehicles/pedestrians/weather/time of day/speed limits/initial positions/paths/events/triggers if present; \
specify temporal/spatial constraints when present; no code, no XML, only plain text description.";

/// System prompt sent with a digest to obtain a description
#[must_use]
pub fn describer_prompt() -> String {
    format!(
        "Act as an OpenSCENARIO 1.0 scenario analyst for the CARLA simulator. \
I will provide a structured summary of a valid .xosc file. {ANALYST_REQUIREMENTS}"
    )
}

/// System prompt of reversed records (document → description)
#[must_use]
pub fn analyst_prompt() -> String {
    format!(
        "Act as an OpenSCENARIO 1.0 scenario analyst for the CARLA simulator. \
I will provide a valid .xosc file. {ANALYST_REQUIREMENTS}"
    )
}

const DIGEST_PREAMBLE: &str = "Here is a compact, structured summary of a valid OpenSCENARIO 1.0 file (.xosc). \
Return ONE description only, as plain text (50-100 words, 4-5 sentences).";

/// Default dataset file name inside an output directory
pub const DATASET_FILE: &str = "all.jsonl";

/// One training example
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetRecord {
    pub system: String,
    pub user: String,
    pub assistant: String,
}

impl DatasetRecord {
    /// Swap `user` and `assistant` under the analyst prompt
    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            system: analyst_prompt(),
            user: self.assistant,
            assistant: self.user,
        }
    }
}

/// Records read from a JSONL file
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub records: Vec<DatasetRecord>,
    /// Non-blank lines that did not decode
    pub malformed: usize,
}

/// Read a JSONL dataset; blank lines are skipped, malformed lines are logged
/// and counted.
///
/// # Errors
/// Returns [`DatasetError::Io`] if the file cannot be read.
pub fn load_records(path: &Path) -> Result<LoadedRecords, DatasetError> {
    let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
    let mut loaded = LoadedRecords::default();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| DatasetError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<DatasetRecord>(line) {
            Ok(record) => loaded.records.push(record),
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "skipping malformed record");
                loaded.malformed += 1;
            }
        }
    }
    Ok(loaded)
}

/// Append-mode JSONL writer, flushed per record
#[derive(Debug)]
pub struct RecordWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl RecordWriter {
    /// Open for appending, creating the file and its directory if needed.
    ///
    /// # Errors
    /// Returns [`DatasetError::Io`] on failure.
    pub fn append(path: &Path) -> Result<Self, DatasetError> {
        Self::open(path, OpenOptions::new().create(true).append(true))
    }

    /// Open truncated.
    ///
    /// # Errors
    /// Returns [`DatasetError::Io`] on failure.
    pub fn create(path: &Path) -> Result<Self, DatasetError> {
        Self::open(path, OpenOptions::new().create(true).write(true).truncate(true))
    }

    fn open(path: &Path, options: &OpenOptions) -> Result<Self, DatasetError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
        }
        let file = options.open(path).map_err(|e| DatasetError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    /// Write one record and flush.
    ///
    /// # Errors
    /// Returns [`DatasetError`] if encoding or writing fails.
    pub fn write(&mut self, record: &DatasetRecord) -> Result<(), DatasetError> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out
            .write_all(b"\n")
            .and_then(|()| self.out.flush())
            .map_err(|e| DatasetError::io(&self.path, e))
    }
}

/// A `.jsonl` argument is a file; anything else is a directory holding
/// [`DATASET_FILE`]
#[must_use]
pub fn resolve_dataset_path(arg: &Path) -> PathBuf {
    let is_file = arg
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("jsonl"));
    if is_file {
        arg.to_path_buf()
    } else {
        arg.join(DATASET_FILE)
    }
}

/// `TownNN.xodr` when the stem names one of Town01..Town14
#[must_use]
pub fn infer_map(stem: &str) -> Option<String> {
    let lower = stem.to_ascii_lowercase();
    (1..=14)
        .map(|i| format!("Town{i:02}"))
        .find(|town| lower.contains(&town.to_ascii_lowercase()))
        .map(|town| format!("{town}.xodr"))
}

/// Outcome of [`build_dataset`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub total: usize,
    pub written: usize,
    /// Already present in the dataset
    pub skipped: usize,
    /// Files that could not be described
    pub errors: Vec<String>,
}

/// Describe every document in `input` and append generator records to
/// `dataset`. Failed file names are written to `error_list` when any occur.
///
/// # Errors
/// Returns [`DatasetError`] if the input directory or the dataset file is
/// unusable.
pub async fn build_dataset(
    generator: &dyn TextGenerator,
    input: &Path,
    dataset: &Path,
    error_list: &Path,
) -> Result<BuildReport, DatasetError> {
    let files = list_documents(input)?;
    let mut seen: HashSet<ContentHash> = if dataset.exists() {
        load_records(dataset)?
            .records
            .iter()
            .map(|r| ContentHash::of_text(&r.assistant))
            .collect()
    } else {
        HashSet::new()
    };
    let mut writer = RecordWriter::append(dataset)?;
    let system = describer_prompt();
    let mut report = BuildReport {
        total: files.len(),
        ..BuildReport::default()
    };

    for (index, path) in files.iter().enumerate() {
        let name = file_name(path);
        let text = match fs::read_to_string(path) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "unreadable, skipping");
                report.errors.push(name);
                continue;
            }
        };
        let hash = ContentHash::of_text(&text);
        if seen.contains(&hash) {
            tracing::info!(file = %name, "already in dataset");
            report.skipped += 1;
            continue;
        }

        let mut digest = match ScenarioDocument::parse(&text) {
            Ok(doc) => extract(&doc),
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "unparseable, skipping");
                report.errors.push(name);
                continue;
            }
        };
        if let Some(map) = infer_map(&file_stem(path)) {
            digest.fill_map(map);
        }
        let user = format!("{DIGEST_PREAMBLE}\n\n{}", digest.render());
        tracing::info!(file = %name, progress = %format!("{}/{}", index + 1, files.len()), "describing");

        match generator.generate(&system, &user).await {
            Ok(description) => {
                writer.write(&DatasetRecord {
                    system: GENERATOR_PROMPT.to_string(),
                    user: description,
                    assistant: text,
                })?;
                seen.insert(hash);
                report.written += 1;
            }
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "description failed");
                report.errors.push(name);
            }
        }
    }

    if !report.errors.is_empty() {
        fs::write(error_list, report.errors.join("\n"))
            .map_err(|e| DatasetError::io(error_list, e))?;
        tracing::info!(count = report.errors.len(), path = %error_list.display(), "error list written");
    }
    Ok(report)
}

/// Outcome of [`reverse_dataset`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReverseReport {
    /// Non-blank input lines
    pub total: usize,
    pub written: usize,
}

/// Write the reversed form of every record in `input` to `output`.
///
/// # Errors
/// Returns [`DatasetError`] if either file is unusable.
pub fn reverse_dataset(input: &Path, output: &Path) -> Result<ReverseReport, DatasetError> {
    let loaded = load_records(input)?;
    let mut writer = RecordWriter::create(output)?;
    let mut report = ReverseReport {
        total: loaded.records.len() + loaded.malformed,
        written: 0,
    };
    for record in loaded.records {
        writer.write(&record.reversed())?;
        report.written += 1;
    }
    Ok(report)
}

/// Outcome of [`check_dataset`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Records with an empty `assistant`
    pub skipped: usize,
    /// Lines that did not decode
    pub malformed: usize,
}

/// Validate the `assistant` document of every record.
///
/// # Errors
/// Returns [`DatasetError::SchemaUnavailable`] as soon as the schema cannot be
/// used, or [`DatasetError::Io`] if the file is unreadable.
pub fn check_dataset(gate: &ValidationGate, input: &Path) -> Result<CheckReport, DatasetError> {
    gate.preflight()
        .map_err(|e| DatasetError::SchemaUnavailable(e.to_string()))?;
    let loaded = load_records(input)?;
    let mut report = CheckReport {
        total: loaded.records.len(),
        malformed: loaded.malformed,
        ..CheckReport::default()
    };
    for (index, record) in loaded.records.iter().enumerate() {
        let document = record.assistant.trim();
        if document.is_empty() {
            tracing::info!(record = index + 1, "empty document, skipped");
            report.skipped += 1;
            continue;
        }
        match gate.check(document) {
            Ok(()) => report.valid += 1,
            Err(GateError::SchemaUnavailable(reason)) => {
                tracing::error!(%reason, "schema unavailable, check aborted");
                return Err(DatasetError::SchemaUnavailable(reason));
            }
            Err(e) => {
                tracing::warn!(record = index + 1, reason = %e, "invalid document");
                report.invalid += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerateError;
    use crate::generate::MockTextGenerator;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use xosc_test_utils::{fixture_schema, two_vehicle_scenario};
    use xosc_transform::VocabularyValidator;

    /// Replies with a fixed text, failing for prompts containing `fail_on`
    struct Scripted {
        fail_on: Option<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, _system: &str, user: &str) -> Result<String, GenerateError> {
            self.prompts.lock().push(user.to_string());
            match self.fail_on {
                Some(marker) if user.contains(marker) => Err(GenerateError::Other("quota".into())),
                _ => Ok("An ego car follows a lead vehicle.".to_string()),
            }
        }
    }

    fn scripted(fail_on: Option<&'static str>) -> Scripted {
        Scripted {
            fail_on,
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn map_inferred_from_town_token() {
        assert_eq!(infer_map("scenario_town03_night").as_deref(), Some("Town03.xodr"));
        assert_eq!(infer_map("Town10HD_cut").as_deref(), Some("Town10.xodr"));
        assert_eq!(infer_map("Town15"), None);
        assert_eq!(infer_map("highway"), None);
    }

    #[test]
    fn dataset_path_resolution() {
        assert_eq!(
            resolve_dataset_path(Path::new("out/reversed.jsonl")),
            PathBuf::from("out/reversed.jsonl")
        );
        assert_eq!(
            resolve_dataset_path(Path::new("out/reversed")),
            PathBuf::from("out/reversed/all.jsonl")
        );
    }

    #[test]
    fn load_skips_blank_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.jsonl");
        fs::write(
            &path,
            "{\"system\":\"s\",\"user\":\"u\",\"assistant\":\"a\"}\n\n{broken\n{\"user\":\"only\"}\n",
        )
        .unwrap();
        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.malformed, 1);
        assert_eq!(loaded.records[1].assistant, "");
    }

    #[test]
    fn reverse_swaps_fields_and_sets_analyst_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.jsonl");
        let output = resolve_dataset_path(&dir.path().join("reversed"));
        let mut writer = RecordWriter::create(&input).unwrap();
        writer
            .write(&DatasetRecord {
                system: GENERATOR_PROMPT.to_string(),
                user: "description".into(),
                assistant: "<OpenSCENARIO/>".into(),
            })
            .unwrap();
        drop(writer);

        let report = reverse_dataset(&input, &output).unwrap();
        assert_eq!(report, ReverseReport { total: 1, written: 1 });
        let back = load_records(&output).unwrap().records;
        assert_eq!(
            back,
            vec![DatasetRecord {
                system: analyst_prompt(),
                user: "<OpenSCENARIO/>".into(),
                assistant: "description".into(),
            }]
        );
    }

    #[tokio::test]
    async fn build_appends_records_and_skips_known_documents() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dataset = out.path().join("all.jsonl");
        let errors = out.path().join("error_files.txt");
        let text = format!("\n{}\n", two_vehicle_scenario().build());
        fs::write(input.path().join("Town05_a.xosc"), &text).unwrap();

        let generator = scripted(None);
        let first = build_dataset(&generator, input.path(), &dataset, &errors)
            .await
            .unwrap();
        assert_eq!((first.written, first.skipped), (1, 0));
        assert!(generator.prompts.lock()[0].contains("Map: Town04"));

        let second = build_dataset(&generator, input.path(), &dataset, &errors)
            .await
            .unwrap();
        assert_eq!((second.written, second.skipped), (0, 1));

        let records = load_records(&dataset).unwrap().records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].system, GENERATOR_PROMPT);
        assert_eq!(records[0].assistant, text.trim());
        assert!(!errors.exists());
    }

    #[tokio::test]
    async fn build_fills_map_from_file_name_and_lists_failures() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dataset = out.path().join("all.jsonl");
        let errors = out.path().join("error_files.txt");
        fs::write(
            input.path().join("Town07_nomap.xosc"),
            "<OpenSCENARIO><Entities/></OpenSCENARIO>",
        )
        .unwrap();
        fs::write(
            input.path().join("Town02_quota.xosc"),
            "<OpenSCENARIO><Entities/><Storyboard/></OpenSCENARIO>",
        )
        .unwrap();
        fs::write(input.path().join("broken.xosc"), "<OpenSCENARIO>").unwrap();

        let generator = scripted(Some("Town02"));
        let report = build_dataset(&generator, input.path(), &dataset, &errors)
            .await
            .unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(
            report.errors,
            vec!["Town02_quota.xosc".to_string(), "broken.xosc".to_string()]
        );
        assert!(generator
            .prompts
            .lock()
            .iter()
            .any(|p| p.contains("Map: Town07.xodr")));
        assert_eq!(
            fs::read_to_string(&errors).unwrap(),
            "Town02_quota.xosc\nbroken.xosc"
        );
    }

    #[tokio::test]
    async fn build_sends_digest_under_describer_prompt() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(input.path().join("a.xosc"), two_vehicle_scenario().build()).unwrap();

        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .withf(|system, user| {
                system == describer_prompt()
                    && user.starts_with(DIGEST_PREAMBLE)
                    && user.contains("Map: Town04")
            })
            .times(1)
            .returning(|_, _| Ok("Two cars on a highway.".to_string()));

        let report = build_dataset(
            &generator,
            input.path(),
            &out.path().join("all.jsonl"),
            &out.path().join("errors.txt"),
        )
        .await
        .unwrap();
        assert_eq!(report.written, 1);
    }

    #[test]
    fn check_counts_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.jsonl");
        let mut writer = RecordWriter::create(&path).unwrap();
        for assistant in [
            two_vehicle_scenario().build(),
            "<OpenSCENARIO><Bogus/></OpenSCENARIO>".to_string(),
            "   ".to_string(),
        ] {
            writer
                .write(&DatasetRecord {
                    assistant,
                    ..DatasetRecord::default()
                })
                .unwrap();
        }
        drop(writer);

        let validator = VocabularyValidator::from_schema_text(&fixture_schema(&[])).unwrap();
        let gate = ValidationGate::new(Arc::new(validator));
        let report = check_dataset(&gate, &path).unwrap();
        assert_eq!(
            report,
            CheckReport {
                total: 3,
                valid: 1,
                invalid: 1,
                skipped: 1,
                malformed: 0,
            }
        );
    }

    #[test]
    fn check_aborts_without_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.jsonl");
        fs::write(&path, "").unwrap();
        let gate = ValidationGate::new(Arc::new(VocabularyValidator::load(
            &dir.path().join("missing.xsd"),
        )));
        assert!(matches!(
            check_dataset(&gate, &path),
            Err(DatasetError::SchemaUnavailable(_))
        ));
    }
}
