//! Digest stage: `<stem>.json` and `<stem>.txt` per document

use crate::batch::{run_files, BatchReport};
use crate::corpus::{file_name, file_stem, list_documents, prepare_output};
use crate::error::{BatchError, StageError};
use std::fs;
use std::path::Path;
use xosc_model::ScenarioDocument;
use xosc_transform::extract;

/// Write the digest and its rendering for every document in `input`.
///
/// # Errors
/// Returns [`BatchError`] if the directories are unusable.
pub fn describe_dir(input: &Path, output: &Path) -> Result<BatchReport, BatchError> {
    let files = list_documents(input)?;
    prepare_output(output)?;
    tracing::info!(files = files.len(), input = %input.display(), "describe started");
    run_files(&files, |path| describe_file(path, output))
}

fn describe_file(path: &Path, output: &Path) -> Result<(), StageError> {
    let doc = ScenarioDocument::parse(&fs::read_to_string(path)?)?;
    let digest = extract(&doc);
    let stem = file_stem(path);
    fs::write(
        output.join(format!("{stem}.json")),
        serde_json::to_string_pretty(&digest)?,
    )?;
    fs::write(output.join(format!("{stem}.txt")), digest.render())?;
    tracing::info!(file = %file_name(path), "described");
    Ok(())
}
