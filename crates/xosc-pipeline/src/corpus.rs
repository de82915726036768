//! Corpus directory helpers

use crate::error::BatchError;
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of scenario documents
pub const DOCUMENT_EXTENSION: &str = "xosc";

/// Scenario documents directly inside `dir`, sorted by path.
///
/// # Errors
/// Returns [`BatchError::Input`] if the directory cannot be read.
pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let input_error = |source| BatchError::Input {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(input_error)? {
        let path = entry.map_err(input_error)?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == DOCUMENT_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Create the output directory if needed.
///
/// # Errors
/// Returns [`BatchError::Output`] on failure.
pub fn prepare_output(dir: &Path) -> Result<(), BatchError> {
    fs::create_dir_all(dir).map_err(|source| BatchError::Output {
        path: dir.to_path_buf(),
        source,
    })
}

/// Final path component as text
#[must_use]
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name without extension
#[must_use]
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_documents_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xosc", "a.xosc", "notes.txt", "c.XOSC.bak"] {
            fs::write(dir.path().join(name), "<x/>").unwrap();
        }
        fs::create_dir(dir.path().join("nested.xosc")).unwrap();
        let names: Vec<_> = list_documents(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["a.xosc", "b.xosc"]);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            list_documents(&dir.path().join("absent")),
            Err(BatchError::Input { .. })
        ));
    }

    #[test]
    fn stem_drops_extension() {
        assert_eq!(file_stem(Path::new("/x/Town04_cut.xosc")), "Town04_cut");
    }
}
