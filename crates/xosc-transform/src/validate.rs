//! Schema validation gate
//!
//! A [`SchemaValidator`] is the black-box conformance check; the
//! [`ValidationGate`] owns the policy around it: every transformed document
//! is serialized and checked before it may be written, rejections carry the
//! validator's reason, and an unusable schema is reported separately so a
//! batch can stop.

use crate::error::GateError;
use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use xosc_model::{parse_tree, ScenarioDocument};

/// Result of one validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(String),
    SchemaUnavailable(String),
}

/// Conformance check against an external schema
#[cfg_attr(test, mockall::automock)]
pub trait SchemaValidator: Send + Sync {
    /// Validate serialized document text
    fn validate(&self, xml: &str) -> Verdict;

    /// Check that the schema resource can be used
    ///
    /// # Errors
    /// Returns the reason the schema is unusable.
    fn check_schema(&self) -> Result<(), String>;
}

/// Runs `xmllint --noout --schema <xsd> -`
#[derive(Debug, Clone)]
pub struct XmllintValidator {
    schema: PathBuf,
    program: PathBuf,
}

impl XmllintValidator {
    #[must_use]
    pub fn new(schema: impl Into<PathBuf>) -> Self {
        Self {
            schema: schema.into(),
            program: PathBuf::from("xmllint"),
        }
    }

    /// Use a different executable
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Path {
        &self.schema
    }

    fn run(&self, xml: &str) -> std::io::Result<std::process::Output> {
        let mut child = Command::new(&self.program)
            .arg("--noout")
            .arg("--schema")
            .arg(&self.schema)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdin = child.stdin.take();
        std::thread::scope(|scope| {
            scope.spawn(move || {
                if let Some(mut stdin) = stdin {
                    // a broken pipe also surfaces through the exit status
                    if let Err(e) = stdin.write_all(xml.as_bytes()) {
                        tracing::debug!(error = %e, "validator closed stdin early");
                    }
                }
            });
            child.wait_with_output()
        })
    }
}

impl SchemaValidator for XmllintValidator {
    fn validate(&self, xml: &str) -> Verdict {
        if let Err(reason) = self.check_schema() {
            return Verdict::SchemaUnavailable(reason);
        }
        let output = match self.run(xml) {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Verdict::SchemaUnavailable(format!(
                    "{} not found",
                    self.program.display()
                ));
            }
            Err(e) => return Verdict::Invalid(format!("validator failed to run: {e}")),
        };
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => Verdict::Valid,
            // schema failed to compile
            Some(5) => Verdict::SchemaUnavailable(stderr),
            Some(code) => Verdict::Invalid(if stderr.is_empty() {
                format!("xmllint exited with status {code}")
            } else {
                stderr
            }),
            None => Verdict::Invalid("xmllint terminated by signal".to_string()),
        }
    }

    fn check_schema(&self) -> Result<(), String> {
        if self.schema.is_file() {
            Ok(())
        } else {
            Err(format!("schema not found: {}", self.schema.display()))
        }
    }
}

/// Root names accepted by the vocabulary check
const ROOT_NAMES: [&str; 2] = ["OpenSCENARIO", "OpenScenario"];

/// Offline gate: every element must be declared by the schema
#[derive(Debug, Clone)]
pub struct VocabularyValidator {
    declared: Result<HashSet<String>, String>,
}

impl VocabularyValidator {
    /// Load declared element names from a schema file.
    ///
    /// A missing or malformed schema is remembered and reported as
    /// [`Verdict::SchemaUnavailable`].
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let declared = fs::read_to_string(path)
            .map_err(|e| format!("cannot read schema {}: {e}", path.display()))
            .and_then(|text| {
                declared_elements(&text)
                    .map_err(|e| format!("cannot parse schema {}: {e}", path.display()))
            });
        Self { declared }
    }

    /// Build from schema text.
    ///
    /// # Errors
    /// Returns [`xosc_model::ParseError`] if the schema is not well-formed.
    pub fn from_schema_text(text: &str) -> Result<Self, xosc_model::ParseError> {
        Ok(Self {
            declared: Ok(declared_elements(text)?),
        })
    }

    /// Declared element names, if the schema loaded
    #[must_use]
    pub fn declared(&self) -> Option<&HashSet<String>> {
        self.declared.as_ref().ok()
    }
}

/// Every `xs:element` `name` and `ref` (local part) in a schema
///
/// # Errors
/// Returns [`xosc_model::ParseError`] if the schema is not well-formed.
pub fn declared_elements(schema: &str) -> Result<HashSet<String>, xosc_model::ParseError> {
    let tree = parse_tree(schema)?;
    let root = tree.root();
    let mut names = HashSet::new();
    for id in tree.descendants_named(root, "element") {
        if let Some(name) = tree.attr(id, "name") {
            names.insert(name.to_string());
        }
        if let Some(reference) = tree.attr(id, "ref") {
            let local = reference.rsplit(':').next().unwrap_or(reference);
            names.insert(local.to_string());
        }
    }
    Ok(names)
}

impl SchemaValidator for VocabularyValidator {
    fn validate(&self, xml: &str) -> Verdict {
        let declared = match &self.declared {
            Ok(declared) => declared,
            Err(reason) => return Verdict::SchemaUnavailable(reason.clone()),
        };
        let tree = match parse_tree(xml) {
            Ok(tree) => tree,
            Err(e) => return Verdict::Invalid(e.to_string()),
        };
        let root = tree.root();
        let root_name = tree.local_name(root).unwrap_or_default();
        if !ROOT_NAMES.contains(&root_name) {
            return Verdict::Invalid(format!("unexpected root element '{root_name}'"));
        }
        for id in std::iter::once(root).chain(tree.descendant_elements(root)) {
            if let Some(name) = tree.local_name(id) {
                if !declared.contains(name) {
                    return Verdict::Invalid(format!(
                        "element '{name}' is not declared by the schema"
                    ));
                }
            }
        }
        Verdict::Valid
    }

    fn check_schema(&self) -> Result<(), String> {
        self.declared.as_ref().map(|_| ()).map_err(Clone::clone)
    }
}

/// Accept/reject policy around a [`SchemaValidator`]
#[derive(Clone)]
pub struct ValidationGate {
    validator: Arc<dyn SchemaValidator>,
}

impl std::fmt::Debug for ValidationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationGate").finish_non_exhaustive()
    }
}

impl ValidationGate {
    #[must_use]
    pub fn new(validator: Arc<dyn SchemaValidator>) -> Self {
        Self { validator }
    }

    /// Fail fast before a batch if the schema cannot be used.
    ///
    /// # Errors
    /// Returns [`GateError::SchemaUnavailable`].
    pub fn preflight(&self) -> Result<(), GateError> {
        self.validator
            .check_schema()
            .map_err(GateError::SchemaUnavailable)
    }

    /// Validate raw document text.
    ///
    /// # Errors
    /// Returns [`GateError::Rejected`] or [`GateError::SchemaUnavailable`].
    pub fn check(&self, xml: &str) -> Result<(), GateError> {
        match self.validator.validate(xml) {
            Verdict::Valid => Ok(()),
            Verdict::Invalid(reason) => Err(GateError::Rejected(reason)),
            Verdict::SchemaUnavailable(reason) => Err(GateError::SchemaUnavailable(reason)),
        }
    }

    /// Serialize and validate a transformed document, returning the accepted
    /// text.
    ///
    /// # Errors
    /// Returns [`GateError`] if serialization or validation fails.
    pub fn admit(&self, doc: &ScenarioDocument) -> Result<String, GateError> {
        let xml = doc.to_xml()?;
        self.check(&xml)?;
        Ok(xml)
    }
}
