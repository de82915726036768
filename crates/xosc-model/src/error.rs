//! Error types for the document model
//!
//! - Parse operations (text → tree → typed document)
//! - Serialize operations (tree → text)

/// Errors while parsing a scene-description document.
///
/// Parsing is all-or-nothing: any of these means no document was produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Markup is not well-formed
    #[error("syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// Element or attribute name is not valid UTF-8
    #[error("invalid encoding: {0}")]
    Encoding(String),

    /// Input contains no root element
    #[error("document has no root element")]
    Empty,

    /// A second top-level element follows the root
    #[error("multiple root elements: unexpected '{name}'")]
    MultipleRoots { name: String },

    /// Non-whitespace character data outside the root element
    #[error("text outside the root element")]
    TextOutsideRoot,

    /// Input ended with open elements
    #[error("unclosed element '{name}'")]
    Unclosed { name: String },

    /// Two scenario objects share a name
    #[error("duplicate scenario object name '{name}'")]
    DuplicateEntity { name: String },

    /// An environment declares a singleton child more than once
    #[error("environment declares more than one {child}")]
    DuplicateEnvironmentChild { child: &'static str },
}

impl ParseError {
    /// Create syntax error at a byte position
    pub fn syntax(position: u64, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }
}

/// Errors while serializing a document back to text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerializeError {
    /// The XML writer rejected an event
    #[error("write failed: {0}")]
    Write(String),

    /// Produced bytes are not valid UTF-8
    #[error("output is not valid UTF-8: {0}")]
    Encoding(String),
}
