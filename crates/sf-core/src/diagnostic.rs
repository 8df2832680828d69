use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::SourceSpan;

/// Severity of a parser, compiler or runtime diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    /// Notes left for the story author (`TODO:` lines).
    Author,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub severity: ErrorType,
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    pub fn new(severity: ErrorType, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            span: None,
        }
    }

    pub fn at(severity: ErrorType, message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            severity,
            span: Some(span),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Error, message)
    }

    pub fn is_error(&self) -> bool {
        self.severity == ErrorType::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            ErrorType::Author => "TODO",
            ErrorType::Warning => "WARNING",
            ErrorType::Error => "ERROR",
        };
        match &self.span {
            Some(span) => write!(
                f,
                "{}: '{}' line {}: {}",
                label, span.file_name, span.line, self.message
            ),
            None => write!(f, "{}: {}", label, self.message),
        }
    }
}
