use sf_core::{Diagnostic, ErrorType};

const RUNTIME_ERROR_PREFIX: &str = "RUNTIME ERROR: ";

/// How the run driver treats one engine diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticClass {
    Ignored,
    Warning,
    OutOfContent,
    Fatal,
}

/// Recognises the engine's "ran out of content" family of errors.
pub fn is_out_of_content_diagnostic(message: &str) -> bool {
    message.contains("ran out of content.") || message.contains("end of content.")
}

pub fn classify_diagnostic(diagnostic: &Diagnostic, out_of_content_mode: bool) -> DiagnosticClass {
    match diagnostic.severity {
        ErrorType::Author => DiagnosticClass::Ignored,
        ErrorType::Warning => DiagnosticClass::Warning,
        ErrorType::Error
            if out_of_content_mode && is_out_of_content_diagnostic(&diagnostic.message) =>
        {
            DiagnosticClass::OutOfContent
        }
        ErrorType::Error => DiagnosticClass::Fatal,
    }
}

/// Incident text: the message without its runtime prefix.
pub(crate) fn incident_error_text(message: &str) -> String {
    message
        .strip_prefix(RUNTIME_ERROR_PREFIX)
        .unwrap_or(message)
        .trim()
        .to_string()
}
