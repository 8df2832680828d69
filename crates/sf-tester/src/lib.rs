//! Monte-Carlo coverage harness for branching stories.
//!
//! The [`LineTagger`] marks every authored line in a parsed story so the
//! runtime hands source identities back as tags. [`play_run`] walks one
//! random playthrough, and [`run_session`] folds many of them into a
//! [`FuzzReport`].

mod aggregate;
mod diagnostics;
mod driver;
mod export;
mod options;
mod report;
mod session;
mod source;
mod tagger;

pub use aggregate::{RunVisitSet, VisitCounter};
pub use diagnostics::{classify_diagnostic, is_out_of_content_diagnostic, DiagnosticClass};
pub use driver::{play_run, RunEnding, RunOutcome};
pub use export::{render_csv, render_json, write_csv, write_json};
pub use options::FuzzOptions;
pub use report::{CoverageSummary, FuzzReport, OutOfContentIncident, VisitReportEntry};
pub use session::{fuzz_engine, run_session, run_session_with_sources};
pub use source::read_story_sources;
pub use tagger::{marker_tag, LineRoster, LineTagger, SourceUnit, LINE_TAG_PREFIX};

use std::path::PathBuf;

use sf_core::StoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FuzzError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No .ink files under {path}.")]
    SourceEmpty { path: PathBuf },
    #[error("No story file specified.")]
    StoryFileUnset,
    #[error("Can't find story file \"{story_file}\".")]
    StoryFileMissing { story_file: String },
    #[error("Story \"{story_file}\" failed to compile:\n{}", .diagnostics.join("\n"))]
    Compile {
        story_file: String,
        diagnostics: Vec<String>,
    },
    #[error("Story variable \"{name}\" does not exist, so it can't be set. Check the test variable name.")]
    UnknownVariable { name: String },
    #[error("Run count must be at least 1.")]
    InvalidRunCount,
    #[error("Max choices must be at least 1 when set.")]
    InvalidMaxChoices,
    #[error("Run {run}: {message}")]
    Runtime { run: usize, message: String },
    #[error("Run {run} exceeded max steps ({max_steps}).")]
    StepLimitExceeded { run: usize, max_steps: usize },
    #[error("Engine error: {0}")]
    Engine(#[from] StoryError),
    #[error("Failed to write report {path}: {source}")]
    WriteReport {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize report: {0}")]
    Serialize(serde_json::Error),
}

impl FuzzError {
    /// Stable machine-readable code printed by the CLI.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "FUZZ_SOURCE_READ",
            Self::SourceEmpty { .. } => "FUZZ_SOURCE_EMPTY",
            Self::StoryFileUnset => "FUZZ_STORY_FILE_UNSET",
            Self::StoryFileMissing { .. } => "FUZZ_STORY_FILE_MISSING",
            Self::Compile { .. } => "FUZZ_COMPILE",
            Self::UnknownVariable { .. } => "FUZZ_TEST_VAR_UNKNOWN",
            Self::InvalidRunCount => "FUZZ_RUNS_INVALID",
            Self::InvalidMaxChoices => "FUZZ_MAX_CHOICES_INVALID",
            Self::Runtime { .. } => "FUZZ_RUNTIME",
            Self::StepLimitExceeded { .. } => "FUZZ_MAX_STEPS",
            Self::Engine(_) => "FUZZ_ENGINE",
            Self::WriteReport { .. } => "FUZZ_REPORT_WRITE",
            Self::Serialize(_) => "FUZZ_REPORT_SERIALIZE",
        }
    }
}
