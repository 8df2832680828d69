use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::error::StoryError;
use crate::value::StoryValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceItem {
    pub index: usize,
    pub text: String,
}

/// Playback surface the coverage harness drives.
///
/// Runtime problems are not returned from `continue_story`; they are queued
/// as diagnostics and drained with `take_diagnostics` after each step.
pub trait NarrativeEngine {
    /// Rewinds to the initial story state. Callable any number of times.
    fn reset_state(&mut self);

    fn can_continue(&self) -> bool;

    /// Produces the next line of content.
    fn continue_story(&mut self) -> String;

    /// Tags attached to the line most recently produced by `continue_story`.
    fn current_tags(&self) -> &[String];

    fn current_choices(&self) -> &[ChoiceItem];

    fn choose_choice_index(&mut self, index: usize) -> Result<(), StoryError>;

    /// Fails when `name` is not a declared story variable.
    fn set_variable(&mut self, name: &str, value: StoryValue) -> Result<(), StoryError>;

    fn take_diagnostics(&mut self) -> Vec<Diagnostic>;
}
