use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::FuzzError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FuzzOptions {
    /// Root folder; story paths and includes resolve against it.
    pub folder: PathBuf,
    pub story_file: String,
    pub runs: usize,
    /// Set to `true` after every reset.
    pub test_var: Option<String>,
    pub max_steps: usize,
    /// When false, hitting `max_steps` ends the run quietly.
    pub max_steps_is_error: bool,
    pub ooc: bool,
    pub max_choices: Option<usize>,
    pub seed: Option<u64>,
}

impl Default for FuzzOptions {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            story_file: String::new(),
            runs: 1000,
            test_var: None,
            max_steps: 10_000,
            max_steps_is_error: true,
            ooc: false,
            max_choices: None,
            seed: None,
        }
    }
}

impl FuzzOptions {
    pub fn validate(&self) -> Result<(), FuzzError> {
        if self.story_file.trim().is_empty() {
            return Err(FuzzError::StoryFileUnset);
        }
        if self.runs == 0 {
            return Err(FuzzError::InvalidRunCount);
        }
        if self.max_choices == Some(0) {
            return Err(FuzzError::InvalidMaxChoices);
        }
        Ok(())
    }
}

#[cfg(test)]
mod options_tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = FuzzOptions::default();
        assert_eq!(options.runs, 1000);
        assert_eq!(options.max_steps, 10_000);
        assert!(options.max_steps_is_error);
        assert!(!options.ooc);
        assert_eq!(options.max_choices, None);
        assert_eq!(options.folder, PathBuf::from("."));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut options = FuzzOptions::default();
        assert!(matches!(options.validate(), Err(FuzzError::StoryFileUnset)));

        options.story_file = "main.ink".to_string();
        assert!(options.validate().is_ok());

        options.runs = 0;
        assert!(matches!(options.validate(), Err(FuzzError::InvalidRunCount)));

        options.runs = 1;
        options.max_choices = Some(0);
        assert!(matches!(options.validate(), Err(FuzzError::InvalidMaxChoices)));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: FuzzOptions =
            serde_json::from_str(r#"{"storyFile":"main.ink","runs":5,"ooc":true}"#)
                .expect("options should parse");
        assert_eq!(options.runs, 5);
        assert!(options.ooc);
        assert_eq!(options.max_steps, 10_000);
    }
}
