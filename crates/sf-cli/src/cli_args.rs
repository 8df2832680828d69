use std::path::PathBuf;

use clap::Parser;
use sf_tester::FuzzOptions;

#[derive(Debug, Parser)]
#[command(name = "storyfuzz")]
#[command(about = "Plays a branching story many times with random choices and reports line coverage")]
pub(crate) struct Cli {
    /// Root folder for story files. Includes resolve against it.
    #[arg(long = "folder", default_value = ".")]
    pub(crate) folder: PathBuf,
    /// Story file to test, relative to the folder.
    #[arg(long = "story-file")]
    pub(crate) story_file: String,
    #[arg(long = "runs", default_value_t = 1000)]
    pub(crate) runs: usize,
    /// Story variable set to true before every run.
    #[arg(long = "test-var")]
    pub(crate) test_var: Option<String>,
    #[arg(long = "max-steps", default_value_t = 10_000)]
    pub(crate) max_steps: usize,
    /// End a run quietly when it reaches the step limit.
    #[arg(long = "soft-step-limit")]
    pub(crate) soft_step_limit: bool,
    /// Record out-of-content errors as incidents instead of failing.
    #[arg(long = "ooc")]
    pub(crate) ooc: bool,
    #[arg(long = "max-choices")]
    pub(crate) max_choices: Option<usize>,
    /// CSV report path, relative to the working directory.
    #[arg(long = "csv")]
    pub(crate) csv: Option<PathBuf>,
    #[arg(long = "json")]
    pub(crate) json: Option<PathBuf>,
    #[arg(long = "seed")]
    pub(crate) seed: Option<u64>,
    /// Log filter, e.g. `debug` or `sf_tester=trace`. Falls back to RUST_LOG.
    #[arg(long = "log")]
    pub(crate) log: Option<String>,
}

impl Cli {
    pub(crate) fn fuzz_options(&self) -> FuzzOptions {
        FuzzOptions {
            folder: self.folder.clone(),
            story_file: self.story_file.clone(),
            runs: self.runs,
            test_var: self.test_var.clone(),
            max_steps: self.max_steps,
            max_steps_is_error: !self.soft_step_limit,
            ooc: self.ooc,
            max_choices: self.max_choices,
            seed: self.seed,
        }
    }
}
