use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sf_compiler::compile_story;
use sf_core::{Diagnostic, NarrativeEngine, StoryValue};
use sf_parser::{normalize_include_path, parse_story};
use sf_runtime::StoryEngine;
use tracing::{debug, info, warn};

use crate::aggregate::VisitCounter;
use crate::driver::play_run;
use crate::options::FuzzOptions;
use crate::report::FuzzReport;
use crate::source::read_story_sources;
use crate::tagger::LineTagger;
use crate::FuzzError;

/// Reads the story folder and fuzzes the configured story file.
pub fn run_session(options: &FuzzOptions) -> Result<FuzzReport, FuzzError> {
    options.validate()?;
    let sources = read_story_sources(&options.folder)?;
    run_session_with_sources(options, &sources)
}

pub fn run_session_with_sources(
    options: &FuzzOptions,
    sources: &BTreeMap<String, String>,
) -> Result<FuzzReport, FuzzError> {
    options.validate()?;

    let story_file = normalize_include_path(&options.story_file);
    if !sources.contains_key(&story_file) {
        return Err(FuzzError::StoryFileMissing { story_file });
    }

    let mut diagnostics = Vec::new();
    let mut story = parse_story(sources, &story_file, &mut diagnostics);
    check_diagnostics(&story_file, &diagnostics)?;

    let mut tagger = LineTagger::new();
    tagger.tag(&mut story);
    debug!(units = tagger.units().len(), "tagged story lines");

    let mut diagnostics = Vec::new();
    let program = compile_story(&story, &mut diagnostics);
    check_diagnostics(&story_file, &diagnostics)?;
    let program = program.ok_or_else(|| FuzzError::Compile {
        story_file: story_file.clone(),
        diagnostics: Vec::new(),
    })?;

    let mut engine = StoryEngine::new(program)?;
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    fuzz_engine(&mut engine, &tagger, sources, options, &mut rng)
}

fn check_diagnostics(story_file: &str, diagnostics: &[Diagnostic]) -> Result<(), FuzzError> {
    for diagnostic in diagnostics.iter().filter(|diagnostic| !diagnostic.is_error()) {
        warn!(story_file, "{}", diagnostic);
    }

    let errors = diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.is_error())
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    if errors.is_empty() {
        return Ok(());
    }
    Err(FuzzError::Compile {
        story_file: story_file.to_string(),
        diagnostics: errors,
    })
}

/// Runs `options.runs` playthroughs on an engine whose lines carry the
/// markers `tagger` inserted, and folds them into a report.
pub fn fuzz_engine<E, R>(
    engine: &mut E,
    tagger: &LineTagger,
    sources: &BTreeMap<String, String>,
    options: &FuzzOptions,
    rng: &mut R,
) -> Result<FuzzReport, FuzzError>
where
    E: NarrativeEngine + ?Sized,
    R: Rng,
{
    options.validate()?;
    info!(
        story_file = %options.story_file,
        runs = options.runs,
        ooc = options.ooc,
        "starting fuzz session"
    );

    let mut counter = VisitCounter::new();
    counter.seed(tagger.roster());
    let mut incidents = BTreeSet::new();

    for run in 1..=options.runs {
        engine.reset_state();
        if let Some(name) = &options.test_var {
            engine
                .set_variable(name, StoryValue::Bool(true))
                .map_err(|_| FuzzError::UnknownVariable { name: name.clone() })?;
        }

        let outcome = play_run(engine, tagger, options, rng, run, &mut incidents)?;
        debug!(run, steps = outcome.steps, ending = ?outcome.ending, "run complete");
        counter.fold(&outcome.visits, tagger.roster());
    }

    let report = FuzzReport::new(
        options.runs,
        options.ooc,
        counter.build_report(sources, options.runs, options.ooc),
        incidents.into_iter().collect(),
    );
    info!(
        lines_visited = report.coverage.lines_visited,
        lines_total = report.coverage.lines_total,
        incidents = report.out_of_content.len(),
        "fuzz session finished"
    );
    Ok(report)
}
