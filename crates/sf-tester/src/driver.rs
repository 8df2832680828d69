use std::collections::BTreeSet;

use rand::Rng;
use sf_core::NarrativeEngine;
use tracing::{debug, info, warn};

use crate::aggregate::RunVisitSet;
use crate::diagnostics::{classify_diagnostic, incident_error_text, DiagnosticClass};
use crate::options::FuzzOptions;
use crate::report::OutOfContentIncident;
use crate::tagger::LineTagger;
use crate::FuzzError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnding {
    /// No choices left after the last line.
    Finished,
    /// Step limit reached under the soft-stop policy.
    StepLimit,
    /// Out-of-content diagnostic recorded as an incident.
    OutOfContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub visits: RunVisitSet,
    pub steps: usize,
    pub ending: RunEnding,
}

struct LastGood {
    file_name: String,
    line: usize,
    text: String,
}

/// Plays one randomized playthrough on an engine that has already been reset.
///
/// `run` is 1-based and only used for logs and errors. Out-of-content
/// incidents are added to `incidents`, which dedups them.
pub fn play_run<E, R>(
    engine: &mut E,
    tagger: &LineTagger,
    options: &FuzzOptions,
    rng: &mut R,
    run: usize,
    incidents: &mut BTreeSet<OutOfContentIncident>,
) -> Result<RunOutcome, FuzzError>
where
    E: NarrativeEngine + ?Sized,
    R: Rng,
{
    let mut visits = RunVisitSet::new();
    let mut steps = 0usize;
    let mut last_good: Option<LastGood> = None;

    loop {
        while engine.can_continue() {
            if steps >= options.max_steps {
                if options.max_steps_is_error {
                    return Err(FuzzError::StepLimitExceeded {
                        run,
                        max_steps: options.max_steps,
                    });
                }
                info!(run, steps, "max steps reached, halting run");
                return Ok(RunOutcome {
                    visits,
                    steps,
                    ending: RunEnding::StepLimit,
                });
            }
            steps += 1;

            let text = engine.continue_story();
            if let Some(unit) = tagger.lookup(engine.current_tags()) {
                if !options.ooc {
                    visits.record(&unit.file_name, unit.line);
                }
                last_good = Some(LastGood {
                    file_name: unit.file_name.clone(),
                    line: unit.line,
                    text,
                });
            }

            let mut ran_out = false;
            for diagnostic in engine.take_diagnostics() {
                match classify_diagnostic(&diagnostic, options.ooc) {
                    DiagnosticClass::Ignored => {}
                    DiagnosticClass::Warning => {
                        warn!(run, message = %diagnostic.message, "story warning");
                    }
                    DiagnosticClass::OutOfContent => {
                        let incident = OutOfContentIncident {
                            error_text: incident_error_text(&diagnostic.message),
                            last_good_file: last_good
                                .as_ref()
                                .map(|good| good.file_name.clone())
                                .unwrap_or_default(),
                            last_good_line: last_good.as_ref().map(|good| good.line),
                            last_good_text: last_good
                                .as_ref()
                                .map(|good| good.text.trim().to_string())
                                .unwrap_or_default(),
                        };
                        debug!(run, error = %incident.error_text, "out of content");
                        incidents.insert(incident);
                        ran_out = true;
                    }
                    DiagnosticClass::Fatal => {
                        return Err(FuzzError::Runtime {
                            run,
                            message: diagnostic.message,
                        });
                    }
                }
            }

            if ran_out {
                return Ok(RunOutcome {
                    visits,
                    steps,
                    ending: RunEnding::OutOfContent,
                });
            }
        }

        let available = engine.current_choices().len();
        if available == 0 {
            debug!(run, steps, "run finished");
            return Ok(RunOutcome {
                visits,
                steps,
                ending: RunEnding::Finished,
            });
        }

        let limit = options
            .max_choices
            .map_or(available, |max| available.min(max.max(1)));
        let index = rng.gen_range(0..limit);
        engine.choose_choice_index(index)?;
    }
}
