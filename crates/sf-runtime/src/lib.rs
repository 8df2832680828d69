//! Interpreter for compiled story programs.

mod eval;

use std::collections::{BTreeMap, BTreeSet};

use sf_core::{
    ChoiceItem, ChoicePoint, Diagnostic, DisplayPart, Instruction, NarrativeEngine, StoryError,
    StoryProgram, StoryValue, ROOT_CONTAINER,
};

use eval::ExpressionEvaluator;

/// Instructions executed by one `continue_story` call before it gives up.
pub const MAX_STEPS_WITHOUT_OUTPUT: usize = 10_000;

const RUNTIME_ERROR_PREFIX: &str = "RUNTIME ERROR: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Running,
    WaitingForChoice,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    Continue,
    LineComplete,
    Stopped,
}

#[derive(Debug, Clone)]
struct PendingChoice {
    id: usize,
    once: bool,
    target: usize,
}

pub struct StoryEngine {
    program: StoryProgram,
    evaluator: ExpressionEvaluator,
    initial_variables: BTreeMap<String, StoryValue>,
    variables: BTreeMap<String, StoryValue>,
    pc: usize,
    container: String,
    status: Status,
    pending: Vec<PendingChoice>,
    choices: Vec<ChoiceItem>,
    taken_once: BTreeSet<usize>,
    tags: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl StoryEngine {
    /// Evaluates `VAR` initialisers in declaration order; later ones may
    /// read earlier ones.
    pub fn new(program: StoryProgram) -> Result<Self, StoryError> {
        let evaluator = ExpressionEvaluator::new();
        let mut initial_variables = BTreeMap::new();
        for global in &program.globals {
            let value = evaluator
                .evaluate(&global.code, &initial_variables)
                .map_err(|error| {
                    StoryError::new(
                        "ENGINE_GLOBAL_INIT",
                        format!(
                            "Variable \"{}\" could not be initialised: {}",
                            global.name, error.message
                        ),
                    )
                })?;
            initial_variables.insert(global.name.clone(), value);
        }

        Ok(Self {
            program,
            evaluator,
            variables: initial_variables.clone(),
            initial_variables,
            pc: 0,
            container: ROOT_CONTAINER.to_string(),
            status: Status::Running,
            pending: Vec::new(),
            choices: Vec::new(),
            taken_once: BTreeSet::new(),
            tags: Vec::new(),
            diagnostics: Vec::new(),
        })
    }

    pub fn variable(&self, name: &str) -> Option<&StoryValue> {
        self.variables.get(name)
    }

    pub fn has_ended(&self) -> bool {
        self.status == Status::Ended
    }

    fn fail(&mut self, message: impl AsRef<str>) {
        self.diagnostics.push(Diagnostic::error(format!(
            "{}'{}': {}",
            RUNTIME_ERROR_PREFIX,
            self.container,
            message.as_ref()
        )));
        self.status = Status::Ended;
    }

    fn evaluate(&self, code: &str) -> Result<StoryValue, StoryError> {
        self.evaluator.evaluate(code, &self.variables)
    }

    fn offer_choice(&mut self, point: &ChoicePoint) -> Result<(), StoryError> {
        if point.once && self.taken_once.contains(&point.id) {
            return Ok(());
        }
        if let Some(condition) = &point.condition {
            if !self.evaluate(condition)?.is_truthy() {
                return Ok(());
            }
        }

        let mut text = String::new();
        for part in &point.display {
            match part {
                DisplayPart::Text { text: value } => text.push_str(value),
                DisplayPart::Interpolate { code } => text.push_str(&self.evaluate(code)?.to_text()),
            }
        }

        self.choices.push(ChoiceItem {
            index: self.choices.len(),
            text: collapse_whitespace(&text),
        });
        self.pending.push(PendingChoice {
            id: point.id,
            once: point.once,
            target: point.target,
        });
        Ok(())
    }

    /// Instructions that never add to the current line. They still run after a
    /// line is complete so choices and endings are visible before the caller
    /// asks `can_continue` again.
    fn next_is_structural(&self) -> bool {
        match self.program.instructions.get(self.pc) {
            None => true,
            Some(instruction) => matches!(
                instruction,
                Instruction::Jump { .. }
                    | Instruction::EnterKnot { .. }
                    | Instruction::Choice(_)
                    | Instruction::WaitForChoice
                    | Instruction::End
                    | Instruction::OutOfContent
            ),
        }
    }

    fn step(
        &mut self,
        line: &mut String,
        tags: &mut Vec<String>,
        tag_buffer: &mut Option<String>,
    ) -> Result<StepOutcome, StoryError> {
        let Some(instruction) = self.program.instructions.get(self.pc).cloned() else {
            self.status = Status::Ended;
            return Ok(StepOutcome::Stopped);
        };
        self.pc += 1;

        match instruction {
            Instruction::Text { text } => match tag_buffer.as_mut() {
                Some(tag) => tag.push_str(&text),
                None => line.push_str(&text),
            },
            Instruction::BeginTag => *tag_buffer = Some(String::new()),
            Instruction::EndTag => {
                if let Some(tag) = tag_buffer.take() {
                    let tag = tag.trim();
                    if !tag.is_empty() {
                        tags.push(tag.to_string());
                    }
                }
            }
            Instruction::Interpolate { code } => {
                let value = self.evaluate(&code)?.to_text();
                match tag_buffer.as_mut() {
                    Some(tag) => tag.push_str(&value),
                    None => line.push_str(&value),
                }
            }
            Instruction::Newline => {
                if !line.trim().is_empty() {
                    return Ok(StepOutcome::LineComplete);
                }
                line.clear();
            }
            Instruction::Assign { name, code } => {
                let value = self.evaluate(&code)?;
                self.variables.insert(name, value);
            }
            Instruction::JumpIfFalse { condition, target } => {
                if !self.evaluate(&condition)?.is_truthy() {
                    self.pc = target;
                }
            }
            Instruction::Jump { target } => self.pc = target,
            Instruction::Choice(point) => self.offer_choice(&point)?,
            Instruction::WaitForChoice => {
                if self.pending.is_empty() {
                    self.fail("no choices available, reached end of content.");
                } else {
                    self.status = Status::WaitingForChoice;
                }
                return Ok(StepOutcome::Stopped);
            }
            Instruction::EnterKnot { name } => self.container = name,
            Instruction::End => {
                self.status = Status::Ended;
                return Ok(StepOutcome::Stopped);
            }
            Instruction::OutOfContent => {
                self.fail("ran out of content. Do you need a '-> DONE' or '-> END'?");
                return Ok(StepOutcome::Stopped);
            }
        }

        Ok(StepOutcome::Continue)
    }
}

impl NarrativeEngine for StoryEngine {
    fn reset_state(&mut self) {
        self.variables = self.initial_variables.clone();
        self.pc = 0;
        self.container = ROOT_CONTAINER.to_string();
        self.status = Status::Running;
        self.pending.clear();
        self.choices.clear();
        self.taken_once.clear();
        self.tags.clear();
        self.diagnostics.clear();
    }

    fn can_continue(&self) -> bool {
        self.status == Status::Running
    }

    fn continue_story(&mut self) -> String {
        self.tags.clear();
        if self.status != Status::Running {
            return String::new();
        }

        let mut line = String::new();
        let mut tags = Vec::new();
        let mut tag_buffer = None;
        let mut steps = 0usize;
        let mut line_complete = false;

        loop {
            if line_complete && !self.next_is_structural() {
                break;
            }
            if steps >= MAX_STEPS_WITHOUT_OUTPUT {
                self.fail(format!(
                    "exceeded {} steps without producing a line.",
                    MAX_STEPS_WITHOUT_OUTPUT
                ));
                break;
            }
            steps += 1;

            match self.step(&mut line, &mut tags, &mut tag_buffer) {
                Ok(StepOutcome::LineComplete) => line_complete = true,
                Ok(StepOutcome::Stopped) => break,
                Ok(StepOutcome::Continue) => {}
                Err(error) => {
                    self.fail(error.message);
                    break;
                }
            }
        }

        self.tags = tags;
        collapse_whitespace(&line)
    }

    fn current_tags(&self) -> &[String] {
        &self.tags
    }

    fn current_choices(&self) -> &[ChoiceItem] {
        &self.choices
    }

    fn choose_choice_index(&mut self, index: usize) -> Result<(), StoryError> {
        if self.status != Status::WaitingForChoice {
            return Err(StoryError::new(
                "ENGINE_NOT_WAITING_CHOICE",
                "No choice is pending.",
            ));
        }
        let Some(chosen) = self.pending.get(index).cloned() else {
            return Err(StoryError::new(
                "ENGINE_CHOICE_INDEX",
                format!(
                    "Choice index {} is out of range ({} choices).",
                    index,
                    self.pending.len()
                ),
            ));
        };

        if chosen.once {
            self.taken_once.insert(chosen.id);
        }
        self.pc = chosen.target;
        self.pending.clear();
        self.choices.clear();
        self.status = Status::Running;
        Ok(())
    }

    fn set_variable(&mut self, name: &str, value: StoryValue) -> Result<(), StoryError> {
        match self.variables.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StoryError::new(
                "ENGINE_VARIABLE_UNKNOWN",
                format!("Variable \"{}\" is not declared.", name),
            )),
        }
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests;
