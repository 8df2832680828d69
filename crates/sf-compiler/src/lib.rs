//! Flattens a [`ParsedStory`] into a [`StoryProgram`]: one instruction list
//! with resolved jump targets. Root content ends the story when it runs out;
//! knot content raises an out-of-content error instead.

use std::collections::{BTreeMap, BTreeSet};

use sf_core::{
    Choice, ChoicePoint, Diagnostic, DisplayPart, DivertTarget, ErrorType, GlobalDeclaration,
    Instruction, ParsedNode, ParsedStory, SourceSpan, StoryProgram,
};

const UNPATCHED: usize = usize::MAX;

/// Returns `None` when any error was reported into `diagnostics`.
pub fn compile_story(
    parsed: &ParsedStory,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<StoryProgram> {
    let mut emitter = Emitter::new(diagnostics);

    let mut globals = Vec::new();
    for global in &parsed.globals {
        if !emitter.declared.insert(global.name.clone()) {
            emitter.error(
                format!("Variable \"{}\" is declared more than once.", global.name),
                &global.span,
            );
            continue;
        }
        globals.push(GlobalDeclaration {
            name: global.name.clone(),
            code: global.expression.code.clone(),
        });
    }

    let mut knot_names = BTreeSet::new();
    for knot in &parsed.knots {
        if !knot_names.insert(knot.name.as_str()) {
            emitter.error(format!("Duplicate knot \"{}\".", knot.name), &knot.span);
        }
    }

    let exits = emitter.compile_list(&parsed.root);
    emitter.patch_to_here(exits);
    emitter.emit(Instruction::End);

    let mut knots = BTreeMap::new();
    for knot in &parsed.knots {
        if knots.contains_key(&knot.name) {
            continue;
        }
        knots.insert(knot.name.clone(), emitter.pc());
        if knot
            .content
            .iter()
            .all(|node| matches!(node, ParsedNode::Newline))
        {
            emitter.diagnostics.push(Diagnostic::at(
                ErrorType::Warning,
                format!("Knot \"{}\" has no content.", knot.name),
                knot.span.clone(),
            ));
        }
        emitter.emit(Instruction::EnterKnot {
            name: knot.name.clone(),
        });
        let exits = emitter.compile_list(&knot.content);
        emitter.patch_to_here(exits);
        emitter.emit(Instruction::OutOfContent);
    }

    let fixups = std::mem::take(&mut emitter.divert_fixups);
    for (pc, name, span) in fixups {
        match knots.get(&name) {
            Some(target) => emitter.patch(pc, *target),
            None => emitter.error(format!("Divert target \"{}\" not found.", name), &span),
        }
    }

    if emitter.failed {
        return None;
    }

    Some(StoryProgram {
        instructions: emitter.instructions,
        globals,
        knots,
    })
}

struct Emitter<'a> {
    instructions: Vec<Instruction>,
    divert_fixups: Vec<(usize, String, SourceSpan)>,
    declared: BTreeSet<String>,
    next_choice_id: usize,
    diagnostics: &'a mut Vec<Diagnostic>,
    failed: bool,
}

impl<'a> Emitter<'a> {
    fn new(diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        Self {
            instructions: Vec::new(),
            divert_fixups: Vec::new(),
            declared: BTreeSet::new(),
            next_choice_id: 0,
            diagnostics,
            failed: false,
        }
    }

    fn error(&mut self, message: impl Into<String>, span: &SourceSpan) {
        self.failed = true;
        self.diagnostics
            .push(Diagnostic::at(ErrorType::Error, message, span.clone()));
    }

    fn pc(&self) -> usize {
        self.instructions.len()
    }

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    fn patch(&mut self, pc: usize, destination: usize) {
        match &mut self.instructions[pc] {
            Instruction::Jump { target } | Instruction::JumpIfFalse { target, .. } => {
                *target = destination;
            }
            Instruction::Choice(point) => point.target = destination,
            other => debug_assert!(false, "instruction {:?} has no jump target", other),
        }
    }

    fn patch_to_here(&mut self, pending: Vec<usize>) {
        let here = self.pc();
        for pc in pending {
            self.patch(pc, here);
        }
    }

    /// Emits one weave level. Returns jumps that must land on whatever
    /// follows the list (loose ends of choice bodies with no later gather).
    fn compile_list(&mut self, nodes: &[ParsedNode]) -> Vec<usize> {
        let mut pending = Vec::new();
        let mut index = 0usize;

        while index < nodes.len() {
            match &nodes[index] {
                ParsedNode::Choice(_) => {
                    let start = index;
                    while matches!(nodes.get(index), Some(ParsedNode::Choice(_))) {
                        index += 1;
                    }
                    let choices = nodes[start..index]
                        .iter()
                        .filter_map(|node| match node {
                            ParsedNode::Choice(choice) => Some(choice.as_ref()),
                            _ => None,
                        })
                        .collect::<Vec<_>>();
                    pending.extend(self.compile_choice_group(&choices));
                }
                ParsedNode::Gather(_) => {
                    self.patch_to_here(std::mem::take(&mut pending));
                    index += 1;
                }
                node => {
                    pending.extend(self.compile_node(node));
                    index += 1;
                }
            }
        }

        pending
    }

    fn compile_choice_group(&mut self, choices: &[&Choice]) -> Vec<usize> {
        let mut choice_pcs = Vec::with_capacity(choices.len());
        for choice in choices {
            let id = self.next_choice_id;
            self.next_choice_id += 1;
            let pc = self.emit(Instruction::Choice(ChoicePoint {
                id,
                once: choice.once,
                condition: choice
                    .condition
                    .as_ref()
                    .map(|expression| expression.code.clone()),
                display: display_parts(choice),
                target: UNPATCHED,
            }));
            choice_pcs.push(pc);
        }
        self.emit(Instruction::WaitForChoice);

        let mut loose_ends = Vec::with_capacity(choices.len());
        for (choice, pc) in choices.iter().zip(choice_pcs) {
            let body = self.pc();
            self.patch(pc, body);
            let mut exits = self.compile_list(&choice.start_content);
            exits.extend(self.compile_list(&choice.inner_content));
            let tail = self.emit(Instruction::Jump { target: UNPATCHED });
            for exit in exits {
                self.patch(exit, tail);
            }
            loose_ends.push(tail);
        }
        loose_ends
    }

    fn compile_node(&mut self, node: &ParsedNode) -> Vec<usize> {
        match node {
            ParsedNode::Text(text) => {
                self.emit(Instruction::Text {
                    text: text.text.clone(),
                });
            }
            ParsedNode::TagStart => {
                self.emit(Instruction::BeginTag);
            }
            ParsedNode::TagEnd => {
                self.emit(Instruction::EndTag);
            }
            ParsedNode::Newline => {
                self.emit(Instruction::Newline);
            }
            ParsedNode::Interpolation(expression) => {
                self.emit(Instruction::Interpolate {
                    code: expression.code.clone(),
                });
            }
            ParsedNode::VariableAssignment(assignment) => {
                if !self.declared.contains(&assignment.name) {
                    self.error(
                        format!(
                            "Variable \"{}\" is not declared. Add VAR {} = ... to the story.",
                            assignment.name, assignment.name
                        ),
                        &assignment.span,
                    );
                }
                self.emit(Instruction::Assign {
                    name: assignment.name.clone(),
                    code: assignment.expression.code.clone(),
                });
            }
            ParsedNode::Conditional(conditional) => {
                let branch = self.emit(Instruction::JumpIfFalse {
                    condition: conditional.condition.code.clone(),
                    target: UNPATCHED,
                });
                let mut exits = self.compile_list(&conditional.then_content);
                if conditional.else_content.is_empty() {
                    let here = self.pc();
                    self.patch(branch, here);
                } else {
                    let skip_else = self.emit(Instruction::Jump { target: UNPATCHED });
                    let else_start = self.pc();
                    self.patch(branch, else_start);
                    exits.extend(self.compile_list(&conditional.else_content));
                    let here = self.pc();
                    self.patch(skip_else, here);
                }
                return exits;
            }
            ParsedNode::Divert(divert) => match &divert.target {
                DivertTarget::Knot { name } => {
                    let pc = self.emit(Instruction::Jump { target: UNPATCHED });
                    self.divert_fixups
                        .push((pc, name.clone(), divert.span.clone()));
                }
                DivertTarget::End | DivertTarget::Done => {
                    self.emit(Instruction::End);
                }
            },
            ParsedNode::Choice(_) | ParsedNode::Gather(_) => {
                // compile_list owns weave structure
            }
        }
        Vec::new()
    }
}

/// Visible choice text: start and choice-only content, without tags.
fn display_parts(choice: &Choice) -> Vec<DisplayPart> {
    let mut parts = Vec::new();
    let mut tag_depth = 0usize;
    for node in choice
        .start_content
        .iter()
        .chain(choice.choice_only_content.iter())
    {
        match node {
            ParsedNode::TagStart => tag_depth += 1,
            ParsedNode::TagEnd => tag_depth = tag_depth.saturating_sub(1),
            ParsedNode::Text(text) if tag_depth == 0 => parts.push(DisplayPart::Text {
                text: text.text.clone(),
            }),
            ParsedNode::Interpolation(expression) if tag_depth == 0 => {
                parts.push(DisplayPart::Interpolate {
                    code: expression.code.clone(),
                })
            }
            _ => {}
        }
    }
    parts
}
