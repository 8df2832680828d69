use std::collections::BTreeMap;

use super::*;
use sf_compiler::compile_story;
use sf_parser::parse_story;

fn engine_for(source: &str) -> StoryEngine {
    let mut sources = BTreeMap::new();
    sources.insert("main.ink".to_string(), source.to_string());
    let mut diagnostics = Vec::new();
    let parsed = parse_story(&sources, "main.ink", &mut diagnostics);
    let program = compile_story(&parsed, &mut diagnostics)
        .unwrap_or_else(|| panic!("story should compile: {:?}", diagnostics));
    StoryEngine::new(program).expect("engine should initialise")
}

fn drain_lines(engine: &mut StoryEngine) -> Vec<String> {
    let mut lines = Vec::new();
    while engine.can_continue() {
        let line = engine.continue_story();
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

#[test]
fn linear_story_outputs_lines_then_ends() {
    let mut engine = engine_for("Hello.\n   Spaced    out   line.\n-> END\nNever shown.");
    assert_eq!(drain_lines(&mut engine), vec!["Hello.", "Spaced out line."]);
    assert!(engine.has_ended());
    assert!(engine.current_choices().is_empty());
    assert!(engine.take_diagnostics().is_empty());
}

#[test]
fn tags_belong_to_the_line_they_end() {
    let mut engine = engine_for("First #one #two\nSecond\n");
    assert_eq!(engine.continue_story(), "First");
    assert_eq!(engine.current_tags(), ["one".to_string(), "two".to_string()]);
    assert_eq!(engine.continue_story(), "Second");
    assert!(engine.current_tags().is_empty());
}

#[test]
fn choices_are_offered_after_last_line_and_lead_to_gather() {
    let mut engine = engine_for("Pick one.\n* Left\n  You go left.\n* Right\n- Done picking.");
    assert_eq!(engine.continue_story(), "Pick one.");
    assert!(!engine.can_continue());
    let texts = engine
        .current_choices()
        .iter()
        .map(|choice| choice.text.as_str())
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["Left", "Right"]);

    engine.choose_choice_index(0).expect("choice should be accepted");
    assert_eq!(
        drain_lines(&mut engine),
        vec!["Left", "You go left.", "Done picking."]
    );
    assert!(engine.take_diagnostics().is_empty());
}

#[test]
fn once_only_choices_are_consumed_until_reset() {
    let source = "-> hub\n=== hub ===\n* Once -> hub\n+ Always -> hub\n";
    let mut engine = engine_for(source);
    engine.continue_story();
    assert_eq!(engine.current_choices().len(), 2);

    engine.choose_choice_index(0).expect("choice should be accepted");
    assert_eq!(engine.continue_story(), "Once");
    let texts = engine
        .current_choices()
        .iter()
        .map(|choice| choice.text.clone())
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["Always".to_string()]);

    engine.reset_state();
    engine.continue_story();
    assert_eq!(engine.current_choices().len(), 2);
}

#[test]
fn falling_off_a_knot_reports_out_of_content() {
    let mut engine = engine_for("-> cave\n=== cave ===\nIt is dark.\n");
    assert_eq!(engine.continue_story(), "It is dark.");
    assert!(!engine.can_continue());
    let diagnostics = engine.take_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].message,
        "RUNTIME ERROR: 'cave': ran out of content. Do you need a '-> DONE' or '-> END'?"
    );
    assert!(engine.take_diagnostics().is_empty());
}

#[test]
fn exhausted_choices_report_end_of_content() {
    let mut engine = engine_for("-> hub\n=== hub ===\nAgain.\n* Only -> hub\n");
    assert_eq!(engine.continue_story(), "Again.");
    engine.choose_choice_index(0).expect("choice should be accepted");
    assert_eq!(engine.continue_story(), "Only");
    assert_eq!(engine.continue_story(), "Again.");
    assert!(engine.current_choices().is_empty());
    let diagnostics = engine.take_diagnostics();
    assert!(diagnostics[0]
        .message
        .ends_with("'hub': no choices available, reached end of content."));
}

#[test]
fn variables_drive_conditions_and_interpolation() {
    let source = "VAR gold = 5\nVAR testing = false\n{testing: Debug room.|Normal room.}\n~ gold = gold + 2\nGold: {gold}\n* {testing} Cheat\n* Leave\n";
    let mut engine = engine_for(source);
    assert_eq!(engine.continue_story(), "Normal room.");
    assert_eq!(engine.continue_story(), "Gold: 7");
    assert_eq!(engine.current_choices().len(), 1);

    engine.reset_state();
    engine
        .set_variable("testing", StoryValue::Bool(true))
        .expect("declared variable should be settable");
    assert_eq!(engine.continue_story(), "Debug room.");
    assert_eq!(engine.continue_story(), "Gold: 7");
    assert_eq!(engine.current_choices()[0].text, "Cheat");
    assert_eq!(engine.variable("gold"), Some(&StoryValue::Number(7.0)));

    engine.reset_state();
    assert_eq!(engine.variable("gold"), Some(&StoryValue::Number(5.0)));
}

#[test]
fn set_variable_rejects_undeclared_names() {
    let mut engine = engine_for("Hi.");
    let error = engine
        .set_variable("testing", StoryValue::Bool(true))
        .expect_err("undeclared variable should fail");
    assert_eq!(error.code, "ENGINE_VARIABLE_UNKNOWN");
}

#[test]
fn choose_choice_index_validates_state_and_range() {
    let mut engine = engine_for("* A\n* B\n");
    let error = engine
        .choose_choice_index(0)
        .expect_err("nothing pending before continuing");
    assert_eq!(error.code, "ENGINE_NOT_WAITING_CHOICE");

    engine.continue_story();
    let error = engine
        .choose_choice_index(5)
        .expect_err("index past the end should fail");
    assert_eq!(error.code, "ENGINE_CHOICE_INDEX");
    assert_eq!(engine.current_choices().len(), 2);
}

#[test]
fn evaluation_errors_end_the_story_with_a_runtime_diagnostic() {
    let mut engine = engine_for("VAR n = 1\nValue {n + undeclared_thing}\nAfter\n");
    engine.continue_story();
    assert!(!engine.can_continue());
    let diagnostics = engine.take_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message.starts_with("RUNTIME ERROR: 'root': "));
}

#[test]
fn tight_divert_loop_trips_the_step_guard() {
    let mut engine = engine_for("-> spin\n=== spin ===\n-> spin\n");
    engine.continue_story();
    assert!(!engine.can_continue());
    let diagnostics = engine.take_diagnostics();
    assert!(diagnostics[0].message.contains("exceeded"));
}

#[test]
fn global_initialisers_can_reference_earlier_globals() {
    let engine = engine_for("VAR base = 2\nVAR doubled = base * 2\nHi.");
    assert_eq!(engine.variable("doubled"), Some(&StoryValue::Number(4.0)));
}
