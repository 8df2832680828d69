use std::collections::BTreeMap;

use regex::Regex;
use rhai::{Dynamic, Engine, ImmutableString, Scope, FLOAT, INT};
use sf_core::{StoryError, StoryValue};

/// Evaluates story expressions with Rhai against the current variable table.
pub(crate) struct ExpressionEvaluator {
    engine: Engine,
    word_operators: Vec<(Regex, &'static str)>,
}

impl ExpressionEvaluator {
    pub(crate) fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_strict_variables(true);

        let word_operators = [("and", "&&"), ("or", "||"), ("not", "!"), ("mod", "%")]
            .into_iter()
            .map(|(word, symbol)| {
                let pattern = Regex::new(&format!(r"\b{}\b", word))
                    .expect("word operator regex must compile");
                (pattern, symbol)
            })
            .collect();

        Self {
            engine,
            word_operators,
        }
    }

    pub(crate) fn evaluate(
        &self,
        code: &str,
        variables: &BTreeMap<String, StoryValue>,
    ) -> Result<StoryValue, StoryError> {
        let mut scope = Scope::new();
        for (name, value) in variables {
            scope.push_dynamic(name.clone(), story_value_to_dynamic(value));
        }

        let source = self.rewrite_word_operators(code);
        let value = self
            .engine
            .eval_with_scope::<Dynamic>(&mut scope, &format!("({})", source))
            .map_err(|error| {
                StoryError::new(
                    "ENGINE_EVAL_ERROR",
                    format!("Expression \"{}\" failed: {}", code, error),
                )
            })?;
        dynamic_to_story_value(value)
    }

    /// Rewrites `and`, `or`, `not` and `mod` outside string literals.
    pub(crate) fn rewrite_word_operators(&self, code: &str) -> String {
        let mut out = String::with_capacity(code.len());
        let mut segment = String::new();
        let mut in_string = false;
        let mut escaped = false;

        for ch in code.chars() {
            if in_string {
                out.push(ch);
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    in_string = false;
                }
                continue;
            }
            if ch == '"' {
                out.push_str(&self.rewrite_segment(&segment));
                segment.clear();
                out.push(ch);
                in_string = true;
                continue;
            }
            segment.push(ch);
        }
        out.push_str(&self.rewrite_segment(&segment));
        out
    }

    fn rewrite_segment(&self, segment: &str) -> String {
        let mut rewritten = segment.to_string();
        for (pattern, symbol) in &self.word_operators {
            rewritten = pattern.replace_all(&rewritten, *symbol).to_string();
        }
        rewritten
    }
}

pub(crate) fn story_value_to_dynamic(value: &StoryValue) -> Dynamic {
    match value {
        StoryValue::Bool(value) => Dynamic::from_bool(*value),
        StoryValue::Number(value) => {
            if value.fract().abs() < f64::EPSILON && value.abs() < INT::MAX as f64 {
                Dynamic::from_int(*value as INT)
            } else {
                Dynamic::from_float(*value as FLOAT)
            }
        }
        StoryValue::String(value) => Dynamic::from(value.clone()),
    }
}

pub(crate) fn dynamic_to_story_value(value: Dynamic) -> Result<StoryValue, StoryError> {
    if value.is::<bool>() {
        return Ok(StoryValue::Bool(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        return Ok(StoryValue::Number(value.cast::<INT>() as f64));
    }
    if value.is::<FLOAT>() {
        return Ok(StoryValue::Number(value.cast::<FLOAT>()));
    }
    if value.is::<ImmutableString>() {
        return Ok(StoryValue::String(
            value.cast::<ImmutableString>().to_string(),
        ));
    }

    Err(StoryError::new(
        "ENGINE_VALUE_UNSUPPORTED",
        format!("Unsupported value type \"{}\".", value.type_name()),
    ))
}
