use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const ROOT_CONTAINER: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DisplayPart {
    Text { text: String },
    Interpolate { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoicePoint {
    /// Story-wide index, used to remember once-only choices.
    pub id: usize,
    pub once: bool,
    pub condition: Option<String>,
    pub display: Vec<DisplayPart>,
    pub target: usize,
}

/// One step of a compiled story. Jump targets are instruction indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Instruction {
    Text { text: String },
    Newline,
    BeginTag,
    EndTag,
    Interpolate { code: String },
    Assign { name: String, code: String },
    JumpIfFalse { condition: String, target: usize },
    Jump { target: usize },
    Choice(ChoicePoint),
    WaitForChoice,
    EnterKnot { name: String },
    End,
    OutOfContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDeclaration {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryProgram {
    pub instructions: Vec<Instruction>,
    pub globals: Vec<GlobalDeclaration>,
    pub knots: BTreeMap<String, usize>,
}
