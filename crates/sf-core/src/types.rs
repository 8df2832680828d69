use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpan {
    pub file_name: String,
    /// 1-based.
    pub line: usize,
}

impl SourceSpan {
    pub fn new(file_name: impl Into<String>, line: usize) -> Self {
        Self {
            file_name: file_name.into(),
            line,
        }
    }

    pub fn synthetic() -> Self {
        Self {
            file_name: String::new(),
            line: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub id: NodeId,
    pub text: String,
    pub span: SourceSpan,
}

/// Code carried verbatim to the runtime, with any string literals it contains
/// kept as text nodes so tree walks can see (and skip) them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub code: String,
    pub string_literals: Vec<TextNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableAssignment {
    pub name: String,
    pub expression: Expression,
    pub is_declaration: bool,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DivertTarget {
    Knot { name: String },
    End,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divert {
    pub target: DivertTarget,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub once: bool,
    pub condition: Option<Expression>,
    /// Shown in the choice and repeated in the output once chosen.
    pub start_content: Vec<ParsedNode>,
    /// Shown only in the choice (`[...]`).
    pub choice_only_content: Vec<ParsedNode>,
    /// Output after choosing, including nested weave lines.
    pub inner_content: Vec<ParsedNode>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conditional {
    pub condition: Expression,
    pub then_content: Vec<ParsedNode>,
    pub else_content: Vec<ParsedNode>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gather {
    pub depth: usize,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParsedNode {
    Text(TextNode),
    TagStart,
    TagEnd,
    Newline,
    Interpolation(Expression),
    Conditional(Box<Conditional>),
    Choice(Box<Choice>),
    Gather(Gather),
    Divert(Divert),
    VariableAssignment(VariableAssignment),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knot {
    pub name: String,
    pub content: Vec<ParsedNode>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedStory {
    pub root: Vec<ParsedNode>,
    pub knots: Vec<Knot>,
    pub globals: Vec<VariableAssignment>,
    pub next_node_id: u32,
}

impl ParsedStory {
    pub fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }
}

/// Splits source text into physical lines on `\r\n`, `\r` or `\n`.
/// A trailing terminator yields a final empty line.
pub fn split_source_lines(source: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    let bytes = source.as_bytes();
    let mut index = 0usize;
    while index < bytes.len() {
        match bytes[index] {
            b'\n' => {
                lines.push(&source[start..index]);
                start = index + 1;
            }
            b'\r' => {
                lines.push(&source[start..index]);
                if bytes.get(index + 1) == Some(&b'\n') {
                    index += 1;
                }
                start = index + 1;
            }
            _ => {}
        }
        index += 1;
    }
    lines.push(&source[start..]);
    lines
}
