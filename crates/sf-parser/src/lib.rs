//! Parser for the line-oriented branching story format.
//!
//! Produces a [`ParsedStory`] tree. Problems are reported into a diagnostic
//! sink rather than aborting, so callers see every error in one pass.

mod inline;

use std::collections::BTreeMap;

use regex::Regex;
use sf_core::{
    split_source_lines, Choice, Conditional, Diagnostic, Divert, DivertTarget, ErrorType,
    Expression, Gather, Knot, ParsedNode, ParsedStory, SourceSpan, TextNode, VariableAssignment,
};

pub use inline::{
    count_markers, find_matching_brace, find_top_level, split_divert, split_tags,
    split_top_level, strip_comments,
};

#[derive(Debug, Clone, PartialEq)]
enum LineKind {
    Content(String),
    Choice {
        depth: usize,
        once: bool,
        rest: String,
    },
    Gather {
        depth: usize,
        rest: String,
    },
    Assignment {
        name: String,
        code: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Line {
    kind: LineKind,
    span: SourceSpan,
}

#[derive(Debug)]
struct KnotLines {
    name: String,
    span: SourceSpan,
    lines: Vec<Line>,
}

/// Parses `entry_file` and everything it `INCLUDE`s from `sources`, keyed by
/// `/`-separated paths relative to the story root.
pub fn parse_story(
    sources: &BTreeMap<String, String>,
    entry_file: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> ParsedStory {
    let mut parser = StoryParser::new(sources, diagnostics);
    let top = parser.tokenize_file(&normalize_include_path(entry_file), None);

    let mut position = 0usize;
    let root = parser.build_weave(&top, &mut position, 1);

    let knot_sources = std::mem::take(&mut parser.knot_sources);
    for knot in knot_sources {
        let mut position = 0usize;
        let content = parser.build_weave(&knot.lines, &mut position, 1);
        parser.story.knots.push(Knot {
            name: knot.name,
            content,
            span: knot.span,
        });
    }

    parser.story.root = root;
    parser.story
}

pub fn normalize_include_path(path: &str) -> String {
    let replaced = path.trim().replace('\\', "/");
    replaced.trim_start_matches("./").to_string()
}

struct StoryParser<'a> {
    sources: &'a BTreeMap<String, String>,
    diagnostics: &'a mut Vec<Diagnostic>,
    story: ParsedStory,
    include_stack: Vec<String>,
    knot_sources: Vec<KnotLines>,
    var_regex: Regex,
    knot_regex: Regex,
    assignment_regex: Regex,
    identifier_regex: Regex,
    string_literal_regex: Regex,
}

impl<'a> StoryParser<'a> {
    fn new(sources: &'a BTreeMap<String, String>, diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        Self {
            sources,
            diagnostics,
            story: ParsedStory::default(),
            include_stack: Vec::new(),
            knot_sources: Vec::new(),
            var_regex: Regex::new(r"^VAR\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+)$")
                .expect("var regex must compile"),
            knot_regex: Regex::new(r"^={2,}\s*([A-Za-z_][A-Za-z0-9_]*)\s*=*$")
                .expect("knot regex must compile"),
            assignment_regex: Regex::new(r"^~\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+)$")
                .expect("assignment regex must compile"),
            identifier_regex: Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
                .expect("identifier regex must compile"),
            string_literal_regex: Regex::new(r#""((?:[^"\\]|\\.)*)""#)
                .expect("string literal regex must compile"),
        }
    }

    fn error(&mut self, message: impl Into<String>, span: &SourceSpan) {
        self.diagnostics
            .push(Diagnostic::at(ErrorType::Error, message, span.clone()));
    }

    /// Returns the file's top-level lines with includes spliced in. Knot
    /// sections are collected into `knot_sources`.
    fn tokenize_file(&mut self, file_name: &str, included_from: Option<&SourceSpan>) -> Vec<Line> {
        let sources = self.sources;
        let Some(source) = sources.get(file_name) else {
            let message = format!("Include \"{}\" not found.", file_name);
            match included_from {
                Some(span) => self.error(message, span),
                None => self
                    .diagnostics
                    .push(Diagnostic::error(format!("Story file \"{}\" not found.", file_name))),
            }
            return Vec::new();
        };

        if self.include_stack.iter().any(|entry| entry == file_name) {
            let mut cycle = self.include_stack.clone();
            cycle.push(file_name.to_string());
            let span = included_from
                .cloned()
                .unwrap_or_else(|| SourceSpan::new(file_name, 1));
            self.error(format!("Include cycle detected: {}", cycle.join(" -> ")), &span);
            return Vec::new();
        }
        self.include_stack.push(file_name.to_string());

        let stripped = strip_comments(source);
        let mut top = Vec::new();
        let mut current_knot: Option<KnotLines> = None;

        for (index, raw) in split_source_lines(&stripped).into_iter().enumerate() {
            let span = SourceSpan::new(file_name, index + 1);
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(path) = trimmed.strip_prefix("INCLUDE ") {
                let included = self.tokenize_file(&normalize_include_path(path), Some(&span));
                match current_knot.as_mut() {
                    Some(knot) => knot.lines.extend(included),
                    None => top.extend(included),
                }
                continue;
            }

            if trimmed.starts_with("==") {
                let Some(captures) = self.knot_regex.captures(trimmed) else {
                    self.error(format!("Invalid knot header \"{}\".", trimmed), &span);
                    continue;
                };
                if let Some(finished) = current_knot.take() {
                    self.knot_sources.push(finished);
                }
                current_knot = Some(KnotLines {
                    name: captures[1].to_string(),
                    span: span.clone(),
                    lines: Vec::new(),
                });
                continue;
            }

            if trimmed.starts_with("VAR ") || trimmed == "VAR" {
                self.parse_global(trimmed, &span);
                continue;
            }

            if trimmed.starts_with("TODO") {
                let note = trimmed.trim_start_matches("TODO").trim_start_matches(':').trim();
                self.diagnostics
                    .push(Diagnostic::at(ErrorType::Author, note, span.clone()));
                continue;
            }

            let Some(kind) = self.classify(trimmed, &span) else {
                continue;
            };
            let line = Line { kind, span };
            match current_knot.as_mut() {
                Some(knot) => knot.lines.push(line),
                None => top.push(line),
            }
        }

        if let Some(finished) = current_knot.take() {
            self.knot_sources.push(finished);
        }
        self.include_stack.pop();
        top
    }

    fn parse_global(&mut self, line: &str, span: &SourceSpan) {
        let Some(captures) = self.var_regex.captures(line) else {
            self.error(format!("Invalid variable declaration \"{}\".", line), span);
            return;
        };
        let name = captures[1].to_string();
        let code = captures[2].trim().to_string();
        let expression = self.expression(&code, span);
        self.story.globals.push(VariableAssignment {
            name,
            expression,
            is_declaration: true,
            span: span.clone(),
        });
    }

    fn classify(&mut self, trimmed: &str, span: &SourceSpan) -> Option<LineKind> {
        if trimmed.starts_with('~') {
            let Some(captures) = self.assignment_regex.captures(trimmed) else {
                self.error(format!("Unsupported logic line \"{}\".", trimmed), span);
                return None;
            };
            return Some(LineKind::Assignment {
                name: captures[1].to_string(),
                code: captures[2].trim().to_string(),
            });
        }

        if trimmed.starts_with('*') || trimmed.starts_with('+') {
            let (depth, first, rest) = count_markers(trimmed, &['*', '+']);
            return Some(LineKind::Choice {
                depth,
                once: first == Some('*'),
                rest: rest.to_string(),
            });
        }

        if trimmed.starts_with('-') && !trimmed.starts_with("->") {
            let (depth, _, rest) = count_markers(trimmed, &['-']);
            return Some(LineKind::Gather {
                depth,
                rest: rest.to_string(),
            });
        }

        Some(LineKind::Content(trimmed.to_string()))
    }

    fn build_weave(&mut self, lines: &[Line], position: &mut usize, depth: usize) -> Vec<ParsedNode> {
        let mut nodes = Vec::new();

        while let Some(line) = lines.get(*position) {
            match &line.kind {
                LineKind::Choice { depth: level, .. } | LineKind::Gather { depth: level, .. }
                    if *level < depth =>
                {
                    break;
                }
                LineKind::Choice { depth: level, once, rest } => {
                    *position += 1;
                    let choice = self.parse_choice(*once, rest, &line.span, lines, position, *level);
                    nodes.push(ParsedNode::Choice(Box::new(choice)));
                }
                LineKind::Gather { depth: level, rest } => {
                    *position += 1;
                    nodes.push(ParsedNode::Gather(Gather {
                        depth: *level,
                        span: line.span.clone(),
                    }));
                    if !rest.trim().is_empty() {
                        nodes.extend(self.parse_line(rest, &line.span));
                    }
                }
                LineKind::Content(text) => {
                    *position += 1;
                    nodes.extend(self.parse_line(text, &line.span));
                }
                LineKind::Assignment { name, code } => {
                    *position += 1;
                    let expression = self.expression(code, &line.span);
                    nodes.push(ParsedNode::VariableAssignment(VariableAssignment {
                        name: name.clone(),
                        expression,
                        is_declaration: false,
                        span: line.span.clone(),
                    }));
                }
            }
        }

        nodes
    }

    fn parse_choice(
        &mut self,
        once: bool,
        rest: &str,
        span: &SourceSpan,
        lines: &[Line],
        position: &mut usize,
        level: usize,
    ) -> Choice {
        let mut remainder = rest.trim_start();
        let mut conditions = Vec::new();
        while remainder.starts_with('{') {
            let Some(close) = find_matching_brace(remainder, 0) else {
                self.error("Unterminated choice condition.", span);
                break;
            };
            conditions.push(format!("({})", remainder[1..close].trim()));
            remainder = remainder[close + 1..].trim_start();
        }
        let condition = if conditions.is_empty() {
            None
        } else {
            Some(self.expression(&conditions.join(" && "), span))
        };

        let (body, tags) = split_tags(remainder);
        let (body, divert) = split_divert(body);

        let (start, choice_only, after) = match find_top_level(body, "[") {
            Some(open) => match body[open..].find(']') {
                Some(close) => (
                    &body[..open],
                    &body[open + 1..open + close],
                    &body[open + close + 1..],
                ),
                None => {
                    self.error("Unterminated choice-only text.", span);
                    (&body[..open], &body[open + 1..], "")
                }
            },
            None => (body, "", ""),
        };

        let start_content = self.parse_inline(start, span);
        let choice_only_content = self.parse_inline(choice_only, span);
        let mut inner_content = self.parse_inline(after, span);
        push_tags(&mut inner_content, &tags, span, &mut self.story);
        inner_content.push(ParsedNode::Newline);
        if let Some(target) = divert {
            if let Some(divert) = self.divert(target, span) {
                inner_content.push(ParsedNode::Divert(divert));
            }
        }
        inner_content.extend(self.build_weave(lines, position, level + 1));

        Choice {
            once,
            condition,
            start_content,
            choice_only_content,
            inner_content,
            span: span.clone(),
        }
    }

    /// One line of narrative: inline content, tags, end of line, then any
    /// divert. Tags are written before the divert (`text #tag -> knot` and
    /// `text -> knot #tag` both work).
    fn parse_line(&mut self, raw: &str, span: &SourceSpan) -> Vec<ParsedNode> {
        let (body, tags) = split_tags(raw);
        let (body, divert) = split_divert(body);
        let mut nodes = self.parse_inline(body, span);
        push_tags(&mut nodes, &tags, span, &mut self.story);
        if nodes.iter().any(|node| !matches!(node, ParsedNode::Newline)) {
            nodes.push(ParsedNode::Newline);
        }
        if let Some(target) = divert {
            if let Some(divert) = self.divert(target, span) {
                nodes.push(ParsedNode::Divert(divert));
            }
        }
        nodes
    }

    fn parse_inline(&mut self, source: &str, span: &SourceSpan) -> Vec<ParsedNode> {
        let mut nodes = Vec::new();
        let mut buffer = String::new();
        let mut cursor = 0usize;

        while let Some(offset) = source[cursor..].find('{') {
            let open = cursor + offset;
            buffer.push_str(&source[cursor..open]);
            let Some(close) = find_matching_brace(source, open) else {
                self.error("Unterminated '{' in text.", span);
                buffer.push_str(&source[open..]);
                cursor = source.len();
                break;
            };
            self.flush_text(&mut buffer, &mut nodes, span);

            let inner = &source[open + 1..close];
            match find_top_level(inner, ":") {
                Some(colon) => {
                    let condition = self.expression(inner[..colon].trim(), span);
                    let branches = split_top_level(&inner[colon + 1..], '|');
                    let then_content = self.parse_inline(branches[0].trim_start(), span);
                    let else_content = match branches.get(1) {
                        Some(branch) => self.parse_inline(branch, span),
                        None => Vec::new(),
                    };
                    if branches.len() > 2 {
                        self.error("Inline conditional takes at most two branches.", span);
                    }
                    nodes.push(ParsedNode::Conditional(Box::new(Conditional {
                        condition,
                        then_content,
                        else_content,
                        span: span.clone(),
                    })));
                }
                None => {
                    let expression = self.expression(inner.trim(), span);
                    nodes.push(ParsedNode::Interpolation(expression));
                }
            }
            cursor = close + 1;
        }

        buffer.push_str(&source[cursor..]);
        self.flush_text(&mut buffer, &mut nodes, span);
        nodes
    }

    fn flush_text(&mut self, buffer: &mut String, nodes: &mut Vec<ParsedNode>, span: &SourceSpan) {
        if buffer.is_empty() {
            return;
        }
        let id = self.story.allocate_node_id();
        nodes.push(ParsedNode::Text(TextNode {
            id,
            text: std::mem::take(buffer),
            span: span.clone(),
        }));
    }

    fn expression(&mut self, code: &str, span: &SourceSpan) -> Expression {
        let literals = self
            .string_literal_regex
            .captures_iter(code)
            .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string()))
            .collect::<Vec<_>>();
        let string_literals = literals
            .into_iter()
            .map(|text| TextNode {
                id: self.story.allocate_node_id(),
                text,
                span: span.clone(),
            })
            .collect();
        Expression {
            code: code.to_string(),
            string_literals,
        }
    }

    fn divert(&mut self, target: &str, span: &SourceSpan) -> Option<Divert> {
        let target = match target {
            "END" => DivertTarget::End,
            "DONE" => DivertTarget::Done,
            name if self.identifier_regex.is_match(name) => DivertTarget::Knot {
                name: name.to_string(),
            },
            other => {
                self.error(format!("Invalid divert target \"{}\".", other), span);
                return None;
            }
        };
        Some(Divert {
            target,
            span: span.clone(),
        })
    }
}

fn push_tags(nodes: &mut Vec<ParsedNode>, tags: &[&str], span: &SourceSpan, story: &mut ParsedStory) {
    for tag in tags {
        nodes.push(ParsedNode::TagStart);
        nodes.push(ParsedNode::Text(TextNode {
            id: story.allocate_node_id(),
            text: (*tag).to_string(),
            span: span.clone(),
        }));
        nodes.push(ParsedNode::TagEnd);
    }
}
