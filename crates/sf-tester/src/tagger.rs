use std::collections::BTreeMap;

use serde::Serialize;
use sf_core::{NodeId, ParsedNode, ParsedStory, SourceSpan, TextNode};

pub const LINE_TAG_PREFIX: &str = "__line:";

/// File name to interesting line numbers, in discovery order, no duplicates.
pub type LineRoster = BTreeMap<String, Vec<usize>>;

/// One authored piece of text the harness tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceUnit {
    pub id: usize,
    pub file_name: String,
    pub line: usize,
    pub text: String,
}

pub fn marker_tag(id: usize) -> String {
    format!("{}{}", LINE_TAG_PREFIX, id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Narrative,
    ChoiceOnly,
}

#[derive(Debug, Default)]
pub struct LineTagger {
    units: Vec<SourceUnit>,
    roster: LineRoster,
}

impl LineTagger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a `__line:<id>` tag after every interesting text node and
    /// records it. Candidates are collected first, then each content list is
    /// rebuilt with its markers.
    pub fn tag(&mut self, story: &mut ParsedStory) {
        let mut candidates = Vec::new();
        collect_candidates(&story.root, Context::Narrative, &mut candidates);
        for knot in &story.knots {
            collect_candidates(&knot.content, Context::Narrative, &mut candidates);
        }

        let mut marks = BTreeMap::new();
        for candidate in candidates {
            let id = self.units.len();
            let file_lines = self
                .roster
                .entry(candidate.span.file_name.clone())
                .or_default();
            if !file_lines.contains(&candidate.span.line) {
                file_lines.push(candidate.span.line);
            }
            self.units.push(SourceUnit {
                id,
                file_name: candidate.span.file_name,
                line: candidate.span.line,
                text: candidate.text,
            });
            marks.insert(candidate.node, id);
        }

        if marks.is_empty() {
            return;
        }

        let mut root = std::mem::take(&mut story.root);
        insert_markers(&mut root, &marks, story);
        story.root = root;

        for index in 0..story.knots.len() {
            let mut content = std::mem::take(&mut story.knots[index].content);
            insert_markers(&mut content, &marks, story);
            story.knots[index].content = content;
        }
    }

    /// Resolves the first line marker among `tags`.
    pub fn lookup(&self, tags: &[String]) -> Option<&SourceUnit> {
        let tag = tags.iter().find(|tag| tag.starts_with(LINE_TAG_PREFIX))?;
        let id = tag[LINE_TAG_PREFIX.len()..].trim().parse::<usize>().ok()?;
        self.units.get(id)
    }

    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    pub fn roster(&self) -> &LineRoster {
        &self.roster
    }

    pub fn line_numbers_for_file(&self, file_name: &str) -> &[usize] {
        self.roster
            .get(file_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

struct Candidate {
    node: NodeId,
    span: SourceSpan,
    text: String,
}

fn collect_candidates(nodes: &[ParsedNode], context: Context, out: &mut Vec<Candidate>) {
    for (index, node) in nodes.iter().enumerate() {
        match node {
            ParsedNode::Text(text) => {
                if context == Context::Narrative
                    && !text.text.trim().is_empty()
                    && !inside_tag(nodes, index)
                    && !line_has_marker(nodes, index, out)
                {
                    out.push(Candidate {
                        node: text.id,
                        span: text.span.clone(),
                        text: text.text.clone(),
                    });
                }
            }
            ParsedNode::Conditional(conditional) => {
                collect_candidates(&conditional.then_content, context, out);
                collect_candidates(&conditional.else_content, context, out);
            }
            ParsedNode::Choice(choice) => {
                collect_candidates(&choice.start_content, context, out);
                collect_candidates(&choice.choice_only_content, Context::ChoiceOnly, out);
                collect_candidates(&choice.inner_content, context, out);
            }
            // Expressions keep their string literals outside content lists.
            ParsedNode::Interpolation(_)
            | ParsedNode::VariableAssignment(_)
            | ParsedNode::TagStart
            | ParsedNode::TagEnd
            | ParsedNode::Newline
            | ParsedNode::Gather(_)
            | ParsedNode::Divert(_) => {}
        }
    }
}

fn inside_tag(nodes: &[ParsedNode], index: usize) -> bool {
    let mut depth = 0isize;
    for node in &nodes[..index] {
        match node {
            ParsedNode::TagStart => depth += 1,
            ParsedNode::TagEnd => depth -= 1,
            _ => {}
        }
    }
    depth > 0
}

/// True when the line holding `nodes[index]` already carries a marker, either
/// in the tree or among candidates picked earlier in this pass.
fn line_has_marker(nodes: &[ParsedNode], index: usize, picked: &[Candidate]) -> bool {
    let start = nodes[..index]
        .iter()
        .rposition(|node| matches!(node, ParsedNode::Newline))
        .map_or(0, |position| position + 1);
    let end = nodes[index..]
        .iter()
        .position(|node| matches!(node, ParsedNode::Newline))
        .map_or(nodes.len(), |position| index + position);

    let mut depth = 0isize;
    for node in &nodes[start..end] {
        match node {
            ParsedNode::TagStart => depth += 1,
            ParsedNode::TagEnd => depth -= 1,
            ParsedNode::Text(text) if depth > 0 && text.text.trim().starts_with(LINE_TAG_PREFIX) => {
                return true;
            }
            ParsedNode::Text(text) if picked.iter().any(|candidate| candidate.node == text.id) => {
                return true;
            }
            _ => {}
        }
    }
    false
}

fn insert_markers(nodes: &mut Vec<ParsedNode>, marks: &BTreeMap<NodeId, usize>, story: &mut ParsedStory) {
    let original = std::mem::take(nodes);
    nodes.reserve(original.len());

    for mut node in original {
        match &mut node {
            ParsedNode::Conditional(conditional) => {
                insert_markers(&mut conditional.then_content, marks, story);
                insert_markers(&mut conditional.else_content, marks, story);
            }
            ParsedNode::Choice(choice) => {
                insert_markers(&mut choice.start_content, marks, story);
                insert_markers(&mut choice.inner_content, marks, story);
            }
            _ => {}
        }

        let marker = match &node {
            ParsedNode::Text(text) => marks
                .get(&text.id)
                .map(|unit| (*unit, text.span.clone())),
            _ => None,
        };
        nodes.push(node);

        if let Some((unit, span)) = marker {
            nodes.push(ParsedNode::TagStart);
            nodes.push(ParsedNode::Text(TextNode {
                id: story.allocate_node_id(),
                text: marker_tag(unit),
                span,
            }));
            nodes.push(ParsedNode::TagEnd);
        }
    }
}

#[cfg(test)]
mod tagger_tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    use sf_core::Diagnostic;
    use sf_parser::parse_story;

    fn parse(files: &[(&str, &str)], entry: &str) -> ParsedStory {
        let sources = files
            .iter()
            .map(|(name, content)| ((*name).to_string(), (*content).to_string()))
            .collect::<Map<_, _>>();
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let story = parse_story(&sources, entry, &mut diagnostics);
        assert!(
            diagnostics.iter().all(|d| !d.is_error()),
            "{:?}",
            diagnostics
        );
        story
    }

    fn marker_count(nodes: &[ParsedNode]) -> usize {
        nodes
            .iter()
            .map(|node| match node {
                ParsedNode::Text(text) if text.text.starts_with(LINE_TAG_PREFIX) => 1,
                ParsedNode::Choice(choice) => {
                    marker_count(&choice.start_content)
                        + marker_count(&choice.choice_only_content)
                        + marker_count(&choice.inner_content)
                }
                ParsedNode::Conditional(conditional) => {
                    marker_count(&conditional.then_content) + marker_count(&conditional.else_content)
                }
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn tag_inserts_marker_directly_after_each_line() {
        let mut story = parse(&[("main.ink", "First line\n\nSecond line #mood\n")], "main.ink");
        let mut tagger = LineTagger::new();
        tagger.tag(&mut story);

        assert_eq!(tagger.units().len(), 2);
        assert_eq!(tagger.units()[1].line, 3);
        assert_eq!(tagger.units()[1].text, "Second line ");
        assert_eq!(story.root[1], ParsedNode::TagStart);
        let ParsedNode::Text(marker) = &story.root[2] else {
            panic!("expected marker text, got {:?}", story.root[2]);
        };
        assert_eq!(marker.text, "__line:0");
        assert_eq!(story.root[3], ParsedNode::TagEnd);
        assert_eq!(tagger.roster()["main.ink"], vec![1, 3]);
    }

    #[test]
    fn tag_skips_tags_choice_only_text_and_expressions() {
        let mut story = parse(
            &[(
                "main.ink",
                "VAR name = \"Ada\"\nHi {name} #greeting\n* [Only in menu] After\n~ name = \"Bo\"\n",
            )],
            "main.ink",
        );
        let mut tagger = LineTagger::new();
        tagger.tag(&mut story);

        let texts = tagger
            .units()
            .iter()
            .map(|unit| unit.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["Hi ", " After"]);
    }

    #[test]
    fn tag_marks_choice_start_and_conditional_branches() {
        let mut story = parse(
            &[(
                "main.ink",
                "VAR ok = true\n{ok: Good|Bad}\n* Go [now] quickly\n  Body line\n",
            )],
            "main.ink",
        );
        let mut tagger = LineTagger::new();
        tagger.tag(&mut story);

        let texts = tagger
            .units()
            .iter()
            .map(|unit| unit.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["Good", "Bad", "Go ", " quickly", "Body line"]);
        assert_eq!(tagger.line_numbers_for_file("main.ink"), &[2, 3, 4]);
        assert_eq!(marker_count(&story.root), 5);
    }

    #[test]
    fn one_marker_per_line_within_a_content_list() {
        let mut story = parse(&[("main.ink", "VAR n = 1\nYou have {n} coins left.\n")], "main.ink");
        let mut tagger = LineTagger::new();
        tagger.tag(&mut story);
        assert_eq!(tagger.units().len(), 1);
        assert_eq!(marker_count(&story.root), 1);
    }

    #[test]
    fn tagging_twice_does_not_double_insert() {
        let mut story = parse(&[("main.ink", "A\nB {x: y|z} C\n* D\n  E\n")], "main.ink");
        let mut tagger = LineTagger::new();
        tagger.tag(&mut story);
        let first = story.clone();
        let count = tagger.units().len();

        tagger.tag(&mut story);
        assert_eq!(tagger.units().len(), count);
        assert_eq!(story.root, first.root);
    }

    #[test]
    fn lookup_round_trips_every_unit() {
        let mut story = parse(
            &[
                ("main.ink", "INCLUDE side.ink\nMain\n-> knot\n=== knot ===\nIn knot\n-> END"),
                ("side.ink", "Side line\n"),
            ],
            "main.ink",
        );
        let mut tagger = LineTagger::new();
        tagger.tag(&mut story);

        assert_eq!(tagger.units().len(), 3);
        for unit in tagger.units() {
            let tags = vec!["other".to_string(), marker_tag(unit.id)];
            assert_eq!(tagger.lookup(&tags), Some(unit));
        }
        assert_eq!(tagger.units()[0].file_name, "side.ink");
        assert_eq!(tagger.line_numbers_for_file("side.ink"), &[1]);
    }

    #[test]
    fn lookup_ignores_unknown_or_malformed_markers() {
        let tagger = LineTagger::new();
        assert!(tagger.lookup(&[]).is_none());
        assert!(tagger.lookup(&["__line:7".to_string()]).is_none());
        assert!(tagger.lookup(&["__line:abc".to_string()]).is_none());
        assert!(tagger.line_numbers_for_file("missing.ink").is_empty());
    }
}
