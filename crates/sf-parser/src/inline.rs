//! String helpers for the line-oriented script syntax.

/// Removes `//` line comments and `/* */` block comments, keeping every
/// newline so line numbers stay stable.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_block = false;
    let mut in_line = false;

    while let Some(ch) = chars.next() {
        if in_block {
            if ch == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block = false;
            } else if ch == '\n' || ch == '\r' {
                out.push(ch);
            }
            continue;
        }
        if in_line {
            if ch == '\n' || ch == '\r' {
                in_line = false;
                out.push(ch);
            }
            continue;
        }
        if ch == '/' {
            match chars.peek() {
                Some('/') => {
                    chars.next();
                    in_line = true;
                    continue;
                }
                Some('*') => {
                    chars.next();
                    in_block = true;
                    continue;
                }
                _ => {}
            }
        }
        out.push(ch);
    }

    out
}

/// Byte index of the `}` closing the `{` at `open`.
pub fn find_matching_brace(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (index, ch) in source[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + index);
                }
            }
            _ => {}
        }
    }
    None
}

/// First occurrence of `pattern` outside any `{...}` block.
pub fn find_top_level(source: &str, pattern: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (index, ch) in source.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && source[index..].starts_with(pattern) => return Some(index),
            _ => {}
        }
    }
    None
}

pub fn split_top_level(source: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (index, ch) in source.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && ch == separator => {
                parts.push(&source[start..index]);
                start = index + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}

/// Splits a trailing `-> target` off a line.
pub fn split_divert(source: &str) -> (&str, Option<&str>) {
    match find_top_level(source, "->") {
        Some(index) => (&source[..index], Some(source[index + 2..].trim())),
        None => (source, None),
    }
}

/// Splits `# tag` annotations off a line. Tags run to the next `#`.
pub fn split_tags(source: &str) -> (&str, Vec<&str>) {
    let Some(index) = find_top_level(source, "#") else {
        return (source, Vec::new());
    };
    let tags = source[index + 1..]
        .split('#')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect();
    (&source[..index], tags)
}

/// Counts leading weave markers (`*`, `+` or `-`), allowing spaces between
/// them. Returns the depth, the first marker seen and the remaining text.
pub fn count_markers<'a>(source: &'a str, markers: &[char]) -> (usize, Option<char>, &'a str) {
    let mut depth = 0usize;
    let mut first = None;
    let mut rest_start = source.len();

    for (index, ch) in source.char_indices() {
        if source[index..].starts_with("->") {
            rest_start = index;
            break;
        }
        if markers.contains(&ch) {
            depth += 1;
            first.get_or_insert(ch);
            continue;
        }
        if ch == ' ' || ch == '\t' {
            continue;
        }
        rest_start = index;
        break;
    }

    (depth, first, &source[rest_start..])
}
