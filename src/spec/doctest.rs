//! Docstring normalisation and doctest example parsing.
//!
//! Expected output blocks are byte-significant: the harness compares them
//! exactly, so parsing preserves trailing whitespace inside the block.

use crate::unit::Example;
use regex::Regex;
use std::sync::OnceLock;

/// Normalise a raw docstring for hashing and example parsing.
///
/// Newlines become LF, the first line loses its leading whitespace, the
/// remaining lines lose their common leading indentation, and leading and
/// trailing blank lines are dropped. Trailing whitespace inside lines is
/// preserved because expected output blocks are byte-significant.
pub fn normalize_docstring(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n");
    let mut lines: Vec<&str> = unified.split('\n').collect();
    if lines.is_empty() {
        return String::new();
    }

    let first = lines.remove(0).trim_start();
    let indent = common_indent(&lines);
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 1);
    out.push(first.to_string());
    for line in lines {
        if line.trim().is_empty() {
            out.push(String::new());
        } else {
            out.push(line[indent.min(line.len())..].to_string());
        }
    }

    while out.first().is_some_and(|line| line.is_empty()) {
        out.remove(0);
    }
    while out.last().is_some_and(|line| line.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Common leading-space count over non-blank lines.
fn common_indent(lines: &[&str]) -> usize {
    lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0)
}

/// Parse `>>>` examples out of a normalised docstring.
///
/// An example is a `>>> expr` line with optional `... ` continuations; its
/// expected output is the following non-blank lines, up to the next example
/// or a blank line, with the example's own indentation stripped.
pub fn parse_examples(docstring: &str) -> Vec<Example> {
    let lines: Vec<&str> = docstring.split('\n').collect();
    let mut examples = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim_start();
        if !is_prompt(trimmed) {
            i += 1;
            continue;
        }
        let indent = line.len() - trimmed.len();
        let mut input = prompt_payload(trimmed).to_string();
        i += 1;

        // Continuation lines belong to the same input expression.
        while i < lines.len() {
            let cont = lines[i].trim_start();
            if let Some(payload) = continuation_payload(cont) {
                input.push('\n');
                input.push_str(payload);
                i += 1;
            } else {
                break;
            }
        }

        let mut expected_lines: Vec<String> = Vec::new();
        while i < lines.len() {
            let line = lines[i];
            if line.trim().is_empty() || is_prompt(line.trim_start()) {
                break;
            }
            let stripped = if line.len() >= indent && line[..indent].trim().is_empty() {
                &line[indent..]
            } else {
                line.trim_start()
            };
            expected_lines.push(stripped.to_string());
            i += 1;
        }

        let expected_output = if expected_lines.is_empty() {
            String::new()
        } else {
            format!("{}\n", expected_lines.join("\n"))
        };
        examples.push(Example {
            input_source: input,
            expected_output,
        });
    }

    examples
}

fn is_prompt(trimmed: &str) -> bool {
    trimmed == ">>>" || trimmed.starts_with(">>> ")
}

fn prompt_payload(trimmed: &str) -> &str {
    trimmed.strip_prefix(">>> ").unwrap_or("")
}

fn continuation_payload(trimmed: &str) -> Option<&str> {
    if trimmed == "..." {
        Some("")
    } else {
        trimmed.strip_prefix("... ")
    }
}

/// Extract fenced ```hypothesis blocks, verbatim apart from fence trimming.
pub fn parse_hypothesis_blocks(docstring: &str) -> Vec<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?is)```hypothesis\n(.*?)```").expect("hypothesis block regex")
    });
    pattern
        .captures_iter(docstring)
        .map(|cap| cap[1].trim_end().to_string())
        .filter(|block| !block.is_empty())
        .collect()
}

/// Byte-exact comparison with opt-in ellipsis matching.
///
/// When the expected text contains the `...` token, each literal segment must
/// appear in order, anchored at both ends; `...` matches any span including
/// the empty one.
pub fn output_matches(expected: &str, actual: &str) -> bool {
    if !expected.contains("...") {
        return expected == actual;
    }
    let segments: Vec<&str> = expected.split("...").collect();
    let mut rest = actual;
    for (idx, segment) in segments.iter().enumerate() {
        if idx == 0 {
            match rest.strip_prefix(segment) {
                Some(after) => rest = after,
                None => return false,
            }
            continue;
        }
        if idx == segments.len() - 1 {
            return rest.ends_with(segment);
        }
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }
    true
}
