//! Textual extraction of decorated stubs into `Spec` records.
//!
//! The extractor works on source text alone: decorator, header, docstring,
//! and pre-hole slice are recovered by line scanning with bracket balancing,
//! never by importing the host module. The sentinel is recognised purely by
//! its name.

use crate::error::SpecError;
use crate::spec::doctest;
use crate::unit::{
    DependencyRef, Example, Param, Signature, SourceLocation, Spec, UnitKind, UnitOptions,
};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

/// Name of the sentinel marker that ends the pre-hole slice.
pub const SENTINEL_NAME: &str = "VibesafeHandled";

const DEFAULT_PROVIDER: &str = "default";

/// Python keywords plus common builtins; names in this set never become
/// dependency references.
const RESERVED_NAMES: &[&str] = &[
    // keywords
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield",
    // builtins
    "abs", "all", "any", "bin", "bool", "bytearray", "bytes", "callable", "chr", "complex",
    "dict", "dir", "divmod", "enumerate", "filter", "float", "format", "frozenset", "getattr",
    "hasattr", "hash", "hex", "id", "int", "isinstance", "issubclass", "iter", "len", "list",
    "map", "max", "min", "next", "object", "oct", "open", "ord", "pow", "print", "property",
    "range", "repr", "reversed", "round", "set", "setattr", "slice", "sorted", "str", "sum",
    "super", "tuple", "type", "vars", "zip",
    // exception types that show up in guard clauses
    "Exception", "ValueError", "TypeError", "KeyError", "IndexError", "RuntimeError",
    "NotImplementedError", "ZeroDivisionError", "AttributeError", "OSError", "StopIteration",
];

fn decorator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\s*)@vibesafe\.(func|http|cli)\b").expect("decorator regex")
    })
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("identifier regex"))
}

/// Extract every decorated unit in a source file, in source order.
///
/// `resolve` maps an external name to `(resolved_path, content_hash)`; it is
/// how the extractor reaches the Target Introspector without depending on it.
pub fn extract_units(
    source: &str,
    module_path: &str,
    file: &Path,
    resolve: &dyn Fn(&str) -> Option<(String, String)>,
) -> Result<Vec<Spec>, SpecError> {
    let lines: Vec<&str> = source.split('\n').collect();
    let mut specs = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(cap) = decorator_pattern().captures(lines[i]) else {
            i += 1;
            continue;
        };
        let decorator_line = i + 1;
        let kind = match &cap[2] {
            "func" => UnitKind::Function,
            "http" => UnitKind::Http,
            _ => UnitKind::Cli,
        };

        // The decorator call may span lines; gather until brackets balance.
        let (decorator_text, after_decorator) = gather_balanced(&lines, i);
        i = after_decorator;

        // Skip unrelated stacked decorators between ours and the def header.
        while i < lines.len() {
            let trimmed = lines[i].trim_start();
            if trimmed.starts_with('@') {
                let (_, next) = gather_balanced(&lines, i);
                i = next;
            } else if trimmed.is_empty() {
                i += 1;
            } else {
                break;
            }
        }

        let (header_text, body_start) = gather_balanced(&lines, i);
        let unit_name = header_name(&header_text).unwrap_or_default();
        let unit_id = format!("{module_path}/{unit_name}");

        let options = parse_decorator_options(&decorator_text, kind, &unit_id)?;
        let signature = parse_signature(&header_text, &unit_id)?;

        let body_indent = body_indent(&lines, body_start);
        let (raw_docstring, pre_hole_start) = read_docstring(&lines, body_start, body_indent);
        let docstring = doctest::normalize_docstring(&raw_docstring);
        let examples: Vec<Example> = doctest::parse_examples(&docstring);
        let hypothesis_blocks = doctest::parse_hypothesis_blocks(&docstring);

        let (pre_hole_source, body_end) =
            read_pre_hole(&lines, pre_hole_start, body_indent, &unit_id)?;

        let dependency_refs =
            collect_dependency_refs(&pre_hole_source, &signature, unit_name.as_str(), resolve);

        specs.push(Spec {
            unit_id,
            kind,
            location: SourceLocation {
                file: file.to_path_buf(),
                line: decorator_line,
            },
            signature,
            docstring,
            examples,
            hypothesis_blocks,
            pre_hole_source,
            provider_ref: options
                .provider
                .clone()
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            template_ref: options.template.clone(),
            options,
            dependency_refs,
        });

        i = body_end;
    }

    Ok(specs)
}

/// Canonical signature text for a standalone `def` header, used by the
/// validator to compare generated code against the spec byte-for-byte.
pub fn canonical_header(header: &str) -> Option<String> {
    parse_signature(header, "")
        .ok()
        .map(|signature| signature.canonical_text())
}

/// Gather lines starting at `start` until parens/brackets/braces balance,
/// returning the joined text and the index after the last consumed line.
fn gather_balanced(lines: &[&str], start: usize) -> (String, usize) {
    let mut depth = 0i32;
    let mut gathered = Vec::new();
    let mut idx = start;
    while idx < lines.len() {
        let line = lines[idx];
        depth += bracket_delta(line);
        gathered.push(line);
        idx += 1;
        if depth <= 0 {
            break;
        }
    }
    (gathered.join("\n"), idx)
}

/// Net bracket depth change of a line, ignoring brackets inside string
/// literals.
fn bracket_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match quote {
            Some(q) => {
                if ch == '\\' {
                    chars.next();
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' | '[' | '{' => delta += 1,
                ')' | ']' | '}' => delta -= 1,
                '#' => break,
                _ => {}
            },
        }
    }
    delta
}

fn header_name(header: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)").expect("def header regex")
    });
    pattern
        .captures(header)
        .map(|cap| cap[1].to_string())
}

/// Parse `key=value` decorator arguments; unknown keys are rejected.
fn parse_decorator_options(
    decorator: &str,
    kind: UnitKind,
    unit_id: &str,
) -> Result<UnitOptions, SpecError> {
    let mut options = UnitOptions::default();
    let Some(open) = decorator.find('(') else {
        return Ok(options);
    };
    let close = decorator.rfind(')').unwrap_or(decorator.len());
    let args = &decorator[open + 1..close];

    for raw in split_top_level(args) {
        let arg = raw.trim();
        if arg.is_empty() {
            continue;
        }
        let Some((key, value)) = arg.split_once('=') else {
            return Err(SpecError::DecoratorOptionInvalid {
                unit_id: unit_id.to_string(),
                option: arg.to_string(),
            });
        };
        let key = key.trim();
        let value = value.trim();
        match (key, kind) {
            ("provider", _) => options.provider = Some(unquote(value).to_string()),
            ("template", _) => options.template = Some(unquote(value).to_string()),
            ("method", UnitKind::Http) => options.method = Some(unquote(value).to_string()),
            ("path", UnitKind::Http) => options.path = Some(unquote(value).to_string()),
            ("tags", UnitKind::Http) => {
                let inner = value
                    .trim()
                    .trim_start_matches('[')
                    .trim_end_matches(']');
                options.tags = split_top_level(inner)
                    .into_iter()
                    .map(|item| unquote(item.trim()).to_string())
                    .filter(|item| !item.is_empty())
                    .collect();
            }
            _ => {
                return Err(SpecError::DecoratorOptionInvalid {
                    unit_id: unit_id.to_string(),
                    option: key.to_string(),
                })
            }
        }
    }
    Ok(options)
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Split on commas at bracket depth zero, outside string literals.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let bytes = text.char_indices().collect::<Vec<_>>();
    let mut skip_next = false;
    for (pos, ch) in bytes {
        if skip_next {
            skip_next = false;
            continue;
        }
        match quote {
            Some(q) => {
                if ch == '\\' {
                    skip_next = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                ',' if depth == 0 => {
                    parts.push(&text[start..pos]);
                    start = pos + ch.len_utf8();
                }
                _ => {}
            },
        }
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}

/// Parse the canonical signature from a gathered `def` header.
fn parse_signature(header: &str, unit_id: &str) -> Result<Signature, SpecError> {
    let is_async = header.trim_start().starts_with("async ");
    let name = header_name(header).ok_or_else(|| SpecError::InvalidSignature {
        unit_id: unit_id.to_string(),
        detail: "no def header after decorator".to_string(),
    })?;

    let open = header.find('(').ok_or_else(|| SpecError::InvalidSignature {
        unit_id: unit_id.to_string(),
        detail: "missing parameter list".to_string(),
    })?;
    let close = matching_close(header, open).ok_or_else(|| SpecError::InvalidSignature {
        unit_id: unit_id.to_string(),
        detail: "unbalanced parameter list".to_string(),
    })?;
    let params_text = &header[open + 1..close];
    let tail = &header[close + 1..];

    let return_type_text = match tail.find("->") {
        Some(arrow) => {
            let end = tail.rfind(':').unwrap_or(tail.len());
            collapse_whitespace(tail[arrow + 2..end].trim())
        }
        None => {
            return Err(SpecError::InvalidSignature {
                unit_id: unit_id.to_string(),
                detail: "missing return annotation".to_string(),
            })
        }
    };
    if return_type_text.is_empty() {
        return Err(SpecError::InvalidSignature {
            unit_id: unit_id.to_string(),
            detail: "empty return annotation".to_string(),
        });
    }

    let mut params = Vec::new();
    for raw in split_top_level(params_text) {
        let text = raw.trim().replace('\n', " ");
        if text.is_empty() {
            continue;
        }
        if text.starts_with('*') {
            return Err(SpecError::InvalidSignature {
                unit_id: unit_id.to_string(),
                detail: format!("star parameter {text:?} is not supported"),
            });
        }
        let (head, default_text) = match split_once_top_level(&text, '=') {
            Some((head, default)) => (head.trim().to_string(), Some(default.trim().to_string())),
            None => (text.clone(), None),
        };
        let Some((param_name, annotation)) = head.split_once(':') else {
            return Err(SpecError::InvalidSignature {
                unit_id: unit_id.to_string(),
                detail: format!("parameter {head:?} has no annotation"),
            });
        };
        let annotation = collapse_whitespace(annotation.trim());
        if annotation.is_empty() {
            return Err(SpecError::InvalidSignature {
                unit_id: unit_id.to_string(),
                detail: format!("parameter {param_name:?} has an empty annotation"),
            });
        }
        params.push(Param {
            name: param_name.trim().to_string(),
            type_text: annotation,
            default_text: default_text.map(|text| collapse_whitespace(&text)),
        });
    }

    Ok(Signature {
        name,
        params,
        return_type_text,
        is_async,
    })
}

fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (pos, ch) in text.char_indices().skip_while(|(pos, _)| *pos < open) {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on the first occurrence of `sep` at bracket depth zero.
fn split_once_top_level(text: &str, sep: char) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (pos, ch) in text.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ if ch == sep && depth == 0 => {
                    return Some((&text[..pos], &text[pos + ch.len_utf8()..]));
                }
                _ => {}
            },
        }
    }
    None
}

/// Collapse insignificant whitespace while preserving tokens.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Indentation of the first non-blank body line.
fn body_indent(lines: &[&str], body_start: usize) -> usize {
    lines[body_start..]
        .iter()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .unwrap_or(4)
}

/// Read a leading triple-quoted docstring, returning its exact inner bytes
/// and the index of the first line after it.
fn read_docstring(lines: &[&str], body_start: usize, body_indent: usize) -> (String, usize) {
    let mut idx = body_start;
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    if idx >= lines.len() {
        return (String::new(), body_start);
    }
    let line = lines[idx];
    let indent = line.len() - line.trim_start().len();
    if indent < body_indent {
        return (String::new(), body_start);
    }
    let trimmed = line.trim_start();
    let delim = if trimmed.starts_with("\"\"\"") {
        "\"\"\""
    } else if trimmed.starts_with("'''") {
        "'''"
    } else {
        return (String::new(), body_start);
    };

    let after_open = &trimmed[delim.len()..];
    if let Some(end) = after_open.find(delim) {
        // Single-line docstring.
        return (after_open[..end].to_string(), idx + 1);
    }

    let mut content = vec![after_open.to_string()];
    let mut j = idx + 1;
    while j < lines.len() {
        if let Some(end) = lines[j].find(delim) {
            content.push(lines[j][..end].to_string());
            return (content.join("\n"), j + 1);
        }
        content.push(lines[j].to_string());
        j += 1;
    }
    (content.join("\n"), j)
}

/// Read body lines up to the sentinel statement, returning the dedented
/// pre-hole text and the index just past the function body.
fn read_pre_hole(
    lines: &[&str],
    start: usize,
    body_indent: usize,
    unit_id: &str,
) -> Result<(String, usize), SpecError> {
    let sentinel = Regex::new(&format!(r"\b{SENTINEL_NAME}\b")).expect("sentinel regex");
    let mut collected: Vec<&str> = Vec::new();
    let mut idx = start;
    let mut sentinel_at: Option<usize> = None;

    while idx < lines.len() {
        let line = lines[idx];
        if line.trim().is_empty() {
            collected.push(line);
            idx += 1;
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        if indent < body_indent {
            break;
        }
        if sentinel.is_match(line) {
            sentinel_at = Some(idx);
            idx += 1;
            break;
        }
        collected.push(line);
        idx += 1;
    }

    if sentinel_at.is_none() {
        return Err(SpecError::SentinelMissing {
            unit_id: unit_id.to_string(),
        });
    }

    // Advance past the rest of the body so the caller resumes scanning after
    // this unit.
    while idx < lines.len() {
        let line = lines[idx];
        if !line.trim().is_empty() {
            let indent = line.len() - line.trim_start().len();
            if indent < body_indent {
                break;
            }
        }
        idx += 1;
    }

    let mut dedented: Vec<String> = collected
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                line[body_indent.min(line.len())..].to_string()
            }
        })
        .collect();
    while dedented.first().is_some_and(|line| line.is_empty()) {
        dedented.remove(0);
    }
    while dedented.last().is_some_and(|line| line.is_empty()) {
        dedented.pop();
    }

    Ok((dedented.join("\n"), idx))
}

/// Names referenced by the pre-hole slice that resolve outside the unit.
fn collect_dependency_refs(
    pre_hole: &str,
    signature: &Signature,
    unit_name: &str,
    resolve: &dyn Fn(&str) -> Option<(String, String)>,
) -> Vec<DependencyRef> {
    if pre_hole.is_empty() {
        return Vec::new();
    }

    let mut local: BTreeSet<&str> = signature.params.iter().map(|p| p.name.as_str()).collect();
    local.insert(unit_name);

    // Assignment and loop targets defined inside the slice are local too.
    for line in pre_hole.lines() {
        let trimmed = line.trim_start();
        if let Some((lhs, rhs)) = trimmed.split_once('=') {
            if !rhs.starts_with('=') && !lhs.ends_with(['!', '<', '>', '+', '-', '*', '/', '%']) {
                for target in lhs.split(',') {
                    let target = target.trim();
                    if identifier_pattern()
                        .find(target)
                        .is_some_and(|m| m.as_str() == target)
                    {
                        local.insert(target);
                    }
                }
            }
        }
        if let Some(rest) = trimmed.strip_prefix("for ") {
            if let Some((targets, _)) = rest.split_once(" in ") {
                for target in targets.split(',') {
                    local.insert(target.trim());
                }
            }
        }
    }

    let mut seen = BTreeSet::new();
    let mut refs = Vec::new();
    for found in identifier_pattern().find_iter(pre_hole) {
        let name = found.as_str();
        if RESERVED_NAMES.contains(&name)
            || name == SENTINEL_NAME
            || local.contains(name)
            || !seen.insert(name.to_string())
        {
            continue;
        }
        match resolve(name) {
            Some((resolved_path, content_hash)) => refs.push(DependencyRef {
                name: name.to_string(),
                resolved_path,
                content_hash,
            }),
            None => refs.push(DependencyRef::unresolved(name)),
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const STUB: &str = r#"import vibesafe
from vibesafe import VibesafeHandled


@vibesafe.func
def add_strs(a: str, b: str) -> str:
    """Add two ints represented as strings.

    >>> add_strs("2", "3")
    '5'
    """
    a_int, b_int = int(a), int(b)
    yield VibesafeHandled()
"#;

    fn no_resolver(_: &str) -> Option<(String, String)> {
        None
    }

    fn extract_one(source: &str) -> Spec {
        let specs = extract_units(source, "app.math.ops", &PathBuf::from("app/math/ops.py"), &no_resolver)
            .expect("extract");
        assert_eq!(specs.len(), 1);
        specs.into_iter().next().unwrap()
    }

    #[test]
    fn extracts_the_happy_path_stub() {
        let spec = extract_one(STUB);
        assert_eq!(spec.unit_id, "app.math.ops/add_strs");
        assert_eq!(spec.kind, UnitKind::Function);
        assert_eq!(
            spec.signature.canonical_text(),
            "def add_strs(a: str, b: str) -> str"
        );
        assert_eq!(spec.examples.len(), 1);
        assert_eq!(spec.examples[0].expected_output, "'5'\n");
        assert_eq!(spec.pre_hole_source, "a_int, b_int = int(a), int(b)");
        assert_eq!(spec.provider_ref, "default");
        assert_eq!(spec.location.line, 5);
    }

    #[test]
    fn http_decorator_options_are_parsed() {
        let source = r#"
@vibesafe.http(method="POST", path="/sum", tags=["math", "demo"])
async def sum_endpoint(a: int, b: int) -> dict:
    """Sum endpoint.

    >>> 1
    1
    """
    payload = {}
    return VibesafeHandled()
"#;
        let spec = extract_one(source);
        assert_eq!(spec.kind, UnitKind::Http);
        assert!(spec.signature.is_async);
        assert_eq!(spec.options.method.as_deref(), Some("POST"));
        assert_eq!(spec.options.path.as_deref(), Some("/sum"));
        assert_eq!(spec.options.tags, vec!["math", "demo"]);
    }

    #[test]
    fn unknown_decorator_option_is_rejected() {
        let source = r#"
@vibesafe.func(retries=3)
def f(a: int) -> int:
    """Doc."""
    yield VibesafeHandled()
"#;
        let err = extract_units(source, "m", &PathBuf::from("m.py"), &no_resolver).unwrap_err();
        assert!(matches!(err, SpecError::DecoratorOptionInvalid { option, .. } if option == "retries"));
    }

    #[test]
    fn missing_sentinel_is_rejected() {
        let source = r#"
@vibesafe.func
def f(a: int) -> int:
    """Doc."""
    return a
"#;
        let err = extract_units(source, "m", &PathBuf::from("m.py"), &no_resolver).unwrap_err();
        assert!(matches!(err, SpecError::SentinelMissing { .. }));
    }

    #[test]
    fn unannotated_parameter_is_rejected() {
        let source = r#"
@vibesafe.func
def f(a) -> int:
    """Doc."""
    yield VibesafeHandled()
"#;
        let err = extract_units(source, "m", &PathBuf::from("m.py"), &no_resolver).unwrap_err();
        assert!(matches!(err, SpecError::InvalidSignature { .. }));
    }

    #[test]
    fn missing_return_annotation_is_rejected() {
        let source = r#"
@vibesafe.func
def f(a: int):
    """Doc."""
    yield VibesafeHandled()
"#;
        let err = extract_units(source, "m", &PathBuf::from("m.py"), &no_resolver).unwrap_err();
        assert!(matches!(err, SpecError::InvalidSignature { .. }));
    }

    #[test]
    fn annotations_are_whitespace_normalised() {
        let source = r#"
@vibesafe.func
def f(items: dict[str,   int], limit: int = 10) -> list[ str ]:
    """Doc."""
    n = limit
    yield VibesafeHandled()
"#;
        let spec = extract_one(source);
        assert_eq!(spec.signature.params[0].type_text, "dict[str, int]");
        assert_eq!(spec.signature.params[1].default_text.as_deref(), Some("10"));
        assert_eq!(spec.signature.return_type_text, "list[ str ]");
    }

    #[test]
    fn multiline_headers_are_reassembled() {
        let source = r#"
@vibesafe.func
def f(
    a: int,
    b: str = "x",
) -> str:
    """Doc."""
    prefix = b
    yield VibesafeHandled()
"#;
        let spec = extract_one(source);
        assert_eq!(
            spec.signature.canonical_text(),
            "def f(a: int, b: str = \"x\") -> str"
        );
    }

    #[test]
    fn dependency_refs_resolve_or_tombstone() {
        let source = r#"
@vibesafe.func
def f(a: int) -> int:
    """Doc."""
    scaled = helper(a) * FACTOR
    yield VibesafeHandled()
"#;
        let resolver = |name: &str| {
            if name == "helper" {
                Some(("app/util.py".to_string(), "abc123".to_string()))
            } else {
                None
            }
        };
        let specs = extract_units(source, "m", &PathBuf::from("m.py"), &resolver).expect("extract");
        let refs = &specs[0].dependency_refs;
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, "helper");
        assert_eq!(refs[0].resolved_path, "app/util.py");
        assert_eq!(refs[1].name, "FACTOR");
        assert_eq!(refs[1].resolved_path, DependencyRef::TOMBSTONE);
    }

    #[test]
    fn two_units_in_one_file_extract_in_order() {
        let source = format!("{STUB}\n\n@vibesafe.func\ndef double(x: int) -> int:\n    \"\"\"Double.\n\n    >>> double(2)\n    4\n    \"\"\"\n    y = x\n    yield VibesafeHandled()\n");
        let specs = extract_units(
            &source,
            "app.math.ops",
            &PathBuf::from("app/math/ops.py"),
            &no_resolver,
        )
        .expect("extract");
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].unit_name(), "add_strs");
        assert_eq!(specs[1].unit_name(), "double");
    }
}
