//! Call-site scanner — locate diagnostic-print calls in raw source text.
//!
//! Detection is pattern-based, not a parse: a `console.<method>(` token
//! sequence found outside strings and comments, with the argument list
//! recovered by walking delimiters forward from the opening parenthesis.
//! Files the host language's own parser would reject still scan; a call
//! site whose delimiters cannot be balanced is returned unresolved so the
//! rewriter can skip it explicitly.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

// ============================================================================
// Types
// ============================================================================

/// The five canonical diagnostic-print methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleMethod {
    Message,
    Info,
    Warning,
    Error,
    Debug,
}

impl ConsoleMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleMethod::Message => "message",
            ConsoleMethod::Info => "info",
            ConsoleMethod::Warning => "warning",
            ConsoleMethod::Error => "error",
            ConsoleMethod::Debug => "debug",
        }
    }

    /// The structured-logger method this maps to. `message` folds into
    /// `info`; the rest map to themselves.
    pub fn target(&self) -> &'static str {
        match self {
            ConsoleMethod::Message | ConsoleMethod::Info => "info",
            ConsoleMethod::Warning => "warning",
            ConsoleMethod::Error => "error",
            ConsoleMethod::Debug => "debug",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "message" => Some(ConsoleMethod::Message),
            "info" => Some(ConsoleMethod::Info),
            "warning" => Some(ConsoleMethod::Warning),
            "error" => Some(ConsoleMethod::Error),
            "debug" => Some(ConsoleMethod::Debug),
            _ => None,
        }
    }
}

/// One located diagnostic-print invocation. Immutable once scanned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSite {
    /// Project-relative source file.
    pub file: String,
    /// 1-indexed line of the receiver token.
    pub line: usize,
    /// 1-indexed column of the receiver token.
    pub column: usize,
    /// Byte span of the whole call expression, receiver through the
    /// closing parenthesis. For unresolved sites the end is the opening
    /// parenthesis.
    pub span: (usize, usize),
    pub method: ConsoleMethod,
    /// Raw argument-list text, kept verbatim. Empty for unresolved sites.
    pub args_text: String,
    /// Best-effort enclosing function name, for log-site attribution.
    pub enclosing_function: Option<String>,
    /// False when the argument list's delimiters could not be balanced.
    pub resolved: bool,
}

// ============================================================================
// Already-migrated detection
// ============================================================================

/// Module path of the structured-logger facade.
pub const LOGGER_MODULE: &str = "@logshift/logging";

/// Explicit marker comment accepted as "already migrated".
pub const MIGRATED_MARKER: &str = "/* logshift:migrated */";

/// A file already bound to the structured logger is a migration no-op.
pub fn is_migrated(content: &str) -> bool {
    content.contains(LOGGER_MODULE) || content.contains(MIGRATED_MARKER)
}

// ============================================================================
// Scan
// ============================================================================

fn call_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"console\s*\.\s*(message|info|warning|error|debug)\s*\(")
            .expect("call pattern is valid")
    })
}

/// Scan source text for diagnostic-print call sites, earliest first.
///
/// Already-migrated files yield zero call sites (idempotence).
pub fn scan_source(content: &str, file: &str) -> Vec<CallSite> {
    if is_migrated(content) {
        return Vec::new();
    }

    let mask = code_mask(content);
    let mut sites = Vec::new();

    for cap in call_pattern().captures_iter(content) {
        let whole = cap.get(0).expect("capture 0 exists");
        let start = whole.start();

        // Receiver must stand alone: reject `myconsole.info` and
        // qualified receivers like `app.console.info`.
        if start > 0 && is_receiver_joined(content.as_bytes()[start - 1]) {
            continue;
        }

        // Skip matches inside strings and comments.
        if !mask.get(start).copied().unwrap_or(false) {
            continue;
        }

        let method = ConsoleMethod::parse(&cap[1]).expect("pattern restricts method names");
        let open = whole.end() - 1;
        let (line, column) = line_col(content, start);
        let enclosing_function = enclosing_function(content, start);

        match extract_balanced_args(content, open) {
            Some((args_text, close)) => sites.push(CallSite {
                file: file.to_string(),
                line,
                column,
                span: (start, close + 1),
                method,
                args_text,
                enclosing_function,
                resolved: true,
            }),
            None => sites.push(CallSite {
                file: file.to_string(),
                line,
                column,
                span: (start, open),
                method,
                args_text: String::new(),
                enclosing_function,
                resolved: false,
            }),
        }
    }

    sites
}

/// Count diagnostic-print call sites, including in files that carry the
/// migrated marker. The validator uses this to count leftovers; ordinary
/// scans go through `scan_source`.
pub fn count_console_calls(content: &str) -> usize {
    let mask = code_mask(content);
    call_pattern()
        .captures_iter(content)
        .filter(|cap| {
            let start = cap.get(0).expect("capture 0 exists").start();
            if start > 0 && is_receiver_joined(content.as_bytes()[start - 1]) {
                return false;
            }
            mask.get(start).copied().unwrap_or(false)
        })
        .count()
}

/// A structured-logger invocation found in migrated text.
#[derive(Debug, Clone)]
pub struct LoggerCall {
    pub method: String,
    pub offset: usize,
    /// Verbatim argument text when the call's delimiters resolve.
    pub args_text: Option<String>,
}

fn logger_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"logger\s*\.\s*(info|warning|error|debug)\s*\(")
            .expect("logger pattern is valid")
    })
}

/// Locate `logger.<method>(` invocations; the validator replays these
/// against a capturing mock.
pub fn scan_logger_calls(content: &str) -> Vec<LoggerCall> {
    let mask = code_mask(content);
    let mut calls = Vec::new();

    for cap in logger_pattern().captures_iter(content) {
        let whole = cap.get(0).expect("capture 0 exists");
        let start = whole.start();

        if start > 0 && is_receiver_joined(content.as_bytes()[start - 1]) {
            continue;
        }
        if !mask.get(start).copied().unwrap_or(false) {
            continue;
        }

        let open = whole.end() - 1;
        calls.push(LoggerCall {
            method: cap[1].to_string(),
            offset: start,
            args_text: extract_balanced_args(content, open).map(|(args, _)| args),
        });
    }

    calls
}

/// True when the byte before a receiver token glues it to a larger
/// identifier or member chain.
fn is_receiver_joined(prev: u8) -> bool {
    prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'$' || prev == b'.'
}

/// Convert a byte offset to 1-indexed (line, column).
fn line_col(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset];
    let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
    let column = before.rfind('\n').map(|p| offset - p).unwrap_or(offset + 1);
    (line, column)
}

// ============================================================================
// Delimiter walking
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum LexState {
    Code,
    LineComment,
    BlockComment,
    Single,
    Double,
    Template,
}

/// Mark which byte positions are code (outside strings and comments).
///
/// Template-literal interiors count as non-code, including `${}`
/// interpolations; this loses call sites inside interpolations, which is
/// an accepted precision limit of the textual scan.
fn code_mask(content: &str) -> Vec<bool> {
    let bytes = content.as_bytes();
    let mut mask = vec![false; bytes.len()];
    let mut state = LexState::Code;
    let mut i = 0;

    while i < bytes.len() {
        match state {
            LexState::Code => match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    state = LexState::LineComment;
                    i += 2;
                    continue;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    state = LexState::BlockComment;
                    i += 2;
                    continue;
                }
                b'\'' => state = LexState::Single,
                b'"' => state = LexState::Double,
                b'`' => state = LexState::Template,
                _ => mask[i] = true,
            },
            LexState::LineComment => {
                if bytes[i] == b'\n' {
                    state = LexState::Code;
                }
            }
            LexState::BlockComment => {
                if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    state = LexState::Code;
                    i += 2;
                    continue;
                }
            }
            LexState::Single => match bytes[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'\'' | b'\n' => state = LexState::Code,
                _ => {}
            },
            LexState::Double => match bytes[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'"' | b'\n' => state = LexState::Code,
                _ => {}
            },
            LexState::Template => match bytes[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'`' => state = LexState::Code,
                _ => {}
            },
        }
        i += 1;
    }

    mask
}

/// Walk forward from an opening parenthesis and recover the verbatim
/// argument-list text. Returns `(args_text, close_offset)`, or `None`
/// when nesting never resolves before end of input.
pub fn extract_balanced_args(content: &str, open: usize) -> Option<(String, usize)> {
    let bytes = content.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }

    let mut depth: i32 = 0;
    let mut state = LexState::Code;
    let mut i = open;

    while i < bytes.len() {
        match state {
            LexState::Code => match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    state = LexState::LineComment;
                    i += 2;
                    continue;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    state = LexState::BlockComment;
                    i += 2;
                    continue;
                }
                b'\'' => state = LexState::Single,
                b'"' => state = LexState::Double,
                b'`' => state = LexState::Template,
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        if bytes[i] != b')' {
                            // Mismatched closer for the call's parenthesis
                            return None;
                        }
                        let args = content[open + 1..i].to_string();
                        return Some((args, i));
                    }
                    if depth < 0 {
                        return None;
                    }
                }
                _ => {}
            },
            LexState::LineComment => {
                if bytes[i] == b'\n' {
                    state = LexState::Code;
                }
            }
            LexState::BlockComment => {
                if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    state = LexState::Code;
                    i += 2;
                    continue;
                }
            }
            LexState::Single => match bytes[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'\'' | b'\n' => state = LexState::Code,
                _ => {}
            },
            LexState::Double => match bytes[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'"' | b'\n' => state = LexState::Code,
                _ => {}
            },
            LexState::Template => match bytes[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'`' => state = LexState::Code,
                _ => {}
            },
        }
        i += 1;
    }

    None
}

/// Check a whole file's bracket nesting, tolerant of strings and comments.
///
/// Used by the validator's syntax check: a rewritten file must still
/// balance, otherwise the rewrite corrupted structure.
pub fn check_delimiters(content: &str) -> std::result::Result<(), String> {
    let mask = code_mask(content);
    let mut stack: Vec<(u8, usize)> = Vec::new();

    for (i, &b) in content.as_bytes().iter().enumerate() {
        if !mask.get(i).copied().unwrap_or(false) {
            continue;
        }
        match b {
            b'(' | b'[' | b'{' => stack.push((b, i)),
            b')' | b']' | b'}' => {
                let expected = match b {
                    b')' => b'(',
                    b']' => b'[',
                    _ => b'{',
                };
                match stack.pop() {
                    Some((opener, _)) if opener == expected => {}
                    Some((opener, pos)) => {
                        let (line, _) = line_col(content, pos);
                        return Err(format!(
                            "mismatched '{}' opened at line {}",
                            opener as char, line
                        ));
                    }
                    None => {
                        let (line, _) = line_col(content, i);
                        return Err(format!("unopened '{}' at line {}", b as char, line));
                    }
                }
            }
            _ => {}
        }
    }

    if let Some((opener, pos)) = stack.pop() {
        let (line, _) = line_col(content, pos);
        return Err(format!(
            "unclosed '{}' opened at line {}",
            opener as char, line
        ));
    }

    Ok(())
}

// ============================================================================
// Enclosing function attribution
// ============================================================================

fn function_patterns() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"function\s+([A-Za-z_$][\w$]*)").expect("valid"),
            Regex::new(r"(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:function\b|\()")
                .expect("valid"),
            Regex::new(r"^\s*(?:async\s+)?([A-Za-z_$][\w$]*)\s*\([^)]*\)\s*\{").expect("valid"),
        ]
    })
}

const NON_FUNCTION_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "await", "typeof", "new",
];

/// Best-effort: nearest function-looking declaration above the call site.
fn enclosing_function(content: &str, offset: usize) -> Option<String> {
    let before = &content[..offset];

    for line in before.lines().rev() {
        for re in function_patterns() {
            if let Some(cap) = re.captures(line) {
                let name = cap[1].to_string();
                if !NON_FUNCTION_KEYWORDS.contains(&name.as_str()) {
                    return Some(name);
                }
            }
        }
    }

    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_all_five_methods() {
        let src = "console.message('a');\nconsole.info('b');\nconsole.warning('c');\nconsole.error('d');\nconsole.debug('e');\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites.len(), 5);
        assert_eq!(sites[0].method, ConsoleMethod::Message);
        assert_eq!(sites[4].method, ConsoleMethod::Debug);
        assert!(sites.iter().all(|s| s.resolved));
    }

    #[test]
    fn sites_are_ordered_earliest_first() {
        let src = "console.error('late');\nconsole.info('later');\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites[0].line, 1);
        assert_eq!(sites[1].line, 2);
        assert!(sites[0].span.0 < sites[1].span.0);
    }

    #[test]
    fn argument_text_is_verbatim() {
        let src = "console.info('count:', items.length, { nested: [1, 2] });\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].args_text, "'count:', items.length, { nested: [1, 2] }");
    }

    #[test]
    fn multiline_arguments_resolve() {
        let src = "console.error(\n  'failed',\n  { code: err.code }\n);\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites.len(), 1);
        assert!(sites[0].resolved);
        assert!(sites[0].args_text.contains("err.code"));
    }

    #[test]
    fn parens_inside_strings_do_not_confuse_extraction() {
        let src = "console.info('a ) tricky ( string', other);\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].args_text, "'a ) tricky ( string', other");
    }

    #[test]
    fn unresolved_site_is_flagged_not_dropped() {
        let src = "console.info('never closes', {\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites.len(), 1);
        assert!(!sites[0].resolved);
        assert!(sites[0].args_text.is_empty());
    }

    #[test]
    fn calls_in_comments_and_strings_are_ignored() {
        let src = "// console.info('commented');\n/* console.error('blocked'); */\nconst s = \"console.debug('strung')\";\nconsole.info('real');\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].line, 4);
    }

    #[test]
    fn qualified_and_prefixed_receivers_are_ignored() {
        let src = "myconsole.info('no');\napp.console.error('no');\nconsole.info('yes');\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].line, 3);
    }

    #[test]
    fn unknown_methods_are_ignored() {
        let src = "console.table(rows);\nconsole.log('not in the set');\n";
        let sites = scan_source(src, "t.js");
        assert!(sites.is_empty());
    }

    #[test]
    fn migrated_file_yields_zero_sites() {
        let src = "import { getComponentLogger } from '@logshift/logging';\nconsole.info('left for review');\n";
        assert!(scan_source(src, "t.js").is_empty());

        let marked = "/* logshift:migrated */\nconsole.info('x');\n";
        assert!(scan_source(marked, "t.js").is_empty());
    }

    #[test]
    fn tolerates_malformed_surroundings() {
        // Unclosed brace earlier in the file must not prevent scanning
        let src = "function broken( {\nconsole.info('still found');\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites.len(), 1);
    }

    #[test]
    fn enclosing_function_declaration() {
        let src = "function setupServer(port) {\n  console.info('listening', port);\n}\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites[0].enclosing_function.as_deref(), Some("setupServer"));
    }

    #[test]
    fn enclosing_arrow_function() {
        let src = "const handleExit = async (code) => {\n  console.warning('exiting', code);\n};\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites[0].enclosing_function.as_deref(), Some("handleExit"));
    }

    #[test]
    fn enclosing_method_shorthand() {
        let src = "class Server {\n  start(port) {\n    console.info('up');\n  }\n}\n";
        let sites = scan_source(src, "t.js");
        assert_eq!(sites[0].enclosing_function.as_deref(), Some("start"));
    }

    #[test]
    fn no_enclosing_function_at_top_level() {
        let src = "console.info('top level');\n";
        let sites = scan_source(src, "t.js");
        assert!(sites[0].enclosing_function.is_none());
    }

    #[test]
    fn check_delimiters_accepts_balanced() {
        assert!(check_delimiters("function f() { return [1, (2)]; }\n").is_ok());
    }

    #[test]
    fn check_delimiters_rejects_unclosed() {
        let err = check_delimiters("function f() { return [1;\n").unwrap_err();
        assert!(err.contains("unclosed"));
    }

    #[test]
    fn check_delimiters_ignores_brackets_in_strings() {
        assert!(check_delimiters("const s = '}}}((';\n").is_ok());
    }

    #[test]
    fn count_console_calls_ignores_migrated_marker() {
        let src = "import { getComponentLogger } from '@logshift/logging';\nconsole.info('leftover');\n";
        assert!(scan_source(src, "t.js").is_empty());
        assert_eq!(count_console_calls(src), 1);
    }

    #[test]
    fn scan_logger_calls_finds_replayable_invocations() {
        let src = "logger.info('a', { caller: 'f' });\nlogger.error('b');\nmylogger.info('no');\n";
        let calls = scan_logger_calls(src);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, "info");
        assert_eq!(calls[0].args_text.as_deref(), Some("'a', { caller: 'f' }"));
        assert_eq!(calls[1].method, "error");
    }

    #[test]
    fn line_col_is_one_indexed() {
        let src = "ab\ncd";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 3), (2, 1));
        assert_eq!(line_col(src, 4), (2, 2));
    }
}
