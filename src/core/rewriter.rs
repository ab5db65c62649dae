//! Rewriter — turn located call sites into structured-logger calls.
//!
//! Replacements run back-to-front over the original text so earlier byte
//! spans stay valid, the same offset discipline the rename engine uses.
//! Argument text is spliced verbatim; the only additions are the mapped
//! method name, an optional caller tag, and a single logger
//! import/acquisition stanza per file.

use crate::component::ComponentTag;
use crate::scanner::{self, CallSite};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

// ============================================================================
// Types
// ============================================================================

/// A call site the rewriter refused to touch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSite {
    pub line: usize,
    pub method: String,
    pub reason: String,
}

/// Result of rewriting one file's content.
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    /// New file content after all replacements and the import insertion.
    pub content: String,
    /// Number of call sites rewritten.
    pub rewritten: usize,
    /// Call sites left for manual review.
    pub skipped: Vec<SkippedSite>,
    /// Human-readable descriptions of the patterns applied.
    pub patterns: Vec<String>,
    pub import_added: bool,
}

pub const SKIP_REASON_UNRESOLVED: &str = "unbalanced delimiters in argument list — manual review";

// ============================================================================
// Import stanza
// ============================================================================

/// The import + acquisition stanza binding a file to its component logger.
pub fn logger_import_stanza(component: ComponentTag) -> String {
    format!(
        "import {{ getComponentLogger }} from '{}';\nconst logger = getComponentLogger('{}');\n",
        scanner::LOGGER_MODULE,
        component.as_str()
    )
}

fn import_line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:import\b[^\n]*|(?:const|let|var)\s+[^\n=]*=\s*require\([^\n]*)$")
            .expect("import pattern is valid")
    })
}

/// Insert the logger stanza after the last existing import statement, or
/// at the top of the file (after a shebang) when there are none.
fn insert_import(content: &str, component: ComponentTag) -> String {
    let stanza = logger_import_stanza(component);

    let insert_at = match import_line_pattern().find_iter(content).last() {
        Some(m) => {
            // End of the matched line, past its newline if present
            let end = m.end();
            if content[end..].starts_with('\n') {
                end + 1
            } else {
                end
            }
        }
        None if content.starts_with("#!") => {
            content.find('\n').map(|p| p + 1).unwrap_or(content.len())
        }
        None => 0,
    };

    let mut out = String::with_capacity(content.len() + stanza.len());
    out.push_str(&content[..insert_at]);
    out.push_str(&stanza);
    out.push_str(&content[insert_at..]);
    out
}

// ============================================================================
// Rewrite
// ============================================================================

/// Build the replacement expression for a resolved call site.
fn replacement_for(site: &CallSite) -> String {
    let target = site.method.target();
    let args = site.args_text.trim();

    match (&site.enclosing_function, args.is_empty()) {
        (Some(caller), false) => {
            format!("logger.{}({}, {{ caller: '{}' }})", target, site.args_text, caller)
        }
        (Some(caller), true) => format!("logger.{}({{ caller: '{}' }})", target, caller),
        (None, _) => format!("logger.{}({})", target, site.args_text),
    }
}

/// Rewrite every resolved call site in `content`, binding the file to the
/// logger for `component`. Unresolved sites are skipped explicitly;
/// partial success is reported, never silently dropped.
pub fn rewrite_file(content: &str, sites: &[CallSite], component: ComponentTag) -> RewriteOutcome {
    let mut new_content = content.to_string();
    let mut rewritten = 0usize;
    let mut skipped = Vec::new();
    let mut mappings: BTreeSet<String> = BTreeSet::new();

    // Back-to-front so earlier spans remain valid
    for site in sites.iter().rev() {
        if !site.resolved {
            skipped.push(SkippedSite {
                line: site.line,
                method: site.method.as_str().to_string(),
                reason: SKIP_REASON_UNRESOLVED.to_string(),
            });
            continue;
        }

        let (start, end) = site.span;
        new_content.replace_range(start..end, &replacement_for(site));
        rewritten += 1;
        mappings.insert(format!(
            "console.{} → logger.{}",
            site.method.as_str(),
            site.method.target()
        ));
    }

    // Skips were collected in reverse file order
    skipped.reverse();

    let mut patterns: Vec<String> = mappings.into_iter().collect();

    let import_added = rewritten > 0 && !scanner::is_migrated(content);
    if import_added {
        new_content = insert_import(&new_content, component);
        patterns.push(format!(
            "bound to component logger '{}'",
            component.as_str()
        ));
    }

    RewriteOutcome {
        content: new_content,
        rewritten,
        skipped,
        patterns,
        import_added,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan_source;

    fn rewrite(src: &str) -> RewriteOutcome {
        let sites = scan_source(src, "t.js");
        rewrite_file(src, &sites, ComponentTag::Core)
    }

    #[test]
    fn message_maps_to_info() {
        let out = rewrite("console.message('hello');\n");
        assert!(out.content.contains("logger.info('hello')"));
        assert!(!out.content.contains("console.message"));
        assert_eq!(out.rewritten, 1);
    }

    #[test]
    fn severity_methods_map_to_themselves() {
        let out = rewrite("console.warning('w');\nconsole.error('e');\nconsole.debug('d');\n");
        assert!(out.content.contains("logger.warning('w')"));
        assert!(out.content.contains("logger.error('e')"));
        assert!(out.content.contains("logger.debug('d')"));
        assert_eq!(out.rewritten, 3);
    }

    #[test]
    fn argument_text_preserved_verbatim() {
        let args = "'failed: %s', err.message, { code: err.code, attempts: n + 1 }";
        let out = rewrite(&format!("console.error({});\n", args));
        assert!(out.content.contains(&format!("logger.error({})", args)));
    }

    #[test]
    fn caller_attached_when_known() {
        let out = rewrite("function boot() {\n  console.info('starting');\n}\n");
        assert!(out
            .content
            .contains("logger.info('starting', { caller: 'boot' })"));
    }

    #[test]
    fn caller_is_sole_argument_for_empty_calls() {
        let out = rewrite("function tick() {\n  console.debug();\n}\n");
        assert!(out.content.contains("logger.debug({ caller: 'tick' })"));
    }

    #[test]
    fn import_inserted_at_top_without_existing_imports() {
        let out = rewrite("console.info('x');\n");
        assert!(out.import_added);
        assert!(out.content.starts_with("import { getComponentLogger }"));
        assert!(out.content.contains("getComponentLogger('Core')"));
    }

    #[test]
    fn import_inserted_after_last_import() {
        let src = "import fs from 'fs';\nimport path from 'path';\n\nconsole.info('x');\n";
        let out = rewrite(src);
        let import_pos = out.content.find("getComponentLogger").unwrap();
        let path_pos = out.content.find("from 'path'").unwrap();
        assert!(import_pos > path_pos, "stanza must follow the last import:\n{}", out.content);
    }

    #[test]
    fn import_inserted_after_require_style_imports() {
        let src = "const fs = require('fs');\n\nconsole.info('x');\n";
        let out = rewrite(src);
        let stanza_pos = out.content.find("getComponentLogger").unwrap();
        let require_pos = out.content.find("require('fs')").unwrap();
        assert!(stanza_pos > require_pos);
    }

    #[test]
    fn shebang_stays_first() {
        let src = "#!/usr/bin/env node\nconsole.info('x');\n";
        let out = rewrite(src);
        assert!(out.content.starts_with("#!/usr/bin/env node\n"));
        let stanza_pos = out.content.find("getComponentLogger").unwrap();
        assert!(stanza_pos > 0);
    }

    #[test]
    fn exactly_one_stanza_for_many_sites() {
        let out = rewrite("console.info('a');\nconsole.error('b');\nconsole.debug('c');\n");
        assert_eq!(out.content.matches(scanner::LOGGER_MODULE).count(), 1);
    }

    #[test]
    fn unresolved_site_skipped_and_reported() {
        let src = "console.info('fine');\nconsole.error('broken', {\n";
        let out = rewrite(src);
        assert_eq!(out.rewritten, 1);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].line, 2);
        assert_eq!(out.skipped[0].reason, SKIP_REASON_UNRESOLVED);
        // The broken call remains untouched for manual review
        assert!(out.content.contains("console.error('broken'"));
        assert!(out.content.contains("logger.info('fine'"));
    }

    #[test]
    fn zero_rewrites_means_no_import() {
        let src = "console.error('only broken', {\n";
        let out = rewrite(src);
        assert_eq!(out.rewritten, 0);
        assert!(!out.import_added);
        assert!(!out.content.contains(scanner::LOGGER_MODULE));
    }

    #[test]
    fn rewritten_file_scans_as_migrated() {
        let out = rewrite("console.info('x');\n");
        assert!(scan_source(&out.content, "t.js").is_empty());
    }

    #[test]
    fn patterns_describe_applied_mappings() {
        let out = rewrite("console.message('a');\nconsole.message('b');\nconsole.error('c');\n");
        assert!(out
            .patterns
            .iter()
            .any(|p| p == "console.message → logger.info"));
        assert!(out.patterns.iter().any(|p| p == "console.error → logger.error"));
        assert!(out.patterns.iter().any(|p| p.contains("component logger")));
    }
}
