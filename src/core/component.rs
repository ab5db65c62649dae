//! Component tags and the directory→component mapping.
//!
//! Every migratable file belongs to exactly one logical component, which
//! decides the structured logger it binds to. The mapping from directory
//! layout to component is supplied from outside the engine: either a
//! `.logshift/components.json` rule file at the project root, or the
//! built-in default rules when none exists.

use crate::error::{Error, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// ComponentTag
// ============================================================================

/// Closed enumeration of logical components, in fixed migration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentTag {
    #[serde(rename = "CLI")]
    Cli,
    Core,
    #[serde(rename = "MCP")]
    Mcp,
    Swarm,
    Terminal,
    Memory,
    Migration,
    Hooks,
    Enterprise,
}

impl ComponentTag {
    /// All components in deterministic migration order.
    pub const ALL: [ComponentTag; 9] = [
        ComponentTag::Cli,
        ComponentTag::Core,
        ComponentTag::Mcp,
        ComponentTag::Swarm,
        ComponentTag::Terminal,
        ComponentTag::Memory,
        ComponentTag::Migration,
        ComponentTag::Hooks,
        ComponentTag::Enterprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentTag::Cli => "CLI",
            ComponentTag::Core => "Core",
            ComponentTag::Mcp => "MCP",
            ComponentTag::Swarm => "Swarm",
            ComponentTag::Terminal => "Terminal",
            ComponentTag::Memory => "Memory",
            ComponentTag::Migration => "Migration",
            ComponentTag::Hooks => "Hooks",
            ComponentTag::Enterprise => "Enterprise",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        let lowered = s.to_lowercase();
        for tag in Self::ALL {
            if tag.as_str().to_lowercase() == lowered {
                return Ok(tag);
            }
        }
        Err(Error::component_unknown(
            s,
            Self::ALL.iter().map(|t| t.as_str().to_string()).collect(),
        ))
    }
}

impl std::fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ComponentMap
// ============================================================================

/// A single glob rule mapping paths to a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentRule {
    /// Glob pattern matched against the project-relative path.
    pub pattern: String,
    pub component: ComponentTag,
}

/// Ordered rule list; first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentMap {
    pub rules: Vec<ComponentRule>,
}

impl Default for ComponentMap {
    fn default() -> Self {
        let rule = |pattern: &str, component: ComponentTag| ComponentRule {
            pattern: pattern.to_string(),
            component,
        };

        ComponentMap {
            rules: vec![
                rule("src/cli/**", ComponentTag::Cli),
                rule("src/mcp/**", ComponentTag::Mcp),
                rule("src/swarm/**", ComponentTag::Swarm),
                rule("src/terminal/**", ComponentTag::Terminal),
                rule("src/memory/**", ComponentTag::Memory),
                rule("src/migration/**", ComponentTag::Migration),
                rule("src/hooks/**", ComponentTag::Hooks),
                rule("src/enterprise/**", ComponentTag::Enterprise),
                rule("src/core/**", ComponentTag::Core),
                // Anything else under src/ belongs to Core
                rule("src/**", ComponentTag::Core),
            ],
        }
    }
}

impl ComponentMap {
    /// Load the mapping for a project: `.logshift/components.json` when
    /// present, built-in defaults otherwise.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = paths::components_config_path(project_root);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = crate::utils::io::read_file(&path, "read components.json")?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::internal_json(e.to_string(), Some(format!("parse {}", path.display())))
        })
    }

    /// Classify a project-relative path. `None` means the file is outside
    /// every component and is not migratable.
    pub fn classify(&self, relative_path: &str) -> Option<ComponentTag> {
        // Glob rules assume forward slashes
        let normalized = relative_path.replace('\\', "/");
        self.rules
            .iter()
            .find(|r| glob_match::glob_match(&r.pattern, &normalized))
            .map(|r| r.component)
    }
}

// ============================================================================
// File enumeration
// ============================================================================

/// Directories to always skip at any depth (dependency/VCS directories).
const ALWAYS_SKIP_DIRS: &[&str] = &["node_modules", "vendor", ".git", ".svn", ".hg", ".logshift"];

/// Directories to skip only at the root level (build output directories).
const ROOT_ONLY_SKIP_DIRS: &[&str] = &["build", "dist", "target", "cache", "tmp"];

const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs"];

/// Enumerate candidate files for one component, sorted for deterministic
/// processing order.
pub fn candidate_files(root: &Path, map: &ComponentMap, tag: ComponentTag) -> Vec<PathBuf> {
    let mut files = Vec::new();
    walk_recursive(root, root, &mut files);

    files.retain(|f| {
        let relative = relative_path(root, f);
        map.classify(&relative) == Some(tag)
    });

    files.sort();
    files
}

/// Project-relative path with forward slashes.
pub fn relative_path(root: &Path, file: &Path) -> String {
    file.strip_prefix(root)
        .unwrap_or(file)
        .to_string_lossy()
        .replace('\\', "/")
}

fn walk_recursive(dir: &Path, root: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    let is_root = dir == root;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if ALWAYS_SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            if is_root && ROOT_ONLY_SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            walk_recursive(&path, root, files);
        } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if SOURCE_EXTENSIONS.contains(&ext) {
                files.push(path);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trips_through_str() {
        for tag in ComponentTag::ALL {
            assert_eq!(ComponentTag::from_str(tag.as_str()).unwrap(), tag);
        }
    }

    #[test]
    fn tag_from_str_is_case_insensitive() {
        assert_eq!(ComponentTag::from_str("mcp").unwrap(), ComponentTag::Mcp);
        assert_eq!(ComponentTag::from_str("CORE").unwrap(), ComponentTag::Core);
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let err = ComponentTag::from_str("kernel").unwrap_err();
        assert_eq!(err.code.as_str(), "component.unknown");
    }

    #[test]
    fn default_map_classifies_by_directory() {
        let map = ComponentMap::default();
        assert_eq!(map.classify("src/cli/index.ts"), Some(ComponentTag::Cli));
        assert_eq!(map.classify("src/mcp/server.ts"), Some(ComponentTag::Mcp));
        assert_eq!(map.classify("src/core/logger.ts"), Some(ComponentTag::Core));
        // Fallback rule: unmapped src files are Core
        assert_eq!(map.classify("src/utils/helpers.ts"), Some(ComponentTag::Core));
        // Outside src/: not migratable
        assert_eq!(map.classify("scripts/build.ts"), None);
    }

    #[test]
    fn first_matching_rule_wins() {
        let map = ComponentMap {
            rules: vec![
                ComponentRule {
                    pattern: "src/cli/**".to_string(),
                    component: ComponentTag::Cli,
                },
                ComponentRule {
                    pattern: "src/**".to_string(),
                    component: ComponentTag::Core,
                },
            ],
        };
        assert_eq!(map.classify("src/cli/run.js"), Some(ComponentTag::Cli));
        assert_eq!(map.classify("src/other.js"), Some(ComponentTag::Core));
    }

    #[test]
    fn candidate_files_filters_by_component_and_extension() {
        let dir = std::env::temp_dir().join("logshift_component_enum_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("src/cli")).unwrap();
        std::fs::create_dir_all(dir.join("src/core")).unwrap();
        std::fs::create_dir_all(dir.join("node_modules/x")).unwrap();

        std::fs::write(dir.join("src/cli/a.ts"), "console.info('x');\n").unwrap();
        std::fs::write(dir.join("src/cli/notes.md"), "docs\n").unwrap();
        std::fs::write(dir.join("src/core/b.js"), "console.info('y');\n").unwrap();
        std::fs::write(dir.join("node_modules/x/c.js"), "console.info('z');\n").unwrap();

        let map = ComponentMap::default();
        let cli_files = candidate_files(&dir, &map, ComponentTag::Cli);
        assert_eq!(cli_files.len(), 1);
        assert!(cli_files[0].ends_with("src/cli/a.ts"));

        let core_files = candidate_files(&dir, &map, ComponentTag::Core);
        assert_eq!(core_files.len(), 1);
        assert!(core_files[0].ends_with("src/core/b.js"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_prefers_config_file() {
        let dir = std::env::temp_dir().join("logshift_component_load_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join(".logshift")).unwrap();
        std::fs::write(
            dir.join(".logshift/components.json"),
            r#"{"rules":[{"pattern":"lib/**","component":"Memory"}]}"#,
        )
        .unwrap();

        let map = ComponentMap::load(&dir).unwrap();
        assert_eq!(map.rules.len(), 1);
        assert_eq!(map.classify("lib/store.js"), Some(ComponentTag::Memory));
        assert_eq!(map.classify("src/core/a.js"), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
