//! Cross-run analytics: per-component migration totals and
//! recommendations derived from the persisted reports.

use crate::component::ComponentTag;
use crate::error::Result;
use crate::report::{self, MigrationReport};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentAnalytics {
    pub component: ComponentTag,
    pub runs_touched: usize,
    pub files_touched: usize,
    pub calls_migrated: usize,
    pub calls_skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub runs_analyzed: usize,
    pub components: Vec<ComponentAnalytics>,
    pub recommendations: Vec<String>,
}

// ============================================================================
// Analysis
// ============================================================================

/// Aggregate every persisted run into per-component totals.
pub fn analyze(project_root: &Path) -> Result<AnalyticsReport> {
    let summaries = report::list_runs(project_root)?;

    let mut by_component: HashMap<ComponentTag, ComponentAnalytics> = HashMap::new();
    let mut incomplete_runs: Vec<String> = Vec::new();
    let mut latest_validation_failed = false;

    for (index, summary) in summaries.iter().enumerate() {
        let Ok(loaded) = MigrationReport::load(project_root, &summary.run_id) else {
            continue;
        };

        if !loaded.complete {
            incomplete_runs.push(loaded.run_id.clone());
        }
        // Summaries are newest first
        if index == 0 {
            latest_validation_failed = loaded
                .validation
                .as_ref()
                .map(|v| !v.passed)
                .unwrap_or(false);
        }

        accumulate(&mut by_component, &loaded);
    }

    let mut components: Vec<ComponentAnalytics> = ComponentTag::ALL
        .iter()
        .filter_map(|tag| by_component.remove(tag))
        .collect();
    components.sort_by(|a, b| b.calls_migrated.cmp(&a.calls_migrated));

    let recommendations = build_recommendations(
        &components,
        &incomplete_runs,
        latest_validation_failed,
        summaries.len(),
    );

    Ok(AnalyticsReport {
        runs_analyzed: summaries.len(),
        components,
        recommendations,
    })
}

fn accumulate(by_component: &mut HashMap<ComponentTag, ComponentAnalytics>, report: &MigrationReport) {
    for section in &report.components {
        let touched: Vec<_> = section
            .records
            .iter()
            .filter(|r| r.migrated > 0 || r.skipped > 0)
            .collect();
        if touched.is_empty() {
            continue;
        }

        let entry = by_component
            .entry(section.component)
            .or_insert_with(|| ComponentAnalytics {
                component: section.component,
                runs_touched: 0,
                files_touched: 0,
                calls_migrated: 0,
                calls_skipped: 0,
            });

        entry.runs_touched += 1;
        entry.files_touched += touched.len();
        entry.calls_migrated += touched.iter().map(|r| r.migrated).sum::<usize>();
        entry.calls_skipped += touched.iter().map(|r| r.skipped).sum::<usize>();
    }
}

fn build_recommendations(
    components: &[ComponentAnalytics],
    incomplete_runs: &[String],
    latest_validation_failed: bool,
    runs_analyzed: usize,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if runs_analyzed == 0 {
        recommendations
            .push("No migration runs recorded; start with 'logshift migrate --dry-run'".to_string());
        return recommendations;
    }

    for analytics in components {
        if analytics.calls_skipped > 0 {
            recommendations.push(format!(
                "{}: {} call site(s) were skipped and need manual review",
                analytics.component, analytics.calls_skipped
            ));
        }
    }

    let migrated: Vec<ComponentTag> = components.iter().map(|c| c.component).collect();
    for tag in ComponentTag::ALL {
        if !migrated.contains(&tag) {
            recommendations.push(format!(
                "{}: no migrated calls recorded; run 'logshift migrate --component {}'",
                tag, tag
            ));
        }
    }

    for run_id in incomplete_runs {
        recommendations.push(format!(
            "Run {} is incomplete; re-run migration or roll it back",
            run_id
        ));
    }

    if latest_validation_failed {
        recommendations.push(
            "Latest run has validation failures; inspect the report before migrating further"
                .to_string(),
        );
    }

    recommendations
}

// ============================================================================
// Tests
// ============================================================================
