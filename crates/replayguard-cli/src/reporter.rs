//! Human-facing text rendering of a [`SessionResult`] (spec §6.4).
//!
//! Grounded on the teacher's CLI command-handler style
//! (`contract_diff_commands.rs`): plain `println!`/`eprintln!` with
//! `colored` for emphasis, no table-drawing dependency.

use colored::Colorize;
use replayguard_core::SessionResult;

/// Render a full session report as colored text.
pub fn render_text(result: &SessionResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("Session: {}\n", result.session_id.bold()));
    out.push_str(&format!("Comparison mode: {:?}\n", result.comparison_mode));

    let score = result.summary.compatibility_score;
    let score_line = format!("Compatibility score: {score:.1}%");
    out.push_str(&if score >= 100.0 {
        format!("{}\n", score_line.green())
    } else if score >= 80.0 {
        format!("{}\n", score_line.yellow())
    } else {
        format!("{}\n", score_line.red())
    });
    out.push_str(&format!("Effective compatibility score: {:.1}%\n", result.summary.effective_compatibility_score));
    out.push_str(&format!(
        "Interactions: {} total, {} compatible, {} incompatible, {} errored\n",
        result.summary.total, result.summary.compatible, result.summary.incompatible, result.summary.errors
    ));

    let incompatibilities = result.incompatibilities();
    if incompatibilities.is_empty() {
        out.push_str(&format!("{}\n", "No incompatibilities found.".green()));
    } else {
        out.push_str(&format!("\n{}\n", "Incompatibilities:".red().bold()));
        for incompat in &incompatibilities {
            out.push_str(&format!("  {} {}\n", "-".red(), incompat.endpoint));
            if incompat.status_changed {
                out.push_str("      status code changed\n");
            }
            for field in &incompat.removed_fields {
                out.push_str(&format!("      removed: {field}\n"));
            }
            for change in &incompat.type_changes {
                out.push_str(&format!("      type change: {change}\n"));
            }
        }
    }

    let tolerated = result.tolerated_changes();
    if !tolerated.is_empty() {
        out.push_str(&format!("\n{}\n", "Tolerated changes:".yellow().bold()));
        for change in &tolerated {
            out.push_str(&format!("  {} {} ({} paths)\n", "~".yellow(), change.endpoint, change.paths.len()));
        }
    }

    if let Some(performance) = &result.performance {
        out.push_str(&format!("\n{}\n", "Performance:".bold()));
        out.push_str(&format!(
            "  cache hits {} / misses {}, templates compiled {}, renders {} (avg {}us)\n",
            performance.resolver.cache_hits,
            performance.resolver.cache_misses,
            performance.resolver.template_compilations,
            performance.resolver.template_renders,
            performance.resolver.average_render_time_micros()
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use replayguard_core::{summarize, ComparisonMode};

    #[test]
    fn renders_without_panicking_on_empty_session() {
        let summary = summarize(std::iter::empty::<Option<&replayguard_core::ComparisonResult>>());
        let result = SessionResult {
            session_id: "empty".to_string(),
            timestamp: chrono::Utc::now(),
            comparison_mode: ComparisonMode::Default.into(),
            contract_file: None,
            summary,
            interaction_results: Vec::new(),
            filter: None,
            filtered_stats: None,
            performance: None,
        };
        let text = render_text(&result);
        assert!(text.contains("Session: empty"));
    }
}
