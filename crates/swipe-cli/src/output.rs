//! Output formatting for command results.
//!
//! Supports both human-readable terminal output and JSON for scripting.

use crate::engine::IngestSummary;
use serde::Serialize;
use swipe_core::batch::BatchRunReport;
use swipe_core::types::{Recommendation, RecommendationSource, UserInteraction};

/// JSON output structure for recommendations
#[derive(Serialize)]
pub struct JsonOutput<'a> {
    pub user: &'a str,
    pub recommendations: &'a [Recommendation],
}

/// Formats recommendations as JSON.
pub fn format_json(user: &str, recs: &[Recommendation]) -> String {
    let output = JsonOutput {
        user,
        recommendations: recs,
    };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Formats recommendations for human-readable terminal output.
pub fn format_human(user: &str, recs: &[Recommendation]) -> String {
    if recs.is_empty() {
        return format!("No recommendations for \"{}\"", user);
    }

    let mut output = String::new();
    let source = match recs[0].source {
        RecommendationSource::Clusters => "from matched clusters",
        RecommendationSource::ColdStart => "popular recently",
    };
    output.push_str(&format!(
        "{} post{} for \"{}\" ({}):\n\n",
        recs.len(),
        if recs.len() == 1 { "" } else { "s" },
        user,
        source
    ));

    for (i, rec) in recs.iter().enumerate() {
        output.push_str(&format!("{}. {} (score: {:.2})\n", i + 1, rec.entity_id, rec.score));
        if !rec.reasons.is_empty() {
            output.push_str(&format!("   [{}]\n", rec.reasons.join(", ")));
        }
    }

    output.trim_end().to_string()
}

pub fn format_interaction(logged: &UserInteraction) -> String {
    format!(
        "Recorded {} by {} on {} {} ({})",
        logged.interaction_type, logged.user_id, logged.entity_type, logged.entity_id, logged.id
    )
}

pub fn format_ingest(summary: &IngestSummary) -> String {
    format!(
        "Ingested {} post{}: {} embedded, {} failed, {} cluster assignment{}",
        summary.posts,
        if summary.posts == 1 { "" } else { "s" },
        summary.embedded,
        summary.failed,
        summary.cluster_assignments,
        if summary.cluster_assignments == 1 { "" } else { "s" },
    )
}

/// Formats a batch job report; `None` means the job was already running.
pub fn format_report(job: &str, report: Option<&BatchRunReport>, json: bool) -> String {
    if json {
        #[derive(Serialize)]
        struct JsonReport<'a> {
            job: &'a str,
            skipped_run: bool,
            report: Option<&'a BatchRunReport>,
        }
        let output = JsonReport {
            job,
            skipped_run: report.is_none(),
            report,
        };
        return serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string());
    }

    match report {
        None => format!("{}: already running, skipped", job),
        Some(r) => format!(
            "{}: {} processed, {} succeeded, {} failed, {} skipped in {} ms",
            job, r.processed, r.succeeded, r.failed, r.skipped, r.elapsed_ms
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use swipe_core::types::EntityKind;

    fn make_rec(id: &str, score: f32, reasons: &[&str]) -> Recommendation {
        Recommendation {
            entity_id: id.to_string(),
            entity_type: EntityKind::Post,
            score,
            timestamp: Utc::now(),
            source: RecommendationSource::Clusters,
            reasons: reasons.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_format_human_empty() {
        let output = format_human("u1", &[]);
        assert!(output.contains("No recommendations"));
    }

    #[test]
    fn test_format_human_single() {
        let recs = vec![make_rec("post-7", 0.85, &["cluster:food", "fresh"])];
        let output = format_human("u1", &recs);
        assert!(output.contains("1 post for"));
        assert!(output.contains("post-7"));
        assert!(output.contains("0.85"));
        assert!(output.contains("cluster:food, fresh"));
    }

    #[test]
    fn test_format_json() {
        let recs = vec![make_rec("post-7", 0.5, &[])];
        let output = format_json("u1", &recs);
        assert!(output.contains("\"user\": \"u1\""));
        assert!(output.contains("\"entity_id\": \"post-7\""));
        assert!(output.contains("\"source\": \"clusters\""));
        assert!(!output.contains("reasons"));
    }

    #[test]
    fn test_format_report() {
        let report = BatchRunReport {
            processed: 10,
            succeeded: 8,
            failed: 1,
            skipped: 1,
            elapsed_ms: 12,
        };
        assert_eq!(
            format_report("embeddings", Some(&report), false),
            "embeddings: 10 processed, 8 succeeded, 1 failed, 1 skipped in 12 ms"
        );
        assert!(format_report("clustering", None, false).contains("already running"));
        assert!(format_report("clustering", None, true).contains("\"skipped_run\": true"));
    }
}
