//! Shared domain types passed between the source adapter, the analysis
//! fan-out, and persistence.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clients::ClientConfig;

/// One social-media post row from the client's source sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    pub url: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub likes: i64,
    pub shares: i64,
}

/// One comment row, keyed back to its post by URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawComment {
    pub post_url: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub likes: i64,
}

/// Everything newer than the client's watermark, scoped to one run.
///
/// Ephemeral: consumed entirely within the run that fetched it, never
/// persisted on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDeltaBatch {
    pub posts: Vec<RawPost>,
    pub comments: Vec<RawComment>,
}

impl RawDeltaBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.comments.is_empty()
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.posts.len() + self.comments.len()
    }

    /// Newest `created_at` across posts and comments; `None` when empty.
    ///
    /// This is the value the watermark advances to on a successful commit,
    /// so a record created between fetch and commit is picked up next run.
    #[must_use]
    pub fn max_created_at(&self) -> Option<DateTime<Utc>> {
        let newest_post = self.posts.iter().map(|p| p.created_at).max();
        let newest_comment = self.comments.iter().map(|c| c.created_at).max();
        newest_post.max(newest_comment)
    }
}

/// Outcome of exactly one analysis-unit invocation.
///
/// A unit either produced a payload or a typed failure — never both, never
/// neither. Failures are legitimate, storable outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisUnitResult {
    Ok { payload: Value },
    Failed { error: String },
}

impl AnalysisUnitResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, AnalysisUnitResult::Ok { .. })
    }
}

/// The merged per-client, per-run payload that validation and persistence
/// operate on atomically.
///
/// Results are keyed by unit id in a `BTreeMap` so the serialised body is
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedInsight {
    pub client_id: String,
    pub run_time: DateTime<Utc>,
    pub results: BTreeMap<String, AnalysisUnitResult>,
}

/// Per-client run state threaded explicitly through the pipeline.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub client: ClientConfig,
    pub run_time: DateTime<Utc>,
    /// Watermark at the start of this run; `None` means never analyzed.
    pub since: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(ts: DateTime<Utc>) -> RawPost {
        RawPost {
            url: "https://x.com/p/1".to_string(),
            platform: "x".to_string(),
            created_at: ts,
            content: "hello".to_string(),
            likes: 1,
            shares: 0,
        }
    }

    fn comment(ts: DateTime<Utc>) -> RawComment {
        RawComment {
            post_url: "https://x.com/p/1".to_string(),
            author: "someone".to_string(),
            text: "nice".to_string(),
            created_at: ts,
            likes: 0,
        }
    }

    #[test]
    fn empty_batch_has_no_max_created_at() {
        let batch = RawDeltaBatch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.max_created_at(), None);
    }

    #[test]
    fn max_created_at_spans_posts_and_comments() {
        let t1 = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 1, 11, 9, 30, 0).unwrap();
        let batch = RawDeltaBatch {
            posts: vec![post(t1)],
            comments: vec![comment(t2)],
        };
        assert_eq!(batch.record_count(), 2);
        assert_eq!(batch.max_created_at(), Some(t2));
    }

    #[test]
    fn unit_result_serialises_with_status_tag() {
        let ok = AnalysisUnitResult::Ok {
            payload: serde_json::json!({"score": 0.5}),
        };
        let failed = AnalysisUnitResult::Failed {
            error: "timed out".to_string(),
        };

        let ok_json = serde_json::to_value(&ok).unwrap();
        let failed_json = serde_json::to_value(&failed).unwrap();

        assert_eq!(ok_json["status"], "ok");
        assert_eq!(ok_json["payload"]["score"], 0.5);
        assert_eq!(failed_json["status"], "failed");
        assert_eq!(failed_json["error"], "timed out");
    }

    #[test]
    fn unit_result_round_trips() {
        let json = r#"{"status":"failed","error":"boom"}"#;
        let parsed: AnalysisUnitResult = serde_json::from_str(json).unwrap();
        assert!(!parsed.is_ok());
    }
}
