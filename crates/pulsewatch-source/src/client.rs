//! HTTP client for the sheet gateway.
//!
//! Each client's activity lives in a remote sheet with two tabs, `posts` and
//! `comments`. The gateway exposes them as column/row tables; this client
//! pulls both tabs, checks the required columns, and returns only records
//! strictly newer than the caller's watermark.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use pulsewatch_core::types::{RawComment, RawDeltaBatch, RawPost};

use crate::error::SourceError;

const POSTS_TAB: &str = "posts";
const COMMENTS_TAB: &str = "comments";

const POST_COLUMNS: [&str; 6] = ["url", "platform", "created_at", "content", "likes", "shares"];
const COMMENT_COLUMNS: [&str; 5] = ["post_url", "author", "text", "created_at", "likes"];

/// A tab's contents as returned by the gateway.
#[derive(Debug, Deserialize)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Client for the sheet gateway REST API.
///
/// Use [`SheetClient::new`] for production or [`SheetClient::with_base_url`]
/// to point at a mock server in tests.
pub struct SheetClient {
    client: Client,
    base_url: Url,
}

impl SheetClient {
    /// Creates a client pointed at `base_url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unavailable`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`SourceError::Schema`] if `base_url` is not
    /// a valid URL.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, SourceError> {
        Self::with_base_url(base_url, timeout_secs)
    }

    /// Same as [`SheetClient::new`]; kept separate so tests read like the
    /// production call site they exercise.
    ///
    /// # Errors
    ///
    /// See [`SheetClient::new`].
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("pulsewatch/0.1 (client-insight-sync)")
            .build()?;

        // Normalise: exactly one trailing slash so joined paths land under
        // the configured root rather than replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| SourceError::Schema {
            tab: String::new(),
            reason: format!("invalid base URL '{base_url}': {e}"),
        })?;

        Ok(Self { client, base_url })
    }

    /// Fetches all post and comment records for `source_ref` strictly newer
    /// than `since`. `since = None` fetches everything (first run).
    ///
    /// Read-only: never mutates anything on the gateway side. Rows whose
    /// `created_at` cannot be parsed are skipped with a warning.
    ///
    /// # Errors
    ///
    /// - [`SourceError::Unavailable`] on network failure or non-2xx status
    ///   (retryable).
    /// - [`SourceError::Schema`] if a tab is missing required columns or the
    ///   body is not a column/row table (not retryable).
    pub async fn fetch_delta(
        &self,
        source_ref: &str,
        token: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<RawDeltaBatch, SourceError> {
        let posts_table = self.fetch_tab(source_ref, POSTS_TAB, token).await?;
        let comments_table = self.fetch_tab(source_ref, COMMENTS_TAB, token).await?;

        let posts = parse_posts(&posts_table, since)?;
        let comments = parse_comments(&comments_table, since)?;

        Ok(RawDeltaBatch { posts, comments })
    }

    async fn fetch_tab(
        &self,
        source_ref: &str,
        tab: &str,
        token: &str,
    ) -> Result<Table, SourceError> {
        let url = self.rows_url(source_ref, tab);
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Schema {
            tab: tab.to_string(),
            reason: format!("response is not a column/row table: {e}"),
        })
    }

    /// `{base}/v1/sheets/{source_ref}/tabs/{tab}/rows`, with each piece added
    /// as a path segment so opaque refs are safely encoded.
    fn rows_url(&self, source_ref: &str, tab: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v1", "sheets", source_ref, "tabs", tab, "rows"]);
        }
        url
    }
}

/// Resolves each required column name to its index, or fails with the first
/// missing column.
fn column_indices<const N: usize>(
    table: &Table,
    required: [&str; N],
    tab: &str,
) -> Result<[usize; N], SourceError> {
    let mut indices = [0usize; N];
    for (slot, name) in indices.iter_mut().zip(required) {
        *slot = table
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| SourceError::Schema {
                tab: tab.to_string(),
                reason: format!("missing required column '{name}'"),
            })?;
    }
    Ok(indices)
}

fn parse_posts(table: &Table, since: Option<DateTime<Utc>>) -> Result<Vec<RawPost>, SourceError> {
    let [url_i, platform_i, created_i, content_i, likes_i, shares_i] =
        column_indices(table, POST_COLUMNS, POSTS_TAB)?;

    let mut posts = Vec::new();
    for (row_index, row) in table.rows.iter().enumerate() {
        let Some(created_at) = cell_timestamp(row, created_i) else {
            tracing::warn!(tab = POSTS_TAB, row = row_index, "skipping row with unparseable created_at");
            continue;
        };
        if !is_after(created_at, since) {
            continue;
        }
        let (Some(url), Some(platform), Some(content)) = (
            cell_str(row, url_i),
            cell_str(row, platform_i),
            cell_str(row, content_i),
        ) else {
            tracing::warn!(tab = POSTS_TAB, row = row_index, "skipping row with missing text fields");
            continue;
        };
        posts.push(RawPost {
            url,
            platform,
            created_at,
            content,
            likes: cell_i64(row, likes_i),
            shares: cell_i64(row, shares_i),
        });
    }
    Ok(posts)
}

fn parse_comments(
    table: &Table,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<RawComment>, SourceError> {
    let [post_url_i, author_i, text_i, created_i, likes_i] =
        column_indices(table, COMMENT_COLUMNS, COMMENTS_TAB)?;

    let mut comments = Vec::new();
    for (row_index, row) in table.rows.iter().enumerate() {
        let Some(created_at) = cell_timestamp(row, created_i) else {
            tracing::warn!(tab = COMMENTS_TAB, row = row_index, "skipping row with unparseable created_at");
            continue;
        };
        if !is_after(created_at, since) {
            continue;
        }
        let (Some(post_url), Some(author), Some(text)) = (
            cell_str(row, post_url_i),
            cell_str(row, author_i),
            cell_str(row, text_i),
        ) else {
            tracing::warn!(tab = COMMENTS_TAB, row = row_index, "skipping row with missing text fields");
            continue;
        };
        comments.push(RawComment {
            post_url,
            author,
            text,
            created_at,
            likes: cell_i64(row, likes_i),
        });
    }
    Ok(comments)
}

/// Strictly exclusive watermark comparison: a record stamped exactly at the
/// watermark was already processed by the run that set it.
fn is_after(created_at: DateTime<Utc>, since: Option<DateTime<Utc>>) -> bool {
    since.is_none_or(|s| created_at > s)
}

fn cell_str(row: &[Value], index: usize) -> Option<String> {
    match row.get(index) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Engagement counters arrive as numbers or numeric strings depending on how
/// the sheet was filled in; anything else counts as zero.
fn cell_i64(row: &[Value], index: usize) -> i64 {
    match row.get(index) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}

fn cell_timestamp(row: &[Value], index: usize) -> Option<DateTime<Utc>> {
    match row.get(index) {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}
