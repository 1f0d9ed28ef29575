//! The closed table of registered analysis units.
//!
//! Units are assembled here at compile time as plain `(id, instructions,
//! schema, renderer)` values — adding a unit means adding one entry and its
//! schema, nothing else. Every unit consumes the same delta batch; the
//! renderer decides which parts of it the service sees.

use std::fmt::Write as _;

use pulsewatch_core::types::RawDeltaBatch;
use pulsewatch_core::ClientConfig;

use crate::schema::{FieldKind, FieldSpec};

/// One registered analysis unit.
pub struct UnitSpec {
    pub id: &'static str,
    /// System instructions sent with every call; must demand a single JSON
    /// object matching `schema`.
    pub instructions: &'static str,
    pub schema: &'static [FieldSpec],
    pub render_input: fn(&ClientConfig, &RawDeltaBatch) -> String,
}

/// Truncation limit for post/comment text in rendered inputs. Keeps the
/// request bounded when a client pastes long-form content into the sheet.
const SNIPPET_CHARS: usize = 280;

static SENTIMENT_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required(
        "score",
        FieldKind::Number {
            min: Some(-1.0),
            max: Some(1.0),
        },
    ),
    FieldSpec::required("label", FieldKind::String),
    FieldSpec::required("summary", FieldKind::String),
];

static TOPICS_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required(
        "topics",
        FieldKind::Array(&FieldKind::Object(&[
            FieldSpec::required("name", FieldKind::String),
            FieldSpec::required(
                "mentions",
                FieldKind::Integer {
                    min: Some(0),
                    max: None,
                },
            ),
        ])),
    ),
    FieldSpec::optional("summary", FieldKind::String),
];

static ENGAGEMENT_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required(
        "top_post",
        FieldKind::Object(&[
            FieldSpec::required("url", FieldKind::String),
            FieldSpec::required("reason", FieldKind::String),
        ]),
    ),
    FieldSpec::required(
        "engagement_rate",
        FieldKind::Number {
            min: Some(0.0),
            max: None,
        },
    ),
];

static RISKS_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required("level", FieldKind::String),
    FieldSpec::required("items", FieldKind::Array(&FieldKind::String)),
    FieldSpec::optional("needs_human_review", FieldKind::Bool),
];

static REGISTERED_UNITS: [UnitSpec; 4] = [
    UnitSpec {
        id: "sentiment",
        instructions: "You score audience sentiment for a brand's recent social activity. \
            Respond with a single JSON object: score (number in [-1, 1]), \
            label (string: negative/neutral/positive), summary (string, two sentences max).",
        schema: SENTIMENT_SCHEMA,
        render_input: render_text_activity,
    },
    UnitSpec {
        id: "topics",
        instructions: "You extract the themes an audience is talking about. \
            Respond with a single JSON object: topics (array of {name: string, \
            mentions: non-negative integer}), summary (string, optional).",
        schema: TOPICS_SCHEMA,
        render_input: render_text_activity,
    },
    UnitSpec {
        id: "engagement",
        instructions: "You assess which content resonated. Respond with a single JSON \
            object: top_post ({url: string, reason: string}), engagement_rate \
            (non-negative number: interactions per post).",
        schema: ENGAGEMENT_SCHEMA,
        render_input: render_engagement_activity,
    },
    UnitSpec {
        id: "risks",
        instructions: "You flag reputational risks in audience reactions. Respond with a \
            single JSON object: level (string: none/low/medium/high), items \
            (array of strings), needs_human_review (bool, optional).",
        schema: RISKS_SCHEMA,
        render_input: render_text_activity,
    },
];

/// The full unit table, in registration order.
#[must_use]
pub fn registered_units() -> &'static [UnitSpec] {
    &REGISTERED_UNITS
}

/// Look up one unit by id.
#[must_use]
pub fn unit_by_id(id: &str) -> Option<&'static UnitSpec> {
    REGISTERED_UNITS.iter().find(|u| u.id == id)
}

fn snippet(text: &str) -> &str {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Post and comment text with light framing; used by the language-centric
/// units.
fn render_text_activity(client: &ClientConfig, batch: &RawDeltaBatch) -> String {
    let mut out = format!(
        "Client: {} ({})\nPosts: {} | Comments: {}\n\n",
        client.display_name,
        client.client_id,
        batch.posts.len(),
        batch.comments.len()
    );
    for post in &batch.posts {
        let _ = writeln!(out, "POST [{}] {}", post.platform, snippet(&post.content));
    }
    for comment in &batch.comments {
        let _ = writeln!(out, "COMMENT by {}: {}", comment.author, snippet(&comment.text));
    }
    out
}

/// Same activity with engagement counters spelled out per record.
fn render_engagement_activity(client: &ClientConfig, batch: &RawDeltaBatch) -> String {
    let mut out = format!(
        "Client: {} ({})\n\n",
        client.display_name, client.client_id
    );
    for post in &batch.posts {
        let _ = writeln!(
            out,
            "POST {} [{}] likes={} shares={}: {}",
            post.url,
            post.platform,
            post.likes,
            post.shares,
            snippet(&post.content)
        );
    }
    for comment in &batch.comments {
        let _ = writeln!(
            out,
            "COMMENT on {} likes={}: {}",
            comment.post_url,
            comment.likes,
            snippet(&comment.text)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pulsewatch_core::types::{RawComment, RawPost};

    fn test_client() -> ClientConfig {
        ClientConfig {
            client_id: "acme".to_string(),
            display_name: "Acme Inc".to_string(),
            source_ref: "sheet-acme".to_string(),
            credentials_ref: "ACME_TOKEN".to_string(),
            enabled: true,
        }
    }

    fn test_batch() -> RawDeltaBatch {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        RawDeltaBatch {
            posts: vec![RawPost {
                url: "https://x.com/acme/1".to_string(),
                platform: "x".to_string(),
                created_at: ts,
                content: "launch day!".to_string(),
                likes: 120,
                shares: 14,
            }],
            comments: vec![RawComment {
                post_url: "https://x.com/acme/1".to_string(),
                author: "fan01".to_string(),
                text: "congrats!".to_string(),
                created_at: ts,
                likes: 4,
            }],
        }
    }

    #[test]
    fn unit_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for unit in registered_units() {
            assert!(seen.insert(unit.id), "duplicate unit id: {}", unit.id);
        }
    }

    #[test]
    fn unit_by_id_finds_registered_units() {
        assert!(unit_by_id("sentiment").is_some());
        assert!(unit_by_id("engagement").is_some());
        assert!(unit_by_id("nope").is_none());
    }

    #[test]
    fn text_renderer_includes_posts_and_comments() {
        let rendered = render_text_activity(&test_client(), &test_batch());
        assert!(rendered.contains("Acme Inc"));
        assert!(rendered.contains("launch day!"));
        assert!(rendered.contains("COMMENT by fan01"));
    }

    #[test]
    fn engagement_renderer_includes_counters() {
        let rendered = render_engagement_activity(&test_client(), &test_batch());
        assert!(rendered.contains("likes=120"));
        assert!(rendered.contains("shares=14"));
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let long = "é".repeat(SNIPPET_CHARS + 50);
        let cut = snippet(&long);
        assert_eq!(cut.chars().count(), SNIPPET_CHARS);
    }
}
