//! Item loader: selects the posts of one lookback window from the store.
//!
//! Objects under the raw prefix are either `.json` (an array of records) or
//! `.jsonl` (one record per line). Records that cannot be decoded are skipped
//! and counted, never surfaced as errors.

use crate::error::PipelineError;
use crate::models::RawItem;
use crate::store::{ContentStore, TimeRange};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Posts selected for a run plus the decode-failure count.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// Posts inside the window, ordered by authoring time.
    pub items: Vec<RawItem>,
    /// Records (or whole objects) skipped as malformed.
    pub skipped: usize,
}

/// Load every post under `prefix` authored within `[now - window, now]`.
///
/// Only a failure to list the prefix is fatal.
pub async fn load_window(
    store: &dyn ContentStore,
    prefix: &str,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<LoadOutcome, PipelineError> {
    let range = TimeRange {
        start: now - window,
        end: now,
    };

    let keys = store
        .list(prefix, range)
        .await
        .map_err(|source| PipelineError::ListWindow {
            prefix: prefix.to_string(),
            source,
        })?;
    debug!("Found {} objects under {}", keys.len(), prefix);

    let mut outcome = LoadOutcome::default();
    let mut seen = HashSet::new();
    let mut outside_window = 0usize;

    for key in keys {
        let format = match ObjectFormat::from_key(&key) {
            Some(f) => f,
            None => {
                debug!("Ignoring {} (not .json/.jsonl)", key);
                continue;
            }
        };

        let bytes = match store.get(&key).await {
            Ok(b) => b,
            Err(e) => {
                warn!("Skipping {}: {}", key, e);
                outcome.skipped += 1;
                continue;
            }
        };

        let (records, undecodable) = split_records(&bytes, format);
        if undecodable > 0 {
            warn!("{}: {} undecodable record(s)", key, undecodable);
        }
        outcome.skipped += undecodable;

        for record in records {
            match decode_record(&record) {
                Ok(item) => {
                    if item.authored_at < range.start || item.authored_at > range.end {
                        outside_window += 1;
                        continue;
                    }
                    if seen.insert(item.id.clone()) {
                        outcome.items.push(item);
                    }
                }
                Err(reason) => {
                    warn!("{}: skipping record: {}", key, reason);
                    outcome.skipped += 1;
                }
            }
        }
    }

    outcome
        .items
        .sort_by(|a, b| a.authored_at.cmp(&b.authored_at).then_with(|| a.id.cmp(&b.id)));

    info!(
        "Loaded {} posts ({} skipped as malformed, {} outside window)",
        outcome.items.len(),
        outcome.skipped,
        outside_window
    );
    Ok(outcome)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectFormat {
    JsonArray,
    JsonLines,
}

impl ObjectFormat {
    fn from_key(key: &str) -> Option<Self> {
        if key.ends_with(".jsonl") {
            Some(ObjectFormat::JsonLines)
        } else if key.ends_with(".json") {
            Some(ObjectFormat::JsonArray)
        } else {
            None
        }
    }
}

/// Split an object into raw records; returns (records, undecodable count).
fn split_records(bytes: &[u8], format: ObjectFormat) -> (Vec<Value>, usize) {
    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(_) => return (Vec::new(), 1),
    };

    match format {
        ObjectFormat::JsonArray => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(records)) => (records, 0),
            Ok(record @ Value::Object(_)) => (vec![record], 0),
            Ok(_) | Err(_) => (Vec::new(), 1),
        },
        ObjectFormat::JsonLines => {
            let mut records = Vec::new();
            let mut bad = 0;
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                match serde_json::from_str::<Value>(line) {
                    Ok(v) => records.push(v),
                    Err(_) => bad += 1,
                }
            }
            (records, bad)
        }
    }
}

/// First string field present under any of `names`.
fn string_field<'a>(record: &'a Value, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| record.get(*name).and_then(Value::as_str))
}

/// Decode one record into a post.
///
/// Field names follow the upstream fetcher's columns as aliases
/// (`Title`, `Post_Text`, `Created_UTC`, `Post_URL`, `Comments`).
fn decode_record(record: &Value) -> Result<RawItem, String> {
    if !record.is_object() {
        return Err("record is not an object".to_string());
    }

    let title = string_field(record, &["title", "Title"])
        .ok_or("missing title")?
        .trim()
        .to_string();
    let body = string_field(record, &["body", "Post_Text", "Body", "content"])
        .unwrap_or_default()
        .trim()
        .to_string();
    if title.is_empty() && body.is_empty() {
        return Err("empty title and body".to_string());
    }

    let source_ref = string_field(record, &["source_ref", "Post_URL", "url"])
        .ok_or("missing source_ref")?
        .to_string();
    let id = string_field(record, &["id", "Id"])
        .map(str::to_string)
        .unwrap_or_else(|| source_ref.clone());

    let authored_at = ["authored_at", "Created_UTC", "created_utc"]
        .iter()
        .find_map(|name| record.get(*name))
        .ok_or("missing authored_at")
        .and_then(|v| parse_timestamp(v).ok_or("unparseable authored_at"))?;

    Ok(RawItem {
        id,
        title,
        body,
        authored_at,
        source_ref,
        comments: comment_bodies(record),
    })
}

/// Comment bodies, given as plain strings or as objects with `text`/`body`.
///
/// A missing or non-array field yields no comments rather than a skip.
fn comment_bodies(record: &Value) -> Vec<String> {
    let entries = match ["comments", "Comments"]
        .iter()
        .find_map(|name| record.get(*name))
    {
        Some(Value::Array(entries)) => entries,
        _ => return Vec::new(),
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.as_str()),
            Value::Object(_) => string_field(entry, &["text", "body"]),
            _ => None,
        })
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accept RFC 3339, naive ISO-8601 (assumed UTC) or unix seconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => {
            let secs = n.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            let millis = (secs * 1000.0).round() as i64;
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => None,
    }
}
