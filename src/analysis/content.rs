//! Content units: the text a model actually sees for one post.

use crate::models::RawItem;

/// Normalized text extracted from one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUnit {
    pub item_ref: String,
    pub text: String,
}

impl ContentUnit {
    /// Build the unit for `item`, capped at `max_chars` characters.
    ///
    /// The title is always kept whole; the body is cut from the end to fit.
    pub fn from_item(item: &RawItem, max_chars: usize) -> Self {
        let title = item.title.trim();
        let body = item.body.trim();

        let text = if body.is_empty() {
            title.to_string()
        } else if title.is_empty() {
            truncate_chars(body, max_chars).to_string()
        } else {
            let budget = max_chars.saturating_sub(title.chars().count() + SEPARATOR.len());
            let body = truncate_chars(body, budget).trim_end();
            if body.is_empty() {
                title.to_string()
            } else {
                format!("{}{}{}", title, SEPARATOR, body)
            }
        };

        Self {
            item_ref: item.id.clone(),
            text,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

const SEPARATOR: &str = ". ";

/// Longest prefix of `s` with at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(title: &str, body: &str) -> RawItem {
        RawItem {
            id: "p1".to_string(),
            title: title.to_string(),
            body: body.to_string(),
            authored_at: Utc::now(),
            source_ref: "https://reddit.com/r/test/p1".to_string(),
            comments: Vec::new(),
        }
    }

    #[test]
    fn test_joins_title_and_body() {
        let unit = ContentUnit::from_item(&item("Exam tips", "Sleep well."), 100);
        assert_eq!(unit.text, "Exam tips. Sleep well.");
        assert_eq!(unit.item_ref, "p1");
    }

    #[test]
    fn test_title_only() {
        let unit = ContentUnit::from_item(&item("  Link post  ", "   "), 100);
        assert_eq!(unit.text, "Link post");
    }

    #[test]
    fn test_body_truncated_from_end_title_kept() {
        let unit = ContentUnit::from_item(&item("Title", "abcdefghij"), 12);
        // "Title" (5) + ". " (2) leaves 5 chars of body
        assert_eq!(unit.text, "Title. abcde");
        assert_eq!(unit.text.chars().count(), 12);
    }

    #[test]
    fn test_long_title_survives_whole() {
        let title = "t".repeat(50);
        let unit = ContentUnit::from_item(&item(&title, "body text"), 20);
        assert_eq!(unit.text, title);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("anything", 0), "");
    }
}
