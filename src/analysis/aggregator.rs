//! Verdict aggregation and statistics.
//!
//! This module reduces the per-post verdicts of a run into the corpus-level
//! distribution, percentages and overall sentiment. Everything here is pure.

use crate::models::{Sentiment, SentimentAggregate, SentimentVerdict};
use std::collections::BTreeMap;

/// Reduce verdicts into a `SentimentAggregate`.
///
/// Every label appears in the distribution and percentages, with zero counts
/// where nothing was assigned. Calling this twice on the same input yields
/// equal aggregates.
pub fn aggregate(verdicts: &[SentimentVerdict]) -> SentimentAggregate {
    let total = verdicts.len();

    let mut distribution: BTreeMap<Sentiment, usize> =
        Sentiment::ALL.iter().map(|s| (*s, 0)).collect();
    for verdict in verdicts {
        *distribution.entry(verdict.sentiment).or_default() += 1;
    }

    let percentages = distribution
        .iter()
        .map(|(sentiment, count)| {
            let pct = if total == 0 {
                0.0
            } else {
                round_to(*count as f64 / total as f64 * 100.0, 2)
            };
            (*sentiment, pct)
        })
        .collect();

    let average_confidence = if total == 0 {
        0.0
    } else {
        let sum: f64 = verdicts.iter().map(|v| v.confidence).sum();
        round_to(sum / total as f64, 4)
    };

    let mut details = verdicts.to_vec();
    details.sort_by(|a, b| {
        a.item_timestamp
            .cmp(&b.item_timestamp)
            .then_with(|| a.item_ref.cmp(&b.item_ref))
    });

    SentimentAggregate {
        overall_sentiment: dominant_sentiment(&distribution),
        distribution,
        percentages,
        total,
        average_confidence,
        details,
    }
}

/// Label with the highest count; ties go to the lowest tie-break rank.
pub fn dominant_sentiment(distribution: &BTreeMap<Sentiment, usize>) -> Option<Sentiment> {
    distribution
        .iter()
        .filter(|(_, count)| **count > 0)
        .min_by(|(a, a_count), (b, b_count)| {
            b_count
                .cmp(a_count)
                .then_with(|| a.tie_break_rank().cmp(&b.tie_break_rank()))
        })
        .map(|(sentiment, _)| *sentiment)
}

/// The `n` most confident verdicts for `sentiment`, newest first on ties.
pub fn strongest_verdicts(
    aggregate: &SentimentAggregate,
    sentiment: Sentiment,
    n: usize,
) -> Vec<&SentimentVerdict> {
    let mut matching: Vec<_> = aggregate
        .details
        .iter()
        .filter(|v| v.sentiment == sentiment)
        .collect();

    matching.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.item_timestamp.cmp(&a.item_timestamp))
    });
    matching.truncate(n);
    matching
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
