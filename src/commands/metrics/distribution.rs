use std::collections::BTreeMap;

use crate::model::{Intent, IntentGroup, Sentiment};

use super::input::WeeklyComment;
use super::types::{IntentDistributionRow, IntentShiftRow, SentimentTrendRow};
use super::week::WeeklyBucket;

struct WeeklyShare<K> {
    week: WeeklyBucket,
    key: K,
    count: usize,
    ratio: f64,
}

fn shares_by_week<K, F, L>(
    comments: &[WeeklyComment],
    key_of: F,
    label_of: L,
) -> Vec<WeeklyShare<K>>
where
    K: Copy,
    F: Fn(&WeeklyComment) -> K,
    L: Fn(K) -> &'static str,
{
    let mut totals = BTreeMap::<WeeklyBucket, usize>::new();
    let mut counts = BTreeMap::<(WeeklyBucket, &'static str), (K, usize)>::new();

    for comment in comments {
        let key = key_of(comment);
        *totals.entry(comment.week).or_default() += 1;
        counts
            .entry((comment.week, label_of(key)))
            .or_insert((key, 0))
            .1 += 1;
    }

    counts
        .into_iter()
        .map(|((week, _), (key, count))| {
            let total = totals.get(&week).copied().unwrap_or(count).max(1);
            WeeklyShare {
                week,
                key,
                count,
                ratio: count as f64 / total as f64,
            }
        })
        .collect()
}

pub(crate) fn sentiment_trend(comments: &[WeeklyComment]) -> Vec<SentimentTrendRow> {
    shares_by_week(
        comments,
        |comment| comment.classification.sentiment,
        Sentiment::as_str,
    )
    .into_iter()
    .map(|share| SentimentTrendRow {
        week: share.week,
        sentiment: share.key,
        count: share.count,
        ratio: share.ratio,
    })
    .collect()
}

pub(crate) fn intent_distribution(comments: &[WeeklyComment]) -> Vec<IntentDistributionRow> {
    shares_by_week(
        comments,
        |comment| comment.classification.intent,
        Intent::as_str,
    )
    .into_iter()
    .map(|share| IntentDistributionRow {
        week: share.week,
        intent: share.key,
        count: share.count,
        ratio: share.ratio,
    })
    .collect()
}

pub(crate) fn intent_shift(comments: &[WeeklyComment]) -> Vec<IntentShiftRow> {
    shares_by_week(
        comments,
        |comment| comment.classification.intent.group(),
        IntentGroup::as_str,
    )
    .into_iter()
    .map(|share| IntentShiftRow {
        week: share.week,
        intent_group: share.key,
        count: share.count,
        ratio: share.ratio,
    })
    .collect()
}
