use std::collections::BTreeMap;

use crate::model::{IntentGroup, Sentiment};
use crate::util::round_to;

use super::input::WeeklyComment;
use super::types::IssueRow;
use super::week::WeeklyBucket;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct IssueKey {
    week: WeeklyBucket,
    topic: String,
    sentiment: &'static str,
    intent_group: &'static str,
}

struct IssueAccumulator {
    sentiment: Sentiment,
    intent_group: IntentGroup,
    count: usize,
    emotion_sum: f64,
}

// One issue per comment: only the primary (first) topic is counted.
pub(crate) fn compute_issues(comments: &[WeeklyComment]) -> Vec<IssueRow> {
    let mut grouped = BTreeMap::<IssueKey, IssueAccumulator>::new();

    for comment in comments {
        let classification = &comment.classification;
        let Some(topic) = classification.key_topics.first() else {
            continue;
        };
        let intent_group = classification.intent.group();

        let entry = grouped
            .entry(IssueKey {
                week: comment.week,
                topic: topic.clone(),
                sentiment: classification.sentiment.as_str(),
                intent_group: intent_group.as_str(),
            })
            .or_insert(IssueAccumulator {
                sentiment: classification.sentiment,
                intent_group,
                count: 0,
                emotion_sum: 0.0,
            });
        entry.count += 1;
        entry.emotion_sum += classification.emotion_intensity;
    }

    let mut rows = grouped
        .into_iter()
        .map(|(key, acc)| IssueRow {
            week: key.week,
            topic: key.topic,
            sentiment: acc.sentiment,
            intent_group: acc.intent_group,
            comment_count: acc.count,
            avg_emotion: round_to(acc.emotion_sum / acc.count as f64, 2),
        })
        .collect::<Vec<_>>();

    rows.sort_by(|a, b| {
        a.week
            .cmp(&b.week)
            .then_with(|| b.comment_count.cmp(&a.comment_count))
            .then_with(|| a.topic.cmp(&b.topic))
            .then_with(|| a.sentiment.as_str().cmp(b.sentiment.as_str()))
            .then_with(|| a.intent_group.as_str().cmp(b.intent_group.as_str()))
    });
    rows
}
