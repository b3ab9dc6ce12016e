use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Intent, Sentiment};
use crate::util::{round_to, snap};

use super::input::WeeklyComment;
use super::types::{
    CriticismStructure, CriticismStructureRow, EMOTION_ELEVATED_AT, EMOTION_HIGH_AT,
    ESCALATION_CRITICAL_AT, ESCALATION_WATCH_AT, EmotionContextRow, EmotionLabel,
    EmotionThresholds, EscalationLevel, EscalationRow, EscalationThresholds,
    FOCUSED_DOMINANCE_GT, TopicVotes,
};
use super::week::WeeklyBucket;

pub(crate) fn escalation_level(ratio: f64) -> EscalationLevel {
    let ratio = snap(ratio);
    if ratio < ESCALATION_WATCH_AT {
        EscalationLevel::Stable
    } else if ratio < ESCALATION_CRITICAL_AT {
        EscalationLevel::Watch
    } else {
        EscalationLevel::Critical
    }
}

pub(crate) fn criticism_structure(dominance: f64, total_votes: usize) -> CriticismStructure {
    if total_votes == 0 {
        CriticismStructure::None
    } else if snap(dominance) > FOCUSED_DOMINANCE_GT {
        CriticismStructure::Focused
    } else {
        CriticismStructure::Fragmented
    }
}

pub(crate) fn emotion_label(lift: f64) -> EmotionLabel {
    let lift = snap(lift);
    if lift < EMOTION_ELEVATED_AT {
        EmotionLabel::Normal
    } else if lift < EMOTION_HIGH_AT {
        EmotionLabel::Elevated
    } else {
        EmotionLabel::High
    }
}

fn group_by_week(comments: &[WeeklyComment]) -> BTreeMap<WeeklyBucket, Vec<&WeeklyComment>> {
    let mut grouped = BTreeMap::<WeeklyBucket, Vec<&WeeklyComment>>::new();
    for comment in comments {
        grouped.entry(comment.week).or_default().push(comment);
    }
    grouped
}

fn mean<'a>(values: impl Iterator<Item = &'a f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

pub(crate) fn escalation_by_week(comments: &[WeeklyComment]) -> Vec<EscalationRow> {
    group_by_week(comments)
        .into_iter()
        .map(|(week, group)| {
            let aggressive = group
                .iter()
                .filter(|comment| comment.classification.intent == Intent::AggressiveCriticism)
                .count();
            let ratio = aggressive as f64 / group.len() as f64;

            EscalationRow {
                week,
                aggressive_ratio: round_to(ratio, 3),
                level: escalation_level(ratio),
                thresholds: EscalationThresholds::default(),
            }
        })
        .collect()
}

// Each critical comment votes at most once per distinct topic it carries.
fn critical_topic_votes<'a>(
    comments: impl Iterator<Item = &'a WeeklyComment>,
) -> BTreeMap<&'a str, usize> {
    let mut votes = BTreeMap::<&str, usize>::new();
    for comment in comments.filter(|comment| comment.classification.intent.is_critical()) {
        let distinct = comment
            .classification
            .key_topics
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>();
        for topic in distinct {
            *votes.entry(topic).or_default() += 1;
        }
    }
    votes
}

fn top_votes(votes: &BTreeMap<&str, usize>, limit: usize) -> Vec<TopicVotes> {
    let mut ranked = votes
        .iter()
        .map(|(topic, count)| (topic.to_string(), *count))
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

pub(crate) fn top_trigger_topics(comments: &[WeeklyComment], limit: usize) -> Vec<TopicVotes> {
    top_votes(&critical_topic_votes(comments.iter()), limit)
}

pub(crate) fn criticism_structure_by_week(
    comments: &[WeeklyComment],
    limit: usize,
) -> Vec<CriticismStructureRow> {
    group_by_week(comments)
        .into_iter()
        .map(|(week, group)| {
            let votes = critical_topic_votes(group.into_iter());
            let total_votes = votes.values().sum::<usize>();
            let dominance = match votes.values().max() {
                Some(max) if total_votes > 0 => *max as f64 / total_votes as f64,
                _ => 0.0,
            };

            CriticismStructureRow {
                week,
                structure: criticism_structure(dominance, total_votes),
                dominance: round_to(dominance, 3),
                threshold_focused_gt: FOCUSED_DOMINANCE_GT,
                top_topics: top_votes(&votes, limit),
            }
        })
        .collect()
}

pub(crate) fn emotion_context_by_week(comments: &[WeeklyComment]) -> Vec<EmotionContextRow> {
    group_by_week(comments)
        .into_iter()
        .map(|(week, group)| {
            let avg_total = mean(
                group
                    .iter()
                    .map(|comment| &comment.classification.emotion_intensity),
            )
            .unwrap_or(0.0);
            let avg_negative = mean(
                group
                    .iter()
                    .filter(|comment| comment.classification.sentiment == Sentiment::Negative)
                    .map(|comment| &comment.classification.emotion_intensity),
            )
            .unwrap_or(0.0);
            let lift = avg_negative - avg_total;

            EmotionContextRow {
                week,
                avg_emotion_total: round_to(avg_total, 2),
                avg_emotion_negative: round_to(avg_negative, 2),
                emotion_lift: round_to(lift, 2),
                emotion_label: emotion_label(lift),
                thresholds: EmotionThresholds::default(),
            }
        })
        .collect()
}
