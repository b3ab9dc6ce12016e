use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result, bail};

use crate::model::AnnotatedComment;

use super::distribution::{intent_distribution, intent_shift, sentiment_trend};
use super::flags::trend_flags;
use super::focus::{pick_focus_week, summarize_focus_week};
use super::input::WeeklyComment;
use super::issues::compute_issues;
use super::signals::{
    criticism_structure_by_week, emotion_context_by_week, escalation_by_week, top_trigger_topics,
};
use super::types::{MetricsDocument, MetricsOptions};
use super::week::WeeklyBucket;

pub(crate) struct WeeklyWindow {
    pub(crate) weeks: Vec<WeeklyBucket>,
    pub(crate) comments: Vec<WeeklyComment>,
}

pub(crate) fn restrict_to_latest_weeks(
    comments: Vec<WeeklyComment>,
    latest_weeks: usize,
) -> WeeklyWindow {
    let weeks = comments
        .iter()
        .map(|comment| comment.week)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();

    let weeks = if latest_weeks > 0 && weeks.len() > latest_weeks {
        weeks[weeks.len() - latest_weeks..].to_vec()
    } else {
        weeks
    };

    let keep = weeks.iter().copied().collect::<BTreeSet<_>>();
    let mut comments = comments
        .into_iter()
        .filter(|comment| keep.contains(&comment.week))
        .collect::<Vec<_>>();
    comments.sort_by(|a, b| a.week.cmp(&b.week).then_with(|| a.id.cmp(&b.id)));

    WeeklyWindow { weeks, comments }
}

fn compute_window(
    comments: &[AnnotatedComment],
    options: &MetricsOptions,
) -> Result<WeeklyWindow> {
    if comments.is_empty() {
        bail!("no annotated comments to aggregate");
    }

    let bucketed = comments
        .iter()
        .map(WeeklyComment::from_annotated)
        .collect::<Result<Vec<_>>>()?;
    let window = restrict_to_latest_weeks(bucketed, options.latest_weeks);
    if window.weeks.is_empty() {
        bail!("no weeks found in annotated comments");
    }
    Ok(window)
}

pub(crate) fn compute_metrics(
    comments: &[AnnotatedComment],
    options: &MetricsOptions,
) -> Result<MetricsDocument> {
    let window = compute_window(comments, options)?;
    aggregate(&window, options)
}

fn aggregate(window: &WeeklyWindow, options: &MetricsOptions) -> Result<MetricsDocument> {
    let comments = &window.comments;

    let mut volumes = BTreeMap::<WeeklyBucket, usize>::new();
    for comment in comments {
        *volumes.entry(comment.week).or_default() += 1;
    }

    let escalation = escalation_by_week(comments);
    let criticism_structure = criticism_structure_by_week(comments, options.top_topics);
    let pick = pick_focus_week(&window.weeks, &volumes, options.min_focus_week_comments)
        .context("no weeks available for the focus week")?;
    let focus_week = summarize_focus_week(
        pick,
        &volumes,
        options.min_focus_week_comments,
        &escalation,
        &criticism_structure,
    );

    Ok(MetricsDocument {
        sentiment_trend: sentiment_trend(comments),
        intent_distribution: intent_distribution(comments),
        intent_shift: intent_shift(comments),
        top_trigger_topics: top_trigger_topics(comments, options.top_topics),
        issues: compute_issues(comments),
        escalation,
        criticism_structure,
        emotion_context: emotion_context_by_week(comments),
        trend_flags: trend_flags(comments),
        focus_week,
    })
}
