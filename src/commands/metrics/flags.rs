use std::collections::BTreeMap;

use crate::model::{IntentGroup, Sentiment};
use crate::util::{round_to, snap};

use super::input::WeeklyComment;
use super::types::{TREND_FLAT_BAND, TrendDirection, TrendFlagRow};
use super::week::WeeklyBucket;

#[derive(Default)]
struct WeekShares {
    total: usize,
    negative: usize,
    critical: usize,
}

impl WeekShares {
    fn negative_ratio(&self) -> f64 {
        ratio(self.negative, self.total)
    }

    fn critical_ratio(&self) -> f64 {
        ratio(self.critical, self.total)
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

pub(crate) fn trend_direction(delta: f64) -> TrendDirection {
    let delta = snap(delta);
    if delta > TREND_FLAT_BAND {
        TrendDirection::Rising
    } else if delta < -TREND_FLAT_BAND {
        TrendDirection::Falling
    } else {
        TrendDirection::Flat
    }
}

pub(crate) fn trend_flags(comments: &[WeeklyComment]) -> Vec<TrendFlagRow> {
    let mut weeks = BTreeMap::<WeeklyBucket, WeekShares>::new();
    for comment in comments {
        let shares = weeks.entry(comment.week).or_default();
        shares.total += 1;
        if comment.classification.sentiment == Sentiment::Negative {
            shares.negative += 1;
        }
        if comment.classification.intent.group() == IntentGroup::Critical {
            shares.critical += 1;
        }
    }

    let weeks = weeks.into_iter().collect::<Vec<_>>();
    weeks
        .windows(2)
        .map(|pair| {
            let (_, previous) = &pair[0];
            let (week, current) = &pair[1];
            let negative_delta = current.negative_ratio() - previous.negative_ratio();
            let critical_delta = current.critical_ratio() - previous.critical_ratio();

            TrendFlagRow {
                week: *week,
                negative_trend: trend_direction(negative_delta),
                negative_change: round_to(negative_delta, 3),
                critical_intent_trend: trend_direction(critical_delta),
                critical_intent_change: round_to(critical_delta, 3),
                threshold_flat_pp: TREND_FLAT_BAND,
            }
        })
        .collect()
}
