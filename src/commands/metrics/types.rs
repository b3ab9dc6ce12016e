use serde::Serialize;

use crate::config::{DEFAULT_LATEST_WEEKS, DEFAULT_MIN_FOCUS_WEEK_COMMENTS, DEFAULT_TOP_TOPICS};
use crate::model::{Intent, IntentGroup, Sentiment};

use super::week::WeeklyBucket;

pub(crate) const ESCALATION_WATCH_AT: f64 = 0.15;
pub(crate) const ESCALATION_CRITICAL_AT: f64 = 0.30;
pub(crate) const FOCUSED_DOMINANCE_GT: f64 = 0.40;
pub(crate) const EMOTION_ELEVATED_AT: f64 = 0.05;
pub(crate) const EMOTION_HIGH_AT: f64 = 0.15;
pub(crate) const TREND_FLAT_BAND: f64 = 0.05;

pub(crate) type TopicVotes = (String, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MetricsOptions {
    pub(crate) latest_weeks: usize,
    pub(crate) top_topics: usize,
    pub(crate) min_focus_week_comments: usize,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            latest_weeks: DEFAULT_LATEST_WEEKS,
            top_topics: DEFAULT_TOP_TOPICS,
            min_focus_week_comments: DEFAULT_MIN_FOCUS_WEEK_COMMENTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct SentimentTrendRow {
    pub(crate) week: WeeklyBucket,
    pub(crate) sentiment: Sentiment,
    pub(crate) count: usize,
    pub(crate) ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct IntentDistributionRow {
    pub(crate) week: WeeklyBucket,
    pub(crate) intent: Intent,
    pub(crate) count: usize,
    pub(crate) ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct IntentShiftRow {
    pub(crate) week: WeeklyBucket,
    pub(crate) intent_group: IntentGroup,
    pub(crate) count: usize,
    pub(crate) ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct IssueRow {
    pub(crate) week: WeeklyBucket,
    pub(crate) topic: String,
    pub(crate) sentiment: Sentiment,
    pub(crate) intent_group: IntentGroup,
    pub(crate) comment_count: usize,
    pub(crate) avg_emotion: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum EscalationLevel {
    Stable,
    Watch,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct EscalationThresholds {
    pub(crate) stable_lt: f64,
    pub(crate) watch_lt: f64,
    pub(crate) critical_ge: f64,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            stable_lt: ESCALATION_WATCH_AT,
            watch_lt: ESCALATION_CRITICAL_AT,
            critical_ge: ESCALATION_CRITICAL_AT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct EscalationRow {
    pub(crate) week: WeeklyBucket,
    pub(crate) aggressive_ratio: f64,
    pub(crate) level: EscalationLevel,
    pub(crate) thresholds: EscalationThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum CriticismStructure {
    None,
    Focused,
    Fragmented,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct CriticismStructureRow {
    pub(crate) week: WeeklyBucket,
    pub(crate) structure: CriticismStructure,
    pub(crate) dominance: f64,
    pub(crate) threshold_focused_gt: f64,
    pub(crate) top_topics: Vec<TopicVotes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum EmotionLabel {
    Normal,
    Elevated,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct EmotionThresholds {
    pub(crate) normal_lt: f64,
    pub(crate) elevated_lt: f64,
    pub(crate) high_ge: f64,
}

impl Default for EmotionThresholds {
    fn default() -> Self {
        Self {
            normal_lt: EMOTION_ELEVATED_AT,
            elevated_lt: EMOTION_HIGH_AT,
            high_ge: EMOTION_HIGH_AT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct EmotionContextRow {
    pub(crate) week: WeeklyBucket,
    pub(crate) avg_emotion_total: f64,
    pub(crate) avg_emotion_negative: f64,
    pub(crate) emotion_lift: f64,
    pub(crate) emotion_label: EmotionLabel,
    pub(crate) thresholds: EmotionThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TrendDirection {
    Rising,
    Flat,
    Falling,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TrendFlagRow {
    pub(crate) week: WeeklyBucket,
    pub(crate) negative_trend: TrendDirection,
    pub(crate) negative_change: f64,
    pub(crate) critical_intent_trend: TrendDirection,
    pub(crate) critical_intent_change: f64,
    pub(crate) threshold_flat_pp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FocusSelection {
    VolumeThreshold,
    HighestVolume,
    Newest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum WeekStatus {
    Stable,
    Watch,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct FocusWeekSummary {
    pub(crate) week: WeeklyBucket,
    pub(crate) comment_count: usize,
    pub(crate) min_comments: usize,
    pub(crate) selection: FocusSelection,
    pub(crate) escalation_level: EscalationLevel,
    pub(crate) criticism_structure: CriticismStructure,
    pub(crate) status: WeekStatus,
    pub(crate) action: String,
    pub(crate) reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct MetricsDocument {
    pub(crate) sentiment_trend: Vec<SentimentTrendRow>,
    pub(crate) intent_distribution: Vec<IntentDistributionRow>,
    pub(crate) intent_shift: Vec<IntentShiftRow>,
    pub(crate) top_trigger_topics: Vec<TopicVotes>,
    pub(crate) issues: Vec<IssueRow>,
    pub(crate) escalation: Vec<EscalationRow>,
    pub(crate) criticism_structure: Vec<CriticismStructureRow>,
    pub(crate) emotion_context: Vec<EmotionContextRow>,
    pub(crate) trend_flags: Vec<TrendFlagRow>,
    pub(crate) focus_week: FocusWeekSummary,
}
