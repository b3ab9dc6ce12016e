use std::collections::BTreeMap;

use super::types::{
    CriticismStructure, CriticismStructureRow, EscalationLevel, EscalationRow, FocusSelection,
    FocusWeekSummary, WeekStatus,
};
use super::week::WeeklyBucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FocusPick {
    pub(crate) week: WeeklyBucket,
    pub(crate) selection: FocusSelection,
}

pub(crate) fn pick_focus_week(
    weeks: &[WeeklyBucket],
    volumes: &BTreeMap<WeeklyBucket, usize>,
    min_comments: usize,
) -> Option<FocusPick> {
    let newest = *weeks.last()?;

    if let Some(week) = weeks
        .iter()
        .rev()
        .find(|week| volumes.get(week).copied().unwrap_or(0) >= min_comments)
    {
        return Some(FocusPick {
            week: *week,
            selection: FocusSelection::VolumeThreshold,
        });
    }

    let busiest = weeks
        .iter()
        .filter_map(|week| volumes.get(week).map(|count| (*week, *count)))
        .fold(None, |best: Option<(WeeklyBucket, usize)>, candidate| match best {
            Some(current) if current.1 >= candidate.1 => Some(current),
            _ => Some(candidate),
        });

    Some(match busiest {
        Some((week, _)) => FocusPick {
            week,
            selection: FocusSelection::HighestVolume,
        },
        None => FocusPick {
            week: newest,
            selection: FocusSelection::Newest,
        },
    })
}

pub(crate) fn week_status(level: EscalationLevel, structure: CriticismStructure) -> WeekStatus {
    match (level, structure) {
        (EscalationLevel::Critical, _) => WeekStatus::Critical,
        (EscalationLevel::Watch, _) => WeekStatus::Watch,
        (EscalationLevel::Stable, CriticismStructure::Focused) => WeekStatus::Watch,
        (EscalationLevel::Stable, _) => WeekStatus::Stable,
    }
}

fn action_and_reason(
    level: EscalationLevel,
    structure: CriticismStructure,
) -> (&'static str, &'static str) {
    match (level, structure) {
        (EscalationLevel::Critical, _) => (
            "respond actively",
            "high share of aggressive criticism (escalation level: critical)",
        ),
        (EscalationLevel::Watch, _) => (
            "monitor and add context if needed",
            "elevated share of aggressive criticism (escalation level: watch)",
        ),
        (EscalationLevel::Stable, CriticismStructure::Focused) => (
            "monitor",
            "criticism is focused on one dominant topic without escalation",
        ),
        (EscalationLevel::Stable, _) => (
            "no action needed",
            "no notable escalation and no topical concentration",
        ),
    }
}

pub(crate) fn summarize_focus_week(
    pick: FocusPick,
    volumes: &BTreeMap<WeeklyBucket, usize>,
    min_comments: usize,
    escalation: &[EscalationRow],
    structure: &[CriticismStructureRow],
) -> FocusWeekSummary {
    let level = escalation
        .iter()
        .find(|row| row.week == pick.week)
        .map(|row| row.level)
        .unwrap_or(EscalationLevel::Stable);
    let criticism_structure = structure
        .iter()
        .find(|row| row.week == pick.week)
        .map(|row| row.structure)
        .unwrap_or(CriticismStructure::None);
    let (action, reason) = action_and_reason(level, criticism_structure);

    FocusWeekSummary {
        week: pick.week,
        comment_count: volumes.get(&pick.week).copied().unwrap_or(0),
        min_comments,
        selection: pick.selection,
        escalation_level: level,
        criticism_structure,
        status: week_status(level, criticism_structure),
        action: action.to_string(),
        reason: reason.to_string(),
    }
}
