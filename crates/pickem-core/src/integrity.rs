// Pick sheet integrity: duplicate bonus teams across weeks and the season
// completion gate.
//
// Both checks are recomputed from scratch on every call; inputs are at most
// one season of weeks with a handful of picks each.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::pick::WeekStatus;
use crate::scoring::ScoringRules;

/// Teams used as the bonus pick in more than one week.
pub fn find_duplicate_bonus_teams(weeks: &BTreeMap<u8, WeekStatus>) -> BTreeSet<String> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for status in weeks.values() {
        let Some(bonus) = status.bonus.as_deref() else {
            continue;
        };
        if !seen.insert(bonus) {
            duplicates.insert(bonus.to_string());
        }
    }
    duplicates
}

/// Weeks whose bonus team is also the bonus team of some other week.
pub fn weeks_with_duplicate_bonus(weeks: &BTreeMap<u8, WeekStatus>) -> BTreeSet<u8> {
    let duplicates = find_duplicate_bonus_teams(weeks);
    weeks
        .iter()
        .filter(|(_, s)| s.bonus.as_ref().is_some_and(|b| duplicates.contains(b)))
        .map(|(w, _)| *w)
        .collect()
}

/// A week is complete when it has exactly `picks_per_week` distinct teams,
/// no repeated team, and a bonus that is one of them.
pub fn is_week_complete(status: &WeekStatus, rules: &ScoringRules) -> bool {
    status.picks.len() == rules.picks_per_week
        && status.distinct_team_count() == rules.picks_per_week
        && status.valid_bonus().is_some()
}

/// Why a season is (or isn't) ready to submit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    /// Season weeks that are missing or not complete.
    pub incomplete_weeks: Vec<u8>,
    /// Bonus teams used in more than one week.
    pub duplicate_bonus_teams: BTreeSet<String>,
    /// Weeks affected by a duplicate bonus.
    pub flagged_weeks: BTreeSet<u8>,
}

impl CompletionReport {
    pub fn is_submittable(&self) -> bool {
        self.incomplete_weeks.is_empty() && self.duplicate_bonus_teams.is_empty()
    }
}

/// Evaluate the completion gate and explain the result.
pub fn completion_report(weeks: &BTreeMap<u8, WeekStatus>, rules: &ScoringRules) -> CompletionReport {
    let incomplete_weeks = rules
        .weeks()
        .filter(|w| !weeks.get(w).is_some_and(|s| is_week_complete(s, rules)))
        .collect();
    CompletionReport {
        incomplete_weeks,
        duplicate_bonus_teams: find_duplicate_bonus_teams(weeks),
        flagged_weeks: weeks_with_duplicate_bonus(weeks),
    }
}

/// Completion gate: every season week complete and no bonus team reused.
pub fn is_submittable(weeks: &BTreeMap<u8, WeekStatus>, rules: &ScoringRules) -> bool {
    completion_report(weeks, rules).is_submittable()
}
