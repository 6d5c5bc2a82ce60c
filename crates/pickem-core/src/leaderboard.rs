// Leaderboard ranking, duplicate-bonus annotation, and export.

use std::collections::BTreeSet;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::artifact::{ScoresArtifact, TeamPoints, WeekEntry};
use crate::feed::PicksFeed;
use crate::integrity::weeks_with_duplicate_bonus;
use crate::model::game::Game;
use crate::model::pick::UserId;
use crate::scoring::team::TeamMatching;
use crate::scoring::ScoringRules;

/// One user's score going into the ranker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub name: String,
    pub score: u32,
}

/// A ranked leaderboard line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub user_id: UserId,
    pub name: String,
    pub score: u32,
    /// Weeks whose bonus team repeats another week's bonus team.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub flagged_weeks: BTreeSet<u8>,
}

/// Which total a leaderboard ranks by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Overall,
    Week(u8),
}

/// Rank entries by score (descending), ties ordered by name then user id.
///
/// Standard competition ranking ("1224"): equal scores share a rank and the
/// next distinct score is ranked by its position, so two users tied for 1st
/// are followed by 3rd.
pub fn rank<I>(entries: I) -> Vec<LeaderboardRow>
where
    I: IntoIterator<Item = LeaderboardEntry>,
{
    let mut sorted: Vec<LeaderboardEntry> = entries.into_iter().collect();
    sorted.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    let mut rows = Vec::with_capacity(sorted.len());
    let mut current_rank = 0;
    let mut previous_score = None;
    for (position, entry) in sorted.into_iter().enumerate() {
        if previous_score != Some(entry.score) {
            current_rank = position + 1;
            previous_score = Some(entry.score);
        }
        rows.push(LeaderboardRow {
            rank: current_rank,
            user_id: entry.user_id,
            name: entry.name,
            score: entry.score,
            flagged_weeks: BTreeSet::new(),
        });
    }
    rows
}

/// Build and rank the overall or weekly leaderboard from a scores artifact.
/// A user with no entry for the week scores 0.
pub fn leaderboard(artifact: &ScoresArtifact, scope: Scope) -> Vec<LeaderboardRow> {
    let entries = artifact.users.iter().map(|(uid, user)| LeaderboardEntry {
        user_id: uid.clone(),
        name: user.name.clone(),
        score: match scope {
            Scope::Overall => user.overall_score,
            Scope::Week(week) => artifact.week_total(uid, week),
        },
    });
    rank(entries)
}

/// Attach each user's duplicate-bonus weeks to their row.
pub fn flag_duplicate_bonus(rows: &mut [LeaderboardRow], feed: &PicksFeed, rules: &ScoringRules) {
    for row in rows {
        let statuses = feed.week_statuses(&row.user_id, rules);
        row.flagged_weeks = weeks_with_duplicate_bonus(&statuses);
    }
}

/// Write rows as CSV: `rank,name,score,flagged_weeks` (weeks `;`-separated).
pub fn write_csv<W: Write>(rows: &[LeaderboardRow], writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["rank", "name", "score", "flagged_weeks"])?;
    for row in rows {
        let flagged = row
            .flagged_weeks
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(";");
        wtr.write_record([
            row.rank.to_string(),
            row.name.clone(),
            row.score.to_string(),
            flagged,
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Order one user's week for display: the bonus pick first, then the other
/// picks in the schedule order of their games. Teams with no game go last,
/// alphabetically.
pub fn ordered_week_picks<'a>(
    entry: &'a WeekEntry,
    week_games: &[Game],
    matching: TeamMatching,
) -> Vec<(&'a str, TeamPoints)> {
    let mut picks: Vec<(&'a str, TeamPoints, usize)> = entry
        .teams
        .iter()
        .map(|(team, points)| {
            let slot = matching
                .locate(team, week_games)
                .map(|m| m.index)
                .unwrap_or(usize::MAX);
            (team.as_str(), *points, slot)
        })
        .collect();
    // Teams are already alphabetical (BTreeMap) so a stable sort keeps
    // that order among unmatched teams.
    picks.sort_by_key(|(_, points, slot)| (!points.bonus, *slot));
    picks.into_iter().map(|(team, points, _)| (team, points)).collect()
}
