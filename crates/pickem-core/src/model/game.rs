// Game results and weekly schedules.

use serde::{Deserialize, Serialize};

/// Lifecycle of a single game. Only `Completed` games resolve picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Completed,
    /// Any status string the results feed sends that we don't recognize.
    #[serde(other)]
    Unknown,
}

impl GameStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, GameStatus::Completed)
    }
}

/// Which side of a matchup a team played on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

/// One game from the results feed.
///
/// Scores are optional because the feed leaves them null until kickoff.
/// A game is identified by `(week, home_team, away_team)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Filled from the enclosing [`WeekSchedule`] when loaded from a feed.
    #[serde(default)]
    pub week: u8,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
    pub status: GameStatus,
    #[serde(default)]
    pub weekday: String,
}

/// Final result of a completed game from one side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won { own_score: u32 },
    Lost,
    Tied,
}

impl Game {
    /// Team name on the given side.
    pub fn team(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home_team,
            Side::Away => &self.away_team,
        }
    }

    /// Outcome for `side`, or `None` when the game has no final result yet
    /// (not completed, or completed without both scores).
    pub fn outcome_for(&self, side: Side) -> Option<Outcome> {
        if !self.status.is_completed() {
            return None;
        }
        let (home, away) = (self.home_score?, self.away_score?);
        let (own, other) = match side {
            Side::Home => (home, away),
            Side::Away => (away, home),
        };
        Some(if own > other {
            Outcome::Won { own_score: own }
        } else if own < other {
            Outcome::Lost
        } else {
            Outcome::Tied
        })
    }
}

/// All games of one season week, in feed (schedule) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSchedule {
    pub week: u8,
    pub games: Vec<Game>,
}

impl WeekSchedule {
    /// Copy the schedule's week number onto every game so games can be
    /// scored without their enclosing schedule.
    pub fn stamp_weeks(&mut self) {
        for game in &mut self.games {
            game.week = self.week;
        }
    }
}

/// Find the games for `week` in a season schedule. Returns an empty slice
/// when the week is not present.
pub fn games_for_week(schedule: &[WeekSchedule], week: u8) -> &[Game] {
    schedule
        .iter()
        .find(|w| w.week == week)
        .map(|w| w.games.as_slice())
        .unwrap_or(&[])
}

/// Group a week's games by weekday, keeping the order in which each
/// weekday first appears and the schedule order within a day.
pub fn games_by_weekday(games: &[Game]) -> Vec<(String, Vec<&Game>)> {
    let mut groups: Vec<(String, Vec<&Game>)> = Vec::new();
    for game in games {
        match groups.iter_mut().find(|(day, _)| *day == game.weekday) {
            Some((_, day_games)) => day_games.push(game),
            None => groups.push((game.weekday.clone(), vec![game])),
        }
    }
    groups
}

/// Matchup key for the game at `index` within `week`'s schedule
/// (e.g. `week3_game5`). Picks record it so the two sides of one game
/// are mutually exclusive.
pub fn matchup_key(week: u8, index: usize) -> String {
    format!("week{week}_game{index}")
}
