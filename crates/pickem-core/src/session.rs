// Pick session: one user's editable season pick sheet.
//
// The session owns every week's selections and tracks which weeks changed
// since the last save. Mutations only mark weeks dirty; `persist` is the
// single place that writes them to the store.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::integrity::{self, CompletionReport};
use crate::model::pick::{SelectedTeam, UserId, WeekStatus};
use crate::scoring::ScoringRules;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("already picked {limit} teams for week {week}")]
    TooManyPicks { week: u8, limit: usize },

    #[error("'{team}' is not one of the week {week} picks")]
    UnknownPick { week: u8, team: String },

    #[error("week {week} is outside the season (1..={season_weeks})")]
    WeekOutOfRange { week: u8, season_weeks: u8 },

    #[error("picks cannot be submitted yet: {} incomplete weeks, duplicate bonus teams: {:?}",
        .0.incomplete_weeks.len(), .0.duplicate_bonus_teams)]
    NotSubmittable(CompletionReport),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Storage collaborator for pick sessions.
pub trait PickStore {
    /// Load all saved weeks for a user. Missing weeks are simply absent.
    fn load_weeks(&self, user_id: &str) -> anyhow::Result<BTreeMap<u8, WeekStatus>>;

    /// Save (replace) one week of selections.
    fn save_week(&self, user_id: &str, week: u8, status: &WeekStatus) -> anyhow::Result<()>;

    /// Record that the user submitted a complete season.
    fn mark_submitted(&self, user_id: &str, display_name: &str) -> anyhow::Result<()>;
}

/// A store that keeps nothing. Sessions use it when no persistence is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

impl PickStore for NoopStore {
    fn load_weeks(&self, _user_id: &str) -> anyhow::Result<BTreeMap<u8, WeekStatus>> {
        Ok(BTreeMap::new())
    }

    fn save_week(&self, _user_id: &str, _week: u8, _status: &WeekStatus) -> anyhow::Result<()> {
        Ok(())
    }

    fn mark_submitted(&self, _user_id: &str, _display_name: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// What a `toggle_team` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
    /// The other side of the same matchup was picked and got swapped out.
    Replaced { previous: String },
}

#[derive(Debug, Clone)]
pub struct PickSession {
    pub user_id: UserId,
    pub display_name: String,
    current_week: u8,
    weeks: BTreeMap<u8, WeekStatus>,
    dirty: BTreeSet<u8>,
    rules: ScoringRules,
}

impl PickSession {
    pub fn new(user_id: &str, display_name: &str, rules: ScoringRules) -> Self {
        PickSession {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            current_week: 1,
            weeks: BTreeMap::new(),
            dirty: BTreeSet::new(),
            rules,
        }
    }

    /// Open a session pre-populated with the user's saved weeks.
    pub fn load<S: PickStore + ?Sized>(
        store: &S,
        user_id: &str,
        display_name: &str,
        rules: ScoringRules,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(user_id, display_name, rules);
        session.weeks = store
            .load_weeks(user_id)?
            .into_iter()
            .filter(|(w, _)| session.rules.is_valid_week(*w))
            .collect();
        debug!("Loaded {} saved weeks for '{}'", session.weeks.len(), user_id);
        Ok(session)
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub fn current_week(&self) -> u8 {
        self.current_week
    }

    pub fn weeks(&self) -> &BTreeMap<u8, WeekStatus> {
        &self.weeks
    }

    pub fn week(&self, week: u8) -> Option<&WeekStatus> {
        self.weeks.get(&week)
    }

    /// Weeks changed since the last `persist`.
    pub fn dirty_weeks(&self) -> &BTreeSet<u8> {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn go_to_week(&mut self, week: u8) -> Result<(), SessionError> {
        self.check_week(week)?;
        self.current_week = week;
        Ok(())
    }

    /// Advance one week. Returns false when already on the last week.
    pub fn next_week(&mut self) -> bool {
        if self.current_week < self.rules.season_weeks {
            self.current_week += 1;
            true
        } else {
            false
        }
    }

    /// Go back one week. Returns false when already on week 1.
    pub fn previous_week(&mut self) -> bool {
        if self.current_week > 1 {
            self.current_week -= 1;
            true
        } else {
            false
        }
    }

    fn check_week(&self, week: u8) -> Result<(), SessionError> {
        if self.rules.is_valid_week(week) {
            Ok(())
        } else {
            Err(SessionError::WeekOutOfRange {
                week,
                season_weeks: self.rules.season_weeks,
            })
        }
    }

    fn week_mut(&mut self, week: u8) -> Result<&mut WeekStatus, SessionError> {
        self.check_week(week)?;
        Ok(self.weeks.entry(week).or_default())
    }

    /// Select or deselect `team` from `matchup` in `week`.
    ///
    /// Re-selecting the picked side removes it. Selecting the other side of
    /// an already-picked matchup replaces it, dropping the bonus if it was
    /// on the replaced team. A new matchup beyond the weekly limit is
    /// rejected without changing anything.
    pub fn toggle_team(&mut self, week: u8, team: &str, matchup: &str) -> Result<Toggle, SessionError> {
        let limit = self.rules.picks_per_week;
        let status = self.week_mut(week)?;

        let existing = status
            .picks
            .iter()
            .position(|p| p.matchup.as_deref() == Some(matchup));

        let outcome = match existing {
            Some(idx) if status.picks[idx].team == team => {
                status.picks.remove(idx);
                if status.bonus.as_deref() == Some(team) {
                    status.bonus = None;
                }
                Toggle::Removed
            }
            Some(idx) => {
                let previous = std::mem::replace(&mut status.picks[idx], SelectedTeam::new(team, matchup));
                if status.bonus.as_deref() == Some(previous.team.as_str()) {
                    status.bonus = None;
                }
                Toggle::Replaced {
                    previous: previous.team,
                }
            }
            None => {
                if status.picks.len() >= limit {
                    return Err(SessionError::TooManyPicks { week, limit });
                }
                status.picks.push(SelectedTeam::new(team, matchup));
                Toggle::Added
            }
        };

        self.dirty.insert(week);
        Ok(outcome)
    }

    /// Remove a picked team (from any matchup) in `week`.
    pub fn remove_pick(&mut self, week: u8, team: &str) -> Result<(), SessionError> {
        let status = self.week_mut(week)?;
        let before = status.picks.len();
        status.picks.retain(|p| p.team != team);
        if status.picks.len() == before {
            return Err(SessionError::UnknownPick {
                week,
                team: team.to_string(),
            });
        }
        if status.bonus.as_deref() == Some(team) {
            status.bonus = None;
        }
        self.dirty.insert(week);
        Ok(())
    }

    /// Make `team` the week's bonus pick. It must already be picked.
    pub fn set_bonus(&mut self, week: u8, team: &str) -> Result<(), SessionError> {
        let status = self.week_mut(week)?;
        if !status.contains_team(team) {
            return Err(SessionError::UnknownPick {
                week,
                team: team.to_string(),
            });
        }
        status.bonus = Some(team.to_string());
        self.dirty.insert(week);
        Ok(())
    }

    pub fn clear_bonus(&mut self, week: u8) -> Result<(), SessionError> {
        let status = self.week_mut(week)?;
        if status.bonus.take().is_some() {
            self.dirty.insert(week);
        }
        Ok(())
    }

    /// True when the week has a full set of picks and a bonus.
    pub fn is_week_ready(&self, week: u8) -> bool {
        self.weeks
            .get(&week)
            .is_some_and(|s| integrity::is_week_complete(s, &self.rules))
    }

    pub fn duplicate_bonus_teams(&self) -> BTreeSet<String> {
        integrity::find_duplicate_bonus_teams(&self.weeks)
    }

    pub fn completion_report(&self) -> CompletionReport {
        integrity::completion_report(&self.weeks, &self.rules)
    }

    pub fn is_submittable(&self) -> bool {
        self.completion_report().is_submittable()
    }

    /// Save every dirty week, then mark the session clean. Returns the
    /// number of weeks written. On a store error the remaining weeks stay
    /// dirty.
    pub fn persist<S: PickStore + ?Sized>(&mut self, store: &S) -> Result<usize, SessionError> {
        let pending: Vec<u8> = self.dirty.iter().copied().collect();
        for week in &pending {
            let status = self.weeks.get(week).cloned().unwrap_or_default();
            store.save_week(&self.user_id, *week, &status)?;
            self.dirty.remove(week);
        }
        if !pending.is_empty() {
            debug!("Persisted {} weeks for '{}'", pending.len(), self.user_id);
        }
        Ok(pending.len())
    }

    /// Final submission: requires the completion gate, saves every week,
    /// and marks the user as submitted.
    pub fn submit<S: PickStore + ?Sized>(&mut self, store: &S) -> Result<usize, SessionError> {
        let report = self.completion_report();
        if !report.is_submittable() {
            return Err(SessionError::NotSubmittable(report));
        }
        for (week, status) in &self.weeks {
            store.save_week(&self.user_id, *week, status)?;
        }
        self.dirty.clear();
        store.mark_submitted(&self.user_id, &self.display_name)?;
        info!("User '{}' submitted {} weeks", self.user_id, self.weeks.len());
        Ok(self.weeks.len())
    }
}
