// Feed loading: the season results feed and the submitted picks feed.
//
// Both feeds are JSON documents produced by the surrounding application.
// The picks feed is parsed leniently. Week keys stay raw strings, and any
// pick entry, week, or user whose JSON has the wrong shape degrades to an
// empty value instead of failing the whole document. Flattening then skips
// and counts picks without a usable team.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::model::game::WeekSchedule;
use crate::model::pick::{Pick, SelectedTeam, UserId, WeekKey, WeekStatus};
use crate::scoring::ScoringRules;

/// Display name used when the picks feed has none for a user.
pub const UNKNOWN_NAME: &str = "Unknown";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to read feed {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid JSON in feed {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Picks feed types
// ---------------------------------------------------------------------------

/// One entry in a week's `picks` list. A non-string `team` reads as
/// missing; an entry that is not an object reads as an empty pick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPick {
    #[serde(default, deserialize_with = "lenient_string")]
    pub team: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub matchup: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedWeek {
    #[serde(default, deserialize_with = "lenient_picks")]
    pub picks: Vec<FeedPick>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bonus: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPicks {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Raw week keys (`"week1"` ...). Invalid keys are skipped when flattened.
    #[serde(default, deserialize_with = "lenient_weeks")]
    pub weeks: BTreeMap<String, FeedWeek>,
}

/// Picks feed: user id -> display name and per-week selections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PicksFeed {
    pub users: BTreeMap<UserId, UserPicks>,
}

impl<'de> Deserialize<'de> for PicksFeed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<UserId, Value>::deserialize(deserializer)?;
        let users = raw
            .into_iter()
            .filter_map(|(uid, value)| match serde_json::from_value::<UserPicks>(value) {
                Ok(user) => Some((uid, user)),
                Err(e) => {
                    warn!("skipping unreadable picks entry for user '{}': {}", uid, e);
                    None
                }
            })
            .collect();
        Ok(PicksFeed { users })
    }
}

// ---------------------------------------------------------------------------
// Lenient field readers
// ---------------------------------------------------------------------------

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_picks<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FeedPick>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_weeks<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, FeedWeek>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(weeks) => weeks
            .into_iter()
            .map(|(key, week)| (key, serde_json::from_value(week).unwrap_or_default()))
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// Result of flattening a picks feed into scoreable [`Pick`] records.
#[derive(Debug, Clone, Default)]
pub struct FlattenedPicks {
    pub picks: Vec<Pick>,
    /// Picks dropped for a missing team or an invalid week key.
    pub skipped_malformed: usize,
}

fn parse_week(key: &str, rules: &ScoringRules) -> Option<u8> {
    key.parse::<WeekKey>()
        .ok()
        .map(|k| k.number())
        .filter(|w| rules.is_valid_week(*w))
}

fn clean_team(pick: &FeedPick) -> Option<&str> {
    pick.team.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

impl PicksFeed {
    pub fn display_name(&self, user_id: &str) -> &str {
        self.users
            .get(user_id)
            .and_then(|u| u.name.as_deref())
            .unwrap_or(UNKNOWN_NAME)
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &UserId> {
        self.users.keys()
    }

    /// Flatten every user's weeks into individual picks.
    pub fn flatten(&self, rules: &ScoringRules) -> FlattenedPicks {
        let mut out = FlattenedPicks::default();

        for (user_id, user) in &self.users {
            for (key, week) in &user.weeks {
                let Some(week_num) = parse_week(key, rules) else {
                    if !week.picks.is_empty() {
                        warn!(
                            "skipping {} picks for user '{}' under invalid week key '{}'",
                            week.picks.len(),
                            user_id,
                            key
                        );
                        out.skipped_malformed += week.picks.len();
                    }
                    continue;
                };

                for feed_pick in &week.picks {
                    let Some(team) = clean_team(feed_pick) else {
                        warn!("skipping pick without a team for user '{}' in {}", user_id, key);
                        out.skipped_malformed += 1;
                        continue;
                    };
                    out.picks.push(Pick {
                        user_id: user_id.clone(),
                        week: week_num,
                        team: team.to_string(),
                        is_bonus: week.bonus.as_deref().map(str::trim) == Some(team),
                    });
                }
            }
        }

        out
    }

    /// A user's selections keyed by week number, for integrity checks.
    /// Invalid week keys and team-less picks are left out.
    pub fn week_statuses(&self, user_id: &str, rules: &ScoringRules) -> BTreeMap<u8, WeekStatus> {
        let Some(user) = self.users.get(user_id) else {
            return BTreeMap::new();
        };
        user.weeks
            .iter()
            .filter_map(|(key, week)| {
                let week_num = parse_week(key, rules)?;
                let picks = week
                    .picks
                    .iter()
                    .filter_map(|p| {
                        clean_team(p).map(|team| SelectedTeam {
                            team: team.to_string(),
                            matchup: p.matchup.clone(),
                        })
                    })
                    .collect();
                let bonus = week
                    .bonus
                    .as_deref()
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(str::to_string);
                Some((week_num, WeekStatus { picks, bonus }))
            })
            .collect()
    }

    /// Add (or replace) a user built from stored week selections. Weeks
    /// 1..=season_weeks are always present so consumers need no existence
    /// checks.
    pub fn insert_user(
        &mut self,
        user_id: &str,
        name: &str,
        statuses: &BTreeMap<u8, WeekStatus>,
        rules: &ScoringRules,
    ) {
        let weeks = rules
            .weeks()
            .map(|w| {
                let week = statuses
                    .get(&w)
                    .map(|s| FeedWeek {
                        picks: s
                            .picks
                            .iter()
                            .map(|p| FeedPick {
                                team: Some(p.team.clone()),
                                matchup: p.matchup.clone(),
                            })
                            .collect(),
                        bonus: s.bonus.clone(),
                    })
                    .unwrap_or_default();
                (WeekKey(w).to_string(), week)
            })
            .collect();
        self.users.insert(
            user_id.to_string(),
            UserPicks {
                name: Some(name.to_string()),
                weeks,
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn load_games_from_reader<R: Read>(rdr: R) -> Result<Vec<WeekSchedule>, serde_json::Error> {
    let mut schedule: Vec<WeekSchedule> = serde_json::from_reader(rdr)?;
    for week in &mut schedule {
        week.stamp_weeks();
    }
    Ok(schedule)
}

fn load_picks_from_reader<R: Read>(rdr: R) -> Result<PicksFeed, serde_json::Error> {
    serde_json::from_reader(rdr)
}

fn open(path: &Path) -> Result<std::fs::File, FeedError> {
    std::fs::File::open(path).map_err(|e| FeedError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

/// Load the season results feed. Each game is stamped with its week.
pub fn load_games(path: &Path) -> Result<Vec<WeekSchedule>, FeedError> {
    let file = open(path)?;
    load_games_from_reader(std::io::BufReader::new(file)).map_err(|e| FeedError::Json {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load the picks feed.
pub fn load_picks(path: &Path) -> Result<PicksFeed, FeedError> {
    let file = open(path)?;
    load_picks_from_reader(std::io::BufReader::new(file)).map_err(|e| FeedError::Json {
        path: path.display().to_string(),
        source: e,
    })
}
