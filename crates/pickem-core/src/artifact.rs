// Scores artifact and last-updated marker written after every scoring run.
//
// The artifact is the full contract the leaderboard UI renders from. It is
// always written whole (temp file + rename), never patched.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::model::pick::{UserId, WeekKey};
use crate::scoring::SeasonScore;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to (de)serialize {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Points for one picked team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPoints {
    pub points: u32,
    pub bonus: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekEntry {
    pub teams: BTreeMap<String, TeamPoints>,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScores {
    pub name: String,
    pub weeks: BTreeMap<WeekKey, WeekEntry>,
    pub overall_score: u32,
}

/// user id -> scores, serialized as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoresArtifact {
    pub users: BTreeMap<UserId, UserScores>,
}

impl ScoresArtifact {
    /// Build the artifact from scored seasons. `name_of` supplies each
    /// user's display name.
    pub fn from_seasons<F>(seasons: &[SeasonScore], name_of: F) -> Self
    where
        F: Fn(&str) -> String,
    {
        let users = seasons
            .iter()
            .map(|season| {
                let weeks = season
                    .weeks
                    .iter()
                    .map(|(week, score)| {
                        let teams = score
                            .per_team
                            .iter()
                            .map(|(team, p)| {
                                (
                                    team.clone(),
                                    TeamPoints {
                                        points: p.points,
                                        bonus: p.bonus,
                                    },
                                )
                            })
                            .collect();
                        (
                            WeekKey(*week),
                            WeekEntry {
                                teams,
                                total: score.total,
                            },
                        )
                    })
                    .collect();
                (
                    season.user_id.clone(),
                    UserScores {
                        name: name_of(&season.user_id),
                        weeks,
                        overall_score: season.overall,
                    },
                )
            })
            .collect();
        ScoresArtifact { users }
    }

    /// A user's total for one week, zero if absent.
    pub fn week_total(&self, user_id: &str, week: u8) -> u32 {
        self.users
            .get(user_id)
            .and_then(|u| u.weeks.get(&WeekKey(week)))
            .map(|w| w.total)
            .unwrap_or(0)
    }
}

/// Daylight-saving rule applied on top of the standard UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaylightSaving {
    /// Always the standard offset.
    None,
    /// +1h from the second Sunday of March 02:00 local to the first Sunday
    /// of November 02:00 local.
    #[default]
    UnitedStates,
}

impl DaylightSaving {
    /// Offset in effect at `now` for a zone whose standard offset is
    /// `standard_hours`.
    pub fn offset_at(&self, now: DateTime<Utc>, standard_hours: i32) -> FixedOffset {
        let dst = match self {
            DaylightSaving::None => false,
            DaylightSaving::UnitedStates => us_dst_active(now, standard_hours),
        };
        let hours = if dst { standard_hours + 1 } else { standard_hours };
        FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}

fn us_dst_active(now: DateTime<Utc>, standard_hours: i32) -> bool {
    let year = now.year();
    let transition = |month, nth, local_offset_hours: i32| {
        NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Sun, nth)
            .and_then(|d| d.and_hms_opt(2, 0, 0))
            .map(|local| local - chrono::Duration::hours(i64::from(local_offset_hours)))
            .map(|utc| Utc.from_utc_datetime(&utc))
    };
    match (
        transition(3, 2, standard_hours),
        transition(11, 1, standard_hours + 1),
    ) {
        (Some(start), Some(end)) => now >= start && now < end,
        _ => false,
    }
}

/// Staleness marker written next to the artifact. Display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUpdated {
    pub last_updated: String,
}

impl LastUpdated {
    /// Render `now` in local time with a fixed zone label, e.g.
    /// `October 19, 2026 at 3:04:05 PM CST`. The clock follows `dst`, but
    /// the label never changes with it.
    pub fn at(now: DateTime<Utc>, utc_offset_hours: i32, dst: DaylightSaving, label: &str) -> Self {
        let local = now.with_timezone(&dst.offset_at(now, utc_offset_hours));
        LastUpdated {
            last_updated: format!("{} {}", local.format("%B %-d, %Y at %-I:%M:%S %p"), label),
        }
    }
}

/// Serialize `value` as pretty JSON and replace `path` atomically.
/// Parent directories are created as needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    };

    let json = serde_json::to_string_pretty(value).map_err(|e| ArtifactError::Json {
        path: path.display().to_string(),
        source: e,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Read a previously written scores artifact.
pub fn read_scores(path: &Path) -> Result<ScoresArtifact, ArtifactError> {
    let text = std::fs::read_to_string(path).map_err(|e| ArtifactError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| ArtifactError::Json {
        path: path.display().to_string(),
        source: e,
    })
}
