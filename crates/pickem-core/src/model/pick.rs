// Pick records and per-week pick selections.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque user identifier issued by the identity provider.
pub type UserId = String;

/// A single scored pick: one team chosen by one user for one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    pub user_id: UserId,
    pub week: u8,
    pub team: String,
    pub is_bonus: bool,
}

/// A team selected in the pick sheet, tied to the matchup it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedTeam {
    pub team: String,
    #[serde(default)]
    pub matchup: Option<String>,
}

impl SelectedTeam {
    pub fn new(team: impl Into<String>, matchup: impl Into<String>) -> Self {
        SelectedTeam {
            team: team.into(),
            matchup: Some(matchup.into()),
        }
    }
}

/// A user's selections for one week: up to N teams plus one bonus team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekStatus {
    #[serde(default)]
    pub picks: Vec<SelectedTeam>,
    #[serde(default)]
    pub bonus: Option<String>,
}

impl WeekStatus {
    pub fn contains_team(&self, team: &str) -> bool {
        self.picks.iter().any(|p| p.team == team)
    }

    /// Number of distinct teams picked this week.
    pub fn distinct_team_count(&self) -> usize {
        let mut seen: Vec<&str> = Vec::with_capacity(self.picks.len());
        for p in &self.picks {
            if !seen.contains(&p.team.as_str()) {
                seen.push(&p.team);
            }
        }
        seen.len()
    }

    /// The bonus team, but only if it is one of this week's picks.
    pub fn valid_bonus(&self) -> Option<&str> {
        self.bonus
            .as_deref()
            .filter(|b| self.contains_team(b))
    }
}

/// Week identifier as it appears in feeds and artifacts (`"week7"`).
///
/// Orders numerically, so `week2` sorts before `week10` in maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey(pub u8);

impl WeekKey {
    pub fn number(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "week{}", self.0)
    }
}

/// Error for a week key that isn't `week<N>` with N in 1..=255, written
/// without sign or leading zeros.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid week key `{0}`")]
pub struct InvalidWeekKey(pub String);

impl FromStr for WeekKey {
    type Err = InvalidWeekKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .strip_prefix("week")
            .filter(|n| is_canonical_number(n))
            .and_then(|n| n.parse::<u8>().ok())
            .map(WeekKey)
            .ok_or_else(|| InvalidWeekKey(s.to_string()))
    }
}

/// ASCII digits only, no sign, no leading zero (so also not "0").
fn is_canonical_number(n: &str) -> bool {
    !n.is_empty() && !n.starts_with('0') && n.bytes().all(|b| b.is_ascii_digit())
}

impl Serialize for WeekKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WeekKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn week_key_parses_and_displays() {
        let key: WeekKey = "week12".parse().unwrap();
        assert_eq!(key.number(), 12);
        assert_eq!(key.to_string(), "week12");
    }

    #[test]
    fn week_key_rejects_garbage() {
        assert!("wk1".parse::<WeekKey>().is_err());
        assert!("week".parse::<WeekKey>().is_err());
        assert!("week0".parse::<WeekKey>().is_err());
        assert!("week-3".parse::<WeekKey>().is_err());
        assert!("week256".parse::<WeekKey>().is_err());
    }

    #[test]
    fn week_key_rejects_non_canonical_numbers() {
        assert!("week01".parse::<WeekKey>().is_err());
        assert!("week+2".parse::<WeekKey>().is_err());
        assert!("week 2".parse::<WeekKey>().is_err());
        assert_eq!("week10".parse::<WeekKey>().unwrap(), WeekKey(10));
    }

    #[test]
    fn week_keys_order_numerically_as_map_keys() {
        let mut map = BTreeMap::new();
        map.insert(WeekKey(10), 1);
        map.insert(WeekKey(2), 2);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"week2":2,"week10":1}"#);

        let back: BTreeMap<WeekKey, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.keys().next(), Some(&WeekKey(2)));
    }

    #[test]
    fn valid_bonus_requires_membership() {
        let mut status = WeekStatus {
            picks: vec![SelectedTeam::new("Chiefs", "week1_game0")],
            bonus: Some("Bills".into()),
        };
        assert_eq!(status.valid_bonus(), None);
        status.bonus = Some("Chiefs".into());
        assert_eq!(status.valid_bonus(), Some("Chiefs"));
    }

    #[test]
    fn distinct_team_count_ignores_repeats() {
        let status = WeekStatus {
            picks: vec![
                SelectedTeam::new("Chiefs", "week1_game0"),
                SelectedTeam::new("Chiefs", "week1_game0"),
                SelectedTeam::new("Bills", "week1_game1"),
            ],
            bonus: None,
        };
        assert_eq!(status.distinct_team_count(), 2);
    }
}
