// Team identity: how a pick's team name is matched to a side of a game.
//
// Picks may carry either the full franchise name ("San Francisco 49ers")
// or just the mascot ("49ers"). Exact equality is always tried first; the
// mascot fallback is opt-in via config and must be unambiguous within the
// week. Substring containment is never used.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::game::{Game, Side};

/// Team-name matching policy for a scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamMatching {
    /// Pick team must equal the game's home or away name.
    Exact,
    /// Exact first; otherwise a unique, case-insensitive mascot match.
    #[default]
    ExactOrMascot,
}

/// A game located for a pick, with the side the picked team played on.
#[derive(Debug, Clone, Copy)]
pub struct GameMatch<'a> {
    pub game: &'a Game,
    /// Position of the game in the week's schedule.
    pub index: usize,
    pub side: Side,
}

/// Last whitespace-separated word of a team name ("San Francisco 49ers" -> "49ers").
pub fn mascot(name: &str) -> &str {
    name.split_whitespace().last().unwrap_or("")
}

impl TeamMatching {
    /// Locate the game in `games` (one week's schedule) in which `team` played.
    pub fn locate<'a>(&self, team: &str, games: &'a [Game]) -> Option<GameMatch<'a>> {
        let team = team.trim();
        if team.is_empty() {
            return None;
        }

        for (index, game) in games.iter().enumerate() {
            for side in [Side::Home, Side::Away] {
                if game.team(side) == team {
                    return Some(GameMatch { game, index, side });
                }
            }
        }

        if *self == TeamMatching::Exact {
            return None;
        }

        let wanted = mascot(team);
        let mut found: Option<GameMatch<'a>> = None;
        for (index, game) in games.iter().enumerate() {
            for side in [Side::Home, Side::Away] {
                if !mascot(game.team(side)).eq_ignore_ascii_case(wanted) {
                    continue;
                }
                if found.is_some() {
                    debug!("mascot '{}' matches more than one team this week; not matching", wanted);
                    return None;
                }
                found = Some(GameMatch { game, index, side });
            }
        }
        found
    }
}
