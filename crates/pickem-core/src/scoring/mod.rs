// Scoring engine: picks + game results -> per-pick points, weekly totals,
// season totals.
//
// Scoring is a pure function of its inputs. Every derived score is rebuilt
// from scratch on each run and never patched in place.

pub mod run;
pub mod team;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::game::{Game, Outcome};
use crate::model::pick::{Pick, UserId};
use team::TeamMatching;

pub const DEFAULT_SEASON_WEEKS: u8 = 18;
pub const DEFAULT_PICKS_PER_WEEK: usize = 5;
pub const DEFAULT_BASE_POINTS: u32 = 10;

/// League rules that parameterize scoring and the completion gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub season_weeks: u8,
    pub picks_per_week: usize,
    pub base_points: u32,
    pub team_matching: TeamMatching,
}

impl Default for ScoringRules {
    fn default() -> Self {
        ScoringRules {
            season_weeks: DEFAULT_SEASON_WEEKS,
            picks_per_week: DEFAULT_PICKS_PER_WEEK,
            base_points: DEFAULT_BASE_POINTS,
            team_matching: TeamMatching::default(),
        }
    }
}

impl ScoringRules {
    /// All week numbers of the season, 1-based.
    pub fn weeks(&self) -> impl Iterator<Item = u8> {
        1..=self.season_weeks
    }

    pub fn is_valid_week(&self, week: u8) -> bool {
        (1..=self.season_weeks).contains(&week)
    }
}

/// How a pick was resolved against the results feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Won,
    Lost,
    Tied,
    /// The game exists but has no final result yet.
    Pending,
    /// No game that week involves the picked team.
    NoGame,
}

/// Points earned by one pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickPoints {
    pub points: u32,
    pub bonus: bool,
    pub resolution: Resolution,
}

/// One user's scored week. Always present for every season week, even with
/// no picks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekScore {
    pub user_id: UserId,
    pub week: u8,
    pub per_team: BTreeMap<String, PickPoints>,
    pub total: u32,
}

impl WeekScore {
    fn empty(user_id: &str, week: u8) -> Self {
        WeekScore {
            user_id: user_id.to_string(),
            week,
            per_team: BTreeMap::new(),
            total: 0,
        }
    }
}

/// One user's full season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonScore {
    pub user_id: UserId,
    pub overall: u32,
    pub weeks: BTreeMap<u8, WeekScore>,
}

impl SeasonScore {
    fn empty(user_id: &str, rules: &ScoringRules) -> Self {
        SeasonScore {
            user_id: user_id.to_string(),
            overall: 0,
            weeks: rules
                .weeks()
                .map(|w| (w, WeekScore::empty(user_id, w)))
                .collect(),
        }
    }

    /// Total for `week`, zero when the week is out of range.
    pub fn week_total(&self, week: u8) -> u32 {
        self.weeks.get(&week).map(|w| w.total).unwrap_or(0)
    }
}

/// Counters describing what a scoring run did with its input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDiagnostics {
    pub users: usize,
    pub picks_scored: usize,
    /// Picks dropped for a missing team or an out-of-range week.
    pub skipped_malformed: usize,
    /// Repeat picks of a team already picked by the same user that week.
    pub skipped_duplicate: usize,
    /// Picks whose team has no game that week.
    pub unresolved: usize,
    /// Picks whose game has no final result yet.
    pub pending: usize,
}

/// Output of [`Scorer::score`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutcome {
    /// One entry per user, ordered by user id.
    pub seasons: Vec<SeasonScore>,
    pub diagnostics: ScoreDiagnostics,
}

/// Score a single pick against the games of its week.
///
/// - no matching game, or game not completed: 0
/// - tie: 0, bonus or not
/// - win: base points, plus the team's own final score when it is the bonus
/// - loss: 0
pub fn score_pick(rules: &ScoringRules, team: &str, is_bonus: bool, week_games: &[Game]) -> PickPoints {
    let resolution_points = |resolution, points| PickPoints {
        points,
        bonus: is_bonus,
        resolution,
    };

    let Some(found) = rules.team_matching.locate(team, week_games) else {
        return resolution_points(Resolution::NoGame, 0);
    };

    match found.game.outcome_for(found.side) {
        None => resolution_points(Resolution::Pending, 0),
        Some(Outcome::Tied) => resolution_points(Resolution::Tied, 0),
        Some(Outcome::Lost) => resolution_points(Resolution::Lost, 0),
        Some(Outcome::Won { own_score }) => {
            let points = if is_bonus {
                rules.base_points.saturating_add(own_score)
            } else {
                rules.base_points
            };
            resolution_points(Resolution::Won, points)
        }
    }
}

/// The scoring engine for one set of league rules.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    rules: ScoringRules,
}

impl Scorer {
    pub fn new(rules: ScoringRules) -> Self {
        Scorer { rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Score `picks` against `games`. Users are taken from the picks.
    pub fn score(&self, picks: &[Pick], games: &[Game]) -> ScoreOutcome {
        self.score_users(std::iter::empty::<UserId>(), picks, games)
    }

    /// Score `picks` against `games`, guaranteeing a full season entry for
    /// every user in `users` even if they made no picks at all.
    pub fn score_users<I>(&self, users: I, picks: &[Pick], games: &[Game]) -> ScoreOutcome
    where
        I: IntoIterator,
        I::Item: Into<UserId>,
    {
        let rules = &self.rules;
        let mut games_by_week: HashMap<u8, Vec<Game>> = HashMap::new();
        for game in games {
            games_by_week.entry(game.week).or_default().push(game.clone());
        }

        let mut seasons: BTreeMap<UserId, SeasonScore> = users
            .into_iter()
            .map(|user| {
                let uid: UserId = user.into();
                let season = SeasonScore::empty(&uid, rules);
                (uid, season)
            })
            .collect();
        let mut diagnostics = ScoreDiagnostics::default();
        let mut bonus_counts: HashMap<(UserId, u8), usize> = HashMap::new();

        for pick in picks {
            let team = pick.team.trim();
            if team.is_empty() || !rules.is_valid_week(pick.week) {
                warn!(
                    "skipping malformed pick for user '{}': week={}, team='{}'",
                    pick.user_id, pick.week, pick.team
                );
                diagnostics.skipped_malformed += 1;
                continue;
            }

            let season = seasons
                .entry(pick.user_id.clone())
                .or_insert_with(|| SeasonScore::empty(&pick.user_id, rules));
            let Some(week_score) = season.weeks.get_mut(&pick.week) else {
                continue;
            };

            if week_score.per_team.contains_key(team) {
                warn!(
                    "user '{}' picked '{}' more than once in week {}; counting it once",
                    pick.user_id, team, pick.week
                );
                diagnostics.skipped_duplicate += 1;
                continue;
            }

            if pick.is_bonus {
                let count = bonus_counts
                    .entry((pick.user_id.clone(), pick.week))
                    .or_default();
                *count += 1;
                if *count == 2 {
                    warn!(
                        "user '{}' has more than one bonus pick in week {}",
                        pick.user_id, pick.week
                    );
                }
            }

            let week_games = games_by_week
                .get(&pick.week)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let scored = score_pick(rules, team, pick.is_bonus, week_games);
            match scored.resolution {
                Resolution::NoGame => {
                    info!(
                        "no week {} game found for '{}' (user '{}'); scoring 0",
                        pick.week, team, pick.user_id
                    );
                    diagnostics.unresolved += 1;
                }
                Resolution::Pending => {
                    debug!("week {} game for '{}' not final yet", pick.week, team);
                    diagnostics.pending += 1;
                }
                _ => {}
            }

            week_score.total = week_score.total.saturating_add(scored.points);
            week_score.per_team.insert(team.to_string(), scored);
            diagnostics.picks_scored += 1;
        }

        for season in seasons.values_mut() {
            season.overall = season
                .weeks
                .values()
                .fold(0u32, |acc, w| acc.saturating_add(w.total));
        }
        diagnostics.users = seasons.len();

        ScoreOutcome {
            seasons: seasons.into_values().collect(),
            diagnostics,
        }
    }
}

/// Score with the default league rules.
pub fn score(picks: &[Pick], games: &[Game]) -> Vec<SeasonScore> {
    Scorer::default().score(picks, games).seasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::game::GameStatus;

    fn completed(week: u8, home: &str, away: &str, hs: u32, aws: u32) -> Game {
        Game {
            week,
            home_team: home.into(),
            away_team: away.into(),
            home_score: Some(hs),
            away_score: Some(aws),
            status: GameStatus::Completed,
            weekday: "Sunday".into(),
        }
    }

    fn scheduled(week: u8, home: &str, away: &str) -> Game {
        Game {
            week,
            home_team: home.into(),
            away_team: away.into(),
            home_score: None,
            away_score: None,
            status: GameStatus::Scheduled,
            weekday: "Sunday".into(),
        }
    }

    fn pick(user: &str, week: u8, team: &str, is_bonus: bool) -> Pick {
        Pick {
            user_id: user.into(),
            week,
            team: team.into(),
            is_bonus,
        }
    }

    #[test]
    fn winning_plain_pick_scores_base_points() {
        let games = vec![completed(1, "Chiefs", "Ravens", 27, 20)];
        let p = score_pick(&ScoringRules::default(), "Chiefs", false, &games);
        assert_eq!(p.points, 10);
        assert_eq!(p.resolution, Resolution::Won);
    }

    #[test]
    fn winning_bonus_pick_adds_own_score() {
        let games = vec![completed(1, "Chiefs", "Ravens", 20, 27)];
        let p = score_pick(&ScoringRules::default(), "Ravens", true, &games);
        assert_eq!(p.points, 10 + 27);
        assert!(p.bonus);
    }

    #[test]
    fn losing_pick_scores_zero_bonus_or_not() {
        let games = vec![completed(1, "Chiefs", "Ravens", 27, 20)];
        let rules = ScoringRules::default();
        assert_eq!(score_pick(&rules, "Ravens", false, &games).points, 0);
        let bonus = score_pick(&rules, "Ravens", true, &games);
        assert_eq!(bonus.points, 0);
        assert_eq!(bonus.resolution, Resolution::Lost);
    }

    #[test]
    fn tied_game_scores_zero_for_both_sides() {
        let games = vec![completed(1, "Chiefs", "Ravens", 17, 17)];
        let rules = ScoringRules::default();
        for (team, bonus) in [("Chiefs", true), ("Chiefs", false), ("Ravens", true), ("Ravens", false)] {
            let p = score_pick(&rules, team, bonus, &games);
            assert_eq!(p.points, 0, "{team} bonus={bonus}");
            assert_eq!(p.resolution, Resolution::Tied);
        }
    }

    #[test]
    fn scheduled_or_in_progress_game_scores_zero() {
        let mut live = completed(1, "Bills", "Jets", 14, 3);
        live.status = GameStatus::InProgress;
        let games = vec![scheduled(1, "Chiefs", "Ravens"), live];
        let rules = ScoringRules::default();
        assert_eq!(score_pick(&rules, "Chiefs", true, &games).resolution, Resolution::Pending);
        let p = score_pick(&rules, "Bills", true, &games);
        assert_eq!(p.points, 0);
        assert_eq!(p.resolution, Resolution::Pending);
    }

    #[test]
    fn missing_game_scores_zero() {
        let games = vec![completed(1, "Chiefs", "Ravens", 27, 20)];
        let p = score_pick(&ScoringRules::default(), "Packers", false, &games);
        assert_eq!(p.points, 0);
        assert_eq!(p.resolution, Resolution::NoGame);
    }

    #[test]
    fn custom_base_points() {
        let rules = ScoringRules {
            base_points: 3,
            ..ScoringRules::default()
        };
        let games = vec![completed(1, "Chiefs", "Ravens", 27, 20)];
        assert_eq!(score_pick(&rules, "Chiefs", false, &games).points, 3);
        assert_eq!(score_pick(&rules, "Chiefs", true, &games).points, 30);
    }

    #[test]
    fn chiefs_bonus_and_losing_49ers_week() {
        let games = vec![
            completed(1, "Chiefs", "Ravens", 27, 20),
            completed(1, "49ers", "Rams", 10, 24),
        ];
        let picks = vec![pick("a", 1, "Chiefs", true), pick("a", 1, "49ers", false)];

        let seasons = score(&picks, &games);
        assert_eq!(seasons.len(), 1);
        let week1 = &seasons[0].weeks[&1];
        assert_eq!(week1.per_team["Chiefs"].points, 37);
        assert_eq!(week1.per_team["49ers"].points, 0);
        assert_eq!(week1.total, 37);
        assert_eq!(seasons[0].overall, 37);
    }

    #[test]
    fn every_week_is_present_even_without_picks() {
        let games = vec![completed(1, "Chiefs", "Ravens", 27, 20)];
        let picks = vec![pick("a", 1, "Chiefs", false)];
        let seasons = score(&picks, &games);
        assert_eq!(seasons[0].weeks.len(), 18);
        let week7 = &seasons[0].weeks[&7];
        assert!(week7.per_team.is_empty());
        assert_eq!(week7.total, 0);
    }

    #[test]
    fn users_without_picks_get_a_full_empty_season() {
        let outcome = Scorer::default().score_users(vec!["idle"], &[], &[]);
        assert_eq!(outcome.seasons.len(), 1);
        assert_eq!(outcome.seasons[0].user_id, "idle");
        assert_eq!(outcome.seasons[0].weeks.len(), 18);
        assert_eq!(outcome.seasons[0].overall, 0);
        assert_eq!(outcome.diagnostics.users, 1);
    }

    #[test]
    fn overall_is_sum_of_week_totals() {
        let games = vec![
            completed(1, "Chiefs", "Ravens", 27, 20),
            completed(2, "Bills", "Jets", 31, 10),
            completed(3, "Eagles", "Giants", 3, 0),
        ];
        let picks = vec![
            pick("a", 1, "Chiefs", false),
            pick("a", 2, "Bills", true),
            pick("a", 3, "Eagles", true),
            pick("a", 3, "Giants", false),
        ];
        let seasons = score(&picks, &games);
        let season = &seasons[0];
        let summed: u32 = season.weeks.values().map(|w| w.total).sum();
        assert_eq!(season.overall, summed);
        assert_eq!(season.overall, 10 + 41 + 13);
    }

    #[test]
    fn malformed_picks_are_skipped_and_counted() {
        let games = vec![completed(1, "Chiefs", "Ravens", 27, 20)];
        let picks = vec![
            pick("a", 1, "Chiefs", false),
            pick("a", 0, "Chiefs", false),
            pick("a", 19, "Chiefs", false),
            pick("a", 1, "  ", false),
        ];
        let outcome = Scorer::default().score(&picks, &games);
        assert_eq!(outcome.diagnostics.skipped_malformed, 3);
        assert_eq!(outcome.diagnostics.picks_scored, 1);
        assert_eq!(outcome.seasons[0].overall, 10);
    }

    #[test]
    fn repeated_team_in_week_counts_once() {
        let games = vec![completed(1, "Chiefs", "Ravens", 27, 20)];
        let picks = vec![pick("a", 1, "Chiefs", false), pick("a", 1, "Chiefs", true)];
        let outcome = Scorer::default().score(&picks, &games);
        assert_eq!(outcome.diagnostics.skipped_duplicate, 1);
        assert_eq!(outcome.seasons[0].weeks[&1].total, 10);
    }

    #[test]
    fn unresolved_and_pending_are_counted() {
        let games = vec![scheduled(1, "Chiefs", "Ravens")];
        let picks = vec![pick("a", 1, "Chiefs", false), pick("a", 1, "Packers", false)];
        let outcome = Scorer::default().score(&picks, &games);
        assert_eq!(outcome.diagnostics.pending, 1);
        assert_eq!(outcome.diagnostics.unresolved, 1);
        assert_eq!(outcome.seasons[0].overall, 0);
    }

    #[test]
    fn picks_only_match_games_of_their_own_week() {
        let games = vec![completed(2, "Chiefs", "Ravens", 27, 20)];
        let picks = vec![pick("a", 1, "Chiefs", false)];
        let outcome = Scorer::default().score(&picks, &games);
        assert_eq!(outcome.diagnostics.unresolved, 1);
        assert_eq!(outcome.seasons[0].overall, 0);
    }

    #[test]
    fn mascot_picks_score_under_default_policy_only() {
        let games = vec![completed(1, "San Francisco 49ers", "Los Angeles Rams", 30, 7)];
        let picks = vec![pick("a", 1, "49ers", true)];

        let outcome = Scorer::default().score(&picks, &games);
        assert_eq!(outcome.seasons[0].overall, 40);

        let exact = Scorer::new(ScoringRules {
            team_matching: TeamMatching::Exact,
            ..ScoringRules::default()
        });
        assert_eq!(exact.score(&picks, &games).seasons[0].overall, 0);
    }

    #[test]
    fn duplicate_bonus_across_weeks_still_scores_normally() {
        let games = vec![
            completed(1, "Cowboys", "Giants", 20, 10),
            completed(3, "Eagles", "Cowboys", 14, 21),
        ];
        let picks = vec![pick("b", 1, "Cowboys", true), pick("b", 3, "Cowboys", true)];
        let seasons = score(&picks, &games);
        assert_eq!(seasons[0].weeks[&1].total, 30);
        assert_eq!(seasons[0].weeks[&3].total, 31);
    }

    #[test]
    fn scoring_is_deterministic() {
        let games = vec![completed(1, "Chiefs", "Ravens", 27, 20)];
        let picks = vec![pick("z", 1, "Chiefs", true), pick("a", 1, "Ravens", false)];
        let first = score(&picks, &games);
        let second = score(&picks, &games);
        assert_eq!(first, second);
        assert_eq!(first[0].user_id, "a");
        assert_eq!(first[1].user_id, "z");
    }

    #[test]
    fn huge_scores_saturate_instead_of_overflowing() {
        let games = vec![
            completed(1, "Chiefs", "Ravens", u32::MAX, 0),
            completed(1, "Bills", "Jets", u32::MAX - 5, 1),
            completed(2, "Chiefs", "Bills", u32::MAX, 3),
        ];
        let picks = vec![
            pick("a", 1, "Chiefs", true),
            pick("a", 1, "Bills", false),
            pick("a", 2, "Chiefs", true),
        ];

        let p = score_pick(&ScoringRules::default(), "Chiefs", true, &games[..1]);
        assert_eq!(p.points, u32::MAX);

        let seasons = score(&picks, &games);
        assert_eq!(seasons[0].week_total(1), u32::MAX);
        assert_eq!(seasons[0].week_total(2), u32::MAX);
        assert_eq!(seasons[0].overall, u32::MAX);
    }
}
