// Feed-level scoring run: picks feed + results feed -> scores artifact.

use tracing::info;

use super::{ScoreDiagnostics, Scorer, SeasonScore};
use crate::artifact::ScoresArtifact;
use crate::feed::PicksFeed;
use crate::model::game::{Game, WeekSchedule};

/// Everything one scoring run produced.
#[derive(Debug, Clone)]
pub struct ScoreRun {
    pub seasons: Vec<SeasonScore>,
    pub artifact: ScoresArtifact,
    pub diagnostics: ScoreDiagnostics,
}

impl Scorer {
    /// Score an entire picks feed against a season schedule. Every user in
    /// the feed appears in the output, with every season week.
    pub fn score_feed(&self, feed: &PicksFeed, schedule: &[WeekSchedule]) -> ScoreRun {
        let flattened = feed.flatten(self.rules());
        let games: Vec<Game> = schedule.iter().flat_map(|w| w.games.iter().cloned()).collect();

        let outcome = self.score_users(feed.user_ids().cloned(), &flattened.picks, &games);
        let mut diagnostics = outcome.diagnostics;
        diagnostics.skipped_malformed += flattened.skipped_malformed;

        let artifact =
            ScoresArtifact::from_seasons(&outcome.seasons, |uid| feed.display_name(uid).to_string());

        info!(
            "Scored {} picks for {} users ({} malformed, {} duplicate, {} unresolved, {} pending)",
            diagnostics.picks_scored,
            diagnostics.users,
            diagnostics.skipped_malformed,
            diagnostics.skipped_duplicate,
            diagnostics.unresolved,
            diagnostics.pending
        );

        ScoreRun {
            seasons: outcome.seasons,
            artifact,
            diagnostics,
        }
    }
}
