// Command implementations. Each takes the loaded config and open store.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use pickem_core::artifact::{self, LastUpdated};
use pickem_core::config::Config;
use pickem_core::db::Database;
use pickem_core::feed::{self, PicksFeed};
use pickem_core::integrity::{completion_report, CompletionReport};
use pickem_core::leaderboard::{self, flag_duplicate_bonus, LeaderboardRow, Scope};
use pickem_core::model::game::{games_for_week, matchup_key};
use pickem_core::model::pick::WeekStatus;
use pickem_core::scoring::run::ScoreRun;
use pickem_core::scoring::Scorer;
use pickem_core::session::{PickSession, PickStore, SessionError, Toggle};

/// `app_state` key holding the most recent run's diagnostics.
pub const LAST_RUN_KEY: &str = "last_score_run";

pub struct Ctx<'a> {
    pub config: &'a Config,
    pub db: &'a Database,
}

// ---------------------------------------------------------------------------
// score
// ---------------------------------------------------------------------------

/// One complete scoring run: read both feeds, regenerate the artifact and
/// marker, and record diagnostics.
pub fn score(ctx: &Ctx<'_>) -> Result<ScoreRun> {
    let config = ctx.config;
    let schedule = feed::load_games(&config.feeds.games).context("failed to load games feed")?;
    let picks = feed::load_picks(&config.feeds.picks).context("failed to load picks feed")?;

    let run = Scorer::new(config.rules()).score_feed(&picks, &schedule);

    artifact::write_json(&config.output.scores, &run.artifact)
        .context("failed to write scores artifact")?;
    let marker = LastUpdated::at(
        Utc::now(),
        config.league.utc_offset_hours,
        config.league.daylight_saving,
        &config.league.timezone_label,
    );
    artifact::write_json(&config.output.last_updated, &marker)
        .context("failed to write last-updated marker")?;
    info!(
        "Wrote {} ({})",
        config.output.scores.display(),
        marker.last_updated
    );

    if let Some(csv_path) = &config.output.leaderboard_csv {
        let mut rows = leaderboard::leaderboard(&run.artifact, Scope::Overall);
        flag_duplicate_bonus(&mut rows, &picks, &config.rules());
        write_csv_file(&rows, csv_path)?;
    }

    let diagnostics =
        serde_json::to_value(&run.diagnostics).context("failed to serialize diagnostics")?;
    ctx.db.save_state(LAST_RUN_KEY, &diagnostics)?;

    Ok(run)
}

// ---------------------------------------------------------------------------
// leaderboard
// ---------------------------------------------------------------------------

pub fn leaderboard(ctx: &Ctx<'_>, week: Option<u8>, csv: Option<&Path>) -> Result<()> {
    let config = ctx.config;
    let rules = config.rules();
    let scope = match week {
        Some(w) if !rules.is_valid_week(w) => {
            bail!("week {w} is outside the season (1..={})", rules.season_weeks)
        }
        Some(w) => Scope::Week(w),
        None => Scope::Overall,
    };

    let scores = artifact::read_scores(&config.output.scores)
        .context("failed to read scores artifact; run `pickem score` first")?;
    let mut rows = leaderboard::leaderboard(&scores, scope);

    match feed::load_picks(&config.feeds.picks) {
        Ok(picks) => flag_duplicate_bonus(&mut rows, &picks, &rules),
        Err(e) => warn!("Duplicate-bonus flags unavailable: {}", e),
    }

    match csv {
        Some(path) => write_csv_file(&rows, path)?,
        None => print_leaderboard(&mut io::stdout().lock(), &rows, scope)?,
    }
    Ok(())
}

fn write_csv_file(rows: &[LeaderboardRow], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    leaderboard::write_csv(rows, file)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote leaderboard CSV to {}", path.display());
    Ok(())
}

pub fn print_leaderboard<W: Write>(out: &mut W, rows: &[LeaderboardRow], scope: Scope) -> io::Result<()> {
    match scope {
        Scope::Overall => writeln!(out, "Overall standings")?,
        Scope::Week(w) => writeln!(out, "Week {w} standings")?,
    }
    for row in rows {
        write!(out, "{:>4}  {:<24} {:>6}", row.rank, row.name, row.score)?;
        if !row.flagged_weeks.is_empty() {
            let weeks: Vec<String> = row.flagged_weeks.iter().map(u8::to_string).collect();
            write!(out, "  duplicate bonus: weeks {}", weeks.join(", "))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

/// Print the completion report for one user, or every user in the picks
/// feed. Returns true when everyone checked is submittable.
pub fn check(ctx: &Ctx<'_>, user: Option<&str>) -> Result<bool> {
    let rules = ctx.config.rules();
    let mut out = io::stdout().lock();

    let reports: Vec<(String, CompletionReport)> = match user {
        Some(uid) => {
            let picks = load_picks_or_empty(&ctx.config.feeds.picks);
            let weeks = if picks.users.contains_key(uid) {
                picks.week_statuses(uid, &rules)
            } else {
                ctx.db.load_weeks(uid)?
            };
            vec![(uid.to_string(), completion_report(&weeks, &rules))]
        }
        None => {
            let picks = feed::load_picks(&ctx.config.feeds.picks)
                .context("failed to load picks feed")?;
            picks
                .user_ids()
                .map(|uid| {
                    let weeks = picks.week_statuses(uid, &rules);
                    (uid.clone(), completion_report(&weeks, &rules))
                })
                .collect()
        }
    };

    let mut all_ok = true;
    for (uid, report) in &reports {
        all_ok &= report.is_submittable();
        print_report(&mut out, uid, report)?;
    }
    Ok(all_ok)
}

fn load_picks_or_empty(path: &Path) -> PicksFeed {
    feed::load_picks(path).unwrap_or_else(|e| {
        warn!("Picks feed unavailable, using local store only: {}", e);
        PicksFeed::default()
    })
}

pub fn print_report<W: Write>(out: &mut W, user_id: &str, report: &CompletionReport) -> io::Result<()> {
    if report.is_submittable() {
        return writeln!(out, "{user_id}: ready to submit");
    }
    writeln!(out, "{user_id}: not ready")?;
    if !report.incomplete_weeks.is_empty() {
        let weeks: Vec<String> = report.incomplete_weeks.iter().map(u8::to_string).collect();
        writeln!(out, "  incomplete weeks: {}", weeks.join(", "))?;
    }
    for team in &report.duplicate_bonus_teams {
        writeln!(out, "  bonus team used more than once: {team}")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// pick / submit
// ---------------------------------------------------------------------------

pub struct PickRequest<'a> {
    pub user: &'a str,
    pub name: Option<&'a str>,
    pub week: u8,
    pub team: &'a str,
    pub bonus: bool,
}

/// Toggle one team on a user's sheet and save the change.
pub fn pick(ctx: &Ctx<'_>, req: &PickRequest<'_>) -> Result<WeekStatus> {
    let config = ctx.config;
    let rules = config.rules();

    let schedule = feed::load_games(&config.feeds.games).context("failed to load games feed")?;
    let games = games_for_week(&schedule, req.week);
    let Some(found) = rules.team_matching.locate(req.team, games) else {
        bail!("no week {} game found for '{}'", req.week, req.team);
    };
    // Store the schedule's spelling so picks resolve under either matching policy.
    let team = found.game.team(found.side).to_string();
    let matchup = matchup_key(req.week, found.index);

    let display_name = resolve_name(ctx.db, req.user, req.name)?;
    ctx.db.upsert_user(req.user, &display_name)?;

    let mut session = PickSession::load(ctx.db, req.user, &display_name, rules)?;
    let already_picked = session.week(req.week).is_some_and(|w| w.contains_team(&team));
    if req.bonus && already_picked {
        // --bonus on an existing pick only moves the bonus.
        session.set_bonus(req.week, &team)?;
        info!("Made {} the week {} bonus pick", team, req.week);
    } else {
        match session.toggle_team(req.week, &team, &matchup)? {
            Toggle::Added => info!("Picked {} for week {}", team, req.week),
            Toggle::Removed => info!("Removed {} from week {}", team, req.week),
            Toggle::Replaced { previous } => {
                info!("Picked {} over {} for week {}", team, previous, req.week)
            }
        }
        if req.bonus {
            session.set_bonus(req.week, &team)?;
        }
    }
    session.persist(ctx.db)?;

    Ok(session.week(req.week).cloned().unwrap_or_default())
}

fn resolve_name(db: &Database, user: &str, name: Option<&str>) -> Result<String> {
    if let Some(name) = name {
        return Ok(name.to_string());
    }
    Ok(db
        .display_name(user)?
        .unwrap_or_else(|| feed::UNKNOWN_NAME.to_string()))
}

/// Run the completion gate and submit. A gate failure prints the report
/// and returns an error.
pub fn submit(ctx: &Ctx<'_>, user: &str) -> Result<usize> {
    let display_name = resolve_name(ctx.db, user, None)?;
    let mut session = PickSession::load(ctx.db, user, &display_name, ctx.config.rules())?;
    match session.submit(ctx.db) {
        Ok(weeks) => Ok(weeks),
        Err(SessionError::NotSubmittable(report)) => {
            print_report(&mut io::stdout().lock(), user, &report)?;
            bail!("picks for '{user}' are not ready to submit")
        }
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// export-picks
// ---------------------------------------------------------------------------

/// Write the picks feed for all submitted users. Defaults to the feed path
/// the scorer reads.
pub fn export_picks(ctx: &Ctx<'_>, out: Option<PathBuf>) -> Result<usize> {
    let feed = ctx.db.export_picks_feed(&ctx.config.rules())?;
    let path = out.unwrap_or_else(|| ctx.config.feeds.picks.clone());
    artifact::write_json(&path, &feed).context("failed to write picks feed")?;
    info!("Exported {} users to {}", feed.users.len(), path.display());
    Ok(feed.users.len())
}
