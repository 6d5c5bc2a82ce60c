// Pick 'em command-line entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr; stdout carries tables and reports)
// 2. Parse the command
// 3. Load config (copying defaults on first run)
// 4. Open the pick store
// 5. Dispatch

mod cli;
mod commands;
mod watch;

use std::time::Duration;

use anyhow::Context;
use tracing::info;

use cli::Command;
use commands::{Ctx, PickRequest};
use pickem_core::{config, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if command == Command::Help {
        print!("{}", cli::USAGE);
        return Ok(());
    }

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, {} weeks, {} picks per week",
        config.league.name, config.league.season_weeks, config.league.picks_per_week
    );

    if let Some(parent) = std::path::Path::new(&config.db_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = db::Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    let ctx = Ctx {
        config: &config,
        db: &db,
    };

    match command {
        Command::Score => {
            let run = commands::score(&ctx)?;
            let d = &run.diagnostics;
            println!(
                "Scored {} picks for {} users ({} skipped, {} pending, {} without a game)",
                d.picks_scored,
                d.users,
                d.skipped_malformed + d.skipped_duplicate,
                d.pending,
                d.unresolved
            );
        }
        Command::Leaderboard { week, csv } => {
            commands::leaderboard(&ctx, week, csv.as_deref())?;
        }
        Command::Check { user } => {
            if !commands::check(&ctx, user.as_deref())? {
                anyhow::bail!("some pick sheets are not ready to submit");
            }
        }
        Command::Pick {
            user,
            name,
            week,
            team,
            bonus,
        } => {
            let status = commands::pick(
                &ctx,
                &PickRequest {
                    user: &user,
                    name: name.as_deref(),
                    week,
                    team: &team,
                    bonus,
                },
            )?;
            let teams: Vec<&str> = status.picks.iter().map(|p| p.team.as_str()).collect();
            println!(
                "Week {week}: {} ({}/{}), bonus: {}",
                teams.join(", "),
                teams.len(),
                config.league.picks_per_week,
                status.bonus.as_deref().unwrap_or("none")
            );
        }
        Command::Submit { user } => {
            let weeks = commands::submit(&ctx, &user)?;
            println!("Submitted {weeks} weeks for {user}");
        }
        Command::ExportPicks { out } => {
            let users = commands::export_picks(&ctx, out)?;
            println!("Exported picks for {users} submitted users");
        }
        Command::Watch { interval_secs } => {
            let secs = interval_secs.unwrap_or(config.watch.interval_secs).max(1);
            info!("Watching: re-scoring every {}s (Ctrl+C to stop)", secs);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                }
            };
            let runs = watch::run_every(Duration::from_secs(secs), shutdown, || {
                commands::score(&ctx).map(|_| ())
            })
            .await;
            info!("Watch stopped after {} runs", runs);
        }
        Command::Help => print!("{}", cli::USAGE),
    }

    Ok(())
}

/// Initialize tracing to stderr so stdout stays clean for command output.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pickem=info,pickem_core=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
