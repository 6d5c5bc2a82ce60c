// Configuration loading and parsing (league.toml, storage.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::artifact::DaylightSaving;
use crate::scoring::team::TeamMatching;
use crate::scoring::{
    ScoringRules, DEFAULT_BASE_POINTS, DEFAULT_PICKS_PER_WEEK, DEFAULT_SEASON_WEEKS,
};

/// Upper bound on `season_weeks`; week keys are stored as `u8`.
pub const MAX_SEASON_WEEKS: u8 = 52;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub feeds: FeedPaths,
    pub output: OutputPaths,
    /// Resolved SQLite path. Never empty.
    pub db_path: String,
    pub watch: WatchConfig,
}

impl Config {
    pub fn rules(&self) -> ScoringRules {
        self.league.rules()
    }
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
    #[serde(default = "default_season_weeks")]
    pub season_weeks: u8,
    #[serde(default = "default_picks_per_week")]
    pub picks_per_week: usize,
    #[serde(default = "default_base_points")]
    pub base_points: u32,
    #[serde(default)]
    pub team_matching: TeamMatching,
    /// Suffix printed after the last-updated timestamp.
    #[serde(default = "default_timezone_label")]
    pub timezone_label: String,
    /// Standard-time offset used for the last-updated timestamp.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default)]
    pub daylight_saving: DaylightSaving,
}

impl LeagueConfig {
    pub fn rules(&self) -> ScoringRules {
        ScoringRules {
            season_weeks: self.season_weeks,
            picks_per_week: self.picks_per_week,
            base_points: self.base_points,
            team_matching: self.team_matching,
        }
    }
}

fn default_season_weeks() -> u8 {
    DEFAULT_SEASON_WEEKS
}

fn default_picks_per_week() -> usize {
    DEFAULT_PICKS_PER_WEEK
}

fn default_base_points() -> u32 {
    DEFAULT_BASE_POINTS
}

fn default_timezone_label() -> String {
    "CST".into()
}

fn default_utc_offset_hours() -> i32 {
    -6
}

// ---------------------------------------------------------------------------
// storage.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct StorageFile {
    feeds: FeedPaths,
    output: OutputPaths,
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    watch: WatchConfig,
}

/// Input feed locations.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedPaths {
    pub games: PathBuf,
    pub picks: PathBuf,
}

/// Output artifact locations.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputPaths {
    pub scores: PathBuf,
    pub last_updated: PathBuf,
    #[serde(default)]
    pub leaderboard_csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DatabaseSection {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    900
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// `config/storage.toml`, relative to the given `base_dir`.
///
/// Does not copy defaults; `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    // --- storage.toml (required) ---
    let storage_path = config_dir.join("storage.toml");
    let storage_text = read_file(&storage_path)?;
    let storage_file: StorageFile =
        toml::from_str(&storage_text).map_err(|e| ConfigError::ParseError {
            path: storage_path.clone(),
            source: e,
        })?;

    let config = Config {
        league: league_file.league,
        feeds: storage_file.feeds,
        output: storage_file.output,
        db_path: resolve_db_path(&storage_file.database.path)?,
        watch: storage_file.watch,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            // Never overwrite a user's edited file.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying any
/// missing files from `defaults/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// An empty `[database] path` means "the platform data directory".
fn resolve_db_path(configured: &str) -> Result<String, ConfigError> {
    let trimmed = configured.trim();
    if !trimmed.is_empty() {
        return Ok(trimmed.to_string());
    }
    let dirs = directories::ProjectDirs::from("", "", "pickem").ok_or_else(|| {
        ConfigError::ValidationError {
            field: "database.path".into(),
            message: "empty and no home directory available for a default".into(),
        }
    })?;
    Ok(dirs.data_dir().join("pickem.db").display().to_string())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let league = &config.league;

    if league.season_weeks == 0 || league.season_weeks > MAX_SEASON_WEEKS {
        return Err(ConfigError::ValidationError {
            field: "league.season_weeks".into(),
            message: format!(
                "must be between 1 and {MAX_SEASON_WEEKS}, got {}",
                league.season_weeks
            ),
        });
    }

    if league.picks_per_week == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.picks_per_week".into(),
            message: "must be greater than 0".into(),
        });
    }

    if league.base_points == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.base_points".into(),
            message: "must be greater than 0".into(),
        });
    }

    if !(-14..=14).contains(&league.utc_offset_hours) {
        return Err(ConfigError::ValidationError {
            field: "league.utc_offset_hours".into(),
            message: format!("must be between -14 and 14, got {}", league.utc_offset_hours),
        });
    }

    if config.watch.interval_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "watch.interval_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    /// Helper: returns the path to the pickem-core crate root
    /// (works whether `cargo test` runs from the crate root or repo root).
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("crates/pickem-core/defaults").exists() {
            cwd.join("crates/pickem-core")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Helper: fresh temp dir with both default files in config/.
    fn config_dir_with_defaults(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        let config_dir = tmp.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        let root = project_root();
        fs::copy(root.join("defaults/league.toml"), config_dir.join("league.toml")).unwrap();
        fs::copy(root.join("defaults/storage.toml"), config_dir.join("storage.toml")).unwrap();
        tmp
    }

    fn write_league(tmp: &Path, body: &str) {
        fs::write(tmp.join("config/league.toml"), body).unwrap();
    }

    #[test]
    fn load_valid_config_from_default_files() {
        let tmp = config_dir_with_defaults("pickem_config_valid");
        let config = load_config_from(&tmp).expect("should load valid config");

        assert_eq!(config.league.name, "Sunday Pick 'Em");
        assert_eq!(config.league.season_weeks, 18);
        assert_eq!(config.league.picks_per_week, 5);
        assert_eq!(config.league.base_points, 10);
        assert_eq!(config.league.team_matching, TeamMatching::ExactOrMascot);
        assert_eq!(config.league.timezone_label, "CST");
        assert_eq!(config.league.utc_offset_hours, -6);
        assert_eq!(config.league.daylight_saving, DaylightSaving::UnitedStates);

        assert_eq!(config.feeds.games, PathBuf::from("data/game/games.json"));
        assert_eq!(config.feeds.picks, PathBuf::from("data/player/picks.json"));
        assert_eq!(config.output.scores, PathBuf::from("data/player/scores.json"));
        assert!(config.output.leaderboard_csv.is_none());
        assert_eq!(config.db_path, "pickem.db");
        assert_eq!(config.watch.interval_secs, 900);

        assert_eq!(config.rules(), ScoringRules::default());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn league_fields_fall_back_to_defaults() {
        let tmp = config_dir_with_defaults("pickem_config_minimal_league");
        write_league(
            &tmp,
            "[league]\nname = \"Office Pool\"\nteam_matching = \"exact\"\ndaylight_saving = \"none\"\n",
        );

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.league.season_weeks, 18);
        assert_eq!(config.league.base_points, 10);
        assert_eq!(config.league.team_matching, TeamMatching::Exact);
        assert_eq!(config.league.timezone_label, "CST");
        assert_eq!(config.league.daylight_saving, DaylightSaving::None);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_db_path_resolves_to_data_dir() {
        // HOME may be unset in a sandbox, in which case there is no default.
        match resolve_db_path("  ") {
            Ok(path) => assert!(path.ends_with("pickem.db")),
            Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, "database.path"),
            Err(other) => panic!("unexpected error: {other}"),
        }
        assert_eq!(resolve_db_path("custom.db").unwrap(), "custom.db");
    }

    #[test]
    fn rejects_zero_season_weeks() {
        let tmp = config_dir_with_defaults("pickem_config_zero_weeks");
        write_league(&tmp, "[league]\nname = \"x\"\nseason_weeks = 0\n");

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "league.season_weeks");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_too_many_season_weeks() {
        let tmp = config_dir_with_defaults("pickem_config_many_weeks");
        write_league(&tmp, "[league]\nname = \"x\"\nseason_weeks = 53\n");

        let err = load_config_from(&tmp).unwrap_err();
        assert!(err.to_string().contains("league.season_weeks"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_picks_and_base_points() {
        let tmp = config_dir_with_defaults("pickem_config_zero_picks");

        write_league(&tmp, "[league]\nname = \"x\"\npicks_per_week = 0\n");
        let err = load_config_from(&tmp).unwrap_err();
        assert!(err.to_string().contains("league.picks_per_week"));

        write_league(&tmp, "[league]\nname = \"x\"\nbase_points = 0\n");
        let err = load_config_from(&tmp).unwrap_err();
        assert!(err.to_string().contains("league.base_points"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_out_of_range_offset() {
        let tmp = config_dir_with_defaults("pickem_config_offset");
        write_league(&tmp, "[league]\nname = \"x\"\nutc_offset_hours = 15\n");

        let err = load_config_from(&tmp).unwrap_err();
        assert!(err.to_string().contains("league.utc_offset_hours"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_watch_interval() {
        let tmp = config_dir_with_defaults("pickem_config_zero_interval");
        fs::write(
            tmp.join("config/storage.toml"),
            "[feeds]\ngames = \"g.json\"\npicks = \"p.json\"\n\
             [output]\nscores = \"s.json\"\nlast_updated = \"l.json\"\n\
             [database]\npath = \"x.db\"\n[watch]\ninterval_secs = 0\n",
        )
        .unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(err.to_string().contains("watch.interval_secs"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unknown_team_matching() {
        let tmp = config_dir_with_defaults("pickem_config_bad_matching");
        write_league(&tmp, "[league]\nname = \"x\"\nteam_matching = \"substring\"\n");

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_storage_toml() {
        let tmp = config_dir_with_defaults("pickem_config_missing_storage");
        fs::remove_file(tmp.join("config/storage.toml")).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::FileNotFound { path } => {
                assert!(path.ends_with("storage.toml"));
            }
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = config_dir_with_defaults("pickem_config_invalid_toml");
        write_league(&tmp, "this is not valid [[[ toml");

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ParseError { path, .. } => {
                assert!(path.ends_with("league.toml"));
            }
            other => panic!("expected ParseError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_and_skips_existing() {
        let tmp = std::env::temp_dir().join("pickem_config_ensure");
        let _ = fs::remove_dir_all(&tmp);

        let defaults_dir = tmp.join("defaults");
        let config_dir = tmp.join("config");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::create_dir_all(&config_dir).unwrap();

        let root = project_root();
        fs::copy(root.join("defaults/league.toml"), defaults_dir.join("league.toml")).unwrap();
        fs::copy(root.join("defaults/storage.toml"), defaults_dir.join("storage.toml")).unwrap();
        fs::write(defaults_dir.join("storage.toml.example"), "# sample\n").unwrap();
        fs::write(config_dir.join("league.toml"), "# custom\n").unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(copied[0].ends_with("storage.toml"));
        assert!(!config_dir.join("storage.toml.example").exists());

        let content = fs::read_to_string(config_dir.join("league.toml")).unwrap();
        assert_eq!(content, "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("pickem_config_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = ensure_config_files(&tmp).unwrap_err();
        match &err {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("neither defaults/ nor config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }
}
