// Command-line parsing for the `pickem` binary.
//
// Flags accept both `--name value` and `--name=value`.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

pub const USAGE: &str = "\
usage: pickem <command> [options]

commands:
  score                                   score all picks, write scores + last-updated
  leaderboard [--week N] [--csv PATH]     print the overall or weekly leaderboard
  check [--user UID]                      report incomplete weeks and duplicate bonus teams
  pick --user UID [--name NAME] --week N --team TEAM [--bonus]
                                          toggle a team (and optionally make it the bonus)
  submit --user UID                       submit a complete season of picks
  export-picks [--out PATH]               write the picks feed from the local store
  watch [--interval SECS]                 re-score on an interval until Ctrl+C
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Score,
    Leaderboard {
        week: Option<u8>,
        csv: Option<PathBuf>,
    },
    Check {
        user: Option<String>,
    },
    Pick {
        user: String,
        name: Option<String>,
        week: u8,
        team: String,
        bonus: bool,
    },
    Submit {
        user: String,
    },
    ExportPicks {
        out: Option<PathBuf>,
    },
    Watch {
        interval_secs: Option<u64>,
    },
    Help,
}

impl Command {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: &[String]) -> Result<Command> {
        let Some((command, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };

        let parsed = match command.as_str() {
            "score" => Command::Score,
            "leaderboard" => Command::Leaderboard {
                week: parse_number_arg(rest, "--week")?,
                csv: parse_string_arg(rest, "--csv").map(PathBuf::from),
            },
            "check" => Command::Check {
                user: parse_string_arg(rest, "--user"),
            },
            "pick" => Command::Pick {
                user: required(rest, "--user")?,
                name: parse_string_arg(rest, "--name"),
                week: parse_number_arg(rest, "--week")?
                    .ok_or_else(|| anyhow!("missing required --week"))?,
                team: required(rest, "--team")?,
                bonus: has_flag(rest, "--bonus"),
            },
            "submit" => Command::Submit {
                user: required(rest, "--user")?,
            },
            "export-picks" => Command::ExportPicks {
                out: parse_string_arg(rest, "--out").map(PathBuf::from),
            },
            "watch" => Command::Watch {
                interval_secs: parse_number_arg(rest, "--interval")?,
            },
            "help" | "-h" | "--help" => Command::Help,
            other => bail!("unknown command '{other}'\n\n{USAGE}"),
        };
        Ok(parsed)
    }
}

fn parse_string_arg(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() && !next.starts_with("--") {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn parse_number_arg<T>(args: &[String], name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_string_arg(args, name)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("invalid value for {name}: '{raw}'"))
        })
        .transpose()
}

fn required(args: &[String], name: &str) -> Result<String> {
    parse_string_arg(args, name).ok_or_else(|| anyhow!("missing required {name}"))
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_args_is_help() {
        assert_eq!(Command::parse(&[]).unwrap(), Command::Help);
    }

    #[test]
    fn leaderboard_with_week_and_csv() {
        let cmd = Command::parse(&args(&["leaderboard", "--week=3", "--csv", "out.csv"])).unwrap();
        assert_eq!(
            cmd,
            Command::Leaderboard {
                week: Some(3),
                csv: Some(PathBuf::from("out.csv")),
            }
        );
    }

    #[test]
    fn pick_parses_all_fields() {
        let cmd = Command::parse(&args(&[
            "pick", "--user", "uid-1", "--week", "4", "--team", "San Francisco 49ers", "--bonus",
        ]))
        .unwrap();
        assert_eq!(
            cmd,
            Command::Pick {
                user: "uid-1".into(),
                name: None,
                week: 4,
                team: "San Francisco 49ers".into(),
                bonus: true,
            }
        );
    }

    #[test]
    fn pick_requires_team_and_week() {
        let err = Command::parse(&args(&["pick", "--user", "u", "--week", "2"])).unwrap_err();
        assert!(err.to_string().contains("--team"));

        let err = Command::parse(&args(&["pick", "--user", "u", "--team", "Bills"])).unwrap_err();
        assert!(err.to_string().contains("--week"));
    }

    #[test]
    fn flag_value_is_not_taken_from_next_flag() {
        let err = Command::parse(&args(&["submit", "--user", "--bonus"])).unwrap_err();
        assert!(err.to_string().contains("--user"));
    }

    #[test]
    fn invalid_number_is_an_error() {
        let err = Command::parse(&args(&["watch", "--interval", "soon"])).unwrap_err();
        assert!(err.to_string().contains("--interval"));

        let err = Command::parse(&args(&["leaderboard", "--week", "300"])).unwrap_err();
        assert!(err.to_string().contains("--week"));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = Command::parse(&args(&["publish"])).unwrap_err();
        assert!(err.to_string().contains("unknown command 'publish'"));
    }
}
