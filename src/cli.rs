//! Command-line interface definitions.
//!
//! Every option can also be supplied through an environment variable, and
//! overrides the corresponding value from the YAML configuration file.

use crate::config::Settings;
use crate::store::DedupScope;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the mention watcher.
///
/// # Examples
///
/// ```sh
/// # Run the scheduler with a config file
/// mention_watch --config ./config.yaml run
///
/// # One scheduled cycle, printed as JSON
/// mention_watch --config ./config.yaml once
///
/// # On-demand poll for one owner
/// mention_watch --config ./config.yaml poll acme
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long, env = "MENTION_WATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON-lines file for stored mentions (in-memory when absent)
    #[arg(long, env = "MENTION_WATCH_STORE")]
    pub store_path: Option<PathBuf>,

    /// Cycle cadence: `30s`, `10m`, `1h` or `*/N * * * *`
    #[arg(long, env = "MENTION_WATCH_INTERVAL")]
    pub interval: Option<String>,

    /// Disable the timer-driven scheduler
    #[arg(long, env = "MENTION_WATCH_NO_SCHEDULE")]
    pub no_schedule: bool,

    /// Remote sentiment classifier endpoint
    #[arg(long, env = "CLASSIFIER_URL")]
    pub classifier_url: Option<String>,

    /// Bearer token for the remote classifier
    #[arg(long, env = "CLASSIFIER_API_TOKEN", hide_env_values = true)]
    pub classifier_token: Option<String>,

    /// GitHub token for the repository search adapter
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Uniqueness scope for stored mentions
    #[arg(long, value_enum, env = "MENTION_WATCH_DEDUP_SCOPE")]
    pub dedup_scope: Option<DedupScope>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run scheduled cycles until interrupted (default)
    Run {
        /// Print each newly stored mention as a JSON line
        #[arg(long)]
        follow: bool,
    },
    /// Run one scheduled cycle and print its result
    Once,
    /// Run one manual cycle for a single owner and print its result
    Poll {
        /// Owner id from the keyword directory
        owner: String,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run { follow: false })
    }

    /// Apply flag values on top of file settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.store_path {
            settings.store.path = Some(path.clone());
        }
        if let Some(interval) = &self.interval {
            settings.schedule.interval = interval.clone();
        }
        if self.no_schedule {
            settings.schedule.enabled = false;
        }
        if let Some(url) = &self.classifier_url {
            settings.classifier.url = Some(url.clone());
        }
        if let Some(token) = &self.classifier_token {
            settings.classifier.token = Some(token.clone());
        }
        if let Some(token) = &self.github_token {
            settings.sources.github_token = Some(token.clone());
        }
        if let Some(scope) = self.dedup_scope {
            settings.dedup_scope = scope;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::parse_from(["mention_watch"]);
        assert_eq!(cli.command(), Command::Run { follow: false });
    }

    #[test]
    fn test_poll_subcommand() {
        let cli = Cli::parse_from(["mention_watch", "-c", "/tmp/c.yaml", "poll", "acme"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.yaml")));
        assert_eq!(
            cli.command(),
            Command::Poll {
                owner: "acme".to_string()
            }
        );
    }

    #[test]
    fn test_run_follow() {
        let cli = Cli::parse_from(["mention_watch", "run", "--follow"]);
        assert_eq!(cli.command(), Command::Run { follow: true });
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::parse_from([
            "mention_watch",
            "--store-path",
            "/tmp/m.jsonl",
            "--interval",
            "*/5 * * * *",
            "--no-schedule",
            "--classifier-url",
            "http://localhost:9000",
            "--dedup-scope",
            "global",
            "once",
        ]);
        let mut settings = Settings::default();
        cli.apply(&mut settings);

        assert_eq!(settings.store.path, Some(PathBuf::from("/tmp/m.jsonl")));
        assert_eq!(settings.schedule.interval, "*/5 * * * *");
        assert!(!settings.schedule.enabled);
        assert_eq!(settings.classifier.url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(settings.dedup_scope, DedupScope::Global);
        assert_eq!(cli.command(), Command::Once);
    }

    #[test]
    fn test_rejects_unknown_scope() {
        assert!(Cli::try_parse_from(["mention_watch", "--dedup-scope", "sometimes"]).is_err());
    }
}
