use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(author, version, about = "prediction scoring and accuracy aggregation")]
pub struct Cli {
    /// Command
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
#[clap(rename_all = "lower_case")]
pub enum Command {
    /// Create an empty document database
    Init,
    /// Seed the database from a JSON fixture
    Import {
        /// Fixture file with users, teams, tournaments, matches and predictions
        file: PathBuf,
    },
    /// Score a finished match and update every participant and team
    Finish {
        #[arg(short, long)]
        tournament: i64,
        #[arg(short = 'm', long = "match")]
        match_id: i64,
        /// Write team activities to the log instead of storing them
        #[arg(long)]
        log_activities: bool,
    },
    /// Show a user's score progression per tournament
    Scores {
        #[arg(short, long)]
        user: i64,
        /// Number of most recent values to show (defaults to config)
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show a team's accuracy progression per tournament
    Accuracy {
        #[arg(short, long)]
        team: i64,
        /// Show the full progression of one tournament only
        #[arg(long)]
        tournament: Option<i64>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Rank the users and teams of a tournament
    Leaderboard {
        #[arg(short, long)]
        tournament: i64,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_finish() {
        let cli = Cli::try_parse_from(["prediction_scoring", "finish", "--tournament", "1", "--match", "10"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Finish {
                tournament: 1,
                match_id: 10,
                log_activities: false,
            }
        );
    }

    #[test]
    fn test_parse_finish_with_log_activities() {
        let cli = Cli::try_parse_from(["prediction_scoring", "finish", "-t", "1", "-m", "10", "--log-activities"]).unwrap();
        assert!(matches!(cli.command, Command::Finish { log_activities: true, .. }));
    }

    #[test]
    fn test_parse_scores_without_limit() {
        let cli = Cli::try_parse_from(["prediction_scoring", "scores", "-u", "3"]).unwrap();
        assert_eq!(cli.command, Command::Scores { user: 3, limit: None });
    }

    #[test]
    fn test_finish_requires_match() {
        assert!(Cli::try_parse_from(["prediction_scoring", "finish", "--tournament", "1"]).is_err());
    }
}
