use anyhow::Result;

use prediction_scoring::cli::Command;
use prediction_scoring::{
    handle_accuracy, handle_completions, handle_finish, handle_import, handle_init, handle_leaderboard,
    handle_scores, interpret,
};

fn main() {
    setup_logging();
    parse_and_execute().unwrap_or_else(|e| {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    });
}

fn setup_logging() {
    sensible_env_logger::init!();
}

fn parse_and_execute() -> Result<()> {
    let command = interpret();
    execute_command(&command)
}

fn execute_command(command: &Command) -> Result<()> {
    match command {
        Command::Init => handle_init(),
        Command::Import { file } => handle_import(file),
        Command::Finish {
            tournament,
            match_id,
            log_activities,
        } => handle_finish(*tournament, *match_id, *log_activities),
        Command::Scores { user, limit } => handle_scores(*user, *limit),
        Command::Accuracy {
            team,
            tournament,
            limit,
        } => handle_accuracy(*team, *tournament, *limit),
        Command::Leaderboard { tournament, limit } => handle_leaderboard(*tournament, *limit),
        Command::Completions { shell } => handle_completions(*shell),
    }
}
