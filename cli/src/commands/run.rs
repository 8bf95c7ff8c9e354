use std::process::ExitCode;

use mysql_batch::{
    password_from_env, run_batches, sleep_from_secs, AbortReason, BatchConfig, ConfigurationError,
    ConnectionConfig, MysqlClient, RunOutcome, TerminalPrompt, WriteAction,
};
use tracing::info;

use crate::{
    cli_interface::CLI,
    console::{print_error_message, print_success_message, print_warn_message},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Done = 0,
    Failed = 1,
    Configuration = 2,
    Declined = 3,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

pub fn batch_config(cli: &CLI) -> Result<BatchConfig, ConfigurationError> {
    let action = WriteAction::from_kind(cli.action, cli.set_clause.clone())?;

    let mut config = BatchConfig::new(&cli.table, &cli.where_clause, action);
    config.primary_key = cli.primary_key.clone();
    config.read_batch_size = cli.read_batch_size;
    config.write_batch_size = cli.write_batch_size;
    config.sleep = sleep_from_secs(cli.sleep)?;
    config.no_confirm = cli.no_confirm;
    config.start_after = cli.start_after;
    config.confirm_default = cli.confirm_default;
    config.validate()?;

    Ok(config)
}

pub fn connection_config(cli: &CLI) -> ConnectionConfig {
    let mut config = ConnectionConfig::new(&cli.user, &cli.database);
    config.host = cli.host.clone();
    config.port = cli.port;
    config.password = cli.password.clone().or_else(password_from_env).unwrap_or_default();
    config
}

pub fn exit_for(outcome: &RunOutcome) -> Exit {
    match outcome {
        RunOutcome::Done(_) => Exit::Done,
        RunOutcome::Aborted { reason: AbortReason::Declined { .. }, .. } => Exit::Declined,
        RunOutcome::Aborted { reason: AbortReason::Failed(_), .. } => Exit::Failed,
    }
}

pub async fn handle_run_command(cli: &CLI) -> Exit {
    // Configuration problems are reported before any connection is attempted.
    let config = match batch_config(cli) {
        Ok(config) => config,
        Err(e) => {
            print_error_message(&format!("Error: {}", e));
            return Exit::Configuration;
        }
    };

    let mut client = match MysqlClient::connect(&connection_config(cli)).await {
        Ok(client) => client,
        Err(e) => {
            print_error_message(&format!("Error: {}", e));
            return Exit::Failed;
        }
    };

    let mut prompt = TerminalPrompt::stdio();
    let outcome = run_batches(&mut client, &config, &mut prompt).await;
    info!("{}", outcome.summary());

    match &outcome {
        RunOutcome::Done(summary) => {
            print_success_message(&format!("* Done: {}", summary));
        }
        RunOutcome::Aborted { reason, summary } => match reason {
            AbortReason::Declined { .. } => print_warn_message(&reason.to_string()),
            AbortReason::Failed(_) => {
                print_error_message(&format!("Error: {}", reason));
                print_warn_message(&format!(
                    "Stopped after key {}, rerun with --start_after {} to resume",
                    summary.cursor, summary.cursor
                ));
            }
        },
    }

    exit_for(&outcome)
}
