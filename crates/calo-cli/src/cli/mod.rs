mod commands;
mod helpers;

use calo_core::domain::CaloError;
use clap::Parser;

pub fn run_from_env() -> i32 {
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let error = error.as_calo_error();
            eprintln!("{}", error.diagnostic_line());
            if let Some(summary_line) = error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("calo-sim".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "calo-sim", version, about = "Calorimeter tower simulation")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Reconstruct calorimeter towers for every event in an event file
    Run(commands::RunArgs),
    /// Build the calorimeter from a configuration and report its layout
    CheckConfig(commands::CheckConfigArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_events_command(args),
        CliCommand::CheckConfig(args) => commands::check_config_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(CaloError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CaloError> for CliError {
    fn from(error: CaloError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_calo_error(&self) -> CaloError {
        match self {
            Self::Usage(message) => CaloError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => CaloError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
