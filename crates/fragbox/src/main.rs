mod cli;
mod inputs;
mod paths;
mod run;

use std::process::ExitCode;

use anyhow::Result;
use cli::Command;

fn main() -> Result<ExitCode> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Check(args)) => {
            let ok = run::check(args)?;
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        None => {
            run::run(cli.run)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
