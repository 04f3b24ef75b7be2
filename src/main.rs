//! Binary entrypoint for the `yearseq` CLI.

use clap::Parser;
use std::process::ExitCode;
use yearseq::cli::{self, Cli};
use yearseq::settings::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    pretty_env_logger::init();
    let args = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match cli::run(args.command, &settings).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
