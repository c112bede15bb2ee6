use std::process::ExitCode;

use clap::Parser;

use fabric_server_updater::cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match fabric_server_updater::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
