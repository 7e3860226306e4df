use std::process::ExitCode;

use anyhow::Context;
use console::cli::ConsoleArgs;
use tracing::Level;

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    logger::init(Level::INFO);

    let args = ConsoleArgs::from_cli();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    rt.block_on(args.run())
}
