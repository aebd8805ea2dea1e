use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use learnsite::cli::{Cli, Command};

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    learnsite::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Routes(args) => learnsite::prerender::routes(args).context("routes")?,
        Command::Render(args) => learnsite::prerender::render(args).context("render")?,
        Command::Prerender(args) => learnsite::prerender::run(args).context("prerender")?,
        Command::Progress { command } => learnsite::progress::run(command).context("progress")?,
    }

    Ok(())
}
