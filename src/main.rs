use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    novelscroll::logging::init().context("init logging")?;

    let cli = novelscroll::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        novelscroll::cli::Command::Read(args) => {
            novelscroll::read::run(args).await.context("read")?;
        }
        novelscroll::cli::Command::Toc(args) => {
            novelscroll::toc::run(args).await.context("toc")?;
        }
        novelscroll::cli::Command::Chapter(args) => {
            novelscroll::extract::run(args).await.context("chapter")?;
        }
        novelscroll::cli::Command::Reader { command } => {
            novelscroll::settings::run(command)
                .await
                .context("reader")?;
        }
    }

    Ok(())
}
