use clap::Parser;

use emx_cli::cli::{Cli, Command};
use emx_cli::{commands, logging};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let _guard = logging::init(cli.debug);

    match cli.command {
        Command::EmulatorsExec { script, only } => {
            let options = only.unwrap_or_default();
            let outcome = commands::emulators_exec(&cli.project_dir, &script, &options).await?;
            tracing::debug!("emulators:exec finished, script {outcome}");
            Ok(())
        }
        Command::FunctionsCheck { source, names } => {
            commands::functions_check(&cli.project_dir, source.as_deref(), &names)
        }
    }
}
