use clap::Parser;

use notewire_server::NoteServer;

mod cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        cli::Command::Serve(args) => {
            let config = args.into_config();
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(NoteServer::new(config).serve())?;
        }
    }
    Ok(())
}
