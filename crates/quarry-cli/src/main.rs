use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::serve::ServeArgs;

#[derive(Parser, Debug)]
#[command(
    name = "quarry",
    version,
    about = "Expose a Postgres database to MCP clients: table schemas as resources, SQL as a tool"
)]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the stdio transport, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::serve::execute(cli.serve).await
}
