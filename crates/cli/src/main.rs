mod config;
mod error;

use std::io;
use std::path::PathBuf;

use clap::Parser;
use runtime::{
    EXIT_COMMAND, Exit, McpToolHost, OpenAiBackend, QueryProcessor, Scoped, ToolHost, repl,
    run_scoped,
};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;

#[derive(Parser)]
#[command(name = "toolchat")]
#[command(about = "Chat with a local model that can call MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Tool provider: a .py or .js script, or an executable
    provider: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };
    // A pending stdin read would otherwise hold up runtime shutdown.
    std::process::exit(code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::discover()?;
    let backend = OpenAiBackend::new(config.backend.clone())?;

    let provider = config.provider.to_provider_config(&cli.provider);
    let host = McpToolHost::connect(provider).await?;
    println!(
        "\nConnected to server with tools: {:?}",
        host.catalog().names()
    );
    info!(%backend, provider = %cli.provider.display(), "ready");

    let scope = Scoped::new(host);
    let exit = run_scoped(&scope, interrupted(), |host| async move {
        let processor = QueryProcessor::new(backend, host).with_options(config.query);
        println!("\nMCP client started! Type your queries or '{EXIT_COMMAND}' to exit.");

        let stdin = BufReader::new(tokio::io::stdin());
        repl::run(stdin, &mut io::stdout(), &processor).await
    })
    .await;

    match exit {
        Exit::Completed(result) => result?,
        Exit::Interrupted => println!("\nInterrupted."),
    }
    Ok(())
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
