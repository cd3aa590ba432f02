use std::io::Write;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use telterm::app;
use telterm::app::exit_codes;
use telterm::commands::Cli;
use telterm::commands::Commands;
use telterm::telemetry;
use telterm::ConfigError;
use telterm_telnet::LinkError;

fn main() {
    if let Err(e) = run() {
        if let Some(link_error) = e.downcast_ref::<LinkError>() {
            eprintln!("Error: {link_error}");
            eprintln!("Suggestion: {}", link_error.suggestion());
            if link_error.is_retryable() {
                eprintln!("(This error may be transient - retry may succeed)");
            }
        } else if let Some(config_error) = e.downcast_ref::<ConfigError>() {
            eprintln!("Error: {config_error}");
            eprintln!("Suggestion: {}", config_error.suggestion());
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(app::exit_code_for(&e));
    }
    std::process::exit(exit_codes::SUCCESS);
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _telemetry = telemetry::init_tracing(&cli.log_level);
    let config = cli.client_config()?;
    let color = !cli.no_color;
    debug!(command = ?cli.command, config = ?config, "CLI command parsed");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match &cli.command {
        Commands::Replay(args) => app::run_replay(&config, args, color, &mut out)?,
        Commands::Connect(args) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            let result = runtime.block_on(app::run_connect(&config, args, color, &mut out));
            // Stdin reads sit on a blocking thread that never finishes on its own.
            runtime.shutdown_background();
            let summary = result?;
            debug!(
                bytes = summary.bytes_received,
                connections = summary.connections,
                "Session summary"
            );
        }
    }
    out.flush().context("Failed to flush stdout")?;
    Ok(())
}
