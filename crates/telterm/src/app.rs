//! Command handlers.

use std::io::Write;

use anyhow::Context;
use telterm_common::ErrorCategory;
use telterm_screen::Cell;
use telterm_screen::VirtualTerminal;
use telterm_telnet::LinkError;
use telterm_telnet::TelnetLink;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::commands::ConnectArgs;
use crate::commands::OutputArgs;
use crate::commands::ReplayArgs;
use crate::config::ClientConfig;
use crate::config::ConfigError;
use crate::render::render_ansi;
use crate::render::render_plain;
use crate::session::forward_input;
use crate::session::replay_capture;
use crate::session::EventPump;
use crate::session::SessionSummary;
use crate::session::EVENT_CHANNEL_CAPACITY;

/// Exit codes following sysexits.h.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const USAGE: i32 = 64;
    pub const IOERR: i32 = 74;
    pub const TEMPFAIL: i32 = 75;
}

/// Runs a live session until the link finishes or Ctrl-C, then prints the
/// screen. A connection closed by the host is a normal end.
pub async fn run_connect<W: Write>(
    config: &ClientConfig,
    args: &ConnectArgs,
    color: bool,
    out: &mut W,
) -> anyhow::Result<SessionSummary> {
    let terminal = config.virtual_terminal();
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let link = TelnetLink::new(config.link_config(), events_tx);

    let pump = EventPump::new(terminal.clone());
    let connected = pump.subscribe();
    let pump_task = tokio::spawn(pump.run(events_rx));
    let input_task = tokio::spawn(forward_input(
        link.clone(),
        BufReader::new(tokio::io::stdin()),
        connected,
    ));

    let policy = args.policy(config);
    info!(
        host = %args.host,
        port = args.port,
        retry = policy.retry_on_initial_failure,
        retry_dropped = policy.retry_on_dropped_connection,
        "Starting session"
    );
    let result = {
        let connect = link.connect(&args.host, args.port, policy);
        tokio::pin!(connect);
        tokio::select! {
            result = &mut connect => result,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Interrupted; disconnecting");
                link.disconnect().await;
                connect.await
            }
        }
    };

    input_task.abort();
    drop(link);
    let summary = pump_task.await.context("Session event task failed")?;
    debug!(?summary, "Session finished");

    write_screen(out, &terminal, args.output, color)?;

    match result {
        Ok(()) | Err(LinkError::ConnectionClosed) => Ok(summary),
        Err(err) => {
            warn!(error = %err, category = %err.category(), "Session failed");
            Err(err.into())
        }
    }
}

/// Decodes a capture file and prints the screen.
pub fn run_replay<W: Write>(
    config: &ClientConfig,
    args: &ReplayArgs,
    color: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    let capture = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read capture {}", args.file.display()))?;
    let outcome = replay_capture(config, &capture);
    debug!(
        bytes = capture.len(),
        replies = outcome.replies.len(),
        remote_echo = outcome.remote_echo,
        "Replay finished"
    );
    write_screen(out, &outcome.terminal, args.output, color)
}

fn write_screen<W: Write>(
    out: &mut W,
    terminal: &VirtualTerminal,
    output: OutputArgs,
    color: bool,
) -> anyhow::Result<()> {
    let rows: Vec<Vec<Cell>> = if output.history {
        terminal.with_grid(|grid| grid.snapshot_history())
    } else {
        terminal.snapshot().cells
    };
    let text = if output.ansi && color {
        render_ansi(&rows)
    } else {
        render_plain(&rows)
    };
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .context("Failed to write screen")
}

/// Maps an error from [`run_connect`] or [`run_replay`] to a process exit code.
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    if let Some(link_error) = error.downcast_ref::<LinkError>() {
        return exit_code_for_category(link_error.category());
    }
    if let Some(config_error) = error.downcast_ref::<ConfigError>() {
        return exit_code_for_category(config_error.category());
    }
    exit_codes::GENERAL_ERROR
}

fn exit_code_for_category(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::InvalidInput => exit_codes::USAGE,
        ErrorCategory::External | ErrorCategory::Internal => exit_codes::IOERR,
        ErrorCategory::Exhausted => exit_codes::TEMPFAIL,
    }
}
