//! Wiring between a [`TelnetLink`] and a [`VirtualTerminal`].

use telterm_screen::VirtualTerminal;
use telterm_telnet::LinkEvent;
use telterm_telnet::LinkState;
use telterm_telnet::TelnetLink;
use telterm_telnet::TelnetParser;
use telterm_telnet::READ_BUFFER_SIZE;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::ClientConfig;

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What a finished session saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub bytes_received: u64,
    pub connections: u32,
    pub errors: u32,
    pub remote_echo: bool,
    pub last_state: Option<LinkState>,
}

/// Drains link events into a terminal.
///
/// Stops at the first terminal link state or when every sender is gone.
#[derive(Debug)]
pub struct EventPump {
    terminal: VirtualTerminal,
    connected: watch::Sender<bool>,
    summary: SessionSummary,
}

impl EventPump {
    pub fn new(terminal: VirtualTerminal) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            terminal,
            connected,
            summary: SessionSummary::default(),
        }
    }

    /// Follows whether the link is currently connected.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<LinkEvent>) -> SessionSummary {
        while let Some(event) = events.recv().await {
            if self.handle(event) {
                break;
            }
        }
        self.connected.send_replace(false);
        self.summary
    }

    /// Applies one event. Returns true once the link has finished.
    fn handle(&mut self, event: LinkEvent) -> bool {
        match event {
            LinkEvent::Data(bytes) => {
                self.summary.bytes_received += bytes.len() as u64;
                self.terminal.process(&bytes);
                false
            }
            LinkEvent::State(state) => {
                info!(state = %state, "Link state changed");
                if state == LinkState::Connected {
                    self.summary.connections += 1;
                }
                self.connected.send_replace(state == LinkState::Connected);
                self.summary.last_state = Some(state);
                state.is_terminal()
            }
            LinkEvent::RemoteEcho(enabled) => {
                debug!(enabled, "Remote echo changed");
                self.summary.remote_echo = enabled;
                false
            }
            LinkEvent::Error(err) => {
                debug!(error = %err, code = err.code(), "Link reported error");
                self.summary.errors += 1;
                false
            }
        }
    }
}

/// Sends every input line with [`TelnetLink::send_line`] once the link is
/// connected. Returns at end of input; the link stays up.
pub async fn forward_input<R>(link: TelnetLink, input: R, mut connected: watch::Receiver<bool>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Input closed; no longer forwarding");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read input");
                return;
            }
        };
        if connected.wait_for(|up| *up).await.is_err() {
            return;
        }
        if let Err(err) = link.send_line(&line).await {
            debug!(error = %err, "Dropped input line");
        }
    }
}

/// Result of replaying a captured stream.
#[derive(Debug)]
pub struct ReplayOutcome {
    pub terminal: VirtualTerminal,
    /// Negotiation frames a live link would have sent.
    pub replies: Vec<Vec<u8>>,
    pub remote_echo: bool,
}

/// Feeds a raw capture, negotiation included, through the telnet scanner
/// and the decoder in read-sized chunks.
pub fn replay_capture(config: &ClientConfig, capture: &[u8]) -> ReplayOutcome {
    let terminal = config.virtual_terminal();
    let mut parser = TelnetParser::new(config.terminal_type.clone(), config.cols, config.rows);
    let mut replies = Vec::new();

    for chunk in capture.chunks(READ_BUFFER_SIZE) {
        let output = parser.scan(chunk);
        for reply in &output.replies {
            debug!(reply = ?reply, "Negotiation reply (not sent)");
        }
        replies.extend(output.replies);
        terminal.process(&output.data);
    }

    if !parser.pending().is_empty() {
        debug!(
            pending = parser.pending().len(),
            "Capture ends inside a telnet sequence"
        );
    }

    ReplayOutcome {
        terminal,
        replies,
        remote_echo: parser.remote_echo(),
    }
}
