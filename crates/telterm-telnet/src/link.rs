//! Telnet connection: connect/retry loop, read loop and send primitives.
//!
//! [`TelnetLink::connect`] runs until the user disconnects or the reconnect
//! policy gives up. Clean application bytes, state changes and transport
//! errors are reported as [`LinkEvent`]s on the channel passed to
//! [`TelnetLink::new`]. Clones share one connection, so a UI task can send
//! and disconnect while another task drives `connect`.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use telterm_common::mutex_lock_or_recover;
use telterm_screen::Codepage;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::ReadHalf;
use tokio::io::WriteHalf;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::connector::BoxedStream;
use crate::connector::Connector;
use crate::connector::TcpConnector;
use crate::error::LinkError;
use crate::protocol::escape_iac;
use crate::protocol::TelnetParser;
use crate::protocol::DEFAULT_TERMINAL_TYPE;
use crate::reconnect::FailureKind;
use crate::reconnect::LinkState;
use crate::reconnect::ReconnectPolicy;
use crate::reconnect::Reconnector;
use crate::sleeper::RealSleeper;
use crate::sleeper::Sleeper;

pub const READ_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_PORT: u16 = 23;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    State(LinkState),
    /// Application bytes with telnet commands removed.
    Data(Vec<u8>),
    /// The server started or stopped echoing our input.
    RemoteEcho(bool),
    Error(LinkError),
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub terminal_type: String,
    pub codepage: Codepage,
    pub cols: u16,
    pub rows: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            terminal_type: DEFAULT_TERMINAL_TYPE.to_string(),
            codepage: Codepage::default(),
            cols: 80,
            rows: 24,
        }
    }
}

/// Write half of the live connection. `closed` fires when the session ends
/// so writes stuck on a peer that stopped reading let go of the half.
struct SessionWriter {
    half: tokio::sync::Mutex<WriteHalf<BoxedStream>>,
    closed: watch::Sender<bool>,
}

impl SessionWriter {
    fn new(half: WriteHalf<BoxedStream>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            half: tokio::sync::Mutex::new(half),
            closed,
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut half = self.half.lock().await;
        half.write_all(bytes)
            .await
            .map_err(|e| LinkError::Write(e.to_string()))?;
        half.flush()
            .await
            .map_err(|e| LinkError::Write(e.to_string()))
    }

    async fn close(&self) {
        self.closed.send_replace(true);
        let mut half = self.half.lock().await;
        if let Err(e) = half.shutdown().await {
            trace!(error = %e, "Socket shutdown failed");
        }
    }
}

struct Shared {
    writer: Mutex<Option<Arc<SessionWriter>>>,
    parser: Mutex<TelnetParser>,
    state: Mutex<LinkState>,
    shutdown: watch::Sender<bool>,
    user_disconnect: AtomicBool,
}

enum SessionEnd {
    Cancelled,
    Closed(Option<LinkError>),
}

#[derive(Clone)]
pub struct TelnetLink {
    shared: Arc<Shared>,
    codepage: Codepage,
    connector: Arc<dyn Connector>,
    sleeper: Arc<dyn Sleeper>,
    events: mpsc::Sender<LinkEvent>,
}

impl std::fmt::Debug for TelnetLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelnetLink")
            .field("state", &self.state())
            .field("codepage", &self.codepage.name())
            .finish()
    }
}

impl TelnetLink {
    pub fn new(config: LinkConfig, events: mpsc::Sender<LinkEvent>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let parser = TelnetParser::new(config.terminal_type, config.cols, config.rows);
        Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(None),
                parser: Mutex::new(parser),
                state: Mutex::new(LinkState::Idle),
                shutdown,
                user_disconnect: AtomicBool::new(false),
            }),
            codepage: config.codepage,
            connector: Arc::new(TcpConnector),
            sleeper: Arc::new(RealSleeper),
            events,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self) -> LinkState {
        *mutex_lock_or_recover(&self.shared.state)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    pub fn remote_echo(&self) -> bool {
        mutex_lock_or_recover(&self.shared.parser).remote_echo()
    }

    pub fn codepage(&self) -> Codepage {
        self.codepage
    }

    /// Connects and services the connection under `policy`.
    ///
    /// Returns `Ok(())` after [`disconnect`](Self::disconnect), or the error
    /// that made the policy give up.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        policy: ReconnectPolicy,
    ) -> Result<(), LinkError> {
        validate_address(host, port)?;
        self.shared.user_disconnect.store(false, Ordering::SeqCst);
        self.shared.shutdown.send_replace(false);
        let mut shutdown = self.shared.shutdown.subscribe();
        let mut reconnector = Reconnector::new(policy);

        loop {
            let state = reconnector.begin_attempt();
            self.set_state(state).await;
            debug!(host, port, attempt = reconnector.attempt(), "Connecting");

            let result = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => {
                    return self.finish_stopped(&mut reconnector).await;
                }
                result = self.connector.connect(host, port) => result,
            };

            let (next, last_error) = match result {
                Ok(stream) => {
                    let (reader, writer) = tokio::io::split(stream);
                    *mutex_lock_or_recover(&self.shared.writer) =
                        Some(Arc::new(SessionWriter::new(writer)));
                    mutex_lock_or_recover(&self.shared.parser).reset();
                    self.set_state(reconnector.connected()).await;
                    info!(host, port, "Connected");
                    match self.run_session(reader, &mut shutdown).await {
                        SessionEnd::Cancelled => {
                            return self.finish_stopped(&mut reconnector).await;
                        }
                        SessionEnd::Closed(_) if self.user_requested_disconnect() => {
                            return self.finish_stopped(&mut reconnector).await;
                        }
                        SessionEnd::Closed(Some(err)) => {
                            warn!(error = %err, operation = err.operation(), "Connection lost");
                            let reason = err.to_string();
                            self.emit(LinkEvent::Error(err)).await;
                            (reconnector.dropped(), reason)
                        }
                        SessionEnd::Closed(None) => {
                            info!(host, port, "Connection closed by remote host");
                            (
                                reconnector.dropped(),
                                LinkError::ConnectionClosed.to_string(),
                            )
                        }
                    }
                }
                Err(e) => {
                    let err = LinkError::Connect {
                        host: host.to_string(),
                        port,
                        reason: e.to_string(),
                    };
                    warn!(error = %err, attempt = reconnector.attempt(), "Connect attempt failed");
                    self.emit(LinkEvent::Error(err)).await;
                    (reconnector.connect_failed(), e.to_string())
                }
            };
            self.set_state(next).await;

            match next {
                LinkState::Retrying {
                    next_attempt,
                    delay,
                } => {
                    info!(
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        next_attempt,
                        "Waiting before reconnect"
                    );
                    tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown) => {
                            return self.finish_stopped(&mut reconnector).await;
                        }
                        _ = self.sleeper.sleep(delay) => {}
                    }
                }
                LinkState::Failed => {
                    let err = failure_error(&reconnector, host, port, last_error);
                    warn!(error = %err, "Giving up on connection");
                    return Err(err);
                }
                LinkState::Stopped => return Ok(()),
                _ => {}
            }
        }
    }

    /// Stops the link: no reconnect, in-flight reads and writes cancelled.
    /// The task driving [`connect`](Self::connect) closes the socket. Safe to
    /// call any number of times.
    pub async fn disconnect(&self) {
        let already = self.shared.user_disconnect.swap(true, Ordering::SeqCst);
        self.shared.shutdown.send_replace(true);
        if !already {
            info!("Disconnect requested");
        }
    }

    /// Writes `bytes` unchanged.
    pub async fn send_raw(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let result = self.write_frame(bytes).await;
        if let Err(err) = &result {
            self.report_send_error(err).await;
        }
        result
    }

    /// Encodes `text` with the session codepage, escapes IAC bytes and
    /// appends CR LF.
    pub async fn send_line(&self, text: &str) -> Result<(), LinkError> {
        let mut bytes = escape_iac(&self.codepage.encode(text));
        bytes.extend_from_slice(b"\r\n");
        self.send_raw(&bytes).await
    }

    /// Records the window size and pushes a NAWS update when the server
    /// asked for one.
    pub async fn set_window_size(&self, cols: u16, rows: u16) -> Result<(), LinkError> {
        let frame = mutex_lock_or_recover(&self.shared.parser).set_window_size(cols, rows);
        match frame {
            Some(frame) => {
                debug!(cols, rows, "Sending window size");
                self.send_raw(&frame).await
            }
            None => Ok(()),
        }
    }

    async fn run_session(
        &self,
        mut reader: ReadHalf<BoxedStream>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let end = 'read: loop {
            let read = tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown) => break SessionEnd::Cancelled,
                read = reader.read(&mut buf) => read,
            };
            let n = match read {
                Ok(0) => break SessionEnd::Closed(None),
                Ok(n) => n,
                Err(e) => break SessionEnd::Closed(Some(LinkError::Read(e.to_string()))),
            };
            trace!(bytes = n, "Read from socket");

            let output = mutex_lock_or_recover(&self.shared.parser).scan(&buf[..n]);
            for reply in &output.replies {
                if let Err(err) = self.write_frame(reply).await {
                    break 'read SessionEnd::Closed(Some(err));
                }
            }
            if let Some(echo) = output.remote_echo {
                debug!(remote_echo = echo, "Remote echo changed");
                self.emit(LinkEvent::RemoteEcho(echo)).await;
            }
            if !output.data.is_empty() {
                self.emit(LinkEvent::Data(output.data)).await;
            }
        };

        let writer = mutex_lock_or_recover(&self.shared.writer).take();
        if let Some(writer) = writer {
            writer.close().await;
        }
        mutex_lock_or_recover(&self.shared.parser).reset();
        end
    }

    /// Writes one frame, giving up as soon as the link is shut down or the
    /// session ends so a peer that stopped reading cannot stall the caller.
    async fn write_frame(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let writer = mutex_lock_or_recover(&self.shared.writer).clone();
        let Some(writer) = writer else {
            return Err(LinkError::NotConnected);
        };
        let mut shutdown = self.shared.shutdown.subscribe();
        let mut closed = writer.closed.subscribe();
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => {
                trace!(bytes = bytes.len(), "Write abandoned on disconnect");
                Err(LinkError::NotConnected)
            }
            _ = wait_for_shutdown(&mut closed) => {
                trace!(bytes = bytes.len(), "Write abandoned on session end");
                Err(LinkError::NotConnected)
            }
            result = writer.write(bytes) => result,
        }
    }

    async fn report_send_error(&self, err: &LinkError) {
        match err {
            LinkError::NotConnected => debug!("Dropping send: not connected"),
            other => {
                warn!(error = %other, operation = other.operation(), "Send failed");
                self.emit(LinkEvent::Error(other.clone())).await;
            }
        }
    }

    fn user_requested_disconnect(&self) -> bool {
        self.shared.user_disconnect.load(Ordering::SeqCst)
    }

    async fn finish_stopped(&self, reconnector: &mut Reconnector) -> Result<(), LinkError> {
        let state = reconnector.stop();
        self.set_state(state).await;
        Ok(())
    }

    async fn set_state(&self, state: LinkState) {
        {
            let mut current = mutex_lock_or_recover(&self.shared.state);
            if *current == state {
                return;
            }
            *current = state;
        }
        debug!(state = %state, "Link state changed");
        self.emit(LinkEvent::State(state)).await;
    }

    async fn emit(&self, event: LinkEvent) {
        if self.events.send(event).await.is_err() {
            trace!("Link event receiver dropped");
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        // A closed channel means the link is gone; treat it as a stop.
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn validate_address(host: &str, port: u16) -> Result<(), LinkError> {
    let address = format!("{host}:{port}");
    if host.trim().is_empty() {
        return Err(LinkError::InvalidAddress {
            address,
            reason: "host is empty".to_string(),
        });
    }
    if host.chars().any(char::is_whitespace) {
        return Err(LinkError::InvalidAddress {
            address,
            reason: "host contains whitespace".to_string(),
        });
    }
    if port == 0 {
        return Err(LinkError::InvalidAddress {
            address,
            reason: "port must be between 1 and 65535".to_string(),
        });
    }
    Ok(())
}

fn failure_error(reconnector: &Reconnector, host: &str, port: u16, last_error: String) -> LinkError {
    match reconnector.failure() {
        Some(FailureKind::ConnectRefused) => LinkError::Connect {
            host: host.to_string(),
            port,
            reason: last_error,
        },
        Some(FailureKind::AttemptsExhausted) => LinkError::AttemptsExhausted {
            attempts: reconnector.attempt(),
            last_error,
        },
        Some(FailureKind::Dropped) | None => LinkError::ConnectionClosed,
    }
}
