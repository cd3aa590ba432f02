use std::sync::Arc;
use std::time::Duration;

use telterm_screen::Codepage;
use telterm_telnet::protocol::DO;
use telterm_telnet::protocol::IAC;
use telterm_telnet::protocol::OPT_ECHO;
use telterm_telnet::protocol::OPT_NAWS;
use telterm_telnet::protocol::OPT_TTYPE;
use telterm_telnet::protocol::SB;
use telterm_telnet::protocol::SE;
use telterm_telnet::protocol::TTYPE_IS;
use telterm_telnet::protocol::TTYPE_SEND;
use telterm_telnet::protocol::WILL;
use telterm_telnet::LinkConfig;
use telterm_telnet::LinkError;
use telterm_telnet::LinkEvent;
use telterm_telnet::LinkState;
use telterm_telnet::MockConnector;
use telterm_telnet::MockSleeper;
use telterm_telnet::PendingSleeper;
use telterm_telnet::ReconnectPolicy;
use telterm_telnet::TelnetLink;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::DuplexStream;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    link: TelnetLink,
    events: mpsc::Receiver<LinkEvent>,
    connector: Arc<MockConnector>,
    sleeper: Arc<MockSleeper>,
}

impl Harness {
    fn new() -> Self {
        let (tx, events) = mpsc::channel(256);
        let connector = Arc::new(MockConnector::new());
        let sleeper = Arc::new(MockSleeper::new());
        let link = TelnetLink::new(LinkConfig::default(), tx)
            .with_connector(connector.clone())
            .with_sleeper(sleeper.clone());
        Self {
            link,
            events,
            connector,
            sleeper,
        }
    }

    /// Queues a connected stream and returns the server end.
    fn accept_next(&self) -> DuplexStream {
        self.accept_next_with_capacity(4096)
    }

    fn accept_next_with_capacity(&self, capacity: usize) -> DuplexStream {
        let (client, server) = tokio::io::duplex(capacity);
        self.connector.push_stream(client);
        server
    }

    /// Starts a send that blocks because the server never reads.
    async fn spawn_stalled_send(&self) -> JoinHandle<Result<(), LinkError>> {
        let link = self.link.clone();
        let send = tokio::spawn(async move { link.send_raw(&[b'x'; 4096]).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!send.is_finished(), "send should be blocked on a full pipe");
        send
    }

    fn spawn_connect(&self, policy: ReconnectPolicy) -> JoinHandle<Result<(), LinkError>> {
        let link = self.link.clone();
        tokio::spawn(async move { link.connect("bbs.test", 23, policy).await })
    }

    async fn wait_for(&mut self, pred: impl Fn(&LinkEvent) -> bool) -> LinkEvent {
        timeout(WAIT, async {
            loop {
                match self.events.recv().await {
                    Some(event) if pred(&event) => return event,
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for link event")
    }

    async fn wait_for_text(&mut self, needle: &str) -> String {
        let mut seen = Vec::new();
        timeout(WAIT, async {
            loop {
                match self.events.recv().await {
                    Some(LinkEvent::Data(bytes)) => {
                        seen.extend(bytes);
                        let text = String::from_utf8_lossy(&seen).to_string();
                        if text.contains(needle) {
                            return text;
                        }
                    }
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for data")
    }
}

async fn read_exactly(server: &mut DuplexStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    timeout(WAIT, server.read_exact(&mut buf))
        .await
        .expect("timed out reading from client")
        .expect("read from client");
    buf
}

fn is_state(state: LinkState) -> impl Fn(&LinkEvent) -> bool {
    move |event| *event == LinkEvent::State(state)
}

fn is_retrying(event: &LinkEvent) -> bool {
    matches!(event, LinkEvent::State(LinkState::Retrying { .. }))
}

#[tokio::test]
async fn test_negotiation_and_clean_data() {
    let mut h = Harness::new();
    let mut server = h.accept_next();
    server
        .write_all(&[
            IAC, DO, OPT_TTYPE, IAC, SB, OPT_TTYPE, TTYPE_SEND, IAC, SE, b'W', b'e', b'l', b'c',
            IAC, IAC, b'o', b'm', b'e',
        ])
        .await
        .unwrap();

    let task = h.spawn_connect(ReconnectPolicy::once());
    let text_bytes = match h.wait_for(|e| matches!(e, LinkEvent::Data(_))).await {
        LinkEvent::Data(bytes) => bytes,
        other => panic!("unexpected event {other:?}"),
    };
    assert_eq!(text_bytes, b"Welc\xffome".to_vec());

    let replies = read_exactly(&mut server, 3 + 10).await;
    assert_eq!(&replies[..3], &[IAC, WILL, OPT_TTYPE]);
    assert_eq!(
        &replies[3..],
        &[IAC, SB, OPT_TTYPE, TTYPE_IS, b'A', b'N', b'S', b'I', IAC, SE]
    );

    h.link.disconnect().await;
    assert_eq!(task.await.unwrap(), Ok(()));
    assert_eq!(h.link.state(), LinkState::Stopped);
    assert_eq!(h.sleeper.call_count(), 0);
}

#[tokio::test]
async fn test_send_line_encodes_and_escapes() {
    let mut h = Harness::new();
    let mut server = h.accept_next();
    let task = h.spawn_connect(ReconnectPolicy::once());
    h.wait_for(is_state(LinkState::Connected)).await;

    // U+00A0 is 0xFF in CP437 and must be doubled on the wire.
    h.link.send_line("a\u{a0}╔").await.unwrap();
    let sent = read_exactly(&mut server, 6).await;
    assert_eq!(sent, vec![b'a', 0xFF, 0xFF, 0xC9, b'\r', b'\n']);

    h.link.send_raw(&[IAC, 241]).await.unwrap();
    assert_eq!(read_exactly(&mut server, 2).await, vec![IAC, 241]);

    h.link.disconnect().await;
    assert_eq!(task.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_window_size_updates_after_naws() {
    let mut h = Harness::new();
    let mut server = h.accept_next();
    let task = h.spawn_connect(ReconnectPolicy::once());
    h.wait_for(is_state(LinkState::Connected)).await;

    // Not negotiated yet: nothing is sent.
    h.link.set_window_size(90, 30).await.unwrap();

    server.write_all(&[IAC, DO, OPT_NAWS]).await.unwrap();
    let reply = read_exactly(&mut server, 3 + 9).await;
    assert_eq!(&reply[..3], &[IAC, WILL, OPT_NAWS]);
    assert_eq!(&reply[3..], &[IAC, SB, OPT_NAWS, 0, 90, 0, 30, IAC, SE]);

    h.link.set_window_size(132, 50).await.unwrap();
    let update = read_exactly(&mut server, 9).await;
    assert_eq!(update, vec![IAC, SB, OPT_NAWS, 0, 132, 0, 50, IAC, SE]);

    h.link.disconnect().await;
    assert_eq!(task.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_remote_echo_event() {
    let mut h = Harness::new();
    let mut server = h.accept_next();
    server.write_all(&[IAC, WILL, OPT_ECHO]).await.unwrap();
    let task = h.spawn_connect(ReconnectPolicy::once());

    let event = h.wait_for(|e| matches!(e, LinkEvent::RemoteEcho(_))).await;
    assert_eq!(event, LinkEvent::RemoteEcho(true));
    assert!(h.link.remote_echo());
    assert_eq!(read_exactly(&mut server, 3).await, vec![IAC, DO, OPT_ECHO]);

    h.link.disconnect().await;
    assert_eq!(task.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_initial_failure_without_retry() {
    let h = Harness::new();
    h.connector.push_error(std::io::ErrorKind::ConnectionRefused);

    let result = h.link.connect("bbs.test", 23, ReconnectPolicy::once()).await;
    assert!(matches!(result, Err(LinkError::Connect { port: 23, .. })));
    assert_eq!(h.link.state(), LinkState::Failed);
    assert_eq!(h.connector.calls(), 1);
    assert_eq!(h.sleeper.call_count(), 0);
}

#[tokio::test]
async fn test_initial_failure_retries_with_pause() {
    let h = Harness::new();
    h.connector
        .push_errors(std::io::ErrorKind::ConnectionRefused, 10);
    let policy = ReconnectPolicy::once()
        .with_retry_on_initial_failure(true)
        .with_max_attempts(3)
        .with_retry_pause(Duration::from_secs(7));

    let result = h.link.connect("bbs.test", 23, policy).await;
    match result {
        Err(LinkError::AttemptsExhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(h.connector.calls(), 3);
    assert_eq!(
        h.sleeper.durations(),
        vec![Duration::from_secs(7), Duration::from_secs(7)]
    );
}

#[tokio::test]
async fn test_retry_then_connect() {
    let mut h = Harness::new();
    h.connector.push_errors(std::io::ErrorKind::TimedOut, 2);
    let mut server = h.accept_next();
    server.write_all(b"hello").await.unwrap();
    let policy = ReconnectPolicy::once()
        .with_retry_on_initial_failure(true)
        .with_max_attempts(0)
        .with_retry_pause(Duration::from_secs(1));

    let task = h.spawn_connect(policy);
    h.wait_for_text("hello").await;
    assert_eq!(h.sleeper.call_count(), 2);
    assert_eq!(h.connector.calls(), 3);

    h.link.disconnect().await;
    assert_eq!(task.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_dropped_connection_reconnects() {
    let mut h = Harness::new();
    let first = h.accept_next();
    let mut second = h.accept_next();
    second.write_all(b"again").await.unwrap();
    let policy = ReconnectPolicy::once()
        .with_retry_on_dropped_connection(true)
        .with_max_attempts(2)
        .with_retry_pause(Duration::from_secs(3));

    let task = h.spawn_connect(policy);
    h.wait_for(is_state(LinkState::Connected)).await;
    drop(first);

    h.wait_for(is_retrying).await;
    h.wait_for(is_state(LinkState::Connected)).await;
    h.wait_for_text("again").await;
    assert_eq!(h.sleeper.durations(), vec![Duration::from_secs(3)]);

    h.link.disconnect().await;
    assert_eq!(task.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_dropped_connection_without_retry() {
    let mut h = Harness::new();
    let server = h.accept_next();
    let task = h.spawn_connect(ReconnectPolicy::once());
    h.wait_for(is_state(LinkState::Connected)).await;
    drop(server);

    assert_eq!(task.await.unwrap(), Err(LinkError::ConnectionClosed));
    assert_eq!(h.link.state(), LinkState::Failed);
}

#[tokio::test]
async fn test_reconnect_failures_after_drop_exhaust() {
    let mut h = Harness::new();
    let server = h.accept_next();
    h.connector.push_errors(std::io::ErrorKind::ConnectionRefused, 5);
    let policy = ReconnectPolicy::once()
        .with_retry_on_dropped_connection(true)
        .with_max_attempts(2)
        .with_retry_pause(Duration::from_millis(250));

    let task = h.spawn_connect(policy);
    h.wait_for(is_state(LinkState::Connected)).await;
    drop(server);

    match task.await.unwrap() {
        Err(LinkError::AttemptsExhausted { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("unexpected result {other:?}"),
    }
    // One pause after the drop, one between the two failed reconnects.
    assert_eq!(h.sleeper.call_count(), 2);
    assert_eq!(h.connector.calls(), 3);
}

#[tokio::test]
async fn test_disconnect_during_pause_stops_immediately() {
    let (tx, mut events) = mpsc::channel(256);
    let connector = Arc::new(MockConnector::new());
    let link = TelnetLink::new(LinkConfig::default(), tx)
        .with_connector(connector.clone())
        .with_sleeper(Arc::new(PendingSleeper));
    let policy = ReconnectPolicy::default().with_max_attempts(0);

    let runner = link.clone();
    let task = tokio::spawn(async move { runner.connect("bbs.test", 23, policy).await });

    timeout(WAIT, async {
        while let Some(event) = events.recv().await {
            if is_retrying(&event) {
                break;
            }
        }
    })
    .await
    .unwrap();

    link.disconnect().await;
    let result = timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(result, Ok(()));
    assert_eq!(link.state(), LinkState::Stopped);
    assert_eq!(connector.calls(), 1);
}

#[tokio::test]
async fn test_disconnect_with_stalled_send() {
    let mut h = Harness::new();
    let _server = h.accept_next_with_capacity(16);
    let task = h.spawn_connect(ReconnectPolicy::once());
    h.wait_for(is_state(LinkState::Connected)).await;
    let send = h.spawn_stalled_send().await;

    timeout(Duration::from_secs(2), h.link.disconnect())
        .await
        .expect("disconnect blocked behind a pending send");
    let result = timeout(Duration::from_secs(2), task)
        .await
        .expect("connect did not return after disconnect")
        .unwrap();
    assert_eq!(result, Ok(()));
    assert_eq!(h.link.state(), LinkState::Stopped);

    let sent = timeout(WAIT, send).await.unwrap().unwrap();
    assert_eq!(sent, Err(LinkError::NotConnected));
}

#[tokio::test]
async fn test_remote_close_with_stalled_send() {
    let mut h = Harness::new();
    let mut server = h.accept_next_with_capacity(16);
    let task = h.spawn_connect(ReconnectPolicy::once());
    h.wait_for(is_state(LinkState::Connected)).await;
    let send = h.spawn_stalled_send().await;

    // Host hangs up its side but never drains what we wrote.
    server.shutdown().await.unwrap();

    let result = timeout(Duration::from_secs(2), task)
        .await
        .expect("session teardown blocked behind a pending send")
        .unwrap();
    assert_eq!(result, Err(LinkError::ConnectionClosed));

    let sent = timeout(WAIT, send).await.unwrap().unwrap();
    assert_eq!(sent, Err(LinkError::NotConnected));
    assert_eq!(h.link.send_line("late").await, Err(LinkError::NotConnected));
}

#[tokio::test]
async fn test_invalid_address_rejected() {
    let h = Harness::new();
    let result = h.link.connect("", 23, ReconnectPolicy::default()).await;
    assert!(matches!(result, Err(LinkError::InvalidAddress { .. })));
    assert_eq!(h.connector.calls(), 0);
}

#[tokio::test]
async fn test_loopback_tcp_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket
            .write_all(&[IAC, WILL, OPT_ECHO, b'l', b'o', b'g', b'i', b'n', b':', b' '])
            .await
            .unwrap();
        let mut reply = [0u8; 3];
        socket.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [IAC, DO, OPT_ECHO]);

        let mut line = [0u8; 7];
        socket.read_exact(&mut line).await.unwrap();
        assert_eq!(&line, b"guest\r\n");
        socket
    });

    let (tx, mut events) = mpsc::channel(256);
    let config = LinkConfig {
        codepage: Codepage::Latin1,
        ..LinkConfig::default()
    };
    let link = TelnetLink::new(config, tx);
    let runner = link.clone();
    let task = tokio::spawn(async move {
        runner
            .connect("127.0.0.1", port, ReconnectPolicy::once())
            .await
    });

    let mut echo = false;
    let mut text = Vec::new();
    timeout(WAIT, async {
        while let Some(event) = events.recv().await {
            match event {
                LinkEvent::RemoteEcho(on) => echo = on,
                LinkEvent::Data(bytes) => text.extend(bytes),
                _ => {}
            }
            if echo && text.ends_with(b"login: ") {
                break;
            }
        }
    })
    .await
    .unwrap();

    link.send_line("guest").await.unwrap();
    let _socket = timeout(WAIT, server).await.unwrap().unwrap();

    link.disconnect().await;
    assert_eq!(timeout(WAIT, task).await.unwrap().unwrap(), Ok(()));
}
