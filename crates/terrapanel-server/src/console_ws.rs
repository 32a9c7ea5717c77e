//! `GET /console`: push-only websocket stream of game console lines.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::TryRecvError;
use std::thread;
use std::time::Duration;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::WebSocketConfig;
use tungstenite::{Error as WsError, Message, WebSocket, accept_hdr_with_config};

use crate::error::{PanelError, Result};
use crate::hub::ConsoleHub;

/// Socket settings for console clients.
#[derive(Debug, Clone)]
pub struct ConsoleSocketConfig {
    /// Allowlist for `Origin` headers. Empty means allow all.
    pub allowed_origins: Vec<String>,
    pub max_message_bytes: usize,
    pub idle_sleep: Duration,
}

/// Reported when a console session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// RFC 3339 time the upgrade completed.
    pub connected_at: String,
    pub lines_sent: u64,
    pub frames_received: u64,
}

fn now_iso8601() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// A stream that first yields bytes already read from `inner`.
///
/// The request head is read before routing, so the websocket handshake
/// is given those bytes back.
#[derive(Debug)]
pub struct ReplayStream<S> {
    replay: Vec<u8>,
    position: usize,
    inner: S,
}

impl<S> ReplayStream<S> {
    #[must_use]
    pub fn new(replay: Vec<u8>, inner: S) -> Self {
        Self {
            replay,
            position: 0,
            inner,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S: Read> Read for ReplayStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position < self.replay.len() {
            let remaining = &self.replay[self.position..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.position += n;
            return Ok(n);
        }
        self.inner.read(buf)
    }
}

impl<S: Write> Write for ReplayStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Queued but unsent output allowed per client before the session is
/// dropped as too slow.
pub const MAX_PENDING_WRITE_BYTES: usize = 8 * 1024 * 1024;

type ConsoleSocket = WebSocket<ReplayStream<TcpStream>>;

/// Complete the upgrade and stream hub lines until the client leaves.
pub fn run_console_session(
    stream: ReplayStream<TcpStream>,
    hub: &ConsoleHub,
    config: &ConsoleSocketConfig,
) -> Result<SessionSummary> {
    let mut websocket = accept_console_socket(stream, config)?;
    websocket.get_ref().get_ref().set_nonblocking(true)?;

    let subscription = hub.subscribe();
    let mut summary = SessionSummary {
        connected_at: now_iso8601(),
        ..SessionSummary::default()
    };
    info!(backlog = subscription.backlog.len(), "console client connected");
    let mut replay: VecDeque<String> = subscription.backlog.into();
    let mut pending = false;

    loop {
        let mut progressed = false;

        loop {
            match websocket.read() {
                Ok(message) => {
                    progressed = true;
                    summary.frames_received = summary.frames_received.saturating_add(1);
                    if is_close(&message) {
                        return Ok(summary);
                    }
                }
                Err(WsError::Io(error)) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Ok(summary),
                Err(error) => return Err(PanelError::websocket(error)),
            }
        }

        if pending {
            pending = flush_pending(&mut websocket)?;
            progressed |= !pending;
        }

        // Lines are only taken while nothing is stuck in the socket, so a
        // stalled client leaves them queued in the hub channel.
        while !pending {
            let line = match replay.pop_front() {
                Some(line) => line,
                None => match subscription.lines.try_recv() {
                    Ok(line) => line,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        let _ = websocket.close(None);
                        return Ok(summary);
                    }
                },
            };
            progressed = true;
            pending = queue_ws_message(&mut websocket, Message::text(line))?;
            summary.lines_sent = summary.lines_sent.saturating_add(1);
        }

        if !progressed {
            thread::sleep(config.idle_sleep);
        }
    }
}

/// Pings are answered by tungstenite itself; only a close ends the session.
fn is_close(message: &Message) -> bool {
    match message {
        Message::Close(_) => true,
        Message::Text(text) => {
            debug!(len = text.len(), "ignoring client text frame");
            false
        }
        Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => false,
    }
}

/// Hand `message` to the socket exactly once. Returns `true` when part of
/// the output is still buffered and needs [`flush_pending`].
fn queue_ws_message<S: Read + Write>(
    websocket: &mut WebSocket<S>,
    message: Message,
) -> Result<bool> {
    match websocket.send(message) {
        Ok(()) => Ok(false),
        Err(WsError::Io(error)) if error.kind() == io::ErrorKind::WouldBlock => Ok(true),
        Err(error) => Err(PanelError::websocket(error)),
    }
}

/// Push buffered output. Returns `true` while some of it is still waiting.
fn flush_pending<S: Read + Write>(websocket: &mut WebSocket<S>) -> Result<bool> {
    match websocket.flush() {
        Ok(()) => Ok(false),
        Err(WsError::Io(error)) if error.kind() == io::ErrorKind::WouldBlock => Ok(true),
        Err(error) => Err(PanelError::websocket(error)),
    }
}

fn accept_console_socket(
    stream: ReplayStream<TcpStream>,
    config: &ConsoleSocketConfig,
) -> Result<ConsoleSocket> {
    let allowed_origins = config.allowed_origins.clone();
    let ws_config = WebSocketConfig::default()
        .max_message_size(Some(config.max_message_bytes))
        .max_frame_size(Some(config.max_message_bytes))
        .write_buffer_size(0)
        .max_write_buffer_size(MAX_PENDING_WRITE_BYTES);

    let callback = move |request: &Request, response: Response| {
        validate_origin(request, &allowed_origins)
            .map(|()| response)
            .map_err(HandshakeRejection::into_response)
    };

    accept_hdr_with_config(stream, callback, Some(ws_config))
        .map_err(|error| PanelError::websocket(format!("handshake failed: {error}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HandshakeRejection {
    status: StatusCode,
    body: String,
}

impl HandshakeRejection {
    fn into_response(self) -> ErrorResponse {
        let mut response = ErrorResponse::new(Some(self.body));
        *response.status_mut() = self.status;
        response
    }
}

fn validate_origin(
    request: &Request,
    allowed_origins: &[String],
) -> std::result::Result<(), HandshakeRejection> {
    if allowed_origins.is_empty() {
        return Ok(());
    }
    let origin = request
        .headers()
        .get("Origin")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| HandshakeRejection {
            status: StatusCode::FORBIDDEN,
            body: "Origin header missing".to_string(),
        })?;
    if allowed_origins.iter().any(|allowed| allowed == origin) {
        Ok(())
    } else {
        Err(HandshakeRejection {
            status: StatusCode::FORBIDDEN,
            body: "Origin not allowed".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::read_head;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::net::{SocketAddr, TcpListener};
    use std::sync::Arc;
    use std::time::Instant;

    fn request(origin: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/console");
        if let Some(origin) = origin {
            builder = builder.header("Origin", origin);
        }
        builder.body(()).expect("request build")
    }

    #[test]
    fn replay_bytes_come_before_inner_stream() {
        let mut stream = ReplayStream::new(b"GET ".to_vec(), Cursor::new(b"/console".to_vec()));
        let mut out = String::new();
        stream.read_to_string(&mut out).expect("read");
        assert_eq!(out, "GET /console");
    }

    #[test]
    fn replay_respects_small_buffers() {
        let mut stream = ReplayStream::new(b"abcdef".to_vec(), Cursor::new(Vec::new()));
        let mut buf = [0_u8; 4];
        assert_eq!(stream.read(&mut buf).expect("read"), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(stream.read(&mut buf).expect("read"), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(stream.read(&mut buf).expect("read"), 0);
    }

    #[test]
    fn stalled_client_gets_every_line_once_in_order() {
        // Far more than loopback socket buffers hold, so the server has to
        // park output while the client is not reading.
        let lines: Vec<String> = (0..6_000)
            .map(|index| format!("{index:06} {}", "x".repeat(2_048)))
            .collect();
        let hub = Arc::new(ConsoleHub::new(lines.len() + 1));
        for line in &lines {
            hub.publish(line);
        }

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server_hub = Arc::clone(&hub);
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let read = read_head(&mut stream).expect("head");
            let config = ConsoleSocketConfig {
                allowed_origins: Vec::new(),
                max_message_bytes: 64 * 1024,
                idle_sleep: Duration::from_millis(1),
            };
            run_console_session(ReplayStream::new(read.raw, stream), &server_hub, &config)
        });

        let (mut client, _response) =
            tungstenite::connect(format!("ws://{addr}/console")).expect("connect");
        let deadline = Instant::now() + Duration::from_secs(5);
        while hub.subscriber_count() == 0 {
            assert!(Instant::now() < deadline, "session never subscribed");
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(300));
        hub.publish("live line");

        let mut expected = lines;
        expected.push("live line".to_string());
        let mut received = Vec::with_capacity(expected.len());
        while received.len() < expected.len() {
            if let Message::Text(text) = client.read().expect("client read") {
                received.push(text.to_string());
            }
        }
        client.close(None).expect("close");

        let duplicates = received.windows(2).filter(|pair| pair[0] == pair[1]).count();
        assert_eq!(duplicates, 0);
        assert!(received == expected, "lines arrived out of order");

        let summary = server.join().expect("server thread").expect("session");
        assert_eq!(summary.lines_sent, u64::try_from(expected.len()).expect("count"));
    }

    #[test]
    fn close_frames_end_the_session() {
        assert!(is_close(&Message::Close(None)));
        assert!(!is_close(&Message::text("hello")));
        assert!(!is_close(&Message::Ping(Vec::new().into())));
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let stamp = now_iso8601();
        assert!(OffsetDateTime::parse(&stamp, &Rfc3339).is_ok(), "{stamp}");
    }

    #[test]
    fn any_origin_is_allowed_without_allowlist() {
        assert!(validate_origin(&request(None), &[]).is_ok());
        assert!(validate_origin(&request(Some("https://x.example")), &[]).is_ok());
    }

    #[test]
    fn allowlist_rejects_missing_or_foreign_origin() {
        let allowed = [String::from("https://panel.example")];
        assert!(validate_origin(&request(Some("https://panel.example")), &allowed).is_ok());

        let missing = validate_origin(&request(None), &allowed).expect_err("missing");
        assert_eq!(missing.status, StatusCode::FORBIDDEN);
        assert_eq!(missing.body, "Origin header missing");

        let foreign =
            validate_origin(&request(Some("https://evil.example")), &allowed).expect_err("foreign");
        assert_eq!(foreign.body, "Origin not allowed");
    }

    #[test]
    fn rejection_becomes_error_response() {
        let response = HandshakeRejection {
            status: StatusCode::FORBIDDEN,
            body: "nope".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.body().as_deref(), Some("nope"));
    }
}
