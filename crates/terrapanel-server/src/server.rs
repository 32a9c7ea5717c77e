//! HTTP listener: routes requests and hands console upgrades to websocket
//! sessions. One thread per connection.

use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use terrapanel_console::endpoint::{COMMAND_PATH, CONSOLE_PATH};
use tracing::{debug, info, info_span, warn};

use crate::assets::StaticAssets;
use crate::commands::{CommandPolicy, CommandService};
use crate::config::PanelConfig;
use crate::console_ws::{ConsoleSocketConfig, ReplayStream, run_console_session};
use crate::error::{PanelError, Result};
use crate::game_pty::{GameConsole, GamePty};
use crate::http::{HttpResponse, RequestHead, read_head};
use crate::hub::ConsoleHub;
use crate::notify::{self, Notifier, QueuedNotifier};
use crate::presence::PresenceTracker;
use crate::relay::Relay;

/// Time allowed for a client to send its request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared by every connection thread.
pub struct AppState {
    pub commands: CommandService,
    pub hub: Arc<ConsoleHub>,
    pub assets: StaticAssets,
    pub socket: ConsoleSocketConfig,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Assemble state around an already running game.
    pub fn new(
        config: &PanelConfig,
        game: Box<dyn GameConsole>,
        hub: Arc<ConsoleHub>,
        presence: Arc<Mutex<PresenceTracker>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            commands: CommandService {
                policy: CommandPolicy::new(config.commands.allowed.iter().cloned()),
                game: Mutex::new(game),
                presence,
                notifier,
            },
            hub,
            assets: StaticAssets::new(&config.web.static_dir, &config.control_panel_header),
            socket: ConsoleSocketConfig {
                allowed_origins: config.web.allowed_origins.clone(),
                max_message_bytes: config.web.max_message_bytes,
                idle_sleep: config.web.idle_sleep(),
            },
            max_body_bytes: config.web.max_body_bytes,
        }
    }
}

/// `/cmd`
#[must_use]
pub fn command_route() -> String {
    format!("/{COMMAND_PATH}")
}

/// `/console`
#[must_use]
pub fn console_route() -> String {
    format!("/{CONSOLE_PATH}")
}

/// Response for a plain HTTP request.
pub fn route(state: &AppState, head: &RequestHead, body: &[u8], client: IpAddr) -> HttpResponse {
    if head.path == command_route() {
        if head.method != "POST" {
            return HttpResponse::method_not_allowed("POST");
        }
        let command = String::from_utf8_lossy(body);
        let reply = state
            .commands
            .execute(&command, &client_ip_text(client));
        return HttpResponse::json(reply.status, &reply.body);
    }
    if head.path == console_route() {
        return HttpResponse::bad_request("websocket upgrade required");
    }
    if head.method != "GET" {
        return HttpResponse::method_not_allowed("GET");
    }
    match state.assets.respond(&head.path) {
        Ok(response) => response,
        Err(error) => {
            warn!(%error, path = %head.path, "static file read failed");
            HttpResponse::text(500, "internal server error")
        }
    }
}

/// IPv4-mapped addresses are shown as plain IPv4, the form the game prints.
#[must_use]
pub fn client_ip_text(ip: IpAddr) -> String {
    ip.to_canonical().to_string()
}

pub struct PanelServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl PanelServer {
    pub fn bind(addr: SocketAddr, state: Arc<AppState>) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    pub fn serve(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "control panel listening");
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(error) => {
                    warn!(%error, "accept failed");
                    continue;
                }
            };
            let state = Arc::clone(&self.state);
            let spawned = thread::Builder::new()
                .name("terrapanel-conn".to_string())
                .spawn(move || {
                    if let Err(error) = handle_connection(stream, peer, &state) {
                        debug!(%error, %peer, "connection ended with error");
                    }
                });
            if let Err(error) = spawned {
                warn!(%error, "failed to spawn connection thread");
            }
        }
    }
}

fn handle_connection(mut stream: TcpStream, peer: SocketAddr, state: &AppState) -> Result<()> {
    stream.set_read_timeout(Some(REQUEST_TIMEOUT))?;
    let read = match read_head(&mut stream) {
        Ok(read) => read,
        Err(PanelError::BadRequest { message }) => {
            HttpResponse::bad_request(&message).write_to(&mut stream)?;
            return Ok(());
        }
        Err(error) => return Err(error),
    };

    let span = info_span!("panel.request", method = %read.head.method, path = %read.head.path, %peer);
    let _guard = span.enter();

    if read.head.path == console_route() && read.head.is_websocket_upgrade() {
        if read.head.method != "GET" {
            HttpResponse::method_not_allowed("GET").write_to(&mut stream)?;
            return Ok(());
        }
        stream.set_read_timeout(None)?;
        stream.set_nodelay(true)?;
        let summary = run_console_session(
            ReplayStream::new(read.raw, stream),
            &state.hub,
            &state.socket,
        )?;
        info!(
            connected_at = %summary.connected_at,
            lines_sent = summary.lines_sent,
            frames_received = summary.frames_received,
            "console client disconnected"
        );
        return Ok(());
    }

    let body = match read.read_body(&mut stream, state.max_body_bytes) {
        Ok(body) => body,
        Err(PanelError::BadRequest { message }) => {
            HttpResponse::text(413, &message).write_to(&mut stream)?;
            return Ok(());
        }
        Err(error) => return Err(error),
    };
    let response = route(state, &read.head, &body, peer.ip());
    debug!(status = response.status, "responded");
    response.write_to(&mut stream)?;
    Ok(())
}

/// Start the game, relay its console, and serve the panel until the
/// listener fails.
pub fn serve(config: &PanelConfig) -> Result<()> {
    let hub = Arc::new(ConsoleHub::new(config.web.backlog_lines));
    let presence = Arc::new(Mutex::new(PresenceTracker::new()));
    let announcer = notify::from_config(&config.discord)?;
    let notifier: Arc<dyn Notifier> = Arc::new(QueuedNotifier::spawn(announcer)?);

    let (lines_tx, lines_rx) = mpsc::channel();
    let game = GamePty::spawn(config.game.clone(), lines_tx)?;
    Relay {
        hub: Arc::clone(&hub),
        presence: Arc::clone(&presence),
        notifier: Arc::clone(&notifier),
    }
    .spawn(lines_rx)?;

    let state = Arc::new(AppState::new(config, Box::new(game), hub, presence, notifier));
    PanelServer::bind(config.web.bind, state)?.serve()
}
