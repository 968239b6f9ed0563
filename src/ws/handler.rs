//! WebSocket upgrade handler and connection lifecycle
//!
//! Authentication happens in-band: the first successful login or
//! registration message creates the session and starts its world.
//! Everything after that is player_event forwarding in, diffs out.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{GameSession, SessionCommand, SessionHandle};
use crate::store::User;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, Credentials, PlayerEvent, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection state: at most one authenticated user, at most one
/// running session at a time
struct Connection {
    state: AppState,
    out_tx: mpsc::UnboundedSender<ServerMsg>,
    user: Option<User>,
    current: Option<SessionHandle>,
}

enum AuthKind {
    Login,
    Registration,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("new WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMsg>();

    // Writer task: session output -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let rate_limiter = ConnectionRateLimiter::new();
    let mut conn = Connection {
        state,
        out_tx,
        user: None,
        current: None,
    };

    // Reader loop: WebSocket -> connection state machine
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!("rate limited client message");
                    continue;
                }
                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => conn.handle_message(msg).await,
                    // Unknown or malformed payloads are skipped, the
                    // session keeps running
                    Err(e) => warn!(error = %e, "unrecognized client message, skipping"),
                }
            }
            Ok(Message::Binary(_)) => {
                warn!("received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!("keep-alive frame");
            }
            Ok(Message::Close(_)) => {
                info!("client initiated close");
                break;
            }
            Err(e) => {
                error!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    conn.shutdown();
    writer_handle.abort();

    info!("WebSocket connection closed");
}

impl Connection {
    async fn handle_message(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::Login(creds) => self.authenticate(creds, AuthKind::Login).await,
            ClientMsg::Registration(creds) => {
                self.authenticate(creds, AuthKind::Registration).await
            }
            ClientMsg::NewGame => match self.user.clone() {
                Some(user) => self.start_session(user),
                None => warn!("new_game before authentication, ignoring"),
            },
            ClientMsg::PlayerEvent { message } => self.forward_event(message).await,
        }
    }

    /// Check credentials against the backend; success silently creates and
    /// runs a session, failure is surfaced as a typed auth_error.
    async fn authenticate(&mut self, creds: Credentials, kind: AuthKind) {
        if self.user.is_some() {
            warn!(username = %creds.username, "already authenticated, ignoring");
            return;
        }

        let result = match kind {
            AuthKind::Login => {
                self.state
                    .backend
                    .check_login(&creds.username, &creds.password)
                    .await
            }
            AuthKind::Registration => {
                self.state
                    .backend
                    .register(&creds.username, &creds.password)
                    .await
            }
        };

        match result {
            Ok(Some(user)) => {
                info!(username = %user.username, "authenticated");
                self.user = Some(user.clone());
                self.start_session(user);
            }
            Ok(None) => {
                let reason = match kind {
                    AuthKind::Login => "incorrect username or password",
                    AuthKind::Registration => "user already exists",
                };
                debug!(username = %creds.username, reason, "auth rejected");
                let _ = self
                    .out_tx
                    .send(ServerMsg::AuthError(reason.to_string()));
            }
            Err(e) => {
                error!(username = %creds.username, error = %e, "auth backend failed");
                let _ = self.out_tx.send(ServerMsg::AuthError(
                    "authentication service unavailable".to_string(),
                ));
            }
        }
    }

    /// Spawn a fresh world for the authenticated user, superseding any
    /// previous one on this connection.
    fn start_session(&mut self, user: User) {
        if let Some(old) = self.current.take() {
            // Explicit shutdown: the old session persists its score but
            // must not announce game over on the shared outbound channel
            let _ = old.command_tx.try_send(SessionCommand::Shutdown);
            self.state.sessions.remove(&old.id);
        }

        let session_id = Uuid::new_v4();
        let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(64);
        let seed = rand::random::<u64>();

        let session = GameSession::new(
            session_id,
            user.clone(),
            self.state.game_config.clone(),
            seed,
            self.out_tx.clone(),
        );

        let handle = SessionHandle {
            id: session_id,
            username: user.username.clone(),
            command_tx,
        };
        self.state.sessions.insert(handle.clone());
        self.current = Some(handle);

        let registry = self.state.sessions.clone();
        let backend = self.state.backend.clone();
        tokio::spawn(async move {
            session.run(command_rx, backend).await;
            registry.remove(&session_id);
        });

        info!(session_id = %session_id, username = %user.username, "session spawned");
    }

    async fn forward_event(&mut self, event: PlayerEvent) {
        match &self.current {
            Some(handle) => {
                if handle
                    .command_tx
                    .send(SessionCommand::Input(event))
                    .await
                    .is_err()
                {
                    debug!("session gone, dropping player event");
                }
            }
            None => warn!("player_event before authentication, ignoring"),
        }
    }

    /// Release the session on disconnect; the session task notices the
    /// closed input channel and terminates itself.
    fn shutdown(&mut self) {
        if let Some(handle) = self.current.take() {
            self.state.sessions.remove(&handle.id);
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
