//! WebSocket Actor - Host/Guest Message Channel
//!
//! This actor is responsible for:
//! - Accepting WebSocket connections from the host and guest origins
//! - Reading each client's hello and binding its role to its origin
//! - Broadcasting [`HostEvent`]s to host clients
//! - Forwarding guest messages to the engine, tagged with the guest's handle
//! - Closing guest sockets whose run was superseded
//!
//! # Architecture
//!
//! ```text
//! EngineActor --[Publish]--> WsActor --[broadcast]--> host pages
//!      ^
//!      +-----[EngineMsg::Guest]----- reader thread <----- guest shims
//! ```

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tungstenite::WebSocket;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::Message;

use super::messages::{EngineMsg, WsMsg};
use crate::engine::HostEvent;
use crate::host::HandleId;
use crate::relay::ClientHello;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Longest a connection may take to complete its opening handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// What a client announced itself as.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Role {
    Host,
    Guest(HandleId),
}

impl Role {
    fn from_hello(text: &str) -> Option<Self> {
        match ClientHello::from_json(text)? {
            ClientHello::Host => Some(Self::Host),
            ClientHello::Guest { handle } => HandleId::parse(&handle).map(Self::Guest),
        }
    }
}

/// Page origins allowed on the channel.
///
/// The host role is only granted to the host origin and the guest role only
/// to the guest origin.
#[derive(Debug, Clone)]
pub struct ClientOrigins {
    pub host: String,
    pub guest: String,
}

impl ClientOrigins {
    /// Whether a handshake carrying `origin` is accepted at all.
    fn admits(&self, origin: Option<&str>) -> bool {
        origin.is_some_and(|origin| origin == self.host || origin == self.guest)
    }

    /// Role announced by `hello`, if a client from `origin` may take it.
    fn role(&self, hello: &str, origin: Option<&str>) -> Option<Role> {
        let role = Role::from_hello(hello)?;
        let expected = match role {
            Role::Host => &self.host,
            Role::Guest(_) => &self.guest,
        };
        (origin == Some(expected.as_str())).then_some(role)
    }
}

struct RegisteredClient {
    ws: WebSocket<TcpStream>,
    /// `Origin` header of the handshake
    origin: Option<String>,
    /// `None` until the hello arrives
    role: Option<Role>,
}

/// WebSocket Actor - manages client connections and broadcasts
pub struct WsActor {
    rx: mpsc::Receiver<WsMsg>,
    engine_tx: mpsc::Sender<EngineMsg>,
    origins: ClientOrigins,
    /// Connected clients (shared for broadcast + read threads)
    clients: Arc<Mutex<Vec<RegisteredClient>>>,
    /// Last run outcome, replayed to hosts that connect later
    last_run: Arc<Mutex<Option<String>>>,
}

impl WsActor {
    pub fn new(
        rx: mpsc::Receiver<WsMsg>,
        engine_tx: mpsc::Sender<EngineMsg>,
        origins: ClientOrigins,
    ) -> Self {
        Self {
            rx,
            engine_tx,
            origins,
            clients: Arc::new(Mutex::new(Vec::new())),
            last_run: Arc::new(Mutex::new(None)),
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let clients = Arc::clone(&self.clients);
        let last_run = Arc::clone(&self.last_run);
        let engine_tx = self.engine_tx.clone();
        let origins = self.origins.clone();
        std::thread::spawn(move || client_reader_loop(clients, last_run, engine_tx, origins));

        while let Some(msg) = self.rx.recv().await {
            match msg {
                WsMsg::Publish(event) => self.publish(&event),

                WsMsg::AddClient(stream) => {
                    // Handshakes block on the peer; keep them off the actor.
                    let clients = Arc::clone(&self.clients);
                    let origins = self.origins.clone();
                    tokio::task::spawn_blocking(move || add_client(stream, &origins, &clients));
                }

                WsMsg::Shutdown => {
                    crate::debug!("ws"; "shutting down");
                    let mut clients = self.clients.lock();
                    for mut client in clients.drain(..) {
                        let _ = client.ws.close(None);
                        let _ = client.ws.flush();
                    }
                    break;
                }
            }
        }
    }

    fn publish(&self, event: &HostEvent) {
        let json = event.to_json();

        if matches!(
            event,
            HostEvent::RunStarted { .. } | HostEvent::RunFailed { .. }
        ) {
            *self.last_run.lock() = Some(json.clone());
        }
        if let Some(live) = event.started_handle() {
            self.close_stale_guests(live);
        }
        self.broadcast_to_hosts(Message::Text(json.into()));
    }

    /// Broadcast a message to all host clients
    fn broadcast_to_hosts(&self, msg: Message) {
        let mut clients = self.clients.lock();
        let mut sent = 0;

        clients.retain_mut(|client| {
            if client.role != Some(Role::Host) {
                return true;
            }
            match client.ws.send(msg.clone()) {
                Ok(_) => {
                    sent += 1;
                    true
                }
                Err(e) => {
                    crate::debug!("ws"; "host disconnected: {}", e);
                    false
                }
            }
        });

        if sent == 0 {
            crate::debug!("ws"; "no host clients connected");
        }
    }

    /// Close every guest socket that belongs to a run other than `live`.
    fn close_stale_guests(&self, live: &HandleId) {
        let mut clients = self.clients.lock();
        clients.retain_mut(|client| match &client.role {
            Some(Role::Guest(handle)) if handle != live => {
                crate::debug!("ws"; "closing guest {}", handle.short());
                let _ = client.ws.close(None);
                let _ = client.ws.flush();
                false
            }
            _ => true,
        });
    }
}

/// Complete the handshake on `stream` and register the client.
///
/// Connections from any origin but the host's or the guest's are refused
/// with `403`. A peer that stalls is dropped after [`HANDSHAKE_TIMEOUT`].
fn add_client(
    stream: TcpStream,
    origins: &ClientOrigins,
    clients: &Mutex<Vec<RegisteredClient>>,
) {
    // Keep blocking mode during handshake, switch to non-blocking after
    if let Err(e) = stream
        .set_read_timeout(Some(HANDSHAKE_TIMEOUT))
        .and_then(|()| stream.set_write_timeout(Some(HANDSHAKE_TIMEOUT)))
    {
        crate::log!("ws"; "handshake setup failed: {}", e);
        return;
    }

    let mut origin = None;
    let check_origin = |request: &Request, response: Response| {
        origin = request
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if origins.admits(origin.as_deref()) {
            Ok(response)
        } else {
            Err(forbidden())
        }
    };
    let accepted = tungstenite::accept_hdr(stream, check_origin).map_err(|e| e.to_string());

    match accepted {
        Ok(ws) => {
            let stream = ws.get_ref();
            if let Err(e) = stream
                .set_read_timeout(None)
                .and_then(|()| stream.set_nonblocking(true))
            {
                crate::log!("ws"; "dropping client: {}", e);
                return;
            }
            let mut clients = clients.lock();
            crate::debug!("ws"; "client connected (total: {})", clients.len() + 1);
            clients.push(RegisteredClient {
                ws,
                origin,
                role: None,
            });
        }
        Err(e) => match origin {
            Some(origin) if !origins.admits(Some(origin.as_str())) => {
                crate::log!("ws"; "refused connection from {}", origin);
            }
            _ => crate::log!("ws"; "handshake failed: {}", e),
        },
    }
}

fn forbidden() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("origin not allowed".to_string()));
    *response.status_mut() = StatusCode::FORBIDDEN;
    response
}

/// Background thread to read client messages (non-blocking poll)
fn client_reader_loop(
    clients: Arc<Mutex<Vec<RegisteredClient>>>,
    last_run: Arc<Mutex<Option<String>>>,
    engine_tx: mpsc::Sender<EngineMsg>,
    origins: ClientOrigins,
) {
    while !crate::core::is_shutdown() {
        std::thread::sleep(POLL_INTERVAL);

        let mut forwarded = Vec::new();
        {
            let mut clients_guard = clients.lock();
            let mut disconnected = Vec::new();

            for (i, client) in clients_guard.iter_mut().enumerate() {
                // Drain everything buffered on this socket
                loop {
                    match client.ws.read() {
                        Ok(Message::Text(text)) => match &client.role {
                            None => match origins.role(&text, client.origin.as_deref()) {
                                Some(role) => {
                                    crate::debug!("ws"; "client announced {:?}", role);
                                    if role == Role::Host
                                        && let Some(json) = last_run.lock().clone()
                                    {
                                        let _ = client.ws.send(Message::Text(json.into()));
                                    }
                                    client.role = Some(role);
                                }
                                None => {
                                    crate::log!(
                                        "ws";
                                        "dropping client from {} without a valid hello",
                                        client.origin.as_deref().unwrap_or("unknown origin")
                                    );
                                    disconnected.push(i);
                                    break;
                                }
                            },
                            Some(Role::Guest(handle)) => {
                                forwarded.push((handle.clone(), text.to_string()));
                            }
                            // Hosts only listen.
                            Some(Role::Host) => {}
                        },
                        Ok(Message::Close(_)) => {
                            disconnected.push(i);
                            break;
                        }
                        Ok(_) => {}
                        Err(tungstenite::Error::Io(ref e))
                            if e.kind() == std::io::ErrorKind::WouldBlock =>
                        {
                            break;
                        }
                        Err(_) => {
                            disconnected.push(i);
                            break;
                        }
                    }
                }
            }

            for i in disconnected.into_iter().rev() {
                clients_guard.remove(i);
            }
        }

        // Lock released: the engine may be publishing through this actor.
        for (handle, raw) in forwarded {
            if engine_tx
                .blocking_send(EngineMsg::Guest { handle, raw })
                .is_err()
            {
                return;
            }
        }
    }
}

/// Accept WebSocket connections on `listener` and hand them to the actor.
pub fn spawn_acceptor(listener: TcpListener, ws_tx: mpsc::Sender<WsMsg>) -> std::io::Result<()> {
    listener.set_nonblocking(true)?;

    std::thread::spawn(move || {
        while !crate::core::is_shutdown() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    crate::debug!("ws"; "connection from {}", addr);
                    // Set blocking for the handshake
                    if let Err(e) = stream.set_nonblocking(false) {
                        crate::log!("ws"; "dropping connection from {}: {}", addr, e);
                        continue;
                    }
                    if ws_tx.blocking_send(WsMsg::AddClient(stream)).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    crate::log!("ws"; "accept error: {}", e);
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Instant;
    use tungstenite::client::IntoClientRequest;
    use tungstenite::http::HeaderValue;

    const HOST: &str = "http://localhost:5310";
    const GUEST: &str = "http://127.0.0.1:5311";

    fn origins() -> ClientOrigins {
        ClientOrigins {
            host: HOST.into(),
            guest: GUEST.into(),
        }
    }

    fn guest_hello() -> (HandleId, String) {
        let id = "cd".repeat(16);
        let hello = format!(r#"{{"role":"guest","handle":"{}"}}"#, id);
        (HandleId::parse(&id).unwrap(), hello)
    }

    /// Connect a client sending `origin` and run `add_client` on the server side.
    fn connect(origin: Option<&'static str>) -> (bool, Vec<RegisteredClient>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = std::thread::spawn(move || {
            let mut request = format!("ws://{addr}/").into_client_request().unwrap();
            if let Some(origin) = origin {
                request
                    .headers_mut()
                    .insert("origin", HeaderValue::from_static(origin));
            }
            let stream = TcpStream::connect(addr).unwrap();
            tungstenite::client(request, stream).is_ok()
        });

        let (stream, _) = listener.accept().unwrap();
        let clients = Mutex::new(Vec::new());
        add_client(stream, &origins(), &clients);
        (client.join().unwrap(), clients.into_inner())
    }

    #[test]
    fn test_role_from_hello() {
        assert_eq!(Role::from_hello(r#"{"role":"host"}"#), Some(Role::Host));

        let id = "ab".repeat(16);
        let hello = format!(r#"{{"role":"guest","handle":"{}"}}"#, id);
        assert_eq!(
            Role::from_hello(&hello),
            Some(Role::Guest(HandleId::parse(&id).unwrap()))
        );
    }

    #[test]
    fn test_role_rejects_bad_hello() {
        assert_eq!(Role::from_hello(r#"{"kind":"ready"}"#), None);
        assert_eq!(Role::from_hello(r#"{"role":"guest","handle":"../x"}"#), None);
        assert_eq!(Role::from_hello("not json"), None);
    }

    #[test]
    fn test_roles_are_bound_to_origins() {
        let origins = origins();
        let (handle, hello) = guest_hello();

        assert_eq!(origins.role(r#"{"role":"host"}"#, Some(HOST)), Some(Role::Host));
        assert_eq!(origins.role(&hello, Some(GUEST)), Some(Role::Guest(handle)));
    }

    #[test]
    fn test_guest_origin_cannot_claim_host() {
        // A popup opened by the guest keeps the guest origin.
        assert_eq!(origins().role(r#"{"role":"host"}"#, Some(GUEST)), None);
        assert_eq!(origins().role(r#"{"role":"host"}"#, None), None);
    }

    #[test]
    fn test_host_origin_cannot_claim_guest() {
        let (_, hello) = guest_hello();
        assert_eq!(origins().role(&hello, Some(HOST)), None);
        assert_eq!(origins().role(&hello, Some("http://evil.test")), None);
    }

    #[test]
    fn test_handshake_records_origin() {
        let (connected, clients) = connect(Some(GUEST));
        assert!(connected);
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].origin.as_deref(), Some(GUEST));
        assert_eq!(clients[0].role, None);
    }

    #[test]
    fn test_handshake_refuses_foreign_origin() {
        let (connected, clients) = connect(Some("http://evil.test"));
        assert!(!connected);
        assert!(clients.is_empty());

        let (connected, clients) = connect(None);
        assert!(!connected);
        assert!(clients.is_empty());
    }

    #[test]
    fn test_silent_connection_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut silent = TcpStream::connect(addr).unwrap();
        let (stream, _) = listener.accept().unwrap();

        // Half a request line, then nothing.
        silent.write_all(b"GET / HT").unwrap();

        let clients = Mutex::new(Vec::new());
        let started = Instant::now();
        add_client(stream, &origins(), &clients);

        assert!(started.elapsed() < HANDSHAKE_TIMEOUT * 3);
        assert!(clients.lock().is_empty());
        drop(silent);
    }
}
