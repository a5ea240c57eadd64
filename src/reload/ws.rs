//! WebSocket side of live reload.
//!
//! An acceptor thread hands raw connections to [`WsActor`], which performs
//! the handshake and broadcasts [`HotReloadMessage`]s to every client.
//!
//! ```text
//! acceptor --AddClient--> WsActor <--Reload/Error-- WatchActor
//!                            |
//!                            +--broadcast--> clients
//! ```

use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::message::HotReloadMessage;
use crate::{debug, log};

/// Default WebSocket port for live reload
pub const DEFAULT_WS_PORT: u16 = 35729;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Messages to the WebSocket actor
#[derive(Debug)]
pub enum WsMsg {
    AddClient(TcpStream),
    Reload { reason: String },
    Error { path: String, error: String },
    ClearError,
    Shutdown,
}

// =============================================================================
// Acceptor
// =============================================================================

/// Bind the WebSocket listener and accept clients until `stop` is set.
///
/// Returns the bound port, which may differ from `base_port` when that
/// port is taken.
pub fn start_acceptor(
    host: &str,
    base_port: u16,
    ws_tx: mpsc::Sender<WsMsg>,
    stop: Arc<AtomicBool>,
) -> Result<u16> {
    let (listener, port) = try_bind_port(host, base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;

    thread::Builder::new()
        .name("folio-ws-accept".into())
        .spawn(move || accept_loop(&listener, &ws_tx, &stop))?;

    Ok(port)
}

fn accept_loop(listener: &TcpListener, ws_tx: &mpsc::Sender<WsMsg>, stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!("ws"; "client connected: {}", addr);
                let _ = stream.set_nonblocking(false);
                if ws_tx.blocking_send(WsMsg::AddClient(stream)).is_err() {
                    break;
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                log!("ws"; "accept error: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    debug!("ws"; "acceptor stopped");
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(host: &str, base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind((host, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// =============================================================================
// Actor
// =============================================================================

/// Manages client connections and broadcasts
pub struct WsActor {
    rx: mpsc::Receiver<WsMsg>,
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
    /// Last build error, replayed to clients that connect while it stands
    pending_error: Option<(String, String)>,
}

impl WsActor {
    pub fn new(rx: mpsc::Receiver<WsMsg>) -> Self {
        Self {
            rx,
            clients: Arc::new(Mutex::new(Vec::new())),
            pending_error: None,
        }
    }

    pub async fn run(mut self) {
        let done = Arc::new(AtomicBool::new(false));
        let reader_clients = Arc::clone(&self.clients);
        let reader_done = Arc::clone(&done);
        thread::spawn(move || client_reader_loop(&reader_clients, &reader_done));

        while let Some(msg) = self.rx.recv().await {
            match msg {
                WsMsg::AddClient(stream) => self.add_client(stream),
                WsMsg::Reload { reason } => {
                    debug!("ws"; "sending reload: {}", reason);
                    self.broadcast(&HotReloadMessage::reload_with_reason(reason));
                }
                WsMsg::Error { path, error } => {
                    let msg = HotReloadMessage::error(&path, &error);
                    self.pending_error = Some((path, error));
                    self.broadcast(&msg);
                }
                WsMsg::ClearError => {
                    self.pending_error = None;
                    self.broadcast(&HotReloadMessage::clear_error());
                }
                WsMsg::Shutdown => {
                    debug!("ws"; "shutting down");
                    for mut client in self.clients.lock().drain(..) {
                        let _ = client.close(None);
                        let _ = client.flush();
                    }
                    break;
                }
            }
        }
        done.store(true, Ordering::Release);
    }

    fn add_client(&self, stream: TcpStream) {
        // Handshake in blocking mode, then switch to non-blocking for polling
        let mut ws = match tungstenite::accept(stream) {
            Ok(ws) => ws,
            Err(e) => {
                log!("ws"; "handshake failed: {}", e);
                return;
            }
        };

        if let Err(e) = ws.send(Message::Text(HotReloadMessage::connected().to_json().into())) {
            log!("ws"; "failed to send connected message: {}", e);
            return;
        }
        if let Some((path, error)) = &self.pending_error {
            let msg = HotReloadMessage::error(path, error);
            let _ = ws.send(Message::Text(msg.to_json().into()));
        }
        let _ = ws.get_ref().set_nonblocking(true);

        let mut clients = self.clients.lock();
        clients.push(ws);
        debug!("ws"; "client registered (total: {})", clients.len());
    }

    fn broadcast(&self, msg: &HotReloadMessage) {
        let text = msg.to_json();
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            debug!("ws"; "no clients connected");
            return;
        }

        clients.retain_mut(|client| match client.send(Message::Text(text.clone().into())) {
            Ok(()) => true,
            Err(e) => {
                debug!("ws"; "client disconnected: {}", e);
                false
            }
        });
        debug!("ws"; "broadcast to {} clients", clients.len());
    }
}

/// Drain incoming frames so pings are answered and closed clients dropped.
fn client_reader_loop(clients: &Mutex<Vec<WebSocket<TcpStream>>>, done: &AtomicBool) {
    while !done.load(Ordering::Acquire) {
        thread::sleep(ACCEPT_POLL);
        clients.lock().retain_mut(|client| match client.read() {
            Ok(Message::Close(_)) => false,
            Ok(_) => true,
            Err(tungstenite::Error::Io(ref e)) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(_) => false,
        });
    }
}
