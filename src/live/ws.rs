//! WebSocket transport for the live channel.
//!
//! ```text
//! Emitter ──subscribe──▶ forwarder task ──broadcast──▶ clients
//!                                                        ▲
//! acceptor thread ──handshake + `connected`──────────────┘
//! ```
//!
//! A client whose send fails is dropped. A reader thread polls clients for
//! close frames.

use std::net::{IpAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::{Emitter, LiveEvent};
use crate::{debug, log};

/// Maximum port retry attempts
pub const MAX_PORT_RETRIES: u16 = 10;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Bind the live channel and start forwarding `emitter` events.
///
/// Returns the port actually bound.
pub fn start(interface: IpAddr, base_port: u16, emitter: &Emitter) -> Result<u16> {
    let (listener, port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;
    let clients: Clients = Arc::new(Mutex::new(Vec::new()));

    let accepted = Arc::clone(&clients);
    std::thread::spawn(move || accept_loop(&listener, &accepted));

    let polled = Arc::clone(&clients);
    std::thread::spawn(move || reader_loop(&polled));

    let mut rx = emitter.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => broadcast(&clients, &event),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("live"; "forwarder lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        for mut client in clients.lock().drain(..) {
            let _ = client.close(None);
        }
    });

    Ok(port)
}

fn accept_loop(listener: &TcpListener, clients: &Clients) {
    loop {
        if crate::core::is_shutdown() {
            break;
        }
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!("live"; "client connected: {}", addr);
                let _ = stream.set_nonblocking(false);
                add_client(stream, clients);
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                log!("live"; "accept error: {}", e);
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Handshake in blocking mode, then switch to non-blocking for polling.
fn add_client(stream: TcpStream, clients: &Clients) {
    let mut ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(e) => {
            log!("live"; "handshake failed: {}", e);
            return;
        }
    };
    if let Err(e) = ws.send(Message::Text(LiveEvent::connected().to_json().into())) {
        debug!("live"; "client gone before connected: {}", e);
        return;
    }
    let _ = ws.get_ref().set_nonblocking(true);

    let mut clients = clients.lock();
    clients.push(ws);
    debug!("live"; "{} clients", clients.len());
}

fn reader_loop(clients: &Clients) {
    loop {
        std::thread::sleep(POLL_INTERVAL);
        if crate::core::is_shutdown() {
            break;
        }
        clients.lock().retain_mut(|client| match client.read() {
            Ok(Message::Close(_)) => false,
            Ok(_) => true,
            Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                true
            }
            Err(_) => false,
        });
    }
}

fn broadcast(clients: &Clients, event: &LiveEvent) {
    let text = event.to_json();
    let mut clients = clients.lock();
    let before = clients.len();
    clients.retain_mut(|client| match client.send(Message::Text(text.clone().into())) {
        Ok(()) => true,
        Err(e) => {
            debug!("live"; "client dropped: {}", e);
            false
        }
    });
    debug!("live"; "{} sent to {}/{} clients", event.name(), clients.len(), before);
}

/// Try binding to port, retry with incremented port if in use
pub fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind((interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind live channel after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
