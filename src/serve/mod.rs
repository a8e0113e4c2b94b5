//! Development server for the output directory.
//!
//! ```text
//! GET /__kiln/live.js   live client bound to the WebSocket port
//! GET /<path>           file from the output directory (HTML gets the client)
//! otherwise             404.html or plain 404
//! ```
//!
//! Requests arriving while a build writes the output wait for it to finish.

mod client;
mod response;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam::channel;
use tiny_http::{Request, Server};

use crate::core;
use crate::utils::path::serve_path;
use crate::{debug, log};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Longest a request waits for a running build.
const BUSY_WAIT: Duration = Duration::from_secs(5);
const BUSY_POLL: Duration = Duration::from_millis(25);

/// Bound server ready to accept requests.
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
    shutdown_rx: channel::Receiver<()>,
}

/// Bind the HTTP server and register it with the Ctrl+C handler.
pub fn bind(interface: IpAddr, port: u16) -> Result<BoundServer> {
    let (server, addr) = bind_with_retry(interface, port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    core::register_server(Arc::clone(&server), shutdown_tx);

    Ok(BoundServer {
        server,
        addr,
        shutdown_rx,
    })
}

impl BoundServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Fires once when Ctrl+C is received.
    pub fn shutdown_signal(&self) -> channel::Receiver<()> {
        self.shutdown_rx.clone()
    }

    /// Serve `output` until the server is unblocked (blocking).
    pub fn run(self, output: PathBuf, ws_port: Option<u16>) {
        log!("serve"; "http://{}", self.addr);
        run_request_loop(&self.server, Arc::new(output), ws_port);
    }
}

/// Bind to the specified interface and port, with automatic port retry.
fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match Server::http(SocketAddr::new(interface, port)) {
            Ok(server) => {
                let addr = server
                    .server_addr()
                    .to_ip()
                    .unwrap_or_else(|| SocketAddr::new(interface, port));
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, addr.port());
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow::anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

fn run_request_loop(server: &Server, output: Arc<PathBuf>, ws_port: Option<u16>) {
    for request in server.incoming_requests() {
        let output = Arc::clone(&output);
        std::thread::spawn(move || {
            if let Err(e) = handle_request(request, &output, ws_port) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    debug!("serve"; "request loop stopped");
}

/// Handle a single HTTP request.
fn handle_request(request: Request, output: &std::path::Path, ws_port: Option<u16>) -> Result<()> {
    if core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    if let Some(port) = ws_port
        && request.url() == client::SCRIPT_URL
    {
        return response::respond_client(request, port);
    }

    wait_while_busy();

    match serve_path(request.url(), output) {
        Some(path) => response::respond_file(request, &path, ws_port),
        None => response::respond_not_found(request, output, ws_port),
    }
}

fn wait_while_busy() {
    let started = Instant::now();
    while core::is_busy() && started.elapsed() < BUSY_WAIT {
        std::thread::sleep(BUSY_POLL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{Ipv4Addr, TcpListener, TcpStream};
    use tempfile::TempDir;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_bind_skips_taken_port() {
        let taken = TcpListener::bind((LOCALHOST, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();
        let (_server, addr) = bind_with_retry(LOCALHOST, port).unwrap();
        assert_ne!(addr.port(), port);
    }

    #[test]
    fn test_serves_output_with_live_client() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<body>home</body>").unwrap();
        std::fs::write(dir.path().join("style.css"), "a {}").unwrap();

        let (server, addr) = bind_with_retry(LOCALHOST, 0).unwrap();
        let server = Arc::new(server);
        let looped = Arc::clone(&server);
        let output = Arc::new(dir.path().to_path_buf());
        let handle = std::thread::spawn(move || run_request_loop(&looped, output, Some(35729)));

        let home = get(addr, "/");
        assert!(home.starts_with("HTTP/1.1 200"));
        assert!(home.contains(r#"home<script src="/__kiln/live.js"></script></body>"#));

        let css = get(addr, "/style.css");
        assert!(css.ends_with("a {}"));

        let script = get(addr, client::SCRIPT_URL);
        assert!(script.contains("var port = 35729;"));

        assert!(get(addr, "/missing").starts_with("HTTP/1.1 404"));

        server.unblock();
        handle.join().unwrap();
    }
}
