//! HTTP response helpers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::client;
use crate::utils::mime::{self, types};

/// Respond with a file from the output directory. HTML gets the live
/// client injected when `ws_port` is set.
pub fn respond_file(request: Request, path: &Path, ws_port: Option<u16>) -> Result<()> {
    let content_type = mime::from_path(path);
    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let body = maybe_inject(body, content_type, ws_port);
    send_body(request, 200, content_type, body)
}

/// Respond with `404.html` from the output directory when present.
pub fn respond_not_found(request: Request, output: &Path, ws_port: Option<u16>) -> Result<()> {
    let custom = output.join("404.html");
    let custom = custom.is_file().then_some(custom);

    if is_head_request(&request) {
        let mime = if custom.is_some() { types::HTML } else { types::PLAIN };
        return send_head(request, 404, mime);
    }

    if let Some(path) = custom
        && let Ok(body) = fs::read(&path)
    {
        let body = maybe_inject(body, types::HTML, ws_port);
        return send_body(request, 404, types::HTML, body);
    }

    send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, types::PLAIN, b"503 Service Unavailable".to_vec())
}

/// Respond with the live client script.
pub fn respond_client(request: Request, ws_port: u16) -> Result<()> {
    let body = client::script(ws_port).into_bytes();
    send_body(request, 200, types::JAVASCRIPT, body)
}

fn maybe_inject(body: Vec<u8>, content_type: &str, ws_port: Option<u16>) -> Vec<u8> {
    if ws_port.is_some() && mime::is_html(content_type) {
        client::inject(&body)
    } else {
        body
    }
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response =
        Response::empty(StatusCode(status)).with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type))
        .with_header(make_header("Cache-Control", "no-store"));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    // Both halves are static ASCII.
    Header::from_bytes(key, value).unwrap()
}
