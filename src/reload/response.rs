//! HTTP response helpers.

use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::ErrorHandler;
use crate::log;
use crate::utils::mime::types::{HTML, JAVASCRIPT, PLAIN};

/// Respond with a static file, or `500` when it cannot be read.
pub fn respond_file(request: Request, path: &Path, handler: Option<&ErrorHandler>) -> Result<()> {
    let content_type = crate::utils::mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    match fs::read(path) {
        Ok(body) => send_body(request, 200, content_type, body),
        Err(err) => {
            log!("serve"; "failed to read {}: {}", path.display(), err);
            respond_error(request, 500, handler)
        }
    }
}

/// Respond with the live reload client script.
pub fn respond_livereload_js(request: Request, ws_port: u16) -> Result<()> {
    use crate::embed::serve::{LIVERELOAD_JS, LivereloadVars};

    if is_head_request(&request) {
        return send_head(request, 200, JAVASCRIPT);
    }
    let body = LIVERELOAD_JS.render(&LivereloadVars { ws_port });
    send_body(request, 200, JAVASCRIPT, body.into_bytes())
}

/// Respond with `302 Found` pointing at `location`.
pub fn respond_redirect(request: Request, location: &str) -> Result<()> {
    let response = Response::empty(StatusCode(302)).with_header(header("Location", location)?);
    request.respond(response)?;
    Ok(())
}

/// Respond with an error status, preferring the page from `handler`.
pub fn respond_error(request: Request, status: u16, handler: Option<&ErrorHandler>) -> Result<()> {
    let custom = handler.and_then(|handler| handler(status));
    let content_type = if custom.is_some() { HTML } else { PLAIN };

    if is_head_request(&request) {
        return send_head(request, status, content_type);
    }

    let body = custom.unwrap_or_else(|| default_error_body(status).into_bytes());
    send_body(request, status, content_type, body)
}

/// Built-in plain-text body for an error status.
pub fn default_error_body(status: u16) -> String {
    let reason = match status {
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    };
    format!("{status} {reason}")
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response = Response::empty(StatusCode(status))
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-store")?);
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-store")?);
    request.respond(response)?;
    Ok(())
}

fn header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow!("invalid header `{key}: {value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_error_body() {
        assert_eq!(default_error_body(404), "404 Not Found");
        assert_eq!(default_error_body(500), "500 Internal Server Error");
        assert_eq!(default_error_body(418), "418 Error");
    }

    #[test]
    fn test_header_rejects_invalid_bytes() {
        assert!(header("Location", "/docs/").is_ok());
        assert!(header("X-Test", "naïve").is_err());
    }
}
