//! In-process fake Gmail server
//!
//! Every connection carries exactly one request: the response is sent with
//! `Connection: close` and the socket is shut down, so reqwest opens a fresh
//! connection for the next call and no keep-alive handling is needed.

use super::mailbox::{Mailbox, RecordedRequest};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct FakeGmailServer {
    port: u16,
    state: Arc<Mutex<Mailbox>>,
    /// Handle to the background task so it lives as long as the server.
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeGmailServer {
    pub async fn start(mailbox: Mailbox) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(mailbox));

        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, state).await;
                });
            }
        });

        Self {
            port,
            state,
            _handle: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn token_uri(&self) -> String {
        format!("{}/token", self.base_url())
    }

    /// Inspect the server state after the client has run.
    pub fn mailbox<R>(&self, f: impl FnOnce(&Mailbox) -> R) -> R {
        f(&self.state.lock().unwrap())
    }
}

impl Drop for FakeGmailServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<Mutex<Mailbox>>) -> std::io::Result<()> {
    let request = read_request(&mut stream).await?;
    let (status, body) = {
        let mut mailbox = state.lock().unwrap();
        let response = route(&mut mailbox, &request);
        mailbox.requests.push(request);
        response
    };
    write_response(&mut stream, status, &body.to_string()).await
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.parse().unwrap_or(0),
                "authorization" => authorization = Some(value.to_string()),
                _ => {}
            }
        }
    }

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = (body_start + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[body_start..body_end]).to_string();

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (target, Vec::new()),
    };

    Ok(RecordedRequest {
        method,
        path,
        query,
        authorization,
        body,
    })
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

fn route(mailbox: &mut Mailbox, request: &RecordedRequest) -> (u16, serde_json::Value) {
    let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();
    match (request.method.as_str(), segments.as_slice()) {
        ("GET", ["messages"]) => list_messages(mailbox, request),
        ("POST", ["messages", id, "modify"]) => modify_message(mailbox, id),
        ("POST", ["token"]) => (
            200,
            json!({
                "access_token": "ya29.refreshed",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/gmail.modify",
                "token_type": "Bearer"
            }),
        ),
        _ => (404, google_error(404, "Not Found", "notFound")),
    }
}

fn list_messages(mailbox: &Mailbox, request: &RecordedRequest) -> (u16, serde_json::Value) {
    if request.query_value("labelIds") != Some("INBOX") {
        return (400, google_error(400, "Expected labelIds=INBOX", "badRequest"));
    }
    let offset: usize = request
        .query_value("pageToken")
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);
    let end = (offset + mailbox.page_size).min(mailbox.inbox.len());
    let page: Vec<_> = mailbox.inbox[offset.min(end)..end]
        .iter()
        .map(|id| json!({ "id": id, "threadId": format!("t-{}", id) }))
        .collect();

    let mut body = json!({ "resultSizeEstimate": mailbox.inbox.len() });
    if !page.is_empty() {
        body["messages"] = json!(page);
    }
    if end < mailbox.inbox.len() {
        body["nextPageToken"] = json!(end.to_string());
    }
    (200, body)
}

fn modify_message(mailbox: &mut Mailbox, id: &str) -> (u16, serde_json::Value) {
    let call = mailbox.modify_calls;
    mailbox.modify_calls += 1;

    if mailbox.rate_limit_at == Some(call) {
        return (
            429,
            google_error(429, "Too many concurrent requests for user", "rateLimitExceeded"),
        );
    }
    if mailbox.missing.contains(id) {
        return (404, google_error(404, "Requested entity was not found.", "notFound"));
    }

    mailbox.inbox.retain(|existing| existing != id);
    mailbox.archived.push(id.to_string());
    (200, json!({ "id": id, "labelIds": ["CATEGORY_UPDATES"] }))
}

fn google_error(code: u16, message: &str, reason: &str) -> serde_json::Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "errors": [{ "message": message, "domain": "global", "reason": reason }]
        }
    })
}

async fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
