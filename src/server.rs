//! Development server with live reload.
//!
//! Serves the build tree over plain HTTP and pushes [`ReloadSignal`]s to every
//! open page through server-sent events.
//!
//! ## Routes
//!
//! | Path | Response |
//! |---|---|
//! | `/__simple-assets/client.js` | the reload client |
//! | `/__simple-assets/events` | `text/event-stream`, one `data:` line per signal |
//! | anything else | file from the build root; directories map to `index.html` |
//!
//! HTML responses get the client `<script>` injected before `</body>`. A
//! stylesheet signal swaps matching `<link>` tags in place; every other
//! signal reloads the page.
//!
//! ## Lifecycle
//!
//! [`ServerSession::start`] binds the listener and spawns the accept loop.
//! The session owns the [`ReloadHub`]; tasks and the watcher borrow it.
//! [`ServerSession::stop`] (or dropping the session) unblocks the listener
//! and disconnects every event stream.

use crate::config::ServerConfig;
use maud::{DOCTYPE, Markup, html};
use serde::Serialize;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server};

pub const CLIENT_PATH: &str = "/__simple-assets/client.js";
pub const EVENTS_PATH: &str = "/__simple-assets/events";

const KEEPALIVE: Duration = Duration::from_secs(15);
const PLAIN: &str = "text/plain; charset=utf-8";

const CLIENT_JS: &str = r#"(function () {
  var source = new EventSource("/__simple-assets/events");
  source.onmessage = function (event) {
    var signal = JSON.parse(event.data);
    if (signal.type === "css") {
      var swapped = false;
      document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
        var url = new URL(link.href);
        if (url.pathname.replace(/^\//, "") === signal.path) {
          url.searchParams.set("v", Date.now());
          link.href = url.toString();
          swapped = true;
        }
      });
      if (swapped) return;
    }
    location.reload();
  };
})();
"#;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Could not listen on {addr}: {message}")]
    Bind { addr: String, message: String },
}

/// What connected browsers should do after a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadSignal {
    /// Swap the stylesheet at `path` (build-root-relative) without a reload.
    Css { path: String },
    /// A script or other asset changed.
    Asset { path: String },
    /// Reload the whole page.
    Reload,
}

/// Fan-out of reload signals to every open event stream.
///
/// Delivery is fire-and-forget: subscribers that have gone away are dropped
/// on the next broadcast.
#[derive(Debug, Default)]
pub struct ReloadHub {
    subscribers: Mutex<Vec<Sender<ReloadSignal>>>,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<ReloadSignal> {
        let (tx, rx) = mpsc::channel();
        self.lock().push(tx);
        rx
    }

    /// Send `signal` to every live subscriber. Returns how many received it.
    pub fn broadcast(&self, signal: ReloadSignal) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(signal.clone()).is_ok());
        tracing::debug!(?signal, delivered = subscribers.len(), "reload broadcast");
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Disconnect every subscriber.
    pub fn close(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<ReloadSignal>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A running dev server.
pub struct ServerSession {
    server: Arc<Server>,
    addr: SocketAddr,
    hub: Arc<ReloadHub>,
    listener: Option<JoinHandle<()>>,
}

impl ServerSession {
    /// Bind `config.host:config.port` and start serving `root`.
    pub fn start(root: &Path, config: &ServerConfig) -> Result<Self, ServerError> {
        let requested = format!("{}:{}", config.host, config.port);
        let bind_error = |message: String| ServerError::Bind {
            addr: requested.clone(),
            message,
        };

        let server = Server::http(requested.as_str()).map_err(|e| bind_error(e.to_string()))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| bind_error("not an IP listener".to_string()))?;
        let server = Arc::new(server);
        let hub = Arc::new(ReloadHub::new());

        let site = Arc::new(Site {
            root: root.to_path_buf(),
            cors: config.cors,
            hub: Arc::clone(&hub),
        });
        let accept = Arc::clone(&server);
        let listener = thread::spawn(move || {
            for request in accept.incoming_requests() {
                let site = Arc::clone(&site);
                thread::spawn(move || site.handle(request));
            }
        });

        tracing::info!(%addr, root = %root.display(), "dev server listening");
        Ok(Self {
            server,
            addr,
            hub,
            listener: Some(listener),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn hub(&self) -> &ReloadHub {
        &self.hub
    }

    /// Stop accepting connections and close every event stream.
    pub fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.server.unblock();
            self.hub.close();
            let _ = listener.join();
            tracing::info!(addr = %self.addr, "dev server stopped");
        }
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Site {
    root: PathBuf,
    cors: bool,
    hub: Arc<ReloadHub>,
}

type Body = Response<io::Cursor<Vec<u8>>>;

fn with_header(response: Body, name: &str, value: &str) -> Body {
    match Header::from_bytes(name, value) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

impl Site {
    fn handle(&self, request: Request) {
        let method = request.method().clone();
        let url = request.url().to_string();
        let path = url.split(['?', '#']).next().unwrap_or("/").to_string();

        let result = match (&method, path.as_str()) {
            (Method::Options, _) => self.respond(request, 204, None, Vec::new()),
            (Method::Get, EVENTS_PATH) => self.stream_events(request),
            (Method::Get | Method::Head, CLIENT_PATH) => self.respond(
                request,
                200,
                Some("application/javascript; charset=utf-8"),
                CLIENT_JS.as_bytes().to_vec(),
            ),
            (Method::Get | Method::Head, _) => self.serve_file(request, &path),
            _ => self.respond(request, 405, Some(PLAIN), b"Method Not Allowed".to_vec()),
        };

        match result {
            Ok(()) => tracing::debug!(%method, %url, "request"),
            Err(e) => tracing::debug!(%method, %url, error = %e, "response failed"),
        }
    }

    fn respond(
        &self,
        request: Request,
        status: u16,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> io::Result<()> {
        let mut response = Response::from_data(body).with_status_code(status);
        if let Some(content_type) = content_type {
            response = with_header(response, "Content-Type", content_type);
        }
        response = with_header(response, "Cache-Control", "no-cache");
        if self.cors {
            response = with_header(response, "Access-Control-Allow-Origin", "*");
            response = with_header(
                response,
                "Access-Control-Allow-Methods",
                "GET, HEAD, OPTIONS",
            );
            response = with_header(response, "Access-Control-Allow-Headers", "*");
        }
        request.respond(response)
    }

    fn serve_file(&self, request: Request, path: &str) -> io::Result<()> {
        let Some(file) = resolve(&self.root, path) else {
            return self.respond(request, 403, Some(PLAIN), b"Forbidden".to_vec());
        };
        let content_type = content_type(&file);
        match std::fs::read(&file) {
            Ok(bytes) if content_type.starts_with("text/html") => {
                let html = inject_client(&String::from_utf8_lossy(&bytes));
                self.respond(request, 200, Some(content_type), html.into_bytes())
            }
            Ok(bytes) => self.respond(request, 200, Some(content_type), bytes),
            Err(_) => {
                let page = inject_client(&not_found_page(path).into_string());
                self.respond(request, 404, Some("text/html; charset=utf-8"), page.into_bytes())
            }
        }
    }

    /// Hold the connection open and forward every broadcast as an SSE message.
    fn stream_events(&self, request: Request) -> io::Result<()> {
        let signals = self.hub.subscribe();
        let mut stream = request.into_writer();

        let mut head = String::from(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: keep-alive\r\n",
        );
        if self.cors {
            head.push_str("Access-Control-Allow-Origin: *\r\n");
        }
        head.push_str("\r\n: connected\n\n");
        stream.write_all(head.as_bytes())?;
        stream.flush()?;

        loop {
            let message = match signals.recv_timeout(KEEPALIVE) {
                Ok(signal) => match serde_json::to_string(&signal) {
                    Ok(json) => format!("data: {json}\n\n"),
                    Err(e) => {
                        tracing::warn!(error = %e, "could not encode reload signal");
                        continue;
                    }
                },
                Err(RecvTimeoutError::Timeout) => ": ping\n\n".to_string(),
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            };
            stream.write_all(message.as_bytes())?;
            stream.flush()?;
        }
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Map a request path onto the build root. `None` if it tries to leave it.
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode(request_path);
    let mut path = root.to_path_buf();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') => return None,
            s => path.push(s),
        }
    }
    if path.is_dir() {
        path.push("index.html");
    }
    Some(path)
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "webmanifest" => "application/manifest+json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" => PLAIN,
        _ => "application/octet-stream",
    }
}

/// Insert the reload client before `</body>`, or append it.
pub fn inject_client(html: &str) -> String {
    let tag = format!(r#"<script src="{CLIENT_PATH}"></script>"#);
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(at) => format!("{}{}{}", &html[..at], tag, &html[at..]),
        None => format!("{html}{tag}"),
    }
}

fn not_found_page(path: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { "Not found" }
            }
            body {
                h1 { "404 Not Found" }
                p { code { (path) } " is not in the build tree." }
            }
        }
    }
}
