//! Scripted HTTP/1.1 server for integration tests.
//!
//! Every route serves a static body with a [`Behavior`] deciding how the
//! server misbehaves. Connections are closed after each response so every
//! attempt opens its own connection. Requests are logged per route.
//!
//! [`TestServer::start_tls`] serves the same routes over TLS with a freshly
//! generated self-signed certificate.

use reqwest::Url;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Behavior {
    /// Honor `Range: bytes=N-` with 206, answer 416 past the end.
    Serve,
    /// Always answer 200 with the whole body.
    IgnoreRange,
    /// Always answer with this status and no body.
    Status(u16),
    /// Answer `status` for the first `times` requests, then serve.
    FailThenServe { status: u16, times: usize },
    /// For the first `times` requests, close the connection once the body
    /// reaches absolute offset `at`. Then serve.
    ResetAt { at: usize, times: usize },
    /// Wait before answering, then serve.
    Slow(Duration),
    /// Serve in `chunk`-byte pieces with `delay` between them.
    Trickle { chunk: usize, delay: Duration },
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub range: Option<String>,
    pub user_agent: Option<String>,
    /// Every request header, names lowercased.
    pub headers: HashMap<String, String>,
}

struct Route {
    body: Arc<Vec<u8>>,
    behavior: Behavior,
    served: usize,
}

#[derive(Default)]
struct State {
    routes: Mutex<HashMap<String, Route>>,
    hits: Mutex<HashMap<String, Vec<Hit>>>,
    waiting: AtomicUsize,
    peak: AtomicUsize,
}

pub struct TestServer {
    base: String,
    state: Arc<State>,
}

impl TestServer {
    /// Start listening on an ephemeral port. The server runs until the
    /// process exits.
    pub fn start() -> Self {
        Self::start_with(None)
    }

    /// Like [`TestServer::start`], over HTTPS with a self-signed certificate
    /// for `127.0.0.1` and `localhost`.
    pub fn start_tls() -> Self {
        Self::start_with(Some(self_signed_config()))
    }

    fn start_with(tls: Option<Arc<ServerConfig>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let scheme = if tls.is_some() { "https" } else { "http" };
        let state = Arc::new(State::default());
        let accept_state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&accept_state);
                let tls = tls.clone();
                thread::spawn(move || {
                    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
                    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
                    match tls {
                        None => handle(stream, &state),
                        Some(config) => {
                            if let Ok(connection) = ServerConnection::new(config) {
                                handle(StreamOwned::new(connection, stream), &state);
                            }
                        }
                    }
                });
            }
        });
        Self {
            base: format!("{}://127.0.0.1:{}", scheme, port),
            state,
        }
    }

    /// Register `body` under `path` and return its URL.
    pub fn route(&self, path: &str, body: Vec<u8>, behavior: Behavior) -> Url {
        self.state.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                body: Arc::new(body),
                behavior,
                served: 0,
            },
        );
        self.url(path)
    }

    pub fn set_behavior(&self, path: &str, behavior: Behavior) {
        if let Some(route) = self.state.routes.lock().unwrap().get_mut(path) {
            route.behavior = behavior;
            route.served = 0;
        }
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("{}{}", self.base, path)).expect("test url")
    }

    pub fn hits(&self, path: &str) -> Vec<Hit> {
        self.state
            .hits
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Most requests ever waiting for their response at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }
}

struct Request {
    path: String,
    range_start: Option<u64>,
    hit: Hit,
}

fn self_signed_config() -> Arc<ServerConfig> {
    let rcgen::CertifiedKey { cert, key_pair } = rcgen::generate_simple_self_signed(vec![
        "127.0.0.1".to_string(),
        "localhost".to_string(),
    ])
    .expect("self-signed certificate");
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .expect("protocol versions")
            .with_no_client_auth()
            .with_single_cert(vec![cert.der().clone()], key)
            .expect("server certificate");
    Arc::new(config)
}

/// Serve one request. The connection closes when `stream` is dropped.
fn handle<S: Read + Write>(mut stream: S, state: &State) {
    let Some(request) = read_request(&mut stream) else {
        return;
    };

    let now = state.waiting.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak.fetch_max(now, Ordering::SeqCst);
    state
        .hits
        .lock()
        .unwrap()
        .entry(request.path.clone())
        .or_default()
        .push(request.hit.clone());

    let route = {
        let mut routes = state.routes.lock().unwrap();
        routes.get_mut(&request.path).map(|route| {
            route.served += 1;
            (Arc::clone(&route.body), route.behavior.clone(), route.served)
        })
    };
    let Some((body, behavior, served)) = route else {
        state.waiting.fetch_sub(1, Ordering::SeqCst);
        respond(&mut stream, 404, &[], &[]);
        return;
    };

    if let Behavior::Slow(delay) = behavior {
        thread::sleep(delay);
    }
    // Nothing is written before this point, so a client can only start its
    // next request after this decrement.
    state.waiting.fetch_sub(1, Ordering::SeqCst);

    match behavior {
        Behavior::Status(code) => respond(&mut stream, code, &[], &[]),
        Behavior::FailThenServe { status, times } if served <= times => {
            respond(&mut stream, status, &[], &[])
        }
        Behavior::IgnoreRange => respond(&mut stream, 200, &[], &body),
        Behavior::ResetAt { at, times } if served <= times => {
            let (status, headers, slice, start) = ranged(&body, request.range_start);
            let cut = at.saturating_sub(start).min(slice.len());
            write_head(&mut stream, status, &headers, slice.len());
            let _ = stream.write_all(&slice[..cut]);
            let _ = stream.flush();
            thread::sleep(Duration::from_millis(20));
        }
        Behavior::Trickle { chunk, delay } => {
            let (status, headers, slice, _) = ranged(&body, request.range_start);
            write_head(&mut stream, status, &headers, slice.len());
            for piece in slice.chunks(chunk.max(1)) {
                if stream.write_all(piece).and_then(|_| stream.flush()).is_err() {
                    return;
                }
                thread::sleep(delay);
            }
        }
        _ => {
            let (status, headers, slice, _) = ranged(&body, request.range_start);
            respond(&mut stream, status, &headers, slice);
        }
    }
}

/// Status, extra headers, body slice and its first offset.
fn ranged(body: &[u8], range_start: Option<u64>) -> (u16, Vec<(&'static str, String)>, &[u8], usize) {
    let total = body.len();
    match range_start {
        Some(start) if start as usize >= total => (
            416,
            vec![("Content-Range", format!("bytes */{}", total))],
            &body[0..0],
            total,
        ),
        Some(start) => {
            let start = start as usize;
            (
                206,
                vec![(
                    "Content-Range",
                    format!("bytes {}-{}/{}", start, total - 1, total),
                )],
                &body[start..],
                start,
            )
        }
        None => (200, Vec::new(), body, 0),
    }
}

fn reason(code: u16) -> &'static str {
    match code {
        200 => "OK",
        206 => "Partial Content",
        404 => "Not Found",
        416 => "Range Not Satisfiable",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

fn write_head<S: Write>(stream: &mut S, code: u16, headers: &[(&str, String)], len: usize) {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\nConnection: close\r\n",
        code,
        reason(code),
        len
    );
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
}

fn respond<S: Write>(stream: &mut S, code: u16, headers: &[(&str, String)], body: &[u8]) {
    write_head(stream, code, headers, body.len());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}

fn read_request<S: Read>(stream: &mut S) -> Option<Request> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 || raw.len() > 64 * 1024 {
            return None;
        }
        raw.extend_from_slice(&buf[..n]);
    }
    let text = String::from_utf8_lossy(&raw);
    let mut lines = text.lines();
    let path = lines.next()?.split_whitespace().nth(1)?.to_string();

    let mut hit = Hit {
        range: None,
        user_agent: None,
        headers: HashMap::new(),
    };
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim().to_string();
            hit.headers
                .insert(name.trim().to_ascii_lowercase(), value.clone());
            if name.eq_ignore_ascii_case("range") {
                hit.range = Some(value);
            } else if name.eq_ignore_ascii_case("user-agent") {
                hit.user_agent = Some(value);
            }
        }
    }
    let range_start = hit
        .range
        .as_deref()
        .and_then(|r| r.strip_prefix("bytes="))
        .and_then(|r| r.split_once('-'))
        .and_then(|(start, _)| start.trim().parse().ok());

    Some(Request {
        path,
        range_start,
        hit,
    })
}
