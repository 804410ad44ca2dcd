//! Test doubles for the engine's collaborators, plus a small response
//! parser so tests can assert on what the server sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use ember_http::transport::{
    Connection, ConnectionBrokenDelegate, DataReceivedDelegate, NewConnectionDelegate,
    ServerTransport, TimeSource,
};
use ember_http::{MobilizationDependencies, Server};

const WAIT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct TransportState {
    bound: bool,
    port: u16,
    on_new_connection: Option<NewConnectionDelegate>,
}

/// Transport double: records the bind and hands accepted connections to the
/// server's callback on demand.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<TransportState>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().unwrap().bound
    }

    pub fn bound_to(&self) -> u16 {
        self.state.lock().unwrap().port
    }

    pub fn has_connection_delegate(&self) -> bool {
        self.state.lock().unwrap().on_new_connection.is_some()
    }

    /// Simulates the transport accepting `connection`.
    pub fn connect(&self, connection: Arc<dyn Connection>) {
        let mut state = self.state.lock().unwrap();
        if let Some(delegate) = state.on_new_connection.as_mut() {
            delegate(connection);
        }
    }
}

impl ServerTransport for MockTransport {
    fn bind_network(&self, port: u16, on_new_connection: NewConnectionDelegate) -> bool {
        let mut state = self.state.lock().unwrap();
        state.bound = true;
        state.port = port;
        state.on_new_connection = Some(on_new_connection);
        true
    }

    fn release_network(&self) {
        let mut state = self.state.lock().unwrap();
        state.bound = false;
        state.on_new_connection = None;
    }

    fn bound_port(&self) -> u16 {
        self.state.lock().unwrap().port
    }
}

#[derive(Default)]
struct ConnectionInner {
    data_delegate: Option<DataReceivedDelegate>,
    broken_delegate: Option<ConnectionBrokenDelegate>,
    sent: Vec<u8>,
    broken: bool,
    drop_flag: Option<Arc<AtomicBool>>,
}

/// Connection double: captures sent bytes and break requests, and lets the
/// test play the peer by invoking the installed delegates.
#[derive(Default)]
pub struct MockConnection {
    inner: Mutex<ConnectionInner>,
    signal: Condvar,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    /// Flag set when this connection is finally destroyed.
    pub fn watch_drop(&self) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.inner.lock().unwrap().drop_flag = Some(Arc::clone(&flag));
        flag
    }

    /// Feeds bytes to whatever data delegate is installed, as the peer
    /// would. The delegate runs without the mock's lock held, so it may send
    /// data or install a replacement delegate.
    pub fn deliver(&self, data: &[u8]) {
        let mut delegate = self.inner.lock().unwrap().data_delegate.take();
        if let Some(delegate) = delegate.as_mut() {
            delegate(data.to_vec());
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.data_delegate.is_none() {
            inner.data_delegate = delegate;
        }
    }

    /// Invokes the broken delegate, as the transport would on peer close.
    pub fn peer_break(&self, graceful: bool) {
        let mut delegate = self.inner.lock().unwrap().broken_delegate.take();
        if let Some(delegate) = delegate.as_mut() {
            delegate(graceful);
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.broken_delegate.is_none() {
            inner.broken_delegate = delegate;
        }
    }

    pub fn has_data_delegate(&self) -> bool {
        self.inner.lock().unwrap().data_delegate.is_some()
    }

    pub fn has_broken_delegate(&self) -> bool {
        self.inner.lock().unwrap().broken_delegate.is_some()
    }

    pub fn sent(&self) -> Vec<u8> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.inner.lock().unwrap().sent.clear();
    }

    pub fn is_broken(&self) -> bool {
        self.inner.lock().unwrap().broken
    }

    /// Waits until the server has sent something.
    pub fn await_sent(&self) -> bool {
        let guard = self.inner.lock().unwrap();
        let (guard, _) =
            self.signal.wait_timeout_while(guard, WAIT, |inner| inner.sent.is_empty()).unwrap();
        !guard.sent.is_empty()
    }

    /// Waits until the server has initiated a break.
    pub fn await_broken(&self) -> bool {
        let guard = self.inner.lock().unwrap();
        let (guard, _) =
            self.signal.wait_timeout_while(guard, WAIT, |inner| !inner.broken).unwrap();
        guard.broken
    }

    /// True when nothing is sent and no break happens within `window`.
    pub fn stays_quiet(&self, window: Duration) -> bool {
        let guard = self.inner.lock().unwrap();
        let (guard, _) = self
            .signal
            .wait_timeout_while(guard, window, |inner| inner.sent.is_empty() && !inner.broken)
            .unwrap();
        guard.sent.is_empty() && !guard.broken
    }
}

impl Connection for MockConnection {
    fn peer_id(&self) -> String {
        "mock-client".to_string()
    }

    fn set_data_received_delegate(&self, delegate: DataReceivedDelegate) {
        self.inner.lock().unwrap().data_delegate = Some(delegate);
    }

    fn set_connection_broken_delegate(&self, delegate: ConnectionBrokenDelegate) {
        self.inner.lock().unwrap().broken_delegate = Some(delegate);
    }

    fn send_data(&self, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.sent.extend_from_slice(data);
        self.signal.notify_all();
    }

    fn break_connection(&self, _graceful: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.broken = true;
        self.signal.notify_all();
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        if let Some(flag) = self.inner.get_mut().unwrap().drop_flag.take() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

/// Settable clock.
pub struct MockTimeSource {
    now: Mutex<f64>,
}

impl MockTimeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { now: Mutex::new(0.0) })
    }

    pub fn set(&self, now: f64) {
        *self.now.lock().unwrap() = now;
    }
}

impl TimeSource for MockTimeSource {
    fn current_time(&self) -> f64 {
        *self.now.lock().unwrap()
    }
}

/// A server mobilized on port 1234 against fresh mocks.
pub fn mobilized_server() -> (Server, Arc<MockTransport>, Arc<MockTimeSource>) {
    let server = Server::new();
    server.set_configuration_item("Port", "1234");
    let transport = MockTransport::new();
    let clock = MockTimeSource::new();
    server
        .mobilize(MobilizationDependencies {
            transport: Arc::clone(&transport) as Arc<dyn ServerTransport>,
            time_source: Arc::clone(&clock) as Arc<dyn TimeSource>,
        })
        .unwrap();
    (server, transport, clock)
}

/// Accepts a fresh mock connection on `transport`.
pub fn connect(transport: &MockTransport) -> Arc<MockConnection> {
    let connection = MockConnection::new();
    transport.connect(Arc::clone(&connection) as Arc<dyn Connection>);
    connection
}

/// Records diagnostics as `sender[level]: message` lines.
pub fn record_diagnostics(server: &Server, min_level: usize) -> Arc<Mutex<Vec<String>>> {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);
    let _subscription = server.subscribe_to_diagnostics(
        Arc::new(move |name, level, message| {
            sink.lock().unwrap().push(format!("{name}[{level}]: {message}"));
        }),
        min_level,
    );
    messages
}

/// One response parsed back off the wire.
pub struct ParsedResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ParsedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Parses one complete response off the front of `raw`; also returns how
/// many bytes it occupied.
pub fn parse_response(raw: &[u8]) -> Option<(ParsedResponse, usize)> {
    let head_end = raw.windows(4).position(|window| window == b"\r\n\r\n")? + 4;
    let head = std::str::from_utf8(&raw[..head_end]).ok()?;
    let mut lines = head.split("\r\n");
    let mut status_line = lines.next()?.splitn(3, ' ');
    if status_line.next()? != "HTTP/1.1" {
        return None;
    }
    let status: u16 = status_line.next()?.parse().ok()?;
    let reason = status_line.next().unwrap_or("").to_string();
    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':')?;
        headers.push((name.to_string(), value.trim().to_string()));
    }
    let length: usize = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0);
    if raw.len() < head_end + length {
        return None;
    }
    let response =
        ParsedResponse { status, reason, headers, body: raw[head_end..head_end + length].to_vec() };
    Some((response, head_end + length))
}

/// Parses every complete response in `raw`, in order.
pub fn parse_responses(mut raw: &[u8]) -> Vec<ParsedResponse> {
    let mut responses = Vec::new();
    while let Some((response, consumed)) = parse_response(raw) {
        responses.push(response);
        raw = &raw[consumed..];
    }
    responses
}
