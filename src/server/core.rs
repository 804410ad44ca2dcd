use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use http::StatusCode;
use tracing::{debug, warn};

use crate::codec::RequestDecoder;
use crate::diagnostics::DiagnosticsSender;
use crate::protocol::{ParsingState, Response};
use crate::transport::{Connection, ServerTransport, TimeSource};

use super::config::ServerConfig;
use super::connection::ConnectionState;
use super::resource::{ResourceHandler, ResourceSpace};

/// Polling period of the timeout monitor.
const TIMER_POLL: Duration = Duration::from_millis(50);

/// Shared core of the server: one mutex over all state, one condition
/// variable per background thread.
pub(crate) struct ServerInner {
    pub state: Mutex<ServerState>,
    /// Wakes the reaper when connections await destruction or at shutdown.
    pub reaper_wake: Condvar,
    /// Wakes the timeout monitor early at demobilization.
    pub timer_wake: Condvar,
    pub diagnostics: DiagnosticsSender,
}

pub(crate) struct ServerState {
    pub config: ServerConfig,
    pub mobilized: bool,
    pub transport: Option<Arc<dyn ServerTransport>>,
    pub time_source: Option<Arc<dyn TimeSource>>,
    /// Live connections, keyed by an id that is never reused, so a stale
    /// delegate can only miss.
    pub established: HashMap<u64, ConnectionState>,
    next_connection_id: u64,
    /// Awaiting destruction by the reaper.
    pub broken: Vec<ConnectionState>,
    pub resources: Option<ResourceSpace>,
    pub stop_reaper: bool,
    pub stop_timer: bool,
    pub reaper: Option<JoinHandle<()>>,
    pub timer: Option<JoinHandle<()>>,
}

impl ServerState {
    fn new() -> Self {
        Self {
            config: ServerConfig::new(),
            mobilized: false,
            transport: None,
            time_source: None,
            established: HashMap::new(),
            next_connection_id: 0,
            broken: Vec::new(),
            resources: None,
            stop_reaper: false,
            stop_timer: false,
            reaper: None,
            timer: None,
        }
    }

    fn request_decoder(&self) -> RequestDecoder {
        let decoder = RequestDecoder::new(self.config.header_line_limit);
        if self.config.host.is_empty() {
            decoder
        } else {
            decoder.require_host(self.config.host.clone())
        }
    }
}

impl ServerInner {
    pub fn new(sender_name: &str) -> Self {
        Self {
            state: Mutex::new(ServerState::new()),
            reaper_wake: Condvar::new(),
            timer_wake: Condvar::new(),
            diagnostics: DiagnosticsSender::new(sender_name),
        }
    }

    /// Builds a request decoder from the current configuration; also the
    /// backing of the public stateless parse.
    pub fn request_decoder(&self) -> RequestDecoder {
        self.state.lock().unwrap().request_decoder()
    }

    pub fn new_connection(self: &Arc<Self>, connection: Arc<dyn Connection>) {
        let mut guard = self.state.lock().unwrap();
        let Some(time_source) = guard.time_source.clone() else {
            return;
        };
        let now = time_source.current_time();
        let state = ConnectionState::new(Arc::clone(&connection), now);
        self.diagnostics.send(2, &format!("New connection from {}", state.peer_id));
        let id = guard.next_connection_id;
        guard.next_connection_id += 1;
        guard.established.insert(id, state);

        let weak = Arc::downgrade(self);
        connection.set_data_received_delegate(Box::new(move |data| {
            if let Some(inner) = weak.upgrade() {
                inner.data_received(id, data);
            }
        }));
        let weak = Arc::downgrade(self);
        connection.set_connection_broken_delegate(Box::new(move |_graceful| {
            if let Some(inner) = weak.upgrade() {
                inner.connection_broken(id);
            }
        }));
    }

    fn data_received(&self, id: u64, data: Vec<u8>) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let Some(time_source) = state.time_source.clone() else {
            return;
        };
        let now = time_source.current_time();
        {
            let Some(connection) = state.established.get_mut(&id) else {
                return;
            };
            if !connection.accepting_requests || connection.connection.is_none() {
                return;
            }
            connection.time_last_data_received = now;
            if connection.restart_request_clock {
                connection.time_last_request_started = now;
                connection.restart_request_clock = false;
            }
            connection.request_underway = true;
            connection.buffer.extend_from_slice(&data);
        }
        self.parse_and_respond(state, id);
    }

    /// Assembles and answers as many requests as the buffer holds. Stops on
    /// an incomplete request, a close, or a 101 hand-off.
    fn parse_and_respond(&self, state: &mut ServerState, id: u64) {
        loop {
            let decoder = state.request_decoder();
            let (mut request, peer_id) = {
                let Some(connection) = state.established.get_mut(&id) else {
                    return;
                };
                let accepted = decoder.decode(&mut connection.next_request, &connection.buffer);
                let _ = connection.buffer.split_to(accepted);
                if !connection.next_request.is_processed() {
                    return;
                }
                connection.request_underway = false;
                connection.restart_request_clock = true;
                (mem::take(&mut connection.next_request), connection.peer_id.clone())
            };

            let mut response = if request.state == ParsingState::Complete && request.valid {
                self.diagnostics.send(
                    1,
                    &format!(
                        "Received {} request for '{}' from {}",
                        request.method, request.target, peer_id
                    ),
                );
                let mut segments = request.target.segments().to_vec();
                if segments.first().is_some_and(|segment| segment.is_empty()) {
                    segments.remove(0);
                }
                match state.resources.as_ref().and_then(|root| root.find(&segments)) {
                    Some((handler, matched)) => {
                        request.target.set_segments(segments[matched..].to_vec());
                        let Some(connection) = state.established.get_mut(&id) else {
                            return;
                        };
                        let Some(peer) = connection.connection.clone() else {
                            return;
                        };
                        let handler: &ResourceHandler = &*handler;
                        handler(&request, &peer, &connection.buffer[..])
                    }
                    None => Response::not_found(),
                }
            } else if request.state == ParsingState::Error
                && request.response_status == StatusCode::PAYLOAD_TOO_LARGE
            {
                Response::payload_too_large()
            } else {
                if request.state == ParsingState::Error {
                    // force the echo below to close an unusable connection
                    request.headers.add("Connection", "close");
                }
                Response::bad_request()
            };

            // echo a requested close onto the response
            if request.headers.multi_values("Connection").iter().any(|token| token == "close") {
                let mut tokens = response.headers.multi_values("Connection");
                if !tokens.iter().any(|token| token == "close") {
                    tokens.push("close".to_string());
                    response.headers.set_multi("Connection", &tokens);
                }
            }

            let upgraded = response.status == StatusCode::SWITCHING_PROTOCOLS;
            self.issue_response(state, id, response);
            if upgraded {
                // the stream belongs to the handler now; the buffered bytes
                // went with it as the trailer
                if let Some(connection) = state.established.get_mut(&id) {
                    connection.connection = None;
                    connection.buffer.clear();
                    connection.accepting_requests = false;
                }
                return;
            }
            match state.established.get(&id) {
                Some(connection) if connection.accepting_requests => {}
                _ => return,
            }
        }
    }

    /// Fixes up, serializes and sends `response`; initiates a graceful break
    /// when the response asks to close.
    pub(crate) fn issue_response(&self, state: &mut ServerState, id: u64, mut response: Response) {
        let Some(connection) = state.established.get_mut(&id) else {
            return;
        };
        let Some(peer) = connection.connection.clone() else {
            return;
        };
        if !response.body.is_empty()
            && !response.headers.has("Transfer-Encoding")
            && !response.headers.has("Content-Length")
        {
            response.headers.add("Content-Length", response.body.len().to_string());
        }
        peer.send_data(&response.encode());
        self.diagnostics.send(
            1,
            &format!(
                "Sent {} '{}' response back to {}",
                response.status.as_u16(),
                response.reason(),
                connection.peer_id
            ),
        );
        if response.headers.multi_values("Connection").iter().any(|token| token == "close") {
            connection.accepting_requests = false;
            peer.break_connection(true);
        }
    }

    fn connection_broken(&self, id: u64) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let Some(connection) = state.established.remove(&id) else {
            return;
        };
        self.diagnostics
            .send(2, &format!("Connection to {} is broken by peer", connection.peer_id));
        state.broken.push(connection);
        self.reaper_wake.notify_all();
    }

    /// Body of the reaper thread. Broken connections must not be destroyed on
    /// a thread that is executing one of their delegates; this thread never
    /// is.
    pub fn run_reaper(self: &Arc<Self>) {
        let mut guard = self.state.lock().unwrap();
        while !guard.stop_reaper {
            if !guard.broken.is_empty() {
                let broken = mem::take(&mut guard.broken);
                drop(guard);
                drop(broken);
                guard = self.state.lock().unwrap();
                continue;
            }
            guard = self
                .reaper_wake
                .wait_while(guard, |state| !state.stop_reaper && state.broken.is_empty())
                .unwrap();
        }
        debug!("reaper stopped");
    }

    /// Body of the timeout monitor thread; runs only while mobilized.
    pub fn run_timeout_monitor(self: &Arc<Self>) {
        let mut guard = self.state.lock().unwrap();
        while !guard.stop_timer {
            let state = &mut *guard;
            if let Some(time_source) = state.time_source.clone() {
                let now = time_source.current_time();
                let expired: Vec<u64> = state
                    .established
                    .iter()
                    .filter(|(_, c)| c.accepting_requests && c.connection.is_some())
                    .filter(|(_, c)| {
                        if c.request_underway {
                            now - c.time_last_data_received > state.config.inactivity_timeout
                                || now - c.time_last_request_started > state.config.request_timeout
                        } else {
                            let limit = state
                                .config
                                .idle_timeout
                                .unwrap_or(state.config.inactivity_timeout);
                            now - c.time_last_data_received > limit
                        }
                    })
                    .map(|(id, _)| *id)
                    .collect();
                for id in expired {
                    warn!(connection = id, "connection timed out");
                    self.issue_response(state, id, Response::request_timeout());
                }
            }
            let (g, _) = self
                .timer_wake
                .wait_timeout_while(guard, TIMER_POLL, |state| !state.stop_timer)
                .unwrap();
            guard = g;
        }
        debug!("timeout monitor stopped");
    }
}
