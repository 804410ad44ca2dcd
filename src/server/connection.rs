use std::sync::Arc;

use bytes::BytesMut;

use crate::protocol::Request;
use crate::transport::Connection;

/// Everything the server holds about one client connection.
pub(crate) struct ConnectionState {
    /// Released (set to `None`) when a 101 hands the stream to a handler.
    pub connection: Option<Arc<dyn Connection>>,
    /// Cached so diagnostics keep working after the hand-off.
    pub peer_id: String,
    /// Reassembles fragmented requests.
    pub buffer: BytesMut,
    /// The request currently being parsed.
    pub next_request: Request,
    pub time_last_data_received: f64,
    pub time_last_request_started: f64,
    /// Cleared once a response asked to close; later bytes are dropped.
    pub accepting_requests: bool,
    /// True from the first byte of a request until its response goes out;
    /// gates the inactivity and whole-request clocks.
    pub request_underway: bool,
    /// Set after each response so the next data arrival restarts the request
    /// clock.
    pub restart_request_clock: bool,
}

impl ConnectionState {
    pub fn new(connection: Arc<dyn Connection>, now: f64) -> Self {
        let peer_id = connection.peer_id();
        Self {
            connection: Some(connection),
            peer_id,
            buffer: BytesMut::new(),
            next_request: Request::new(),
            time_last_data_received: now,
            time_last_request_started: now,
            accepting_requests: true,
            request_underway: false,
            restart_request_clock: false,
        }
    }
}
