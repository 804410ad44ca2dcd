use bytes::Bytes;
use http::{Method, StatusCode};

use super::{Headers, Target};

/// How much of the next request has been parsed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsingState {
    /// Still waiting for the full request line.
    RequestLine,
    /// Request line done; header lines still arriving.
    Headers,
    /// Headers done; body bytes still arriving.
    Body,
    /// Fully constructed, valid or not. The connection stays usable.
    Complete,
    /// Beyond repair; the connection should be closed.
    Error,
}

/// One client request, decomposed into its elements.
///
/// A request is built incrementally by [`crate::codec::RequestDecoder`]: the
/// same value is fed more bytes until it is processed. Recoverable problems
/// (bad request line, damaged header, `Host` mismatch) clear [`valid`] while
/// parsing continues; unrecoverable ones put it in [`ParsingState::Error`].
///
/// [`valid`]: Request::valid
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub target: Target,
    pub headers: Headers,
    pub body: Bytes,
    /// False when any recoverable validity check failed.
    pub valid: bool,
    pub state: ParsingState,
    /// Status to report when the request cannot be handed to a resource.
    /// Seeded with 400; specific detections overwrite it.
    pub response_status: StatusCode,
}

impl Request {
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            target: Target::default(),
            headers: Headers::new(),
            body: Bytes::new(),
            valid: true,
            state: ParsingState::RequestLine,
            response_status: StatusCode::BAD_REQUEST,
        }
    }

    /// A request is processed once it is either complete or beyond repair.
    pub fn is_processed(&self) -> bool {
        matches!(self.state, ParsingState::Complete | ParsingState::Error)
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}
