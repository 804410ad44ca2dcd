use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;

use super::Headers;

const CANNED_BODY: &[u8] = b"BadRequest.\r\n";

/// A response on its way back to the client.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: Headers::new(), body: Bytes::new() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Canned reply for a processed request no handler can use.
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
            .with_header("Content-Type", "text/plain")
            .with_body(CANNED_BODY)
    }

    /// Canned reply when no resource matches the target.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
            .with_header("Content-Type", "text/plain")
            .with_body(CANNED_BODY)
    }

    /// Canned reply for an impossible declared body size. Always closes.
    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE)
            .with_header("Content-Type", "text/plain")
            .with_header("Connection", "close")
            .with_body(CANNED_BODY)
    }

    /// Canned reply injected by the timeout monitor. Always closes.
    pub fn request_timeout() -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT).with_header("Connection", "close")
    }

    pub fn reason(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// Serializes the status line, the headers in insertion order, the blank
    /// separator line and the body.
    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(64 + self.body.len());
        dst.put_slice(b"HTTP/1.1 ");
        dst.put_slice(self.status.as_str().as_bytes());
        dst.put_slice(b" ");
        dst.put_slice(self.reason().as_bytes());
        dst.put_slice(b"\r\n");
        for header in self.headers.iter() {
            dst.put_slice(header.name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(header.value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        dst.put_slice(&self.body);
        dst.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_status_line_headers_and_body() {
        let response = Response::new(StatusCode::OK)
            .with_header("Content-Type", "text/plain")
            .with_header("Content-Length", "6")
            .with_body(&b"Hello!"[..]);
        assert_eq!(
            response.encode(),
            &b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 6\r\n\r\nHello!"[..],
        );
    }

    #[test]
    fn canned_not_found_matches_wire_form() {
        let mut response = Response::not_found();
        response.headers.add("Content-Length", "13");
        assert_eq!(
            response.encode(),
            &b"HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 13\r\n\r\nBadRequest.\r\n"[..],
        );
    }

    #[test]
    fn timeout_reply_has_no_body() {
        let response = Response::request_timeout();
        assert_eq!(response.encode(), &b"HTTP/1.1 408 Request Timeout\r\nConnection: close\r\n\r\n"[..]);
    }
}
