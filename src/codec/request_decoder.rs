use bytes::Bytes;
use http::Method;
use tracing::debug;

use crate::protocol::{ParsingState, Request, Target};

use super::error::DecodeError;
use super::header_decoder::HeaderDecoder;

/// Hard ceiling on any declared request body size. The ceiling itself is
/// still allowed.
pub const MAX_CONTENT_LENGTH: u64 = 10_000_000;

const CRLF: &[u8] = b"\r\n";

/// Incremental request parser.
///
/// One call consumes a prefix of `src` and returns how many bytes were
/// accepted; the caller erases that prefix and feeds the remainder (plus
/// anything newly arrived) to the next call, with the same [`Request`]
/// carrying the state in between. Input may be fragmented at any byte
/// boundary.
///
/// A decoder is cheap to build; the server constructs one per parse pass
/// from its current configuration.
pub struct RequestDecoder {
    header_line_limit: usize,
    required_host: Option<String>,
}

impl RequestDecoder {
    pub fn new(header_line_limit: usize) -> Self {
        Self { header_line_limit, required_host: None }
    }

    /// Requires the `Host` header of every request to equal `host`.
    pub fn require_host(mut self, host: impl Into<String>) -> Self {
        self.required_host = Some(host.into());
        self
    }

    /// Folds more bytes into `request`. Bytes past the returned count belong
    /// to a later request, or to the post-upgrade stream.
    pub fn decode(&self, request: &mut Request, src: &[u8]) -> usize {
        let mut consumed = 0;

        if request.state == ParsingState::RequestLine {
            let Some(line_end) = find_crlf(src) else {
                if src.len() > self.header_line_limit {
                    self.fail(request, DecodeError::RequestLineTooLong { limit: self.header_line_limit });
                }
                return 0;
            };
            if line_end > self.header_line_limit {
                self.fail(request, DecodeError::RequestLineTooLong { limit: self.header_line_limit });
                return 0;
            }
            let line = &src[..line_end];
            consumed = line_end + CRLF.len();
            request.state = ParsingState::Headers;
            request.valid = parse_request_line(request, line);
        }

        if request.state == ParsingState::Headers {
            let decoder = HeaderDecoder::new(self.header_line_limit);
            match decoder.decode(&mut request.headers, &src[consumed..]) {
                Ok(progress) => {
                    consumed += progress.consumed;
                    if !progress.valid {
                        request.valid = false;
                    }
                    if !progress.complete {
                        return consumed;
                    }
                    request.state = ParsingState::Body;
                    self.check_host(request);
                }
                Err(error) => {
                    self.fail(request, error);
                    return consumed;
                }
            }
        }

        if request.state == ParsingState::Body {
            let available = &src[consumed..];
            match request.headers.get("Content-Length") {
                Some(value) => match declared_length(value) {
                    Ok(length) => {
                        let length = length as usize;
                        if available.len() < length {
                            return consumed;
                        }
                        request.body = Bytes::copy_from_slice(&available[..length]);
                        consumed += length;
                        request.state = ParsingState::Complete;
                    }
                    Err(error) => {
                        self.fail(request, error);
                        return consumed;
                    }
                },
                None => {
                    // no length, no body; trailing bytes are the next request's
                    request.body = Bytes::new();
                    request.state = ParsingState::Complete;
                }
            }
        }

        consumed
    }

    fn fail(&self, request: &mut Request, error: DecodeError) {
        debug!(error = %error, "request rejected");
        request.state = ParsingState::Error;
        request.response_status = error.status();
    }

    fn check_host(&self, request: &mut Request) {
        let Some(host) = request.headers.get("Host") else {
            request.valid = false;
            return;
        };
        if let Some(target_host) = request.target.host() {
            if target_host != host {
                request.valid = false;
            }
        }
        if let Some(required) = &self.required_host {
            if host != required {
                request.valid = false;
            }
        }
    }
}

/// Splits the request line on its first two spaces into method, target and
/// protocol. False on any malformation; the caller keeps parsing headers so
/// the exchange can still be answered with a 400.
fn parse_request_line(request: &mut Request, line: &[u8]) -> bool {
    let Ok(line) = std::str::from_utf8(line) else {
        return false;
    };
    let Some((method, rest)) = line.split_once(' ') else {
        return false;
    };
    let Some((target, protocol)) = rest.split_once(' ') else {
        return false;
    };
    if method.is_empty() || target.is_empty() {
        return false;
    }
    let Ok(method) = Method::from_bytes(method.as_bytes()) else {
        return false;
    };
    let Some(target) = Target::parse(target) else {
        return false;
    };
    request.method = method;
    request.target = target;
    protocol == "HTTP/1.1"
}

/// Parses an unsigned decimal `Content-Length` by per-digit accumulation,
/// distinguishing garbage from overflow from an impossible (but
/// representable) size.
fn declared_length(value: &str) -> Result<u64, DecodeError> {
    let mut length: u64 = 0;
    for byte in value.bytes() {
        if !byte.is_ascii_digit() {
            return Err(DecodeError::ContentLengthNotANumber { value: value.to_string() });
        }
        length = length
            .checked_mul(10)
            .and_then(|n| n.checked_add(u64::from(byte - b'0')))
            .ok_or(DecodeError::ContentLengthOverflow)?;
    }
    if length > MAX_CONTENT_LENGTH {
        return Err(DecodeError::BodyTooLarge { length, limit: MAX_CONTENT_LENGTH });
    }
    Ok(length)
}

fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(CRLF.len()).position(|window| window == CRLF)
}
