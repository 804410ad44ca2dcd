use crate::protocol::Headers;

use super::error::{DecodeError, HeaderLineTooLongSnafu};
use snafu::ensure;

const CRLF: &[u8] = b"\r\n";

/// Outcome of one pass over the header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderProgress {
    /// Bytes the caller should erase from the front of its buffer.
    pub consumed: usize,
    /// True once the empty terminator line was seen.
    pub complete: bool,
    /// False when a damaged line was consumed. Parsing continues anyway.
    pub valid: bool,
}

/// Incremental parser for the header block of a request.
///
/// Complete lines are consumed as they become available; a partial line at
/// the end of the input is left for the next pass. The per-line limit counts
/// the CRLF terminator, so a 999-character line passes a limit of 1001 and
/// fails a limit of 1000. A line without a colon, or with a malformed name,
/// only clears the validity flag; a line over the limit is fatal.
pub struct HeaderDecoder {
    line_limit: usize,
}

impl HeaderDecoder {
    pub fn new(line_limit: usize) -> Self {
        Self { line_limit }
    }

    /// Parses as many complete lines out of `src` as possible, appending the
    /// entries to `headers`.
    pub fn decode(&self, headers: &mut Headers, src: &[u8]) -> Result<HeaderProgress, DecodeError> {
        let mut consumed = 0;
        let mut valid = true;
        loop {
            let rest = &src[consumed..];
            let Some(line_end) = find_crlf(rest) else {
                ensure!(rest.len() < self.line_limit, HeaderLineTooLongSnafu { limit: self.line_limit });
                return Ok(HeaderProgress { consumed, complete: false, valid });
            };
            ensure!(
                line_end + CRLF.len() <= self.line_limit,
                HeaderLineTooLongSnafu { limit: self.line_limit }
            );
            let line = &rest[..line_end];
            consumed += line_end + CRLF.len();
            if line.is_empty() {
                return Ok(HeaderProgress { consumed, complete: true, valid });
            }
            if !parse_header_line(headers, line) {
                valid = false;
            }
        }
    }
}

/// Splits `Name: value`, trims the value, appends the entry. False when the
/// line has no colon or the name is not a token.
fn parse_header_line(headers: &mut Headers, line: &[u8]) -> bool {
    let Ok(line) = std::str::from_utf8(line) else {
        return false;
    };
    let Some((name, value)) = line.split_once(':') else {
        return false;
    };
    if name.is_empty() || !name.bytes().all(is_token_char) {
        return false;
    }
    headers.add(name, value.trim());
    true
}

fn is_token_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}

fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(CRLF.len()).position(|window| window == CRLF)
}
