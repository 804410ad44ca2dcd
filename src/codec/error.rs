use http::StatusCode;
use snafu::prelude::*;

/// Unrecoverable parse failures.
///
/// The request decoder never propagates these to the connection loop; it
/// folds them into the request state, with the variant picking the status
/// the peer will see.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    #[snafu(display("request line exceeds the {limit}-byte limit"))]
    RequestLineTooLong { limit: usize },

    #[snafu(display("header line exceeds the {limit}-byte limit"))]
    HeaderLineTooLong { limit: usize },

    #[snafu(display("content-length is not a number: {value:?}"))]
    ContentLengthNotANumber { value: String },

    #[snafu(display("content-length overflows"))]
    ContentLengthOverflow,

    #[snafu(display("declared body of {length} bytes exceeds the {limit}-byte ceiling"))]
    BodyTooLarge { length: u64, limit: u64 },
}

impl DecodeError {
    /// Status reported to the peer for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ContentLengthOverflow | Self::BodyTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
