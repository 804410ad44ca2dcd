mod error;
mod header_decoder;
mod request_decoder;

pub use error::DecodeError;
pub use header_decoder::{HeaderDecoder, HeaderProgress};
pub use request_decoder::{RequestDecoder, MAX_CONTENT_LENGTH};
