mod headers;
mod request;
mod response;
mod target;

pub use headers::{Header, Headers};
pub use request::{ParsingState, Request};
pub use response::Response;
pub use target::Target;
