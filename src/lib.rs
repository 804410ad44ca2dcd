//! An embeddable HTTP/1.1 server engine.
//!
//! The engine owns no sockets and no clock: the embedder supplies a
//! [`transport::ServerTransport`], per-client [`transport::Connection`]s and a
//! [`transport::TimeSource`]. Bytes delivered by the transport are folded into
//! [`protocol::Request`]s, dispatched to registered resource handlers, and the
//! handlers' [`protocol::Response`]s are written back on the same connection.
//! Keep-alive, timeouts, protocol upgrades and graceful teardown are managed
//! by [`server::Server`].

pub mod codec;
pub mod diagnostics;
pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{Headers, ParsingState, Request, Response, Target};
pub use server::{
    MobilizationDependencies, MobilizeError, ResourceHandler, ResourceRegistration, Server,
};
pub use transport::{Connection, ServerTransport, TimeSource};
