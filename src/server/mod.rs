mod config;
mod connection;
mod core;
mod error;
mod resource;

pub use error::MobilizeError;
pub use resource::ResourceHandler;

use std::sync::{Arc, Weak};
use std::thread;

use tracing::info;

use crate::diagnostics::{DiagnosticDelegate, DiagnosticsSubscription};
use crate::protocol::{Request, Response};
use crate::transport::{Connection, ServerTransport, TimeSource};

use self::core::ServerInner;
use self::resource::ResourceSpace;

/// Name diagnostics are published under.
const DIAGNOSTICS_SENDER_NAME: &str = "ember_http::server";

/// Collaborators supplied at mobilization. The port comes from the `Port`
/// configuration item.
pub struct MobilizationDependencies {
    pub transport: Arc<dyn ServerTransport>,
    pub time_source: Arc<dyn TimeSource>,
}

/// The HTTP/1.1 server engine.
///
/// A server is created dormant. [`mobilize`](Server::mobilize) binds it to a
/// transport and a time source and starts serving;
/// [`demobilize`](Server::demobilize) returns it to dormancy and may be
/// followed by another mobilization. Resource handlers can be registered at
/// any time. Dropping the server demobilizes it and joins its background
/// threads.
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    pub fn new() -> Self {
        let inner = Arc::new(ServerInner::new(DIAGNOSTICS_SENDER_NAME));
        let reaper = {
            let inner = Arc::clone(&inner);
            thread::spawn(move || inner.run_reaper())
        };
        inner.state.lock().unwrap().reaper = Some(reaper);
        Self { inner }
    }

    /// Binds the transport on the configured port, starts the timeout
    /// monitor, and begins serving.
    pub fn mobilize(&self, dependencies: MobilizationDependencies) -> Result<(), MobilizeError> {
        let port = {
            let mut state = self.inner.state.lock().unwrap();
            if state.mobilized {
                return Err(MobilizeError::AlreadyMobilized);
            }
            state.mobilized = true;
            state.config.port
        };
        let weak = Arc::downgrade(&self.inner);
        let bound = dependencies.transport.bind_network(
            port,
            Box::new(move |connection| {
                if let Some(inner) = weak.upgrade() {
                    inner.new_connection(connection);
                }
            }),
        );
        if !bound {
            self.inner.state.lock().unwrap().mobilized = false;
            return Err(MobilizeError::BindFailed { port });
        }
        {
            let mut state = self.inner.state.lock().unwrap();
            state.transport = Some(dependencies.transport);
            state.time_source = Some(dependencies.time_source);
            state.stop_timer = false;
            let inner = Arc::clone(&self.inner);
            state.timer = Some(thread::spawn(move || inner.run_timeout_monitor()));
        }
        self.inner.diagnostics.send(3, &format!("Now listening on port {port}"));
        info!(port, "mobilized");
        Ok(())
    }

    /// Stops the timeout monitor, releases the network and drops the time
    /// source. Established connections survive until they break or the
    /// server is dropped. Safe to call on a dormant server.
    pub fn demobilize(&self) {
        let timer = {
            let mut state = self.inner.state.lock().unwrap();
            state.stop_timer = true;
            state.timer.take()
        };
        self.inner.timer_wake.notify_all();
        if let Some(timer) = timer {
            let _ = timer.join();
        }
        let transport = {
            let mut state = self.inner.state.lock().unwrap();
            state.time_source = None;
            state.mobilized = false;
            state.transport.take()
        };
        if let Some(transport) = transport {
            transport.release_network();
            info!("demobilized");
        }
    }

    pub fn get_configuration_item(&self, key: &str) -> String {
        self.inner.state.lock().unwrap().config.get(key)
    }

    pub fn set_configuration_item(&self, key: &str, value: &str) {
        let mut state = self.inner.state.lock().unwrap();
        state.config.set(key, value, &self.inner.diagnostics);
    }

    /// Subscribes to diagnostic messages at `min_level` and above.
    pub fn subscribe_to_diagnostics(
        &self,
        delegate: DiagnosticDelegate,
        min_level: usize,
    ) -> DiagnosticsSubscription {
        self.inner.diagnostics.subscribe(delegate, min_level)
    }

    /// Registers `handler` for every target under the prefix `path`. `None`
    /// when the prefix is already taken or overlaps a registered one in
    /// either direction.
    pub fn register_resource<H>(&self, path: &[&str], handler: H) -> Option<ResourceRegistration>
    where
        H: Fn(&Request, &Arc<dyn Connection>, &[u8]) -> Response + Send + Sync + 'static,
    {
        let path: Vec<String> = path.iter().map(|segment| segment.to_string()).collect();
        let mut state = self.inner.state.lock().unwrap();
        let root = state.resources.get_or_insert_with(|| ResourceSpace::new(""));
        if root.register(&path, Arc::new(handler)) {
            Some(ResourceRegistration { server: Arc::downgrade(&self.inner), path })
        } else {
            None
        }
    }

    /// Parses one request out of `raw` with the current configuration.
    /// `None` until the bytes hold a processed request. Usable from any
    /// thread, mobilized or not.
    pub fn parse_request(&self, raw: &[u8]) -> Option<Request> {
        self.parse_request_with_end(raw).0
    }

    /// Like [`parse_request`](Server::parse_request), also reporting how many
    /// bytes the request occupied; anything past that point belongs to
    /// another message.
    pub fn parse_request_with_end(&self, raw: &[u8]) -> (Option<Request>, usize) {
        let decoder = self.inner.request_decoder();
        let mut request = Request::new();
        let end = decoder.decode(&mut request, raw);
        if request.is_processed() {
            (Some(request), end)
        } else {
            (None, end)
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.demobilize();
        let reaper = {
            let mut state = self.inner.state.lock().unwrap();
            state.stop_reaper = true;
            state.reaper.take()
        };
        self.inner.reaper_wake.notify_all();
        if let Some(reaper) = reaper {
            let _ = reaper.join();
        }
    }
}

/// Handle returned by a successful registration; revokes it when asked.
pub struct ResourceRegistration {
    server: Weak<ServerInner>,
    path: Vec<String>,
}

impl ResourceRegistration {
    /// Clears the handler and prunes the now-unused part of the resource
    /// tree; requests under the prefix get 404 again. A handle outliving its
    /// server is a no-op.
    pub fn unregister(self) {
        let Some(inner) = self.server.upgrade() else {
            return;
        };
        let mut state = inner.state.lock().unwrap();
        if let Some(root) = state.resources.as_mut() {
            if root.unregister(&self.path) {
                state.resources = None;
            }
        }
    }
}
