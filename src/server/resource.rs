use std::collections::HashMap;
use std::sync::Arc;

use crate::protocol::{Request, Response};
use crate::transport::Connection;

/// A resource handler turns a request into a response.
///
/// The request's target is rewritten to the path tail below the registered
/// prefix before the call. The connection is the one the request arrived on;
/// an upgrading handler clones it to take over the byte stream. The trailer
/// holds whatever bytes were buffered past the end of the request when the
/// handler ran; it matters only to upgrade handlers.
///
/// Handlers run on the thread that delivered the request's final bytes,
/// under the server's lock, so they must not call back into the server or
/// wait on engine events.
pub type ResourceHandler = dyn Fn(&Request, &Arc<dyn Connection>, &[u8]) -> Response + Send + Sync;

/// One node of the resource trie. A node either carries a handler or is
/// subdivided into named subspaces, never both; the path from the root to a
/// handler is the unique prefix that handler serves.
pub(crate) struct ResourceSpace {
    pub name: String,
    pub handler: Option<Arc<ResourceHandler>>,
    pub subspaces: HashMap<String, ResourceSpace>,
}

impl ResourceSpace {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), handler: None, subspaces: HashMap::new() }
    }

    /// Installs `handler` at `path`, creating intermediate nodes. False when
    /// the prefix would overlap an existing registration in either
    /// direction.
    pub fn register(&mut self, path: &[String], handler: Arc<ResourceHandler>) -> bool {
        let mut space = &mut *self;
        for segment in path {
            if space.handler.is_some() {
                return false;
            }
            space = space
                .subspaces
                .entry(segment.clone())
                .or_insert_with(|| ResourceSpace::new(segment.clone()));
        }
        if space.handler.is_some() || !space.subspaces.is_empty() {
            return false;
        }
        space.handler = Some(handler);
        true
    }

    /// Clears the handler at `path` and prunes nodes left with neither a
    /// handler nor subspaces. True when this node itself became empty.
    pub fn unregister(&mut self, path: &[String]) -> bool {
        match path.split_first() {
            Some((first, rest)) => {
                if let Some(child) = self.subspaces.get_mut(first) {
                    if child.unregister(rest) {
                        self.subspaces.remove(first);
                    }
                }
            }
            None => self.handler = None,
        }
        self.handler.is_none() && self.subspaces.is_empty()
    }

    /// Longest-prefix lookup: descends while segments match, returning the
    /// handler at the deepest matched node plus how many segments matched.
    pub fn find(&self, segments: &[String]) -> Option<(Arc<ResourceHandler>, usize)> {
        let mut space = self;
        let mut matched = 0;
        for segment in segments {
            match space.subspaces.get(segment) {
                Some(subspace) => {
                    space = subspace;
                    matched += 1;
                }
                None => break,
            }
        }
        space.handler.clone().map(|handler| (handler, matched))
    }
}
