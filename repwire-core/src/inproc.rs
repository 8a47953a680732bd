//! In-process transport.
//!
//! A bound socket publishes its [`PipeRegistry`] under an `inproc://name`
//! endpoint. Connecting creates a fresh pipe pair, registers the socket side
//! with the bound registry and hands the [`PeerEnd`] to the caller, who then
//! plays the requester: it sends requests and drains replies directly.
//!
//! # Usage
//!
//! ```rust
//! use repwire_core::inproc::{bind_inproc, connect_inproc, unbind_inproc};
//! use repwire_core::registry::PipeRegistry;
//!
//! # fn example() -> repwire_core::error::Result<()> {
//! let registry = PipeRegistry::new();
//! bind_inproc("inproc://doc-endpoint", &registry)?;
//!
//! let peer = connect_inproc("inproc://doc-endpoint")?;
//! peer.send(repwire_core::message::Message::new().push_empty().push_str("A"))?;
//! assert_eq!(registry.list_readable(), vec![peer.id()]);
//!
//! unbind_inproc("inproc://doc-endpoint")?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use crate::error::{RepError, Result};
use crate::options::SocketOptions;
use crate::pipe::{PeerEnd, Pipe};
use crate::registry::PipeRegistry;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

struct Binding {
    registry: Weak<PipeRegistry>,
    recv_hwm: usize,
    send_hwm: usize,
}

/// Global registry of inproc endpoints
static INPROC_ENDPOINTS: once_cell::sync::Lazy<DashMap<String, Binding>> =
    once_cell::sync::Lazy::new(DashMap::new);

/// Bind a registry to an inproc endpoint with default pipe limits.
///
/// # Errors
///
/// Returns an error if:
/// - The endpoint doesn't start with "inproc://"
/// - The endpoint name is empty
/// - The endpoint is already bound to a live socket
pub fn bind_inproc(endpoint: &str, registry: &Arc<PipeRegistry>) -> Result<()> {
    bind_inproc_with_options(endpoint, registry, &SocketOptions::default())
}

/// Bind a registry to an inproc endpoint.
///
/// Pipes created by later connects use the high water marks in `options`.
pub fn bind_inproc_with_options(
    endpoint: &str,
    registry: &Arc<PipeRegistry>,
    options: &SocketOptions,
) -> Result<()> {
    let name = validate_and_extract_name(endpoint)?;
    let binding = Binding {
        registry: Arc::downgrade(registry),
        recv_hwm: options.recv_hwm,
        send_hwm: options.send_hwm,
    };

    match INPROC_ENDPOINTS.entry(name.to_string()) {
        // A binding whose socket is gone is stale; take it over.
        Entry::Occupied(mut slot) if slot.get().registry.strong_count() == 0 => {
            slot.insert(binding);
        }
        Entry::Occupied(_) => {
            return Err(RepError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("inproc endpoint '{name}' is already bound"),
            )));
        }
        Entry::Vacant(slot) => {
            slot.insert(binding);
        }
    }

    debug!(endpoint, "[INPROC] Bound");
    Ok(())
}

/// Connect to an inproc endpoint.
///
/// Returns the peer end of a new pipe already registered with the bound
/// socket.
///
/// # Errors
///
/// Returns an error if the endpoint is malformed or not bound.
pub fn connect_inproc(endpoint: &str) -> Result<PeerEnd> {
    let name = validate_and_extract_name(endpoint)?;

    let (registry, recv_hwm, send_hwm) = INPROC_ENDPOINTS
        .get(name)
        .and_then(|b| b.registry.upgrade().map(|r| (r, b.recv_hwm, b.send_hwm)))
        .ok_or_else(|| {
            RepError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("inproc endpoint '{name}' not found (must bind before connect)"),
            ))
        })?;

    let (pipe, peer) = Pipe::pair(recv_hwm, send_hwm);
    registry.register(pipe);
    debug!(endpoint, pipe = %peer.id(), "[INPROC] Connected");
    Ok(peer)
}

/// Unbind an inproc endpoint, removing it from the global registry.
///
/// Pipes that are already connected stay attached.
pub fn unbind_inproc(endpoint: &str) -> Result<()> {
    let name = validate_and_extract_name(endpoint)?;
    INPROC_ENDPOINTS.remove(name);
    Ok(())
}

/// List all currently bound inproc endpoints.
///
/// Returns endpoint names without the "inproc://" prefix.
pub fn list_inproc_endpoints() -> Vec<String> {
    INPROC_ENDPOINTS
        .iter()
        .map(|entry| entry.key().clone())
        .collect()
}

/// Validate endpoint format and extract the name.
fn validate_and_extract_name(endpoint: &str) -> Result<&str> {
    const PREFIX: &str = "inproc://";

    let Some(name) = endpoint.strip_prefix(PREFIX) else {
        return Err(RepError::endpoint(format!(
            "inproc endpoint must start with '{PREFIX}', got: '{endpoint}'"
        )));
    };
    if name.is_empty() {
        return Err(RepError::endpoint("inproc endpoint name cannot be empty"));
    }

    Ok(name)
}
