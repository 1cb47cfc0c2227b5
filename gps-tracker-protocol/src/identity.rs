use std::net::SocketAddr;

use gps_tracker_types::Imei;

use crate::field::Field;

/// State the decoder keeps for one device connection.
///
/// A device only identifies itself reliably in the first frame it sends, so
/// the identity decoded from that frame is cached here and used for every
/// later frame on the same connection. The context is created when the
/// connection is accepted and dropped when it closes, so identities never leak
/// between connections.
#[derive(Debug)]
pub struct ConnectionContext {
    peer_address: SocketAddr,
    identity: Option<Field<Imei>>,
}

impl ConnectionContext {
    pub fn new(peer_address: SocketAddr) -> Self {
        Self {
            peer_address,
            identity: None,
        }
    }

    pub fn peer_address(&self) -> SocketAddr {
        self.peer_address
    }

    /// The identity of this connection, if the first frame was decoded
    /// already.
    pub fn identity(&self) -> Option<&Field<Imei>> {
        self.identity.as_ref()
    }

    /// Returns the cached identity, or calls `decode` and caches its result if
    /// this is the first frame.
    ///
    /// A fallback identity is cached just like a decoded one.
    pub fn resolve_identity(&mut self, decode: impl FnOnce() -> Field<Imei>) -> &Field<Imei> {
        let peer_address = self.peer_address;
        self.identity.get_or_insert_with(|| {
            let identity = decode();
            tracing::debug!(%peer_address, ?identity, "identity resolved");
            identity
        })
    }
}
