//! The set of live game connections and what each one is bound to.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use manaforge_protocol::ServerMessage;
use manaforge_transport::{ConnectionId, PeerSender};

use crate::{Identity, IdentityId, WorldError};

/// Whether a connection has been matched to a world identity yet.
#[derive(Debug)]
pub enum Binding<I> {
    Unbound,
    Bound(I),
}

/// One live game connection.
#[derive(Debug)]
pub struct Connection<I> {
    id: ConnectionId,
    peer: PeerSender,
    binding: Binding<I>,
}

impl<I: Identity> Connection<I> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn binding(&self) -> &Binding<I> {
        &self.binding
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound(_))
    }

    pub fn identity(&self) -> Option<&I> {
        match &self.binding {
            Binding::Bound(identity) => Some(identity),
            Binding::Unbound => None,
        }
    }

    pub fn identity_mut(&mut self) -> Option<&mut I> {
        match &mut self.binding {
            Binding::Bound(identity) => Some(identity),
            Binding::Unbound => None,
        }
    }

    /// Queues raw bytes to the peer. `false` if its writer is gone.
    pub fn send_bytes(&self, data: Bytes) -> bool {
        self.peer.send(data)
    }

    pub fn send(&self, msg: &ServerMessage) -> bool {
        self.send_bytes(msg.encode().into_bytes())
    }
}

/// Owns every live connection, bound or not.
///
/// Keeps an identity → connections index alongside the main map so that
/// addressed delivery does not scan. The two are only ever changed together,
/// in [`bind`](Self::bind) and [`remove`](Self::remove). An identity bound on
/// several connections lists all of them, oldest first.
///
/// Iteration is in connection-id order, which keeps broadcast order (and
/// tests) deterministic.
pub struct ConnectionRegistry<I> {
    connections: BTreeMap<ConnectionId, Connection<I>>,
    by_identity: HashMap<IdentityId, Vec<ConnectionId>>,
}

impl<I: Identity> ConnectionRegistry<I> {
    pub fn new() -> Self {
        Self {
            connections: BTreeMap::new(),
            by_identity: HashMap::new(),
        }
    }

    /// Adds a freshly accepted connection in the unbound state.
    ///
    /// Transport ids are unique for the process, so a repeat id means the
    /// old entry is stale; it is replaced.
    pub fn insert(&mut self, id: ConnectionId, peer: PeerSender) {
        let conn = Connection {
            id,
            peer,
            binding: Binding::Unbound,
        };
        if let Some(old) = self.connections.insert(id, conn) {
            tracing::warn!(conn_id = %id, "connection id reused, dropping stale entry");
            self.unindex(&old);
        }
    }

    /// Forgets a connection and its identity index entry.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection<I>> {
        let conn = self.connections.remove(&id)?;
        self.unindex(&conn);
        Some(conn)
    }

    fn unindex(&mut self, conn: &Connection<I>) {
        if let Some(identity) = conn.identity() {
            let identity_id = identity.id();
            if let Some(ids) = self.by_identity.get_mut(&identity_id) {
                ids.retain(|id| *id != conn.id);
                if ids.is_empty() {
                    self.by_identity.remove(&identity_id);
                }
            }
        }
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection<I>> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection<I>> {
        self.connections.get_mut(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// `true` only for a registered connection that has no identity yet.
    pub fn is_unbound(&self, id: ConnectionId) -> bool {
        self.connections.get(&id).is_some_and(|c| !c.is_bound())
    }

    /// Binds `id` to `identity`. Unbound → Bound is the only transition.
    ///
    /// If the identity is already bound elsewhere (two hand-offs for the same
    /// character), both connections stay bound and addressed delivery goes to
    /// the newest one still registered.
    ///
    /// # Errors
    /// - [`WorldError::UnknownConnection`] if `id` is not registered.
    /// - [`WorldError::AlreadyBound`] if `id` already has an identity.
    pub fn bind(&mut self, id: ConnectionId, identity: I) -> Result<(), WorldError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(WorldError::UnknownConnection(id))?;
        if let Some(current) = conn.identity() {
            return Err(WorldError::AlreadyBound(id, current.id()));
        }

        let identity_id = identity.id();
        conn.binding = Binding::Bound(identity);

        let ids = self.by_identity.entry(identity_id).or_default();
        if let Some(previous) = ids.last() {
            tracing::warn!(
                identity = %identity_id,
                previous = %previous,
                conn_id = %id,
                "identity bound to a second connection"
            );
        }
        ids.push(id);
        Ok(())
    }

    /// The connection currently playing `identity`, if any. The newest one
    /// wins when several are bound to it.
    pub fn connection_for(&self, identity: IdentityId) -> Option<ConnectionId> {
        self.by_identity
            .get(&identity)
            .and_then(|ids| ids.last())
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection<I>> {
        self.connections.values()
    }

    /// Bound connections with their identities.
    pub fn bound(&self) -> impl Iterator<Item = (&Connection<I>, &I)> {
        self.connections
            .values()
            .filter_map(|c| c.identity().map(|identity| (c, identity)))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn bound_count(&self) -> usize {
        self.bound().count()
    }

    /// Encodes and queues `msg` to connection `id`. `false` when the
    /// connection is unknown or its writer has gone away.
    pub fn send(&self, id: ConnectionId, msg: &ServerMessage) -> bool {
        self.connections.get(&id).is_some_and(|c| c.send(msg))
    }

    /// Per-tick housekeeping: drops connections whose writer has shut down
    /// without a disconnect event reaching us yet. Returns the removed ids so
    /// the caller can purge its own per-connection state.
    pub fn sweep_closed(&mut self) -> Vec<ConnectionId> {
        let closed: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.peer.is_closed())
            .map(|c| c.id)
            .collect();
        for id in &closed {
            tracing::debug!(conn_id = %id, "sweeping closed connection");
            self.remove(*id);
        }
        closed
    }
}

impl<I: Identity> Default for ConnectionRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}
