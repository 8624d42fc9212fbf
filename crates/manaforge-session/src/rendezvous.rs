//! Matching account-server hand-offs with inbound game connections.
//!
//! Two parties race for every token:
//!
//! ```text
//!  account server ── register_handoff(token, identity) ──┐
//!                                                         ├─► bind + CONNECT_RESPONSE(OK)
//!  game client ────── CONNECT(token) ── attempt_connect ─┘
//! ```
//!
//! Whichever arrives first waits in its own pending set; the second one
//! completes the match. A token is never waiting in both sets at once.
//!
//! Hand-offs that nobody claims age out after
//! [`handoff_ttl_ticks`](crate::RendezvousConfig::handoff_ttl_ticks) world
//! ticks. Waiting connections do not age; they leave when they disconnect.

use std::collections::HashMap;

use manaforge_protocol::{ServerMessage, Status};
use manaforge_transport::ConnectionId;
use manaforge_world::{ConnectionRegistry, Identity, IdentityId, WorldError};

use crate::{RendezvousConfig, SessionError, Token};

// ---------------------------------------------------------------------------
// Outcomes and hooks
// ---------------------------------------------------------------------------

/// What [`SessionRendezvous::register_handoff`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// A connection was already waiting with this token and is now bound.
    Bound(ConnectionId),
    /// Stored; waiting for the client to connect.
    Pending,
    /// An unclaimed hand-off with the same token was overwritten and its
    /// grace period restarted. The old identity went to the expiry hook.
    Replaced,
}

/// What [`SessionRendezvous::attempt_connect`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The hand-off was already here; the connection is now bound to it.
    Bound(IdentityId),
    /// Stored; waiting for the hand-off.
    Pending,
    /// Nothing changed: the connection is already waiting (or bound), or
    /// another connection already waits on the same token.
    Ignored,
}

/// Called with each hand-off discarded unclaimed: it either ran out of
/// ticks, or a later hand-off for the same token replaced it.
///
/// Gets the identity back by value, so the world can log the character out
/// or return it to a pool. Any `FnMut(&Token, I)` closure works.
pub trait ExpiryHook<I>: Send + 'static {
    fn on_expired(&mut self, token: &Token, identity: I);
}

impl<I, F> ExpiryHook<I> for F
where
    F: FnMut(&Token, I) + Send + 'static,
{
    fn on_expired(&mut self, token: &Token, identity: I) {
        self(token, identity)
    }
}

struct PendingLogin<I> {
    identity: I,
    ttl: u32,
}

// ---------------------------------------------------------------------------
// SessionRendezvous
// ---------------------------------------------------------------------------

/// The two pending sets and the rules for moving between them.
///
/// Owned by the server task, like the registry it binds into. Nothing here
/// is shared or locked.
pub struct SessionRendezvous<I> {
    pending_logins: HashMap<Token, PendingLogin<I>>,
    pending_connections: HashMap<Token, ConnectionId>,
    /// Reverse of `pending_connections`, so dedup and disconnect cleanup do
    /// not scan.
    waiting_by_connection: HashMap<ConnectionId, Token>,
    config: RendezvousConfig,
    expiry_hook: Option<Box<dyn ExpiryHook<I>>>,
}

impl<I: Identity> SessionRendezvous<I> {
    pub fn new(config: RendezvousConfig) -> Self {
        Self {
            pending_logins: HashMap::new(),
            pending_connections: HashMap::new(),
            waiting_by_connection: HashMap::new(),
            config: config.validated(),
            expiry_hook: None,
        }
    }

    pub fn config(&self) -> &RendezvousConfig {
        &self.config
    }

    /// Installs a hook for expired or replaced hand-offs. Without one they
    /// are dropped silently.
    pub fn set_expiry_hook(&mut self, hook: impl ExpiryHook<I>) {
        self.set_boxed_expiry_hook(Box::new(hook));
    }

    pub fn set_boxed_expiry_hook(&mut self, hook: Box<dyn ExpiryHook<I>>) {
        self.expiry_hook = Some(hook);
    }

    /// Account-server side: `identity` may now log in with `token`.
    ///
    /// If a connection already presented this token it is bound right away
    /// and sent `CONNECT_RESPONSE(OK)`. Otherwise the hand-off waits for
    /// [`handoff_ttl_ticks`](RendezvousConfig::handoff_ttl_ticks).
    ///
    /// # Errors
    /// [`SessionError::World`] if the registry refuses the bind. The
    /// waiting connection is checked to be unbound first, so this indicates
    /// a registry bug rather than a client mistake.
    pub fn register_handoff(
        &mut self,
        registry: &mut ConnectionRegistry<I>,
        token: Token,
        identity: I,
    ) -> Result<HandoffOutcome, SessionError> {
        if let Some(conn_id) = self.pending_connections.remove(&token) {
            self.waiting_by_connection.remove(&conn_id);
            if registry.is_unbound(conn_id) {
                let identity_id = identity.id();
                registry.bind(conn_id, identity)?;
                registry.send(conn_id, &ServerMessage::ConnectResponse(Status::Ok));
                tracing::info!(
                    %conn_id,
                    identity = %identity_id,
                    %token,
                    "waiting connection bound to hand-off"
                );
                return Ok(HandoffOutcome::Bound(conn_id));
            }
            tracing::warn!(
                %conn_id,
                %token,
                "waiting connection vanished before its hand-off, keeping hand-off"
            );
        }

        let ttl = self.config.handoff_ttl_ticks;
        let identity_id = identity.id();
        let previous = self
            .pending_logins
            .insert(token.clone(), PendingLogin { identity, ttl });

        if let Some(previous) = previous {
            tracing::warn!(
                %token,
                identity = %identity_id,
                replaced = %previous.identity.id(),
                "hand-off token reused before it was claimed, replacing"
            );
            if let Some(hook) = self.expiry_hook.as_mut() {
                hook.on_expired(&token, previous.identity);
            }
            Ok(HandoffOutcome::Replaced)
        } else {
            tracing::debug!(%token, identity = %identity_id, ttl, "hand-off waiting");
            Ok(HandoffOutcome::Pending)
        }
    }

    /// Game-client side: connection `conn_id` presented `token`.
    ///
    /// Binds and answers `CONNECT_RESPONSE(OK)` if the hand-off is here.
    /// Otherwise the connection waits, silently. A connection waits under at
    /// most one token; further attempts from it are ignored until it is
    /// matched or disconnects.
    ///
    /// # Errors
    /// [`SessionError::World`] if `conn_id` is not in the registry. No
    /// pending state is touched in that case.
    pub fn attempt_connect(
        &mut self,
        registry: &mut ConnectionRegistry<I>,
        conn_id: ConnectionId,
        token: Token,
    ) -> Result<ConnectOutcome, SessionError> {
        match registry.get(conn_id) {
            None => return Err(WorldError::UnknownConnection(conn_id).into()),
            Some(conn) if conn.is_bound() => return Ok(ConnectOutcome::Ignored),
            Some(_) => {}
        }

        if let Some(pending) = self.pending_logins.remove(&token) {
            let identity_id = pending.identity.id();
            registry.bind(conn_id, pending.identity)?;
            // It may have been waiting under some other token.
            self.forget_connection(conn_id);
            registry.send(conn_id, &ServerMessage::ConnectResponse(Status::Ok));
            tracing::info!(%conn_id, identity = %identity_id, %token, "connection bound");
            return Ok(ConnectOutcome::Bound(identity_id));
        }

        if self.waiting_by_connection.contains_key(&conn_id) {
            tracing::debug!(%conn_id, "connection already waiting, ignoring CONNECT");
            return Ok(ConnectOutcome::Ignored);
        }

        if self.pending_connections.contains_key(&token) {
            tracing::debug!(%conn_id, %token, "token already claimed by a waiting connection");
            return Ok(ConnectOutcome::Ignored);
        }

        self.pending_connections.insert(token.clone(), conn_id);
        self.waiting_by_connection.insert(conn_id, token);
        tracing::debug!(%conn_id, "connection waiting for hand-off");
        Ok(ConnectOutcome::Pending)
    }

    /// One world tick: ages every waiting hand-off and drops those that hit
    /// zero. Returns how many expired.
    pub fn tick(&mut self) -> usize {
        let mut expired = Vec::new();
        for (token, pending) in self.pending_logins.iter_mut() {
            pending.ttl = pending.ttl.saturating_sub(1);
            if pending.ttl == 0 {
                expired.push(token.clone());
            }
        }

        for token in &expired {
            let Some(pending) = self.pending_logins.remove(token) else {
                continue;
            };
            tracing::debug!(%token, identity = %pending.identity.id(), "hand-off expired");
            if let Some(hook) = self.expiry_hook.as_mut() {
                hook.on_expired(token, pending.identity);
            }
        }
        expired.len()
    }

    /// Drops whatever `conn_id` was waiting on. Call before the registry
    /// forgets the connection. Returns whether anything was removed.
    pub fn on_disconnect(&mut self, conn_id: ConnectionId) -> bool {
        let removed = self.forget_connection(conn_id);
        if removed {
            tracing::debug!(%conn_id, "waiting connection left");
        }
        removed
    }

    fn forget_connection(&mut self, conn_id: ConnectionId) -> bool {
        match self.waiting_by_connection.remove(&conn_id) {
            Some(token) => {
                self.pending_connections.remove(&token);
                true
            }
            None => false,
        }
    }

    // -- Introspection ----------------------------------------------------

    pub fn has_pending_login(&self, token: &Token) -> bool {
        self.pending_logins.contains_key(token)
    }

    /// Ticks left before the hand-off for `token` expires.
    pub fn pending_login_ttl(&self, token: &Token) -> Option<u32> {
        self.pending_logins.get(token).map(|p| p.ttl)
    }

    pub fn has_pending_connection(&self, token: &Token) -> bool {
        self.pending_connections.contains_key(token)
    }

    /// The token `conn_id` is waiting under, if it is waiting.
    pub fn pending_token_for(&self, conn_id: ConnectionId) -> Option<&Token> {
        self.waiting_by_connection.get(&conn_id)
    }

    pub fn pending_login_count(&self) -> usize {
        self.pending_logins.len()
    }

    pub fn pending_connection_count(&self) -> usize {
        self.pending_connections.len()
    }
}

impl<I: Identity> Default for SessionRendezvous<I> {
    fn default() -> Self {
        Self::new(RendezvousConfig::default())
    }
}
