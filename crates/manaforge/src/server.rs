//! `GameServer` builder and event loop.
//!
//! One task owns all session state. It waits on three sources and handles
//! one item at a time:
//!
//! ```text
//!   Transport events ──┐
//!   Hand-off commands ─┼─► GameServer::run ──► registry / rendezvous / dispatcher
//!   World ticks ───────┘
//! ```
//!
//! Reader and writer tasks inside the transport only move bytes, so there is
//! no locking anywhere in the session path.

use std::net::SocketAddr;

use manaforge_protocol::ServerMessage;
use manaforge_session::{ExpiryHook, HandoffOutcome, RendezvousConfig, SessionRendezvous, Token};
use manaforge_tick::{TickPolicy, TickScheduler, TickSource};
use manaforge_transport::{
    ConnectionId, Transport, TransportError, TransportEvent, WebSocketTransport,
};
use manaforge_world::{ConnectionRegistry, Identity, IdentityId, Proximity};
use tokio::sync::mpsc;

use crate::dispatcher::{Dispatch, MessageDispatcher};
use crate::handoff::{HandoffCommand, HandoffHandle};
use crate::{GameServerConfig, ManaforgeError};

/// What one world tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Hand-offs that ran out of time.
    pub expired_handoffs: usize,
    /// Connections dropped because their writer had already gone.
    pub swept_connections: usize,
}

// ---------------------------------------------------------------------------
// GameServer
// ---------------------------------------------------------------------------

/// A game server: connections, the hand-off rendezvous, and message routing.
///
/// `I` is the world's identity type and `P` its proximity rule. The
/// transport and tick source default to WebSocket and the wall clock; tests
/// swap in `LocalTransport` and `ManualTicks`.
pub struct GameServer<I, P, T = WebSocketTransport, S = TickScheduler> {
    transport: T,
    ticks: S,
    registry: ConnectionRegistry<I>,
    rendezvous: SessionRendezvous<I>,
    dispatcher: MessageDispatcher<P>,
    handoffs: mpsc::UnboundedReceiver<HandoffCommand<I>>,
}

impl<I, P, T, S> GameServer<I, P, T, S>
where
    I: Identity,
    P: Proximity,
    T: Transport,
    S: TickSource,
{
    /// Assembles a server from parts. The returned handle is the only way
    /// to feed it hand-offs while [`run`](Self::run) owns it.
    pub fn new(
        transport: T,
        ticks: S,
        proximity: P,
        config: RendezvousConfig,
    ) -> (Self, HandoffHandle<I>) {
        let (handle, handoffs) = HandoffHandle::channel();
        let server = Self {
            transport,
            ticks,
            registry: ConnectionRegistry::new(),
            rendezvous: SessionRendezvous::new(config),
            dispatcher: MessageDispatcher::new(proximity),
            handoffs,
        };
        (server, handle)
    }

    /// Installs a hook for hand-offs that expire unclaimed.
    pub fn set_expiry_hook(&mut self, hook: impl ExpiryHook<I>) {
        self.rendezvous.set_expiry_hook(hook);
    }

    pub fn registry(&self) -> &ConnectionRegistry<I> {
        &self.registry
    }

    pub fn rendezvous(&self) -> &SessionRendezvous<I> {
        &self.rendezvous
    }

    /// Applies one transport event. Returns what happened to a message, or
    /// `None` for connect and disconnect events.
    pub fn process_event(&mut self, event: TransportEvent) -> Option<Dispatch> {
        match event {
            TransportEvent::Connected { id, peer } => {
                self.registry.insert(id, peer);
                tracing::info!(conn_id = %id, online = self.registry.len(), "connection accepted");
                None
            }
            TransportEvent::Message { id, data } => Some(self.dispatcher.dispatch(
                &mut self.registry,
                &mut self.rendezvous,
                id,
                data,
            )),
            TransportEvent::Disconnected { id } => {
                self.forget(id);
                None
            }
        }
    }

    fn forget(&mut self, id: ConnectionId) {
        // Pending state first, so nothing can match a dead connection.
        self.rendezvous.on_disconnect(id);
        match self.registry.remove(id) {
            Some(conn) => match conn.identity() {
                Some(identity) => {
                    tracing::info!(conn_id = %id, identity = %identity.id(), "connection closed");
                }
                None => tracing::debug!(conn_id = %id, "unbound connection closed"),
            },
            None => tracing::debug!(conn_id = %id, "disconnect for unknown connection"),
        }
    }

    /// Same as [`HandoffHandle::register_handoff`], applied immediately.
    pub fn register_handoff(
        &mut self,
        token: Token,
        identity: I,
    ) -> Result<HandoffOutcome, ManaforgeError> {
        Ok(self
            .rendezvous
            .register_handoff(&mut self.registry, token, identity)?)
    }

    /// Runs one world tick's housekeeping: ages hand-offs, then drops
    /// connections whose writer is already gone.
    pub fn advance_tick(&mut self) -> TickReport {
        let expired_handoffs = self.rendezvous.tick();
        let swept = self.registry.sweep_closed();
        for id in &swept {
            self.rendezvous.on_disconnect(*id);
        }
        TickReport {
            expired_handoffs,
            swept_connections: swept.len(),
        }
    }

    /// Sends `msg` to whoever is playing `identity`, if anyone.
    pub fn send_to(&self, identity: IdentityId, msg: &ServerMessage) -> bool {
        self.dispatcher.router().send_to(&self.registry, identity, msg)
    }

    /// Runs until the transport shuts down.
    ///
    /// Each iteration checks hand-offs, then the tick clock, then the
    /// transport, and handles exactly one item. A due tick therefore runs
    /// after at most one more client message, however deep the transport
    /// backlog. Hand-offs stop arriving (but the server keeps running) once
    /// every [`HandoffHandle`] is dropped.
    pub async fn run(mut self) -> Result<(), ManaforgeError> {
        tracing::info!("game server running");

        loop {
            tokio::select! {
                biased;

                Some(cmd) = self.handoffs.recv() => {
                    if let Err(err) = self.register_handoff(cmd.token, cmd.identity) {
                        tracing::warn!(error = %err, "hand-off failed");
                    }
                }

                info = self.ticks.next_tick() => {
                    let report = self.advance_tick();
                    tracing::trace!(
                        tick = info.tick,
                        expired = report.expired_handoffs,
                        swept = report.swept_connections,
                        "world tick"
                    );
                    self.ticks.tick_finished();
                }

                event = self.transport.next_event() => match event {
                    Ok(event) => {
                        self.process_event(event);
                    }
                    Err(TransportError::Shutdown) => {
                        tracing::info!(online = self.registry.len(), "transport closed, stopping");
                        return Ok(());
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "transport error");
                    }
                },
            }
        }
    }
}

impl<I, P, S> GameServer<I, P, WebSocketTransport, S> {
    /// The address the WebSocket listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a WebSocket [`GameServer`] on the wall clock.
///
/// ```rust,ignore
/// let (server, handoffs) = GameServerBuilder::<Character>::new()
///     .bind("0.0.0.0:9601")
///     .tick_rate(10)
///     .build(SquareRadius(10))
///     .await?;
/// tokio::spawn(server.run());
/// handoffs.register_handoff(token, character)?;
/// ```
pub struct GameServerBuilder<I> {
    config: GameServerConfig,
    expiry_hook: Option<Box<dyn ExpiryHook<I>>>,
}

impl<I: Identity> GameServerBuilder<I> {
    pub fn new() -> Self {
        Self {
            config: GameServerConfig::default(),
            expiry_hook: None,
        }
    }

    /// Replaces every setting with `config`.
    pub fn config(mut self, config: GameServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn tick_rate(mut self, hz: u32) -> Self {
        self.config.tick.tick_rate_hz = hz;
        self
    }

    pub fn tick_policy(mut self, policy: TickPolicy) -> Self {
        self.config.tick.policy = policy;
        self
    }

    /// Grace period for unclaimed hand-offs, in world ticks.
    pub fn handoff_ttl(mut self, ticks: u32) -> Self {
        self.config.rendezvous.handoff_ttl_ticks = ticks;
        self
    }

    pub fn on_handoff_expired(mut self, hook: impl ExpiryHook<I>) -> Self {
        self.expiry_hook = Some(Box::new(hook));
        self
    }

    /// Binds the listener and starts the tick clock.
    ///
    /// # Errors
    /// [`ManaforgeError::Transport`] if the address cannot be bound.
    pub async fn build<P: Proximity>(
        self,
        proximity: P,
    ) -> Result<(GameServer<I, P>, HandoffHandle<I>), ManaforgeError> {
        let config = self.config.validated();
        let transport = WebSocketTransport::bind(&config.bind_addr).await?;
        tracing::info!(addr = %transport.local_addr(), "game listener bound");
        let ticks = TickScheduler::new(config.tick);
        Ok(Self::assemble(transport, ticks, proximity, config.rendezvous, self.expiry_hook))
    }

    /// Builds around a caller-supplied transport and tick source. Network
    /// and tick settings from the config are not used.
    pub fn build_with<P, T, S>(
        self,
        transport: T,
        ticks: S,
        proximity: P,
    ) -> (GameServer<I, P, T, S>, HandoffHandle<I>)
    where
        P: Proximity,
        T: Transport,
        S: TickSource,
    {
        let config = self.config.validated();
        Self::assemble(transport, ticks, proximity, config.rendezvous, self.expiry_hook)
    }

    fn assemble<P, T, S>(
        transport: T,
        ticks: S,
        proximity: P,
        rendezvous: RendezvousConfig,
        expiry_hook: Option<Box<dyn ExpiryHook<I>>>,
    ) -> (GameServer<I, P, T, S>, HandoffHandle<I>)
    where
        P: Proximity,
        T: Transport,
        S: TickSource,
    {
        let (mut server, handle) = GameServer::new(transport, ticks, proximity, rendezvous);
        if let Some(hook) = expiry_hook {
            server.rendezvous.set_boxed_expiry_hook(hook);
        }
        (server, handle)
    }
}

impl<I: Identity> Default for GameServerBuilder<I> {
    fn default() -> Self {
        Self::new()
    }
}
