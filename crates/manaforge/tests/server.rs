//! Integration tests for the game server: event handling, the run loop, and
//! a real WebSocket round trip.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use manaforge::prelude::*;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

type LocalServer = GameServer<Character, SquareRadius, LocalTransport, ManualTicks>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

// =========================================================================
// Helpers
// =========================================================================

fn local_server() -> (LocalServer, HandoffHandle<Character>) {
    let (transport, _handle) = LocalTransport::new();
    let (ticks, _ticks) = ManualTicks::new(Duration::from_millis(100));
    GameServer::new(transport, ticks, SquareRadius(10), RendezvousConfig::default())
}

fn hero(id: u64, name: &str, x: u16, y: u16) -> Character {
    Character::new(id, name, MapId(1), Position::new(x, y))
}

fn token(s: &str) -> Token {
    Token::new(s).unwrap()
}

fn connect_msg(token: &str) -> ClientMessage {
    ClientMessage::Connect {
        token: token.to_string(),
    }
}

/// Feeds a `Connected` event and returns the peer's outbound queue.
fn accept(server: &mut LocalServer, n: u64) -> (ConnectionId, PeerReceiver) {
    let id = ConnectionId::new(n);
    let (peer, rx) = PeerSender::channel();
    assert!(server.process_event(TransportEvent::Connected { id, peer }).is_none());
    (id, rx)
}

fn deliver(server: &mut LocalServer, id: ConnectionId, msg: &ClientMessage) -> Dispatch {
    server
        .process_event(TransportEvent::Message {
            id,
            data: msg.encode().into_bytes(),
        })
        .expect("message events always produce a dispatch")
}

fn decode(data: Bytes) -> ServerMessage {
    let mut msg = MessageIn::parse(data).unwrap();
    ServerMessage::decode(&mut msg).unwrap()
}

fn next_reply(rx: &mut PeerReceiver) -> ServerMessage {
    decode(rx.try_recv().expect("expected a reply"))
}

async fn recv_reply(rx: &mut PeerReceiver) -> ServerMessage {
    let data = tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a reply")
        .expect("peer queue closed");
    decode(data)
}

// =========================================================================
// Event handling
// =========================================================================

#[test]
fn test_handoff_then_connect_binds_and_acknowledges() {
    let (mut server, _handoffs) = local_server();
    let (conn, mut rx) = accept(&mut server, 1);

    let outcome = server
        .register_handoff(token("alpha"), hero(7, "ayla", 5, 5))
        .unwrap();
    assert_eq!(outcome, HandoffOutcome::Pending);

    let dispatch = deliver(&mut server, conn, &connect_msg("alpha"));
    assert_eq!(dispatch, Dispatch::Rendezvous(ConnectOutcome::Bound(IdentityId(7))));
    assert_eq!(next_reply(&mut rx), ServerMessage::ConnectResponse(Status::Ok));
    assert_eq!(server.registry().connection_for(IdentityId(7)), Some(conn));
    assert_eq!(server.rendezvous().pending_login_count(), 0);
}

#[test]
fn test_connect_then_handoff_binds_and_acknowledges() {
    let (mut server, _handoffs) = local_server();
    let (conn, mut rx) = accept(&mut server, 1);

    let dispatch = deliver(&mut server, conn, &connect_msg("beta"));
    assert_eq!(dispatch, Dispatch::Rendezvous(ConnectOutcome::Pending));
    assert!(rx.try_recv().is_none());

    let outcome = server
        .register_handoff(token("beta"), hero(8, "bram", 5, 5))
        .unwrap();
    assert_eq!(outcome, HandoffOutcome::Bound(conn));
    assert_eq!(next_reply(&mut rx), ServerMessage::ConnectResponse(Status::Ok));
    assert_eq!(server.rendezvous().pending_connection_count(), 0);
}

#[test]
fn test_gameplay_before_binding_is_dropped_silently() {
    let (mut server, _handoffs) = local_server();
    let (conn, mut rx) = accept(&mut server, 1);

    let dispatch = deliver(&mut server, conn, &ClientMessage::Pickup { item: ItemId(3) });
    assert_eq!(dispatch, Dispatch::Dropped);
    assert!(rx.try_recv().is_none());
}

#[test]
fn test_bound_gameplay_round_trip() {
    let (mut server, _handoffs) = local_server();
    let (conn, mut rx) = accept(&mut server, 1);
    server.register_handoff(token("gamma"), hero(1, "cid", 5, 5)).unwrap();
    deliver(&mut server, conn, &connect_msg("gamma"));
    rx.drain();

    deliver(&mut server, conn, &ClientMessage::UseItem { item: ItemId(40) });
    assert_eq!(next_reply(&mut rx), ServerMessage::UseResponse(Status::Failure));

    deliver(&mut server, conn, &ClientMessage::Pickup { item: ItemId(40) });
    assert_eq!(next_reply(&mut rx), ServerMessage::PickupResponse(Status::Ok));

    deliver(&mut server, conn, &ClientMessage::UseItem { item: ItemId(40) });
    assert_eq!(next_reply(&mut rx), ServerMessage::UseResponse(Status::Ok));

    deliver(&mut server, conn, &ClientMessage::Equip { item: ItemId(40), slot: 2 });
    assert_eq!(next_reply(&mut rx), ServerMessage::EquipResponse(Status::Ok));

    let dispatch = deliver(&mut server, conn, &ClientMessage::Walk { x: 9, y: 11 });
    assert_eq!(
        dispatch,
        Dispatch::Handled {
            opcode: Opcode::WALK,
            responded: false
        }
    );
    assert!(rx.try_recv().is_none());
    let position = server
        .registry()
        .get(conn)
        .and_then(|c| c.identity())
        .map(|c| c.position());
    assert_eq!(position, Some(Position::new(9, 11)));
}

#[test]
fn test_second_connect_on_bound_connection_is_invalid() {
    let (mut server, _handoffs) = local_server();
    let (conn, mut rx) = accept(&mut server, 1);
    server.register_handoff(token("delta"), hero(1, "dax", 5, 5)).unwrap();
    deliver(&mut server, conn, &connect_msg("delta"));
    rx.drain();

    let dispatch = deliver(&mut server, conn, &connect_msg("delta"));
    assert_eq!(dispatch, Dispatch::Rejected(Opcode::CONNECT));
    assert_eq!(next_reply(&mut rx), ServerMessage::Invalid);
}

#[test]
fn test_say_reaches_nearby_players_only() {
    let (mut server, _handoffs) = local_server();
    let (a, mut rx_a) = accept(&mut server, 1);
    let (b, mut rx_b) = accept(&mut server, 2);
    let (c, mut rx_c) = accept(&mut server, 3);

    server.register_handoff(token("a"), hero(1, "ann", 10, 10)).unwrap();
    server.register_handoff(token("b"), hero(2, "ben", 15, 12)).unwrap();
    server.register_handoff(token("c"), hero(3, "cat", 90, 90)).unwrap();
    deliver(&mut server, a, &connect_msg("a"));
    deliver(&mut server, b, &connect_msg("b"));
    deliver(&mut server, c, &connect_msg("c"));
    rx_a.drain();
    rx_b.drain();
    rx_c.drain();

    deliver(&mut server, a, &ClientMessage::Say { text: "hi".into() });

    let expected = ServerMessage::Say {
        speaker: "ann".into(),
        text: "hi".into(),
    };
    assert_eq!(next_reply(&mut rx_b), expected);
    assert_eq!(next_reply(&mut rx_a), expected);
    assert!(rx_c.try_recv().is_none());
}

#[test]
fn test_unclaimed_handoff_expires_after_ttl_ticks() {
    let (mut server, _handoffs) = local_server();
    server.register_handoff(token("late"), hero(1, "lee", 5, 5)).unwrap();

    for _ in 0..299 {
        assert_eq!(server.advance_tick().expired_handoffs, 0);
    }
    assert!(server.rendezvous().has_pending_login(&token("late")));

    let report = server.advance_tick();
    assert_eq!(report.expired_handoffs, 1);
    assert!(!server.rendezvous().has_pending_login(&token("late")));

    // The token is gone: a late client just waits.
    let (conn, mut rx) = accept(&mut server, 1);
    let dispatch = deliver(&mut server, conn, &connect_msg("late"));
    assert_eq!(dispatch, Dispatch::Rendezvous(ConnectOutcome::Pending));
    assert!(rx.try_recv().is_none());
}

#[test]
fn test_disconnect_clears_waiting_connection() {
    let (mut server, _handoffs) = local_server();
    let (conn, _rx) = accept(&mut server, 1);
    deliver(&mut server, conn, &connect_msg("omega"));
    assert!(server.rendezvous().has_pending_connection(&token("omega")));

    assert!(server
        .process_event(TransportEvent::Disconnected { id: conn })
        .is_none());
    assert!(!server.rendezvous().has_pending_connection(&token("omega")));
    assert!(server.registry().is_empty());

    // The hand-off now waits instead of binding a dead connection.
    let outcome = server
        .register_handoff(token("omega"), hero(1, "oz", 5, 5))
        .unwrap();
    assert_eq!(outcome, HandoffOutcome::Pending);
}

#[test]
fn test_tick_sweeps_connections_with_closed_writers() {
    let (mut server, _handoffs) = local_server();
    let (conn, mut rx) = accept(&mut server, 1);
    deliver(&mut server, conn, &connect_msg("gone"));
    rx.close();

    let report = server.advance_tick();
    assert_eq!(report.swept_connections, 1);
    assert!(!server.registry().contains(conn));
    assert!(!server.rendezvous().has_pending_connection(&token("gone")));
}

#[test]
fn test_send_to_targets_bound_identity() {
    let (mut server, _handoffs) = local_server();
    let (conn, mut rx) = accept(&mut server, 1);
    server.register_handoff(token("eps"), hero(5, "eve", 5, 5)).unwrap();
    deliver(&mut server, conn, &connect_msg("eps"));
    rx.drain();

    assert!(server.send_to(IdentityId(5), &ServerMessage::Invalid));
    assert_eq!(next_reply(&mut rx), ServerMessage::Invalid);
    assert!(!server.send_to(IdentityId(6), &ServerMessage::Invalid));
}

#[test]
fn test_message_from_unknown_connection_is_dropped() {
    let (mut server, _handoffs) = local_server();
    let dispatch = deliver(&mut server, ConnectionId::new(99), &connect_msg("x"));
    assert_eq!(dispatch, Dispatch::Dropped);
    assert_eq!(server.rendezvous().pending_connection_count(), 0);
}

// =========================================================================
// Run loop
// =========================================================================

struct Running {
    peers: LocalTransportHandle,
    handoffs: HandoffHandle<Character>,
    ticks: ManualTickHandle,
    task: tokio::task::JoinHandle<Result<(), ManaforgeError>>,
}

fn spawn_local(builder: GameServerBuilder<Character>) -> Running {
    let (transport, peers) = LocalTransport::new();
    let (ticks_source, ticks) = ManualTicks::new(Duration::from_millis(100));
    let (server, handoffs) = builder.build_with(transport, ticks_source, SquareRadius(10));
    Running {
        peers,
        handoffs,
        ticks,
        task: tokio::spawn(server.run()),
    }
}

#[tokio::test]
async fn test_run_loop_handoff_through_handle() {
    let running = spawn_local(GameServerBuilder::new());
    let (conn, mut rx) = running.peers.connect();

    running
        .handoffs
        .register_handoff(token("zeta"), hero(1, "zed", 5, 5))
        .unwrap();
    running
        .peers
        .send(conn, connect_msg("zeta").encode().into_bytes());

    assert_eq!(
        recv_reply(&mut rx).await,
        ServerMessage::ConnectResponse(Status::Ok)
    );

    running
        .peers
        .send(conn, ClientMessage::Pickup { item: ItemId(1) }.encode().into_bytes());
    assert_eq!(
        recv_reply(&mut rx).await,
        ServerMessage::PickupResponse(Status::Ok)
    );
}

#[tokio::test]
async fn test_run_loop_expiry_hook_fires_on_ticks() {
    let (expired_tx, mut expired_rx) = mpsc::unbounded_channel();
    let running = spawn_local(
        GameServerBuilder::new()
            .handoff_ttl(3)
            .on_handoff_expired(move |_token: &Token, who: Character| {
                let _ = expired_tx.send(who.name().to_string());
            }),
    );

    running
        .handoffs
        .register_handoff(token("eta"), hero(1, "old", 5, 5))
        .unwrap();
    running.ticks.step_n(3);

    let name = tokio::time::timeout(RECV_TIMEOUT, expired_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(name, "old");

    // The expired identity cannot be claimed; a fresh hand-off can.
    let (conn, mut rx) = running.peers.connect();
    running
        .peers
        .send(conn, connect_msg("eta").encode().into_bytes());
    running
        .handoffs
        .register_handoff(token("eta"), hero(2, "new", 5, 5))
        .unwrap();

    assert_eq!(
        recv_reply(&mut rx).await,
        ServerMessage::ConnectResponse(Status::Ok)
    );
}

#[tokio::test]
async fn test_run_loop_ticks_ahead_of_transport_backlog() {
    let (expired_tx, mut expired_rx) = mpsc::unbounded_channel();
    let Running {
        peers,
        handoffs,
        ticks,
        task,
    } = spawn_local(
        GameServerBuilder::new()
            .handoff_ttl(1)
            .on_handoff_expired(move |_token: &Token, who: Character| {
                let _ = expired_tx.send(who.name().to_string());
            }),
    );

    // The server task has not been polled yet, so everything below is
    // already queued when it starts.
    handoffs
        .register_handoff(token("theta"), hero(1, "tess", 5, 5))
        .unwrap();
    assert!(ticks.step());
    let (noisy, _noisy_rx) = peers.connect();
    for _ in 0..10_000 {
        peers.send(noisy, ClientMessage::Walk { x: 1, y: 1 }.encode().into_bytes());
    }
    let (conn, mut rx) = peers.connect();
    peers.send(conn, connect_msg("theta").encode().into_bytes());

    drop(peers);
    let result = tokio::time::timeout(RECV_TIMEOUT, task).await.unwrap().unwrap();
    assert!(result.is_ok());

    // The tick expired the hand-off before the backlog reached CONNECT.
    assert_eq!(expired_rx.try_recv().ok().as_deref(), Some("tess"));
    assert!(rx.try_recv().is_none());
}

#[tokio::test]
async fn test_run_loop_stops_when_transport_closes() {
    let running = spawn_local(GameServerBuilder::new());
    let Running {
        peers,
        handoffs,
        ticks: _ticks,
        task,
    } = running;

    drop(peers);
    let result = tokio::time::timeout(RECV_TIMEOUT, task).await.unwrap().unwrap();
    assert!(result.is_ok());

    assert!(handoffs.is_closed());
    assert!(matches!(
        handoffs.register_handoff(token("late"), hero(1, "x", 0, 0)),
        Err(ManaforgeError::ServerStopped)
    ));
}

// =========================================================================
// WebSocket
// =========================================================================

#[tokio::test]
async fn test_websocket_client_binds_through_rendezvous() {
    let (server, handoffs) = GameServerBuilder::<Character>::new()
        .bind("127.0.0.1:0")
        .build(SquareRadius(10))
        .await
        .unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.run());

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();

    let tok = Token::generate();
    ws.send(Message::Binary(
        connect_msg(tok.as_str()).encode().into_bytes(),
    ))
    .await
    .unwrap();
    handoffs
        .register_handoff(tok, hero(42, "wes", 5, 5))
        .unwrap();

    let reply = tokio::time::timeout(RECV_TIMEOUT, ws.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .unwrap();
    match reply {
        Message::Binary(data) => {
            assert_eq!(decode(data), ServerMessage::ConnectResponse(Status::Ok));
        }
        other => panic!("expected binary frame, got {other:?}"),
    }
}
