use manaforge::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Stand-in account server
// ---------------------------------------------------------------------------

/// Characters the "account server" logs in at startup.
const ROSTER: &[(u64, &str, u16, u16)] = &[
    (1, "ayla", 20, 20),
    (2, "bram", 24, 18),
    (3, "cato", 70, 70),
];

const TOWN: MapId = MapId(1);

/// Hands every roster character to the server under a fresh token.
fn hand_off_roster(
    handoffs: &HandoffHandle<Character>,
) -> Result<Vec<(String, Token)>, ManaforgeError> {
    ROSTER
        .iter()
        .map(|&(id, name, x, y)| {
            let token = Token::generate();
            let character = Character::new(id, name, TOWN, Position::new(x, y));
            handoffs.register_handoff(token.clone(), character)?;
            Ok((name.to_string(), token))
        })
        .collect()
}

async fn start(
    config: GameServerConfig,
) -> Result<(GameServer<Character, SquareRadius>, HandoffHandle<Character>), ManaforgeError> {
    GameServerBuilder::new()
        .config(config)
        .on_handoff_expired(|token: &Token, who: Character| {
            tracing::info!(%token, name = who.name(), "login window closed");
        })
        .build(SquareRadius::default())
        .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => GameServerConfig::from_json_file(path)?,
        None => GameServerConfig::default(),
    };

    let (server, handoffs) = start(config).await?;
    tracing::info!(addr = %server.local_addr(), "game server ready");

    for (name, token) in hand_off_roster(&handoffs)? {
        // Full token on purpose: a player pastes it into the client.
        tracing::info!(name = %name, token = token.as_str(), "login ready");
    }

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    type Ws = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn boot() -> (String, Vec<(String, Token)>) {
        let config = GameServerConfig {
            bind_addr: "127.0.0.1:0".into(),
            ..GameServerConfig::default()
        };
        let (server, handoffs) = start(config).await.unwrap();
        let addr = server.local_addr().to_string();
        let roster = hand_off_roster(&handoffs).unwrap();
        tokio::spawn(server.run());
        (addr, roster)
    }

    async fn client(addr: &str) -> Ws {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        ws
    }

    async fn send(ws: &mut Ws, msg: ClientMessage) {
        ws.send(Message::Binary(msg.encode().into_bytes())).await.unwrap();
    }

    async fn recv(ws: &mut Ws) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("timed out")
                .expect("stream ended")
                .unwrap();
            if let Message::Binary(data) = frame {
                let mut msg = MessageIn::parse(data).unwrap();
                return ServerMessage::decode(&mut msg).unwrap();
            }
        }
    }

    async fn log_in(addr: &str, token: &Token) -> Ws {
        let mut ws = client(addr).await;
        send(&mut ws, ClientMessage::Connect { token: token.as_str().to_string() }).await;
        assert_eq!(recv(&mut ws).await, ServerMessage::ConnectResponse(Status::Ok));
        ws
    }

    #[tokio::test]
    async fn test_roster_tokens_log_in() {
        let (addr, roster) = boot().await;
        assert_eq!(roster.len(), ROSTER.len());

        let (_, token) = &roster[0];
        let mut ws = log_in(&addr, token).await;

        send(&mut ws, ClientMessage::Pickup { item: ItemId(501) }).await;
        assert_eq!(recv(&mut ws).await, ServerMessage::PickupResponse(Status::Ok));
    }

    #[tokio::test]
    async fn test_chat_between_neighbours() {
        let (addr, roster) = boot().await;
        let mut ayla = log_in(&addr, &roster[0].1).await;
        let mut bram = log_in(&addr, &roster[1].1).await;

        send(&mut ayla, ClientMessage::Say { text: "hello".into() }).await;

        let expected = ServerMessage::Say {
            speaker: "ayla".into(),
            text: "hello".into(),
        };
        assert_eq!(recv(&mut bram).await, expected);
        assert_eq!(recv(&mut ayla).await, expected);
    }
}
