//! Lobby coordination server
//!
//! Connection tasks never touch the registry: they perform the handshake,
//! parse frames, and forward events into one mpsc channel. A single
//! coordinator task owns the `Registry` and applies every mutation in
//! arrival order, so no two room mutations ever run concurrently and the
//! room operations need no locks.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lupine_core::invariants::assert_room_invariants;
use lupine_core::{Player, Registry, RoomCode, DEFAULT_MAX_PLAYERS};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Broadcast, Message, Reply, Request};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Hard cap on seats per room
    pub max_players: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }
}

/// Event forwarded from a connection task to the coordinator
enum Event {
    Connected {
        conn_id: u64,
        client_id: Uuid,
        tx: mpsc::Sender<Message>,
    },
    Request {
        conn_id: u64,
        seq: u64,
        request: Request,
    },
    Disconnected {
        conn_id: u64,
    },
}

/// Lobby server handle
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind and start serving on the given port (0 for a random port)
    pub async fn start(port: u16, config: ServerConfig) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let (event_tx, event_rx) = mpsc::channel(256);

        tokio::spawn(accept_loop(listener, event_tx, shutdown_tx.subscribe()));
        tokio::spawn(coordinator_task(
            Registry::new(),
            config,
            event_rx,
            shutdown_tx.subscribe(),
        ));

        Ok(Server {
            addr: bound_addr,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    event_tx: mpsc::Sender<Event>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut next_conn_id: u64 = 1;

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let conn_id = next_conn_id;
                        next_conn_id += 1;
                        tokio::spawn(handle_connection(stream, addr, conn_id, event_tx.clone()));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection: handshake, then forward frames
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    conn_id: u64,
    event_tx: mpsc::Sender<Event>,
) {
    let (mut reader, writer) = tokio::io::split(stream);

    // First frame must be Hello; mint an id for fresh clients
    let client_id = match handshake(&mut reader).await {
        Ok(id) => id,
        Err(e) => {
            warn!(addr = %addr, error = %e, "Handshake failed");
            return;
        }
    };

    let (msg_tx, msg_rx) = mpsc::channel(64);
    let writer_handle = tokio::spawn(writer_task(writer, msg_rx));

    if msg_tx
        .send(Message::Welcome { client_id })
        .await
        .is_err()
        || event_tx
            .send(Event::Connected {
                conn_id,
                client_id,
                tx: msg_tx,
            })
            .await
            .is_err()
    {
        writer_handle.abort();
        return;
    }

    info!(addr = %addr, client_id = %client_id, "Client connected");

    // Read loop
    loop {
        match read_frame(&mut reader).await {
            Ok(Message::Request { seq, request }) => {
                if event_tx
                    .send(Event::Request {
                        conn_id,
                        seq,
                        request,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(other) => {
                debug!(client_id = %client_id, msg = ?other, "Ignoring unexpected message");
            }
            Err(Error::ConnectionClosed) => {
                debug!(client_id = %client_id, "Connection closed");
                break;
            }
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "Read error");
                break;
            }
        }
    }

    // Cleanup; the coordinator applies the eager removal policy
    writer_handle.abort();
    let _ = event_tx.send(Event::Disconnected { conn_id }).await;

    info!(client_id = %client_id, "Client disconnected");
}

/// Read the Hello frame and resolve the stable client id
async fn handshake(reader: &mut ReadHalf<TcpStream>) -> Result<Uuid> {
    match read_frame(reader).await? {
        Message::Hello { client_id } => Ok(client_id.unwrap_or_else(Uuid::new_v4)),
        _ => Err(Error::Protocol("Expected Hello".into())),
    }
}

/// Writer task - sends messages to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Per-connection state held by the coordinator
struct Conn {
    client_id: Uuid,
    tx: mpsc::Sender<Message>,
    /// Room this connection is subscribed to for broadcasts
    room: Option<RoomCode>,
}

/// The single serialization point: owns the registry, applies every event
/// in order.
async fn coordinator_task(
    mut registry: Registry,
    config: ServerConfig,
    mut event_rx: mpsc::Receiver<Event>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut conns: HashMap<u64, Conn> = HashMap::new();

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(Event::Connected { conn_id, client_id, tx }) => {
                        conns.insert(conn_id, Conn { client_id, tx, room: None });
                    }
                    Some(Event::Request { conn_id, seq, request }) => {
                        handle_request(&mut registry, &config, &mut conns, conn_id, seq, request)
                            .await;
                    }
                    Some(Event::Disconnected { conn_id }) => {
                        handle_disconnect(&mut registry, &mut conns, conn_id).await;
                    }
                    None => break,
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Coordinator shutting down");
                break;
            }
        }
    }
}

/// Apply one request against the registry and ack it
async fn handle_request(
    registry: &mut Registry,
    config: &ServerConfig,
    conns: &mut HashMap<u64, Conn>,
    conn_id: u64,
    seq: u64,
    request: Request,
) {
    let Some(conn) = conns.get(&conn_id) else {
        // Disconnect raced ahead of the request; nothing to ack
        return;
    };
    let client_id = conn.client_id;

    let reply = match request {
        Request::CreateLobby { player_name } => {
            create_lobby(registry, config, conns, conn_id, client_id, player_name).await
        }
        Request::JoinLobby {
            room_code,
            player_name,
        } => join_lobby(registry, conns, conn_id, client_id, room_code, player_name).await,
        Request::RejoinPlayer { room_code, player } => {
            rejoin_player(registry, conns, conn_id, client_id, room_code, player).await
        }
        Request::ExitRoom { room_code } => {
            exit_room(registry, conns, conn_id, client_id, room_code).await
        }
        Request::GetPlayers { room_code } => {
            // A missing room reads as empty, not as an error
            let players = registry
                .get(&room_code)
                .map(|r| r.players().to_vec())
                .unwrap_or_default();
            Reply::Players { players }
        }
        Request::GameStart {
            room_code,
            settings,
        } => game_start(registry, conns, client_id, room_code, settings).await,
        Request::ChooseNarrator {
            room_code,
            player_id,
        } => choose_narrator(registry, conns, client_id, room_code, player_id).await,
    };

    if let Some(conn) = conns.get(&conn_id) {
        let _ = conn.tx.send(Message::Ack { seq, reply }).await;
    }
}

async fn create_lobby(
    registry: &mut Registry,
    config: &ServerConfig,
    conns: &mut HashMap<u64, Conn>,
    conn_id: u64,
    client_id: Uuid,
    player_name: String,
) -> Reply {
    let room_code = match registry.create_room(config.max_players) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Room creation failed");
            return Reply::Error {
                message: e.to_string(),
            };
        }
    };

    // The room was just inserted empty, so seating the host cannot fail
    let host = Player::new(client_id, player_name).as_host();
    let Some(room) = registry.get_mut(&room_code) else {
        return Reply::Error {
            message: lupine_core::Error::RoomNotFound(room_code.to_string()).to_string(),
        };
    };
    let player = match room.add_player(host) {
        Ok(p) => p,
        Err(e) => {
            return Reply::Error {
                message: e.to_string(),
            }
        }
    };
    assert_room_invariants(room);
    let players = room.players().to_vec();

    if let Some(conn) = conns.get_mut(&conn_id) {
        conn.room = Some(room_code.clone());
    }
    info!(room = %room_code, player = %player.name, "Lobby created");
    broadcast_room(conns, &room_code, Broadcast::PlayerJoined { players }).await;

    Reply::Created { player, room_code }
}

async fn join_lobby(
    registry: &mut Registry,
    conns: &mut HashMap<u64, Conn>,
    conn_id: u64,
    client_id: Uuid,
    room_code: RoomCode,
    player_name: String,
) -> Reply {
    let Some(room) = registry.get_mut(&room_code) else {
        warn!(room = %room_code, "Join attempt on unknown room");
        return Reply::Error {
            message: lupine_core::Error::RoomNotFound(room_code.to_string()).to_string(),
        };
    };

    let player = match room.add_player(Player::new(client_id, player_name)) {
        Ok(p) => p,
        Err(e) => {
            return Reply::Error {
                message: e.to_string(),
            }
        }
    };
    assert_room_invariants(room);
    let players = room.players().to_vec();

    if let Some(conn) = conns.get_mut(&conn_id) {
        conn.room = Some(room_code.clone());
    }
    info!(room = %room_code, player = %player.name, "Player joined");
    broadcast_room(conns, &room_code, Broadcast::PlayerJoined { players }).await;

    Reply::Joined { player }
}

async fn rejoin_player(
    registry: &mut Registry,
    conns: &mut HashMap<u64, Conn>,
    conn_id: u64,
    client_id: Uuid,
    room_code: RoomCode,
    mut player: Player,
) -> Reply {
    // The authenticated handshake id wins over whatever the snapshot claims
    player.id = client_id;

    let Some(room) = registry.get_mut(&room_code) else {
        // Room emptied and was reaped while the client was away
        warn!(room = %room_code, client_id = %client_id, "Rejoin on reaped room");
        return Reply::Error {
            message: lupine_core::Error::RoomNotFound(room_code.to_string()).to_string(),
        };
    };

    if let Err(e) = room.rejoin(player) {
        return Reply::Error {
            message: e.to_string(),
        };
    }
    assert_room_invariants(room);
    let players = room.players().to_vec();

    if let Some(conn) = conns.get_mut(&conn_id) {
        conn.room = Some(room_code.clone());
    }
    info!(room = %room_code, client_id = %client_id, "Player rejoined");
    broadcast_room(
        conns,
        &room_code,
        Broadcast::PlayerJoined {
            players: players.clone(),
        },
    )
    .await;

    Reply::Rejoined { players }
}

async fn exit_room(
    registry: &mut Registry,
    conns: &mut HashMap<u64, Conn>,
    conn_id: u64,
    client_id: Uuid,
    room_code: RoomCode,
) -> Reply {
    let Some(room) = registry.get_mut(&room_code) else {
        return Reply::Error {
            message: lupine_core::Error::RoomNotFound(room_code.to_string()).to_string(),
        };
    };

    room.remove_player(client_id);
    let players = room.players().to_vec();

    if let Some(conn) = conns.get_mut(&conn_id) {
        conn.room = None;
    }
    info!(room = %room_code, client_id = %client_id, "Player exited");
    broadcast_room(
        conns,
        &room_code,
        Broadcast::PlayerLeft {
            players: players.clone(),
        },
    )
    .await;
    registry.remove_if_empty(&room_code);

    Reply::Exited { players }
}

async fn game_start(
    registry: &mut Registry,
    conns: &mut HashMap<u64, Conn>,
    client_id: Uuid,
    room_code: RoomCode,
    settings: lupine_core::RoomSettings,
) -> Reply {
    let Some(room) = registry.get_mut(&room_code) else {
        return Reply::Error {
            message: lupine_core::Error::RoomNotFound(room_code.to_string()).to_string(),
        };
    };

    if room.host().map(|h| h.id) != Some(client_id) {
        return Reply::Error {
            message: "Only the host can start the game".to_string(),
        };
    }

    let players = match room.start_game(settings) {
        Ok(players) => players,
        Err(e) => {
            return Reply::Error {
                message: e.to_string(),
            }
        }
    };

    info!(room = %room_code, players = players.len(), "Game started");
    broadcast_room(
        conns,
        &room_code,
        Broadcast::GameStarted {
            players: players.clone(),
        },
    )
    .await;

    Reply::Started { players }
}

async fn choose_narrator(
    registry: &mut Registry,
    conns: &mut HashMap<u64, Conn>,
    client_id: Uuid,
    room_code: RoomCode,
    candidate_id: Uuid,
) -> Reply {
    let Some(room) = registry.get_mut(&room_code) else {
        return Reply::Error {
            message: lupine_core::Error::RoomNotFound(room_code.to_string()).to_string(),
        };
    };

    if room.host().map(|h| h.id) != Some(client_id) {
        return Reply::Error {
            message: "Only the host can confirm the narrator".to_string(),
        };
    }

    // The host's client ran the randomized pick; the server only validates
    // that the nominee is still seated and records the outcome.
    let player = match room.elect_narrator(candidate_id) {
        Ok(p) => p,
        Err(e) => {
            return Reply::Error {
                message: e.to_string(),
            }
        }
    };
    assert_room_invariants(room);

    info!(room = %room_code, narrator = %player.name, "Narrator chosen");
    broadcast_room(conns, &room_code, Broadcast::NarratorChosen { player }).await;

    Reply::NarratorChosen
}

/// Eager removal: a transport drop forfeits the seat immediately; the client
/// must replay a rejoin to reclaim it.
async fn handle_disconnect(
    registry: &mut Registry,
    conns: &mut HashMap<u64, Conn>,
    conn_id: u64,
) {
    let Some(conn) = conns.remove(&conn_id) else {
        // Duplicate disconnect delivery
        return;
    };

    // A reconnect can outrun the old transport's death under TCP timeouts.
    // Once a newer connection carries this client id, the stale drop must
    // not evict the seat that connection already reclaimed.
    if conns.values().any(|c| c.client_id == conn.client_id) {
        debug!(client_id = %conn.client_id, "Stale disconnect, newer connection is live");
        return;
    }

    for (room_code, players) in registry.remove_player_everywhere(conn.client_id) {
        broadcast_room(conns, &room_code, Broadcast::PlayerLeft { players }).await;
    }
}

/// Send a broadcast to every connection subscribed to the room
async fn broadcast_room(conns: &HashMap<u64, Conn>, room_code: &RoomCode, broadcast: Broadcast) {
    for conn in conns.values() {
        if conn.room.as_ref() == Some(room_code) {
            if conn
                .tx
                .send(Message::Broadcast(broadcast.clone()))
                .await
                .is_err()
            {
                debug!(client_id = %conn.client_id, "Failed to queue broadcast");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_start() {
        let server = Server::start(0, ServerConfig::default()).await.unwrap();
        assert!(server.addr().port() > 0);
        server.shutdown();
    }
}
