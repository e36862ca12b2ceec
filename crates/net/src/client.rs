//! Client session manager
//!
//! Holds the local mirror of `{client_id, room code, player, roster,
//! narrator}`, correlates request/ack pairs, and replays the rejoin
//! handshake on reconnect before reporting the link as connected. Every
//! operation resolves exactly once: a success value, a server rejection, or
//! an immediate local `NotConnected` when the link is down.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use lupine_core::{Player, RoomCode, RoomSettings};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Broadcast, Message, Reply, Request};
use crate::session::SessionBlob;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Event surfaced to the client's collaborator (the UI layer)
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Handshake (and any rejoin replay) finished; the link is usable
    Connected { client_id: Uuid },
    /// The stored seat was reclaimed after a reconnect
    Rejoined { players: Vec<Player> },
    /// The stored seat is gone (room reaped); session was cleared
    RejoinFailed { message: String },
    /// Authoritative roster snapshot from a membership change
    RosterUpdated { players: Vec<Player> },
    /// The host started the game
    GameStarted { players: Vec<Player> },
    /// The narrator reveal was confirmed server-side
    NarratorChosen { player: Player },
    /// Connection lost
    Disconnected,
}

/// Client handle
pub struct Client {
    state: Arc<RwLock<ClientState>>,
    event_rx: mpsc::Receiver<ClientEvent>,
    cmd_tx: mpsc::Sender<ClientCommand>,
}

struct ClientState {
    connection: ConnectionState,
    session: SessionBlob,
}

enum ClientCommand {
    Request {
        request: Request,
        reply_tx: oneshot::Sender<Reply>,
    },
    Disconnect,
}

impl Client {
    /// Connect to a lobby server. A previously persisted session blob makes
    /// this a reconnect: the stable client id rides the handshake and any
    /// stored seat is replayed before `Connected` is surfaced.
    pub async fn connect(addr: SocketAddr, session: Option<SessionBlob>) -> Result<Self> {
        info!(addr = %addr, reconnect = session.is_some(), "Connecting to server");

        let stream = TcpStream::connect(addr).await?;
        let (reader, mut writer) = tokio::io::split(stream);

        let hello = Message::Hello {
            client_id: session.as_ref().map(|s| s.client_id),
        };
        write_frame(&mut writer, &hello).await?;

        let state = Arc::new(RwLock::new(ClientState {
            connection: ConnectionState::Connecting,
            // Placeholder identity until Welcome arrives
            session: session.unwrap_or_else(|| SessionBlob::fresh(Uuid::nil())),
        }));

        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        let state_clone = state.clone();
        tokio::spawn(connection_task(reader, writer, state_clone, event_tx, cmd_rx));

        Ok(Client {
            state,
            event_rx,
            cmd_tx,
        })
    }

    /// Get the next client event
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.event_rx.recv().await
    }

    /// Current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    /// Snapshot of the persistable session blob
    pub async fn session(&self) -> SessionBlob {
        self.state.read().await.session.clone()
    }

    /// Stable client identity, once the handshake has completed
    pub async fn client_id(&self) -> Uuid {
        self.state.read().await.session.client_id
    }

    /// Create a room and take the host seat
    pub async fn create_room(&self, player_name: &str) -> Result<(Player, RoomCode)> {
        let reply = self
            .request(Request::CreateLobby {
                player_name: player_name.to_string(),
            })
            .await?;

        match reply {
            Reply::Created { player, room_code } => {
                let mut s = self.state.write().await;
                s.session.room_code = Some(room_code.clone());
                s.session.player = Some(player.clone());
                s.session.room_players = vec![player.clone()];
                Ok((player, room_code))
            }
            Reply::Error { message } => Err(Error::Rejected(message)),
            other => Err(unexpected_reply("Created", other)),
        }
    }

    /// Join an existing room by code
    pub async fn join_room(&self, room_code: &RoomCode, player_name: &str) -> Result<Player> {
        let reply = self
            .request(Request::JoinLobby {
                room_code: room_code.clone(),
                player_name: player_name.to_string(),
            })
            .await?;

        match reply {
            Reply::Joined { player } => {
                let mut s = self.state.write().await;
                s.session.room_code = Some(room_code.clone());
                s.session.player = Some(player.clone());
                Ok(player)
            }
            Reply::Error { message } => Err(Error::Rejected(message)),
            other => Err(unexpected_reply("Joined", other)),
        }
    }

    /// Leave the room for good. This is the one exit path that does not get
    /// replayed on reconnect: the persisted seat is cleared even when the
    /// server no longer knows the room, and the result is the remaining
    /// roster (empty on a missing room, never an error).
    pub async fn exit_room(&self, room_code: &RoomCode) -> Result<Vec<Player>> {
        let reply = self
            .request(Request::ExitRoom {
                room_code: room_code.clone(),
            })
            .await?;

        let players = match reply {
            Reply::Exited { players } => players,
            Reply::Error { message } => {
                debug!(room = %room_code, message = %message, "Exit on missing room");
                Vec::new()
            }
            other => return Err(unexpected_reply("Exited", other)),
        };

        let mut s = self.state.write().await;
        s.session.leave_room();
        Ok(players)
    }

    /// Fetch the authoritative roster. A missing room reads as empty.
    pub async fn get_players(&self, room_code: &RoomCode) -> Result<Vec<Player>> {
        let reply = self
            .request(Request::GetPlayers {
                room_code: room_code.clone(),
            })
            .await?;

        match reply {
            Reply::Players { players } => Ok(players),
            Reply::Error { message } => Err(Error::Rejected(message)),
            other => Err(unexpected_reply("Players", other)),
        }
    }

    /// Start the game with final settings (host only)
    pub async fn start_game(
        &self,
        room_code: &RoomCode,
        settings: RoomSettings,
    ) -> Result<Vec<Player>> {
        let reply = self
            .request(Request::GameStart {
                room_code: room_code.clone(),
                settings,
            })
            .await?;

        match reply {
            Reply::Started { players } => Ok(players),
            Reply::Error { message } => Err(Error::Rejected(message)),
            other => Err(unexpected_reply("Started", other)),
        }
    }

    /// Confirm the narrator nominated by the host's local reveal (host only)
    pub async fn choose_narrator(&self, room_code: &RoomCode, player_id: Uuid) -> Result<()> {
        let reply = self
            .request(Request::ChooseNarrator {
                room_code: room_code.clone(),
                player_id,
            })
            .await?;

        match reply {
            Reply::NarratorChosen => Ok(()),
            Reply::Error { message } => Err(Error::Rejected(message)),
            other => Err(unexpected_reply("NarratorChosen", other)),
        }
    }

    /// Disconnect from the server
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect).await;
    }

    /// Back-pressure against a down link: fail locally before any network
    /// call when disconnected. Callers treat this as immediate cancellation,
    /// never as something to queue for retry.
    async fn request(&self, request: Request) -> Result<Reply> {
        if self.state.read().await.connection != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(ClientCommand::Request { request, reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;

        reply_rx.await.map_err(|_| Error::NotConnected)
    }
}

fn unexpected_reply(expected: &str, got: Reply) -> Error {
    Error::Protocol(format!("Expected {} reply, got {:?}", expected, got))
}

/// Sequence number reserved for the automatic rejoin replay
const REJOIN_SEQ: u64 = 0;

/// Main connection task
async fn connection_task(
    mut reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    state: Arc<RwLock<ClientState>>,
    event_tx: mpsc::Sender<ClientEvent>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
) {
    // Handshake: the first frame back must be Welcome
    let client_id = match read_frame(&mut reader).await {
        Ok(Message::Welcome { client_id }) => client_id,
        Ok(_) => {
            warn!("Unexpected first message, expected Welcome");
            fail_connection(&state, &event_tx).await;
            return;
        }
        Err(e) => {
            warn!(error = %e, "Handshake read failed");
            fail_connection(&state, &event_tx).await;
            return;
        }
    };

    // Replay the stored seat before surfacing connected, so collaborators
    // only ever observe a link that is already re-admitted
    let replay = {
        let mut s = state.write().await;
        s.session.client_id = client_id;
        match (&s.session.room_code, &s.session.player) {
            (Some(code), Some(player)) => Some((code.clone(), player.clone())),
            _ => None,
        }
    };

    if let Some((room_code, player)) = replay {
        let request = Message::Request {
            seq: REJOIN_SEQ,
            request: Request::RejoinPlayer {
                room_code: room_code.clone(),
                player,
            },
        };
        if write_frame(&mut writer, &request).await.is_err() {
            fail_connection(&state, &event_tx).await;
            return;
        }

        match await_rejoin_ack(&mut reader).await {
            Ok(Reply::Rejoined { players }) => {
                {
                    let mut s = state.write().await;
                    s.session.room_players = players.clone();
                }
                info!(room = %room_code, "Seat reclaimed after reconnect");
                let _ = event_tx.send(ClientEvent::Rejoined { players }).await;
            }
            Ok(Reply::Error { message }) => {
                // Room was reaped while we were away; fall back to the
                // no-session flow
                warn!(room = %room_code, message = %message, "Rejoin rejected");
                {
                    let mut s = state.write().await;
                    s.session.leave_room();
                }
                let _ = event_tx.send(ClientEvent::RejoinFailed { message }).await;
            }
            Ok(other) => {
                warn!(reply = ?other, "Unexpected rejoin reply");
                fail_connection(&state, &event_tx).await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "Rejoin replay failed");
                fail_connection(&state, &event_tx).await;
                return;
            }
        }
    }

    {
        let mut s = state.write().await;
        s.connection = ConnectionState::Connected;
    }
    let _ = event_tx.send(ClientEvent::Connected { client_id }).await;
    info!(client_id = %client_id, "Connected");

    // Main loop: route acks to their pending oneshot, broadcasts to the
    // event stream, commands to the wire
    let mut next_seq: u64 = REJOIN_SEQ + 1;
    let mut pending: HashMap<u64, oneshot::Sender<Reply>> = HashMap::new();

    loop {
        tokio::select! {
            result = read_frame(&mut reader) => {
                match result {
                    Ok(Message::Ack { seq, reply }) => {
                        match pending.remove(&seq) {
                            Some(tx) => { let _ = tx.send(reply); }
                            None => debug!(seq = seq, "Ack with no pending request"),
                        }
                    }
                    Ok(Message::Broadcast(broadcast)) => {
                        handle_broadcast(broadcast, &state, &event_tx).await;
                    }
                    Ok(other) => {
                        debug!(msg = ?other, "Ignoring unexpected message");
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!("Server closed connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Read error");
                        break;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Request { request, reply_tx }) => {
                        let seq = next_seq;
                        next_seq += 1;
                        let msg = Message::Request { seq, request };
                        if let Err(e) = write_frame(&mut writer, &msg).await {
                            warn!(error = %e, "Write error");
                            // Dropping the sender resolves the caller with
                            // NotConnected
                            drop(reply_tx);
                            break;
                        }
                        pending.insert(seq, reply_tx);
                    }
                    Some(ClientCommand::Disconnect) | None => {
                        debug!("Disconnect requested");
                        break;
                    }
                }
            }
        }
    }

    // Pending callers resolve with NotConnected when their oneshots drop
    pending.clear();
    fail_connection(&state, &event_tx).await;
    info!("Disconnected from server");
}

async fn fail_connection(state: &Arc<RwLock<ClientState>>, event_tx: &mpsc::Sender<ClientEvent>) {
    {
        let mut s = state.write().await;
        s.connection = ConnectionState::Disconnected;
    }
    let _ = event_tx.send(ClientEvent::Disconnected).await;
}

/// Read frames until the rejoin ack arrives, buffering nothing: broadcasts
/// seen before the ack are roster refreshes the ack itself supersedes.
async fn await_rejoin_ack(reader: &mut ReadHalf<TcpStream>) -> Result<Reply> {
    loop {
        match read_frame(reader).await? {
            Message::Ack {
                seq: REJOIN_SEQ,
                reply,
            } => return Ok(reply),
            Message::Broadcast(_) => continue,
            other => {
                return Err(Error::Protocol(format!(
                    "Unexpected message during rejoin: {:?}",
                    other
                )))
            }
        }
    }
}

/// Apply a broadcast to the session mirror and surface it as an event
async fn handle_broadcast(
    broadcast: Broadcast,
    state: &Arc<RwLock<ClientState>>,
    event_tx: &mpsc::Sender<ClientEvent>,
) {
    match broadcast {
        Broadcast::PlayerJoined { players } | Broadcast::PlayerLeft { players } => {
            {
                let mut s = state.write().await;
                s.session.room_players = players.clone();
            }
            let _ = event_tx.send(ClientEvent::RosterUpdated { players }).await;
        }
        Broadcast::GameStarted { players } => {
            {
                let mut s = state.write().await;
                s.session.room_players = players.clone();
            }
            let _ = event_tx.send(ClientEvent::GameStarted { players }).await;
        }
        Broadcast::NarratorChosen { player } => {
            {
                let mut s = state.write().await;
                s.session.narrator = Some(player.clone());
            }
            let _ = event_tx.send(ClientEvent::NarratorChosen { player }).await;
        }
    }
}
