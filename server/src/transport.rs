//! Hub↔worker message shapes (§4.7, §6): the control-plane commands a room
//! manager sends into a room, and the per-client outbound sink a connected
//! socket is represented by.
//!
//! Generalizes the teacher's `ServerMessage`/`GameMessage` enum pair
//! (`server/src/network.rs`) from one flat server-wide channel into the
//! richer join/connect/event/shutdown command set a per-room worker needs.

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use shared::protocol::{ClientEvent, ServerEvent};

use crate::account::Account;
use crate::error::JoinError;

/// Channel a room uses to push events to one connected client. A real
/// transport (WebSocket, raw UDP session) drains this on the other end and
/// writes wire bytes; that boundary is external to the core per spec §1.
pub type OutboundSender = mpsc::Sender<ServerEvent>;

pub const COMMAND_CHANNEL_CAPACITY: usize = 256;
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// Commands a room's control loop consumes (§4.7 join protocol + the
/// bridged socket events `{ping, ready, tick, chatMessage, readyStart}`).
pub enum RoomCommand {
    /// Hub asks the room to admit a username (§4.7 step 2). The room
    /// replies with a fresh one-time auth code or a `JoinError`.
    Join { account: Account, reply: oneshot::Sender<Result<Uuid, JoinError>> },
    /// The client's real-time connection presents its auth code (§4.7 step
    /// 4). The room redeems the code atomically and attaches `outbound`.
    Connect { username: String, auth_code: Uuid, outbound: OutboundSender, reply: oneshot::Sender<bool> },
    /// One bridged socket event from an already-connected client.
    ClientEvent { username: String, event: ClientEvent },
    /// The client socket dropped.
    Disconnect { username: String },
    /// The hub is telling this room to exit (§4.7 shutdown case a).
    Shutdown,
}

/// What a room manager holds per live room: its id and a sender into the
/// room's control loop. Cloning is cheap (`mpsc::Sender` is `Arc`-backed),
/// so many callers can hold a handle to the same room.
#[derive(Clone)]
pub struct RoomHandle {
    pub room_id: String,
    commands: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn new(room_id: String, commands: mpsc::Sender<RoomCommand>) -> Self {
        RoomHandle { room_id, commands }
    }

    pub async fn join(&self, account: Account) -> Result<Uuid, JoinError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(RoomCommand::Join { account, reply: reply_tx }).await.is_err() {
            return Err(JoinError::AccountUnavailable);
        }
        reply_rx.await.unwrap_or(Err(JoinError::AccountUnavailable))
    }

    pub async fn connect(&self, username: String, auth_code: Uuid, outbound: OutboundSender) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(RoomCommand::Connect { username, auth_code, outbound, reply: reply_tx })
            .await
            .is_err()
        {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Best-effort: a dropped room simply never sees this event.
    pub fn send_event(&self, username: String, event: ClientEvent) {
        let _ = self.commands.try_send(RoomCommand::ClientEvent { username, event });
    }

    pub fn disconnect(&self, username: String) {
        let _ = self.commands.try_send(RoomCommand::Disconnect { username });
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(RoomCommand::Shutdown).await;
    }
}
