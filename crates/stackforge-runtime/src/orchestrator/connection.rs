//! One connected client: a bounded outbound frame channel.
//!
//! Frames are serialized once per broadcast and shared via `Arc`; the
//! transport layer owns the receiving half and drains it into the socket.
//! Sends never block the orchestrator: a full buffer drops the frame, a
//! closed channel marks the client gone.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use stackforge_core::ids::UserId;

/// Outbound frames buffered per connection before drops begin.
const CHANNEL_CAPACITY: usize = 256;

/// Handle to one connected client.
pub struct ClientConnection {
    id: Uuid,
    user_id: UserId,
    sender: mpsc::Sender<Arc<String>>,
}

impl ClientConnection {
    /// New connection plus the receiver its writer task drains.
    pub fn channel(user_id: UserId) -> (Arc<Self>, mpsc::Receiver<Arc<String>>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let connection = Arc::new(Self {
            id: Uuid::now_v7(),
            user_id,
            sender,
        });
        (connection, receiver)
    }

    /// Unique connection ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// User this connection belongs to.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Non-blocking send. `false` means the frame was dropped (slow
    /// client) or the client is gone.
    pub fn send(&self, frame: &Arc<String>) -> bool {
        self.sender.try_send(Arc::clone(frame)).is_ok()
    }

    /// Whether the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
