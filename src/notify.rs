use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{Booking, Membership, MembershipRequest, UserId};

const CHANNEL_CAPACITY: usize = 256;

/// What the notification collaborator gets told about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    BookingCreated { booking: Booking },
    BookingConfirmed { booking: Booking },
    BookingCancelled { booking: Booking },
    MembershipRequested { request: MembershipRequest },
    MembershipApproved { membership: Membership },
}

/// Fire-and-forget broadcast hub, one channel per user. The engine never
/// waits on delivery and never fails an operation because nobody listens.
pub struct NotifyHub {
    channels: DashMap<UserId, broadcast::Sender<Notice>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notices for a user. Creates the channel if needed.
    pub fn subscribe(&self, user_id: UserId) -> broadcast::Receiver<Notice> {
        let sender = self
            .channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notice. No-op if nobody is listening.
    pub fn send(&self, user_id: UserId, notice: &Notice) {
        if let Some(sender) = self.channels.get(&user_id) {
            let _ = sender.send(notice.clone());
        }
    }

    /// Remove a channel (e.g. when an account is closed).
    pub fn remove(&self, user_id: &UserId) {
        self.channels.remove(user_id);
    }
}
