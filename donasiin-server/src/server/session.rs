//! Sign-in and sign-out notifications for whoever holds a subscription.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: String, email: String },
    SignedOut { user_id: String, email: String },
}

#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        SessionEvents { tx }
    }

    /// Publishing without subscribers is not an error.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct SessionSubscription {
    rx: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    /// Next event, or `None` once every publisher is gone.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session events: subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {
        drop(self.rx);
    }
}

/// Logs session changes until `shutdown` fires, then unsubscribes.
pub async fn audit_sessions(mut subscription: SessionSubscription, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = subscription.next() => match event {
                Some(SessionEvent::SignedIn { user_id, email }) => {
                    info!(user_id = %user_id, email = %email, "session started");
                }
                Some(SessionEvent::SignedOut { user_id, email }) => {
                    info!(user_id = %user_id, email = %email, "session ended");
                }
                None => break,
            },
        }
    }
    subscription.unsubscribe();
    debug!("session events: audit unsubscribed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in() -> SessionEvent {
        SessionEvent::SignedIn {
            user_id: "u1".into(),
            email: "admin@example.org".into(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let events = SessionEvents::new();
        let mut sub = events.subscribe();
        events.publish(signed_in());
        assert_eq!(sub.next().await, Some(signed_in()));
    }

    #[tokio::test]
    async fn unsubscribe_releases_the_receiver() {
        let events = SessionEvents::new();
        let sub = events.subscribe();
        assert_eq!(events.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(events.subscriber_count(), 0);
        events.publish(signed_in());
    }

    #[tokio::test]
    async fn audit_stops_on_shutdown() {
        let events = SessionEvents::new();
        let token = CancellationToken::new();
        let task = tokio::spawn(audit_sessions(events.subscribe(), token.clone()));
        events.publish(signed_in());
        token.cancel();
        task.await.unwrap();
        assert_eq!(events.subscriber_count(), 0);
    }
}
