//! Notifications from the relay to the host application.
//!
//! The relay reports what happens to its connections so the host can show
//! it, e.g. a "not connected" state or an outdated-listener warning:
//!
//! * [`Connected`](Event::Connected) - a listener accepted the connection
//! * [`Disconnected`](Event::Disconnected) - an open connection went away
//! * [`Negotiated`](Event::Negotiated) - the listener's revision is known
//! * [`Outdated`](Event::Outdated) - the listener should be updated
//!
//! Events are delivered over an unbounded channel and never block the
//! relay. Dropping the receiver simply discards them.

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::mpsc;

use crate::protocol::Revision;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    Connected { name: String, port: u16 },
    Disconnected { name: String, port: u16 },
    Negotiated { name: String, revision: Revision },
    Outdated { message: String },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { name, port } => write!(f, "connected to {name} on port {port}"),
            Self::Disconnected { name, port } => {
                write!(f, "disconnected from {name} on port {port}")
            }
            Self::Negotiated { name, revision } => {
                write!(f, "{name} speaks protocol revision {revision}")
            }
            Self::Outdated { message } => write!(f, "{message}"),
        }
    }
}

/// Sends [`Event`]s, suppressing repeated outdated warnings.
///
/// Clones share the same record of warnings already sent.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Event>,
    outdated: Arc<Mutex<HashSet<String>>>,
}

impl Notifier {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Self {
            tx,
            outdated: Arc::new(Mutex::new(HashSet::new())),
        };
        (notifier, rx)
    }

    pub fn send(&self, event: Event) {
        if let Event::Outdated { message } = &event {
            let mut outdated = self.outdated.lock().unwrap_or_else(PoisonError::into_inner);
            if !outdated.insert(message.clone()) {
                trace!("suppressing repeated warning: {message}");
                return;
            }
            warn!("{message}");
        }

        // Nobody listening is fine.
        let _ = self.tx.send(event);
    }

    /// Warns that a listener is outdated, once per distinct `message`.
    pub fn outdated(&self, message: impl Into<String>) {
        self.send(Event::Outdated {
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outdated_is_sent_once_per_message() {
        let (notifier, mut rx) = Notifier::new();
        let clone = notifier.clone();

        notifier.outdated("Rainmeter Adapter is outdated");
        clone.outdated("Rainmeter Adapter is outdated");
        notifier.outdated("OBS Adapter is outdated");

        assert_eq!(
            rx.try_recv().unwrap(),
            Event::Outdated {
                message: "Rainmeter Adapter is outdated".to_owned()
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Event::Outdated {
                message: "OBS Adapter is outdated".to_owned()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn other_events_are_not_deduplicated() {
        let (notifier, mut rx) = Notifier::new();
        for _ in 0..2 {
            notifier.send(Event::Connected {
                name: "OBS Adapter".to_owned(),
                port: 6534,
            });
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn closed_receiver_is_ignored() {
        let (notifier, rx) = Notifier::new();
        drop(rx);
        notifier.outdated("gone");
    }
}
