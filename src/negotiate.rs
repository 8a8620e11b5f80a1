//! Determines the protocol revision a listener speaks.
//!
//! Negotiation runs once per open connection, on the first message the
//! listener sends or when the negotiation window closes without one:
//!
//! | First message                      | Revision | Outdated warning        |
//! |------------------------------------|----------|-------------------------|
//! | `Version:...`                      | legacy   | always                  |
//! | `ADAPTER_VERSION ...;WNPRLIB_...`  | as given | if behind latest release|
//! | anything else                      | legacy   | always                  |
//! | nothing within [`TIMEOUT`]         | legacy   | never                   |
//!
//! The release lookup for adapter handshakes runs in the background. The
//! revision is settled immediately, so commands are handled while the
//! lookup is in flight. When the session ends first, the result is
//! dropped.

use std::{sync::Arc, time::Duration};

use semver::Version;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Endpoint,
    events::Notifier,
    protocol::{handshake::Handshake, Revision},
    release::{self, ReleaseFeed},
};

/// How long a listener has to announce itself after the connection opens.
pub const TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Clone)]
pub struct Negotiator {
    name: String,
    repository: Option<String>,
    feed: Arc<dyn ReleaseFeed>,
    notifier: Notifier,
}

impl Negotiator {
    #[must_use]
    pub fn new(endpoint: &Endpoint, feed: Arc<dyn ReleaseFeed>, notifier: Notifier) -> Self {
        Self {
            name: endpoint.name.clone(),
            repository: endpoint.repository.clone(),
            feed,
            notifier,
        }
    }

    /// Settles the revision from the listener's first `message`.
    ///
    /// A release lookup, if any, is bound to `session`: it is abandoned
    /// once `session` is cancelled.
    pub fn negotiate(&self, message: &str, session: &CancellationToken) -> Revision {
        let handshake = Handshake::parse(message);
        match &handshake {
            Handshake::Legacy => {
                debug!("{} announced a legacy version", self.name);
                self.notifier.outdated(self.outdated_message());
            }
            Handshake::Unrecognized => {
                debug!("{} sent no handshake, assuming legacy", self.name);
                self.notifier.outdated(self.outdated_message());
            }
            Handshake::Adapter { version, .. } => {
                if let Some(version) = version {
                    self.check_release(version.clone(), session.clone());
                }
            }
        }

        handshake.revision()
    }

    /// The revision to assume when the listener stayed silent.
    #[must_use]
    pub fn timed_out(&self) -> Revision {
        debug!(
            "{} did not announce itself within {}ms, assuming legacy",
            self.name,
            TIMEOUT.as_millis()
        );
        Revision::Legacy
    }

    fn outdated_message(&self) -> String {
        format!(
            "{} is outdated and may not work correctly, please update it",
            self.name
        )
    }

    fn check_release(&self, connected: Version, session: CancellationToken) {
        let Some(repository) = self.repository.clone() else {
            trace!("{} has no release feed, skipping version check", self.name);
            return;
        };

        let negotiator = self.clone();
        tokio::spawn(async move {
            let latest = tokio::select! {
                () = session.cancelled() => return,
                latest = negotiator.feed.latest(&repository) => latest,
            };

            // The session may have ended while the lookup completed.
            if session.is_cancelled() {
                trace!("discarding stale release lookup for {}", negotiator.name);
                return;
            }

            match latest {
                Ok(latest) if release::is_outdated(&connected, &latest) => {
                    info!(
                        "{} {connected} is behind latest release {latest}",
                        negotiator.name
                    );
                    negotiator.notifier.outdated(negotiator.outdated_message());
                }
                Ok(latest) => {
                    debug!("{} {connected} is up to date ({latest})", negotiator.name);
                }
                Err(e) => {
                    debug!("release lookup for {} failed: {e}", negotiator.name);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::{future::BoxFuture, FutureExt};
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        config::Config,
        error::{Error, Result},
        events::Event,
    };

    struct Fixed {
        latest: Option<Version>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(latest: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                latest: latest.map(|latest| Version::parse(latest).unwrap()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl ReleaseFeed for Fixed {
        fn latest<'a>(&'a self, _repository: &'a str) -> BoxFuture<'a, Result<Version>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let latest = self
                .latest
                .clone()
                .ok_or_else(|| Error::unavailable("offline"));
            async move { latest }.boxed()
        }
    }

    fn rainmeter(feed: Arc<dyn ReleaseFeed>) -> (Negotiator, mpsc::UnboundedReceiver<Event>) {
        let config = Config::default();
        let endpoint = config
            .endpoints()
            .iter()
            .find(|endpoint| endpoint.port == 8974)
            .unwrap();
        let (notifier, rx) = Notifier::new();
        (Negotiator::new(endpoint, feed, notifier), rx)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn version_prefix_is_legacy_and_outdated_once() {
        let (negotiator, mut rx) = rainmeter(Fixed::new(None));
        let session = CancellationToken::new();

        assert_eq!(negotiator.negotiate("Version:0.4.0", &session), Revision::Legacy);
        assert_eq!(negotiator.negotiate("Version:0.4.0", &session), Revision::Legacy);

        assert!(matches!(rx.try_recv(), Ok(Event::Outdated { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_first_message_is_legacy() {
        let (negotiator, mut rx) = rainmeter(Fixed::new(None));
        let session = CancellationToken::new();

        assert_eq!(negotiator.negotiate("hello", &session), Revision::Legacy);
        assert!(matches!(rx.try_recv(), Ok(Event::Outdated { .. })));
    }

    #[tokio::test]
    async fn silence_is_legacy_without_warning() {
        let (negotiator, mut rx) = rainmeter(Fixed::new(None));
        assert_eq!(negotiator.timed_out(), Revision::Legacy);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn adapter_behind_latest_release_is_outdated() {
        let (negotiator, mut rx) = rainmeter(Fixed::new(Some("1.2.0")));
        let session = CancellationToken::new();

        let revision = negotiator.negotiate("ADAPTER_VERSION 1.0.0;WNPRLIB_REVISION 1", &session);
        assert_eq!(revision, Revision::Rev1);

        settle().await;
        assert!(matches!(rx.try_recv(), Ok(Event::Outdated { .. })));
    }

    #[tokio::test]
    async fn adapter_up_to_date_or_unknown_is_quiet() {
        for latest in [Some("1.0.0"), None] {
            let (negotiator, mut rx) = rainmeter(Fixed::new(latest));
            let session = CancellationToken::new();

            negotiator.negotiate("ADAPTER_VERSION 1.0.0;WNPRLIB_REVISION 1", &session);
            settle().await;
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn lookup_after_session_end_is_discarded() {
        let (negotiator, mut rx) = rainmeter(Fixed::new(Some("9.0.0")));
        let session = CancellationToken::new();

        negotiator.negotiate("ADAPTER_VERSION 1.0.0;WNPRLIB_REVISION 1", &session);
        session.cancel();
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn endpoints_without_repository_are_not_looked_up() {
        let feed = Fixed::new(Some("9.0.0"));
        let (notifier, mut rx) = Notifier::new();
        let endpoint = Endpoint {
            name: "Custom Adapter 1234".to_owned(),
            port: 1234,
            origin: crate::config::Origin::Custom,
            enabled: true,
            update_frequency: Duration::from_millis(250),
            repository: None,
        };
        let negotiator = Negotiator::new(&endpoint, feed.clone(), notifier);

        let session = CancellationToken::new();
        negotiator.negotiate("ADAPTER_VERSION 1.0.0;WNPRLIB_REVISION 1", &session);
        settle().await;

        assert_eq!(feed.calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }
}
