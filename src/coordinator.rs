//! Owns every connection and fans commands out to all of them.
//!
//! The coordinator starts one [`Connection`] per enabled endpoint, and
//! none at all while no player is selected. When any connection
//! dispatches a command, every open connection runs an out-of-cycle
//! report so all listeners see the result at once, not on their next
//! tick.
//!
//! # Example
//!
//! ```no_run
//! use wnp_relay::{capability::Shared, config::Config, coordinator::Coordinator,
//!     player::Simulated, release};
//!
//! # async fn example() -> wnp_relay::error::Result<()> {
//! let config = Config::default();
//! let source = Shared::new(Some(Simulated::new("Example")));
//! let feed = release::from_config(&config)?;
//!
//! let (mut coordinator, mut events) = Coordinator::new(config, source, feed);
//! coordinator.start();
//! while let Some(event) = events.recv().await {
//!     println!("{event}");
//! }
//! coordinator.teardown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    capability::Shared,
    config::{Config, Endpoint},
    connection::{Connection, Refresh},
    events::{Event, Notifier},
    negotiate::Negotiator,
    release::ReleaseFeed,
};

pub struct Coordinator {
    config: Config,
    source: Shared,
    feed: Arc<dyn ReleaseFeed>,
    notifier: Notifier,
    refresh: broadcast::Sender<Refresh>,
    token: CancellationToken,
    connections: Vec<(Endpoint, JoinHandle<()>)>,
}

impl Coordinator {
    /// Refreshes that may queue up per connection before older ones are
    /// collapsed into one.
    const REFRESH_CAPACITY: usize = 16;

    /// Creates a coordinator with nothing started yet.
    ///
    /// Returns the coordinator and the receiving end of its [`Event`]s.
    #[must_use]
    pub fn new(
        config: Config,
        source: Shared,
        feed: Arc<dyn ReleaseFeed>,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (notifier, events) = Notifier::new();
        let (refresh, _) = broadcast::channel(Self::REFRESH_CAPACITY);

        let coordinator = Self {
            config,
            source,
            feed,
            notifier,
            refresh,
            token: CancellationToken::new(),
            connections: Vec::new(),
        };
        (coordinator, events)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Endpoints with a running connection.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.connections.iter().map(|(endpoint, _)| endpoint)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Spawns a connection per enabled endpoint and returns how many.
    ///
    /// Does nothing if connections are already running, or if no player
    /// is selected.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(&mut self) -> usize {
        if self.is_running() {
            return self.connections.len();
        }

        if !self.source.has_player() {
            info!("no player selected, not connecting to any listener");
            return 0;
        }

        for endpoint in self.config.enabled_endpoints() {
            debug!("starting connection to {endpoint}");
            let connection = Connection::new(
                endpoint.clone(),
                self.source.clone(),
                Negotiator::new(endpoint, Arc::clone(&self.feed), self.notifier.clone()),
                self.notifier.clone(),
                self.refresh.clone(),
                self.token.child_token(),
            );
            let handle = tokio::spawn(connection.run());
            self.connections.push((endpoint.clone(), handle));
        }

        if self.connections.is_empty() {
            warn!("no listener endpoints enabled");
        }
        self.connections.len()
    }

    /// Makes every open connection report out of cycle.
    pub fn refresh(&self) {
        // Without open connections there is nobody to tell.
        let _ = self.refresh.send(Refresh);
    }

    /// Tears down every connection and waits for them to finish.
    ///
    /// Sockets are closed without scheduling a reconnect. The coordinator
    /// can be started again afterwards.
    pub async fn teardown(&mut self) {
        self.token.cancel();
        for (endpoint, handle) in self.connections.drain(..) {
            if let Err(e) = handle.await {
                error!("connection to {endpoint} failed: {e}");
            }
        }
        self.token = CancellationToken::new();
    }

    /// Replaces the configuration and restarts every connection from it.
    ///
    /// The release feed is kept as it was given to [`Coordinator::new`].
    pub async fn reload(&mut self, config: Config) -> usize {
        info!("reloading configuration");
        self.teardown().await;
        self.config = config;
        self.start()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{player::Simulated, release::Disabled};

    fn coordinator(source: Shared) -> Coordinator {
        let config = Config::default();
        Coordinator::new(config, source, Arc::new(Disabled)).0
    }

    #[tokio::test]
    async fn nothing_starts_without_a_player() {
        let mut coordinator = coordinator(Shared::new(None::<Simulated>));
        assert_eq!(coordinator.start(), 0);
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn one_connection_per_enabled_endpoint() {
        let mut coordinator = coordinator(Shared::new(Some(Simulated::new("Test Site"))));
        assert_eq!(coordinator.start(), 1);
        assert_eq!(coordinator.start(), 1);
        assert_eq!(
            coordinator.endpoints().map(|endpoint| endpoint.port).collect::<Vec<_>>(),
            [8974]
        );

        coordinator.teardown().await;
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn reload_restarts_from_new_endpoints() {
        let mut coordinator = coordinator(Shared::new(Some(Simulated::new("Test Site"))));
        coordinator.start();

        let config = Config::parse(
            r"
            [[custom_adapter]]
            port = 4321

            [[custom_adapter]]
            port = 4322
            enabled = false
            ",
        )
        .unwrap();
        assert_eq!(coordinator.reload(config).await, 2);

        let mut ports: Vec<_> = coordinator.endpoints().map(|endpoint| endpoint.port).collect();
        ports.sort_unstable();
        assert_eq!(ports, [4321, 8974]);

        coordinator.teardown().await;
    }
}
