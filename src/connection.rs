//! Keeps one connection to one listener alive.
//!
//! A [`Connection`] is a single task owning the WebSocket, the diff cache,
//! the negotiated revision and the timers of one endpoint. The listener is
//! an optional application that may never run, so failing to reach it is a
//! normal and long-lived state: every transport failure leads to another
//! attempt after an exponential [`Backoff`].
//!
//! # Session Lifecycle
//!
//! Once the socket opens:
//! 1. The backoff resets and a fresh diff cache is created
//! 2. The first message from the listener settles the revision, or
//!    [`negotiate::TIMEOUT`] passes and legacy is assumed
//! 3. Report ticks run every update interval, and on every fan-out
//!    trigger, but never before the revision is known
//! 4. Every later message is a command for the player
//!
//! When the socket closes or errors, the session ends. Its cache and
//! revision go with it, and any release lookup still in flight is
//! abandoned.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::{
    capability::Shared,
    config::Endpoint,
    dispatch,
    error::{Error, Result},
    events::{Event, Notifier},
    negotiate::{self, Negotiator},
    protocol::Revision,
    report::Reporter,
};

/// Where a connection is in its lifecycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Lifecycle {
    /// An attempt is in progress.
    #[default]
    Connecting,
    /// The socket is open.
    Open,
    /// Waiting out the delay before the next attempt.
    Waiting,
    /// Torn down for good.
    Closed,
}

/// Reconnection policy of one connection.
///
/// The delay before attempt `n` is `min(1000 * 2^n, 60000)` ms, where `n`
/// counts the attempts since the socket was last open. Scheduling a retry
/// is idempotent: transports may report one failure as both an error and a
/// close, and that must not count twice.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Backoff {
    state: Lifecycle,
    attempts: u32,
}

impl Backoff {
    const BASE_DELAY_MS: u64 = 1000;
    const MAX_DELAY_MS: u64 = 60_000;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The delay before reconnect attempt `attempt`.
    #[must_use]
    pub fn delay(attempt: u32) -> Duration {
        let millis = 2_u64
            .saturating_pow(attempt)
            .saturating_mul(Self::BASE_DELAY_MS)
            .min(Self::MAX_DELAY_MS);
        Duration::from_millis(millis)
    }

    #[must_use]
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Attempts made since the socket was last open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records that the socket opened.
    pub fn open(&mut self) {
        if self.state != Lifecycle::Closed {
            self.state = Lifecycle::Open;
            self.attempts = 0;
        }
    }

    /// Records that an open socket went away.
    pub fn disconnected(&mut self) {
        if self.state == Lifecycle::Open {
            self.state = Lifecycle::Connecting;
        }
    }

    /// Schedules the next attempt, returning how long to wait for it.
    ///
    /// Returns `None` if the socket is still open, a retry is already
    /// pending, or the connection was torn down.
    pub fn retry(&mut self) -> Option<Duration> {
        match self.state {
            Lifecycle::Connecting => {
                self.state = Lifecycle::Waiting;
                Some(Self::delay(self.attempts))
            }
            Lifecycle::Open | Lifecycle::Waiting | Lifecycle::Closed => None,
        }
    }

    /// Consumes the pending retry as an actual attempt.
    ///
    /// Returns `false` if no retry was pending.
    pub fn attempt(&mut self) -> bool {
        if self.state == Lifecycle::Waiting {
            self.state = Lifecycle::Connecting;
            self.attempts = self.attempts.saturating_add(1);
            true
        } else {
            false
        }
    }

    /// Tears down; no further retries are scheduled.
    pub fn close(&mut self) {
        self.state = Lifecycle::Closed;
    }
}

/// A trigger for an out-of-cycle report on every open connection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Refresh;

/// The connection to one listener.
pub struct Connection {
    endpoint: Endpoint,
    source: Shared,
    negotiator: Negotiator,
    notifier: Notifier,
    refresh: broadcast::Sender<Refresh>,
    token: CancellationToken,
}

impl Connection {
    #[must_use]
    pub fn new(
        endpoint: Endpoint,
        source: Shared,
        negotiator: Negotiator,
        notifier: Notifier,
        refresh: broadcast::Sender<Refresh>,
        token: CancellationToken,
    ) -> Self {
        Self {
            endpoint,
            source,
            negotiator,
            notifier,
            refresh,
            token,
        }
    }

    /// Connects and reconnects until the connection's token is cancelled.
    pub async fn run(self) {
        let mut backoff = Backoff::new();

        loop {
            let url = self.endpoint.url();
            trace!("connecting to {url}");

            let result = tokio::select! {
                () = self.token.cancelled() => break,
                result = tokio_tungstenite::connect_async(url) => result,
            };

            match result {
                Ok((ws, _)) => {
                    backoff.open();
                    info!("connected to {}", self.endpoint);
                    self.notifier.send(Event::Connected {
                        name: self.endpoint.name.clone(),
                        port: self.endpoint.port,
                    });

                    let session = self.token.child_token();
                    let result = self.session(ws, &session).await;
                    session.cancel();
                    backoff.disconnected();

                    match result {
                        Ok(()) => info!("disconnected from {}", self.endpoint),
                        Err(e) if e.is_transport() => {
                            info!("lost connection to {}: {e}", self.endpoint);
                        }
                        Err(e) => warn!("closing connection to {}: {e}", self.endpoint),
                    }
                    self.notifier.send(Event::Disconnected {
                        name: self.endpoint.name.clone(),
                        port: self.endpoint.port,
                    });
                }
                Err(e) => {
                    let e = Error::from(e);
                    trace!("{} unreachable: {e}", self.endpoint);
                }
            }

            if self.token.is_cancelled() {
                break;
            }

            let Some(delay) = backoff.retry() else {
                break;
            };
            debug!(
                "reconnecting to {} in {}s",
                self.endpoint,
                delay.as_secs_f32()
            );

            tokio::select! {
                () = self.token.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
            backoff.attempt();
        }

        backoff.close();
        trace!("{} torn down", self.endpoint);
    }

    /// Serves one open socket until it closes or `session` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns error if the socket closes or fails. Cancellation is not an
    /// error.
    async fn session<S>(
        &self,
        ws: tokio_tungstenite::WebSocketStream<S>,
        session: &CancellationToken,
    ) -> Result<()>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut ws_tx, mut ws_rx) = ws.split();
        let mut refresh = self.refresh.subscribe();

        let mut reporter = Reporter::new();
        let mut revision = None;

        let mut ticks = tokio::time::interval(self.endpoint.update_frequency);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let deadline = tokio::time::sleep(negotiate::TIMEOUT);
        tokio::pin!(deadline);

        loop {
            let lines = tokio::select! {
                () = session.cancelled() => {
                    // Closing from our side must not look like a failure.
                    if let Err(e) = ws_tx.close().await {
                        trace!("closing {}: {e}", self.endpoint);
                    }
                    return Ok(());
                }

                message = ws_rx.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!("{} <- {}", self.endpoint.name, text.as_str());
                        self.receive(text.as_str(), &mut revision, session)
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Err(Error::cancelled(format!("closed by listener: {frame:?}")));
                    }
                    Some(Ok(_)) => {
                        trace!("{} ignoring non-text frame", self.endpoint.name);
                        Vec::new()
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(Error::unavailable("connection closed")),
                },

                _ = ticks.tick(), if revision.is_some() => self.report(revision, &mut reporter),

                () = &mut deadline, if revision.is_none() => {
                    let negotiated = self.negotiator.timed_out();
                    self.negotiated(&mut revision, negotiated);
                    Vec::new()
                }

                trigger = refresh.recv() => match trigger {
                    Ok(Refresh) => self.report(revision, &mut reporter),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        trace!("{} skipped {skipped} refreshes", self.endpoint.name);
                        self.report(revision, &mut reporter)
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
            };

            for line in lines {
                trace!("{} -> {line}", self.endpoint.name);
                ws_tx.send(Message::Text(line.into())).await?;
            }
        }
    }

    /// Handles one inbound line, returning the replies to send.
    fn receive(
        &self,
        message: &str,
        revision: &mut Option<Revision>,
        session: &CancellationToken,
    ) -> Vec<String> {
        let Some(current) = *revision else {
            let negotiated = self.negotiator.negotiate(message, session);
            self.negotiated(revision, negotiated);
            return Vec::new();
        };

        let outcome = {
            let mut source = self.source.lock();
            dispatch::dispatch(current, message, source.player())
        };

        if outcome.dispatched {
            // No receivers means no open connections, which is fine.
            let _ = self.refresh.send(Refresh);
        }

        outcome.replies
    }

    fn negotiated(&self, revision: &mut Option<Revision>, negotiated: Revision) {
        info!("{} speaks revision {negotiated}", self.endpoint);
        *revision = Some(negotiated);
        self.notifier.send(Event::Negotiated {
            name: self.endpoint.name.clone(),
            revision: negotiated,
        });
    }

    /// Runs one report tick, unless the revision is still unknown.
    fn report(&self, revision: Option<Revision>, reporter: &mut Reporter) -> Vec<String> {
        let Some(revision) = revision else {
            return Vec::new();
        };

        let mut source = self.source.lock();
        reporter.tick(revision, source.player().as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_up_to_a_minute() {
        let delays: Vec<_> = (0..8).map(|n| Backoff::delay(n).as_millis()).collect();
        assert_eq!(
            delays,
            [1000, 2000, 4000, 8000, 16000, 32000, 60000, 60000]
        );
        assert_eq!(Backoff::delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn duplicate_failures_schedule_one_retry() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.retry(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.retry(), None);
        assert_eq!(backoff.attempts(), 0);

        assert!(backoff.attempt());
        assert!(!backoff.attempt());
        assert_eq!(backoff.attempts(), 1);

        assert_eq!(backoff.retry(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn retry_is_a_no_op_while_open() {
        let mut backoff = Backoff::new();
        backoff.retry();
        backoff.attempt();
        backoff.retry();
        backoff.attempt();
        assert_eq!(backoff.attempts(), 2);

        backoff.open();
        assert_eq!(backoff.state(), Lifecycle::Open);
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.retry(), None);

        backoff.disconnected();
        assert_eq!(backoff.retry(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn closed_is_terminal() {
        let mut backoff = Backoff::new();
        backoff.close();
        assert_eq!(backoff.retry(), None);
        backoff.open();
        assert_eq!(backoff.state(), Lifecycle::Closed);
    }
}
