//! The capability interface through which the relay sees a media player.
//!
//! A [`Source`] selects the currently active [`Player`], if any. A player
//! exposes readers for the twelve reported fields and a set of transport
//! commands. Every command has a default no-op body: a site that cannot,
//! say, set a rating simply does not override [`Player::set_rating`], and
//! the relay treats the absent command as a silent no-op.
//!
//! Readers return [`Result`] because scraping a page can fail at any time;
//! a failing reader is reported to the listener and skipped for one report
//! tick without affecting the other fields.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::error::Result;

/// Playback state of the active player.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PlaybackState {
    Playing,
    Paused,
    #[default]
    Stopped,
}

/// Repeat mode of the active player.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum RepeatMode {
    #[default]
    None,
    One,
    All,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playing => write!(f, "PLAYING"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::One => write!(f, "ONE"),
            Self::All => write!(f, "ALL"),
        }
    }
}

/// Uniform read and command access to whatever media a page is playing.
///
/// Numbers are reported in their natural unit: `duration` and `position`
/// in seconds, `volume` and `rating` on a 0 to 100 and 0 to 5 scale. The
/// relay rounds them before comparing and sending.
///
/// `volume` and `rating` return `Ok(None)` when the player does not support
/// them, which is different from a value of zero.
#[allow(unused_variables)]
pub trait Player {
    /// Whether the player is in a state where it can be read and controlled.
    fn is_ready(&self) -> bool;

    /// Name of the player, e.g. the website it scrapes.
    fn name(&self) -> Result<String>;
    fn state(&self) -> Result<PlaybackState>;
    fn title(&self) -> Result<String>;
    fn artist(&self) -> Result<String>;
    fn album(&self) -> Result<String>;
    /// URL of the cover art.
    fn cover(&self) -> Result<String>;
    fn duration(&self) -> Result<f64>;
    fn position(&self) -> Result<f64>;
    fn volume(&self) -> Result<Option<f64>>;
    fn rating(&self) -> Result<Option<f64>>;
    fn repeat(&self) -> Result<RepeatMode>;
    fn shuffle(&self) -> Result<bool>;

    fn toggle_playing(&mut self) -> Result<()> {
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        Ok(())
    }

    fn previous(&mut self) -> Result<()> {
        Ok(())
    }

    /// Seeks to an absolute position in seconds.
    fn set_position_seconds(&mut self, seconds: f64) -> Result<()> {
        Ok(())
    }

    /// Seeks to a fraction of the duration, from `0.0` to `1.0`.
    fn set_position_percentage(&mut self, fraction: f64) -> Result<()> {
        Ok(())
    }

    /// Seeks with both representations at hand; players pick whichever
    /// their site understands best. Defaults to seeking by seconds.
    fn set_position(&mut self, seconds: f64, fraction: f64) -> Result<()> {
        self.set_position_seconds(seconds)
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        Ok(())
    }

    fn toggle_repeat(&mut self) -> Result<()> {
        Ok(())
    }

    fn toggle_shuffle(&mut self) -> Result<()> {
        Ok(())
    }

    fn toggle_thumbs_up(&mut self) -> Result<()> {
        Ok(())
    }

    fn toggle_thumbs_down(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_rating(&mut self, rating: u8) -> Result<()> {
        Ok(())
    }
}

/// Selects the active player.
///
/// Returns `None` when nothing on the page is recognized as a player.
pub trait Source: Send {
    fn player(&mut self) -> Option<&mut dyn Player>;
}

/// The trivial selection: one known player, or none at all.
impl<P> Source for Option<P>
where
    P: Player + Send,
{
    fn player(&mut self) -> Option<&mut dyn Player> {
        self.as_mut().map(|player| player as &mut dyn Player)
    }
}

/// A [`Source`] shared between every connection.
///
/// Connections lock it only for the duration of one report tick or one
/// command, never across an `.await`.
#[derive(Clone)]
pub struct Shared(Arc<Mutex<dyn Source>>);

impl Shared {
    pub fn new<S>(source: S) -> Self
    where
        S: Source + 'static,
    {
        Self(Arc::new(Mutex::new(source)))
    }

    /// Locks the source.
    ///
    /// A panic inside a player implementation poisons the mutex; the state
    /// behind it is only ever read fresh, so the guard is recovered rather
    /// than propagating the poison to every other connection.
    pub fn lock(&self) -> MutexGuard<'_, dyn Source + 'static> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a player is currently selected.
    #[must_use]
    pub fn has_player(&self) -> bool {
        self.lock().player().is_some()
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared").finish_non_exhaustive()
    }
}
