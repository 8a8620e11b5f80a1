//! An in-memory [`Player`] that behaves like a simple media player.
//!
//! The relay itself never scrapes pages; it only consumes the
//! [`Player`] capability. `Simulated` fills that role wherever no browser
//! is involved: in tests, and in the `wnp-relay` binary so a listener can
//! be exercised end to end. It keeps a small queue, a position that
//! advances in real time while playing, and implements every command.

use std::time::{Duration, Instant};

use crate::{
    capability::{PlaybackState, Player, RepeatMode},
    error::{Error, Result},
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover: String,
    pub duration: Duration,
}

#[derive(Clone, Debug)]
pub struct Simulated {
    name: String,
    ready: bool,

    queue: Vec<Track>,
    index: usize,

    state: PlaybackState,
    position: Duration,
    // Set while playing with a running clock.
    resumed_at: Option<Instant>,
    frozen: bool,

    volume: u8,
    volume_supported: bool,
    rating: u8,
    repeat_mode: RepeatMode,
    shuffle: bool,
}

impl Simulated {
    /// Going to the previous track within this many seconds restarts the
    /// current one instead.
    const RESTART_THRESHOLD: Duration = Duration::from_secs(3);

    const MAX_VOLUME: u8 = 100;
    const MAX_RATING: u8 = 5;

    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ready: true,
            queue: vec![Track::default()],
            index: 0,
            state: PlaybackState::Stopped,
            position: Duration::ZERO,
            resumed_at: None,
            frozen: false,
            volume: Self::MAX_VOLUME,
            volume_supported: true,
            rating: 0,
            repeat_mode: RepeatMode::None,
            shuffle: false,
        }
    }

    /// Replaces the queue with a single track and rewinds to its start.
    pub fn load(&mut self, title: &str, artist: &str, album: &str, cover: &str, duration: f64) {
        let track = Track {
            title: title.to_owned(),
            artist: artist.to_owned(),
            album: album.to_owned(),
            cover: cover.to_owned(),
            duration: Duration::try_from_secs_f64(duration).unwrap_or_default(),
        };
        self.queue = vec![track];
        self.index = 0;
        self.rewind();
    }

    /// Appends a track to the queue.
    pub fn enqueue(&mut self, track: Track) {
        self.queue.push(track);
    }

    /// Seeks to `seconds`, clamped to the track.
    pub fn seek(&mut self, seconds: f64) {
        let position = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or_default();
        self.position = position.min(self.track().duration);
        if self.resumed_at.is_some() {
            self.resumed_at = Some(Instant::now());
        }
    }

    pub fn set_state(&mut self, state: PlaybackState) {
        self.position = self.elapsed();
        self.state = state;
        self.resumed_at = (state == PlaybackState::Playing && !self.frozen).then(Instant::now);
    }

    /// Stops the position from advancing on its own.
    pub fn freeze(&mut self) {
        self.position = self.elapsed();
        self.resumed_at = None;
        self.frozen = true;
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Makes [`Player::volume`] report the volume as unsupported.
    pub fn set_volume_supported(&mut self, supported: bool) {
        self.volume_supported = supported;
    }

    #[must_use]
    pub fn track(&self) -> &Track {
        // The queue is never empty.
        &self.queue[self.index.min(self.queue.len() - 1)]
    }

    fn elapsed(&self) -> Duration {
        let position = match self.resumed_at {
            Some(resumed_at) => self.position + resumed_at.elapsed(),
            None => self.position,
        };
        position.min(self.track().duration)
    }

    fn rewind(&mut self) {
        self.position = Duration::ZERO;
        if self.resumed_at.is_some() {
            self.resumed_at = Some(Instant::now());
        }
    }

    fn skip_to(&mut self, index: usize) {
        self.index = index;
        self.rewind();
    }
}

impl Player for Simulated {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn name(&self) -> Result<String> {
        Ok(self.name.clone())
    }

    fn state(&self) -> Result<PlaybackState> {
        Ok(self.state)
    }

    fn title(&self) -> Result<String> {
        Ok(self.track().title.clone())
    }

    fn artist(&self) -> Result<String> {
        Ok(self.track().artist.clone())
    }

    fn album(&self) -> Result<String> {
        Ok(self.track().album.clone())
    }

    fn cover(&self) -> Result<String> {
        Ok(self.track().cover.clone())
    }

    fn duration(&self) -> Result<f64> {
        Ok(self.track().duration.as_secs_f64())
    }

    fn position(&self) -> Result<f64> {
        Ok(self.elapsed().as_secs_f64())
    }

    fn volume(&self) -> Result<Option<f64>> {
        Ok(self.volume_supported.then_some(f64::from(self.volume)))
    }

    fn rating(&self) -> Result<Option<f64>> {
        Ok(Some(f64::from(self.rating)))
    }

    fn repeat(&self) -> Result<RepeatMode> {
        Ok(self.repeat_mode)
    }

    fn shuffle(&self) -> Result<bool> {
        Ok(self.shuffle)
    }

    fn toggle_playing(&mut self) -> Result<()> {
        let state = match self.state {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused | PlaybackState::Stopped => PlaybackState::Playing,
        };
        self.set_state(state);
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        let next = self.index + 1;
        if next < self.queue.len() {
            self.skip_to(next);
        } else if self.repeat_mode == RepeatMode::All {
            self.skip_to(0);
        } else {
            self.skip_to(self.index);
            self.set_state(PlaybackState::Stopped);
        }
        Ok(())
    }

    fn previous(&mut self) -> Result<()> {
        if self.elapsed() > Self::RESTART_THRESHOLD || self.index == 0 {
            self.rewind();
        } else {
            self.skip_to(self.index - 1);
        }
        Ok(())
    }

    fn set_position_seconds(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() {
            return Err(Error::out_of_range(format!(
                "position cannot be set to {seconds}"
            )));
        }
        self.seek(seconds);
        Ok(())
    }

    fn set_position_percentage(&mut self, fraction: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(Error::out_of_range(format!(
                "position cannot be set to {fraction}"
            )));
        }
        self.seek(self.track().duration.as_secs_f64() * fraction);
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        if !self.volume_supported {
            return Err(Error::unimplemented("volume control not supported"));
        }
        self.volume = volume.min(Self::MAX_VOLUME);
        Ok(())
    }

    fn toggle_repeat(&mut self) -> Result<()> {
        self.repeat_mode = match self.repeat_mode {
            RepeatMode::None => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::None,
        };
        Ok(())
    }

    fn toggle_shuffle(&mut self) -> Result<()> {
        self.shuffle = !self.shuffle;
        Ok(())
    }

    fn toggle_thumbs_up(&mut self) -> Result<()> {
        self.rating = if self.rating == Self::MAX_RATING {
            0
        } else {
            Self::MAX_RATING
        };
        Ok(())
    }

    fn toggle_thumbs_down(&mut self) -> Result<()> {
        self.rating = if self.rating == 1 { 0 } else { 1 };
        Ok(())
    }

    fn set_rating(&mut self, rating: u8) -> Result<()> {
        self.rating = rating.min(Self::MAX_RATING);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> Simulated {
        let mut player = Simulated::new("Simulated");
        player.load("One", "Artist", "Album", "", 100.0);
        player.freeze();
        player
    }

    #[test]
    fn toggling_cycles_play_and_pause() {
        let mut player = loaded();
        player.toggle_playing().unwrap();
        assert_eq!(player.state().unwrap(), PlaybackState::Playing);
        player.toggle_playing().unwrap();
        assert_eq!(player.state().unwrap(), PlaybackState::Paused);
    }

    #[test]
    fn seeking_is_clamped() {
        let mut player = loaded();
        player.set_position_seconds(250.0).unwrap();
        assert!((player.position().unwrap() - 100.0).abs() < f64::EPSILON);

        player.set_position_percentage(0.25).unwrap();
        assert!((player.position().unwrap() - 25.0).abs() < f64::EPSILON);

        assert!(player.set_position_percentage(1.5).is_err());
    }

    #[test]
    fn repeat_cycles_through_modes() {
        let mut player = loaded();
        let mut modes = Vec::new();
        for _ in 0..3 {
            player.toggle_repeat().unwrap();
            modes.push(player.repeat().unwrap());
        }
        assert_eq!(modes, [RepeatMode::All, RepeatMode::One, RepeatMode::None]);
    }

    #[test]
    fn next_walks_the_queue() {
        let mut player = loaded();
        player.enqueue(Track {
            title: "Two".to_owned(),
            duration: Duration::from_secs(50),
            ..Track::default()
        });

        player.next().unwrap();
        assert_eq!(player.title().unwrap(), "Two");

        player.next().unwrap();
        assert_eq!(player.title().unwrap(), "Two");
        assert_eq!(player.state().unwrap(), PlaybackState::Stopped);

        player.toggle_repeat().unwrap();
        player.next().unwrap();
        assert_eq!(player.title().unwrap(), "One");

        player.next().unwrap();
        player.previous().unwrap();
        assert_eq!(player.title().unwrap(), "One");
    }

    #[test]
    fn thumbs_toggle_rating() {
        let mut player = loaded();
        player.toggle_thumbs_up().unwrap();
        assert_eq!(player.rating().unwrap(), Some(5.0));
        player.toggle_thumbs_up().unwrap();
        assert_eq!(player.rating().unwrap(), Some(0.0));
        player.toggle_thumbs_down().unwrap();
        assert_eq!(player.rating().unwrap(), Some(1.0));
    }

    #[test]
    fn unsupported_volume() {
        let mut player = loaded();
        player.set_volume_supported(false);
        assert_eq!(player.volume().unwrap(), None);
        assert!(player.set_volume(10).is_err());
    }
}
