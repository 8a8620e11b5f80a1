//! The per-connection diff cache and report tick.
//!
//! On every tick the reporter reads all twelve fields fresh from the active
//! player, rounds numeric readings, and produces a wire line only for fields
//! whose value differs from what was last sent on this connection. A cache
//! miss always sends: an empty title is still sent once after a non-empty
//! one, and the first tick after connecting sends everything.
//!
//! The cache is a fixed-shape record rather than a map, one slot per field,
//! and is owned by exactly one connection.

use crate::{
    capability::{PlaybackState, Player, RepeatMode},
    error::Result,
    protocol::{Field, Report, Revision, Value},
    util::ToRounded,
};

/// Last value sent per field. `None` means nothing was sent yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cache {
    pub state: Option<PlaybackState>,
    pub player: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub cover: Option<String>,
    pub duration: Option<i64>,
    pub position: Option<i64>,
    pub volume: Option<i64>,
    pub rating: Option<i64>,
    pub repeat: Option<RepeatMode>,
    pub shuffle: Option<bool>,
}

impl Cache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything, guaranteeing a full resend on the next tick.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Stores `value` in `slot` if it differs, returning whether it did.
fn changed<T>(slot: &mut Option<T>, value: T) -> bool
where
    T: PartialEq,
{
    if slot.as_ref() == Some(&value) {
        false
    } else {
        *slot = Some(value);
        true
    }
}

/// Computes the lines one tick sends on one connection.
#[derive(Clone, Debug, Default)]
pub struct Reporter {
    cache: Cache,
}

impl Reporter {
    /// Human readable prefix of the error line for a failed field read.
    const READ_ERROR: &'static str = "Error updating";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn reset(&mut self) {
        self.cache.clear();
    }

    /// Runs one report tick against `player`.
    ///
    /// With no player, or one that is not ready, the only line ever sent is
    /// a stopped state, and only when the cache doesn't already hold it.
    pub fn tick(&mut self, revision: Revision, player: Option<&dyn Player>) -> Vec<String> {
        let Some(player) = player.filter(|player| player.is_ready()) else {
            return self.stopped(revision);
        };

        let name = player.name().unwrap_or_default();
        let mut lines = Vec::new();

        for field in Field::ALL {
            match self.diff(field, player) {
                Ok(Some(value)) => {
                    let line = revision.encode(&Report::new(field, value));
                    trace!("report: {line}");
                    lines.push(line);
                }
                Ok(None) => {}
                Err(e) => {
                    let message = format!("{} {} for {name}", Self::READ_ERROR, field.label());
                    warn!("{message}: {e}");
                    lines.extend(revision.error_lines(&message, &e.to_string()));
                }
            }
        }

        lines
    }

    fn stopped(&mut self, revision: Revision) -> Vec<String> {
        if changed(&mut self.cache.state, PlaybackState::Stopped) {
            let report = Report::new(Field::State, Value::State(PlaybackState::Stopped));
            vec![revision.encode(&report)]
        } else {
            Vec::new()
        }
    }

    /// Reads `field` and returns the value to send, if it changed.
    ///
    /// Unsupported volume and rating readings are never sent.
    fn diff(&mut self, field: Field, player: &dyn Player) -> Result<Option<Value>> {
        let cache = &mut self.cache;
        let value = match field {
            Field::State => {
                let state = player.state()?;
                changed(&mut cache.state, state).then_some(Value::State(state))
            }
            Field::Player => text(&mut cache.player, player.name()?),
            Field::Title => text(&mut cache.title, player.title()?),
            Field::Artist => text(&mut cache.artist, player.artist()?),
            Field::Album => text(&mut cache.album, player.album()?),
            Field::Cover => text(&mut cache.cover, player.cover()?),
            Field::Duration => number(&mut cache.duration, player.duration()?),
            Field::Position => number(&mut cache.position, player.position()?),
            Field::Volume => match player.volume()? {
                Some(volume) => number(&mut cache.volume, volume),
                None => None,
            },
            Field::Rating => match player.rating()? {
                Some(rating) => number(&mut cache.rating, rating),
                None => None,
            },
            Field::Repeat => {
                let repeat = player.repeat()?;
                changed(&mut cache.repeat, repeat).then_some(Value::Repeat(repeat))
            }
            Field::Shuffle => {
                let shuffle = player.shuffle()?;
                changed(&mut cache.shuffle, shuffle).then_some(Value::Shuffle(shuffle))
            }
        };

        Ok(value)
    }
}

fn text(slot: &mut Option<String>, value: String) -> Option<Value> {
    if slot.as_deref() == Some(value.as_str()) {
        None
    } else {
        *slot = Some(value.clone());
        Some(Value::Text(value))
    }
}

fn number(slot: &mut Option<i64>, value: f64) -> Option<Value> {
    let value = value.to_rounded();
    changed(slot, value).then_some(Value::Number(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, player::Simulated};

    fn playing() -> Simulated {
        let mut player = Simulated::new("Test Site");
        player.load("Title", "Artist", "Album", "https://example.com/cover.jpg", 200.0);
        player.seek(33.6);
        player.set_state(PlaybackState::Playing);
        player.freeze();
        player
    }

    #[test]
    fn first_tick_sends_every_field() {
        let player = playing();
        let mut reporter = Reporter::new();

        let lines = reporter.tick(Revision::Legacy, Some(&player));
        assert_eq!(
            lines,
            [
                "STATE:1",
                "PLAYER:Test Site",
                "TITLE:Title",
                "ARTIST:Artist",
                "ALBUM:Album",
                "COVER:https://example.com/cover.jpg",
                "DURATION:200",
                "POSITION:34",
                "VOLUME:100",
                "RATING:0",
                "REPEAT:0",
                "SHUFFLE:0",
            ]
        );
    }

    #[test]
    fn second_tick_without_change_sends_nothing() {
        let player = playing();
        let mut reporter = Reporter::new();

        assert!(!reporter.tick(Revision::Rev1, Some(&player)).is_empty());
        assert!(reporter.tick(Revision::Rev1, Some(&player)).is_empty());
    }

    #[test]
    fn only_changed_fields_are_sent() {
        let mut player = playing();
        let mut reporter = Reporter::new();
        reporter.tick(Revision::Rev1, Some(&player));

        player.set_volume(42).unwrap();
        player.toggle_repeat().unwrap();
        assert_eq!(
            reporter.tick(Revision::Rev1, Some(&player)),
            ["VOLUME 42", "REPEAT ALL"]
        );
    }

    #[test]
    fn rounding_suppresses_subsecond_changes() {
        let mut player = playing();
        let mut reporter = Reporter::new();
        reporter.tick(Revision::Legacy, Some(&player));

        player.seek(34.2);
        assert!(reporter.tick(Revision::Legacy, Some(&player)).is_empty());

        player.seek(34.6);
        assert_eq!(reporter.tick(Revision::Legacy, Some(&player)), ["POSITION:35"]);
    }

    #[test]
    fn empty_value_after_non_empty_is_sent() {
        let mut player = playing();
        let mut reporter = Reporter::new();
        reporter.tick(Revision::Rev1, Some(&player));

        player.load("", "", "", "", 0.0);
        player.seek(0.0);
        let lines = reporter.tick(Revision::Rev1, Some(&player));
        assert!(lines.contains(&"TITLE ".to_owned()));
        assert!(lines.contains(&"DURATION 0".to_owned()));
        assert!(lines.contains(&"POSITION 0".to_owned()));
    }

    #[test]
    fn not_ready_sends_stopped_once() {
        let mut player = playing();
        player.set_ready(false);

        let mut reporter = Reporter::new();
        assert_eq!(reporter.tick(Revision::Legacy, Some(&player)), ["STATE:0"]);
        assert!(reporter.tick(Revision::Legacy, Some(&player)).is_empty());

        let mut reporter = Reporter::new();
        assert_eq!(reporter.tick(Revision::Rev1, None), ["STATE STOPPED"]);
        assert!(reporter.tick(Revision::Rev1, None).is_empty());
    }

    #[test]
    fn unsupported_volume_is_not_sent() {
        let mut player = playing();
        player.set_volume_supported(false);

        let mut reporter = Reporter::new();
        let lines = reporter.tick(Revision::Rev1, Some(&player));
        assert!(!lines.iter().any(|line| line.starts_with("VOLUME")));
        assert_eq!(reporter.cache().volume, None);
    }

    struct Flaky(Simulated);

    impl Player for Flaky {
        fn is_ready(&self) -> bool {
            true
        }
        fn name(&self) -> Result<String> {
            self.0.name()
        }
        fn state(&self) -> Result<PlaybackState> {
            self.0.state()
        }
        fn title(&self) -> Result<String> {
            Err(Error::unavailable("title element missing"))
        }
        fn artist(&self) -> Result<String> {
            self.0.artist()
        }
        fn album(&self) -> Result<String> {
            self.0.album()
        }
        fn cover(&self) -> Result<String> {
            self.0.cover()
        }
        fn duration(&self) -> Result<f64> {
            self.0.duration()
        }
        fn position(&self) -> Result<f64> {
            self.0.position()
        }
        fn volume(&self) -> Result<Option<f64>> {
            self.0.volume()
        }
        fn rating(&self) -> Result<Option<f64>> {
            self.0.rating()
        }
        fn repeat(&self) -> Result<RepeatMode> {
            self.0.repeat()
        }
        fn shuffle(&self) -> Result<bool> {
            self.0.shuffle()
        }
    }

    #[test]
    fn failing_field_does_not_poison_the_tick() {
        let player = Flaky(playing());
        let mut reporter = Reporter::new();

        let lines = reporter.tick(Revision::Rev1, Some(&player));
        assert_eq!(lines.len(), 13);
        assert_eq!(lines[2], "ERROR Error updating title for Test Site");
        assert_eq!(
            lines[3],
            "ERRORDEBUG service unavailable: title element missing"
        );
        assert_eq!(reporter.cache().title, None);
        assert_eq!(reporter.cache().artist.as_deref(), Some("Artist"));
    }
}
