//! Turns inbound command lines into player invocations.
//!
//! Dispatching never fails: malformed lines and failing commands are
//! answered on the wire with the revision's two-line error form, and
//! unknown commands are ignored.

use crate::{capability::Player, protocol::Revision};

/// Reply sent when there is nothing to control.
pub const NOT_READY: &str = "Error sending event: No site found or site not ready.";

/// What came of one inbound line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Lines to send back to the listener.
    pub replies: Vec<String>,

    /// Whether any command reached the player, i.e. whether every
    /// listener should be sent an out-of-cycle report.
    pub dispatched: bool,
}

/// Decodes `line` in `revision` and applies it to `player`.
pub fn dispatch(revision: Revision, line: &str, player: Option<&mut dyn Player>) -> Dispatch {
    let Some(player) = player.filter(|player| player.is_ready()) else {
        debug!("dropping command {line}: no player ready");
        return Dispatch {
            replies: vec![revision.error_line(NOT_READY)],
            dispatched: false,
        };
    };

    let name = player.name().unwrap_or_default();
    let failed = |e: &crate::error::Error| {
        let message = format!("Error sending event to {name}");
        warn!("{message}: {e}");
        Dispatch {
            replies: revision.error_lines(&message, &e.to_string()).into(),
            dispatched: false,
        }
    };

    let commands = match revision.decode_command(line) {
        Ok(commands) => commands,
        Err(e) => return failed(&e),
    };

    let mut dispatched = false;
    for command in commands {
        debug!("{name}: {command}");
        if let Err(e) = command.apply(player) {
            let mut outcome = failed(&e);
            // Earlier commands from the same line did take effect.
            outcome.dispatched = dispatched;
            return outcome;
        }
        dispatched = true;
    }

    Dispatch {
        replies: Vec::new(),
        dispatched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capability::{PlaybackState, RepeatMode},
        player::Simulated,
    };

    fn player() -> Simulated {
        let mut player = Simulated::new("Test Site");
        player.load("Title", "Artist", "Album", "", 100.0);
        player.freeze();
        player
    }

    #[test]
    fn not_ready_replies_with_error() {
        let mut player = player();
        player.set_ready(false);

        let outcome = dispatch(Revision::Legacy, "PLAYPAUSE", Some(&mut player));
        assert_eq!(
            outcome.replies,
            ["Error:Error sending event: No site found or site not ready."]
        );
        assert!(!outcome.dispatched);
        assert_eq!(player.state().unwrap(), PlaybackState::Stopped);

        let outcome = dispatch(Revision::Rev1, "TOGGLE_PLAYING", None);
        assert_eq!(
            outcome.replies,
            ["ERROR Error sending event: No site found or site not ready."]
        );
    }

    #[test]
    fn legacy_commands_reach_the_player() {
        let mut player = player();

        let outcome = dispatch(Revision::Legacy, "playpause", Some(&mut player));
        assert!(outcome.dispatched);
        assert!(outcome.replies.is_empty());
        assert_eq!(player.state().unwrap(), PlaybackState::Playing);

        player.freeze();
        dispatch(Revision::Legacy, "SETVOLUME 80", Some(&mut player));
        assert_eq!(player.volume().unwrap(), Some(80.0));

        dispatch(Revision::Legacy, "SETPOSITION 34:SETPROGRESS 0,55:", Some(&mut player));
        // The percentage command comes second and wins.
        assert!((player.position().unwrap() - 55.0).abs() < 1e-9);

        dispatch(Revision::Legacy, "REPEAT", Some(&mut player));
        assert_eq!(player.repeat().unwrap(), RepeatMode::All);
    }

    #[test]
    fn rev1_commands_reach_the_player() {
        let mut player = player();

        let outcome = dispatch(Revision::Rev1, "SET_POSITION 34:0,55", Some(&mut player));
        assert!(outcome.dispatched);
        assert!((player.position().unwrap() - 34.0).abs() < 1e-9);

        dispatch(Revision::Rev1, "SET_RATING 4", Some(&mut player));
        assert_eq!(player.rating().unwrap(), Some(4.0));

        dispatch(Revision::Rev1, "TOGGLE_SHUFFLE", Some(&mut player));
        assert!(player.shuffle().unwrap());
    }

    #[test]
    fn unknown_commands_are_ignored() {
        let mut player = player();
        let outcome = dispatch(Revision::Rev1, "DANCE", Some(&mut player));
        assert_eq!(outcome, Dispatch::default());
    }

    #[test]
    fn malformed_commands_reply_with_error_pair() {
        let mut player = player();
        let outcome = dispatch(Revision::Legacy, "SETPOSITION 34", Some(&mut player));
        assert!(!outcome.dispatched);
        assert_eq!(outcome.replies.len(), 2);
        assert_eq!(outcome.replies[0], "Error:Error sending event to Test Site");
        assert!(outcome.replies[1].starts_with("ErrorD:"));
    }

    #[test]
    fn failing_commands_reply_with_error_pair() {
        let mut player = player();
        player.set_volume_supported(false);

        let outcome = dispatch(Revision::Rev1, "SET_VOLUME 10", Some(&mut player));
        assert!(!outcome.dispatched);
        assert_eq!(outcome.replies[0], "ERROR Error sending event to Test Site");
        assert!(outcome.replies[1].starts_with("ERRORDEBUG "));
    }
}
