//! Exclusive playback slot
//!
//! Holds at most one message's playback at a time. Acquiring the slot for
//! a message stops whatever occupied it before.

use crate::voice::Playback;

/// Single-entry registry of the active message audio
#[derive(Default)]
pub struct PlaybackSlot {
    occupant: Option<(usize, Box<dyn Playback>)>,
}

impl PlaybackSlot {
    /// Create an empty slot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Message index holding the slot
    #[must_use]
    pub fn occupant(&self) -> Option<usize> {
        self.occupant.as_ref().map(|(index, _)| *index)
    }

    /// Whether the audio of message `index` is playing
    #[must_use]
    pub fn is_playing(&self, index: usize) -> bool {
        self.occupant
            .as_ref()
            .is_some_and(|(i, playback)| *i == index && playback.is_playing())
    }

    /// Playback of message `index`, if it holds the slot
    pub fn get_mut(&mut self, index: usize) -> Option<&mut dyn Playback> {
        match &mut self.occupant {
            Some((i, playback)) if *i == index => Some(playback.as_mut()),
            _ => None,
        }
    }

    /// Give the slot to message `index`, stopping any prior occupant first
    pub fn acquire(&mut self, index: usize, playback: Box<dyn Playback>) -> &mut dyn Playback {
        self.release();
        let (_, playback) = self.occupant.insert((index, playback));
        playback.as_mut()
    }

    /// Stop and remove the occupant
    pub fn release(&mut self) {
        if let Some((index, mut playback)) = self.occupant.take() {
            playback.stop();
            tracing::trace!(index, "released playback slot");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::Result;

    /// Records every call as `(clip, action)`
    struct Recorded {
        clip: &'static str,
        log: Rc<RefCell<Vec<(&'static str, &'static str)>>>,
        playing: bool,
    }

    impl Playback for Recorded {
        fn play(&mut self) -> Result<()> {
            self.playing = true;
            self.log.borrow_mut().push((self.clip, "play"));
            Ok(())
        }

        fn pause(&mut self) {
            self.playing = false;
            self.log.borrow_mut().push((self.clip, "pause"));
        }

        fn stop(&mut self) {
            self.playing = false;
            self.log.borrow_mut().push((self.clip, "stop"));
        }

        fn is_playing(&self) -> bool {
            self.playing
        }
    }

    fn clip(
        name: &'static str,
        log: &Rc<RefCell<Vec<(&'static str, &'static str)>>>,
    ) -> Box<dyn Playback> {
        Box::new(Recorded {
            clip: name,
            log: Rc::clone(log),
            playing: false,
        })
    }

    #[test]
    fn acquire_stops_previous_occupant_before_new_one_plays() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut slot = PlaybackSlot::new();

        slot.acquire(1, clip("one", &log)).play().unwrap();
        slot.acquire(3, clip("three", &log)).play().unwrap();

        assert_eq!(
            *log.borrow(),
            vec![("one", "play"), ("one", "stop"), ("three", "play")]
        );
        assert_eq!(slot.occupant(), Some(3));
        assert!(slot.is_playing(3));
        assert!(!slot.is_playing(1));
    }

    #[test]
    fn get_mut_only_returns_occupant() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut slot = PlaybackSlot::new();
        slot.acquire(2, clip("two", &log));

        assert!(slot.get_mut(2).is_some());
        assert!(slot.get_mut(0).is_none());
    }

    #[test]
    fn release_empties_slot() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut slot = PlaybackSlot::new();
        slot.acquire(0, clip("zero", &log)).play().unwrap();

        slot.release();
        assert_eq!(slot.occupant(), None);
        assert_eq!(log.borrow().last(), Some(&("zero", "stop")));
    }
}
