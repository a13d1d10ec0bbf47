//! Track queue and play history
//!
//! Index 0 is the current track whenever the session is playing. The queue
//! itself never talks to the AudioSink; removal of the head goes through
//! [`TrackQueue::finish_current`] / [`TrackQueue::drop_current`], which only
//! the orchestrator calls.

use crate::error::{Error, Result};
use crate::track::Track;
use encore_common::events::LoopMode;
use rand::Rng;
use std::collections::VecDeque;

/// Ordered tracks plus a bounded ring of completed tracks
#[derive(Debug, Clone)]
pub struct TrackQueue {
    tracks: VecDeque<Track>,
    max_len: usize,
    history: VecDeque<Track>,
    history_capacity: usize,
}

impl TrackQueue {
    pub fn new(max_len: usize, history_capacity: usize) -> Self {
        Self {
            tracks: VecDeque::new(),
            max_len,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
        }
    }

    /// Append a track; returns its 1-based position
    pub fn enqueue(&mut self, track: Track) -> Result<usize> {
        if self.tracks.len() >= self.max_len {
            return Err(Error::QueueFull { max: self.max_len });
        }
        self.tracks.push_back(track);
        Ok(self.tracks.len())
    }

    /// Append autoplay proposals, stopping silently at the cap
    ///
    /// Returns how many were added.
    pub fn extend_autoplay(&mut self, tracks: Vec<Track>) -> usize {
        let room = self.max_len.saturating_sub(self.tracks.len());
        let added = tracks.len().min(room);
        self.tracks.extend(tracks.into_iter().take(added));
        added
    }

    /// Remove the track at a 1-based position (1 = current)
    pub fn remove(&mut self, position: usize) -> Result<Track> {
        if position == 1 && !self.tracks.is_empty() {
            return Err(Error::CannotRemoveCurrent);
        }
        if position == 0 || position > self.tracks.len() {
            return Err(Error::PositionOutOfRange {
                position,
                len: self.tracks.len(),
            });
        }
        self.tracks
            .remove(position - 1)
            .ok_or(Error::PositionOutOfRange {
                position,
                len: self.tracks.len(),
            })
    }

    /// Shuffle everything after the current track
    pub fn shuffle(&mut self) -> Result<()> {
        self.shuffle_with(&mut rand::thread_rng())
    }

    /// Fisher-Yates over indices 1.., index 0 pinned
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let len = self.tracks.len();
        if len < 2 {
            return Err(Error::InsufficientTracks { len });
        }
        for i in (2..len).rev() {
            let j = rng.gen_range(1..=i);
            self.tracks.swap(i, j);
        }
        Ok(())
    }

    /// Apply loop policy to the finished head track
    ///
    /// - `Single` without `suppress_loop`: the head stays, nothing recorded
    /// - otherwise the head is popped into history, and re-appended to the
    ///   tail under `Queue`
    ///
    /// Returns the finished track when it left the head position.
    pub fn finish_current(&mut self, loop_mode: LoopMode, suppress_loop: bool) -> Option<Track> {
        if loop_mode == LoopMode::Single && !suppress_loop {
            return None;
        }
        let finished = self.tracks.pop_front()?;
        self.record_history(finished.clone());
        if loop_mode == LoopMode::Queue {
            self.tracks.push_back(finished.clone());
        }
        Some(finished)
    }

    /// Drop the head without recording it (failed resolution or playback error)
    pub fn drop_current(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    fn record_history(&mut self, track: Track) {
        if self.history_capacity == 0 {
            return;
        }
        while self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(track);
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.front()
    }

    pub fn get(&self, position: usize) -> Option<&Track> {
        position.checked_sub(1).and_then(|i| self.tracks.get(i))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Copy of the queued tracks, current first
    pub fn snapshot(&self) -> Vec<Track> {
        self.tracks.iter().cloned().collect()
    }

    /// Completed tracks, oldest first
    pub fn history(&self) -> Vec<Track> {
        self.history.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Requester;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn track(n: u32) -> Track {
        Track::new(format!("ref-{}", n), format!("Track {}", n), Requester::user("u1", "User"))
            .with_duration(180)
    }

    fn refs(queue: &TrackQueue) -> Vec<String> {
        queue.snapshot().iter().map(|t| t.reference().to_string()).collect()
    }

    fn queue_of(n: u32) -> TrackQueue {
        let mut queue = TrackQueue::new(100, 10);
        for i in 1..=n {
            queue.enqueue(track(i)).unwrap();
        }
        queue
    }

    #[test]
    fn test_enqueue_returns_position() {
        let mut queue = TrackQueue::new(100, 10);
        assert_eq!(queue.enqueue(track(1)).unwrap(), 1);
        assert_eq!(queue.enqueue(track(2)).unwrap(), 2);
        assert_eq!(queue.current().unwrap().reference(), "ref-1");
    }

    #[test]
    fn test_enqueue_full() {
        let mut queue = TrackQueue::new(2, 10);
        queue.enqueue(track(1)).unwrap();
        queue.enqueue(track(2)).unwrap();
        assert!(matches!(queue.enqueue(track(3)), Err(Error::QueueFull { max: 2 })));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_extend_autoplay_respects_cap() {
        let mut queue = TrackQueue::new(3, 10);
        queue.enqueue(track(1)).unwrap();
        let added = queue.extend_autoplay(vec![track(2), track(3), track(4)]);
        assert_eq!(added, 2);
        assert_eq!(refs(&queue), vec!["ref-1", "ref-2", "ref-3"]);
    }

    #[test]
    fn test_remove_middle() {
        let mut queue = queue_of(3);
        let removed = queue.remove(2).unwrap();
        assert_eq!(removed.reference(), "ref-2");
        assert_eq!(refs(&queue), vec!["ref-1", "ref-3"]);
    }

    #[test]
    fn test_remove_current_rejected() {
        for n in 1..=5 {
            let mut queue = queue_of(n);
            let before = refs(&queue);
            assert!(matches!(queue.remove(1), Err(Error::CannotRemoveCurrent)));
            assert_eq!(refs(&queue), before);
        }
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut queue = queue_of(3);
        assert!(matches!(
            queue.remove(4),
            Err(Error::PositionOutOfRange { position: 4, len: 3 })
        ));
        assert!(matches!(queue.remove(0), Err(Error::PositionOutOfRange { .. })));

        let mut empty = TrackQueue::new(100, 10);
        assert!(matches!(empty.remove(1), Err(Error::PositionOutOfRange { .. })));
    }

    #[test]
    fn test_shuffle_pins_current_and_preserves_multiset() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 2..=12 {
            let mut queue = queue_of(n);
            let before = refs(&queue);
            queue.shuffle_with(&mut rng).unwrap();
            let after = refs(&queue);

            assert_eq!(after[0], before[0]);
            let mut sorted_before = before.clone();
            let mut sorted_after = after.clone();
            sorted_before.sort();
            sorted_after.sort();
            assert_eq!(sorted_before, sorted_after);
        }
    }

    #[test]
    fn test_shuffle_moves_tail_eventually() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut queue = queue_of(6);
        let original = refs(&queue);
        let changed = (0..20).any(|_| {
            queue.shuffle_with(&mut rng).unwrap();
            refs(&queue) != original
        });
        assert!(changed);
    }

    #[test]
    fn test_shuffle_insufficient() {
        let mut queue = queue_of(1);
        assert!(matches!(queue.shuffle(), Err(Error::InsufficientTracks { len: 1 })));
        assert_eq!(refs(&queue), vec!["ref-1"]);

        let mut empty = TrackQueue::new(100, 10);
        assert!(matches!(empty.shuffle(), Err(Error::InsufficientTracks { len: 0 })));
    }

    #[test]
    fn test_finish_loop_off() {
        let mut queue = queue_of(2);
        let finished = queue.finish_current(LoopMode::Off, false).unwrap();
        assert_eq!(finished.reference(), "ref-1");
        assert_eq!(refs(&queue), vec!["ref-2"]);
        assert_eq!(queue.history().len(), 1);
    }

    #[test]
    fn test_finish_loop_single_keeps_head() {
        let mut queue = queue_of(2);
        assert!(queue.finish_current(LoopMode::Single, false).is_none());
        assert_eq!(refs(&queue), vec!["ref-1", "ref-2"]);
        assert!(queue.history().is_empty());
    }

    #[test]
    fn test_finish_loop_single_suppressed_advances() {
        let mut queue = queue_of(2);
        queue.finish_current(LoopMode::Single, true).unwrap();
        assert_eq!(refs(&queue), vec!["ref-2"]);
    }

    #[test]
    fn test_finish_loop_queue_reappends() {
        let mut queue = queue_of(1);
        queue.finish_current(LoopMode::Queue, false).unwrap();
        assert_eq!(refs(&queue), vec!["ref-1"]);
        assert_eq!(queue.history()[0].reference(), "ref-1");
    }

    #[test]
    fn test_history_is_bounded() {
        let mut queue = TrackQueue::new(100, 3);
        for i in 1..=5 {
            queue.enqueue(track(i)).unwrap();
            queue.finish_current(LoopMode::Off, false);
        }
        let history: Vec<_> = queue.history().iter().map(|t| t.reference().to_string()).collect();
        assert_eq!(history, vec!["ref-3", "ref-4", "ref-5"]);
    }

    #[test]
    fn test_drop_current_skips_history() {
        let mut queue = queue_of(2);
        queue.drop_current();
        assert_eq!(refs(&queue), vec!["ref-2"]);
        assert!(queue.history().is_empty());
    }
}
