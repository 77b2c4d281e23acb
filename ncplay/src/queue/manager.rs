//! Queue Manager
//!
//! Owns the ordered track list, the current-position pointer and the
//! navigation mode. Knows nothing about the backend; the playback side asks
//! it which track comes next and loads that track itself.
//!
//! Every mutation writes the full state through to the store before
//! returning. `next()` and `previous()` move the pointer, so they persist too.
//! A mutation is applied to a copy of the state; the copy replaces the
//! in-memory state only once it is on disk, so a failed save changes nothing.

use crate::error::{Error, Result};
use crate::queue::state::{clamp_volume, PlayerState, StateStore};
use ncplay_common::{PlayMode, QueueItem, Track};
use rand::Rng;
use tracing::debug;

/// Navigable, persisted play queue
#[derive(Debug)]
pub struct QueueManager {
    state: PlayerState,
    store: StateStore,
}

impl QueueManager {
    /// Load the queue from the store (default state if there is none)
    pub fn open(store: StateStore) -> Self {
        let state = store.load();
        debug!(
            "Loaded queue: {} track(s), current {:?}, mode {}",
            state.queue.len(),
            state.current_index,
            state.mode
        );
        Self { state, store }
    }

    /// Re-read the store, discarding in-memory state.
    ///
    /// Another process may have changed the queue since this one opened it.
    pub fn reload(&mut self) {
        self.state = self.store.load();
    }

    /// Persist `next` and adopt it only after the write succeeded
    fn commit(&mut self, next: PlayerState) -> Result<()> {
        self.store.save(&next)?;
        self.state = next;
        Ok(())
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    // ----- Mutations -------------------------------------------------------

    /// Append one track
    pub fn add(&mut self, track: Track) -> Result<()> {
        let mut next = self.state.clone();
        next.queue.push(track);
        self.commit(next)
    }

    /// Append tracks, preserving their order
    pub fn add_all(&mut self, tracks: impl IntoIterator<Item = Track>) -> Result<()> {
        let mut next = self.state.clone();
        next.queue.extend(tracks);
        self.commit(next)
    }

    /// Remove the track at `index`.
    ///
    /// Out-of-range indices are a no-op returning `None`. Removing at or
    /// before the current position shifts the pointer back by one so it keeps
    /// following the same neighbour (never below 0). Emptying the queue
    /// clears the pointer.
    pub fn remove(&mut self, index: usize) -> Result<Option<Track>> {
        if index >= self.state.queue.len() {
            debug!("Ignoring remove of index {} (queue length {})", index, self.state.queue.len());
            return Ok(None);
        }

        let mut next = self.state.clone();
        let removed = next.queue.remove(index);

        next.current_index = match next.current_index {
            _ if next.queue.is_empty() => None,
            Some(current) if current >= index && current > 0 => Some(current - 1),
            other => other,
        };

        self.commit(next)?;
        Ok(Some(removed))
    }

    /// Drop every track and clear the pointer
    pub fn clear(&mut self) -> Result<()> {
        let next = PlayerState {
            queue: Vec::new(),
            current_index: None,
            ..self.state.clone()
        };
        self.commit(next)
    }

    /// Replace the whole queue and point at `start_index`.
    ///
    /// An empty list clears the pointer. A start index outside a non-empty
    /// list is rejected and nothing changes.
    pub fn set_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        let current_index = if tracks.is_empty() {
            None
        } else if start_index < tracks.len() {
            Some(start_index)
        } else {
            return Err(Error::InvalidIndex {
                index: start_index,
                len: tracks.len(),
            });
        };

        let next = PlayerState {
            queue: tracks,
            current_index,
            ..self.state.clone()
        };
        self.commit(next)
    }

    /// Point at `index` without changing the queue contents
    pub fn set_current_index(&mut self, index: usize) -> Result<&Track> {
        let len = self.state.queue.len();
        if index >= len {
            return Err(Error::InvalidIndex { index, len });
        }
        self.move_to(index)?;
        Ok(&self.state.queue[index])
    }

    pub fn set_mode(&mut self, mode: PlayMode) -> Result<()> {
        let next = PlayerState {
            mode,
            ..self.state.clone()
        };
        self.commit(next)
    }

    /// Store a volume level, clamped to 0..=100. Returns the stored value.
    pub fn set_volume(&mut self, level: i64) -> Result<u8> {
        let next = PlayerState {
            volume: clamp_volume(level),
            ..self.state.clone()
        };
        self.commit(next)?;
        Ok(self.state.volume)
    }

    // ----- Navigation ------------------------------------------------------

    /// Advance according to the current mode.
    ///
    /// | mode     | chosen index                                   |
    /// |----------|------------------------------------------------|
    /// | sequence | index + 1, or `None` past the end (no change)  |
    /// | repeat   | (index + 1) mod len                            |
    /// | single   | index                                          |
    /// | shuffle  | uniform draw from 0..len                       |
    ///
    /// With no current track, sequence and repeat start at 0 and single
    /// picks 0. An empty queue returns `None` and changes nothing.
    pub fn next(&mut self) -> Result<Option<Track>> {
        let len = self.state.queue.len();
        if len == 0 {
            return Ok(None);
        }

        let chosen = match (self.state.mode, self.state.current_index) {
            (PlayMode::Sequence, None) => 0,
            (PlayMode::Sequence, Some(i)) if i + 1 >= len => {
                debug!("End of queue reached at index {}", i);
                return Ok(None);
            }
            (PlayMode::Sequence, Some(i)) => i + 1,
            (PlayMode::Repeat, None) => 0,
            (PlayMode::Repeat, Some(i)) => (i + 1) % len,
            (PlayMode::Single, current) => current.unwrap_or(0),
            (PlayMode::Shuffle, _) => random_index(len),
        };

        self.move_to(chosen).map(Some)
    }

    /// Step back according to the current mode.
    ///
    /// | mode     | chosen index                                   |
    /// |----------|------------------------------------------------|
    /// | sequence | index - 1, clamped to 0                        |
    /// | repeat   | index - 1, wrapping to len - 1                 |
    /// | single   | index                                          |
    /// | shuffle  | independent uniform draw from 0..len           |
    pub fn previous(&mut self) -> Result<Option<Track>> {
        let len = self.state.queue.len();
        if len == 0 {
            return Ok(None);
        }

        let chosen = match (self.state.mode, self.state.current_index) {
            (PlayMode::Sequence, current) => current.map_or(0, |i| i.saturating_sub(1)),
            (PlayMode::Repeat, Some(i)) if i > 0 => i - 1,
            (PlayMode::Repeat, _) => len - 1,
            (PlayMode::Single, current) => current.unwrap_or(0),
            (PlayMode::Shuffle, _) => random_index(len),
        };

        self.move_to(chosen).map(Some)
    }

    fn move_to(&mut self, index: usize) -> Result<Track> {
        let next = PlayerState {
            current_index: Some(index),
            ..self.state.clone()
        };
        self.commit(next)?;
        Ok(self.state.queue[index].clone())
    }

    // ----- Queries ---------------------------------------------------------

    pub fn current(&self) -> Option<&Track> {
        self.state.current_index.and_then(|i| self.state.queue.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.current_index
    }

    /// Snapshot of the queue with positions
    pub fn list(&self) -> Vec<QueueItem> {
        self.state
            .queue
            .iter()
            .enumerate()
            .map(|(index, track)| QueueItem {
                index,
                track: track.clone(),
            })
            .collect()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.state.queue
    }

    pub fn len(&self) -> usize {
        self.state.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.queue.is_empty()
    }

    pub fn mode(&self) -> PlayMode {
        self.state.mode
    }

    pub fn volume(&self) -> u8 {
        self.state.volume
    }
}

fn random_index(len: usize) -> usize {
    rand::thread_rng().gen_range(0..len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncplay_common::Album;
    use tempfile::TempDir;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: id.to_string(),
            artists: vec![],
            album: Album::default(),
            duration: 1000,
            uri: format!("{}.mp3", id),
        }
    }

    fn queue_with(dir: &TempDir, ids: &[&str], current: usize, mode: PlayMode) -> QueueManager {
        let mut queue = QueueManager::open(StateStore::new(dir.path().join("state.json")));
        queue
            .set_queue(ids.iter().map(|id| track(id)).collect(), current)
            .unwrap();
        queue.set_mode(mode).unwrap();
        queue
    }

    #[test]
    fn test_queue_manager_creation() {
        let dir = TempDir::new().unwrap();
        let queue = QueueManager::open(StateStore::new(dir.path().join("state.json")));
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.current_index(), None);
        assert!(queue.current().is_none());
        assert_eq!(queue.mode(), PlayMode::Sequence);
    }

    #[test]
    fn test_add_and_add_all_preserve_order() {
        let dir = TempDir::new().unwrap();
        let mut queue = QueueManager::open(StateStore::new(dir.path().join("state.json")));
        queue.add(track("a")).unwrap();
        queue.add_all(vec![track("b"), track("c"), track("a")]).unwrap();

        let ids: Vec<_> = queue.list().into_iter().map(|item| (item.index, item.track.id)).collect();
        assert_eq!(
            ids,
            vec![(0, "a".into()), (1, "b".into()), (2, "c".into()), (3, "a".into())]
        );
        // Adding never moves the pointer
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn test_remove_before_current_shifts_pointer() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a", "b", "c", "d"], 2, PlayMode::Sequence);

        let removed = queue.remove(0).unwrap();
        assert_eq!(removed.unwrap().id, "a");
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(queue.current().unwrap().id, "c");
    }

    #[test]
    fn test_remove_at_current_shifts_pointer() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a", "b", "c"], 2, PlayMode::Sequence);

        queue.remove(2).unwrap();
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_remove_current_at_zero_stays_at_zero() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a", "b"], 0, PlayMode::Sequence);

        queue.remove(0).unwrap();
        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.current().unwrap().id, "b");
    }

    #[test]
    fn test_remove_after_current_leaves_pointer() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a", "b", "c"], 1, PlayMode::Sequence);

        queue.remove(2).unwrap();
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_remove_out_of_range_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a", "b"], 1, PlayMode::Sequence);

        assert!(queue.remove(5).unwrap().is_none());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_remove_last_track_clears_pointer() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a"], 0, PlayMode::Sequence);

        queue.remove(0).unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn test_clear_resets_pointer() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a", "b", "c"], 1, PlayMode::Repeat);

        queue.clear().unwrap();
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.current_index(), None);
        assert_eq!(queue.mode(), PlayMode::Repeat);
    }

    #[test]
    fn test_set_queue_rejects_bad_start_index() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a"], 0, PlayMode::Sequence);

        let result = queue.set_queue(vec![track("x"), track("y")], 2);
        assert!(matches!(result, Err(Error::InvalidIndex { index: 2, len: 2 })));
        assert_eq!(queue.current().unwrap().id, "a");
    }

    #[test]
    fn test_set_queue_empty_clears_pointer() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a", "b"], 1, PlayMode::Sequence);

        queue.set_queue(Vec::new(), 0).unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn test_set_current_index_bounds() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a", "b"], 0, PlayMode::Sequence);

        assert_eq!(queue.set_current_index(1).unwrap().id, "b");
        assert!(matches!(
            queue.set_current_index(2),
            Err(Error::InvalidIndex { index: 2, len: 2 })
        ));
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_set_volume_clamps() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a"], 0, PlayMode::Sequence);

        assert_eq!(queue.set_volume(130).unwrap(), 100);
        assert_eq!(queue.set_volume(-1).unwrap(), 0);
        assert_eq!(queue.volume(), 0);
    }

    #[test]
    fn test_sequence_previous_clamps_at_zero() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a", "b", "c"], 1, PlayMode::Sequence);

        assert_eq!(queue.previous().unwrap().unwrap().id, "a");
        assert_eq!(queue.previous().unwrap().unwrap().id, "a");
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn test_repeat_previous_wraps() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a", "b", "c"], 0, PlayMode::Repeat);

        assert_eq!(queue.previous().unwrap().unwrap().id, "c");
        assert_eq!(queue.current_index(), Some(2));
    }

    #[test]
    fn test_single_previous_matches_next() {
        let dir = TempDir::new().unwrap();
        let mut queue = queue_with(&dir, &["a", "b", "c"], 1, PlayMode::Single);

        assert_eq!(queue.previous().unwrap().unwrap().id, "b");
        assert_eq!(queue.next().unwrap().unwrap().id, "b");
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_navigation_without_current_track() {
        let dir = TempDir::new().unwrap();
        let mut queue = QueueManager::open(StateStore::new(dir.path().join("state.json")));
        queue.add_all(vec![track("a"), track("b"), track("c")]).unwrap();

        assert_eq!(queue.next().unwrap().unwrap().id, "a");

        queue.set_queue(vec![track("a"), track("b"), track("c")], 0).unwrap();
        queue.set_mode(PlayMode::Repeat).unwrap();
        queue.clear().unwrap();
        queue.add_all(vec![track("a"), track("b"), track("c")]).unwrap();
        assert_eq!(queue.previous().unwrap().unwrap().id, "c");
    }

    #[test]
    fn test_empty_queue_navigation_is_none() {
        let dir = TempDir::new().unwrap();
        let mut queue = QueueManager::open(StateStore::new(dir.path().join("state.json")));
        for mode in PlayMode::ALL {
            queue.set_mode(mode).unwrap();
            assert!(queue.next().unwrap().is_none());
            assert!(queue.previous().unwrap().is_none());
            assert_eq!(queue.current_index(), None);
        }
    }

    #[test]
    fn test_mutations_write_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut queue = queue_with(&dir, &["a", "b", "c"], 0, PlayMode::Sequence);

        queue.next().unwrap();
        let on_disk = StateStore::new(&path).load();
        assert_eq!(on_disk.current_index, Some(1));

        queue.set_volume(33).unwrap();
        assert_eq!(StateStore::new(&path).load().volume, 33);
    }

    #[test]
    fn test_reload_discards_unsaved_view() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut first = queue_with(&dir, &["a", "b"], 0, PlayMode::Sequence);

        // A second process instance changes the same store
        let mut second = QueueManager::open(StateStore::new(&path));
        second.add(track("c")).unwrap();
        second.set_mode(PlayMode::Shuffle).unwrap();

        assert_eq!(first.len(), 2);
        first.reload();
        assert_eq!(first.len(), 3);
        assert_eq!(first.mode(), PlayMode::Shuffle);
    }

    #[test]
    fn test_failed_save_leaves_state_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut queue = queue_with(&dir, &["a", "b", "c"], 0, PlayMode::Sequence);
        let before = queue.state().clone();

        // A directory in the way of the temp file makes every save fail
        std::fs::create_dir(dir.path().join("state.json.tmp")).unwrap();

        assert!(matches!(queue.next(), Err(Error::Persistence(_))));
        assert!(matches!(queue.previous(), Err(Error::Persistence(_))));
        assert!(matches!(queue.remove(0), Err(Error::Persistence(_))));
        assert!(matches!(queue.clear(), Err(Error::Persistence(_))));
        assert!(matches!(queue.add(track("d")), Err(Error::Persistence(_))));
        assert!(matches!(queue.set_mode(PlayMode::Repeat), Err(Error::Persistence(_))));
        assert!(matches!(queue.set_volume(5), Err(Error::Persistence(_))));
        assert!(matches!(queue.set_current_index(2), Err(Error::Persistence(_))));
        assert!(matches!(
            queue.set_queue(vec![track("x")], 0),
            Err(Error::Persistence(_))
        ));

        assert_eq!(queue.state(), &before);
        assert_eq!(StateStore::new(&path).load(), before);
    }
}
