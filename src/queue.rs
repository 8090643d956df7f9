//! Linear playback queue with a cursor.

use crate::model::Track;

/// Why the cursor could not move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBoundary {
    /// Already at the last track.
    End,
    /// Already at the first track.
    Start,
    /// Nothing loaded.
    Empty,
}

/// Ordered tracks plus the index of the current one.
///
/// Invariant: `cursor` is `Some(i)` with `i < tracks.len()` whenever the queue
/// is non-empty, and `None` when it is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackQueue {
    tracks: Vec<Track>,
    cursor: Option<usize>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the queue wholesale and rewinds the cursor.
    pub fn load(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.cursor = (!self.is_empty()).then_some(0);
    }

    pub fn current(&self) -> Option<&Track> {
        self.cursor.and_then(|index| self.tracks.get(index))
    }

    /// Moves to the next track; stays put at the last one.
    pub fn advance(&mut self) -> Result<&Track, QueueBoundary> {
        let cursor = self.cursor.ok_or(QueueBoundary::Empty)?;
        if cursor + 1 >= self.tracks.len() {
            return Err(QueueBoundary::End);
        }
        self.cursor = Some(cursor + 1);
        Ok(&self.tracks[cursor + 1])
    }

    /// Moves to the previous track; stays put at the first one.
    pub fn retreat(&mut self) -> Result<&Track, QueueBoundary> {
        let cursor = self.cursor.ok_or(QueueBoundary::Empty)?;
        if cursor == 0 {
            return Err(QueueBoundary::Start);
        }
        self.cursor = Some(cursor - 1);
        Ok(&self.tracks[cursor - 1])
    }

    pub fn find_index(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|track| track.id == track_id)
    }

    /// Repositions the cursor; out-of-range indices leave it unchanged.
    pub fn select(&mut self, index: usize) -> Option<&Track> {
        let track = self.tracks.get(index)?;
        self.cursor = Some(index);
        Some(track)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
