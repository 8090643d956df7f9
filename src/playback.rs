//! Playback session: binds the queue cursor to a single live stream handle.

use log::{debug, info, warn};

use crate::{
    api::ApiClient,
    cover_art::{resolve_cover_art, CoverArt},
    error::ClientError,
    library::now_playing_text,
    model::{Track, UNKNOWN_ALBUM},
    queue::{PlaybackQueue, QueueBoundary},
};

/// One in-progress audio playback instance.
pub trait StreamHandle {
    fn play(&mut self) -> Result<(), ClientError>;
    fn pause(&mut self) -> Result<(), ClientError>;
    /// Moves playback to `position_ms`, clamped to what is available.
    fn set_position_ms(&mut self, position_ms: u64);
    fn position_ms(&self) -> Option<u64>;
    /// `None` while the total length is not yet known.
    fn length_ms(&self) -> Option<u64>;
    /// True once the whole stream has been rendered.
    fn is_finished(&self) -> bool;
    /// Stops output and frees the underlying resources.
    fn release(&mut self) -> Result<(), ClientError>;
}

/// Opens stream handles for signed media URLs.
pub trait MediaBackend {
    fn open(&mut self, url: &str) -> Result<Box<dyn StreamHandle>, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Stopped,
}

/// What the presentation layer shows for the current track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub track: Track,
    pub text: String,
    pub cover: CoverArt,
}

/// Position report for the seek indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPosition {
    /// No handle, or the length is momentarily unavailable.
    Unknown,
    Known { position_ms: u64, length_ms: u64 },
}

impl PlaybackPosition {
    /// Seek-bar percentage, 0 to 100.
    pub fn percent(&self) -> Option<u8> {
        match *self {
            Self::Known {
                position_ms,
                length_ms,
            } if length_ms > 0 => Some((position_ms.min(length_ms) * 100 / length_ms) as u8),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    Applied { position_ms: u64 },
    /// Length is zero or not yet reported by the stream.
    LengthUnknown,
    /// No track is playing or paused.
    NotPlaying,
    /// Fraction was NaN or infinite.
    Rejected,
}

/// Result of a next/previous request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueMove {
    Started(NowPlaying),
    EndOfQueue,
    StartOfQueue,
    Empty,
}

impl From<QueueBoundary> for QueueMove {
    fn from(boundary: QueueBoundary) -> Self {
        match boundary {
            QueueBoundary::End => Self::EndOfQueue,
            QueueBoundary::Start => Self::StartOfQueue,
            QueueBoundary::Empty => Self::Empty,
        }
    }
}

pub struct PlaybackSession {
    backend: Box<dyn MediaBackend>,
    queue: PlaybackQueue,
    handle: Option<Box<dyn StreamHandle>>,
    state: PlaybackState,
    now_playing: Option<NowPlaying>,
    cover_id: Option<String>,
}

impl PlaybackSession {
    pub fn new(backend: Box<dyn MediaBackend>) -> Self {
        Self {
            backend,
            queue: PlaybackQueue::new(),
            handle: None,
            state: PlaybackState::Idle,
            now_playing: None,
            cover_id: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    /// Loads `tracks` as the new queue and starts the one at `index`.
    ///
    /// An out-of-range `index` is rejected before anything changes, so the
    /// current queue and stream stay as they were.
    pub fn play_queue(
        &mut self,
        api: &ApiClient,
        tracks: Vec<Track>,
        index: usize,
        cover_id: Option<&str>,
    ) -> Result<NowPlaying, ClientError> {
        let track = tracks.get(index).cloned().ok_or(ClientError::Selection {
            kind: "track",
            index,
        })?;
        self.queue.load(tracks);
        self.queue.select(index);
        debug!("Playback: queued {} tracks", self.queue.len());
        self.start(api, track, cover_id)
    }

    /// Releases any live handle, then opens and plays `track`.
    ///
    /// The queue cursor follows the track when it is part of the queue.
    pub fn start(
        &mut self,
        api: &ApiClient,
        track: Track,
        cover_id: Option<&str>,
    ) -> Result<NowPlaying, ClientError> {
        self.release_handle();
        self.state = PlaybackState::Stopped;
        self.now_playing = None;
        self.cover_id = cover_id.map(ToOwned::to_owned);
        let is_current = self
            .queue
            .current()
            .is_some_and(|current| current.id == track.id);
        if !is_current {
            if let Some(index) = self.queue.find_index(&track.id) {
                self.queue.select(index);
            }
        }

        let url = api.stream_url(&track.id);
        let mut handle = self.backend.open(&url)?;
        if let Err(err) = handle.play() {
            if let Err(release_err) = handle.release() {
                debug!("Playback: release after failed start: {}", release_err);
            }
            return Err(err);
        }
        self.handle = Some(handle);
        self.state = PlaybackState::Playing;
        info!(
            "Playback: started '{}' from '{}' ({})",
            track.title,
            track.album.as_deref().unwrap_or(UNKNOWN_ALBUM),
            track.id
        );

        let now_playing = NowPlaying {
            text: now_playing_text(&track),
            cover: resolve_cover_art(api, cover_id),
            track,
        };
        self.now_playing = Some(now_playing.clone());
        Ok(now_playing)
    }

    /// Playing ⇄ Paused; no-op from Idle or Stopped.
    pub fn toggle_play_pause(&mut self) -> Result<PlaybackState, ClientError> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(self.state);
        };
        match self.state {
            PlaybackState::Playing => {
                handle.pause()?;
                self.state = PlaybackState::Paused;
            }
            PlaybackState::Paused => {
                handle.play()?;
                self.state = PlaybackState::Playing;
            }
            PlaybackState::Idle | PlaybackState::Stopped => {}
        }
        Ok(self.state)
    }

    pub fn stop(&mut self) {
        self.release_handle();
        self.now_playing = None;
        self.state = PlaybackState::Idle;
    }

    /// Jumps to `fraction` of the track length; the fraction is clamped to [0, 1].
    pub fn seek(&mut self, fraction: f64) -> SeekOutcome {
        if !fraction.is_finite() {
            return SeekOutcome::Rejected;
        }
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            return SeekOutcome::NotPlaying;
        }
        let Some(handle) = self.handle.as_mut() else {
            return SeekOutcome::NotPlaying;
        };
        let Some(length_ms) = handle.length_ms().filter(|length| *length > 0) else {
            return SeekOutcome::LengthUnknown;
        };
        let position_ms = (fraction.clamp(0.0, 1.0) * length_ms as f64).round() as u64;
        handle.set_position_ms(position_ms);
        SeekOutcome::Applied { position_ms }
    }

    pub fn poll_position(&self) -> PlaybackPosition {
        let Some(handle) = self.handle.as_ref() else {
            return PlaybackPosition::Unknown;
        };
        match (handle.position_ms(), handle.length_ms()) {
            (Some(position_ms), Some(length_ms)) if length_ms > 0 => PlaybackPosition::Known {
                position_ms: position_ms.min(length_ms),
                length_ms,
            },
            _ => PlaybackPosition::Unknown,
        }
    }

    pub fn next(&mut self, api: &ApiClient) -> Result<QueueMove, ClientError> {
        let track = match self.queue.advance() {
            Ok(track) => track.clone(),
            Err(boundary) => return Ok(boundary.into()),
        };
        self.start_queued(api, track)
    }

    pub fn previous(&mut self, api: &ApiClient) -> Result<QueueMove, ClientError> {
        let track = match self.queue.retreat() {
            Ok(track) => track.clone(),
            Err(boundary) => return Ok(boundary.into()),
        };
        self.start_queued(api, track)
    }

    /// Moves on when the live stream has ended; releases it when nothing follows.
    pub fn advance_if_finished(&mut self, api: &ApiClient) -> Result<Option<QueueMove>, ClientError> {
        let finished = self.state == PlaybackState::Playing
            && self.handle.as_ref().is_some_and(|handle| handle.is_finished());
        if !finished {
            return Ok(None);
        }
        match self.next(api)? {
            QueueMove::Started(now_playing) => Ok(Some(QueueMove::Started(now_playing))),
            boundary => {
                info!("Playback: reached end of queue");
                self.release_handle();
                self.state = PlaybackState::Stopped;
                Ok(Some(boundary))
            }
        }
    }

    fn start_queued(&mut self, api: &ApiClient, track: Track) -> Result<QueueMove, ClientError> {
        let cover_id = self.cover_id.clone();
        self.start(api, track, cover_id.as_deref())
            .map(QueueMove::Started)
    }

    fn release_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Err(err) = handle.release() {
                warn!("Playback: ignoring error while releasing stream: {}", err);
            }
        }
    }
}
