//! Messages exchanged between the presentation layer and the client core.

use crate::{
    config::{AffirmationStyle, Theme},
    cover_art::CoverArt,
    playback::PlaybackState,
};

/// Presentation → core requests. Indices are positions in the last list shown.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Connect {
        server: String,
        username: String,
        password: String,
    },
    LoadArtists,
    SelectArtist(usize),
    OpenAlbum(usize),
    /// Play the first album of the selected artist from its first track.
    PlayFirst,
    /// Play a track of the open album.
    PlayTrack(usize),
    Next,
    Previous,
    TogglePlayPause,
    /// Seek-bar position, 0 to 100.
    SeekPercent(f64),
    Stop,
    SetTheme(Theme),
    SetAffirmationStyle(AffirmationStyle),
    ToggleOffline,
    /// Report the current track, state and position.
    Status,
    Help,
    Quit,
}

/// Core → presentation notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    ArtistList(Vec<String>),
    AlbumList(Vec<String>),
    TrackList(Vec<String>),
    NowPlaying(String),
    Cover(CoverArt),
    SeekPercent(u8),
    State(PlaybackState),
    /// Informational message, e.g. "End of playlist".
    Notice(String),
    Error(String),
}
