//! Library entities returned by the server.

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub album_count: u32,
}

/// One alphabetic index bucket of the artist listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistGroup {
    pub label: String,
    pub artists: Vec<Artist>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistDetail {
    pub artist: Artist,
    pub albums: Vec<Album>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub cover_art_id: Option<String>,
    /// Empty for album summaries embedded in an artist listing.
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    /// Falls back to the album artist when the song carries none.
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: Option<u32>,
}

#[cfg(test)]
impl Track {
    /// Creates a bare track with only an id and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            album: None,
            duration_secs: None,
        }
    }
}
