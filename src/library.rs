//! Library browsing: flattens server listings into display-ordered lists.

use log::debug;

use crate::{
    api::ApiClient,
    error::ClientError,
    model::{Album, Artist, ArtistGroup, Track},
};

/// Concatenates all groups' artists, keeping group and intra-group order.
pub fn flatten_artist_groups(groups: Vec<ArtistGroup>) -> Vec<Artist> {
    groups
        .into_iter()
        .flat_map(|group| {
            debug!("Library: index '{}' has {} artists", group.label, group.artists.len());
            group.artists
        })
        .collect()
}

/// `"Name  •  3 albums"` list label.
pub fn artist_label(artist: &Artist) -> String {
    let plural = if artist.album_count == 1 { "" } else { "s" };
    format!("{}  •  {} album{plural}", artist.name, artist.album_count)
}

pub fn album_label(album: &Album) -> String {
    match album.artist.as_deref() {
        Some(artist) => format!("{} ({artist})", album.title),
        None => album.title.clone(),
    }
}

pub fn track_label(track: &Track) -> String {
    match track.duration_secs {
        Some(seconds) => format!("{}  [{}]", track.title, format_duration(seconds)),
        None => track.title.clone(),
    }
}

pub fn now_playing_text(track: &Track) -> String {
    match track.artist.as_deref() {
        Some(artist) => format!("Now Playing: {} — {artist}", track.title),
        None => format!("Now Playing: {}", track.title),
    }
}

fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Browsing state: the flattened artist list, the selected artist's albums, and
/// the album currently open.
#[derive(Debug, Default)]
pub struct LibraryBrowser {
    artists: Vec<Artist>,
    selected_artist: Option<usize>,
    albums: Vec<Album>,
    open_album: Option<Album>,
}

impl LibraryBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the artist list from the server; clears any selection.
    pub fn refresh_artists(&mut self, api: &ApiClient) -> Result<&[Artist], ClientError> {
        let groups = api.list_artists()?;
        self.artists = flatten_artist_groups(groups);
        self.selected_artist = None;
        self.albums.clear();
        self.open_album = None;
        debug!("Library: loaded {} artists", self.artists.len());
        Ok(&self.artists)
    }

    /// Selects an artist by list position and loads their albums.
    pub fn select_artist(&mut self, api: &ApiClient, index: usize) -> Result<&Artist, ClientError> {
        let artist_id = self
            .artists
            .get(index)
            .map(|artist| artist.id.clone())
            .ok_or(ClientError::Selection {
                kind: "artist",
                index,
            })?;
        let detail = api.get_artist(&artist_id)?;
        debug!(
            "Library: '{}' has {} albums",
            detail.artist.name,
            detail.albums.len()
        );
        self.selected_artist = Some(index);
        self.albums = detail.albums;
        self.open_album = None;
        Ok(&self.artists[index])
    }

    /// Loads the full track list of one of the selected artist's albums.
    pub fn open_album(&mut self, api: &ApiClient, index: usize) -> Result<&Album, ClientError> {
        let album_id = self
            .albums
            .get(index)
            .map(|album| album.id.clone())
            .ok_or(ClientError::Selection {
                kind: "album",
                index,
            })?;
        let album = api.get_album(&album_id)?;
        Ok(&*self.open_album.insert(album))
    }

    pub fn selected_artist(&self) -> Option<&Artist> {
        self.selected_artist.and_then(|index| self.artists.get(index))
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn open_album_ref(&self) -> Option<&Album> {
        self.open_album.as_ref()
    }
}
