//! Subsonic API calls and response-shape parsing.

use std::rc::Rc;

use log::{debug, warn};
use serde_json::Value;

use crate::{
    error::ClientError,
    model::{Album, Artist, ArtistDetail, ArtistGroup, Track, UNKNOWN_ALBUM, UNKNOWN_ARTIST},
    session::Session,
    transport::HttpTransport,
};

const ENVELOPE_KEY: &str = "subsonic-response";

/// Issues signed calls for one [`Session`].
///
/// Cloning shares the transport; the session itself is never modified.
#[derive(Clone)]
pub struct ApiClient {
    session: Rc<Session>,
    transport: Rc<dyn HttpTransport>,
}

impl ApiClient {
    pub fn new(session: Session, transport: Rc<dyn HttpTransport>) -> Self {
        Self {
            session: Rc::new(session),
            transport,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn fetch_envelope(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, ClientError> {
        let url = self.session.api_url(method, params);
        debug!("API: GET {method}");
        let payload = self
            .transport
            .get_json(&url)
            .map_err(|err| with_method_context(method, err))?;
        match payload {
            Value::Object(mut root) => root
                .remove(ENVELOPE_KEY)
                .filter(Value::is_object)
                .ok_or_else(|| ClientError::protocol(method, "missing subsonic-response envelope")),
            _ => Err(ClientError::protocol(method, "response is not a JSON object")),
        }
    }

    fn request(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, ClientError> {
        let envelope = self.fetch_envelope(method, params)?;
        if envelope_status_ok(&envelope) {
            return Ok(envelope);
        }
        Err(ClientError::protocol(method, envelope_error_text(&envelope)))
    }

    /// Checks reachability and credential acceptance.
    pub fn ping(&self) -> Result<bool, ClientError> {
        let envelope = self.fetch_envelope("ping", &[])?;
        if envelope_status_ok(&envelope) {
            return Ok(true);
        }
        warn!("API: ping rejected: {}", envelope_error_text(&envelope));
        Ok(false)
    }

    /// Lists artists grouped into the server's alphabetic index buckets.
    pub fn list_artists(&self) -> Result<Vec<ArtistGroup>, ClientError> {
        let envelope = self.request("getArtists", &[])?;
        let artists = envelope
            .get("artists")
            .ok_or_else(|| ClientError::protocol("getArtists", "missing artists payload"))?;
        Ok(array_or_single(artists.get("index"))
            .into_iter()
            .map(parse_artist_group)
            .collect())
    }

    pub fn get_artist(&self, artist_id: &str) -> Result<ArtistDetail, ClientError> {
        let envelope = self.request("getArtist", &[("id", artist_id)])?;
        let artist = envelope
            .get("artist")
            .ok_or_else(|| ClientError::protocol("getArtist", "missing artist payload"))?;
        Ok(parse_artist_detail(artist, artist_id))
    }

    pub fn get_album(&self, album_id: &str) -> Result<Album, ClientError> {
        let envelope = self.request("getAlbum", &[("id", album_id)])?;
        let album = envelope
            .get("album")
            .ok_or_else(|| ClientError::protocol("getAlbum", "missing album payload"))?;
        Ok(parse_album(album, album_id))
    }

    /// Signed media URL; fetching it is left to the playback layer.
    pub fn stream_url(&self, track_id: &str) -> String {
        self.session.api_url("stream", &[("id", track_id)])
    }

    pub fn cover_art_url(&self, cover_id: &str) -> String {
        self.session.api_url("getCoverArt", &[("id", cover_id)])
    }

    /// Downloads raw cover image bytes.
    pub fn fetch_cover_art(&self, cover_id: &str) -> Result<Vec<u8>, ClientError> {
        self.transport
            .get_bytes(&self.cover_art_url(cover_id))
            .map_err(|err| with_method_context("getCoverArt", err))
    }
}

fn with_method_context(method: &str, err: ClientError) -> ClientError {
    match err {
        ClientError::Transport(detail) => {
            ClientError::Transport(format!("{method} request failed: {detail}"))
        }
        ClientError::Protocol(detail) => ClientError::protocol(method, detail),
        other => other,
    }
}

fn envelope_status_ok(envelope: &Value) -> bool {
    envelope.get("status").and_then(Value::as_str) == Some("ok")
}

fn envelope_error_text(envelope: &Value) -> String {
    let error = envelope.get("error");
    let message = error
        .and_then(|value| value.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("server returned an error");
    match error.and_then(|value| value.get("code")).and_then(Value::as_i64) {
        Some(code) => format!("server error {code}: {message}"),
        None => message.to_string(),
    }
}

/// Subsonic JSON collapses one-element lists into a bare object.
fn array_or_single(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

/// Reads a string or numeric field as trimmed non-empty text.
fn text_field(value: &Value, key: &str) -> Option<String> {
    let field = value.get(key)?;
    let text = match field {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn u32_field(value: &Value, key: &str) -> Option<u32> {
    let field = value.get(key)?;
    field
        .as_u64()
        .or_else(|| field.as_str().and_then(|text| text.trim().parse().ok()))
        .map(|number| number.min(u64::from(u32::MAX)) as u32)
}

fn parse_artist_group(group: &Value) -> ArtistGroup {
    ArtistGroup {
        label: text_field(group, "name").unwrap_or_default(),
        artists: array_or_single(group.get("artist"))
            .into_iter()
            .filter_map(parse_artist)
            .collect(),
    }
}

fn parse_artist(artist: &Value) -> Option<Artist> {
    Some(Artist {
        id: text_field(artist, "id")?,
        name: text_field(artist, "name").unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        album_count: u32_field(artist, "albumCount").unwrap_or(0),
    })
}

fn parse_artist_detail(artist: &Value, requested_id: &str) -> ArtistDetail {
    let albums: Vec<Album> = array_or_single(artist.get("album"))
        .into_iter()
        .filter_map(|album| {
            let album_id = text_field(album, "id")?;
            Some(parse_album(album, &album_id))
        })
        .collect();
    let album_count = u32_field(artist, "albumCount").unwrap_or(albums.len() as u32);
    ArtistDetail {
        artist: Artist {
            id: text_field(artist, "id").unwrap_or_else(|| requested_id.to_string()),
            name: text_field(artist, "name").unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            album_count,
        },
        albums,
    }
}

fn parse_album(album: &Value, requested_id: &str) -> Album {
    let artist = text_field(album, "artist");
    let title = text_field(album, "name")
        .or_else(|| text_field(album, "title"))
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
    let tracks = array_or_single(album.get("song"))
        .into_iter()
        .filter_map(|song| parse_track(song, artist.as_deref(), &title))
        .collect();
    Album {
        id: text_field(album, "id").unwrap_or_else(|| requested_id.to_string()),
        title,
        artist,
        cover_art_id: text_field(album, "coverArt"),
        tracks,
    }
}

fn parse_track(song: &Value, album_artist: Option<&str>, album_title: &str) -> Option<Track> {
    let id = text_field(song, "id")?;
    Some(Track {
        title: text_field(song, "title").unwrap_or_else(|| format!("Track {id}")),
        artist: text_field(song, "artist").or_else(|| album_artist.map(ToOwned::to_owned)),
        album: text_field(song, "album").or_else(|| Some(album_title.to_string())),
        duration_secs: u32_field(song, "duration"),
        id,
    })
}
