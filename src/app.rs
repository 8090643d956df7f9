//! Client core: owns the connection, library browser, playback session and
//! settings, and turns user actions into calls on them.

use std::path::PathBuf;
use std::rc::Rc;

use log::{info, warn};

use crate::{
    api::ApiClient,
    config::{AffirmationStyle, Config, Theme},
    config_persistence::persist_config_file,
    error::ClientError,
    library::LibraryBrowser,
    model::{Album, Artist},
    playback::{
        MediaBackend, NowPlaying, PlaybackPosition, PlaybackSession, PlaybackState, QueueMove,
        SeekOutcome,
    },
    session::Session,
    transport::HttpTransport,
};

/// What happened on a "play first" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayFirstOutcome {
    Started(NowPlaying),
    NoAlbums,
    NoTracks,
}

pub struct App {
    config: Config,
    config_path: Option<PathBuf>,
    transport: Rc<dyn HttpTransport>,
    connection: Option<ApiClient>,
    library: LibraryBrowser,
    playback: PlaybackSession,
}

impl App {
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        transport: Rc<dyn HttpTransport>,
        media: Box<dyn MediaBackend>,
    ) -> Self {
        Self {
            config,
            config_path,
            transport,
            connection: None,
            library: LibraryBrowser::new(),
            playback: PlaybackSession::new(media),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn playback(&self) -> &PlaybackSession {
        &self.playback
    }

    /// Connects with saved credentials, if any.
    ///
    /// The session is kept even when the ping fails so later actions can
    /// retry. Returns `None` without saved credentials, otherwise whether the
    /// ping succeeded.
    pub fn auto_connect(&mut self) -> Option<bool> {
        if !self.config.server.has_credentials() {
            return None;
        }
        let server = &self.config.server;
        let api = ApiClient::new(
            Session::new(
                &server.server,
                &server.username,
                &server.password,
                server.token_scheme().hasher(),
            ),
            self.transport.clone(),
        );
        let reachable = match api.ping() {
            Ok(true) => {
                info!("App: auto-connected to {}", api.session().base_address());
                true
            }
            Ok(false) => {
                warn!("App: ping failed, manual login may be required");
                false
            }
            Err(err) => {
                warn!("App: auto-connect error: {}", err);
                false
            }
        };
        self.connection = Some(api);
        Some(reachable)
    }

    /// Validates input, pings with a brand-new session and switches to it on
    /// success. A failed attempt leaves the previous connection in place.
    pub fn connect(
        &mut self,
        server: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        let server = server.trim();
        let username = username.trim();
        if server.is_empty() {
            return Err(ClientError::MissingField("server address"));
        }
        if username.is_empty() {
            return Err(ClientError::MissingField("username"));
        }
        if password.is_empty() {
            return Err(ClientError::MissingField("password"));
        }

        let api = ApiClient::new(
            Session::new(
                server,
                username,
                password,
                self.config.server.token_scheme().hasher(),
            ),
            self.transport.clone(),
        );
        if !api.ping()? {
            return Err(ClientError::protocol(
                "ping",
                "server rejected the credentials",
            ));
        }

        info!(
            "App: connected to {} as {}",
            api.session().base_address(),
            api.session().username()
        );
        self.config.server.server = api.session().base_address().to_string();
        self.config.server.username = username.to_string();
        self.config.server.password = password.to_string();
        self.connection = Some(api);
        self.library = LibraryBrowser::new();
        self.persist_config();
        Ok(())
    }

    pub fn list_artists(&mut self) -> Result<&[Artist], ClientError> {
        let api = self.connection.as_ref().ok_or(ClientError::NotConnected)?;
        self.library.refresh_artists(api)
    }

    pub fn select_artist(&mut self, index: usize) -> Result<&[Album], ClientError> {
        let api = self.connection.as_ref().ok_or(ClientError::NotConnected)?;
        self.library.select_artist(api, index)?;
        Ok(self.library.albums())
    }

    pub fn open_album(&mut self, index: usize) -> Result<&Album, ClientError> {
        let api = self.connection.as_ref().ok_or(ClientError::NotConnected)?;
        self.library.open_album(api, index)
    }

    /// Plays the selected artist's first album from its first track.
    pub fn play_first(&mut self) -> Result<PlayFirstOutcome, ClientError> {
        let api = self.connection.as_ref().ok_or(ClientError::NotConnected)?;
        if self.library.selected_artist().is_none() {
            return Err(ClientError::NoSelection("artist"));
        }
        if self.library.albums().is_empty() {
            return Ok(PlayFirstOutcome::NoAlbums);
        }
        let album = self.library.open_album(api, 0)?;
        if album.tracks.is_empty() {
            return Ok(PlayFirstOutcome::NoTracks);
        }
        let tracks = album.tracks.clone();
        let cover_id = album.cover_art_id.clone();
        self.playback
            .play_queue(api, tracks, 0, cover_id.as_deref())
            .map(PlayFirstOutcome::Started)
    }

    /// Plays a track of the open album, queueing the whole album.
    pub fn play_track(&mut self, index: usize) -> Result<NowPlaying, ClientError> {
        let api = self.connection.as_ref().ok_or(ClientError::NotConnected)?;
        let album = self
            .library
            .open_album_ref()
            .ok_or(ClientError::NoSelection("album"))?;
        let tracks = album.tracks.clone();
        let cover_id = album.cover_art_id.clone();
        self.playback
            .play_queue(api, tracks, index, cover_id.as_deref())
    }

    pub fn next(&mut self) -> Result<QueueMove, ClientError> {
        let api = self.connection.as_ref().ok_or(ClientError::NotConnected)?;
        self.playback.next(api)
    }

    pub fn previous(&mut self) -> Result<QueueMove, ClientError> {
        let api = self.connection.as_ref().ok_or(ClientError::NotConnected)?;
        self.playback.previous(api)
    }

    pub fn toggle_play_pause(&mut self) -> Result<PlaybackState, ClientError> {
        self.connection.as_ref().ok_or(ClientError::NotConnected)?;
        self.playback.toggle_play_pause()
    }

    /// Seeks to a seek-bar percentage, 0 to 100.
    pub fn seek(&mut self, percent: f64) -> Result<SeekOutcome, ClientError> {
        self.connection.as_ref().ok_or(ClientError::NotConnected)?;
        Ok(self.playback.seek(percent / 100.0))
    }

    pub fn stop(&mut self) -> Result<(), ClientError> {
        self.connection.as_ref().ok_or(ClientError::NotConnected)?;
        self.playback.stop();
        Ok(())
    }

    pub fn position(&self) -> PlaybackPosition {
        self.playback.poll_position()
    }

    /// Timer hook: moves on when the current stream has finished.
    pub fn poll(&mut self) -> Result<Option<QueueMove>, ClientError> {
        match self.connection.as_ref() {
            Some(api) => self.playback.advance_if_finished(api),
            None => Ok(None),
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.config.ui.theme = theme;
        self.persist_config();
    }

    pub fn set_affirmation_style(&mut self, style: AffirmationStyle) {
        self.config.ui.affirmation_style = style;
        self.persist_config();
    }

    /// Flips offline mode and returns the new value.
    pub fn toggle_offline(&mut self) -> bool {
        self.config.server.offline = !self.config.server.offline;
        self.persist_config();
        self.config.server.offline
    }

    fn persist_config(&self) {
        if let Some(path) = self.config_path.as_deref() {
            persist_config_file(&self.config, path);
        }
    }
}
