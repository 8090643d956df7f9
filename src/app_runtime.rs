//! Application runtime bootstrap and the event loop.

use std::{rc::Rc, time::Duration};

use log::{info, warn};
use tokio::{
    sync::mpsc,
    time::{interval, MissedTickBehavior},
};

use crate::{
    app::{App, PlayFirstOutcome},
    audio::StreamingBackend,
    config::Config,
    config_persistence::{default_config_path, load_config},
    console::{present, present_tick, spawn_stdin_reader, HELP_TEXT},
    library::{album_label, artist_label, track_label},
    playback::{NowPlaying, PlaybackState, QueueMove, SeekOutcome},
    protocol::{UiEvent, UiUpdate},
    transport::UreqTransport,
};

/// Owns the client core and drives it from console events and the poll timer.
pub(crate) struct AppRuntime {
    app: App,
    poll_interval: Duration,
    last_seek_percent: Option<u8>,
}

impl AppRuntime {
    /// Loads config and wires the HTTP transport and audio backend.
    pub(crate) fn build() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = default_config_path();
        let config = match config_path.as_deref() {
            Some(path) => load_config(path),
            None => {
                warn!("No platform config directory. Settings will not be saved.");
                Config::default()
            }
        };
        let transport = UreqTransport::new(
            config.network.connect_timeout(),
            config.network.read_timeout(),
        );
        let media = StreamingBackend::new(transport.agent().clone());
        let poll_interval = Duration::from_millis(config.playback.poll_interval_ms);
        let app = App::new(config, config_path, Rc::new(transport), Box::new(media));
        Ok(Self::with_app(app, poll_interval))
    }

    pub(crate) fn with_app(app: App, poll_interval: Duration) -> Self {
        Self {
            app,
            poll_interval,
            last_seek_percent: None,
        }
    }

    pub(crate) fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        runtime.block_on(self.event_loop())
    }

    async fn event_loop(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let (event_sender, mut event_receiver) = mpsc::unbounded_channel();
        spawn_stdin_reader(event_sender)?;
        present(&self.startup());

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                maybe_event = event_receiver.recv() => {
                    match maybe_event {
                        Some(UiEvent::Quit) | None => break,
                        Some(event) => present(&self.handle_event(event)),
                    }
                }
                _ = ticker.tick() => {
                    present_tick(&self.on_tick());
                }
            }
        }
        info!("AppRuntime: shutting down");
        Ok(())
    }

    /// Auto-connects with saved credentials and loads the artist list.
    pub(crate) fn startup(&mut self) -> Vec<UiUpdate> {
        match self.app.auto_connect() {
            Some(true) => {
                let mut updates = vec![UiUpdate::Notice("Auto-connected to Navidrome.".to_string())];
                updates.extend(self.handle_event(UiEvent::LoadArtists));
                updates
            }
            Some(false) => vec![UiUpdate::Notice(
                "Ping failed. Manual login may be required.".to_string(),
            )],
            None => vec![UiUpdate::Notice(
                "Not connected. Use: connect <server> <username> <password>".to_string(),
            )],
        }
    }

    pub(crate) fn handle_event(&mut self, event: UiEvent) -> Vec<UiUpdate> {
        let result = match event {
            UiEvent::Connect {
                server,
                username,
                password,
            } => self.app.connect(&server, &username, &password).map(|()| {
                let mut updates = vec![UiUpdate::Notice(
                    "Successfully connected to Navidrome!".to_string(),
                )];
                updates.extend(self.handle_event(UiEvent::LoadArtists));
                updates
            }),
            UiEvent::LoadArtists => self
                .app
                .list_artists()
                .map(|artists| vec![UiUpdate::ArtistList(artists.iter().map(artist_label).collect())]),
            UiEvent::SelectArtist(index) => self
                .app
                .select_artist(index)
                .map(|albums| vec![UiUpdate::AlbumList(albums.iter().map(album_label).collect())]),
            UiEvent::OpenAlbum(index) => self.app.open_album(index).map(|album| {
                vec![UiUpdate::TrackList(
                    album.tracks.iter().map(track_label).collect(),
                )]
            }),
            UiEvent::PlayFirst => self.app.play_first().map(|outcome| match outcome {
                PlayFirstOutcome::Started(now_playing) => self.now_playing_updates(now_playing),
                PlayFirstOutcome::NoAlbums => notice("This artist has no albums."),
                PlayFirstOutcome::NoTracks => notice("This album has no tracks."),
            }),
            UiEvent::PlayTrack(index) => self
                .app
                .play_track(index)
                .map(|now_playing| self.now_playing_updates(now_playing)),
            UiEvent::Next => self.app.next().map(|step| self.queue_move_updates(step)),
            UiEvent::Previous => self.app.previous().map(|step| self.queue_move_updates(step)),
            UiEvent::TogglePlayPause => self
                .app
                .toggle_play_pause()
                .map(|state| vec![UiUpdate::State(state)]),
            UiEvent::SeekPercent(percent) => {
                self.app.seek(percent).map(|outcome| match outcome {
                    SeekOutcome::Applied { .. } => {
                        let shown = percent.clamp(0.0, 100.0).round() as u8;
                        self.last_seek_percent = Some(shown);
                        vec![UiUpdate::SeekPercent(shown)]
                    }
                    SeekOutcome::LengthUnknown => notice("Track length is not known yet."),
                    SeekOutcome::NotPlaying => notice("Nothing is playing."),
                    SeekOutcome::Rejected => vec![UiUpdate::Error("invalid seek position".to_string())],
                })
            }
            UiEvent::Stop => self.app.stop().map(|()| {
                self.last_seek_percent = None;
                vec![UiUpdate::State(PlaybackState::Idle)]
            }),
            UiEvent::SetTheme(theme) => {
                self.app.set_theme(theme);
                Ok(notice(&format!("Theme set to {}.", theme.name())))
            }
            UiEvent::SetAffirmationStyle(style) => {
                self.app.set_affirmation_style(style);
                Ok(notice(&format!("Affirmation style set to: {}", style.name())))
            }
            UiEvent::ToggleOffline => {
                let status = if self.app.toggle_offline() {
                    "enabled"
                } else {
                    "disabled"
                };
                Ok(notice(&format!("Offline mode {status}.")))
            }
            UiEvent::Status => Ok(self.status_updates()),
            UiEvent::Help => Ok(notice(HELP_TEXT)),
            UiEvent::Quit => Ok(Vec::new()),
        };
        result.unwrap_or_else(|err| vec![UiUpdate::Error(err.to_string())])
    }

    /// Auto-advance plus seek-bar refresh; the percentage is only reported
    /// when it changes.
    pub(crate) fn on_tick(&mut self) -> Vec<UiUpdate> {
        let mut updates = match self.app.poll() {
            Ok(Some(step)) => self.queue_move_updates(step),
            Ok(None) => Vec::new(),
            Err(err) => vec![UiUpdate::Error(err.to_string())],
        };
        if let Some(percent) = self.app.position().percent() {
            if self.last_seek_percent != Some(percent) {
                self.last_seek_percent = Some(percent);
                updates.push(UiUpdate::SeekPercent(percent));
            }
        }
        updates
    }

    fn status_updates(&self) -> Vec<UiUpdate> {
        let mut updates = Vec::new();
        if !self.app.is_connected() {
            updates.extend(notice("Not connected to a server."));
        }
        if self.app.config().server.offline {
            updates.extend(notice("Offline mode is on."));
        }
        let playback = self.app.playback();
        match playback.now_playing() {
            Some(now_playing) => {
                updates.push(UiUpdate::NowPlaying(now_playing.text.clone()));
                let queue = playback.queue();
                if let Some(cursor) = queue.cursor() {
                    updates.extend(notice(&format!("Track {} of {}.", cursor + 1, queue.len())));
                }
            }
            None => updates.extend(notice("Nothing is playing.")),
        }
        updates.push(UiUpdate::State(playback.state()));
        if let Some(percent) = self.app.position().percent() {
            updates.push(UiUpdate::SeekPercent(percent));
        }
        updates
    }

    fn now_playing_updates(&mut self, now_playing: NowPlaying) -> Vec<UiUpdate> {
        self.last_seek_percent = None;
        vec![
            UiUpdate::NowPlaying(now_playing.text),
            UiUpdate::Cover(now_playing.cover),
            UiUpdate::State(PlaybackState::Playing),
        ]
    }

    fn queue_move_updates(&mut self, step: QueueMove) -> Vec<UiUpdate> {
        match step {
            QueueMove::Started(now_playing) => self.now_playing_updates(now_playing),
            QueueMove::EndOfQueue => {
                let mut updates = notice("End of playlist.");
                updates.push(UiUpdate::State(self.app.playback().state()));
                updates
            }
            QueueMove::StartOfQueue => notice("Already at the first track."),
            QueueMove::Empty => notice("Nothing queued."),
        }
    }
}

fn notice(text: &str) -> Vec<UiUpdate> {
    vec![UiUpdate::Notice(text.to_string())]
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::AppRuntime;
    use crate::app::App;
    use crate::config::{Config, Theme};
    use crate::cover_art::CoverArt;
    use crate::playback::fake::{FakeMediaBackend, FakeMediaState};
    use crate::playback::PlaybackState;
    use crate::protocol::{UiEvent, UiUpdate};
    use crate::transport::fake::FakeTransport;

    fn runtime_with_albums(
        config: Config,
        albums: Value,
    ) -> (AppRuntime, Rc<FakeTransport>, Rc<FakeMediaState>) {
        let transport = Rc::new(
            FakeTransport::new()
                .with_ok("ping", json!({}))
                .with_ok(
                    "getArtists",
                    json!({"artists": {"index": [{"name": "A", "artist": [
                        {"id": "ar-1", "name": "Air", "albumCount": 1}
                    ]}]}}),
                )
                .with_ok(
                    "getArtist",
                    json!({"artist": {"id": "ar-1", "name": "Air", "album": albums}}),
                )
                .with_ok(
                    "getAlbum",
                    json!({"album": {"id": "al-1", "name": "Talkie Walkie", "artist": "Air",
                        "song": [
                            {"id": "t-1", "title": "Venus"},
                            {"id": "t-2", "title": "Cherry Blossom Girl"}
                        ]}}),
                ),
        );
        let (backend, media) = FakeMediaBackend::new();
        let app = App::new(config, None, transport.clone(), Box::new(backend));
        (
            AppRuntime::with_app(app, Duration::from_millis(500)),
            transport,
            media,
        )
    }

    fn runtime(config: Config) -> (AppRuntime, Rc<FakeTransport>, Rc<FakeMediaState>) {
        runtime_with_albums(config, json!([{"id": "al-1", "name": "Talkie Walkie"}]))
    }

    fn saved_credentials() -> Config {
        let mut config = Config::default();
        config.server.server = "music.local".to_string();
        config.server.username = "alice".to_string();
        config.server.password = "pw".to_string();
        config
    }

    #[test]
    fn test_startup_without_credentials_prompts_for_login() {
        let (mut runtime, transport, _) = runtime(Config::default());
        let updates = runtime.startup();
        assert!(matches!(updates.as_slice(), [UiUpdate::Notice(text)] if text.contains("connect")));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_startup_auto_connects_and_lists_artists() {
        let (mut runtime, transport, _) = runtime(saved_credentials());
        let updates = runtime.startup();
        assert_eq!(
            updates.last(),
            Some(&UiUpdate::ArtistList(vec!["Air  •  1 album".to_string()]))
        );
        assert_eq!(transport.requested_methods(), vec!["ping", "getArtists"]);
    }

    #[test]
    fn test_errors_become_error_updates() {
        let (mut runtime, _, _) = runtime(Config::default());
        assert_eq!(
            runtime.handle_event(UiEvent::LoadArtists),
            vec![UiUpdate::Error("not connected to a server".to_string())]
        );
        assert_eq!(
            runtime.handle_event(UiEvent::Next),
            vec![UiUpdate::Error("not connected to a server".to_string())]
        );
    }

    #[test]
    fn test_artist_without_albums_reports_notice() {
        let (mut runtime, _, media) = runtime_with_albums(saved_credentials(), json!([]));
        runtime.startup();
        assert_eq!(
            runtime.handle_event(UiEvent::SelectArtist(0)),
            vec![UiUpdate::AlbumList(Vec::new())]
        );
        assert_eq!(
            runtime.handle_event(UiEvent::PlayFirst),
            vec![UiUpdate::Notice("This artist has no albums.".to_string())]
        );
        assert!(media.opened_urls.borrow().is_empty());
    }

    #[test]
    fn test_play_first_then_walk_and_finish() {
        let (mut runtime, _, media) = runtime(saved_credentials());
        runtime.startup();
        assert_eq!(
            runtime.handle_event(UiEvent::SelectArtist(0)),
            vec![UiUpdate::AlbumList(vec!["Talkie Walkie".to_string()])]
        );
        assert_eq!(
            runtime.handle_event(UiEvent::PlayFirst),
            vec![
                UiUpdate::NowPlaying("Now Playing: Venus — Air".to_string()),
                UiUpdate::Cover(CoverArt::Placeholder),
                UiUpdate::State(PlaybackState::Playing),
            ]
        );
        assert_eq!(
            runtime.handle_event(UiEvent::Previous),
            vec![UiUpdate::Notice("Already at the first track.".to_string())]
        );
        assert_eq!(
            runtime.handle_event(UiEvent::Next)[0],
            UiUpdate::NowPlaying("Now Playing: Cherry Blossom Girl — Air".to_string())
        );

        media.finished.set(true);
        assert_eq!(
            runtime.on_tick(),
            vec![
                UiUpdate::Notice("End of playlist.".to_string()),
                UiUpdate::State(PlaybackState::Stopped),
            ]
        );
        assert_eq!(media.live_handles.get(), 0);
    }

    #[test]
    fn test_tick_reports_seek_percent_only_on_change() {
        let (mut runtime, _, media) = runtime(saved_credentials());
        runtime.startup();
        runtime.handle_event(UiEvent::SelectArtist(0));
        runtime.handle_event(UiEvent::OpenAlbum(0));
        runtime.handle_event(UiEvent::PlayTrack(0));
        media.length_ms.set(Some(100_000));
        media.last_position_ms.set(25_000);
        assert_eq!(runtime.on_tick(), vec![UiUpdate::SeekPercent(25)]);
        assert!(runtime.on_tick().is_empty());
        media.last_position_ms.set(26_000);
        assert_eq!(runtime.on_tick(), vec![UiUpdate::SeekPercent(26)]);

        assert_eq!(
            runtime.handle_event(UiEvent::SeekPercent(80.0)),
            vec![UiUpdate::SeekPercent(80)]
        );
        assert!(runtime.on_tick().is_empty());
        assert_eq!(media.last_position_ms.get(), 80_000);
    }

    #[test]
    fn test_explicit_seek_reports_exact_percent() {
        let (mut runtime, _, media) = runtime(saved_credentials());
        runtime.startup();
        runtime.handle_event(UiEvent::SelectArtist(0));
        runtime.handle_event(UiEvent::PlayFirst);
        media.length_ms.set(Some(100_000));
        assert_eq!(
            runtime.handle_event(UiEvent::SeekPercent(37.0)),
            vec![UiUpdate::SeekPercent(37)]
        );
        assert_eq!(media.last_position_ms.get(), 37_000);
    }

    #[test]
    fn test_seek_without_length_is_explained() {
        let (mut runtime, _, media) = runtime(saved_credentials());
        runtime.startup();
        assert_eq!(
            runtime.handle_event(UiEvent::SeekPercent(10.0)),
            vec![UiUpdate::Notice("Nothing is playing.".to_string())]
        );
        runtime.handle_event(UiEvent::SelectArtist(0));
        runtime.handle_event(UiEvent::PlayFirst);
        media.length_ms.set(None);
        assert_eq!(
            runtime.handle_event(UiEvent::SeekPercent(10.0)),
            vec![UiUpdate::Notice("Track length is not known yet.".to_string())]
        );
    }

    #[test]
    fn test_status_reports_current_track() {
        let (mut runtime, _, media) = runtime(saved_credentials());
        runtime.startup();
        assert_eq!(
            runtime.handle_event(UiEvent::Status),
            vec![
                UiUpdate::Notice("Nothing is playing.".to_string()),
                UiUpdate::State(PlaybackState::Idle),
            ]
        );
        runtime.handle_event(UiEvent::SelectArtist(0));
        runtime.handle_event(UiEvent::PlayFirst);
        runtime.handle_event(UiEvent::TogglePlayPause);
        media.length_ms.set(Some(200_000));
        media.last_position_ms.set(100_000);
        assert_eq!(
            runtime.handle_event(UiEvent::Status),
            vec![
                UiUpdate::NowPlaying("Now Playing: Venus — Air".to_string()),
                UiUpdate::Notice("Track 1 of 2.".to_string()),
                UiUpdate::State(PlaybackState::Paused),
                UiUpdate::SeekPercent(50),
            ]
        );
    }

    #[test]
    fn test_status_mentions_missing_connection_and_offline_mode() {
        let (mut runtime, _, _) = runtime(Config::default());
        runtime.handle_event(UiEvent::ToggleOffline);
        assert_eq!(
            runtime.handle_event(UiEvent::Status),
            vec![
                UiUpdate::Notice("Not connected to a server.".to_string()),
                UiUpdate::Notice("Offline mode is on.".to_string()),
                UiUpdate::Notice("Nothing is playing.".to_string()),
                UiUpdate::State(PlaybackState::Idle),
            ]
        );
    }

    #[test]
    fn test_settings_events_produce_notices() {
        let (mut runtime, _, _) = runtime(Config::default());
        assert_eq!(
            runtime.handle_event(UiEvent::SetTheme(Theme::Focused)),
            vec![UiUpdate::Notice("Theme set to focused.".to_string())]
        );
        assert_eq!(
            runtime.handle_event(UiEvent::ToggleOffline),
            vec![UiUpdate::Notice("Offline mode enabled.".to_string())]
        );
        assert_eq!(runtime.app.config().ui.theme, Theme::Focused);
    }

    #[test]
    fn test_tick_without_playback_is_quiet() {
        let (mut runtime, _, media) = runtime(saved_credentials());
        runtime.startup();
        assert!(runtime.on_tick().is_empty());
        assert!(media.opened_urls.borrow().is_empty());
    }
}
