//! Line-oriented terminal front end: parses commands into [`UiEvent`]s and
//! renders [`UiUpdate`]s.

use std::io::BufRead;
use std::thread;

use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    config::{AffirmationStyle, Theme},
    cover_art::CoverArt,
    playback::PlaybackState,
    protocol::{UiEvent, UiUpdate},
};

pub const HELP_TEXT: &str = "\
Commands:
  connect <server> <username> <password>   log in to a server
  artists                                  load the artist list
  artist <n>                               select an artist, list albums
  album <n>                                open an album, list tracks
  first                                    play the selected artist's first album
  play <n>                                 play a track of the open album
  next | prev                              skip forward / back
  pause                                    toggle play / pause
  seek <0-100>                             jump to a position (percent)
  stop                                     stop playback
  theme <cozy|focused|ambient>             change theme
  style <gentle|playful|poetic>            change affirmation style
  offline                                  toggle offline mode
  status                                   show what is playing
  help                                     show this text
  quit                                     exit";

/// Parses one input line. Blank lines yield `Ok(None)`; list positions are
/// 1-based on input and 0-based in the returned event.
pub fn parse_command(line: &str) -> Result<Option<UiEvent>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let event = match command.to_ascii_lowercase().as_str() {
        "connect" => match args.as_slice() {
            [server, username, password] => UiEvent::Connect {
                server: server.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            },
            _ => return Err("usage: connect <server> <username> <password>".to_string()),
        },
        "artists" | "ls" => UiEvent::LoadArtists,
        "artist" => UiEvent::SelectArtist(position_arg(&args, "artist")?),
        "album" => UiEvent::OpenAlbum(position_arg(&args, "album")?),
        "first" => UiEvent::PlayFirst,
        "play" => UiEvent::PlayTrack(position_arg(&args, "play")?),
        "next" | "n" => UiEvent::Next,
        "prev" | "previous" | "p" => UiEvent::Previous,
        "pause" | "toggle" => UiEvent::TogglePlayPause,
        "seek" => {
            let percent = single_arg(&args, "seek <0-100>")?
                .parse::<f64>()
                .map_err(|_| "seek expects a number from 0 to 100".to_string())?;
            UiEvent::SeekPercent(percent)
        }
        "stop" => UiEvent::Stop,
        "theme" => {
            let name = single_arg(&args, "theme <cozy|focused|ambient>")?;
            UiEvent::SetTheme(
                Theme::from_name(name).ok_or_else(|| format!("unknown theme '{name}'"))?,
            )
        }
        "style" => {
            let name = single_arg(&args, "style <gentle|playful|poetic>")?;
            UiEvent::SetAffirmationStyle(
                AffirmationStyle::from_name(name)
                    .ok_or_else(|| format!("unknown affirmation style '{name}'"))?,
            )
        }
        "offline" => UiEvent::ToggleOffline,
        "status" => UiEvent::Status,
        "help" | "?" => UiEvent::Help,
        "quit" | "exit" | "q" => UiEvent::Quit,
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(Some(event))
}

fn single_arg<'a>(args: &[&'a str], usage: &str) -> Result<&'a str, String> {
    match args {
        [value] => Ok(*value),
        _ => Err(format!("usage: {usage}")),
    }
}

fn position_arg(args: &[&str], command: &str) -> Result<usize, String> {
    let value = single_arg(args, &format!("{command} <n>"))?;
    match value.parse::<usize>() {
        Ok(position) if position >= 1 => Ok(position - 1),
        _ => Err(format!("{command} expects a list number starting at 1")),
    }
}

fn numbered(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return format!("  ({empty})");
    }
    items
        .iter()
        .enumerate()
        .map(|(index, item)| format!("  {:>3}. {item}", index + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_update(update: &UiUpdate) -> String {
    match update {
        UiUpdate::ArtistList(artists) => format!("Artists:\n{}", numbered(artists, "no artists")),
        UiUpdate::AlbumList(albums) => format!("Albums:\n{}", numbered(albums, "no albums")),
        UiUpdate::TrackList(tracks) => format!("Tracks:\n{}", numbered(tracks, "no tracks")),
        UiUpdate::NowPlaying(text) => format!("▶ {text}"),
        UiUpdate::Cover(CoverArt::Image { width, height, .. }) => {
            format!("[cover {width}x{height}]")
        }
        UiUpdate::Cover(CoverArt::Placeholder) => "[cover: default artwork]".to_string(),
        UiUpdate::SeekPercent(percent) => seek_bar(*percent),
        UiUpdate::State(state) => format!("State: {}", state_label(*state)),
        UiUpdate::Notice(text) => text.clone(),
        UiUpdate::Error(text) => format!("Error: {text}"),
    }
}

pub fn present(updates: &[UiUpdate]) {
    for update in updates {
        println!("{}", render_update(update));
    }
}

/// Prints timer-driven updates; the seek bar is only echoed in 10% steps.
pub fn present_tick(updates: &[UiUpdate]) {
    for update in updates.iter().filter(|update| !is_minor_seek_step(update)) {
        println!("{}", render_update(update));
    }
}

fn is_minor_seek_step(update: &UiUpdate) -> bool {
    matches!(update, UiUpdate::SeekPercent(percent) if percent % 10 != 0)
}

fn seek_bar(percent: u8) -> String {
    let filled = (percent.min(100) / 5) as usize;
    format!("[{}{}] {percent}%", "#".repeat(filled), "-".repeat(20 - filled))
}

fn state_label(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Idle => "idle",
        PlaybackState::Playing => "playing",
        PlaybackState::Paused => "paused",
        PlaybackState::Stopped => "stopped",
    }
}

/// Reads stdin on a dedicated thread and forwards parsed events.
///
/// End of input is sent as [`UiEvent::Quit`].
pub fn spawn_stdin_reader(events: UnboundedSender<UiEvent>) -> std::io::Result<()> {
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!("Console: stdin read failed: {}", err);
                        break;
                    }
                };
                match parse_command(&line) {
                    Ok(Some(event)) => {
                        if events.send(event).is_err() {
                            debug!("Console: event loop closed, stopping input");
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("{message}\n{HELP_TEXT}"),
                }
            }
            let _ = events.send(UiEvent::Quit);
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::{is_minor_seek_step, parse_command, render_update};
    use crate::config::{AffirmationStyle, Theme};
    use crate::cover_art::CoverArt;
    use crate::protocol::{UiEvent, UiUpdate};

    #[test]
    fn test_blank_line_is_ignored() {
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_positions_are_one_based() {
        assert_eq!(parse_command("artist 1"), Ok(Some(UiEvent::SelectArtist(0))));
        assert_eq!(parse_command("album 3"), Ok(Some(UiEvent::OpenAlbum(2))));
        assert_eq!(parse_command("PLAY 12"), Ok(Some(UiEvent::PlayTrack(11))));
        assert!(parse_command("artist 0").is_err());
        assert!(parse_command("album x").is_err());
        assert!(parse_command("play").is_err());
    }

    #[test]
    fn test_connect_needs_three_arguments() {
        assert_eq!(
            parse_command("connect music.local alice pw"),
            Ok(Some(UiEvent::Connect {
                server: "music.local".to_string(),
                username: "alice".to_string(),
                password: "pw".to_string(),
            }))
        );
        assert!(parse_command("connect music.local alice").is_err());
    }

    #[test]
    fn test_settings_commands() {
        assert_eq!(
            parse_command("theme Ambient"),
            Ok(Some(UiEvent::SetTheme(Theme::Ambient)))
        );
        assert_eq!(
            parse_command("style poetic"),
            Ok(Some(UiEvent::SetAffirmationStyle(AffirmationStyle::Poetic)))
        );
        assert!(parse_command("theme neon").is_err());
        assert_eq!(parse_command("offline"), Ok(Some(UiEvent::ToggleOffline)));
    }

    #[test]
    fn test_seek_and_transport_commands() {
        assert_eq!(parse_command("seek 42.5"), Ok(Some(UiEvent::SeekPercent(42.5))));
        assert!(parse_command("seek soon").is_err());
        assert_eq!(parse_command("n"), Ok(Some(UiEvent::Next)));
        assert_eq!(parse_command("prev"), Ok(Some(UiEvent::Previous)));
        assert_eq!(parse_command("pause"), Ok(Some(UiEvent::TogglePlayPause)));
        assert_eq!(parse_command("quit"), Ok(Some(UiEvent::Quit)));
    }

    #[test]
    fn test_only_tick_seek_steps_between_tens_are_skipped() {
        assert!(is_minor_seek_step(&UiUpdate::SeekPercent(37)));
        assert!(!is_minor_seek_step(&UiUpdate::SeekPercent(40)));
        assert!(!is_minor_seek_step(&UiUpdate::SeekPercent(0)));
        assert!(!is_minor_seek_step(&UiUpdate::Notice("End of playlist.".to_string())));
        assert_eq!(
            render_update(&UiUpdate::SeekPercent(37)),
            "[#######-------------] 37%"
        );
    }

    #[test]
    fn test_unknown_command_is_reported() {
        assert_eq!(
            parse_command("dance now"),
            Err("unknown command 'dance'".to_string())
        );
    }

    #[test]
    fn test_render_lists_and_cover() {
        assert_eq!(
            render_update(&UiUpdate::ArtistList(vec![
                "Air  •  1 album".to_string(),
                "Can  •  4 albums".to_string()
            ])),
            "Artists:\n    1. Air  •  1 album\n    2. Can  •  4 albums"
        );
        assert_eq!(
            render_update(&UiUpdate::TrackList(Vec::new())),
            "Tracks:\n  (no tracks)"
        );
        assert_eq!(
            render_update(&UiUpdate::Cover(CoverArt::Placeholder)),
            "[cover: default artwork]"
        );
        assert_eq!(
            render_update(&UiUpdate::SeekPercent(50)),
            "[##########----------] 50%"
        );
    }
}
