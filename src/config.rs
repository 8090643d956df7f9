//! Persistent client configuration model and defaults.

use std::time::Duration;

use log::warn;

use crate::auth::TokenScheme;

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Saved connection details.
    pub server: ServerConfig,
    #[serde(default)]
    /// Presentation preferences.
    pub ui: UiConfig,
    #[serde(default)]
    /// HTTP agent timeouts.
    pub network: NetworkConfig,
    #[serde(default)]
    /// Position polling and auto-advance cadence.
    pub playback: PlaybackConfig,
}

/// Server address and credentials entered on the last successful connect.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub offline: bool,
    /// Hash used to derive request tokens, by [`TokenScheme`] name.
    #[serde(default = "default_token_scheme")]
    pub token_scheme: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            username: String::new(),
            password: String::new(),
            offline: false,
            token_scheme: default_token_scheme(),
        }
    }
}

impl ServerConfig {
    /// True when all three connection fields are non-blank.
    pub fn has_credentials(&self) -> bool {
        [&self.server, &self.username, &self.password]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    /// The configured scheme, MD5 when the name is unknown.
    pub fn token_scheme(&self) -> TokenScheme {
        TokenScheme::from_name(&self.token_scheme).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    #[serde(alias = "Cozy")]
    Cozy,
    #[serde(alias = "Focused")]
    Focused,
    #[serde(alias = "Ambient")]
    Ambient,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Cozy, Theme::Focused, Theme::Ambient];

    pub fn name(self) -> &'static str {
        match self {
            Theme::Cozy => "cozy",
            Theme::Focused => "focused",
            Theme::Ambient => "ambient",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|theme| theme.name().eq_ignore_ascii_case(name.trim()))
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AffirmationStyle {
    #[default]
    #[serde(alias = "Gentle")]
    Gentle,
    #[serde(alias = "Playful")]
    Playful,
    #[serde(alias = "Poetic")]
    Poetic,
}

impl AffirmationStyle {
    pub const ALL: [AffirmationStyle; 3] = [
        AffirmationStyle::Gentle,
        AffirmationStyle::Playful,
        AffirmationStyle::Poetic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AffirmationStyle::Gentle => "gentle",
            AffirmationStyle::Playful => "playful",
            AffirmationStyle::Poetic => "poetic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(name.trim()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UiConfig {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub affirmation_style: AffirmationStyle,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_token_scheme() -> String {
    TokenScheme::default().name().to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    15
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Clamps numeric settings into usable ranges and resets an unknown token
/// scheme to the default.
pub fn sanitize_config(config: Config) -> Config {
    let token_scheme = match TokenScheme::from_name(&config.server.token_scheme) {
        Some(scheme) => scheme.name().to_string(),
        None => {
            warn!(
                "Config: unknown token scheme '{}', using {}",
                config.server.token_scheme,
                TokenScheme::default().name()
            );
            default_token_scheme()
        }
    };
    Config {
        server: ServerConfig {
            token_scheme,
            ..config.server
        },
        network: NetworkConfig {
            connect_timeout_secs: config.network.connect_timeout_secs.clamp(1, 60),
            read_timeout_secs: config.network.read_timeout_secs.clamp(1, 300),
        },
        playback: PlaybackConfig {
            poll_interval_ms: config.playback.poll_interval_ms.clamp(100, 5_000),
        },
        ..config
    }
}

#[cfg(test)]
mod tests {
    use super::{sanitize_config, AffirmationStyle, Config, Theme};
    use crate::auth::TokenScheme;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.network.connect_timeout_secs, 5);
        assert_eq!(config.network.read_timeout_secs, 15);
        assert_eq!(config.playback.poll_interval_ms, 500);
        assert!(!config.server.has_credentials());
    }

    #[test]
    fn test_partial_sections_fill_missing_keys() {
        let config: Config = toml::from_str(
            r#"
[server]
server = "music.local:4533"

[network]
read_timeout_secs = 30
"#,
        )
        .expect("partial config should parse");
        assert_eq!(config.server.server, "music.local:4533");
        assert!(config.server.username.is_empty());
        assert_eq!(config.network.connect_timeout_secs, 5);
        assert_eq!(config.network.read_timeout_secs, 30);
    }

    #[test]
    fn test_legacy_capitalized_names_are_accepted() {
        let config: Config = toml::from_str(
            r#"
[ui]
theme = "Ambient"
affirmation_style = "Poetic"
"#,
        )
        .expect("legacy names should parse");
        assert_eq!(config.ui.theme, Theme::Ambient);
        assert_eq!(config.ui.affirmation_style, AffirmationStyle::Poetic);

        let text = toml::to_string(&config).expect("serialize");
        assert!(text.contains("theme = \"ambient\""));
    }

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(Theme::from_name(" Focused "), Some(Theme::Focused));
        assert_eq!(Theme::from_name("neon"), None);
        assert_eq!(
            AffirmationStyle::from_name("PLAYFUL"),
            Some(AffirmationStyle::Playful)
        );
    }

    #[test]
    fn test_sanitize_clamps_numeric_values() {
        let mut config = Config::default();
        config.network.connect_timeout_secs = 0;
        config.network.read_timeout_secs = 10_000;
        config.playback.poll_interval_ms = 1;
        config.server.server = "host".to_string();
        let sanitized = sanitize_config(config);
        assert_eq!(sanitized.network.connect_timeout_secs, 1);
        assert_eq!(sanitized.network.read_timeout_secs, 300);
        assert_eq!(sanitized.playback.poll_interval_ms, 100);
        assert_eq!(sanitized.server.server, "host");
    }

    #[test]
    fn test_token_scheme_is_sanitized_to_a_known_name() {
        let config: Config = toml::from_str("[server]\ntoken_scheme = \"MD5\"\n")
            .expect("config should parse");
        assert_eq!(config.server.token_scheme(), TokenScheme::Md5);
        assert_eq!(sanitize_config(config).server.token_scheme, "md5");

        let mut config = Config::default();
        assert_eq!(config.server.token_scheme, "md5");
        config.server.token_scheme = "rot13".to_string();
        assert_eq!(config.server.token_scheme(), TokenScheme::Md5);
        assert_eq!(sanitize_config(config).server.token_scheme, "md5");
    }

    #[test]
    fn test_has_credentials_requires_all_fields() {
        let mut config = Config::default();
        config.server.server = "host".to_string();
        config.server.username = "alice".to_string();
        assert!(!config.server.has_credentials());
        config.server.password = "  ".to_string();
        assert!(!config.server.has_credentials());
        config.server.password = "pw".to_string();
        assert!(config.server.has_credentials());
    }
}
