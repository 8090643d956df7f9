//! Immutable signing context for one authenticated server connection.

use crate::auth::{generate_salt, Credentials, TokenHasher};

pub const API_VERSION: &str = "1.16.1";
pub const CLIENT_NAME: &str = "ComfortClient";
const RESPONSE_FORMAT: &str = "json";

/// Address, user, and derived token for one server.
///
/// A session is never mutated; reconnecting builds a new one with a new salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    base_address: String,
    username: String,
    credentials: Credentials,
    protocol_version: &'static str,
    client_name: &'static str,
}

impl Session {
    /// Builds a session with a freshly generated salt.
    pub fn new(server: &str, username: &str, password: &str, hasher: &dyn TokenHasher) -> Self {
        Self::with_hasher(server, username, password, &generate_salt(), hasher)
    }

    /// Builds a session for a known salt using a caller-provided hash scheme.
    pub fn with_hasher(
        server: &str,
        username: &str,
        password: &str,
        salt: &str,
        hasher: &dyn TokenHasher,
    ) -> Self {
        Self::from_credentials(
            server,
            username,
            Credentials::derive_with(password, salt, hasher),
        )
    }

    fn from_credentials(server: &str, username: &str, credentials: Credentials) -> Self {
        Self {
            base_address: normalize_base_address(server),
            username: username.trim().to_string(),
            credentials,
            protocol_version: API_VERSION,
            client_name: CLIENT_NAME,
        }
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn auth_params(&self) -> [(&'static str, &str); 6] {
        [
            ("u", self.username.as_str()),
            ("t", self.credentials.token.as_str()),
            ("s", self.credentials.salt.as_str()),
            ("v", self.protocol_version),
            ("c", self.client_name),
            ("f", RESPONSE_FORMAT),
        ]
    }

    /// Returns a fully signed `{base}/rest/{method}.view?...` URL.
    pub fn api_url(&self, method: &str, params: &[(&str, &str)]) -> String {
        let mut query_parts: Vec<String> = self
            .auth_params()
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect();
        query_parts.extend(
            params
                .iter()
                .map(|(key, value)| format!("{key}={}", urlencoding::encode(value))),
        );
        format!(
            "{}/rest/{}.view?{}",
            self.base_address,
            method,
            query_parts.join("&")
        )
    }
}

/// Adds a scheme when missing and strips trailing slashes.
pub fn normalize_base_address(server: &str) -> String {
    let trimmed = server.trim();
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    with_scheme.trim_end_matches('/').to_string()
}
