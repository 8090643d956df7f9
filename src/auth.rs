//! Salted token derivation used to sign every API request.

/// Lowest salt value handed out by [`generate_salt`].
pub const SALT_MIN: u16 = 1000;
/// Highest salt value handed out by [`generate_salt`].
pub const SALT_MAX: u16 = 9999;

/// One-way hash applied to `password || salt`.
///
/// The server dictates the scheme; Subsonic servers expect lowercase hex MD5.
pub trait TokenHasher: Send + Sync {
    fn digest_hex(&self, input: &str) -> String;
}

/// Default Subsonic token scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5TokenHasher;

impl TokenHasher for Md5TokenHasher {
    fn digest_hex(&self, input: &str) -> String {
        format!("{:x}", md5::compute(input.as_bytes()))
    }
}

/// Salt/token pair sent with each request in place of the password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub salt: String,
    pub token: String,
}

impl Credentials {
    /// Derives credentials for a known salt with a caller-chosen scheme.
    pub fn derive_with(password: &str, salt: &str, hasher: &dyn TokenHasher) -> Self {
        Self {
            salt: salt.to_string(),
            token: derive_token(password, salt, hasher),
        }
    }
}

/// Token schemes selectable through `[server] token_scheme`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenScheme {
    #[default]
    Md5,
}

impl TokenScheme {
    pub const ALL: [TokenScheme; 1] = [TokenScheme::Md5];

    pub fn name(self) -> &'static str {
        match self {
            TokenScheme::Md5 => "md5",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn hasher(self) -> &'static dyn TokenHasher {
        match self {
            TokenScheme::Md5 => &Md5TokenHasher,
        }
    }
}

pub fn derive_token(password: &str, salt: &str, hasher: &dyn TokenHasher) -> String {
    hasher.digest_hex(&format!("{password}{salt}"))
}

/// Returns a four-digit decimal salt in `SALT_MIN..=SALT_MAX`.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 2];
    if let Err(err) = getrandom::fill(&mut bytes) {
        log::warn!("OS randomness unavailable for salt, using clock fallback: {err}");
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.subsec_nanos())
            .unwrap_or_default();
        bytes = (nanos as u16).to_le_bytes();
    }
    salt_from_random(u16::from_le_bytes(bytes)).to_string()
}

fn salt_from_random(value: u16) -> u16 {
    SALT_MIN + value % (SALT_MAX - SALT_MIN + 1)
}

#[cfg(test)]
mod tests {
    use super::{
        derive_token, generate_salt, salt_from_random, Credentials, Md5TokenHasher, TokenHasher,
        TokenScheme, SALT_MAX, SALT_MIN,
    };

    struct ReverseHasher;

    impl TokenHasher for ReverseHasher {
        fn digest_hex(&self, input: &str) -> String {
            input.chars().rev().collect()
        }
    }

    #[test]
    fn test_md5_token_matches_known_digest() {
        // md5("sesame" + "1234")
        let token = derive_token("sesame", "1234", &Md5TokenHasher);
        assert_eq!(token, format!("{:x}", md5::compute("sesame1234")));
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_token_is_deterministic_for_same_password_and_salt() {
        let first = Credentials::derive_with("hunter2", "4821", &Md5TokenHasher);
        let second = Credentials::derive_with("hunter2", "4821", &Md5TokenHasher);
        assert_eq!(first, second);
    }

    #[test]
    fn test_token_scheme_names() {
        assert_eq!(TokenScheme::from_name(" MD5 "), Some(TokenScheme::Md5));
        assert_eq!(TokenScheme::from_name("sha256"), None);
        assert_eq!(
            TokenScheme::Md5.hasher().digest_hex("sesame1234"),
            Md5TokenHasher.digest_hex("sesame1234")
        );
    }

    #[test]
    fn test_different_salts_give_different_tokens() {
        let first = derive_token("hunter2", "1000", &Md5TokenHasher);
        let second = derive_token("hunter2", "1001", &Md5TokenHasher);
        assert_ne!(first, second);
    }

    #[test]
    fn test_custom_hasher_is_applied_to_password_then_salt() {
        let credentials = Credentials::derive_with("abc", "1234", &ReverseHasher);
        assert_eq!(credentials.token, "4321cba");
        assert_eq!(credentials.salt, "1234");
    }

    #[test]
    fn test_generated_salt_is_four_digit_decimal_in_range() {
        for _ in 0..200 {
            let salt = generate_salt();
            assert_eq!(salt.len(), 4);
            let value: u16 = salt.parse().expect("salt should be decimal");
            assert!((SALT_MIN..=SALT_MAX).contains(&value));
        }
    }

    #[test]
    fn test_salt_mapping_covers_bounds() {
        assert_eq!(salt_from_random(0), SALT_MIN);
        assert_eq!(salt_from_random(8999), SALT_MAX);
        assert_eq!(salt_from_random(9000), SALT_MIN);
        assert!(salt_from_random(u16::MAX) <= SALT_MAX);
    }
}
