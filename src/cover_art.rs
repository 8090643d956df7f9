//! Best-effort album cover retrieval.

use log::{debug, warn};

use crate::api::ApiClient;

/// Cover shown next to the now-playing text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverArt {
    /// Encoded image bytes as served, with decoded dimensions.
    Image {
        bytes: Vec<u8>,
        width: u32,
        height: u32,
    },
    /// Default artwork; used whenever no usable image is available.
    Placeholder,
}

/// Fetches and validates a cover; any failure yields [`CoverArt::Placeholder`].
pub fn resolve_cover_art(api: &ApiClient, cover_id: Option<&str>) -> CoverArt {
    let Some(cover_id) = cover_id.map(str::trim).filter(|id| !id.is_empty()) else {
        debug!("Cover art: no cover id, using placeholder");
        return CoverArt::Placeholder;
    };
    match api.fetch_cover_art(cover_id) {
        Ok(bytes) => cover_from_bytes(bytes),
        Err(err) => {
            warn!("Cover art: fetch failed for '{}': {}", cover_id, err);
            CoverArt::Placeholder
        }
    }
}

/// Keeps the bytes only when they decode as an image.
pub fn cover_from_bytes(bytes: Vec<u8>) -> CoverArt {
    if bytes.is_empty() {
        warn!("Cover art: empty response body");
        return CoverArt::Placeholder;
    }
    match image::load_from_memory(&bytes) {
        Ok(decoded) => CoverArt::Image {
            width: decoded.width(),
            height: decoded.height(),
            bytes,
        },
        Err(err) => {
            warn!("Cover art: response is not a decodable image: {}", err);
            CoverArt::Placeholder
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::rc::Rc;

    use image::{ImageFormat, Rgb, RgbImage};

    use super::{cover_from_bytes, resolve_cover_art, CoverArt};
    use crate::api::ApiClient;
    use crate::auth::Md5TokenHasher;
    use crate::error::ClientError;
    use crate::session::Session;
    use crate::transport::fake::FakeTransport;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 120, 40]));
        let mut bytes = Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, ImageFormat::Png)
            .expect("png encoding should succeed");
        bytes.into_inner()
    }

    fn api(transport: FakeTransport) -> (ApiClient, Rc<FakeTransport>) {
        let transport = Rc::new(transport);
        let session = Session::with_hasher("host", "alice", "pw", "1000", &Md5TokenHasher);
        (ApiClient::new(session, transport.clone()), transport)
    }

    #[test]
    fn test_valid_image_is_kept_with_dimensions() {
        let bytes = png_bytes(4, 3);
        let (api, _) = api(FakeTransport::new().with_bytes("getCoverArt", bytes.clone()));
        assert_eq!(
            resolve_cover_art(&api, Some("al-1")),
            CoverArt::Image {
                bytes,
                width: 4,
                height: 3
            }
        );
    }

    #[test]
    fn test_missing_cover_id_skips_network() {
        let (api, transport) = api(FakeTransport::new());
        assert_eq!(resolve_cover_art(&api, None), CoverArt::Placeholder);
        assert_eq!(resolve_cover_art(&api, Some("   ")), CoverArt::Placeholder);
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_fetch_failure_falls_back_to_placeholder() {
        let (api, _) = api(
            FakeTransport::new().with_error("getCoverArt", ClientError::Transport("timeout".into())),
        );
        assert_eq!(resolve_cover_art(&api, Some("al-1")), CoverArt::Placeholder);
    }

    #[test]
    fn test_non_image_body_falls_back_to_placeholder() {
        let body = br#"{"subsonic-response":{"status":"failed"}}"#.to_vec();
        assert_eq!(cover_from_bytes(body), CoverArt::Placeholder);
        assert_eq!(cover_from_bytes(Vec::new()), CoverArt::Placeholder);
    }
}
