//! URL derivation for device media and live streams.
//!
//! Everything here is pure string work on `(base_url, directory, path)`; no
//! request is ever made to find a URL.

use crate::media::{extension, Directory, MediaKind, Side};

/// Extension of the preview image the camera stores next to each clip.
const THUMBNAIL_EXT: &str = "THM";

/// `http://<ip>` (port omitted when it is the HTTP default).
pub fn base_url(ip: &str, http_port: u16) -> String {
    if http_port == 80 {
        format!("http://{ip}")
    } else {
        format!("http://{ip}:{http_port}")
    }
}

/// RTSP live feed: `/livestream/1` is the front camera, `/livestream/2` the rear.
pub fn stream_url(ip: &str, rtsp_port: u16, side: Side) -> String {
    let channel = match side {
        Side::Front => 1,
        Side::Rear  => 2,
    };
    format!("rtsp://{ip}:{rtsp_port}/livestream/{channel}")
}

/// Device path for a record that only came with a bare filename.
pub fn reconstructed_path(directory: Directory, filename: &str) -> String {
    format!("sd//{directory}/{filename}")
}

/// Playback/download URL.  `device_path` is used verbatim.
pub fn media_url(base_url: &str, device_path: &str) -> String {
    format!("{base_url}/{device_path}")
}

/// Preview URL: stills preview as themselves, clips as `<name>.THM`.
pub fn thumbnail_url(base_url: &str, device_path: &str, filename: &str) -> String {
    if MediaKind::from_filename(filename) == MediaKind::Photo {
        return media_url(base_url, device_path);
    }
    media_url(base_url, &thumbnail_path(device_path))
}

/// Replace a trailing `.TS` (any case) with `.THM`; other paths are returned
/// unchanged.
pub fn thumbnail_path(device_path: &str) -> String {
    match extension(device_path) {
        Some(ext) if ext.eq_ignore_ascii_case("ts") => {
            let stem = &device_path[..device_path.len() - ext.len()];
            format!("{stem}{THUMBNAIL_EXT}")
        }
        _ => device_path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://192.168.0.1";

    #[test]
    fn clip_thumbnail_swaps_extension() {
        let path = "sd//norm/2026_01_24_115023_00.TS";
        let thumb = thumbnail_url(BASE, path, "2026_01_24_115023_00.TS");
        assert_eq!(thumb, "http://192.168.0.1/sd//norm/2026_01_24_115023_00.THM");
        assert!(thumb.ends_with(".THM"));

        assert_eq!(thumbnail_path("sd//back_norm/clip.ts"), "sd//back_norm/clip.THM");
    }

    #[test]
    fn photo_thumbnail_is_media_url() {
        let path = "sd//photo/x.JPG";
        assert_eq!(thumbnail_url(BASE, path, "x.JPG"), media_url(BASE, path));
        assert_eq!(media_url(BASE, path), "http://192.168.0.1/sd//photo/x.JPG");
    }

    #[test]
    fn unknown_extension_left_alone() {
        assert_eq!(thumbnail_path("sd//norm/clip.MP4"), "sd//norm/clip.MP4");
        assert_eq!(thumbnail_path("sd.ts/clip"), "sd.ts/clip");
    }

    #[test]
    fn derivation_is_stable() {
        let a = media_url(BASE, &reconstructed_path(Directory::LockedRear, "a.TS"));
        let b = media_url(BASE, &reconstructed_path(Directory::LockedRear, "a.TS"));
        assert_eq!(a, b);
        assert_eq!(a, "http://192.168.0.1/sd//back_emr/a.TS");
    }

    #[test]
    fn base_and_stream() {
        assert_eq!(base_url("192.168.0.1", 80), BASE);
        assert_eq!(base_url("127.0.0.1", 8080), "http://127.0.0.1:8080");
        assert_eq!(stream_url("192.168.0.1", 554, Side::Front), "rtsp://192.168.0.1:554/livestream/1");
        assert_eq!(stream_url("192.168.0.1", 554, Side::Rear), "rtsp://192.168.0.1:554/livestream/2");
    }
}
