use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which kind of conversion a session performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Image,
    Video,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Image => "image",
            Mode::Video => "video",
        }
    }

    /// MIME family accepted by the file picker for this mode (`image/*`, `video/*`).
    pub fn accept_pattern(self) -> &'static str {
        match self {
            Mode::Image => "image/*",
            Mode::Video => "video/*",
        }
    }

    pub fn accepts(self, mime_type: &str) -> bool {
        let prefix = match self {
            Mode::Image => "image/",
            Mode::Video => "video/",
        };
        mime_type
            .trim()
            .to_ascii_lowercase()
            .starts_with(prefix)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image" | "img" | "photo" => Ok(Mode::Image),
            "video" | "vid" | "clip" => Ok(Mode::Video),
            other => Err(format!("unknown mode '{other}' (expected image or video)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "16:9" | "landscape" | "wide" => Ok(AspectRatio::Landscape),
            "9:16" | "portrait" | "tall" => Ok(AspectRatio::Portrait),
            other => Err(format!(
                "unsupported aspect ratio '{other}' (expected 16:9 or 9:16)"
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPayload {
    /// Fully buffered bytes.
    Inline(Arc<[u8]>),
    /// Remote resource; the URI already carries whatever credential it needs.
    Remote(String),
}

/// An encoded image or video. Immutable once built; clones share the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    mime_type: String,
    payload: AssetPayload,
}

impl Asset {
    pub fn inline(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            mime_type: normalize_mime(mime_type.into()),
            payload: AssetPayload::Inline(Arc::from(bytes)),
        }
    }

    pub fn remote(mime_type: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            mime_type: normalize_mime(mime_type.into()),
            payload: AssetPayload::Remote(uri.into()),
        }
    }

    /// Decodes a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, AssetError> {
        let (mime_type, encoded) = split_data_url(url)
            .ok_or_else(|| AssetError::InvalidDataUrl(truncate_for_error(url)))?;
        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|err| AssetError::InvalidDataUrl(err.to_string()))?;
        Ok(Self::inline(mime_type, bytes))
    }

    /// Builds an inline asset from a base64 payload that may or may not carry
    /// a data-URL prefix.
    pub fn from_base64(mime_type: &str, data: &str) -> Result<Self, AssetError> {
        let bare = strip_data_url_prefix(data);
        let bytes = BASE64
            .decode(bare.trim().as_bytes())
            .map_err(|err| AssetError::InvalidDataUrl(err.to_string()))?;
        Ok(Self::inline(mime_type, bytes))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn payload(&self) -> &AssetPayload {
        &self.payload
    }

    pub fn inline_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            AssetPayload::Inline(bytes) => Some(&bytes[..]),
            AssetPayload::Remote(_) => None,
        }
    }

    pub fn remote_uri(&self) -> Option<&str> {
        match &self.payload {
            AssetPayload::Inline(_) => None,
            AssetPayload::Remote(uri) => Some(uri.as_str()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.payload, AssetPayload::Remote(_))
    }

    /// Base64 payload without any data-URL prefix, for upload.
    pub fn base64_payload(&self) -> Option<String> {
        self.inline_bytes().map(|bytes| BASE64.encode(bytes))
    }

    pub fn to_data_url(&self) -> Option<String> {
        self.base64_payload()
            .map(|encoded| format!("data:{};base64,{}", self.mime_type, encoded))
    }

    /// Mode implied by the MIME family, if any.
    pub fn mode(&self) -> Option<Mode> {
        [Mode::Image, Mode::Video]
            .into_iter()
            .find(|mode| mode.accepts(&self.mime_type))
    }

    pub fn byte_len(&self) -> Option<usize> {
        self.inline_bytes().map(<[u8]>::len)
    }

    /// Short content hash used to tag dispatches and events.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.mime_type.as_bytes());
        match &self.payload {
            AssetPayload::Inline(bytes) => {
                hasher.update(b"inline:");
                hasher.update(&bytes[..]);
            }
            AssetPayload::Remote(uri) => {
                hasher.update(b"remote:");
                hasher.update(uri.as_bytes());
            }
        }
        hex::encode(&hasher.finalize()[..6])
    }

    /// Preferred file extension for downloads.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type).unwrap_or(match self.mode() {
            Some(Mode::Video) => "mp4",
            _ => "png",
        })
    }
}

/// Reads a local file into an inline asset. The MIME type comes from the
/// file extension; unknown extensions get `application/octet-stream`.
pub fn encode_file(path: &Path) -> Result<Asset, AssetError> {
    let bytes = std::fs::read(path).map_err(|source| AssetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mime = mime_for_path(path).unwrap_or("application/octet-stream");
    Ok(Asset::inline(mime, bytes))
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "heic" => Some("image/heic"),
        "mp4" | "m4v" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "mov" => Some("video/quicktime"),
        "mkv" => Some("video/x-matroska"),
        _ => None,
    }
}

pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let lowered = mime.to_ascii_lowercase();
    let ext = match lowered.split(';').next().unwrap_or("").trim() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/heic" => "heic",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",
        _ => return None,
    };
    Some(ext)
}

/// Splits `data:<mime>;base64,<payload>` into its MIME type and payload.
pub fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.trim().strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    if mime.is_empty() {
        return None;
    }
    Some((mime, payload))
}

pub fn strip_data_url_prefix(value: &str) -> &str {
    split_data_url(value)
        .map(|(_, payload)| payload)
        .unwrap_or(value)
}

fn normalize_mime(raw: String) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "application/octet-stream".to_string();
    }
    trimmed.to_ascii_lowercase()
}

fn truncate_for_error(value: &str) -> String {
    value.chars().take(48).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{
        encode_file, mime_for_path, split_data_url, strip_data_url_prefix, AspectRatio, Asset,
        AssetError, Mode,
    };

    #[test]
    fn encode_file_builds_data_url_with_extension_mime() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logo.png");
        fs::write(&path, b"png-bytes")?;

        let asset = encode_file(&path)?;
        assert_eq!(asset.mime_type(), "image/png");
        assert_eq!(asset.inline_bytes(), Some(&b"png-bytes"[..]));
        assert_eq!(
            asset.to_data_url().as_deref(),
            Some("data:image/png;base64,cG5nLWJ5dGVz")
        );
        assert_eq!(asset.mode(), Some(Mode::Image));
        Ok(())
    }

    #[test]
    fn encode_file_reports_read_error_for_missing_file() {
        let err = encode_file(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, AssetError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here.png"));
    }

    #[test]
    fn data_url_prefix_is_stripped_for_upload() -> anyhow::Result<()> {
        let asset = Asset::from_data_url("data:image/jpeg;base64,aGVsbG8=")?;
        assert_eq!(asset.mime_type(), "image/jpeg");
        assert_eq!(asset.base64_payload().as_deref(), Some("aGVsbG8="));
        assert_eq!(
            strip_data_url_prefix("data:image/jpeg;base64,aGVsbG8="),
            "aGVsbG8="
        );
        assert_eq!(strip_data_url_prefix("aGVsbG8="), "aGVsbG8=");
        assert!(split_data_url("data:;base64,xx").is_none());
        assert!(Asset::from_data_url("not a data url").is_err());
        Ok(())
    }

    #[test]
    fn mode_accepts_only_matching_mime_family() {
        assert!(Mode::Image.accepts("image/png"));
        assert!(Mode::Image.accepts(" IMAGE/WEBP "));
        assert!(!Mode::Image.accepts("video/mp4"));
        assert!(Mode::Video.accepts("video/quicktime"));
        assert!(!Mode::Video.accepts("application/octet-stream"));
        assert_eq!(Mode::Image.accept_pattern(), "image/*");
        assert_eq!(Mode::Video.accept_pattern(), "video/*");
        assert_eq!("Video".parse::<Mode>(), Ok(Mode::Video));
        assert!("audio".parse::<Mode>().is_err());
    }

    #[test]
    fn aspect_ratio_parses_keywords_and_ratios() {
        assert_eq!("9:16".parse::<AspectRatio>(), Ok(AspectRatio::Portrait));
        assert_eq!("landscape".parse::<AspectRatio>(), Ok(AspectRatio::Landscape));
        assert!("1:1".parse::<AspectRatio>().is_err());
        assert_eq!(AspectRatio::default().as_str(), "16:9");
    }

    #[test]
    fn remote_assets_keep_their_uri() {
        let asset = Asset::remote("video/mp4", "https://example.test/v.mp4?key=abc");
        assert!(asset.is_remote());
        assert_eq!(asset.remote_uri(), Some("https://example.test/v.mp4?key=abc"));
        assert!(asset.to_data_url().is_none());
        assert_eq!(asset.extension(), "mp4");
        assert_eq!(mime_for_path(Path::new("clip.MOV")), Some("video/quicktime"));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = Asset::inline("image/png", b"one".to_vec());
        let b = Asset::inline("image/png", b"one".to_vec());
        let c = Asset::inline("image/png", b"two".to_vec());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 12);
    }
}
