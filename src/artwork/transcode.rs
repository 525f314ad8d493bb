//! Image proxy URLs and data-URL transcoding.

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    tracing::trace,
};

use crate::{artwork::FetchedImage, error::ArtworkError};

/// Image formats recognised by their magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeType {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
}

impl MimeType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Webp => "image/webp",
        }
    }
}

/// Detects the image format from the first bytes of the payload.
///
/// # Arguments
///
/// * `data` - Raw image bytes.
///
/// # Returns
///
/// The detected `MimeType`, or `None` for unknown or too-short data.
#[must_use]
pub fn detect_mime_type(data: &[u8]) -> Option<MimeType> {
    if data.len() < 4 {
        return None;
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(MimeType::Jpeg);
    }
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some(MimeType::Png);
    }
    if data.starts_with(b"GIF") {
        return Some(MimeType::Gif);
    }
    if data.starts_with(b"BM") {
        return Some(MimeType::Bmp);
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some(MimeType::Webp);
    }

    None
}

/// Builds the host image-proxy URL for a cover at the requested size.
///
/// Forces https and replaces any existing query. Data URLs and empty
/// references are returned unchanged.
#[must_use]
pub fn cover_proxy_url(url: &str, size: u32, quality: u8) -> String {
    let url = url.trim();
    if url.is_empty() || url.starts_with("data:") {
        return url.to_string();
    }

    let base = url.split('?').next().unwrap_or(url);
    let base = if let Some(rest) = base.strip_prefix("http://") {
        format!("https://{rest}")
    } else if base.starts_with("//") {
        format!("https:{base}")
    } else {
        base.to_string()
    };

    format!("{base}?imageView&enlarge=1&type=jpeg&quality={quality}&thumbnail={size}y{size}")
}

/// Encodes a fetched image as a self-contained data URL.
///
/// # Errors
///
/// Returns `ArtworkError::Status` for non-success responses and
/// `ArtworkError::EmptyBody` when there is nothing to encode.
pub fn to_data_url(image: &FetchedImage) -> Result<String, ArtworkError> {
    if !(200..300).contains(&image.status) {
        return Err(ArtworkError::Status {
            status: image.status,
        });
    }
    if image.bytes.is_empty() {
        return Err(ArtworkError::EmptyBody);
    }

    let mime = detect_mime_type(&image.bytes)
        .map(MimeType::as_str)
        .or_else(|| {
            image
                .content_type
                .as_deref()
                .map(|value| value.split(';').next().unwrap_or(value).trim())
                .filter(|value| value.starts_with("image/"))
        })
        .unwrap_or("image/jpeg");
    trace!(mime, bytes = image.bytes.len(), "Transcoding cover");

    Ok(format!("data:{mime};base64,{}", STANDARD.encode(&image.bytes)))
}
