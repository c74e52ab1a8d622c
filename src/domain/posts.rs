//! Post and comment content rules.

use imagesize::ImageType;

pub const MAX_IMAGE_NAME_LEN: usize = 100;

/// Normalises submitted post or comment text; blank input yields `None`.
pub fn normalize_text(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Raster formats accepted for post images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Gif,
    Png,
    Jpeg,
    Webp,
}

impl ImageKind {
    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Gif => "gif",
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Webp => "webp",
        }
    }
}

/// Identify an image by its leading bytes, ignoring the client-supplied name.
pub fn sniff_image(bytes: &[u8]) -> Option<ImageKind> {
    let kind = match imagesize::image_type(bytes).ok()? {
        ImageType::Gif => ImageKind::Gif,
        ImageType::Png => ImageKind::Png,
        ImageType::Jpeg => ImageKind::Jpeg,
        ImageType::Webp => ImageKind::Webp,
        _ => return None,
    };

    // Reject truncated payloads whose header parses but whose dimensions do not.
    let size = imagesize::blob_size(bytes).ok()?;
    if size.width == 0 || size.height == 0 {
        return None;
    }

    Some(kind)
}
