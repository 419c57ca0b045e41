const SUPPORTED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/heic",
    "image/heif",
];

/// Sniffs an image MIME type from magic bytes.
pub fn detect_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [_, _, _, _, b'f', b't', b'y', b'p', brand @ ..] if brand.len() >= 4 => {
            match &brand[..4] {
                b"heic" | b"heix" | b"hevc" | b"hevx" => Some("image/heic"),
                b"mif1" | b"msf1" | b"heif" => Some("image/heif"),
                _ => None,
            }
        }
        _ => {
            tracing::debug!(
                "Unrecognized image format (first 4 bytes: {:02X?})",
                &bytes[..bytes.len().min(4)]
            );
            None
        }
    }
}

/// Normalizes a caller-supplied MIME type, accepting only supported images.
pub fn normalize_image_mime(mime: &str) -> Option<&'static str> {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let essence = if essence == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        essence
    };
    SUPPORTED_IMAGE_TYPES
        .iter()
        .copied()
        .find(|supported| *supported == essence)
}
