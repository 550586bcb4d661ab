use anyhow::Result;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as Base64;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

pub fn base64(data: &[u8]) -> String {
    Base64.encode(data)
}

// the vendor receives the caller's string verbatim, we only check it decodes
pub fn validate_base64(encoded: &str) -> Result<()> {
    Base64.decode(encoded.trim())?;
    Ok(())
}

// "image/png; charset=binary" -> "image/png"
pub fn essence(mime_type: &str) -> String {
    mime_type.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    match essence(mime_type).as_str() {
        "image/jpeg" | "image/jpg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/heif" => Some(".heif"),
        "image/heic" => Some(".heic"),
        "image/webp" => Some(".webp"),
        "image/gif" => Some(".gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_standard_alphabet_with_padding() {
        assert_eq!(base64(b"\xff\xd8\xff"), "/9j/");
        assert_eq!(base64(b"ab"), "YWI=");
    }

    #[test]
    fn rejects_garbage_base64() {
        assert!(validate_base64("YWI=").is_ok());
        assert!(validate_base64("not base64!").is_err());
    }

    #[test]
    fn essence_strips_parameters() {
        assert_eq!(essence("Image/PNG; charset=binary"), "image/png");
        assert_eq!(extension_for("image/jpeg"), Some(".jpg"));
        assert_eq!(extension_for("text/plain"), None);
    }
}
