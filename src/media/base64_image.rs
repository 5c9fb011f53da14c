//! Inline image payloads: `data:image/png;base64,<payload>` or bare base64.

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{self, DecodePaddingMode};
use base64::Engine;
use bytes::Bytes;
use thiserror::Error;

/// Extension used when the payload carries no usable MIME subtype.
pub const DEFAULT_EXTENSION: &str = "jpg";

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = "base64,";

/// Standard alphabet, padding optional.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("image payload is empty")]
    Empty,

    #[error("image payload is not valid base64: {0}")]
    InvalidBase64(String),
}

impl From<base64::DecodeError> for DecodeError {
    fn from(err: base64::DecodeError) -> Self {
        DecodeError::InvalidBase64(err.to_string().trim_end_matches('.').to_string())
    }
}

/// A decoded image ready to be written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// `<filename>.<ext>`
    pub name: String,
    pub extension: String,
    pub bytes: Bytes,
}

/// Decodes `input` into a blob named `<filename>.<ext>`.
///
/// The extension is the MIME subtype of a `data:` prefix when it is plain
/// alphanumeric, [`DEFAULT_EXTENSION`] otherwise. Whitespace inside the payload is
/// ignored.
pub fn decode_base64_image(input: &str, filename: &str) -> Result<DecodedImage, DecodeError> {
    let input = input.trim();
    let extension = mime_extension(input).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    let payload = match input.find(BASE64_MARKER) {
        Some(idx) => &input[idx + BASE64_MARKER.len()..],
        None => input,
    };
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = LENIENT_STANDARD.decode(payload.as_bytes())?;
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(DecodedImage {
        name: format!("{}.{}", filename, extension),
        extension,
        bytes: Bytes::from(bytes),
    })
}

/// `data:image/png;base64,...` → `png`
fn mime_extension(input: &str) -> Option<String> {
    let rest = input.strip_prefix(DATA_PREFIX)?;
    let mime = rest.split([';', ',']).next()?;
    let subtype = mime.split('/').nth(1)?.trim().to_ascii_lowercase();
    if !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(subtype)
    } else {
        None
    }
}

/// Encodes bytes as a `data:` URI. Used by tests and fixtures.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "{}{};{}{}",
        DATA_PREFIX,
        mime,
        BASE64_MARKER,
        engine::general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn data_uri_subtype_becomes_extension() {
        let uri = encode_data_uri("image/png", PNG_MAGIC);
        let image = decode_base64_image(&uri, "abc").unwrap();

        assert_eq!(image.name, "abc.png");
        assert_eq!(image.extension, "png");
        assert_eq!(&image.bytes[..], PNG_MAGIC);
    }

    #[test]
    fn raw_base64_defaults_to_jpg() {
        let raw = engine::general_purpose::STANDARD.encode(b"jpeg-ish bytes");
        let image = decode_base64_image(&raw, "photo").unwrap();

        assert_eq!(image.name, "photo.jpg");
        assert_eq!(&image.bytes[..], b"jpeg-ish bytes");
    }

    #[test]
    fn whitespace_and_missing_padding_are_tolerated() {
        // "hello" => aGVsbG8=
        let image = decode_base64_image("data:image/webp;base64,aGVs\nbG8", "x").unwrap();
        assert_eq!(&image.bytes[..], b"hello");
        assert_eq!(image.extension, "webp");
    }

    #[rstest]
    #[case("data:image/svg+xml;base64,aGVsbG8=", "jpg")]
    #[case("data:image/JPEG;base64,aGVsbG8=", "jpeg")]
    #[case("data:;base64,aGVsbG8=", "jpg")]
    #[case("data:image/../../etc;base64,aGVsbG8=", "jpg")]
    fn unusual_mime_types(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(decode_base64_image(input, "f").unwrap().extension, expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("data:image/png;base64,")]
    fn empty_payloads_are_rejected(#[case] input: &str) {
        assert_matches!(decode_base64_image(input, "f"), Err(DecodeError::Empty));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_matches!(
            decode_base64_image("data:image/png;base64,!!!not base64***", "f"),
            Err(DecodeError::InvalidBase64(_))
        );
    }

    #[test]
    fn invalid_base64_message_has_no_trailing_period() {
        let err = decode_base64_image("@@not base64@@", "f").unwrap_err();
        assert!(!err.to_string().ends_with('.'), "{}", err);
    }
}
