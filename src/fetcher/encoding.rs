//! Text-encoding detection and strict decoding of fetched payloads.
//!
//! Precedence, highest first:
//!
//! 1. `charset` parameter of the `Content-Type` header
//! 2. Byte-order mark (UTF-8, UTF-16BE, UTF-16LE)
//! 3. `<meta charset>` / `<meta http-equiv="Content-Type">` in the first
//!    [`META_SCAN_BYTES`] bytes, read speculatively as UTF-8
//! 4. UTF-8
//!
//! Candidates are tried in that order with strict (non-replacing) decoding;
//! the first one that decodes cleanly wins.

use crate::error::FetchError;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// How much of the payload is scanned for a `<meta>` charset declaration.
pub const META_SCAN_BYTES: usize = 1024;

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]*?charset\s*=\s*["']?\s*([A-Za-z0-9_.:\-]+)"#)
        .expect("meta charset pattern compiles")
});

/// Where an encoding candidate came from, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingOrigin {
    Header,
    ByteOrderMark,
    MetaTag,
    Default,
}

/// Extract the `charset` parameter from a `Content-Type` header value.
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        (!value.is_empty()).then_some(value)
    })
}

/// Find a charset declared by a `<meta>` tag near the top of the document.
pub fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(META_SCAN_BYTES)];
    let text = String::from_utf8_lossy(head);
    META_CHARSET
        .captures(&text)
        .map(|caps| caps[1].to_string())
}

/// Ordered, de-duplicated encoding candidates for `bytes`.
pub fn candidates(
    bytes: &[u8],
    header_charset: Option<&str>,
) -> Vec<(&'static Encoding, EncodingOrigin)> {
    let mut out: Vec<(&'static Encoding, EncodingOrigin)> = Vec::with_capacity(4);
    let mut push = |enc: &'static Encoding, origin: EncodingOrigin| {
        if !out.iter().any(|(e, _)| *e == enc) {
            out.push((enc, origin));
        }
    };

    if let Some(label) = header_charset {
        match Encoding::for_label(label.as_bytes()) {
            Some(enc) => push(enc, EncodingOrigin::Header),
            None => debug!(%label, "Ignoring unknown Content-Type charset"),
        }
    }

    if let Some((enc, _)) = Encoding::for_bom(bytes) {
        push(enc, EncodingOrigin::ByteOrderMark);
    }

    if let Some(label) = sniff_meta_charset(bytes) {
        match Encoding::for_label(label.as_bytes()) {
            // A UTF-16 declaration readable as ASCII is a lie; treat it as UTF-8.
            Some(enc) if enc == UTF_16LE || enc == UTF_16BE => push(UTF_8, EncodingOrigin::MetaTag),
            Some(enc) => push(enc, EncodingOrigin::MetaTag),
            None => debug!(%label, "Ignoring unknown meta charset"),
        }
    }

    push(UTF_8, EncodingOrigin::Default);
    out
}

/// Decode `bytes` using the first candidate that decodes without errors.
///
/// Returns the text and the name of the encoding used, or
/// [`FetchError::DecodingFailed`] naming the highest-precedence candidate.
pub fn decode(bytes: &[u8], header_charset: Option<&str>) -> Result<(String, &'static str), FetchError> {
    let candidates = candidates(bytes, header_charset);

    for (enc, origin) in &candidates {
        let body = strip_bom(bytes, enc);
        if let Some(text) = enc.decode_without_bom_handling_and_without_replacement(body) {
            debug!(encoding = enc.name(), ?origin, bytes = bytes.len(), "Decoded payload");
            return Ok((text.into_owned(), enc.name()));
        }
        debug!(encoding = enc.name(), ?origin, "Candidate encoding failed to decode payload");
    }

    let first = candidates.first().map_or(UTF_8, |(enc, _)| *enc);
    Err(FetchError::DecodingFailed {
        encoding: first.name().to_string(),
    })
}

fn strip_bom<'a>(bytes: &'a [u8], enc: &'static Encoding) -> &'a [u8] {
    match Encoding::for_bom(bytes) {
        Some((bom_enc, len)) if bom_enc == enc => &bytes[len..],
        _ => bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_from_content_type() {
        assert_eq!(
            charset_from_content_type("text/html; charset=ISO-8859-1"),
            Some("ISO-8859-1")
        );
        assert_eq!(
            charset_from_content_type("text/html;Charset=\"utf-8\""),
            Some("utf-8")
        );
        assert_eq!(charset_from_content_type("text/html"), None);
        assert_eq!(charset_from_content_type("text/html; charset="), None);
    }

    #[test]
    fn test_sniff_meta_charset_variants() {
        assert_eq!(
            sniff_meta_charset(b"<html><head><meta charset=\"gbk\"></head>").as_deref(),
            Some("gbk")
        );
        assert_eq!(
            sniff_meta_charset(
                b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=Shift_JIS\">"
            )
            .as_deref(),
            Some("Shift_JIS")
        );
        let mut late = vec![b' '; META_SCAN_BYTES];
        late.extend_from_slice(b"<meta charset=\"gbk\">");
        assert_eq!(sniff_meta_charset(&late), None);
    }

    #[test]
    fn test_header_charset_wins_over_meta() {
        // "café" in windows-1252: 0xE9 for é
        let body = b"<meta charset=\"utf-8\"><p>caf\xE9</p>";
        let (text, name) = decode(body, Some("windows-1252")).unwrap();
        assert!(text.contains("café"));
        assert_eq!(name, "windows-1252");
    }

    #[test]
    fn test_bom_detection_and_stripping() {
        let mut body = vec![0xFF, 0xFE];
        for unit in "héllo".encode_utf16() {
            body.extend_from_slice(&unit.to_le_bytes());
        }
        let (text, name) = decode(&body, None).unwrap();
        assert_eq!(text, "héllo");
        assert_eq!(name, "UTF-16LE");

        let (text, name) = decode(b"\xEF\xBB\xBFplain", None).unwrap();
        assert_eq!(text, "plain");
        assert_eq!(name, "UTF-8");
    }

    #[test]
    fn test_bom_wins_over_meta() {
        // UTF-8 "é" is also valid windows-1252 ("Ã©"), so only precedence decides.
        let body = "\u{FEFF}<meta charset=\"windows-1252\"><p>café</p>".as_bytes();
        assert_eq!(
            candidates(body, None),
            vec![
                (UTF_8, EncodingOrigin::ByteOrderMark),
                (encoding_rs::WINDOWS_1252, EncodingOrigin::MetaTag),
            ]
        );
        let (text, name) = decode(body, None).unwrap();
        assert_eq!(text, "<meta charset=\"windows-1252\"><p>café</p>");
        assert_eq!(name, "UTF-8");

        let mut body = vec![0xFF, 0xFE];
        for unit in "<meta charset=\"windows-1252\">é".encode_utf16() {
            body.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(candidates(&body, None)[0], (UTF_16LE, EncodingOrigin::ByteOrderMark));
        let (text, name) = decode(&body, None).unwrap();
        assert_eq!(text, "<meta charset=\"windows-1252\">é");
        assert_eq!(name, "UTF-16LE");
    }

    #[test]
    fn test_meta_charset_used_without_header() {
        // "中文" in GBK
        let mut body = b"<meta charset=\"gbk\"><title>".to_vec();
        body.extend_from_slice(&[0xD6, 0xD0, 0xCE, 0xC4]);
        body.extend_from_slice(b"</title>");
        let (text, name) = decode(&body, None).unwrap();
        assert!(text.contains("中文"));
        assert_eq!(name, "GBK");
    }

    #[test]
    fn test_meta_utf16_is_treated_as_utf8() {
        let body = "<meta charset=\"utf-16\"><p>ok</p>".as_bytes();
        let (text, name) = decode(body, None).unwrap();
        assert_eq!(text, "<meta charset=\"utf-16\"><p>ok</p>");
        assert_eq!(name, "UTF-8");
    }

    #[test]
    fn test_undecodable_payload_names_first_candidate() {
        let err = decode(b"\xC3\x28 invalid utf-8", None).unwrap_err();
        assert_eq!(
            err,
            FetchError::DecodingFailed {
                encoding: "UTF-8".to_string()
            }
        );
    }

    #[test]
    fn test_falls_through_to_later_candidate() {
        // Header claims UTF-8 but meta says windows-1252, and the bytes are 1252.
        let body = b"<meta charset=\"windows-1252\"><p>na\xEFve</p>";
        let (text, name) = decode(body, Some("utf-8")).unwrap();
        assert!(text.contains("naïve"));
        assert_eq!(name, "windows-1252");
    }
}
