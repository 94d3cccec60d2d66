//! Note GUIDs and field checksums in the encodings Anki expects.

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Alphabet of Anki's base91 GUID encoding.
const BASE91_TABLE: &[u8; 91] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_`{|}~";

/// Stable GUID for a note identified by `parts`.
///
/// The parts are joined with `__`, hashed with SHA-256, and the first 8
/// bytes of the digest are base91-encoded as a big-endian integer. Equal parts always give equal GUIDs, so
/// re-importing a regenerated package updates notes instead of duplicating
/// them.
#[must_use]
pub fn guid_for(parts: &[&str]) -> String {
    let digest = Sha256::digest(parts.join("__").as_bytes());

    let mut head = [0_u8; 8];
    head.copy_from_slice(&digest[..8]);
    base91(u64::from_be_bytes(head))
}

fn base91(mut value: u64) -> String {
    if value == 0 {
        return char::from(BASE91_TABLE[0]).to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        #[allow(clippy::cast_possible_truncation)]
        let index = (value % 91) as usize;
        digits.push(BASE91_TABLE[index]);
        value /= 91;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Duplicate-detection checksum of a note's sort field.
///
/// The first 8 hex digits of SHA-1 over the field with HTML tags removed and
/// sound tags reduced to their file names.
#[must_use]
pub fn field_checksum(field: &str) -> i64 {
    let stripped = strip_html_preserving_media(field);
    let digest = Sha1::digest(stripped.as_bytes());
    let head = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    i64::from(head)
}

/// Removes HTML tags and replaces `[sound:name]` with `name`.
#[must_use]
pub fn strip_html_preserving_media(field: &str) -> String {
    let mut text = String::with_capacity(field.len());
    let mut rest = field;

    while let Some(start) = rest.find("[sound:") {
        text.push_str(&rest[..start]);
        let after = &rest[start + "[sound:".len()..];
        if let Some(end) = after.find(']') {
            text.push_str(&after[..end]);
            rest = &after[end + 1..];
        } else {
            text.push_str(&rest[start..]);
            rest = "";
        }
    }
    text.push_str(rest);

    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }
    stripped.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_is_stable_for_equal_parts() {
        assert_eq!(
            guid_for(&["wanikani-vocab", "2467"]),
            guid_for(&["wanikani-vocab", "2467"])
        );
    }

    #[test]
    fn test_guid_differs_between_subjects() {
        assert_ne!(
            guid_for(&["wanikani-vocab", "2467"]),
            guid_for(&["wanikani-vocab", "2468"])
        );
    }

    #[test]
    fn test_guid_uses_base91_alphabet_and_fits_u64() {
        let guid = guid_for(&["anything"]);
        assert!(!guid.is_empty() && guid.len() <= 10);
        assert!(guid.bytes().all(|b| BASE91_TABLE.contains(&b)));
    }

    #[test]
    fn test_guid_encodes_leading_digest_bytes() {
        // sha256("abc") starts with ba7816bf8f01cfea.
        assert_eq!(base91(0xba78_16bf_8f01_cfea), "FKBh}pT;vL");
        assert_eq!(guid_for(&["abc"]), "FKBh}pT;vL");
        assert_eq!(guid_for(&["wanikani-vocab", "2467"]), "N+1Q={LEX2");
    }

    #[test]
    fn test_base91_small_values() {
        assert_eq!(base91(0), "a");
        assert_eq!(base91(1), "b");
        assert_eq!(base91(91), "ba");
    }

    #[test]
    fn test_strip_html_preserving_media() {
        assert_eq!(
            strip_html_preserving_media("[sound:wbvocab-1.mp3]"),
            "wbvocab-1.mp3"
        );
        assert_eq!(
            strip_html_preserving_media("<span>いち</span><br><span>ひと</span>"),
            "いちひと"
        );
    }

    #[test]
    fn test_field_checksum_of_known_value() {
        // sha1("abc") = a9993e36...
        assert_eq!(field_checksum("<b>abc</b>"), 0xa999_3e36);
    }
}
