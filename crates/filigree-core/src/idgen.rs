//! Issue and file identifier minting.
//!
//! Ids look like `<prefix>-<10 lowercase hex chars>` (e.g. `demo-a3f19c02de`),
//! or `<prefix>-f-<10 hex>` for file records. Unlike a content hash, these
//! are random: two issues with identical fields must still get distinct ids.
//! Collisions are handled by the caller re-sampling at 16 hex characters
//! (`sample_hex(16)`) rather than by this module looping silently — the
//! storage layer is what knows whether an id is actually taken.

use rand::RngCore;

const SHORT_HEX_LEN: usize = 10;
const FALLBACK_HEX_LEN: usize = 16;

/// Samples `len` lowercase hex characters from a CSPRNG.
///
/// `len` must be even; each byte contributes two hex digits.
pub fn sample_hex(len: usize) -> String {
    debug_assert!(len % 2 == 0, "hex length must be even");
    let mut bytes = vec![0u8; len / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generates a new issue id with the standard 10-hex-character suffix.
pub fn new_issue_id(prefix: &str) -> String {
    format!("{prefix}-{}", sample_hex(SHORT_HEX_LEN))
}

/// Generates the 16-hex-character fallback id used after a collision.
pub fn new_issue_id_fallback(prefix: &str) -> String {
    format!("{prefix}-{}", sample_hex(FALLBACK_HEX_LEN))
}

/// Generates a new file record id (`<prefix>-f-<10 hex>`).
pub fn new_file_id(prefix: &str) -> String {
    format!("{prefix}-f-{}", sample_hex(SHORT_HEX_LEN))
}

/// Generates the 16-hex-character fallback file id.
pub fn new_file_id_fallback(prefix: &str) -> String {
    format!("{prefix}-f-{}", sample_hex(FALLBACK_HEX_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_id_has_expected_shape() {
        let id = new_issue_id("demo");
        assert!(id.starts_with("demo-"));
        let suffix = &id["demo-".len()..];
        assert_eq!(suffix.len(), 10);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn fallback_id_is_longer() {
        let id = new_issue_id_fallback("demo");
        let suffix = &id["demo-".len()..];
        assert_eq!(suffix.len(), 16);
    }

    #[test]
    fn file_id_has_f_infix() {
        let id = new_file_id("demo");
        assert!(id.starts_with("demo-f-"));
        assert_eq!(id["demo-f-".len()..].len(), 10);
    }

    #[test]
    fn ids_are_not_trivially_repeated() {
        let a = new_issue_id("demo");
        let b = new_issue_id("demo");
        assert_ne!(a, b);
    }
}
