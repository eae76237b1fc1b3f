//! Participant-identifier normalization.
//!
//! The remote store matches filter values byte-for-byte, so the same logical
//! participant written as `" Alice@Mail.com"` in one place and
//! `"alice@mail.com"` in another silently splits into two keys — and every
//! query filtered on the un-normalized form comes back empty. Normalization
//! is therefore the one mandatory gate before an identifier is used as a
//! filter value or as a component of a composite id.

use crate::constants::COMPOSITE_ID_SEPARATOR;

/// Normalize a participant identifier: trim surrounding whitespace and
/// lowercase. Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Build a deterministic composite id from normalized parts.
///
/// Used for relationship records where at most one live record per
/// participant tuple may exist; the id collision is the dedup mechanism.
pub fn composite_id(parts: &[&str]) -> String {
    let normalized: Vec<String> = parts.iter().map(|p| normalize(p)).collect();
    normalized.join(&COMPOSITE_ID_SEPARATOR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Alice@Mail.com "), "alice@mail.com");
        assert_eq!(normalize("BOB"), "bob");
        assert_eq!(normalize("already-normal"), "already-normal");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("  MiXeD Case  ");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_composite_id_is_order_sensitive_and_normalized() {
        assert_eq!(composite_id(&["Landlord@X.com", " tenant@y.com"]), "landlord@x.com_tenant@y.com");
        assert_ne!(
            composite_id(&["a@x.com", "b@y.com"]),
            composite_id(&["b@y.com", "a@x.com"])
        );
    }

    #[test]
    fn test_composite_id_stable_across_input_casing() {
        assert_eq!(
            composite_id(&["L@X.COM", "T@Y.COM"]),
            composite_id(&["l@x.com", "t@y.com"])
        );
    }
}
