//! Object-store key layout and validation (§4.5, §6).
//!
//! A key must match `^(uploads|results)/<userId>/<uploadId>/.+` where both
//! identifiers are restricted to `[A-Za-z0-9_-]+` and `uploadId` further
//! matches `upload_<digits>_<alnum>`. Any write or read by the orchestrator
//! must verify the embedded `userId` matches the caller.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{StorageError, StorageResult};

static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(uploads|results)/([A-Za-z0-9_-]+)/(upload_[0-9]+_[A-Za-z0-9]+)/.+$")
        .expect("static key pattern is valid regex")
});

/// Parsed components of a validated object-store key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub root: &'static str,
    pub user_id: String,
    pub upload_id: String,
}

/// Validate a key's shape, without checking caller ownership.
pub fn validate_key(key: &str) -> bool {
    KEY_PATTERN.is_match(key)
}

/// Parse a key into its components, failing with `InvalidKey` if it doesn't
/// match the layout.
pub fn parse_key(key: &str) -> StorageResult<ParsedKey> {
    let caps = KEY_PATTERN
        .captures(key)
        .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
    let root = match &caps[1] {
        "uploads" => "uploads",
        _ => "results",
    };
    Ok(ParsedKey {
        root,
        user_id: caps[2].to_string(),
        upload_id: caps[3].to_string(),
    })
}

/// Verify a key both has the correct shape AND embeds the given `userId`.
/// Mismatch is a hard `PermissionDenied` per §4.5.
pub fn verify_owned_key(key: &str, expected_user_id: &str) -> StorageResult<()> {
    let parsed = parse_key(key)?;
    if parsed.user_id != expected_user_id {
        return Err(StorageError::PermissionDenied(format!(
            "key {key} does not belong to user {expected_user_id}"
        )));
    }
    Ok(())
}

pub fn source_video_key(user_id: &str, upload_id: &str, ext: &str) -> String {
    format!("uploads/{user_id}/{upload_id}/source.{ext}")
}

pub fn audio_key(user_id: &str, upload_id: &str) -> String {
    format!("uploads/{user_id}/{upload_id}/audio.mp3")
}

pub fn report_key(user_id: &str, upload_id: &str) -> String {
    format!("results/{user_id}/{upload_id}/report.xlsx")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_keys() {
        assert!(validate_key("uploads/user-1/upload_1700000000_ab12cd/source.mp4"));
        assert!(validate_key("results/user-1/upload_1700000000_ab12cd/report.xlsx"));
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(!validate_key("../../etc/passwd"));
        assert!(!validate_key("uploads/../../etc/passwd"));
    }

    #[test]
    fn rejects_malformed_upload_id() {
        assert!(!validate_key("uploads/user-1/not-an-upload-id/source.mp4"));
    }

    #[test]
    fn ownership_mismatch_is_permission_denied() {
        let key = source_video_key("user-1", "upload_1_ab", "mp4");
        assert!(verify_owned_key(&key, "user-1").is_ok());
        let err = verify_owned_key(&key, "user-2").unwrap_err();
        assert!(matches!(err, StorageError::PermissionDenied(_)));
    }

    #[test]
    fn key_generators_round_trip_through_parse() {
        let key = report_key("user-7", "upload_9_zz");
        let parsed = parse_key(&key).unwrap();
        assert_eq!(parsed.user_id, "user-7");
        assert_eq!(parsed.upload_id, "upload_9_zz");
        assert_eq!(parsed.root, "results");
    }
}
