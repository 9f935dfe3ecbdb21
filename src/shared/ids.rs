//! Content-derived identifiers
//!
//! Overlay state (marks, stars, renames) and synthesized message ids are keyed
//! by UUID-shaped strings derived from stable inputs, so the same file loaded
//! twice maps to the same keys.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// UUID-shaped id from the first 16 bytes of SHA-256 over `parts` joined by `|`
pub fn derive_uuid(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join("|").as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Key for a loaded file: name + size + modification time (ms since epoch)
pub fn derive_file_uuid(file_name: &str, size: u64, modified_ms: i64) -> String {
    derive_uuid(&[file_name, &size.to_string(), &modified_ms.to_string()])
}

/// Key for one conversation inside a loaded file
pub fn derive_conversation_uuid(file_uuid: &str, conversation_uuid: &str) -> String {
    derive_uuid(&[file_uuid, conversation_uuid])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_uuid_is_stable_and_uuid_shaped() {
        let a = derive_file_uuid("conversations.json", 1024, 1_700_000_000_000);
        let b = derive_file_uuid("conversations.json", 1024, 1_700_000_000_000);
        assert_eq!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_derive_uuid_changes_with_inputs() {
        let a = derive_file_uuid("conversations.json", 1024, 1);
        let b = derive_file_uuid("conversations.json", 1025, 1);
        assert_ne!(a, b);
        assert_ne!(derive_conversation_uuid(&a, "c1"), derive_conversation_uuid(&a, "c2"));
    }
}
