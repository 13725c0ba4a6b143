use sha2::{Digest, Sha256};

/// Name of the algorithm used for the question component of the identifiers.
///
/// Identifiers produced with a different question hash are not comparable with
/// the ones produced by this crate. Store this value next to the identifiers when
/// they need to outlive a migration.
pub const QUESTION_HASH_ALGORITHM: &str = "fnv1a-32";

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The hash of the question text, as a signed 32-bit integer.
///
/// A missing or empty question hashes to 0.
///
/// ```
/// use survey_ids::question_hash;
///
/// assert_eq!(question_hash(None), 0);
/// assert_eq!(question_hash(Some("")), 0);
/// assert_eq!(question_hash(Some("a")), -468965076);
/// ```
pub fn question_hash(question: Option<&str>) -> i32 {
    match question {
        Some(q) if !q.is_empty() => fnv1a_32(q.as_bytes()) as i32,
        _ => 0,
    }
}

/// The first 16 bytes of the SHA-256 digest of the parts joined with '_'.
pub(crate) fn truncated_digest(parts: &[&str]) -> [u8; 16] {
    let canonical = parts.join("_");
    let digest = Sha256::digest(canonical.as_bytes());
    let mut res = [0u8; 16];
    res.copy_from_slice(&digest[..16]);
    res
}
