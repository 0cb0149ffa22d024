use crate::peer::types::ConnectionDescription;
use sha2::{Digest, Sha256};

/// Short authentication string both operators can compare out-of-band.
///
/// Derived from the DTLS fingerprints of both descriptions, sorted so the
/// two ends compute the same value. `None` when either side has no
/// fingerprint.
pub fn verification_code(
    local: &ConnectionDescription,
    remote: &ConnectionDescription,
) -> Option<String> {
    let mut fingerprints: Vec<&str> = local.fingerprints();
    let remote_fps = remote.fingerprints();
    if fingerprints.is_empty() || remote_fps.is_empty() {
        return None;
    }
    fingerprints.extend(remote_fps);
    fingerprints.sort_unstable();

    let mut hasher = Sha256::new();
    for fp in fingerprints {
        hasher.update(fp.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    Some(hex::encode(&digest[..6])) // 48 bits, 12 hex chars
}
