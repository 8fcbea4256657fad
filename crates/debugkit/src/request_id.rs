use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 32 lowercase hex characters identifying one request.
pub fn generate() -> String {
    let mut bytes = [0u8; 16];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => to_hex(&bytes),
        Err(err) => {
            tracing::warn!(error = %err, "OS randomness unavailable, deriving request id from a digest");
            fallback()
        }
    }
}

fn fallback() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let counter = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    let local = 0u8;

    let mut hasher = Sha256::new();
    hasher.update(nanos.to_be_bytes());
    hasher.update(std::process::id().to_be_bytes());
    hasher.update(counter.to_be_bytes());
    hasher.update((&local as *const u8 as usize).to_be_bytes());
    let digest = hasher.finalize();

    to_hex(&digest[..16])
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_request_id(id: &str) -> bool {
        id.len() == 32 && id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
    }

    #[test]
    fn test_generate_shape() {
        let id = generate();
        assert!(is_request_id(&id), "{}", id);
        assert_ne!(id, generate());
    }

    #[test]
    fn test_fallback_shape_and_uniqueness() {
        let a = fallback();
        let b = fallback();
        assert!(is_request_id(&a), "{}", a);
        assert_ne!(a, b);
    }
}
