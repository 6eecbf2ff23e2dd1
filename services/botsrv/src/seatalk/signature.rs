//! Callback signature check

use crate::stuckup::fingerprint::sha256_hex;

/// `signature` must equal `sha256_hex(body ++ signing_secret)`
///
/// An empty secret disables the check; a missing header never passes otherwise.
pub fn is_valid_signature(signing_secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    if signing_secret.is_empty() {
        return true;
    }
    let Some(signature) = signature else {
        return false;
    };

    let mut payload = Vec::with_capacity(body.len() + signing_secret.len());
    payload.extend_from_slice(body);
    payload.extend_from_slice(signing_secret.as_bytes());
    sha256_hex(&payload) == signature.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_signature() {
        let body = br#"{"hello":"world"}"#;
        let mut signed = body.to_vec();
        signed.extend_from_slice(b"abc123");
        let signature = sha256_hex(&signed);

        assert!(is_valid_signature("abc123", body, Some(&signature)));
        assert!(is_valid_signature("abc123", body, Some(&signature.to_uppercase())));
    }

    #[test]
    fn test_invalid_or_missing_signature() {
        assert!(!is_valid_signature("abc", b"payload", Some("wrong")));
        assert!(!is_valid_signature("abc", b"payload", None));
    }

    #[test]
    fn test_empty_secret_accepts_anything() {
        assert!(is_valid_signature("", b"payload", None));
    }
}
