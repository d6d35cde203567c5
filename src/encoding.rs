//! Base64 transport encoding (standard alphabet, padded, no line wrapping).
//!
//! Not a security boundary. Only used to carry binary fields in records and
//! backup API calls.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::CryptoError;

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn from_base64(s: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD.decode(s.trim()).map_err(|_| CryptoError::Encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_line_wrapping() {
        let encoded = to_base64(&[0xffu8; 300]);
        assert!(!encoded.contains('\n'));
        assert!(!encoded.contains('\r'));
    }

    #[test]
    fn known_values() {
        assert_eq!(to_base64(b""), "");
        assert_eq!(to_base64(b"hello"), "aGVsbG8=");
        assert_eq!(from_base64("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(from_base64(" aGVsbG8=\n").unwrap(), b"hello");
    }

    #[test]
    fn malformed_input_is_encoding_error() {
        assert_eq!(from_base64("not base64!"), Err(CryptoError::Encoding));
        assert_eq!(from_base64("aGVsbG8"), Err(CryptoError::Encoding));
        assert_eq!(from_base64("aGV\nsbG8="), Err(CryptoError::Encoding));
    }
}
