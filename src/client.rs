use rand::rngs::OsRng;
use rand::RngCore;

use crate::gate::{ENCRYPTED_TOKEN_HEADER, INITIAL_NONCE_HEADER};

/// Fresh client nonce: 16 random bytes, hex-encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The nonce/token pair a client keeps after the server issued a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub nonce: String,
    pub token: String,
}

impl Credentials {
    /// Pick the issued pair out of response headers. Header names match
    /// case-insensitively; returns `None` unless both are present.
    pub fn from_headers<'a, I>(headers: I) -> Option<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut nonce = None;
        let mut token = None;
        for (name, value) in headers {
            if name.eq_ignore_ascii_case(INITIAL_NONCE_HEADER) {
                nonce = Some(value.to_owned());
            } else if name.eq_ignore_ascii_case(ENCRYPTED_TOKEN_HEADER) {
                token = Some(value.to_owned());
            }
        }
        Some(Self {
            nonce: nonce?,
            token: token?,
        })
    }

    /// Headers to attach to follow-up requests.
    pub fn request_headers(&self) -> [(&'static str, &str); 2] {
        [
            (INITIAL_NONCE_HEADER, self.nonce.as_str()),
            (ENCRYPTED_TOKEN_HEADER, self.token.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_are_hex_and_distinct() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_eq!(a.len(), 32);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn credentials_need_both_headers() {
        let creds = Credentials::from_headers([
            ("content-type", "application/json"),
            ("x-initial-nonce", "abc"),
            ("X-ENCRYPTED-TOKEN", "MTIz"),
        ])
        .unwrap();
        assert_eq!(creds.nonce, "abc");
        assert_eq!(creds.token, "MTIz");
        assert_eq!(creds.request_headers()[1], (ENCRYPTED_TOKEN_HEADER, "MTIz"));

        assert_eq!(Credentials::from_headers([("X-Initial-Nonce", "abc")]), None);
    }
}
