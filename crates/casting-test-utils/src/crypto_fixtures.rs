//! Fixed RSA keypairs for testing
//!
//! Two 2048-bit keys are embedded so that tests never generate keys at
//! runtime. Each keypair exposes its private key for signing and its public
//! key as a JWK for the mocked JWKS endpoint.

use jsonwebtoken::EncodingKey;
use serde_json::{json, Value};

const KEY_1_PEM: &str = include_str!("../fixtures/rsa_key_1.pem");
const KEY_1_MODULUS: &str = "vju5-LV4_wIvyHAEUaiiAjodrrNkg952M1tat5VcW-OljRGibkn_gFnskhhIAlZHlYPrKH0HznqUO0ry0umHgVpdcoPk6QBigeNilJAQ6CIWiPbf65RUWzbAAEYpi9QoNg0pLbT0WCnAbBUqZ5F4IqILoxvBsYEivnuhsIcQhaB0sF7_HQEtOh-78hteHrNnTGtQzk2OU8oXtsiYa9CIlMwcowLxiK_a7AP3RznNLIMVw9HGwMTtDBORXAXn4rtaSxHrYiE4U_9Kgo-68UXHiz6nJUmRHvLhR1PQHGS28sFTEj-8viOOfmriH42gEYFx_xM2-5TfGGjmB_fntdwPxQ";

const KEY_2_PEM: &str = include_str!("../fixtures/rsa_key_2.pem");
const KEY_2_MODULUS: &str = "6nf29wTy-DAGURQr68n7KnCCbE5yhCN2g1hHVUkO4q3815nNXPsAgHq7xwXAIfeF8vsL6SVRFjkIQsiuJxJOvgiLtwK5DQ0gLut72iiU7HaLqwT1Kphi0GJ0M2iY-9a0KO-Hsu64Dyxo-VNQ54r28xSj-JCIQisVTt_WbVwGFm86GXmS0trBdlojHGF5mqkiEnTNt1Cw38-3DJZk6uJKNkXrJQRpvJmkpg0Z_zGi5FhXkwReoeinBWMDHtbR2RO33sQu1_3qnl7ieJkA9ycZtSVj6SH0UcGo_vlXvaJrYWO98mRmixeSioh2Yev0Z2yK2Fu9-xS65shPHAQmJ7-dcw";

/// Public exponent 65537, base64url.
const EXPONENT: &str = "AQAB";

/// RSA keypair used to sign test tokens.
///
/// # Example
/// ```rust,ignore
/// let key = TestKeypair::primary("key-1");
/// let jwks = TestJwks::start(&[&key]).await;
/// let token = TestTokenBuilder::new(&jwks.issuer(), "casting-agency").sign(&key);
/// ```
#[derive(Debug, Clone)]
pub struct TestKeypair {
    pub kid: String,
    private_pem: &'static str,
    modulus: &'static str,
}

impl TestKeypair {
    /// The first fixed key, published under `kid`.
    pub fn primary(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            private_pem: KEY_1_PEM,
            modulus: KEY_1_MODULUS,
        }
    }

    /// The second fixed key, published under `kid`.
    pub fn secondary(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            private_pem: KEY_2_PEM,
            modulus: KEY_2_MODULUS,
        }
    }

    /// Private key for `jsonwebtoken::encode`.
    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_rsa_pem(self.private_pem.as_bytes())
            .expect("fixture PEM should be a valid RSA private key")
    }

    /// Public key as a JWK entry.
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": "RS256",
            "n": self.modulus,
            "e": EXPONENT,
        })
    }
}

/// Build a JWKS document from keypairs.
pub fn jwks_document(keys: &[&TestKeypair]) -> Value {
    json!({
        "keys": keys.iter().map(|k| k.jwk()).collect::<Vec<_>>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_keys_parse() {
        let _ = TestKeypair::primary("key-1").encoding_key();
        let _ = TestKeypair::secondary("key-2").encoding_key();
    }

    #[test]
    fn test_jwk_shape() {
        let jwk = TestKeypair::primary("key-1").jwk();

        assert_eq!(jwk["kty"], "RSA");
        assert_eq!(jwk["kid"], "key-1");
        assert_eq!(jwk["alg"], "RS256");
        assert_eq!(jwk["e"], "AQAB");
    }

    #[test]
    fn test_jwks_document_lists_all_keys() {
        let first = TestKeypair::primary("key-1");
        let second = TestKeypair::secondary("key-2");

        let document = jwks_document(&[&first, &second]);

        assert_eq!(document["keys"].as_array().unwrap().len(), 2);
        assert_ne!(document["keys"][0]["n"], document["keys"][1]["n"]);
    }
}
