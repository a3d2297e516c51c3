//! Persisted form of a registry secret.
//!
//! The secret is rendered as a JSON object and wrapped in URL-safe base64 (with
//! padding). The JSON keys are fixed so blobs written by earlier deployments
//! stay readable.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::Deserialize;

use crate::domain::{CaCertificates, RegistrySecret};

use super::error::{Result, SecretsError};

#[derive(Default, Deserialize)]
#[serde(default)]
struct SecretWire {
    #[serde(rename = "RootURL")]
    root_url: String,
    #[serde(rename = "InventoryURL")]
    inventory_url: String,
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "AuthToken")]
    auth_token: String,
    #[serde(rename = "Cacerts")]
    ca_certs: String,
}

/// Reversible encoding of [`RegistrySecret`] into an opaque string.
///
/// Provides no confidentiality; protection is the backend's concern.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretCodec;

impl SecretCodec {
    /// Encode a secret. Total over every secret value.
    pub fn encode(&self, secret: &RegistrySecret) -> String {
        let document = serde_json::json!({
            "RootURL": secret.root_url,
            "InventoryURL": secret.inventory_url,
            "Username": secret.username,
            "AuthToken": secret.auth_token,
            "Cacerts": secret.ca_certs.to_api(),
        });
        URL_SAFE.encode(document.to_string())
    }

    /// Decode a blob produced by [`SecretCodec::encode`].
    ///
    /// Nothing is returned unless both the framing and the JSON document are valid.
    pub fn decode(&self, blob: &str) -> Result<RegistrySecret> {
        let bytes = URL_SAFE
            .decode(blob.trim_end())
            .map_err(|e| SecretsError::decode(format!("invalid base64 framing: {}", e)))?;
        let wire: SecretWire = serde_json::from_slice(&bytes)
            .map_err(|e| SecretsError::decode(format!("invalid secret document: {}", e)))?;

        Ok(RegistrySecret {
            root_url: wire.root_url,
            inventory_url: wire.inventory_url,
            username: wire.username,
            auth_token: wire.auth_token,
            ca_certs: CaCertificates::from_api(&wire.ca_certs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DYNAMIC_CA_CERTS_NAME;
    use proptest::prelude::*;

    fn sample_secret() -> RegistrySecret {
        RegistrySecret {
            root_url: "oci://registry.example.com/charts".to_string(),
            inventory_url: "https://registry.example.com/api/v2.0".to_string(),
            username: "robot$catalog".to_string(),
            auth_token: "eyJhbGciOi+/=".to_string(),
            ca_certs: CaCertificates::from_api("-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n"),
        }
    }

    #[test]
    fn test_encode_uses_url_safe_alphabet() {
        let blob = SecretCodec.encode(&sample_secret());
        assert!(!blob.contains('+'));
        assert!(!blob.contains('/'));
        assert_eq!(SecretCodec.decode(&blob).unwrap(), sample_secret());
    }

    #[test]
    fn test_decode_reads_legacy_document() {
        let json = r#"{"RootURL":"https://charts.example.com","InventoryURL":"","Username":"u","AuthToken":"t","Cacerts":"use-dynamic-cacert"}"#;
        let blob = URL_SAFE.encode(json);

        let secret = SecretCodec.decode(&blob).unwrap();
        assert_eq!(secret.root_url, "https://charts.example.com");
        assert_eq!(secret.username, "u");
        assert_eq!(secret.ca_certs, CaCertificates::UseDynamicPlatformCa);
    }

    #[test]
    fn test_dynamic_ca_is_stored_as_marker() {
        let secret = RegistrySecret { ca_certs: CaCertificates::UseDynamicPlatformCa, ..sample_secret() };
        let blob = SecretCodec.encode(&secret);
        let raw = String::from_utf8(URL_SAFE.decode(&blob).unwrap()).unwrap();
        assert!(raw.contains(DYNAMIC_CA_CERTS_NAME));
    }

    #[test]
    fn test_decode_rejects_bad_framing() {
        let err = SecretCodec.decode("not*base64!").unwrap_err();
        assert!(matches!(err, SecretsError::Decode { .. }));
    }

    #[test]
    fn test_decode_rejects_bad_document() {
        let blob = URL_SAFE.encode("{\"RootURL\": 42}");
        assert!(matches!(SecretCodec.decode(&blob), Err(SecretsError::Decode { .. })));

        let blob = URL_SAFE.encode("plain text");
        assert!(matches!(SecretCodec.decode(&blob), Err(SecretsError::Decode { .. })));
    }

    fn ca_strategy() -> impl Strategy<Value = CaCertificates> {
        prop_oneof![
            Just(CaCertificates::UseDynamicPlatformCa),
            Just(CaCertificates::from_api(DYNAMIC_CA_CERTS_NAME)),
            any::<String>().prop_map(|pem| CaCertificates::from_api(&pem)),
        ]
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            root_url in any::<String>(),
            inventory_url in any::<String>(),
            username in any::<String>(),
            auth_token in any::<String>(),
            ca_certs in ca_strategy(),
        ) {
            let secret = RegistrySecret { root_url, inventory_url, username, auth_token, ca_certs };
            let decoded = SecretCodec.decode(&SecretCodec.encode(&secret)).unwrap();
            prop_assert_eq!(decoded, secret);
        }
    }
}
