/*
[INPUT]:  API key file, request method, path and body
[OUTPUT]: Signed request headers (ACCESS-KEY, ACCESS-TIMESTAMP, ACCESS-SIGN)
[POS]:    HTTP layer - request signing for private endpoints
[UPDATE]: When changing signing algorithm or header format
*/

use std::fmt;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::http::{BitflyerError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_ACCESS_KEY: &str = "ACCESS-KEY";
pub const HEADER_ACCESS_TIMESTAMP: &str = "ACCESS-TIMESTAMP";
pub const HEADER_ACCESS_SIGN: &str = "ACCESS-SIGN";

/// Produces authentication headers for a private request.
pub trait Authenticator: Send + Sync + fmt::Debug {
    fn auth_headers(
        &self,
        timestamp: &str,
        method: &str,
        path_and_query: &str,
        body: &[u8],
    ) -> Vec<(&'static str, String)>;
}

/// HMAC-SHA256 signer keyed by an API key pair.
pub struct ApiKeyAuthenticator {
    api_key: String,
    api_secret: String,
}

impl fmt::Debug for ApiKeyAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyAuthenticator")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Load a key pair from a file holding the key on the first line and the
    /// secret on the second. The file must not be readable by anyone else.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| {
            BitflyerError::Config(format!("api key file {} not found: {e}", path.display()))
        })?;

        let mode = metadata.permissions().mode() & 0o777;
        if mode != 0o600 {
            return Err(BitflyerError::Config(format!(
                "api key file {} has insecure permission {mode:o} (expected 600)",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            BitflyerError::Config(format!("can not read api key file {}: {e}", path.display()))
        })?;

        let mut lines = content.lines().map(str::trim);
        match (lines.next(), lines.next()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Ok(Self::new(key, secret))
            }
            _ => Err(BitflyerError::Config(format!(
                "can not parse api key file {}",
                path.display()
            ))),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Hex HMAC-SHA256 over `timestamp + method + path_and_query + body`.
    pub fn sign(&self, timestamp: &str, method: &str, path_and_query: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(path_and_query.as_bytes());
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }
}

impl Authenticator for ApiKeyAuthenticator {
    fn auth_headers(
        &self,
        timestamp: &str,
        method: &str,
        path_and_query: &str,
        body: &[u8],
    ) -> Vec<(&'static str, String)> {
        let sign = self.sign(timestamp, method, path_and_query, body);
        vec![
            (HEADER_ACCESS_KEY, self.api_key.clone()),
            (HEADER_ACCESS_TIMESTAMP, timestamp.to_string()),
            (HEADER_ACCESS_SIGN, sign),
        ]
    }
}
