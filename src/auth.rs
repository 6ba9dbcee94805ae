use crate::error::{ApiError, ApiResult};
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::env;

/// Verifies bearer tokens minted by the auth provider. A token is
/// `<user_id>.<hex hmac-sha256(secret, user_id)>`; verification yields the
/// caller's user id, which scopes every watchlist query.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    secret: String,
}

impl TokenVerifier {
    pub fn from_env() -> ApiResult<Self> {
        let secret = env::var("WATCHLIST_SIGNING_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ApiError::Configuration("WATCHLIST_SIGNING_SECRET"))?;
        Ok(Self::new(secret))
    }

    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(&self, token: &str) -> ApiResult<String> {
        let Some((user_id, sig_hex)) = token.rsplit_once('.') else {
            return Err(ApiError::Unauthorized);
        };
        if user_id.is_empty() {
            return Err(ApiError::Unauthorized);
        }
        let Ok(expected) = hex::decode(sig_hex) else {
            return Err(ApiError::Unauthorized);
        };

        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes()) else {
            return Err(ApiError::Unauthorized);
        };
        mac.update(user_id.as_bytes());
        let computed = mac.finalize().into_bytes();

        if expected.len() == computed.len() && constant_time_eq(&computed, &expected) {
            Ok(user_id.to_string())
        } else {
            Err(ApiError::Unauthorized)
        }
    }

    /// Token issuance lives with the auth provider; this is the matching
    /// signer for provider-side tooling and tests.
    pub fn sign(&self, user_id: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(user_id.as_bytes());
        let digest = mac.finalize().into_bytes();
        format!("{}.{}", user_id, hex::encode(digest))
    }
}
