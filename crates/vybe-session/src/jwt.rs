//! Shared-secret JWT verifier.
//!
//! Accepts HMAC-signed tokens (HS256/HS384/HS512) minted by the login flow
//! with the same secret. The user profile lives in the `id`, `email`,
//! `name` and `picture` claims.
//!
//! # Security
//!
//! - Only HMAC algorithms are accepted; `none` and asymmetric algorithms fail
//! - `exp` is enforced when present, but tokens without it are accepted
//! - Every failure is reported with the same generic message

use std::collections::HashMap;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use vybe_protocol::Identity;

use crate::{IdentityVerifier, SessionError};

const INVALID_TOKEN: &str = "invalid or expired token";

/// [`IdentityVerifier`] backed by `jsonwebtoken`.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Creates a verifier for tokens signed with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms =
            vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    fn verify_sync(&self, token: &str) -> Result<Identity, SessionError> {
        let data =
            decode::<HashMap<String, Value>>(token, &self.key, &self.validation)
                .map_err(|e| {
                    tracing::debug!(error = %e, "token verification failed");
                    SessionError::AuthFailed(INVALID_TOKEN.into())
                })?;

        let claims = data.claims;
        Ok(Identity {
            id: claim(&claims, "id"),
            email: claim(&claims, "email"),
            name: claim(&claims, "name"),
            picture: claim(&claims, "picture"),
        })
    }
}

impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, SessionError> {
        self.verify_sync(token)
    }
}

/// Strings are taken verbatim, other JSON values by their JSON text
/// (a numeric id of `7` becomes `"7"`), missing claims are empty.
fn claim(claims: &HashMap<String, Value>, name: &str) -> String {
    match claims.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
