//! Client-side access token decoding.
//!
//! The payload is read without verifying the signature. The result is only
//! used for display; the backend stays the authority on every request.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::{Role, User};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Access token is not a JWT (expected three dot-separated parts)")]
    Malformed,
    #[error("Access token could not be decoded: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Claims the backend puts in its access tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.exp
            .map(|exp| exp <= now.unix_timestamp())
            .unwrap_or(false)
    }

    pub fn into_user(self) -> User {
        User {
            id: self.sub.parse().unwrap_or(0),
            email: self.email.unwrap_or_default(),
            nickname: self.nickname.unwrap_or_default(),
            role: self.role.unwrap_or_default(),
        }
    }
}

pub fn decode_claims(token: &str) -> Result<Claims, DecodeError> {
    let token = token.trim();
    if token.split('.').count() != 3 {
        return Err(DecodeError::Malformed);
    }

    // Expiry is reported through `Claims::is_expired` instead of failing here.
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

/// Whether `token` decodes and carries an `exp` at or before `now`.
pub fn is_token_expired(token: &str, now: OffsetDateTime) -> Result<bool, DecodeError> {
    decode_claims(token).map(|claims| claims.is_expired(now))
}

pub fn decode_user(token: &str) -> Result<User, DecodeError> {
    decode_claims(token).map(Claims::into_user)
}

#[cfg(test)]
pub(crate) fn encode_test_token(payload: &serde_json::Value) -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        payload,
        &jsonwebtoken::EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}
