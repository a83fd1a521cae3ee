//! Auth tokens (§4.F): a short-lived, HMAC-signed credential reference
//! carried in the session cookie so the credential itself never round-trips
//! through the client.

use base64::display::Base64Display;
use chrono::serde::ts_seconds;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use hmac::digest::MacError;
use serde_json::value::RawValue;

use crate::session::signatures::MessageVerifier;

static ENCODING_CONFIG: base64::Config = base64::URL_SAFE_NO_PAD;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("bad encoding")]
    BadEncoding(#[from] base64::DecodeError),
    #[error("expired token")]
    Expired,
    #[error("invalid signature")]
    InvalidMac(#[from] MacError),
    #[error("malformed token")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Token {
    username: String,
    #[serde(with = "ts_seconds")]
    expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(username: impl Into<String>, ttl: Duration) -> Self {
        Self {
            username: username.into(),
            expires_at: (Utc::now() + ttl).trunc_subsecs(0),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

#[serde_as]
#[derive(Debug, Deserialize, Serialize)]
pub struct SignedToken {
    token: Box<RawValue>,
    #[serde_as(as = "serde_with::base64::Base64")]
    mac: Vec<u8>,
}

impl SignedToken {
    pub fn encode(&self) -> Result<String, TokenError> {
        let json = serde_json::to_vec(&self)?;
        Ok(Base64Display::with_config(&json, ENCODING_CONFIG).to_string())
    }

    pub fn decode(encoded: &str) -> Result<SignedToken, TokenError> {
        let bytes = base64::decode_config(encoded, ENCODING_CONFIG)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl MessageVerifier<Token> {
    pub fn sign_token(&self, token: &Token) -> Result<SignedToken, TokenError> {
        let json_token = serde_json::to_string(token)?;
        let mac = self.sign(json_token.as_bytes());
        Ok(SignedToken {
            token: RawValue::from_string(json_token)?,
            mac,
        })
    }

    pub fn verify_token(&self, signed: &SignedToken) -> Result<Token, TokenError> {
        self.verify(signed.token.get().as_bytes(), &signed.mac)?;
        let token: Token = serde_json::from_str(signed.token.get())?;
        if token.is_expired() {
            return Err(TokenError::Expired);
        }
        Ok(token)
    }
}

use serde::{Deserialize, Serialize};
