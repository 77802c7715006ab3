//! Confirmation codes and access tokens.
//!
//! A confirmation code is an HMAC over the parts of a user row that change when
//! the account is used (`last_login` in particular), so it is never stored and
//! stops validating as soon as a token has been issued with it.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use jsonwebtoken::{EncodingKey, Header, encode};
use sha2::Sha256;

use crate::{
    auth::Claims,
    config::AppConfig,
    error::ApiError,
    models::{TokenResponse, User},
};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct TokenService {
    secret_key: String,
    jwt_secret: String,
    access_token_lifetime_secs: i64,
}

impl TokenService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            secret_key: config.secret_key.clone(),
            jwt_secret: config.jwt_secret.clone(),
            access_token_lifetime_secs: config.access_token_lifetime_secs,
        }
    }

    fn user_mac(&self, user: &User) -> Result<HmacSha256, ApiError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ApiError::Internal(format!("confirmation key rejected: {e}")))?;
        let last_login = user
            .last_login
            .map(|at| at.timestamp_micros().to_string())
            .unwrap_or_default();
        mac.update(user.id.as_bytes());
        for part in [user.username.as_str(), user.email.as_str(), last_login.as_str()] {
            mac.update(b"|");
            mac.update(part.as_bytes());
        }
        Ok(mac)
    }

    /// Code to mail to `user`. Deterministic for an unchanged user row.
    pub fn create_confirmation_code(&self, user: &User) -> Result<String, ApiError> {
        let tag = self.user_mac(user)?.finalize().into_bytes();
        Ok(URL_SAFE_NO_PAD.encode(tag))
    }

    /// Constant-time comparison against the code for the user's current state.
    pub fn check_confirmation_code(&self, user: &User, code: &str) -> bool {
        let Ok(expected) = URL_SAFE_NO_PAD.decode(code.trim()) else {
            return false;
        };
        match self.user_mac(user) {
            Ok(mac) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }

    /// Signs an HS256 access token for `user`.
    pub fn create_token_for_user(&self, user: &User) -> Result<TokenResponse, ApiError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id,
            iat: now as usize,
            exp: (now + self.access_token_lifetime_secs) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("failed to sign access token: {e}")))?;

        Ok(TokenResponse { token })
    }
}
