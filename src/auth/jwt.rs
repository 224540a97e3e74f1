use std::time::Duration;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Token purpose. Session tokens authenticate requests; reset tokens
/// authorize exactly one password change and are signed with a distinct
/// secret.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Session,
    Reset,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub kind: TokenKind,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub session_encoding: EncodingKey,
    pub session_decoding: DecodingKey,
    pub reset_encoding: EncodingKey,
    pub reset_decoding: DecodingKey,
    pub session_ttl: Duration,
    pub reset_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let jwt = &state.config.jwt;
        Self {
            session_encoding: EncodingKey::from_secret(jwt.session_secret.as_bytes()),
            session_decoding: DecodingKey::from_secret(jwt.session_secret.as_bytes()),
            reset_encoding: EncodingKey::from_secret(jwt.reset_secret.as_bytes()),
            reset_decoding: DecodingKey::from_secret(jwt.reset_secret.as_bytes()),
            session_ttl: Duration::from_secs((jwt.session_ttl_minutes as u64) * 60),
            reset_ttl: Duration::from_secs((jwt.reset_ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    fn sign(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let (key, ttl) = match kind {
            TokenKind::Session => (&self.session_encoding, self.session_ttl),
            TokenKind::Reset => (&self.reset_encoding, self.reset_ttl),
        };
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            kind,
        };
        let token = encode(&Header::default(), &claims, key)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_session(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign(user_id, TokenKind::Session)
    }
    pub fn sign_reset(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign(user_id, TokenKind::Reset)
    }

    fn verify(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let key = match kind {
            TokenKind::Session => &self.session_decoding,
            TokenKind::Reset => &self.reset_decoding,
        };
        let data = decode::<Claims>(token, key, &Validation::default())?;
        if data.claims.kind != kind {
            anyhow::bail!("wrong token kind");
        }
        debug!(user_id = %data.claims.sub, kind = ?kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_session(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify(token, TokenKind::Session)
    }
    pub fn verify_reset(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify(token, TokenKind::Reset)
    }
}

/// Extracts the authenticated user id from `Authorization: Bearer <token>`,
/// accepting session tokens only.
pub struct AuthUser(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or((
            StatusCode::UNAUTHORIZED,
            "Invalid Authorization header".to_string(),
        ))?;

        match keys.verify_session(token) {
            Ok(claims) => Ok(AuthUser(claims.sub)),
            Err(_) => {
                warn!("invalid or expired token");
                Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_session_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_session(user_id).expect("sign session");
        let claims = keys.verify_session(&token).expect("verify session");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Session);
    }

    #[tokio::test]
    async fn sign_and_verify_reset_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_reset(user_id).expect("sign reset");
        let claims = keys.verify_reset(&token).expect("verify reset");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Reset);
    }

    #[tokio::test]
    async fn session_token_fails_reset_verification() {
        let keys = make_keys();
        let token = keys.sign_session(Uuid::new_v4()).expect("sign session");
        // Different secret, so the signature itself does not check out.
        assert!(keys.verify_reset(&token).is_err());
    }

    #[tokio::test]
    async fn reset_token_fails_session_verification() {
        let keys = make_keys();
        let token = keys.sign_reset(Uuid::new_v4()).expect("sign reset");
        assert!(keys.verify_session(&token).is_err());
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        // Expired 10 minutes ago, well past the default validation leeway.
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: (now - 1200) as usize,
            exp: (now - 600) as usize,
            kind: TokenKind::Reset,
        };
        let token =
            encode(&Header::default(), &claims, &keys.reset_encoding).expect("encode expired");
        assert!(keys.verify_reset(&token).is_err());
    }

    #[tokio::test]
    async fn reset_token_valid_before_expiry() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_reset(user_id).expect("sign reset");
        let claims = keys.verify_reset(&token).expect("fresh token verifies");
        let ttl = claims.exp as i64 - claims.iat as i64;
        assert_eq!(ttl, 10 * 60);
    }
}
