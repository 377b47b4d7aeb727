use anyhow::{Context, Result};
use axum::http::{HeaderMap, header::AUTHORIZATION};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tollgate_config::Config;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).context("Token subject is not a user id")
    }
}

/// HS256 token verification (and minting, for tooling and tests)
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// Access token TTL in hours
    access_token_ttl_hours: i64,
    issuer: Option<String>,
}

impl AuthManager {
    pub fn new(config: &Config) -> Result<Self> {
        Self::from_secret(
            &config.jwt_secret,
            config.jwt_issuer.clone(),
            config.access_token_ttl_hours,
        )
    }

    pub fn from_secret(secret: &str, issuer: Option<String>, access_token_ttl_hours: i64) -> Result<Self> {
        if secret.is_empty() {
            anyhow::bail!("JWT secret must not be empty");
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_ttl_hours,
            issuer,
        })
    }

    /// Create access token. Returns the token and its expiry (Unix seconds).
    pub fn create_token(&self, user_id: &Uuid) -> Result<(String, i64)> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.access_token_ttl_hours);

        let claims = Claims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to encode JWT token")?;

        Ok((token, exp.timestamp()))
    }

    /// Verify signature, expiry and (when configured) issuer
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        if let Some(issuer) = &self.issuer {
            // set_issuer alone lets tokens without `iss` through
            validation.set_required_spec_claims(&["exp", "sub", "iss"]);
            validation.set_issuer(&[issuer]);
        }

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("Token verification failed")?;
        Ok(token_data.claims)
    }
}

/// Token from `Authorization: Bearer <token>`.
///
/// The header is split on single spaces and only a first part of exactly
/// `Bearer` counts; anything else is treated as no credential.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    if parts.next()? != "Bearer" {
        return None;
    }
    parts.next().filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn manager() -> AuthManager {
        AuthManager::from_secret("test-secret", None, 24).unwrap()
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_create_and_verify() {
        let auth = manager();
        let user_id = Uuid::new_v4();

        let (token, exp) = auth.create_token(&user_id).unwrap();
        assert!(exp > Utc::now().timestamp());

        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (token, _) = manager().create_token(&Uuid::new_v4()).unwrap();
        let other = AuthManager::from_secret("other-secret", None, 24).unwrap();
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let expired = AuthManager::from_secret("test-secret", None, -1).unwrap();
        let (token, _) = expired.create_token(&Uuid::new_v4()).unwrap();
        assert!(manager().verify_token(&token).is_err());
    }

    #[test]
    fn test_issuer_checked_when_configured() {
        let strict = AuthManager::from_secret("test-secret", Some("tollgate".into()), 24).unwrap();
        let (foreign, _) = manager().create_token(&Uuid::new_v4()).unwrap();
        assert!(strict.verify_token(&foreign).is_err());

        let (own, _) = strict.create_token(&Uuid::new_v4()).unwrap();
        assert!(strict.verify_token(&own).is_ok());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let strict = AuthManager::from_secret("test-secret", Some("tollgate".into()), 24).unwrap();
        let other = AuthManager::from_secret("test-secret", Some("elsewhere".into()), 24).unwrap();
        let (token, _) = other.create_token(&Uuid::new_v4()).unwrap();
        assert!(strict.verify_token(&token).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc.def")), None);
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(AuthManager::from_secret("", None, 24).is_err());
    }
}
