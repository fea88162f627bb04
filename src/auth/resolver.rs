use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, DecodingKey, Validation};

use super::Claims;

/// Maps an inbound request to the caller's identity claim.
///
/// Implementations return `None` for every failure mode (missing, malformed,
/// expired, revoked); callers never learn why a claim is absent.
pub trait ClaimResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<Claims>;
}

/// Resolves HS256 session tokens from `Authorization: Bearer` or the session cookie
#[derive(Clone)]
pub struct JwtClaimResolver {
    decoding_key: DecodingKey,
    validation: Validation,
    cookie_name: String,
}

impl JwtClaimResolver {
    pub fn new(secret: &str, cookie_name: impl Into<String>) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            cookie_name: cookie_name.into(),
        }
    }

    fn validate_jwt(&self, token: &str) -> Result<Claims, String> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| format!("Invalid JWT token: {}", e))?;

        if token_data.claims.is_expired() {
            return Err("JWT token expired".to_string());
        }
        if token_data.claims.sub.trim().is_empty() {
            return Err("JWT token has no subject".to_string());
        }

        Ok(token_data.claims)
    }
}

impl ClaimResolver for JwtClaimResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Claims> {
        let token = extract_bearer_token(headers)
            .or_else(|| extract_cookie(headers, &self.cookie_name))?;

        match self.validate_jwt(&token) {
            Ok(claims) => Some(claims),
            Err(reason) => {
                tracing::debug!("Session token rejected: {}", reason);
                None
            }
        }
    }
}

/// Extract JWT token from the Authorization header, if it uses the Bearer scheme
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
}
