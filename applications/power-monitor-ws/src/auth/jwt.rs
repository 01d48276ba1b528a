use crate::error::{AppError, Result};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (username)
    pub exp: usize,  // Expiration time
    pub iat: usize,  // Issued at
}

/// Validate an HS256 token and return its claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let validation = Validation::default();
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

/// Check a request's token against the configured secret.
/// Without a secret every request is let through and no claims are returned.
pub fn authorize(secret: Option<&str>, token: Option<&str>) -> Result<Option<Claims>> {
    let Some(secret) = secret else {
        return Ok(None);
    };
    let token = token.ok_or_else(|| AppError::Auth("missing token".to_string()))?;
    validate_token(token, secret).map(Some)
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
